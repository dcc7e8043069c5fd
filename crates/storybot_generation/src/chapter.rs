//! Chapter text generation and the illustration fan-out.

use crate::prompts::{self, FALLBACK_SCENE};
use crate::{ReferencePipeline, TextChain};
use futures::future::join_all;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use storybot_core::{
    Book, BookId, Chapter, Character, IllustrationRef, NewChapter, UserSettings,
};
use storybot_error::{
    AggregateError, AggregateErrorKind, StoreError, StorybotError, StorybotResult,
};
use storybot_interface::{ContentStore, TextRequest};
use tracing::{debug, info, instrument, warn};

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*(?:ILLUSTRATION|ИЛЛЮСТРАЦИЯ)\s*:\s*([^\]]+)\]")
        .expect("valid illustration marker pattern")
});

/// Chapter text produced by the text chain, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedChapter {
    /// 1-based number, one past the existing chapters
    pub number: u32,
    /// Display title
    pub title: String,
    /// Prose with every illustration marker removed
    pub content: String,
    /// Scene from the first marker, or the generic fallback scene
    pub scene: String,
    /// Words in `content`
    pub word_count: usize,
}

/// How an illustration batch went as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every requested illustration succeeded
    Complete,
    /// Some succeeded, some failed
    Partial {
        /// Successful requests
        succeeded: usize,
        /// Failed requests
        failed: usize,
    },
    /// Nothing succeeded
    Failed,
}

/// Per-request illustration results, in request order.
#[derive(Debug, Clone)]
pub struct IllustrationBatch {
    results: Vec<Result<IllustrationRef, StorybotError>>,
}

impl IllustrationBatch {
    /// Wraps results in request order.
    pub fn new(results: Vec<Result<IllustrationRef, StorybotError>>) -> Self {
        Self { results }
    }

    /// Results in request order.
    pub fn results(&self) -> &[Result<IllustrationRef, StorybotError>] {
        &self.results
    }

    /// Successful illustrations in request order.
    pub fn successes(&self) -> Vec<&IllustrationRef> {
        self.results.iter().filter_map(|r| r.as_ref().ok()).collect()
    }

    /// First successful illustration by request index.
    pub fn first_success(&self) -> Option<&IllustrationRef> {
        self.results.iter().find_map(|r| r.as_ref().ok())
    }

    /// The illustration a chapter keeps, or an error when none succeeded.
    pub fn canonical(&self) -> Result<&IllustrationRef, AggregateError> {
        self.first_success().ok_or_else(|| {
            AggregateError::new(AggregateErrorKind::AllIllustrationsFailed(
                self.results.len(),
            ))
        })
    }

    /// Number of failed requests.
    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_err()).count()
    }

    /// Summary of the batch. An empty batch counts as failed.
    pub fn outcome(&self) -> BatchOutcome {
        let failed = self.failure_count();
        let succeeded = self.results.len() - failed;
        match (succeeded, failed) {
            (0, _) => BatchOutcome::Failed,
            (_, 0) => BatchOutcome::Complete,
            (succeeded, failed) => BatchOutcome::Partial { succeeded, failed },
        }
    }
}

/// A persisted chapter and its illustrations.
#[derive(Debug, Clone)]
pub struct ChapterOutcome {
    /// Stored chapter, with its canonical illustration set when one succeeded
    pub chapter: Chapter,
    /// Every illustration attempt
    pub batch: IllustrationBatch,
}

/// Writes chapters and illustrates them.
pub struct ChapterPipeline {
    text: Arc<TextChain>,
    references: Arc<ReferencePipeline>,
    store: Arc<dyn ContentStore>,
}

impl std::fmt::Debug for ChapterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChapterPipeline")
            .field("text", &self.text)
            .field("references", &self.references)
            .finish_non_exhaustive()
    }
}

impl ChapterPipeline {
    /// Creates a pipeline.
    pub fn new(
        text: Arc<TextChain>,
        references: Arc<ReferencePipeline>,
        store: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            text,
            references,
            store,
        }
    }

    /// Generates the next chapter's text.
    #[instrument(skip_all, fields(book = %book.id(), prior = prior.len()))]
    pub async fn generate_chapter(
        &self,
        book: &Book,
        characters: &[Character],
        prior: &[Chapter],
        hint: &str,
        target_words: usize,
    ) -> Result<GeneratedChapter, AggregateError> {
        let roster = roster(characters);
        let request = TextRequest::new(
            prompts::chapter_system_prompt(),
            prompts::chapter_prompt(book, &roster, prior, hint, target_words),
        )
        .with_temperature(0.8)
        .with_max_tokens(max_tokens_for(target_words));

        let raw = self.text.generate_text(&request).await?;
        let chapter = parse_chapter(&raw, prior.len());

        info!(
            number = chapter.number,
            words = chapter.word_count,
            "Generated chapter text"
        );
        Ok(chapter)
    }

    /// Picks `count` scene prompts for a chapter.
    ///
    /// A single scene reuses the marker scene. Several scenes come from one
    /// text call; anything missing is padded with the marker scene.
    #[instrument(skip(self, content, characters, marker_scene))]
    pub async fn derive_scene_prompts(
        &self,
        content: &str,
        characters: &[Character],
        marker_scene: &str,
        count: usize,
    ) -> Vec<String> {
        if count <= 1 {
            return vec![marker_scene.to_string(); count];
        }

        let request =
            TextRequest::prompt_only(prompts::scene_list_prompt(content, &roster(characters), count))
                .with_temperature(0.7);

        let scenes = match self.text.generate_text(&request).await {
            Ok(answer) => parse_scene_list(&answer),
            Err(e) => {
                warn!(error = %e, "Scene selection failed, reusing marker scene");
                Vec::new()
            }
        };

        pad_scenes(scenes, marker_scene, count)
    }

    /// Generates one illustration per requested scene, all concurrently.
    ///
    /// Scenes are the chapter's stored prompts, cycled if there are fewer
    /// than `count`. Each result is independent of the others.
    #[instrument(skip(self, book, chapter, characters), fields(chapter = %chapter.id()))]
    pub async fn generate_illustrations(
        &self,
        book: &Book,
        chapter: &Chapter,
        characters: &[Character],
        count: usize,
    ) -> IllustrationBatch {
        let prompts = chapter.illustration_prompts();
        let scenes: Vec<&str> = (0..count)
            .map(|i| {
                prompts
                    .get(i % prompts.len().max(1))
                    .map(String::as_str)
                    .unwrap_or(FALLBACK_SCENE)
            })
            .collect();

        let requests = scenes.iter().map(|scene| {
            self.references
                .generate_scene_with_references(scene, characters, book.title())
        });
        let results = join_all(requests).await;

        for (index, result) in results.iter().enumerate() {
            if let Err(e) = result {
                warn!(index, error = %e, "Illustration failed");
            }
        }

        let batch = IllustrationBatch::new(results);
        info!(outcome = ?batch.outcome(), requested = count, "Illustration batch finished");
        batch
    }

    /// Writes, stores and illustrates the next chapter of a book.
    #[instrument(skip(self, hint, settings), fields(book = %book_id))]
    pub async fn write_chapter(
        &self,
        book_id: BookId,
        hint: &str,
        settings: &UserSettings,
    ) -> StorybotResult<ChapterOutcome> {
        let book = self
            .store
            .get_book(book_id)
            .await?
            .ok_or_else(|| StoreError::not_found("book", book_id))?;
        let characters = self.store.get_book_characters(book_id).await?;
        let prior = self.store.get_book_chapters(book_id).await?;

        let generated = self
            .generate_chapter(&book, &characters, &prior, hint, settings.chapter_words())
            .await?;
        let scenes = self
            .derive_scene_prompts(
                &generated.content,
                &characters,
                &generated.scene,
                settings.illustrations(),
            )
            .await;

        let new_chapter = NewChapter {
            book_id,
            number: generated.number,
            title: generated.title.clone(),
            content: generated.content.clone(),
            illustration_prompts: scenes,
            word_count: generated.word_count,
        };
        let chapter_id = self.store.create_chapter(new_chapter.clone()).await?;
        let mut chapter = Chapter::from_new(chapter_id, new_chapter);

        let batch = self
            .generate_illustrations(&book, &chapter, &characters, settings.illustrations())
            .await;

        match batch.canonical() {
            Ok(first) => {
                self.store
                    .update_chapter_illustration(chapter_id, first.clone())
                    .await?;
                chapter.set_illustration(first.clone());
            }
            Err(e) => warn!(chapter = %chapter_id, error = %e, "Chapter stored without illustration"),
        }

        debug!(chapter = %chapter_id, "Chapter stored");
        Ok(ChapterOutcome { chapter, batch })
    }
}

/// `(name, description)` pairs for prompts.
pub fn roster(characters: &[Character]) -> Vec<(String, String)> {
    characters
        .iter()
        .map(|c| (c.name().clone(), c.prompt_description()))
        .collect()
}

/// Splits raw model output into the chapter body and its illustration scene.
///
/// `existing` is the number of chapters already in the book.
pub fn parse_chapter(raw: &str, existing: usize) -> GeneratedChapter {
    let scene = MARKER
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_SCENE.to_string());

    let content = strip_markers(raw);
    let word_count = content.split_whitespace().count();
    let number = u32::try_from(existing + 1).unwrap_or(u32::MAX);

    GeneratedChapter {
        number,
        title: format!("Chapter {}", number),
        content,
        scene,
        word_count,
    }
}

/// Removes every illustration marker and the blank lines they leave behind.
pub fn strip_markers(raw: &str) -> String {
    let without = MARKER.replace_all(raw, "");
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = true;
    for line in without.lines() {
        let line = line.trim_end();
        let blank = line.trim().is_empty();
        if blank && previous_blank {
            continue;
        }
        lines.push(line);
        previous_blank = blank;
    }
    lines.join("\n").trim().to_string()
}

fn max_tokens_for(target_words: usize) -> u32 {
    u32::try_from(target_words.saturating_mul(3))
        .unwrap_or(u32::MAX)
        .max(1500)
}

/// Extracts a JSON string array from a model answer, tolerating prose around it.
pub fn parse_scene_list(answer: &str) -> Vec<String> {
    let (Some(start), Some(end)) = (answer.find('['), answer.rfind(']')) else {
        return Vec::new();
    };
    if end <= start {
        return Vec::new();
    }
    serde_json::from_str::<Vec<String>>(&answer[start..=end])
        .map(|scenes| {
            scenes
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn pad_scenes(mut scenes: Vec<String>, fallback: &str, count: usize) -> Vec<String> {
    scenes.truncate(count);
    while scenes.len() < count {
        scenes.push(fallback.to_string());
    }
    scenes
}
