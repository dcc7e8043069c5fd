//! Wiring of chains and pipelines into the production job runner.

use crate::{
    CachingTranslator, ChapterPipeline, FallbackChain, GenerationSettings, ImageChain, JobInput,
    JobOutput, JobRunner, ReferencePipeline, TextChain,
};
use async_trait::async_trait;
use std::sync::Arc;
use storybot_error::{StoreError, StorybotResult};
use storybot_interface::{ContentStore, ImageProvider, TextProvider};
use storybot_storage::IllustrationArchive;
use tracing::{info, instrument};

/// Every generation capability the conversation layer needs.
#[derive(Clone)]
pub struct GenerationServices {
    settings: GenerationSettings,
    text: Arc<TextChain>,
    images: Arc<ImageChain>,
    translator: CachingTranslator,
    references: Arc<ReferencePipeline>,
    chapters: Arc<ChapterPipeline>,
    store: Arc<dyn ContentStore>,
}

impl std::fmt::Debug for GenerationServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationServices")
            .field("settings", &self.settings)
            .field("text", &self.text)
            .field("images", &self.images)
            .field("translator", &self.translator)
            .finish_non_exhaustive()
    }
}

impl GenerationServices {
    /// Builds chains and pipelines from ordered provider lists.
    pub fn new(
        settings: GenerationSettings,
        text_providers: Vec<Arc<dyn TextProvider>>,
        image_providers: Vec<Arc<dyn ImageProvider>>,
        store: Arc<dyn ContentStore>,
        archive: IllustrationArchive,
    ) -> Self {
        let text = Arc::new(FallbackChain::text(
            text_providers,
            *settings.provider_timeout(),
        ));
        let images = Arc::new(FallbackChain::image(
            image_providers,
            *settings.provider_timeout(),
        ));

        let translator = if *settings.translate() {
            CachingTranslator::new(Arc::clone(&text), settings.working_language().clone())
        } else {
            CachingTranslator::disabled()
        };

        let references = Arc::new(ReferencePipeline::new(
            Arc::clone(&images),
            translator.clone(),
            archive,
            *settings.reference_max_edge(),
        ));
        let chapters = Arc::new(ChapterPipeline::new(
            Arc::clone(&text),
            Arc::clone(&references),
            Arc::clone(&store),
        ));

        info!(
            text_providers = ?text.provider_names(),
            image_providers = ?images.provider_names(),
            translate = *settings.translate(),
            "Generation services ready"
        );

        Self {
            settings,
            text,
            images,
            translator,
            references,
            chapters,
            store,
        }
    }

    /// Generation tunables.
    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Text fallback chain.
    pub fn text(&self) -> &Arc<TextChain> {
        &self.text
    }

    /// Image fallback chain.
    pub fn images(&self) -> &Arc<ImageChain> {
        &self.images
    }

    /// Shared prompt translator.
    pub fn translator(&self) -> &CachingTranslator {
        &self.translator
    }

    /// Reference consistency pipeline.
    pub fn references(&self) -> &Arc<ReferencePipeline> {
        &self.references
    }

    /// Chapter and illustration pipeline.
    pub fn chapters(&self) -> &Arc<ChapterPipeline> {
        &self.chapters
    }
}

#[async_trait]
impl JobRunner for GenerationServices {
    #[instrument(skip_all, fields(kind = %input.kind()))]
    async fn run(&self, input: JobInput) -> StorybotResult<JobOutput> {
        match input {
            JobInput::CharacterReference { name, description } => {
                let reference = self
                    .references
                    .generate_reference(&name, &description)
                    .await?;
                Ok(JobOutput::Reference(reference))
            }
            JobInput::ChapterText {
                book_id,
                hint,
                target_words,
            } => {
                let book = self
                    .store
                    .get_book(book_id)
                    .await?
                    .ok_or_else(|| StoreError::not_found("book", book_id))?;
                let characters = self.store.get_book_characters(book_id).await?;
                let prior = self.store.get_book_chapters(book_id).await?;
                let chapter = self
                    .chapters
                    .generate_chapter(&book, &characters, &prior, &hint, target_words)
                    .await?;
                Ok(JobOutput::Chapter(chapter))
            }
            JobInput::Illustration {
                scene,
                title,
                characters,
            } => {
                let illustration = self
                    .references
                    .generate_scene_with_references(&scene, &characters, &title)
                    .await?;
                Ok(JobOutput::Illustration(illustration))
            }
        }
    }
}
