//! Character reference images and reference-guided illustrations.

use crate::prompts;
use crate::{CachingTranslator, ImageChain};
use image::ImageFormat;
use image::imageops::FilterType;
use std::io::Cursor;
use std::sync::Arc;
use storybot_core::{Character, IllustrationRef};
use storybot_error::{AggregateError, StorybotResult};
use storybot_interface::ImageRequest;
use storybot_storage::IllustrationArchive;
use tracing::{debug, info, instrument, warn};

/// A reference portrait ready to be attached to a character.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedReference {
    /// Downscaled image bytes
    pub image: Vec<u8>,
    /// Prompt that produced the image
    pub prompt: String,
}

/// Generates reference portraits and scenes that reuse them.
#[derive(Debug, Clone)]
pub struct ReferencePipeline {
    images: Arc<ImageChain>,
    translator: CachingTranslator,
    archive: IllustrationArchive,
    max_edge: u32,
}

impl ReferencePipeline {
    /// Creates a pipeline.
    pub fn new(
        images: Arc<ImageChain>,
        translator: CachingTranslator,
        archive: IllustrationArchive,
        max_edge: u32,
    ) -> Self {
        Self {
            images,
            translator,
            archive,
            max_edge,
        }
    }

    /// Generates a standalone portrait for a character.
    #[instrument(skip(self, description), fields(character = %name))]
    pub async fn generate_reference(
        &self,
        name: &str,
        description: &str,
    ) -> Result<GeneratedReference, AggregateError> {
        let description = self.translator.translate(description).await;
        let prompt = prompts::reference_portrait_prompt(name, &description);

        let generated = self.images.generate_image(&ImageRequest::new(prompt.clone())).await?;
        let image = downscale(&generated.bytes, self.max_edge);

        info!(
            provider = %generated.provider,
            original_bytes = generated.bytes.len(),
            stored_bytes = image.len(),
            "Generated character reference"
        );

        Ok(GeneratedReference { image, prompt })
    }

    /// Illustrates a scene, attaching every available character reference.
    ///
    /// Only providers that honour reference images receive the reference-guided
    /// request. Falls back to [`Self::generate_illustration_legacy`] when no
    /// character has a reference, no provider accepts references, or every
    /// reference-guided attempt fails.
    #[instrument(skip(self, scene, characters), fields(characters = characters.len()))]
    pub async fn generate_scene_with_references(
        &self,
        scene: &str,
        characters: &[Character],
        title: &str,
    ) -> StorybotResult<IllustrationRef> {
        let (referenced, others): (Vec<&Character>, Vec<&Character>) =
            characters.iter().partition(|c| c.has_reference());

        if referenced.is_empty() {
            debug!("No character references, using prompt-only illustration");
            return self.generate_illustration_legacy(scene, characters, title).await;
        }

        let capable = self.images.reference_capable();
        if capable.is_empty() {
            debug!("No provider accepts references, using prompt-only illustration");
            return self.generate_illustration_legacy(scene, characters, title).await;
        }

        let translated_scene = self.translator.translate(scene).await;
        let translated_title = self.translator.translate(title).await;
        let names: Vec<&str> = referenced.iter().map(|c| c.name().as_str()).collect();
        let other_roster = self.translated_roster(&others).await;
        let prompt = prompts::scene_with_references_prompt(
            &translated_scene,
            &names,
            &other_roster,
            &translated_title,
        );

        let images: Vec<Vec<u8>> = referenced
            .iter()
            .filter_map(|c| c.reference_image().clone())
            .collect();
        let request = ImageRequest::new(prompt).with_references(images);

        match capable.generate_image(&request).await {
            Ok(generated) => {
                info!(
                    provider = %generated.provider,
                    references = names.len(),
                    "Generated reference-guided illustration"
                );
                Ok(self
                    .archive
                    .store(&generated.bytes, generated.extension())
                    .await?)
            }
            Err(e) => {
                warn!(error = %e, "Reference-guided illustration failed, falling back to prompt-only");
                self.generate_illustration_legacy(scene, characters, title).await
            }
        }
    }

    /// Illustrates a scene from the prompt alone, describing characters inline.
    #[instrument(skip(self, scene, characters), fields(characters = characters.len()))]
    pub async fn generate_illustration_legacy(
        &self,
        scene: &str,
        characters: &[Character],
        title: &str,
    ) -> StorybotResult<IllustrationRef> {
        let translated_scene = self.translator.translate(scene).await;
        let translated_title = self.translator.translate(title).await;
        let all: Vec<&Character> = characters.iter().collect();
        let roster = self.translated_roster(&all).await;
        let prompt =
            prompts::legacy_illustration_prompt(&translated_scene, &roster, &translated_title);

        let generated = self.images.generate_image(&ImageRequest::new(prompt)).await?;
        debug!(provider = %generated.provider, "Generated prompt-only illustration");
        Ok(self
            .archive
            .store(&generated.bytes, generated.extension())
            .await?)
    }

    async fn translated_roster(&self, characters: &[&Character]) -> Vec<(String, String)> {
        let mut roster = Vec::with_capacity(characters.len());
        for character in characters {
            let description = self
                .translator
                .translate(&character.prompt_description())
                .await;
            roster.push((character.name().clone(), description));
        }
        roster
    }
}

/// Shrinks an image so its longer edge is at most `max_edge`, re-encoding as PNG.
///
/// Images that already fit are returned untouched, as are bytes that cannot
/// be decoded or re-encoded.
pub fn downscale(bytes: &[u8], max_edge: u32) -> Vec<u8> {
    let decoded = match image::load_from_memory(bytes) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(error = %e, "Could not decode reference image, keeping original");
            return bytes.to_vec();
        }
    };

    if decoded.width() <= max_edge && decoded.height() <= max_edge {
        return bytes.to_vec();
    }

    let resized = decoded.resize(max_edge, max_edge, FilterType::Lanczos3);
    let mut out = Cursor::new(Vec::new());
    match resized.write_to(&mut out, ImageFormat::Png) {
        Ok(()) => {
            debug!(
                from = %format!("{}x{}", decoded.width(), decoded.height()),
                to = %format!("{}x{}", resized.width(), resized.height()),
                "Downscaled reference image"
            );
            out.into_inner()
        }
        Err(e) => {
            warn!(error = %e, "Could not re-encode reference image, keeping original");
            bytes.to_vec()
        }
    }
}
