//! Generation for StoryBot.
//!
//! - [`FallbackChain`]: ordered provider fallback with per-attempt timeouts
//! - [`CachingTranslator`]: prompt translation with a shared cache
//! - [`ReferencePipeline`]: character reference portraits and scenes that reuse them
//! - [`ChapterPipeline`]: chapter text, scene selection and concurrent illustration
//! - [`GenerationCoordinator`]: non-blocking jobs joined at an explicit barrier

mod chapter;
mod coordinator;
mod fallback;
pub mod prompts;
mod reference;
mod services;
mod settings;
mod translate;

pub use chapter::{
    BatchOutcome, ChapterOutcome, ChapterPipeline, GeneratedChapter, IllustrationBatch,
    parse_chapter, parse_scene_list, roster, strip_markers,
};
pub use coordinator::{
    GenerationCoordinator, JobInput, JobKind, JobOutput, JobRegistry, JobResult, JobRunner,
    JobStatus, JobSummary,
};
pub use fallback::{
    ChainMember, FallbackChain, GeneratedImage, ImageChain, TextChain, detect_format,
};
pub use reference::{GeneratedReference, ReferencePipeline, downscale};
pub use services::GenerationServices;
pub use settings::GenerationSettings;
pub use translate::CachingTranslator;
