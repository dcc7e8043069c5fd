//! Tunables shared by the generation pipelines.

use derive_getters::Getters;
use std::time::Duration;
use typed_builder::TypedBuilder;

/// Time budgets and image limits for generation.
#[derive(Debug, Clone, Getters, TypedBuilder)]
pub struct GenerationSettings {
    /// Budget for a single provider attempt
    #[builder(default = Duration::from_secs(120))]
    provider_timeout: Duration,
    /// Budget for a background job, measured from launch
    #[builder(default = Duration::from_secs(300))]
    job_timeout: Duration,
    /// Longest edge of a stored reference image, in pixels
    #[builder(default = 512)]
    reference_max_edge: u32,
    /// Language image prompts are translated into
    #[builder(default = "English".to_string(), setter(into))]
    working_language: String,
    /// Whether prompts are translated at all
    #[builder(default = true)]
    translate: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}
