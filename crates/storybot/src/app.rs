//! Assembles the stores, pipelines and conversation layer.

use crate::config::StorybotConfig;
use crate::providers::ProviderSet;
use std::sync::Arc;
use storybot_error::StorybotResult;
use storybot_generation::{GenerationCoordinator, GenerationServices, JobRunner};
use storybot_interface::{ContentStore, ImageProvider, MessagingGateway, TextProvider};
use storybot_session::{Dispatcher, SessionMachine, SessionStore};
use storybot_storage::{IllustrationArchive, InMemoryContentStore};
use tokio::task::JoinHandle;
use tracing::info;

/// A fully wired bot.
#[derive(Debug)]
pub struct StoryBot {
    config: StorybotConfig,
    services: GenerationServices,
    dispatcher: Dispatcher,
}

impl StoryBot {
    /// Wires the configured providers with an in-memory content store.
    pub fn from_config(
        config: StorybotConfig,
        gateway: Arc<dyn MessagingGateway>,
    ) -> StorybotResult<Self> {
        let providers = ProviderSet::from_config(config.providers(), config.chains())?;
        Self::with_providers(
            config,
            providers.text,
            providers.image,
            Arc::new(InMemoryContentStore::new()),
            gateway,
        )
    }

    /// Wires explicit providers and store.
    pub fn with_providers(
        config: StorybotConfig,
        text: Vec<Arc<dyn TextProvider>>,
        image: Vec<Arc<dyn ImageProvider>>,
        store: Arc<dyn ContentStore>,
        gateway: Arc<dyn MessagingGateway>,
    ) -> StorybotResult<Self> {
        let generation = config.generation();
        let user_defaults = generation.user_settings()?;
        let settings = generation.settings();

        let services = GenerationServices::new(
            settings.clone(),
            text,
            image,
            Arc::clone(&store),
            IllustrationArchive::new(generation.illustration_dir().clone()),
        );
        let coordinator = GenerationCoordinator::new(
            Arc::new(services.clone()) as Arc<dyn JobRunner>,
            *settings.job_timeout(),
        );

        let machine = SessionMachine::new(store, coordinator, Arc::clone(services.chapters()))
            .with_rules(*config.validation())
            .with_keywords(config.keywords().clone())
            .with_default_settings(user_defaults);
        let sessions =
            SessionStore::new(config.session().idle_timeout()).with_defaults(user_defaults);
        let dispatcher = Dispatcher::new(Arc::new(sessions), Arc::new(machine), gateway);

        info!(
            illustration_dir = %generation.illustration_dir().display(),
            idle_timeout_secs = config.session().idle_timeout().as_secs(),
            "StoryBot assembled"
        );

        Ok(Self {
            config,
            services,
            dispatcher,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &StorybotConfig {
        &self.config
    }

    /// Generation services shared by every session.
    pub fn services(&self) -> &GenerationServices {
        &self.services
    }

    /// Entry point for inbound turns.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Starts the periodic sweep of idle sessions.
    pub fn spawn_eviction(&self) -> JoinHandle<()> {
        self.dispatcher
            .spawn_eviction(self.config.session().eviction_interval())
    }
}
