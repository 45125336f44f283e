use std::sync::Arc;

use crate::collaborators::{Discovery, DotenvLoader, EnvLoader, ProcessExit, StaticDiscovery, Terminate};
use crate::core::application::{Application, Parts};
use crate::core::config::AppConfig;
use crate::events::Bus;
use crate::providers::ProviderCatalog;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for an [`Application`] with replaceable collaborators.
///
/// Defaults: empty catalog, [`StaticDiscovery`] knowing nothing,
/// [`DotenvLoader`] reading `<directory>/.env`, [`ProcessExit`].
pub struct ApplicationBuilder {
    cfg: AppConfig,
    catalog: ProviderCatalog,
    discovery: Arc<dyn Discovery>,
    env_loader: Arc<dyn EnvLoader>,
    terminator: Arc<dyn Terminate>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ApplicationBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: AppConfig) -> Self {
        Self {
            cfg,
            catalog: ProviderCatalog::new(),
            discovery: Arc::new(StaticDiscovery::default()),
            env_loader: Arc::new(DotenvLoader::new()),
            terminator: Arc::new(ProcessExit),
            subscribers: Vec::new(),
        }
    }

    /// Sets the provider types the application can instantiate.
    pub fn with_catalog(mut self, catalog: ProviderCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_env_loader(mut self, loader: Arc<dyn EnvLoader>) -> Self {
        self.env_loader = loader;
        self
    }

    /// Replaces process exit, e.g. to observe the exit code in tests.
    pub fn with_terminator(mut self, terminator: Arc<dyn Terminate>) -> Self {
        self.terminator = terminator;
        self
    }

    /// Sets lifecycle event subscribers.
    ///
    /// Subscribers receive every lifecycle event through dedicated workers
    /// with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the application.
    ///
    /// Must be called within a tokio runtime: subscriber workers and the
    /// lifecycle listener are spawned here.
    pub fn build(self) -> Arc<Application> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());

        Application::from_parts(Parts {
            cfg: self.cfg,
            catalog: self.catalog,
            discovery: self.discovery,
            env_loader: self.env_loader,
            terminator: self.terminator,
            subs,
            bus,
        })
    }
}
