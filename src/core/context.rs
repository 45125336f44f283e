//! # Application context handed to providers.
//!
//! [`AppContext`] is what a provider sees of the application during `load`:
//! identity, configuration, environment, the broker, and a way to spawn
//! tracked background work or request shutdown. It holds the application
//! weakly, so a provider keeping its context does not keep the application alive.

use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Weak};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broker::{Broker, Message};
use crate::core::application::Application;
use crate::core::config::AppConfig;
use crate::error::ProviderError;

/// Cloneable view of the running application.
#[derive(Clone)]
pub struct AppContext {
    app: Weak<Application>,
    cfg: Arc<AppConfig>,
    broker: Broker<Message>,
}

impl AppContext {
    pub(crate) fn new(app: Weak<Application>, cfg: Arc<AppConfig>, broker: Broker<Message>) -> Self {
        Self { app, cfg, broker }
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    pub fn directory(&self) -> &Path {
        &self.cfg.directory
    }

    pub fn config(&self) -> &AppConfig {
        &self.cfg
    }

    /// Looks up an environment value.
    ///
    /// Process variables win over values loaded from the environment file.
    pub fn env(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .or_else(|| self.app.upgrade()?.loaded_env(key))
    }

    /// The application's channel broker.
    pub fn broker(&self) -> &Broker<Message> {
        &self.broker
    }

    /// Returns the application, unless it has been dropped.
    pub fn application(&self) -> Option<Arc<Application>> {
        self.app.upgrade()
    }

    /// Spawns tracked background work; shutdown waits for it.
    ///
    /// Errors are routed to [`Application::report_error`]. Returns `None` if
    /// the application is gone.
    pub fn spawn<F>(&self, fut: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = Result<(), ProviderError>> + Send + 'static,
    {
        self.app.upgrade().map(|app| app.spawn(fut))
    }

    /// Requests application shutdown with `code`.
    pub fn shutdown(&self, code: i32) {
        if let Some(app) = self.app.upgrade() {
            app.shutdown(code);
        }
    }

    /// Cancellation token of the current run, if running.
    pub fn cancellation(&self) -> Option<CancellationToken> {
        self.app.upgrade()?.cancellation()
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("name", &self.cfg.name)
            .field("directory", &self.cfg.directory)
            .finish()
    }
}
