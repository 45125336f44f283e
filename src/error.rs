//! Error types used by the provisor runtime, its registry, broker and providers.
//!
//! This module defines the error enums surfaced by the public API:
//!
//! - [`RegistryError`]: registry precondition violations and provider load/unload failures.
//! - [`ProviderError`]: errors returned by provider hooks (`load`, `run`, `unload`).
//! - [`BrokerError`]: errors raised by the channel broker and its suppliers.
//! - [`RuntimeError`]: errors raised by the lifecycle orchestrator itself.
//! - [`DiscoveryError`], [`EnvError`]: failures of external collaborators.
//!
//! The four enums provide `as_label` for logs/metrics.

use std::path::PathBuf;

use thiserror::Error;

/// # Errors produced by the lifecycle orchestrator.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown was already requested; the application no longer accepts lifecycle calls.
    #[error("application shutdown is pending")]
    PendingShutdown,

    /// A registry operation failed during a lifecycle transition.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Provider discovery failed during initialization.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use provisor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::PendingShutdown.as_label(), "runtime_pending_shutdown");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::PendingShutdown => "runtime_pending_shutdown",
            RuntimeError::Registry(e) => e.as_label(),
            RuntimeError::Discovery(_) => "runtime_discovery_failed",
        }
    }
}

/// # Errors produced by the provider registry.
///
/// Two families share this enum:
/// - **precondition failures** (`InvalidProvider`, `NotFound`, `AlreadyRegistered`,
///   `AlreadyLoaded`, `NotLoaded`) are detected before any provider code runs;
/// - **provider failures** (`Instantiate`, `Load`, `Unload`) happen after the
///   provider's own asynchronous work has started.
///
/// Use [`RegistryError::is_precondition`] to branch between them.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The identifier does not name a provider in the catalog.
    #[error("invalid provider: {id}")]
    InvalidProvider { id: String },

    /// The identifier is not registered.
    #[error("provider not found: {id}")]
    NotFound { id: String },

    /// The identifier is already registered.
    #[error("provider already registered: {id}")]
    AlreadyRegistered { id: String },

    /// The provider is already loaded.
    #[error("provider already loaded: {id}")]
    AlreadyLoaded { id: String },

    /// The provider is not loaded.
    #[error("provider not loaded: {id}")]
    NotLoaded { id: String },

    /// The provider could not be instantiated.
    #[error("provider {id} cannot be instantiated: {reason}")]
    Instantiate { id: String, reason: String },

    /// The provider's `load` hook failed.
    #[error("provider {id} failed to load: {source}")]
    Load {
        id: String,
        #[source]
        source: ProviderError,
    },

    /// The provider's `unload` hook failed.
    #[error("provider {id} failed to unload: {source}")]
    Unload {
        id: String,
        #[source]
        source: ProviderError,
    },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::InvalidProvider { .. } => "provider_invalid",
            RegistryError::NotFound { .. } => "provider_not_found",
            RegistryError::AlreadyRegistered { .. } => "provider_already_registered",
            RegistryError::AlreadyLoaded { .. } => "provider_already_loaded",
            RegistryError::NotLoaded { .. } => "provider_not_loaded",
            RegistryError::Instantiate { .. } => "provider_instantiate_failed",
            RegistryError::Load { .. } => "provider_load_failed",
            RegistryError::Unload { .. } => "provider_unload_failed",
        }
    }

    /// Returns the provider identifier the error refers to.
    pub fn id(&self) -> &str {
        match self {
            RegistryError::InvalidProvider { id }
            | RegistryError::NotFound { id }
            | RegistryError::AlreadyRegistered { id }
            | RegistryError::AlreadyLoaded { id }
            | RegistryError::NotLoaded { id }
            | RegistryError::Instantiate { id, .. }
            | RegistryError::Load { id, .. }
            | RegistryError::Unload { id, .. } => id,
        }
    }

    /// Indicates whether this is a contract violation detected before any provider code ran.
    ///
    /// # Example
    /// ```
    /// use provisor::RegistryError;
    ///
    /// let err = RegistryError::NotFound { id: "db".into() };
    /// assert!(err.is_precondition());
    /// ```
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            RegistryError::InvalidProvider { .. }
                | RegistryError::NotFound { .. }
                | RegistryError::AlreadyRegistered { .. }
                | RegistryError::AlreadyLoaded { .. }
                | RegistryError::NotLoaded { .. }
        )
    }
}

/// # Errors produced by provider hooks.
///
/// `Fail` and `Exit` are *application errors*: when they reach the global error
/// handler the application shuts down with [`ProviderError::exit_code`].
/// A `Fail` carries no code of its own and always exits with **1**; return
/// `Exit { code: 0, .. }` to stop the application cleanly from a provider.
/// `Canceled` is a graceful stop. `Panicked` is produced by the runtime when a
/// tracked future panics; it is logged but never triggers shutdown.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Provider work failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Provider work failed and requests a specific process exit code.
    #[error("exit requested with code {code}: {error}")]
    Exit {
        /// Requested exit code.
        code: i32,
        /// The underlying error message.
        error: String,
    },

    /// Provider observed cancellation and stopped.
    #[error("context cancelled")]
    Canceled,

    /// Provider future panicked.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl ProviderError {
    /// Shorthand for [`ProviderError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        ProviderError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProviderError::Fail { .. } => "provider_failed",
            ProviderError::Exit { .. } => "provider_exit",
            ProviderError::Canceled => "provider_canceled",
            ProviderError::Panicked { .. } => "provider_panicked",
        }
    }

    /// Exit code to shut down with, if this is a recognized application error.
    ///
    /// `Fail` maps to 1 and `Exit` to its own code. `Canceled` and `Panicked`
    /// have none.
    ///
    /// # Example
    /// ```
    /// use provisor::ProviderError;
    ///
    /// assert_eq!(ProviderError::fail("boom").exit_code(), Some(1));
    /// assert_eq!(ProviderError::Canceled.exit_code(), None);
    /// ```
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProviderError::Fail { .. } => Some(1),
            ProviderError::Exit { code, .. } => Some(*code),
            ProviderError::Canceled | ProviderError::Panicked { .. } => None,
        }
    }
}

/// # Errors produced by the channel broker and its suppliers.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker or supplier was already released.
    #[error("{what} already released")]
    AlreadyReleased {
        /// Which instance was released (`"broker"` or `"supplier"`).
        what: &'static str,
    },

    /// Suppliers were still attached after the release drain gave up.
    #[error("{remaining} supplier(s) not released after {attempts} drain attempts")]
    StuckSuppliers {
        /// Suppliers still attached when the drain stopped polling.
        remaining: usize,
        /// Number of polls performed.
        attempts: u32,
    },
}

impl BrokerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BrokerError::AlreadyReleased { .. } => "broker_already_released",
            BrokerError::StuckSuppliers { .. } => "broker_stuck_suppliers",
        }
    }
}

/// Structured failure returned by a [`Discovery`](crate::Discovery) collaborator.
///
/// Mirrors the message/class/code triple an out-of-process scanner reports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("discovery failed ({class}, code {code}): {message}")]
pub struct DiscoveryError {
    pub message: String,
    pub class: String,
    pub code: i32,
}

/// Failure to load environment configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EnvError {
    /// No environment file at the expected location.
    #[error("environment file not found: {}", path.display())]
    Missing { path: PathBuf },

    /// The file exists but could not be read.
    #[error("failed to read environment file: {0}")]
    Io(#[from] std::io::Error),

    /// A line could not be parsed.
    #[error("invalid environment line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_exits_with_one_and_exit_carries_its_code() {
        assert_eq!(ProviderError::fail("boom").exit_code(), Some(1));
        let clean = ProviderError::Exit {
            code: 0,
            error: "done".into(),
        };
        assert_eq!(clean.exit_code(), Some(0));
        let panicked = ProviderError::Panicked { info: "x".into() };
        assert_eq!(panicked.exit_code(), None);
    }
}
