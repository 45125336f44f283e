//! # Provider contract.
//!
//! A provider is loaded once with the application context, then runs until it
//! finishes or observes cancellation, then is unloaded. The runtime calls exactly
//! these three hooks and observes their outcomes.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::AppContext;
use crate::error::ProviderError;

/// # Pluggable unit of application functionality.
///
/// `load` and `unload` default to no-ops. `run` receives the cancellation token
/// shared by every provider of the current run; cancellation is cooperative, so
/// implementations must observe it and return.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use provisor::{Provider, ProviderError};
///
/// struct Ticker;
///
/// #[async_trait]
/// impl Provider for Ticker {
///     async fn run(&self, ctx: CancellationToken) -> Result<(), ProviderError> {
///         ctx.cancelled().await;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Prepares the provider. Called once per instance, before `run`.
    async fn load(&self, _app: &AppContext) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Runs until completion or cancellation.
    async fn run(&self, ctx: CancellationToken) -> Result<(), ProviderError>;

    /// Releases what `load` acquired. Called once, after `run` (if it ran at all).
    async fn unload(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Shared handle to a provider instance.
pub type ProviderRef = Arc<dyn Provider>;
