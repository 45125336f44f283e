//! # Function-backed provider (`ProviderFn`)
//!
//! [`ProviderFn`] wraps a closure `F: Fn(CancellationToken) -> Fut` used as the
//! provider's `run` hook; `load` and `unload` are no-ops. Each `run` call creates
//! a fresh future, so there is no hidden state between runs; share state through
//! an explicit `Arc<...>` captured by the closure.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use provisor::{ProviderError, ProviderFn, ProviderRef};
//!
//! let p: ProviderRef = ProviderFn::arc(|ctx: CancellationToken| async move {
//!     ctx.cancelled().await;
//!     Ok::<_, ProviderError>(())
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::providers::provider::Provider;

/// Function-backed provider implementation.
#[derive(Debug)]
pub struct ProviderFn<F> {
    f: F,
}

impl<F> ProviderFn<F> {
    /// Creates a new function-backed provider.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the provider and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Provider for ProviderFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ProviderError>> + Send + 'static,
{
    async fn run(&self, ctx: CancellationToken) -> Result<(), ProviderError> {
        (self.f)(ctx).await
    }
}
