//! # provisor
//!
//! **Provisor** is an application-lifecycle host for async Rust services.
//!
//! It boots an application, loads pluggable **providers**, runs them
//! concurrently under one shared cancellation token and tears them down on
//! shutdown under an escalating watchdog. A channel **broker** gives providers
//! back-pressured, multi-channel publish/subscribe inside the process.
//!
//! ## Architecture
//! ```text
//!   ProviderCatalog            Discovery            EnvLoader
//!   (id → factory)        (ids by namespace)     (<dir>/.env)
//!          └───────────────────────┼────────────────────┘
//!                                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Application (lifecycle orchestrator)                             │
//! │  - Registry   (registered ids, loaded providers)                  │
//! │  - Broker     (named channels → suppliers)                        │
//! │  - TaskTracker (outstanding work: provider runs, spawned work)    │
//! │  - Bus        (lifecycle events)                                  │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   provider.run(token) provider.run(token) provider.run(token)
//!        │                  │                  │
//!        └─ Err(Fail/Exit) ─┴── report_error ──┴──► shutdown(code)
//!
//! shutdown(code) ─► cancel token ─► release broker ─► watchdog
//!     watchdog: every 100ms
//!       ├─ no outstanding work      ─► terminate(code)
//!       ├─ > 3s                     ─► warn, name stuck providers
//!       ├─ > 13s                    ─► warn, termination pending
//!       └─ next tick                ─► terminate(code or -1)
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                         |
//! |-------------------|---------------------------------------------------------------|--------------------------------------------|
//! | **Lifecycle**     | init / run / reset / shutdown with a shutdown watchdog.       | [`Application`], [`AppConfig`]             |
//! | **Providers**     | Pluggable units with load / run / unload hooks.               | [`Provider`], [`ProviderFn`], [`Registry`] |
//! | **Catalog**       | Provider identifiers mapped to factories.                     | [`ProviderCatalog`], [`ProviderKind`]      |
//! | **Broker**        | Named channels with one bounded queue per supplier.           | [`Broker`], [`Supplier`]                   |
//! | **Subscriber API**| Hook into lifecycle events.                                   | [`Subscribe`], [`Event`]                   |
//! | **Collaborators** | Replaceable environment, discovery and termination seams.     | [`EnvLoader`], [`Discovery`], [`Terminate`]|
//! | **Errors**        | Typed errors for registry, providers, broker and runtime.     | [`RegistryError`], [`RuntimeError`]        |
//!
//! ## Example
//! ```rust,no_run
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use provisor::{AppConfig, Application, ProviderCatalog, ProviderError, ProviderFn};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     provisor::init_logging("info");
//!
//!     let catalog = ProviderCatalog::new().with("providers::Heartbeat", || {
//!         ProviderFn::new(|ctx: CancellationToken| async move {
//!             while !ctx.is_cancelled() {
//!                 tokio::time::sleep(Duration::from_secs(1)).await;
//!             }
//!             Ok::<_, ProviderError>(())
//!         })
//!     });
//!
//!     let app = Application::builder(AppConfig::named("heartbeat"))
//!         .with_catalog(catalog)
//!         .build();
//!
//!     app.run().await?;
//!     app.terminated().await;
//!     Ok(())
//! }
//! ```
mod broker;
mod collaborators;
mod core;
mod error;
mod events;
mod logging;
mod providers;
mod release;
mod subscribers;

// ---- Public re-exports ----

pub use broker::{Broker, BrokerConfig, DEFAULT_CHANNEL, Message, Supplier};
pub use collaborators::{
    Discovery, DotenvLoader, EnvLoader, EnvVars, ProcessExit, StaticDiscovery, Terminate, parse_env,
};
pub use core::{AppConfig, AppContext, AppState, Application, ApplicationBuilder};
pub use error::{BrokerError, DiscoveryError, EnvError, ProviderError, RegistryError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use logging::{DEBUG_LEVEL_VAR, init_logging};
pub use providers::{Provider, ProviderCatalog, ProviderFn, ProviderKind, ProviderRef, Registry};
pub use release::Release;
pub use subscribers::{Subscribe, SubscriberSet};
