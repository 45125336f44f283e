//! Runtime core: lifecycle orchestration and shutdown.
//!
//! The public API of this module is [`Application`] (built with
//! [`ApplicationBuilder`]), its configuration [`AppConfig`] and the
//! [`AppContext`] handed to providers.
//!
//! Internal modules:
//! - [`runner`]: runs one provider and publishes its lifecycle events;
//! - [`watchdog`]: escalates a stalled shutdown up to forced termination;
//! - [`alive`]: tracks which providers are inside `run`;
//! - [`signals`]: cross-platform termination signal handling.

mod alive;
mod application;
mod builder;
mod config;
mod context;
mod runner;
mod signals;
mod watchdog;

pub use application::{AppState, Application};
pub use builder::ApplicationBuilder;
pub use config::AppConfig;
pub use context::AppContext;
