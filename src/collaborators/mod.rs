//! # External collaborators.
//!
//! The application talks to the outside world through three narrow seams,
//! each replaceable from the [`ApplicationBuilder`](crate::ApplicationBuilder):
//!
//! - [`EnvLoader`] reads environment configuration from the app directory;
//! - [`Discovery`] lists provider identifiers under a namespace;
//! - [`Terminate`] ends the process with an exit code.

mod discovery;
mod env;
mod terminate;

pub use discovery::{Discovery, StaticDiscovery};
pub use env::{DotenvLoader, EnvLoader, EnvVars, parse_env};
pub use terminate::{ProcessExit, Terminate};
