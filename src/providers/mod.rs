//! Providers: the contract, the type catalog and the registry.
//!
//! - [`Provider`] is the unit of application functionality (`load` → `run` → `unload`).
//! - [`ProviderFn`] is a function-backed provider for simple cases.
//! - [`ProviderCatalog`] maps provider identifiers to factories.
//! - [`Registry`] tracks which identifiers are registered and which are loaded.
//!
//! ## Record states
//! ```text
//!            register / locate            load
//! (absent) ──────────────────► REGISTERED ─────► LOADED
//!    ▲                             │   ▲            │
//!    └──────── unregister ─────────┘   └── unload ──┘
//! ```

mod catalog;
mod provider;
mod provider_fn;
mod registry;

pub use catalog::{ProviderCatalog, ProviderKind};
pub use provider::{Provider, ProviderRef};
pub use provider_fn::ProviderFn;
pub use registry::Registry;
