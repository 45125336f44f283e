//! # Provider catalog: identifiers → factories.
//!
//! The catalog is the table of provider *types* the application knows about.
//! An identifier "satisfies the provider contract" when it is present in the
//! catalog. Entries are either [`ProviderKind::Concrete`] (a factory that
//! instantiates a fresh provider) or [`ProviderKind::Abstract`] (a known type
//! that cannot be instantiated, e.g. a shared base registered for discovery).
//!
//! Identifiers are `::`-separated paths (`"providers::http::Server"`); the
//! default discovery collaborator scans them by namespace prefix.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use provisor::{ProviderCatalog, ProviderError, ProviderFn};
//!
//! let catalog = ProviderCatalog::new()
//!     .with("providers::Ticker", || {
//!         ProviderFn::new(|ctx: CancellationToken| async move {
//!             ctx.cancelled().await;
//!             Ok::<_, ProviderError>(())
//!         })
//!     })
//!     .with_abstract("providers::Base");
//!
//! assert_eq!(catalog.declared(), vec!["providers::Ticker", "providers::Base"]);
//! assert!(catalog.is_abstract("providers::Base"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::providers::provider::{Provider, ProviderRef};

/// Factory producing a fresh provider instance, or a reason it could not.
pub type Factory = Arc<dyn Fn() -> Result<ProviderRef, String> + Send + Sync>;

/// Catalog entry.
#[derive(Clone)]
pub enum ProviderKind {
    /// Instantiable provider type.
    Concrete(Factory),
    /// Known type that cannot be instantiated.
    Abstract,
}

impl fmt::Debug for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Concrete(_) => f.write_str("Concrete"),
            ProviderKind::Abstract => f.write_str("Abstract"),
        }
    }
}

/// Table of known provider types, in declaration order.
#[derive(Clone, Default, Debug)]
pub struct ProviderCatalog {
    order: Vec<String>,
    kinds: HashMap<String, ProviderKind>,
}

impl ProviderCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a concrete provider type built by an infallible constructor.
    pub fn with<F, P>(self, id: impl Into<String>, make: F) -> Self
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: Provider,
    {
        self.with_factory(id, move || Ok(Arc::new(make()) as ProviderRef))
    }

    /// Adds a concrete provider type whose construction may fail.
    pub fn with_factory<F>(mut self, id: impl Into<String>, make: F) -> Self
    where
        F: Fn() -> Result<ProviderRef, String> + Send + Sync + 'static,
    {
        self.insert(id, ProviderKind::Concrete(Arc::new(make)));
        self
    }

    /// Adds an abstract (non-instantiable) provider type.
    pub fn with_abstract(mut self, id: impl Into<String>) -> Self {
        self.insert(id, ProviderKind::Abstract);
        self
    }

    /// Inserts or replaces an entry; a replaced entry keeps its declaration position.
    pub fn insert(&mut self, id: impl Into<String>, kind: ProviderKind) {
        let id = id.into();
        if self.kinds.insert(id.clone(), kind).is_none() {
            self.order.push(id);
        }
    }

    /// Returns true if `id` satisfies the provider contract.
    pub fn contains(&self, id: &str) -> bool {
        self.kinds.contains_key(id)
    }

    /// Returns true if `id` is known but cannot be instantiated.
    pub fn is_abstract(&self, id: &str) -> bool {
        matches!(self.kinds.get(id), Some(ProviderKind::Abstract))
    }

    /// Returns every declared identifier in declaration order.
    pub fn declared(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Number of declared identifiers.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Instantiates a fresh provider for `id`.
    pub fn instantiate(&self, id: &str) -> Result<ProviderRef, String> {
        match self.kinds.get(id) {
            Some(ProviderKind::Concrete(make)) => make(),
            Some(ProviderKind::Abstract) => Err("abstract provider type".to_string()),
            None => Err("unknown provider type".to_string()),
        }
    }
}
