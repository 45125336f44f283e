//! # Provider discovery seam.
//!
//! During `init()` the application asks its [`Discovery`] for the provider
//! identifiers living under each configured namespace. Returned identifiers
//! are filtered through the catalog, so a discovery source may over-report.

use async_trait::async_trait;

use crate::error::DiscoveryError;
use crate::providers::ProviderCatalog;

/// Lists provider identifiers under a namespace.
#[async_trait]
pub trait Discovery: Send + Sync + 'static {
    /// Returns identifiers under `namespace`.
    ///
    /// With `recursive = false` only direct children are returned
    /// (`"ns::A"`, not `"ns::sub::B"`).
    async fn find(&self, namespace: &str, recursive: bool) -> Result<Vec<String>, DiscoveryError>;
}

/// Discovery over a fixed list of identifiers.
///
/// The default instance knows nothing; [`StaticDiscovery::from_catalog`] lists
/// every catalog entry.
#[derive(Clone, Debug, Default)]
pub struct StaticDiscovery {
    ids: Vec<String>,
}

impl StaticDiscovery {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_catalog(catalog: &ProviderCatalog) -> Self {
        Self::new(catalog.declared())
    }
}

/// Returns the part of `id` below `namespace`, if `id` lives under it.
fn relative<'a>(id: &'a str, namespace: &str) -> Option<&'a str> {
    if namespace.is_empty() {
        return Some(id);
    }
    id.strip_prefix(namespace)?.strip_prefix("::")
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn find(&self, namespace: &str, recursive: bool) -> Result<Vec<String>, DiscoveryError> {
        let found = self
            .ids
            .iter()
            .filter(|id| match relative(id, namespace) {
                Some(rest) => recursive || !rest.contains("::"),
                None => false,
            })
            .cloned()
            .collect();
        Ok(found)
    }
}
