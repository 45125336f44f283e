//! # Registry: registered identifiers and loaded provider instances.
//!
//! The registry keeps two collections:
//! - **registered**: identifiers accepted from the catalog, in registration order;
//! - **loaded**: live provider instances, in load order.
//!
//! ## Concurrency
//! ```text
//! load(id) / unload(id) / reload(id)
//!   1. check preconditions (sync, before any await)
//!   2. take the per-id async lock
//!   3. re-check preconditions
//!   4. await the provider hook (no registry lock held)
//!   5. write the outcome under the state lock
//! ```
//!
//! Operations on different identifiers run concurrently; operations on the
//! same identifier are serialized.
//!
//! ## Precondition failures
//! `register`, `unregister` and `locate` are plain functions and fail on the
//! spot. `load`, `unload` and `reload` are `async fn`: their precondition
//! failures (`NotFound`, `AlreadyLoaded`, `NotLoaded`) are produced on the
//! first poll, before the per-id lock is taken and before any provider hook
//! runs. Use [`RegistryError::is_precondition`] to tell them apart from hook
//! failures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::core::AppContext;
use crate::error::RegistryError;
use crate::events::{Bus, Event, EventKind};
use crate::providers::catalog::ProviderCatalog;
use crate::providers::provider::ProviderRef;

#[derive(Default)]
struct State {
    registered: Vec<String>,
    loaded: Vec<(String, ProviderRef)>,
}

impl State {
    fn is_registered(&self, id: &str) -> bool {
        self.registered.iter().any(|r| r == id)
    }

    fn loaded_index(&self, id: &str) -> Option<usize> {
        self.loaded.iter().position(|(l, _)| l == id)
    }

    fn get(&self, id: &str) -> Option<ProviderRef> {
        self.loaded_index(id).map(|i| Arc::clone(&self.loaded[i].1))
    }
}

/// Tracks provider registration and loaded instances.
pub struct Registry {
    catalog: ProviderCatalog,
    ctx: AppContext,
    bus: Bus,
    state: RwLock<State>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Registry {
    pub(crate) fn new(catalog: ProviderCatalog, ctx: AppContext, bus: Bus) -> Self {
        Self {
            catalog,
            ctx,
            bus,
            state: RwLock::new(State::default()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn key_lock(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id.to_string()).or_default())
    }

    /// The catalog identifiers are checked against.
    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    /// Returns true if `id` is registered.
    pub fn is_registered(&self, id: &str) -> bool {
        self.read().is_registered(id)
    }

    /// Returns whether the registered provider `id` is loaded.
    pub fn is_loaded(&self, id: &str) -> Result<bool, RegistryError> {
        let state = self.read();
        if !state.is_registered(id) {
            return Err(RegistryError::NotFound { id: id.to_string() });
        }
        Ok(state.loaded_index(id).is_some())
    }

    /// Returns the loaded instance of `id`.
    pub fn get(&self, id: &str) -> Result<ProviderRef, RegistryError> {
        let state = self.read();
        if !state.is_registered(id) {
            return Err(RegistryError::NotFound { id: id.to_string() });
        }
        state
            .get(id)
            .ok_or_else(|| RegistryError::NotLoaded { id: id.to_string() })
    }

    /// Registered identifiers in registration order.
    pub fn registered(&self) -> Vec<String> {
        self.read().registered.clone()
    }

    /// Loaded providers in load order.
    pub fn loaded(&self) -> Vec<(String, ProviderRef)> {
        self.read().loaded.clone()
    }

    /// Registers `id`.
    pub fn register(&self, id: &str) -> Result<(), RegistryError> {
        if !self.catalog.contains(id) {
            return Err(RegistryError::InvalidProvider { id: id.to_string() });
        }
        {
            let mut state = self.write();
            if state.is_registered(id) {
                return Err(RegistryError::AlreadyRegistered { id: id.to_string() });
            }
            state.registered.push(id.to_string());
        }
        debug!(provider = id, "provider registered");
        self.bus
            .publish(Event::new(EventKind::ProviderRegistered).with_provider(id));
        Ok(())
    }

    /// Removes `id` from the registered set. The provider must not be loaded.
    ///
    /// A provider with a load or unload in flight counts as loaded.
    pub fn unregister(&self, id: &str) -> Result<(), RegistryError> {
        if !self.is_registered(id) {
            return Err(RegistryError::NotFound { id: id.to_string() });
        }
        let lock = self.key_lock(id);
        let Ok(_busy) = lock.try_lock() else {
            return Err(RegistryError::AlreadyLoaded { id: id.to_string() });
        };

        {
            let mut state = self.write();
            let Some(pos) = state.registered.iter().position(|r| r == id) else {
                return Err(RegistryError::NotFound { id: id.to_string() });
            };
            if state.loaded_index(id).is_some() {
                return Err(RegistryError::AlreadyLoaded { id: id.to_string() });
            }
            state.registered.remove(pos);
        }
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        debug!(provider = id, "provider unregistered");
        Ok(())
    }

    /// Registers every identifier that is in the catalog, not abstract and not
    /// yet registered. Returns how many were registered.
    pub fn locate<I, S>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut count = 0;
        for id in ids {
            let id = id.as_ref();
            if !self.catalog.contains(id) || self.catalog.is_abstract(id) || self.is_registered(id) {
                continue;
            }
            if self.register(id).is_ok() {
                count += 1;
            }
        }
        count
    }

    fn check_loadable(&self, id: &str) -> Result<(), RegistryError> {
        match self.is_loaded(id)? {
            true => Err(RegistryError::AlreadyLoaded { id: id.to_string() }),
            false => Ok(()),
        }
    }

    fn check_unloadable(&self, id: &str) -> Result<(), RegistryError> {
        match self.is_loaded(id)? {
            true => Ok(()),
            false => Err(RegistryError::NotLoaded { id: id.to_string() }),
        }
    }

    /// Instantiates `id`, awaits its `load` hook and stores the instance.
    ///
    /// `NotFound` and `AlreadyLoaded` are returned on the first poll without
    /// instantiating anything.
    pub async fn load(&self, id: &str) -> Result<ProviderRef, RegistryError> {
        self.check_loadable(id)?;
        let lock = self.key_lock(id);
        let _guard = lock.lock().await;
        self.check_loadable(id)?;
        self.load_locked(id).await
    }

    async fn load_locked(&self, id: &str) -> Result<ProviderRef, RegistryError> {
        let provider = self
            .catalog
            .instantiate(id)
            .map_err(|reason| RegistryError::Instantiate {
                id: id.to_string(),
                reason,
            })?;

        provider
            .load(&self.ctx)
            .await
            .map_err(|source| RegistryError::Load {
                id: id.to_string(),
                source,
            })?;

        self.write()
            .loaded
            .push((id.to_string(), Arc::clone(&provider)));
        info!(provider = id, "provider loaded");
        self.bus
            .publish(Event::new(EventKind::ProviderLoaded).with_provider(id));
        Ok(provider)
    }

    /// Awaits the `unload` hook of `id`, then drops the instance.
    ///
    /// `NotFound` and `NotLoaded` are returned on the first poll without
    /// touching the provider.
    pub async fn unload(&self, id: &str) -> Result<(), RegistryError> {
        self.check_unloadable(id)?;
        let lock = self.key_lock(id);
        let _guard = lock.lock().await;
        self.check_unloadable(id)?;
        self.unload_locked(id).await
    }

    async fn unload_locked(&self, id: &str) -> Result<(), RegistryError> {
        let provider = self
            .read()
            .get(id)
            .ok_or_else(|| RegistryError::NotLoaded { id: id.to_string() })?;

        provider
            .unload()
            .await
            .map_err(|source| RegistryError::Unload {
                id: id.to_string(),
                source,
            })?;

        {
            let mut state = self.write();
            if let Some(pos) = state.loaded_index(id) {
                state.loaded.remove(pos);
            }
        }
        info!(provider = id, "provider unloaded");
        self.bus
            .publish(Event::new(EventKind::ProviderUnloaded).with_provider(id));
        Ok(())
    }

    /// Unloads `id` if loaded, then loads a fresh instance.
    pub async fn reload(&self, id: &str) -> Result<ProviderRef, RegistryError> {
        self.is_loaded(id)?;
        let lock = self.key_lock(id);
        let _guard = lock.lock().await;
        if self.is_loaded(id)? {
            self.unload_locked(id).await?;
        }
        self.load_locked(id).await
    }

    /// Loads every registered provider that is not loaded yet, in registration order.
    ///
    /// Stops at the first failure; providers loaded before it stay loaded.
    pub async fn load_all(&self) -> Result<Vec<ProviderRef>, RegistryError> {
        let mut loaded = Vec::new();
        for id in self.registered() {
            if self.is_loaded(&id)? {
                continue;
            }
            loaded.push(self.load(&id).await?);
        }
        Ok(loaded)
    }

    /// Unloads every loaded provider in load order.
    ///
    /// Stops at the first failure; the failed provider and the ones after it stay loaded.
    pub async fn unload_all(&self) -> Result<(), RegistryError> {
        let ids: Vec<String> = self.read().loaded.iter().map(|(id, _)| id.clone()).collect();
        for id in ids {
            self.unload(&id).await?;
        }
        Ok(())
    }

    /// Unloads, then loads, every provider.
    pub async fn reload_all(&self) -> Result<Vec<ProviderRef>, RegistryError> {
        self.unload_all().await?;
        self.load_all().await
    }
}
