//! # Application: lifecycle orchestrator.
//!
//! The [`Application`] owns the provider [`Registry`], the channel broker,
//! the lifecycle event [`Bus`] and the tracker of outstanding work. It drives
//! providers through `init → run → (reset) → shutdown`.
//!
//! ## Lifecycle
//! ```text
//!                init()             run()
//! Uninitialized ───────► Initialized ─────► Running
//!                           ▲    │             │
//!                 reset()   │    │ shutdown()  │ all providers finished / error / signal
//!              (Resetting) ─┘    ▼             ▼
//!                           ShuttingDown ◄─────┘
//!                                │ watchdog
//!                                ▼
//!                            Terminated
//! ```
//!
//! ## Run fan-out
//! ```text
//! run()
//!   ├─ registry.load_all()                         (registration order)
//!   ├─ token = CancellationToken::new()
//!   ├─ for each loaded provider:  tracker.spawn(provider.run(token))
//!   │                               └─ Err(Fail/Exit) ─► report_error ─► shutdown(code)
//!   └─ joiner: await all ─► shutdown(0)           (skipped if a reset happened meanwhile)
//! ```
//!
//! ## Shutdown
//! `shutdown(code)` is idempotent: it cancels the run token, releases the
//! broker and starts the watchdog, which terminates through the injected
//! [`Terminate`] once no outstanding work is left, or forcefully after
//! `hooked_timeout_max`.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use futures::FutureExt;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::broker::{Broker, Message};
use crate::collaborators::{Discovery, EnvLoader, EnvVars, Terminate};
use crate::core::alive::AliveTracker;
use crate::core::builder::ApplicationBuilder;
use crate::core::config::AppConfig;
use crate::core::context::AppContext;
use crate::core::runner::run_provider;
use crate::core::signals;
use crate::core::watchdog::{Outcome, Watchdog};
use crate::error::{ProviderError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::providers::{ProviderCatalog, Registry};
use crate::release::Release;
use crate::subscribers::{SubscriberSet, panic_message};

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Uninitialized,
    Initialized,
    Running,
    Resetting,
    ShuttingDown,
    Terminated,
}

#[derive(Default)]
struct Lifecycle {
    initialized: bool,
    resetting: bool,
    running: Option<CancellationToken>,
    /// Bumped by every reset; a run joiner only shuts down its own generation.
    generation: u64,
}

/// Collaborators assembled by the builder.
pub(crate) struct Parts {
    pub cfg: AppConfig,
    pub catalog: ProviderCatalog,
    pub discovery: Arc<dyn Discovery>,
    pub env_loader: Arc<dyn EnvLoader>,
    pub terminator: Arc<dyn Terminate>,
    pub subs: SubscriberSet,
    pub bus: Bus,
}

/// Lifecycle orchestrator. See the [module docs](self).
pub struct Application {
    me: Weak<Application>,
    cfg: Arc<AppConfig>,
    ctx: AppContext,
    bus: Bus,
    registry: Registry,
    broker: Broker<Message>,
    discovery: Arc<dyn Discovery>,
    env_loader: Arc<dyn EnvLoader>,
    terminator: Arc<dyn Terminate>,
    alive: Arc<AliveTracker>,
    subs: Arc<SubscriberSet>,
    tracker: TaskTracker,
    env: RwLock<EnvVars>,
    lifecycle: Mutex<Lifecycle>,
    /// Serializes `run` and `reset` across their awaits.
    gate: tokio::sync::Mutex<()>,
    shutdown_pending: AtomicBool,
    exit: watch::Sender<Option<i32>>,
}

impl Application {
    /// Starts building an application.
    pub fn builder(cfg: AppConfig) -> ApplicationBuilder {
        ApplicationBuilder::new(cfg)
    }

    pub(crate) fn from_parts(parts: Parts) -> Arc<Self> {
        let cfg = Arc::new(parts.cfg);
        let broker: Broker<Message> = Broker::new(cfg.broker.clone());
        let (exit, _rx) = watch::channel(None);

        let app = Arc::new_cyclic(|me: &Weak<Application>| {
            let ctx = AppContext::new(me.clone(), Arc::clone(&cfg), broker.clone());
            Application {
                me: me.clone(),
                registry: Registry::new(parts.catalog, ctx.clone(), parts.bus.clone()),
                ctx,
                cfg,
                bus: parts.bus,
                broker,
                discovery: parts.discovery,
                env_loader: parts.env_loader,
                terminator: parts.terminator,
                alive: Arc::new(AliveTracker::new()),
                subs: Arc::new(parts.subs),
                tracker: TaskTracker::new(),
                env: RwLock::new(EnvVars::new()),
                lifecycle: Mutex::new(Lifecycle::default()),
                gate: tokio::sync::Mutex::new(()),
                shutdown_pending: AtomicBool::new(false),
                exit,
            }
        });
        app.spawn_listener();
        app
    }

    /// Feeds lifecycle events to the alive tracker and the subscriber set.
    ///
    /// Holds the application weakly and stops once it is dropped.
    fn spawn_listener(&self) {
        let mut rx = self.bus.subscribe();
        let me = self.me.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => {
                        let Some(app) = me.upgrade() else {
                            break;
                        };
                        app.alive.update(&ev).await;
                        app.subs.emit(&ev);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "lifecycle listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_active(&self) -> Result<(), RuntimeError> {
        if self.is_shutdown_pending() {
            return Err(RuntimeError::PendingShutdown);
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    pub fn config(&self) -> &AppConfig {
        &self.cfg
    }

    /// Context handed to providers.
    pub fn context(&self) -> AppContext {
        self.ctx.clone()
    }

    pub fn providers(&self) -> &Registry {
        &self.registry
    }

    pub fn broker(&self) -> &Broker<Message> {
        &self.broker
    }

    /// Receiver of subsequent lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    pub fn is_initialized(&self) -> bool {
        self.lifecycle().initialized
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle().running.is_some()
    }

    pub fn is_shutdown_pending(&self) -> bool {
        self.shutdown_pending.load(Ordering::Acquire)
    }

    pub fn state(&self) -> AppState {
        if self.exit.borrow().is_some() {
            return AppState::Terminated;
        }
        if self.is_shutdown_pending() {
            return AppState::ShuttingDown;
        }
        let lc = self.lifecycle();
        if lc.resetting {
            AppState::Resetting
        } else if lc.running.is_some() {
            AppState::Running
        } else if lc.initialized {
            AppState::Initialized
        } else {
            AppState::Uninitialized
        }
    }

    /// Cancellation token of the current run, if running.
    pub fn cancellation(&self) -> Option<CancellationToken> {
        self.lifecycle().running.clone()
    }

    pub(crate) fn loaded_env(&self, key: &str) -> Option<String> {
        self.env
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Environment values loaded during the last `init()`.
    pub fn env_vars(&self) -> EnvVars {
        self.env.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Prepares the application: loads environment configuration and registers
    /// every provider found in the catalog and through discovery.
    ///
    /// Does nothing if already initialized.
    pub async fn init(&self) -> Result<(), RuntimeError> {
        self.ensure_active()?;
        if self.is_initialized() {
            return Ok(());
        }
        debug!(app = %self.cfg.name, "initializing application");
        self.tracker.reopen();
        self.load_env().await;

        if self.cfg.locate_declared {
            let declared = self.registry.catalog().declared();
            self.registry.locate(&declared);
        }
        for namespace in self.cfg.namespaces() {
            let ids = self.discovery.find(namespace, true).await?;
            let found = self.registry.locate(&ids);
            debug!(namespace, found, "providers discovered");
        }

        self.lifecycle().initialized = true;
        info!(
            app = %self.cfg.name,
            providers = self.registry.registered().len(),
            "application initialized"
        );
        self.bus.publish(Event::new(EventKind::AppInitialized));
        Ok(())
    }

    async fn load_env(&self) {
        let vars = match self.env_loader.load(&self.cfg.directory).await {
            Ok(vars) => {
                debug!(count = vars.len(), "environment loaded");
                vars
            }
            Err(e) => {
                warn!(error = %e, "no environment configuration, using defaults");
                self.env_loader.load_defaults().await
            }
        };
        *self.env.write().unwrap_or_else(PoisonError::into_inner) = vars;
    }

    /// Stops every provider, unloads them and initializes again.
    pub async fn reset(&self) -> Result<(), RuntimeError> {
        self.ensure_active()?;
        let _gate = self.gate.lock().await;
        let (initialized, token) = {
            let mut lc = self.lifecycle();
            lc.generation += 1;
            lc.resetting = true;
            (lc.initialized, lc.running.take())
        };

        if initialized {
            info!(app = %self.cfg.name, "resetting application");
            if let Some(token) = token {
                token.cancel();
            }
            let unloaded = self.registry.unload_all().await;
            self.tracker.close();
            self.tracker.wait().await;
            {
                let mut lc = self.lifecycle();
                lc.initialized = false;
                lc.resetting = false;
            }
            unloaded?;
            self.bus.publish(Event::new(EventKind::AppReset));
        } else {
            self.lifecycle().resetting = false;
        }
        self.init().await
    }

    /// Loads every registered provider and runs them concurrently.
    ///
    /// Returns once they are started. When all of them have returned the
    /// application shuts down with code 0. Does nothing if already running;
    /// concurrent calls are serialized and only the first one starts providers.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        self.ensure_active()?;
        let _gate = self.gate.lock().await;
        self.init().await?;
        if self.is_running() {
            return Ok(());
        }
        self.registry.load_all().await?;

        let (token, generation) = {
            let mut lc = self.lifecycle();
            if lc.running.is_some() || self.is_shutdown_pending() {
                return Ok(());
            }
            let token = CancellationToken::new();
            lc.running = Some(token.clone());
            (token, lc.generation)
        };

        let providers = self.registry.loaded();
        if providers.is_empty() {
            warn!(app = %self.cfg.name, "no providers have been loaded");
            self.bus.publish(Event::new(EventKind::NoProviders));
        }

        let handles: Vec<JoinHandle<()>> = providers
            .into_iter()
            .map(|(id, provider)| {
                let id: Arc<str> = Arc::from(id);
                let bus = self.bus.clone();
                let token = token.clone();
                let source = Arc::clone(&id);
                self.spawn_tracked(Some(source), async move {
                    run_provider(&id, provider, token, &bus).await
                })
            })
            .collect();

        info!(app = %self.cfg.name, providers = handles.len(), "application running");
        self.bus.publish(Event::new(EventKind::AppRunning));

        self.spawn_joiner(handles, generation);
        if self.cfg.handle_signals {
            self.spawn_signal_listener(token);
        }
        Ok(())
    }

    fn spawn_joiner(&self, handles: Vec<JoinHandle<()>>, generation: u64) {
        let me = self.me.clone();
        tokio::spawn(async move {
            futures::future::join_all(handles).await;
            let Some(app) = me.upgrade() else {
                return;
            };
            let current = app.lifecycle().generation;
            if current != generation {
                debug!("run superseded by reset");
                return;
            }
            info!("all providers finished");
            app.shutdown(0);
        });
    }

    fn spawn_signal_listener(&self, token: CancellationToken) {
        let me = self.me.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                res = signals::wait_for_termination() => match res {
                    Ok(signal) => {
                        info!(signal, "termination signal received");
                        if let Some(app) = me.upgrade() {
                            app.shutdown(0);
                        }
                    }
                    Err(e) => warn!(error = %e, "cannot listen for termination signals"),
                },
            }
        });
    }

    /// Spawns tracked background work; shutdown waits for it.
    ///
    /// Errors and panics are routed to [`Application::report_error`].
    /// Must be called within a tokio runtime.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), ProviderError>> + Send + 'static,
    {
        self.spawn_tracked(None, fut)
    }

    fn spawn_tracked<F>(&self, source: Option<Arc<str>>, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), ProviderError>> + Send + 'static,
    {
        let me = self.me.clone();
        self.tracker.spawn(async move {
            let res = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(res) => res,
                Err(payload) => Err(ProviderError::Panicked {
                    info: panic_message(payload.as_ref()),
                }),
            };
            match res {
                Ok(()) | Err(ProviderError::Canceled) => {}
                Err(e) => {
                    if let Some(app) = me.upgrade() {
                        app.report_error(source.as_deref(), &e);
                    }
                }
            }
        })
    }

    /// Global error handler.
    ///
    /// Logs the failure; an application error (one with an
    /// [`exit_code`](ProviderError::exit_code)) also shuts down with that code.
    pub fn report_error(&self, source: Option<&str>, err: &ProviderError) {
        let mut ev = Event::new(EventKind::UnhandledError).with_reason(err.to_string());
        if let Some(id) = source {
            ev = ev.with_provider(id);
        }
        match err.exit_code() {
            Some(code) => {
                error!(provider = source, error = %err, code, "unhandled application error");
                self.bus.publish(ev.with_code(code));
                self.shutdown(code);
            }
            None => {
                error!(provider = source, error = %err, "unhandled error");
                self.bus.publish(ev);
            }
        }
    }

    /// Requests shutdown with `code`. Later calls are ignored.
    ///
    /// Cancels the current run, releases the broker and starts the watchdog.
    /// Outside a tokio runtime the application terminates immediately.
    pub fn shutdown(&self, code: i32) {
        if self.shutdown_pending.swap(true, Ordering::AcqRel) {
            debug!(code, "shutdown already pending");
            return;
        }
        let token = self.lifecycle().running.take();
        if let Some(token) = token {
            token.cancel();
        }
        info!(app = %self.cfg.name, code, "shutting down");
        self.bus
            .publish(Event::new(EventKind::ShutdownRequested).with_code(code));

        self.broker.release();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("shutdown outside of a runtime; terminating immediately");
            self.finish(Outcome::Closed { code });
            return;
        };

        let broker = self.broker.clone();
        self.tracker.spawn_on(
            async move {
                if let Err(e) = broker.drained().await {
                    error!(error = %e, "broker release failed");
                }
            },
            &handle,
        );
        self.tracker.close();

        let watchdog = Watchdog {
            tracker: self.tracker.clone(),
            alive: Arc::clone(&self.alive),
            bus: self.bus.clone(),
            tick: self.cfg.watchdog_tick_clamped(),
            hooked_timeout: self.cfg.hooked_timeout,
            hooked_timeout_max: self.cfg.hooked_timeout_max,
        };
        let me = self.me.clone();
        handle.spawn(async move {
            let outcome = watchdog.watch(code).await;
            if let Some(app) = me.upgrade() {
                app.finish(outcome);
            }
        });
    }

    fn finish(&self, outcome: Outcome) {
        let code = outcome.code();
        self.exit.send_replace(Some(code));
        self.terminator.terminate(code);
    }

    /// Waits until the watchdog has terminated the application; returns the exit code.
    pub async fn terminated(&self) -> i32 {
        let mut rx = self.exit.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(code) => (*code).unwrap_or(-1),
            Err(_) => -1,
        }
    }
}

impl Release for Application {
    /// Same as `shutdown(0)`.
    fn release(&self) {
        self.shutdown(0);
    }

    fn is_released(&self) -> bool {
        self.is_shutdown_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{DotenvLoader, StaticDiscovery};
    use crate::error::DiscoveryError;
    use crate::providers::{Provider, ProviderFn};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Default)]
    struct ExitRecorder(Mutex<Vec<i32>>);

    impl Terminate for ExitRecorder {
        fn terminate(&self, code: i32) {
            self.0.lock().unwrap().push(code);
        }
    }

    #[derive(Default)]
    struct Counters {
        loads: AtomicUsize,
        unloads: AtomicUsize,
    }

    struct Waiter(Arc<Counters>);

    #[async_trait]
    impl Provider for Waiter {
        async fn load(&self, _app: &AppContext) -> Result<(), ProviderError> {
            self.0.loads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn run(&self, ctx: CancellationToken) -> Result<(), ProviderError> {
            ctx.cancelled().await;
            Err(ProviderError::Canceled)
        }

        async fn unload(&self) -> Result<(), ProviderError> {
            self.0.unloads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct SlowLoad(Arc<Counters>);

    #[async_trait]
    impl Provider for SlowLoad {
        async fn load(&self, _app: &AppContext) -> Result<(), ProviderError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.0.loads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn run(&self, ctx: CancellationToken) -> Result<(), ProviderError> {
            ctx.cancelled().await;
            Err(ProviderError::Canceled)
        }
    }

    fn config() -> AppConfig {
        let mut cfg = AppConfig::named("test");
        cfg.handle_signals = false;
        cfg.directory = std::env::temp_dir().join("provisor-app-no-such-dir");
        cfg
    }

    fn build(catalog: ProviderCatalog) -> (Arc<Application>, Arc<ExitRecorder>) {
        let exits = Arc::new(ExitRecorder::default());
        let app = Application::builder(config())
            .with_catalog(catalog)
            .with_terminator(exits.clone())
            .build();
        (app, exits)
    }

    fn waiter_catalog(counters: &Arc<Counters>) -> ProviderCatalog {
        let c = Arc::clone(counters);
        ProviderCatalog::new().with("providers::Waiter", move || Waiter(c.clone()))
    }

    #[tokio::test]
    async fn init_is_idempotent_and_registers_declared_providers() {
        let counters = Arc::new(Counters::default());
        let (app, _) = build(waiter_catalog(&counters));
        assert_eq!(app.state(), AppState::Uninitialized);

        app.init().await.unwrap();
        app.init().await.unwrap();
        assert_eq!(app.state(), AppState::Initialized);
        assert_eq!(app.providers().registered(), vec!["providers::Waiter"]);
    }

    #[tokio::test]
    async fn discovery_registers_namespaced_providers_only() {
        let catalog = ProviderCatalog::new()
            .with("providers::A", || ProviderFn::new(|_ctx: CancellationToken| async { Ok::<_, ProviderError>(()) }))
            .with("other::B", || ProviderFn::new(|_ctx: CancellationToken| async { Ok::<_, ProviderError>(()) }));
        let mut cfg = config();
        cfg.locate_declared = false;
        let app = Application::builder(cfg)
            .with_discovery(Arc::new(StaticDiscovery::from_catalog(&catalog)))
            .with_catalog(catalog)
            .build();

        app.init().await.unwrap();
        assert_eq!(app.providers().registered(), vec!["providers::A"]);
    }

    struct BrokenDiscovery;

    #[async_trait]
    impl Discovery for BrokenDiscovery {
        async fn find(&self, _ns: &str, _recursive: bool) -> Result<Vec<String>, DiscoveryError> {
            Err(DiscoveryError {
                message: "scan failed".into(),
                class: "io".into(),
                code: 2,
            })
        }
    }

    #[tokio::test]
    async fn discovery_failure_fails_init() {
        let app = Application::builder(config())
            .with_discovery(Arc::new(BrokenDiscovery))
            .build();
        let err = app.init().await.unwrap_err();
        assert_eq!(err.as_label(), "runtime_discovery_failed");
        assert!(!app.is_initialized());
    }

    #[tokio::test]
    async fn env_falls_back_to_loader_defaults() {
        let loader = DotenvLoader::new().with_defaults(EnvVars::from([(
            "PROVISOR_TEST_FALLBACK_MODE".to_string(),
            "dev".to_string(),
        )]));
        let app = Application::builder(config())
            .with_env_loader(Arc::new(loader))
            .build();

        app.init().await.unwrap();
        assert_eq!(app.context().env("PROVISOR_TEST_FALLBACK_MODE").as_deref(), Some("dev"));
        assert_eq!(app.context().env("PROVISOR_TEST_UNSET_KEY"), None);
    }

    #[tokio::test]
    async fn lifecycle_calls_fail_once_shutdown_is_pending() {
        let (app, exits) = build(ProviderCatalog::new());
        app.shutdown(3);
        app.shutdown(5);

        assert!(matches!(app.init().await, Err(RuntimeError::PendingShutdown)));
        assert!(matches!(app.run().await, Err(RuntimeError::PendingShutdown)));
        assert!(matches!(app.reset().await, Err(RuntimeError::PendingShutdown)));

        assert_eq!(app.terminated().await, 3);
        assert_eq!(*exits.0.lock().unwrap(), vec![3]);
        assert_eq!(app.state(), AppState::Terminated);
        assert!(app.is_released());
    }

    #[tokio::test(start_paused = true)]
    async fn finished_providers_shut_the_application_down() {
        let catalog = ProviderCatalog::new().with("providers::Once", || {
            ProviderFn::new(|_ctx: CancellationToken| async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, ProviderError>(())
            })
        });
        let (app, exits) = build(catalog);

        app.run().await.unwrap();
        assert!(app.is_running());
        assert!(app.providers().is_loaded("providers::Once").unwrap());

        assert_eq!(app.terminated().await, 0);
        assert_eq!(*exits.0.lock().unwrap(), vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn no_providers_still_shuts_down() {
        let (app, _) = build(ProviderCatalog::new());
        let mut events = app.events();
        app.run().await.unwrap();
        assert_eq!(app.terminated().await, 0);

        let mut saw_warning = false;
        while let Ok(ev) = events.try_recv() {
            saw_warning |= ev.kind == EventKind::NoProviders;
        }
        assert!(saw_warning);
    }

    #[tokio::test(start_paused = true)]
    async fn provider_error_shuts_down_with_its_code() {
        let counters = Arc::new(Counters::default());
        let catalog = waiter_catalog(&counters).with("providers::Failing", || {
            ProviderFn::new(|_ctx: CancellationToken| async {
                Err::<(), _>(ProviderError::Exit {
                    code: 4,
                    error: "bad config".into(),
                })
            })
        });
        let (app, exits) = build(catalog);

        app.run().await.unwrap();
        assert_eq!(app.terminated().await, 4);
        assert_eq!(*exits.0.lock().unwrap(), vec![4]);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_provider_does_not_trigger_shutdown() {
        let counters = Arc::new(Counters::default());
        let catalog = waiter_catalog(&counters).with("providers::Panics", || {
            ProviderFn::new(|_ctx: CancellationToken| async {
                if true {
                    panic!("kaboom");
                }
                Ok::<_, ProviderError>(())
            })
        });
        let (app, _) = build(catalog);

        app.run().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!app.is_shutdown_pending());
        assert!(app.is_running());

        app.shutdown(0);
        assert_eq!(app.terminated().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_provider_is_force_terminated() {
        let catalog = ProviderCatalog::new().with("providers::Stuck", || {
            ProviderFn::new(|_ctx: CancellationToken| std::future::pending::<Result<(), ProviderError>>())
        });
        let (app, exits) = build(catalog);

        app.run().await.unwrap();
        let started = Instant::now();
        app.shutdown(0);

        assert_eq!(app.terminated().await, -1);
        assert!(started.elapsed() > Duration::from_secs(13));
        assert_eq!(*exits.0.lock().unwrap(), vec![-1]);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_reloads_without_shutting_down() {
        let counters = Arc::new(Counters::default());
        let (app, _) = build(waiter_catalog(&counters));

        app.run().await.unwrap();
        app.reset().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(!app.is_shutdown_pending());
        assert_eq!(app.state(), AppState::Initialized);
        assert_eq!(counters.loads.load(Ordering::SeqCst), 1);
        assert_eq!(counters.unloads.load(Ordering::SeqCst), 1);

        app.run().await.unwrap();
        assert_eq!(counters.loads.load(Ordering::SeqCst), 2);
        app.shutdown(0);
        assert_eq!(app.terminated().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_spawned_work_and_broker_suppliers() {
        let (app, _) = build(ProviderCatalog::new());
        let ctx = app.context();
        let mut supplier = ctx.broker().subscribe("jobs").unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        ctx.spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        tokio::spawn(async move { while let Ok(Some(_)) = supplier.recv().await {} });

        app.shutdown(0);
        assert_eq!(app.terminated().await, 0);
        assert!(done.load(Ordering::SeqCst));
        assert!(ctx.broker().channels().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_runs_start_providers_once() {
        let counters = Arc::new(Counters::default());
        let c = Arc::clone(&counters);
        let catalog = ProviderCatalog::new().with("providers::Slow", move || SlowLoad(c.clone()));
        let (app, exits) = build(catalog);

        let (first, second) = tokio::join!(app.run(), app.run());
        assert!(first.is_ok(), "{first:?}");
        assert!(second.is_ok(), "{second:?}");
        assert!(app.is_running());
        assert_eq!(counters.loads.load(Ordering::SeqCst), 1);
        assert_eq!(app.providers().loaded().len(), 1);

        app.shutdown(0);
        assert_eq!(app.terminated().await, 0);
        assert_eq!(*exits.0.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn event_listener_does_not_keep_the_bus_open() {
        let (app, _) = build(ProviderCatalog::new());
        let mut rx = app.events();
        drop(app);

        let res = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(matches!(res, Ok(Err(broadcast::error::RecvError::Closed))));
    }
}
