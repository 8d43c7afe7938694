//! End-to-end lifecycle behavior: ordered fail-fast init, fail-fast health,
//! best-effort close with structured aggregation, and lazy sibling lookup
//! through the hub.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use svckit::{
    async_trait, Cache, Database, Environment, Handlers, HttpServer, Logger, Manager,
    ManagerError, ServiceCtx, ServiceHub, Subsystem, SubsystemKind, Tracer, Validator,
};

/// Shared call recorder; probes append `phase:label` entries.
#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl EventLog {
    fn push(&self, event: String) {
        self.0.lock().push(event);
    }

    fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// Test subsystem usable in any slot: counts lifecycle calls, records them
/// in the shared log, and optionally fails a chosen phase.
struct Probe {
    label: &'static str,
    log: Arc<EventLog>,
    fail_init: Option<&'static str>,
    fail_health: Option<&'static str>,
    fail_close: Option<&'static str>,
    init_calls: AtomicUsize,
    health_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl Probe {
    fn new(label: &'static str, log: &Arc<EventLog>) -> Self {
        Self {
            label,
            log: log.clone(),
            fail_init: None,
            fail_health: None,
            fail_close: None,
            init_calls: AtomicUsize::new(0),
            health_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
        }
    }

    fn fail_init(mut self, message: &'static str) -> Self {
        self.fail_init = Some(message);
        self
    }

    fn fail_health(mut self, message: &'static str) -> Self {
        self.fail_health = Some(message);
        self
    }

    fn fail_close(mut self, message: &'static str) -> Self {
        self.fail_close = Some(message);
        self
    }

    fn inits(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    fn healths(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    fn closes(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Subsystem for Probe {
    async fn init(&self, _ctx: &ServiceCtx) -> anyhow::Result<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("init:{}", self.label));
        match self.fail_init {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }

    async fn health(&self, _ctx: &ServiceCtx) -> anyhow::Result<()> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("health:{}", self.label));
        match self.fail_health {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("close:{}", self.label));
        match self.fail_close {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }
}

impl Environment for Probe {}
impl Logger for Probe {}
impl Database for Probe {}
impl Cache for Probe {}
impl Validator for Probe {}
impl HttpServer for Probe {}
impl Handlers for Probe {}
impl Tracer for Probe {}

fn fully_probed_manager(log: &Arc<EventLog>) -> (Manager, Vec<Arc<Probe>>) {
    let probes: Vec<Arc<Probe>> = [
        "environment",
        "logger",
        "database",
        "cache",
        "validator",
        "http_server",
        "handlers",
        "tracer",
    ]
    .into_iter()
    .map(|label| Arc::new(Probe::new(label, log)))
    .collect();

    let manager = Manager::new()
        .with_environment(probes[0].clone())
        .with_logger(probes[1].clone())
        .with_database(probes[2].clone())
        .with_cache(probes[3].clone())
        .with_validator(probes[4].clone())
        .with_http_server(probes[5].clone())
        .with_handlers(probes[6].clone())
        .with_tracer(probes[7].clone());

    (manager, probes)
}

// Scenario: defaults only.
#[tokio::test]
async fn defaults_only_init_health_close_succeed() {
    let mut manager = Manager::new();
    manager.init().await.unwrap();
    manager.health().await.unwrap();
    manager.close().await.unwrap();
}

#[tokio::test]
async fn init_runs_subsystems_in_dependency_order() {
    let log = Arc::new(EventLog::default());
    let (mut manager, _probes) = fully_probed_manager(&log);

    manager.init().await.unwrap();

    assert_eq!(
        log.events(),
        vec![
            "init:logger",
            "init:validator",
            "init:environment",
            "init:database",
            "init:cache",
            "init:tracer",
            "init:handlers",
            "init:http_server",
        ]
    );
    assert_eq!(manager.init_order().len(), 8);
}

#[tokio::test]
async fn close_runs_in_reverse_init_order() {
    let log = Arc::new(EventLog::default());
    let (mut manager, probes) = fully_probed_manager(&log);

    manager.init().await.unwrap();
    manager.close().await.unwrap();

    let closes: Vec<String> = log
        .events()
        .into_iter()
        .filter(|e| e.starts_with("close:"))
        .collect();
    assert_eq!(
        closes,
        vec![
            "close:http_server",
            "close:handlers",
            "close:tracer",
            "close:cache",
            "close:database",
            "close:environment",
            "close:validator",
            "close:logger",
        ]
    );
    for probe in &probes {
        assert_eq!(probe.closes(), 1, "{} closed once", probe.label);
    }
}

// Scenario: one subsystem's init fails.
#[tokio::test]
async fn init_halts_at_first_failure_and_preserves_the_error() {
    let log = Arc::new(EventLog::default());
    let logger = Arc::new(Probe::new("logger", &log));
    let environment = Arc::new(Probe::new("environment", &log));
    let database = Arc::new(Probe::new("database", &log).fail_init("connection refused"));
    let cache = Arc::new(Probe::new("cache", &log));
    let http_server = Arc::new(Probe::new("http_server", &log));

    let mut manager = Manager::new()
        .with_logger(logger.clone())
        .with_environment(environment.clone())
        .with_database(database.clone())
        .with_cache(cache.clone())
        .with_http_server(http_server.clone());

    let err = manager.init().await.unwrap_err();
    match err {
        ManagerError::Init { subsystem, source } => {
            assert_eq!(subsystem, SubsystemKind::Database);
            assert_eq!(source.to_string(), "connection refused");
        }
        other => panic!("expected Init error, got: {other:?}"),
    }

    // Subsystems ordered before the database ran; none after it did.
    assert_eq!(logger.inits(), 1);
    assert_eq!(environment.inits(), 1);
    assert_eq!(database.inits(), 1);
    assert_eq!(cache.inits(), 0);
    assert_eq!(http_server.inits(), 0);

    // Best-effort close after the failed init still reaches every slot,
    // including the never-started http server, and reports no error.
    manager.close().await.unwrap();
    assert_eq!(http_server.closes(), 1);
    assert_eq!(database.closes(), 1);
    assert_eq!(logger.closes(), 1);
}

// Scenario: close failures are aggregated, every close still attempted.
#[tokio::test]
async fn close_aggregates_failures_per_subsystem() {
    let log = Arc::new(EventLog::default());
    let cache = Arc::new(Probe::new("cache", &log).fail_close("already closed"));
    let database = Arc::new(Probe::new("database", &log));
    let logger = Arc::new(Probe::new("logger", &log));

    let mut manager = Manager::new()
        .with_cache(cache.clone())
        .with_database(database.clone())
        .with_logger(logger.clone());

    manager.init().await.unwrap();
    let err = manager.close().await.unwrap_err();
    match err {
        ManagerError::Close { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].subsystem, SubsystemKind::Cache);
            assert_eq!(failures[0].source.to_string(), "already closed");
        }
        other => panic!("expected Close error, got: {other:?}"),
    }

    assert_eq!(cache.closes(), 1);
    assert_eq!(database.closes(), 1);
    assert_eq!(logger.closes(), 1);
}

#[tokio::test]
async fn close_failure_message_names_the_subsystem() {
    let log = Arc::new(EventLog::default());
    let cache = Arc::new(Probe::new("cache", &log).fail_close("already closed"));
    let mut manager = Manager::new().with_cache(cache);
    manager.init().await.unwrap();

    let message = manager.close().await.unwrap_err().to_string();
    assert!(message.contains("cache"), "got: {message}");
    assert!(message.contains("already closed"), "got: {message}");
}

#[tokio::test]
async fn health_stops_at_first_failing_subsystem() {
    let log = Arc::new(EventLog::default());
    let database = Arc::new(Probe::new("database", &log).fail_health("pool exhausted"));
    let cache = Arc::new(Probe::new("cache", &log));

    let mut manager = Manager::new()
        .with_database(database.clone())
        .with_cache(cache.clone());
    manager.init().await.unwrap();

    let err = manager.health().await.unwrap_err();
    match err {
        ManagerError::Health { subsystem, source } => {
            assert_eq!(subsystem, SubsystemKind::Database);
            assert_eq!(source.to_string(), "pool exhausted");
        }
        other => panic!("expected Health error, got: {other:?}"),
    }

    // The database precedes the cache in the resolved order, so the cache
    // probe never ran.
    assert_eq!(database.healths(), 1);
    assert_eq!(cache.healths(), 0);
}

#[tokio::test]
async fn setter_order_does_not_change_final_state() {
    let log = Arc::new(EventLog::default());
    let cache = Arc::new(Probe::new("cache", &log));
    let database = Arc::new(Probe::new("database", &log));

    let a = Manager::new()
        .with_cache(cache.clone())
        .with_database(database.clone());
    let b = Manager::new()
        .with_database(database.clone())
        .with_cache(cache.clone());

    assert!(Arc::ptr_eq(&a.cache(), &b.cache()));
    assert!(Arc::ptr_eq(&a.database(), &b.database()));
    assert_eq!(a.resolve_order().unwrap(), b.resolve_order().unwrap());
}

#[tokio::test]
async fn dependency_override_moves_init_later() {
    let log = Arc::new(EventLog::default());
    let (mut manager, _probes) = fully_probed_manager(&log);
    manager = manager.with_dependencies(
        SubsystemKind::Cache,
        &[SubsystemKind::Environment, SubsystemKind::Handlers],
    );

    manager.init().await.unwrap();

    let events = log.events();
    let pos = |needle: &str| events.iter().position(|e| e == needle).unwrap();
    assert!(pos("init:handlers") < pos("init:cache"));
    assert!(pos("init:environment") < pos("init:cache"));
}

// Scenario: lazy sibling lookup during init.

struct StubEnvironment {
    cache_address: String,
}

impl Subsystem for StubEnvironment {}

impl Environment for StubEnvironment {
    fn cache_address(&self) -> String {
        self.cache_address.clone()
    }
}

#[derive(Default)]
struct AddressLookupCache {
    hub: ArcSwapOption<ServiceHub>,
    seen: Mutex<Option<String>>,
}

#[async_trait]
impl Subsystem for AddressLookupCache {
    async fn init(&self, _ctx: &ServiceCtx) -> anyhow::Result<()> {
        let hub = self
            .hub
            .load_full()
            .ok_or_else(|| anyhow!("cache is not bound to a manager"))?;
        let address = hub.environment().cache_address();
        *self.seen.lock() = Some(address);
        Ok(())
    }

    fn bind(&self, hub: ServiceHub) {
        self.hub.store(Some(Arc::new(hub)));
    }
}

impl Cache for AddressLookupCache {}

#[tokio::test]
async fn cache_reads_address_from_environment_during_init() {
    let cache = Arc::new(AddressLookupCache::default());
    // Cache attached before the environment: setter order must not matter,
    // only the resolved init order does.
    let mut manager = Manager::new()
        .with_cache(cache.clone())
        .with_environment(Arc::new(StubEnvironment {
            cache_address: "localhost:6379".into(),
        }));

    manager.init().await.unwrap();

    let seen = cache.seen.lock().clone().expect("lookup ran during init");
    assert_eq!(seen, "localhost:6379");
    manager.close().await.unwrap();
}

#[tokio::test]
async fn context_is_shared_and_cancelled_once() {
    let mut manager = Manager::new();
    manager.init().await.unwrap();

    let ctx = manager.ctx().expect("context exists after init");
    let token = ctx.cancellation_token().clone();
    assert!(!token.is_cancelled());

    manager.close().await.unwrap();
    assert!(token.is_cancelled());

    // A second close must not panic or re-cancel anything.
    manager.close().await.unwrap();
}
