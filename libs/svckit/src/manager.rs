use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::context::ServiceCtx;
use crate::contracts::{
    Cache, Database, Environment, Handlers, HttpServer, Logger, Subsystem, SubsystemKind, Tracer,
    Validator,
};
use crate::hub::{ServiceHub, SlotTable};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Configured,
    Initialized,
    Closed,
}

/// The service lifecycle container.
///
/// Owns one implementation per [`SubsystemKind`] (seeded with no-op
/// placeholders), the declared dependency table, and the shared execution
/// context. Configuration happens through the fluent `with_*` surface before
/// [`init`](Manager::init); afterwards the manager only drives phases:
/// fail-fast `init` and `health` in dependency order, best-effort `close` in
/// reverse order. A manager is built once per process and cannot be
/// re-initialized after `close`.
pub struct Manager {
    slots: Arc<SlotTable>,
    deps: HashMap<SubsystemKind, Vec<SubsystemKind>>,
    init_order: Vec<SubsystemKind>,
    ctx: Option<ServiceCtx>,
    state: State,
}

impl Manager {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(SlotTable::with_defaults()),
            deps: SubsystemKind::ALL
                .iter()
                .map(|&k| (k, k.default_deps().to_vec()))
                .collect(),
            init_order: Vec::new(),
            ctx: None,
            state: State::Configured,
        }
    }

    /// Read-only locator over the slots; this is the handle bound into every
    /// subsystem by the `with_*` setters.
    pub fn hub(&self) -> ServiceHub {
        ServiceHub::new(self.slots.clone())
    }

    /// Execution context created by `init`; `None` before initialization and
    /// after `close` has taken it for cancellation.
    pub fn ctx(&self) -> Option<ServiceCtx> {
        self.ctx.clone()
    }

    /// Subsystems in the order `init` ran them; empty before `init`.
    pub fn init_order(&self) -> &[SubsystemKind] {
        &self.init_order
    }

    // ---- Slot access -----------------------------------------------------

    pub fn environment(&self) -> Arc<dyn Environment> {
        self.slots.environment.read().clone()
    }

    pub fn logger(&self) -> Arc<dyn Logger> {
        self.slots.logger.read().clone()
    }

    pub fn database(&self) -> Arc<dyn Database> {
        self.slots.database.read().clone()
    }

    pub fn cache(&self) -> Arc<dyn Cache> {
        self.slots.cache.read().clone()
    }

    pub fn validator(&self) -> Arc<dyn Validator> {
        self.slots.validator.read().clone()
    }

    pub fn http_server(&self) -> Arc<dyn HttpServer> {
        self.slots.http_server.read().clone()
    }

    pub fn handlers(&self) -> Arc<dyn Handlers> {
        self.slots.handlers.read().clone()
    }

    pub fn tracer(&self) -> Arc<dyn Tracer> {
        self.slots.tracer.read().clone()
    }

    // ---- Fluent configuration -------------------------------------------

    pub fn with_environment(self, environment: Arc<dyn Environment>) -> Self {
        environment.bind(self.hub());
        *self.slots.environment.write() = environment;
        self
    }

    pub fn with_logger(self, logger: Arc<dyn Logger>) -> Self {
        logger.bind(self.hub());
        *self.slots.logger.write() = logger;
        self
    }

    pub fn with_database(self, database: Arc<dyn Database>) -> Self {
        database.bind(self.hub());
        *self.slots.database.write() = database;
        self
    }

    pub fn with_cache(self, cache: Arc<dyn Cache>) -> Self {
        cache.bind(self.hub());
        *self.slots.cache.write() = cache;
        self
    }

    pub fn with_validator(self, validator: Arc<dyn Validator>) -> Self {
        validator.bind(self.hub());
        *self.slots.validator.write() = validator;
        self
    }

    pub fn with_http_server(self, http_server: Arc<dyn HttpServer>) -> Self {
        http_server.bind(self.hub());
        *self.slots.http_server.write() = http_server;
        self
    }

    pub fn with_handlers(self, handlers: Arc<dyn Handlers>) -> Self {
        handlers.bind(self.hub());
        *self.slots.handlers.write() = handlers;
        self
    }

    pub fn with_tracer(self, tracer: Arc<dyn Tracer>) -> Self {
        tracer.bind(self.hub());
        *self.slots.tracer.write() = tracer;
        self
    }

    /// Override the declared dependency list for one subsystem. The default
    /// table is [`SubsystemKind::default_deps`]; overrides take effect at the
    /// next order resolution.
    pub fn with_dependencies(mut self, kind: SubsystemKind, deps: &[SubsystemKind]) -> Self {
        self.deps.insert(kind, deps.to_vec());
        self
    }

    // ---- Order resolution -----------------------------------------------

    fn declared_deps(&self, kind: SubsystemKind) -> &[SubsystemKind] {
        self.deps.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Topologically sort the subsystems by their declared dependencies.
    ///
    /// Kahn's algorithm, seeded and tie-broken by declaration order
    /// ([`SubsystemKind::ALL`]), so the result is deterministic for a given
    /// dependency table. Cycles are reported with their path.
    pub fn resolve_order(&self) -> Result<Vec<SubsystemKind>, ManagerError> {
        let kinds = SubsystemKind::ALL;

        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); kinds.len()];
        for &kind in &kinds {
            for &dep in self.declared_deps(kind) {
                // edge dep -> kind: the dependency initializes first
                adj[dep as usize].push(kind as usize);
            }
        }

        if let Some(path) = detect_cycle_with_path(&adj) {
            return Err(ManagerError::DependencyCycle { path });
        }

        let mut indeg = vec![0usize; kinds.len()];
        for targets in &adj {
            for &t in targets {
                indeg[t] += 1;
            }
        }

        let mut queue: VecDeque<usize> = (0..kinds.len()).filter(|&i| indeg[i] == 0).collect();
        let mut order = Vec::with_capacity(kinds.len());
        while let Some(u) = queue.pop_front() {
            order.push(kinds[u]);
            for &w in &adj[u] {
                indeg[w] -= 1;
                if indeg[w] == 0 {
                    queue.push_back(w);
                }
            }
        }

        Ok(order)
    }

    // ---- Phases ----------------------------------------------------------

    /// Create the execution context and initialize every subsystem in
    /// dependency order, stopping at the first failure. No rollback is
    /// performed here; the caller is responsible for `close` after a failed
    /// init.
    pub async fn init(&mut self) -> Result<(), ManagerError> {
        match self.state {
            State::Initialized => return Err(ManagerError::AlreadyInitialized),
            State::Closed => return Err(ManagerError::Closed),
            State::Configured => {}
        }

        let order = self.resolve_order()?;
        tracing::info!(
            subsystems = ?order.iter().map(|k| k.name()).collect::<Vec<_>>(),
            "subsystem init order resolved"
        );

        let ctx = ServiceCtx::new();
        for &kind in &order {
            tracing::debug!(subsystem = %kind, "initializing subsystem");
            self.init_slot(kind, &ctx)
                .await
                .map_err(|source| ManagerError::Init {
                    subsystem: kind,
                    source,
                })?;
        }

        self.init_order = order;
        self.ctx = Some(ctx);
        self.state = State::Initialized;
        tracing::info!("all subsystems initialized");
        Ok(())
    }

    /// Probe every subsystem in init order with the stored context,
    /// fail-fast on the first error.
    pub async fn health(&self) -> Result<(), ManagerError> {
        if self.state != State::Initialized {
            return Err(ManagerError::NotInitialized);
        }
        let ctx = self.ctx.clone().ok_or(ManagerError::NotInitialized)?;

        for &kind in &self.init_order {
            self.health_slot(kind, &ctx)
                .await
                .map_err(|source| ManagerError::Health {
                    subsystem: kind,
                    source,
                })?;
        }
        Ok(())
    }

    /// Close every subsystem in reverse init order, attempting each one even
    /// when earlier closes fail, then cancel the execution context exactly
    /// once. Failures are collected per subsystem; a second `close` is a
    /// successful no-op.
    pub async fn close(&mut self) -> Result<(), ManagerError> {
        if self.state == State::Closed {
            tracing::debug!("manager already closed");
            return Ok(());
        }

        // After a failed or skipped init there is no recorded order; fall
        // back to a freshly resolved one so every slot still gets a close.
        let order = if self.init_order.is_empty() {
            self.resolve_order()
                .unwrap_or_else(|_| SubsystemKind::ALL.to_vec())
        } else {
            self.init_order.clone()
        };

        let mut failures = Vec::new();
        for &kind in order.iter().rev() {
            tracing::debug!(subsystem = %kind, "closing subsystem");
            if let Err(source) = self.close_slot(kind).await {
                tracing::warn!(subsystem = %kind, error = %source, "failed to close subsystem");
                failures.push(CloseFailure {
                    subsystem: kind,
                    source,
                });
            }
        }

        if let Some(ctx) = self.ctx.take() {
            ctx.cancel();
        }
        self.state = State::Closed;

        if failures.is_empty() {
            tracing::info!("all subsystems closed");
            Ok(())
        } else {
            Err(ManagerError::Close { failures })
        }
    }

    // ---- Per-slot dispatch ----------------------------------------------

    async fn init_slot(&self, kind: SubsystemKind, ctx: &ServiceCtx) -> anyhow::Result<()> {
        let hub = self.hub();
        match kind {
            SubsystemKind::Environment => hub.environment().init(ctx).await,
            SubsystemKind::Logger => hub.logger().init(ctx).await,
            SubsystemKind::Database => hub.database().init(ctx).await,
            SubsystemKind::Cache => hub.cache().init(ctx).await,
            SubsystemKind::Validator => hub.validator().init(ctx).await,
            SubsystemKind::HttpServer => hub.http_server().init(ctx).await,
            SubsystemKind::Handlers => hub.handlers().init(ctx).await,
            SubsystemKind::Tracer => hub.tracer().init(ctx).await,
        }
    }

    async fn health_slot(&self, kind: SubsystemKind, ctx: &ServiceCtx) -> anyhow::Result<()> {
        let hub = self.hub();
        match kind {
            SubsystemKind::Environment => hub.environment().health(ctx).await,
            SubsystemKind::Logger => hub.logger().health(ctx).await,
            SubsystemKind::Database => hub.database().health(ctx).await,
            SubsystemKind::Cache => hub.cache().health(ctx).await,
            SubsystemKind::Validator => hub.validator().health(ctx).await,
            SubsystemKind::HttpServer => hub.http_server().health(ctx).await,
            SubsystemKind::Handlers => hub.handlers().health(ctx).await,
            SubsystemKind::Tracer => hub.tracer().health(ctx).await,
        }
    }

    async fn close_slot(&self, kind: SubsystemKind) -> anyhow::Result<()> {
        let hub = self.hub();
        match kind {
            SubsystemKind::Environment => hub.environment().close().await,
            SubsystemKind::Logger => hub.logger().close().await,
            SubsystemKind::Database => hub.database().close().await,
            SubsystemKind::Cache => hub.cache().close().await,
            SubsystemKind::Validator => hub.validator().close().await,
            SubsystemKind::HttpServer => hub.http_server().close().await,
            SubsystemKind::Handlers => hub.handlers().close().await,
            SubsystemKind::Tracer => hub.tracer().close().await,
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("state", &self.state)
            .field("init_order", &self.init_order)
            .finish_non_exhaustive()
    }
}

/// One subsystem's failure during the close phase.
#[derive(Debug)]
pub struct CloseFailure {
    pub subsystem: SubsystemKind,
    pub source: anyhow::Error,
}

impl fmt::Display for CloseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subsystem, self.source)
    }
}

/// Structured errors for the lifecycle container.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("initialization failed for subsystem '{subsystem}'")]
    Init {
        subsystem: SubsystemKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("health check failed for subsystem '{subsystem}'")]
    Health {
        subsystem: SubsystemKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("close finished with {} failure(s): {}", failures.len(),
        failures.iter().map(|f| f.to_string()).collect::<Vec<_>>().join("; "))]
    Close { failures: Vec<CloseFailure> },

    #[error("subsystem dependency cycle: {}",
        path.iter().map(|k| k.name()).collect::<Vec<_>>().join(" -> "))]
    DependencyCycle { path: Vec<SubsystemKind> },

    #[error("manager is already initialized")]
    AlreadyInitialized,

    #[error("manager is not initialized")]
    NotInitialized,

    #[error("manager is closed")]
    Closed,
}

/// DFS with path tracking over the dependency graph; returns the cycle path
/// (first node repeated at the end) if one exists.
fn detect_cycle_with_path(adj: &[Vec<usize>]) -> Option<Vec<SubsystemKind>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White, // unvisited
        Gray,  // on the current path
        Black, // finished
    }

    fn dfs(
        node: usize,
        adj: &[Vec<usize>],
        colors: &mut [Color],
        path: &mut Vec<usize>,
    ) -> Option<Vec<SubsystemKind>> {
        colors[node] = Color::Gray;
        path.push(node);

        for &neighbor in &adj[node] {
            match colors[neighbor] {
                Color::Gray => {
                    // Back edge: the cycle runs from the neighbor's position
                    // in the current path up to here.
                    if let Some(start) = path.iter().position(|&n| n == neighbor) {
                        let mut cycle: Vec<SubsystemKind> = path[start..]
                            .iter()
                            .map(|&i| SubsystemKind::ALL[i])
                            .collect();
                        cycle.push(SubsystemKind::ALL[neighbor]);
                        return Some(cycle);
                    }
                }
                Color::White => {
                    if let Some(cycle) = dfs(neighbor, adj, colors, path) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }

        path.pop();
        colors[node] = Color::Black;
        None
    }

    let mut colors = vec![Color::White; adj.len()];
    let mut path = Vec::new();
    for i in 0..adj.len() {
        if colors[i] == Color::White {
            if let Some(cycle) = dfs(i, adj, &mut colors, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}
