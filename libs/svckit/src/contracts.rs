use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::context::ServiceCtx;
use crate::hub::ServiceHub;
use crate::model::{NewUser, User, UserError, UserPatch};

/// The eight named slots a manager owns.
///
/// Declaration order doubles as the tie-break for the topological sort, so
/// the resolved init order is stable run to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubsystemKind {
    Environment,
    Logger,
    Database,
    Cache,
    Validator,
    HttpServer,
    Handlers,
    Tracer,
}

impl SubsystemKind {
    /// Every kind, in declaration order. `kind as usize` indexes into this.
    pub const ALL: [SubsystemKind; 8] = [
        SubsystemKind::Environment,
        SubsystemKind::Logger,
        SubsystemKind::Database,
        SubsystemKind::Cache,
        SubsystemKind::Validator,
        SubsystemKind::HttpServer,
        SubsystemKind::Handlers,
        SubsystemKind::Tracer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SubsystemKind::Environment => "environment",
            SubsystemKind::Logger => "logger",
            SubsystemKind::Database => "database",
            SubsystemKind::Cache => "cache",
            SubsystemKind::Validator => "validator",
            SubsystemKind::HttpServer => "http_server",
            SubsystemKind::Handlers => "handlers",
            SubsystemKind::Tracer => "tracer",
        }
    }

    /// Default dependency list; the manager seeds its table from these and
    /// [`Manager::with_dependencies`](crate::Manager::with_dependencies) can
    /// override them per subsystem.
    ///
    /// The defaults encode who looks up whom during `init`: the cache,
    /// database, and tracer read their endpoints from the environment; the
    /// handlers need persistence and payload checks; the http server comes
    /// online only after everything it routes into is ready.
    pub fn default_deps(self) -> &'static [SubsystemKind] {
        match self {
            SubsystemKind::Environment => &[SubsystemKind::Logger],
            SubsystemKind::Logger => &[],
            SubsystemKind::Database => &[SubsystemKind::Environment],
            SubsystemKind::Cache => &[SubsystemKind::Environment],
            SubsystemKind::Validator => &[],
            SubsystemKind::HttpServer => &[SubsystemKind::Logger, SubsystemKind::Handlers],
            SubsystemKind::Handlers => &[SubsystemKind::Database, SubsystemKind::Validator],
            SubsystemKind::Tracer => &[SubsystemKind::Environment],
        }
    }
}

impl fmt::Display for SubsystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle contract every subsystem satisfies.
///
/// The default bodies make every call a successful no-op, so placeholder
/// implementations only declare the variant trait and override nothing.
#[async_trait]
pub trait Subsystem: Send + Sync + 'static {
    /// One-time setup: open connections, parse configuration, start
    /// background reporters. The manager calls this exactly once, in
    /// dependency order; any error aborts startup.
    async fn init(&self, _ctx: &ServiceCtx) -> anyhow::Result<()> {
        Ok(())
    }

    /// Cheap liveness probe; errors mean the subsystem is unusable.
    async fn health(&self, _ctx: &ServiceCtx) -> anyhow::Result<()> {
        Ok(())
    }

    /// Release held resources. Runs best-effort, possibly on partially
    /// initialized state; must not assume `init` succeeded.
    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Receive the read-only locator for lazy sibling lookups. Called by the
    /// manager before the implementation is stored in its slot; re-binding
    /// replaces the previously stored handle.
    fn bind(&self, _hub: ServiceHub) {}
}

/// Process configuration read from environment variables at `init` time.
/// Accessors return zero values until then.
pub trait Environment: Subsystem {
    /// Deployment environment name (e.g. "development", "production").
    fn environment(&self) -> String {
        String::new()
    }

    fn service(&self) -> String {
        String::new()
    }

    fn version(&self) -> String {
        String::new()
    }

    fn database_dsn(&self) -> String {
        String::new()
    }

    fn cache_address(&self) -> String {
        String::new()
    }

    fn trace_endpoint(&self) -> String {
        String::new()
    }

    /// Bind address for the http server, `host:port`.
    fn http_address(&self) -> String {
        String::new()
    }

    fn debug_profiling(&self) -> bool {
        false
    }
}

/// Installs the process-wide log subscriber during `init` and flushes
/// buffered output on `close`. Call sites log through the `tracing` macros,
/// not through this trait.
pub trait Logger: Subsystem {}

/// Relational storage. The handle is available once `init` has connected.
pub trait Database: Subsystem {
    fn handle(&self) -> Option<Arc<store::DbHandle>> {
        None
    }
}

/// Cache client. Owns its connection internally; lifecycle-only surface.
pub trait Cache: Subsystem {}

/// Payload rule runner for request drafts.
pub trait Validator: Subsystem {
    fn validate(&self, _target: &dyn validator::Validate) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Serving loop for the HTTP surface.
///
/// `run` serves until shutdown is requested and is intended to be spawned
/// concurrently with the signal wait; `close` stops accepting new
/// connections, lets in-flight requests finish, and returns once the loop
/// has drained.
#[async_trait]
pub trait HttpServer: Subsystem {
    async fn run(&self, _ctx: &ServiceCtx) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The five user operations routed through the handlers slot.
///
/// Default bodies echo their input without touching any sibling, which is
/// exactly the placeholder behavior: no work, no failure.
#[async_trait]
pub trait Handlers: Subsystem {
    async fn create_user(&self, draft: NewUser) -> Result<User, UserError> {
        Ok(User {
            id: Uuid::nil(),
            name: draft.name,
            email: draft.email,
        })
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<User, UserError> {
        Ok(User {
            id,
            name: patch.name.unwrap_or_default(),
            email: patch.email.unwrap_or_default(),
        })
    }

    async fn get_user(&self, id: Uuid) -> Result<User, UserError> {
        Ok(User {
            id,
            name: String::new(),
            email: String::new(),
        })
    }

    async fn list_users(&self) -> Result<Vec<User>, UserError> {
        Ok(Vec::new())
    }

    async fn delete_user(&self, _id: Uuid) -> Result<(), UserError> {
        Ok(())
    }
}

/// Installs the global span exporter during `init`; `close` flushes and
/// shuts the pipeline down.
pub trait Tracer: Subsystem {}
