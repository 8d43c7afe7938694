//! # svckit - Subsystem Lifecycle Container
//!
//! A small container for assembling a service out of named subsystems
//! (environment, logger, database, cache, validator, http server, handlers,
//! tracer), wiring them together through a read-only locator, and driving
//! their startup, health-check, and shutdown sequencing.
//!
//! ## Design
//!
//! - **Capability contracts**: every subsystem satisfies the [`Subsystem`]
//!   lifecycle (`init` / `health` / `close` / `bind`) plus a variant trait
//!   for its operation surface.
//! - **No-op defaults**: every slot starts populated with a placeholder that
//!   performs no work and never fails, so partially configured managers
//!   (tests, migration runs) need no special-casing.
//! - **Ordered phases**: `init` is fail-fast in dependency order (declared
//!   per subsystem, topologically sorted); `close` is best-effort in reverse
//!   order with per-subsystem failure reporting.
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut manager = Manager::new()
//!     .with_logger(Arc::new(LogStack::new()))
//!     .with_environment(Arc::new(EnvSettings::new()))
//!     .with_database(Arc::new(SqlDatabase::new()));
//! manager.init().await?;
//! // ... serve ...
//! manager.close().await?;
//! ```

pub use anyhow::Result;
pub use async_trait::async_trait;

pub mod context;
pub mod contracts;
pub mod hub;
pub mod manager;
pub mod model;
pub mod noop;
pub mod shutdown;

pub use context::ServiceCtx;
pub use contracts::{
    Cache, Database, Environment, Handlers, HttpServer, Logger, Subsystem, SubsystemKind, Tracer,
    Validator,
};
pub use hub::ServiceHub;
pub use manager::{CloseFailure, Manager, ManagerError};
pub use model::{NewUser, User, UserError, UserPatch};
pub use shutdown::{wait_for_shutdown, ShutdownSignal};
