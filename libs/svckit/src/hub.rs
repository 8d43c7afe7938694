//! Slot storage and the read-only locator handed to subsystems.
//!
//! The table keeps exactly one `Arc<dyn Variant>` per slot behind a
//! `parking_lot::RwLock`; construction seeds every slot with its no-op
//! placeholder, so a lookup never sees an absent implementation. Replacing a
//! slot swaps the Arc atomically; clones already held by readers stay valid.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::contracts::{
    Cache, Database, Environment, Handlers, HttpServer, Logger, Tracer, Validator,
};
use crate::noop::{
    NoopCache, NoopDatabase, NoopEnvironment, NoopHandlers, NoopHttpServer, NoopLogger, NoopTracer,
    NoopValidator,
};

pub(crate) struct SlotTable {
    pub(crate) environment: RwLock<Arc<dyn Environment>>,
    pub(crate) logger: RwLock<Arc<dyn Logger>>,
    pub(crate) database: RwLock<Arc<dyn Database>>,
    pub(crate) cache: RwLock<Arc<dyn Cache>>,
    pub(crate) validator: RwLock<Arc<dyn Validator>>,
    pub(crate) http_server: RwLock<Arc<dyn HttpServer>>,
    pub(crate) handlers: RwLock<Arc<dyn Handlers>>,
    pub(crate) tracer: RwLock<Arc<dyn Tracer>>,
}

impl SlotTable {
    pub(crate) fn with_defaults() -> Self {
        Self {
            environment: RwLock::new(Arc::new(NoopEnvironment)),
            logger: RwLock::new(Arc::new(NoopLogger)),
            database: RwLock::new(Arc::new(NoopDatabase)),
            cache: RwLock::new(Arc::new(NoopCache)),
            validator: RwLock::new(Arc::new(NoopValidator)),
            http_server: RwLock::new(Arc::new(NoopHttpServer)),
            handlers: RwLock::new(Arc::new(NoopHandlers)),
            tracer: RwLock::new(Arc::new(NoopTracer)),
        }
    }
}

/// Read-only locator over the manager's slots.
///
/// Subsystems receive a clone at bind time and resolve siblings lazily, at
/// the moment they need them: the cache reads its address from the
/// environment inside its own `init`, the handlers reach the database inside
/// each request-handling call. There is deliberately no way to reconfigure a
/// slot through this handle.
#[derive(Clone)]
pub struct ServiceHub {
    slots: Arc<SlotTable>,
}

impl ServiceHub {
    pub(crate) fn new(slots: Arc<SlotTable>) -> Self {
        Self { slots }
    }

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
}

impl fmt::Debug for ServiceHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHub").finish_non_exhaustive()
    }
}
