//! Relational database subsystem backed by [`store::DbHandle`].

use anyhow::{bail, Result};
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use store::{ConnectOpts, DbHandle};
use svckit::{async_trait, Database, Environment as _, ServiceCtx, ServiceHub, Subsystem};

/// Opens the pool during `init` against the configured DSN, either an
/// explicit override or the environment subsystem's `database_dsn`.
/// `health` pings the pool; `close` shuts it down.
#[derive(Default)]
pub struct SqlDatabase {
    dsn_override: Option<String>,
    opts: ConnectOpts,
    hub: ArcSwapOption<ServiceHub>,
    handle: ArcSwapOption<DbHandle>,
}

impl SqlDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the DSN instead of looking it up from the environment subsystem.
    pub fn with_dsn(dsn: impl Into<String>) -> Self {
        Self {
            dsn_override: Some(dsn.into()),
            ..Self::new()
        }
    }

    pub fn with_connect_opts(mut self, opts: ConnectOpts) -> Self {
        self.opts = opts;
        self
    }

    fn resolved_dsn(&self) -> String {
        if let Some(dsn) = &self.dsn_override {
            return dsn.clone();
        }
        match self.hub.load_full() {
            Some(hub) => hub.environment().database_dsn(),
            None => String::new(),
        }
    }
}

#[async_trait]
impl Subsystem for SqlDatabase {
    async fn init(&self, _ctx: &ServiceCtx) -> Result<()> {
        let dsn = self.resolved_dsn();
        if dsn.is_empty() {
            bail!("database DSN is not configured");
        }

        let handle = DbHandle::connect(&dsn, self.opts.clone()).await?;
        tracing::info!(engine = ?handle.engine(), "database connected");
        self.handle.store(Some(Arc::new(handle)));
        Ok(())
    }

    async fn health(&self, _ctx: &ServiceCtx) -> Result<()> {
        match self.handle.load_full() {
            Some(handle) => Ok(handle.ping().await?),
            None => bail!("database is not connected"),
        }
    }

    async fn close(&self) -> Result<()> {
        if let Some(handle) = self.handle.swap(None) {
            handle.close().await?;
            tracing::debug!("database pool closed");
        }
        Ok(())
    }

    fn bind(&self, hub: ServiceHub) {
        self.hub.store(Some(Arc::new(hub)));
    }
}

impl Database for SqlDatabase {
    fn handle(&self) -> Option<Arc<DbHandle>> {
        self.handle.load_full()
    }
}
