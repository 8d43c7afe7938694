//! Cache subsystem backed by [`store::CacheHandle`].

use anyhow::Result;
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use store::CacheHandle;
use svckit::{async_trait, Cache, Environment as _, ServiceCtx, ServiceHub, Subsystem};

/// Connects the redis client during `init`, looking the address up from the
/// environment subsystem unless one was pinned explicitly. An empty address
/// leaves the subsystem disabled: `init` and `health` succeed without a
/// connection, which keeps a bare development process runnable.
#[derive(Default)]
pub struct RedisCache {
    address_override: Option<String>,
    hub: ArcSwapOption<ServiceHub>,
    handle: ArcSwapOption<CacheHandle>,
}

impl RedisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the address instead of looking it up from the environment
    /// subsystem.
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address_override: Some(address.into()),
            ..Self::default()
        }
    }

    /// The connected handle, `None` while disabled or before `init`.
    pub fn handle(&self) -> Option<Arc<CacheHandle>> {
        self.handle.load_full()
    }

    fn resolved_address(&self) -> String {
        if let Some(address) = &self.address_override {
            return address.clone();
        }
        match self.hub.load_full() {
            Some(hub) => hub.environment().cache_address(),
            None => String::new(),
        }
    }
}

#[async_trait]
impl Subsystem for RedisCache {
    async fn init(&self, _ctx: &ServiceCtx) -> Result<()> {
        let address = self.resolved_address();
        if address.is_empty() {
            tracing::debug!("no cache address configured, cache stays disabled");
            return Ok(());
        }

        let handle = CacheHandle::connect(&address).await?;
        handle.ping().await?;
        tracing::info!(address = %handle.address(), "cache connected");
        self.handle.store(Some(Arc::new(handle)));
        Ok(())
    }

    async fn health(&self, _ctx: &ServiceCtx) -> Result<()> {
        match self.handle.load_full() {
            Some(handle) => Ok(handle.ping().await?),
            None => Ok(()),
        }
    }

    async fn close(&self) -> Result<()> {
        if self.handle.swap(None).is_some() {
            // The manager-backed connection has no protocol-level shutdown;
            // dropping the handle releases it.
            tracing::debug!("cache connection dropped");
        }
        Ok(())
    }

    fn bind(&self, hub: ServiceHub) {
        self.hub.store(Some(Arc::new(hub)));
    }
}

impl Cache for RedisCache {}
