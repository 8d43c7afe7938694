//! Cache connection handle built on a reconnecting redis manager.

use std::fmt;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::Result;

/// Handle over a multiplexed redis connection; the manager re-establishes
/// the connection after transient failures. Clones share the connection.
#[derive(Clone)]
pub struct CacheHandle {
    address: String,
    manager: ConnectionManager,
}

impl CacheHandle {
    /// Connect to the given address. Bare `host:port` values are accepted
    /// and treated as `redis://host:port`.
    pub async fn connect(address: &str) -> Result<Self> {
        let url = normalize_address(address);
        let client = Client::open(url.as_str())?;
        let manager = ConnectionManager::new(client).await?;
        tracing::debug!(address = %url, "cache connection opened");

        Ok(Self {
            address: url,
            manager,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Round-trip liveness probe.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    /// Store a value, with an optional expiry.
    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.manager.clone();
        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    pub async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

impl fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHandle")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Scheme-qualified addresses pass through untouched; anything else is
/// assumed to be `host:port`.
pub fn normalize_address(address: &str) -> String {
    let s = address.trim();
    if s.starts_with("redis://")
        || s.starts_with("rediss://")
        || s.starts_with("redis+unix://")
        || s.starts_with("unix://")
    {
        s.to_string()
    } else {
        format!("redis://{s}")
    }
}
