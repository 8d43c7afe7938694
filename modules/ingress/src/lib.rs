//! HTTP gateway subsystem.
//!
//! Owns the axum surface of the service: the router is assembled at `init`
//! over the read-only hub, `run` binds the listener and serves until
//! shutdown is requested, and `close` stops accepting, waits for in-flight
//! requests to drain, then returns. Request handling itself is a thin
//! dispatch into the handlers slot; persistence and validation live behind
//! that contract.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use axum::Router;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use svckit::{Environment as _, HttpServer, ServiceCtx, ServiceHub, Subsystem};

mod error;
mod request_id;
mod routes;

pub use error::{ApiError, ErrorBody};
pub use routes::router;

/// How long `close` waits for in-flight requests to finish.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// The http-server slot: axum over tower-http, serving the user routes.
#[derive(Default)]
pub struct HttpGateway {
    bind_override: Option<String>,
    hub: ArcSwapOption<ServiceHub>,
    router: Mutex<Option<Router>>,
    drain: CancellationToken,
    finished: Mutex<Option<oneshot::Receiver<()>>>,
}

impl HttpGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed bind address, skipping the environment lookup.
    pub fn with_bind_address(addr: impl Into<String>) -> Self {
        Self {
            bind_override: Some(addr.into()),
            ..Self::new()
        }
    }

    fn resolved_bind(&self) -> String {
        if let Some(addr) = &self.bind_override {
            return addr.clone();
        }
        match self.hub.load_full() {
            Some(hub) => hub.environment().http_address(),
            None => String::new(),
        }
    }

    fn assemble_router(&self) -> anyhow::Result<Router> {
        let Some(hub) = self.hub.load_full() else {
            anyhow::bail!("gateway is not bound to a manager");
        };
        Ok(routes::router((*hub).clone()))
    }
}

#[async_trait]
impl Subsystem for HttpGateway {
    async fn init(&self, _ctx: &ServiceCtx) -> anyhow::Result<()> {
        let router = self.assemble_router()?;
        *self.router.lock() = Some(router);
        tracing::debug!("gateway router assembled");
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.drain.cancel();
        let finished = { self.finished.lock().take() };
        if let Some(rx) = finished {
            // A dropped sender means the serve task is already gone, which
            // still counts as drained.
            if tokio::time::timeout(DRAIN_TIMEOUT, rx).await.is_err() {
                anyhow::bail!(
                    "http server did not drain within {}s",
                    DRAIN_TIMEOUT.as_secs()
                );
            }
        }
        Ok(())
    }

    fn bind(&self, hub: ServiceHub) {
        self.hub.store(Some(std::sync::Arc::new(hub)));
    }
}

#[async_trait]
impl HttpServer for HttpGateway {
    async fn run(&self, ctx: &ServiceCtx) -> anyhow::Result<()> {
        let bind = self.resolved_bind();
        if bind.is_empty() {
            anyhow::bail!("http bind address is not configured");
        }
        let addr: SocketAddr = bind
            .parse()
            .with_context(|| format!("invalid http bind address '{bind}'"))?;

        // Router from init; assembled on the fly when run is driven alone.
        let stored = { self.router.lock().take() };
        let router = match stored {
            Some(router) => router,
            None => self.assemble_router()?,
        };

        let (tx, rx) = oneshot::channel();
        *self.finished.lock() = Some(rx);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding http listener on {addr}"))?;
        tracing::info!(%addr, "http server listening");

        let drain = self.drain.clone();
        let cancel = ctx.cancellation_token().clone();
        let shutdown = async move {
            tokio::select! {
                _ = drain.cancelled() => {}
                _ = cancel.cancelled() => {}
            }
            tracing::info!("http server shutting down");
        };

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await;
        let _ = tx.send(());
        served.context("http server terminated abnormally")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use svckit::{Environment, Manager};

    #[derive(Debug, Default)]
    struct StubEnv;

    impl Subsystem for StubEnv {}

    impl Environment for StubEnv {
        fn http_address(&self) -> String {
            "127.0.0.1:9099".to_string()
        }
    }

    #[test]
    fn bind_override_wins_over_lookup() {
        let gateway = HttpGateway::with_bind_address("0.0.0.0:9999");
        assert_eq!(gateway.resolved_bind(), "0.0.0.0:9999");
    }

    #[test]
    fn unbound_gateway_resolves_nothing() {
        assert_eq!(HttpGateway::new().resolved_bind(), "");
    }

    #[test]
    fn address_comes_from_the_environment_slot() {
        let gateway = Arc::new(HttpGateway::new());
        let _manager = Manager::new()
            .with_environment(Arc::new(StubEnv))
            .with_http_server(gateway.clone());
        assert_eq!(gateway.resolved_bind(), "127.0.0.1:9099");
    }

    #[tokio::test]
    async fn close_without_a_running_server_is_immediate() {
        let gateway = HttpGateway::new();
        gateway.close().await.unwrap();
        gateway.close().await.unwrap();
    }

    #[tokio::test]
    async fn run_serves_until_close_then_drains() {
        let gateway = Arc::new(HttpGateway::with_bind_address("127.0.0.1:0"));
        let _manager = Manager::new().with_http_server(gateway.clone());

        let ctx = ServiceCtx::new();
        let serving = gateway.clone();
        let serve = tokio::spawn(async move { serving.run(&ctx).await });

        // Give the listener a moment; close is safe even if run has not
        // stored its drain receiver yet.
        tokio::time::sleep(Duration::from_millis(50)).await;
        gateway.close().await.unwrap();
        serve.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn run_rejects_a_malformed_bind_address() {
        let gateway = Arc::new(HttpGateway::with_bind_address("not-an-address"));
        let _manager = Manager::new().with_http_server(gateway.clone());

        let ctx = ServiceCtx::new();
        let err = gateway.run(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("not-an-address"));
    }
}
