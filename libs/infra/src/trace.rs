//! Span export subsystem: OTLP pipeline installed as the global tracer
//! provider.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use arc_swap::ArcSwapOption;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    runtime,
    trace::{self, BatchConfigBuilder, RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use parking_lot::Mutex;
use svckit::{async_trait, Environment as _, ServiceCtx, ServiceHub, Subsystem, Tracer};

const BATCH_SCHEDULE: Duration = Duration::from_secs(3);

/// Builds the OTLP/gRPC batch pipeline during `init` and registers it as
/// the global provider; `close` shuts the provider down, flushing buffered
/// spans. With no endpoint configured the subsystem stays disabled and the
/// whole lifecycle is a no-op.
#[derive(Default)]
pub struct OtelTracer {
    endpoint_override: Option<String>,
    hub: ArcSwapOption<ServiceHub>,
    provider: Mutex<Option<TracerProvider>>,
}

impl OtelTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the collector endpoint instead of looking it up from the
    /// environment subsystem.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint_override: Some(endpoint.into()),
            ..Self::default()
        }
    }

    fn resolved_endpoint(&self) -> String {
        if let Some(endpoint) = &self.endpoint_override {
            return endpoint.clone();
        }
        match self.hub.load_full() {
            Some(hub) => hub.environment().trace_endpoint(),
            None => String::new(),
        }
    }

    fn resource(&self) -> Resource {
        let (service, version, environment) = match self.hub.load_full() {
            Some(hub) => {
                let env = hub.environment();
                (env.service(), env.version(), env.environment())
            }
            None => Default::default(),
        };

        let or = |value: String, fallback: &str| {
            if value.is_empty() {
                fallback.to_string()
            } else {
                value
            }
        };

        Resource::new(vec![
            KeyValue::new("service.name", or(service, "userd")),
            KeyValue::new("service.version", or(version, env!("CARGO_PKG_VERSION"))),
            KeyValue::new("deployment.environment", or(environment, "development")),
        ])
    }
}

#[async_trait]
impl Subsystem for OtelTracer {
    async fn init(&self, _ctx: &ServiceCtx) -> Result<()> {
        let endpoint = self.resolved_endpoint();
        if endpoint.is_empty() {
            tracing::debug!("no trace endpoint configured, span export stays disabled");
            return Ok(());
        }

        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(&endpoint);

        let provider = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(exporter)
            .with_trace_config(
                trace::Config::default()
                    .with_sampler(Sampler::AlwaysOn)
                    .with_id_generator(RandomIdGenerator::default())
                    .with_resource(self.resource()),
            )
            .with_batch_config(
                BatchConfigBuilder::default()
                    .with_scheduled_delay(BATCH_SCHEDULE)
                    .build(),
            )
            .install_batch(runtime::Tokio)?;

        opentelemetry::global::set_tracer_provider(provider.clone());
        tracing::info!(endpoint = %endpoint, "span export enabled");
        *self.provider.lock() = Some(provider);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let provider = self.provider.lock().take();
        if let Some(provider) = provider {
            provider.shutdown()?;
            tracing::debug!("tracer provider shut down");
        }
        Ok(())
    }

    fn bind(&self, hub: ServiceHub) {
        self.hub.store(Some(Arc::new(hub)));
    }
}

impl Tracer for OtelTracer {}
