//! Global log subscriber installed as the logger subsystem.
//!
//! A console `fmt` layer is always present; a JSON file layer backed by a
//! size-rotated writer is added when a file path is configured. The level
//! comes from `RUST_LOG` when set, otherwise from [`LogConfig`].

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::Result;
use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};
use svckit::{async_trait, Logger, ServiceCtx, Subsystem};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Clone, Debug)]
pub struct LogConfig {
    /// Level filter used when `RUST_LOG` is unset. Accepts anything an
    /// `EnvFilter` accepts ("info", "debug,sea_orm=warn", ...).
    pub default_level: String,
    /// JSON log file; `None` keeps logging console-only.
    pub file: Option<PathBuf>,
    /// Rotate the file once it surpasses this size.
    pub max_size_mb: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            file: None,
            max_size_mb: 100,
        }
    }
}

// -------- rotating writer for files --------

#[derive(Clone)]
struct RotWriter(Arc<Mutex<FileRotate<AppendTimestamp>>>);

impl RotWriter {
    /// Create a rotating writer, ensuring the parent directory exists.
    fn create(log_path: &Path, max_bytes: usize) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let rot = FileRotate::new(
            log_path,
            AppendTimestamp::default(FileLimit::Age(chrono::Duration::days(1))),
            ContentLimit::BytesSurpassed(max_bytes),
            Compression::None,
            #[cfg(unix)]
            None, // file permissions (Unix only)
        );

        Ok(Self(Arc::new(Mutex::new(rot))))
    }

    fn flush(&self) -> std::io::Result<()> {
        match self.0.lock() {
            Ok(mut rot) => rot.flush(),
            Err(_) => Ok(()),
        }
    }
}

impl<'a> fmt::MakeWriter<'a> for RotWriter {
    type Writer = RotWriterHandle;
    fn make_writer(&'a self) -> Self::Writer {
        RotWriterHandle(self.0.clone())
    }
}

#[derive(Clone)]
struct RotWriterHandle(Arc<Mutex<FileRotate<AppendTimestamp>>>);

impl Write for RotWriterHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.0.lock() {
            Ok(mut rot) => rot.write(buf),
            // A poisoned writer drops the record rather than killing the caller.
            Err(_) => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.0.lock() {
            Ok(mut rot) => rot.flush(),
            Err(_) => Ok(()),
        }
    }
}

// -------- the subsystem --------

/// Installs the process-wide subscriber during `init` and flushes the file
/// writer during `close`. An already-installed subscriber (tests, repeated
/// setup) is tolerated, never an error.
pub struct LogStack {
    config: LogConfig,
    writer: parking_lot::Mutex<Option<RotWriter>>,
}

impl LogStack {
    pub fn new(config: LogConfig) -> Self {
        Self {
            config,
            writer: parking_lot::Mutex::new(None),
        }
    }
}

impl Default for LogStack {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}

#[async_trait]
impl Subsystem for LogStack {
    async fn init(&self, _ctx: &ServiceCtx) -> Result<()> {
        // Bridge `log` → `tracing` before installing the subscriber.
        let _ = tracing_log::LogTracer::init();

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level));

        let ansi = atty::is(atty::Stream::Stdout);
        let console_layer = fmt::layer()
            .with_ansi(ansi)
            .with_target(true)
            .with_level(true)
            .with_timer(fmt::time::UtcTime::rfc_3339());

        let file_layer = match &self.config.file {
            Some(path) => {
                let max_bytes = self.config.max_size_mb as usize * 1024 * 1024;
                let writer = RotWriter::create(path, max_bytes)?;
                let layer = fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_target(true)
                    .with_level(true)
                    .with_timer(fmt::time::UtcTime::rfc_3339())
                    .with_writer(writer.clone());
                *self.writer.lock() = Some(writer);
                Some(layer)
            }
            None => None,
        };

        if let Err(err) = tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()
        {
            tracing::debug!(%err, "log subscriber already installed, keeping it");
        }

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Some(writer) = self.writer.lock().take() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Logger for LogStack {}
