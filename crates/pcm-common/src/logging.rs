//! Logging setup shared by PCM binaries
//!
//! [`init_logging`] installs a global `tracing` subscriber with a console
//! sink, a daily rolling file sink, or both. Each sink writes either
//! human-readable text or one JSON object per line.
//!
//! Prefer structured fields over interpolated strings:
//!
//! ```rust,ignore
//! info!(job_id = %job_id, dataset = %kind, inserted, "Chunk stored");
//! ```
//!
//! # Example
//!
//! ```no_run
//! use pcm_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     // Dropping the guard flushes buffered file output
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("started");
//!     Ok(())
//! }
//! ```

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Which sinks receive log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sinks {
    #[default]
    Console,
    File,
    Both,
}

impl Sinks {
    fn console(self) -> bool {
        self != Sinks::File
    }

    fn file(self) -> bool {
        self != Sinks::Console
    }
}

impl FromStr for Sinks {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "console" | "stdout" => Ok(Sinks::Console),
            "file" => Ok(Sinks::File),
            "both" => Ok(Sinks::Both),
            other => Err(anyhow!("LOG_OUTPUT must be console, file or both (got '{}')", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LineFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LineFormat::Text),
            "json" => Ok(LineFormat::Json),
            other => Err(anyhow!("LOG_FORMAT must be text or json (got '{}')", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base level; `RUST_LOG` and `filter` refine it
    pub level: Level,
    pub sinks: Sinks,
    pub format: LineFormat,
    pub log_dir: PathBuf,
    /// Rolling file prefix, e.g. "pcm-server" -> "pcm-server.2026-01-05"
    pub file_prefix: String,
    /// Extra directives such as "sqlx=warn,tower_http=debug"
    pub filter: Option<String>,
    pub source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            sinks: Sinks::Console,
            format: LineFormat::Text,
            log_dir: PathBuf::from("./logs"),
            file_prefix: "pcm".to_string(),
            filter: None,
            source_location: false,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env()
    }

    /// Overlay `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR`,
    /// `LOG_FILE_PREFIX`, `LOG_FILTER` and `LOG_SOURCE_LOCATION`
    pub fn merge_env(mut self) -> Result<Self> {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        if let Some(level) = var("LOG_LEVEL") {
            self.level = level
                .trim()
                .parse()
                .map_err(|_| anyhow!("LOG_LEVEL '{}' is not a tracing level", level))?;
        }
        if let Some(sinks) = var("LOG_OUTPUT") {
            self.sinks = sinks.trim().parse()?;
        }
        if let Some(format) = var("LOG_FORMAT") {
            self.format = format.trim().parse()?;
        }
        if let Some(dir) = var("LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = var("LOG_FILE_PREFIX") {
            self.file_prefix = prefix;
        }
        if let Some(filter) = var("LOG_FILTER") {
            self.filter = Some(filter);
        }
        if let Some(flag) = var("LOG_SOURCE_LOCATION") {
            self.source_location = matches!(flag.trim(), "1" | "true" | "yes");
        }

        Ok(self)
    }

    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::from_default_env().add_directive(self.level.into());

        let directives = self.filter.as_deref().unwrap_or_default();
        for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            filter = filter.add_directive(
                directive
                    .parse()
                    .with_context(|| format!("Invalid log filter directive '{}'", directive))?,
            );
        }

        Ok(filter)
    }
}

#[derive(Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    pub fn level(mut self, level: Level) -> Self {
        self.config.level = level;
        self
    }

    pub fn sinks(mut self, sinks: Sinks) -> Self {
        self.config.sinks = sinks;
        self
    }

    pub fn format(mut self, format: LineFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    pub fn log_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.file_prefix = prefix.into();
        self
    }

    pub fn filter_directives(mut self, filter: impl Into<String>) -> Self {
        self.config.filter = Some(filter.into());
        self
    }

    pub fn build(self) -> LogConfig {
        self.config
    }
}

type BoxedLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

/// Install the global subscriber
///
/// Returns the file writer's guard when a file sink is configured; keep it
/// alive until the process exits.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let mut sinks: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;

    if config.sinks.console() {
        sinks.push(sink(config, std::io::stdout, true));
    }
    if config.sinks.file() {
        std::fs::create_dir_all(&config.log_dir).with_context(|| {
            format!("Failed to create log directory {}", config.log_dir.display())
        })?;
        let (writer, file_guard) = tracing_appender::non_blocking(
            tracing_appender::rolling::daily(&config.log_dir, &config.file_prefix),
        );
        sinks.push(sink(config, writer, false));
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(config.env_filter()?)
        .with(sinks)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(guard)
}

fn sink<W>(config: &LogConfig, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_span_events(FmtSpan::CLOSE);

    match config.format {
        LineFormat::Text => layer.boxed(),
        LineFormat::Json => layer.json().boxed(),
    }
}
