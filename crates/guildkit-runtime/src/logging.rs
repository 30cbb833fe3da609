//! Logging setup on top of `tracing-subscriber`.
//!
//! [`GuildkitRuntime`](crate::GuildkitRuntime) calls [`init_from_config`]
//! with the `[logging]` section while it builds.  A subscriber installed by
//! the embedding program beforehand is kept.
//!
//! ```rust,ignore
//! use guildkit_runtime::logging::LoggingBuilder;
//! use guildkit_runtime::config::LogFormat;
//!
//! LoggingBuilder::new()
//!     .format(LogFormat::Pretty)
//!     .directive("guildkit_framework::store=trace")
//!     .init();
//! ```
//!
//! `RUST_LOG`, when set, replaces the configured base level.  Per-target
//! directives are added on top either way.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

const DEFAULT_LOG_FILE: &str = "guildkit.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initializes logging from the `[logging]` section.  A subscriber that is
/// already installed is left in place.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// Span lifecycle events to log.  Dispatch runs inside a `dispatch` span and
/// each command handler inside a `command` span, so `new` plus `close` times
/// every inbound event.
fn fmt_span(events: &SpanEventConfig) -> FmtSpan {
    [
        (events.new, FmtSpan::NEW),
        (events.enter, FmtSpan::ENTER),
        (events.exit, FmtSpan::EXIT),
        (events.close, FmtSpan::CLOSE),
    ]
    .into_iter()
    .filter(|(enabled, _)| *enabled)
    .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
}

/// Subscriber settings, normally taken from [`LoggingConfig`].
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: LogLevel,
    directives: Vec<String>,
    format: LogFormat,
    output: LogOutput,
    file_path: Option<PathBuf>,
    rotation: LogRotation,
    span_events: FmtSpan,
    thread_ids: bool,
    file_location: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    /// Settings of an empty `[logging]` section.
    pub fn new() -> Self {
        Self::from_config(&LoggingConfig::default())
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            level: config.level,
            directives: config
                .filters
                .iter()
                .map(|(target, level)| format!("{target}={level}"))
                .collect(),
            format: config.format,
            output: config.output,
            file_path: config.file_path.clone(),
            rotation: config.rotation,
            span_events: fmt_span(&config.span_events),
            thread_ids: config.thread_ids,
            file_location: config.file_location,
        }
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `guildkit_framework::store=trace`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Log file for [`LogOutput::File`], rotated per [`LogRotation`].
    pub fn file(mut self, path: impl Into<PathBuf>, rotation: LogRotation) -> Self {
        self.file_path = Some(path.into());
        self.rotation = rotation;
        self
    }

    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the subscriber, failing if one is already set.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let (format, json_unavailable) = self.effective_format();
        let (writer, missing_file) = self.writer();

        tracing_subscriber::registry()
            .with(self.layer(format, writer))
            .with(self.filter())
            .try_init()?;

        if json_unavailable {
            warn!("JSON log format requested without the `json-log` feature, using full format");
        }
        if missing_file {
            warn!("File output requested but no file path configured, falling back to stdout");
        }
        Ok(())
    }

    fn filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()));
        for directive in &self.directives {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => eprintln!("ignoring log directive `{directive}`: {e}"),
            }
        }
        filter
    }

    /// JSON needs the `json-log` feature; without it the full format is used
    /// and the second value is `true`.
    fn effective_format(&self) -> (LogFormat, bool) {
        match self.format {
            #[cfg(not(feature = "json-log"))]
            LogFormat::Json => (LogFormat::Full, true),
            format => (format, false),
        }
    }

    /// The writer for the configured output.  The second value is `true` when
    /// file output was requested without a path.
    fn writer(&self) -> (BoxMakeWriter, bool) {
        match (self.output, self.file_path.as_deref()) {
            (LogOutput::Stdout, _) => (BoxMakeWriter::new(std::io::stdout), false),
            (LogOutput::Stderr, _) => (BoxMakeWriter::new(std::io::stderr), false),
            (LogOutput::File, Some(path)) => (BoxMakeWriter::new(self.appender(path)), false),
            (LogOutput::File, None) => (BoxMakeWriter::new(std::io::stdout), true),
        }
    }

    fn appender(&self, path: &Path) -> RollingFileAppender {
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = path
            .file_name()
            .unwrap_or_else(|| OsStr::new(DEFAULT_LOG_FILE));
        match self.rotation {
            LogRotation::Never => tracing_appender::rolling::never(directory, file_name),
            LogRotation::Hourly => tracing_appender::rolling::hourly(directory, file_name),
            LogRotation::Daily => tracing_appender::rolling::daily(directory, file_name),
        }
    }

    fn layer(&self, format: LogFormat, writer: BoxMakeWriter) -> BoxedLayer {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(self.span_events.clone())
            .with_thread_ids(self.thread_ids)
            .with_file(self.file_location)
            .with_line_number(self.file_location);
        match format {
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            _ => layer.boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_collects_filters() {
        let mut config = LoggingConfig {
            level: LogLevel::Warn,
            file_location: true,
            ..Default::default()
        };
        config
            .filters
            .insert("guildkit_framework".to_string(), LogLevel::Trace);

        let builder = LoggingBuilder::from_config(&config).directive("guildkit_runtime=debug");
        assert_eq!(builder.level, LogLevel::Warn);
        assert_eq!(
            builder.directives,
            vec!["guildkit_framework=trace", "guildkit_runtime=debug"]
        );
        assert!(builder.file_location);
    }

    #[test]
    fn test_span_events_combine() {
        let lifecycle = SpanEventConfig {
            new: true,
            close: true,
            ..Default::default()
        };
        assert_eq!(fmt_span(&lifecycle), FmtSpan::NEW | FmtSpan::CLOSE);
        assert_eq!(fmt_span(&SpanEventConfig::default()), FmtSpan::NONE);
    }

    #[test]
    fn test_file_output_without_path_uses_stdout() {
        let builder = LoggingBuilder::new().output(LogOutput::File);
        assert!(builder.writer().1);

        let dir = tempfile::tempdir().unwrap();
        let builder = builder.file(dir.path().join("bot.log"), LogRotation::Daily);
        assert!(!builder.writer().1);
    }

    #[cfg(not(feature = "json-log"))]
    #[test]
    fn test_json_falls_back_without_feature() {
        let builder = LoggingBuilder::new().format(LogFormat::Json);
        assert_eq!(builder.effective_format(), (LogFormat::Full, true));
    }
}
