use std::{path::PathBuf, str::FromStr};

use serde::Deserialize;
use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer, filter::FilterFn, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

use crate::log_file::RotatingFile;

#[macro_export]
macro_rules! log {
    ($level:expr, $span:expr, $($msg:expr),*) => {{
        let span = $crate::tracing::span!($level, $span);
        let _enter = span.enter();

        $crate::tracing::event!($level, $($msg),*)
    }};
}

#[macro_export]
macro_rules! outgoing {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "outgoing", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::outgoing!(level = TRACE, $($msg),*)
    };
}

#[macro_export]
macro_rules! incoming {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "incoming", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::incoming!(level = TRACE, $($msg),*)
    };
}

#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "internal", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::internal!(level = TRACE, $($msg),*)
    };
}

const fn default_file_size() -> u64 {
    1_000_000
}

const fn default_file_count() -> usize {
    10
}

/// The `[logging]` section of the configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// One of `trace`, `debug`, `info`, `warn`, `error` or `none`.
    ///
    /// `none` keeps only errors. The `LOG_LEVEL` environment variable wins
    /// over this value when both are set.
    #[serde(default)]
    pub level: Option<String>,

    /// Emit one JSON object per event instead of the compact format
    #[serde(default)]
    pub json: bool,

    /// Also write events to this file, rotating by size
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Bytes before the log file rolls over; 0 never rolls
    #[serde(default = "default_file_size")]
    pub size: u64,

    /// Rolled-over files to keep
    #[serde(default = "default_file_count")]
    pub count: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: None,
            json: false,
            file: None,
            size: default_file_size(),
            count: default_file_count(),
        }
    }
}

fn parse_level(level: &str) -> Option<LevelFilter> {
    if level.eq_ignore_ascii_case("none") {
        return Some(LevelFilter::ERROR);
    }

    LevelFilter::from_str(level).ok()
}

impl LogConfig {
    /// Resolve the effective level filter
    ///
    /// Precedence: `LOG_LEVEL`, then the configured level, then the build
    /// profile default.
    #[must_use]
    pub fn level_filter(&self) -> LevelFilter {
        let default = if cfg!(debug_assertions) {
            LevelFilter::TRACE
        } else {
            LevelFilter::INFO
        };

        let configured = std::env::var("LOG_LEVEL").ok().or_else(|| self.level.clone());

        configured.map_or(default, |level| {
            parse_level(&level).unwrap_or_else(|| {
                eprintln!("Invalid log level specified {level}, defaulting to {default}");
                default
            })
        })
    }
}

/// Install the global subscriber
///
/// Only events emitted from the relay crates pass the filter. Events go to
/// stdout and, when `file` is set, to the rotating log file as well.
///
/// # Errors
/// If the log file cannot be opened
pub fn init(config: &LogConfig) -> std::io::Result<()> {
    let level = config.level_filter();
    let relay_only = || FilterFn::new(|metadata| metadata.target().starts_with("relay"));

    let file_layer = match &config.file {
        Some(path) => {
            let writer = RotatingFile::open(path, config.size, config.count)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                    .with_filter(level)
                    .with_filter(relay_only()),
            )
        }
        None => None,
    };

    let registry = tracing_subscriber::Registry::default().with(file_layer);

    if config.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                    .with_filter(level)
                    .with_filter(relay_only()),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_file(false)
                    .with_line_number(false)
                    .compact()
                    .with_ansi(true)
                    .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                    .with_filter(level)
                    .with_filter(relay_only()),
            )
            .init();
    }

    Ok(())
}
