//! Tracing setup for one run.
//!
//! The console layer writes compact lines to stderr. The optional file layer
//! rolls files under [`Settings::log_dir`] and prunes old ones, so an
//! unattended node keeps a bounded history.

use crate::domain::settings::{LogRotation, Settings};
use std::io::IsTerminal;
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keeps the file writer alive until logs are flushed
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Never => Rotation::NEVER,
    }
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn console_ansi(wanted: bool, is_terminal: bool) -> bool {
    wanted && is_terminal
}

pub fn init_logger(settings: &Settings) -> anyhow::Result<LoggingGuard> {
    let log = &settings.log_settings;

    let console_layer = log.console_logging_enabled.then(|| {
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(log.show_target)
            .with_ansi(console_ansi(log.ansi_colors, std::io::stderr().is_terminal()))
    });

    let mut file_guard = None;
    let file_layer = if log.file_logging_enabled {
        let dir = settings.log_dir()?;
        let appender = RollingFileAppender::builder()
            .rotation(rotation(log.rotation))
            .filename_prefix(log.file_name_prefix.clone())
            .filename_suffix("log")
            .max_log_files(log.max_log_files.max(1))
            .build(&dir)?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);
        Some(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(log.show_target),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(level_filter(&log.level))
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    if log.file_logging_enabled {
        tracing::debug!("Logging to {}", settings.log_dir()?.display());
    }

    Ok(LoggingGuard { _file: file_guard })
}
