//! Logging setup for harness runs.
//!
//! Console output always; a daily rolling file under the log directory when
//! one is configured. Library crates log through `log`, which is bridged into
//! `tracing`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, TimeDelta};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE_NAME: &str = "tuner-vts.log";

/// Resolved logging options.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Level directive used when `RUST_LOG` is not set.
    pub level: Option<String>,
    pub verbose: bool,
    pub log_dir: Option<PathBuf>,
    pub retention_days: u64,
}

impl LogOptions {
    /// Filter directive: `--verbose` wins over the configured level.
    fn default_directive(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            self.level.as_deref().unwrap_or("info")
        }
    }
}

/// Initialize console (and optionally file) logging.
pub fn init_logging(options: &LogOptions) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.default_directive()));

    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_timer(LocalTimeTimer);

    let file = match &options.log_dir {
        Some(log_dir) => {
            fs::create_dir_all(log_dir)?;
            clean_old_logs(log_dir, options.retention_days)?;

            let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            // The guard flushes on drop; keep it for the whole process.
            let _ = Box::leak(Box::new(guard));

            Some(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false)
                    .with_timer(LocalTimeTimer),
            )
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to set default subscriber: {}", e))?;

    tracing_log::LogTracer::init()
        .map_err(|e| format!("Failed to initialize LogTracer: {}", e))?;

    Ok(())
}

/// Remove harness log files older than `retention_days`. Zero keeps all.
fn clean_old_logs(log_dir: &Path, retention_days: u64) -> io::Result<()> {
    if retention_days == 0 || !log_dir.exists() {
        return Ok(());
    }

    // Retention too long to express as a date keeps everything.
    let Some(cutoff) = i64::try_from(retention_days)
        .ok()
        .and_then(TimeDelta::try_days)
        .and_then(|retention| Local::now().checked_sub_signed(retention))
    else {
        return Ok(());
    };

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_ours = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| name.starts_with(LOG_FILE_NAME));
        if !path.is_file() || !is_ours {
            continue;
        }

        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            let modified: chrono::DateTime<Local> = modified.into();
            if modified < cutoff {
                if let Err(e) = fs::remove_file(&path) {
                    eprintln!("Failed to remove old log file {:?}: {}", path, e);
                }
            }
        }
    }

    Ok(())
}

/// Custom timer for local time formatting in logs
#[derive(Debug, Clone, Copy)]
struct LocalTimeTimer;

impl fmt::time::FormatTime for LocalTimeTimer {
    fn format_time(&self, w: &mut fmt::format::Writer) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.6f"))
    }
}
