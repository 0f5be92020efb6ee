use crate::models::ProcessingRecord;
use anyhow::Result;
use log::{debug, error, info, trace, warn, LevelFilter};
use std::sync::Once;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static INIT: Once = Once::new();

fn bridge_log_crate(level: LevelFilter) {
    // After the subscriber is installed, so `log` records reach it
    if let Err(e) = LogTracer::init() {
        tracing::debug!("log bridge already installed: {}", e);
    }
    log::set_max_level(level);
}

/// Initialize logger from configuration. With file logging enabled, output
/// goes to a daily rolling file under `log_dir`; keep the returned guard
/// alive until shutdown so buffered lines are flushed.
pub fn init_logger_with_config(
    log_level: &str,
    enable_file_logging: bool,
    log_dir: &str,
) -> Option<WorkerGuard> {
    let mut guard = None;

    INIT.call_once(|| {
        let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
        let level = log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);

        if enable_file_logging {
            let file_appender = tracing_appender::rolling::daily(log_dir, "appliance-pool.log");
            let (writer, worker_guard) = tracing_appender::non_blocking(file_appender);
            FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_target(false)
                .with_thread_ids(true)
                .with_ansi(false)
                .init();
            guard = Some(worker_guard);
        } else {
            FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_target(false)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .init();
        }

        bridge_log_crate(level);
    });

    guard
}

/// Log a processed request as JSON (debug level only)
pub fn log_record(record: &ProcessingRecord) -> Result<()> {
    let message = serde_json::to_string(record)?;
    debug!("REQUEST: {}", message);
    Ok(())
}

/// Log an error message
pub fn log_error(message: &str) {
    error!("{}", message);
}

/// Log an info message
pub fn log_info(message: &str) {
    info!("{}", message);
}

/// Log a warning message
pub fn log_warning(message: &str) {
    warn!("{}", message);
}

/// Log a debug message
pub fn log_debug(message: &str) {
    debug!("{}", message);
}

/// Log a trace message
pub fn log_trace(message: &str) {
    trace!("{}", message);
}

/// Convenience macro for logging processed requests
#[macro_export]
macro_rules! log_processing_record {
    ($record:expr) => {
        if let Err(e) = $crate::logging::log_record($record) {
            eprintln!("Failed to log request record: {}", e);
        }
    };
}

/// Convenience macro for logging errors
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::log_error(&format!($($arg)*));
    };
}

/// Convenience macro for logging info messages
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::log_info(&format!($($arg)*));
    };
}

/// Convenience macro for logging warning messages
#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {
        $crate::logging::log_warning(&format!($($arg)*));
    };
}

/// Convenience macro for logging debug messages
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logging::log_debug(&format!($($arg)*));
    };
}

/// Convenience macro for logging trace messages
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        $crate::logging::log_trace(&format!($($arg)*));
    };
}
