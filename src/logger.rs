//! Logging for the CLI and the pipeline
//!
//! Plain `log` records and structured `tracing` events (the pipeline's
//! `case_id`, `group`, `attempt` and `delay_ms` fields) end up in the same
//! sink: an append-only log file, stderr, or both.

use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Transport crates that are only logged in verbose mode
const NOISY_TARGETS: [&str; 7] = [
    "reqwest",
    "hyper",
    "h2",
    "rustls",
    "want",
    "mio",
    "tokio_retry",
];

/// Where log output goes and how much of it
#[derive(Default)]
struct Sinks {
    enabled: bool,
    verbose: bool,
    stderr: bool,
    file: Option<File>,
}

impl Sinks {
    fn write_line(&mut self, bytes: &[u8]) {
        if !self.enabled {
            return;
        }
        if let Some(file) = self.file.as_mut() {
            let _ = file.write_all(bytes);
            let _ = file.flush();
        }
        if self.stderr {
            let _ = io::stderr().write_all(bytes);
        }
    }
}

static SINKS: std::sync::LazyLock<Mutex<Sinks>> =
    std::sync::LazyLock::new(|| Mutex::new(Sinks::default()));

struct CasedocsLogger;

static LOGGER: CasedocsLogger = CasedocsLogger;

/// `MakeWriter` that routes formatted tracing events into the shared sinks
#[derive(Clone, Copy)]
struct SinkWriter;

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        SINKS.lock().write_line(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> fmt::MakeWriter<'a> for SinkWriter {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter
    }
}

fn is_noisy(target: &str) -> bool {
    NOISY_TARGETS.iter().any(|noisy| target.starts_with(noisy)) || target.contains("connection")
}

impl log::Log for CasedocsLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        if metadata.level() > Level::Debug {
            return false;
        }
        let sinks = SINKS.lock();
        if !sinks.enabled {
            return false;
        }
        metadata.target().starts_with("casedocs") || sinks.verbose || !is_noisy(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "{} {} [{}] - {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        );
        SINKS.lock().write_line(line.as_bytes());
    }

    fn flush(&self) {}
}

/// Install the `log` logger and the tracing subscriber.
///
/// Safe to call more than once; later calls report the first outcome.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    static INIT_RESULT: std::sync::OnceLock<Result<(), String>> = std::sync::OnceLock::new();

    let result = INIT_RESULT.get_or_init(|| {
        let verbose_from_env = std::env::var("CASEDOCS_VERBOSE").is_ok()
            || std::env::var("RUST_LOG").is_ok_and(|v| v.contains("debug") || v.contains("trace"));
        set_verbose_logging(verbose_from_env);

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("casedocs=debug,warn"));

        let fmt_layer = fmt::Layer::new()
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_timer(fmt::time::ChronoUtc::rfc_3339())
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(SinkWriter);

        let tracing_result = Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init();
        let log_result = log::set_logger(&LOGGER).map(|()| log::set_max_level(LevelFilter::Debug));

        match (tracing_result, log_result) {
            (Err(tracing_err), Err(log_err)) => Err(format!(
                "Failed to initialize logging: tracing={tracing_err}, log={log_err}"
            )),
            (Err(tracing_err), Ok(())) => {
                eprintln!("Note: structured pipeline events disabled ({tracing_err})");
                Ok(())
            }
            _ => Ok(()),
        }
    });

    result.clone().map_err(Into::into)
}

pub fn enable_logging() {
    SINKS.lock().enabled = true;
}

pub fn disable_logging() {
    SINKS.lock().enabled = false;
}

/// Let transport crates (reqwest, hyper, rustls) through the `log` filter
pub fn set_verbose_logging(enabled: bool) {
    SINKS.lock().verbose = enabled;
}

/// Append log output to `file_path`, creating it if needed
pub fn set_log_file(file_path: impl AsRef<Path>) -> io::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file_path)?;
    SINKS.lock().file = Some(file);
    Ok(())
}

/// Mirror log output to stderr, alongside or instead of the log file
pub fn set_log_to_stdout(enabled: bool) {
    SINKS.lock().stderr = enabled;
}

// Macros for casedocs logging
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        log::debug!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        log::error!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        log::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        log::warn!($($arg)*)
    };
}

// Structured events; fields such as case_id, group and attempt reach the log output
#[macro_export]
macro_rules! trace_debug {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[macro_export]
macro_rules! trace_info {
    ($($arg:tt)*) => {
        tracing::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! trace_warn {
    ($($arg:tt)*) => {
        tracing::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! trace_error {
    ($($arg:tt)*) => {
        tracing::error!($($arg)*)
    };
}
