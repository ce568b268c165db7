//! Host logging bootstrap and fault summaries.
//!
//! # Responsibility
//! - Start one size-rotated file logger per process for the host.
//! - Turn panics caught around modules, components and event handlers into
//!   single-line log fields.
//!
//! # Invariants
//! - The first successful `init_logging` fixes level and directory; later
//!   calls succeed only with the same pair.
//! - Nothing in this module panics.
//! - Log lines carry metadata only (ids, counts); never props payloads.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "slotboard";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

/// Log levels accepted by `init_logging` and host config.
pub const SUPPORTED_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

static ACTIVE_LOGGER: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

/// Level and directory a logger was (or would be) started with.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogTarget {
    level: &'static str,
    dir: PathBuf,
}

impl LogTarget {
    fn parse(level: &str, log_dir: &str) -> Result<Self, String> {
        Ok(Self {
            level: normalize_level(level)?,
            dir: normalize_log_dir(log_dir)?,
        })
    }

    fn matches(&self, requested: &LogTarget) -> Result<(), String> {
        if self == requested {
            return Ok(());
        }
        Err(format!(
            "host logging is fixed to level `{}` in `{}`; cannot restart with level `{}` in `{}`",
            self.level,
            self.dir.display(),
            requested.level,
            requested.dir.display()
        ))
    }
}

struct ActiveLogger {
    target: LogTarget,
    _handle: LoggerHandle,
}

/// Starts host file logging at `level` under the absolute `log_dir`.
///
/// # Errors
/// - Unknown level, or a blank or relative directory.
/// - Directory creation or logger startup failure.
/// - Logging already runs with a different level or directory.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), String> {
    let requested = LogTarget::parse(level, log_dir)?;
    let active = ACTIVE_LOGGER.get_or_try_init(|| {
        let handle = start_file_logger(&requested)?;
        PANIC_HOOK.get_or_init(install_panic_hook);
        info!(
            "event=logging_init module=host status=ok level={} log_dir={} core_version={} os={} debug_build={}",
            requested.level,
            requested.dir.display(),
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            cfg!(debug_assertions)
        );
        Ok::<_, String>(ActiveLogger {
            target: requested.clone(),
            _handle: handle,
        })
    })?;
    active.target.matches(&requested)
}

/// Returns `(level, log_dir)` of active logging, or `None` before init.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    ACTIVE_LOGGER
        .get()
        .map(|active| (active.target.level, active.target.dir.clone()))
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

/// Maps a level name onto [`SUPPORTED_LOG_LEVELS`]; case-insensitive, and
/// `warning` is read as `warn`.
pub fn normalize_level(level: &str) -> Result<&'static str, String> {
    let wanted = level.trim().to_ascii_lowercase();
    let wanted = if wanted == "warning" { "warn" } else { wanted.as_str() };
    SUPPORTED_LOG_LEVELS
        .iter()
        .copied()
        .find(|supported| *supported == wanted)
        .ok_or_else(|| {
            format!(
                "unsupported log level `{}`; expected one of {}",
                level.trim(),
                SUPPORTED_LOG_LEVELS.join("|")
            )
        })
}

/// Renders a caught panic payload as one capped line.
pub fn describe_panic_payload(payload: &(dyn Any + Send)) -> String {
    let text = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    single_line(text, MAX_PANIC_PAYLOAD_CHARS)
}

pub(crate) fn normalize_log_dir(log_dir: &str) -> Result<PathBuf, String> {
    let dir = Path::new(log_dir.trim());
    if dir.as_os_str().is_empty() {
        return Err("log_dir is blank".to_string());
    }
    if !dir.is_absolute() {
        return Err(format!(
            "log_dir `{}` is relative; an absolute path is required",
            dir.display()
        ));
    }
    Ok(dir.to_path_buf())
}

fn start_file_logger(target: &LogTarget) -> Result<LoggerHandle, String> {
    std::fs::create_dir_all(&target.dir)
        .map_err(|err| format!("cannot create log_dir `{}`: {err}", target.dir.display()))?;

    Logger::try_with_str(target.level)
        .map_err(|err| format!("logger rejected level `{}`: {err}", target.level))?
        .log_to_file(
            FileSpec::default()
                .directory(target.dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("logger failed to start: {err}"))
}

/// Chains a hook that records every panic, including ones the host later
/// catches, before the default report runs.
fn install_panic_hook() {
    let default_report = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let thread = std::thread::current();
        let at = info
            .location()
            .map_or_else(|| "unknown".to_string(), |loc| format!("{}:{}", loc.file(), loc.line()));
        error!(
            "event=panic module=host status=error thread={} at={} payload={}",
            thread.name().unwrap_or("unnamed"),
            at,
            describe_panic_payload(info.payload())
        );
        default_report(info);
    }));
}

/// Collapses whitespace runs (line breaks included) to single spaces and
/// caps the result at `max_chars`, marking a cut with `...`.
fn single_line(value: &str, max_chars: usize) -> String {
    let joined = value.split_whitespace().collect::<Vec<_>>().join(" ");
    match joined.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &joined[..cut]),
        None => joined,
    }
}
