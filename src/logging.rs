//! Diagnostic logging to stderr.
//!
//! Library code logs through the `log` facade in `event=... status=...` form;
//! this starts the backend once per process.

use flexi_logger::{Logger, LoggerHandle};
use once_cell::sync::OnceCell;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();

struct LoggingState {
    level: &'static str,
    _logger: LoggerHandle,
}

/// Start logging at `level`.
///
/// Repeated calls are no-ops; the first level wins. Errors come back as a
/// human-readable string and never panic.
pub fn init_logging(level: &str) -> Result<(), String> {
    let level = normalize_level(level)?;
    if LOGGING_STATE.get().is_some() {
        return Ok(());
    }

    LOGGING_STATE.get_or_try_init(|| -> Result<LoggingState, String> {
        let logger = Logger::try_with_str(level)
            .map_err(|err| format!("invalid log level `{level}`: {err}"))?
            .log_to_stderr()
            .format_for_stderr(flexi_logger::default_format)
            .start()
            .map_err(|err| format!("failed to start logger: {err}"))?;
        log::debug!(
            "event=logging_init status=ok level={} version={}",
            level,
            env!("CARGO_PKG_VERSION")
        );
        Ok(LoggingState {
            level,
            _logger: logger,
        })
    })?;
    Ok(())
}

/// Level logging was started with, if it was
pub fn active_level() -> Option<&'static str> {
    LOGGING_STATE.get().map(|state| state.level)
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        "off" => Ok("off"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error|off"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_normalize() {
        assert_eq!(normalize_level(" WARNING ").unwrap(), "warn");
        assert_eq!(normalize_level("debug").unwrap(), "debug");
        assert!(normalize_level("loud").unwrap_err().contains("unsupported"));
    }

    #[test]
    fn init_is_idempotent() {
        assert!(init_logging("bogus").is_err());
        init_logging("error").unwrap();
        init_logging("trace").unwrap();
        assert_eq!(active_level(), Some("error"));
    }
}
