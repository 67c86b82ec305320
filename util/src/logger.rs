//! Generic logger utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use log::{self, info};
use fern;
use colored::{ColoredString, Colorize};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level at least as verbose as `INFO`, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Unknown log level `{0}`")]
    UnknownLogLevel(String),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// Records go to stdout and to the session's log file. Each simulator session runs on its own
/// named thread, so the thread name is included in every record.
///
/// # Notes
///
/// - `min_level` must be at least as verbose as `log::Level::Info`.
///
/// # Safety
///
/// - This function must only be called once to prevent corrupting logs.
pub fn logger_init(
    min_level: self::LevelFilter,
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if min_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(session.log_file_path.clone())
        .map_err(LoggerInitError::LogFileInitError)?;

    fern::Dispatch::new()
        .format(|out, message, record| {
            let thread = std::thread::current();
            let thread_name = thread.name().unwrap_or("-");

            // If debug or trace include the target, otherwise don't include it
            if record.level() > log::Level::Info {
                out.finish(format_args!(
                    "[{:10.6} {} {}] {}: {}",
                    session::get_elapsed_seconds(),
                    level_to_str(record.level()),
                    thread_name,
                    record.target(),
                    message
                ))
            }
            else {
                out.finish(format_args!(
                    "[{:10.6} {} {}] {}",
                    session::get_elapsed_seconds(),
                    level_to_str(record.level()),
                    thread_name,
                    message
                ))
            }
        })
        .level(min_level)
        .level_for("tungstenite", LevelFilter::Info)
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Ok(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?}", min_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

/// Parse a log level name, as given on the command line, into a filter.
pub fn parse_level(level: &str) -> Result<LevelFilter, LoggerInitError> {
    level.parse::<LevelFilter>()
        .map_err(|_| LoggerInitError::UnknownLogLevel(level.to_string()))
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the string representation of a log level
fn level_to_str(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "TRC".dimmed().italic(),
        log::Level::Debug => "DBG".dimmed(),
        log::Level::Info  => "INF".normal(),
        log::Level::Warn  => "WRN".yellow(),
        log::Level::Error => "ERR".red().bold()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug").unwrap(), LevelFilter::Debug);
        assert_eq!(parse_level("TRACE").unwrap(), LevelFilter::Trace);
        assert!(matches!(
            parse_level("chatty"),
            Err(LoggerInitError::UnknownLogLevel(_))
        ));
    }
}
