//! Generic logger utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use std::collections::BTreeMap;
use std::fmt;
use log::{self, info};
use fern::{self, FormatCallback};
use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Logging parameters, usually the `[log]` table of an executable's params.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogParams {
    /// Level applied to every target without an override, e.g. `"debug"`.
    pub level: String,

    /// Per-target level overrides, e.g. `"act_lib::backend::sim" = "info"`.
    pub targets: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level less than `INFO`, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Unknown log level `{level}` for `{target}`")]
    UnknownLevel {
        target: String,
        level: String,
    },

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for LogParams {
    fn default() -> Self {
        Self {
            level: String::from("debug"),
            targets: BTreeMap::new(),
        }
    }
}

impl LogParams {
    /// Parse the base level and every target override.
    pub fn levels(&self) -> Result<(LevelFilter, Vec<(String, LevelFilter)>), LoggerInitError> {
        let min_level = parse_level("*", &self.level)?;

        if min_level < log::Level::Info {
            return Err(LoggerInitError::InvalidMinLogLevel(min_level))
        }

        let targets = self.targets
            .iter()
            .map(|(t, l)| parse_level(t, l).map(|l| (t.clone(), l)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((min_level, targets))
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// Records go to stdout, coloured, and to the session's log file as plain
/// text. Each is stamped with the number of seconds since the session epoch.
///
/// # Notes
///
/// - The base level must be `info` or more verbose, target overrides may be
///   anything.
///
/// # Safety
///
/// - This function must only be called once to prevent corrupting logs.
pub fn logger_init(
    params: &LogParams,
    session: &session::Session
) -> Result<(), LoggerInitError> {

    let (min_level, targets) = params.levels()?;

    let log_file = fern::log_file(session.log_file_path.clone())
        .map_err(LoggerInitError::LogFileInitError)?;

    let stdout = fern::Dispatch::new()
        .format(|out, message, record| format_record(out, message, record, true))
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .format(|out, message, record| format_record(out, message, record, false))
        .chain(log_file);

    let mut dispatch = fern::Dispatch::new().level(min_level);
    for (target, level) in targets.iter() {
        dispatch = dispatch.level_for(target.clone(), *level);
    }

    dispatch
        .chain(stdout)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    info!("    Session epoch: {}", session::get_epoch());
    info!("    Log level: {:?}", min_level);
    for (target, level) in targets.iter() {
        info!("    Log level for {}: {:?}", target, level);
    }
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn parse_level(target: &str, level: &str) -> Result<LevelFilter, LoggerInitError> {
    level.parse().map_err(|_| LoggerInitError::UnknownLevel {
        target: target.to_string(),
        level: level.to_string()
    })
}

fn format_record(
    out: FormatCallback,
    message: &fmt::Arguments,
    record: &log::Record,
    colour: bool
) {
    let level = level_to_str(record.level());
    let level = if colour {
        level.to_string()
    }
    else {
        (*level).to_string()
    };

    // If debug or trace include the target, otherwise don't include it
    if record.level() > log::Level::Info {
        out.finish(format_args!(
            "[{:10.6} {}] {}: {}",
            session::get_elapsed_seconds(),
            level,
            record.target(),
            message
        ))
    }
    else {
        out.finish(format_args!(
            "[{:10.6} {}] {}",
            session::get_elapsed_seconds(),
            level,
            message
        ))
    }
}

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
    fn test_level_to_str() {
        assert_eq!(&*level_to_str(log::Level::Trace), "TRC");
        assert_eq!(&*level_to_str(log::Level::Info), "INF");
        assert_eq!(&*level_to_str(log::Level::Error), "ERR");
    }

    #[test]
    fn test_log_params_levels() {
        let params: LogParams = crate::params::from_str(r#"
            level = "trace"

            [targets]
            "act_lib::backend::sim" = "warn"
        "#).unwrap();

        let (min_level, targets) = params.levels().unwrap();
        assert_eq!(min_level, LevelFilter::Trace);
        assert_eq!(targets, vec![(String::from("act_lib::backend::sim"), LevelFilter::Warn)]);

        let (min_level, targets) = LogParams::default().levels().unwrap();
        assert_eq!(min_level, LevelFilter::Debug);
        assert!(targets.is_empty());
    }

    #[test]
    fn test_log_params_rejected() {
        let quiet = LogParams { level: String::from("warn"), ..LogParams::default() };
        assert!(matches!(
            quiet.levels(),
            Err(LoggerInitError::InvalidMinLogLevel(LevelFilter::Warn))
        ));

        let mut unknown = LogParams::default();
        unknown.targets.insert(String::from("act_lib"), String::from("loud"));
        assert!(matches!(
            unknown.levels(),
            Err(LoggerInitError::UnknownLevel { .. })
        ));
    }
}
