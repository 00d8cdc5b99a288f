#![deny(missing_docs)]
//! Logging for the harvester crates.
//!
//! Library code logs through the `engine_*` macros; the binary and the test
//! suites install a `simplelog` backend configured by [`harvest_log_config`].

use log::LevelFilter;
use simplelog::{Config, ConfigBuilder};

/// Crates whose own records drown out per-unit harvest lines at debug level.
pub const QUIET_TARGETS: &[&str] = &[
    "hyper",
    "hyper_util",
    "reqwest",
    "rustls",
    "html5ever",
    "selectors",
];

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Parses a `--log-level` value (`error`, `warn`, `info`, `debug`, `trace`, `off`),
/// case-insensitively. Unknown names yield `None`.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    name.trim().parse::<LevelFilter>().ok()
}

/// RFC 3339 timestamps, targets only on errors, and the HTTP and HTML parser
/// stacks silenced.
pub fn harvest_log_config() -> Config {
    let mut builder = ConfigBuilder::new();
    builder
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error);
    for &target in QUIET_TARGETS {
        builder.add_filter_ignore_str(target);
    }
    builder.build()
}

/// Terminal logger for the integration suites; a second call is a no-op.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        harvest_log_config(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels_case_insensitively() {
        assert_eq!(parse_level("INFO"), Some(LevelFilter::Info));
        assert_eq!(parse_level(" debug "), Some(LevelFilter::Debug));
        assert_eq!(parse_level("off"), Some(LevelFilter::Off));
        assert_eq!(parse_level("chatty"), None);
    }

    #[test]
    fn quiet_targets_cover_the_http_stack() {
        assert!(QUIET_TARGETS.contains(&"reqwest"));
        assert!(QUIET_TARGETS.contains(&"hyper"));
        // building must not panic with every filter applied
        let _ = harvest_log_config();
    }
}
