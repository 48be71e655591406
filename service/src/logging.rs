use crate::config::{Config, RustEnv};
use log::{LevelFilter, SetLoggerError};
use simplelog::{self, ColorChoice, ConfigBuilder, TerminalMode};

/// Dependency modules silenced below Trace. The relay's own crates always log
/// at the configured level.
const FILTERED_MODULES: &[&str] = &["redis", "tower", "tracing", "hyper", "h2", "axum"];

pub struct Logger {}

impl Logger {
    /// Installs the global terminal logger.
    ///
    /// At Trace every module logs, including dependencies; at any other level
    /// [`FILTERED_MODULES`] are suppressed. Production writes uncolored output
    /// to stderr so log collectors don't see escape codes.
    pub fn init_logger(config: &Config) -> Result<(), SetLoggerError> {
        let apply_filters = Self::should_filter_dependencies(config.log_level_filter);
        let log_config = Self::build_log_config(apply_filters);
        let (mode, color) = Self::terminal_settings(&config.runtime_env);

        simplelog::TermLogger::init(config.log_level_filter, log_config, mode, color)
    }

    fn should_filter_dependencies(level: LevelFilter) -> bool {
        level != LevelFilter::Trace
    }

    fn terminal_settings(env: &RustEnv) -> (TerminalMode, ColorChoice) {
        match env {
            RustEnv::Production => (TerminalMode::Stderr, ColorChoice::Never),
            RustEnv::Development | RustEnv::Staging => (TerminalMode::Mixed, ColorChoice::Auto),
        }
    }

    fn build_log_config(apply_filters: bool) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();

        if apply_filters {
            for module in FILTERED_MODULES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filtered_modules_cover_transport_and_store_clients() {
        for module in ["redis", "hyper", "axum"] {
            assert!(
                FILTERED_MODULES.contains(&module),
                "{module} should be filtered"
            );
        }
    }

    #[test]
    fn test_filtered_modules_never_hide_relay_crates() {
        for module in ["sse", "store", "web", "service"] {
            assert!(
                !FILTERED_MODULES.contains(&module),
                "{module} logs must stay visible"
            );
        }
    }

    #[test]
    fn test_only_trace_shows_dependency_logs() {
        assert!(!Logger::should_filter_dependencies(LevelFilter::Trace));
        for level in [
            LevelFilter::Off,
            LevelFilter::Error,
            LevelFilter::Warn,
            LevelFilter::Info,
            LevelFilter::Debug,
        ] {
            assert!(
                Logger::should_filter_dependencies(level),
                "{level} should filter dependencies"
            );
        }
    }

    #[test]
    fn test_production_logs_without_color() {
        let (_, color) = Logger::terminal_settings(&RustEnv::Production);
        assert!(matches!(color, ColorChoice::Never));

        let (_, color) = Logger::terminal_settings(&RustEnv::Development);
        assert!(matches!(color, ColorChoice::Auto));
    }
}
