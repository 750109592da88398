use crate::config::Config;
use log::{LevelFilter, SetLoggerError};
use simplelog::{ColorChoice, ConfigBuilder, LevelPadding, TermLogger, TerminalMode};

/// Transport crates that log every frame and handshake. Hidden unless the
/// level is Trace.
const TRANSPORT_TARGETS: &[&str] = &[
    "tower",
    "tower_http",
    "hyper",
    "axum",
    "tungstenite",
    "tokio_tungstenite",
];

pub struct Logger {}

impl Logger {
    /// Installs the process-wide terminal logger at the configured level.
    /// Fails only if a logger was already installed.
    pub fn init_logger(config: &Config) -> Result<(), SetLoggerError> {
        let level = config.log_level_filter;

        TermLogger::init(
            level,
            Self::build_log_config(Self::hides_transport(level)),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        )
    }

    fn hides_transport(level: LevelFilter) -> bool {
        level < LevelFilter::Trace
    }

    fn build_log_config(hide_transport: bool) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder
            .set_time_format_rfc3339()
            .set_level_padding(LevelPadding::Right)
            .set_target_level(LevelFilter::Error);

        if hide_transport {
            for target in TRANSPORT_TARGETS {
                builder.add_filter_ignore_str(target);
            }
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_targets_cover_the_socket_stack() {
        for target in ["tower_http", "hyper", "axum", "tungstenite", "tokio_tungstenite"] {
            assert!(TRANSPORT_TARGETS.contains(&target), "{target} should be hidden");
        }
    }

    #[test]
    fn relay_crates_are_never_hidden() {
        for target in ["relay", "events", "web", "service", "relay_rs"] {
            assert!(
                !TRANSPORT_TARGETS.iter().any(|hidden| target.starts_with(hidden)),
                "{target} must stay visible"
            );
        }
    }

    #[test]
    fn only_trace_shows_transport_logs() {
        assert!(!Logger::hides_transport(LevelFilter::Trace));
        for level in [
            LevelFilter::Off,
            LevelFilter::Error,
            LevelFilter::Warn,
            LevelFilter::Info,
            LevelFilter::Debug,
        ] {
            assert!(Logger::hides_transport(level), "{level} should hide transport logs");
        }
    }

    #[test]
    fn log_config_builds_with_and_without_filters() {
        let _hidden = Logger::build_log_config(true);
        let _shown = Logger::build_log_config(false);
    }
}
