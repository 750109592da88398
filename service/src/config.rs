use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::time::Duration;

const DEFAULT_INTERFACE: &str = "127.0.0.1";

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that are allowed to receive server responses.
    /// `*` allows any origin.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "*"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = DEFAULT_INTERFACE)]
    pub interface: Option<String>,

    /// The host TCP port serving the relay socket and the ingress API
    #[arg(short, long, env, default_value_t = 3030)]
    pub port: u16,

    /// A second TCP port serving only the producer ingress API. 0 disables it.
    #[arg(long, env, default_value_t = 3000)]
    pub api_port: u16,

    /// Route path clients connect to for the relay socket
    #[arg(long, env, default_value = "/socket")]
    pub socket_path: String,

    /// Seconds between keep-alive pings sent to each connection
    #[arg(long, env, default_value_t = 10)]
    pub ping_interval_secs: u64,

    /// Extra seconds a silent connection is given before it is closed
    #[arg(long, env, default_value_t = 5)]
    pub ping_timeout_secs: u64,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or(DEFAULT_INTERFACE)
    }

    /// Address of the relay listener (socket + ingress).
    pub fn relay_address(&self) -> String {
        format!("{}:{}", self.interface(), self.port)
    }

    /// Address of the ingress-only listener, unless disabled or sharing the relay port.
    pub fn api_address(&self) -> Option<String> {
        (self.api_port != 0 && self.api_port != self.port)
            .then(|| format!("{}:{}", self.interface(), self.api_port))
    }

    /// Route the relay socket is mounted on, always with a leading `/`.
    pub fn socket_route(&self) -> String {
        let path = self.socket_path.trim();
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == "*")
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_relay_socket() {
        let config = Config::try_parse_from(["relay_rs"]).unwrap();

        assert_eq!(config.socket_path, "/socket");
        assert_eq!(config.ping_interval(), Duration::from_secs(10));
        assert_eq!(config.ping_timeout(), Duration::from_secs(5));
        assert!(config.allows_any_origin());
    }

    #[test]
    fn listener_addresses() {
        let config = Config::try_parse_from([
            "relay_rs",
            "--interface",
            "0.0.0.0",
            "--port",
            "3030",
            "--api-port",
            "3000",
        ])
        .unwrap();

        assert_eq!(config.relay_address(), "0.0.0.0:3030");
        assert_eq!(config.api_address().as_deref(), Some("0.0.0.0:3000"));
    }

    #[test]
    fn api_listener_can_be_disabled_or_shared() {
        let disabled = Config::try_parse_from(["relay_rs", "--api-port", "0"]).unwrap();
        assert_eq!(disabled.api_address(), None);

        let shared =
            Config::try_parse_from(["relay_rs", "--port", "4000", "--api-port", "4000"]).unwrap();
        assert_eq!(shared.api_address(), None);
    }

    #[test]
    fn origins_are_comma_separated() {
        let config = Config::try_parse_from([
            "relay_rs",
            "--allowed-origins",
            "http://localhost:3000,https://example.com",
        ])
        .unwrap();

        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:3000", "https://example.com"]
        );
        assert!(!config.allows_any_origin());
    }

    #[test]
    fn socket_route_gets_leading_slash() {
        let config = Config::try_parse_from(["relay_rs", "--socket-path", "relay"]).unwrap();
        assert_eq!(config.socket_route(), "/relay");

        let config = Config::try_parse_from(["relay_rs"]).unwrap();
        assert_eq!(config.socket_route(), "/socket");
    }

    #[test]
    fn zero_ping_interval_is_clamped() {
        let config = Config::try_parse_from(["relay_rs", "--ping-interval-secs", "0"]).unwrap();
        assert_eq!(config.ping_interval(), Duration::from_secs(1));
    }

    #[test]
    fn log_level_is_parsed() {
        let config = Config::try_parse_from(["relay_rs", "-l", "DEBUG"]).unwrap();
        assert_eq!(config.log_level_filter, LevelFilter::Debug);
    }
}
