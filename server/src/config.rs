use std::time::Duration;

use clap::{parser::ValueSource, ArgMatches, CommandFactory, FromArgMatches, Parser};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::notifications::stream::HEARTBEAT_INTERVAL;

/// Secret used when nothing is configured. Fine for local development only.
pub const DEV_JWT_SECRET: &str = "dev-secret";

/// tanq realtime server: voice signaling and notification streams
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "tanq-realtime", version, about = "tanq realtime server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "TANQ_PORT", default_value = "4000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "TANQ_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./tanq-realtime.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "TANQ_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// HS256 secret used to verify session tokens
    #[arg(long, env = "TANQ_JWT_SECRET", default_value = DEV_JWT_SECRET, hide_env_values = true)]
    pub jwt_secret: String,

    /// Stream timing (loaded from [realtime] section in TOML)
    #[arg(skip)]
    #[serde(default, skip_serializing)]
    pub realtime: RealtimeConfig,
}

/// Keep-alive timing for notification streams and voice sockets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Seconds between heartbeat comments on notification streams (default: 30)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Seconds between WebSocket pings on voice sockets (default: 30)
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Seconds to wait for a pong before closing a voice socket (default: 10)
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: HEARTBEAT_INTERVAL.as_secs(),
            ping_interval_secs: 30,
            pong_timeout_secs: 10,
        }
    }
}

impl RealtimeConfig {
    // Zero would make tokio's interval panic.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs.max(1))
    }
}

fn default_heartbeat_interval() -> u64 {
    HEARTBEAT_INTERVAL.as_secs()
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_timeout() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4000,
            bind_address: "0.0.0.0".to_string(),
            config: "./tanq-realtime.toml".to_string(),
            json_logs: false,
            generate_config: false,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            realtime: RealtimeConfig::default(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (TANQ_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let matches = Config::command().get_matches();
        let cli = Config::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
        Self::figment(&cli.config, explicit_args(&matches, &cli)).extract()
    }

    fn figment(config_path: &str, explicit: Map<String, Value>) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("TANQ_").split("__"))
            .merge(Serialized::defaults(explicit))
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

/// CLI values the user actually passed (flag or env), so clap's defaults
/// do not shadow the TOML file.
fn explicit_args(matches: &ArgMatches, cli: &Config) -> Map<String, Value> {
    let Ok(Value::Object(all)) = serde_json::to_value(cli) else {
        return Map::new();
    };
    all.into_iter()
        .filter(|(key, _)| {
            matches!(
                matches.value_source(key),
                Some(ValueSource::CommandLine | ValueSource::EnvVariable)
            )
        })
        .collect()
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# tanq realtime server configuration
# Place this file at ./tanq-realtime.toml or specify with --config <path>
# All settings can be overridden via environment variables (TANQ_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 4000)
# port = 4000

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# HS256 secret shared with the service that issues session tokens.
# Prefer TANQ_JWT_SECRET over writing it here.
# jwt_secret = "dev-secret"

# ---- Stream keep-alives ----
# [realtime]

# Heartbeat comment interval on notification streams, in seconds
# heartbeat_interval_secs = 30

# WebSocket ping interval on voice sockets, in seconds
# ping_interval_secs = 30

# Close a voice socket if no pong arrives within this many seconds
# pong_timeout_secs = 10
"#
    .to_string()
}
