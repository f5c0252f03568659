//! Command line and environment configuration

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "signal-relay", about = "WebSocket signaling relay for WebRTC rooms")]
pub struct Config {
    /// Address to bind to
    #[arg(long, env = "SIGNAL_RELAY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "SIGNAL_RELAY_PORT", default_value_t = 8001)]
    pub port: u16,

    /// Comma separated list of allowed origins, `*` for any
    #[arg(long, env = "CORS_ORIGINS", default_value = "*", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    pub json_logs: bool,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
