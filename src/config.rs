//! Monitor configuration loaded from environment variables.
//!
//! All settings come from environment variables (or a `.env` file via
//! `dotenvy`). The push endpoint is resolved here, from the deployment mode,
//! and handed to the fleet core as a plain URL.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// Default push endpoint used in development.
pub const DEVELOPMENT_ENDPOINT: &str = "ws://localhost:3001/machine";

/// Where the monitor is running, which decides the push endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeploymentMode {
    /// Served behind the public host; the push source sits at `/ws/machine`.
    Production,
    /// Local push source on port 3001.
    #[default]
    Development,
}

impl FromStr for DeploymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(format!("unknown deployment mode: {other}")),
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Production => "production",
            Self::Development => "development",
        })
    }
}

/// Top-level monitor configuration.
///
/// Loaded once at startup via [`MonitorConfig::from_env`].
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Socket address the presentation bridge binds to.
    pub listen_addr: SocketAddr,

    /// Deployment mode used to resolve the push endpoint.
    pub mode: DeploymentMode,

    /// Fully resolved push endpoint URL.
    pub push_endpoint: String,

    /// Cap on live push connections. `None` means unbounded.
    pub max_connections: Option<usize>,

    /// Connections opened when the view mounts.
    pub mount_connections: usize,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// Capacity of the operator intent queue.
    pub intent_queue_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            mode: DeploymentMode::Development,
            push_endpoint: DEVELOPMENT_ENDPOINT.to_string(),
            max_connections: None,
            mount_connections: 0,
            event_bus_capacity: 1024,
            intent_queue_capacity: 256,
        }
    }
}

impl MonitorConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set. Calls
    /// `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// | Variable                  | Default              |
    /// |---------------------------|----------------------|
    /// | `LISTEN_ADDR`             | `0.0.0.0:8080`       |
    /// | `FLEET_MODE`              | `development`        |
    /// | `FLEET_PUBLIC_HOST`       | `localhost`          |
    /// | `FLEET_ENDPOINT`          | resolved from mode   |
    /// | `FLEET_MAX_CONNECTIONS`   | unbounded (`0`)      |
    /// | `FLEET_MOUNT_CONNECTIONS` | `0`                  |
    /// | `EVENT_BUS_CAPACITY`      | `1024`               |
    /// | `INTENT_QUEUE_CAPACITY`   | `256`                |
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` or `FLEET_MODE` is set but cannot
    /// be parsed.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr = match std::env::var("LISTEN_ADDR") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.listen_addr,
        };

        let mode = match std::env::var("FLEET_MODE") {
            Ok(v) => v.parse::<DeploymentMode>()?,
            Err(_) => defaults.mode,
        };

        let public_host =
            std::env::var("FLEET_PUBLIC_HOST").unwrap_or_else(|_| "localhost".to_string());
        let push_endpoint = std::env::var("FLEET_ENDPOINT")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| resolve_endpoint(mode, &public_host));

        let max_connections = match parse_env::<usize>("FLEET_MAX_CONNECTIONS", 0) {
            0 => None,
            n => Some(n),
        };

        Ok(Self {
            listen_addr,
            mode,
            push_endpoint,
            max_connections,
            mount_connections: parse_env("FLEET_MOUNT_CONNECTIONS", defaults.mount_connections),
            event_bus_capacity: parse_env("EVENT_BUS_CAPACITY", defaults.event_bus_capacity),
            intent_queue_capacity: parse_env(
                "INTENT_QUEUE_CAPACITY",
                defaults.intent_queue_capacity,
            ),
        })
    }
}

/// Resolves the push endpoint for a deployment mode.
///
/// Production goes through the public host's `/ws/machine` path; development
/// talks to the push source directly.
#[must_use]
pub fn resolve_endpoint(mode: DeploymentMode, public_host: &str) -> String {
    match mode {
        DeploymentMode::Production => format!("ws://{public_host}/ws/machine"),
        DeploymentMode::Development => DEVELOPMENT_ENDPOINT.to_string(),
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
