//! Error taxonomy for the discovery agent.
//!
//! Errors below the façade boundary (plugin adapter, report sink) end up as
//! [`CapabilityError`] values that are handed back to the model as tool
//! results. Only [`AgentError`] ever leaves [`crate::agent::DiscoveryAgent`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Backend connection parameters could not be resolved.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{setting} is not set: pass it explicitly or export {env_var}")]
    Missing {
        setting: &'static str,
        env_var: &'static str,
    },

    #[error("invalid completion endpoint '{endpoint}': expected an http(s) URL")]
    InvalidEndpoint { endpoint: String },
}

/// Failures of the MCP plugin adapter itself.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The subprocess could not be spawned or did not complete the handshake.
    #[error("failed to launch plugin '{command}': {reason}")]
    Launch { command: String, reason: String },

    /// The plugin was stopped, or its transport closed underneath us.
    #[error("plugin '{0}' is no longer available")]
    Unavailable(String),

    #[error("plugin '{plugin}' did not answer '{operation}' within {timeout:?}")]
    Timeout {
        plugin: String,
        operation: String,
        timeout: Duration,
    },

    #[error("plugin '{plugin}' protocol error: {message}")]
    Protocol { plugin: String, message: String },
}

/// Writing the report artifact failed.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to create report directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write report {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A single capability call failed. Recovered by the façade.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("unknown capability '{0}'")]
    Unknown(String),

    #[error("invalid arguments for '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("'{name}' failed: {message}")]
    Remote { name: String, message: String },

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Failures talking to the completion service.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed completion stream: {0}")]
    Stream(String),

    #[error("failed to decode completion chunk: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors surfaced by the façade to its session host.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("the model requested capabilities for {limit} rounds without producing an answer")]
    RoundLimitExceeded { limit: usize },
}

/// The chat surface could not reach the user.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("chat transport I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("chat transport closed")]
    Closed,
}
