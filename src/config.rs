//! Process configuration for the discovery agent
//!
//! Settings are resolved with explicit values first and the process
//! environment second. Only the endpoint and the credential are mandatory.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const ENDPOINT_ENV: &str = "COMPLETION_ENDPOINT";
pub const API_KEY_ENV: &str = "COMPLETION_API_KEY";
pub const DEPLOYMENT_ENV: &str = "COMPLETION_DEPLOYMENT_NAME";
pub const API_VERSION_ENV: &str = "COMPLETION_API_VERSION";
pub const REPORT_DIRECTORY_ENV: &str = "REPORT_DIRECTORY";

pub const DEFAULT_DEPLOYMENT: &str = "gpt-4o-standard";
pub const DEFAULT_API_VERSION: &str = "2024-02-01";
pub const DEFAULT_REPORT_DIRECTORY: &str = "./ClusterReports/";

pub const DEFAULT_PLUGIN_PROGRAM: &str = "npx";
pub const DEFAULT_PLUGIN_ARGS: &[&str] = &["mcp-server-kubernetes"];

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_ROUNDS: usize = 16;

/// Backend connection parameters as supplied by the caller.
///
/// Any field left as `None` (or blank) falls back to its environment variable.
#[derive(Debug, Clone, Default)]
pub struct BackendSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub deployment: Option<String>,
    pub api_version: Option<String>,
    pub request_timeout: Option<Duration>,
}

impl BackendSettings {
    /// Resolve against the process environment
    pub fn resolve(self) -> Result<BackendConfig, ConfigError> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve against an arbitrary lookup, used by tests and `doctor`
    pub fn resolve_with<F>(self, lookup: F) -> Result<BackendConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |explicit: Option<String>, env_var: &str| {
            non_blank(explicit).or_else(|| non_blank(lookup(env_var)))
        };

        let endpoint = pick(self.endpoint, ENDPOINT_ENV).ok_or(ConfigError::Missing {
            setting: "completion endpoint",
            env_var: ENDPOINT_ENV,
        })?;
        let api_key = pick(self.api_key, API_KEY_ENV).ok_or(ConfigError::Missing {
            setting: "completion API key",
            env_var: API_KEY_ENV,
        })?;

        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(ConfigError::InvalidEndpoint { endpoint });
        }

        Ok(BackendConfig {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            deployment: pick(self.deployment, DEPLOYMENT_ENV)
                .unwrap_or_else(|| DEFAULT_DEPLOYMENT.to_string()),
            api_version: pick(self.api_version, API_VERSION_ENV)
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Fully resolved, immutable backend configuration
#[derive(Clone)]
pub struct BackendConfig {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
    pub request_timeout: Duration,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &mask_secret(&self.api_key))
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Render a credential as `**********...abcd`
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(10);
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", "*".repeat(10), tail)
}

/// How to launch the discovery plugin subprocess
#[derive(Debug, Clone)]
pub struct PluginCommand {
    /// Plugin name used in logs and tool listings
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    /// Time allowed for spawn + MCP handshake + tool discovery
    pub startup_timeout: Duration,
    /// Time allowed for each capability call
    pub call_timeout: Duration,
}

impl Default for PluginCommand {
    fn default() -> Self {
        Self {
            name: "kubernetes".to_string(),
            program: DEFAULT_PLUGIN_PROGRAM.to_string(),
            args: DEFAULT_PLUGIN_ARGS.iter().map(|a| a.to_string()).collect(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl fmt::Display for PluginCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Everything needed to create a [`crate::agent::DiscoveryAgent`]
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Instruction prompt; `None` uses the bundled default
    pub instructions: Option<String>,
    pub backend: BackendSettings,
    pub plugin: PluginCommand,
    pub report_directory: PathBuf,
    pub max_rounds: usize,
    /// Retain conversation history across turns of one session
    pub keep_history: bool,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            instructions: None,
            backend: BackendSettings::default(),
            plugin: PluginCommand::default(),
            report_directory: report_directory_from_env(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            keep_history: false,
        }
    }
}

/// `REPORT_DIRECTORY`, or `./ClusterReports/` when unset
pub fn report_directory_from_env() -> PathBuf {
    non_blank(std::env::var(REPORT_DIRECTORY_ENV).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_DIRECTORY))
}
