use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use kube_discovery::config::{
    self, API_KEY_ENV, API_VERSION_ENV, AgentOptions, BackendSettings, DEPLOYMENT_ENV, ENDPOINT_ENV,
    PluginCommand, REPORT_DIRECTORY_ENV,
};

/// Kubernetes discovery assistant
///
/// Chats with an Azure OpenAI deployment that can explore your cluster
/// through the `mcp-server-kubernetes` plugin and write a cluster summary
/// report.
#[derive(Parser, Debug)]
#[command(name = "kube-discovery")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run (default: chat)
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(flatten)]
    pub plugin: PluginArgs,

    /// Directory the cluster summary report is written to
    #[arg(
        long,
        value_name = "DIR",
        env = REPORT_DIRECTORY_ENV,
        default_value = config::DEFAULT_REPORT_DIRECTORY,
        global = true
    )]
    pub report_dir: PathBuf,

    /// Replace the bundled instruction prompt with the contents of a file
    #[arg(long, value_name = "PATH", global = true)]
    pub instructions_file: Option<PathBuf>,

    /// Maximum capability rounds per message before giving up
    #[arg(
        long,
        value_name = "COUNT",
        default_value_t = config::DEFAULT_MAX_ROUNDS,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..),
        global = true
    )]
    pub max_rounds: usize,

    /// Remember earlier messages of the session when answering
    #[arg(long, global = true)]
    pub keep_history: bool,
}

/// Completion backend connection
#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    /// Azure OpenAI endpoint, e.g. https://my-resource.openai.azure.com
    #[arg(long, value_name = "URL", env = ENDPOINT_ENV, global = true)]
    pub endpoint: Option<String>,

    /// Azure OpenAI API key
    #[arg(long, value_name = "KEY", env = API_KEY_ENV, hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Model deployment name
    #[arg(
        long,
        value_name = "NAME",
        env = DEPLOYMENT_ENV,
        default_value = config::DEFAULT_DEPLOYMENT,
        global = true
    )]
    pub deployment: String,

    /// Azure OpenAI API version
    #[arg(
        long,
        value_name = "VERSION",
        env = API_VERSION_ENV,
        default_value = config::DEFAULT_API_VERSION,
        global = true
    )]
    pub api_version: String,

    /// Timeout for each completion request in seconds
    #[arg(
        long,
        value_name = "SECONDS",
        default_value = "120",
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    pub request_timeout: u64,
}

/// Discovery plugin subprocess
#[derive(Args, Debug, Clone)]
pub struct PluginArgs {
    /// Program that starts the MCP plugin
    #[arg(long, value_name = "PROGRAM", default_value = config::DEFAULT_PLUGIN_PROGRAM, global = true)]
    pub plugin_command: String,

    /// Argument passed to the plugin program (can be specified multiple times)
    ///
    /// Default: mcp-server-kubernetes
    #[arg(long = "plugin-arg", value_name = "ARG", allow_hyphen_values = true, global = true)]
    pub plugin_args: Vec<String>,

    /// Seconds allowed for the plugin to start and list its tools
    #[arg(
        long,
        value_name = "SECONDS",
        default_value = "60",
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    pub plugin_startup_timeout: u64,

    /// Seconds allowed for each plugin tool call
    #[arg(
        long,
        value_name = "SECONDS",
        default_value = "120",
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    pub tool_timeout: u64,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive chat session in the terminal
    Chat,

    /// Ask a single question, print the answer and exit
    Ask {
        /// The message to send
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Start the plugin and list every capability the agent would offer
    Tools,

    /// Check configuration, plugin and backend connectivity
    Doctor,
}

impl BackendArgs {
    pub fn settings(&self) -> BackendSettings {
        BackendSettings {
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            deployment: Some(self.deployment.clone()),
            api_version: Some(self.api_version.clone()),
            request_timeout: Some(Duration::from_secs(self.request_timeout)),
        }
    }
}

impl PluginArgs {
    pub fn command(&self) -> PluginCommand {
        let defaults = PluginCommand::default();
        PluginCommand {
            program: self.plugin_command.clone(),
            args: if self.plugin_args.is_empty() {
                defaults.args
            } else {
                self.plugin_args.clone()
            },
            startup_timeout: Duration::from_secs(self.plugin_startup_timeout),
            call_timeout: Duration::from_secs(self.tool_timeout),
            ..defaults
        }
    }
}

impl Cli {
    /// Build agent options, reading `--instructions-file` if given
    pub async fn agent_options(&self) -> anyhow::Result<AgentOptions> {
        let instructions = match &self.instructions_file {
            Some(path) => Some(
                tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read instructions from {}", path.display()))?,
            ),
            None => None,
        };

        Ok(AgentOptions {
            instructions,
            backend: self.backend.settings(),
            plugin: self.plugin.command(),
            report_directory: self.report_dir.clone(),
            max_rounds: self.max_rounds,
            keep_history: self.keep_history,
        })
    }
}
