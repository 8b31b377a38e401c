//! Discovery agent façade
//!
//! Bundles a completion backend, the instruction prompt and the capability
//! set into one conversational entry point. Each [`DiscoveryAgent::invoke`]
//! drives the model through as many capability rounds as it needs, bounded by
//! a round limit, and returns the concatenated text of the final answer.

use futures::StreamExt;
use serde_json::{Map, Value};

use crate::backend::{AzureOpenAiBackend, ChatMessage, CompletionBackend, StreamEvent, ToolCall};
use crate::capability::{
    CapabilityKind, CapabilitySet, GenerateSummaryArgs, LocalCapability, ReportSink,
};
use crate::config::{AgentOptions, DEFAULT_MAX_ROUNDS};
use crate::error::{AgentError, CapabilityError, PluginError};
use crate::mcp::McpPlugin;

pub const AGENT_NAME: &str = "KubernetesDiscoveryAgent";

const FALLBACK_INSTRUCTIONS: &str = "You are a Kubernetes discovery assistant that helps users explore and assess their Kubernetes clusters. You can discover namespaces, pods, services, deployments, and generate detailed cluster reports.";

/// Bundled default instruction prompt
pub fn default_instructions() -> &'static str {
    crate::embedded::get_file("prompts/instructions.md")
        .map(str::trim)
        .unwrap_or(FALLBACK_INSTRUCTIONS)
}

pub struct DiscoveryAgent {
    instructions: String,
    backend: Box<dyn CompletionBackend>,
    capabilities: CapabilitySet,
    plugin: Option<McpPlugin>,
    reports: ReportSink,
    max_rounds: usize,
    /// `Some` when history is retained across turns
    history: Option<Vec<ChatMessage>>,
}

impl DiscoveryAgent {
    /// Create the agent from process configuration
    ///
    /// Backend settings are validated before the plugin is launched, so a
    /// configuration error never leaves a subprocess behind. A plugin that
    /// fails to launch only costs the remote capabilities.
    pub async fn create(options: AgentOptions) -> Result<Self, AgentError> {
        let config = options.backend.resolve()?;
        let backend = AzureOpenAiBackend::new(&config)?;

        log::info!(
            "Creating {} on deployment '{}' (api-version {})",
            AGENT_NAME,
            config.deployment,
            config.api_version
        );

        let plugin = match McpPlugin::start(&options.plugin).await {
            Ok(plugin) => Some(plugin),
            Err(e) => {
                log::warn!("{e}. Continuing with local capabilities only.");
                None
            }
        };

        let mut builder = Self::builder(backend)
            .reports(ReportSink::new(options.report_directory))
            .max_rounds(options.max_rounds)
            .keep_history(options.keep_history);
        if let Some(instructions) = options.instructions {
            builder = builder.instructions(instructions);
        }
        if let Some(plugin) = plugin {
            builder = builder.plugin(plugin);
        }
        Ok(builder.build())
    }

    pub fn builder(backend: impl CompletionBackend + 'static) -> AgentBuilder {
        AgentBuilder::new(Box::new(backend))
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn plugin(&self) -> Option<&McpPlugin> {
        self.plugin.as_ref()
    }

    /// Run one conversation turn
    ///
    /// Capability failures are reported back to the model as tool results and
    /// never abort the turn. Only backend failures and the round limit end up
    /// as errors.
    pub async fn invoke(&mut self, user_message: &str) -> Result<String, AgentError> {
        let mut messages = Vec::with_capacity(4);
        messages.push(ChatMessage::system(self.instructions.as_str()));
        if let Some(history) = &self.history {
            messages.extend(history.iter().cloned());
        }
        messages.push(ChatMessage::user(user_message));

        for round in 1..=self.max_rounds {
            let mut stream = self
                .backend
                .stream(&messages, self.capabilities.descriptors())
                .await?;

            let mut reply = String::new();
            let mut tool_calls: Vec<ToolCall> = Vec::new();
            while let Some(event) = stream.next().await {
                match event? {
                    StreamEvent::Text(fragment) => reply.push_str(&fragment),
                    StreamEvent::ToolCalls(calls) => tool_calls.extend(calls),
                }
            }

            if tool_calls.is_empty() {
                log::debug!("Turn finished after {round} round(s)");
                if let Some(history) = &mut self.history {
                    messages.push(ChatMessage::assistant(reply.as_str()));
                    *history = messages.split_off(1);
                }
                return Ok(reply);
            }

            log::debug!(
                "Round {round}: '{}' requested {} capability call(s)",
                self.backend.name(),
                tool_calls.len()
            );

            messages.push(ChatMessage::assistant_tool_calls(reply, tool_calls.clone()));
            for call in &tool_calls {
                let content = match self.dispatch(call).await {
                    Ok(output) => output,
                    Err(e) => {
                        log::warn!("Capability '{}' failed: {}", call.function.name, e);
                        format!("Error: {e}")
                    }
                };
                messages.push(ChatMessage::tool_result(call.id.as_str(), content));
            }
        }

        Err(AgentError::RoundLimitExceeded {
            limit: self.max_rounds,
        })
    }

    /// Route one tool call to the plugin or to a local capability
    pub async fn dispatch(&self, call: &ToolCall) -> Result<String, CapabilityError> {
        let name = call.function.name.as_str();
        let descriptor = self
            .capabilities
            .get(name)
            .ok_or_else(|| CapabilityError::Unknown(name.to_string()))?;
        let arguments = parse_arguments(name, &call.function.arguments)?;

        match &descriptor.kind {
            CapabilityKind::Local(LocalCapability::GenerateClusterSummary) => {
                let args: GenerateSummaryArgs = serde_json::from_value(Value::Object(arguments))
                    .map_err(|e| CapabilityError::InvalidArguments {
                        name: name.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(self
                    .reports
                    .generate(&args.summary_markdown, args.save_file)
                    .await?)
            }
            CapabilityKind::Remote { plugin } => match &self.plugin {
                Some(adapter) => adapter.call(name, arguments).await,
                None => Err(PluginError::Unavailable(plugin.clone()).into()),
            },
        }
    }

    /// Stop the plugin and consume the agent
    pub async fn close(self) {
        if let Some(plugin) = &self.plugin {
            plugin.stop().await;
        }
        log::info!("{AGENT_NAME} closed");
    }
}

fn parse_arguments(name: &str, raw: &str) -> Result<Map<String, Value>, CapabilityError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CapabilityError::InvalidArguments {
            name: name.to_string(),
            reason: format!("expected a JSON object, got {other}"),
        }),
        Err(e) => Err(CapabilityError::InvalidArguments {
            name: name.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Assembles a [`DiscoveryAgent`] from already constructed parts
pub struct AgentBuilder {
    backend: Box<dyn CompletionBackend>,
    instructions: Option<String>,
    plugin: Option<McpPlugin>,
    reports: Option<ReportSink>,
    max_rounds: usize,
    keep_history: bool,
}

impl AgentBuilder {
    fn new(backend: Box<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            instructions: None,
            plugin: None,
            reports: None,
            max_rounds: DEFAULT_MAX_ROUNDS,
            keep_history: false,
        }
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn plugin(mut self, plugin: McpPlugin) -> Self {
        self.plugin = Some(plugin);
        self
    }

    pub fn reports(mut self, reports: ReportSink) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Upper bound on capability rounds per turn, at least 1
    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn keep_history(mut self, keep: bool) -> Self {
        self.keep_history = keep;
        self
    }

    pub fn build(self) -> DiscoveryAgent {
        let mut capabilities = CapabilitySet::new();
        capabilities.register(ReportSink::descriptor());
        if let Some(plugin) = &self.plugin {
            let added = capabilities.register_tools(plugin.name(), plugin.tools());
            log::debug!("Registered {added} remote capabilities from '{}'", plugin.name());
        }

        log::debug!(
            "Agent ready on backend '{}' with {} capabilities",
            self.backend.name(),
            capabilities.len()
        );

        DiscoveryAgent {
            instructions: self
                .instructions
                .unwrap_or_else(|| default_instructions().to_string()),
            backend: self.backend,
            capabilities,
            plugin: self.plugin,
            reports: self
                .reports
                .unwrap_or_else(|| ReportSink::new(crate::config::report_directory_from_env())),
            max_rounds: self.max_rounds,
            history: self.keep_history.then(Vec::new),
        }
    }
}
