// Shared fixtures: an in-memory Kubernetes MCP server and a scripted backend
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
    model::{
        CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
        PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use kube_discovery::backend::{ChatMessage, CompletionBackend, CompletionStream, StreamEvent, ToolCall};
use kube_discovery::capability::CapabilityDescriptor;
use kube_discovery::error::BackendError;
use kube_discovery::mcp::McpPlugin;

pub const NAMESPACES: &str = "default\nkube-system\nmonitoring";

/// Minimal stand-in for `mcp-server-kubernetes`
#[derive(Clone, Default)]
pub struct FakeKube {
    pub calls: Arc<AtomicUsize>,
}

impl FakeKube {
    fn tool(name: &'static str, description: &'static str) -> Tool {
        let Value::Object(schema) = json!({
            "type": "object",
            "properties": {
                "resourceType": { "type": "string" },
                "namespace": { "type": "string" }
            }
        }) else {
            unreachable!()
        };
        Tool::new(name, description, Arc::new(schema))
    }
}

impl ServerHandler for FakeKube {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some("Fake Kubernetes server for tests".to_string()),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(vec![
            Self::tool("kubectl_get", "Get or list Kubernetes resources"),
            Self::tool("kubectl_describe", "Describe a Kubernetes resource"),
            Self::tool("kubectl_logs", "Fetch pod logs"),
            Self::tool("kubectl_rollout", "Wait for a rollout to finish"),
        ]))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let args = request.arguments.unwrap_or_default();

        match &*request.name {
            "kubectl_get" => match args.get("resourceType").and_then(Value::as_str) {
                Some("namespaces") => Ok(CallToolResult::success(vec![Content::text(NAMESPACES)])),
                Some(other) => Ok(CallToolResult::success(vec![Content::text(format!(
                    "No {other} found"
                ))])),
                None => Err(McpError::invalid_params("resourceType is required", None)),
            },
            "kubectl_describe" => Ok(CallToolResult::error(vec![Content::text(
                "Error from server (NotFound): pods \"ghost\" not found",
            )])),
            "kubectl_logs" => Ok(CallToolResult::success(vec![
                Content::text("line one"),
                Content::text("line two"),
            ])),
            "kubectl_rollout" => {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                Ok(CallToolResult::success(vec![Content::text("rolled out")]))
            }
            other => Err(McpError::invalid_params(format!("Unknown tool: {other}"), None)),
        }
    }
}

/// Fake server task plus the plugin connected to it
pub struct FakeCluster {
    pub server: FakeKube,
    pub task: JoinHandle<()>,
}

impl FakeCluster {
    pub fn calls(&self) -> usize {
        self.server.calls.load(Ordering::SeqCst)
    }
}

/// Serve [`FakeKube`] over an in-memory pipe and connect a plugin to it
pub async fn connect_fake_cluster() -> (McpPlugin, FakeCluster) {
    let (client_io, server_io) = tokio::io::duplex(4096);
    let server = FakeKube::default();

    let handler = server.clone();
    let task = tokio::spawn(async move {
        let running = match handler.serve(server_io).await {
            Ok(running) => running,
            Err(e) => panic!("fake server failed to start: {e}"),
        };
        let _ = running.waiting().await;
    });

    let plugin = McpPlugin::connect("kubernetes", client_io)
        .await
        .expect("plugin should connect to the fake server");

    (plugin, FakeCluster { server, task })
}

/// One scripted completion round
pub type Round = Vec<StreamEvent>;

pub fn text(fragment: &str) -> StreamEvent {
    StreamEvent::Text(fragment.to_string())
}

pub fn call(id: &str, name: &str, arguments: Value) -> StreamEvent {
    StreamEvent::ToolCalls(vec![ToolCall::new(id, name, arguments.to_string())])
}

/// Backend that replays rounds in order and records every request
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    rounds: Arc<Mutex<VecDeque<Round>>>,
    /// Replayed once the script is exhausted
    repeat: Option<Round>,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl ScriptedBackend {
    pub fn new(rounds: impl IntoIterator<Item = Round>) -> Self {
        Self {
            rounds: Arc::new(Mutex::new(rounds.into_iter().collect())),
            ..Self::default()
        }
    }

    pub fn repeating(round: Round) -> Self {
        Self {
            repeat: Some(round),
            ..Self::default()
        }
    }

    /// Messages of each request in wire form
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        _tools: &[CapabilityDescriptor],
    ) -> Result<CompletionStream, BackendError> {
        self.requests
            .lock()
            .unwrap()
            .push(serde_json::to_value(messages)?);

        let round = self
            .rounds
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.repeat.clone())
            .ok_or_else(|| BackendError::Stream("script exhausted".to_string()))?;

        Ok(futures::stream::iter(round.into_iter().map(Ok)).boxed())
    }
}

/// Backend whose every request fails
pub struct FailingBackend;

#[async_trait]
impl CompletionBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    async fn stream(
        &self,
        _messages: &[ChatMessage],
        _tools: &[CapabilityDescriptor],
    ) -> Result<CompletionStream, BackendError> {
        Err(BackendError::Status {
            status: 503,
            message: "service unavailable".to_string(),
        })
    }
}

/// Content of the last `tool` message in a recorded request
pub fn last_tool_result(request: &Value) -> Option<String> {
    request
        .as_array()?
        .iter()
        .rev()
        .find(|m| m["role"] == "tool")
        .and_then(|m| m["content"].as_str())
        .map(str::to_string)
}
