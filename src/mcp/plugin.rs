// src/mcp/plugin.rs
use std::process::Stdio;
use std::time::Duration;

use rmcp::{
    RoleClient, ServiceExt,
    model::{CallToolRequestParam, CallToolResult, Tool},
    service::{RunningService, ServiceError},
    transport::{IntoTransport, TokioChildProcess},
};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::{DEFAULT_CALL_TIMEOUT, PluginCommand};
use crate::error::{CapabilityError, PluginError};

/// Client side of one MCP plugin process
///
/// Owns the running service for the lifetime of a session. The tool list is
/// fetched once during startup. Calls go straight to the plugin: no caching,
/// no retry.
pub struct McpPlugin {
    name: String,
    /// `None` once stopped or once the transport is known to be closed
    service: Mutex<Option<RunningService<RoleClient, ()>>>,
    tools: Vec<Tool>,
    call_timeout: Duration,
}

impl McpPlugin {
    /// Spawn the plugin subprocess and complete the MCP handshake
    ///
    /// Spawn, handshake and tool discovery together must finish within
    /// `command.startup_timeout`.
    pub async fn start(command: &PluginCommand) -> Result<Self, PluginError> {
        log::info!("Launching plugin '{}': {}", command.name, command);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);

        let launch_error = |reason: String| PluginError::Launch {
            command: command.to_string(),
            reason,
        };

        // stderr goes to the log so plugin chatter stays out of the chat prompt
        let (transport, stderr) = TokioChildProcess::builder(cmd)
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| launch_error(e.to_string()))?;
        if let Some(stderr) = stderr {
            forward_stderr(command.name.clone(), stderr);
        }

        let connect = Self::connect(&command.name, transport);
        let plugin = match tokio::time::timeout(command.startup_timeout, connect).await {
            Ok(Ok(plugin)) => plugin,
            Ok(Err(PluginError::Launch { reason, .. })) => return Err(launch_error(reason)),
            Ok(Err(e)) => return Err(launch_error(e.to_string())),
            Err(_) => {
                return Err(launch_error(format!(
                    "no handshake within {:?}",
                    command.startup_timeout
                )));
            }
        };

        Ok(plugin.with_call_timeout(command.call_timeout))
    }

    /// Run the MCP client over an arbitrary transport and discover tools
    pub async fn connect<T, E, A>(name: &str, transport: T) -> Result<Self, PluginError>
    where
        T: IntoTransport<RoleClient, E, A>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let service = ServiceExt::<RoleClient>::serve((), transport)
            .await
            .map_err(|e| PluginError::Launch {
                command: name.to_string(),
                reason: format!("MCP handshake failed: {e}"),
            })?;

        let tools = match service.peer().list_all_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                let _ = service.cancel().await;
                return Err(PluginError::Protocol {
                    plugin: name.to_string(),
                    message: format!("listing tools failed: {e}"),
                });
            }
        };

        log::info!("Plugin '{}' offers {} tools", name, tools.len());

        Ok(Self {
            name: name.to_string(),
            service: Mutex::new(Some(service)),
            tools,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        })
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tools reported by the plugin at startup
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub async fn is_running(&self) -> bool {
        self.service.lock().await.is_some()
    }

    /// Invoke one tool and render its result as text
    ///
    /// A result the plugin flags as an error becomes
    /// [`CapabilityError::Remote`].
    pub async fn call(&self, tool: &str, arguments: Map<String, Value>) -> Result<String, CapabilityError> {
        let peer = {
            let guard = self.service.lock().await;
            match guard.as_ref() {
                Some(service) => service.peer().clone(),
                None => return Err(PluginError::Unavailable(self.name.clone()).into()),
            }
        };

        log::debug!("Calling plugin tool '{}' on '{}'", tool, self.name);

        let request = CallToolRequestParam {
            name: tool.to_string().into(),
            arguments: Some(arguments),
        };

        let result = match tokio::time::timeout(self.call_timeout, peer.call_tool(request)).await {
            Ok(Ok(result)) => result,
            Ok(Err(ServiceError::McpError(data))) => {
                return Err(CapabilityError::Remote {
                    name: tool.to_string(),
                    message: data.message.to_string(),
                });
            }
            Ok(Err(ServiceError::TransportClosed)) => {
                log::warn!("Plugin '{}' transport closed, marking unavailable", self.name);
                self.service.lock().await.take();
                return Err(PluginError::Unavailable(self.name.clone()).into());
            }
            Ok(Err(e)) => {
                return Err(PluginError::Protocol {
                    plugin: self.name.clone(),
                    message: e.to_string(),
                }
                .into());
            }
            Err(_) => {
                return Err(PluginError::Timeout {
                    plugin: self.name.clone(),
                    operation: tool.to_string(),
                    timeout: self.call_timeout,
                }
                .into());
            }
        };

        let (text, is_error) = render_result(&result);
        if is_error {
            log::debug!("Plugin tool '{}' reported failure: {}", tool, text);
            return Err(CapabilityError::Remote {
                name: tool.to_string(),
                message: text,
            });
        }
        Ok(text)
    }

    /// Terminate the plugin. Returns `false` when it was already stopped.
    pub async fn stop(&self) -> bool {
        let Some(service) = self.service.lock().await.take() else {
            return false;
        };

        match service.cancel().await {
            Ok(reason) => log::info!("Plugin '{}' stopped ({:?})", self.name, reason),
            Err(e) => log::warn!("Plugin '{}' did not shut down cleanly: {}", self.name, e),
        }
        true
    }
}

impl Drop for McpPlugin {
    fn drop(&mut self) {
        if let Ok(guard) = self.service.try_lock()
            && guard.is_some()
        {
            // RunningService's drop guard cancels the session and reaps the child
            log::debug!("Plugin '{}' dropped while running, service cancelled on drop", self.name);
        }
    }
}

/// Relay each stderr line of the plugin to `log::debug!`
///
/// Resolves to the number of lines relayed once the stream closes.
fn forward_stderr<R>(plugin: String, stderr: R) -> JoinHandle<usize>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut relayed = 0;
        while let Ok(Some(line)) = lines.next_line().await {
            log::debug!("[{plugin}] {line}");
            relayed += 1;
        }
        relayed
    })
}

/// Flatten a tool result into text plus its error flag
///
/// Works on the wire form so every content variant is covered: text items
/// are joined by newlines, other items are kept as compact JSON, and
/// structured content is used when there is no content at all.
fn render_result(result: &CallToolResult) -> (String, bool) {
    let wire = serde_json::to_value(result).unwrap_or(Value::Null);
    let is_error = wire
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let parts: Vec<String> = wire
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| match item.get("text").and_then(Value::as_str) {
                    Some(text) => text.to_string(),
                    None => item.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    if parts.is_empty()
        && let Some(structured) = wire.get("structuredContent")
    {
        return (structured.to_string(), is_error);
    }

    (parts.join("\n"), is_error)
}
