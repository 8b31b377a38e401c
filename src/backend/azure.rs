//! AzureOpenAiBackend - streaming Chat Completions over the Azure OpenAI REST API.
//!
//! Text deltas are forwarded as soon as they arrive. Tool-call deltas are
//! stitched together by index and emitted as one batch when the service
//! signals the end of the stream.

use std::collections::BTreeMap;

use async_stream::try_stream;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ChatMessage, CompletionBackend, CompletionStream, StreamEvent, ToolCall};
use crate::capability::CapabilityDescriptor;
use crate::config::BackendConfig;
use crate::error::BackendError;

const DONE_SENTINEL: &str = "[DONE]";

/// Agent backend that talks to one Azure OpenAI deployment.
#[derive(Clone)]
pub struct AzureOpenAiBackend {
    client: Client,
    url: String,
    api_key: String,
    deployment: String,
}

impl AzureOpenAiBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            url: completions_url(config),
            api_key: config.api_key.clone(),
            deployment: config.deployment.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version={version}`
pub fn completions_url(config: &BackendConfig) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        config.endpoint.trim_end_matches('/'),
        config.deployment,
        config.api_version
    )
}

#[async_trait]
impl CompletionBackend for AzureOpenAiBackend {
    fn name(&self) -> &str {
        &self.deployment
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        tools: &[CapabilityDescriptor],
    ) -> Result<CompletionStream, BackendError> {
        let body = ChatCompletionRequest {
            messages,
            tools: tools.iter().map(ToolDefinition::from).collect(),
            stream: true,
        };

        log::debug!(
            "Requesting completion from '{}' ({} messages, {} tools)",
            self.deployment,
            messages.len(),
            tools.len()
        );

        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(map_http_error(status, body_text));
        }

        Ok(Box::pin(decode_events(response.bytes_stream())))
    }
}

/// Turn a raw SSE byte stream into completion events
pub fn decode_events<S, B, E>(bytes: S) -> impl Stream<Item = Result<StreamEvent, BackendError>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    try_stream! {
        let mut events = Box::pin(bytes.eventsource());
        let mut pending = ToolCallAccumulator::default();

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| BackendError::Stream(e.to_string()))?;
            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }
            if data == DONE_SENTINEL {
                break;
            }

            let chunk: ChatCompletionChunk = serde_json::from_str(data).map_err(BackendError::from)?;
            for choice in chunk.choices {
                let Some(delta) = choice.delta else { continue };
                match delta.content {
                    Some(text) if !text.is_empty() => {
                        yield StreamEvent::Text(text);
                    }
                    _ => {}
                }
                for fragment in delta.tool_calls.unwrap_or_default() {
                    pending.push(fragment);
                }
            }
        }

        if !pending.is_empty() {
            yield StreamEvent::ToolCalls(pending.finish());
        }
    }
}

fn map_http_error(status: u16, body: String) -> BackendError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or(body);
    BackendError::Status { status, message }
}

/// Reassembles tool calls that arrive split across chunks
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    calls: BTreeMap<usize, PartialToolCall>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn push(&mut self, fragment: ToolCallDelta) {
        let entry = self.calls.entry(fragment.index).or_default();
        if let Some(id) = fragment.id
            && !id.is_empty()
        {
            entry.id = Some(id);
        }
        if let Some(function) = fragment.function {
            if let Some(name) = function.name {
                entry.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                entry.arguments.push_str(&arguments);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .map(|(index, call)| {
                let id = call.id.unwrap_or_else(|| format!("call_{index}"));
                ToolCall::new(id, call.name, call.arguments)
            })
            .collect()
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDefinition<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ToolDefinition<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionDefinition<'a>,
}

#[derive(Serialize)]
struct FunctionDefinition<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

impl<'a> From<&'a CapabilityDescriptor> for ToolDefinition<'a> {
    fn from(descriptor: &'a CapabilityDescriptor) -> Self {
        Self {
            kind: "function",
            function: FunctionDefinition {
                name: &descriptor.name,
                description: &descriptor.description,
                parameters: &descriptor.parameters,
            },
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use std::time::Duration;

    fn sse(chunks: &[&str]) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + 'static {
        let owned: Vec<Result<Vec<u8>, std::io::Error>> =
            chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
        futures::stream::iter(owned)
    }

    async fn collect(chunks: &[&str]) -> Result<Vec<StreamEvent>, BackendError> {
        decode_events(sse(chunks)).try_collect().await
    }

    #[tokio::test]
    async fn test_text_fragments_in_arrival_order() {
        let events = collect(&[
            "data: {\"choices\":[]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hello, \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"world!\"}}]}\n\ndata: [DONE]\n\n",
        ])
        .await
        .unwrap();

        assert_eq!(
            events,
            vec![
                StreamEvent::Text("Hello, ".into()),
                StreamEvent::Text("world!".into())
            ]
        );
    }

    #[tokio::test]
    async fn test_tool_call_fragments_are_stitched() {
        // Event boundaries deliberately split across byte chunks
        let events = collect(&[
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_a\",\"function\":{\"name\":\"kubectl_get\",\"arguments\":\"\"}}]}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"resourceType\\\":\"}}]}}]}\n",
            "\ndata: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"\\\"namespaces\\\"}\"}},",
            "{\"index\":1,\"id\":\"call_b\",\"function\":{\"name\":\"kubectl_get\",\"arguments\":\"{}\"}}]}}]}\n\n",
            "data: [DONE]\n\n",
        ])
        .await
        .unwrap();

        assert_eq!(
            events,
            vec![StreamEvent::ToolCalls(vec![
                ToolCall::new("call_a", "kubectl_get", "{\"resourceType\":\"namespaces\"}"),
                ToolCall::new("call_b", "kubectl_get", "{}"),
            ])]
        );
    }

    #[tokio::test]
    async fn test_stream_without_done_still_flushes_tool_calls() {
        let events = collect(&[
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"name\":\"ping\",\"arguments\":\"{}\"}}]}}]}\n\n",
        ])
        .await
        .unwrap();

        assert_eq!(
            events,
            vec![StreamEvent::ToolCalls(vec![ToolCall::new("call_0", "ping", "{}")])]
        );
    }

    #[tokio::test]
    async fn test_malformed_chunk_is_decode_error() {
        let err = collect(&["data: {not json}\n\n"]).await.unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
    }

    #[test]
    fn test_completions_url() {
        let config = BackendConfig {
            endpoint: "https://demo.openai.azure.com".into(),
            api_key: "k".into(),
            deployment: "gpt-4o-standard".into(),
            api_version: "2024-02-01".into(),
            request_timeout: Duration::from_secs(5),
        };
        assert_eq!(
            completions_url(&config),
            "https://demo.openai.azure.com/openai/deployments/gpt-4o-standard/chat/completions?api-version=2024-02-01"
        );

        let backend = AzureOpenAiBackend::new(&config).unwrap();
        assert_eq!(backend.url(), completions_url(&config));
        assert_eq!(backend.name(), "gpt-4o-standard");
    }

    #[test]
    fn test_http_error_uses_service_message() {
        let err = map_http_error(
            401,
            r#"{"error":{"code":"401","message":"Access denied due to invalid subscription key."}}"#.into(),
        );
        match err {
            BackendError::Status { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Access denied due to invalid subscription key.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
