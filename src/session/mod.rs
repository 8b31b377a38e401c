//! Session host
//!
//! One session per connected user. The session owns its agent, forwards every
//! inbound message to it, forwards the reply back, and closes the agent
//! exactly once when the user disconnects or the process is told to stop.

pub mod terminal;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::DiscoveryAgent;
use crate::config::AgentOptions;
use crate::error::{AgentError, TransportError};

pub use terminal::TerminalSurface;

/// End the session after this many transport failures in a row
const MAX_CONSECUTIVE_TRANSPORT_FAILURES: usize = 3;

pub const NO_RESPONSE_MESSAGE: &str = "❌ No response received from the agent.";

/// Text channel to one user
#[async_trait]
pub trait ChatSurface: Send {
    /// Next user message, `None` when the user disconnected
    async fn receive(&mut self) -> Result<Option<String>, TransportError>;

    async fn send(&mut self, text: &str) -> Result<(), TransportError>;
}

pub struct Session {
    id: Uuid,
    agent: DiscoveryAgent,
}

impl Session {
    pub fn new(agent: DiscoveryAgent) -> Self {
        let id = Uuid::new_v4();
        log::info!("Session {id} opened");
        Self { id, agent }
    }

    /// Create the agent and wrap it in a session
    pub async fn open(options: AgentOptions) -> Result<Self, AgentError> {
        Ok(Self::new(DiscoveryAgent::create(options).await?))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn agent(&self) -> &DiscoveryAgent {
        &self.agent
    }

    /// Answer one message; errors become user-visible text
    pub async fn handle(&mut self, message: &str) -> String {
        match self.agent.invoke(message).await {
            Ok(reply) if reply.trim().is_empty() => NO_RESPONSE_MESSAGE.to_string(),
            Ok(reply) => reply,
            Err(e) => {
                log::error!("Session {}: {}", self.id, e);
                format!("❌ Error processing your request: {e}")
            }
        }
    }

    /// Serve the session until disconnect or shutdown, then close it
    pub async fn run<S>(mut self, surface: &mut S, shutdown: CancellationToken) -> Result<(), TransportError>
    where
        S: ChatSurface + ?Sized,
    {
        let outcome = self.serve(surface, &shutdown).await;
        self.close().await;
        outcome
    }

    async fn serve<S>(&mut self, surface: &mut S, shutdown: &CancellationToken) -> Result<(), TransportError>
    where
        S: ChatSurface + ?Sized,
    {
        let mut failures = 0usize;
        let mut last_error = None;

        if let Err(e) = surface.send(crate::embedded::welcome_message()).await {
            log::warn!("Session {}: failed to send welcome message: {}", self.id, e);
            failures += 1;
            last_error = Some(e);
        }

        while failures < MAX_CONSECUTIVE_TRANSPORT_FAILURES {
            let received = tokio::select! {
                received = surface.receive() => received,
                () = shutdown.cancelled() => {
                    log::info!("Session {}: shutdown requested", self.id);
                    return Ok(());
                }
            };

            let message = match received {
                Ok(Some(message)) => message,
                Ok(None) => {
                    log::info!("Session {}: user disconnected", self.id);
                    return Ok(());
                }
                Err(e) => {
                    log::warn!("Session {}: receive failed: {}", self.id, e);
                    failures += 1;
                    if let Err(notice) = surface
                        .send(&format!("❌ Error receiving your message: {e}"))
                        .await
                    {
                        log::warn!("Session {}: failed to report receive error: {}", self.id, notice);
                    }
                    last_error = Some(e);
                    continue;
                }
            };

            if message.trim().is_empty() {
                continue;
            }

            let reply = tokio::select! {
                reply = self.handle(&message) => reply,
                () = shutdown.cancelled() => {
                    log::info!("Session {}: shutdown requested mid-turn", self.id);
                    return Ok(());
                }
            };

            match surface.send(&reply).await {
                Ok(()) => {
                    failures = 0;
                    last_error = None;
                }
                Err(e) => {
                    log::warn!("Session {}: send failed: {}", self.id, e);
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(TransportError::Closed))
    }

    /// Tear down the agent and its plugin
    pub async fn close(self) {
        log::info!("Session {} closing", self.id);
        self.agent.close().await;
    }
}
