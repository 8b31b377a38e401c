//! Conversational Kubernetes discovery agent.
//!
//! A [`session::Session`] owns one [`agent::DiscoveryAgent`]. The agent sends
//! each user message to a streaming completion backend together with the
//! capability set: the tools of an MCP plugin subprocess
//! ([`mcp::McpPlugin`]) plus the local report writer
//! ([`capability::ReportSink`]).

pub mod agent;
pub mod backend;
pub mod capability;
pub mod config;
pub mod embedded;
pub mod error;
pub mod mcp;
pub mod session;

pub use agent::{AgentBuilder, DiscoveryAgent};
pub use config::{AgentOptions, BackendSettings, PluginCommand};
pub use error::{AgentError, CapabilityError, ConfigError, PluginError};
pub use session::{ChatSurface, Session};
