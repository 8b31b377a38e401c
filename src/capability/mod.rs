//! Capability set exposed to the completion backend
//!
//! Remote capabilities are discovered from the plugin at runtime, so the set
//! is a name-indexed table rather than a static enum. Each entry knows how it
//! is dispatched.

pub mod report;

use std::collections::HashMap;

use rmcp::model::Tool;
use serde_json::Value;

pub use report::{GenerateSummaryArgs, ReportSink, GENERATE_SUMMARY, REPORT_FILE_NAME};

/// Capabilities implemented inside this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalCapability {
    GenerateClusterSummary,
}

/// Where a capability call is routed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityKind {
    /// Proxied to the named MCP plugin
    Remote { plugin: String },
    Local(LocalCapability),
}

/// A named, described, invocable unit offered to the model
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: Value,
    pub kind: CapabilityKind,
}

impl CapabilityDescriptor {
    /// Build a remote descriptor from an MCP tool listing
    pub fn from_tool(plugin: &str, tool: &Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool
                .description
                .as_deref()
                .unwrap_or_default()
                .to_string(),
            parameters: Value::Object((*tool.input_schema).clone()),
            kind: CapabilityKind::Remote {
                plugin: plugin.to_string(),
            },
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.kind, CapabilityKind::Remote { .. })
    }
}

/// Runtime mapping from capability name to descriptor
///
/// Registration order is preserved so the model always sees tools in the
/// same order.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    entries: Vec<CapabilityDescriptor>,
    index: HashMap<String, usize>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability. Returns `false` and keeps the existing entry when
    /// the name is already taken.
    pub fn register(&mut self, descriptor: CapabilityDescriptor) -> bool {
        if self.index.contains_key(&descriptor.name) {
            log::warn!(
                "Capability '{}' already registered, ignoring duplicate",
                descriptor.name
            );
            return false;
        }
        self.index
            .insert(descriptor.name.clone(), self.entries.len());
        self.entries.push(descriptor);
        true
    }

    /// Register every tool of a plugin, skipping names already present
    pub fn register_tools(&mut self, plugin: &str, tools: &[Tool]) -> usize {
        tools
            .iter()
            .filter(|tool| self.register(CapabilityDescriptor::from_tool(plugin, tool)))
            .count()
    }

    pub fn get(&self, name: &str) -> Option<&CapabilityDescriptor> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn descriptors(&self) -> &[CapabilityDescriptor] {
        &self.entries
    }

    pub fn remote_count(&self) -> usize {
        self.entries.iter().filter(|d| d.is_remote()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
