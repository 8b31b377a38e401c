// src/mcp/mod.rs
pub mod plugin;

pub use plugin::McpPlugin;
