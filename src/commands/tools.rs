use anyhow::{Context, Result};

use kube_discovery::capability::{CapabilitySet, ReportSink};
use kube_discovery::mcp::McpPlugin;
use kube_discovery::PluginCommand;

/// Handle the `kube-discovery tools` subcommand
///
/// Needs no backend credentials: only the plugin is started.
pub async fn handle_tools(command: PluginCommand) -> Result<()> {
    let plugin = McpPlugin::start(&command)
        .await
        .with_context(|| format!("Failed to start plugin: {command}"))?;

    let mut capabilities = CapabilitySet::new();
    capabilities.register(ReportSink::descriptor());
    capabilities.register_tools(plugin.name(), plugin.tools());

    println!(
        "Available capabilities ({} remote from '{}', {} local):",
        capabilities.remote_count(),
        plugin.name(),
        capabilities.len() - capabilities.remote_count()
    );
    for descriptor in capabilities.descriptors() {
        let origin = if descriptor.is_remote() { "remote" } else { "local" };
        println!("  - {} [{}]", descriptor.name, origin);
        if let Some(summary) = descriptor.description.lines().next()
            && !summary.is_empty()
        {
            println!("      {summary}");
        }
    }

    plugin.stop().await;
    Ok(())
}
