use anyhow::Result;
use futures::TryStreamExt;

use kube_discovery::backend::{AzureOpenAiBackend, ChatMessage, CompletionBackend, StreamEvent};
use kube_discovery::config::mask_secret;
use kube_discovery::mcp::McpPlugin;
use kube_discovery::{AgentOptions, BackendSettings, PluginCommand};

const PROBE_MESSAGE: &str = "Reply with the single word: ready";

/// Handle the `kube-discovery doctor` subcommand
///
/// Runs every check even when an earlier one fails and exits non-zero if
/// any check failed.
pub async fn handle_doctor(options: AgentOptions) -> Result<()> {
    let mut failures = 0;

    println!("🔧 Configuration");
    println!("  Report directory: {}", options.report_directory.display());
    println!("  Plugin command:   {}", options.plugin);

    if !check_backend(options.backend).await {
        failures += 1;
    }
    if !check_plugin(&options.plugin).await {
        failures += 1;
    }

    if failures == 0 {
        println!("\n✓ All checks passed");
        Ok(())
    } else {
        anyhow::bail!("{failures} check(s) failed")
    }
}

async fn check_backend(settings: BackendSettings) -> bool {
    println!("\n🤖 Completion backend");
    let config = match settings.resolve() {
        Ok(config) => config,
        Err(e) => {
            println!("  ✗ {e}");
            return false;
        }
    };

    println!("  Endpoint:    {}", config.endpoint);
    println!("  Deployment:  {}", config.deployment);
    println!("  API version: {}", config.api_version);
    println!("  API key:     {}", mask_secret(&config.api_key));

    let backend = match AzureOpenAiBackend::new(&config) {
        Ok(backend) => backend,
        Err(e) => {
            println!("  ✗ {e}");
            return false;
        }
    };

    println!("  Request URL: {}", backend.url());

    match probe(&backend).await {
        Ok(reply) => {
            println!("  ✓ Completion succeeded: {}", reply.trim());
            true
        }
        Err(e) => {
            println!("  ✗ Completion failed: {e}");
            false
        }
    }
}

async fn probe(backend: &AzureOpenAiBackend) -> Result<String> {
    let messages = [ChatMessage::user(PROBE_MESSAGE)];
    let events: Vec<StreamEvent> = backend.stream(&messages, &[]).await?.try_collect().await?;
    Ok(events
        .into_iter()
        .filter_map(|event| match event {
            StreamEvent::Text(text) => Some(text),
            StreamEvent::ToolCalls(_) => None,
        })
        .collect())
}

async fn check_plugin(command: &PluginCommand) -> bool {
    println!("\n☸️  Discovery plugin");

    match which::which(&command.program) {
        Ok(path) => println!("  ✓ {} found at {}", command.program, path.display()),
        Err(_) => {
            println!("  ✗ {} not found in PATH", command.program);
            return false;
        }
    }

    match McpPlugin::start(command).await {
        Ok(plugin) => {
            println!("  ✓ Plugin '{}' started with {} tools", plugin.name(), plugin.tools().len());
            plugin.stop().await;
            true
        }
        Err(e) => {
            println!("  ✗ {e}");
            false
        }
    }
}
