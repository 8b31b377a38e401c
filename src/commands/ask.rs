use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use kube_discovery::{AgentOptions, DiscoveryAgent};

/// Handle the `kube-discovery ask` subcommand
///
/// Runs exactly one turn. Unlike the chat session, failures are returned so
/// the exit code reflects them.
pub async fn handle_ask(
    options: AgentOptions,
    message: Vec<String>,
    shutdown: CancellationToken,
) -> Result<()> {
    let message = message.join(" ");
    let mut agent = DiscoveryAgent::create(options)
        .await
        .context("Failed to create the discovery agent")?;

    let outcome = tokio::select! {
        reply = agent.invoke(&message) => Some(reply),
        () = shutdown.cancelled() => None,
    };
    agent.close().await;

    match outcome {
        Some(reply) => {
            let reply = reply.context("Agent failed to answer")?;
            if reply.trim().is_empty() {
                anyhow::bail!("No response received from the agent");
            }
            println!("{reply}");
            Ok(())
        }
        None => anyhow::bail!("Interrupted"),
    }
}
