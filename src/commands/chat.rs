use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use kube_discovery::session::{Session, TerminalSurface};
use kube_discovery::AgentOptions;

/// Handle the `kube-discovery chat` subcommand (the default)
pub async fn handle_chat(options: AgentOptions, shutdown: CancellationToken) -> Result<()> {
    let session = Session::open(options)
        .await
        .context("Failed to create the discovery agent")?;

    log::debug!(
        "Session {} uses {} chars of instructions",
        session.id(),
        session.agent().instructions().len()
    );

    match session.agent().plugin() {
        Some(plugin) => eprintln!(
            "✓ Plugin '{}' connected ({} tools)",
            plugin.name(),
            plugin.tools().len()
        ),
        None => eprintln!("✗ Plugin unavailable, only report generation will work (see logs)"),
    }

    let mut surface = TerminalSurface::stdio();
    session
        .run(&mut surface, shutdown)
        .await
        .context("Chat transport failed")?;

    Ok(())
}
