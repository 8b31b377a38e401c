use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    // Parse CLI arguments
    let mut cli = Cli::parse();

    match cli.command.take().unwrap_or(Commands::Chat) {
        // Only needs the plugin, never the backend or instructions
        Commands::Tools => commands::handle_tools(cli.plugin.command()).await,
        Commands::Chat => {
            let options = cli.agent_options().await?;
            commands::handle_chat(options, shutdown_on_interrupt()).await
        }
        Commands::Ask { message } => {
            let options = cli.agent_options().await?;
            commands::handle_ask(options, message, shutdown_on_interrupt()).await
        }
        Commands::Doctor => commands::handle_doctor(cli.agent_options().await?).await,
    }
}

/// Cancellation token that fires on SIGINT/SIGTERM (Ctrl+C on Windows)
fn shutdown_on_interrupt() -> CancellationToken {
    let shutdown_token = CancellationToken::new();

    // Spawn cross-platform signal handler
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        wait_for_interrupt().await;
        log::debug!("Received interrupt signal, closing session");
        signal_token.cancel();
    });

    shutdown_token
}

/// Wait for interrupt signal (cross-platform)
#[cfg(unix)]
async fn wait_for_interrupt() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm_result = signal(SignalKind::terminate());
    let mut sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result.as_mut(), sigint_result.as_mut()) {
        (Ok(sigterm), Ok(sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {}
                _ = sigint.recv() => {}
            }
        }
        (Ok(sigterm), Err(_)) => {
            let _ = sigterm.recv().await;
        }
        (Err(_), Ok(sigint)) => {
            let _ = sigint.recv().await;
        }
        (Err(_), Err(_)) => {
            // Without signal handlers the session only ends on disconnect
            let () = std::future::pending().await;
        }
    }
}

/// Wait for interrupt signal (cross-platform)
#[cfg(windows)]
async fn wait_for_interrupt() {
    use tokio::signal::windows;

    match windows::ctrl_c() {
        Ok(mut ctrl_c) => {
            let _ = ctrl_c.recv().await;
        }
        Err(_) => {
            let () = std::future::pending().await;
        }
    }
}
