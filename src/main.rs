use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use muxmate::agent::{Manager, RunStatus};
use muxmate::config::Config;
use muxmate::llm::{LlmClient, LlmConfig};
use muxmate::repl::{self, ReplConfirmer};
use muxmate::tmux::{PaneDriver, TmuxClient, TmuxError};

#[derive(Debug, Parser)]
#[command(name = "muxmate")]
#[command(about = "AI pair operator that lives inside your tmux window")]
struct Args {
    /// Initial request; drives the loop once to termination and exits
    message: Option<String>,

    /// Start in watch mode with the given goal
    #[arg(short, long)]
    watch: Option<String>,

    /// Config file path (default: <config_dir>/muxmate/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    config.require_api_key()?;

    let tmux = Arc::new(TmuxClient::new());

    // Outside tmux there is no window to live in: spawn a session that
    // re-runs this command inside it, attach, and let that instance take over.
    let repl_pane = match tmux.current_pane_id().await {
        Ok(id) => id,
        Err(TmuxError::NotInTmux) => {
            let pane = tmux.create_session().await?;
            let command = std::env::args().collect::<Vec<_>>().join(" ");
            tmux.send_keys(&pane, &command, true).await?;
            // Shell startup may swallow the trailing Enter.
            tokio::time::sleep(Duration::from_secs(1)).await;
            tmux.send_keys(&pane, "Enter", false).await?;
            tmux.attach_session(&pane).await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let exec_pane = Manager::probe_exec_pane(tmux.as_ref(), &repl_pane).await?;
    info!(pane = %exec_pane.id, shell = %exec_pane.shell, "exec pane ready");

    let llm = Arc::new(LlmClient::new(LlmConfig {
        base_url: config.openrouter.base_url.clone(),
        api_key: config.openrouter.api_key.clone(),
        request_timeout_secs: 120,
    })?);

    let mut manager = Manager::new(config, llm, tmux, Box::new(ReplConfirmer), exec_pane);

    // SIGINT is the cancellation channel while a request is in flight; the
    // loop observes the flip at its next suspension point. At the REPL
    // prompt rustyline handles Ctrl-C itself.
    let status = manager.status.clone();
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                break;
            }
            status.set(RunStatus::Idle);
        }
    });

    if let Some(goal) = args.watch {
        manager.run_watch(&goal).await?;
        return Ok(());
    }

    match args.message {
        Some(message) => repl::run_once(manager, &message).await,
        None => repl::run(manager).await,
    }
}
