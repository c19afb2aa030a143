//! `sigild`: run the sigil service on a Unix socket.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sigil_server::{ServerConfig, SigilServer};
use sigil_session::PromptPolicy;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Socket to listen on, overriding the config file
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Directory served by the fs protocol
    #[arg(long)]
    fs_root: Option<PathBuf>,

    /// How long a handler waits for a prompt to be answered
    #[arg(long)]
    prompt_timeout_ms: Option<u64>,

    /// What a second prompt on a busy session does
    #[arg(long, value_enum)]
    prompt_policy: Option<PolicyArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Queue,
    FailFast,
}

impl From<PolicyArg> for PromptPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Queue => PromptPolicy::Queue,
            PolicyArg::FailFast => PromptPolicy::FailFast,
        }
    }
}

impl Args {
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ServerConfig::default(),
        };
        if let Some(socket) = self.socket {
            config.socket_path = socket;
        }
        if let Some(root) = self.fs_root {
            config.fs_root = root;
        }
        if let Some(ms) = self.prompt_timeout_ms {
            config.secrets.prompt_timeout = std::time::Duration::from_millis(ms);
        }
        if let Some(policy) = self.prompt_policy {
            config.secrets.prompt_policy = policy.into();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config()?;
    let server = SigilServer::builder()
        .config(config)
        .build()
        .context("starting sigil service")?;

    server
        .serve_until(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Interrupted"),
                Err(e) => {
                    warn!(error = %e, "Cannot listen for ctrl-c, serving until killed");
                    std::future::pending::<()>().await
                }
            }
        })
        .await?;
    Ok(())
}
