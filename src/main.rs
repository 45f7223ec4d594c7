use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use klances_k8s::{FakeCluster, KubeClient};

mod cli;
mod config;
mod demo;
mod session;

use cli::Args;
use config::Config;
use session::Session;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.log_file.as_deref())?;

    // Run the application
    let result = run(args).await;

    // Handle any errors
    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

/// Diagnostics go to `log_file` when given; the dashboard owns the terminal.
fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }

    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_to(&mut config);
    config.validate()?;

    let cancel = CancellationToken::new();

    if args.demo {
        let cluster = FakeCluster::demo();
        let chatter = demo::spawn_chatter(cluster.clone(), cancel.child_token());

        let result = Session::new(Arc::new(cluster), config, "demo")
            .run(cancel.clone())
            .await;

        cancel.cancel();
        let _ = chatter.await;
        return result;
    }

    let client = KubeClient::connect(args.context.as_deref()).await?;
    let context = client.context().unwrap_or("default").to_string();
    tracing::debug!(context = %context, "Connected to cluster");

    Session::new(Arc::new(client), config, context)
        .run(cancel)
        .await
}
