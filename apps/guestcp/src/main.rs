//! guestcp command-line entry point.

mod cli;
mod config;
mod progress;

use clap::Parser;
use guestcp_client::{
    CopyCallbacks, CpConfig, CpFromInstanceOptions, CpToInstanceOptions, WsConnector,
    copy_from_instance, copy_to_instance,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, CopyPlan, CpArgs};
use crate::config::FileConfig;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let file = FileConfig::load(cli.config.as_deref())?;
    let config = file.resolve(cli.base_url, cli.api_key)?;

    let rt = tokio::runtime::Runtime::new()?;
    match cli.command {
        Command::Cp(args) => rt.block_on(run_cp(&config, &file, args)),
    }
}

async fn run_cp(config: &CpConfig, file: &FileConfig, args: CpArgs) -> anyhow::Result<()> {
    let plan = CopyPlan::from_args(&args.src, &args.dst)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling transfer");
                cancel.cancel();
            }
        });
    }

    let callbacks = if args.quiet {
        CopyCallbacks::default()
    } else {
        progress::terminal_callbacks()
    };
    let chunk_size = args.chunk_size.or(file.chunk_size).unwrap_or(0);
    let connector = WsConnector::new();

    match plan {
        CopyPlan::ToGuest { src, instance, dst } => {
            let opts = CpToInstanceOptions {
                mode: args.mode,
                archive: args.archive,
                follow_links: args.follow_links,
                chunk_size,
                callbacks,
                ..CpToInstanceOptions::new(instance, src, dst)
            };
            copy_to_instance(&connector, config, &opts, &cancel).await?;
        }
        CopyPlan::FromGuest { instance, src, dst } => {
            if args.mode.is_some() {
                tracing::warn!("--mode only applies when copying to an instance; ignoring");
            }
            let opts = CpFromInstanceOptions {
                archive: args.archive,
                follow_links: args.follow_links,
                callbacks,
                ..CpFromInstanceOptions::new(instance, src, dst)
            };
            copy_from_instance(&connector, config, &opts, &cancel).await?;
        }
    }
    Ok(())
}
