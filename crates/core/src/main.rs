use alloy::primitives::{BlockNumber, ChainId};
use anyhow::Context;
use clap::Parser;
use cheatcalls_config::Arguments;
use cheatcalls_core::setup_test_harness;
use cheatcalls_node::ForkSpec;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Starts a fork, funds the sender on it and keeps it running until interrupted.
#[derive(Debug, Parser)]
#[command(name = "cheatcalls")]
struct Cli {
    /// The chain to fork.
    #[arg(long = "origin-chain-id", default_value = "1")]
    origin_chain_id: ChainId,

    /// The chain id the fork reports, the origin chain id if not specified.
    #[arg(long = "fork-chain-id")]
    fork_chain_id: Option<ChainId>,

    /// The block of the origin chain the fork is created at.
    #[arg(long = "fork-block-number")]
    fork_block_number: BlockNumber,

    #[command(flatten)]
    arguments: Arguments,
}

fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed building the Runtime")?
        .block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let arguments = cli.arguments.with_working_directory()?;
    let spec = ForkSpec {
        origin_chain_id: cli.origin_chain_id,
        fork_chain_id: cli.fork_chain_id.unwrap_or(cli.origin_chain_id),
        fork_block_number: cli.fork_block_number,
    };
    info!(
        node = %arguments.node,
        workdir = %arguments.directory().display(),
        "Starting fork"
    );

    let harness = setup_test_harness(&arguments, spec).await?;
    println!("rpc url: {}", harness.url());
    println!("sender: {}", harness.sender());

    let interrupted = tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C");
    info!("Stopping fork");
    harness.teardown().await;
    interrupted
}
