//! Assembles a started fork, a funded sender and the clients talking to them.

use alloy::{
    network::Ethereum,
    primitives::{Address, U256},
    providers::DynProvider,
};
use anyhow::{Context, Result};
use cheatcalls_config::{Arguments, ForkProviderKind};
use cheatcalls_node::ForkSpec;
use cheatcalls_node_interaction::CheatcallsClient;
use tracing::{info, instrument};

use crate::{
    fork_provider::{ForkProvider, ProviderQuirks},
    provider::construct_wallet_provider,
};

/// The balance the sender starts every harness with, 100 ether.
pub const SENDER_FUNDS: u128 = 100_000_000_000_000_000_000;

/// A live fork together with the clients bound to its endpoint.
///
/// [TestHarness::teardown] stops the fork provider. A harness dropped without teardown still
/// kills a local anvil process, a Tenderly virtual network is never deleted either way.
#[derive(Debug)]
pub struct TestHarness {
    node: ForkProvider,
    spec: ForkSpec,
    provider: DynProvider<Ethereum>,
    cheats: CheatcallsClient<DynProvider<Ethereum>>,
    sender: Address,
}

impl TestHarness {
    /// The provider signing transactions as [TestHarness::sender].
    pub fn provider(&self) -> &DynProvider<Ethereum> {
        &self.provider
    }

    pub fn cheats(&self) -> &CheatcallsClient<DynProvider<Ethereum>> {
        &self.cheats
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn spec(&self) -> ForkSpec {
        self.spec
    }

    pub fn kind(&self) -> ForkProviderKind {
        self.node.kind()
    }

    pub fn quirks(&self) -> ProviderQuirks {
        self.node.quirks()
    }

    pub fn url(&self) -> &str {
        self.node.url()
    }

    pub async fn teardown(mut self) {
        self.node.stop().await;
    }
}

/// Starts the configured fork provider for `spec` and funds the sender on it.
///
/// The provider is stopped again if anything after its start fails.
#[instrument(
    level = "info",
    skip_all,
    fields(
        node = %arguments.node,
        origin_chain_id = spec.origin_chain_id,
        fork_block_number = spec.fork_block_number,
    ),
    err
)]
pub async fn setup_test_harness(arguments: &Arguments, spec: ForkSpec) -> Result<TestHarness> {
    let signer = arguments.sender()?;
    let sender = signer.address();

    let arguments = arguments.clone().with_working_directory()?;
    let mut node = ForkProvider::new(&arguments)?;
    node.start(spec)
        .await
        .with_context(|| format!("Failed to start the {} fork", arguments.node))?;

    let provider = match construct_wallet_provider(node.url(), spec.fork_chain_id, signer).await {
        Ok(provider) => provider,
        Err(err) => {
            node.stop().await;
            return Err(err);
        }
    };
    let harness = TestHarness {
        cheats: node.cheatcalls_client(provider.clone()),
        node,
        spec,
        provider,
        sender,
    };

    let funded = harness
        .cheats
        .set_balance(sender, U256::from(SENDER_FUNDS))
        .await;
    if let Err(err) = funded {
        harness.teardown().await;
        return Err(err).context("Failed to fund the sender");
    }

    info!(url = harness.url(), %sender, "Test harness is ready");
    Ok(harness)
}
