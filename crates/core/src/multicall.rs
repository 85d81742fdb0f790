//! Reads of the Multicall3 contract deployed on every supported origin chain.

use alloy::{
    network::TransactionBuilder,
    primitives::{Address, U256, address},
    providers::Provider,
    rpc::types::{BlockId, TransactionRequest},
    sol,
    sol_types::{SolCall, SolValue},
};
use anyhow::{Context, Result};

pub const MULTICALL3_ADDRESS: Address = address!("0xcA11bde05977b3631167028862bE2a173976CA11");

sol! {
    interface IMulticall3 {
        function getCurrentBlockTimestamp() external view returns (uint256 timestamp);
    }
}

/// The timestamp of the pending block as seen by contract code.
///
/// After `setNextBlockTimestamp` this is the configured timestamp although no block was mined
/// yet, which is how the effect of the cheatcall is observed without a transaction.
pub async fn pending_block_timestamp(provider: &impl Provider) -> Result<u64> {
    let request = TransactionRequest::default()
        .with_to(MULTICALL3_ADDRESS)
        .with_input(IMulticall3::getCurrentBlockTimestampCall {}.abi_encode());

    let output = provider
        .call(request)
        .block(BlockId::pending())
        .await
        .context("Failed to call getCurrentBlockTimestamp on the pending block")?;
    let timestamp = U256::abi_decode(&output)
        .context("Failed to decode the getCurrentBlockTimestamp return data")?;

    u64::try_from(timestamp).context("The pending block timestamp does not fit into 64 bits")
}
