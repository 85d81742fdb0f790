use alloy::{
    network::{Ethereum, EthereumWallet},
    primitives::ChainId,
    providers::{
        DynProvider, Provider, ProviderBuilder,
        fillers::{ChainIdFiller, GasFiller, NonceFiller, SimpleNonceManager},
    },
    signers::local::PrivateKeySigner,
};
use anyhow::{Context, Result};

/// Connects a provider signing with `signer` to a fork endpoint.
///
/// Nonces are fetched from the node for every transaction rather than cached, cheatcalls may
/// change the nonce of the sender at any point.
pub async fn construct_wallet_provider(
    rpc_url: &str,
    chain_id: ChainId,
    signer: PrivateKeySigner,
) -> Result<DynProvider<Ethereum>> {
    let provider = ProviderBuilder::new()
        .disable_recommended_fillers()
        .filler(GasFiller)
        .filler(ChainIdFiller::new(Some(chain_id)))
        .filler(NonceFiller::<SimpleNonceManager>::default())
        .wallet(EthereumWallet::from(signer))
        .connect(rpc_url)
        .await
        .with_context(|| format!("Failed to connect to the fork at {rpc_url}"))?;

    Ok(provider.erased())
}
