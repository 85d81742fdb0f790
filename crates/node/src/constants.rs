use alloy::primitives::ChainId;

/// The RPC URL prefixes of the chains anvil can fork, the Alchemy API key is appended.
pub const ORIGIN_CHAIN_RPC_URLS: &[(ChainId, &str)] =
    &[(1, "https://eth-mainnet.alchemyapi.io/v2/")];

/// Returns the RPC URL prefix for the origin chain, if the chain is supported.
pub fn origin_chain_rpc_url_prefix(chain_id: ChainId) -> Option<&'static str> {
    ORIGIN_CHAIN_RPC_URLS
        .iter()
        .find(|(id, _)| *id == chain_id)
        .map(|(_, prefix)| *prefix)
}
