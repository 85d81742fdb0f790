//! This crate implements the fork providers.
//!
//! A fork provider materializes a fork of a public chain at a historical block and exposes it
//! through a single RPC endpoint. [anvil::AnvilNode] spawns a local process, while
//! [tenderly::TenderlyNode] creates a remote virtual network.

use alloy::{
    primitives::{BlockNumber, ChainId},
    providers::Provider,
};
use cheatcalls_node_interaction::{CheatcallDialect, CheatcallsClient};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::TransportError;

pub mod anvil;
pub mod constants;
pub mod process;
pub mod tenderly;
pub mod transport;

/// Which chain to fork, at which block, and which chain id the fork reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForkSpec {
    pub origin_chain_id: ChainId,
    pub fork_chain_id: ChainId,
    pub fork_block_number: BlockNumber,
}

/// The reasons a fork provider fails to start.
#[derive(Debug, Error)]
pub enum ForkNodeError {
    #[error("no RPC URL is known for origin chain {chain_id}")]
    UnsupportedOriginChain { chain_id: ChainId },
    #[error("missing configuration: {0}")]
    MissingCredentials(&'static str),
    #[error("failed to start the node process: {0:#}")]
    ProcessStart(anyhow::Error),
    #[error("failed to create the virtual network (status {status:?}): {body}")]
    SessionCreate { status: Option<u16>, body: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// An abstract interface for fork providers.
///
/// A provider owns at most one live fork session at a time. Calling [ForkNode::start] twice
/// without [ForkNode::stop] in between is a usage error.
pub trait ForkNode {
    /// The cheatcall methods the forked endpoint understands.
    const DIALECT: CheatcallDialect;

    /// Materializes the fork and blocks until its endpoint accepts requests.
    fn start(&mut self, spec: ForkSpec) -> impl Future<Output = Result<(), ForkNodeError>>;

    /// Releases what [ForkNode::start] acquired. Safe to call when the provider never started or
    /// failed to start.
    fn stop(&mut self) -> impl Future<Output = ()>;

    /// The RPC endpoint of the fork.
    ///
    /// # Panics
    ///
    /// If the provider has not been started successfully.
    fn url(&self) -> &str;

    /// Wraps a provider connected to [ForkNode::url] into a cheatcalls client. Performs no I/O
    /// and may be called any number of times.
    fn cheatcalls_client<P: Provider>(&self, provider: P) -> CheatcallsClient<P> {
        CheatcallsClient::new(provider, Self::DIALECT)
    }
}
