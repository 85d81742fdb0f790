use alloy::{
    primitives::{Address, Bytes, U256},
    providers::Provider,
    transports::TransportError,
};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
    cheatcall::{Cheatcall, CheatcallDialect},
    values::{ValueError, parse_bytecode, parse_u256, parse_word},
};

#[derive(Debug, Error)]
pub enum CheatcallError {
    /// The node rejected the cheatcall, the node's message is preserved in the source.
    #[error("{method} failed: {source}")]
    Rpc {
        method: &'static str,
        #[source]
        source: TransportError,
    },
    #[error("invalid cheatcall argument: {0}")]
    InvalidValue(#[from] ValueError),
}

/// Issues cheatcalls to the single endpoint of a fork session.
///
/// The client holds nothing but the provider connected to the session endpoint and the dialect of
/// the provider which created it. It must not be used after the owning session was stopped.
///
/// Requests are sent one after another over the same provider, callers issuing several
/// cheatcalls concurrently against the same account must not rely on their interleaving.
#[derive(Clone, Debug)]
pub struct CheatcallsClient<P> {
    provider: P,
    dialect: CheatcallDialect,
}

impl<P: Provider> CheatcallsClient<P> {
    pub fn new(provider: P, dialect: CheatcallDialect) -> Self {
        Self { provider, dialect }
    }

    pub fn dialect(&self) -> CheatcallDialect {
        self.dialect
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Sends the cheatcall in this client's dialect. The result of the call is discarded, some
    /// nodes answer with `null` and others with a transaction hash.
    #[instrument(level = "debug", skip_all, fields(dialect = ?self.dialect), err)]
    pub async fn execute(&self, cheatcall: Cheatcall) -> Result<(), CheatcallError> {
        let method = cheatcall.method(self.dialect);
        let params = cheatcall.params();
        debug!(method, %params, "Issuing cheatcall");

        self.provider
            .raw_request::<_, serde_json::Value>(method.into(), params)
            .await
            .map_err(|source| CheatcallError::Rpc { method, source })?;
        Ok(())
    }

    /// Sets the timestamp of the next mined block. No block is mined by this call, the timestamp
    /// is visible through the pending block and applies to the next block a transaction mines.
    pub async fn set_next_block_timestamp(&self, timestamp: u64) -> Result<(), CheatcallError> {
        self.execute(Cheatcall::SetNextBlockTimestamp { timestamp })
            .await
    }

    pub async fn set_balance(&self, address: Address, balance: U256) -> Result<(), CheatcallError> {
        self.execute(Cheatcall::SetBalance { address, balance })
            .await
    }

    /// Like [Self::set_balance] but takes a textual quantity, balances at or above 2^256 are
    /// rejected without contacting the node.
    pub async fn set_balance_hex(
        &self,
        address: Address,
        balance: &str,
    ) -> Result<(), CheatcallError> {
        let balance = parse_u256(balance)?;
        self.set_balance(address, balance).await
    }

    pub async fn set_nonce(&self, address: Address, nonce: u64) -> Result<(), CheatcallError> {
        self.execute(Cheatcall::SetNonce { address, nonce }).await
    }

    pub async fn set_code(&self, address: Address, code: Bytes) -> Result<(), CheatcallError> {
        self.execute(Cheatcall::SetCode { address, code }).await
    }

    /// Like [Self::set_code] but validates textual bytecode first, odd length hex is rejected
    /// without contacting the node.
    pub async fn set_code_hex(&self, address: Address, code: &str) -> Result<(), CheatcallError> {
        let code = parse_bytecode(code)?;
        self.set_code(address, code).await
    }

    pub async fn set_storage_at(
        &self,
        address: Address,
        slot: U256,
        value: U256,
    ) -> Result<(), CheatcallError> {
        self.execute(Cheatcall::SetStorageAt {
            address,
            slot: slot.into(),
            value: value.into(),
        })
        .await
    }

    /// Like [Self::set_storage_at] but takes textual slots and values, anything at or above
    /// 2^256 is rejected without contacting the node.
    pub async fn set_storage_at_hex(
        &self,
        address: Address,
        slot: &str,
        value: &str,
    ) -> Result<(), CheatcallError> {
        let slot = parse_word(slot)?;
        let value = parse_word(value)?;
        self.execute(Cheatcall::SetStorageAt {
            address,
            slot,
            value,
        })
        .await
    }
}
