use alloy::primitives::{Address, B256, Bytes, U64, U256};
use serde_json::{Value, json};

/// The RPC method namespace a fork provider understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CheatcallDialect {
    /// The `anvil_*` methods of a local anvil process.
    Anvil,
    /// The `tenderly_*` methods of a Tenderly virtual network admin RPC.
    Tenderly,
}

/// A single state mutating operation against a fork.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cheatcall {
    /// Sets the timestamp the next mined block carries without mining a block.
    SetNextBlockTimestamp { timestamp: u64 },
    SetBalance { address: Address, balance: U256 },
    SetNonce { address: Address, nonce: u64 },
    SetCode { address: Address, code: Bytes },
    SetStorageAt {
        address: Address,
        slot: B256,
        value: B256,
    },
}

impl Cheatcall {
    /// The RPC method implementing this operation in the given dialect.
    pub fn method(&self, dialect: CheatcallDialect) -> &'static str {
        use CheatcallDialect::*;

        match (dialect, self) {
            (Anvil, Self::SetNextBlockTimestamp { .. }) => "evm_setNextBlockTimestamp",
            (Anvil, Self::SetBalance { .. }) => "anvil_setBalance",
            (Anvil, Self::SetNonce { .. }) => "anvil_setNonce",
            (Anvil, Self::SetCode { .. }) => "anvil_setCode",
            (Anvil, Self::SetStorageAt { .. }) => "anvil_setStorageAt",
            (Tenderly, Self::SetNextBlockTimestamp { .. }) => "tenderly_setNextBlockTimestamp",
            (Tenderly, Self::SetBalance { .. }) => "tenderly_setBalance",
            // Tenderly has no `tenderly_setNonce`.
            (Tenderly, Self::SetNonce { .. }) => "evm_setNonce",
            (Tenderly, Self::SetCode { .. }) => "tenderly_setCode",
            (Tenderly, Self::SetStorageAt { .. }) => "tenderly_setStorageAt",
        }
    }

    /// The positional JSON-RPC params. Quantities are minimal `0x` hex, storage slots and values
    /// are 32 byte words. Both dialects share the same encoding.
    pub fn params(&self) -> Value {
        match self {
            Self::SetNextBlockTimestamp { timestamp } => json!([U64::from(*timestamp)]),
            Self::SetBalance { address, balance } => json!([address, balance]),
            Self::SetNonce { address, nonce } => json!([address, U64::from(*nonce)]),
            Self::SetCode { address, code } => json!([address, code]),
            Self::SetStorageAt {
                address,
                slot,
                value,
            } => json!([address, slot, value]),
        }
    }
}
