//! Validation of the textual values cheatcalls accept.
//!
//! Balances, storage slots and storage values are unsigned 256 bit integers, so anything at or
//! above 2^256 is rejected here before it reaches the node. Bytecode has to be byte aligned hex.

use alloy::{
    hex,
    primitives::{B256, Bytes, U256},
};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("the value is empty")]
    Empty,
    #[error("{0} does not fit into 256 bits")]
    Overflow(String),
    #[error("{0} is not a valid hex string")]
    InvalidHex(String),
    #[error("{0} has an odd number of hex digits")]
    OddLength(String),
}

/// Parses a `0x` prefixed hex quantity or a decimal integer into a [U256].
pub fn parse_u256(input: &str) -> Result<U256, ValueError> {
    let (digits, radix) = match input.strip_prefix("0x") {
        Some(digits) => (digits, 16),
        None => (input, 10),
    };
    if digits.is_empty() {
        return Err(ValueError::Empty);
    }
    if !digits.chars().all(|c| c.is_digit(radix as u32)) {
        return Err(ValueError::InvalidHex(input.to_string()));
    }
    U256::from_str_radix(digits, radix).map_err(|_| ValueError::Overflow(input.to_string()))
}

/// Parses a storage slot or value into the 32 byte word sent over the wire.
pub fn parse_word(input: &str) -> Result<B256, ValueError> {
    parse_u256(input).map(B256::from)
}

/// Parses `0x` prefixed bytecode. `0x` alone is the empty code.
pub fn parse_bytecode(input: &str) -> Result<Bytes, ValueError> {
    let digits = input.strip_prefix("0x").unwrap_or(input);
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValueError::InvalidHex(input.to_string()));
    }
    if digits.len() % 2 != 0 {
        return Err(ValueError::OddLength(input.to_string()));
    }
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|_| ValueError::InvalidHex(input.to_string()))
}
