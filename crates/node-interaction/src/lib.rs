//! This crate implements the cheatcalls issued to forked nodes.
//!
//! Every fork provider exposes the same five state mutating operations, but under different RPC
//! method names. [CheatcallsClient] hides that behind one interface, the provider only decides
//! which [CheatcallDialect] the client speaks.

pub mod cheatcall;
pub mod client;
pub mod values;

pub use cheatcall::{Cheatcall, CheatcallDialect};
pub use client::{CheatcallError, CheatcallsClient};
pub use values::ValueError;
