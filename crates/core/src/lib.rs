//! The cheatcalls harness core library.
//!
//! This crate resolves the configured fork provider, starts it and hands tests a [TestHarness]
//! with a funded sender and a cheatcalls client bound to the fork.

pub mod fork_provider;
pub mod harness;
pub mod multicall;
pub mod provider;

pub use fork_provider::{ForkProvider, ProviderQuirks};
pub use harness::{SENDER_FUNDS, TestHarness, setup_test_harness};
