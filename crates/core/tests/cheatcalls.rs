//! Behavioral tests of the cheatcalls against a real fork.
//!
//! The fork provider and its credentials are read from the environment, for example
//! `HARNESS_NODE=anvil ALCHEMY_API_KEY=... cargo test -p cheatcalls-core -- --ignored`.

use std::time::Duration;

use alloy::{
    network::TransactionBuilder,
    primitives::{Address, Bytes, U256, address},
    providers::Provider,
    rpc::types::{BlockNumberOrTag, TransactionRequest},
};
use cheatcalls_config::Arguments;
use cheatcalls_core::{TestHarness, multicall::pending_block_timestamp, setup_test_harness};
use cheatcalls_node::ForkSpec;
use cheatcalls_node_interaction::{CheatcallError, ValueError};

const FORK_BLOCK_NUMBER: u64 = 20_433_802;
const FORK_BLOCK_TIMESTAMP: u64 = 1_722_516_575;
const MAINNET_FORK: ForkSpec = ForkSpec {
    origin_chain_id: 1,
    fork_chain_id: 1337,
    fork_block_number: FORK_BLOCK_NUMBER,
};

const UNISWAP_V3_FACTORY: Address = address!("0x1F98431c8aD98523631AE4a59f267346ea31F984");

async fn harness() -> TestHarness {
    let arguments = Arguments::default()
        .with_working_directory()
        .expect("Failed to create the working directory");
    setup_test_harness(&arguments, MAINNET_FORK)
        .await
        .expect("Failed to set up the test harness")
}

fn two_pow_256() -> String {
    format!("0x1{}", "0".repeat(64))
}

/// Mines a block with a transfer of nothing to the sender itself.
async fn mine_noop_transaction(harness: &TestHarness) -> u64 {
    let transaction = TransactionRequest::default()
        .with_from(harness.sender())
        .with_to(harness.sender())
        .with_value(U256::ZERO);
    let receipt = harness
        .provider()
        .send_transaction(transaction)
        .await
        .expect("Failed to send the transaction")
        .get_receipt()
        .await
        .expect("Failed to get the receipt");
    receipt.block_number.expect("The receipt has no block number")
}

async fn block_timestamp(harness: &TestHarness, number: BlockNumberOrTag) -> (u64, u64) {
    let block = harness
        .provider()
        .get_block_by_number(number)
        .await
        .expect("Failed to get the block")
        .expect("The block does not exist");
    (block.header.number, block.header.timestamp)
}

mod set_balance {
    use super::*;

    #[tokio::test]
    #[ignore = "Requires a fork provider"]
    async fn increases_the_balance() {
        // Arrange
        let harness = harness().await;
        let old_balance = harness
            .provider()
            .get_balance(harness.sender())
            .await
            .unwrap();
        let new_balance = old_balance + U256::from(1_000_000);

        // Act
        harness
            .cheats()
            .set_balance(harness.sender(), new_balance)
            .await
            .expect("Failed to set the balance");

        // Assert
        let balance = harness
            .provider()
            .get_balance(harness.sender())
            .await
            .unwrap();
        assert_eq!(balance, new_balance);
        harness.teardown().await;
    }

    #[tokio::test]
    #[ignore = "Requires a fork provider"]
    async fn sets_the_balance_to_the_bounds() {
        let harness = harness().await;

        for new_balance in [U256::ZERO, U256::MAX] {
            harness
                .cheats()
                .set_balance(harness.sender(), new_balance)
                .await
                .expect("Failed to set the balance");

            let balance = harness
                .provider()
                .get_balance(harness.sender())
                .await
                .unwrap();
            assert_eq!(balance, new_balance);
        }
        harness.teardown().await;
    }

    #[tokio::test]
    #[ignore = "Requires a fork provider"]
    async fn rejects_balances_beyond_256_bits() {
        // Arrange
        let harness = harness().await;
        let old_balance = harness
            .provider()
            .get_balance(harness.sender())
            .await
            .unwrap();

        // Act
        let result = harness
            .cheats()
            .set_balance_hex(harness.sender(), &two_pow_256())
            .await;

        // Assert
        assert!(matches!(
            result,
            Err(CheatcallError::InvalidValue(ValueError::Overflow(_)))
        ));
        let balance = harness
            .provider()
            .get_balance(harness.sender())
            .await
            .unwrap();
        assert_eq!(balance, old_balance);
        harness.teardown().await;
    }
}

mod set_next_block_timestamp {
    use super::*;

    fn skip_unpinned(harness: &TestHarness) -> bool {
        let skip = !harness.quirks().pins_next_block_timestamp;
        if skip {
            eprintln!(
                "skipping: {} mines a block with the current time when the fork is created",
                harness.kind()
            );
        }
        skip
    }

    #[tokio::test]
    #[ignore = "Requires a fork provider"]
    async fn next_mined_block_carries_the_timestamp() {
        // Arrange
        let harness = harness().await;
        if skip_unpinned(&harness) {
            return harness.teardown().await;
        }
        let expected_timestamp = FORK_BLOCK_TIMESTAMP + 1_000;

        // Act
        harness
            .cheats()
            .set_next_block_timestamp(expected_timestamp)
            .await
            .expect("Failed to set the next block timestamp");
        let block_number = mine_noop_transaction(&harness).await;

        // Assert
        let (number, timestamp) = block_timestamp(&harness, block_number.into()).await;
        assert_eq!(number, FORK_BLOCK_NUMBER + 1);
        assert_eq!(timestamp, expected_timestamp);
        harness.teardown().await;
    }

    #[tokio::test]
    #[ignore = "Requires a fork provider"]
    async fn pending_block_exposes_the_timestamp() {
        // Arrange
        let harness = harness().await;
        if skip_unpinned(&harness) {
            return harness.teardown().await;
        }
        let expected_timestamp = FORK_BLOCK_TIMESTAMP + 1_000;

        // Act
        harness
            .cheats()
            .set_next_block_timestamp(expected_timestamp)
            .await
            .expect("Failed to set the next block timestamp");

        // Assert
        let timestamp = pending_block_timestamp(harness.provider())
            .await
            .expect("Failed to read the pending block timestamp");
        assert_eq!(timestamp, expected_timestamp);
        harness.teardown().await;
    }

    #[tokio::test]
    #[ignore = "Requires a fork provider"]
    async fn does_not_mine_a_block() {
        // Arrange
        let harness = harness().await;
        if skip_unpinned(&harness) {
            return harness.teardown().await;
        }

        // Act
        harness
            .cheats()
            .set_next_block_timestamp(FORK_BLOCK_TIMESTAMP + 1_000)
            .await
            .expect("Failed to set the next block timestamp");

        // Assert
        let latest = block_timestamp(&harness, BlockNumberOrTag::Latest).await;
        assert_eq!(latest, (FORK_BLOCK_NUMBER, FORK_BLOCK_TIMESTAMP));
        harness.teardown().await;
    }

    #[tokio::test]
    #[ignore = "Requires a fork provider"]
    async fn timestamp_survives_a_delay() {
        // Arrange
        let harness = harness().await;
        if skip_unpinned(&harness) {
            return harness.teardown().await;
        }
        let expected_timestamp = FORK_BLOCK_TIMESTAMP + 1_000;

        // Act
        harness
            .cheats()
            .set_next_block_timestamp(expected_timestamp)
            .await
            .expect("Failed to set the next block timestamp");
        tokio::time::sleep(Duration::from_secs(5)).await;
        let block_number = mine_noop_transaction(&harness).await;

        // Assert
        let (number, timestamp) = block_timestamp(&harness, block_number.into()).await;
        assert_eq!(number, FORK_BLOCK_NUMBER + 1);
        assert_eq!(timestamp, expected_timestamp);
        harness.teardown().await;
    }

    #[tokio::test]
    #[ignore = "Requires a fork provider"]
    async fn rejects_timestamps_in_the_past() {
        let harness = harness().await;

        let result = harness
            .cheats()
            .set_next_block_timestamp(FORK_BLOCK_TIMESTAMP - 1_000)
            .await;

        assert!(matches!(result, Err(CheatcallError::Rpc { .. })));
        harness.teardown().await;
    }
}

mod set_code {
    use super::*;

    #[tokio::test]
    #[ignore = "Requires a fork provider"]
    async fn sets_code_on_contracts_and_eoas() {
        let harness = harness().await;

        for address in [UNISWAP_V3_FACTORY, harness.sender()] {
            harness
                .cheats()
                .set_code_hex(address, "0x00")
                .await
                .expect("Failed to set the code");

            let code = harness.provider().get_code_at(address).await.unwrap();
            assert_eq!(code, Bytes::from_static(&[0x00]));
        }
        harness.teardown().await;
    }

    #[tokio::test]
    #[ignore = "Requires a fork provider"]
    async fn rejects_odd_length_code() {
        // Arrange
        let harness = harness().await;
        let old_code = harness
            .provider()
            .get_code_at(UNISWAP_V3_FACTORY)
            .await
            .unwrap();

        // Act
        let result = harness
            .cheats()
            .set_code_hex(UNISWAP_V3_FACTORY, "0x00c")
            .await;

        // Assert
        assert!(matches!(
            result,
            Err(CheatcallError::InvalidValue(ValueError::OddLength(_)))
        ));
        let code = harness
            .provider()
            .get_code_at(UNISWAP_V3_FACTORY)
            .await
            .unwrap();
        assert_eq!(code, old_code);
        harness.teardown().await;
    }
}

mod set_nonce {
    use super::*;

    #[tokio::test]
    #[ignore = "Requires a fork provider"]
    async fn increases_the_nonce() {
        // Arrange
        let harness = harness().await;
        let old_nonce = harness
            .provider()
            .get_transaction_count(harness.sender())
            .await
            .unwrap();
        let new_nonce = old_nonce + 5;

        // Act
        harness
            .cheats()
            .set_nonce(harness.sender(), new_nonce)
            .await
            .expect("Failed to set the nonce");

        // Assert
        let nonce = harness
            .provider()
            .get_transaction_count(harness.sender())
            .await
            .unwrap();
        assert_eq!(nonce, new_nonce);
        harness.teardown().await;
    }
}

mod set_storage_at {
    use super::*;

    async fn storage_at(harness: &TestHarness, address: Address, slot: U256) -> U256 {
        harness
            .provider()
            .get_storage_at(address, slot)
            .await
            .expect("Failed to read the storage")
    }

    #[tokio::test]
    #[ignore = "Requires a fork provider"]
    async fn sets_values_across_the_whole_range() {
        let harness = harness().await;
        let cases = [
            (U256::from(90), U256::from(345)),
            (U256::from(90), U256::ZERO),
            (U256::from(90), U256::MAX),
            (U256::ZERO, U256::from(345)),
            (U256::MAX, U256::from(345)),
        ];

        for (slot, value) in cases {
            harness
                .cheats()
                .set_storage_at(UNISWAP_V3_FACTORY, slot, value)
                .await
                .expect("Failed to set the storage");

            assert_eq!(
                storage_at(&harness, UNISWAP_V3_FACTORY, slot).await,
                value,
                "slot {slot}"
            );
        }
        harness.teardown().await;
    }

    #[tokio::test]
    #[ignore = "Requires a fork provider"]
    async fn rejects_words_beyond_256_bits() {
        // Arrange
        let harness = harness().await;
        let old_value = storage_at(&harness, UNISWAP_V3_FACTORY, U256::from(90)).await;

        // Act
        let value = harness
            .cheats()
            .set_storage_at_hex(UNISWAP_V3_FACTORY, "0x5a", &two_pow_256())
            .await;
        let slot = harness
            .cheats()
            .set_storage_at_hex(UNISWAP_V3_FACTORY, &two_pow_256(), "0x159")
            .await;

        // Assert
        assert!(matches!(
            value,
            Err(CheatcallError::InvalidValue(ValueError::Overflow(_)))
        ));
        assert!(matches!(
            slot,
            Err(CheatcallError::InvalidValue(ValueError::Overflow(_)))
        ));
        assert_eq!(
            storage_at(&harness, UNISWAP_V3_FACTORY, U256::from(90)).await,
            old_value
        );
        harness.teardown().await;
    }

    #[tokio::test]
    #[ignore = "Requires a fork provider"]
    async fn storage_on_eoas_follows_the_provider_policy() {
        // Arrange
        let harness = harness().await;
        let sender = harness.sender();

        // Act
        let result = harness
            .cheats()
            .set_storage_at(sender, U256::from(90), U256::from(345))
            .await;

        // Assert
        if harness.quirks().rejects_eoa_storage {
            assert!(matches!(result, Err(CheatcallError::Rpc { .. })));
        } else {
            result.expect("Failed to set the storage of an EOA");
            assert_eq!(
                storage_at(&harness, sender, U256::from(90)).await,
                U256::from(345)
            );
        }
        harness.teardown().await;
    }
}
