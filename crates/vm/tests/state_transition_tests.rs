//! Transaction-processor scenarios: validation, gas settlement, creation,
//! revert and exceptional-halt semantics, and deterministic replay.

mod common;

use bytes::Bytes;
use common::*;
use ember_common::evm::calculate_create_address;
use ember_common::{Address, U256};
use ember_vm::errors::{ExceptionalHalt, TxResult, TxValidationError, VMError};

const SENDER: u64 = 0x1000;
const RECIPIENT: u64 = 0x2000;
const COINBASE: u64 = 0xCCC;

#[test]
fn plain_transfer_success() {
    let sender = Address::from_low_u64_be(SENDER);
    let recipient = Address::from_low_u64_be(RECIPIENT);

    let store = TestDatabase::new().with_account(sender, funded_account(100_000));
    let mut tx = TestTransaction::transfer(sender, recipient, 100);
    tx.gas_limit = U256::from(21_000);

    let report = execute_tx(&tx, store).unwrap();

    assert_eq!(report.result, TxResult::Success);
    assert_eq!(report.gas_used, 21_000);
    assert_eq!(report.gas_refunded, 0);
    assert!(report.output.is_empty());
    assert!(report.created_address.is_none());

    // 100_000 - 100 - 21_000 = 78_900
    let sender_update = find_update(&report, sender).unwrap();
    assert_eq!(sender_update.info.unwrap().balance, U256::from(78_900));
    assert_eq!(sender_update.info.unwrap().nonce, 1);

    let recipient_update = find_update(&report, recipient).unwrap();
    assert_eq!(recipient_update.info.unwrap().balance, U256::from(100));

    let coinbase_update = find_update(&report, Address::from_low_u64_be(COINBASE)).unwrap();
    assert_eq!(coinbase_update.info.unwrap().balance, U256::from(21_000));
}

#[test]
fn unused_gas_returns_to_sender() {
    let sender = Address::from_low_u64_be(SENDER);
    let recipient = Address::from_low_u64_be(RECIPIENT);

    let store = TestDatabase::new().with_account(sender, funded_account(2_000_000));
    let tx = TestTransaction::transfer(sender, recipient, 100);

    let report = execute_tx(&tx, store).unwrap();

    // The limit was one million but only the base cost was consumed.
    assert_eq!(report.gas_used, 21_000);
    let sender_update = find_update(&report, sender).unwrap();
    assert_eq!(
        sender_update.info.unwrap().balance,
        U256::from(2_000_000 - 100 - 21_000)
    );
}

#[test]
fn rejected_nonce_mismatch() {
    let sender = Address::from_low_u64_be(SENDER);
    let recipient = Address::from_low_u64_be(RECIPIENT);

    let store = TestDatabase::new().with_account(sender, funded_account(100_000));
    let mut tx = TestTransaction::transfer(sender, recipient, 100);
    tx.nonce = 5;

    let error = execute_tx(&tx, store).unwrap_err();
    assert_eq!(
        error,
        VMError::TxValidation(TxValidationError::NonceMismatch {
            sender_nonce: 0,
            tx_nonce: 5,
        })
    );
}

#[test]
fn rejected_insufficient_upfront_funds() {
    let sender = Address::from_low_u64_be(SENDER);
    let recipient = Address::from_low_u64_be(RECIPIENT);

    // Covers the value but not value + gas_limit * gas_price.
    let store = TestDatabase::new().with_account(sender, funded_account(10_000));
    let tx = TestTransaction::transfer(sender, recipient, 100);

    let error = execute_tx(&tx, store).unwrap_err();
    assert_eq!(
        error,
        VMError::TxValidation(TxValidationError::InsufficientAccountFunds)
    );
}

#[test]
fn rejected_intrinsic_gas_too_low() {
    let sender = Address::from_low_u64_be(SENDER);
    let recipient = Address::from_low_u64_be(RECIPIENT);

    let store = TestDatabase::new().with_account(sender, funded_account(100_000));
    let mut tx = TestTransaction::transfer(sender, recipient, 100);
    tx.gas_limit = U256::from(20_000);

    let error = execute_tx(&tx, store).unwrap_err();
    assert_eq!(
        error,
        VMError::TxValidation(TxValidationError::IntrinsicGasTooLow)
    );
}

#[test]
fn rejected_gas_limit_beyond_64_bits() {
    let sender = Address::from_low_u64_be(SENDER);
    let recipient = Address::from_low_u64_be(RECIPIENT);

    let store = TestDatabase::new().with_account(sender, funded_account(100_000));
    let mut tx = TestTransaction::transfer(sender, recipient, 100);
    tx.gas_limit = U256::MAX;

    let error = execute_tx(&tx, store).unwrap_err();
    assert_eq!(error, VMError::TxValidation(TxValidationError::GasLimitTooHigh));
}

#[test]
fn validation_is_idempotent() {
    let sender = Address::from_low_u64_be(SENDER);
    let recipient = Address::from_low_u64_be(RECIPIENT);

    let mut tx = TestTransaction::transfer(sender, recipient, 100);
    tx.nonce = 5;

    let build_store = || TestDatabase::new().with_account(sender, funded_account(100_000));
    let first = execute_tx(&tx, build_store()).unwrap_err();
    let second = execute_tx(&tx, build_store()).unwrap_err();
    assert_eq!(first, second);
}

#[test]
fn deterministic_replay_produces_identical_reports() {
    let sender = Address::from_low_u64_be(SENDER);
    let contract_address = Address::from_low_u64_be(RECIPIENT);

    let build_store = || {
        TestDatabase::new()
            .with_account(sender, funded_account(1_000_000))
            .with_account(contract_address, contract(&sstore_42()))
    };
    let tx = TestTransaction::call(sender, contract_address, Bytes::new());

    let first = execute_tx(&tx, build_store()).unwrap();
    let second = execute_tx(&tx, build_store()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn gas_used_bounded_by_intrinsic_and_limit() {
    let sender = Address::from_low_u64_be(SENDER);
    let contract_address = Address::from_low_u64_be(RECIPIENT);

    let store = TestDatabase::new()
        .with_account(sender, funded_account(2_000_000))
        .with_account(contract_address, contract(&sstore_42()));
    let tx = TestTransaction::call(sender, contract_address, Bytes::new());

    let report = execute_tx(&tx, store).unwrap();
    assert_eq!(report.result, TxResult::Success);
    assert!(report.gas_used >= 21_000);
    assert!(report.gas_used <= GAS_LIMIT);
    assert_eq!(storage_of(&report, contract_address, 0), Some(U256::from(42)));
}

#[test]
fn creation_deploys_returned_code() {
    let sender = Address::from_low_u64_be(SENDER);
    let runtime = [0x00]; // STOP

    let store = TestDatabase::new().with_account(sender, funded_account(2_000_000));
    let mut tx = TestTransaction::create(sender, deploy_code(&runtime));
    tx.value = U256::from(5);

    let report = execute_tx(&tx, store).unwrap();

    assert_eq!(report.result, TxResult::Success);
    let created = calculate_create_address(sender, 0);
    assert_eq!(report.created_address, Some(created));

    let update = find_update(&report, created).unwrap();
    assert_eq!(update.code.as_deref(), Some(&runtime[..]));
    assert_eq!(update.info.unwrap().nonce, 1);
    assert_eq!(update.info.unwrap().balance, U256::from(5));
}

#[test]
fn creation_reverting_with_data() {
    let sender = Address::from_low_u64_be(SENDER);

    let store = TestDatabase::new().with_account(sender, funded_account(1_000_000));
    let tx = TestTransaction::create(sender, revert_with_bad());

    let report = execute_tx(&tx, store).unwrap();

    assert_eq!(report.result, TxResult::Revert);
    assert_eq!(report.output.as_ref(), b"bad");
    assert!(report.created_address.is_none());

    // No trace of the would-be contract.
    let created = calculate_create_address(sender, 0);
    assert!(find_update(&report, created).is_none());

    // The nonce bump and the gas actually consumed both persist.
    let sender_update = find_update(&report, sender).unwrap();
    assert_eq!(sender_update.info.unwrap().nonce, 1);
    assert!(report.gas_used > 21_000);
    assert!(report.gas_used < GAS_LIMIT);
    assert_eq!(
        sender_update.info.unwrap().balance,
        U256::from(1_000_000 - report.gas_used)
    );
}

#[test]
fn creation_collision_halts_consuming_all_gas() {
    let sender = Address::from_low_u64_be(SENDER);
    let occupied = calculate_create_address(sender, 0);

    let store = TestDatabase::new()
        .with_account(sender, funded_account(2_000_000))
        .with_account(occupied, contract(&[0x00]));
    let tx = TestTransaction::create(sender, deploy_code(&[0x00]));

    let report = execute_tx(&tx, store).unwrap();

    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::AddressCollision)
    );
    assert_eq!(report.gas_used, GAS_LIMIT);
    assert!(report.created_address.is_none());
}

#[test]
fn invalid_opcode_forfeits_gas_and_rolls_back_value() {
    let sender = Address::from_low_u64_be(SENDER);
    let contract_address = Address::from_low_u64_be(RECIPIENT);

    let store = TestDatabase::new()
        .with_account(sender, funded_account(2_000_000))
        .with_account(contract_address, contract(&[0xFE])); // INVALID
    let tx = TestTransaction::transfer(sender, contract_address, 10);

    let report = execute_tx(&tx, store).unwrap();

    assert_eq!(report.result, TxResult::Halt(ExceptionalHalt::InvalidOpcode));
    assert_eq!(report.gas_used, GAS_LIMIT);
    assert!(report.output.is_empty());

    // The value transfer was rolled back; the whole gas limit was not.
    let sender_update = find_update(&report, sender).unwrap();
    assert_eq!(
        sender_update.info.unwrap().balance,
        U256::from(2_000_000 - GAS_LIMIT)
    );
    assert!(find_update(&report, contract_address).is_none());

    let coinbase_update = find_update(&report, Address::from_low_u64_be(COINBASE)).unwrap();
    assert_eq!(coinbase_update.info.unwrap().balance, U256::from(GAS_LIMIT));
}

#[test]
fn storage_clear_earns_capped_refund() {
    let sender = Address::from_low_u64_be(SENDER);
    let contract_address = Address::from_low_u64_be(RECIPIENT);

    // PUSH1 0 PUSH1 0 SSTORE STOP, clearing slot 0, which holds 42.
    let clear_code = [0x60, 0x00, 0x60, 0x00, 0x55, 0x00];
    let store = TestDatabase::new()
        .with_account(sender, funded_account(1_000_000))
        .with_account(
            contract_address,
            contract_with_storage(&clear_code, &[(0, 42)]),
        );
    let tx = TestTransaction::call(sender, contract_address, Bytes::new());

    let report = execute_tx(&tx, store).unwrap();

    assert_eq!(report.result, TxResult::Success);
    assert_eq!(report.gas_refunded, 4800);
    assert_eq!(storage_of(&report, contract_address, 0), Some(U256::zero()));
}

#[test]
fn emitted_logs_reach_the_receipt() {
    let sender = Address::from_low_u64_be(SENDER);
    let contract_address = Address::from_low_u64_be(RECIPIENT);

    // Store "bad" in memory, then LOG0 those three bytes.
    let log_code = [
        0x62, 0x62, 0x61, 0x64, // PUSH3 "bad"
        0x60, 0x00, 0x52, // PUSH1 0 MSTORE
        0x60, 0x03, 0x60, 0x1D, 0xA0, // PUSH1 3 PUSH1 29 LOG0
        0x00, // STOP
    ];
    let store = TestDatabase::new()
        .with_account(sender, funded_account(1_000_000))
        .with_account(contract_address, contract(&log_code));
    let tx = TestTransaction::call(sender, contract_address, Bytes::new());

    let report = execute_tx(&tx, store).unwrap();

    assert_eq!(report.result, TxResult::Success);
    assert_eq!(report.logs.len(), 1);
    assert_eq!(report.logs[0].address, contract_address);
    assert!(report.logs[0].topics.is_empty());
    assert_eq!(report.logs[0].data.as_ref(), b"bad");
}

#[test]
fn reverted_transaction_discards_logs() {
    let sender = Address::from_low_u64_be(SENDER);
    let contract_address = Address::from_low_u64_be(RECIPIENT);

    // LOG0 of nothing, then REVERT of nothing.
    let log_then_revert = [
        0x60, 0x00, 0x60, 0x00, 0xA0, // PUSH1 0 PUSH1 0 LOG0
        0x60, 0x00, 0x60, 0x00, 0xFD, // PUSH1 0 PUSH1 0 REVERT
    ];
    let store = TestDatabase::new()
        .with_account(sender, funded_account(1_000_000))
        .with_account(contract_address, contract(&log_then_revert));
    let tx = TestTransaction::call(sender, contract_address, Bytes::new());

    let report = execute_tx(&tx, store).unwrap();

    assert_eq!(report.result, TxResult::Revert);
    assert!(report.logs.is_empty());
}
