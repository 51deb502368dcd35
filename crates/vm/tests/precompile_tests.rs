//! Precompiled contracts exercised through the transaction processor, both
//! as top-level callees and from inside contract code.

mod common;

use bytes::Bytes;
use common::*;
use ember_common::{Address, U256};
use ember_vm::errors::TxResult;
use hex_literal::hex;

const SENDER: u64 = 0x1000;
const A_CONTRACT: u64 = 0x2000;

#[test]
fn identity_as_top_level_callee() {
    let sender = Address::from_low_u64_be(SENDER);
    let identity = Address::from_low_u64_be(0x04);

    let store = TestDatabase::new().with_account(sender, funded_account(1_000_000));
    let tx = TestTransaction::call(sender, identity, Bytes::from_static(b"abc"));

    let report = execute_tx(&tx, store).unwrap();

    assert_eq!(report.result, TxResult::Success);
    assert_eq!(report.output.as_ref(), b"abc");
    // 21000 intrinsic + 3 non-zero data bytes + identity's 15 + 3.
    assert_eq!(report.gas_used, 21_000 + 3 * 16 + 18);
}

#[test]
fn sha2_256_as_top_level_callee() {
    let sender = Address::from_low_u64_be(SENDER);
    let sha256 = Address::from_low_u64_be(0x02);

    let store = TestDatabase::new().with_account(sender, funded_account(1_000_000));
    let tx = TestTransaction::call(sender, sha256, Bytes::new());

    let report = execute_tx(&tx, store).unwrap();

    assert_eq!(report.result, TxResult::Success);
    assert_eq!(
        report.output.as_ref(),
        hex!("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
    );
    assert_eq!(report.gas_used, 21_000 + 60);
}

#[test]
fn ecrecover_as_top_level_callee() {
    let sender = Address::from_low_u64_be(SENDER);
    let ecrecover = Address::from_low_u64_be(0x01);

    let calldata = hex!(
        "456e9aea5e197a1f1af7a3e85a3212fa4049a3ba34c2289b4c860fc0b0c64ef3"
        "000000000000000000000000000000000000000000000000000000000000001c"
        "9242685bf161793cc25603c231bc2f568eb630ea16aa137d2664ac8038825608"
        "4f8ae3bd7535248d0bd448298cc2e2071e56992d0774dc340c368ae950852ada"
    );
    let store = TestDatabase::new().with_account(sender, funded_account(1_000_000));
    let tx = TestTransaction::call(sender, ecrecover, calldata.to_vec());

    let report = execute_tx(&tx, store).unwrap();

    assert_eq!(report.result, TxResult::Success);
    assert_eq!(
        report.output.as_ref(),
        hex!("0000000000000000000000007156526fbd7a3c72969b54f64e42c10fbb768c8a")
    );
}

#[test]
fn ecrecover_with_garbage_v_returns_empty() {
    let sender = Address::from_low_u64_be(SENDER);
    let ecrecover = Address::from_low_u64_be(0x01);

    let mut calldata = vec![0u8; 128];
    calldata[63] = 29;
    let store = TestDatabase::new().with_account(sender, funded_account(1_000_000));
    let tx = TestTransaction::call(sender, ecrecover, calldata);

    let report = execute_tx(&tx, store).unwrap();

    // Unrecoverable input is a successful call with empty output, with the
    // precompile's gas still consumed.
    assert_eq!(report.result, TxResult::Success);
    assert!(report.output.is_empty());
    assert_eq!(report.gas_used, 21_000 + 127 * 4 + 16 + 3000);
}

#[test]
fn contract_calls_a_precompile() {
    let sender = Address::from_low_u64_be(SENDER);
    let a_addr = Address::from_low_u64_be(A_CONTRACT);
    let identity = Address::from_low_u64_be(0x04);

    let store = TestDatabase::new()
        .with_account(sender, funded_account(1_000_000))
        .with_account(a_addr, contract(&call_and_record(identity)));
    let tx = TestTransaction::call(sender, a_addr, Bytes::new());

    let report = execute_tx(&tx, store).unwrap();

    assert_eq!(report.result, TxResult::Success);
    assert_eq!(storage_of(&report, a_addr, 0), Some(U256::from(2)));
}

#[test]
fn unknown_low_address_is_not_a_precompile() {
    let sender = Address::from_low_u64_be(SENDER);
    let not_a_precompile = Address::from_low_u64_be(0x05);

    let store = TestDatabase::new().with_account(sender, funded_account(2_000_000));
    let tx = TestTransaction::transfer(sender, not_a_precompile, 9);

    let report = execute_tx(&tx, store).unwrap();

    // Just an ordinary code-less transfer target.
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(report.gas_used, 21_000);
    assert_eq!(
        find_update(&report, not_a_precompile).unwrap().info.unwrap().balance,
        U256::from(9)
    );
}
