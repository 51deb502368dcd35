#![allow(dead_code)]

use bytes::Bytes;
use ember_common::types::{Account, AccountInfo, AccountUpdate};
use ember_common::{Address, H256, U256};
use ember_vm::db::{Database, JournaledState};
use ember_vm::environment::Environment;
use ember_vm::errors::{DatabaseError, ExecutionReport, VMError};
use ember_vm::transaction::Transaction;
use ember_vm::vm::VM;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub const GAS_LIMIT: u64 = 1_000_000;

// ==================== Test database ====================

#[derive(Default)]
pub struct TestDatabase {
    pub accounts: HashMap<Address, Account>,
}

impl TestDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, address: Address, account: Account) -> Self {
        self.accounts.insert(address, account);
        self
    }
}

impl Database for TestDatabase {
    fn get_account_info(&self, address: Address) -> Result<AccountInfo, DatabaseError> {
        Ok(self
            .accounts
            .get(&address)
            .map(|account| account.info)
            .unwrap_or_default())
    }

    fn get_storage_value(&self, address: Address, key: H256) -> Result<U256, DatabaseError> {
        Ok(self
            .accounts
            .get(&address)
            .and_then(|account| account.storage.get(&key).copied())
            .unwrap_or_default())
    }

    fn get_account_code(&self, code_hash: H256) -> Result<Bytes, DatabaseError> {
        for account in self.accounts.values() {
            if account.info.code_hash == code_hash {
                return Ok(account.code.clone());
            }
        }
        Ok(Bytes::new())
    }

    fn get_block_hash(&self, block_number: u64) -> Result<H256, DatabaseError> {
        Ok(H256::from_low_u64_be(block_number))
    }
}

// ==================== Test transaction ====================

pub struct TestTransaction {
    pub to: Option<Address>,
    pub sender: Address,
    pub nonce: u64,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: U256,
    pub gas_price: U256,
}

impl TestTransaction {
    pub fn transfer(sender: Address, to: Address, value: u64) -> Self {
        Self {
            to: Some(to),
            sender,
            nonce: 0,
            value: U256::from(value),
            data: Bytes::new(),
            gas_limit: U256::from(GAS_LIMIT),
            gas_price: U256::one(),
        }
    }

    pub fn call(sender: Address, to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::transfer(sender, to, 0)
        }
    }

    pub fn create(sender: Address, init_code: impl Into<Bytes>) -> Self {
        Self {
            to: None,
            sender,
            nonce: 0,
            value: U256::zero(),
            data: init_code.into(),
            gas_limit: U256::from(GAS_LIMIT),
            gas_price: U256::one(),
        }
    }
}

impl Transaction for TestTransaction {
    fn to(&self) -> Option<Address> {
        self.to
    }
    fn sender(&self) -> Address {
        self.sender
    }
    fn nonce(&self) -> u64 {
        self.nonce
    }
    fn value(&self) -> U256 {
        self.value
    }
    fn data(&self) -> &Bytes {
        &self.data
    }
    fn gas_limit(&self) -> U256 {
        self.gas_limit
    }
    fn gas_price(&self) -> U256 {
        self.gas_price
    }
}

// ==================== Environment and runner ====================

pub fn make_env() -> Environment {
    Environment {
        coinbase: Address::from_low_u64_be(0xCCC),
        block_number: U256::from(1),
        timestamp: U256::from(1000),
        prev_randao: H256::zero(),
        block_gas_limit: GAS_LIMIT * 2,
        chain_id: U256::one(),
        base_fee_per_gas: U256::zero(),
        config: Default::default(),
    }
}

pub fn execute_tx(tx: &TestTransaction, store: TestDatabase) -> Result<ExecutionReport, VMError> {
    execute_tx_with_env(tx, store, make_env())
}

pub fn execute_tx_with_env(
    tx: &TestTransaction,
    store: TestDatabase,
    env: Environment,
) -> Result<ExecutionReport, VMError> {
    let mut db = JournaledState::new(Arc::new(store));
    let mut vm = VM::new(env, &mut db, tx);
    vm.execute()
}

// ==================== Account helpers ====================

pub fn funded_account(balance: u64) -> Account {
    Account::new(U256::from(balance), Bytes::new(), 0, BTreeMap::new())
}

pub fn contract(code: &[u8]) -> Account {
    Account::new(U256::zero(), Bytes::copy_from_slice(code), 1, BTreeMap::new())
}

pub fn contract_with_storage(code: &[u8], storage: &[(u64, u64)]) -> Account {
    let storage = storage
        .iter()
        .map(|(key, value)| (H256::from_low_u64_be(*key), U256::from(*value)))
        .collect();
    Account::new(U256::zero(), Bytes::copy_from_slice(code), 1, storage)
}

pub fn find_update(report: &ExecutionReport, address: Address) -> Option<&AccountUpdate> {
    report
        .state_updates
        .iter()
        .find(|update| update.address == address)
}

pub fn storage_of(report: &ExecutionReport, address: Address, slot: u64) -> Option<U256> {
    find_update(report, address)
        .and_then(|update| update.added_storage.get(&H256::from_low_u64_be(slot)))
        .copied()
}

// ==================== Bytecode helpers ====================

/// Init code that deploys `runtime` (at most 32 bytes): stores the runtime
/// right-aligned in the first memory word and RETURNs the relevant slice.
pub fn deploy_code(runtime: &[u8]) -> Vec<u8> {
    assert!(!runtime.is_empty() && runtime.len() <= 32);
    let len = runtime.len() as u8;

    let mut init = Vec::new();
    init.push(0x60 + len - 1); // PUSHn <runtime>
    init.extend_from_slice(runtime);
    init.extend_from_slice(&[0x60, 0x00]); // PUSH1 0
    init.push(0x52); // MSTORE
    init.extend_from_slice(&[0x60, len]); // PUSH1 <len>
    init.extend_from_slice(&[0x60, 32 - len]); // PUSH1 <32 - len>
    init.push(0xF3); // RETURN

    init
}

/// `CALL <target>` forwarding all remaining gas with no value and no data,
/// then `SSTORE` the success flag plus one into slot 0, then `STOP`.
pub fn call_and_record(target: Address) -> Vec<u8> {
    let mut code = Vec::new();
    // retSize, retOffset, argsSize, argsOffset, value: all zero
    code.extend_from_slice(&[0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00]);
    code.push(0x73); // PUSH20 <target>
    code.extend_from_slice(target.as_bytes());
    code.extend_from_slice(&[0x5A, 0xF1]); // GAS CALL
    // slot0 = success flag + 1 (1 = failed call, 2 = succeeded)
    code.extend_from_slice(&[0x60, 0x01, 0x01, 0x60, 0x00, 0x55]); // PUSH1 1 ADD PUSH1 0 SSTORE
    code.push(0x00); // STOP
    code
}

/// Same shape but with `STATICCALL`.
pub fn staticcall_and_record(target: Address) -> Vec<u8> {
    let mut code = Vec::new();
    // retSize, retOffset, argsSize, argsOffset: all zero
    code.extend_from_slice(&[0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00]);
    code.push(0x73); // PUSH20 <target>
    code.extend_from_slice(target.as_bytes());
    code.extend_from_slice(&[0x5A, 0xFA]); // GAS STATICCALL
    code.extend_from_slice(&[0x60, 0x01, 0x01, 0x60, 0x00, 0x55]); // PUSH1 1 ADD PUSH1 0 SSTORE
    code.push(0x00); // STOP
    code
}

/// Same shape but with `DELEGATECALL` and no flag bookkeeping.
pub fn delegatecall_runtime(target: Address) -> Vec<u8> {
    let mut code = Vec::new();
    // retSize, retOffset, argsSize, argsOffset: all zero
    code.extend_from_slice(&[0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00]);
    code.push(0x73); // PUSH20 <target>
    code.extend_from_slice(target.as_bytes());
    code.extend_from_slice(&[0x5A, 0xF4]); // GAS DELEGATECALL
    code.extend_from_slice(&[0x50, 0x00]); // POP STOP
    code
}

/// `CALL <target>` with the given value and the flag bookkeeping of
/// [`call_and_record`].
pub fn call_with_value_and_record(target: Address, value: u8) -> Vec<u8> {
    let mut code = Vec::new();
    // retSize, retOffset, argsSize, argsOffset
    code.extend_from_slice(&[0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00]);
    code.extend_from_slice(&[0x60, value]); // PUSH1 <value>
    code.push(0x73); // PUSH20 <target>
    code.extend_from_slice(target.as_bytes());
    code.extend_from_slice(&[0x5A, 0xF1]); // GAS CALL
    code.extend_from_slice(&[0x60, 0x01, 0x01, 0x60, 0x00, 0x55]); // PUSH1 1 ADD PUSH1 0 SSTORE
    code.push(0x00); // STOP
    code
}

/// Bumps its own slot 0, then calls itself forwarding all gas. Stops when
/// the depth guard fails the nested call.
pub fn recursive_counter(own_address: Address) -> Vec<u8> {
    let mut code = Vec::new();
    // slot0 += 1
    code.extend_from_slice(&[0x60, 0x00, 0x54]); // PUSH1 0 SLOAD
    code.extend_from_slice(&[0x60, 0x01, 0x01]); // PUSH1 1 ADD
    code.extend_from_slice(&[0x60, 0x00, 0x55]); // PUSH1 0 SSTORE
    // call self
    code.extend_from_slice(&[0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00]);
    code.push(0x73); // PUSH20 <own_address>
    code.extend_from_slice(own_address.as_bytes());
    code.extend_from_slice(&[0x5A, 0xF1]); // GAS CALL
    code.extend_from_slice(&[0x50, 0x00]); // POP STOP
    code
}

/// Calls the target requesting far more gas than can be forwarded.
pub fn call_requesting_max(target: Address) -> Vec<u8> {
    let mut code = Vec::new();
    // retSize, retOffset, argsSize, argsOffset, value: all zero
    code.extend_from_slice(&[0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00]);
    code.push(0x73); // PUSH20 <target>
    code.extend_from_slice(target.as_bytes());
    code.push(0x7F); // PUSH32 <2^256 - 1>
    code.extend_from_slice(&[0xFF; 32]);
    code.extend_from_slice(&[0xF1, 0x00]); // CALL STOP
    code
}

/// Runtime that records its remaining gas into slot 0.
pub fn gas_recorder() -> Vec<u8> {
    // GAS PUSH1 0 SSTORE STOP
    vec![0x5A, 0x60, 0x00, 0x55, 0x00]
}

/// Runtime that stores 42 into slot 0 and stops.
pub fn sstore_42() -> Vec<u8> {
    // PUSH1 42 PUSH1 0 SSTORE STOP
    vec![0x60, 0x2A, 0x60, 0x00, 0x55, 0x00]
}

/// Runtime that reverts with the ASCII payload `"bad"`.
pub fn revert_with_bad() -> Vec<u8> {
    let mut code = Vec::new();
    code.extend_from_slice(&[0x62, 0x62, 0x61, 0x64]); // PUSH3 "bad"
    code.extend_from_slice(&[0x60, 0x00]); // PUSH1 0
    code.push(0x52); // MSTORE
    code.extend_from_slice(&[0x60, 0x03]); // PUSH1 3 (size)
    code.extend_from_slice(&[0x60, 0x1D]); // PUSH1 29 (offset)
    code.push(0xFD); // REVERT
    code
}
