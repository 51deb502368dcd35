use crate::constants::EMPTY_KECCAK_HASH;
use crate::utils::keccak;
use bytes::Bytes;
use ethereum_types::{H256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Balance, nonce and code hash of an account. This is what a world-state
/// view hands out; code and storage are fetched separately so they are only
/// loaded when execution actually touches them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub balance: U256,
    pub nonce: u64,
    pub code_hash: H256,
}

impl Default for AccountInfo {
    fn default() -> Self {
        Self {
            balance: U256::zero(),
            nonce: 0,
            code_hash: EMPTY_KECCAK_HASH,
        }
    }
}

impl AccountInfo {
    pub fn has_code(&self) -> bool {
        self.code_hash != EMPTY_KECCAK_HASH && self.code_hash != H256::zero()
    }

    pub fn has_nonce(&self) -> bool {
        self.nonce != 0
    }

    /// Emptiness rule used for state cleanup decisions: no balance, no nonce,
    /// no code.
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.nonce == 0 && !self.has_code()
    }
}

/// A fully materialized account as the execution engine works with it.
/// Storage holds only the slots touched so far; an absent key reads as zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub info: AccountInfo,
    pub code: Bytes,
    pub storage: BTreeMap<H256, U256>,
}

impl Account {
    pub fn new(balance: U256, code: Bytes, nonce: u64, storage: BTreeMap<H256, U256>) -> Self {
        Self {
            info: AccountInfo {
                balance,
                nonce,
                code_hash: keccak(&code),
            },
            code,
            storage,
        }
    }

    pub fn has_code(&self) -> bool {
        !self.code.is_empty()
    }

    pub fn has_nonce(&self) -> bool {
        self.info.nonce != 0
    }

    pub fn is_empty(&self) -> bool {
        self.info.is_empty()
    }
}
