use crate::errors::DatabaseError;
use bytes::Bytes;
use ember_common::types::AccountInfo;
use ember_common::{Address, H256, U256};

pub mod journal;

pub use journal::{JournalCheckpoint, JournalEntry, JournaledState};

/// Read-only world-state view the host supplies for one execution. The
/// engine never writes through this trait; mutations accumulate in the
/// [`JournaledState`] and leave as a state delta for the host to merge.
///
/// Implementations are expected to be internally consistent for the whole
/// execution; a failure here aborts the transaction without committing.
pub trait Database: Send + Sync {
    fn get_account_info(&self, address: Address) -> Result<AccountInfo, DatabaseError>;

    fn get_storage_value(&self, address: Address, key: H256) -> Result<U256, DatabaseError>;

    fn get_account_code(&self, code_hash: H256) -> Result<Bytes, DatabaseError>;

    fn get_block_hash(&self, block_number: u64) -> Result<H256, DatabaseError>;
}
