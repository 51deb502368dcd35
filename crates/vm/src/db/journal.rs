use super::Database;
use crate::errors::{InternalError, VMError};
use bytes::Bytes;
use ember_common::types::{AccountInfo, AccountUpdate, Log};
use ember_common::utils::keccak;
use ember_common::{Address, H256, U256};
use std::collections::{BTreeMap, HashSet, btree_map::Entry};
use std::sync::Arc;

/// Cached account as the journal works with it. Code lives in a separate
/// hash-keyed map so identical contracts are held in memory once and are
/// only fetched when execution actually runs or inspects them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct JournalAccount {
    info: AccountInfo,
    /// Slots touched so far; an absent key has not been loaded yet.
    storage: BTreeMap<H256, U256>,
}

/// A reversible record of one state mutation. Entries are appended in
/// execution order; reverting a region undoes them newest-first. No account
/// is ever mutated without its entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    BalanceChange { address: Address, old_balance: U256 },
    NonceChange { address: Address },
    StorageChange { address: Address, key: H256, old_value: U256 },
    CodeChange { address: Address, old_code_hash: H256 },
    AccountCreated { address: Address },
    /// Self-destruct is deferred: the entry schedules removal, applied only
    /// at top-level commit.
    AccountDestroyed { address: Address },
    RefundChange { old_refund: u64 },
}

/// Marks the start of a reversible journal region (one call frame).
/// Committing a region costs nothing: its entries simply stay, owned by the
/// enclosing region. Reverting undoes every entry past the mark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalCheckpoint {
    journal_len: usize,
    logs_len: usize,
}

/// Working state for one transaction: a cache of touched accounts over the
/// host's read-only view, with every mutation recorded in the journal for
/// possible rollback. At the end of a successful execution the accumulated
/// changes leave as a list of [`AccountUpdate`]s.
pub struct JournaledState {
    pub store: Arc<dyn Database>,
    accounts: BTreeMap<Address, JournalAccount>,
    /// Snapshot of each account the first time it is loaded, used to emit
    /// only real differences in the state delta.
    initial_accounts: BTreeMap<Address, JournalAccount>,
    codes: BTreeMap<H256, Bytes>,
    journal: Vec<JournalEntry>,
    logs: Vec<Log>,
    refund: u64,
    created_accounts: HashSet<Address>,
    selfdestruct_set: HashSet<Address>,
}

impl JournaledState {
    pub fn new(store: Arc<dyn Database>) -> Self {
        Self {
            store,
            accounts: BTreeMap::new(),
            initial_accounts: BTreeMap::new(),
            codes: BTreeMap::new(),
            journal: Vec::new(),
            logs: Vec::new(),
            refund: 0,
            created_accounts: HashSet::new(),
            selfdestruct_set: HashSet::new(),
        }
    }

    // ================== Checkpointing =====================

    /// Opens a reversible region. Every mutation from here on belongs to it
    /// until it is committed or reverted.
    pub fn checkpoint(&self) -> JournalCheckpoint {
        JournalCheckpoint {
            journal_len: self.journal.len(),
            logs_len: self.logs.len(),
        }
    }

    /// Merges a region into its parent. Entry order is preserved and nothing
    /// is touched; the entries are now undone only if the parent reverts.
    pub fn commit_checkpoint(&mut self, _checkpoint: JournalCheckpoint) {}

    /// Discards a region: undoes its journal entries newest-first and drops
    /// its logs. Sibling regions committed earlier are unaffected.
    pub fn revert_checkpoint(&mut self, checkpoint: JournalCheckpoint) -> Result<(), VMError> {
        while self.journal.len() > checkpoint.journal_len {
            let entry = self
                .journal
                .pop()
                .ok_or(InternalError::Custom("journal shorter than checkpoint"))?;
            self.undo(entry)?;
        }
        self.logs.truncate(checkpoint.logs_len);
        Ok(())
    }

    fn undo(&mut self, entry: JournalEntry) -> Result<(), VMError> {
        match entry {
            JournalEntry::BalanceChange { address, old_balance } => {
                self.cached_account_mut(address)?.info.balance = old_balance;
            }
            JournalEntry::NonceChange { address } => {
                let account = self.cached_account_mut(address)?;
                account.info.nonce = account
                    .info
                    .nonce
                    .checked_sub(1)
                    .ok_or(InternalError::Underflow)?;
            }
            JournalEntry::StorageChange { address, key, old_value } => {
                self.cached_account_mut(address)?.storage.insert(key, old_value);
            }
            JournalEntry::CodeChange { address, old_code_hash } => {
                self.cached_account_mut(address)?.info.code_hash = old_code_hash;
            }
            JournalEntry::AccountCreated { address } => {
                self.created_accounts.remove(&address);
            }
            JournalEntry::AccountDestroyed { address } => {
                self.selfdestruct_set.remove(&address);
            }
            JournalEntry::RefundChange { old_refund } => {
                self.refund = old_refund;
            }
        }
        Ok(())
    }

    // ================== Account access =====================

    fn load_account(&mut self, address: Address) -> Result<&mut JournalAccount, VMError> {
        match self.accounts.entry(address) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let info = self.store.get_account_info(address)?;
                let account = JournalAccount {
                    info,
                    storage: BTreeMap::new(),
                };
                self.initial_accounts.insert(address, account.clone());
                Ok(entry.insert(account))
            }
        }
    }

    /// Mutable access for rollback only: the account must already be cached,
    /// since it was mutated in the region being undone.
    fn cached_account_mut(&mut self, address: Address) -> Result<&mut JournalAccount, VMError> {
        self.accounts
            .get_mut(&address)
            .ok_or(InternalError::Custom("journaled account missing from cache").into())
    }

    pub fn get_account_info(&mut self, address: Address) -> Result<AccountInfo, VMError> {
        Ok(self.load_account(address)?.info)
    }

    pub fn get_account_code(&mut self, address: Address) -> Result<Bytes, VMError> {
        let code_hash = self.load_account(address)?.info.code_hash;
        self.get_code(code_hash)
    }

    fn get_code(&mut self, code_hash: H256) -> Result<Bytes, VMError> {
        if let Some(code) = self.codes.get(&code_hash) {
            return Ok(code.clone());
        }
        let code = self.store.get_account_code(code_hash)?;
        self.codes.insert(code_hash, code.clone());
        Ok(code)
    }

    /// Emptiness rule used for the call surcharge on fresh accounts.
    pub fn account_is_empty(&mut self, address: Address) -> Result<bool, VMError> {
        Ok(self.get_account_info(address)?.is_empty())
    }

    pub fn account_was_created(&self, address: Address) -> bool {
        self.created_accounts.contains(&address)
    }

    // ================== Mutations (journaled) =====================

    pub fn increase_account_balance(&mut self, address: Address, increase: U256) -> Result<(), VMError> {
        let account = self.load_account(address)?;
        let old_balance = account.info.balance;
        account.info.balance = old_balance
            .checked_add(increase)
            .ok_or(InternalError::Overflow)?;
        self.journal
            .push(JournalEntry::BalanceChange { address, old_balance });
        Ok(())
    }

    pub fn decrease_account_balance(&mut self, address: Address, decrease: U256) -> Result<(), VMError> {
        let account = self.load_account(address)?;
        let old_balance = account.info.balance;
        account.info.balance = old_balance
            .checked_sub(decrease)
            .ok_or(InternalError::Underflow)?;
        self.journal
            .push(JournalEntry::BalanceChange { address, old_balance });
        Ok(())
    }

    /// Moves `value` between accounts. The caller is responsible for the
    /// balance check; an uncovered transfer here is an internal defect.
    pub fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), VMError> {
        self.decrease_account_balance(from, value)?;
        self.increase_account_balance(to, value)
    }

    /// Bumps the account nonce and returns the value it had before.
    pub fn increment_account_nonce(&mut self, address: Address) -> Result<u64, VMError> {
        let account = self.load_account(address)?;
        let old_nonce = account.info.nonce;
        account.info.nonce = old_nonce.checked_add(1).ok_or(InternalError::Overflow)?;
        self.journal.push(JournalEntry::NonceChange { address });
        Ok(old_nonce)
    }

    /// Installs deployed code, rebinding the account's code hash.
    pub fn update_account_bytecode(&mut self, address: Address, code: Bytes) -> Result<(), VMError> {
        let code_hash = keccak(&code);
        self.codes.insert(code_hash, code);
        let account = self.load_account(address)?;
        let old_code_hash = account.info.code_hash;
        account.info.code_hash = code_hash;
        self.journal
            .push(JournalEntry::CodeChange { address, old_code_hash });
        Ok(())
    }

    pub fn get_storage_value(&mut self, address: Address, key: H256) -> Result<U256, VMError> {
        // Accounts created in this transaction start with fresh storage; the
        // store must not be consulted for them.
        if self.created_accounts.contains(&address) {
            let account = self.load_account(address)?;
            return Ok(account.storage.get(&key).copied().unwrap_or_default());
        }

        if let Some(value) = self.accounts.get(&address).and_then(|account| account.storage.get(&key)) {
            return Ok(*value);
        }

        let value = self.store.get_storage_value(address, key)?;
        self.load_account(address)?.storage.insert(key, value);
        // Remember the original so the state delta only reports real change.
        if let Some(initial) = self.initial_accounts.get_mut(&address) {
            initial.storage.entry(key).or_insert(value);
        }
        Ok(value)
    }

    pub fn update_account_storage(&mut self, address: Address, key: H256, new_value: U256) -> Result<(), VMError> {
        let old_value = self.get_storage_value(address, key)?;
        self.journal.push(JournalEntry::StorageChange {
            address,
            key,
            old_value,
        });
        self.load_account(address)?.storage.insert(key, new_value);
        Ok(())
    }

    /// Marks an address as created by this transaction, which gives it fresh
    /// storage semantics and makes a second creation at the same address
    /// collide.
    pub fn mark_account_created(&mut self, address: Address) -> Result<(), VMError> {
        self.load_account(address)?;
        self.created_accounts.insert(address);
        self.journal.push(JournalEntry::AccountCreated { address });
        Ok(())
    }

    /// Schedules the account for removal at top-level commit. The balance
    /// transfer to the beneficiary is journaled separately by the caller.
    pub fn schedule_selfdestruct(&mut self, address: Address) -> Result<(), VMError> {
        self.load_account(address)?;
        if self.selfdestruct_set.insert(address) {
            self.journal.push(JournalEntry::AccountDestroyed { address });
        }
        Ok(())
    }

    pub fn scheduled_selfdestructs(&self) -> impl Iterator<Item = &Address> {
        self.selfdestruct_set.iter()
    }

    // ================== Refunds and logs =====================

    /// Accumulates a storage refund. Applied (capped) only on final commit,
    /// never visible mid-execution.
    pub fn add_refund(&mut self, amount: u64) -> Result<(), VMError> {
        let old_refund = self.refund;
        self.refund = old_refund.checked_add(amount).ok_or(InternalError::Overflow)?;
        self.journal.push(JournalEntry::RefundChange { old_refund });
        Ok(())
    }

    pub fn refund(&self) -> u64 {
        self.refund
    }

    pub fn add_log(&mut self, log: Log) {
        self.logs.push(log);
    }

    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    // ================== State delta =====================

    /// Builds the state delta of a successful execution: one update per
    /// account that actually changed, in address order, with scheduled
    /// self-destructs applied as removals.
    pub fn get_state_transitions(&mut self) -> Result<Vec<AccountUpdate>, VMError> {
        let mut updates = Vec::new();
        for (address, account) in &self.accounts {
            if self.selfdestruct_set.contains(address) {
                updates.push(AccountUpdate::removed(*address));
                continue;
            }

            let initial = self.initial_accounts.get(address).cloned().unwrap_or_default();
            let mut update = AccountUpdate::new(*address);

            if account.info != initial.info {
                update.info = Some(account.info);
            }
            if account.info.code_hash != initial.info.code_hash {
                let code = self
                    .codes
                    .get(&account.info.code_hash)
                    .cloned()
                    .ok_or(InternalError::Custom("installed code missing from cache"))?;
                update.code = Some(code);
            }
            for (key, value) in &account.storage {
                let original = initial.storage.get(key).copied().unwrap_or_default();
                if *value != original {
                    update.added_storage.insert(*key, *value);
                }
            }

            if update.info.is_some() || update.code.is_some() || !update.added_storage.is_empty() {
                updates.push(update);
            }
        }
        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DatabaseError;

    struct EmptyDb;

    impl Database for EmptyDb {
        fn get_account_info(&self, _address: Address) -> Result<AccountInfo, DatabaseError> {
            Ok(AccountInfo::default())
        }
        fn get_storage_value(&self, _address: Address, _key: H256) -> Result<U256, DatabaseError> {
            Ok(U256::zero())
        }
        fn get_account_code(&self, _code_hash: H256) -> Result<Bytes, DatabaseError> {
            Ok(Bytes::new())
        }
        fn get_block_hash(&self, _block_number: u64) -> Result<H256, DatabaseError> {
            Ok(H256::zero())
        }
    }

    #[test]
    fn revert_restores_balance_and_nonce() {
        let mut state = JournaledState::new(Arc::new(EmptyDb));
        let address = Address::from_low_u64_be(1);

        state.increase_account_balance(address, U256::from(100)).unwrap();
        let checkpoint = state.checkpoint();
        state.increase_account_balance(address, U256::from(50)).unwrap();
        state.increment_account_nonce(address).unwrap();
        state.revert_checkpoint(checkpoint).unwrap();

        let info = state.get_account_info(address).unwrap();
        assert_eq!(info.balance, U256::from(100));
        assert_eq!(info.nonce, 0);
    }

    #[test]
    fn revert_keeps_sibling_region_committed_earlier() {
        let mut state = JournaledState::new(Arc::new(EmptyDb));
        let first = Address::from_low_u64_be(1);
        let second = Address::from_low_u64_be(2);

        let outer = state.checkpoint();
        let sibling = state.checkpoint();
        state.increase_account_balance(first, U256::from(7)).unwrap();
        state.commit_checkpoint(sibling);

        let failing = state.checkpoint();
        state.increase_account_balance(second, U256::from(9)).unwrap();
        state.revert_checkpoint(failing).unwrap();

        assert_eq!(state.get_account_info(first).unwrap().balance, U256::from(7));
        assert_eq!(state.get_account_info(second).unwrap().balance, U256::zero());

        // Reverting the outer region undoes the sibling too.
        state.revert_checkpoint(outer).unwrap();
        assert_eq!(state.get_account_info(first).unwrap().balance, U256::zero());
    }

    #[test]
    fn revert_restores_storage_and_refund() {
        let mut state = JournaledState::new(Arc::new(EmptyDb));
        let address = Address::from_low_u64_be(1);
        let key = H256::from_low_u64_be(1);

        state.update_account_storage(address, key, U256::from(42)).unwrap();
        let checkpoint = state.checkpoint();
        state.update_account_storage(address, key, U256::from(43)).unwrap();
        state.add_refund(4800).unwrap();
        state.revert_checkpoint(checkpoint).unwrap();

        assert_eq!(state.get_storage_value(address, key).unwrap(), U256::from(42));
        assert_eq!(state.refund(), 0);
    }

    #[test]
    fn revert_unschedules_selfdestruct_and_creation() {
        let mut state = JournaledState::new(Arc::new(EmptyDb));
        let address = Address::from_low_u64_be(1);

        let checkpoint = state.checkpoint();
        state.mark_account_created(address).unwrap();
        state.schedule_selfdestruct(address).unwrap();
        assert!(state.account_was_created(address));
        state.revert_checkpoint(checkpoint).unwrap();

        assert!(!state.account_was_created(address));
        assert_eq!(state.scheduled_selfdestructs().count(), 0);
    }

    #[test]
    fn state_transitions_report_only_real_changes() {
        let mut state = JournaledState::new(Arc::new(EmptyDb));
        let touched = Address::from_low_u64_be(1);
        let changed = Address::from_low_u64_be(2);

        // Loaded but unchanged: must not appear in the delta.
        state.get_account_info(touched).unwrap();
        state.increase_account_balance(changed, U256::from(5)).unwrap();

        let updates = state.get_state_transitions().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].address, changed);
        assert_eq!(updates[0].info.unwrap().balance, U256::from(5));
    }

    #[test]
    fn logs_truncate_with_their_region() {
        let mut state = JournaledState::new(Arc::new(EmptyDb));
        let checkpoint = state.checkpoint();
        state.add_log(Log {
            address: Address::zero(),
            topics: vec![],
            data: Bytes::new(),
        });
        assert_eq!(state.logs().len(), 1);
        state.revert_checkpoint(checkpoint).unwrap();
        assert!(state.logs().is_empty());
    }
}
