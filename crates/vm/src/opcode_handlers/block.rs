//! # Block information operations
//!
//! Includes the following opcodes:
//!   - `BLOCKHASH`
//!   - `COINBASE`
//!   - `TIMESTAMP`
//!   - `NUMBER`
//!   - `PREVRANDAO`
//!   - `GASLIMIT`
//!   - `CHAINID`
//!   - `SELFBALANCE`
//!   - `BASEFEE`
//!
//! These read the caller-supplied block context; the interpreter treats it
//! as an opaque record.

use crate::constants::LAST_AVAILABLE_BLOCK_LIMIT;
use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    utils::address_to_word,
    vm::VM,
};
use ember_common::U256;
use ember_common::utils::h256_to_u256;

impl<'a> VM<'a> {
    // BLOCKHASH operation
    pub fn op_blockhash(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::BLOCKHASH)?;

        let block_number = self.current_call_frame.stack.pop1()?;

        // Only the hashes of the most recent 256 ancestors are visible.
        let lower_bound = self
            .env
            .block_number
            .saturating_sub(LAST_AVAILABLE_BLOCK_LIMIT);
        if block_number < lower_bound || block_number >= self.env.block_number {
            self.current_call_frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }

        let block_number = block_number.low_u64();
        let hash = self.db.store.get_block_hash(block_number)?;
        self.current_call_frame.stack.push(h256_to_u256(hash))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // COINBASE operation
    pub fn op_coinbase(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::COINBASE)?;

        current_call_frame
            .stack
            .push(address_to_word(self.env.coinbase))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // TIMESTAMP operation
    pub fn op_timestamp(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::TIMESTAMP)?;

        current_call_frame.stack.push(self.env.timestamp)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // NUMBER operation
    pub fn op_number(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::NUMBER)?;

        current_call_frame.stack.push(self.env.block_number)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // PREVRANDAO operation
    pub fn op_prevrandao(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::PREVRANDAO)?;

        current_call_frame
            .stack
            .push(h256_to_u256(self.env.prev_randao))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // GASLIMIT operation
    pub fn op_gaslimit(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::GASLIMIT)?;

        current_call_frame
            .stack
            .push(U256::from(self.env.block_gas_limit))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // CHAINID operation
    pub fn op_chainid(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::CHAINID)?;

        current_call_frame.stack.push(self.env.chain_id)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // SELFBALANCE operation
    pub fn op_selfbalance(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::SELFBALANCE)?;

        let balance = self
            .db
            .get_account_info(self.current_call_frame.to)?
            .balance;
        self.current_call_frame.stack.push(balance)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // BASEFEE operation
    pub fn op_basefee(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::BASEFEE)?;

        current_call_frame.stack.push(self.env.base_fee_per_gas)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
