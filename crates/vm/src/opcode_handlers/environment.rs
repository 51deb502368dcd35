//! # Environmental information operations
//!
//! Includes the following opcodes:
//!   - `ADDRESS`, `BALANCE`, `ORIGIN`, `CALLER`, `CALLVALUE`
//!   - `CALLDATALOAD`, `CALLDATASIZE`, `CALLDATACOPY`
//!   - `CODESIZE`, `CODECOPY`, `GASPRICE`
//!   - `EXTCODESIZE`, `EXTCODECOPY`, `EXTCODEHASH`
//!   - `RETURNDATASIZE`, `RETURNDATACOPY`
//!
//! These read the transaction fact sheet, the current frame and other
//! accounts' metadata. None of them mutates state.

use crate::memory::calculate_memory_size;
use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    utils::{address_to_word, size_offset_to_usize, u256_to_usize, word_to_address},
    vm::VM,
};
use ember_common::U256;
use ember_common::utils::h256_to_u256;

impl<'a> VM<'a> {
    // ADDRESS operation
    pub fn op_address(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::ADDRESS)?;

        current_call_frame
            .stack
            .push(address_to_word(current_call_frame.to))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // BALANCE operation
    pub fn op_balance(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::BALANCE)?;

        let address = word_to_address(self.current_call_frame.stack.pop1()?);
        let balance = self.db.get_account_info(address)?.balance;
        self.current_call_frame.stack.push(balance)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // ORIGIN operation
    pub fn op_origin(&mut self) -> Result<OpcodeResult, VMError> {
        let origin = self.tx.sender();
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::ORIGIN)?;

        current_call_frame.stack.push(address_to_word(origin))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // CALLER operation
    pub fn op_caller(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::CALLER)?;

        current_call_frame
            .stack
            .push(address_to_word(current_call_frame.msg_sender))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // CALLVALUE operation
    pub fn op_callvalue(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::CALLVALUE)?;

        current_call_frame.stack.push(current_call_frame.msg_value)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // CALLDATALOAD operation
    pub fn op_calldataload(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::CALLDATALOAD)?;

        let offset = current_call_frame.stack.pop1()?;

        // Reads past the end of call data are zero-padded.
        let mut word = [0u8; 32];
        if let Ok(offset) = u256_to_usize(offset) {
            for (i, byte) in word.iter_mut().enumerate() {
                *byte = current_call_frame
                    .calldata
                    .get(offset.wrapping_add(i))
                    .copied()
                    .unwrap_or(0);
            }
        }
        current_call_frame.stack.push(U256::from_big_endian(&word))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // CALLDATASIZE operation
    pub fn op_calldatasize(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::CALLDATASIZE)?;

        current_call_frame
            .stack
            .push(U256::from(current_call_frame.calldata.len()))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // CALLDATACOPY operation
    pub fn op_calldatacopy(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        let [dest_offset, calldata_offset, size] = current_call_frame.stack.pop()?;
        let (size, dest_offset) = size_offset_to_usize(size, dest_offset)?;

        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        current_call_frame.increase_consumed_gas(gas_cost::calldatacopy(
            new_memory_size,
            current_call_frame.memory.len(),
            size,
        )?)?;

        if size == 0 {
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }
        current_call_frame.memory.resize(new_memory_size);

        let data = copy_zero_padded(&current_call_frame.calldata, calldata_offset, size);
        current_call_frame.memory.store_data(dest_offset, &data)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // CODESIZE operation
    pub fn op_codesize(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::CODESIZE)?;

        current_call_frame
            .stack
            .push(U256::from(current_call_frame.bytecode.len()))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // CODECOPY operation
    pub fn op_codecopy(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        let [dest_offset, code_offset, size] = current_call_frame.stack.pop()?;
        let (size, dest_offset) = size_offset_to_usize(size, dest_offset)?;

        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        current_call_frame.increase_consumed_gas(gas_cost::codecopy(
            new_memory_size,
            current_call_frame.memory.len(),
            size,
        )?)?;

        if size == 0 {
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }
        current_call_frame.memory.resize(new_memory_size);

        let data = copy_zero_padded(&current_call_frame.bytecode, code_offset, size);
        current_call_frame.memory.store_data(dest_offset, &data)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // GASPRICE operation
    pub fn op_gasprice(&mut self) -> Result<OpcodeResult, VMError> {
        let gas_price = self.tx.gas_price();
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::GASPRICE)?;

        current_call_frame.stack.push(gas_price)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // EXTCODESIZE operation
    pub fn op_extcodesize(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::EXTCODESIZE)?;

        let address = word_to_address(self.current_call_frame.stack.pop1()?);
        let code_size = self.db.get_account_code(address)?.len();
        self.current_call_frame.stack.push(U256::from(code_size))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // EXTCODECOPY operation
    pub fn op_extcodecopy(&mut self) -> Result<OpcodeResult, VMError> {
        let [address, dest_offset, code_offset, size] = self.current_call_frame.stack.pop()?;
        let address = word_to_address(address);
        let (size, dest_offset) = size_offset_to_usize(size, dest_offset)?;

        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        self.current_call_frame
            .increase_consumed_gas(gas_cost::extcodecopy(
                new_memory_size,
                self.current_call_frame.memory.len(),
                size,
            )?)?;

        if size == 0 {
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }
        self.current_call_frame.memory.resize(new_memory_size);

        let bytecode = self.db.get_account_code(address)?;
        let data = copy_zero_padded(&bytecode, code_offset, size);
        self.current_call_frame.memory.store_data(dest_offset, &data)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // RETURNDATASIZE operation
    pub fn op_returndatasize(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::RETURNDATASIZE)?;

        current_call_frame
            .stack
            .push(U256::from(current_call_frame.sub_return_data.len()))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // RETURNDATACOPY operation
    pub fn op_returndatacopy(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        let [dest_offset, returndata_offset, size] = current_call_frame.stack.pop()?;
        let (size, dest_offset) = size_offset_to_usize(size, dest_offset)?;
        let returndata_offset = u256_to_usize(returndata_offset)?;

        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        current_call_frame.increase_consumed_gas(gas_cost::returndatacopy(
            new_memory_size,
            current_call_frame.memory.len(),
            size,
        )?)?;

        // Unlike the other copies, reading past the end of return data is an
        // exceptional halt, not zero padding.
        let end = returndata_offset
            .checked_add(size)
            .ok_or(ExceptionalHalt::OutOfBounds)?;
        if end > current_call_frame.sub_return_data.len() {
            return Err(ExceptionalHalt::OutOfBounds.into());
        }

        if size == 0 {
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }
        current_call_frame.memory.resize(new_memory_size);

        let data = current_call_frame
            .sub_return_data
            .slice(returndata_offset..end);
        current_call_frame.memory.store_data(dest_offset, &data)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // EXTCODEHASH operation
    pub fn op_extcodehash(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::EXTCODEHASH)?;

        let address = word_to_address(self.current_call_frame.stack.pop1()?);
        let info = self.db.get_account_info(address)?;
        // Empty accounts hash to zero, existing accounts to their code hash.
        let hash = if info.is_empty() {
            U256::zero()
        } else {
            h256_to_u256(info.code_hash)
        };
        self.current_call_frame.stack.push(hash)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Copies `size` bytes of `source` starting at `offset` (which may be any
/// word), zero-padding everything past the end of the source.
fn copy_zero_padded(source: &[u8], offset: U256, size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    if let Ok(offset) = usize::try_from(offset) {
        if offset < source.len() {
            let available = source.len() - offset;
            let to_copy = size.min(available);
            data[..to_copy].copy_from_slice(&source[offset..offset + to_copy]);
        }
    }
    data
}
