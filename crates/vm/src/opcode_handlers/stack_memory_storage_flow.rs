//! # Stack, memory, storage and control flow operations
//!
//! Includes the following opcodes:
//!   - `POP`, `PC`, `MSIZE`, `GAS`
//!   - `MLOAD`, `MSTORE`, `MSTORE8`
//!   - `SLOAD`, `SSTORE`
//!   - `JUMP`, `JUMPI`, `JUMPDEST`

use crate::memory::calculate_memory_size;
use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    utils::u256_to_usize,
    vm::VM,
};
use ember_common::U256;
use ember_common::utils::u256_to_h256;

impl<'a> VM<'a> {
    // POP operation
    pub fn op_pop(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::POP)?;

        current_call_frame.stack.pop1()?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // PC operation
    pub fn op_pc(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::PC)?;

        current_call_frame
            .stack
            .push(U256::from(current_call_frame.pc))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // MSIZE operation
    pub fn op_msize(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::MSIZE)?;

        current_call_frame
            .stack
            .push(U256::from(current_call_frame.memory.len()))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // GAS operation
    pub fn op_gas(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::GAS)?;

        current_call_frame
            .stack
            .push(U256::from(current_call_frame.gas_remaining()))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // MLOAD operation
    pub fn op_mload(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        let offset = u256_to_usize(current_call_frame.stack.pop1()?)?;

        let new_memory_size = calculate_memory_size(offset, 32)?;
        current_call_frame.increase_consumed_gas(gas_cost::mload(
            new_memory_size,
            current_call_frame.memory.len(),
        )?)?;
        current_call_frame.memory.resize(new_memory_size);

        let value = current_call_frame.memory.load_word(offset)?;
        current_call_frame.stack.push(value)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // MSTORE operation
    pub fn op_mstore(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        let [offset, value] = current_call_frame.stack.pop()?;
        let offset = u256_to_usize(offset)?;

        let new_memory_size = calculate_memory_size(offset, 32)?;
        current_call_frame.increase_consumed_gas(gas_cost::mstore(
            new_memory_size,
            current_call_frame.memory.len(),
        )?)?;
        current_call_frame.memory.resize(new_memory_size);

        current_call_frame.memory.store_word(offset, value)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // MSTORE8 operation
    pub fn op_mstore8(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        let [offset, value] = current_call_frame.stack.pop()?;
        let offset = u256_to_usize(offset)?;

        let new_memory_size = calculate_memory_size(offset, 1)?;
        current_call_frame.increase_consumed_gas(gas_cost::mstore8(
            new_memory_size,
            current_call_frame.memory.len(),
        )?)?;
        current_call_frame.memory.resize(new_memory_size);

        current_call_frame
            .memory
            .store_byte(offset, value.byte(0))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // SLOAD operation
    pub fn op_sload(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::SLOAD)?;

        let key = u256_to_h256(self.current_call_frame.stack.pop1()?);
        let value = self
            .db
            .get_storage_value(self.current_call_frame.to, key)?;
        self.current_call_frame.stack.push(value)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // SSTORE operation
    pub fn op_sstore(&mut self) -> Result<OpcodeResult, VMError> {
        if self.current_call_frame.is_static {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }

        // Sentry: a frame running on stipend gas alone may not write
        // storage.
        if self.current_call_frame.gas_remaining() <= self.env.config.call_stipend {
            return Err(ExceptionalHalt::OutOfGas.into());
        }

        let [key, new_value] = self.current_call_frame.stack.pop()?;
        let key = u256_to_h256(key);
        let to = self.current_call_frame.to;

        let current_value = self.db.get_storage_value(to, key)?;
        let (gas_cost, refund) = gas_cost::sstore(current_value, new_value, &self.env.config);
        self.current_call_frame.increase_consumed_gas(gas_cost)?;
        if refund > 0 {
            self.db.add_refund(refund)?;
        }
        self.db.update_account_storage(to, key, new_value)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // JUMP operation
    pub fn op_jump(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::JUMP)?;

        let target = current_call_frame.stack.pop1()?;
        jump_to(current_call_frame, target)?;

        Ok(OpcodeResult::Continue { pc_increment: 0 })
    }

    // JUMPI operation
    pub fn op_jumpi(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::JUMPI)?;

        let [target, condition] = current_call_frame.stack.pop()?;
        if condition.is_zero() {
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }
        jump_to(current_call_frame, target)?;

        Ok(OpcodeResult::Continue { pc_increment: 0 })
    }

    // JUMPDEST operation
    pub fn op_jumpdest(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::JUMPDEST)?;
        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Retargets the program counter, validating the destination against the
/// frame's precomputed jump destinations.
fn jump_to(
    current_call_frame: &mut crate::call_frame::CallFrame,
    target: U256,
) -> Result<(), VMError> {
    let target = usize::try_from(target).map_err(|_| ExceptionalHalt::InvalidJump)?;
    if !current_call_frame.is_valid_jump_destination(target) {
        return Err(ExceptionalHalt::InvalidJump.into());
    }
    current_call_frame.pc = target;
    Ok(())
}
