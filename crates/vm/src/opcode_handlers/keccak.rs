//! # KECCAK256 operation

use crate::memory::calculate_memory_size;
use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    utils::size_offset_to_usize,
    vm::VM,
};
use ember_common::utils::{h256_to_u256, keccak};

impl<'a> VM<'a> {
    // KECCAK256 operation
    pub fn op_keccak256(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        let [offset, size] = current_call_frame.stack.pop()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;

        let new_memory_size = calculate_memory_size(offset, size)?;
        current_call_frame.increase_consumed_gas(gas_cost::keccak256(
            new_memory_size,
            current_call_frame.memory.len(),
            size,
        )?)?;
        current_call_frame.memory.resize(new_memory_size);

        let data = current_call_frame.memory.load_range(offset, size)?;
        current_call_frame.stack.push(h256_to_u256(keccak(&data)))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
