//! # Logging operations
//!
//! Includes the `LOG0` through `LOG4` opcodes. Log records append to the
//! journal's log sequence and vanish with their region if the emitting frame
//! or any ancestor fails.

use crate::memory::calculate_memory_size;
use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    opcodes::Opcode,
    utils::size_offset_to_usize,
    vm::VM,
};
use bytes::Bytes;
use ember_common::types::Log;
use ember_common::utils::u256_to_h256;

impl<'a> VM<'a> {
    /// Handles all LOGn opcodes; the topic count comes from the opcode byte.
    pub fn op_log(&mut self, opcode: Opcode) -> Result<OpcodeResult, VMError> {
        if self.current_call_frame.is_static {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }

        let number_of_topics = usize::from(u8::from(opcode) - u8::from(Opcode::LOG0));
        let current_call_frame = &mut self.current_call_frame;

        let [offset, size] = current_call_frame.stack.pop()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;

        let mut topics = Vec::with_capacity(number_of_topics);
        for _ in 0..number_of_topics {
            topics.push(u256_to_h256(current_call_frame.stack.pop1()?));
        }

        let new_memory_size = calculate_memory_size(offset, size)?;
        current_call_frame.increase_consumed_gas(gas_cost::log(
            new_memory_size,
            current_call_frame.memory.len(),
            size,
            number_of_topics,
        )?)?;
        current_call_frame.memory.resize(new_memory_size);

        let data = current_call_frame.memory.load_range(offset, size)?;
        let log = Log {
            address: current_call_frame.to,
            topics,
            data: Bytes::from(data),
        };
        self.db.add_log(log);

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
