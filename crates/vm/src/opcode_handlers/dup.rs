//! # Duplication operations
//!
//! Includes the `DUP1` through `DUP16` opcodes.

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcodes::Opcode,
    vm::VM,
};

impl<'a> VM<'a> {
    /// Handles all DUPn opcodes; the depth comes from the opcode byte.
    pub fn op_dup(&mut self, opcode: Opcode) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::DUPN)?;

        let depth = usize::from(u8::from(opcode) - u8::from(Opcode::DUP1) + 1);
        current_call_frame.stack.dup(depth)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
