//! # Exchange operations
//!
//! Includes the `SWAP1` through `SWAP16` opcodes.

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcodes::Opcode,
    vm::VM,
};

impl<'a> VM<'a> {
    /// Handles all SWAPn opcodes; the depth comes from the opcode byte.
    pub fn op_swap(&mut self, opcode: Opcode) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::SWAPN)?;

        let depth = usize::from(u8::from(opcode) - u8::from(Opcode::SWAP1) + 1);
        current_call_frame.stack.swap(depth)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
