//! # Push operations
//!
//! Includes the `PUSH0` and `PUSH1` through `PUSH32` opcodes.

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcodes::Opcode,
    vm::VM,
};
use ember_common::U256;

impl<'a> VM<'a> {
    // PUSH0 operation
    pub fn op_push0(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::PUSH0)?;

        current_call_frame.stack.push_zero()?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    /// Handles PUSH1..PUSH32; the immediate width comes from the opcode
    /// byte. An immediate running past the end of code is zero-padded.
    pub fn op_push(&mut self, opcode: Opcode) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::PUSHN)?;

        let n_bytes = usize::from(u8::from(opcode) - u8::from(Opcode::PUSH1) + 1);

        let mut word = [0u8; 32];
        for i in 0..n_bytes {
            word[32 - n_bytes + i] = current_call_frame
                .bytecode
                .get(current_call_frame.pc + 1 + i)
                .copied()
                .unwrap_or(0);
        }
        current_call_frame.stack.push(U256::from_big_endian(&word))?;

        Ok(OpcodeResult::Continue {
            pc_increment: n_bytes + 1,
        })
    }
}
