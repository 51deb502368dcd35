//! # Comparison and bitwise logic operations
//!
//! Includes the following opcodes:
//!   - `LT`, `GT`, `SLT`, `SGT`, `EQ`, `ISZERO`
//!   - `AND`, `OR`, `XOR`, `NOT`
//!   - `BYTE`, `SHL`, `SHR`, `SAR`

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    utils::is_negative,
    vm::VM,
};
use ember_common::U256;
use std::cmp::Ordering;

impl<'a> VM<'a> {
    // LT operation
    pub fn op_lt(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::LT)?;

        let [lho, rho] = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(bool_to_word(lho < rho))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // GT operation
    pub fn op_gt(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::GT)?;

        let [lho, rho] = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(bool_to_word(lho > rho))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // SLT operation
    pub fn op_slt(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::SLT)?;

        let [lho, rho] = current_call_frame.stack.pop()?;
        current_call_frame
            .stack
            .push(bool_to_word(signed_compare(lho, rho) == Ordering::Less))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // SGT operation
    pub fn op_sgt(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::SGT)?;

        let [lho, rho] = current_call_frame.stack.pop()?;
        current_call_frame
            .stack
            .push(bool_to_word(signed_compare(lho, rho) == Ordering::Greater))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // EQ operation
    pub fn op_eq(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::EQ)?;

        let [lho, rho] = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(bool_to_word(lho == rho))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // ISZERO operation
    pub fn op_iszero(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::ISZERO)?;

        let operand = current_call_frame.stack.pop1()?;
        current_call_frame.stack.push(bool_to_word(operand.is_zero()))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // AND operation
    pub fn op_and(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::AND)?;

        let [a, b] = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(a & b)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // OR operation
    pub fn op_or(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::OR)?;

        let [a, b] = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(a | b)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // XOR operation
    pub fn op_xor(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::XOR)?;

        let [a, b] = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(a ^ b)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // NOT operation
    pub fn op_not(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::NOT)?;

        let operand = current_call_frame.stack.pop1()?;
        current_call_frame.stack.push(!operand)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // BYTE operation
    pub fn op_byte(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::BYTE)?;

        let [index, word] = current_call_frame.stack.pop()?;
        // Index 0 is the most significant byte.
        if index >= U256::from(32) {
            current_call_frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }
        let byte = word.byte(31 - usize::try_from(index).unwrap_or(31));
        current_call_frame.stack.push(U256::from(byte))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // SHL operation
    pub fn op_shl(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::SHL)?;

        let [shift, value] = current_call_frame.stack.pop()?;
        if shift >= U256::from(256) {
            current_call_frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }
        let shift = usize::try_from(shift).unwrap_or(255);
        current_call_frame.stack.push(value << shift)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // SHR operation
    pub fn op_shr(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::SHR)?;

        let [shift, value] = current_call_frame.stack.pop()?;
        if shift >= U256::from(256) {
            current_call_frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }
        let shift = usize::try_from(shift).unwrap_or(255);
        current_call_frame.stack.push(value >> shift)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    // SAR operation
    pub fn op_sar(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::SAR)?;

        let [shift, value] = current_call_frame.stack.pop()?;
        let negative = is_negative(value);
        if shift >= U256::from(256) {
            // A negative value shifted all the way out keeps its sign.
            let result = if negative { U256::MAX } else { U256::zero() };
            current_call_frame.stack.push(result)?;
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }

        let shift = usize::try_from(shift).unwrap_or(255);
        let mut result = value >> shift;
        if negative && shift > 0 {
            // Fill the vacated high bits with ones.
            result = result | (U256::MAX << (256 - shift));
        }
        current_call_frame.stack.push(result)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

fn bool_to_word(condition: bool) -> U256 {
    if condition { U256::one() } else { U256::zero() }
}

/// Two's-complement ordering of two words.
fn signed_compare(lho: U256, rho: U256) -> Ordering {
    match (is_negative(lho), is_negative(rho)) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => lho.cmp(&rho),
    }
}
