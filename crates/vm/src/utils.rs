use crate::errors::{ExceptionalHalt, VMError};
use ember_common::U256;

pub use ember_common::utils::{address_to_word, word_to_address};

/// Narrows a stack word into a usize offset or length. Anything that does
/// not fit cannot possibly be paid for, so the caller treats it as a halt.
pub fn u256_to_usize(value: U256) -> Result<usize, VMError> {
    value
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber.into())
}

/// Pops common `(size, offset)` operand pairs into usize, in the order they
/// come off the stack.
pub fn size_offset_to_usize(size: U256, offset: U256) -> Result<(usize, usize), VMError> {
    // A zero size makes the offset irrelevant, and huge offsets are legal in
    // that case.
    if size.is_zero() {
        return Ok((0, 0));
    }
    Ok((u256_to_usize(size)?, u256_to_usize(offset)?))
}

/// True if the word is negative under two's-complement interpretation.
pub fn is_negative(value: U256) -> bool {
    value.bit(255)
}

/// Two's-complement negation.
pub fn negate(value: U256) -> U256 {
    let (negated, _) = (!value).overflowing_add(U256::one());
    negated
}

/// Two's-complement absolute value.
pub fn abs(value: U256) -> U256 {
    if is_negative(value) { negate(value) } else { value }
}
