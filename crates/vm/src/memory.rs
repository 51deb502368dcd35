use crate::constants::{MEMORY_EXPANSION_QUOTIENT, WORD_SIZE_IN_BYTES_U64, WORD_SIZE_IN_BYTES_USIZE};
use crate::errors::{ExceptionalHalt, InternalError, VMError};
use ember_common::U256;

/// Byte-addressable call-frame memory. Grows lazily to the highest offset
/// touched, rounded up to a word boundary; growth is paid for through
/// [`expansion_cost`] before [`Memory::resize`] is called.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Grows memory to `new_memory_size` bytes (already word-rounded by
    /// [`calculate_memory_size`]). Memory never shrinks during a frame.
    pub fn resize(&mut self, new_memory_size: usize) {
        if new_memory_size > self.data.len() {
            self.data.resize(new_memory_size, 0);
        }
    }

    pub fn load_word(&self, offset: usize) -> Result<U256, VMError> {
        let slice = self
            .data
            .get(offset..offset.checked_add(WORD_SIZE_IN_BYTES_USIZE).ok_or(ExceptionalHalt::OutOfBounds)?)
            .ok_or(InternalError::Slicing)?;
        Ok(U256::from_big_endian(slice))
    }

    /// Copies `size` bytes starting at `offset`. The range must already be
    /// covered by a prior `resize`.
    pub fn load_range(&self, offset: usize, size: usize) -> Result<Vec<u8>, VMError> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let end = offset.checked_add(size).ok_or(ExceptionalHalt::OutOfBounds)?;
        Ok(self.data.get(offset..end).ok_or(InternalError::Slicing)?.to_vec())
    }

    pub fn store_word(&mut self, offset: usize, word: U256) -> Result<(), VMError> {
        self.store_data(offset, &word.to_big_endian())
    }

    pub fn store_byte(&mut self, offset: usize, byte: u8) -> Result<(), VMError> {
        *self.data.get_mut(offset).ok_or(InternalError::Slicing)? = byte;
        Ok(())
    }

    pub fn store_data(&mut self, offset: usize, data: &[u8]) -> Result<(), VMError> {
        if data.is_empty() {
            return Ok(());
        }
        let end = offset.checked_add(data.len()).ok_or(ExceptionalHalt::OutOfBounds)?;
        self.data
            .get_mut(offset..end)
            .ok_or(InternalError::Slicing)?
            .copy_from_slice(data);
        Ok(())
    }
}

/// Memory size required to touch `offset..offset + size`, rounded up to the
/// next word boundary. A zero-size access never expands memory, whatever the
/// offset.
pub fn calculate_memory_size(offset: usize, size: usize) -> Result<usize, VMError> {
    if size == 0 {
        return Ok(0);
    }

    offset
        .checked_add(size)
        .and_then(|end| end.checked_next_multiple_of(WORD_SIZE_IN_BYTES_USIZE))
        .ok_or(ExceptionalHalt::OutOfBounds.into())
}

/// Incremental cost of growing memory from `current_memory_size` to
/// `new_memory_size` (both word-rounded byte counts). Charging the
/// difference of the quadratic totals means the same expansion is never paid
/// for twice.
pub fn expansion_cost(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    if new_memory_size <= current_memory_size {
        return Ok(0);
    }
    let cost = total_cost(new_memory_size)?
        .checked_sub(total_cost(current_memory_size)?)
        .ok_or(InternalError::Underflow)?;
    Ok(cost)
}

fn total_cost(memory_size: usize) -> Result<u64, VMError> {
    let memory_size: u64 = memory_size
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;
    let words = memory_size
        .checked_add(WORD_SIZE_IN_BYTES_U64 - 1)
        .ok_or(ExceptionalHalt::OutOfGas)?
        / WORD_SIZE_IN_BYTES_U64;

    let linear = words.checked_mul(3).ok_or(ExceptionalHalt::OutOfGas)?;
    let quadratic = words
        .checked_mul(words)
        .ok_or(ExceptionalHalt::OutOfGas)?
        / MEMORY_EXPANSION_QUOTIENT;

    linear.checked_add(quadratic).ok_or(ExceptionalHalt::OutOfGas.into())
}
