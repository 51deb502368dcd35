use crate::constants::STACK_LIMIT;
use crate::db::JournalCheckpoint;
use crate::errors::{ExceptionalHalt, InternalError, VMError};
use crate::memory::Memory;
use crate::opcodes::Opcode;
use bytes::Bytes;
use ember_common::{Address, U256};
use std::collections::BTreeSet;

/// The operand stack of a call frame: 256-bit words, bounded depth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stack {
    values: Vec<U256>,
}

impl Stack {
    /// Pops `N` words, top of the stack first.
    pub fn pop<const N: usize>(&mut self) -> Result<[U256; N], VMError> {
        if self.values.len() < N {
            return Err(ExceptionalHalt::StackUnderflow.into());
        }
        let mut popped = [U256::zero(); N];
        for value in popped.iter_mut() {
            *value = self.values.pop().ok_or(ExceptionalHalt::StackUnderflow)?;
        }
        Ok(popped)
    }

    pub fn pop1(&mut self) -> Result<U256, VMError> {
        let [value] = self.pop()?;
        Ok(value)
    }

    pub fn push(&mut self, value: U256) -> Result<(), VMError> {
        if self.values.len() >= STACK_LIMIT {
            return Err(ExceptionalHalt::StackOverflow.into());
        }
        self.values.push(value);
        Ok(())
    }

    pub fn push_zero(&mut self) -> Result<(), VMError> {
        self.push(U256::zero())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Duplicates the `depth`-th word from the top (1-based, DUP semantics).
    pub fn dup(&mut self, depth: usize) -> Result<(), VMError> {
        let index = self
            .values
            .len()
            .checked_sub(depth)
            .ok_or(ExceptionalHalt::StackUnderflow)?;
        let value = *self.values.get(index).ok_or(ExceptionalHalt::StackUnderflow)?;
        self.push(value)
    }

    /// Swaps the top with the `depth`-th word below it (1-based, SWAP
    /// semantics).
    pub fn swap(&mut self, depth: usize) -> Result<(), VMError> {
        let top = self
            .values
            .len()
            .checked_sub(1)
            .ok_or(ExceptionalHalt::StackUnderflow)?;
        let other = self
            .values
            .len()
            .checked_sub(depth.checked_add(1).ok_or(InternalError::Overflow)?)
            .ok_or(ExceptionalHalt::StackUnderflow)?;
        self.values.swap(top, other);
        Ok(())
    }
}

/// One activation of code execution: its own stack, memory, program counter
/// and gas budget. Frames are created by the top-level transaction and by
/// the call/create opcodes, and live on the VM's explicit frame stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    /// Account whose context executes: storage and balance owner, and the
    /// address a creation frame deploys to.
    pub to: Address,
    /// Account whose code runs. Differs from `to` under DELEGATECALL.
    pub code_address: Address,
    pub msg_sender: Address,
    pub msg_value: U256,
    pub calldata: Bytes,
    pub bytecode: Bytes,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub pc: usize,
    pub depth: usize,
    /// Read-only context: any state-mutating opcode halts exceptionally.
    pub is_static: bool,
    pub stack: Stack,
    pub memory: Memory,
    /// Return data of the most recently completed nested call.
    pub sub_return_data: Bytes,
    /// Slot in the parent's memory where this frame's output is copied back.
    pub ret_offset: usize,
    pub ret_size: usize,
    /// Output set by RETURN or REVERT.
    pub output: Bytes,
    /// Journal region opened for this frame; reverted or merged when the
    /// frame halts.
    pub checkpoint: JournalCheckpoint,
    /// True while running creation init code; the frame's RETURN data is the
    /// code to deploy.
    pub is_create: bool,
    valid_jump_destinations: BTreeSet<usize>,
}

impl CallFrame {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        msg_sender: Address,
        to: Address,
        code_address: Address,
        bytecode: Bytes,
        msg_value: U256,
        calldata: Bytes,
        is_static: bool,
        gas_limit: u64,
        depth: usize,
        checkpoint: JournalCheckpoint,
        ret_offset: usize,
        ret_size: usize,
        is_create: bool,
    ) -> Self {
        let valid_jump_destinations = get_valid_jump_destinations(&bytecode);
        Self {
            msg_sender,
            to,
            code_address,
            bytecode,
            msg_value,
            calldata,
            is_static,
            gas_limit,
            gas_used: 0,
            pc: 0,
            depth,
            stack: Stack::default(),
            memory: Memory::new(),
            sub_return_data: Bytes::new(),
            ret_offset,
            ret_size,
            output: Bytes::new(),
            checkpoint,
            is_create,
            valid_jump_destinations,
        }
    }

    /// Fetches the opcode under the program counter. Running past the end of
    /// code behaves as STOP.
    pub fn next_opcode(&self) -> Opcode {
        self.bytecode
            .get(self.pc)
            .copied()
            .map(Opcode::from)
            .unwrap_or(Opcode::STOP)
    }

    pub fn increment_pc_by(&mut self, count: usize) -> Result<(), VMError> {
        self.pc = self.pc.checked_add(count).ok_or(InternalError::Overflow)?;
        Ok(())
    }

    /// Charges `gas` against this frame's budget. Exceeding the budget is an
    /// out-of-gas exceptional halt.
    pub fn increase_consumed_gas(&mut self, gas: u64) -> Result<(), VMError> {
        let consumed = self.gas_used.checked_add(gas).ok_or(ExceptionalHalt::OutOfGas)?;
        if consumed > self.gas_limit {
            return Err(ExceptionalHalt::OutOfGas.into());
        }
        self.gas_used = consumed;
        Ok(())
    }

    /// Returns unspent gas to this frame, after a nested call gave some
    /// back.
    pub fn return_unused_gas(&mut self, gas: u64) -> Result<(), VMError> {
        self.gas_used = self.gas_used.checked_sub(gas).ok_or(InternalError::Underflow)?;
        Ok(())
    }

    pub fn gas_remaining(&self) -> u64 {
        self.gas_limit.saturating_sub(self.gas_used)
    }

    /// True if `target` is a JUMPDEST outside push data.
    pub fn is_valid_jump_destination(&self, target: usize) -> bool {
        self.valid_jump_destinations.contains(&target)
    }
}

/// Positions of JUMPDEST opcodes that are not buried inside push immediates.
fn get_valid_jump_destinations(code: &[u8]) -> BTreeSet<usize> {
    let mut destinations = BTreeSet::new();
    let mut pc = 0;
    while let Some(byte) = code.get(pc).copied() {
        let opcode = Opcode::from(byte);
        if opcode == Opcode::JUMPDEST {
            destinations.insert(pc);
        }
        let skip = if (u8::from(Opcode::PUSH1)..=u8::from(Opcode::PUSH32)).contains(&byte) {
            // The opcode byte plus its immediate.
            usize::from(byte - u8::from(Opcode::PUSH1) + 1) + 1
        } else {
            1
        };
        pc += skip;
    }
    destinations
}
