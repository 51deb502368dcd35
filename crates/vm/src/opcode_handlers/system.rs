//! # System operations
//!
//! Includes the following opcodes:
//!   - `CALL`
//!   - `DELEGATECALL`
//!   - `STATICCALL`
//!   - `CREATE`
//!   - `CREATE2`
//!   - `RETURN`
//!   - `REVERT`
//!   - `SELFDESTRUCT`
//!   - `INVALID`
//!
//! The call and create paths suspend the current frame on the VM's explicit
//! frame stack instead of recursing, so the configured depth limit is the
//! only bound on nesting.

use crate::constants::{FAIL, SUCCESS};
use crate::memory::calculate_memory_size;
use crate::{
    call_frame::CallFrame,
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost, precompiles,
    utils::{size_offset_to_usize, word_to_address},
    vm::VM,
};
use bytes::Bytes;
use ember_common::evm::{calculate_create2_address, calculate_create_address};
use ember_common::utils::keccak;
use ember_common::{Address, U256};
use std::mem;
use tracing::debug;

impl<'a> VM<'a> {
    // CALL operation
    pub fn op_call(&mut self) -> Result<OpcodeResult, VMError> {
        let [gas, callee, value, args_offset, args_size, ret_offset, ret_size] =
            self.current_call_frame.stack.pop()?;
        let callee = word_to_address(callee);
        let (args_size, args_offset) = size_offset_to_usize(args_size, args_offset)?;
        let (ret_size, ret_offset) = size_offset_to_usize(ret_size, ret_offset)?;

        if self.current_call_frame.is_static && !value.is_zero() {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }

        let new_memory_size =
            calculate_memory_size(args_offset, args_size)?.max(calculate_memory_size(ret_offset, ret_size)?);

        let address_is_empty = self.db.account_is_empty(callee)?;
        let (cost, callee_gas_limit) = gas_cost::call(
            new_memory_size,
            self.current_call_frame.memory.len(),
            address_is_empty,
            value,
            gas,
            self.current_call_frame.gas_remaining(),
            &self.env.config,
        )?;
        self.current_call_frame.increase_consumed_gas(cost)?;
        // Expand now; it also preallocates the slot the return data lands in.
        self.current_call_frame.memory.resize(new_memory_size);

        let calldata = Bytes::from(self.current_call_frame.memory.load_range(args_offset, args_size)?);

        self.generic_call(
            callee_gas_limit,
            value,
            self.current_call_frame.to,
            callee,
            callee,
            true,
            self.current_call_frame.is_static,
            calldata,
            ret_offset,
            ret_size,
        )
    }

    // DELEGATECALL operation
    pub fn op_delegatecall(&mut self) -> Result<OpcodeResult, VMError> {
        let [gas, code_address, args_offset, args_size, ret_offset, ret_size] =
            self.current_call_frame.stack.pop()?;
        let code_address = word_to_address(code_address);
        let (args_size, args_offset) = size_offset_to_usize(args_size, args_offset)?;
        let (ret_size, ret_offset) = size_offset_to_usize(ret_size, ret_offset)?;

        let new_memory_size =
            calculate_memory_size(args_offset, args_size)?.max(calculate_memory_size(ret_offset, ret_size)?);

        let (cost, callee_gas_limit) = gas_cost::call(
            new_memory_size,
            self.current_call_frame.memory.len(),
            false,
            U256::zero(),
            gas,
            self.current_call_frame.gas_remaining(),
            &self.env.config,
        )?;
        self.current_call_frame.increase_consumed_gas(cost)?;
        self.current_call_frame.memory.resize(new_memory_size);

        let calldata = Bytes::from(self.current_call_frame.memory.load_range(args_offset, args_size)?);

        // Runs foreign code in the current account's context: storage,
        // sender and value all stay those of the running frame.
        self.generic_call(
            callee_gas_limit,
            self.current_call_frame.msg_value,
            self.current_call_frame.msg_sender,
            self.current_call_frame.to,
            code_address,
            false,
            self.current_call_frame.is_static,
            calldata,
            ret_offset,
            ret_size,
        )
    }

    // STATICCALL operation
    pub fn op_staticcall(&mut self) -> Result<OpcodeResult, VMError> {
        let [gas, callee, args_offset, args_size, ret_offset, ret_size] =
            self.current_call_frame.stack.pop()?;
        let callee = word_to_address(callee);
        let (args_size, args_offset) = size_offset_to_usize(args_size, args_offset)?;
        let (ret_size, ret_offset) = size_offset_to_usize(ret_size, ret_offset)?;

        let new_memory_size =
            calculate_memory_size(args_offset, args_size)?.max(calculate_memory_size(ret_offset, ret_size)?);

        let (cost, callee_gas_limit) = gas_cost::call(
            new_memory_size,
            self.current_call_frame.memory.len(),
            false,
            U256::zero(),
            gas,
            self.current_call_frame.gas_remaining(),
            &self.env.config,
        )?;
        self.current_call_frame.increase_consumed_gas(cost)?;
        self.current_call_frame.memory.resize(new_memory_size);

        let calldata = Bytes::from(self.current_call_frame.memory.load_range(args_offset, args_size)?);

        self.generic_call(
            callee_gas_limit,
            U256::zero(),
            self.current_call_frame.to,
            callee,
            callee,
            false,
            true,
            calldata,
            ret_offset,
            ret_size,
        )
    }

    // CREATE operation
    pub fn op_create(&mut self) -> Result<OpcodeResult, VMError> {
        let [value, offset, size] = self.current_call_frame.stack.pop()?;
        self.generic_create(value, offset, size, None)
    }

    // CREATE2 operation
    pub fn op_create2(&mut self) -> Result<OpcodeResult, VMError> {
        let [value, offset, size, salt] = self.current_call_frame.stack.pop()?;
        self.generic_create(value, offset, size, Some(salt))
    }

    // RETURN operation
    pub fn op_return(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        let [offset, size] = current_call_frame.stack.pop()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;

        let new_memory_size = calculate_memory_size(offset, size)?;
        current_call_frame.increase_consumed_gas(gas_cost::exit_opcode(
            new_memory_size,
            current_call_frame.memory.len(),
        )?)?;
        current_call_frame.memory.resize(new_memory_size);

        current_call_frame.output = Bytes::from(current_call_frame.memory.load_range(offset, size)?);

        Ok(OpcodeResult::Halt)
    }

    // REVERT operation
    pub fn op_revert(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        let [offset, size] = current_call_frame.stack.pop()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;

        let new_memory_size = calculate_memory_size(offset, size)?;
        current_call_frame.increase_consumed_gas(gas_cost::exit_opcode(
            new_memory_size,
            current_call_frame.memory.len(),
        )?)?;
        current_call_frame.memory.resize(new_memory_size);

        current_call_frame.output = Bytes::from(current_call_frame.memory.load_range(offset, size)?);

        Err(VMError::RevertOpcode)
    }

    // INVALID operation
    pub fn op_invalid(&mut self) -> Result<OpcodeResult, VMError> {
        Err(ExceptionalHalt::InvalidOpcode.into())
    }

    // SELFDESTRUCT operation
    pub fn op_selfdestruct(&mut self) -> Result<OpcodeResult, VMError> {
        if self.current_call_frame.is_static {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }

        let beneficiary = word_to_address(self.current_call_frame.stack.pop1()?);
        let to = self.current_call_frame.to;

        let balance = self.db.get_account_info(to)?.balance;
        let beneficiary_is_empty = self.db.account_is_empty(beneficiary)?;
        self.current_call_frame
            .increase_consumed_gas(gas_cost::selfdestruct(beneficiary_is_empty, balance.is_zero()))?;

        // The whole balance moves now (journaled); removal of the account is
        // deferred to top-level commit. Destroying in favor of oneself burns
        // the funds.
        self.db.transfer(to, beneficiary, balance)?;
        self.db.schedule_selfdestruct(to)?;

        Ok(OpcodeResult::Halt)
    }

    /// Dispatches a message call once its cost has been charged: runs a
    /// precompile inline, short-circuits code-less callees, or suspends the
    /// running frame and enters the callee's.
    #[allow(clippy::too_many_arguments)]
    pub fn generic_call(
        &mut self,
        gas_limit: u64,
        value: U256,
        msg_sender: Address,
        to: Address,
        code_address: Address,
        should_transfer_value: bool,
        is_static: bool,
        calldata: Bytes,
        ret_offset: usize,
        ret_size: usize,
    ) -> Result<OpcodeResult, VMError> {
        // The depth guard fails the call, not the caller; forwarded gas is
        // handed back.
        if self.current_call_frame.depth + 1 > self.env.config.max_call_depth {
            return self.report_failed_dispatch(gas_limit, ExceptionalHalt::CallDepthExceeded);
        }

        // An uncovered value transfer likewise fails only the call.
        if should_transfer_value && self.db.get_account_info(msg_sender)?.balance < value {
            return self.report_failed_dispatch(gas_limit, ExceptionalHalt::OutOfFunds);
        }

        if precompiles::is_precompile(&code_address) {
            return self.call_precompile(
                gas_limit,
                value,
                msg_sender,
                to,
                code_address,
                should_transfer_value,
                &calldata,
                ret_offset,
                ret_size,
            );
        }

        let checkpoint = self.db.checkpoint();
        if should_transfer_value {
            self.db.transfer(msg_sender, to, value)?;
        }

        let bytecode = self.db.get_account_code(code_address)?;
        if bytecode.is_empty() {
            // Nothing to execute; the call succeeds immediately.
            self.db.commit_checkpoint(checkpoint);
            self.current_call_frame.return_unused_gas(gas_limit)?;
            self.current_call_frame.sub_return_data = Bytes::new();
            self.current_call_frame.stack.push(SUCCESS)?;
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }

        let new_call_frame = CallFrame::new(
            msg_sender,
            to,
            code_address,
            bytecode,
            value,
            calldata,
            is_static,
            gas_limit,
            self.current_call_frame.depth + 1,
            checkpoint,
            ret_offset,
            ret_size,
            false,
        );

        // The caller resumes right after the call opcode.
        self.current_call_frame.increment_pc_by(1)?;
        let parent = mem::replace(&mut self.current_call_frame, new_call_frame);
        self.call_frames.push(parent);

        Ok(OpcodeResult::Continue { pc_increment: 0 })
    }

    /// A nested dispatch that failed before any frame could run: the caller
    /// sees an ordinary failed call and gets `unused_gas` back.
    fn report_failed_dispatch(
        &mut self,
        unused_gas: u64,
        halt: ExceptionalHalt,
    ) -> Result<OpcodeResult, VMError> {
        debug!(reason = %halt, "nested dispatch refused");
        self.current_call_frame.return_unused_gas(unused_gas)?;
        self.current_call_frame.sub_return_data = Bytes::new();
        self.current_call_frame.stack.push(FAIL)?;
        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    /// A precompile behaves like a call frame without code: it can succeed
    /// or halt, and its value transfer reverts with it.
    #[allow(clippy::too_many_arguments)]
    fn call_precompile(
        &mut self,
        gas_limit: u64,
        value: U256,
        msg_sender: Address,
        to: Address,
        code_address: Address,
        should_transfer_value: bool,
        calldata: &Bytes,
        ret_offset: usize,
        ret_size: usize,
    ) -> Result<OpcodeResult, VMError> {
        let checkpoint = self.db.checkpoint();
        if should_transfer_value {
            self.db.transfer(msg_sender, to, value)?;
        }

        match precompiles::execute_precompile(code_address, calldata, gas_limit) {
            Ok((output, gas_used)) => {
                self.db.commit_checkpoint(checkpoint);
                self.current_call_frame
                    .return_unused_gas(gas_limit.saturating_sub(gas_used))?;

                let copy_len = ret_size.min(output.len());
                self.current_call_frame
                    .memory
                    .store_data(ret_offset, &output[..copy_len])?;
                self.current_call_frame.sub_return_data = output;
                self.current_call_frame.stack.push(SUCCESS)?;
            }
            Err(error) if error.should_propagate() => return Err(error),
            Err(_) => {
                // The virtual frame halts: forwarded gas is consumed and the
                // transfer is rolled back.
                self.db.revert_checkpoint(checkpoint)?;
                self.current_call_frame.sub_return_data = Bytes::new();
                self.current_call_frame.stack.push(FAIL)?;
            }
        }

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    /// Shared CREATE/CREATE2 path. Charges the cost, derives the new
    /// address, and enters the init code frame whose RETURN data becomes the
    /// deployed code.
    pub fn generic_create(
        &mut self,
        value: U256,
        offset: U256,
        size: U256,
        salt: Option<U256>,
    ) -> Result<OpcodeResult, VMError> {
        if self.current_call_frame.is_static {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }

        let (size, offset) = size_offset_to_usize(size, offset)?;
        if size > self.env.config.max_initcode_size {
            return Err(ExceptionalHalt::VeryLargeNumber.into());
        }

        let new_memory_size = calculate_memory_size(offset, size)?;
        let (cost, forwarded_gas) = gas_cost::create(
            new_memory_size,
            self.current_call_frame.memory.len(),
            size,
            salt.is_some(),
            self.current_call_frame.gas_remaining(),
            &self.env.config,
        )?;
        self.current_call_frame.increase_consumed_gas(cost)?;
        self.current_call_frame.memory.resize(new_memory_size);

        let init_code = Bytes::from(self.current_call_frame.memory.load_range(offset, size)?);
        let deployer = self.current_call_frame.to;

        if self.current_call_frame.depth + 1 > self.env.config.max_call_depth {
            return self.report_failed_dispatch(forwarded_gas, ExceptionalHalt::CallDepthExceeded);
        }

        if self.db.get_account_info(deployer)?.balance < value {
            return self.report_failed_dispatch(forwarded_gas, ExceptionalHalt::OutOfFunds);
        }

        // The deployer's nonce rises even if the init code later reverts.
        let deployer_nonce = self.db.increment_account_nonce(deployer)?;
        let new_address = match salt {
            Some(salt) => calculate_create2_address(deployer, salt, keccak(&init_code)),
            None => calculate_create_address(deployer, deployer_nonce),
        };

        // An occupied address fails the create and eats the forwarded gas.
        let existing = self.db.get_account_info(new_address)?;
        if existing.has_code() || existing.has_nonce() || self.db.account_was_created(new_address) {
            return self.report_failed_dispatch(0, ExceptionalHalt::AddressCollision);
        }

        let checkpoint = self.db.checkpoint();
        self.db.mark_account_created(new_address)?;
        // Contract accounts are born with nonce 1.
        self.db.increment_account_nonce(new_address)?;
        self.db.transfer(deployer, new_address, value)?;

        let new_call_frame = CallFrame::new(
            deployer,
            new_address,
            new_address,
            init_code,
            value,
            Bytes::new(),
            false,
            forwarded_gas,
            self.current_call_frame.depth + 1,
            checkpoint,
            0,
            0,
            true,
        );

        self.current_call_frame.increment_pc_by(1)?;
        let parent = mem::replace(&mut self.current_call_frame, new_call_frame);
        self.call_frames.push(parent);

        Ok(OpcodeResult::Continue { pc_increment: 0 })
    }
}
