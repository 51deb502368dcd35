use crate::call_frame::CallFrame;
use crate::constants::{FAIL, SUCCESS, UNSUPPORTED_CODE_PREFIX};
use crate::db::{JournalCheckpoint, JournaledState};
use crate::environment::Environment;
use crate::errors::{
    ContextResult, ExceptionalHalt, ExecutionReport, InternalError, OpcodeResult, TxResult,
    TxValidationError, VMError,
};
use crate::opcodes::Opcode;
use crate::transaction::Transaction;
use crate::utils::address_to_word;
use crate::{gas_cost, precompiles};
use bytes::Bytes;
use ember_common::evm::calculate_create_address;
use ember_common::{Address, U256};
use std::mem;
use tracing::debug;

/// The transaction execution engine: validation, the interpreter loop over
/// an explicit call-frame stack, nested call dispatch, and receipt assembly.
///
/// A `VM` lives for exactly one transaction and assumes exclusive ownership
/// of the journaled state it is given; execution is single-threaded,
/// performs no I/O, and is deterministic given identical inputs.
pub struct VM<'a> {
    /// Frames suspended behind the current one, innermost last.
    pub call_frames: Vec<CallFrame>,
    /// The frame being interpreted.
    pub current_call_frame: CallFrame,
    pub env: Environment,
    pub db: &'a mut JournaledState,
    pub tx: &'a dyn Transaction,
}

impl<'a> VM<'a> {
    pub fn new(env: Environment, db: &'a mut JournaledState, tx: &'a dyn Transaction) -> Self {
        // The real initial frame is built during prepare_execution, once the
        // transaction has been validated.
        let placeholder = CallFrame::new(
            Address::default(),
            Address::default(),
            Address::default(),
            Bytes::new(),
            U256::zero(),
            Bytes::new(),
            false,
            0,
            0,
            JournalCheckpoint::default(),
            0,
            0,
            false,
        );

        Self {
            call_frames: vec![],
            current_call_frame: placeholder,
            env,
            db,
            tx,
        }
    }

    /// True if the external transaction is a contract creation.
    pub fn is_create(&self) -> bool {
        self.tx.is_create()
    }

    /// Executes the whole transaction: `Validating -> Executing ->
    /// Committing | Discarding -> Done`. A validation error rejects the
    /// transaction outright: nothing is charged and no receipt exists.
    pub fn execute(&mut self) -> Result<ExecutionReport, VMError> {
        self.validate_transaction()?;
        self.prepare_execution()?;

        debug!(
            sender = ?self.tx.sender(),
            is_create = self.is_create(),
            gas_limit = self.current_call_frame.gas_limit,
            "executing transaction"
        );

        // Everything from here belongs to the outermost frame's region; the
        // upfront gas debit and the nonce bump above survive even a revert.
        let checkpoint = self.db.checkpoint();
        self.current_call_frame.checkpoint = checkpoint;

        if self.is_create() {
            let create_address = calculate_create_address(self.tx.sender(), self.tx.nonce());
            let existing = self.db.get_account_info(create_address)?;
            if existing.has_code() || existing.has_nonce() {
                debug!(address = ?create_address, "creation address already occupied");
                self.current_call_frame.gas_used = self.current_call_frame.gas_limit;
                return self.finalize_execution(ContextResult {
                    result: TxResult::Halt(ExceptionalHalt::AddressCollision),
                    gas_remaining: 0,
                    output: Bytes::new(),
                });
            }
            self.current_call_frame.to = create_address;
            self.current_call_frame.code_address = create_address;
            self.db.mark_account_created(create_address)?;
            self.db.increment_account_nonce(create_address)?;
            self.db
                .transfer(self.tx.sender(), create_address, self.tx.value())?;
        } else {
            self.db
                .transfer(self.tx.sender(), self.current_call_frame.to, self.tx.value())?;
        }

        let ctx_result = self.run_execution()?;
        self.finalize_execution(ctx_result)
    }

    /// Pre-execution checks against the unmodified state view. Only reads:
    /// re-validating the same transaction against the same view always gives
    /// the same answer.
    fn validate_transaction(&mut self) -> Result<(), VMError> {
        let sender_info = self.db.get_account_info(self.tx.sender())?;

        if sender_info.nonce == u64::MAX {
            return Err(TxValidationError::NonceIsMax.into());
        }
        if self.tx.nonce() != sender_info.nonce {
            return Err(TxValidationError::NonceMismatch {
                sender_nonce: sender_info.nonce,
                tx_nonce: self.tx.nonce(),
            }
            .into());
        }

        let gas_limit: u64 = self
            .tx
            .gas_limit()
            .try_into()
            .map_err(|_| TxValidationError::GasLimitTooHigh)?;
        if gas_limit > self.env.block_gas_limit {
            return Err(TxValidationError::GasAllowanceExceeded.into());
        }

        let intrinsic_gas = gas_cost::intrinsic_gas(self.tx, &self.env.config)?;
        if gas_limit < intrinsic_gas {
            return Err(TxValidationError::IntrinsicGasTooLow.into());
        }

        if self.is_create() && self.tx.data().len() > self.env.config.max_initcode_size {
            return Err(TxValidationError::InitcodeSizeExceeded.into());
        }

        let gas_fee = U256::from(gas_limit)
            .checked_mul(self.tx.gas_price())
            .ok_or(TxValidationError::GasLimitPriceProductOverflow)?;
        let upfront_cost = self
            .tx
            .value()
            .checked_add(gas_fee)
            .ok_or(TxValidationError::InsufficientAccountFunds)?;
        if sender_info.balance < upfront_cost {
            return Err(TxValidationError::InsufficientAccountFunds.into());
        }

        Ok(())
    }

    /// Charges the upfront cost, bumps the sender nonce and opens the
    /// outermost call frame with the intrinsic gas already consumed. These
    /// effects persist whatever the execution outcome.
    fn prepare_execution(&mut self) -> Result<(), VMError> {
        let sender = self.tx.sender();
        let gas_limit: u64 = self
            .tx
            .gas_limit()
            .try_into()
            .map_err(|_| TxValidationError::GasLimitTooHigh)?;

        let gas_fee = U256::from(gas_limit)
            .checked_mul(self.tx.gas_price())
            .ok_or(TxValidationError::GasLimitPriceProductOverflow)?;
        self.db.decrease_account_balance(sender, gas_fee)?;
        self.db.increment_account_nonce(sender)?;

        let mut initial_call_frame = if self.is_create() {
            CallFrame::new(
                sender,
                Address::default(), // Assigned once the creation address is derived.
                Address::default(),
                self.tx.data().clone(),
                self.tx.value(),
                Bytes::new(),
                false,
                gas_limit,
                0,
                JournalCheckpoint::default(),
                0,
                0,
                true,
            )
        } else {
            let to = self
                .tx
                .to()
                .ok_or(InternalError::Custom("message call without a recipient"))?;
            let bytecode = self.db.get_account_code(to)?;
            CallFrame::new(
                sender,
                to,
                to,
                bytecode,
                self.tx.value(),
                self.tx.data().clone(),
                false,
                gas_limit,
                0,
                JournalCheckpoint::default(),
                0,
                0,
                false,
            )
        };

        let intrinsic_gas = gas_cost::intrinsic_gas(self.tx, &self.env.config)?;
        initial_call_frame.increase_consumed_gas(intrinsic_gas)?;

        self.current_call_frame = initial_call_frame;
        Ok(())
    }

    /// Main execution loop: fetch-decode-execute over the top of the frame
    /// stack until the outermost frame halts.
    pub fn run_execution(&mut self) -> Result<ContextResult, VMError> {
        // A precompile callee has no code to interpret; run it natively as
        // the outermost frame.
        if precompiles::is_precompile(&self.current_call_frame.code_address) {
            let calldata = self.current_call_frame.calldata.clone();
            let precompile_result = precompiles::execute_precompile(
                self.current_call_frame.code_address,
                &calldata,
                self.current_call_frame.gas_remaining(),
            );
            return match precompile_result {
                Ok((output, gas_used)) => {
                    self.current_call_frame.increase_consumed_gas(gas_used)?;
                    self.current_call_frame.output = output;
                    self.handle_opcode_result()
                }
                Err(error) => self.handle_opcode_error(error),
            };
        }

        loop {
            let opcode = self.current_call_frame.next_opcode();
            let op_result = self.execute_opcode(opcode);

            let ctx_result = match op_result {
                Ok(OpcodeResult::Continue { pc_increment }) => {
                    self.current_call_frame.increment_pc_by(pc_increment)?;
                    continue;
                }
                Ok(OpcodeResult::Halt) => self.handle_opcode_result()?,
                Err(error) => self.handle_opcode_error(error)?,
            };

            // The outermost frame's outcome is the transaction's outcome.
            if self.call_frames.is_empty() {
                return Ok(ctx_result);
            }
            self.handle_return(ctx_result)?;
        }
    }

    /// Single-opcode dispatch.
    pub fn execute_opcode(&mut self, opcode: Opcode) -> Result<OpcodeResult, VMError> {
        match opcode {
            Opcode::STOP => Ok(OpcodeResult::Halt),
            Opcode::ADD => self.op_add(),
            Opcode::MUL => self.op_mul(),
            Opcode::SUB => self.op_sub(),
            Opcode::DIV => self.op_div(),
            Opcode::SDIV => self.op_sdiv(),
            Opcode::MOD => self.op_mod(),
            Opcode::SMOD => self.op_smod(),
            Opcode::ADDMOD => self.op_addmod(),
            Opcode::MULMOD => self.op_mulmod(),
            Opcode::EXP => self.op_exp(),
            Opcode::SIGNEXTEND => self.op_signextend(),
            Opcode::LT => self.op_lt(),
            Opcode::GT => self.op_gt(),
            Opcode::SLT => self.op_slt(),
            Opcode::SGT => self.op_sgt(),
            Opcode::EQ => self.op_eq(),
            Opcode::ISZERO => self.op_iszero(),
            Opcode::AND => self.op_and(),
            Opcode::OR => self.op_or(),
            Opcode::XOR => self.op_xor(),
            Opcode::NOT => self.op_not(),
            Opcode::BYTE => self.op_byte(),
            Opcode::SHL => self.op_shl(),
            Opcode::SHR => self.op_shr(),
            Opcode::SAR => self.op_sar(),
            Opcode::KECCAK256 => self.op_keccak256(),
            Opcode::ADDRESS => self.op_address(),
            Opcode::BALANCE => self.op_balance(),
            Opcode::ORIGIN => self.op_origin(),
            Opcode::CALLER => self.op_caller(),
            Opcode::CALLVALUE => self.op_callvalue(),
            Opcode::CALLDATALOAD => self.op_calldataload(),
            Opcode::CALLDATASIZE => self.op_calldatasize(),
            Opcode::CALLDATACOPY => self.op_calldatacopy(),
            Opcode::CODESIZE => self.op_codesize(),
            Opcode::CODECOPY => self.op_codecopy(),
            Opcode::GASPRICE => self.op_gasprice(),
            Opcode::EXTCODESIZE => self.op_extcodesize(),
            Opcode::EXTCODECOPY => self.op_extcodecopy(),
            Opcode::RETURNDATASIZE => self.op_returndatasize(),
            Opcode::RETURNDATACOPY => self.op_returndatacopy(),
            Opcode::EXTCODEHASH => self.op_extcodehash(),
            Opcode::BLOCKHASH => self.op_blockhash(),
            Opcode::COINBASE => self.op_coinbase(),
            Opcode::TIMESTAMP => self.op_timestamp(),
            Opcode::NUMBER => self.op_number(),
            Opcode::PREVRANDAO => self.op_prevrandao(),
            Opcode::GASLIMIT => self.op_gaslimit(),
            Opcode::CHAINID => self.op_chainid(),
            Opcode::SELFBALANCE => self.op_selfbalance(),
            Opcode::BASEFEE => self.op_basefee(),
            Opcode::POP => self.op_pop(),
            Opcode::MLOAD => self.op_mload(),
            Opcode::MSTORE => self.op_mstore(),
            Opcode::MSTORE8 => self.op_mstore8(),
            Opcode::SLOAD => self.op_sload(),
            Opcode::SSTORE => self.op_sstore(),
            Opcode::JUMP => self.op_jump(),
            Opcode::JUMPI => self.op_jumpi(),
            Opcode::PC => self.op_pc(),
            Opcode::MSIZE => self.op_msize(),
            Opcode::GAS => self.op_gas(),
            Opcode::JUMPDEST => self.op_jumpdest(),
            Opcode::PUSH0 => self.op_push0(),
            op if (u8::from(Opcode::PUSH1)..=u8::from(Opcode::PUSH32)).contains(&u8::from(op)) => {
                self.op_push(op)
            }
            op if (u8::from(Opcode::DUP1)..=u8::from(Opcode::DUP16)).contains(&u8::from(op)) => {
                self.op_dup(op)
            }
            op if (u8::from(Opcode::SWAP1)..=u8::from(Opcode::SWAP16)).contains(&u8::from(op)) => {
                self.op_swap(op)
            }
            op if (u8::from(Opcode::LOG0)..=u8::from(Opcode::LOG4)).contains(&u8::from(op)) => {
                self.op_log(op)
            }
            Opcode::CREATE => self.op_create(),
            Opcode::CALL => self.op_call(),
            Opcode::RETURN => self.op_return(),
            Opcode::DELEGATECALL => self.op_delegatecall(),
            Opcode::CREATE2 => self.op_create2(),
            Opcode::STATICCALL => self.op_staticcall(),
            Opcode::REVERT => self.op_revert(),
            Opcode::SELFDESTRUCT => self.op_selfdestruct(),
            _ => self.op_invalid(),
        }
    }

    /// The current frame halted normally (STOP, RETURN or SELFDESTRUCT).
    /// Creation frames additionally validate and deposit their returned
    /// code; a deposit failure downgrades the halt to an exceptional one.
    pub fn handle_opcode_result(&mut self) -> Result<ContextResult, VMError> {
        if self.current_call_frame.is_create {
            let code = mem::take(&mut self.current_call_frame.output);
            if let Err(error) = self.deposit_contract_code(code) {
                if error.should_propagate() {
                    return Err(error);
                }
                return self.handle_opcode_error(error);
            }
        }

        self.db.commit_checkpoint(self.current_call_frame.checkpoint);

        Ok(ContextResult {
            result: TxResult::Success,
            gas_remaining: self.current_call_frame.gas_remaining(),
            output: self.current_call_frame.output.clone(),
        })
    }

    /// The current frame failed: roll its journal region back and classify
    /// the failure. Internal and state-view defects propagate out whole.
    pub fn handle_opcode_error(&mut self, error: VMError) -> Result<ContextResult, VMError> {
        if error.should_propagate() {
            return Err(error);
        }

        self.db.revert_checkpoint(self.current_call_frame.checkpoint)?;

        match error {
            VMError::RevertOpcode => Ok(ContextResult {
                result: TxResult::Revert,
                gas_remaining: self.current_call_frame.gas_remaining(),
                output: self.current_call_frame.output.clone(),
            }),
            VMError::ExceptionalHalt(halt) => {
                // The frame forfeits everything it had left.
                self.current_call_frame.gas_used = self.current_call_frame.gas_limit;
                Ok(ContextResult {
                    result: TxResult::Halt(halt),
                    gas_remaining: 0,
                    output: Bytes::new(),
                })
            }
            _ => Err(InternalError::Custom("unexpected error inside the execution loop").into()),
        }
    }

    /// Hands a finished nested frame's outcome back to its parent: unspent
    /// gas, return data into the reserved memory slot, and the conventional
    /// success flag (or created address) on the stack.
    pub fn handle_return(&mut self, ctx_result: ContextResult) -> Result<(), VMError> {
        let parent = self
            .call_frames
            .pop()
            .ok_or(InternalError::EmptyCallFrameStack)?;
        let child = mem::replace(&mut self.current_call_frame, parent);
        let parent = &mut self.current_call_frame;

        parent.return_unused_gas(ctx_result.gas_remaining)?;

        if child.is_create {
            match ctx_result.result {
                TxResult::Success => {
                    parent.sub_return_data = Bytes::new();
                    parent.stack.push(address_to_word(child.to))?;
                }
                TxResult::Revert => {
                    // Revert data of a failed creation stays observable.
                    parent.sub_return_data = ctx_result.output;
                    parent.stack.push(FAIL)?;
                }
                TxResult::Halt(_) => {
                    parent.sub_return_data = Bytes::new();
                    parent.stack.push(FAIL)?;
                }
            }
        } else {
            let copy_len = child.ret_size.min(ctx_result.output.len());
            parent.memory.store_data(
                child.ret_offset,
                ctx_result
                    .output
                    .get(..copy_len)
                    .ok_or(InternalError::Slicing)?,
            )?;
            parent.sub_return_data = ctx_result.output.clone();
            parent
                .stack
                .push(if ctx_result.is_success() { SUCCESS } else { FAIL })?;
        }

        Ok(())
    }

    /// Validates creation output and charges the per-byte deposit cost
    /// before installing the code.
    fn deposit_contract_code(&mut self, code: Bytes) -> Result<(), VMError> {
        if code.len() > self.env.config.max_code_size {
            return Err(ExceptionalHalt::ContractOutputTooBig.into());
        }
        if code.first() == Some(&UNSUPPORTED_CODE_PREFIX) {
            return Err(ExceptionalHalt::InvalidContractPrefix.into());
        }

        let deposit_cost = gas_cost::code_deposit(code.len(), &self.env.config)?;
        self.current_call_frame.increase_consumed_gas(deposit_cost)?;
        self.db
            .update_account_bytecode(self.current_call_frame.to, code)?;
        Ok(())
    }

    /// Settles gas with the sender and the fee recipient, extracts the state
    /// delta and assembles the receipt. On success the capped storage refund
    /// applies; a reverted transaction keeps only its gas accounting and the
    /// nonce bump; an exceptional halt forfeits the whole gas limit.
    pub fn finalize_execution(&mut self, ctx_result: ContextResult) -> Result<ExecutionReport, VMError> {
        let sender = self.tx.sender();
        let gas_limit = self.current_call_frame.gas_limit;
        let gas_price = self.tx.gas_price();

        let mut gas_used = gas_limit
            .checked_sub(ctx_result.gas_remaining)
            .ok_or(InternalError::Underflow)?;

        let mut gas_refunded = 0u64;
        if ctx_result.is_success() {
            gas_refunded = self
                .db
                .refund()
                .min(gas_used / self.env.config.refund_quotient);
            gas_used = gas_used.checked_sub(gas_refunded).ok_or(InternalError::Underflow)?;
        }

        let unused_gas = gas_limit.checked_sub(gas_used).ok_or(InternalError::Underflow)?;
        if unused_gas > 0 {
            let returned_fee = U256::from(unused_gas)
                .checked_mul(gas_price)
                .ok_or(InternalError::Overflow)?;
            self.db.increase_account_balance(sender, returned_fee)?;
        }

        let consumed_fee = U256::from(gas_used)
            .checked_mul(gas_price)
            .ok_or(InternalError::Overflow)?;
        self.db
            .increase_account_balance(self.env.coinbase, consumed_fee)?;

        let created_address =
            (ctx_result.is_success() && self.is_create()).then(|| self.current_call_frame.to);
        let state_updates = self.db.get_state_transitions()?;
        let logs = self.db.logs().to_vec();

        debug!(
            result = ?ctx_result.result,
            gas_used,
            gas_refunded,
            "transaction finalized"
        );

        Ok(ExecutionReport {
            result: ctx_result.result,
            gas_used,
            gas_refunded,
            output: ctx_result.output,
            logs,
            created_address,
            state_updates,
        })
    }
}
