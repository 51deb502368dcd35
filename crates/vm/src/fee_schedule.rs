use crate::constants::{
    INIT_CODE_MAX_SIZE, MAX_CODE_SIZE, TX_BASE_COST, TX_CREATE_COST,
    TX_DATA_COST_PER_NON_ZERO_BYTE, TX_DATA_COST_PER_ZERO_BYTE,
};

/// Protocol pricing and limit parameters. Hosts inject a schedule through
/// [`crate::environment::Environment`] so a protocol upgrade changes numbers
/// here instead of interpreter logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSchedule {
    /// Fixed cost of every transaction, charged before any code runs.
    pub tx_base_cost: u64,
    /// Intrinsic cost per zero byte of call data.
    pub tx_data_zero_cost: u64,
    /// Intrinsic cost per non-zero byte of call data.
    pub tx_data_non_zero_cost: u64,
    /// Extra intrinsic cost of a contract-creation transaction.
    pub tx_create_cost: u64,
    /// Intrinsic cost per 32-byte word of creation init code.
    pub init_code_word_cost: u64,

    /// Cost per byte of code deposited by a successful creation.
    pub code_deposit_cost: u64,
    /// Base cost of the CREATE/CREATE2 opcodes.
    pub create_base_cost: u64,
    pub max_code_size: usize,
    pub max_initcode_size: usize,

    /// Gas handed to the callee of a value-bearing call on top of the
    /// forwarded amount; also the SSTORE sentry threshold.
    pub call_stipend: u64,
    /// Surcharge for transferring a non-zero value with a call.
    pub call_value_cost: u64,
    /// Surcharge for transferring value into a previously empty account.
    pub new_account_cost: u64,
    /// A nested call receives at most
    /// `available - available / gas_reserve_divisor` gas, keeping the caller
    /// able to run cleanup code after the call returns.
    pub gas_reserve_divisor: u64,

    /// Storage refunds are capped at `gas_used / refund_quotient`.
    pub refund_quotient: u64,
    /// SSTORE cost when writing a non-zero value into an empty slot.
    pub sstore_set_cost: u64,
    /// SSTORE cost for every other write.
    pub sstore_reset_cost: u64,
    /// Refund for clearing a non-zero slot.
    pub sstore_clear_refund: u64,

    pub max_call_depth: usize,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            tx_base_cost: TX_BASE_COST,
            tx_data_zero_cost: TX_DATA_COST_PER_ZERO_BYTE,
            tx_data_non_zero_cost: TX_DATA_COST_PER_NON_ZERO_BYTE,
            tx_create_cost: TX_CREATE_COST,
            init_code_word_cost: 2,
            code_deposit_cost: 200,
            create_base_cost: 32000,
            max_code_size: MAX_CODE_SIZE,
            max_initcode_size: INIT_CODE_MAX_SIZE,
            call_stipend: 2300,
            call_value_cost: 9000,
            new_account_cost: 25000,
            gas_reserve_divisor: 64,
            refund_quotient: 5,
            sstore_set_cost: 20000,
            sstore_reset_cost: 5000,
            sstore_clear_refund: 4800,
            max_call_depth: 1024,
        }
    }
}

impl FeeSchedule {
    /// Upper bound on the gas a caller may forward to a nested call.
    pub fn max_forwardable_gas(&self, available: u64) -> u64 {
        available.saturating_sub(available / self.gas_reserve_divisor)
    }
}
