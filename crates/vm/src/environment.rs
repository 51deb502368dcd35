use crate::fee_schedule::FeeSchedule;
use ember_common::{Address, H256, U256};

/// Block-level context the host supplies for one execution, plus the fee
/// schedule in force. Opaque to the interpreter except through the
/// environment opcodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub coinbase: Address,
    pub block_number: U256,
    pub timestamp: U256,
    pub prev_randao: H256,
    pub block_gas_limit: u64,
    pub chain_id: U256,
    pub base_fee_per_gas: U256,
    pub config: FeeSchedule,
}
