//! Gas costs of the instruction set, plus the dynamic-cost helpers the
//! interpreter calls before touching memory or dispatching nested calls.
//! Protocol-level parameters (intrinsic costs, forwarding fraction, refund
//! cap) come from the injected [`FeeSchedule`] instead of this table.

use crate::constants::WORD_SIZE;
use crate::errors::{ExceptionalHalt, TxValidationError, VMError};
use crate::fee_schedule::FeeSchedule;
use crate::memory;
use crate::transaction::Transaction;
use ExceptionalHalt::OutOfGas;
use ember_common::U256;

// Opcodes cost
pub const STOP: u64 = 0;
pub const ADD: u64 = 3;
pub const MUL: u64 = 5;
pub const SUB: u64 = 3;
pub const DIV: u64 = 5;
pub const SDIV: u64 = 5;
pub const MOD: u64 = 5;
pub const SMOD: u64 = 5;
pub const ADDMOD: u64 = 8;
pub const MULMOD: u64 = 8;
pub const EXP_STATIC: u64 = 10;
pub const EXP_DYNAMIC_BASE: u64 = 50;
pub const SIGNEXTEND: u64 = 5;
pub const LT: u64 = 3;
pub const GT: u64 = 3;
pub const SLT: u64 = 3;
pub const SGT: u64 = 3;
pub const EQ: u64 = 3;
pub const ISZERO: u64 = 3;
pub const AND: u64 = 3;
pub const OR: u64 = 3;
pub const XOR: u64 = 3;
pub const NOT: u64 = 3;
pub const BYTE: u64 = 3;
pub const SHL: u64 = 3;
pub const SHR: u64 = 3;
pub const SAR: u64 = 3;
pub const KECCAK256_STATIC: u64 = 30;
pub const KECCAK256_DYNAMIC_BASE: u64 = 6;
pub const ADDRESS: u64 = 2;
pub const BALANCE: u64 = 400;
pub const ORIGIN: u64 = 2;
pub const CALLER: u64 = 2;
pub const CALLVALUE: u64 = 2;
pub const CALLDATALOAD: u64 = 3;
pub const CALLDATASIZE: u64 = 2;
pub const CALLDATACOPY_STATIC: u64 = 3;
pub const CALLDATACOPY_DYNAMIC_BASE: u64 = 3;
pub const CODESIZE: u64 = 2;
pub const CODECOPY_STATIC: u64 = 3;
pub const CODECOPY_DYNAMIC_BASE: u64 = 3;
pub const GASPRICE: u64 = 2;
pub const EXTCODESIZE: u64 = 700;
pub const EXTCODECOPY_STATIC: u64 = 700;
pub const EXTCODECOPY_DYNAMIC_BASE: u64 = 3;
pub const RETURNDATASIZE: u64 = 2;
pub const RETURNDATACOPY_STATIC: u64 = 3;
pub const RETURNDATACOPY_DYNAMIC_BASE: u64 = 3;
pub const EXTCODEHASH: u64 = 400;
pub const BLOCKHASH: u64 = 20;
pub const COINBASE: u64 = 2;
pub const TIMESTAMP: u64 = 2;
pub const NUMBER: u64 = 2;
pub const PREVRANDAO: u64 = 2;
pub const GASLIMIT: u64 = 2;
pub const CHAINID: u64 = 2;
pub const SELFBALANCE: u64 = 5;
pub const BASEFEE: u64 = 2;
pub const POP: u64 = 2;
pub const MLOAD_STATIC: u64 = 3;
pub const MSTORE_STATIC: u64 = 3;
pub const MSTORE8_STATIC: u64 = 3;
pub const SLOAD: u64 = 200;
pub const JUMP: u64 = 8;
pub const JUMPI: u64 = 10;
pub const PC: u64 = 2;
pub const MSIZE: u64 = 2;
pub const GAS: u64 = 2;
pub const JUMPDEST: u64 = 1;
pub const PUSH0: u64 = 2;
pub const PUSHN: u64 = 3;
pub const DUPN: u64 = 3;
pub const SWAPN: u64 = 3;
pub const LOGN_STATIC: u64 = 375;
pub const LOGN_DYNAMIC_BASE: u64 = 375;
pub const LOGN_DYNAMIC_BYTE_BASE: u64 = 8;
pub const CALL_STATIC: u64 = 700;
pub const SELFDESTRUCT_STATIC: u64 = 5000;
pub const SELFDESTRUCT_DYNAMIC: u64 = 25000;

// Precompile costs
pub const ECRECOVER_COST: u64 = 3000;
pub const SHA2_256_STATIC_COST: u64 = 60;
pub const SHA2_256_DYNAMIC_BASE: u64 = 12;
pub const RIPEMD_160_STATIC_COST: u64 = 600;
pub const RIPEMD_160_DYNAMIC_BASE: u64 = 120;
pub const IDENTITY_STATIC_COST: u64 = 15;
pub const IDENTITY_DYNAMIC_BASE: u64 = 3;

/// Shared cost shape of the data-hashing precompiles: a base fee plus a
/// per-word fee over the input.
pub fn precompile(data_size: usize, static_cost: u64, dynamic_base: u64) -> Result<u64, VMError> {
    let data_word_size: u64 = data_size
        .div_ceil(WORD_SIZE)
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;
    dynamic_base
        .checked_mul(data_word_size)
        .and_then(|dynamic_cost| static_cost.checked_add(dynamic_cost))
        .ok_or(OutOfGas.into())
}

/// Intrinsic gas of a transaction: the fixed minimum cost before any code
/// runs. Base cost, per-byte cost of call data, and the creation surcharge
/// plus per-word init code cost for creations.
pub fn intrinsic_gas(tx: &dyn Transaction, schedule: &FeeSchedule) -> Result<u64, TxValidationError> {
    let mut gas = schedule.tx_base_cost;

    for byte in tx.data() {
        let byte_cost = if *byte == 0 {
            schedule.tx_data_zero_cost
        } else {
            schedule.tx_data_non_zero_cost
        };
        gas = gas
            .checked_add(byte_cost)
            .ok_or(TxValidationError::IntrinsicGasTooLow)?;
    }

    if tx.is_create() {
        let init_code_words = tx
            .data()
            .len()
            .div_ceil(WORD_SIZE)
            .try_into()
            .map_err(|_| TxValidationError::IntrinsicGasTooLow)?;
        gas = gas
            .checked_add(schedule.tx_create_cost)
            .and_then(|gas| {
                schedule
                    .init_code_word_cost
                    .checked_mul(init_code_words)
                    .and_then(|words_cost| gas.checked_add(words_cost))
            })
            .ok_or(TxValidationError::IntrinsicGasTooLow)?;
    }

    Ok(gas)
}

pub fn exp(exponent: U256) -> Result<u64, VMError> {
    let exponent_byte_size = (exponent.bits().checked_add(7).ok_or(OutOfGas)?) / 8;

    let exponent_byte_size: u64 = exponent_byte_size
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;

    let exponent_byte_size_cost = EXP_DYNAMIC_BASE
        .checked_mul(exponent_byte_size)
        .ok_or(OutOfGas)?;

    EXP_STATIC
        .checked_add(exponent_byte_size_cost)
        .ok_or(OutOfGas.into())
}

pub fn keccak256(new_memory_size: usize, current_memory_size: usize, size: usize) -> Result<u64, VMError> {
    copy_behavior(
        new_memory_size,
        current_memory_size,
        size,
        KECCAK256_DYNAMIC_BASE,
        KECCAK256_STATIC,
    )
}

pub fn calldatacopy(new_memory_size: usize, current_memory_size: usize, size: usize) -> Result<u64, VMError> {
    copy_behavior(
        new_memory_size,
        current_memory_size,
        size,
        CALLDATACOPY_DYNAMIC_BASE,
        CALLDATACOPY_STATIC,
    )
}

pub fn codecopy(new_memory_size: usize, current_memory_size: usize, size: usize) -> Result<u64, VMError> {
    copy_behavior(
        new_memory_size,
        current_memory_size,
        size,
        CODECOPY_DYNAMIC_BASE,
        CODECOPY_STATIC,
    )
}

pub fn extcodecopy(new_memory_size: usize, current_memory_size: usize, size: usize) -> Result<u64, VMError> {
    copy_behavior(
        new_memory_size,
        current_memory_size,
        size,
        EXTCODECOPY_DYNAMIC_BASE,
        EXTCODECOPY_STATIC,
    )
}

pub fn returndatacopy(new_memory_size: usize, current_memory_size: usize, size: usize) -> Result<u64, VMError> {
    copy_behavior(
        new_memory_size,
        current_memory_size,
        size,
        RETURNDATACOPY_DYNAMIC_BASE,
        RETURNDATACOPY_STATIC,
    )
}

fn copy_behavior(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
    dynamic_base: u64,
    static_cost: u64,
) -> Result<u64, VMError> {
    let minimum_word_size: u64 = size
        .div_ceil(WORD_SIZE)
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;

    let memory_expansion_cost = memory::expansion_cost(new_memory_size, current_memory_size)?;

    let minimum_word_size_cost = dynamic_base
        .checked_mul(minimum_word_size)
        .ok_or(OutOfGas)?;
    static_cost
        .checked_add(minimum_word_size_cost)
        .ok_or(OutOfGas)?
        .checked_add(memory_expansion_cost)
        .ok_or(OutOfGas.into())
}

pub fn mload(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    mem_expansion_behavior(new_memory_size, current_memory_size, MLOAD_STATIC)
}

pub fn mstore(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    mem_expansion_behavior(new_memory_size, current_memory_size, MSTORE_STATIC)
}

pub fn mstore8(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    mem_expansion_behavior(new_memory_size, current_memory_size, MSTORE8_STATIC)
}

fn mem_expansion_behavior(
    new_memory_size: usize,
    current_memory_size: usize,
    static_cost: u64,
) -> Result<u64, VMError> {
    let memory_expansion_cost = memory::expansion_cost(new_memory_size, current_memory_size)?;
    static_cost
        .checked_add(memory_expansion_cost)
        .ok_or(OutOfGas.into())
}

// Used in return and revert opcodes
pub fn exit_opcode(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    memory::expansion_cost(new_memory_size, current_memory_size)
}

pub fn log(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
    number_of_topics: usize,
) -> Result<u64, VMError> {
    let memory_expansion_cost = memory::expansion_cost(new_memory_size, current_memory_size)?;

    let number_of_topics: u64 = number_of_topics
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;
    let topics_cost = LOGN_DYNAMIC_BASE
        .checked_mul(number_of_topics)
        .ok_or(OutOfGas)?;

    let size: u64 = size.try_into().map_err(|_| ExceptionalHalt::VeryLargeNumber)?;
    let bytes_cost = LOGN_DYNAMIC_BYTE_BASE.checked_mul(size).ok_or(OutOfGas)?;

    topics_cost
        .checked_add(LOGN_STATIC)
        .ok_or(OutOfGas)?
        .checked_add(bytes_cost)
        .ok_or(OutOfGas)?
        .checked_add(memory_expansion_cost)
        .ok_or(OutOfGas.into())
}

/// SSTORE cost plus the refund earned, priced on the slot's current value.
pub fn sstore(current_value: U256, new_value: U256, schedule: &FeeSchedule) -> (u64, u64) {
    let cost = if current_value.is_zero() && !new_value.is_zero() {
        schedule.sstore_set_cost
    } else {
        schedule.sstore_reset_cost
    };
    let refund = if !current_value.is_zero() && new_value.is_zero() {
        schedule.sstore_clear_refund
    } else {
        0
    };
    (cost, refund)
}

pub fn selfdestruct(beneficiary_is_empty: bool, balance_is_zero: bool) -> u64 {
    if beneficiary_is_empty && !balance_is_zero {
        SELFDESTRUCT_STATIC + SELFDESTRUCT_DYNAMIC
    } else {
        SELFDESTRUCT_STATIC
    }
}

/// Cost charged to the caller of a call-family opcode and the gas limit the
/// callee receives. The forwarded amount is capped so the caller keeps
/// `1 / gas_reserve_divisor` of what remains after the upfront cost; a
/// value-bearing call hands the callee an extra stipend it does not pay for.
pub fn call(
    new_memory_size: usize,
    current_memory_size: usize,
    address_is_empty: bool,
    value: U256,
    requested_gas: U256,
    gas_left: u64,
    schedule: &FeeSchedule,
) -> Result<(u64, u64), VMError> {
    let memory_expansion_cost = memory::expansion_cost(new_memory_size, current_memory_size)?;

    let transfer_cost = if value.is_zero() {
        0
    } else {
        schedule.call_value_cost
    };
    let create_cost = if address_is_empty && !value.is_zero() {
        schedule.new_account_cost
    } else {
        0
    };

    let upfront_cost = CALL_STATIC
        .checked_add(memory_expansion_cost)
        .ok_or(OutOfGas)?
        .checked_add(transfer_cost)
        .ok_or(OutOfGas)?
        .checked_add(create_cost)
        .ok_or(OutOfGas)?;

    let available = gas_left.checked_sub(upfront_cost).ok_or(OutOfGas)?;
    let max_forwardable = schedule.max_forwardable_gas(available);
    let forwarded = match u64::try_from(requested_gas) {
        Ok(requested) => requested.min(max_forwardable),
        // A request beyond 64 bits always means "everything forwardable".
        Err(_) => max_forwardable,
    };

    let cost = upfront_cost.checked_add(forwarded).ok_or(OutOfGas)?;
    let callee_gas_limit = if value.is_zero() {
        forwarded
    } else {
        forwarded
            .checked_add(schedule.call_stipend)
            .ok_or(OutOfGas)?
    };

    Ok((cost, callee_gas_limit))
}

/// CREATE/CREATE2 cost before init code runs, and the gas forwarded to the
/// init frame (everything but the reserved fraction).
pub fn create(
    new_memory_size: usize,
    current_memory_size: usize,
    init_code_size: usize,
    hashes_init_code: bool,
    gas_left: u64,
    schedule: &FeeSchedule,
) -> Result<(u64, u64), VMError> {
    let memory_expansion_cost = memory::expansion_cost(new_memory_size, current_memory_size)?;

    let init_code_words: u64 = init_code_size
        .div_ceil(WORD_SIZE)
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;
    let mut init_code_cost = schedule
        .init_code_word_cost
        .checked_mul(init_code_words)
        .ok_or(OutOfGas)?;
    if hashes_init_code {
        // CREATE2 hashes the init code to derive the address.
        let hashing_cost = KECCAK256_DYNAMIC_BASE
            .checked_mul(init_code_words)
            .ok_or(OutOfGas)?;
        init_code_cost = init_code_cost.checked_add(hashing_cost).ok_or(OutOfGas)?;
    }

    let upfront_cost = schedule
        .create_base_cost
        .checked_add(memory_expansion_cost)
        .ok_or(OutOfGas)?
        .checked_add(init_code_cost)
        .ok_or(OutOfGas)?;

    let available = gas_left.checked_sub(upfront_cost).ok_or(OutOfGas)?;
    let forwarded = schedule.max_forwardable_gas(available);

    let cost = upfront_cost.checked_add(forwarded).ok_or(OutOfGas)?;
    Ok((cost, forwarded))
}

/// Per-byte cost of installing the code a creation frame returned.
pub fn code_deposit(code_length: usize, schedule: &FeeSchedule) -> Result<u64, VMError> {
    let code_length: u64 = code_length
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;
    schedule
        .code_deposit_cost
        .checked_mul(code_length)
        .ok_or(OutOfGas.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use ember_common::Address;

    struct FakeTx {
        create: bool,
        data: Bytes,
    }

    impl Transaction for FakeTx {
        fn to(&self) -> Option<Address> {
            (!self.create).then(Address::zero)
        }
        fn sender(&self) -> Address {
            Address::zero()
        }
        fn nonce(&self) -> u64 {
            0
        }
        fn value(&self) -> U256 {
            U256::zero()
        }
        fn data(&self) -> &Bytes {
            &self.data
        }
        fn gas_limit(&self) -> U256 {
            U256::from(1_000_000)
        }
        fn gas_price(&self) -> U256 {
            U256::one()
        }
    }

    #[test]
    fn intrinsic_gas_of_plain_transfer_is_base_cost() {
        let schedule = FeeSchedule::default();
        let tx = FakeTx {
            create: false,
            data: Bytes::new(),
        };
        assert_eq!(intrinsic_gas(&tx, &schedule).unwrap(), 21000);
    }

    #[test]
    fn intrinsic_gas_prices_zero_and_nonzero_bytes() {
        let schedule = FeeSchedule::default();
        let tx = FakeTx {
            create: false,
            data: Bytes::from(vec![0x00, 0x01, 0x00, 0xFF]),
        };
        assert_eq!(intrinsic_gas(&tx, &schedule).unwrap(), 21000 + 4 + 16 + 4 + 16);
    }

    #[test]
    fn intrinsic_gas_of_creation_adds_surcharge_and_word_cost() {
        let schedule = FeeSchedule::default();
        let tx = FakeTx {
            create: true,
            data: Bytes::from(vec![0x01; 33]),
        };
        // 33 non-zero bytes, two init code words.
        assert_eq!(
            intrinsic_gas(&tx, &schedule).unwrap(),
            21000 + 33 * 16 + 32000 + 2 * 2
        );
    }

    #[test]
    fn call_forwarding_is_capped() {
        let schedule = FeeSchedule::default();
        // After the 700 base cost, 64000 remain; the cap reserves 1/64.
        let (cost, forwarded) = call(
            0,
            0,
            false,
            U256::zero(),
            U256::MAX,
            64_700,
            &schedule,
        )
        .unwrap();
        assert_eq!(forwarded, 64_000 - 1_000);
        assert_eq!(cost, 700 + 63_000);

        // A modest request is granted in full.
        let (_, forwarded) = call(
            0,
            0,
            false,
            U256::zero(),
            U256::from(5_000),
            64_700,
            &schedule,
        )
        .unwrap();
        assert_eq!(forwarded, 5_000);
    }

    #[test]
    fn value_bearing_call_adds_stipend_for_callee_only() {
        let schedule = FeeSchedule::default();
        let (cost, callee_gas) = call(
            0,
            0,
            false,
            U256::one(),
            U256::from(1_000),
            100_000,
            &schedule,
        )
        .unwrap();
        assert_eq!(cost, 700 + 9000 + 1_000);
        assert_eq!(callee_gas, 1_000 + 2300);
    }

    #[test]
    fn sstore_pricing_and_refund() {
        let schedule = FeeSchedule::default();
        assert_eq!(sstore(U256::zero(), U256::one(), &schedule), (20000, 0));
        assert_eq!(sstore(U256::one(), U256::from(2), &schedule), (5000, 0));
        assert_eq!(sstore(U256::one(), U256::zero(), &schedule), (5000, 4800));
        assert_eq!(sstore(U256::zero(), U256::zero(), &schedule), (5000, 0));
    }
}
