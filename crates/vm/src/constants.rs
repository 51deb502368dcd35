use ember_common::U256;

pub const WORD_SIZE: usize = 32;
pub const WORD_SIZE_IN_BYTES_USIZE: usize = 32;
pub const WORD_SIZE_IN_BYTES_U64: u64 = 32;

/// Word pushed by a call/create opcode on success.
pub const SUCCESS: U256 = U256::one();
/// Word pushed by a call/create opcode on failure.
pub const FAIL: U256 = U256::zero();

pub const STACK_LIMIT: usize = 1024;

pub const MEMORY_EXPANSION_QUOTIENT: u64 = 512;

// Transaction costs in gas, defaults for `FeeSchedule`.
pub const TX_BASE_COST: u64 = 21000;
pub const TX_DATA_COST_PER_ZERO_BYTE: u64 = 4;
pub const TX_DATA_COST_PER_NON_ZERO_BYTE: u64 = 16;
pub const TX_CREATE_COST: u64 = 32000;

pub const MAX_CODE_SIZE: usize = 0x6000;
pub const INIT_CODE_MAX_SIZE: usize = 49152;

/// Deployed code may not start with this byte; the prefix is reserved.
pub const UNSUPPORTED_CODE_PREFIX: u8 = 0xef;

/// How far back BLOCKHASH can see.
pub const LAST_AVAILABLE_BLOCK_LIMIT: U256 = U256([256, 0, 0, 0]);
