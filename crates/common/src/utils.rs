use ethereum_types::{Address, H256, U256};

pub use keccak_hash::keccak;

/// Converts a U256 to an H256 through its big endian representation.
#[inline(always)]
pub fn u256_to_h256(value: U256) -> H256 {
    H256(value.to_big_endian())
}

/// Converts an H256 to a U256, interpreting the hash as a big endian number.
#[inline(always)]
pub fn h256_to_u256(value: H256) -> U256 {
    U256::from_big_endian(value.as_bytes())
}

/// Widens a 20-byte address into a 256-bit word (right-aligned).
#[inline(always)]
pub fn address_to_word(address: Address) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

/// Truncates a 256-bit word to its low 20 bytes, the address encoding used
/// on the interpreter stack.
#[inline(always)]
pub fn word_to_address(word: U256) -> Address {
    Address::from_slice(&word.to_big_endian()[12..])
}
