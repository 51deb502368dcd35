//! Deterministic contract address derivation.

use crate::utils::keccak;
use ethereum_types::{Address, H256, U256};

/// Address of a contract created with CREATE (or a creation transaction):
/// `keccak(rlp([sender, nonce]))[12..]`.
///
/// The payload is at most 30 bytes, so the single-byte short-list RLP header
/// always applies.
pub fn calculate_create_address(sender: Address, nonce: u64) -> Address {
    let mut payload: Vec<u8> = Vec::with_capacity(30);
    payload.push(0x80 + 20);
    payload.extend_from_slice(sender.as_bytes());
    if nonce == 0 {
        payload.push(0x80);
    } else if nonce < 0x80 {
        payload.push(nonce.to_be_bytes()[7]);
    } else {
        let bytes = nonce.to_be_bytes();
        let first = bytes.iter().position(|byte| *byte != 0).unwrap_or(7);
        let bytes = &bytes[first..];
        payload.push(0x80 + bytes.len().to_be_bytes()[7]);
        payload.extend_from_slice(bytes);
    }

    let mut encoded: Vec<u8> = Vec::with_capacity(payload.len() + 1);
    encoded.push(0xc0 + payload.len().to_be_bytes()[7]);
    encoded.extend_from_slice(&payload);

    Address::from_slice(&keccak(&encoded).as_bytes()[12..])
}

/// Address of a contract created with CREATE2:
/// `keccak(0xff ++ sender ++ salt ++ keccak(init_code))[12..]`.
pub fn calculate_create2_address(sender: Address, salt: U256, init_code_hash: H256) -> Address {
    let mut preimage: Vec<u8> = Vec::with_capacity(1 + 20 + 32 + 32);
    preimage.push(0xff);
    preimage.extend_from_slice(sender.as_bytes());
    preimage.extend_from_slice(&salt.to_big_endian());
    preimage.extend_from_slice(init_code_hash.as_bytes());

    Address::from_slice(&keccak(&preimage).as_bytes()[12..])
}
