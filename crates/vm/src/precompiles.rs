//! Native contracts bound to fixed addresses. The set is consensus-critical
//! and closed: dispatch is a table lookup, never dynamic registration. From
//! the dispatcher's point of view a precompile behaves exactly like a call
//! frame that can succeed or halt.

use crate::errors::{ExceptionalHalt, InternalError, VMError};
use crate::gas_cost::{
    self, ECRECOVER_COST, IDENTITY_DYNAMIC_BASE, IDENTITY_STATIC_COST, RIPEMD_160_DYNAMIC_BASE,
    RIPEMD_160_STATIC_COST, SHA2_256_DYNAMIC_BASE, SHA2_256_STATIC_COST,
};
use bytes::Bytes;
use ember_common::utils::keccak;
use ember_common::{Address, H160};
use ripemd::Ripemd160;
use sha2::{Digest as _, Sha256};

pub struct Precompile {
    pub address: H160,
    pub name: &'static str,
}

pub const ECRECOVER: Precompile = Precompile {
    address: H160([
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x01,
    ]),
    name: "ECREC",
};

pub const SHA2_256: Precompile = Precompile {
    address: H160([
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x02,
    ]),
    name: "SHA256",
};

pub const RIPEMD_160: Precompile = Precompile {
    address: H160([
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x03,
    ]),
    name: "RIPEMD160",
};

pub const IDENTITY: Precompile = Precompile {
    address: H160([
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x04,
    ]),
    name: "ID",
};

pub const PRECOMPILES: [Precompile; 4] = [ECRECOVER, SHA2_256, RIPEMD_160, IDENTITY];

pub fn is_precompile(address: &Address) -> bool {
    PRECOMPILES.iter().any(|precompile| precompile.address == *address)
}

/// Runs the precompile bound to `address` with `gas_limit` to spend. Returns
/// the output and the gas actually consumed; insufficient gas is an
/// out-of-gas halt for the virtual frame, exactly as for bytecode.
pub fn execute_precompile(
    address: Address,
    calldata: &Bytes,
    gas_limit: u64,
) -> Result<(Bytes, u64), VMError> {
    if address == ECRECOVER.address {
        ecrecover(calldata, gas_limit)
    } else if address == SHA2_256.address {
        sha2_256(calldata, gas_limit)
    } else if address == RIPEMD_160.address {
        ripemd_160(calldata, gas_limit)
    } else if address == IDENTITY.address {
        identity(calldata, gas_limit)
    } else {
        Err(InternalError::Custom("dispatched a non-precompile address").into())
    }
}

fn charge(gas_cost: u64, gas_limit: u64) -> Result<u64, VMError> {
    if gas_cost > gas_limit {
        return Err(ExceptionalHalt::OutOfGas.into());
    }
    Ok(gas_cost)
}

/// Reads a 32-byte field of the conventionally 128-byte ecrecover input,
/// zero-padded past the end of the actual call data.
fn ecrecover_field(calldata: &Bytes, offset: usize) -> [u8; 32] {
    let mut field = [0u8; 32];
    for (i, byte) in field.iter_mut().enumerate() {
        *byte = calldata.get(offset + i).copied().unwrap_or(0);
    }
    field
}

/// Secp256k1 public key recovery. Consensus semantics: a malformed or
/// unrecoverable signature is not a failure, it returns empty output with
/// the gas still consumed.
fn ecrecover(calldata: &Bytes, gas_limit: u64) -> Result<(Bytes, u64), VMError> {
    let gas_cost = charge(ECRECOVER_COST, gas_limit)?;

    let hash = ecrecover_field(calldata, 0);
    let v = ecrecover_field(calldata, 32);
    let mut signature = [0u8; 64];
    signature[..32].copy_from_slice(&ecrecover_field(calldata, 64));
    signature[32..].copy_from_slice(&ecrecover_field(calldata, 96));

    // v is 27 or 28, left-padded with zeros.
    if v[..31].iter().any(|byte| *byte != 0) || (v[31] != 27 && v[31] != 28) {
        return Ok((Bytes::new(), gas_cost));
    }

    let Ok(recovery_id) = secp256k1::ecdsa::RecoveryId::try_from(i32::from(v[31]) - 27) else {
        return Ok((Bytes::new(), gas_cost));
    };
    let Ok(recoverable_sig) =
        secp256k1::ecdsa::RecoverableSignature::from_compact(&signature, recovery_id)
    else {
        return Ok((Bytes::new(), gas_cost));
    };
    let message = secp256k1::Message::from_digest(hash);
    let Ok(public_key) = recoverable_sig.recover(&message) else {
        return Ok((Bytes::new(), gas_cost));
    };

    let public_key_hash = keccak(&public_key.serialize_uncompressed()[1..]);
    let mut output = [0u8; 32];
    output[12..].copy_from_slice(&public_key_hash.as_bytes()[12..]);

    Ok((Bytes::copy_from_slice(&output), gas_cost))
}

fn sha2_256(calldata: &Bytes, gas_limit: u64) -> Result<(Bytes, u64), VMError> {
    let gas_cost = charge(
        gas_cost::precompile(calldata.len(), SHA2_256_STATIC_COST, SHA2_256_DYNAMIC_BASE)?,
        gas_limit,
    )?;

    let digest = Sha256::digest(calldata);
    Ok((Bytes::copy_from_slice(&digest), gas_cost))
}

fn ripemd_160(calldata: &Bytes, gas_limit: u64) -> Result<(Bytes, u64), VMError> {
    let gas_cost = charge(
        gas_cost::precompile(calldata.len(), RIPEMD_160_STATIC_COST, RIPEMD_160_DYNAMIC_BASE)?,
        gas_limit,
    )?;

    // The 20-byte digest is returned left-padded to a word.
    let digest = Ripemd160::digest(calldata);
    let mut output = [0u8; 32];
    output[12..].copy_from_slice(&digest);
    Ok((Bytes::copy_from_slice(&output), gas_cost))
}

fn identity(calldata: &Bytes, gas_limit: u64) -> Result<(Bytes, u64), VMError> {
    let gas_cost = charge(
        gas_cost::precompile(calldata.len(), IDENTITY_STATIC_COST, IDENTITY_DYNAMIC_BASE)?,
        gas_limit,
    )?;

    Ok((calldata.clone(), gas_cost))
}
