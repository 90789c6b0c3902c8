//! # Canonical Channel State
//!
//! The signed message for a channel state is
//! `keccak256(uint256 nonce || uint256 balanceA || uint256 balanceB)`,
//! wrapped as an Ethereum personal message:
//! `keccak256("\x19Ethereum Signed Message:\n32" || stateHash)`.
//!
//! Signatures are 65-byte `r || s || v` with `v` in {27, 28}.

use super::errors::ChannelError;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};
use shared_types::{Address, Amount, StateSignature};

pub type Hash = [u8; 32];

const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

fn word(value: Amount) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

/// Hash of the ABI-packed `(nonce, balance_a, balance_b)` tuple.
pub fn state_hash(nonce: u64, balance_a: Amount, balance_b: Amount) -> Hash {
    let mut packed = [0u8; 96];
    packed[..32].copy_from_slice(&word(Amount::from(nonce)));
    packed[32..64].copy_from_slice(&word(balance_a));
    packed[64..].copy_from_slice(&word(balance_b));
    keccak256(&packed)
}

/// Digest actually signed: the personal-message hash of [`state_hash`].
pub fn signing_digest(nonce: u64, balance_a: Amount, balance_b: Amount) -> Hash {
    let mut message = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + 32);
    message.extend_from_slice(PERSONAL_MESSAGE_PREFIX);
    message.extend_from_slice(&state_hash(nonce, balance_a, balance_b));
    keccak256(&message)
}

/// Ethereum-style address of a public key.
pub fn address_from_key(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 uncompressed-point tag.
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    Address::new(address)
}

/// Recover the address that signed `(nonce, balance_a, balance_b)`.
pub fn recover_state_signer(
    nonce: u64,
    balance_a: Amount,
    balance_b: Amount,
    signature: &StateSignature,
) -> Result<Address, ChannelError> {
    let bytes = signature.as_bytes();
    let recovery_id = match bytes[64] {
        0 | 27 => 0,
        1 | 28 => 1,
        v => return Err(ChannelError::Signing(format!("invalid recovery id {v}"))),
    };
    let recovery_id = RecoveryId::try_from(recovery_id)
        .map_err(|e| ChannelError::Signing(e.to_string()))?;
    let sig =
        Signature::from_slice(&bytes[..64]).map_err(|e| ChannelError::Signing(e.to_string()))?;

    let digest = signing_digest(nonce, balance_a, balance_b);
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|e| ChannelError::Signing(e.to_string()))?;
    Ok(address_from_key(&key))
}
