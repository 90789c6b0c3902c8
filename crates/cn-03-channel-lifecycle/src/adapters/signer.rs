//! Local secp256k1 key signer.

use crate::domain::signature::{address_from_key, signing_digest};
use crate::domain::ChannelError;
use crate::ports::StateSigner;
use k256::ecdsa::SigningKey;
use shared_types::{Address, Amount, StateSignature};
use std::fmt;

/// Signs channel states with an in-process key.
pub struct LocalKeySigner {
    key: SigningKey,
    address: Address,
}

impl LocalKeySigner {
    pub fn new(key: SigningKey) -> Self {
        let address = address_from_key(key.verifying_key());
        Self { key, address }
    }

    /// Fresh random key.
    pub fn random() -> Self {
        Self::new(SigningKey::random(&mut rand::thread_rng()))
    }

    /// Key from a 32-byte hex secret, `0x` prefix optional.
    pub fn from_hex(secret: &str) -> Result<Self, ChannelError> {
        let trimmed = secret.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits)
            .map_err(|e| ChannelError::Validation(format!("secret key: {e}")))?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|_| ChannelError::Validation("secret key: not a valid secp256k1 scalar".into()))?;
        Ok(Self::new(key))
    }
}

impl fmt::Debug for LocalKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKeySigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl StateSigner for LocalKeySigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_state(
        &self,
        nonce: u64,
        balance_a: Amount,
        balance_b: Amount,
    ) -> Result<StateSignature, ChannelError> {
        let digest = signing_digest(nonce, balance_a, balance_b);
        let (sig, recovery_id) = self
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| ChannelError::Signing(e.to_string()))?;

        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&sig.to_bytes());
        bytes[64] = recovery_id.to_byte() + 27;
        Ok(StateSignature(bytes))
    }
}
