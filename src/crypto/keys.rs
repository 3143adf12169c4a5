//! ECDSA key management for the blockchain
//!
//! Provides key pair generation, signing, and verification on the
//! secp256k1 curve. Signatures travel as 64-byte compact `r || s`
//! values; public keys travel in uncompressed SEC1 form (0x04 + 64
//! bytes). An output's locking script is the SHA3-256 hash of the
//! spender's uncompressed public key.

use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::sha3_256;

/// Length of an uncompressed SEC1 public key
pub const PUBLIC_KEY_LEN: usize = 65;

/// Length of a compact `r || s` signature
pub const SIGNATURE_LEN: usize = 64;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Public key must be uncompressed (0x04 + 64 bytes)")]
    InvalidPublicKey,
    #[error("Signature must be exactly {SIGNATURE_LEN} bytes (r || s)")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key = SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key in uncompressed SEC1 form (0x04 + 64 bytes)
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public_key.serialize_uncompressed().to_vec()
    }

    /// SHA3-256 hash of the uncompressed public key.
    /// This is the locking script outputs lock coins to.
    pub fn public_key_hash(&self) -> Vec<u8> {
        sha3_256(&self.public_key_bytes())
    }

    /// Sign a 32-byte message hash, returning a compact `r || s` signature
    pub fn sign(&self, message_hash: &[u8]) -> Result<Vec<u8>, KeyError> {
        let secp = Secp256k1::new();
        let message = Message::from_digest_slice(message_hash)?;
        let signature = secp.sign_ecdsa(&message, &self.secret_key);
        Ok(signature.serialize_compact().to_vec())
    }
}

/// Parse an uncompressed SEC1 public key, rejecting malformed or
/// off-curve points
pub fn public_key_from_slice(bytes: &[u8]) -> Result<PublicKey, KeyError> {
    if bytes.len() != PUBLIC_KEY_LEN || bytes[0] != 0x04 {
        return Err(KeyError::InvalidPublicKey);
    }
    PublicKey::from_slice(bytes).map_err(|_| KeyError::InvalidPublicKey)
}

/// Verify a compact `r || s` signature against a public key and a
/// 32-byte message hash
pub fn verify_signature(
    public_key: &PublicKey,
    message_hash: &[u8],
    signature: &[u8],
) -> Result<bool, KeyError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(KeyError::InvalidSignature);
    }

    let secp = Secp256k1::new();
    let message = Message::from_digest_slice(message_hash)?;
    let sig = secp256k1::ecdsa::Signature::from_compact(signature)
        .map_err(|_| KeyError::InvalidSignature)?;

    Ok(secp.verify_ecdsa(&message, &sig, public_key).is_ok())
}
