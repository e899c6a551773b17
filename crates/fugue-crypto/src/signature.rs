//! secp256k1 recovery and signing
//!
//! The EVM only ever recovers: ECRECOVER takes `(hash, v, r, s)` and hands
//! back an address. Signing is kept for deriving fixture senders and for
//! building recoverable inputs in tests.

use crate::{keccak256, CryptoError, CryptoResult};
use fugue_primitives::{Address, H256};
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use std::cmp::Ordering;

/// n/2 of the secp256k1 group
const SECP256K1_N_DIV_2: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

/// secp256k1 group order n
const SECP256K1_N: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// Recoverable signature as the EVM sees it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// r component
    pub r: [u8; 32],
    /// s component
    pub s: [u8; 32],
    /// Recovery id, 27 or 28
    pub v: u8,
}

impl Signature {
    /// `r || s` as a 64-byte compact signature
    pub fn compact(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        bytes
    }

    /// Recovery id in the 0/1 form
    pub fn recovery_id(&self) -> u8 {
        self.v.saturating_sub(27)
    }

    /// Whether `s <= n/2`
    pub fn is_low_s(&self) -> bool {
        self.s.cmp(&SECP256K1_N_DIV_2) != Ordering::Greater
    }
}

/// n - s, for mirroring a high-s signature into the lower half
fn subtract_from_n(s: &[u8; 32]) -> [u8; 32] {
    let mut result = [0u8; 32];
    let mut borrow: u16 = 0;
    for i in (0..32).rev() {
        let diff = (SECP256K1_N[i] as u16)
            .wrapping_sub(s[i] as u16)
            .wrapping_sub(borrow);
        result[i] = diff as u8;
        borrow = u16::from(diff > 255);
    }
    result
}

/// Sign a 32-byte digest, normalising to low-s
pub fn sign(message_hash: &H256, secret: &[u8; 32]) -> CryptoResult<Signature> {
    let key = SigningKey::from_slice(secret).map_err(|_| CryptoError::InvalidPrivateKey)?;
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(message_hash.as_bytes())
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

    let r: [u8; 32] = signature.r().to_bytes().into();
    let mut s: [u8; 32] = signature.s().to_bytes().into();
    let mut recid = recovery_id.to_byte();
    if s.cmp(&SECP256K1_N_DIV_2) == Ordering::Greater {
        s = subtract_from_n(&s);
        recid ^= 1;
    }

    Ok(Signature { r, s, v: recid + 27 })
}

/// Recover the public key behind a compact signature.
///
/// High-s signatures are accepted: ECRECOVER predates EIP-2, so `s` is
/// mirrored into the lower half (flipping the parity bit) before recovery.
pub fn recover_public_key(
    message_hash: &[u8; 32],
    compact: &[u8; 64],
    recid: u8,
) -> CryptoResult<VerifyingKey> {
    if recid > 1 {
        return Err(CryptoError::InvalidRecoveryId(recid));
    }
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&compact[..32]);
    s.copy_from_slice(&compact[32..]);

    let mut parity = recid;
    if s.cmp(&SECP256K1_N_DIV_2) == Ordering::Greater {
        s = subtract_from_n(&s);
        parity ^= 1;
    }

    let signature = K256Signature::from_scalars(k256::FieldBytes::from(r), k256::FieldBytes::from(s))
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
    let recovery_id =
        RecoveryId::try_from(parity).map_err(|_| CryptoError::InvalidRecoveryId(parity))?;

    VerifyingKey::recover_from_prehash(message_hash, &signature, recovery_id)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))
}

/// Address of an uncompressed public key: last 20 bytes of its keccak
pub fn public_key_to_address(public_key: &VerifyingKey) -> Address {
    let encoded = public_key.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Address::from_bytes(bytes)
}

/// Address controlled by a raw secret key
pub fn private_key_to_address(secret: &[u8; 32]) -> CryptoResult<Address> {
    let key = SigningKey::from_slice(secret).map_err(|_| CryptoError::InvalidPrivateKey)?;
    Ok(public_key_to_address(key.verifying_key()))
}
