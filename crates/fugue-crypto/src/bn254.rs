//! alt_bn128 arithmetic for EIP-196/197
//!
//! Points travel as big-endian 32-byte coordinates. A coordinate at or above
//! the field modulus is an error, as is a point off the curve. `(0, 0)` is
//! the point at infinity.

use crate::{CryptoError, CryptoResult};
use ark_bn254::{Bn254, Fq, Fq12, Fq2, Fr, G1Affine, G2Affine};
use ark_ec::{pairing::Pairing, CurveGroup};
use ark_ff::{BigInteger, One, PrimeField, Zero};
use std::ops::Mul;

fn field_element(bytes: &[u8]) -> CryptoResult<Fq> {
    let value = Fq::from_be_bytes_mod_order(bytes);
    // reduction changed the value => it was not canonical
    if value.into_bigint().to_bytes_be() != bytes {
        return Err(CryptoError::InvalidInput("coordinate exceeds field modulus"));
    }
    Ok(value)
}

fn g1_point(bytes: &[u8; 64]) -> CryptoResult<G1Affine> {
    let x = field_element(&bytes[..32])?;
    let y = field_element(&bytes[32..])?;
    if x.is_zero() && y.is_zero() {
        return Ok(G1Affine::identity());
    }
    let point = G1Affine::new_unchecked(x, y);
    if !point.is_on_curve() {
        return Err(CryptoError::InvalidPoint("G1 point not on curve"));
    }
    Ok(point)
}

fn g2_point(bytes: &[u8; 128]) -> CryptoResult<G2Affine> {
    // imaginary part first
    let x_im = field_element(&bytes[..32])?;
    let x_re = field_element(&bytes[32..64])?;
    let y_im = field_element(&bytes[64..96])?;
    let y_re = field_element(&bytes[96..])?;
    if x_im.is_zero() && x_re.is_zero() && y_im.is_zero() && y_re.is_zero() {
        return Ok(G2Affine::identity());
    }
    let point = G2Affine::new_unchecked(Fq2::new(x_re, x_im), Fq2::new(y_re, y_im));
    if !point.is_on_curve() {
        return Err(CryptoError::InvalidPoint("G2 point not on curve"));
    }
    if !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(CryptoError::InvalidPoint("G2 point not in subgroup"));
    }
    Ok(point)
}

fn encode_g1(point: G1Affine) -> [u8; 64] {
    let mut out = [0u8; 64];
    if point.infinity {
        return out;
    }
    out[..32].copy_from_slice(&point.x.into_bigint().to_bytes_be());
    out[32..].copy_from_slice(&point.y.into_bigint().to_bytes_be());
    out
}

/// P1 + P2
pub fn g1_add(p1: &[u8; 64], p2: &[u8; 64]) -> CryptoResult<[u8; 64]> {
    let a = g1_point(p1)?;
    let b = g1_point(p2)?;
    Ok(encode_g1((a + b).into_affine()))
}

/// s * P
pub fn g1_mul(point: &[u8; 64], scalar: &[u8; 32]) -> CryptoResult<[u8; 64]> {
    let p = g1_point(point)?;
    let s = Fr::from_be_bytes_mod_order(scalar);
    if p.infinity || s.is_zero() {
        return Ok([0u8; 64]);
    }
    Ok(encode_g1(p.mul(s).into_affine()))
}

/// Whether the product of pairings over all pairs is one
pub fn pairing_check(pairs: &[([u8; 64], [u8; 128])]) -> CryptoResult<bool> {
    let mut g1s = Vec::with_capacity(pairs.len());
    let mut g2s = Vec::with_capacity(pairs.len());
    for (g1, g2) in pairs {
        g1s.push(g1_point(g1)?);
        g2s.push(g2_point(g2)?);
    }
    if g1s.is_empty() {
        return Ok(true);
    }
    Ok(Bn254::multi_pairing(g1s, g2s).0 == Fq12::one())
}
