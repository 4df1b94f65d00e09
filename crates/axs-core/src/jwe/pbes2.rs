//! PBES2-HS512+A256KW key management (RFC 7518 §4.8)
//!
//! The shared secret is stretched with PBKDF2-HMAC-SHA512 into a 256-bit
//! key-encryption key, which wraps the per-token content key with AES Key
//! Wrap (RFC 3394).

use aes_kw::KekAes256;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use zeroize::Zeroizing;

use super::header::ALG_PBES2_HS512_A256KW;
use crate::error::{Result, TokenError};

/// Length of the derived key-encryption key
pub const KEK_LEN: usize = 32;

/// A256GCM content key length
pub const CEK_LEN: usize = 32;

/// AES-KW output for a 32-byte key
pub const WRAPPED_CEK_LEN: usize = CEK_LEN + 8;

/// Derive the key-encryption key.
///
/// The PBKDF2 salt is `UTF8(alg) || 0x00 || p2s`, binding the key to the
/// algorithm identifier.
pub fn derive_kek(secret: &[u8], p2s: &[u8], p2c: u32) -> Zeroizing<[u8; KEK_LEN]> {
    let mut salt = Vec::with_capacity(ALG_PBES2_HS512_A256KW.len() + 1 + p2s.len());
    salt.extend_from_slice(ALG_PBES2_HS512_A256KW.as_bytes());
    salt.push(0);
    salt.extend_from_slice(p2s);

    let mut kek = Zeroizing::new([0u8; KEK_LEN]);
    pbkdf2_hmac::<Sha512>(secret, &salt, p2c, &mut *kek);
    kek
}

pub fn wrap_cek(kek: &[u8; KEK_LEN], cek: &[u8]) -> Result<Vec<u8>> {
    KekAes256::from(*kek)
        .wrap_vec(cek)
        .map_err(|e| TokenError::Encode(format!("key wrap failed: {e}")))
}

/// Unwrap the content key. Any failure is reported as [`TokenError::Authentication`].
pub fn unwrap_cek(kek: &[u8; KEK_LEN], wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    KekAes256::from(*kek)
        .unwrap_vec(wrapped)
        .map(Zeroizing::new)
        .map_err(|_| TokenError::Authentication)
}
