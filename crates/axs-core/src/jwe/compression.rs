//! Optional `zip: DEF` plaintext compression
//!
//! Compressing before encrypting leaks plaintext redundancy through the
//! ciphertext length. Only enable it when the payload holds no secrets and no
//! attacker-influenced data.

use std::io::{Read, Write};

use flate2::Compression as Level;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TokenError};

/// Inflated payloads larger than this are rejected
pub const MAX_INFLATED_LEN: u64 = 256 * 1024;

/// Plaintext compression policy for encoding
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Disabled,
    /// Raw DEFLATE, applied only when it shrinks the payload
    Deflate,
}

impl Compression {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "off" | "disabled" => Some(Compression::Disabled),
            "deflate" | "def" => Some(Compression::Deflate),
            _ => None,
        }
    }
}

pub fn deflate(plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Level::default());
    encoder
        .write_all(plaintext)
        .and_then(|()| encoder.finish())
        .map_err(|e| TokenError::Encode(format!("deflate failed: {e}")))
}

pub fn inflate(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    DeflateDecoder::new(compressed)
        .take(MAX_INFLATED_LEN + 1)
        .read_to_end(&mut out)
        .map_err(|e| TokenError::PayloadFormat(format!("inflate failed: {e}")))?;

    if out.len() as u64 > MAX_INFLATED_LEN {
        return Err(TokenError::PayloadFormat("inflated payload too large".into()));
    }
    Ok(out)
}
