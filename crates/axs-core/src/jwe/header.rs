//! JOSE protected header

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TokenError};

/// Key management algorithm id
pub const ALG_PBES2_HS512_A256KW: &str = "PBES2-HS512+A256KW";

/// Content encryption algorithm id
pub const ENC_A256GCM: &str = "A256GCM";

/// Compression algorithm id (raw DEFLATE)
pub const ZIP_DEFLATE: &str = "DEF";

/// Absolute upper bound on `p2c`. Decoding is further capped by the codec's ceiling.
pub const MAX_ITERATIONS: u32 = 1_000_000;

/// RFC 7518 §4.8.1.1 minimum salt length
pub const MIN_SALT_LEN: usize = 8;

/// Shared protected header of a compact token
///
/// Authenticated as AEAD associated data but not encrypted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProtectedHeader {
    pub alg: String,
    pub enc: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// PBES2 iteration count
    pub p2c: u32,

    /// PBES2 salt input, base64url
    pub p2s: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProtectedHeader {
    pub(crate) fn new(kid: &str, p2c: u32, p2s: String) -> Self {
        Self {
            alg: ALG_PBES2_HS512_A256KW.to_string(),
            enc: ENC_A256GCM.to_string(),
            kid: Some(kid.to_string()),
            p2c,
            p2s,
            zip: None,
            extra: Map::new(),
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.zip.is_some()
    }

    /// Reject anything this codec does not implement exactly
    pub(crate) fn check_supported(&self) -> Result<()> {
        if self.alg != ALG_PBES2_HS512_A256KW {
            return Err(TokenError::MalformedToken(format!(
                "unsupported alg {:?}",
                self.alg
            )));
        }
        if self.enc != ENC_A256GCM {
            return Err(TokenError::MalformedToken(format!(
                "unsupported enc {:?}",
                self.enc
            )));
        }
        if let Some(zip) = &self.zip {
            if zip != ZIP_DEFLATE {
                return Err(TokenError::MalformedToken(format!("unsupported zip {zip:?}")));
            }
        }
        if self.extra.contains_key("crit") {
            return Err(TokenError::MalformedToken("crit header not supported".into()));
        }
        if self.p2c == 0 || self.p2c > MAX_ITERATIONS {
            return Err(TokenError::MalformedToken(format!(
                "p2c {} out of range",
                self.p2c
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> ProtectedHeader {
        ProtectedHeader::new("client-1", 1000, "c2FsdHNhbHRzYWx0c2FsdA".into())
    }

    #[test]
    fn test_header_json_shape() {
        let json = serde_json::to_value(header()).unwrap();
        assert_eq!(json["alg"], "PBES2-HS512+A256KW");
        assert_eq!(json["enc"], "A256GCM");
        assert_eq!(json["kid"], "client-1");
        assert_eq!(json["p2c"], 1000);
        assert!(json.get("zip").is_none());
    }

    #[test]
    fn test_rejects_unsupported() {
        let mut h = header();
        h.alg = "dir".into();
        assert!(h.check_supported().is_err());

        let mut h = header();
        h.enc = "A128CBC-HS256".into();
        assert!(h.check_supported().is_err());

        let mut h = header();
        h.zip = Some("GZIP".into());
        assert!(h.check_supported().is_err());

        let mut h = header();
        h.p2c = MAX_ITERATIONS + 1;
        assert!(h.check_supported().is_err());

        let mut h = header();
        h.extra.insert("crit".into(), serde_json::json!(["exp"]));
        assert!(h.check_supported().is_err());

        assert!(header().check_supported().is_ok());
    }
}
