//! Merchant Key Material

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Shared secret plus the merchant's key identifier (`kid`)
///
/// The secret is used as the PBES2 password exactly as configured, so both
/// sides of the integration must hold the same byte string. It is wiped on
/// drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    #[zeroize(skip)]
    key_id: String,
    secret: Vec<u8>,
}

impl KeyMaterial {
    pub fn new(key_id: impl Into<String>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            key_id: key_id.into(),
            secret: secret.into(),
        }
    }

    /// Client / merchant ID written to the token's `kid` header
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Raw secret bytes. Callers must not log or persist them.
    pub fn expose_secret(&self) -> &[u8] {
        &self.secret
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}
