//! # axs-core
//!
//! Encrypted, tamper-evident payment-link tokens for AXS Checkout.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐   encode   ┌─────────────┐  build_link  ┌──────────────────────────┐
//! │ PaymentParams │──────────▶│ TokenCodec  │────────────▶│ merchant_link?data=<jwe> │
//! └───────────────┘            └─────────────┘              └──────────────────────────┘
//!         ▲                           │                                  │
//!         │         decode            │         extract_token            │
//!         └───────────────────────────┴──────────────────────────────────┘
//! ```
//!
//! Tokens are compact JWEs using `PBES2-HS512+A256KW` key management and
//! `A256GCM` content encryption, keyed by the merchant's shared secret.
//! Every call draws fresh randomness; nothing is cached or shared between
//! calls.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use axs_core::{build_link, extract_token, KeyMaterial, PaymentParams, TokenCodec};
//!
//! let key = KeyMaterial::new("client-id", "shared-secret");
//! let codec = TokenCodec::default();
//!
//! let params = PaymentParams::new("client-id", 1050, "SGD", 42).with_expiry(300);
//! let link = build_link("https://pay.example/checkout", &codec.encode(&params, &key)?)?;
//!
//! // Later, on the webhook:
//! if let Some(token) = extract_token(request_url) {
//!     let result = codec.decode(&token, &key);
//! }
//! ```

pub mod error;
pub mod jwe;
pub mod key;
pub mod link;
pub mod params;

pub use error::{ErrorKind, Result, TokenError};
pub use jwe::{CallbackResult, Compression, ProtectedHeader, Rejection, TokenCodec, VerifiedToken};
pub use key::KeyMaterial;
pub use link::{PaymentLink, build_link, extract_token};
pub use params::{MerchantRef, PaymentParams, PaymentStatus};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_to_callback_flow() {
        let key = KeyMaterial::new("abc", "s3cr3t-shared-with-axs");
        let codec = TokenCodec::default();
        let params = PaymentParams::new("abc", 1050, "SGD", "ORD-42").with_expiry(300);

        let token = codec.encode(&params, &key).unwrap();
        let link = build_link("https://pay.axs.example/checkout", &token).unwrap();

        assert_eq!(link.url().scheme(), "https");
        assert_eq!(link.url().host_str(), Some("pay.axs.example"));
        assert_eq!(link.url().path(), "/checkout");

        let extracted = extract_token(link.as_str()).unwrap();
        assert!(!extracted.is_empty());
        assert_eq!(extracted, token);

        let result = codec.decode(&extracted, &key);
        assert_eq!(result.payload(), Some(&params));
    }
}
