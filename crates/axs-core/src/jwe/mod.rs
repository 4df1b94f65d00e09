//! Compact JWE Token Codec
//!
//! Payment parameters travel as an RFC 7516 compact JWE:
//!
//! ```text
//! BASE64URL(header) . BASE64URL(wrapped CEK) . BASE64URL(iv) . BASE64URL(ciphertext) . BASE64URL(tag)
//! ```
//!
//! - **alg** `PBES2-HS512+A256KW`: a fresh 16-byte salt and the shared secret
//!   derive a key-encryption key that wraps a random 256-bit content key
//! - **enc** `A256GCM`: 96-bit IV, 128-bit tag, the encoded header as AAD
//!
//! The same format is produced and consumed by the payment provider, so every
//! header field and segment layout here is fixed by RFC 7516 / RFC 7518.

mod compression;
mod header;
mod pbes2;

pub use compression::{Compression, MAX_INFLATED_LEN};
pub use header::{
    ALG_PBES2_HS512_A256KW, ENC_A256GCM, MAX_ITERATIONS, MIN_SALT_LEN, ProtectedHeader,
    ZIP_DEFLATE,
};

use aes_gcm::{
    Aes256Gcm, Nonce, Tag,
    aead::{AeadInPlace, KeyInit},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{CryptoRng, RngCore, rngs::OsRng};
use serde::{Serialize, de::DeserializeOwned};
use zeroize::Zeroizing;

use crate::error::{ErrorKind, Result, TokenError};
use crate::key::KeyMaterial;
use crate::params::PaymentParams;

/// Default PBES2 iteration count
pub const DEFAULT_ITERATIONS: u32 = 1000;

/// PBES2 salt length generated for each token
pub const SALT_LEN: usize = 16;

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
const SEGMENTS: usize = 5;

/// Encodes payment parameters into compact tokens and authenticates them back
#[derive(Clone, Debug)]
pub struct TokenCodec {
    iterations: u32,
    max_decode_iterations: u32,
    compression: Compression,
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            max_decode_iterations: DEFAULT_ITERATIONS,
            compression: Compression::Disabled,
        }
    }
}

/// A decoded, authenticated token
#[derive(Clone, Debug, PartialEq)]
pub struct Decoded<T> {
    pub payload: T,
    pub header: ProtectedHeader,
}

pub type VerifiedToken = Decoded<PaymentParams>;

/// Why a token was rejected. `message` is always the generic user message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&TokenError> for Rejection {
    fn from(err: &TokenError) -> Self {
        Self {
            kind: err.kind(),
            message: err.user_message().to_string(),
        }
    }
}

/// Outcome of decoding an untrusted token
#[derive(Clone, Debug)]
pub enum CallbackResult {
    Verified(VerifiedToken),
    Rejected(Rejection),
}

impl CallbackResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CallbackResult::Verified(_))
    }

    pub fn payload(&self) -> Option<&PaymentParams> {
        match self {
            CallbackResult::Verified(v) => Some(&v.payload),
            CallbackResult::Rejected(_) => None,
        }
    }

    pub fn header(&self) -> Option<&ProtectedHeader> {
        match self {
            CallbackResult::Verified(v) => Some(&v.header),
            CallbackResult::Rejected(_) => None,
        }
    }

    pub fn into_result(self) -> std::result::Result<VerifiedToken, Rejection> {
        match self {
            CallbackResult::Verified(v) => Ok(v),
            CallbackResult::Rejected(r) => Err(r),
        }
    }
}

impl TokenCodec {
    /// Create a codec with a custom PBES2 iteration count
    ///
    /// Decoding accepts tokens up to the same count.
    pub fn new(iterations: u32) -> Result<Self> {
        if iterations == 0 || iterations > MAX_ITERATIONS {
            return Err(TokenError::InvalidParams(format!(
                "iteration count must be within 1..={MAX_ITERATIONS}, got {iterations}"
            )));
        }
        Ok(Self {
            iterations,
            max_decode_iterations: iterations,
            ..Default::default()
        })
    }

    /// Accept inbound tokens whose `p2c` is at most `max`
    ///
    /// The header is only authenticated after the key derivation, so this
    /// ceiling is what bounds the work a forged token can cause.
    pub fn with_max_decode_iterations(mut self, max: u32) -> Result<Self> {
        if max < self.iterations || max > MAX_ITERATIONS {
            return Err(TokenError::InvalidParams(format!(
                "decode iteration ceiling must be within {}..={MAX_ITERATIONS}, got {max}",
                self.iterations
            )));
        }
        self.max_decode_iterations = max;
        Ok(self)
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn max_decode_iterations(&self) -> u32 {
        self.max_decode_iterations
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Encrypt payment parameters into a compact token
    pub fn encode(&self, params: &PaymentParams, key: &KeyMaterial) -> Result<String> {
        self.encode_with_rng(params, key, &mut OsRng)
    }

    /// [`encode`](Self::encode) drawing salt, content key and IV from `rng`
    pub fn encode_with_rng<R>(
        &self,
        params: &PaymentParams,
        key: &KeyMaterial,
        rng: &mut R,
    ) -> Result<String>
    where
        R: RngCore + CryptoRng,
    {
        params.validate()?;
        let plaintext = serde_json::to_vec(params)
            .map_err(|e| TokenError::Encode(format!("payload serialization failed: {e}")))?;
        self.seal(&plaintext, key, rng)
    }

    /// Encrypt any serializable claim set, without payment-parameter validation
    pub fn encode_claims<T: Serialize>(&self, claims: &T, key: &KeyMaterial) -> Result<String> {
        let plaintext = serde_json::to_vec(claims)
            .map_err(|e| TokenError::Encode(format!("payload serialization failed: {e}")))?;
        self.seal(&plaintext, key, &mut OsRng)
    }

    /// Decode a token from an untrusted source
    ///
    /// Never fails: every error is folded into [`CallbackResult::Rejected`]
    /// with a generic message. The specific cause is only emitted at debug
    /// level.
    pub fn decode(&self, token: &str, key: &KeyMaterial) -> CallbackResult {
        match self.try_decode(token, key) {
            Ok(verified) => CallbackResult::Verified(verified),
            Err(err) => {
                tracing::debug!(kind = ?err.kind(), cause = %err, "Token rejected");
                CallbackResult::Rejected(Rejection::from(&err))
            }
        }
    }

    pub fn try_decode(&self, token: &str, key: &KeyMaterial) -> Result<VerifiedToken> {
        self.try_decode_as(token, key)
    }

    /// Authenticate, decrypt and deserialize a token into `T`
    pub fn try_decode_as<T: DeserializeOwned>(
        &self,
        token: &str,
        key: &KeyMaterial,
    ) -> Result<Decoded<T>> {
        let (header, plaintext) = open(token, key, self.max_decode_iterations)?;
        let payload = serde_json::from_slice(&plaintext)?;
        Ok(Decoded { payload, header })
    }

    fn seal<R>(&self, plaintext: &[u8], key: &KeyMaterial, rng: &mut R) -> Result<String>
    where
        R: RngCore + CryptoRng,
    {
        let mut salt = [0u8; SALT_LEN];
        rng.fill_bytes(&mut salt);
        let mut cek = Zeroizing::new([0u8; pbes2::CEK_LEN]);
        rng.fill_bytes(cek.as_mut_slice());
        let mut iv = [0u8; IV_LEN];
        rng.fill_bytes(&mut iv);

        let mut header =
            ProtectedHeader::new(key.key_id(), self.iterations, URL_SAFE_NO_PAD.encode(salt));

        let mut body = plaintext.to_vec();
        if self.compression == Compression::Deflate {
            let packed = compression::deflate(plaintext)?;
            if packed.len() < body.len() {
                body = packed;
                header.zip = Some(ZIP_DEFLATE.to_string());
            }
        }

        let header_json = serde_json::to_vec(&header)
            .map_err(|e| TokenError::Encode(format!("header serialization failed: {e}")))?;
        let header_b64 = URL_SAFE_NO_PAD.encode(header_json);

        let kek = pbes2::derive_kek(key.expose_secret(), &salt, self.iterations);
        let wrapped = pbes2::wrap_cek(&kek, cek.as_slice())?;

        let cipher = Aes256Gcm::new_from_slice(cek.as_slice())
            .map_err(|e| TokenError::Encode(format!("cipher init failed: {e}")))?;
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(&iv), header_b64.as_bytes(), &mut body)
            .map_err(|_| TokenError::Encode("content encryption failed".into()))?;

        Ok([
            header_b64,
            URL_SAFE_NO_PAD.encode(wrapped),
            URL_SAFE_NO_PAD.encode(iv),
            URL_SAFE_NO_PAD.encode(body),
            URL_SAFE_NO_PAD.encode(tag),
        ]
        .join("."))
    }
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::MalformedToken(format!("{name} segment: {e}")))
}

/// Parse, authenticate and decrypt a compact token, returning the raw plaintext
fn open(
    token: &str,
    key: &KeyMaterial,
    max_iterations: u32,
) -> Result<(ProtectedHeader, Vec<u8>)> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != SEGMENTS {
        return Err(TokenError::MalformedToken(format!(
            "expected {SEGMENTS} segments, found {}",
            segments.len()
        )));
    }
    let header_b64 = segments[0];

    let header: ProtectedHeader = serde_json::from_slice(&decode_segment(header_b64, "header")?)
        .map_err(|e| TokenError::MalformedToken(format!("header: {e}")))?;
    header.check_supported()?;
    if header.p2c > max_iterations {
        return Err(TokenError::MalformedToken(format!(
            "p2c {} exceeds the accepted {max_iterations}",
            header.p2c
        )));
    }

    let salt = decode_segment(&header.p2s, "p2s")?;
    if salt.len() < MIN_SALT_LEN {
        return Err(TokenError::MalformedToken("p2s too short".into()));
    }

    let wrapped = decode_segment(segments[1], "encrypted key")?;
    if wrapped.len() != pbes2::WRAPPED_CEK_LEN {
        return Err(TokenError::MalformedToken("encrypted key has wrong length".into()));
    }
    let iv = decode_segment(segments[2], "iv")?;
    if iv.len() != IV_LEN {
        return Err(TokenError::MalformedToken("iv has wrong length".into()));
    }
    let mut body = decode_segment(segments[3], "ciphertext")?;
    let tag = decode_segment(segments[4], "tag")?;
    if tag.len() != TAG_LEN {
        return Err(TokenError::MalformedToken("tag has wrong length".into()));
    }

    let kek = pbes2::derive_kek(key.expose_secret(), &salt, header.p2c);

    // A failed unwrap continues with a random key so that a wrong secret and a
    // forged ciphertext fail at the same point (RFC 7516 §11.5).
    let cek = match pbes2::unwrap_cek(&kek, &wrapped) {
        Ok(cek) if cek.len() == pbes2::CEK_LEN => cek,
        _ => {
            tracing::debug!("Content key unwrap failed");
            let mut random = Zeroizing::new(vec![0u8; pbes2::CEK_LEN]);
            OsRng.fill_bytes(random.as_mut_slice());
            random
        }
    };

    let cipher = Aes256Gcm::new_from_slice(cek.as_slice()).map_err(|_| TokenError::Authentication)?;
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&iv),
            header_b64.as_bytes(),
            &mut body,
            Tag::from_slice(&tag),
        )
        .map_err(|_| TokenError::Authentication)?;

    let plaintext = if header.is_compressed() {
        compression::inflate(&body)?
    } else {
        body
    };

    Ok((header, plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::MerchantRef;

    fn key() -> KeyMaterial {
        KeyMaterial::new("abc", "merchant-shared-secret")
    }

    fn params() -> PaymentParams {
        PaymentParams::new("abc", 1050, "SGD", "ORD-42")
            .with_success_url("https://shop.example/checkout/order-received/42")
            .with_fail_url("https://shop.example/checkout/order-received/42")
            .with_webhook_url("https://shop.example/wc-api/axs_checkout")
            .with_expiry(300)
    }

    // Low iteration count keeps the exhaustive tamper test fast
    fn fast_codec() -> TokenCodec {
        TokenCodec::new(10).unwrap()
    }

    fn segment_bytes(token: &str, index: usize) -> Vec<u8> {
        URL_SAFE_NO_PAD
            .decode(token.split('.').nth(index).unwrap())
            .unwrap()
    }

    #[test]
    fn test_round_trip() {
        let codec = TokenCodec::default();
        let token = codec.encode(&params(), &key()).unwrap();
        let result = codec.decode(&token, &key());

        assert!(result.is_success());
        assert_eq!(result.payload(), Some(&params()));
        let header = result.header().unwrap();
        assert_eq!(header.kid.as_deref(), Some("abc"));
        assert_eq!(header.p2c, DEFAULT_ITERATIONS);
    }

    #[test]
    fn test_numeric_merchant_ref_stays_numeric() {
        let codec = fast_codec();
        let input = PaymentParams::new("abc", 0, "SGD", 42);
        let token = codec.encode(&input, &key()).unwrap();
        let verified = codec.try_decode(&token, &key()).unwrap();

        assert_eq!(verified.payload.merchant_ref, MerchantRef::Numeric(42));
        assert_eq!(verified.payload.amount, Some(0));
    }

    #[test]
    fn test_token_layout() {
        let token = fast_codec().encode(&params(), &key()).unwrap();
        assert_eq!(token.split('.').count(), 5);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        );

        let header: serde_json::Value = serde_json::from_slice(&segment_bytes(&token, 0)).unwrap();
        assert_eq!(header["alg"], ALG_PBES2_HS512_A256KW);
        assert_eq!(header["enc"], ENC_A256GCM);
        assert_eq!(header["p2c"], 10);
        let salt = URL_SAFE_NO_PAD.decode(header["p2s"].as_str().unwrap()).unwrap();
        assert_eq!(salt.len(), SALT_LEN);

        assert_eq!(segment_bytes(&token, 1).len(), 40);
        assert_eq!(segment_bytes(&token, 2).len(), IV_LEN);
        assert_eq!(segment_bytes(&token, 4).len(), TAG_LEN);
    }

    #[test]
    fn test_every_single_character_tamper_is_rejected() {
        let codec = fast_codec();
        let token = codec.encode(&PaymentParams::new("abc", 1, "SGD", 1), &key()).unwrap();
        let bytes = token.as_bytes();

        for i in 0..bytes.len() {
            if bytes[i] == b'.' {
                continue;
            }
            let mut tampered = bytes.to_vec();
            tampered[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(tampered).unwrap();

            match codec.try_decode(&tampered, &key()) {
                Err(TokenError::Authentication | TokenError::MalformedToken(_)) => {}
                other => panic!("tamper at {i} not rejected: {other:?}"),
            }
        }
    }

    #[test]
    fn test_wrong_key_rejected() {
        let codec = fast_codec();
        let token = codec.encode(&params(), &key()).unwrap();
        let other = KeyMaterial::new("abc", "a-different-secret");

        let err = codec.try_decode(&token, &other).unwrap_err();
        assert!(matches!(err, TokenError::Authentication));

        match codec.decode(&token, &other) {
            CallbackResult::Rejected(r) => {
                assert_eq!(r.kind, ErrorKind::Authentication);
                assert_eq!(r.message, "Payment data could not be verified.");
            }
            CallbackResult::Verified(_) => panic!("decoded with wrong key"),
        }
    }

    #[test]
    fn test_encoding_is_randomized() {
        let codec = fast_codec();
        let a = codec.encode(&params(), &key()).unwrap();
        let b = codec.encode(&params(), &key()).unwrap();
        assert_ne!(a, b);
        assert_ne!(a.split('.').next(), b.split('.').next());
        assert_ne!(a.split('.').nth(2), b.split('.').nth(2));
    }

    #[test]
    fn test_unsupported_algorithm_rejected() {
        let codec = fast_codec();
        let token = codec.encode(&params(), &key()).unwrap();
        let mut header: serde_json::Value =
            serde_json::from_slice(&segment_bytes(&token, 0)).unwrap();
        header["alg"] = "PBES2-HS256+A128KW".into();

        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        parts[0] = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap());
        let forged = parts.join(".");

        assert!(matches!(
            codec.try_decode(&forged, &key()),
            Err(TokenError::MalformedToken(_))
        ));
    }

    fn forge_p2c(token: &str, p2c: u32) -> String {
        let mut header: serde_json::Value =
            serde_json::from_slice(&segment_bytes(token, 0)).unwrap();
        header["p2c"] = p2c.into();

        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        parts[0] = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap());
        parts.join(".")
    }

    #[test]
    fn test_p2c_above_configured_count_rejected() {
        let codec = fast_codec();
        let token = codec.encode(&params(), &key()).unwrap();

        assert!(matches!(
            codec.try_decode(&forge_p2c(&token, 11), &key()),
            Err(TokenError::MalformedToken(_))
        ));
        assert!(matches!(
            codec.try_decode(&forge_p2c(&token, MAX_ITERATIONS), &key()),
            Err(TokenError::MalformedToken(_))
        ));

        // Within the ceiling the forged header still fails authentication
        assert!(matches!(
            codec.try_decode(&forge_p2c(&token, 9), &key()),
            Err(TokenError::Authentication)
        ));
    }

    #[test]
    fn test_raised_decode_ceiling_accepts_higher_p2c() {
        let sender = TokenCodec::new(20).unwrap();
        let token = sender.encode(&params(), &key()).unwrap();

        assert!(matches!(
            fast_codec().try_decode(&token, &key()),
            Err(TokenError::MalformedToken(_))
        ));

        let receiver = fast_codec().with_max_decode_iterations(20).unwrap();
        assert_eq!(receiver.max_decode_iterations(), 20);
        assert_eq!(receiver.try_decode(&token, &key()).unwrap().payload, params());
    }

    #[test]
    fn test_short_salt_rejected() {
        let codec = fast_codec();
        let token = codec.encode(&params(), &key()).unwrap();
        let mut header: serde_json::Value =
            serde_json::from_slice(&segment_bytes(&token, 0)).unwrap();
        header["p2s"] = URL_SAFE_NO_PAD.encode([1u8, 2, 3]).into();

        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        parts[0] = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap());

        assert!(matches!(
            codec.try_decode(&parts.join("."), &key()),
            Err(TokenError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_garbage_is_rejected_not_panicking() {
        let codec = fast_codec();
        for input in ["", "....", "a.b", "a.b.c.d.e", "a.b.c.d.e.f", "é.ü.ß.ø.å"] {
            assert!(!codec.decode(input, &key()).is_success(), "{input:?}");
        }
    }

    #[test]
    fn test_non_json_plaintext_is_payload_error() {
        let codec = fast_codec();
        let token = codec.seal(b"not json", &key(), &mut OsRng).unwrap();
        assert!(matches!(
            codec.try_decode(&token, &key()),
            Err(TokenError::PayloadFormat(_))
        ));
    }

    #[test]
    fn test_deflate_round_trip_sets_zip_header() {
        let codec = fast_codec().with_compression(Compression::Deflate);
        let token = codec.encode(&params(), &key()).unwrap();
        let verified = codec.try_decode(&token, &key()).unwrap();

        assert_eq!(verified.header.zip.as_deref(), Some(ZIP_DEFLATE));
        assert_eq!(verified.payload, params());

        // A codec without compression still accepts compressed tokens
        assert!(fast_codec().decode(&token, &key()).is_success());
    }

    #[test]
    fn test_compression_skipped_when_not_smaller() {
        let codec = fast_codec().with_compression(Compression::Deflate);
        let token = codec.encode_claims(&serde_json::json!({"a": 1}), &key()).unwrap();
        let header: ProtectedHeader = serde_json::from_slice(&segment_bytes(&token, 0)).unwrap();
        assert!(header.zip.is_none());
    }

    #[test]
    fn test_invalid_params_not_encoded() {
        let err = fast_codec()
            .encode(&PaymentParams::new("abc", 1, "SGD", ""), &key())
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidParams(_)));
    }

    #[test]
    fn test_iteration_bounds() {
        assert!(TokenCodec::new(0).is_err());
        assert!(TokenCodec::new(MAX_ITERATIONS + 1).is_err());
        assert_eq!(TokenCodec::new(2000).unwrap().iterations(), 2000);
        assert_eq!(TokenCodec::new(2000).unwrap().max_decode_iterations(), 2000);
        assert!(fast_codec().with_max_decode_iterations(9).is_err());
        assert!(fast_codec().with_max_decode_iterations(MAX_ITERATIONS + 1).is_err());
    }
}
