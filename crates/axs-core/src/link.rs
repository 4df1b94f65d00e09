//! Payment Link Composition
//!
//! Appends an encoded token to the merchant's payment link as the `data`
//! query parameter, and pulls it back out of callback URLs.

use serde::{Serialize, Serializer};
use url::{Url, form_urlencoded};

use crate::error::{Result, TokenError};

/// Query parameter carrying the token
pub const TOKEN_PARAM: &str = "data";

/// Redirect URL with an embedded token
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentLink(Url);

impl PaymentLink {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    /// The embedded token
    pub fn token(&self) -> Option<String> {
        extract_token(self.0.as_str())
    }

    pub fn into_string(self) -> String {
        self.0.into()
    }
}

impl std::fmt::Display for PaymentLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl Serialize for PaymentLink {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.as_str())
    }
}

/// Append `data=<token>` to `base_url`.
///
/// Existing query pairs and the fragment are kept as they are.
pub fn build_link(base_url: &str, token: &str) -> Result<PaymentLink> {
    let mut url = Url::parse(base_url.trim())
        .map_err(|e| TokenError::InvalidBaseUrl(format!("{base_url:?}: {e}")))?;
    if url.cannot_be_a_base() || !url.has_host() {
        return Err(TokenError::InvalidBaseUrl(format!(
            "{base_url:?} is not a hierarchical URL"
        )));
    }

    url.query_pairs_mut().append_pair(TOKEN_PARAM, token);
    Ok(PaymentLink(url))
}

/// Find the token in a callback or return URL.
///
/// Accepts absolute URLs and bare request targets such as
/// `/wc-api/axs_checkout?data=...`. A missing query, a missing `data`
/// parameter or an empty value all yield `None`. When `data` repeats, the
/// last occurrence wins.
pub fn extract_token(url: &str) -> Option<String> {
    let query = match Url::parse(url) {
        Ok(parsed) => parsed.query().map(str::to_string),
        Err(_) => raw_query(url).map(str::to_string),
    }?;

    form_urlencoded::parse(query.as_bytes())
        .filter(|(name, _)| name == TOKEN_PARAM)
        .map(|(_, value)| value.into_owned())
        .last()
        .filter(|token| !token.is_empty())
}

fn raw_query(target: &str) -> Option<&str> {
    let (_, rest) = target.split_once('?')?;
    Some(rest.split_once('#').map_or(rest, |(query, _)| query))
}
