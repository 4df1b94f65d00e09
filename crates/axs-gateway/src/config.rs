//! Gateway Configuration
//!
//! Test and live credential sets are both configured; `test_mode` picks one.
//! Handlers never look at the flag themselves: they ask for
//! [`ActiveCredentials`] once per request.

use axs_core::{Compression, KeyMaterial, TokenCodec};
use serde::Serialize;

use crate::error::{GatewayError, Result};

/// Default link lifetime sent to the provider (5 minutes)
pub const DEFAULT_PAYMENT_EXPIRY_SECS: u64 = 300;

/// Merchant link, client id and shared secret for one mode
#[derive(Clone, Default)]
pub struct ModeCredentials {
    pub merchant_link: String,
    pub client_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for ModeCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeCredentials")
            .field("merchant_link", &self.merchant_link)
            .field("client_key", &self.client_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Credentials resolved for the current mode
#[derive(Clone, Debug)]
pub struct ActiveCredentials {
    pub merchant_link: String,
    pub key: KeyMaterial,
    pub test_mode: bool,
}

impl ActiveCredentials {
    pub fn client_id(&self) -> &str {
        self.key.key_id()
    }
}

/// Gateway settings
#[derive(Clone, Debug)]
pub struct GatewaySettings {
    pub enabled: bool,
    pub test_mode: bool,
    pub test: ModeCredentials,
    pub live: ModeCredentials,

    /// PBES2 iteration count for outbound tokens
    pub iterations: u32,

    /// Highest `p2c` accepted on inbound tokens; `None` means `iterations`
    pub max_decode_iterations: Option<u32>,

    pub compression: Compression,

    /// Public origin of this shop, used for return and webhook URLs
    pub public_base_url: String,

    pub payment_expiry_secs: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            test_mode: false,
            test: ModeCredentials::default(),
            live: ModeCredentials::default(),
            iterations: axs_core::jwe::DEFAULT_ITERATIONS,
            max_decode_iterations: None,
            compression: Compression::Disabled,
            public_base_url: "http://localhost:3000".into(),
            payment_expiry_secs: DEFAULT_PAYMENT_EXPIRY_SECS,
        }
    }
}

/// Non-secret view of the settings for status endpoints
#[derive(Clone, Debug, Serialize)]
pub struct SettingsSummary {
    pub enabled: bool,
    pub test_mode: bool,
    pub configured: bool,
}

impl GatewaySettings {
    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).unwrap_or_default();
        let defaults = Self::default();

        let iterations = match lookup("AXS_KDF_ITERATIONS") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                GatewayError::Config(format!("AXS_KDF_ITERATIONS is not a number: {raw}"))
            })?,
            None => defaults.iterations,
        };

        let max_decode_iterations = match lookup("AXS_KDF_MAX_ITERATIONS") {
            Some(raw) => Some(raw.trim().parse().map_err(|_| {
                GatewayError::Config(format!("AXS_KDF_MAX_ITERATIONS is not a number: {raw}"))
            })?),
            None => None,
        };

        let compression = match lookup("AXS_COMPRESSION") {
            Some(raw) => Compression::from_str(&raw).ok_or_else(|| {
                GatewayError::Config(format!("AXS_COMPRESSION must be none or deflate, got {raw}"))
            })?,
            None => defaults.compression,
        };

        let payment_expiry_secs = match lookup("AXS_PAYMENT_EXPIRY") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                GatewayError::Config(format!("AXS_PAYMENT_EXPIRY is not a number: {raw}"))
            })?,
            None => defaults.payment_expiry_secs,
        };

        let public_base_url = lookup("AXS_PUBLIC_BASE_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.public_base_url);

        let settings = Self {
            enabled: parse_flag(&var("AXS_ENABLED")),
            test_mode: parse_flag(&var("AXS_TEST_MODE")),
            test: ModeCredentials {
                merchant_link: var("AXS_TEST_MERCHANT_LINK"),
                client_key: var("AXS_TEST_CLIENT_KEY"),
                secret_key: var("AXS_TEST_SECRET_KEY"),
            },
            live: ModeCredentials {
                merchant_link: var("AXS_MERCHANT_LINK"),
                client_key: var("AXS_CLIENT_KEY"),
                secret_key: var("AXS_SECRET_KEY"),
            },
            iterations,
            max_decode_iterations,
            compression,
            public_base_url,
            payment_expiry_secs,
        };

        // Surface a bad iteration count at startup rather than on first checkout
        settings.codec()?;
        Ok(settings)
    }

    /// Credential set selected by `test_mode`
    pub fn mode_credentials(&self) -> &ModeCredentials {
        if self.test_mode { &self.test } else { &self.live }
    }

    /// Resolve and validate the credentials for the active mode
    pub fn active_credentials(&self) -> Result<ActiveCredentials> {
        let creds = self.mode_credentials();

        if creds.merchant_link.is_empty() {
            return Err(GatewayError::Config(
                "Sandbox/Production Merchant link is not set up! Please set up in the payment option page.".into(),
            ));
        }
        if creds.client_key.is_empty() {
            return Err(GatewayError::Config(
                "Sandbox/Production Client key is not set up! Please set up in the payment option page.".into(),
            ));
        }
        if creds.secret_key.is_empty() {
            return Err(GatewayError::Config(
                "Sandbox/Production Secret key is not set up! Please set up in the payment option page.".into(),
            ));
        }

        Ok(ActiveCredentials {
            merchant_link: creds.merchant_link.clone(),
            key: KeyMaterial::new(creds.client_key.clone(), creds.secret_key.as_bytes()),
            test_mode: self.test_mode,
        })
    }

    /// Token codec for the configured iteration counts and compression policy
    pub fn codec(&self) -> Result<TokenCodec> {
        let mut codec = TokenCodec::new(self.iterations)?.with_compression(self.compression);
        if let Some(max) = self.max_decode_iterations {
            codec = codec.with_max_decode_iterations(max)?;
        }
        Ok(codec)
    }

    pub fn webhook_url(&self) -> String {
        format!("{}/wc-api/axs_checkout", self.public_base_url)
    }

    pub fn order_received_url(&self, order_id: u64) -> String {
        format!("{}/checkout/order-received/{order_id}", self.public_base_url)
    }

    pub fn summary(&self) -> SettingsSummary {
        SettingsSummary {
            enabled: self.enabled,
            test_mode: self.test_mode,
            configured: self.active_credentials().is_ok(),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "yes" | "true" | "1" | "on"
    )
}
