//! EIP-8004 Configuration
//!
//! Admission cost, validation expiry and response encoding for one registry deployment.

use ethers::types::U256;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::types::{ExpiryBoundary, ResponseScheme};

/// Blocks after creation during which a validation request can be answered
pub const DEFAULT_EXPIRATION_WINDOW: u64 = 1000;

/// Per-caller registration cap over a sliding height window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_registrations: u32,
    pub window: u64,
}

impl RateLimitConfig {
    pub fn new(max_registrations: u32, window: u64) -> Result<Self, String> {
        if max_registrations == 0 || window == 0 {
            return Err("rate limit max and window must be positive".to_string());
        }
        Ok(Self {
            max_registrations,
            window,
        })
    }
}

impl FromStr for RateLimitConfig {
    type Err = String;

    /// Parses "max/window", e.g. "3/100"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (max, window) = s
            .split_once('/')
            .ok_or_else(|| format!("expected <max>/<window>, got '{}'", s))?;
        let max_registrations = max
            .trim()
            .parse()
            .map_err(|e| format!("bad max '{}': {}", max, e))?;
        let window = window
            .trim()
            .parse()
            .map_err(|e| format!("bad window '{}': {}", window, e))?;
        Self::new(max_registrations, window)
    }
}

/// EIP-8004 registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Value (wei) that must accompany `new_agent`. Retained, never refunded.
    pub registration_fee: U256,
    /// Validation expiry window in blocks
    pub expiration_window: u64,
    pub expiry_boundary: ExpiryBoundary,
    pub response_scheme: ResponseScheme,
    /// Optional registration throttle on top of the fee
    pub rate_limit: Option<RateLimitConfig>,
}

impl RegistryConfig {
    /// Load from environment or use defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparsable values fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(fee) = lookup("AGENT_TRUST_REGISTRATION_FEE") {
            match U256::from_dec_str(fee.trim()) {
                Ok(fee) => config.registration_fee = fee,
                Err(e) => log::warn!("[Config] Ignoring AGENT_TRUST_REGISTRATION_FEE '{}': {}", fee, e),
            }
        }
        if let Some(window) = lookup("AGENT_TRUST_EXPIRATION_WINDOW").and_then(|s| s.trim().parse().ok()) {
            config.expiration_window = window;
        }
        if let Some(boundary) = lookup("AGENT_TRUST_EXPIRY_BOUNDARY").and_then(|s| s.trim().parse().ok()) {
            config.expiry_boundary = boundary;
        }
        if let Some(scheme) = lookup("AGENT_TRUST_RESPONSE_SCHEME").and_then(|s| s.trim().parse().ok()) {
            config.response_scheme = scheme;
        }
        if let Some(limit) = lookup("AGENT_TRUST_RATE_LIMIT") {
            match limit.parse::<RateLimitConfig>() {
                Ok(limit) => config.rate_limit = Some(limit),
                Err(e) => log::warn!("[Config] Ignoring AGENT_TRUST_RATE_LIMIT: {}", e),
            }
        }

        config
    }

    pub fn with_registration_fee(mut self, fee: U256) -> Self {
        self.registration_fee = fee;
        self
    }

    pub fn with_expiration_window(mut self, window: u64) -> Self {
        self.expiration_window = window;
        self
    }

    pub fn with_expiry_boundary(mut self, boundary: ExpiryBoundary) -> Self {
        self.expiry_boundary = boundary;
        self
    }

    pub fn with_response_scheme(mut self, scheme: ResponseScheme) -> Self {
        self.response_scheme = scheme;
        self
    }

    /// Zero bounds are refused and leave the current limit in place
    pub fn with_rate_limit(mut self, max_registrations: u32, window: u64) -> Self {
        match RateLimitConfig::new(max_registrations, window) {
            Ok(limit) => self.rate_limit = Some(limit),
            Err(e) => log::warn!("[Config] Ignoring rate limit {}/{}: {}", max_registrations, window, e),
        }
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            registration_fee: U256::zero(),
            expiration_window: DEFAULT_EXPIRATION_WINDOW,
            expiry_boundary: ExpiryBoundary::Inclusive,
            response_scheme: ResponseScheme::Scored,
            rate_limit: None,
        }
    }
}
