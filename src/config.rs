//! Transport configuration.
//!
//! [`TransportConfig`] gathers the tunables of the handshake and the message
//! pipeline. It deserializes from any serde format with every field optional,
//! and can be adjusted from the environment:
//!
//! - `RBIT_ENCRYPTION_POLICY`: `require_plaintext`, `prefer_plaintext`,
//!   `prefer_encrypted` or `require_encrypted`
//! - `RBIT_HANDSHAKE_TIMEOUT_SECS`: per-step handshake read deadline
//!
//! # Examples
//!
//! ```
//! use rbit_transport::{EncryptionPolicy, TransportConfig};
//!
//! let config = TransportConfig {
//!     encryption_policy: EncryptionPolicy::RequireEncrypted,
//!     ..TransportConfig::default()
//! };
//! assert_eq!(config.handshake_timeout().as_secs(), 30);
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::constants::{
    INBOUND_BUFFER_SIZE, MAX_MESSAGE_SIZE, MSE_MAX_PADDING, MSE_READ_TIMEOUT,
    OUTBOUND_BUFFER_SIZE,
};
use crate::mse::EncryptionPolicy;

/// Configuration shared by the handshake negotiator and peer transports.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    /// Local encryption policy used during negotiation.
    pub encryption_policy: EncryptionPolicy,
    /// Deadline in seconds for each handshake read step.
    pub handshake_timeout_secs: u64,
    /// Upper bound for the random padding we send (at most 512).
    pub max_padding: usize,
    /// Capacity of each connection's inbound ring buffer.
    pub inbound_buffer_size: usize,
    /// Capacity of each connection's outbound buffer.
    pub outbound_buffer_size: usize,
    /// Largest peer wire message accepted from a peer.
    pub max_message_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            encryption_policy: EncryptionPolicy::default(),
            handshake_timeout_secs: MSE_READ_TIMEOUT.as_secs(),
            max_padding: MSE_MAX_PADDING,
            inbound_buffer_size: INBOUND_BUFFER_SIZE,
            outbound_buffer_size: OUTBOUND_BUFFER_SIZE,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl TransportConfig {
    /// Returns the per-step handshake deadline.
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// Returns the padding bound clamped to what the protocol allows.
    pub fn padding_limit(&self) -> usize {
        self.max_padding.min(MSE_MAX_PADDING)
    }

    /// Overrides fields from `RBIT_*` environment variables.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(s) = std::env::var("RBIT_ENCRYPTION_POLICY") {
            match s.parse::<EncryptionPolicy>() {
                Ok(policy) => self.encryption_policy = policy,
                Err(_) => tracing::warn!("ignoring invalid RBIT_ENCRYPTION_POLICY: {}", s),
            }
        }
        if let Ok(s) = std::env::var("RBIT_HANDSHAKE_TIMEOUT_SECS") {
            match s.parse::<u64>() {
                Ok(secs) if secs > 0 => self.handshake_timeout_secs = secs,
                _ => tracing::warn!("ignoring invalid RBIT_HANDSHAKE_TIMEOUT_SECS: {}", s),
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.encryption_policy, EncryptionPolicy::PreferEncrypted);
        assert_eq!(config.handshake_timeout(), Duration::from_secs(30));
        assert_eq!(config.padding_limit(), 512);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: TransportConfig = toml::from_str(
            r#"
            encryption_policy = "require_plaintext"
            max_padding = 4096
            "#,
        )
        .unwrap();

        assert_eq!(config.encryption_policy, EncryptionPolicy::RequirePlaintext);
        assert_eq!(config.padding_limit(), 512);
        assert_eq!(config.inbound_buffer_size, INBOUND_BUFFER_SIZE);
    }

    #[test]
    fn test_deserialize_rejects_unknown_fields() {
        let result: Result<TransportConfig, _> = toml::from_str("listen_port = 6881");
        assert!(result.is_err());
    }
}
