use crate::defaults;
use crate::protocol::compression::CompressionPolicy;
use crate::protocol::handshake::HandshakeRequest;
use crate::response::ErrorBands;
use crate::transport::ConnectRequest;
use std::time::Duration;

/// Endpoint and credentials for the ASR service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub endpoint: String,
    pub app_key: String,
    pub access_key: String,
    pub resource_id: String,
}

impl Credentials {
    /// Build a connect request with a fresh connection id.
    pub fn connect_request(&self) -> ConnectRequest {
        ConnectRequest {
            endpoint: self.endpoint.clone(),
            app_key: self.app_key.clone(),
            access_key: self.access_key.clone(),
            resource_id: self.resource_id.clone(),
            connect_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Reconnect timing after transient transport failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries until the caller stops the session.
    pub max_attempts: Option<u32>,
    /// Restart sequence numbering at 1 for every new connection.
    pub reset_sequence: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(defaults::RECONNECT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(defaults::RECONNECT_MAX_DELAY_MS),
            max_attempts: None,
            reset_sequence: true,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based): doubles from
    /// `initial_delay`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }

    /// True when `attempt` is beyond the configured limit.
    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt > max)
    }
}

/// Everything a session needs before `start()`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub credentials: Credentials,
    pub handshake: HandshakeRequest,
    pub compression: CompressionPolicy,
    pub reconnect: ReconnectPolicy,
    pub error_bands: ErrorBands,
}

impl SessionConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            handshake: HandshakeRequest::default(),
            compression: CompressionPolicy::default(),
            reconnect: ReconnectPolicy::default(),
            error_bands: ErrorBands::default(),
        }
    }

    pub fn with_compression(mut self, compression: CompressionPolicy) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_handshake(mut self, handshake: HandshakeRequest) -> Self {
        self.handshake = handshake;
        self
    }

    pub fn with_error_bands(mut self, error_bands: ErrorBands) -> Self {
        self.error_bands = error_bands;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            endpoint: "wss://example.invalid/asr".to_string(),
            app_key: "app".to_string(),
            access_key: "secret".to_string(),
            resource_id: "res".to_string(),
        }
    }

    #[test]
    fn test_connect_ids_are_unique() {
        let creds = credentials();
        let a = creds.connect_request();
        let b = creds.connect_request();
        assert_eq!(a.endpoint, "wss://example.invalid/asr");
        assert_ne!(a.connect_id, b.connect_id);
    }

    #[test]
    fn test_default_delay_is_fixed_within_bounds() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(50), Duration::from_millis(2000));
    }

    #[test]
    fn test_delay_doubles_until_cap() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            ..ReconnectPolicy::default()
        };
        let delays: Vec<u128> = (1..=6).map(|a| policy.delay_for(a).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
    }

    #[test]
    fn test_unlimited_attempts_by_default() {
        let policy = ReconnectPolicy::default();
        assert!(!policy.exhausted(u32::MAX));

        let limited = ReconnectPolicy {
            max_attempts: Some(3),
            ..ReconnectPolicy::default()
        };
        assert!(!limited.exhausted(3));
        assert!(limited.exhausted(4));
    }

    #[test]
    fn test_builder_methods() {
        let config = SessionConfig::new(credentials()).with_compression(CompressionPolicy::none());
        assert!(!config.compression.audio);
        assert!(config.reconnect.reset_sequence);
    }
}
