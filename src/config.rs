use crate::defaults;
use crate::error::{Result, VoxwireError};
use crate::protocol::compression::CompressionPolicy;
use crate::protocol::handshake::{AudioParams, HandshakeRequest, RequestParams, UserInfo};
use crate::response::{ErrorBand, ErrorBands, default_error_bands};
use crate::session::config::{Credentials, ReconnectPolicy, SessionConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
#[cfg(feature = "cli")]
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub request: RequestConfig,
    pub compression: CompressionPolicy,
    pub reconnect: ReconnectConfig,
    pub error_bands: Vec<ErrorBand>,
}

/// Endpoint and credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub endpoint: String,
    pub app_key: String,
    pub access_key: String,
    pub resource_id: String,
    pub uid: String,
}

/// Audio stream parameters announced in the handshake
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub format: String,
    pub rate: u32,
    pub bits: u16,
    pub channel: u16,
    pub language: String,
    /// Duration of each audio packet sent to the service.
    pub chunk_ms: u32,
}

/// Recognition options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RequestConfig {
    pub model_name: String,
    pub enable_itn: bool,
    pub enable_ddc: bool,
    pub enable_punc: bool,
}

/// Reconnect timing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Omit for unlimited attempts.
    pub max_attempts: Option<u32>,
    pub reset_sequence: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            audio: AudioConfig::default(),
            request: RequestConfig::default(),
            compression: CompressionPolicy::default(),
            reconnect: ReconnectConfig::default(),
            error_bands: default_error_bands(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::ENDPOINT.to_string(),
            app_key: String::new(),
            access_key: String::new(),
            resource_id: defaults::RESOURCE_ID.to_string(),
            uid: defaults::USER_ID.to_string(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            format: defaults::AUDIO_FORMAT.to_string(),
            rate: defaults::SAMPLE_RATE,
            bits: defaults::BITS_PER_SAMPLE,
            channel: defaults::CHANNELS,
            language: defaults::LANGUAGE.to_string(),
            chunk_ms: defaults::CHUNK_MS,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            model_name: defaults::MODEL_NAME.to_string(),
            enable_itn: true,
            enable_ddc: false,
            enable_punc: true,
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: defaults::RECONNECT_INITIAL_DELAY_MS,
            max_delay_ms: defaults::RECONNECT_MAX_DELAY_MS,
            max_attempts: None,
            reset_sequence: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(VoxwireError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXWIRE_ENDPOINT → service.endpoint
    /// - VOXWIRE_APP_KEY → service.app_key
    /// - VOXWIRE_ACCESS_KEY → service.access_key
    /// - VOXWIRE_RESOURCE_ID → service.resource_id
    /// - VOXWIRE_LANGUAGE → audio.language
    pub fn with_env_overrides(mut self) -> Self {
        let overrides: [(&str, &mut String); 5] = [
            ("VOXWIRE_ENDPOINT", &mut self.service.endpoint),
            ("VOXWIRE_APP_KEY", &mut self.service.app_key),
            ("VOXWIRE_ACCESS_KEY", &mut self.service.access_key),
            ("VOXWIRE_RESOURCE_ID", &mut self.service.resource_id),
            ("VOXWIRE_LANGUAGE", &mut self.audio.language),
        ];
        for (name, field) in overrides {
            if let Ok(value) = std::env::var(name)
                && !value.is_empty()
            {
                *field = value;
            }
        }
        self
    }

    /// Check values that would otherwise fail later, mid-session.
    pub fn validate(&self) -> Result<()> {
        let endpoint = &self.service.endpoint;
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            return Err(invalid(
                "service.endpoint",
                format!("expected a ws:// or wss:// URL, got '{}'", endpoint),
            ));
        }
        if self.audio.rate == 0 {
            return Err(invalid("audio.rate", "must be greater than 0"));
        }
        if self.audio.bits == 0 || self.audio.bits % 8 != 0 {
            return Err(invalid(
                "audio.bits",
                format!("must be a non-zero multiple of 8, got {}", self.audio.bits),
            ));
        }
        if self.audio.channel == 0 {
            return Err(invalid("audio.channel", "must be greater than 0"));
        }
        if self.audio.chunk_ms == 0 {
            return Err(invalid("audio.chunk_ms", "must be greater than 0"));
        }
        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            return Err(invalid(
                "reconnect.initial_delay_ms",
                format!(
                    "{} exceeds reconnect.max_delay_ms ({})",
                    self.reconnect.initial_delay_ms, self.reconnect.max_delay_ms
                ),
            ));
        }
        if let Some(band) = self.error_bands.iter().find(|b| b.start >= b.end) {
            return Err(invalid(
                "error_bands",
                format!("empty range [{}, {})", band.start, band.end),
            ));
        }
        Ok(())
    }

    /// Build the session configuration. Requires both keys to be set.
    pub fn to_session_config(&self) -> Result<SessionConfig> {
        self.validate()?;
        if self.service.app_key.is_empty() {
            return Err(invalid(
                "service.app_key",
                "not set (use the config file or VOXWIRE_APP_KEY)",
            ));
        }
        if self.service.access_key.is_empty() {
            return Err(invalid(
                "service.access_key",
                "not set (use the config file or VOXWIRE_ACCESS_KEY)",
            ));
        }

        let credentials = Credentials {
            endpoint: self.service.endpoint.clone(),
            app_key: self.service.app_key.clone(),
            access_key: self.service.access_key.clone(),
            resource_id: self.service.resource_id.clone(),
        };
        Ok(SessionConfig::new(credentials)
            .with_handshake(self.handshake())
            .with_compression(self.compression)
            .with_reconnect(ReconnectPolicy {
                initial_delay: Duration::from_millis(self.reconnect.initial_delay_ms),
                max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
                max_attempts: self.reconnect.max_attempts,
                reset_sequence: self.reconnect.reset_sequence,
            })
            .with_error_bands(ErrorBands::new(self.error_bands.clone())))
    }

    /// Handshake payload described by this configuration.
    pub fn handshake(&self) -> HandshakeRequest {
        HandshakeRequest {
            user: UserInfo {
                uid: self.service.uid.clone(),
            },
            audio: AudioParams {
                format: self.audio.format.clone(),
                rate: self.audio.rate,
                bits: self.audio.bits,
                channel: self.audio.channel,
                language: self.audio.language.clone(),
            },
            request: RequestParams {
                model_name: self.request.model_name.clone(),
                enable_itn: self.request.enable_itn,
                enable_ddc: self.request.enable_ddc,
                enable_punc: self.request.enable_punc,
            },
        }
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| VoxwireError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxwire/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("voxwire").join("config.toml"))
    }
}

fn invalid(key: &str, message: impl Into<String>) -> VoxwireError {
    VoxwireError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}
