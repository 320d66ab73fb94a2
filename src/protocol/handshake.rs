//! JSON payload of the initial `FullClientRequest`.

use crate::defaults;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    pub user: UserInfo,
    pub audio: AudioParams,
    pub request: RequestParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioParams {
    pub format: String,
    pub rate: u32,
    pub bits: u16,
    pub channel: u16,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestParams {
    pub model_name: String,
    pub enable_itn: bool,
    pub enable_ddc: bool,
    pub enable_punc: bool,
}

impl Default for HandshakeRequest {
    fn default() -> Self {
        Self {
            user: UserInfo {
                uid: defaults::USER_ID.to_string(),
            },
            audio: AudioParams {
                format: defaults::AUDIO_FORMAT.to_string(),
                rate: defaults::SAMPLE_RATE,
                bits: defaults::BITS_PER_SAMPLE,
                channel: defaults::CHANNELS,
                language: defaults::LANGUAGE.to_string(),
            },
            request: RequestParams {
                model_name: defaults::MODEL_NAME.to_string(),
                enable_itn: true,
                enable_ddc: false,
                enable_punc: true,
            },
        }
    }
}

impl HandshakeRequest {
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
