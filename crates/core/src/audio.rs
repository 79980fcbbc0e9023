//! Audio references exchanged with speech providers

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Recorded audio handed to a transcription provider
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// Fetchable recording URL (telephony-hosted)
    Url(String),
    /// Raw audio bytes with their MIME type
    Bytes { data: Vec<u8>, mime_type: String },
}

impl AudioSource {
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    pub fn bytes(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self::Bytes {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Short description for logs, never the payload
    pub fn describe(&self) -> String {
        match self {
            Self::Url(url) => format!("url:{}", url),
            Self::Bytes { data, mime_type } => format!("bytes:{}:{}", mime_type, data.len()),
        }
    }
}

/// Where synthesized audio ended up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SynthesizedAudio {
    /// Written to disk; `url` is the public path to fetch it
    File { path: PathBuf, url: String },
    /// Returned in memory
    Buffer {
        #[serde(skip)]
        data: Vec<u8>,
        content_type: String,
    },
}

impl SynthesizedAudio {
    /// Public URL for file output
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::File { url, .. } => Some(url),
            Self::Buffer { .. } => None,
        }
    }
}
