//! Request model: what the client asked for and how we may try to get it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::IntoEnumIterator;
use url::Url;

use crate::core::validation::{validate_media_url, ValidationError};

/// Requested quality. `Audio` (wire value `0`) is the audio-only sentinel,
/// every other variant caps the video height in pixels.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize, strum::EnumIter,
)]
#[serde(try_from = "QualityRepr", into = "u32")]
pub enum Quality {
    Audio,
    P144,
    P240,
    P360,
    P480,
    #[default]
    P720,
    P1080,
    P1440,
    P2160,
}

impl Quality {
    /// Height cap in pixels, `0` for audio.
    pub fn height(self) -> u32 {
        match self {
            Quality::Audio => 0,
            Quality::P144 => 144,
            Quality::P240 => 240,
            Quality::P360 => 360,
            Quality::P480 => 480,
            Quality::P720 => 720,
            Quality::P1080 => 1080,
            Quality::P1440 => 1440,
            Quality::P2160 => 2160,
        }
    }

    pub fn from_height(height: u32) -> Option<Self> {
        Quality::iter().find(|q| q.height() == height)
    }

    pub fn is_audio(self) -> bool {
        self == Quality::Audio
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.height())
    }
}

impl TryFrom<u32> for Quality {
    type Error = ValidationError;

    fn try_from(height: u32) -> Result<Self, Self::Error> {
        Quality::from_height(height).ok_or_else(|| ValidationError::InvalidQuality(height.to_string()))
    }
}

/// Accepts `"720"`, `"720p"` and `"audio"`.
impl FromStr for Quality {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("audio") {
            return Ok(Quality::Audio);
        }
        let digits = trimmed.strip_suffix(['p', 'P']).unwrap_or(trimmed);
        digits
            .parse::<u32>()
            .ok()
            .and_then(Quality::from_height)
            .ok_or_else(|| ValidationError::InvalidQuality(s.to_string()))
    }
}

impl From<Quality> for u32 {
    fn from(quality: Quality) -> Self {
        quality.height()
    }
}

/// Wire shape: clients send quality either as a number or as a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum QualityRepr {
    Number(u32),
    Text(String),
}

impl TryFrom<QualityRepr> for Quality {
    type Error = ValidationError;

    fn try_from(repr: QualityRepr) -> Result<Self, Self::Error> {
        match repr {
            QualityRepr::Number(height) => Quality::try_from(height),
            QualityRepr::Text(text) => text.parse(),
        }
    }
}

/// Extraction strategy: a named header/client profile handed to yt-dlp.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Strategy {
    /// Full browser-like header set, multi-client hint
    Primary,
    Android,
    Ios,
}

impl Strategy {
    /// All strategies in their canonical order.
    pub fn default_order() -> Vec<Strategy> {
        Strategy::iter().collect()
    }

    /// Value for yt-dlp's `youtube:player_client=` extractor argument.
    pub fn player_clients(self) -> &'static str {
        match self {
            Strategy::Primary => "web,android,ios",
            Strategy::Android => "android",
            Strategy::Ios => "ios",
        }
    }
}

/// An immutable download request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    url: Url,
    quality: Quality,
    audio_only: bool,
}

impl DownloadRequest {
    pub fn new(url: Url, quality: Quality, audio_only: bool) -> Self {
        Self {
            url,
            quality,
            audio_only,
        }
    }

    /// Validates a raw URL and builds the request.
    pub fn parse(url: &str, quality: Quality, audio_only: bool) -> Result<Self, ValidationError> {
        Ok(Self::new(validate_media_url(url)?, quality, audio_only))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn audio_only(&self) -> bool {
        self.audio_only
    }

    /// Audio mode applies for quality `0` as well as an explicit audio-only flag.
    pub fn wants_audio(&self) -> bool {
        self.audio_only || self.quality.is_audio()
    }

    /// Output container extension.
    pub fn extension(&self) -> &'static str {
        if self.wants_audio() {
            "mp3"
        } else {
            "mp4"
        }
    }

    pub fn content_type(&self) -> &'static str {
        if self.wants_audio() {
            "audio/mpeg"
        } else {
            "video/mp4"
        }
    }

    /// File name presented to the client.
    pub fn file_name(&self) -> String {
        if self.wants_audio() {
            "audio.mp3".to_string()
        } else {
            format!("video_{}p.mp4", self.quality.height())
        }
    }

    /// Re-request handle: `<endpoint>?url=..&quality=..&audioOnly=..`.
    pub fn handle(&self, endpoint: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("url", self.url.as_str())
            .append_pair("quality", &self.quality.to_string())
            .append_pair("audioOnly", if self.audio_only { "true" } else { "false" })
            .finish();
        format!("{}?{}", endpoint, query)
    }
}
