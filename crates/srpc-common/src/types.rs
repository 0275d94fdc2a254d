//! Now-playing metadata as received from a producer.

use serde::{Deserialize, Serialize};

use crate::errors::MetadataError;

/// Playback state reported by the page. Anything other than `"playing"`
/// is treated as paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    #[default]
    #[serde(other)]
    Paused,
}

impl PlaybackState {
    pub fn is_playing(self) -> bool {
        matches!(self, PlaybackState::Playing)
    }
}

/// A validated snapshot of what is currently playing.
///
/// Times are in seconds. Superseded by each new snapshot; no history is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataSnapshot {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub artwork_url: Option<String>,
    pub current_time: f64,
    pub duration: f64,
    pub playback_state: PlaybackState,
}

/// Wire shape before validation. Accepts the field names the browser
/// extension actually sends (`artwork`, `paused`) as aliases.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    album: Option<String>,
    #[serde(default, alias = "artwork")]
    artwork_url: Option<String>,
    #[serde(default)]
    current_time: Option<f64>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default, alias = "paused")]
    playback_state: Option<PlaybackState>,
}

impl MetadataSnapshot {
    /// Validate an untrusted JSON value into a snapshot.
    ///
    /// `title` and `artist` must be present and non-blank.
    pub fn from_value(value: serde_json::Value) -> Result<Self, MetadataError> {
        if !value.is_object() {
            return Err(MetadataError::Invalid("expected a JSON object".into()));
        }

        let raw: RawSnapshot =
            serde_json::from_value(value).map_err(|e| MetadataError::Invalid(e.to_string()))?;

        let title = non_blank(raw.title).ok_or(MetadataError::MissingField("title"))?;
        let artist = non_blank(raw.artist).ok_or(MetadataError::MissingField("artist"))?;

        Ok(Self {
            title,
            artist,
            album: non_blank(raw.album),
            artwork_url: non_blank(raw.artwork_url),
            current_time: raw.current_time.unwrap_or(0.0).max(0.0),
            duration: raw.duration.unwrap_or(0.0).max(0.0),
            playback_state: raw.playback_state.unwrap_or_default(),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
