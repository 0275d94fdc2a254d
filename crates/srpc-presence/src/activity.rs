//! Metadata snapshot → activity payload.
//!
//! Pure and deterministic given a clock reading. Timestamps are anchored at
//! the moment the payload is built so the consumer's own clock advances the
//! elapsed/remaining counter without further updates.

use std::time::{SystemTime, UNIX_EPOCH};

use srpc_common::MetadataSnapshot;

use crate::protocol::{
    ActivityAssets, ActivityButton, ActivityPayload, ActivityTimestamps, ACTIVITY_TYPE_LISTENING,
};

/// Where the single button points.
pub const SOURCE_URL: &str = "https://soundcloud.com";
pub const SOURCE_BUTTON_LABEL: &str = "Listen on SoundCloud";

const FALLBACK_DETAILS: &str = "Listening to SoundCloud";
const FALLBACK_STATE: &str = "Unknown Artist";
const FALLBACK_LARGE_IMAGE: &str = "soundcloud_logo";
const FALLBACK_LARGE_TEXT: &str = "SoundCloud";
const PLAYING_ICON: &str = "play_icon";
const PAUSED_ICON: &str = "pause_icon";

/// The consumer rejects text fields longer than this.
const MAX_TEXT_LEN: usize = 128;

/// Build an activity using the current wall clock.
pub fn build_activity(snapshot: &MetadataSnapshot) -> ActivityPayload {
    build_activity_at(snapshot, now_millis())
}

/// Build an activity as of `now_ms` (epoch milliseconds).
pub fn build_activity_at(snapshot: &MetadataSnapshot, now_ms: i64) -> ActivityPayload {
    let playing = snapshot.playback_state.is_playing();

    let details = text_or(&snapshot.title, FALLBACK_DETAILS);
    let state = text_or(&snapshot.artist, FALLBACK_STATE);

    let large_text = match snapshot.album.as_deref() {
        Some(album) => text_or(album, FALLBACK_LARGE_TEXT),
        None => text_or(&snapshot.title, FALLBACK_LARGE_TEXT),
    };

    let assets = ActivityAssets {
        large_image: snapshot
            .artwork_url
            .clone()
            .unwrap_or_else(|| FALLBACK_LARGE_IMAGE.to_string()),
        large_text,
        small_image: if playing { PLAYING_ICON } else { PAUSED_ICON }.to_string(),
        small_text: if playing { "Playing" } else { "Paused" }.to_string(),
    };

    let timestamps = playing.then(|| ActivityTimestamps {
        start: now_ms.saturating_sub(secs_to_millis(snapshot.current_time)),
        end: now_ms.saturating_add(secs_to_millis(snapshot.duration - snapshot.current_time)),
    });

    ActivityPayload {
        details,
        state,
        assets,
        timestamps,
        buttons: vec![ActivityButton {
            label: SOURCE_BUTTON_LABEL.to_string(),
            url: SOURCE_URL.to_string(),
        }],
        activity_type: ACTIVITY_TYPE_LISTENING,
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Float-to-int `as` saturates, and NaN maps to 0.
fn secs_to_millis(secs: f64) -> i64 {
    (secs * 1000.0).round() as i64
}

fn text_or(value: &str, fallback: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.chars().take(MAX_TEXT_LEN).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use srpc_common::PlaybackState;

    fn snapshot(current_time: f64, duration: f64, state: PlaybackState) -> MetadataSnapshot {
        MetadataSnapshot {
            title: "A".into(),
            artist: "B".into(),
            album: None,
            artwork_url: None,
            current_time,
            duration,
            playback_state: state,
        }
    }

    #[test]
    fn playing_snapshot_anchors_timestamps_at_build_time() {
        let t = 1_700_000_000_000;
        let activity = build_activity_at(&snapshot(30.0, 180.0, PlaybackState::Playing), t);

        let ts = activity.timestamps.expect("playing has timestamps");
        assert_eq!(ts.start, t - 30_000);
        assert_eq!(ts.end, t + 150_000);
        assert_eq!(activity.details, "A");
        assert_eq!(activity.state, "B");
    }

    #[test]
    fn paused_snapshot_has_no_timestamps() {
        let activity = build_activity_at(&snapshot(30.0, 180.0, PlaybackState::Paused), 1_000);
        assert!(activity.timestamps.is_none());
        assert_eq!(activity.assets.small_image, "pause_icon");
        assert_eq!(activity.assets.small_text, "Paused");
    }

    #[test]
    fn span_matches_duration_for_many_positions() {
        let now = 1_650_000_000_123;
        for (current, duration) in [
            (0.0, 0.0),
            (0.0, 1.0),
            (12.345, 200.5),
            (59.9999, 60.0),
            (3599.5, 7200.25),
        ] {
            let activity =
                build_activity_at(&snapshot(current, duration, PlaybackState::Playing), now);
            let ts = activity.timestamps.unwrap();
            let span = ts.end - ts.start;
            let expected = (duration * 1000.0).round() as i64;
            assert!(
                (span - expected).abs() <= 1,
                "span {span} vs {expected} for {current}/{duration}"
            );
        }
    }

    #[test]
    fn wall_clock_build_span_matches_duration() {
        let activity = build_activity(&snapshot(10.0, 95.0, PlaybackState::Playing));
        let ts = activity.timestamps.unwrap();
        assert!((ts.end - ts.start - 95_000).abs() <= 1);
        assert!(ts.start <= now_millis() - 10_000);
    }

    #[test]
    fn assets_fall_back_without_artwork() {
        let activity = build_activity_at(&snapshot(0.0, 10.0, PlaybackState::Playing), 0);
        assert_eq!(activity.assets.large_image, "soundcloud_logo");
        assert_eq!(activity.assets.large_text, "A");
        assert_eq!(activity.assets.small_image, "play_icon");
        assert_eq!(activity.assets.small_text, "Playing");
    }

    #[test]
    fn assets_use_artwork_and_album() {
        let mut snap = snapshot(0.0, 10.0, PlaybackState::Paused);
        snap.artwork_url = Some("https://i1.sndcdn.com/a.jpg".into());
        snap.album = Some("Record".into());

        let activity = build_activity_at(&snap, 0);
        assert_eq!(activity.assets.large_image, "https://i1.sndcdn.com/a.jpg");
        assert_eq!(activity.assets.large_text, "Record");
    }

    #[test]
    fn single_source_button() {
        let activity = build_activity_at(&snapshot(0.0, 10.0, PlaybackState::Paused), 0);
        assert_eq!(activity.buttons.len(), 1);
        assert_eq!(activity.buttons[0].label, "Listen on SoundCloud");
        assert_eq!(activity.buttons[0].url, "https://soundcloud.com");
        assert_eq!(activity.activity_type, 2);
    }

    #[test]
    fn blank_text_uses_fallbacks() {
        let mut snap = snapshot(0.0, 10.0, PlaybackState::Paused);
        snap.title = " ".into();
        snap.artist = String::new();

        let activity = build_activity_at(&snap, 0);
        assert_eq!(activity.details, "Listening to SoundCloud");
        assert_eq!(activity.state, "Unknown Artist");
        assert_eq!(activity.assets.large_text, "SoundCloud");
    }

    #[test]
    fn long_text_is_truncated() {
        let mut snap = snapshot(0.0, 10.0, PlaybackState::Paused);
        snap.title = "é".repeat(300);

        let activity = build_activity_at(&snap, 0);
        assert_eq!(activity.details.chars().count(), 128);
    }

    #[test]
    fn huge_positions_saturate_instead_of_overflowing() {
        let now = 1_700_000_000_000;
        let value = serde_json::json!({
            "title": "A",
            "artist": "B",
            "currentTime": 0,
            "duration": 1e300,
            "playbackState": "playing"
        });
        let snap = MetadataSnapshot::from_value(value).unwrap();

        let ts = build_activity_at(&snap, now).timestamps.unwrap();
        assert_eq!(ts.start, now);
        assert_eq!(ts.end, i64::MAX);

        let ts = build_activity_at(&snapshot(1e300, 0.0, PlaybackState::Playing), now)
            .timestamps
            .unwrap();
        assert_eq!(ts.start, now - i64::MAX);
        assert_eq!(ts.end, i64::MIN + now);
    }

    #[test]
    fn same_input_same_output() {
        let snap = snapshot(42.0, 100.0, PlaybackState::Playing);
        assert_eq!(build_activity_at(&snap, 5_000), build_activity_at(&snap, 5_000));
    }
}
