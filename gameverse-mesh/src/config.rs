use crate::MeshError;
use gameverse_core::{EncodingParameters, IceServerConfig, MediaConstraints};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun1.l.google.com:19302";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    Vp8,
    Vp9,
    H264,
}

/// Settings consumed by the mesh. Every field has a default so a partial
/// JSON document is enough.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub ice_servers: Vec<IceServerConfig>,
    /// Acquisition ladder for the first join, best tier first.
    pub media_tiers: Vec<MediaConstraints>,
    /// Ladder used by reconnection; starts lower to get back in quickly.
    pub reconnect_media_tiers: Vec<MediaConstraints>,
    pub video_encoding: EncodingParameters,
    pub audio_encoding: EncodingParameters,
    /// `None` keeps every codec the media engine knows about.
    pub preferred_video_codec: Option<VideoCodec>,
    pub intervals: IntervalConfig,
    pub stats_history_len: usize,
    /// Events held for the UI before new ones are dropped.
    pub event_queue_len: usize,
    pub health: HealthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    pub reconcile_ms: u64,
    pub health_ms: u64,
    pub quality_ms: u64,
    /// A connection still negotiating after this long is rebuilt by the next
    /// reconcile. `0` disables the retry.
    pub negotiation_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Reconnect on our own after this many consecutive degraded checks.
    /// `None` leaves reconnection to the UI.
    pub auto_reconnect_after: Option<u32>,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: vec![DEFAULT_STUN_ADDR.to_owned(), DEFAULT_STUN_ADDR_2.to_owned()],
                username: None,
                credential: None,
            }],
            media_tiers: vec![
                MediaConstraints::full(),
                MediaConstraints::reduced(),
                MediaConstraints::audio_only(),
                MediaConstraints::none(),
            ],
            reconnect_media_tiers: vec![
                MediaConstraints::reduced(),
                MediaConstraints::audio_only(),
                MediaConstraints::none(),
            ],
            video_encoding: EncodingParameters::VIDEO_DEFAULT,
            audio_encoding: EncodingParameters::AUDIO_DEFAULT,
            preferred_video_codec: Some(VideoCodec::Vp8),
            intervals: IntervalConfig::default(),
            stats_history_len: 12,
            event_queue_len: 256,
            health: HealthConfig::default(),
        }
    }
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            reconcile_ms: 5_000,
            health_ms: 5_000,
            quality_ms: 5_000,
            negotiation_timeout_ms: 15_000,
        }
    }
}

impl IntervalConfig {
    pub fn reconcile(&self) -> Duration {
        Duration::from_millis(self.reconcile_ms.max(1))
    }

    pub fn health(&self) -> Duration {
        Duration::from_millis(self.health_ms.max(1))
    }

    pub fn quality(&self) -> Duration {
        Duration::from_millis(self.quality_ms.max(1))
    }

    pub fn negotiation_timeout(&self) -> Option<Duration> {
        (self.negotiation_timeout_ms > 0)
            .then(|| Duration::from_millis(self.negotiation_timeout_ms))
    }
}

impl MeshConfig {
    pub fn from_json(json: &str) -> Result<Self, MeshError> {
        Ok(serde_json::from_str(json)?)
    }
}
