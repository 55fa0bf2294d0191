use gameverse_core::MediaTier;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("invalid mesh configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("media capture failed at tier {tier:?}: {reason}")]
    Media { tier: MediaTier, reason: String },

    #[error("signaling connection failed: {0}")]
    SignalingConnect(String),

    #[error("signaling channel closed")]
    SignalingClosed,

    #[error("mesh coordinator is not running")]
    Stopped,
}
