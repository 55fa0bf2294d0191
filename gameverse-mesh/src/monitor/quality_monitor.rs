use crate::peer::{PeerConnection, PeerState};
use gameverse_core::{EncodingParameters, ParticipantId};
use std::collections::HashMap;
use tracing::{debug, info};

const SEVERE_LOSS: f64 = 0.10;
const MODERATE_LOSS: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossClass {
    Acceptable,
    Moderate,
    Severe,
}

pub fn classify_loss(ratio: f64) -> LossClass {
    if ratio > SEVERE_LOSS {
        LossClass::Severe
    } else if ratio > MODERATE_LOSS {
        LossClass::Moderate
    } else {
        LossClass::Acceptable
    }
}

/// Tightens `current` for the given loss class. Never loosens: scale only
/// grows and bitrate only shrinks.
pub fn adjust_encoding(current: EncodingParameters, class: LossClass) -> EncodingParameters {
    let (scale, bitrate) = match class {
        LossClass::Acceptable => return current,
        LossClass::Moderate => (1.5, 650_000),
        LossClass::Severe => (2.0, 500_000),
    };
    EncodingParameters {
        max_bitrate_bps: current.max_bitrate_bps.min(bitrate),
        scale_resolution_down_by: current.scale_resolution_down_by.max(scale),
    }
}

/// Samples every peer and downscales outbound video where loss is high.
#[derive(Debug, Default)]
pub struct QualityMonitor;

impl QualityMonitor {
    pub fn new() -> Self {
        Self
    }

    /// Returns the peers whose encoding changed this pass.
    pub async fn run(
        &self,
        peers: &mut HashMap<ParticipantId, PeerConnection>,
    ) -> Vec<(ParticipantId, EncodingParameters)> {
        let mut changed = Vec::new();

        for (id, peer) in peers.iter_mut() {
            if peer.sample_stats().await.is_none() {
                continue;
            }
            let history = peer.stats_history();
            let Some(loss) = history.loss_ratio() else {
                continue;
            };
            if let Some(bps) = history.inbound_bitrate_bps() {
                debug!(
                    "Video from {}: loss {:.1}%, {:.0} kbps",
                    id,
                    loss * 100.0,
                    bps / 1000.0
                );
            }

            // Only a connected sender is worth retuning.
            if peer.state() != PeerState::Connected {
                continue;
            }
            let Some(current) = peer.video_encoding() else {
                continue;
            };
            let next = adjust_encoding(current, classify_loss(loss));
            if next == current {
                continue;
            }

            info!(
                "Loss {:.1}% to {}: scale {} -> {}, bitrate {} -> {}",
                loss * 100.0,
                id,
                current.scale_resolution_down_by,
                next.scale_resolution_down_by,
                current.max_bitrate_bps,
                next.max_bitrate_bps
            );
            if peer.apply_video_encoding(next).await {
                changed.push((id.clone(), next));
            }
        }

        changed
    }
}
