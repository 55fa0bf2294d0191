use anyhow::Result;
use bytes::Bytes;
use gameverse_core::{MediaTier, TrackKind};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use webrtc::media::Sample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// One captured local track. Cloning shares the underlying track.
#[derive(Clone)]
pub struct LocalTrack {
    pub kind: TrackKind,
    pub track: Arc<TrackLocalStaticSample>,
}

impl LocalTrack {
    pub fn new(kind: TrackKind, track: Arc<TrackLocalStaticSample>) -> Self {
        Self { kind, track }
    }

    pub fn id(&self) -> &str {
        self.track.id()
    }

    /// Pushes one encoded frame to every peer the track is attached to.
    pub async fn write_sample(&self, data: Bytes, duration: Duration) -> Result<()> {
        self.track
            .write_sample(&Sample {
                data,
                duration,
                ..Default::default()
            })
            .await?;
        Ok(())
    }
}

impl fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTrack")
            .field("kind", &self.kind)
            .field("id", &self.id())
            .finish()
    }
}

/// Local tracks for one room session and the tier that produced them.
#[derive(Clone)]
pub struct LocalMedia {
    tier: MediaTier,
    tracks: Vec<LocalTrack>,
}

impl LocalMedia {
    pub fn new(tier: MediaTier, tracks: Vec<LocalTrack>) -> Self {
        Self { tier, tracks }
    }

    /// Receive-only participation.
    pub fn empty() -> Self {
        Self::new(MediaTier::NoMedia, Vec::new())
    }

    pub fn tier(&self) -> MediaTier {
        self.tier
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn track(&self, kind: TrackKind) -> Option<&LocalTrack> {
        self.tracks.iter().find(|t| t.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl fmt::Debug for LocalMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalMedia")
            .field("tier", &self.tier)
            .field("tracks", &self.tracks)
            .finish()
    }
}
