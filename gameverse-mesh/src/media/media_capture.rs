use crate::MeshError;
use crate::config::VideoCodec;
use crate::media::{LocalMedia, LocalTrack};
use crate::transport::codec_capability;
use async_trait::async_trait;
use gameverse_core::{MediaConstraints, MediaTier, TrackKind};
use std::sync::Arc;
use tracing::{info, warn};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Source of local tracks, such as a camera/microphone pipeline.
#[async_trait]
pub trait MediaCapture: Send + Sync {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalMedia, MeshError>;
}

/// Creates sample-fed tracks for whatever the constraints ask for. The
/// application writes encoded frames into them with
/// [`LocalTrack::write_sample`].
pub struct SampleTrackCapture {
    stream_id: String,
    video_codec: Option<VideoCodec>,
}

impl SampleTrackCapture {
    pub fn new(stream_id: impl Into<String>, video_codec: Option<VideoCodec>) -> Self {
        Self {
            stream_id: stream_id.into(),
            video_codec,
        }
    }

    fn track(&self, kind: TrackKind) -> LocalTrack {
        let id = match kind {
            TrackKind::Audio => "audio",
            TrackKind::Video => "video",
        };
        let track = TrackLocalStaticSample::new(
            codec_capability(kind, self.video_codec),
            id.to_owned(),
            self.stream_id.clone(),
        );
        LocalTrack::new(kind, Arc::new(track))
    }
}

#[async_trait]
impl MediaCapture for SampleTrackCapture {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalMedia, MeshError> {
        let mut tracks = Vec::new();
        if constraints.wants_audio() {
            tracks.push(self.track(TrackKind::Audio));
        }
        if constraints.wants_video() {
            tracks.push(self.track(TrackKind::Video));
        }
        Ok(LocalMedia::new(constraints.tier, tracks))
    }
}

/// Outcome of walking the constraint ladder.
#[derive(Debug)]
pub struct MediaAcquisition {
    pub media: LocalMedia,
    /// One entry per tier that failed before `media` was obtained.
    pub failures: Vec<MeshError>,
}

impl MediaAcquisition {
    pub fn fell_back(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Tries each tier in order and returns the first that succeeds. The
/// no-media tier never touches the capture source, and it is also the result
/// when every tier fails.
pub async fn acquire_with_fallback(
    capture: &dyn MediaCapture,
    ladder: &[MediaConstraints],
) -> MediaAcquisition {
    let mut failures = Vec::new();

    for constraints in ladder {
        if constraints.tier == MediaTier::NoMedia {
            break;
        }
        match capture.acquire(constraints).await {
            Ok(media) => {
                info!("Acquired local media at tier {:?}", media.tier());
                return MediaAcquisition { media, failures };
            }
            Err(e) => {
                warn!("Media tier {:?} unavailable: {}", constraints.tier, e);
                failures.push(e);
            }
        }
    }

    info!("Continuing without local media");
    MediaAcquisition {
        media: LocalMedia::empty(),
        failures,
    }
}
