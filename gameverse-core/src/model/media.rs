use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Capture quality ladder, best first. Acquisition walks down it on failure.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum MediaTier {
    Full,
    Reduced,
    AudioOnly,
    NoMedia,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VideoConstraints {
    pub ideal_width: u32,
    pub max_width: u32,
    pub ideal_height: u32,
    pub max_height: u32,
    pub ideal_frame_rate: u32,
    pub max_frame_rate: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub channel_count: u16,
    pub sample_rate: u32,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            channel_count: 2,
            sample_rate: 48_000,
        }
    }
}

/// What to ask the capture device for at one tier.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MediaConstraints {
    pub tier: MediaTier,
    pub video: Option<VideoConstraints>,
    pub audio: Option<AudioConstraints>,
}

impl MediaConstraints {
    pub fn full() -> Self {
        Self {
            tier: MediaTier::Full,
            video: Some(VideoConstraints {
                ideal_width: 640,
                max_width: 1280,
                ideal_height: 480,
                max_height: 720,
                ideal_frame_rate: 30,
                max_frame_rate: 30,
            }),
            audio: Some(AudioConstraints::default()),
        }
    }

    pub fn reduced() -> Self {
        Self {
            tier: MediaTier::Reduced,
            video: Some(VideoConstraints {
                ideal_width: 320,
                max_width: 640,
                ideal_height: 180,
                max_height: 360,
                ideal_frame_rate: 10,
                max_frame_rate: 15,
            }),
            audio: Some(AudioConstraints {
                channel_count: 1,
                sample_rate: 16_000,
                ..AudioConstraints::default()
            }),
        }
    }

    /// Audio-only keeps the reduced audio settings.
    pub fn audio_only() -> Self {
        Self {
            tier: MediaTier::AudioOnly,
            video: None,
            audio: Self::reduced().audio,
        }
    }

    pub fn none() -> Self {
        Self {
            tier: MediaTier::NoMedia,
            video: None,
            audio: None,
        }
    }

    pub fn wants_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn wants_audio(&self) -> bool {
        self.audio.is_some()
    }
}

/// Sender-side encoding limits for one outbound track.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct EncodingParameters {
    pub max_bitrate_bps: u32,
    pub scale_resolution_down_by: f64,
}

impl EncodingParameters {
    pub const VIDEO_DEFAULT: Self = Self {
        max_bitrate_bps: 800_000,
        scale_resolution_down_by: 1.0,
    };

    pub const AUDIO_DEFAULT: Self = Self {
        max_bitrate_bps: 32_000,
        scale_resolution_down_by: 1.0,
    };
}

impl Default for EncodingParameters {
    fn default() -> Self {
        Self::VIDEO_DEFAULT
    }
}
