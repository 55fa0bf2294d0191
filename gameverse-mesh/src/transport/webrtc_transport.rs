use crate::config::{MeshConfig, VideoCodec};
use crate::media::LocalTrack;
use crate::transport::{
    LinkState, PeerKey, PeerTransport, RemoteTrack, StatsSample, TransportEvent, TransportFactory,
};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use gameverse_core::{
    EncodingParameters, IceCandidate, IceServerConfig, SdpKind, SessionDescription, TrackKind,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{
    MIME_TYPE_H264, MIME_TYPE_OPUS, MIME_TYPE_VP8, MIME_TYPE_VP9, MediaEngine,
};
use webrtc::api::{API, APIBuilder};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCPFeedback;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};
use webrtc::stats::StatsReportType;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Builds webrtc-rs peer connections sharing one media engine setup.
pub struct WebRtcTransportFactory {
    api: API,
    rtc_config: RTCConfiguration,
}

impl WebRtcTransportFactory {
    pub fn new(config: &MeshConfig) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        register_codecs(&mut media_engine, config.preferred_video_codec)?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config.ice_servers.iter().map(to_rtc_ice_server).collect(),
            ..Default::default()
        };

        Ok(Self { api, rtc_config })
    }
}

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create(
        &self,
        key: PeerKey,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>> {
        let peer_connection = Arc::new(
            self.api
                .new_peer_connection(self.rtc_config.clone())
                .await
                .context("Failed to create RTCPeerConnection")?,
        );

        register_callbacks(&peer_connection, &key, &events);

        Ok(Arc::new(WebRtcTransport {
            key,
            peer_connection,
        }))
    }
}

pub struct WebRtcTransport {
    key: PeerKey,
    peer_connection: Arc<RTCPeerConnection>,
}

fn register_callbacks(
    peer_connection: &Arc<RTCPeerConnection>,
    key: &PeerKey,
    events: &mpsc::Sender<TransportEvent>,
) {
    let state_tx = events.clone();
    let state_key = key.clone();
    peer_connection.on_peer_connection_state_change(Box::new(
        move |s: RTCPeerConnectionState| {
            let tx = state_tx.clone();
            let peer = state_key.clone();

            Box::pin(async move {
                debug!(
                    "Peer connection state for {} (#{}): {:?}",
                    peer.participant_id, peer.connection_id, s
                );
                let state = match s {
                    RTCPeerConnectionState::New => LinkState::New,
                    RTCPeerConnectionState::Connecting => LinkState::Connecting,
                    RTCPeerConnectionState::Connected => LinkState::Connected,
                    RTCPeerConnectionState::Disconnected => LinkState::Disconnected,
                    RTCPeerConnectionState::Failed => LinkState::Failed,
                    RTCPeerConnectionState::Closed => LinkState::Closed,
                    _ => return,
                };
                let _ = tx.send(TransportEvent::StateChanged { peer, state }).await;
            })
        },
    ));

    // Trickle ICE: every gathered candidate goes out through signaling.
    let ice_tx = events.clone();
    let ice_key = key.clone();
    peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
        let tx = ice_tx.clone();
        let peer = ice_key.clone();

        Box::pin(async move {
            let Some(candidate) = c else { return };
            let Ok(init) = candidate.to_json() else {
                return;
            };
            let candidate = IceCandidate {
                candidate: init.candidate,
                sdp_mid: init.sdp_mid,
                sdp_m_line_index: init.sdp_mline_index,
                username_fragment: init.username_fragment,
            };
            let _ = tx
                .send(TransportEvent::CandidateGenerated { peer, candidate })
                .await;
        })
    }));

    let track_tx = events.clone();
    let track_key = key.clone();
    peer_connection.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
        let tx = track_tx.clone();
        let peer = track_key.clone();

        Box::pin(async move {
            let kind = match track.kind() {
                RTPCodecType::Audio => TrackKind::Audio,
                _ => TrackKind::Video,
            };
            let track = RemoteTrack {
                track_id: track.id(),
                stream_id: track.stream_id(),
                kind,
                remote: Some(track),
            };
            info!(
                "Remote {:?} track {} from {}",
                track.kind, track.track_id, peer.participant_id
            );
            let _ = tx.send(TransportEvent::TrackReceived { peer, track }).await;
        })
    }));
}

#[async_trait]
impl PeerTransport for WebRtcTransport {
    async fn add_track(&self, track: &LocalTrack) -> Result<()> {
        let sender = self
            .peer_connection
            .add_track(Arc::clone(&track.track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .with_context(|| format!("Failed to add {:?} track", track.kind))?;

        // RTCP has to be read for the interceptors (NACK, reports) to run.
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while sender.read(&mut rtcp_buf).await.is_ok() {}
        });
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.peer_connection.create_offer(None).await?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.peer_connection.create_answer(None).await?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_local_description(to_rtc_description(description)?)
            .await?;
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc_description(description)?)
            .await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        if candidate.candidate.trim().is_empty() {
            bail!("empty ICE candidate");
        }
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    /// webrtc-rs sends pre-encoded samples, so there is nothing to apply at
    /// this layer. Whoever encodes the local tracks picks the limits up from
    /// `MeshEvent::EncodingChanged`.
    async fn set_encoding(&self, kind: TrackKind, params: EncodingParameters) -> Result<()> {
        debug!(
            "Encoding for {} {:?}: {} bps, scale {}",
            self.key.participant_id, kind, params.max_bitrate_bps, params.scale_resolution_down_by
        );
        Ok(())
    }

    async fn stats(&self) -> Result<Option<StatsSample>> {
        let report = self.peer_connection.get_stats().await;

        let mut seen_video = false;
        let mut packets_lost = 0u64;
        let mut packets_received = 0u64;
        let mut bytes_received = 0u64;

        for stat in report.reports.values() {
            match stat {
                StatsReportType::RemoteInboundRTP(remote) if remote.kind == "video" => {
                    seen_video = true;
                    packets_lost += remote.packets_lost.max(0) as u64;
                    packets_received += remote.packets_received;
                }
                StatsReportType::InboundRTP(inbound) if inbound.kind == "video" => {
                    seen_video = true;
                    bytes_received += inbound.bytes_received;
                }
                _ => {}
            }
        }

        if !seen_video {
            return Ok(None);
        }

        Ok(Some(StatsSample {
            at: Instant::now(),
            packets_lost,
            packets_received,
            bytes_received,
        }))
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

fn to_rtc_description(description: SessionDescription) -> Result<RTCSessionDescription> {
    let rtc = match description.kind {
        SdpKind::Offer => RTCSessionDescription::offer(description.sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(description.sdp)?,
    };
    Ok(rtc)
}

fn to_rtc_ice_server(server: &IceServerConfig) -> RTCIceServer {
    RTCIceServer {
        urls: server.urls.clone(),
        username: server.username.clone().unwrap_or_default(),
        credential: server.credential.clone().unwrap_or_default(),
        ..Default::default()
    }
}

/// Registers Opus plus only the preferred video codec, which is how the
/// negotiated video codec is pinned without touching SDP text.
fn register_codecs(media_engine: &mut MediaEngine, preferred: Option<VideoCodec>) -> Result<()> {
    let Some(codec) = preferred else {
        media_engine.register_default_codecs()?;
        return Ok(());
    };

    media_engine.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48_000,
                channels: 2,
                sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
                rtcp_feedback: vec![],
            },
            payload_type: 111,
            ..Default::default()
        },
        RTPCodecType::Audio,
    )?;

    let (mime_type, payload_type, sdp_fmtp_line) = match codec {
        VideoCodec::Vp8 => (MIME_TYPE_VP8, 96, ""),
        VideoCodec::Vp9 => (MIME_TYPE_VP9, 98, "profile-id=0"),
        VideoCodec::H264 => (
            MIME_TYPE_H264,
            102,
            "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42001f",
        ),
    };
    media_engine.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: mime_type.to_owned(),
                clock_rate: 90_000,
                channels: 0,
                sdp_fmtp_line: sdp_fmtp_line.to_owned(),
                rtcp_feedback: video_rtcp_feedback(),
            },
            payload_type,
            ..Default::default()
        },
        RTPCodecType::Video,
    )?;

    Ok(())
}

fn video_rtcp_feedback() -> Vec<RTCPFeedback> {
    [("goog-remb", ""), ("ccm", "fir"), ("nack", ""), ("nack", "pli")]
        .into_iter()
        .map(|(typ, parameter)| RTCPFeedback {
            typ: typ.to_owned(),
            parameter: parameter.to_owned(),
        })
        .collect()
}

/// Capability to use for locally produced tracks of the given kind, matching
/// what [`register_codecs`] negotiates.
pub fn codec_capability(kind: TrackKind, preferred: Option<VideoCodec>) -> RTCRtpCodecCapability {
    match kind {
        TrackKind::Audio => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48_000,
            channels: 2,
            ..Default::default()
        },
        TrackKind::Video => {
            let mime_type = match preferred.unwrap_or(VideoCodec::Vp8) {
                VideoCodec::Vp8 => MIME_TYPE_VP8,
                VideoCodec::Vp9 => MIME_TYPE_VP9,
                VideoCodec::H264 => MIME_TYPE_H264,
            };
            RTCRtpCodecCapability {
                mime_type: mime_type.to_owned(),
                clock_rate: 90_000,
                ..Default::default()
            }
        }
    }
}
