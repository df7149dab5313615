//! Codec table for relayed streams
//!
//! The relay never transcodes, so every session negotiates the same pair of
//! codecs and forwarded packets can be written to any outbound track as-is.

use relay_protocol::MediaKind;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};
use webrtc::rtp_transceiver::RTCPFeedback;

/// Audio sample rate of relayed Opus streams (48kHz)
pub const AUDIO_CLOCK_RATE: u32 = 48000;

/// RTP clock rate of relayed video streams
pub const VIDEO_CLOCK_RATE: u32 = 90000;

/// Codec negotiated for one media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayCodec {
    pub kind: MediaKind,
    pub mime_type: &'static str,
    pub clock_rate: u32,
    pub channels: u16,
    pub payload_type: u8,
    pub fmtp_line: &'static str,
}

pub const OPUS: RelayCodec = RelayCodec {
    kind: MediaKind::Audio,
    mime_type: MIME_TYPE_OPUS,
    clock_rate: AUDIO_CLOCK_RATE,
    channels: 2,
    payload_type: 111,
    fmtp_line: "minptime=10;useinbandfec=1",
};

pub const VP8: RelayCodec = RelayCodec {
    kind: MediaKind::Video,
    mime_type: MIME_TYPE_VP8,
    clock_rate: VIDEO_CLOCK_RATE,
    channels: 0,
    payload_type: 96,
    fmtp_line: "",
};

impl RelayCodec {
    /// Codec used for the given media kind
    pub fn for_kind(kind: MediaKind) -> RelayCodec {
        match kind {
            MediaKind::Audio => OPUS,
            MediaKind::Video => VP8,
        }
    }

    /// Capability advertised for local tracks of this codec
    ///
    /// Must match the `MediaEngine` registration exactly, otherwise
    /// `add_track` fails to bind a codec.
    pub fn capability(&self) -> RTCRtpCodecCapability {
        RTCRtpCodecCapability {
            mime_type: self.mime_type.to_string(),
            clock_rate: self.clock_rate,
            channels: self.channels,
            sdp_fmtp_line: self.fmtp_line.to_string(),
            rtcp_feedback: self.rtcp_feedback(),
        }
    }

    pub fn parameters(&self) -> RTCRtpCodecParameters {
        RTCRtpCodecParameters {
            capability: self.capability(),
            payload_type: self.payload_type,
            ..Default::default()
        }
    }

    fn rtcp_feedback(&self) -> Vec<RTCPFeedback> {
        match self.kind {
            MediaKind::Audio => vec![],
            MediaKind::Video => [("nack", ""), ("nack", "pli"), ("ccm", "fir")]
                .into_iter()
                .map(|(typ, parameter)| RTCPFeedback {
                    typ: typ.to_string(),
                    parameter: parameter.to_string(),
                })
                .collect(),
        }
    }
}

/// Map a relay media kind to the webrtc codec type
pub fn codec_type(kind: MediaKind) -> RTPCodecType {
    match kind {
        MediaKind::Audio => RTPCodecType::Audio,
        MediaKind::Video => RTPCodecType::Video,
    }
}

/// Map a webrtc codec type to a relay media kind, if it is one the relay carries
pub fn media_kind(codec_type: RTPCodecType) -> Option<MediaKind> {
    match codec_type {
        RTPCodecType::Audio => Some(MediaKind::Audio),
        RTPCodecType::Video => Some(MediaKind::Video),
        _ => None,
    }
}

/// Register the relay codec table with a media engine
pub fn register_relay_codecs(media_engine: &mut MediaEngine) -> Result<(), webrtc::Error> {
    for kind in MediaKind::ALL {
        let codec = RelayCodec::for_kind(kind);
        media_engine.register_codec(codec.parameters(), codec_type(kind))?;
        tracing::debug!(
            "Registered {} codec {} (pt {})",
            kind,
            codec.mime_type,
            codec.payload_type
        );
    }
    Ok(())
}
