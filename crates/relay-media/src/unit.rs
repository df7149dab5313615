use bytes::Bytes;
use relay_protocol::{MediaKind, SessionId};
use webrtc::rtp::header::Header;
use webrtc::rtp::packet::Packet;

/// One RTP packet travelling through the relay
///
/// The payload is never inspected. `origin` identifies the session the packet
/// came from and is only used to keep a session from receiving its own media.
#[derive(Debug, Clone)]
pub struct MediaUnit {
    pub origin: SessionId,
    pub kind: MediaKind,
    pub packet: Packet,
}

impl MediaUnit {
    pub fn new(origin: SessionId, kind: MediaKind, packet: Packet) -> Self {
        Self {
            origin,
            kind,
            packet,
        }
    }

    pub fn sequence_number(&self) -> u16 {
        self.packet.header.sequence_number
    }

    pub fn timestamp(&self) -> u32 {
        self.packet.header.timestamp
    }

    pub fn payload_len(&self) -> usize {
        self.packet.payload.len()
    }
}

/// Build a bare RTP packet, mostly useful for feeding synthetic media
pub fn rtp_packet(sequence_number: u16, timestamp: u32, payload: impl Into<Bytes>) -> Packet {
    Packet {
        header: Header {
            version: 2,
            sequence_number,
            timestamp,
            ..Default::default()
        },
        payload: payload.into(),
    }
}
