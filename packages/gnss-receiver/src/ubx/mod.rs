//! u-blox UBX binary protocol.
//!
//! A frame is `0xB5 0x62 | class | id | length (le16) | payload | ck_a ck_b`
//! with the 8-bit Fletcher checksum computed over class, id, length and
//! payload.

pub mod ack;
pub mod cfg;
mod checksum;
mod codec;
pub mod nav;
mod scanner;

pub use checksum::Checksum;
pub use codec::{Reader, Writer};
pub use scanner::Scanner;

use thiserror::Error;

pub const SYNC_CHAR_1: u8 = 0xb5;
pub const SYNC_CHAR_2: u8 = 0x62;

/// Upper bound on payload length; longer frames are treated as line noise.
pub const MAX_PAYLOAD_LEN: usize = 1024;

pub mod class {
    pub const NAV: u8 = 0x01;
    pub const ACK: u8 = 0x05;
    pub const CFG: u8 = 0x06;
}

/// Failures while scanning, decoding or encoding UBX frames.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UbxError {
    #[error("payload length {0} exceeds the maximum frame size")]
    PayloadTooLarge(usize),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("read beyond the end of the payload")]
    Truncated,
    #[error("malformed {message} payload: {reason}")]
    MalformedPayload {
        message: &'static str,
        reason: &'static str,
    },
    #[error("{0} messages cannot be encoded")]
    EncodingNotSupported(&'static str),
    #[error("scanner holds no complete frame")]
    Incomplete,
}

/// The constellation a UBX message refers to, as carried in gnssId fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GnssId {
    Gps,
    Sbas,
    Galileo,
    BeiDou,
    Imes,
    Qzss,
    Glonass,
}

impl GnssId {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(GnssId::Gps),
            1 => Some(GnssId::Sbas),
            2 => Some(GnssId::Galileo),
            3 => Some(GnssId::BeiDou),
            4 => Some(GnssId::Imes),
            5 => Some(GnssId::Qzss),
            6 => Some(GnssId::Glonass),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            GnssId::Gps => 0,
            GnssId::Sbas => 1,
            GnssId::Galileo => 2,
            GnssId::BeiDou => 3,
            GnssId::Imes => 4,
            GnssId::Qzss => 5,
            GnssId::Glonass => 6,
        }
    }
}

/// A raw, checksum-verified frame as produced by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub class: u8,
    pub id: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Serializes the frame including sync characters and checksum.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.payload.len());
        out.push(SYNC_CHAR_1);
        out.push(SYNC_CHAR_2);
        out.push(self.class);
        out.push(self.id);
        out.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.payload);

        let mut ck = Checksum::default();
        for &b in &out[2..] {
            ck.update(b);
        }
        out.push(ck.ck_a());
        out.push(ck.ck_b());
        out
    }
}

/// Every UBX message the stack understands, plus a catch-all for frames we
/// scan correctly but do not interpret.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    NavPvt(nav::Pvt),
    NavSat(nav::Sat),
    AckAck(ack::Ack),
    AckNak(ack::Nak),
    CfgGnss(cfg::Gnss),
    CfgMsg(cfg::Msg),
    CfgRst(cfg::Rst),
    Unknown(Frame),
}

impl Message {
    /// Interprets a checksum-verified frame.
    pub fn decode(frame: &Frame) -> Result<Message, UbxError> {
        let mut reader = Reader::new(&frame.payload);
        match (frame.class, frame.id) {
            (class::NAV, nav::Pvt::MESSAGE_ID) => Ok(Message::NavPvt(nav::Pvt::read(&mut reader)?)),
            (class::NAV, nav::Sat::MESSAGE_ID) => Ok(Message::NavSat(nav::Sat::read(&mut reader)?)),
            (class::ACK, ack::Ack::MESSAGE_ID) => Ok(Message::AckAck(ack::Ack::read(&mut reader)?)),
            (class::ACK, ack::Nak::MESSAGE_ID) => Ok(Message::AckNak(ack::Nak::read(&mut reader)?)),
            (class::CFG, cfg::Gnss::MESSAGE_ID) => {
                Ok(Message::CfgGnss(cfg::Gnss::read(&mut reader)?))
            }
            (class::CFG, cfg::Msg::MESSAGE_ID) => Ok(Message::CfgMsg(cfg::Msg::read(&mut reader)?)),
            (class::CFG, cfg::Rst::MESSAGE_ID) => Ok(Message::CfgRst(cfg::Rst::read(&mut reader)?)),
            _ => Ok(Message::Unknown(frame.clone())),
        }
    }

    /// Serializes an outbound message into a complete frame.
    ///
    /// Only configuration messages travel towards the receiver; everything
    /// else reports `EncodingNotSupported`.
    pub fn encode(&self) -> Result<Vec<u8>, UbxError> {
        let (class, id, payload) = match self {
            Message::CfgGnss(gnss) => (class::CFG, cfg::Gnss::MESSAGE_ID, gnss.write()),
            Message::CfgMsg(msg) => (class::CFG, cfg::Msg::MESSAGE_ID, msg.write()),
            Message::CfgRst(rst) => (class::CFG, cfg::Rst::MESSAGE_ID, rst.write()),
            Message::NavPvt(_) => return Err(UbxError::EncodingNotSupported("nav-pvt")),
            Message::NavSat(_) => return Err(UbxError::EncodingNotSupported("nav-sat")),
            Message::AckAck(_) => return Err(UbxError::EncodingNotSupported("ack-ack")),
            Message::AckNak(_) => return Err(UbxError::EncodingNotSupported("ack-nak")),
            Message::Unknown(_) => return Err(UbxError::EncodingNotSupported("unknown")),
        };
        Ok(Frame { class, id, payload }.to_bytes())
    }
}
