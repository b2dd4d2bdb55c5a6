//! SiRF binary protocol.
//!
//! A frame is `0xA0 0xA2 | length (be16) | message id | payload | checksum
//! (be16) | 0xB0 0xB3`. The length counts message id plus payload; the
//! checksum is the byte sum over the same range, modulo 2^15.

mod checksum;
mod codec;
mod messages;
mod scanner;

pub use checksum::Checksum;
pub use codec::{Reader, Writer};
pub use messages::{
    GeodeticNavigationData, InitializeDataSource, ResetConfiguration, SetMessageRate, SetProtocol,
};
pub use scanner::Scanner;

use thiserror::Error;

pub mod begin {
    pub const SYNC_CHAR_1: u8 = 0xa0;
    pub const SYNC_CHAR_2: u8 = 0xa2;
}

pub mod end {
    pub const SYNC_CHAR_1: u8 = 0xb0;
    pub const SYNC_CHAR_2: u8 = 0xb3;
}

/// Longest frame the scanner accepts; SiRF payloads top out far below this.
pub const MAX_FRAME_LEN: usize = 1024;

/// Failures while scanning, decoding or encoding SiRF frames.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SirfError {
    #[error("frame length {0} exceeds the maximum frame size")]
    FrameTooLarge(usize),
    #[error("frame length must cover at least the message id")]
    FrameTooSmall,
    #[error("checksum mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { expected: u16, computed: u16 },
    #[error("missing trailing sync characters")]
    BadTrailer,
    #[error("read beyond the end of the payload")]
    Truncated,
    #[error("{0} messages cannot be encoded")]
    EncodingNotSupported(&'static str),
    #[error("scanner holds no complete frame")]
    Incomplete,
}

/// A raw, checksum-verified frame: message id plus payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub message_id: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Serializes the frame including sync markers, length and checksum.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload.len() + 9);
        out.push(begin::SYNC_CHAR_1);
        out.push(begin::SYNC_CHAR_2);
        out.extend_from_slice(&((self.payload.len() as u16 + 1).to_be_bytes()));
        out.push(self.message_id);
        out.extend_from_slice(&self.payload);

        let mut ck = Checksum::default();
        ck.update(self.message_id);
        for &b in &self.payload {
            ck.update(b);
        }
        out.extend_from_slice(&ck.value().to_be_bytes());
        out.push(end::SYNC_CHAR_1);
        out.push(end::SYNC_CHAR_2);
        out
    }
}

/// Every SiRF message the stack understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    GeodeticNavigationData(GeodeticNavigationData),
    InitializeDataSource(InitializeDataSource),
    SetProtocol(SetProtocol),
    SetMessageRate(SetMessageRate),
    Unknown(Frame),
}

impl Message {
    /// Interprets a checksum-verified frame.
    pub fn decode(frame: &Frame) -> Result<Message, SirfError> {
        let mut reader = Reader::new(&frame.payload);
        match frame.message_id {
            GeodeticNavigationData::MESSAGE_ID => Ok(Message::GeodeticNavigationData(
                GeodeticNavigationData::read(&mut reader)?,
            )),
            InitializeDataSource::MESSAGE_ID => Ok(Message::InitializeDataSource(
                InitializeDataSource::read(&mut reader)?,
            )),
            SetProtocol::MESSAGE_ID => Ok(Message::SetProtocol(SetProtocol::read(&mut reader)?)),
            SetMessageRate::MESSAGE_ID => {
                Ok(Message::SetMessageRate(SetMessageRate::read(&mut reader)?))
            }
            _ => Ok(Message::Unknown(frame.clone())),
        }
    }

    /// Serializes an outbound message into a complete frame.
    pub fn encode(&self) -> Result<Vec<u8>, SirfError> {
        let (message_id, payload) = match self {
            Message::InitializeDataSource(ids) => (InitializeDataSource::MESSAGE_ID, ids.write()),
            Message::SetProtocol(sp) => (SetProtocol::MESSAGE_ID, sp.write()),
            Message::SetMessageRate(smr) => (SetMessageRate::MESSAGE_ID, smr.write()),
            Message::GeodeticNavigationData(_) => {
                return Err(SirfError::EncodingNotSupported("geodetic-navigation-data"))
            }
            Message::Unknown(_) => return Err(SirfError::EncodingNotSupported("unknown")),
        };
        Ok(Frame {
            message_id,
            payload,
        }
        .to_bytes())
    }
}
