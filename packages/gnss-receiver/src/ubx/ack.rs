//! Acknowledgement messages (class 0x05) answering CFG requests.

use crate::ubx::{Reader, UbxError};

/// Message acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Class id of the acknowledged message.
    pub class_id: u8,
    /// Message id of the acknowledged message.
    pub message_id: u8,
}

impl Ack {
    pub const MESSAGE_ID: u8 = 0x01;

    pub fn read(reader: &mut Reader<'_>) -> Result<Self, UbxError> {
        Ok(Ack {
            class_id: reader.read_u8()?,
            message_id: reader.read_u8()?,
        })
    }
}

/// Message not acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nak {
    /// Class id of the rejected message.
    pub class_id: u8,
    /// Message id of the rejected message.
    pub message_id: u8,
}

impl Nak {
    pub const MESSAGE_ID: u8 = 0x00;

    pub fn read(reader: &mut Reader<'_>) -> Result<Self, UbxError> {
        Ok(Nak {
            class_id: reader.read_u8()?,
            message_id: reader.read_u8()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ubx::{class, Frame, Message};

    #[test]
    fn decodes_ack_and_nak() {
        let ack = Frame {
            class: class::ACK,
            id: Ack::MESSAGE_ID,
            payload: vec![0x06, 0x3e],
        };
        assert_eq!(
            Message::decode(&ack),
            Ok(Message::AckAck(Ack {
                class_id: 0x06,
                message_id: 0x3e
            }))
        );

        let nak = Frame {
            class: class::ACK,
            id: Nak::MESSAGE_ID,
            payload: vec![0x06, 0x01],
        };
        assert_eq!(
            Message::decode(&nak),
            Ok(Message::AckNak(Nak {
                class_id: 0x06,
                message_id: 0x01
            }))
        );
    }
}
