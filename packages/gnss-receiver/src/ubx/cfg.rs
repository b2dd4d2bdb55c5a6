//! Configuration messages (class 0x06) sent towards the receiver.

use crate::ubx::{Reader, UbxError, Writer};

/// Per-constellation configuration block of CFG-GNSS.
///
/// `min_tracking_channels`/`max_tracking_channels` bound the channels the
/// receiver may dedicate to the constellation; the signal flag selects the
/// constellation's primary signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Constellation {
    pub enable: bool,
    pub min_tracking_channels: u8,
    pub max_tracking_channels: u8,
    /// Primary signal selected (L1C/A, E1OS, B1I or L1OF depending on the
    /// constellation).
    pub primary_signal: bool,
}

impl Constellation {
    pub fn enabled() -> Self {
        Self {
            enable: true,
            min_tracking_channels: 8,
            max_tracking_channels: 16,
            primary_signal: true,
        }
    }
}

/// GNSS system configuration (CFG-GNSS).
///
/// Absent constellations are left untouched by the receiver; present ones
/// are rewritten with the block's content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gnss {
    pub version: u8,
    pub tracking_channels_hw: u8,
    pub tracking_channels_used: u8,
    pub gps: Option<Constellation>,
    pub sbas: Option<Constellation>,
    pub galileo: Option<Constellation>,
    pub beidou: Option<Constellation>,
    pub imes: Option<Constellation>,
    pub qzss: Option<Constellation>,
    pub glonass: Option<Constellation>,
}

// Block ids per the interface description.
const GNSS_ID_GPS: u8 = 0;
const GNSS_ID_SBAS: u8 = 1;
const GNSS_ID_GALILEO: u8 = 2;
const GNSS_ID_BEIDOU: u8 = 3;
const GNSS_ID_IMES: u8 = 4;
const GNSS_ID_QZSS: u8 = 5;
const GNSS_ID_GLONASS: u8 = 6;

const FLAG_ENABLE: u32 = 1;
const FLAG_PRIMARY_SIGNAL: u32 = 0x01 << 16;

impl Gnss {
    pub const MESSAGE_ID: u8 = 0x3e;

    /// All-constellations-known default: GPS and GLONASS enabled, the rest
    /// explicitly disabled.
    pub fn gps_and_glonass() -> Self {
        Self {
            tracking_channels_used: 0xff,
            gps: Some(Constellation::enabled()),
            glonass: Some(Constellation::enabled()),
            sbas: Some(Constellation::default()),
            galileo: Some(Constellation::default()),
            beidou: Some(Constellation::default()),
            imes: Some(Constellation::default()),
            qzss: Some(Constellation::default()),
            ..Self::default()
        }
    }

    fn blocks(&self) -> [(u8, Option<Constellation>); 7] {
        [
            (GNSS_ID_GPS, self.gps),
            (GNSS_ID_SBAS, self.sbas),
            (GNSS_ID_GALILEO, self.galileo),
            (GNSS_ID_BEIDOU, self.beidou),
            (GNSS_ID_IMES, self.imes),
            (GNSS_ID_QZSS, self.qzss),
            (GNSS_ID_GLONASS, self.glonass),
        ]
    }

    pub fn write(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_u8(self.version);
        writer.write_u8(self.tracking_channels_hw);
        writer.write_u8(self.tracking_channels_used);
        let present = self.blocks().iter().filter(|(_, c)| c.is_some()).count();
        writer.write_u8(present as u8);

        for (id, block) in self.blocks() {
            let Some(block) = block else { continue };
            writer.write_u8(id);
            writer.write_u8(block.min_tracking_channels);
            writer.write_u8(block.max_tracking_channels);
            writer.write_u8(0);
            let mut flags = 0u32;
            if block.enable {
                flags |= FLAG_ENABLE;
            }
            if block.primary_signal {
                flags |= FLAG_PRIMARY_SIGNAL;
            }
            writer.write_u32(flags);
        }
        writer.into_payload()
    }

    pub fn read(reader: &mut Reader<'_>) -> Result<Self, UbxError> {
        let mut gnss = Gnss {
            version: reader.read_u8()?,
            tracking_channels_hw: reader.read_u8()?,
            tracking_channels_used: reader.read_u8()?,
            ..Gnss::default()
        };
        let blocks = reader.read_u8()?;

        for _ in 0..blocks {
            let id = reader.read_u8()?;
            let min_tracking_channels = reader.read_u8()?;
            let max_tracking_channels = reader.read_u8()?;
            reader.skip(1)?;
            let flags = reader.read_u32()?;
            let block = Constellation {
                enable: flags & FLAG_ENABLE != 0,
                min_tracking_channels,
                max_tracking_channels,
                primary_signal: flags & FLAG_PRIMARY_SIGNAL != 0,
            };
            let slot = match id {
                GNSS_ID_GPS => &mut gnss.gps,
                GNSS_ID_SBAS => &mut gnss.sbas,
                GNSS_ID_GALILEO => &mut gnss.galileo,
                GNSS_ID_BEIDOU => &mut gnss.beidou,
                GNSS_ID_IMES => &mut gnss.imes,
                GNSS_ID_QZSS => &mut gnss.qzss,
                GNSS_ID_GLONASS => &mut gnss.glonass,
                _ => {
                    return Err(UbxError::MalformedPayload {
                        message: "cfg-gnss",
                        reason: "unknown gnss id",
                    })
                }
            };
            *slot = Some(block);
        }
        Ok(gnss)
    }
}

/// Message rate configuration (CFG-MSG): one rate per target port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Msg {
    pub configured_class_id: u8,
    pub configured_message_id: u8,
    pub rate: [u8; 6],
}

impl Msg {
    pub const MESSAGE_ID: u8 = 0x01;

    /// Rate on the current port only.
    pub fn on_current_port(class_id: u8, message_id: u8, rate: u8) -> Self {
        Self {
            configured_class_id: class_id,
            configured_message_id: message_id,
            rate: [0, rate, 0, 0, 0, 0],
        }
    }

    pub fn write(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_u8(self.configured_class_id);
        writer.write_u8(self.configured_message_id);
        for rate in self.rate {
            writer.write_u8(rate);
        }
        writer.into_payload()
    }

    pub fn read(reader: &mut Reader<'_>) -> Result<Self, UbxError> {
        let configured_class_id = reader.read_u8()?;
        let configured_message_id = reader.read_u8()?;
        let mut rate = [0u8; 6];
        for slot in &mut rate {
            *slot = reader.read_u8()?;
        }
        Ok(Msg {
            configured_class_id,
            configured_message_id,
            rate,
        })
    }
}

bitflags::bitflags! {
    /// Battery-backed RAM sections cleared on reset (CFG-RST navBbrMask).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BbrSections: u16 {
        const EPHEMERIS = 1 << 0;
        const ALMANAC = 1 << 1;
        const HEALTH = 1 << 2;
        const KLOBUCHAR = 1 << 3;
        const POSITION = 1 << 4;
        const CLOCK_DRIFT = 1 << 5;
        const OSCILLATOR = 1 << 6;
        const UTC_CORRECTIONS = 1 << 7;
        const RTC = 1 << 8;
        const AUTONOMOUS = 1 << 15;
    }
}

impl BbrSections {
    /// Keep everything: hot start.
    pub fn hot_start() -> Self {
        Self::empty()
    }

    /// Drop ephemeris only: warm start.
    pub fn warm_start() -> Self {
        Self::EPHEMERIS
    }

    /// Drop everything: cold start.
    pub fn cold_start() -> Self {
        Self::all()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    Hardware = 0x00,
    ControlledSoftware = 0x01,
    ControlledSoftwareGnssOnly = 0x02,
    HardwareAfterShutdown = 0x04,
    GnssStop = 0x08,
    GnssStart = 0x09,
}

impl ResetMode {
    fn from_u8(raw: u8) -> Result<Self, UbxError> {
        match raw {
            0x00 => Ok(ResetMode::Hardware),
            0x01 => Ok(ResetMode::ControlledSoftware),
            0x02 => Ok(ResetMode::ControlledSoftwareGnssOnly),
            0x04 => Ok(ResetMode::HardwareAfterShutdown),
            0x08 => Ok(ResetMode::GnssStop),
            0x09 => Ok(ResetMode::GnssStart),
            _ => Err(UbxError::MalformedPayload {
                message: "cfg-rst",
                reason: "unknown reset mode",
            }),
        }
    }
}

/// Receiver reset (CFG-RST).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rst {
    pub sections: BbrSections,
    pub mode: ResetMode,
}

impl Rst {
    pub const MESSAGE_ID: u8 = 0x04;

    pub fn write(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_u16(self.sections.bits());
        writer.write_u8(self.mode as u8);
        writer.write_u8(0);
        writer.into_payload()
    }

    pub fn read(reader: &mut Reader<'_>) -> Result<Self, UbxError> {
        let sections = BbrSections::from_bits_truncate(reader.read_u16()?);
        let mode = ResetMode::from_u8(reader.read_u8()?)?;
        Ok(Rst { sections, mode })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ubx::{Frame, Message, Scanner};
    use crate::Scan;

    fn scan_round_trip(message: Message) {
        let bytes = message.encode().unwrap();
        let mut scanner = Scanner::new();
        let mut decoded = None;
        for &b in &bytes {
            if let Ok((Scan::Ready, _)) = scanner.update(b) {
                let frame = scanner.finalize().unwrap();
                decoded = Some(Message::decode(&frame).unwrap());
            }
        }
        assert_eq!(decoded, Some(message));
    }

    #[test]
    fn cfg_gnss_round_trips_through_the_scanner() {
        scan_round_trip(Message::CfgGnss(Gnss::gps_and_glonass()));
    }

    #[test]
    fn cfg_msg_round_trips_through_the_scanner() {
        scan_round_trip(Message::CfgMsg(Msg::on_current_port(0x01, 0x07, 1)));
    }

    #[test]
    fn cfg_rst_round_trips_through_the_scanner() {
        scan_round_trip(Message::CfgRst(Rst {
            sections: BbrSections::cold_start(),
            mode: ResetMode::ControlledSoftware,
        }));
    }

    #[test]
    fn cfg_gnss_write_layout() {
        let gnss = Gnss {
            gps: Some(Constellation {
                enable: true,
                min_tracking_channels: 8,
                max_tracking_channels: 16,
                primary_signal: true,
            }),
            ..Gnss::default()
        };
        let payload = gnss.write();
        assert_eq!(payload.len(), 4 + 8);
        assert_eq!(payload[3], 1); // one block
        assert_eq!(payload[4], 0); // gps id
        assert_eq!(payload[5], 8);
        assert_eq!(payload[6], 16);
        assert_eq!(&payload[8..12], &[0x01, 0x00, 0x01, 0x00]); // enable + L1C/A
    }

    #[test]
    fn nav_messages_refuse_to_encode() {
        let frame = Frame {
            class: 0xff,
            id: 0xff,
            payload: vec![],
        };
        assert!(matches!(
            Message::Unknown(frame).encode(),
            Err(UbxError::EncodingNotSupported(_))
        ));
    }
}
