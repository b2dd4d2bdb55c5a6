//! Navigation output messages (class 0x01).

use crate::ubx::{GnssId, Reader, UbxError};

bitflags::bitflags! {
    /// Validity flags carried in NAV-PVT byte 11.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DateTimeValidity: u8 {
        const VALID_DATE = 1 << 0;
        const VALID_TIME = 1 << 1;
        const FULLY_RESOLVED = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixType {
    NoFix = 0,
    DeadReckoning = 1,
    Fix2d = 2,
    Fix3d = 3,
    GnssAndDeadReckoning = 4,
    OnlyTimeFix = 5,
}

impl FixType {
    fn from_u8(raw: u8) -> Result<Self, UbxError> {
        match raw {
            0 => Ok(FixType::NoFix),
            1 => Ok(FixType::DeadReckoning),
            2 => Ok(FixType::Fix2d),
            3 => Ok(FixType::Fix3d),
            4 => Ok(FixType::GnssAndDeadReckoning),
            5 => Ok(FixType::OnlyTimeFix),
            _ => Err(UbxError::MalformedPayload {
                message: "nav-pvt",
                reason: "unknown fix type",
            }),
        }
    }
}

/// Position, velocity and time solution (NAV-PVT).
///
/// Angles are scaled to degrees, heights stay in millimeters and speeds in
/// millimeters per second as transmitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Pvt {
    pub itow: u32,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub date_time_validity: DateTimeValidity,
    /// Time accuracy estimate, ns.
    pub time_accuracy: u32,
    pub nanoseconds: i32,
    pub fix_type: FixType,
    pub fix_status_flags: u8,
    pub additional_flags: u8,
    pub satellite_count: u8,
    /// Longitude, degrees.
    pub longitude: f64,
    /// Latitude, degrees.
    pub latitude: f64,
    pub height: Height,
    pub accuracy: Accuracy,
    /// NED velocity, mm/s.
    pub velocity: Velocity,
    /// Ground speed (2D), mm/s.
    pub speed_over_ground: i32,
    pub heading: HeadingPair,
    /// Position DOP, scaled by 0.01.
    pub pdop: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Height {
    /// Above ellipsoid, mm.
    pub above_ellipsoid: i32,
    /// Above mean sea level, mm.
    pub above_msl: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accuracy {
    /// Horizontal accuracy estimate, mm.
    pub horizontal: u32,
    /// Vertical accuracy estimate, mm.
    pub vertical: u32,
    /// Speed accuracy estimate, mm/s.
    pub speed: u32,
    /// Heading accuracy estimate, degrees.
    pub heading: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Velocity {
    pub north: i32,
    pub east: i32,
    pub down: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingPair {
    /// Heading of motion, degrees.
    pub motion: f64,
    /// Heading of vehicle, degrees.
    pub vehicle: f64,
}

impl Pvt {
    pub const MESSAGE_ID: u8 = 0x07;

    pub fn read(reader: &mut Reader<'_>) -> Result<Self, UbxError> {
        let itow = reader.read_u32()?;
        let year = reader.read_u16()?;
        let month = reader.read_u8()?;
        let day = reader.read_u8()?;
        let hour = reader.read_u8()?;
        let minute = reader.read_u8()?;
        let second = reader.read_u8()?;
        let date_time_validity = DateTimeValidity::from_bits_truncate(reader.read_u8()?);
        let time_accuracy = reader.read_u32()?;
        let nanoseconds = reader.read_i32()?;
        let fix_type = FixType::from_u8(reader.read_u8()?)?;
        let fix_status_flags = reader.read_u8()?;
        let additional_flags = reader.read_u8()?;
        let satellite_count = reader.read_u8()?;
        let longitude = reader.read_i32()? as f64 * 1e-7;
        let latitude = reader.read_i32()? as f64 * 1e-7;
        let height = Height {
            above_ellipsoid: reader.read_i32()?,
            above_msl: reader.read_i32()?,
        };
        let horizontal = reader.read_u32()?;
        let vertical = reader.read_u32()?;
        let velocity = Velocity {
            north: reader.read_i32()?,
            east: reader.read_i32()?,
            down: reader.read_i32()?,
        };
        let speed_over_ground = reader.read_i32()?;
        let heading_of_motion = reader.read_i32()? as f64 * 1e-5;
        let speed_accuracy = reader.read_u32()?;
        let heading_accuracy = reader.read_u32()? as f64 * 1e-5;
        let pdop = reader.read_u16()?;
        reader.skip(6)?;
        let heading_of_vehicle = reader.read_i32()? as f64 * 1e-5;

        Ok(Pvt {
            itow,
            year,
            month,
            day,
            hour,
            minute,
            second,
            date_time_validity,
            time_accuracy,
            nanoseconds,
            fix_type,
            fix_status_flags,
            additional_flags,
            satellite_count,
            longitude,
            latitude,
            height,
            accuracy: Accuracy {
                horizontal,
                vertical,
                speed: speed_accuracy,
                heading: heading_accuracy,
            },
            velocity,
            speed_over_ground,
            heading: HeadingPair {
                motion: heading_of_motion,
                vehicle: heading_of_vehicle,
            },
            pdop,
        })
    }
}

bitflags::bitflags! {
    /// Per-satellite status bits from NAV-SAT (lower byte of the flag word).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SatInfoFlags: u32 {
        const SV_USED = 1 << 3;
        const HEALTHY = 1 << 4;
        const DIFF_CORRECTIONS = 1 << 6;
        const SMOOTHED = 1 << 7;
        const EPHEMERIS_AVAILABLE = 1 << 11;
        const ALMANAC_AVAILABLE = 1 << 12;
    }
}

/// Satellite information (NAV-SAT).
#[derive(Debug, Clone, PartialEq)]
pub struct Sat {
    pub itow: u32,
    pub version: u8,
    pub info: Vec<SatInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SatInfo {
    pub gnss_id: GnssId,
    pub satellite_id: u8,
    /// Carrier to noise ratio, dB-Hz.
    pub carrier_to_noise: u8,
    /// Elevation, degrees; invalid outside ±90.
    pub elevation: i8,
    /// Azimuth, degrees; invalid outside 0..360.
    pub azimuth: i16,
    /// Pseudo-range residual, meters.
    pub pseudo_range_residual: f64,
    pub flags: SatInfoFlags,
}

impl Sat {
    pub const MESSAGE_ID: u8 = 0x35;

    pub fn read(reader: &mut Reader<'_>) -> Result<Self, UbxError> {
        let itow = reader.read_u32()?;
        let version = reader.read_u8()?;
        let count = reader.read_u8()? as usize;
        reader.skip(2)?;

        let mut info = Vec::with_capacity(count);
        for _ in 0..count {
            let gnss_id = GnssId::from_u8(reader.read_u8()?).ok_or(UbxError::MalformedPayload {
                message: "nav-sat",
                reason: "unknown gnss id",
            })?;
            info.push(SatInfo {
                gnss_id,
                satellite_id: reader.read_u8()?,
                carrier_to_noise: reader.read_u8()?,
                elevation: reader.read_i8()?,
                azimuth: reader.read_i16()?,
                pseudo_range_residual: reader.read_i16()? as f64 * 0.1,
                flags: SatInfoFlags::from_bits_truncate(reader.read_u32()?),
            });
        }

        Ok(Sat {
            itow,
            version,
            info,
        })
    }
}
