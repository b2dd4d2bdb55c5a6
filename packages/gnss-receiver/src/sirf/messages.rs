//! Typed SiRF messages.

use crate::sirf::{Reader, SirfError, Writer};

bitflags::bitflags! {
    /// Reset configuration bits of InitializeDataSource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResetConfiguration: u8 {
        const DATA_VALID = 1 << 0;
        const CLEAR_EPHEMERIS_DATA = 1 << 1;
        const CLEAR_ALL_HISTORY = 1 << 2;
        const FACTORY_RESET = 1 << 3;
        const ENABLE_NAV_LIB_DATA = 1 << 4;
        const ENABLE_DEBUG_DATA = 1 << 5;
        const RTC_IS_NOT_PRECISE = 1 << 6;
        const RESET = 1 << 7;
    }
}

/// Seeds the receiver with a coarse position, clock drift and time to cut
/// down time to first fix (message id 128).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeDataSource {
    /// ECEF X coordinate, meters.
    pub ecef_x: i32,
    /// ECEF Y coordinate, meters.
    pub ecef_y: i32,
    /// ECEF Z coordinate, meters.
    pub ecef_z: i32,
    /// Clock drift, Hz.
    pub clock_drift: i32,
    /// GPS time of week, seconds.
    pub time_of_week: u32,
    /// Extended GPS week number.
    pub week_number: u16,
    /// Number of channels to track.
    pub channels: u8,
    pub reset_configuration: ResetConfiguration,
}

impl InitializeDataSource {
    pub const MESSAGE_ID: u8 = 128;
    pub const MAX_NUMBER_CHANNELS: u8 = 12;

    pub fn write(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_i32(self.ecef_x);
        writer.write_i32(self.ecef_y);
        writer.write_i32(self.ecef_z);
        writer.write_i32(self.clock_drift);
        writer.write_u32(self.time_of_week);
        writer.write_u16(self.week_number);
        writer.write_u8(self.channels);
        writer.write_u8(self.reset_configuration.bits());
        writer.into_payload()
    }

    pub fn read(reader: &mut Reader<'_>) -> Result<Self, SirfError> {
        Ok(InitializeDataSource {
            ecef_x: reader.read_i32()?,
            ecef_y: reader.read_i32()?,
            ecef_z: reader.read_i32()?,
            clock_drift: reader.read_i32()?,
            time_of_week: reader.read_u32()?,
            week_number: reader.read_u16()?,
            channels: reader.read_u8()?,
            reset_configuration: ResetConfiguration::from_bits_truncate(reader.read_u8()?),
        })
    }
}

/// Switches the receiver to another protocol (message id 0x87). For most
/// firmware the default is SiRF binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetProtocol {
    Null = 0,
    SirfBinary = 1,
    Nmea = 2,
    Ascii = 3,
    Rtcm = 4,
    User1 = 5,
    SirfLoc = 6,
    Statistic = 7,
}

impl SetProtocol {
    pub const MESSAGE_ID: u8 = 0x87;

    pub fn write(&self) -> Vec<u8> {
        vec![*self as u8]
    }

    pub fn read(reader: &mut Reader<'_>) -> Result<Self, SirfError> {
        match reader.read_u8()? {
            0 => Ok(SetProtocol::Null),
            1 => Ok(SetProtocol::SirfBinary),
            2 => Ok(SetProtocol::Nmea),
            3 => Ok(SetProtocol::Ascii),
            4 => Ok(SetProtocol::Rtcm),
            5 => Ok(SetProtocol::User1),
            6 => Ok(SetProtocol::SirfLoc),
            7 => Ok(SetProtocol::Statistic),
            _ => Err(SirfError::Truncated),
        }
    }
}

/// Adjusts how often the receiver emits a given message (message id 166).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetMessageRate {
    /// Mode 0 configures one message.
    pub mode: u8,
    pub message_id: u8,
    /// Seconds between transmissions; 0 disables the message.
    pub cycle_period: u8,
}

impl SetMessageRate {
    pub const MESSAGE_ID: u8 = 166;

    pub fn write(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_u8(self.mode);
        writer.write_u8(self.message_id);
        writer.write_u8(self.cycle_period);
        writer.write_u8(0);
        writer.write_u8(0);
        writer.write_u8(0);
        writer.write_u8(0);
        writer.into_payload()
    }

    pub fn read(reader: &mut Reader<'_>) -> Result<Self, SirfError> {
        let mode = reader.read_u8()?;
        let message_id = reader.read_u8()?;
        let cycle_period = reader.read_u8()?;
        Ok(SetMessageRate {
            mode,
            message_id,
            cycle_period,
        })
    }
}

/// The receiver's complete geodetic solution (message id 41).
///
/// Raw wire scaling is kept in the fields; the accessor methods convert to SI
/// units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeodeticNavigationData {
    pub nav_valid: u16,
    pub nav_type: u16,
    pub extended_week_number: u16,
    /// GPS time of week, 10 ms units.
    pub time_of_week: u32,
    pub utc_year: u16,
    pub utc_month: u8,
    pub utc_day: u8,
    pub utc_hour: u8,
    pub utc_minute: u8,
    /// Seconds scaled by 1e-3.
    pub utc_second: u16,
    pub satellite_id_list: u32,
    /// Degrees scaled by 1e-7, positive north.
    pub latitude: i32,
    /// Degrees scaled by 1e-7, positive east.
    pub longitude: i32,
    /// Meters scaled by 1e-2.
    pub altitude_from_ellipsoid: i32,
    /// Meters scaled by 1e-2.
    pub altitude_from_msl: i32,
    pub map_datum: u8,
    /// m/s scaled by 1e-2.
    pub speed_over_ground: u16,
    /// Degrees scaled by 1e-2, clockwise from true north.
    pub course_over_ground: u16,
    pub magnetic_variation: i16,
    /// m/s scaled by 1e-2.
    pub climb_rate: i16,
    /// deg/s scaled by 1e-2.
    pub heading_rate: i16,
    /// Meters scaled by 1e-2.
    pub estimated_horizontal_position_error: u32,
    /// Meters scaled by 1e-2.
    pub estimated_vertical_position_error: u32,
    pub estimated_time_error: u32,
    pub estimated_horizontal_velocity_error: u16,
    pub clock_bias: u32,
    pub clock_bias_error: u32,
    pub clock_drift: i32,
    pub clock_drift_error: u32,
    pub distance: u32,
    pub distance_error: u16,
    pub heading_error: u16,
    pub svs_in_fix: u8,
    /// Scaled by 0.2.
    pub hdop: u8,
    pub additional_mode_info: u8,
}

impl GeodeticNavigationData {
    pub const MESSAGE_ID: u8 = 41;

    pub fn read(reader: &mut Reader<'_>) -> Result<Self, SirfError> {
        Ok(GeodeticNavigationData {
            nav_valid: reader.read_u16()?,
            nav_type: reader.read_u16()?,
            extended_week_number: reader.read_u16()?,
            time_of_week: reader.read_u32()?,
            utc_year: reader.read_u16()?,
            utc_month: reader.read_u8()?,
            utc_day: reader.read_u8()?,
            utc_hour: reader.read_u8()?,
            utc_minute: reader.read_u8()?,
            utc_second: reader.read_u16()?,
            satellite_id_list: reader.read_u32()?,
            latitude: reader.read_i32()?,
            longitude: reader.read_i32()?,
            altitude_from_ellipsoid: reader.read_i32()?,
            altitude_from_msl: reader.read_i32()?,
            map_datum: reader.read_u8()?,
            speed_over_ground: reader.read_u16()?,
            course_over_ground: reader.read_u16()?,
            magnetic_variation: reader.read_i16()?,
            climb_rate: reader.read_i16()?,
            heading_rate: reader.read_i16()?,
            estimated_horizontal_position_error: reader.read_u32()?,
            estimated_vertical_position_error: reader.read_u32()?,
            estimated_time_error: reader.read_u32()?,
            estimated_horizontal_velocity_error: reader.read_u16()?,
            clock_bias: reader.read_u32()?,
            clock_bias_error: reader.read_u32()?,
            clock_drift: reader.read_i32()?,
            clock_drift_error: reader.read_u32()?,
            distance: reader.read_u32()?,
            distance_error: reader.read_u16()?,
            heading_error: reader.read_u16()?,
            svs_in_fix: reader.read_u8()?,
            hdop: reader.read_u8()?,
            additional_mode_info: reader.read_u8()?,
        })
    }

    /// A fix is valid when every nav-valid bit is clear.
    pub fn is_valid_fix(&self) -> bool {
        self.nav_valid == 0
    }

    pub fn latitude_degrees(&self) -> f64 {
        self.latitude as f64 * 1e-7
    }

    pub fn longitude_degrees(&self) -> f64 {
        self.longitude as f64 * 1e-7
    }

    pub fn altitude_msl_meters(&self) -> f64 {
        self.altitude_from_msl as f64 * 1e-2
    }

    pub fn speed_over_ground_mps(&self) -> f64 {
        self.speed_over_ground as f64 * 1e-2
    }

    pub fn course_over_ground_degrees(&self) -> f64 {
        self.course_over_ground as f64 * 1e-2
    }

    pub fn horizontal_position_error_meters(&self) -> f64 {
        self.estimated_horizontal_position_error as f64 * 1e-2
    }

    pub fn vertical_position_error_meters(&self) -> f64 {
        self.estimated_vertical_position_error as f64 * 1e-2
    }

    pub fn hdop_value(&self) -> f64 {
        self.hdop as f64 * 0.2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sirf::{Message, Scanner};
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
    fn initialize_data_source_round_trips() {
        scan_round_trip(Message::InitializeDataSource(InitializeDataSource {
            ecef_x: 4_069_967,
            ecef_y: 850_197,
            ecef_z: 4_763_404,
            clock_drift: 96_000,
            time_of_week: 345_600,
            week_number: 1903,
            channels: InitializeDataSource::MAX_NUMBER_CHANNELS,
            reset_configuration: ResetConfiguration::DATA_VALID
                | ResetConfiguration::RTC_IS_NOT_PRECISE,
        }));
    }

    #[test]
    fn set_protocol_round_trips() {
        scan_round_trip(Message::SetProtocol(SetProtocol::SirfBinary));
    }

    #[test]
    fn set_message_rate_round_trips() {
        scan_round_trip(Message::SetMessageRate(SetMessageRate {
            mode: 0,
            message_id: GeodeticNavigationData::MESSAGE_ID,
            cycle_period: 1,
        }));
    }

    #[test]
    fn initialize_data_source_payload_is_24_bytes() {
        let ids = InitializeDataSource {
            ecef_x: 0,
            ecef_y: 0,
            ecef_z: 0,
            clock_drift: 0,
            time_of_week: 0,
            week_number: 0,
            channels: 12,
            reset_configuration: ResetConfiguration::empty(),
        };
        // 25 bytes on the wire once the message id is prepended.
        assert_eq!(ids.write().len(), 24);
    }

    #[test]
    fn decodes_geodetic_navigation_data() {
        let mut w = Writer::new();
        w.write_u16(0); // nav valid
        w.write_u16(0x0004); // nav type
        w.write_u16(1903);
        w.write_u32(34_560_000);
        w.write_u16(2016);
        w.write_u8(7);
        w.write_u8(14);
        w.write_u8(8);
        w.write_u8(30);
        w.write_u16(59_000);
        w.write_u32(0x0000_00ff);
        w.write_i32(481_170_000); // 48.117°
        w.write_i32(116_400_000); // 11.64°
        w.write_i32(54_540); // 545.4 m
        w.write_i32(49_850); // 498.5 m
        w.write_u8(21);
        w.write_u16(224); // 2.24 m/s
        w.write_u16(8_440); // 84.4°
        w.write_i16(0);
        w.write_i16(12);
        w.write_i16(0);
        w.write_u32(500); // ehpe 5 m
        w.write_u32(800); // evpe 8 m
        w.write_u32(0);
        w.write_u16(0);
        w.write_u32(0);
        w.write_u32(0);
        w.write_i32(0);
        w.write_u32(0);
        w.write_u32(0);
        w.write_u16(0);
        w.write_u16(0);
        w.write_u8(8);
        w.write_u8(6); // hdop 1.2
        w.write_u8(0);
        let payload = w.into_payload();
        assert_eq!(payload.len(), 90);

        let geo = GeodeticNavigationData::read(&mut Reader::new(&payload)).unwrap();
        assert!(geo.is_valid_fix());
        assert!((geo.latitude_degrees() - 48.117).abs() < 1e-9);
        assert!((geo.longitude_degrees() - 11.64).abs() < 1e-9);
        assert!((geo.altitude_msl_meters() - 498.5).abs() < 1e-9);
        assert!((geo.speed_over_ground_mps() - 2.24).abs() < 1e-9);
        assert!((geo.course_over_ground_degrees() - 84.4).abs() < 1e-9);
        assert!((geo.horizontal_position_error_meters() - 5.0).abs() < 1e-9);
        assert_eq!(geo.svs_in_fix, 8);
        assert!((geo.hdop_value() - 1.2).abs() < 1e-9);
    }

    #[test]
    fn truncated_geodetic_payload_is_rejected() {
        let payload = vec![0u8; 40];
        assert_eq!(
            GeodeticNavigationData::read(&mut Reader::new(&payload)),
            Err(SirfError::Truncated)
        );
    }
}
