//! # location-types
//!
//! Shared positioning types for the locationd workspace.
//!
//! Everything the daemon hands between engine, sessions and the IPC
//! surface lives here; the daemon's GNSS provider maps decoded wire
//! messages into these types.
//!
//! ## Unit conventions
//!
//! - Latitude/longitude/heading in degrees (WGS84)
//! - Altitude and accuracy in meters
//! - Velocity as ground speed in meters per second
//!
//! The unit wrappers are deliberately distinct types so that a heading can
//! never be fed where an altitude is expected.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use thiserror::Error;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Validation failures raised by the checked constructors in this crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("latitude {0} outside [-90, 90] degrees")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} outside [-180, 180] degrees")]
    LongitudeOutOfRange(f64),
    #[error("heading {0} outside [0, 360) degrees")]
    HeadingOutOfRange(f64),
    #[error("velocity {0} is negative")]
    NegativeVelocity(f64),
}

// ── Units ─────────────────────────────────────────────────────────────────────

/// An angle in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Degrees(pub f64);

/// A length in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Meters(pub f64);

/// A speed in meters per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct MetersPerSecond(pub f64);

impl std::fmt::Display for Degrees {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.0)
    }
}

impl std::fmt::Display for Meters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}m", self.0)
    }
}

impl std::fmt::Display for MetersPerSecond {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}m/s", self.0)
    }
}

// ── Timestamps ────────────────────────────────────────────────────────────────

fn clock_origin() -> Instant {
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    *ORIGIN.get_or_init(Instant::now)
}

/// A monotonic, high-resolution timestamp captured at sample time.
///
/// Measured against a process-wide origin so values compare across threads
/// and serialize as plain microsecond counts on the IPC wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(Duration);

impl Timestamp {
    /// Captures the current monotonic time.
    pub fn now() -> Self {
        Self(clock_origin().elapsed())
    }

    pub const fn from_micros(micros: u64) -> Self {
        Self(Duration::from_micros(micros))
    }

    pub fn as_micros(&self) -> u64 {
        self.0.as_micros() as u64
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0 + rhs)
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Timestamp) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.as_micros())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u64::deserialize(deserializer).map(Timestamp::from_micros)
    }
}

// ── Position ──────────────────────────────────────────────────────────────────

/// Horizontal and vertical accuracy estimates, when the source reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Accuracy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizontal: Option<Meters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical: Option<Meters>,
}

/// A WGS84 position fix.
///
/// Latitude and longitude are validated on construction; altitude is
/// unconstrained. Equality compares every present field, accuracy included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    latitude: Degrees,
    longitude: Degrees,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<Meters>,
    #[serde(default)]
    pub accuracy: Accuracy,
}

impl Position {
    pub fn new(latitude: Degrees, longitude: Degrees) -> Result<Self, Error> {
        if !(-90.0..=90.0).contains(&latitude.0) {
            return Err(Error::LatitudeOutOfRange(latitude.0));
        }
        if !(-180.0..=180.0).contains(&longitude.0) {
            return Err(Error::LongitudeOutOfRange(longitude.0));
        }
        Ok(Self {
            latitude,
            longitude,
            altitude: None,
            accuracy: Accuracy::default(),
        })
    }

    pub fn with_altitude(mut self, altitude: Meters) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_horizontal_accuracy(mut self, accuracy: Meters) -> Self {
        self.accuracy.horizontal = Some(accuracy);
        self
    }

    pub fn with_vertical_accuracy(mut self, accuracy: Meters) -> Self {
        self.accuracy.vertical = Some(accuracy);
        self
    }

    pub fn latitude(&self) -> Degrees {
        self.latitude
    }

    pub fn longitude(&self) -> Degrees {
        self.longitude
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}", self.latitude, self.longitude)?;
        if let Some(alt) = self.altitude {
            write!(f, ", alt {alt}")?;
        }
        if let Some(hor) = self.accuracy.horizontal {
            write!(f, ", ±{hor}")?;
        }
        write!(f, ")")
    }
}

// ── Heading & velocity ────────────────────────────────────────────────────────

/// A course over ground in degrees, [0, 360).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Heading(Degrees);

impl Heading {
    pub fn new(degrees: Degrees) -> Result<Self, Error> {
        if !(0.0..360.0).contains(&degrees.0) {
            return Err(Error::HeadingOutOfRange(degrees.0));
        }
        Ok(Self(degrees))
    }

    pub fn degrees(&self) -> Degrees {
        self.0
    }
}

/// A non-negative ground speed.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Velocity(MetersPerSecond);

impl Velocity {
    pub fn new(speed: MetersPerSecond) -> Result<Self, Error> {
        if speed.0 < 0.0 {
            return Err(Error::NegativeVelocity(speed.0));
        }
        Ok(Self(speed))
    }

    pub fn speed(&self) -> MetersPerSecond {
        self.0
    }
}

// ── Updates ───────────────────────────────────────────────────────────────────

/// A value paired with the monotonic timestamp at which it was sampled.
///
/// The timestamp is captured at sample time, not receive time; two updates
/// compare equal only if both value and timestamp match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Update<T> {
    pub value: T,
    pub when: Timestamp,
}

impl<T> Update<T> {
    /// Wraps `value`, stamping it with the current monotonic time.
    pub fn new(value: T) -> Self {
        Self {
            value,
            when: Timestamp::now(),
        }
    }

    pub fn with_timestamp(value: T, when: Timestamp) -> Self {
        Self { value, when }
    }
}

// ── Space vehicles ────────────────────────────────────────────────────────────

/// The satellite system a space vehicle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GnssId {
    Gps,
    Sbas,
    Galileo,
    Beidou,
    Imes,
    Qzss,
    Glonass,
}

bitflags::bitflags! {
    /// Status bits reported per satellite observation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpaceVehicleFlags: u8 {
        const USED_IN_FIX = 1 << 0;
        const HAS_EPHEMERIS = 1 << 1;
        const HAS_ALMANAC = 1 << 2;
    }
}

impl Default for SpaceVehicleFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl Serialize for SpaceVehicleFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for SpaceVehicleFlags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u8::deserialize(deserializer).map(Self::from_bits_truncate)
    }
}

/// Uniquely identifies a satellite across constellations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpaceVehicleKey {
    pub gnss_id: GnssId,
    pub satellite_id: u16,
}

/// A single satellite observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpaceVehicle {
    pub key: SpaceVehicleKey,
    /// Carrier-to-noise density, dB-Hz.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snr: Option<f64>,
    /// Elevation above the horizon, degrees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation: Option<Degrees>,
    /// Azimuth from true north, degrees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azimuth: Option<Degrees>,
    #[serde(default)]
    pub flags: SpaceVehicleFlags,
}

impl SpaceVehicle {
    pub fn new(gnss_id: GnssId, satellite_id: u16) -> Self {
        Self {
            key: SpaceVehicleKey {
                gnss_id,
                satellite_id,
            },
            snr: None,
            elevation: None,
            azimuth: None,
            flags: SpaceVehicleFlags::empty(),
        }
    }
}

// ── Criteria ──────────────────────────────────────────────────────────────────

/// Which update dimensions a client needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Requires {
    pub position: bool,
    pub altitude: bool,
    pub velocity: bool,
    pub heading: bool,
}

/// Per-dimension accuracy ceilings; `None` means "anything goes".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracyRequirements {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizontal: Option<Meters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical: Option<Meters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<MetersPerSecond>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<Degrees>,
}

/// A client's requirements toward the engine: required dimensions plus
/// accuracy ceilings per dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    #[serde(default)]
    pub requires: Requires,
    #[serde(default)]
    pub accuracy: AccuracyRequirements,
}

fn ceiling_satisfies<T: PartialOrd + Copy>(ours: Option<T>, wanted: Option<T>) -> bool {
    match (ours, wanted) {
        (_, None) => true,
        (Some(ours), Some(wanted)) => ours <= wanted,
        (None, Some(_)) => false,
    }
}

fn ceiling_merge<T: PartialOrd + Copy>(lhs: Option<T>, rhs: Option<T>) -> Option<T> {
    match (lhs, rhs) {
        (Some(l), Some(r)) => Some(if l <= r { l } else { r }),
        (l, None) => l,
        (None, r) => r,
    }
}

impl Criteria {
    /// Convenience: a criteria requiring only a position fix.
    pub fn position_only() -> Self {
        Self {
            requires: Requires {
                position: true,
                ..Requires::default()
            },
            accuracy: AccuracyRequirements::default(),
        }
    }

    /// Returns true iff these criteria cover everything `other` asks for:
    /// every dimension `other` requires is required here, and every accuracy
    /// ceiling in `other` is met or undercut here.
    pub fn satisfies(&self, other: &Criteria) -> bool {
        if other.requires.position && !self.requires.position {
            return false;
        }
        if other.requires.altitude && !self.requires.altitude {
            return false;
        }
        if other.requires.velocity && !self.requires.velocity {
            return false;
        }
        if other.requires.heading && !self.requires.heading {
            return false;
        }

        ceiling_satisfies(self.accuracy.horizontal, other.accuracy.horizontal)
            && ceiling_satisfies(self.accuracy.vertical, other.accuracy.vertical)
            && ceiling_satisfies(self.accuracy.velocity, other.accuracy.velocity)
            && ceiling_satisfies(self.accuracy.heading, other.accuracy.heading)
    }

    /// Component-wise union of requirements and minimum of accuracy ceilings.
    pub fn merge(&self, other: &Criteria) -> Criteria {
        Criteria {
            requires: Requires {
                position: self.requires.position || other.requires.position,
                altitude: self.requires.altitude || other.requires.altitude,
                velocity: self.requires.velocity || other.requires.velocity,
                heading: self.requires.heading || other.requires.heading,
            },
            accuracy: AccuracyRequirements {
                horizontal: ceiling_merge(self.accuracy.horizontal, other.accuracy.horizontal),
                vertical: ceiling_merge(self.accuracy.vertical, other.accuracy.vertical),
                velocity: ceiling_merge(self.accuracy.velocity, other.accuracy.velocity),
                heading: ceiling_merge(self.accuracy.heading, other.accuracy.heading),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_rejects_out_of_range_latitude() {
        assert_eq!(
            Position::new(Degrees(91.0), Degrees(0.0)),
            Err(Error::LatitudeOutOfRange(91.0))
        );
        assert_eq!(
            Position::new(Degrees(-90.5), Degrees(0.0)),
            Err(Error::LatitudeOutOfRange(-90.5))
        );
    }

    #[test]
    fn position_rejects_out_of_range_longitude() {
        assert_eq!(
            Position::new(Degrees(0.0), Degrees(180.5)),
            Err(Error::LongitudeOutOfRange(180.5))
        );
    }

    #[test]
    fn position_accepts_boundaries() {
        assert!(Position::new(Degrees(90.0), Degrees(-180.0)).is_ok());
        assert!(Position::new(Degrees(-90.0), Degrees(180.0)).is_ok());
    }

    #[test]
    fn position_equality_includes_accuracy() {
        let bare = Position::new(Degrees(48.0), Degrees(11.0)).unwrap();
        let accurate = bare.with_horizontal_accuracy(Meters(5.0));
        assert_ne!(bare, accurate);
        assert_eq!(accurate, bare.with_horizontal_accuracy(Meters(5.0)));
    }

    #[test]
    fn heading_rejects_360_and_above() {
        assert!(Heading::new(Degrees(0.0)).is_ok());
        assert!(Heading::new(Degrees(359.99)).is_ok());
        assert_eq!(
            Heading::new(Degrees(360.0)),
            Err(Error::HeadingOutOfRange(360.0))
        );
        assert_eq!(
            Heading::new(Degrees(-0.1)),
            Err(Error::HeadingOutOfRange(-0.1))
        );
    }

    #[test]
    fn velocity_rejects_negative_speed() {
        assert!(Velocity::new(MetersPerSecond(0.0)).is_ok());
        assert_eq!(
            Velocity::new(MetersPerSecond(-1.0)),
            Err(Error::NegativeVelocity(-1.0))
        );
    }

    #[test]
    fn updates_compare_by_value_and_timestamp() {
        let position = Position::new(Degrees(1.0), Degrees(2.0)).unwrap();
        let a = Update::with_timestamp(position, Timestamp::from_micros(1));
        let b = Update::with_timestamp(position, Timestamp::from_micros(2));
        assert_ne!(a, b);
        assert_eq!(a, Update::with_timestamp(position, Timestamp::from_micros(1)));
    }

    #[test]
    fn timestamps_are_monotonic() {
        let a = Timestamp::now();
        let b = Timestamp::now();
        assert!(b >= a);
    }

    #[test]
    fn criteria_satisfies_requires_superset() {
        let provided = Criteria {
            requires: Requires {
                position: true,
                velocity: true,
                ..Requires::default()
            },
            ..Criteria::default()
        };
        assert!(provided.satisfies(&Criteria::position_only()));
        let wants_heading = Criteria {
            requires: Requires {
                heading: true,
                ..Requires::default()
            },
            ..Criteria::default()
        };
        assert!(!provided.satisfies(&wants_heading));
    }

    #[test]
    fn criteria_satisfies_compares_ceilings() {
        let tight = Criteria {
            requires: Requires {
                position: true,
                ..Requires::default()
            },
            accuracy: AccuracyRequirements {
                horizontal: Some(Meters(10.0)),
                ..AccuracyRequirements::default()
            },
        };
        let loose = Criteria {
            accuracy: AccuracyRequirements {
                horizontal: Some(Meters(100.0)),
                ..AccuracyRequirements::default()
            },
            ..Criteria::position_only()
        };
        assert!(tight.satisfies(&loose));
        assert!(!loose.satisfies(&tight));
    }

    #[test]
    fn criteria_merge_takes_union_and_minimum() {
        let a = Criteria {
            requires: Requires {
                position: true,
                ..Requires::default()
            },
            accuracy: AccuracyRequirements {
                horizontal: Some(Meters(100.0)),
                ..AccuracyRequirements::default()
            },
        };
        let b = Criteria {
            requires: Requires {
                heading: true,
                ..Requires::default()
            },
            accuracy: AccuracyRequirements {
                horizontal: Some(Meters(10.0)),
                heading: Some(Degrees(2.0)),
                ..AccuracyRequirements::default()
            },
        };
        let merged = a.merge(&b);
        assert!(merged.requires.position);
        assert!(merged.requires.heading);
        assert_eq!(merged.accuracy.horizontal, Some(Meters(10.0)));
        assert_eq!(merged.accuracy.heading, Some(Degrees(2.0)));
    }

    #[test]
    fn space_vehicle_serializes_flags_as_bits() {
        let mut sv = SpaceVehicle::new(GnssId::Gps, 17);
        sv.flags = SpaceVehicleFlags::USED_IN_FIX | SpaceVehicleFlags::HAS_EPHEMERIS;
        sv.snr = Some(41.0);
        let json = serde_json::to_string(&sv).unwrap();
        let back: SpaceVehicle = serde_json::from_str(&json).unwrap();
        assert_eq!(sv, back);
    }
}
