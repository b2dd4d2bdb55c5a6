//! NMEA 0183 sentences.
//!
//! A sentence travels as `$TTSSS,field,field,…*HH\r\n` where `TT` is the
//! talker, `SSS` the sentence id and `HH` the XOR checksum of everything
//! between `$` and `*`. Fields may legally be empty, which is why every
//! payload field below is an `Option`.

mod generator;
mod parser;
mod scanner;

pub use generator::generate_sentence;
pub use parser::parse_sentence;
pub use scanner::Scanner;

use thiserror::Error;

/// Failures while scanning or parsing a sentence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SentenceError {
    #[error("sentence does not start with '$'")]
    MissingPrefix,
    #[error("sentence lacks a '*HH' checksum trailer")]
    MissingChecksum,
    #[error("checksum mismatch: expected {expected:#04x}, computed {computed:#04x}")]
    ChecksumMismatch { expected: u8, computed: u8 },
    #[error("unknown talker id {0:?}")]
    UnknownTalker(String),
    #[error("unknown sentence id {0:?}")]
    UnknownSentenceId(String),
    #[error("malformed field {field:?}: {reason}")]
    MalformedField { field: String, reason: &'static str },
    #[error("more than {max} satellite ids in a single GSA sentence")]
    TooManySatellites { max: usize },
    #[error("sentence ended before all mandatory fields were read")]
    Truncated,
    #[error("scanner holds no complete sentence")]
    Incomplete,
}

/// XOR of all payload bytes, i.e. everything between `$` and `*`.
pub fn checksum(payload: &str) -> u8 {
    payload.bytes().fold(0, |acc, b| acc ^ b)
}

// ── Elementary field types ────────────────────────────────────────────────────

/// The device class emitting a sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Talker {
    /// GLONASS receiver.
    Gl,
    /// Multi-constellation receiver.
    Gn,
    /// GPS receiver.
    Gp,
}

impl Talker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Talker::Gl => "GL",
            Talker::Gn => "GN",
            Talker::Gp => "GP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardinalDirection {
    North,
    South,
    East,
    West,
}

impl CardinalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardinalDirection::North => "N",
            CardinalDirection::South => "S",
            CardinalDirection::East => "E",
            CardinalDirection::West => "W",
        }
    }
}

/// Latitude in the DDMM.mmm wire representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Latitude {
    pub degrees: u32,
    pub minutes: f64,
}

/// Longitude in the DDDMM.mmm wire representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Longitude {
    pub degrees: u32,
    pub minutes: f64,
}

/// Time of day in UTC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Utc {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: f64,
}

/// A calendar day, two-digit year as transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    pub day: u8,
    pub month: u8,
    pub year: u8,
}

/// Data validity flag carried by GLL and RMC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Valid,
    NotValid,
}

/// Positioning system mode indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Autonomous,
    Differential,
    Estimated,
    Manual,
    Simulator,
    NotValid,
}

pub mod gps {
    /// GPS quality indicator as reported in GGA field 6.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FixMode {
        Invalid = 0,
        GpsSps = 1,
        DifferentialGpsSps = 2,
        GpsPps = 3,
        RealTimeKinematic = 4,
        FloatRtk = 5,
        Estimated = 6,
        ManualInput = 7,
        Simulation = 8,
    }
}

// ── Sentences ─────────────────────────────────────────────────────────────────

/// Global positioning system fix data.
///
/// Time and position, together with fix related data (satellites in use,
/// resulting HDOP, age of differential data if in use, etc.).
#[derive(Debug, Clone, PartialEq)]
pub struct Gga {
    pub talker: Talker,
    pub utc: Option<Utc>,
    pub latitude: Option<Latitude>,
    pub latitude_direction: Option<CardinalDirection>,
    pub longitude: Option<Longitude>,
    pub longitude_direction: Option<CardinalDirection>,
    pub fix_mode: Option<gps::FixMode>,
    pub satellites_in_use: Option<u8>,
    pub hdop: Option<f64>,
    /// Antenna altitude above mean sea level, meters.
    pub altitude: Option<f64>,
    pub geoidal_separation: Option<f64>,
    /// Age of differential corrections, seconds.
    pub age: Option<f64>,
    pub differential_reference_station: Option<u16>,
}

/// Latitude and longitude, with time of position fix and status.
#[derive(Debug, Clone, PartialEq)]
pub struct Gll {
    pub talker: Talker,
    pub latitude: Option<Latitude>,
    pub latitude_direction: Option<CardinalDirection>,
    pub longitude: Option<Longitude>,
    pub longitude_direction: Option<CardinalDirection>,
    pub utc: Option<Utc>,
    pub status: Option<Status>,
    pub mode: Option<Mode>,
}

/// GNSS DOP and active satellites.
///
/// In a multi-GNSS system this sentence is output once per constellation.
/// At most [`Gsa::MAX_SATELLITES`] satellite ids fit one sentence; a sentence
/// carrying more is rejected as malformed.
#[derive(Debug, Clone, PartialEq)]
pub struct Gsa {
    pub talker: Talker,
    pub operation_mode: Option<GsaOperationMode>,
    pub fix_mode: Option<GsaFixMode>,
    pub satellite_ids: Vec<Option<u8>>,
    pub pdop: Option<f64>,
    pub hdop: Option<f64>,
    pub vdop: Option<f64>,
}

impl Gsa {
    pub const MAX_SATELLITES: usize = 12;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GsaOperationMode {
    /// Forced to operate in 2D or 3D mode.
    Manual,
    /// Allowed to switch between 2D and 3D automatically.
    Automatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GsaFixMode {
    FixNotAvailable = 1,
    FixIn2d = 2,
    FixIn3d = 3,
}

/// GNSS satellites in view; one sentence carries at most four entries and a
/// complete constellation snapshot spans `sentence_count` sentences.
#[derive(Debug, Clone, PartialEq)]
pub struct Gsv {
    pub talker: Talker,
    pub sentence_count: Option<u8>,
    pub sentence_number: Option<u8>,
    pub satellites_count: Option<u8>,
    pub satellites_info: Vec<GsvInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GsvInfo {
    pub satellite_id: Option<u8>,
    pub elevation: Option<u8>,
    pub azimuth: Option<u16>,
    pub snr: Option<u8>,
}

/// Recommended minimum data.
#[derive(Debug, Clone, PartialEq)]
pub struct Rmc {
    pub talker: Talker,
    pub utc: Option<Utc>,
    pub status: Option<Status>,
    pub latitude: Option<Latitude>,
    pub latitude_direction: Option<CardinalDirection>,
    pub longitude: Option<Longitude>,
    pub longitude_direction: Option<CardinalDirection>,
    /// Speed over ground, knots.
    pub speed_over_ground: Option<f64>,
    /// Course over ground, degrees true.
    pub course_over_ground: Option<f64>,
    pub date: Option<Date>,
    pub magnetic_variation: Option<f64>,
    pub magnetic_variation_direction: Option<CardinalDirection>,
    pub mode: Option<Mode>,
}

/// Course over ground and ground speed.
#[derive(Debug, Clone, PartialEq)]
pub struct Vtg {
    pub talker: Talker,
    pub cog_true: Option<f64>,
    pub cog_magnetic: Option<f64>,
    pub sog_knots: Option<f64>,
    pub sog_kmh: Option<f64>,
    pub mode: Option<Mode>,
}

/// Free-form text transmission (boot banners, error notices).
#[derive(Debug, Clone, PartialEq)]
pub struct Txt {
    pub talker: Talker,
    pub total_number_of_sentences: Option<u8>,
    pub sentence_number: Option<u8>,
    pub identifier: Option<u8>,
    pub message: Option<String>,
}

/// The sum of all sentence types understood by the stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Sentence {
    Gga(Gga),
    Gll(Gll),
    Gsa(Gsa),
    Gsv(Gsv),
    Rmc(Rmc),
    Vtg(Vtg),
    Txt(Txt),
}

impl Sentence {
    pub fn talker(&self) -> Talker {
        match self {
            Sentence::Gga(s) => s.talker,
            Sentence::Gll(s) => s.talker,
            Sentence::Gsa(s) => s.talker,
            Sentence::Gsv(s) => s.talker,
            Sentence::Rmc(s) => s.talker,
            Sentence::Vtg(s) => s.talker,
            Sentence::Txt(s) => s.talker,
        }
    }
}
