//! # gnss-receiver
//!
//! Protocol stack for GNSS receivers speaking NMEA 0183, u-blox UBX and SiRF
//! binary over a single serial byte stream.
//!
//! ## Architecture
//!
//! Bytes flow `port → receiver → scanners → typed message → monitor`. The
//! three framings are mutually exclusive on any given byte window (NMEA
//! starts with `$`, UBX with `0xB5`, SiRF with `0xA0`), so a receiver feeds
//! every byte to its binary scanner and, when that scanner is idle, to the
//! NMEA scanner. Whichever reaches a complete frame first consumes it.
//!
//! Scanners are incremental state machines: one byte in, `NeedMore`/`Ready`
//! out. Framing and checksum failures reset the scanner and never abort the
//! receive loop.
//!
//! The [`sntp`] module carries a one-shot SNTP v3 client used to prime GNSS
//! time to first fix.

pub mod nmea;
pub mod receiver;
pub mod sirf;
pub mod sntp;
pub mod ubx;

/// Scanner progress after consuming one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// The byte advanced the state machine; more bytes are needed.
    NeedMore,
    /// A complete frame is buffered; call `finalize` to extract it.
    Ready,
}
