//! One-shot SNTP v3 client (RFC 1305 subset).
//!
//! Used to seed GNSS receivers with a coarse wall-clock time ahead of the
//! first fix. One 48-byte request, one reply, a caller-supplied timeout.

use bytes::{Buf, BufMut};
use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;
use tokio::net::UdpSocket;

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Seconds between the NTP era (1900) and the Unix epoch (1970).
const SECONDS_1900_TO_1970: u64 = 2_208_988_800;

pub const PACKET_LEN: usize = 48;
const NTP_PORT: u16 = 123;

const LEAP_INDICATOR_NO_WARNING: u8 = 0;
const VERSION: u8 = 3;
const MODE_CLIENT: u8 = 3;
const MODE_SERVER: u8 = 4;

#[derive(Debug, Error)]
pub enum SntpError {
    #[error("i/o error talking to the time server: {0}")]
    Io(#[from] std::io::Error),
    #[error("no reply from {host} within {timeout:?}")]
    Timeout { host: String, timeout: Duration },
    #[error("reply is shorter than 48 bytes")]
    ShortReply,
    #[error("reply is not a server-mode NTP packet")]
    NotAServerReply,
}

impl PartialEq for SntpError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Io(a), Self::Io(b)) => a.kind() == b.kind(),
            (Self::Timeout { host: h1, timeout: t1 }, Self::Timeout { host: h2, timeout: t2 }) => {
                h1 == h2 && t1 == t2
            }
            (Self::ShortReply, Self::ShortReply) => true,
            (Self::NotAServerReply, Self::NotAServerReply) => true,
            _ => false,
        }
    }
}

/// A 64-bit NTP timestamp: seconds since 1900 plus a binary fraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NtpTimestamp {
    pub seconds: u32,
    pub fraction: u32,
}

impl NtpTimestamp {
    pub fn from_system_time(time: SystemTime) -> Self {
        let since_unix = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        let seconds = since_unix.as_secs() + SECONDS_1900_TO_1970;
        let fraction = ((since_unix.subsec_nanos() as u64) << 32) / 1_000_000_000;
        Self {
            seconds: seconds as u32,
            fraction: fraction as u32,
        }
    }

    pub fn to_datetime(self) -> DateTime<Utc> {
        let unix_seconds = self.seconds as i64 - SECONDS_1900_TO_1970 as i64;
        let nanos = ((self.fraction as u64 * 1_000_000_000) >> 32) as u32;
        Utc.timestamp_opt(unix_seconds, nanos).single().unwrap_or_default()
    }

    pub fn is_zero(&self) -> bool {
        self.seconds == 0 && self.fraction == 0
    }
}

/// The fixed 48-byte NTP v3 packet layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Packet {
    pub leap_indicator: u8,
    pub version: u8,
    pub mode: u8,
    pub stratum: u8,
    pub poll: i8,
    pub precision: i8,
    pub root_delay: u32,
    pub root_dispersion: u32,
    pub reference_id: u32,
    pub reference_timestamp: NtpTimestamp,
    pub originate_timestamp: NtpTimestamp,
    pub receive_timestamp: NtpTimestamp,
    pub transmit_timestamp: NtpTimestamp,
}

impl Packet {
    /// A client request stamped with the current wall clock.
    pub fn client_request(now: SystemTime) -> Self {
        Self {
            leap_indicator: LEAP_INDICATOR_NO_WARNING,
            version: VERSION,
            mode: MODE_CLIENT,
            transmit_timestamp: NtpTimestamp::from_system_time(now),
            ..Self::default()
        }
    }

    pub fn encode(&self) -> [u8; PACKET_LEN] {
        let mut buf = Vec::with_capacity(PACKET_LEN);
        buf.put_u8((self.leap_indicator << 6) | (self.version << 3) | self.mode);
        buf.put_u8(self.stratum);
        buf.put_i8(self.poll);
        buf.put_i8(self.precision);
        buf.put_u32(self.root_delay);
        buf.put_u32(self.root_dispersion);
        buf.put_u32(self.reference_id);
        for ts in [
            self.reference_timestamp,
            self.originate_timestamp,
            self.receive_timestamp,
            self.transmit_timestamp,
        ] {
            buf.put_u32(ts.seconds);
            buf.put_u32(ts.fraction);
        }
        buf.try_into().expect("fixed-size NTP packet")
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, SntpError> {
        if buf.len() < PACKET_LEN {
            return Err(SntpError::ShortReply);
        }
        let lvm = buf.get_u8();
        let timestamp = |buf: &mut &[u8]| NtpTimestamp {
            seconds: buf.get_u32(),
            fraction: buf.get_u32(),
        };
        Ok(Self {
            leap_indicator: lvm >> 6,
            version: (lvm >> 3) & 0x07,
            mode: lvm & 0x07,
            stratum: buf.get_u8(),
            poll: buf.get_i8(),
            precision: buf.get_i8(),
            root_delay: buf.get_u32(),
            root_dispersion: buf.get_u32(),
            reference_id: buf.get_u32(),
            reference_timestamp: timestamp(&mut buf),
            originate_timestamp: timestamp(&mut buf),
            receive_timestamp: timestamp(&mut buf),
            transmit_timestamp: timestamp(&mut buf),
        })
    }
}

/// What a successful query yields: the server's time, the local monotonic
/// instant it was observed at, and the measured round trip.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceTimeSample {
    pub ntp_time: DateTime<Utc>,
    pub ntp_time_reference: Instant,
    pub round_trip_time: Duration,
}

/// One-shot SNTP client.
#[derive(Debug, Default)]
pub struct Client;

impl Client {
    /// Queries `host` (port 123 unless the host string carries its own) and
    /// waits at most `timeout` for the reply.
    pub async fn request_time(
        host: &str,
        timeout: Duration,
    ) -> Result<ReferenceTimeSample, SntpError> {
        let address = if host.contains(':') {
            host.to_string()
        } else {
            format!("{host}:{NTP_PORT}")
        };

        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&address).await?;

        let request = Packet::client_request(SystemTime::now());
        let sent_at = Instant::now();
        socket.send(&request.encode()).await?;

        let mut reply_buf = [0u8; 512];
        let n = tokio::time::timeout(timeout, socket.recv(&mut reply_buf))
            .await
            .map_err(|_| SntpError::Timeout {
                host: host.to_string(),
                timeout,
            })??;
        let received_at = Instant::now();

        let reply = Packet::decode(&reply_buf[..n])?;
        if reply.mode != MODE_SERVER || reply.transmit_timestamp.is_zero() {
            return Err(SntpError::NotAServerReply);
        }

        let round_trip_time = received_at.duration_since(sent_at);
        // The server's transmit time is half a round trip old on arrival.
        let ntp_time = reply.transmit_timestamp.to_datetime()
            + chrono::Duration::from_std(round_trip_time / 2)
                .unwrap_or_else(|_| chrono::Duration::zero());

        Ok(ReferenceTimeSample {
            ntp_time,
            ntp_time_reference: received_at,
            round_trip_time,
        })
    }
}
