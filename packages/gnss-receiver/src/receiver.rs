//! Receiver cores and byte sources.
//!
//! A receiver core owns an NMEA scanner plus the binary scanner for its
//! receiver variant and demultiplexes one serial byte stream into typed
//! messages. Parse failures are logged and dropped; the loop never stops on
//! bad input.

use crate::{nmea, sirf, ubx, Scan};

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::debug;

/// Receives decoded traffic from a receiver core.
///
/// Implementations must tolerate being called from the I/O task; heavy work
/// belongs elsewhere.
pub trait Monitor: Send + Sync {
    fn on_new_nmea_sentence(&self, sentence: &nmea::Sentence);
    fn on_new_ubx_message(&self, _message: &ubx::Message) {}
    fn on_new_sirf_message(&self, _message: &sirf::Message) {}
}

/// Feeds raw chunks into protocol scanners.
pub trait Demultiplexer: Send {
    fn process_chunk(&mut self, chunk: &[u8]);
}

// ── u-blox variant ────────────────────────────────────────────────────────────

/// Core for u-blox receivers: UBX frames interleaved with NMEA sentences.
pub struct UbxReceiver {
    monitor: Arc<dyn Monitor>,
    nmea_scanner: nmea::Scanner,
    ubx_scanner: ubx::Scanner,
}

impl UbxReceiver {
    pub fn new(monitor: Arc<dyn Monitor>) -> Self {
        Self {
            monitor,
            nmea_scanner: nmea::Scanner::new(),
            ubx_scanner: ubx::Scanner::new(),
        }
    }

    /// Encodes an outbound message for the send path.
    pub fn encode(message: &ubx::Message) -> Result<Vec<u8>, ubx::UbxError> {
        message.encode()
    }

    fn process_byte(&mut self, byte: u8) {
        match self.ubx_scanner.update(byte) {
            Ok((Scan::Ready, _)) => match self.ubx_scanner.finalize() {
                Ok(frame) => match ubx::Message::decode(&frame) {
                    Ok(message) => self.monitor.on_new_ubx_message(&message),
                    Err(e) => debug!("dropping undecodable ubx frame: {e}"),
                },
                Err(e) => debug!("ubx finalize failed: {e}"),
            },
            Ok((Scan::NeedMore, consumed)) => {
                if !consumed {
                    feed_nmea(&mut self.nmea_scanner, byte, self.monitor.as_ref());
                }
            }
            Err(e) => debug!("ubx scanner reset: {e}"),
        }
    }
}

impl Demultiplexer for UbxReceiver {
    fn process_chunk(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            self.process_byte(byte);
        }
    }
}

// ── SiRF variant ──────────────────────────────────────────────────────────────

/// Core for SiRF receivers: SiRF frames interleaved with NMEA sentences.
pub struct SirfReceiver {
    monitor: Arc<dyn Monitor>,
    nmea_scanner: nmea::Scanner,
    sirf_scanner: sirf::Scanner,
}

impl SirfReceiver {
    pub fn new(monitor: Arc<dyn Monitor>) -> Self {
        Self {
            monitor,
            nmea_scanner: nmea::Scanner::new(),
            sirf_scanner: sirf::Scanner::new(),
        }
    }

    pub fn encode(message: &sirf::Message) -> Result<Vec<u8>, sirf::SirfError> {
        message.encode()
    }

    fn process_byte(&mut self, byte: u8) {
        match self.sirf_scanner.update(byte) {
            Ok((Scan::Ready, _)) => match self.sirf_scanner.finalize() {
                Ok(frame) => match sirf::Message::decode(&frame) {
                    Ok(message) => self.monitor.on_new_sirf_message(&message),
                    Err(e) => debug!("dropping undecodable sirf frame: {e}"),
                },
                Err(e) => debug!("sirf finalize failed: {e}"),
            },
            Ok((Scan::NeedMore, consumed)) => {
                if !consumed {
                    feed_nmea(&mut self.nmea_scanner, byte, self.monitor.as_ref());
                }
            }
            Err(e) => debug!("sirf scanner reset: {e}"),
        }
    }
}

impl Demultiplexer for SirfReceiver {
    fn process_chunk(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            self.process_byte(byte);
        }
    }
}

fn feed_nmea(scanner: &mut nmea::Scanner, byte: u8, monitor: &dyn Monitor) {
    if scanner.update(byte) == Scan::Ready {
        match scanner.finalize() {
            Ok(raw) => match nmea::parse_sentence(&raw) {
                Ok(sentence) => monitor.on_new_nmea_sentence(&sentence),
                Err(e) => debug!("dropping unparsable nmea sentence: {e}"),
            },
            Err(e) => debug!("nmea finalize failed: {e}"),
        }
    }
}

// ── Byte sources ──────────────────────────────────────────────────────────────

/// Serial parameters for GNSS modules; the defaults match the historical
/// module setup (4800 baud, 8N1, no flow control).
#[derive(Debug, Clone, Copy)]
pub struct SerialConfig {
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self { baud_rate: 4800 }
    }
}

/// Opens a serial port asynchronously with the given configuration.
pub fn open_serial_port(path: &str, config: SerialConfig) -> tokio_serial::Result<SerialStream> {
    tokio_serial::new(path, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
}

const READ_BUFFER_LEN: usize = 1024;

/// Drives a demultiplexer from any byte stream: a serial port, a replay file
/// or a test transport.
pub struct PortReceiver<S, D> {
    stream: S,
    demux: D,
}

impl<S, D> PortReceiver<S, D> {
    pub fn new(stream: S, demux: D) -> Self {
        Self { stream, demux }
    }

    pub fn demux(&mut self) -> &mut D {
        &mut self.demux
    }
}

impl<S: AsyncRead + Unpin, D: Demultiplexer> PortReceiver<S, D> {
    /// Reads until end of stream or the hosting task is cancelled. Each
    /// chunk is fed into the scanners synchronously within the read
    /// completion.
    pub async fn run(&mut self) -> std::io::Result<()> {
        let mut buffer = [0u8; READ_BUFFER_LEN];
        loop {
            let n = self.stream.read(&mut buffer).await?;
            if n == 0 {
                return Ok(());
            }
            self.demux.process_chunk(&buffer[..n]);
        }
    }
}

impl<S: AsyncWrite + Unpin, D> PortReceiver<S, D> {
    /// Writes an encoded message with a write-all discipline.
    pub async fn send_encoded(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }
}

/// Opens a capture file for replaying a recorded byte stream.
pub async fn open_replay(path: &std::path::Path) -> std::io::Result<tokio::fs::File> {
    tokio::fs::File::open(path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, PartialEq)]
    enum Decoded {
        Nmea(nmea::Sentence),
        Ubx(ubx::Message),
        Sirf(sirf::Message),
    }

    #[derive(Default)]
    struct Collecting {
        decoded: Mutex<Vec<Decoded>>,
    }

    impl Monitor for Collecting {
        fn on_new_nmea_sentence(&self, sentence: &nmea::Sentence) {
            self.decoded
                .lock()
                .unwrap()
                .push(Decoded::Nmea(sentence.clone()));
        }

        fn on_new_ubx_message(&self, message: &ubx::Message) {
            self.decoded
                .lock()
                .unwrap()
                .push(Decoded::Ubx(message.clone()));
        }

        fn on_new_sirf_message(&self, message: &sirf::Message) {
            self.decoded
                .lock()
                .unwrap()
                .push(Decoded::Sirf(message.clone()));
        }
    }

    const GGA: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";
    const VTG: &[u8] = b"$GPVTG,054.7,T,034.4,M,005.5,N,010.2,K*48\r\n";

    fn ubx_cfg_bytes() -> Vec<u8> {
        ubx::Message::CfgMsg(ubx::cfg::Msg::on_current_port(0x01, 0x07, 1))
            .encode()
            .unwrap()
    }

    fn sirf_set_protocol_bytes() -> Vec<u8> {
        sirf::Message::SetProtocol(sirf::SetProtocol::SirfBinary)
            .encode()
            .unwrap()
    }

    #[test]
    fn gga_bytes_produce_one_sentence() {
        let monitor = Arc::new(Collecting::default());
        let mut receiver = UbxReceiver::new(monitor.clone());
        receiver.process_chunk(GGA);

        let decoded = monitor.decoded.lock().unwrap();
        assert_eq!(decoded.len(), 1);
        let Decoded::Nmea(nmea::Sentence::Gga(gga)) = &decoded[0] else {
            panic!("expected GGA, got {decoded:?}");
        };
        assert_eq!(
            gga.utc,
            Some(nmea::Utc {
                hours: 12,
                minutes: 35,
                seconds: 19.0
            })
        );
        assert_eq!(gga.fix_mode, Some(nmea::gps::FixMode::GpsSps));
        assert_eq!(gga.satellites_in_use, Some(8));
        assert_eq!(gga.hdop, Some(0.9));
        assert_eq!(gga.altitude, Some(545.4));
    }

    #[test]
    fn interleaved_framings_deliver_in_closing_byte_order() {
        let monitor = Arc::new(Collecting::default());
        let mut receiver = UbxReceiver::new(monitor.clone());

        let mut stream = Vec::new();
        stream.extend_from_slice(GGA);
        stream.extend_from_slice(&ubx_cfg_bytes());
        stream.extend_from_slice(VTG);

        // Feed in awkward chunk sizes to exercise resumption mid-frame.
        for chunk in stream.chunks(7) {
            receiver.process_chunk(chunk);
        }

        let decoded = monitor.decoded.lock().unwrap();
        assert_eq!(decoded.len(), 3);
        assert!(matches!(decoded[0], Decoded::Nmea(nmea::Sentence::Gga(_))));
        assert!(matches!(decoded[1], Decoded::Ubx(ubx::Message::CfgMsg(_))));
        assert!(matches!(decoded[2], Decoded::Nmea(nmea::Sentence::Vtg(_))));
    }

    #[test]
    fn corrupt_frame_does_not_stop_the_stream() {
        let monitor = Arc::new(Collecting::default());
        let mut receiver = UbxReceiver::new(monitor.clone());

        let mut corrupted = ubx_cfg_bytes();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xff;

        receiver.process_chunk(&corrupted);
        receiver.process_chunk(GGA);

        let decoded = monitor.decoded.lock().unwrap();
        assert_eq!(decoded.len(), 1);
        assert!(matches!(decoded[0], Decoded::Nmea(nmea::Sentence::Gga(_))));
    }

    #[test]
    fn sirf_receiver_demultiplexes_both_framings() {
        let monitor = Arc::new(Collecting::default());
        let mut receiver = SirfReceiver::new(monitor.clone());

        let mut stream = sirf_set_protocol_bytes();
        stream.extend_from_slice(GGA);
        for chunk in stream.chunks(3) {
            receiver.process_chunk(chunk);
        }

        let decoded = monitor.decoded.lock().unwrap();
        assert_eq!(decoded.len(), 2);
        assert!(matches!(
            decoded[0],
            Decoded::Sirf(sirf::Message::SetProtocol(_))
        ));
        assert!(matches!(decoded[1], Decoded::Nmea(nmea::Sentence::Gga(_))));
    }

    #[test]
    fn stray_sync_byte_before_a_sentence_does_not_eat_it() {
        let monitor = Arc::new(Collecting::default());
        let mut receiver = UbxReceiver::new(monitor.clone());

        let mut stream = vec![0xb5];
        stream.extend_from_slice(GGA);
        receiver.process_chunk(&stream);

        let decoded = monitor.decoded.lock().unwrap();
        assert_eq!(decoded.len(), 1);
        assert!(matches!(decoded[0], Decoded::Nmea(nmea::Sentence::Gga(_))));
    }

    #[test]
    fn random_junk_decodes_nothing() {
        let monitor = Arc::new(Collecting::default());
        let mut receiver = UbxReceiver::new(monitor.clone());
        let junk: Vec<u8> = (0u32..8192).map(|i| (i * 131 + 17) as u8).collect();
        receiver.process_chunk(&junk);
        assert!(monitor.decoded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn replay_stream_drives_the_demultiplexer() {
        let monitor = Arc::new(Collecting::default());
        let demux = UbxReceiver::new(monitor.clone());

        let mut stream = Vec::new();
        stream.extend_from_slice(GGA);
        stream.extend_from_slice(VTG);

        let mut receiver = PortReceiver::new(std::io::Cursor::new(stream), demux);
        receiver.run().await.unwrap();

        let decoded = monitor.decoded.lock().unwrap();
        assert_eq!(decoded.len(), 2);
    }
}
