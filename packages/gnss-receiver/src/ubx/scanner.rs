use crate::ubx::{Checksum, Frame, UbxError, MAX_PAYLOAD_LEN, SYNC_CHAR_1, SYNC_CHAR_2};
use crate::Scan;

/// What the scanner expects next in order to advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    SyncChar1,
    SyncChar2,
    Class,
    Id,
    Length1,
    Length2,
    Payload,
    CkA,
    CkB,
    NothingMore,
}

/// Incremental scanner for UBX frames.
///
/// Checksum and framing failures reset the scanner; the offending byte is
/// reported as an error and the next byte may start a fresh frame.
#[derive(Debug)]
pub struct Scanner {
    next: Expect,
    checksum: Checksum,
    class: u8,
    id: u8,
    length: usize,
    payload: Vec<u8>,
    ck_a: u8,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            next: Expect::SyncChar1,
            checksum: Checksum::default(),
            class: 0,
            id: 0,
            length: 0,
            payload: Vec::new(),
            ck_a: 0,
        }
    }

    fn reset(&mut self) {
        self.next = Expect::SyncChar1;
        self.checksum = Checksum::default();
        self.payload.clear();
        self.length = 0;
    }

    /// Consumes one byte. The boolean reports whether the byte belonged to a
    /// frame in progress; an idle scanner leaves non-sync bytes to the NMEA
    /// scanner running next to it.
    pub fn update(&mut self, byte: u8) -> Result<(Scan, bool), UbxError> {
        match self.next {
            Expect::SyncChar1 => {
                if byte == SYNC_CHAR_1 {
                    self.next = Expect::SyncChar2;
                    return Ok((Scan::NeedMore, true));
                }
                return Ok((Scan::NeedMore, false));
            }
            Expect::SyncChar2 => {
                if byte == SYNC_CHAR_2 {
                    self.next = Expect::Class;
                } else {
                    // The byte may itself start a new frame or belong to the
                    // NMEA stream; rescan it from the initial state.
                    self.reset();
                    return self.update(byte);
                }
            }
            Expect::Class => {
                self.class = byte;
                self.checksum.update(byte);
                self.next = Expect::Id;
            }
            Expect::Id => {
                self.id = byte;
                self.checksum.update(byte);
                self.next = Expect::Length1;
            }
            Expect::Length1 => {
                self.length = byte as usize;
                self.checksum.update(byte);
                self.next = Expect::Length2;
            }
            Expect::Length2 => {
                self.length |= (byte as usize) << 8;
                self.checksum.update(byte);
                if self.length > MAX_PAYLOAD_LEN {
                    let length = self.length;
                    self.reset();
                    return Err(UbxError::PayloadTooLarge(length));
                }
                self.next = if self.length == 0 {
                    Expect::CkA
                } else {
                    Expect::Payload
                };
            }
            Expect::Payload => {
                self.payload.push(byte);
                self.checksum.update(byte);
                if self.payload.len() == self.length {
                    self.next = Expect::CkA;
                }
            }
            Expect::CkA => {
                self.ck_a = byte;
                self.next = Expect::CkB;
            }
            Expect::CkB => {
                if !self.checksum.matches(self.ck_a, byte) {
                    self.reset();
                    return Err(UbxError::ChecksumMismatch);
                }
                self.next = Expect::NothingMore;
            }
            Expect::NothingMore => {}
        }

        let scan = if self.next == Expect::NothingMore {
            Scan::Ready
        } else {
            Scan::NeedMore
        };
        Ok((scan, true))
    }

    /// Extracts the completed frame and resets for the next one.
    pub fn finalize(&mut self) -> Result<Frame, UbxError> {
        if self.next != Expect::NothingMore {
            return Err(UbxError::Incomplete);
        }
        let frame = Frame {
            class: self.class,
            id: self.id,
            payload: std::mem::take(&mut self.payload),
        };
        self.reset();
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(scanner: &mut Scanner, bytes: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        for &b in bytes {
            if let Ok((Scan::Ready, _)) = scanner.update(b) {
                frames.push(scanner.finalize().unwrap());
            }
        }
        frames
    }

    #[test]
    fn scans_a_complete_frame() {
        let frame = Frame {
            class: 0x06,
            id: 0x01,
            payload: vec![0x01, 0x07],
        };
        let mut scanner = Scanner::new();
        let frames = feed(&mut scanner, &frame.to_bytes());
        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn scans_a_zero_length_frame() {
        let frame = Frame {
            class: 0x05,
            id: 0x01,
            payload: vec![],
        };
        let mut scanner = Scanner::new();
        let frames = feed(&mut scanner, &frame.to_bytes());
        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn checksum_failure_resets_and_recovers() {
        let frame = Frame {
            class: 0x06,
            id: 0x01,
            payload: vec![0x01, 0x07],
        };
        let mut corrupted = frame.to_bytes();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xff;

        let mut scanner = Scanner::new();
        let mut saw_checksum_error = false;
        for &b in &corrupted {
            if let Err(UbxError::ChecksumMismatch) = scanner.update(b) {
                saw_checksum_error = true;
            }
        }
        assert!(saw_checksum_error);

        // The scanner recovered: the very next frame scans cleanly.
        let frames = feed(&mut scanner, &frame.to_bytes());
        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn oversized_length_resets() {
        let mut scanner = Scanner::new();
        let bytes = [SYNC_CHAR_1, SYNC_CHAR_2, 0x01, 0x07, 0xff, 0xff];
        let mut saw_error = false;
        for &b in &bytes {
            if let Err(UbxError::PayloadTooLarge(_)) = scanner.update(b) {
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[test]
    fn junk_never_yields_a_frame() {
        let mut scanner = Scanner::new();
        let junk: Vec<u8> = (0u32..4096).map(|i| (i * 31 + 7) as u8).collect();
        let mut ready = 0;
        for &b in &junk {
            if let Ok((Scan::Ready, _)) = scanner.update(b) {
                ready += 1;
                scanner.finalize().unwrap();
            }
        }
        assert_eq!(ready, 0);
    }

    #[test]
    fn idle_scanner_does_not_consume_foreign_bytes() {
        let mut scanner = Scanner::new();
        assert_eq!(scanner.update(b'$'), Ok((Scan::NeedMore, false)));
        assert_eq!(scanner.update(0xa0), Ok((Scan::NeedMore, false)));
        assert_eq!(scanner.update(SYNC_CHAR_1), Ok((Scan::NeedMore, true)));
    }
}
