use crate::sirf::{begin, end, Checksum, Frame, SirfError, MAX_FRAME_LEN};
use crate::Scan;

/// What the scanner expects next in order to advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    SyncCharBegin1,
    SyncCharBegin2,
    Length1,
    Length2,
    MessageId,
    Payload,
    Checksum1,
    Checksum2,
    SyncCharEnd1,
    SyncCharEnd2,
    NothingMore,
}

/// Incremental scanner for SiRF frames.
#[derive(Debug)]
pub struct Scanner {
    next: Expect,
    checksum: Checksum,
    expected_size: usize,
    message_id: u8,
    payload: Vec<u8>,
    checksum_1: u8,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            next: Expect::SyncCharBegin1,
            checksum: Checksum::default(),
            expected_size: 0,
            message_id: 0,
            payload: Vec::new(),
            checksum_1: 0,
        }
    }

    fn reset(&mut self) {
        self.next = Expect::SyncCharBegin1;
        self.checksum = Checksum::default();
        self.expected_size = 0;
        self.payload.clear();
    }

    /// Consumes one byte. The boolean reports whether the byte belonged to a
    /// frame in progress so that an idle scanner leaves NMEA traffic alone.
    pub fn update(&mut self, byte: u8) -> Result<(Scan, bool), SirfError> {
        match self.next {
            Expect::SyncCharBegin1 => {
                if byte == begin::SYNC_CHAR_1 {
                    self.next = Expect::SyncCharBegin2;
                    return Ok((Scan::NeedMore, true));
                }
                return Ok((Scan::NeedMore, false));
            }
            Expect::SyncCharBegin2 => {
                if byte == begin::SYNC_CHAR_2 {
                    self.next = Expect::Length1;
                } else {
                    // The byte may itself start a new frame or belong to the
                    // NMEA stream; rescan it from the initial state.
                    self.reset();
                    return self.update(byte);
                }
            }
            Expect::Length1 => {
                self.expected_size = (byte as usize) << 8;
                self.next = Expect::Length2;
            }
            Expect::Length2 => {
                self.expected_size |= byte as usize;
                if self.expected_size > MAX_FRAME_LEN {
                    let size = self.expected_size;
                    self.reset();
                    return Err(SirfError::FrameTooLarge(size));
                }
                if self.expected_size == 0 {
                    self.reset();
                    return Err(SirfError::FrameTooSmall);
                }
                self.next = Expect::MessageId;
            }
            Expect::MessageId => {
                self.message_id = byte;
                self.checksum.update(byte);
                self.next = if self.expected_size == 1 {
                    Expect::Checksum1
                } else {
                    Expect::Payload
                };
            }
            Expect::Payload => {
                self.payload.push(byte);
                self.checksum.update(byte);
                if self.payload.len() + 1 == self.expected_size {
                    self.next = Expect::Checksum1;
                }
            }
            Expect::Checksum1 => {
                self.checksum_1 = byte;
                self.next = Expect::Checksum2;
            }
            Expect::Checksum2 => {
                let expected = ((self.checksum_1 as u16) << 8) | byte as u16;
                let computed = self.checksum.value();
                if expected != computed {
                    self.reset();
                    return Err(SirfError::ChecksumMismatch { expected, computed });
                }
                self.next = Expect::SyncCharEnd1;
            }
            Expect::SyncCharEnd1 => {
                if byte == end::SYNC_CHAR_1 {
                    self.next = Expect::SyncCharEnd2;
                } else {
                    self.reset();
                    return Err(SirfError::BadTrailer);
                }
            }
            Expect::SyncCharEnd2 => {
                if byte == end::SYNC_CHAR_2 {
                    self.next = Expect::NothingMore;
                } else {
                    self.reset();
                    return Err(SirfError::BadTrailer);
                }
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
    pub fn finalize(&mut self) -> Result<Frame, SirfError> {
        if self.next != Expect::NothingMore {
            return Err(SirfError::Incomplete);
        }
        let frame = Frame {
            message_id: self.message_id,
            payload: std::mem::take(&mut self.payload),
        };
        self.reset();
        Ok(frame)
    }
}
