use crate::nmea::SentenceError;
use crate::Scan;

// Longest sentence the standard allows is 82 characters including "$" and
// CRLF; anything far beyond that is line noise.
const MAX_SENTENCE_LEN: usize = 128;

/// State of the scanner: what it expects next in order to advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Dollar,
    MoreData,
    LineFeed,
    NothingMore,
}

/// Identifies the beginning and end of NMEA sentences on a byte stream.
///
/// Any byte that cannot advance the current state resets the scanner to its
/// initial state; a subsequent `$` starts a fresh sentence.
#[derive(Debug)]
pub struct Scanner {
    state: Expect,
    buffer: String,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            state: Expect::Dollar,
            buffer: String::new(),
        }
    }

    fn reset(&mut self) {
        self.state = Expect::Dollar;
        self.buffer.clear();
    }

    /// Consumes one byte, reporting whether a complete sentence is buffered.
    pub fn update(&mut self, byte: u8) -> Scan {
        let c = byte as char;
        match self.state {
            Expect::Dollar => {
                if c == '$' {
                    self.buffer.push(c);
                    self.state = Expect::MoreData;
                }
            }
            Expect::MoreData => {
                if !byte.is_ascii() || self.buffer.len() >= MAX_SENTENCE_LEN {
                    self.reset();
                    return Scan::NeedMore;
                }
                self.buffer.push(c);
                if c == '\r' {
                    self.state = Expect::LineFeed;
                }
            }
            Expect::LineFeed => {
                if c == '\n' {
                    self.buffer.push(c);
                    self.state = Expect::NothingMore;
                } else {
                    self.reset();
                }
            }
            Expect::NothingMore => {}
        }

        if self.state == Expect::NothingMore {
            Scan::Ready
        } else {
            Scan::NeedMore
        }
    }

    /// Extracts the buffered sentence (including `$` and CRLF) and resets.
    pub fn finalize(&mut self) -> Result<String, SentenceError> {
        if self.state != Expect::NothingMore {
            return Err(SentenceError::Incomplete);
        }
        let result = std::mem::take(&mut self.buffer);
        self.state = Expect::Dollar;
        Ok(result)
    }
}
