//! Big-endian payload cursors; SiRF transmits network byte order.

use crate::sirf::SirfError;

use bytes::{Buf, BufMut};

/// Bounds-checked big-endian reader over a payload slice.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn ensure(&self, n: usize) -> Result<(), SirfError> {
        if self.buf.remaining() < n {
            Err(SirfError::Truncated)
        } else {
            Ok(())
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, SirfError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_i8(&mut self) -> Result<i8, SirfError> {
        self.ensure(1)?;
        Ok(self.buf.get_i8())
    }

    pub fn read_u16(&mut self) -> Result<u16, SirfError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn read_i16(&mut self) -> Result<i16, SirfError> {
        self.ensure(2)?;
        Ok(self.buf.get_i16())
    }

    pub fn read_u32(&mut self) -> Result<u32, SirfError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn read_i32(&mut self) -> Result<i32, SirfError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }
}

/// Big-endian writer producing a payload vector (message id excluded).
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.put_i16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_network_byte_order() {
        let mut writer = Writer::new();
        writer.write_i32(-559038737);
        writer.write_u16(0x0102);
        let payload = writer.into_payload();
        assert_eq!(payload, vec![0xde, 0xad, 0xbe, 0xef, 0x01, 0x02]);

        let mut reader = Reader::new(&payload);
        assert_eq!(reader.read_i32(), Ok(-559038737));
        assert_eq!(reader.read_u16(), Ok(0x0102));
        assert_eq!(reader.read_u8(), Err(SirfError::Truncated));
    }
}
