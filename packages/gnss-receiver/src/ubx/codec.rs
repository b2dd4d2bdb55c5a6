//! Little-endian payload cursors.

use crate::ubx::UbxError;

use bytes::{Buf, BufMut};

/// Bounds-checked little-endian reader over a payload slice.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn ensure(&self, n: usize) -> Result<(), UbxError> {
        if self.buf.remaining() < n {
            Err(UbxError::Truncated)
        } else {
            Ok(())
        }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn read_u8(&mut self) -> Result<u8, UbxError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_i8(&mut self) -> Result<i8, UbxError> {
        self.ensure(1)?;
        Ok(self.buf.get_i8())
    }

    pub fn read_u16(&mut self) -> Result<u16, UbxError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn read_i16(&mut self) -> Result<i16, UbxError> {
        self.ensure(2)?;
        Ok(self.buf.get_i16_le())
    }

    pub fn read_u32(&mut self) -> Result<u32, UbxError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn read_i32(&mut self) -> Result<i32, UbxError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn skip(&mut self, n: usize) -> Result<(), UbxError> {
        self.ensure(n)?;
        self.buf.advance(n);
        Ok(())
    }
}

/// Little-endian writer producing a payload vector.
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

    pub fn write_i8(&mut self, value: i8) {
        self.buf.put_i8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.put_i16_le(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32_le(value);
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_is_bounds_checked() {
        let mut reader = Reader::new(&[0x01, 0x02, 0x03]);
        assert_eq!(reader.read_u16(), Ok(0x0201));
        assert_eq!(reader.read_u16(), Err(UbxError::Truncated));
        assert_eq!(reader.read_u8(), Ok(0x03));
        assert_eq!(reader.read_u8(), Err(UbxError::Truncated));
    }

    #[test]
    fn writer_emits_little_endian() {
        let mut writer = Writer::new();
        writer.write_u16(0xbeef);
        writer.write_i32(-2);
        assert_eq!(
            writer.into_payload(),
            vec![0xef, 0xbe, 0xfe, 0xff, 0xff, 0xff]
        );
    }
}
