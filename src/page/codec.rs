//! Little-endian page payload encoding
//!
//! Fixed-width integers are little-endian; record keys, counts and lengths
//! use LEB128 varints. Every read is bounds-checked and a short buffer is a
//! format error, never a panic.

use super::errors::{PageError, PageResult};

/// Append-only payload builder
#[derive(Debug, Default)]
pub struct PageEncoder {
    buf: Vec<u8>,
}

impl PageEncoder {
    /// Starts a page payload with its kind tag.
    pub fn with_tag(tag: u8) -> Self {
        let mut enc = Self::default();
        enc.put_u8(tag);
        enc
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    /// Length-prefixed byte string
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.put_varint(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_str(&mut self, value: &str) {
        self.put_bytes(value.as_bytes());
    }

    /// Presence byte followed by the value when present
    pub fn put_opt_u64(&mut self, value: Option<u64>) {
        match value {
            Some(v) => {
                self.put_bool(true);
                self.put_u64(v);
            }
            None => self.put_bool(false),
        }
    }

    pub fn put_opt_str(&mut self, value: Option<&str>) {
        match value {
            Some(v) => {
                self.put_bool(true);
                self.put_str(v);
            }
            None => self.put_bool(false),
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked payload reader
#[derive(Debug)]
pub struct PageDecoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> PageDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> PageResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                PageError::format(format!(
                    "Page payload truncated: need {} bytes at position {}, have {}",
                    n,
                    self.pos,
                    self.bytes.len()
                ))
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> PageResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn get_bool(&mut self) -> PageResult<bool> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(PageError::format(format!("Invalid boolean byte: {}", other))),
        }
    }

    pub fn get_u32(&mut self) -> PageResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn get_u64(&mut self) -> PageResult<u64> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }

    pub fn get_i64(&mut self) -> PageResult<i64> {
        Ok(self.get_u64()? as i64)
    }

    pub fn get_varint(&mut self) -> PageResult<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.get_u8()?;
            if shift >= 64 {
                return Err(PageError::format("Varint longer than 64 bits"));
            }
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    /// Varint used as an element count; rejects counts the payload cannot hold.
    pub fn get_len(&mut self) -> PageResult<usize> {
        let len = self.get_varint()?;
        if len > self.remaining() as u64 {
            return Err(PageError::format(format!(
                "Length {} exceeds remaining payload {}",
                len,
                self.remaining()
            )));
        }
        Ok(len as usize)
    }

    pub fn get_bytes(&mut self) -> PageResult<Vec<u8>> {
        let len = self.get_len()?;
        Ok(self.take(len)?.to_vec())
    }

    pub fn get_str(&mut self) -> PageResult<String> {
        String::from_utf8(self.get_bytes()?)
            .map_err(|e| PageError::format(format!("Invalid UTF-8 string: {}", e)))
    }

    pub fn get_opt_u64(&mut self) -> PageResult<Option<u64>> {
        if self.get_bool()? {
            Ok(Some(self.get_u64()?))
        } else {
            Ok(None)
        }
    }

    pub fn get_opt_str(&mut self) -> PageResult<Option<String>> {
        if self.get_bool()? {
            Ok(Some(self.get_str()?))
        } else {
            Ok(None)
        }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Fails unless the whole payload was consumed.
    pub fn finish(self) -> PageResult<()> {
        if self.remaining() != 0 {
            return Err(PageError::format(format!(
                "{} trailing bytes after page payload",
                self.remaining()
            )));
        }
        Ok(())
    }
}
