//! Positioned big-endian reader over an immutable byte buffer
//!
//! Every structure in a Calvin container is addressed by an absolute offset, so
//! readers jump around the file constantly. [`ByteReader`] owns only a position
//! into shared bytes; [`Scope`] captures that position on entry and restores it
//! when dropped, on the error path as well as on success.

use std::ops::{Deref, DerefMut};

use byteorder::{BigEndian, ByteOrder};

use super::LOCALE_SIZE;
use crate::error::{FormatError, ReadError, Result};

/// A cursor decoding network-order primitives from a byte slice
#[derive(Clone, Copy, Debug)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}
impl<'a> ByteReader<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Creates a reader already positioned at `offset`
    pub fn at(bytes: &'a [u8], offset: u64) -> Result<Self> {
        let mut reader = Self::new(bytes);
        reader.seek(offset)?;
        Ok(reader)
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Moves the cursor to an absolute offset
    ///
    /// Seeking to exactly the end of the buffer is allowed; anything past it is not.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        if offset > self.bytes.len() as u64 {
            return Err(ReadError::OffsetOutOfBounds {
                offset,
                len: self.bytes.len(),
            }
            .into());
        }
        self.pos = offset as usize;
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Seeks to `offset` for the lifetime of the returned guard.
    ///
    /// The position held before the call is restored when the guard drops.
    pub fn scoped(&mut self, offset: u64) -> Result<Scope<'_, 'a>> {
        let restore = self.pos;
        self.seek(offset)?;
        Ok(Scope {
            reader: self,
            restore,
        })
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(ReadError::ShortRead {
                pos: self.pos,
                needed: n,
                available: self.remaining(),
            }
            .into());
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    /// Reads a big-endian IEEE-754 single, independent of the host byte order
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(BigEndian::read_f32(self.take(4)?))
    }

    /// Reads a signed 32-bit count, rejecting negative values
    pub fn read_count(&mut self, field: &'static str) -> Result<usize> {
        let value = self.read_i32()?;
        usize::try_from(value).map_err(|_| FormatError::NegativeCount { field, value }.into())
    }

    /// Reads a raw run of `len` single-byte characters
    pub fn read_ascii(&mut self, len: usize) -> Result<String> {
        Ok(latin1(self.take(len)?))
    }

    /// Reads an `i32` length followed by that many single-byte characters.
    ///
    /// With a `total` framing width the cursor is advanced to `start + total`
    /// whatever the actual string length.
    pub fn read_string(&mut self, total: Option<usize>) -> Result<String> {
        let start = self.pos;
        let len = self.read_count("string length")?;
        let value = self.read_ascii(len)?;
        self.skip_framing(start, total)?;
        Ok(value)
    }

    /// Reads an `i32` character count followed by that many 16-bit code units.
    ///
    /// Only the low byte of each big-endian unit is kept, which is exact for
    /// Latin-1 text.
    pub fn read_wstring(&mut self, total: Option<usize>) -> Result<String> {
        let start = self.pos;
        let len = self.read_count("wide string length")?;
        let units = self.take(len * 2)?;
        let value = units.chunks_exact(2).map(|unit| char::from(unit[1])).collect();
        self.skip_framing(start, total)?;
        Ok(value)
    }

    /// Date-times are stored as opaque wide strings
    pub fn read_datetime(&mut self) -> Result<String> {
        self.read_wstring(None)
    }

    pub fn read_locale(&mut self) -> Result<[u8; LOCALE_SIZE]> {
        let mut locale = [0u8; LOCALE_SIZE];
        locale.copy_from_slice(self.take(LOCALE_SIZE)?);
        Ok(locale)
    }

    /// Reads an `i32` length followed by that many raw bytes
    pub fn read_blob(&mut self) -> Result<&'a [u8]> {
        let len = self.read_count("value length")?;
        self.take(len)
    }

    fn skip_framing(&mut self, start: usize, total: Option<usize>) -> Result<()> {
        if let Some(total) = total {
            let consumed = self.pos - start;
            if total > consumed {
                self.skip(total - consumed)?;
            }
        }
        Ok(())
    }
}

/// Maps every byte to the code point of the same value
pub(crate) fn latin1(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

/// Restores the wrapped reader's position when dropped
pub struct Scope<'r, 'a> {
    reader: &'r mut ByteReader<'a>,
    restore: usize,
}
impl<'a> Deref for Scope<'_, 'a> {
    type Target = ByteReader<'a>;
    fn deref(&self) -> &Self::Target {
        self.reader
    }
}
impl DerefMut for Scope<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.reader
    }
}
impl Drop for Scope<'_, '_> {
    fn drop(&mut self) {
        self.reader.pos = self.restore;
    }
}
