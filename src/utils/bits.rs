use crate::error::{RemuxError, Result};

/// A bit-level reader for fixed-layout binary headers.
///
/// Bits are consumed most significant first, which is how every MPEG system
/// layer field is laid out.
///
/// Example:
/// ```
/// use mpegremux::utils::BitReader;
///
/// let data = [0b10110011];
/// let mut reader = BitReader::new(&data);
///
/// assert_eq!(reader.read_bit().unwrap(), true);    // 1
/// assert_eq!(reader.read_bits(3).unwrap(), 0b011); // 011
/// ```
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_offset: usize,
    bit_offset: u8,
}

impl<'a> BitReader<'a> {
    /// Creates a new BitReader from a byte slice
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            byte_offset: 0,
            bit_offset: 0,
        }
    }

    /// Reads a single bit from the stream.
    /// Returns true for 1, false for 0.
    ///
    /// Returns error if end of data is reached.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.byte_offset >= self.data.len() {
            return Err(RemuxError::Parser("Reached end of data".into()));
        }

        let bit = (self.data[self.byte_offset] >> (7 - self.bit_offset)) & 1;
        self.bit_offset += 1;

        if self.bit_offset == 8 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }

        Ok(bit == 1)
    }

    /// Reads n bits and returns them as a number.
    /// The bits are interpreted as big-endian.
    ///
    /// Returns error if n > 32 or end of data is reached.
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        if n > 32 {
            return Err(RemuxError::Parser("Too many bits requested".into()));
        }

        Ok(self.read_bits_u64(n)? as u32)
    }

    /// Reads up to 64 bits, needed for 33-bit clock fields.
    pub fn read_bits_u64(&mut self, n: u32) -> Result<u64> {
        if n > 64 {
            return Err(RemuxError::Parser("Too many bits requested".into()));
        }
        if (n as usize) > self.available_bits() {
            return Err(RemuxError::Parser("Reached end of data".into()));
        }

        let mut value = 0u64;
        for _ in 0..n {
            value = (value << 1) | u64::from(self.read_bit()?);
        }

        Ok(value)
    }

    /// Skips n bits in the stream.
    pub fn skip_bits(&mut self, n: u32) -> Result<()> {
        for _ in 0..n {
            self.read_bit()?;
        }
        Ok(())
    }

    /// Returns number of bits available to read.
    pub fn available_bits(&self) -> usize {
        (self.data.len() - self.byte_offset) * 8 - self.bit_offset as usize
    }
}

/// The writing counterpart of [`BitReader`].
#[derive(Debug, Default)]
pub struct BitWriter {
    data: Vec<u8>,
    bit_offset: u8,
}

impl BitWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty writer with room for `bytes` bytes.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
            bit_offset: 0,
        }
    }

    /// Appends the low `n` bits of `value`, most significant first.
    pub fn put_bits(&mut self, n: u32, value: u64) {
        for i in (0..n).rev() {
            if self.bit_offset == 0 {
                self.data.push(0);
            }
            if (value >> i) & 1 == 1 {
                if let Some(last) = self.data.last_mut() {
                    *last |= 0x80 >> self.bit_offset;
                }
            }
            self.bit_offset = (self.bit_offset + 1) % 8;
        }
    }

    /// Appends a single bit.
    pub fn put_bit(&mut self, bit: bool) {
        self.put_bits(1, u64::from(bit));
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        match self.bit_offset {
            0 => self.data.len() * 8,
            used => (self.data.len() - 1) * 8 + used as usize,
        }
    }

    /// Returns the written bytes; a partial last byte is zero padded.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bits() {
        let data = &[0b10110011, 0b01011010];
        let mut reader = BitReader::new(data);

        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_bits(5).unwrap(), 0b10011);
        assert_eq!(reader.read_bits(4).unwrap(), 0b0101);
        assert_eq!(reader.available_bits(), 4);
    }

    #[test]
    fn test_read_past_end() {
        let data = &[0xFF];
        let mut reader = BitReader::new(data);

        assert!(reader.read_bits(9).is_err());
        assert_eq!(reader.read_bits(8).unwrap(), 0xFF);
        assert!(reader.read_bit().is_err());
    }

    #[test]
    fn test_read_33_bits() {
        let data = &[0xFF, 0xFF, 0xFF, 0xFF, 0x80];
        let mut reader = BitReader::new(data);

        assert_eq!(reader.read_bits_u64(33).unwrap(), 0x1_FFFF_FFFF);
    }

    #[test]
    fn test_writer_matches_reader() {
        let mut writer = BitWriter::new();
        writer.put_bits(2, 0b01);
        writer.put_bits(3, 0b101);
        writer.put_bit(true);
        writer.put_bits(33, 0x1_2345_6789);
        assert_eq!(writer.bit_len(), 39);

        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), 5);

        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_bits(2).unwrap(), 0b01);
        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert!(reader.read_bit().unwrap());
        assert_eq!(reader.read_bits_u64(33).unwrap(), 0x1_2345_6789);
    }
}
