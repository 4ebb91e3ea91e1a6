//! # Utility Functions and Types
//!
//! Bit-level helpers shared by the container modules.
//!
//! ```rust
//! use mpegremux::utils::{BitReader, BitWriter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut writer = BitWriter::new();
//! writer.put_bits(3, 0b101);
//! writer.put_bits(5, 0b10011);
//!
//! let bytes = writer.into_bytes();
//! let mut reader = BitReader::new(&bytes);
//! assert_eq!(reader.read_bits(3)?, 0b101);
//! # Ok(())
//! # }
//! ```

/// Bit manipulation and bitstream reading utilities
pub mod bits;

pub use bits::*;
