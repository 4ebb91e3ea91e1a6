//! # MPEG-2 Program Stream (PS) Remultiplexing
//!
//! This module rebuilds the program stream written by an encoder into one
//! that strict hardware players accept:
//!
//! - packets are read with resynchronization on garbage or mid-packet starts
//! - PES packets are interleaved by timestamp across all elementary streams
//! - pack headers are inserted at a steady pace with a consistent SCR
//! - timestamps are rebased onto the pack header clock
//! - clock discontinuities and lagging streams are recovered from locally
//!
//! ## Example Usage
//!
//! ```rust
//! use mpegremux::format::ps::{PesPacket, PsFilter, StreamId, END_CODE};
//! use mpegremux::config::MuxConfig;
//! use std::io::{Cursor, Read};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut input = Vec::new();
//! for (stream_id, pts) in [(StreamId::AUDIO, 7_200_000), (StreamId::VIDEO, 7_200_000)] {
//!     let mut pes = PesPacket::new(stream_id);
//!     pes.set_payload(&[0u8; 64]);
//!     pes.set_pts(pts)?;
//!     input.extend_from_slice(pes.as_packet().as_bytes());
//! }
//!
//! let mut filter = PsFilter::with_config(Cursor::new(input), MuxConfig::default());
//! let mut output = Vec::new();
//! filter.read_to_end(&mut output)?;
//!
//! assert_eq!(&output[..4], &[0x00, 0x00, 0x01, 0xBA]);
//! assert!(output.ends_with(&END_CODE));
//! # Ok(())
//! # }
//! ```

/// Program stream remultiplexer
pub mod filter;

/// Pack header and PES packet model
pub mod packet;

/// Per stream packet queues
pub mod queue;

/// Packet reader with resynchronization
pub mod reader;

/// Stream ids and constants
pub mod types;

#[cfg(test)]
mod tests;

pub use filter::{PsFilter, PsFilterStats};
pub use packet::{end_code, PackHeader, PesPacket, PsPacket};
pub use queue::{QueueSnapshot, StreamQueues};
pub use reader::PsPacketReader;
pub use types::{
    pts_to_time,
    StreamId,
    END_CODE,
    MAX_TIMESTAMP,
    PACK_HEADER_SIZE,
    PTS_HZ,
};
