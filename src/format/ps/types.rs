use std::fmt;
use std::time::Duration;

/// The byte following a `00 00 01` start code prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(pub u8);

impl StreamId {
    /// Program end code.
    pub const END_CODE: StreamId = StreamId(0xB9);
    /// Pack header.
    pub const PACK_HEADER: StreamId = StreamId(0xBA);
    /// System header.
    pub const SYSTEM_HEADER: StreamId = StreamId(0xBB);
    /// Program stream map.
    pub const PROGRAM_STREAM_MAP: StreamId = StreamId(0xBC);
    /// Private stream 1 (AC-3, LPCM, subtitles).
    pub const PRIVATE_1: StreamId = StreamId(0xBD);
    /// Padding stream.
    pub const PADDING: StreamId = StreamId(0xBE);
    /// Private stream 2 (navigation data).
    pub const PRIVATE_2: StreamId = StreamId(0xBF);
    /// First MPEG audio stream.
    pub const AUDIO: StreamId = StreamId(0xC0);
    /// First MPEG video stream.
    pub const VIDEO: StreamId = StreamId(0xE0);
    /// Entitlement control messages; first id past the data streams.
    pub const ECM: StreamId = StreamId(0xF0);

    /// MPEG audio streams, `0xC0..=0xDF`.
    pub fn is_audio(self) -> bool {
        (0xC0..=0xDF).contains(&self.0)
    }

    /// MPEG video streams, `0xE0..=0xEF`.
    pub fn is_video(self) -> bool {
        (0xE0..=0xEF).contains(&self.0)
    }

    /// Streams that carry elementary stream data and get queued by the
    /// scheduler: private stream 1 up to (not including) ECM, minus padding.
    pub fn is_data_stream(self) -> bool {
        self >= Self::PRIVATE_1 && self < Self::ECM && self != Self::PADDING
    }

    /// Streams whose PES header carries the optional MPEG-2 extension with
    /// PTS/DTS flags.
    pub fn has_extended_header(self) -> bool {
        self.is_audio() || self.is_video() || self == Self::PRIVATE_1
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

impl From<u8> for StreamId {
    fn from(id: u8) -> Self {
        StreamId(id)
    }
}

// Start codes
/// Prefix of every start code.
pub const START_CODE_PREFIX: [u8; 3] = [0x00, 0x00, 0x01];
/// Program end code bytes.
pub const END_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xB9];

// Sizes
/// Start code plus length field.
pub const PS_HEADER_SIZE: usize = 6;
/// MPEG-2 pack header without stuffing.
pub const PACK_HEADER_SIZE: usize = 14;
/// Largest stuffing length the 3-bit field allows.
pub const MAX_PACK_STUFFING: usize = 7;
/// PES header up to and including the header data length.
pub const PES_EXTENDED_HEADER_SIZE: usize = 9;
/// PES header carrying a PTS.
pub const PES_PTS_HEADER_SIZE: usize = 14;
/// PES header carrying a PTS and a DTS.
pub const PES_PTS_DTS_HEADER_SIZE: usize = 19;

// Clock
/// System clock ticks per second.
pub const PTS_HZ: u64 = 90_000;
/// Largest 33-bit clock value.
pub const MAX_TIMESTAMP: u64 = (1 << 33) - 1;
/// Largest 22-bit mux rate.
pub const MAX_MUX_RATE: u32 = (1 << 22) - 1;
/// Mux rate of a fresh pack header.
pub const DEFAULT_MUX_RATE: u32 = 20_000;

/// Converts 90 kHz ticks to a duration.
pub fn pts_to_time(pts: u64) -> Duration {
    Duration::from_nanos(((pts as u128 * 1_000_000_000) / PTS_HZ as u128) as u64)
}
