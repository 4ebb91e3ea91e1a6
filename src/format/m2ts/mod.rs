//! # BDAV MPEG-2 Transport Stream (M2TS)
//!
//! M2TS is the transport stream variant used by Blu-ray and many DLNA
//! renderers: every 188 byte transport stream packet is preceded by a 4 byte
//! field carrying a copy permission indicator and an arrival timestamp.
//!
//! [`M2tsFilter`] converts a plain transport stream into this layout. The
//! prefix is always written as zero; renderers that accept M2TS over HTTP
//! tolerate a zero arrival time base.
//!
//! ```rust
//! use mpegremux::format::m2ts::{M2tsFilter, M2TS_PACKET_SIZE, TS_PACKET_SIZE};
//! use mpegremux::format::ByteSource;
//! use std::io::Cursor;
//!
//! let mut ts = vec![0u8; TS_PACKET_SIZE];
//! ts[0] = 0x47;
//!
//! let mut filter = M2tsFilter::new(Cursor::new(ts));
//! let unit = filter.next_chunk().unwrap();
//! assert_eq!(unit.len(), M2TS_PACKET_SIZE);
//! assert_eq!(&unit[..5], &[0, 0, 0, 0, 0x47]);
//! assert!(filter.next_chunk().is_none());
//! ```

use crate::format::stream::{drain_chunk, ByteSource};
use bytes::{BufMut, Bytes, BytesMut};
use std::io::{self, Read};

/// Size of a transport stream packet.
pub const TS_PACKET_SIZE: usize = 188;
/// First byte of every transport stream packet.
pub const TS_SYNC_BYTE: u8 = 0x47;
/// Size of the copy permission and arrival time prefix.
pub const M2TS_HEADER_SIZE: usize = 4;
/// Size of one M2TS unit.
pub const M2TS_PACKET_SIZE: usize = M2TS_HEADER_SIZE + TS_PACKET_SIZE;

/// Wraps a raw transport stream into 192 byte M2TS units.
pub struct M2tsFilter<R: Read> {
    input: R,
    pending: Bytes,
    finished: bool,
    packets: u64,
    skipped_bytes: u64,
}

impl<R: Read> M2tsFilter<R> {
    /// Creates a filter reading a raw transport stream from `input`.
    pub fn new(input: R) -> Self {
        Self {
            input,
            pending: Bytes::new(),
            finished: false,
            packets: 0,
            skipped_bytes: 0,
        }
    }

    /// Number of units produced so far.
    pub fn packets(&self) -> u64 {
        self.packets
    }

    /// Number of input bytes dropped while looking for sync bytes.
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped_bytes
    }

    /// Returns the upstream input.
    pub fn into_inner(self) -> R {
        self.input
    }

    /// Reads the next transport stream packet and returns it with its M2TS
    /// prefix, or `None` on a short read.
    pub fn read_unit(&mut self) -> Option<Bytes> {
        let mut byte = [0u8; 1];
        let mut skipped = 0u64;
        loop {
            if !self.read_full(&mut byte) {
                self.skipped_bytes += skipped;
                return None;
            }
            if byte[0] == TS_SYNC_BYTE {
                break;
            }
            skipped += 1;
        }

        if skipped > 0 {
            log::warn!("skipped {} bytes to find the next sync byte", skipped);
            self.skipped_bytes += skipped;
        }

        let mut unit = BytesMut::with_capacity(M2TS_PACKET_SIZE);
        unit.put_u32(0); // copy permission + arrival time stamp
        unit.put_u8(TS_SYNC_BYTE);
        unit.resize(M2TS_PACKET_SIZE, 0);
        if !self.read_full(&mut unit[M2TS_HEADER_SIZE + 1..]) {
            return None;
        }

        self.packets += 1;
        Some(unit.freeze())
    }

    fn read_full(&mut self, buf: &mut [u8]) -> bool {
        match self.input.read_exact(buf) {
            Ok(()) => true,
            Err(e) => {
                if e.kind() != io::ErrorKind::UnexpectedEof {
                    log::warn!("upstream read failed, ending stream: {}", e);
                }
                false
            }
        }
    }
}

impl<R: Read + Send> ByteSource for M2tsFilter<R> {
    fn next_chunk(&mut self) -> Option<Bytes> {
        if self.finished {
            return None;
        }

        let unit = self.read_unit();
        if unit.is_none() {
            log::info!("transport stream ended after {} packets", self.packets);
            self.finished = true;
        }
        unit
    }
}

impl<R: Read + Send> Read for M2tsFilter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending.is_empty() {
            match self.next_chunk() {
                Some(unit) => self.pending = unit,
                None => return Ok(0),
            }
        }
        Ok(drain_chunk(&mut self.pending, buf))
    }
}
