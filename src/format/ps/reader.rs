use super::packet::PsPacket;
use super::types::*;
use crate::error::Result;
use bytes::BytesMut;
use std::io::{self, Read};

fn is_packet_start(header: &[u8]) -> bool {
    header[..3] == START_CODE_PREFIX && header[3] >= StreamId::PACK_HEADER.0
}

/// Splits a raw program stream into packets.
///
/// The reader has no framing guarantee from its input, so whenever the
/// six bytes at hand do not start a packet it slides forward one byte at a
/// time until they do.
pub struct PsPacketReader<R: Read> {
    input: R,
    skipped_bytes: u64,
}

impl<R: Read> PsPacketReader<R> {
    /// Creates a reader over a raw program stream.
    pub fn new(input: R) -> Self {
        Self {
            input,
            skipped_bytes: 0,
        }
    }

    /// Total number of bytes discarded while searching for packet starts.
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped_bytes
    }

    /// The underlying input.
    pub fn get_ref(&self) -> &R {
        &self.input
    }

    /// Returns the underlying input.
    pub fn into_inner(self) -> R {
        self.input
    }

    /// Reads the next pack header or PES packet.
    ///
    /// Returns `Ok(None)` once the input runs dry, including in the middle of
    /// a packet. Other I/O errors are passed on.
    pub fn read_packet(&mut self) -> Result<Option<PsPacket>> {
        let mut header = [0u8; PS_HEADER_SIZE];
        if !self.read_full(&mut header)? {
            return Ok(None);
        }

        let mut skipped = 0u64;
        while !is_packet_start(&header) {
            let mut next = [0u8; 1];
            if !self.read_full(&mut next)? {
                self.skipped_bytes += skipped;
                return Ok(None);
            }
            header.copy_within(1.., 0);
            header[PS_HEADER_SIZE - 1] = next[0];
            skipped += 1;
        }

        if skipped > 0 {
            log::warn!("skipped {} bytes to find the next packet start", skipped);
            self.skipped_bytes += skipped;
        }

        let mut buffer = BytesMut::with_capacity(PACK_HEADER_SIZE + MAX_PACK_STUFFING);
        buffer.extend_from_slice(&header);

        if header[3] == StreamId::PACK_HEADER.0 {
            buffer.resize(PACK_HEADER_SIZE, 0);
            if !self.read_full(&mut buffer[PS_HEADER_SIZE..])? {
                return Ok(None);
            }

            let stuffing = (buffer[13] & 0x07) as usize;
            if stuffing > 0 {
                buffer.resize(PACK_HEADER_SIZE + stuffing, 0);
                if !self.read_full(&mut buffer[PACK_HEADER_SIZE..])? {
                    return Ok(None);
                }
            }
        } else {
            let length = u16::from_be_bytes([header[4], header[5]]) as usize;
            buffer.resize(PS_HEADER_SIZE + length, 0);
            if !self.read_full(&mut buffer[PS_HEADER_SIZE..])? {
                return Ok(None);
            }
        }

        Ok(Some(PsPacket::new(buffer)))
    }

    /// Fills `buf` completely. Returns false on a short read.
    fn read_full(&mut self, buf: &mut [u8]) -> Result<bool> {
        match self.input.read_exact(buf) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
