use super::types::*;
use crate::error::{RemuxError, Result};
use crate::utils::{BitReader, BitWriter};
use bytes::{Bytes, BytesMut};

/// One raw program stream packet: a start code, a stream id and whatever
/// follows up to the next packet.
///
/// The buffer always holds the complete packet as it goes out on the wire,
/// so emitting it is a matter of freezing the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsPacket {
    data: BytesMut,
}

impl PsPacket {
    /// Wraps a complete packet.
    pub fn new(data: BytesMut) -> Self {
        Self { data }
    }

    /// Copies a complete packet.
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            data: BytesMut::from(data),
        }
    }

    /// Returns true if the packet starts with `00 00 01` followed by a
    /// system layer stream id (end code or above).
    pub fn is_valid(&self) -> bool {
        self.data.len() >= 4
            && self.data[..3] == START_CODE_PREFIX
            && self.data[3] >= StreamId::END_CODE.0
    }

    /// The stream id, if the packet starts with a start code.
    pub fn stream_id(&self) -> Option<StreamId> {
        if self.is_valid() {
            Some(StreamId(self.data[3]))
        } else {
            None
        }
    }

    /// MPEG audio packet.
    pub fn is_audio_stream(&self) -> bool {
        self.stream_id().is_some_and(StreamId::is_audio)
    }

    /// MPEG video packet.
    pub fn is_video_stream(&self) -> bool {
        self.stream_id().is_some_and(StreamId::is_video)
    }

    /// Complete pack header.
    pub fn is_pack_header(&self) -> bool {
        self.data.len() >= PACK_HEADER_SIZE && self.stream_id() == Some(StreamId::PACK_HEADER)
    }

    /// Size in bytes, headers included.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for an empty buffer.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The packet as it goes out on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Freezes the packet into its wire bytes.
    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }
}

/// The `00 00 01 B9` program end code.
pub fn end_code() -> PsPacket {
    PsPacket::from_slice(&END_CODE)
}

/// An MPEG-2 pack header carrying the System Clock Reference and mux rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackHeader {
    packet: PsPacket,
}

impl Default for PackHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl PackHeader {
    /// Creates a 14 byte pack header with SCR 0, the default mux rate and no
    /// stuffing.
    pub fn new() -> Self {
        let mut data = BytesMut::zeroed(PACK_HEADER_SIZE);
        data[..3].copy_from_slice(&START_CODE_PREFIX);
        data[3] = StreamId::PACK_HEADER.0;
        data[13] = 0xF8; // reserved + pack_stuffing_length

        let mut header = Self {
            packet: PsPacket::new(data),
        };
        header.set_scr(0, 0);
        header.set_mux_rate(DEFAULT_MUX_RATE);
        header
    }

    /// Interprets a raw packet as a pack header.
    pub fn from_packet(packet: PsPacket) -> Result<Self> {
        if !packet.is_pack_header() {
            return Err(RemuxError::InvalidData("not a pack header".into()));
        }
        Ok(Self { packet })
    }

    /// Number of stuffing bytes after the fixed header.
    pub fn stuffing_length(&self) -> usize {
        (self.packet.data[13] & 0x07) as usize
    }

    /// The 33-bit SCR base, in 90 kHz ticks.
    pub fn scr(&self) -> u64 {
        self.read_scr().map(|(base, _)| base).unwrap_or(0)
    }

    /// The 9-bit SCR extension, in 27 MHz ticks.
    pub fn scr_ext(&self) -> u16 {
        self.read_scr().map(|(_, ext)| ext).unwrap_or(0)
    }

    fn read_scr(&self) -> Result<(u64, u16)> {
        let mut reader = BitReader::new(&self.packet.data[4..10]);
        reader.skip_bits(2)?; // '01'
        let high = reader.read_bits_u64(3)?;
        reader.skip_bits(1)?;
        let mid = reader.read_bits_u64(15)?;
        reader.skip_bits(1)?;
        let low = reader.read_bits_u64(15)?;
        reader.skip_bits(1)?;
        let ext = reader.read_bits(9)? as u16;
        Ok(((high << 30) | (mid << 15) | low, ext))
    }

    /// Writes the SCR base (wrapped to 33 bits) and extension.
    pub fn set_scr(&mut self, base: u64, ext: u16) {
        let base = base & MAX_TIMESTAMP;

        let mut writer = BitWriter::with_capacity(6);
        writer.put_bits(2, 0b01);
        writer.put_bits(3, base >> 30);
        writer.put_bit(true);
        writer.put_bits(15, base >> 15);
        writer.put_bit(true);
        writer.put_bits(15, base);
        writer.put_bit(true);
        writer.put_bits(9, u64::from(ext));
        writer.put_bit(true);

        self.packet.data[4..10].copy_from_slice(&writer.into_bytes());
    }

    /// The program mux rate in units of 50 bytes per second.
    pub fn mux_rate(&self) -> u32 {
        BitReader::new(&self.packet.data[10..13])
            .read_bits(22)
            .unwrap_or(0)
    }

    /// Writes the mux rate, clamped to the 22-bit field.
    pub fn set_mux_rate(&mut self, rate: u32) {
        let mut writer = BitWriter::with_capacity(3);
        writer.put_bits(22, u64::from(rate.min(MAX_MUX_RATE)));
        writer.put_bits(2, 0b11);

        self.packet.data[10..13].copy_from_slice(&writer.into_bytes());
    }

    /// The underlying raw packet.
    pub fn as_packet(&self) -> &PsPacket {
        &self.packet
    }

    /// Unwraps the raw packet.
    pub fn into_packet(self) -> PsPacket {
        self.packet
    }
}

/// A Packetized Elementary Stream packet inside a program stream.
///
/// Only MPEG-2 style optional headers are interpreted; anything else is
/// treated as opaque payload following the 6 byte packet header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PesPacket {
    packet: PsPacket,
}

impl PesPacket {
    /// Creates an empty PES packet. Audio, video and private stream 1 get
    /// the 3 byte optional header without any flags set.
    pub fn new(stream_id: StreamId) -> Self {
        let extended = stream_id.has_extended_header();
        let size = if extended {
            PES_EXTENDED_HEADER_SIZE
        } else {
            PS_HEADER_SIZE
        };

        let mut data = BytesMut::zeroed(size);
        data[..3].copy_from_slice(&START_CODE_PREFIX);
        data[3] = stream_id.0;
        if extended {
            data[6] = 0x80;
        }

        let mut pes = Self {
            packet: PsPacket::new(data),
        };
        pes.fix_packet_length();
        pes
    }

    /// Interprets a raw packet as PES. Fails for pack headers and packets shorter than 9 bytes.
    pub fn from_packet(packet: PsPacket) -> Result<Self> {
        if !packet.is_valid()
            || packet.stream_id() == Some(StreamId::PACK_HEADER)
            || packet.len() < PES_EXTENDED_HEADER_SIZE
        {
            return Err(RemuxError::InvalidData(format!(
                "not a PES packet ({} bytes)",
                packet.len()
            )));
        }
        Ok(Self { packet })
    }

    /// The stream this packet belongs to.
    pub fn stream_id(&self) -> StreamId {
        StreamId(self.packet.data[3])
    }

    /// The length field from bytes 4..6, as found in the buffer.
    pub fn packet_length(&self) -> u16 {
        u16::from_be_bytes([self.packet.data[4], self.packet.data[5]])
    }

    /// Overwrites the length field.
    pub fn set_packet_length(&mut self, length: u16) {
        self.packet.data[4..6].copy_from_slice(&length.to_be_bytes());
    }

    /// Makes the length field agree with the buffer size. Returns true if
    /// the field had to be changed.
    pub fn fix_packet_length(&mut self) -> bool {
        let actual = u16::try_from(self.packet.len() - PS_HEADER_SIZE).unwrap_or(0);
        if self.packet_length() != actual {
            self.set_packet_length(actual);
            return true;
        }
        false
    }

    /// True if the MPEG-2 optional header with PTS/DTS flags is present.
    pub fn has_optional_header(&self) -> bool {
        self.packet.len() >= PES_EXTENDED_HEADER_SIZE
            && (self.packet.data[6] & 0xC0) == 0x80
            && self.stream_id().has_extended_header()
    }

    /// Size of everything before the payload.
    pub fn header_length(&self) -> usize {
        if self.has_optional_header() {
            self.packet.data[8] as usize + PES_EXTENDED_HEADER_SIZE
        } else {
            PS_HEADER_SIZE
        }
    }

    fn has_pts(&self) -> bool {
        self.has_optional_header() && (self.packet.data[7] & 0x80) != 0
    }

    fn has_dts(&self) -> bool {
        self.has_optional_header() && (self.packet.data[7] & 0x40) != 0
    }

    /// The presentation timestamp, if present.
    pub fn pts(&self) -> Option<u64> {
        if self.has_pts()
            && self.header_length() >= PES_PTS_HEADER_SIZE
            && self.packet.len() >= PES_PTS_HEADER_SIZE
        {
            Some(read_timestamp(&self.packet.data[9..14]))
        } else {
            None
        }
    }

    /// The decoding timestamp, if present.
    pub fn dts(&self) -> Option<u64> {
        if self.has_dts()
            && self.header_length() >= PES_PTS_DTS_HEADER_SIZE
            && self.packet.len() >= PES_PTS_DTS_HEADER_SIZE
        {
            Some(read_timestamp(&self.packet.data[14..19]))
        } else {
            None
        }
    }

    /// The timestamp used for scheduling: the PTS, or else the DTS.
    pub fn timestamp(&self) -> Option<u64> {
        self.pts().or_else(|| self.dts())
    }

    /// Writes the PTS, inserting the field into the optional header if it is
    /// not there yet.
    pub fn set_pts(&mut self, pts: u64) -> Result<()> {
        if !self.has_optional_header() {
            return Err(RemuxError::InvalidData(format!(
                "stream {} has no optional PES header",
                self.stream_id()
            )));
        }

        if self.pts().is_none() {
            self.insert_header_bytes(9, 5);
            self.packet.data[7] |= 0x80;
        }

        let marker = if self.has_dts() { 0x30 } else { 0x20 };
        write_timestamp(&mut self.packet.data[9..14], marker, pts);
        Ok(())
    }

    /// Writes the DTS. An existing DTS field is always rewritten; adding
    /// one requires a PTS, as MPEG-2 does not allow a DTS on its own.
    pub fn set_dts(&mut self, dts: u64) -> Result<()> {
        if self.dts().is_some() {
            write_timestamp(&mut self.packet.data[14..19], 0x10, dts);
            return Ok(());
        }
        if self.pts().is_none() {
            return Err(RemuxError::InvalidData(
                "cannot set a DTS on a packet without PTS".into(),
            ));
        }

        self.insert_header_bytes(14, 5);
        self.packet.data[7] |= 0x40;
        self.packet.data[9] = (self.packet.data[9] & 0x0F) | 0x30;
        write_timestamp(&mut self.packet.data[14..19], 0x10, dts);
        Ok(())
    }

    fn insert_header_bytes(&mut self, at: usize, count: usize) {
        let old = &self.packet.data;
        let mut data = BytesMut::with_capacity(old.len() + count);
        data.extend_from_slice(&old[..at]);
        data.resize(at + count, 0);
        data.extend_from_slice(&old[at..]);
        data[8] = data[8].saturating_add(count as u8);

        self.packet = PsPacket::new(data);
        self.fix_packet_length();
    }

    /// The bytes after the header.
    pub fn payload(&self) -> &[u8] {
        let start = self.header_length().min(self.packet.len());
        &self.packet.data[start..]
    }

    /// Replaces the payload and updates the length field.
    pub fn set_payload(&mut self, payload: &[u8]) {
        let header_length = self.header_length().min(self.packet.len());
        self.packet.data.truncate(header_length);
        self.packet.data.extend_from_slice(payload);
        self.fix_packet_length();
    }

    /// Size in bytes, headers included.
    pub fn len(&self) -> usize {
        self.packet.len()
    }

    /// True for an empty buffer.
    pub fn is_empty(&self) -> bool {
        self.packet.is_empty()
    }

    /// The underlying raw packet.
    pub fn as_packet(&self) -> &PsPacket {
        &self.packet
    }

    /// Unwraps the raw packet.
    pub fn into_packet(self) -> PsPacket {
        self.packet
    }
}

fn read_timestamp(field: &[u8]) -> u64 {
    (u64::from(field[0] & 0x0E) << 29)
        | (u64::from(field[1]) << 22)
        | (u64::from(field[2] & 0xFE) << 14)
        | (u64::from(field[3]) << 7)
        | (u64::from(field[4] & 0xFE) >> 1)
}

/// Writes a 33-bit PTS/DTS into a 5 byte field with its marker bits.
fn write_timestamp(field: &mut [u8], marker: u8, ts: u64) {
    let ts = ts & MAX_TIMESTAMP;

    field[0] = marker | ((ts >> 29) & 0x0E) as u8 | 0x01;
    field[1..3].copy_from_slice(&((((ts >> 14) & 0xFFFE) | 0x01) as u16).to_be_bytes());
    field[3..5].copy_from_slice(&((((ts << 1) & 0xFFFE) | 0x01) as u16).to_be_bytes());
}
