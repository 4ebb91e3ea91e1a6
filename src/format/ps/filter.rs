use super::packet::{end_code, PackHeader, PesPacket, PsPacket};
use super::queue::StreamQueues;
use super::reader::PsPacketReader;
use super::types::*;
use crate::config::{self, MuxConfig};
use crate::format::stream::{drain_chunk, ByteSource};
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::io::{self, Read};

/// Counters collected while remultiplexing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PsFilterStats {
    /// Packs handed out, the final one included.
    pub packs: u64,
    /// PES packets placed into packs.
    pub pes_packets: u64,
    /// Packets dropped because they carried neither PTS nor DTS.
    pub untimed_dropped: u64,
    /// Packets dropped to align the start of the streams.
    pub stale_dropped: u64,
    /// Clock resets after a timestamp jump.
    pub discontinuities: u64,
    /// PES packets whose length field had to be corrected.
    pub length_fixes: u64,
    /// Lagging streams dropped because another stream hit the hard limit.
    pub evictions: u64,
    /// Input bytes skipped while searching for packet starts.
    pub skipped_bytes: u64,
}

/// Remultiplexes an MPEG-2 program stream.
///
/// Incoming PES packets are sorted into per stream queues and handed out
/// again in timestamp order, grouped into packs that each open with a
/// freshly computed pack header. Timestamps are rebased so that the first
/// pack starts at `initial_pack_header`, whatever clock the encoder used.
pub struct PsFilter<R: Read> {
    reader: PsPacketReader<R>,
    config: MuxConfig,
    streams: StreamQueues,
    system_header: Option<PsPacket>,
    stream_map: Option<PsPacket>,
    last_timestamp: HashMap<StreamId, u64>,
    clock_offset: Option<i64>,
    next_pack_header: u64,
    stream_finished: bool,
    end_code_sent: bool,
    pending: Bytes,
    stats: PsFilterStats,
}

impl<R: Read> PsFilter<R> {
    /// Creates a filter using the process-wide configuration.
    pub fn new(input: R) -> Self {
        Self::with_config(input, config::mux_config())
    }

    /// Creates a filter with explicit tunables.
    pub fn with_config(input: R, config: MuxConfig) -> Self {
        Self {
            reader: PsPacketReader::new(input),
            streams: StreamQueues::new(config.queue_hard_limit),
            system_header: None,
            stream_map: None,
            last_timestamp: HashMap::new(),
            clock_offset: None,
            next_pack_header: config.initial_pack_header,
            stream_finished: false,
            end_code_sent: false,
            pending: Bytes::new(),
            stats: PsFilterStats::default(),
            config,
        }
    }

    /// The tunables in use.
    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    /// Counters collected so far.
    pub fn stats(&self) -> PsFilterStats {
        PsFilterStats {
            evictions: self.streams.evictions(),
            skipped_bytes: self.reader.skipped_bytes(),
            ..self.stats
        }
    }

    /// Returns the upstream input. Queued packets are discarded.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    /// Builds the next pack.
    ///
    /// Returns an empty vector once the end code has been handed out.
    pub fn read_pack(&mut self) -> Vec<PsPacket> {
        let mut pack = Vec::new();

        loop {
            let (snapshot, dropped) = self.streams.snapshot();
            self.stats.untimed_dropped += dropped as u64;

            if pack.is_empty()
                && !self.stream_finished
                && snapshot.min_depth < self.config.max_queue_size
            {
                self.filter_packet();
            } else if let Some((stream_id, ts)) = snapshot.lowest {
                if !self.last_timestamp.contains_key(&stream_id) {
                    let stale = self
                        .streams
                        .discard_stale(stream_id, self.config.start_alignment_window);
                    if stale > 0 {
                        log::debug!("dropped {} leading packets of stream {}", stale, stream_id);
                        self.stats.stale_dropped += stale as u64;
                        continue;
                    }
                }

                if let Some(last) = self.last_timestamp.insert(stream_id, ts) {
                    if last.abs_diff(ts) >= self.config.discontinuity_threshold {
                        log::info!(
                            "timestamp discontinuity on stream {} ({} -> {}), resetting clock with {} packets queued",
                            stream_id,
                            last,
                            ts,
                            self.streams.len()
                        );
                        self.last_timestamp.clear();
                        self.clock_offset = None;
                        self.stats.discontinuities += 1;
                        pack.clear();
                        continue;
                    }
                }

                let next_pack_header = self.next_pack_header;
                let offset = *self.clock_offset.get_or_insert_with(|| {
                    let offset = ts as i64 - next_pack_header as i64;
                    log::debug!("clock offset set to {} by stream {}", offset, stream_id);
                    offset
                });

                let corrected = ts as i64 - offset;
                let close_at = (self.next_pack_header + self.config.pack_header_interval)
                    .saturating_sub(self.config.pack_header_delay)
                    as i64;

                if corrected >= close_at {
                    self.finish_pack(&mut pack);
                    break;
                } else if self.stream_finished
                    || snapshot.min_depth > self.config.max_queue_size / 2
                    || snapshot.max_depth >= self.config.max_queue_size
                {
                    if let Some(pes) = self.streams.pop_front(stream_id) {
                        pack.push(rebase(pes, offset));
                    }
                } else {
                    self.filter_packet();
                }
            } else if !self.stream_finished {
                self.filter_packet();
            } else if !self.end_code_sent {
                pack.push(end_code());
                self.end_code_sent = true;
                self.finish_pack(&mut pack);
                log::info!(
                    "program stream finished after {} packs and {} PES packets",
                    self.stats.packs,
                    self.stats.pes_packets
                );
                break;
            } else {
                break;
            }
        }

        pack
    }

    /// Prepends the pack header, followed by any held system header and
    /// stream map, and advances the pack clock.
    fn finish_pack(&mut self, pack: &mut Vec<PsPacket>) {
        let size: usize = pack.iter().map(PsPacket::len).sum();
        let mux_rate = u32::try_from(size * 2 / 50)
            .unwrap_or(MAX_MUX_RATE)
            .clamp(1, MAX_MUX_RATE);

        let mut header = PackHeader::new();
        header.set_scr(
            self.next_pack_header.saturating_sub(self.config.pack_header_delay),
            0,
        );
        header.set_mux_rate(mux_rate);
        log::debug!(
            "pack {}: scr {} ({:?}), mux rate {}, {} packets",
            self.stats.packs,
            header.scr(),
            pts_to_time(header.scr()),
            mux_rate,
            pack.len()
        );

        let mut prefix = vec![header.into_packet()];
        prefix.extend(self.system_header.take());
        prefix.extend(self.stream_map.take());
        pack.splice(0..0, prefix);

        self.next_pack_header += self.config.pack_header_interval;
        self.stats.packs += 1;
        self.stats.pes_packets += pack
            .iter()
            .filter(|p| p.stream_id().is_some_and(StreamId::is_data_stream))
            .count() as u64;
    }

    /// Pulls one packet from the input and files it.
    pub fn filter_packet(&mut self) {
        let packet = match self.reader.read_packet() {
            Ok(Some(packet)) => packet,
            Ok(None) => {
                log::debug!("input exhausted");
                self.stream_finished = true;
                return;
            }
            Err(e) => {
                log::warn!("upstream read failed, finishing stream: {}", e);
                self.stream_finished = true;
                return;
            }
        };

        let Some(stream_id) = packet.stream_id() else {
            return;
        };

        match stream_id {
            StreamId::SYSTEM_HEADER => self.system_header = Some(packet),
            StreamId::PROGRAM_STREAM_MAP => self.stream_map = Some(packet),
            id if id.is_data_stream() => match PesPacket::from_packet(packet) {
                Ok(mut pes) => {
                    if pes.fix_packet_length() {
                        log::warn!("corrected length field of a stream {} packet", id);
                        self.stats.length_fixes += 1;
                    }
                    log::trace!("queued packet of stream {} ({} bytes)", id, pes.len());
                    self.streams.push(pes);
                }
                Err(e) => log::debug!("dropping stream {} packet: {}", id, e),
            },
            _ => {}
        }
    }
}

/// Moves the packet's timestamps onto the pack clock.
fn rebase(mut pes: PesPacket, offset: i64) -> PsPacket {
    let shift = |ts: u64| (ts as i64 - offset) as u64 & MAX_TIMESTAMP;

    let pts = pes.pts();
    let dts = pes.dts();
    // Neither fails while the field being written is already present.
    if let Some(pts) = pts {
        let _ = pes.set_pts(shift(pts));
    }
    if let Some(dts) = dts {
        let _ = pes.set_dts(shift(dts));
    }

    pes.into_packet()
}

impl<R: Read + Send> ByteSource for PsFilter<R> {
    fn next_chunk(&mut self) -> Option<Bytes> {
        let pack = self.read_pack();
        if pack.is_empty() {
            return None;
        }

        let size = pack.iter().map(PsPacket::len).sum();
        let mut chunk = BytesMut::with_capacity(size);
        for packet in pack {
            chunk.extend_from_slice(packet.as_bytes());
        }
        Some(chunk.freeze())
    }
}

impl<R: Read + Send> Read for PsFilter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending.is_empty() {
            match self.next_chunk() {
                Some(chunk) => self.pending = chunk,
                None => return Ok(0),
            }
        }
        Ok(drain_chunk(&mut self.pending, buf))
    }
}
