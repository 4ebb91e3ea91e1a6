use super::*;
use crate::config::MuxConfig;
use pretty_assertions::assert_eq;
use quickcheck_macros::quickcheck;
use std::collections::HashMap;
use std::io::Cursor;

const FRAME: u64 = 3_600;

fn pes_bytes(stream_id: StreamId, pts: u64, size: usize) -> Vec<u8> {
    let mut pes = PesPacket::new(stream_id);
    pes.set_payload(&vec![0x11; size]);
    pes.set_pts(pts).unwrap();
    pes.as_packet().as_bytes().to_vec()
}

/// Runs the filter to completion and returns every pack it produced.
fn remux(input: Vec<u8>) -> (Vec<Vec<PsPacket>>, PsFilterStats) {
    let mut filter = PsFilter::with_config(Cursor::new(input), MuxConfig::default());
    let mut packs = Vec::new();
    loop {
        let pack = filter.read_pack();
        if pack.is_empty() {
            break;
        }
        packs.push(pack);
    }
    (packs, filter.stats())
}

fn pes_of(packs: &[Vec<PsPacket>], stream_id: StreamId) -> Vec<PesPacket> {
    packs
        .iter()
        .flatten()
        .filter(|p| p.stream_id() == Some(stream_id))
        .map(|p| PesPacket::from_packet(p.clone()).unwrap())
        .collect()
}

#[test]
fn test_audio_and_video_share_one_pack() {
    let mut input = pes_bytes(StreamId::AUDIO, 90_000, 100);
    input.extend(pes_bytes(StreamId::VIDEO, 90_000, 2000));

    let (packs, stats) = remux(input);
    assert_eq!(packs.len(), 1);

    let pack = &packs[0];
    let ids: Vec<_> = pack.iter().map(|p| p.stream_id().unwrap()).collect();
    assert_eq!(
        ids,
        vec![StreamId::PACK_HEADER, StreamId::AUDIO, StreamId::VIDEO, StreamId::END_CODE]
    );

    let header = PackHeader::from_packet(pack[0].clone()).unwrap();
    assert_eq!(header.scr(), 90_000 - MuxConfig::default().pack_header_delay);
    assert_eq!(pes_of(&packs, StreamId::AUDIO)[0].pts(), Some(90_000));
    assert_eq!(pes_of(&packs, StreamId::VIDEO)[0].pts(), Some(90_000));
    assert_eq!(stats.pes_packets, 2);
}

#[test]
fn test_synchronized_streams_lose_nothing() {
    let frames = 300;
    let mut input = Vec::new();
    for i in 0..frames {
        input.extend(pes_bytes(StreamId::AUDIO, 900_000 + i * FRAME, 50));
        input.extend(pes_bytes(StreamId::VIDEO, 900_000 + i * FRAME, 500));
    }

    let (packs, stats) = remux(input);
    let audio = pes_of(&packs, StreamId::AUDIO);
    let video = pes_of(&packs, StreamId::VIDEO);
    assert_eq!(audio.len(), frames as usize);
    assert_eq!(video.len(), frames as usize);
    assert_eq!(stats.stale_dropped, 0);
    assert_eq!(stats.evictions, 0);
    assert_eq!(stats.discontinuities, 0);

    // Rebased onto the first pack header, one pack per interval.
    assert_eq!(audio[0].pts(), Some(90_000));
    assert_eq!(video.last().unwrap().pts(), Some(90_000 + (frames - 1) * FRAME));
    assert!(packs.len() > 2);

    let interval = MuxConfig::default().pack_header_interval;
    let scrs: Vec<_> = packs
        .iter()
        .map(|pack| PackHeader::from_packet(pack[0].clone()).unwrap().scr())
        .collect();
    for pair in scrs.windows(2) {
        assert_eq!(pair[1] - pair[0], interval);
    }
}

#[test]
fn test_lagging_stream_is_evicted() {
    let mut input = pes_bytes(StreamId::VIDEO, 90_000, 10);
    for i in 0..5000 {
        input.extend(pes_bytes(StreamId::AUDIO, 90_000 + i * 1_800, 4));
    }

    let (packs, stats) = remux(input);
    assert_eq!(stats.evictions, 1);
    assert_eq!(pes_of(&packs, StreamId::VIDEO).len(), 0);
    assert_eq!(pes_of(&packs, StreamId::AUDIO).len(), 5000);
}

#[test]
fn test_exactly_one_end_code() {
    let mut input = Vec::new();
    for i in 0..100 {
        input.extend(pes_bytes(StreamId::AUDIO, 90_000 + i * FRAME, 10));
    }

    let mut filter = PsFilter::with_config(Cursor::new(input), MuxConfig::default());
    let mut end_codes = 0;
    let mut last_pack = Vec::new();
    loop {
        let pack = filter.read_pack();
        if pack.is_empty() {
            break;
        }
        end_codes += pack.iter().filter(|p| **p == end_code()).count();
        last_pack = pack;
    }

    assert_eq!(end_codes, 1);
    assert_eq!(last_pack.last(), Some(&end_code()));
    for _ in 0..3 {
        assert!(filter.read_pack().is_empty());
        assert!(crate::format::ByteSource::next_chunk(&mut filter).is_none());
    }
}

#[test]
fn test_discontinuity_resets_clock() {
    let mut input = Vec::new();
    for i in 0..20 {
        input.extend(pes_bytes(StreamId::AUDIO, 90_000 + i * FRAME, 10));
    }
    for i in 0..20 {
        input.extend(pes_bytes(StreamId::AUDIO, 90_000 + 900_000 + i * FRAME, 10));
    }

    let (packs, stats) = remux(input);
    assert_eq!(stats.discontinuities, 1);

    let pts: Vec<_> = pes_of(&packs, StreamId::AUDIO)
        .iter()
        .map(|p| p.pts().unwrap())
        .collect();
    let expected: Vec<_> = (0..20).map(|i| 90_000 + i * FRAME).collect();
    assert_eq!(pts, expected);
}

#[test]
fn test_late_stream_start_is_aligned() {
    // Audio starts a second ahead of video; those leading packets cannot be
    // played against any picture and get dropped.
    let mut input = Vec::new();
    for i in 0..30 {
        input.extend(pes_bytes(StreamId::AUDIO, 90_000 + i * FRAME, 10));
    }
    for i in 0..70 {
        input.extend(pes_bytes(StreamId::AUDIO, 198_000 + i * FRAME, 10));
        input.extend(pes_bytes(StreamId::VIDEO, 198_000 + i * FRAME, 10));
    }

    let (packs, stats) = remux(input);
    let audio = pes_of(&packs, StreamId::AUDIO);
    let video = pes_of(&packs, StreamId::VIDEO);
    assert!(stats.stale_dropped > 0);
    assert_eq!(video.len(), 70);

    let first_audio = audio[0].pts().unwrap();
    let first_video = video[0].pts().unwrap();
    assert!(first_video - first_audio <= MuxConfig::default().start_alignment_window);
}

#[test]
fn test_garbage_between_packets_is_skipped() {
    let mut input = vec![0xFF, 0xFF];
    input.extend(pes_bytes(StreamId::AUDIO, 90_000, 10));
    input.extend([0x00, 0x00, 0x00, 0x42]);
    input.extend(pes_bytes(StreamId::AUDIO, 90_000 + FRAME, 10));

    let (packs, stats) = remux(input);
    assert_eq!(pes_of(&packs, StreamId::AUDIO).len(), 2);
    assert_eq!(stats.skipped_bytes, 6);
}

#[quickcheck]
fn prop_packs_are_framed(steps: Vec<(bool, u8, u8)>) -> bool {
    let mut clocks = HashMap::new();
    let mut input = Vec::new();
    for &(video, delta, size) in steps.iter().take(300) {
        let stream_id = if video { StreamId::VIDEO } else { StreamId::AUDIO };
        let clock = clocks.entry(stream_id).or_insert(180_000u64);
        *clock += u64::from(delta) * 100;
        input.extend(pes_bytes(stream_id, *clock, size as usize));
    }

    let (packs, _) = remux(input);

    let headers_first = packs.iter().all(|pack| pack[0].is_pack_header());
    let lengths_match = packs.iter().flatten().all(|p| {
        match PesPacket::from_packet(p.clone()) {
            Ok(pes) => pes.packet_length() as usize == pes.len() - 6,
            Err(_) => true,
        }
    });
    let one_end_code = packs.iter().flatten().filter(|p| **p == end_code()).count() == 1;

    headers_first && lengths_match && one_end_code
}

#[quickcheck]
fn prop_timestamps_never_go_backwards(deltas: Vec<u8>) -> bool {
    let mut input = Vec::new();
    let mut audio = 45_000u64;
    let mut video = 45_000u64;
    for &delta in deltas.iter().take(400) {
        audio += u64::from(delta) * 10;
        video += u64::from(delta) * 20;
        input.extend(pes_bytes(StreamId::AUDIO, audio, 8));
        input.extend(pes_bytes(StreamId::VIDEO, video, 8));
    }

    let (packs, stats) = remux(input);
    if stats.discontinuities > 0 {
        return true;
    }

    [StreamId::AUDIO, StreamId::VIDEO].iter().all(|&id| {
        pes_of(&packs, id)
            .windows(2)
            .all(|pair| pair[0].pts() <= pair[1].pts())
    })
}

#[quickcheck]
fn prop_reader_resyncs_after_garbage(garbage: Vec<u8>) -> bool {
    // Without zero bytes the garbage cannot contain a start code.
    let garbage: Vec<u8> = garbage.into_iter().map(|b| b.max(1)).collect();
    let mut header = PackHeader::new();
    header.set_scr(123_456, 0);

    let mut input = garbage.clone();
    input.extend_from_slice(header.as_packet().as_bytes());

    let mut reader = PsPacketReader::new(Cursor::new(input));
    match reader.read_packet() {
        Ok(Some(packet)) => {
            packet == *header.as_packet() && reader.skipped_bytes() == garbage.len() as u64
        }
        _ => false,
    }
}
