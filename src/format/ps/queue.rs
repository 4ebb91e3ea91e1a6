use super::packet::PesPacket;
use super::types::StreamId;
use std::collections::{BTreeMap, VecDeque};

/// Per stream FIFO queues of PES packets waiting to be multiplexed.
///
/// The queues are bounded by a hard limit. When a stream reaches it, the
/// least populated other stream is considered to be lagging and its queue
/// is dropped as a whole.
#[derive(Debug)]
pub struct StreamQueues {
    queues: BTreeMap<StreamId, VecDeque<PesPacket>>,
    hard_limit: usize,
    evictions: u64,
}

/// The stream with the lowest front timestamp, and the queue depth range
/// over all non-empty queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// Stream whose front packet has the lowest timestamp, with that timestamp.
    pub lowest: Option<(StreamId, u64)>,
    /// Smallest non-empty queue depth, `usize::MAX` if all are empty.
    pub min_depth: usize,
    /// Largest queue depth.
    pub max_depth: usize,
}

impl StreamQueues {
    /// Creates empty queues bounded by `hard_limit` packets each.
    pub fn new(hard_limit: usize) -> Self {
        Self {
            queues: BTreeMap::new(),
            hard_limit: hard_limit.max(1),
            evictions: 0,
        }
    }

    /// Appends a packet to its stream's queue, evicting a lagging stream if
    /// that queue has reached the hard limit.
    pub fn push(&mut self, packet: PesPacket) {
        let stream_id = packet.stream_id();
        let depth = {
            let queue = self.queues.entry(stream_id).or_default();
            queue.push_back(packet);
            queue.len()
        };

        if depth >= self.hard_limit {
            self.evict_lagging(stream_id);
        }

        // Nothing left to evict; keep the bound by dropping our own oldest.
        if let Some(queue) = self.queues.get_mut(&stream_id) {
            while queue.len() > self.hard_limit {
                queue.pop_front();
            }
        }
    }

    fn evict_lagging(&mut self, full: StreamId) {
        let lagging = self
            .queues
            .iter()
            .filter(|(id, queue)| **id != full && !queue.is_empty())
            .min_by_key(|(_, queue)| queue.len())
            .map(|(id, queue)| (*id, queue.len()));

        if let Some((id, dropped)) = lagging {
            log::warn!(
                "stream {} reached {} queued packets, dropping {} packets of lagging stream {}",
                full,
                self.hard_limit,
                dropped,
                id
            );
            self.queues.remove(&id);
            self.evictions += 1;
        }
    }

    /// Drops untimed packets from the queue fronts, then reports the stream
    /// whose front has the lowest timestamp along with the depth range.
    ///
    /// Returns the snapshot and the number of packets dropped.
    pub fn snapshot(&mut self) -> (QueueSnapshot, usize) {
        let mut dropped = 0;
        let mut snapshot = QueueSnapshot {
            lowest: None,
            min_depth: usize::MAX,
            max_depth: 0,
        };

        for (id, queue) in self.queues.iter_mut() {
            while let Some(front) = queue.front() {
                match front.timestamp() {
                    Some(ts) => {
                        if snapshot.lowest.map_or(true, |(_, lowest)| ts < lowest) {
                            snapshot.lowest = Some((*id, ts));
                        }
                        break;
                    }
                    None => {
                        log::trace!("dropping untimed packet of stream {}", id);
                        queue.pop_front();
                        dropped += 1;
                    }
                }
            }

            if !queue.is_empty() {
                snapshot.min_depth = snapshot.min_depth.min(queue.len());
                snapshot.max_depth = snapshot.max_depth.max(queue.len());
            }
        }

        (snapshot, dropped)
    }

    /// Timestamp of the oldest packet queued for `stream_id`.
    pub fn front_timestamp(&self, stream_id: StreamId) -> Option<u64> {
        self.queues
            .get(&stream_id)
            .and_then(VecDeque::front)
            .and_then(PesPacket::timestamp)
    }

    /// Takes the oldest packet queued for `stream_id`.
    pub fn pop_front(&mut self, stream_id: StreamId) -> Option<PesPacket> {
        self.queues.get_mut(&stream_id).and_then(VecDeque::pop_front)
    }

    /// Drops leading packets of `stream_id` that trail the front of any
    /// other stream by more than `window` ticks. Returns the number dropped.
    pub fn discard_stale(&mut self, stream_id: StreamId, window: u64) -> usize {
        let newest_front = self
            .queues
            .iter()
            .filter(|(id, _)| **id != stream_id)
            .filter_map(|(_, queue)| queue.front().and_then(PesPacket::timestamp))
            .max();

        let Some(newest_front) = newest_front else {
            return 0;
        };

        let mut dropped = 0;
        if let Some(queue) = self.queues.get_mut(&stream_id) {
            while let Some(ts) = queue.front().and_then(PesPacket::timestamp) {
                if newest_front.saturating_sub(ts) <= window {
                    break;
                }
                queue.pop_front();
                dropped += 1;
            }
        }
        dropped
    }

    /// Depth of the queue for `stream_id`.
    pub fn depth(&self, stream_id: StreamId) -> usize {
        self.queues.get(&stream_id).map_or(0, VecDeque::len)
    }

    /// Total number of queued packets.
    pub fn len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    /// True if no packet is queued.
    pub fn is_empty(&self) -> bool {
        self.queues.values().all(VecDeque::is_empty)
    }

    /// Number of lagging streams dropped so far.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed(stream_id: StreamId, pts: u64) -> PesPacket {
        let mut pes = PesPacket::new(stream_id);
        pes.set_payload(&[0u8; 4]);
        pes.set_pts(pts).unwrap();
        pes
    }

    #[test]
    fn test_snapshot_picks_lowest_front() {
        let mut queues = StreamQueues::new(4096);
        queues.push(timed(StreamId::VIDEO, 9_000));
        queues.push(timed(StreamId::VIDEO, 12_600));
        queues.push(timed(StreamId::AUDIO, 8_000));

        let (snapshot, dropped) = queues.snapshot();
        assert_eq!(dropped, 0);
        assert_eq!(snapshot.lowest, Some((StreamId::AUDIO, 8_000)));
        assert_eq!(snapshot.min_depth, 1);
        assert_eq!(snapshot.max_depth, 2);
    }

    #[test]
    fn test_snapshot_drops_untimed_fronts() {
        let mut queues = StreamQueues::new(4096);
        queues.push(PesPacket::new(StreamId::AUDIO));
        queues.push(PesPacket::new(StreamId::AUDIO));
        queues.push(timed(StreamId::AUDIO, 100));

        let (snapshot, dropped) = queues.snapshot();
        assert_eq!(dropped, 2);
        assert_eq!(snapshot.lowest, Some((StreamId::AUDIO, 100)));
        assert_eq!(queues.depth(StreamId::AUDIO), 1);
    }

    #[test]
    fn test_empty_snapshot() {
        let mut queues = StreamQueues::new(4096);
        let (snapshot, _) = queues.snapshot();
        assert_eq!(snapshot.lowest, None);
        assert_eq!(snapshot.min_depth, usize::MAX);
        assert!(queues.is_empty());
    }

    #[test]
    fn test_hard_limit_evicts_least_populated_other_stream() {
        let mut queues = StreamQueues::new(16);
        queues.push(timed(StreamId::VIDEO, 0));
        queues.push(timed(StreamId(0xC1), 0));
        queues.push(timed(StreamId(0xC1), 10));

        for i in 0..15 {
            queues.push(timed(StreamId::AUDIO, i * 10));
        }
        assert_eq!(queues.evictions(), 0);

        queues.push(timed(StreamId::AUDIO, 150));
        assert_eq!(queues.evictions(), 1);
        assert_eq!(queues.depth(StreamId::VIDEO), 0);
        assert_eq!(queues.depth(StreamId(0xC1)), 2);
        assert_eq!(queues.depth(StreamId::AUDIO), 16);
    }

    #[test]
    fn test_hard_limit_bounds_a_lone_stream() {
        let mut queues = StreamQueues::new(8);
        for i in 0..20 {
            queues.push(timed(StreamId::AUDIO, i));
        }
        assert_eq!(queues.depth(StreamId::AUDIO), 8);
        assert_eq!(queues.front_timestamp(StreamId::AUDIO), Some(12));
    }

    #[test]
    fn test_discard_stale() {
        let mut queues = StreamQueues::new(4096);
        for pts in [0, 10_000, 20_000, 30_000] {
            queues.push(timed(StreamId::AUDIO, pts));
        }
        queues.push(timed(StreamId::VIDEO, 45_000));

        assert_eq!(queues.discard_stale(StreamId::AUDIO, 22_500), 3);
        assert_eq!(queues.front_timestamp(StreamId::AUDIO), Some(30_000));
        assert_eq!(queues.discard_stale(StreamId::VIDEO, 22_500), 0);
    }
}
