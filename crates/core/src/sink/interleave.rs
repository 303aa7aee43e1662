use std::cmp::Ordering;
use std::collections::VecDeque;

use super::ContainerSink;
use crate::error::SinkError;
use crate::media::{OwnedPacket, Packet, StreamDescriptor, Timebase};

/// Default number of packets held back before the earliest is forced out.
pub const DEFAULT_MAX_QUEUED: usize = 64;

/// Reorders packets into non-decreasing dts across streams.
///
/// Each submitted packet is copied into a per-stream queue. Whenever every
/// stream has at least one queued packet, the one with the earliest dts is
/// forwarded to the inner sink. A stream that has run dry would otherwise
/// stall the rest, so once more than `max_queued` packets are held the
/// earliest is forwarded regardless. `write_trailer` drains everything
/// before finishing the inner sink.
///
/// Timestamps of different streams are compared in seconds, so streams
/// may use different timebases. Ties go to the lower stream index.
///
/// An inner failure on a forwarded packet comes back as
/// [`SinkError::Packet`] naming that packet, whichever call forwarded it.
pub struct InterleavingSink<S> {
    inner: S,
    queues: Vec<VecDeque<OwnedPacket>>,
    timebases: Vec<Timebase>,
    queued: usize,
    max_queued: usize,
}

impl<S: ContainerSink> InterleavingSink<S> {
    pub fn new(inner: S) -> Self {
        Self::with_max_queued(inner, DEFAULT_MAX_QUEUED)
    }

    pub fn with_max_queued(inner: S, max_queued: usize) -> Self {
        Self {
            inner,
            queues: Vec::new(),
            timebases: Vec::new(),
            queued: 0,
            max_queued,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Packets currently held back.
    pub fn queued(&self) -> usize {
        self.queued
    }

    /// Stream whose head packet has the earliest dts.
    fn earliest(&self) -> Option<usize> {
        let mut best: Option<(usize, &OwnedPacket)> = None;
        for (index, queue) in self.queues.iter().enumerate() {
            let Some(head) = queue.front() else {
                continue;
            };
            let earlier = match best {
                None => true,
                Some((b, current)) => {
                    compare_dts(head.dts, self.timebases[index], current.dts, self.timebases[b])
                        == Ordering::Less
                }
            };
            if earlier {
                best = Some((index, head));
            }
        }
        best.map(|(index, _)| index)
    }

    fn emit_earliest(&mut self) -> Result<(), SinkError> {
        let Some(index) = self.earliest() else {
            return Ok(());
        };
        let Some(packet) = self.queues[index].pop_front() else {
            return Ok(());
        };
        self.queued -= 1;
        self.inner.submit(&packet.as_packet()).map_err(|e| match e {
            e @ SinkError::Packet { .. } => e,
            e => SinkError::Packet {
                stream: packet.stream_index,
                kind: packet.kind,
                sequence: packet.sequence,
                source: Box::new(e),
            },
        })
    }

    fn all_streams_queued(&self) -> bool {
        self.queues.iter().all(|q| !q.is_empty())
    }
}

/// Compare `a` ticks of `tb_a` against `b` ticks of `tb_b` in seconds.
fn compare_dts(a: u64, tb_a: Timebase, b: u64, tb_b: Timebase) -> Ordering {
    // a * num_a / den_a  vs  b * num_b / den_b
    let lhs = a as u128 * tb_a.num() as u128 * tb_b.den() as u128;
    let rhs = b as u128 * tb_b.num() as u128 * tb_a.den() as u128;
    lhs.cmp(&rhs)
}

impl<S: ContainerSink> ContainerSink for InterleavingSink<S> {
    fn open(&mut self, streams: &[StreamDescriptor]) -> Result<(), SinkError> {
        self.inner.open(streams)?;
        self.queues = streams.iter().map(|_| VecDeque::new()).collect();
        self.timebases = streams.iter().map(|s| s.timebase).collect();
        self.queued = 0;
        Ok(())
    }

    fn write_header(&mut self) -> Result<(), SinkError> {
        self.inner.write_header()
    }

    fn submit(&mut self, packet: &Packet<'_>) -> Result<(), SinkError> {
        let queue = self
            .queues
            .get_mut(packet.stream_index)
            .ok_or(SinkError::UnknownStream(packet.stream_index))?;
        queue.push_back(packet.to_owned_packet());
        self.queued += 1;

        while self.queued > 0 && (self.all_streams_queued() || self.queued > self.max_queued) {
            self.emit_earliest()?;
        }
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<(), SinkError> {
        tracing::debug!(queued = self.queued, "draining interleave queue");
        while self.queued > 0 {
            self.emit_earliest()?;
        }
        self.inner.write_trailer()
    }

    fn close(&mut self) {
        if self.queued > 0 {
            tracing::warn!(dropped = self.queued, "closing with queued packets");
            self.queues.iter_mut().for_each(VecDeque::clear);
            self.queued = 0;
        }
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::StreamKind;

    #[derive(Default)]
    struct Collect {
        packets: Vec<(usize, u64)>,
        reject: Option<(usize, u64)>,
        trailer: bool,
        closed: bool,
    }

    impl ContainerSink for Collect {
        fn open(&mut self, _: &[StreamDescriptor]) -> Result<(), SinkError> {
            Ok(())
        }
        fn write_header(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
        fn submit(&mut self, packet: &Packet<'_>) -> Result<(), SinkError> {
            if self.reject == Some((packet.stream_index, packet.sequence)) {
                return Err(SinkError::State("rejected"));
            }
            self.packets.push((packet.stream_index, packet.dts));
            Ok(())
        }
        fn write_trailer(&mut self) -> Result<(), SinkError> {
            self.trailer = true;
            Ok(())
        }
        fn close(&mut self) {
            self.closed = true;
        }
    }

    fn streams(audio_tb: Timebase) -> Vec<StreamDescriptor> {
        vec![
            StreamDescriptor {
                index: 0,
                kind: StreamKind::Video,
                timebase: Timebase::MICROS,
            },
            StreamDescriptor {
                index: 1,
                kind: StreamKind::Audio,
                timebase: audio_tb,
            },
        ]
    }

    fn packet(stream_index: usize, sequence: u64, dts: u64) -> Packet<'static> {
        Packet {
            stream_index,
            kind: if stream_index == 0 {
                StreamKind::Video
            } else {
                StreamKind::Audio
            },
            sequence,
            pts: dts,
            dts,
            keyframe: false,
            payload: &[0],
        }
    }

    fn submit(sink: &mut InterleavingSink<Collect>, stream_index: usize, dts: u64) {
        sink.submit(&packet(stream_index, 0, dts)).unwrap();
    }

    #[test]
    fn forwards_in_dts_order() {
        let mut sink = InterleavingSink::new(Collect::default());
        sink.open(&streams(Timebase::MICROS)).unwrap();
        sink.write_header().unwrap();

        submit(&mut sink, 0, 100);
        assert_eq!(sink.queued(), 1);
        submit(&mut sink, 1, 50);
        submit(&mut sink, 1, 120);
        submit(&mut sink, 0, 110);
        sink.write_trailer().unwrap();

        assert_eq!(
            sink.inner().packets,
            vec![(1, 50), (0, 100), (0, 110), (1, 120)]
        );
        assert!(sink.inner().trailer);
    }

    #[test]
    fn compares_across_timebases() {
        let mut sink = InterleavingSink::new(Collect::default());
        sink.open(&streams(Timebase::new(1, 1000).unwrap())).unwrap();
        sink.write_header().unwrap();

        // 2ms on the audio stream vs 1500us on video
        submit(&mut sink, 1, 2);
        submit(&mut sink, 0, 1500);
        submit(&mut sink, 0, 2500);
        sink.write_trailer().unwrap();

        assert_eq!(sink.inner().packets, vec![(0, 1500), (1, 2), (0, 2500)]);
    }

    #[test]
    fn ties_prefer_lower_stream() {
        assert_eq!(
            compare_dts(1000, Timebase::MICROS, 1, Timebase::new(1, 1000).unwrap()),
            Ordering::Equal
        );
        let mut sink = InterleavingSink::new(Collect::default());
        sink.open(&streams(Timebase::MICROS)).unwrap();
        sink.write_header().unwrap();
        submit(&mut sink, 1, 7);
        submit(&mut sink, 0, 7);
        sink.write_trailer().unwrap();
        assert_eq!(sink.inner().packets, vec![(0, 7), (1, 7)]);
    }

    #[test]
    fn dry_stream_does_not_stall_forever() {
        let mut sink = InterleavingSink::with_max_queued(Collect::default(), 3);
        sink.open(&streams(Timebase::MICROS)).unwrap();
        sink.write_header().unwrap();

        for dts in 0..5 {
            submit(&mut sink, 1, dts);
        }
        assert_eq!(sink.queued(), 3);
        assert_eq!(sink.inner().packets, vec![(1, 0), (1, 1)]);
    }

    #[test]
    fn inner_failure_names_forwarded_packet() {
        let mut sink = InterleavingSink::new(Collect {
            reject: Some((0, 0)),
            ..Default::default()
        });
        sink.open(&streams(Timebase::MICROS)).unwrap();
        sink.write_header().unwrap();

        sink.submit(&packet(0, 0, 10)).unwrap();
        // audio 0 completes the set and forwards video 0, which is rejected
        let err = sink.submit(&packet(1, 0, 20)).unwrap_err();
        assert!(matches!(
            err,
            SinkError::Packet {
                stream: 0,
                kind: StreamKind::Video,
                sequence: 0,
                ..
            }
        ));
    }

    #[test]
    fn drain_failure_names_forwarded_packet() {
        let mut sink = InterleavingSink::new(Collect {
            reject: Some((1, 3)),
            ..Default::default()
        });
        sink.open(&streams(Timebase::MICROS)).unwrap();
        sink.write_header().unwrap();
        sink.submit(&packet(1, 3, 5)).unwrap();

        let err = sink.write_trailer().unwrap_err();
        assert!(matches!(
            err,
            SinkError::Packet {
                stream: 1,
                kind: StreamKind::Audio,
                sequence: 3,
                ..
            }
        ));
        assert!(!sink.inner().trailer);
    }

    #[test]
    fn unknown_stream_rejected() {
        let mut sink = InterleavingSink::new(Collect::default());
        sink.open(&streams(Timebase::MICROS)).unwrap();
        let packet = Packet {
            stream_index: 9,
            kind: StreamKind::Audio,
            sequence: 0,
            pts: 0,
            dts: 0,
            keyframe: false,
            payload: &[],
        };
        assert!(matches!(
            sink.submit(&packet),
            Err(SinkError::UnknownStream(9))
        ));
    }

    #[test]
    fn close_drops_queue_and_closes_inner() {
        let mut sink = InterleavingSink::new(Collect::default());
        sink.open(&streams(Timebase::MICROS)).unwrap();
        sink.write_header().unwrap();
        submit(&mut sink, 0, 1);
        sink.close();
        assert_eq!(sink.queued(), 0);
        assert!(sink.inner().closed);
        assert!(sink.inner().packets.is_empty());
    }
}
