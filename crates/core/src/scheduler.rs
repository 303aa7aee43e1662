//! Tick-driven round-robin over the stream drivers.
//!
//! One tick drives every active stream once, in registration order, and
//! submits each produced packet to the sink before moving on. The loop
//! ends when every driver is exhausted, on the first fatal error, or when
//! the [`CancelToken`] is set. Between ticks it sleeps for the configured
//! pacing interval so that it does not spin while waiting for the clock
//! to advance.
//!
//! Packets are handed to the sink in call order, not timestamp order: two
//! streams stamped in the same tick can reach the sink with the later
//! timestamp first. Reordering is the sink's job (see
//! [`InterleavingSink`](crate::sink::InterleavingSink)).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::clock::SessionClock;
use crate::driver::{Drive, StreamDriver};
use crate::error::{MuxError, Result, SinkStage};
use crate::media::{StreamDescriptor, StreamKind, Timebase};
use crate::sink::ContainerSink;
use crate::store::AccessUnitStore;

/// Default staging buffer size: 50 KiB per access unit.
pub const DEFAULT_BUFFER_CAPACITY: usize = 50 * 1024;

/// Default pause between ticks.
pub const DEFAULT_PACING: Duration = Duration::from_millis(1);

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Sleep between ticks. Zero disables pacing.
    pub pacing: Duration,
    /// Largest access unit accepted; bigger units fail with an overflow.
    pub buffer_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pacing: DEFAULT_PACING,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Shared flag that stops a run at the next tick boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-stream outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamReport {
    pub index: usize,
    pub kind: StreamKind,
    /// Packets accepted by the sink.
    pub packets: u64,
    /// Of those, packets flagged as keyframes.
    pub keyframes: u64,
    /// Tick (1-based) in which the stream reported exhaustion.
    pub exhausted_at_tick: Option<u64>,
}

/// Drives registered streams until all are exhausted.
pub struct Scheduler {
    config: SchedulerConfig,
    drivers: Vec<StreamDriver>,
    reports: Vec<StreamReport>,
    ticks: u64,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            drivers: Vec::new(),
            reports: Vec::new(),
            ticks: 0,
        }
    }

    /// Register a stream; returns its index. Streams are driven in
    /// registration order.
    pub fn register(&mut self, kind: StreamKind, timebase: Timebase) -> usize {
        let index = self.drivers.len();
        self.drivers.push(StreamDriver::new(index, kind, timebase));
        self.reports.push(StreamReport {
            index,
            kind,
            packets: 0,
            keyframes: 0,
            exhausted_at_tick: None,
        });
        tracing::debug!(index, %kind, %timebase, "stream registered");
        index
    }

    pub fn descriptors(&self) -> Vec<StreamDescriptor> {
        self.drivers.iter().map(StreamDriver::descriptor).collect()
    }

    pub fn reports(&self) -> &[StreamReport] {
        &self.reports
    }

    /// Ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn all_exhausted(&self) -> bool {
        self.drivers.iter().all(|d| !d.is_active())
    }

    /// Run ticks until every stream is exhausted.
    ///
    /// The sink must already have its header written. Packets submitted
    /// before a failure stay submitted; the caller decides how to finish
    /// the sink.
    pub fn run<A, S>(
        &mut self,
        store: &A,
        sink: &mut S,
        clock: &SessionClock,
        cancel: &CancelToken,
    ) -> Result<()>
    where
        A: AccessUnitStore + ?Sized,
        S: ContainerSink + ?Sized,
    {
        let mut buf = vec![0u8; self.config.buffer_capacity];

        while !self.all_exhausted() {
            if cancel.is_cancelled() {
                tracing::info!(ticks = self.ticks, "run cancelled");
                return Err(MuxError::Cancelled);
            }

            self.tick(store, sink, clock, &mut buf)?;

            if !self.all_exhausted() && !self.config.pacing.is_zero() {
                thread::sleep(self.config.pacing);
            }
        }

        tracing::debug!(ticks = self.ticks, "all streams exhausted");
        Ok(())
    }

    fn tick<A, S>(
        &mut self,
        store: &A,
        sink: &mut S,
        clock: &SessionClock,
        buf: &mut [u8],
    ) -> Result<()>
    where
        A: AccessUnitStore + ?Sized,
        S: ContainerSink + ?Sized,
    {
        self.ticks += 1;
        let tick = self.ticks;

        for (driver, report) in self.drivers.iter_mut().zip(self.reports.iter_mut()) {
            if !driver.is_active() {
                continue;
            }

            match driver.drive(store, clock, buf)? {
                Drive::Produced(packet) => {
                    tracing::trace!(
                        stream_index = packet.stream_index,
                        sequence = packet.sequence,
                        pts = packet.pts,
                        pts_time = driver.timebase().ticks_to_seconds(packet.pts),
                        dts = packet.dts,
                        size = packet.size(),
                        keyframe = packet.keyframe,
                        "packet"
                    );
                    sink.submit(&packet).map_err(|e| {
                        MuxError::sink(
                            SinkStage::Submit {
                                stream: packet.stream_index,
                                kind: packet.kind,
                                sequence: packet.sequence,
                            },
                            e,
                        )
                    })?;
                    report.packets += 1;
                    report.keyframes += u64::from(packet.keyframe);
                }
                Drive::Done => report.exhausted_at_tick = Some(tick),
            }
        }
        Ok(())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::media::Packet;
    use crate::store::MemoryStore;

    #[derive(Default)]
    struct Record {
        packets: Vec<(usize, u64, u64)>,
        fail_on: Option<(usize, u64)>,
    }

    impl ContainerSink for Record {
        fn open(&mut self, _: &[StreamDescriptor]) -> std::result::Result<(), SinkError> {
            Ok(())
        }
        fn write_header(&mut self) -> std::result::Result<(), SinkError> {
            Ok(())
        }
        fn submit(&mut self, p: &Packet<'_>) -> std::result::Result<(), SinkError> {
            if self.fail_on == Some((p.stream_index, p.sequence)) {
                return Err(SinkError::State("rejected"));
            }
            self.packets.push((p.stream_index, p.sequence, p.pts));
            Ok(())
        }
        fn write_trailer(&mut self) -> std::result::Result<(), SinkError> {
            Ok(())
        }
        fn close(&mut self) {}
    }

    fn unpaced() -> Scheduler {
        Scheduler::new(SchedulerConfig {
            pacing: Duration::ZERO,
            ..Default::default()
        })
    }

    fn store(video: usize, audio: usize) -> MemoryStore {
        MemoryStore::new()
            .with_units(StreamKind::Video, (0..video).map(|_| vec![0u8, 0, 0, 1, 0x41]))
            .with_units(StreamKind::Audio, (0..audio).map(|_| vec![0xFFu8, 0xF1]))
    }

    #[test]
    fn registration_assigns_indices_in_order() {
        let mut s = unpaced();
        assert_eq!(s.register(StreamKind::Video, Timebase::MICROS), 0);
        assert_eq!(s.register(StreamKind::Audio, Timebase::MICROS), 1);
        let d = s.descriptors();
        assert_eq!(d[0].kind, StreamKind::Video);
        assert_eq!(d[1].index, 1);
    }

    #[test]
    fn round_robin_video_first() {
        let mut s = unpaced();
        s.register(StreamKind::Video, Timebase::MICROS);
        s.register(StreamKind::Audio, Timebase::MICROS);
        let mut sink = Record::default();
        s.run(&store(2, 2), &mut sink, &SessionClock::start(), &CancelToken::new())
            .unwrap();

        let order: Vec<(usize, u64)> = sink.packets.iter().map(|&(i, q, _)| (i, q)).collect();
        assert_eq!(order, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
        // third tick discovers exhaustion of both
        assert_eq!(s.ticks(), 3);
    }

    #[test]
    fn streams_exhaust_independently() {
        let mut s = unpaced();
        s.register(StreamKind::Video, Timebase::MICROS);
        s.register(StreamKind::Audio, Timebase::MICROS);
        let mut sink = Record::default();
        s.run(&store(5, 10), &mut sink, &SessionClock::start(), &CancelToken::new())
            .unwrap();

        let r = s.reports();
        assert_eq!(r[0].packets, 5);
        assert_eq!(r[1].packets, 10);
        assert_eq!(r[0].exhausted_at_tick, Some(6));
        assert_eq!(r[1].exhausted_at_tick, Some(11));
        assert_eq!(sink.packets.len(), 15);
        assert!(s.all_exhausted());
    }

    #[test]
    fn sink_failure_names_packet() {
        let mut s = unpaced();
        s.register(StreamKind::Video, Timebase::MICROS);
        s.register(StreamKind::Audio, Timebase::MICROS);
        let mut sink = Record {
            fail_on: Some((1, 1)),
            ..Default::default()
        };
        let err = s
            .run(&store(5, 5), &mut sink, &SessionClock::start(), &CancelToken::new())
            .unwrap_err();

        assert!(matches!(
            err,
            MuxError::Sink {
                stage: SinkStage::Submit {
                    stream: 1,
                    kind: StreamKind::Audio,
                    sequence: 1
                },
                ..
            }
        ));
        // video 0, audio 0, video 1 made it; nothing after the failure
        assert_eq!(sink.packets.len(), 3);
        assert_eq!(s.reports()[1].packets, 1);
    }

    #[test]
    fn cancelled_before_first_tick() {
        let mut s = unpaced();
        s.register(StreamKind::Video, Timebase::MICROS);
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut sink = Record::default();
        let err = s
            .run(&store(3, 0), &mut sink, &SessionClock::start(), &cancel)
            .unwrap_err();
        assert!(matches!(err, MuxError::Cancelled));
        assert_eq!(s.ticks(), 0);
        assert!(sink.packets.is_empty());
    }

    #[test]
    fn no_streams_finishes_immediately() {
        let mut s = unpaced();
        let mut sink = Record::default();
        s.run(&store(3, 3), &mut sink, &SessionClock::start(), &CancelToken::new())
            .unwrap();
        assert_eq!(s.ticks(), 0);
    }

    #[test]
    fn pacing_spaces_ticks() {
        let mut s = Scheduler::new(SchedulerConfig {
            pacing: Duration::from_millis(2),
            ..Default::default()
        });
        s.register(StreamKind::Audio, Timebase::MICROS);
        let mut sink = Record::default();
        s.run(&store(0, 3), &mut sink, &SessionClock::start(), &CancelToken::new())
            .unwrap();

        let pts: Vec<u64> = sink.packets.iter().map(|&(_, _, pts)| pts).collect();
        assert!(pts[1] - pts[0] >= 2_000);
        assert!(pts[2] - pts[1] >= 2_000);
    }
}
