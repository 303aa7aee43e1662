use super::{ContainerSink, Phase};
use crate::error::SinkError;
use crate::media::{Packet, StreamDescriptor};

/// Sink that only logs what it is given.
///
/// Emits one `info` line per packet with its timestamps in ticks and
/// seconds, and keeps a per-stream packet count. Useful for dry runs.
#[derive(Debug, Default)]
pub struct LogSink {
    streams: Vec<StreamDescriptor>,
    counts: Vec<u64>,
    phase: Phase,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Packets accepted for stream `index`.
    pub fn packets(&self, index: usize) -> u64 {
        self.counts.get(index).copied().unwrap_or(0)
    }
}

impl ContainerSink for LogSink {
    fn open(&mut self, streams: &[StreamDescriptor]) -> Result<(), SinkError> {
        self.phase.advance(Phase::Created, Phase::Opened, "open called twice")?;
        self.streams = streams.to_vec();
        self.counts = vec![0; streams.len()];
        for s in streams {
            tracing::info!(index = s.index, kind = %s.kind, timebase = %s.timebase, "stream");
        }
        Ok(())
    }

    fn write_header(&mut self) -> Result<(), SinkError> {
        self.phase
            .advance(Phase::Opened, Phase::Writing, "write_header out of order")
    }

    fn submit(&mut self, packet: &Packet<'_>) -> Result<(), SinkError> {
        self.phase.require(Phase::Writing, "submit outside header/trailer")?;
        let stream = self
            .streams
            .get(packet.stream_index)
            .ok_or(SinkError::UnknownStream(packet.stream_index))?;

        tracing::info!(
            stream_index = packet.stream_index,
            pts = packet.pts,
            pts_time = stream.timebase.ticks_to_seconds(packet.pts),
            dts = packet.dts,
            dts_time = stream.timebase.ticks_to_seconds(packet.dts),
            size = packet.size(),
            keyframe = packet.keyframe,
            "packet"
        );
        self.counts[packet.stream_index] += 1;
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<(), SinkError> {
        self.phase
            .advance(Phase::Writing, Phase::Finished, "write_trailer out of order")?;
        tracing::info!(packets = ?self.counts, "trailer");
        Ok(())
    }

    fn close(&mut self) {
        self.phase = Phase::Closed;
    }
}
