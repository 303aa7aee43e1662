use crate::clock::SessionClock;
use crate::error::{MuxError, Result, SinkStage};
use crate::media::{StreamKind, StreamSpec, Timebase};
use crate::scheduler::{CancelToken, Scheduler, SchedulerConfig, StreamReport};
use crate::sink::ContainerSink;
use crate::store::AccessUnitStore;

/// Session-level configuration.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    pub scheduler: SchedulerConfig,
    /// Streams in registration (and drive) order.
    pub streams: Vec<StreamSpec>,
}

impl Default for MuxConfig {
    /// Video then audio, both in microseconds.
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            streams: vec![
                StreamSpec::new(StreamKind::Video, Timebase::MICROS),
                StreamSpec::new(StreamKind::Audio, Timebase::MICROS),
            ],
        }
    }
}

/// Result of a successful session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxReport {
    pub ticks: u64,
    pub streams: Vec<StreamReport>,
}

impl MuxReport {
    /// Packets written across all streams.
    pub fn total_packets(&self) -> u64 {
        self.streams.iter().map(|s| s.packets).sum()
    }

    /// Packets written for the first stream of `kind`.
    pub fn packets(&self, kind: StreamKind) -> u64 {
        self.streams
            .iter()
            .find(|s| s.kind == kind)
            .map_or(0, |s| s.packets)
    }
}

/// Runs one muxing session from store to sink.
///
/// Owns the sink call sequence:
///
/// ```text
/// open -> write_header -> (clock starts) -> submit* -> write_trailer -> close
/// ```
///
/// On a fatal error the run stops, the trailer is attempted if the header
/// was written, the sink is closed, and the first error is returned.
#[derive(Debug, Clone, Default)]
pub struct Muxer {
    config: MuxConfig,
}

impl Muxer {
    pub fn new(config: MuxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    pub fn run<A, S>(&self, store: &A, sink: &mut S, cancel: &CancelToken) -> Result<MuxReport>
    where
        A: AccessUnitStore + ?Sized,
        S: ContainerSink + ?Sized,
    {
        if self.config.streams.is_empty() {
            return Err(MuxError::NoStreams);
        }

        let mut scheduler = Scheduler::new(self.config.scheduler.clone());
        for spec in &self.config.streams {
            scheduler.register(spec.kind, spec.timebase);
        }

        sink.open(&scheduler.descriptors())
            .map_err(|e| MuxError::sink(SinkStage::Open, e))?;
        tracing::info!(streams = self.config.streams.len(), "sink opened");

        let mut header_written = false;
        let outcome = Self::write(&mut scheduler, store, sink, cancel, &mut header_written);

        let trailer = if header_written {
            sink.write_trailer()
                .map_err(|e| MuxError::sink(SinkStage::Trailer, e))
        } else {
            Ok(())
        };
        sink.close();

        let result = match (outcome, trailer) {
            (Err(e), Err(trailer_err)) => {
                tracing::warn!(error = %trailer_err, "trailer failed after fatal error");
                Err(e)
            }
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => Ok(MuxReport {
                ticks: scheduler.ticks(),
                streams: scheduler.reports().to_vec(),
            }),
        };

        match &result {
            Ok(report) => {
                for s in &report.streams {
                    tracing::info!(
                        index = s.index,
                        kind = %s.kind,
                        packets = s.packets,
                        keyframes = s.keyframes,
                        "stream finished"
                    );
                }
                tracing::info!(ticks = report.ticks, "muxing complete");
            }
            Err(e) => tracing::error!(error = %e, ticks = scheduler.ticks(), "muxing failed"),
        }
        result
    }

    fn write<A, S>(
        scheduler: &mut Scheduler,
        store: &A,
        sink: &mut S,
        cancel: &CancelToken,
        header_written: &mut bool,
    ) -> Result<()>
    where
        A: AccessUnitStore + ?Sized,
        S: ContainerSink + ?Sized,
    {
        sink.write_header()
            .map_err(|e| MuxError::sink(SinkStage::Header, e))?;
        *header_written = true;
        tracing::info!("header written");

        let clock = SessionClock::start();
        scheduler.run(store, sink, &clock, cancel)
    }
}
