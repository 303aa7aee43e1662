//! Error types for the muxing library.

use std::fmt;

use crate::media::StreamKind;

/// Failure reported by an [`AccessUnitStore`](crate::store::AccessUnitStore).
///
/// Absence of a unit is not an error: stores signal exhaustion with
/// `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The payload does not fit the caller's staging buffer.
    #[error("access unit is {size} bytes but the staging buffer holds {capacity}")]
    Overflow { size: usize, capacity: usize },

    /// Underlying read failed for a reason other than absence.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by a [`ContainerSink`](crate::sink::ContainerSink).
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Writing to the destination failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A packet referenced a stream that was never registered with `open`.
    #[error("unknown stream index {0}")]
    UnknownStream(usize),

    /// A packet's decode timestamp went backwards within its stream.
    #[error("stream {stream}: dts {dts} is earlier than previous dts {previous}")]
    OutOfOrder { stream: usize, dts: u64, previous: u64 },

    /// A sink call arrived out of the open/header/submit/trailer/close order.
    #[error("invalid sink state: {0}")]
    State(&'static str),

    /// A packet held back by a buffering sink failed when it was finally
    /// written. Carries the identity of that packet, not the one whose
    /// submit triggered the write.
    #[error("{kind} unit {sequence} (stream {stream}): {source}")]
    Packet {
        stream: usize,
        kind: StreamKind,
        sequence: u64,
        #[source]
        source: Box<SinkError>,
    },
}

/// Sink call that failed, with enough context to re-fetch the offending unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStage {
    Open,
    Header,
    Submit {
        stream: usize,
        kind: StreamKind,
        sequence: u64,
    },
    Trailer,
}

impl fmt::Display for SinkStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Header => write!(f, "write_header"),
            Self::Submit {
                stream,
                kind,
                sequence,
            } => write!(f, "submit of {kind} unit {sequence} (stream {stream})"),
            Self::Trailer => write!(f, "write_trailer"),
        }
    }
}

/// Terminal failure of a muxing session.
///
/// Exactly one of these is returned when a run cannot complete. Store
/// failures name the stream and sequence number that was being fetched;
/// sink failures name the stage (and, for `submit`, the packet).
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// An access unit exceeded the staging buffer.
    #[error(
        "{kind} access unit {sequence} (stream {stream}) is {size} bytes, staging buffer holds {capacity}"
    )]
    Overflow {
        stream: usize,
        kind: StreamKind,
        sequence: u64,
        size: usize,
        capacity: usize,
    },

    /// Reading an access unit failed.
    #[error("failed to read {kind} access unit {sequence} (stream {stream}): {source}")]
    Io {
        stream: usize,
        kind: StreamKind,
        sequence: u64,
        #[source]
        source: std::io::Error,
    },

    /// The container sink rejected a call.
    #[error("sink failed during {stage}: {source}")]
    Sink {
        stage: SinkStage,
        #[source]
        source: SinkError,
    },

    /// The run was stopped through its [`CancelToken`](crate::CancelToken).
    #[error("muxing cancelled")]
    Cancelled,

    /// No streams were configured.
    #[error("no streams configured")]
    NoStreams,
}

impl MuxError {
    pub(crate) fn from_store(
        err: StoreError,
        stream: usize,
        kind: StreamKind,
        sequence: u64,
    ) -> Self {
        match err {
            StoreError::Overflow { size, capacity } => Self::Overflow {
                stream,
                kind,
                sequence,
                size,
                capacity,
            },
            StoreError::Io(source) => Self::Io {
                stream,
                kind,
                sequence,
                source,
            },
        }
    }

    /// Wrap a sink failure. A [`SinkError::Packet`] overrides `stage` with
    /// the packet it names.
    pub(crate) fn sink(stage: SinkStage, source: SinkError) -> Self {
        match source {
            SinkError::Packet {
                stream,
                kind,
                sequence,
                source,
            } => Self::Sink {
                stage: SinkStage::Submit {
                    stream,
                    kind,
                    sequence,
                },
                source: *source,
            },
            source => Self::Sink { stage, source },
        }
    }
}

/// Convenience alias for `Result<T, MuxError>`.
pub type Result<T> = std::result::Result<T, MuxError>;
