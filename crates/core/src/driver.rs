//! Per-stream driver: fetch, classify, stamp.
//!
//! ## Driver lifecycle
//!
//! ```text
//! Active    --fetch ok-->   Active     (one packet produced, cursor + 1)
//! Active    --not found-->  Exhausted  (no packet)
//! Exhausted --drive-->      Exhausted  (no fetch)
//! ```
//!
//! Store faults are returned as errors without changing state; the driver
//! never retries.

use crate::clock::SessionClock;
use crate::error::{MuxError, Result};
use crate::media::h264;
use crate::media::{Packet, StreamDescriptor, StreamKind, Timebase};
use crate::store::AccessUnitStore;

/// Driver state. `Exhausted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Active,
    Exhausted,
}

/// Outcome of one [`StreamDriver::drive`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive<'a> {
    /// A stamped packet borrowing the staging buffer.
    Produced(Packet<'a>),
    /// The stream has no more access units.
    Done,
}

/// Sources, stamps and classifies the access units of one stream.
#[derive(Debug, Clone)]
pub struct StreamDriver {
    index: usize,
    kind: StreamKind,
    timebase: Timebase,
    cursor: u64,
    state: DriverState,
}

impl StreamDriver {
    pub fn new(index: usize, kind: StreamKind, timebase: Timebase) -> Self {
        Self {
            index,
            kind,
            timebase,
            cursor: 0,
            state: DriverState::Active,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn timebase(&self) -> Timebase {
        self.timebase
    }

    /// Next sequence number to fetch.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == DriverState::Active
    }

    pub fn descriptor(&self) -> StreamDescriptor {
        StreamDescriptor {
            index: self.index,
            kind: self.kind,
            timebase: self.timebase,
        }
    }

    /// Produce the next packet of this stream, staged in `buf`.
    pub fn drive<'b, S>(
        &mut self,
        store: &S,
        clock: &SessionClock,
        buf: &'b mut [u8],
    ) -> Result<Drive<'b>>
    where
        S: AccessUnitStore + ?Sized,
    {
        if self.state == DriverState::Exhausted {
            return Ok(Drive::Done);
        }

        let sequence = self.cursor;
        let len = match store.fetch(self.kind, sequence, buf) {
            Ok(Some(len)) => len,
            Ok(None) => {
                self.state = DriverState::Exhausted;
                tracing::debug!(
                    stream = self.index,
                    kind = %self.kind,
                    units = sequence,
                    "stream exhausted"
                );
                return Ok(Drive::Done);
            }
            Err(e) => return Err(MuxError::from_store(e, self.index, self.kind, sequence)),
        };
        let staged: &'b [u8] = buf;
        let payload = &staged[..len];

        let keyframe = match self.kind {
            StreamKind::Video => h264::classify(payload).is_keyframe(),
            StreamKind::Audio => false,
        };
        if keyframe {
            tracing::debug!(stream = self.index, sequence, "keyframe");
        }

        let ts = self.timebase.rescale_micros(clock.elapsed_micros());
        self.cursor += 1;

        Ok(Drive::Produced(Packet {
            stream_index: self.index,
            kind: self.kind,
            sequence,
            pts: ts,
            dts: ts,
            keyframe,
            payload,
        }))
    }
}
