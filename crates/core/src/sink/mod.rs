//! Container sinks: where stamped packets go.
//!
//! The session drives every sink through the same call sequence:
//!
//! ```text
//! open(streams) -> write_header -> submit* -> write_trailer -> close
//! ```
//!
//! `close` is called on every exit path once `open` has succeeded, including
//! after a fatal error. `write_trailer` is only attempted if the header was
//! written. Packets borrow the scheduler's staging buffer, so a sink that
//! keeps a packet past `submit` must copy it.
//!
//! The scheduler makes no promise about cross-stream timestamp order. Sinks
//! whose destination format needs it can wrap themselves in an
//! [`InterleavingSink`].
//!
//! | Sink | Output |
//! |------|--------|
//! | [`FramedSink`] | Length-prefixed packet records on any `Write` |
//! | [`LogSink`] | Log lines only (dry run) |
//! | [`InterleavingSink`] | Reorders by dts, then forwards to another sink |

pub mod framed;
pub mod interleave;
pub mod log;

use crate::error::SinkError;
use crate::media::{Packet, StreamDescriptor};

pub use framed::FramedSink;
pub use interleave::InterleavingSink;
pub use log::LogSink;

/// Destination container writer.
pub trait ContainerSink {
    /// Register the session's streams. Called once, before anything else.
    fn open(&mut self, streams: &[StreamDescriptor]) -> Result<(), SinkError>;

    /// Write the container header. Called once, before the first packet.
    fn write_header(&mut self) -> Result<(), SinkError>;

    /// Accept one stamped packet. Errors are fatal to the session.
    fn submit(&mut self, packet: &Packet<'_>) -> Result<(), SinkError>;

    /// Finish the container. Called once, after the last packet.
    fn write_trailer(&mut self) -> Result<(), SinkError>;

    /// Release the destination.
    fn close(&mut self);
}

impl<S: ContainerSink + ?Sized> ContainerSink for Box<S> {
    fn open(&mut self, streams: &[StreamDescriptor]) -> Result<(), SinkError> {
        (**self).open(streams)
    }

    fn write_header(&mut self) -> Result<(), SinkError> {
        (**self).write_header()
    }

    fn submit(&mut self, packet: &Packet<'_>) -> Result<(), SinkError> {
        (**self).submit(packet)
    }

    fn write_trailer(&mut self) -> Result<(), SinkError> {
        (**self).write_trailer()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Position of a sink in its call sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Phase {
    #[default]
    Created,
    Opened,
    Writing,
    Finished,
    Closed,
}

impl Phase {
    /// Move from `from` to `to`, or report `call` as out of order.
    pub(crate) fn advance(
        &mut self,
        from: Phase,
        to: Phase,
        call: &'static str,
    ) -> Result<(), SinkError> {
        if *self != from {
            return Err(SinkError::State(call));
        }
        *self = to;
        Ok(())
    }

    pub(crate) fn require(&self, expected: Phase, call: &'static str) -> Result<(), SinkError> {
        if *self != expected {
            return Err(SinkError::State(call));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_walks_forward() {
        let mut phase = Phase::default();
        phase.advance(Phase::Created, Phase::Opened, "open").unwrap();
        phase.advance(Phase::Opened, Phase::Writing, "write_header").unwrap();
        phase.require(Phase::Writing, "submit").unwrap();
        phase.advance(Phase::Writing, Phase::Finished, "write_trailer").unwrap();
        assert_eq!(phase, Phase::Finished);
    }

    #[test]
    fn phase_rejects_skips() {
        let mut phase = Phase::default();
        assert!(matches!(
            phase.require(Phase::Writing, "submit before header"),
            Err(SinkError::State("submit before header"))
        ));
        assert!(phase.advance(Phase::Opened, Phase::Writing, "write_header").is_err());
        assert_eq!(phase, Phase::Created);
    }
}
