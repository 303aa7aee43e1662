//! Stream descriptions, timebases and stamped packets.
//!
//! A muxing session carries a fixed set of streams, each registered once
//! with a [`StreamKind`] and a [`Timebase`]. Access units read for a stream
//! become [`Packet`]s once the driver has stamped and classified them.
//!
//! ## Timestamps
//!
//! Every packet's pts/dts is derived from the elapsed microseconds since
//! the session clock started and expressed in its stream's timebase:
//!
//! ```text
//! ticks = elapsed_us * den / (num * 1_000_000)
//! ```
//!
//! With the default 1/1000000 timebase the conversion is the identity.
//! pts always equals dts; there is no B-frame reordering.
//!
//! ## Codecs
//!
//! | Codec | Module | Used for |
//! |-------|--------|----------|
//! | H.264 | [`h264`] | Keyframe classification |
//! | AAC   | -        | Payloads passed through verbatim |

pub mod h264;

use std::fmt;
use std::str::FromStr;

const MICROS_PER_SECOND: u128 = 1_000_000;

/// Media type of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Rational number of seconds per timestamp tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timebase {
    num: u32,
    den: u32,
}

impl Timebase {
    /// One tick per microsecond.
    pub const MICROS: Timebase = Timebase {
        num: 1,
        den: 1_000_000,
    };

    /// Returns `None` if either side is zero.
    pub fn new(num: u32, den: u32) -> Option<Self> {
        (num != 0 && den != 0).then_some(Self { num, den })
    }

    pub fn num(&self) -> u32 {
        self.num
    }

    pub fn den(&self) -> u32 {
        self.den
    }

    /// Convert elapsed microseconds into ticks of this timebase (truncating).
    pub fn rescale_micros(&self, micros: u64) -> u64 {
        let ticks =
            micros as u128 * self.den as u128 / (self.num as u128 * MICROS_PER_SECOND);
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }

    /// Seconds represented by `ticks`, for logging.
    pub fn ticks_to_seconds(&self, ticks: u64) -> f64 {
        ticks as f64 * self.num as f64 / self.den as f64
    }
}

impl Default for Timebase {
    fn default() -> Self {
        Self::MICROS
    }
}

impl fmt::Display for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Failure to parse a `num/den` timebase string.
#[derive(Debug, thiserror::Error)]
#[error("invalid timebase {0:?}: expected NUM/DEN with both sides non-zero")]
pub struct ParseTimebaseError(String);

impl FromStr for Timebase {
    type Err = ParseTimebaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTimebaseError(s.to_string());
        let (num, den) = s.trim().split_once('/').ok_or_else(err)?;
        let num: u32 = num.trim().parse().map_err(|_| err())?;
        let den: u32 = den.trim().parse().map_err(|_| err())?;
        Timebase::new(num, den).ok_or_else(err)
    }
}

/// Requested stream for a session, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub kind: StreamKind,
    pub timebase: Timebase,
}

impl StreamSpec {
    pub fn new(kind: StreamKind, timebase: Timebase) -> Self {
        Self { kind, timebase }
    }
}

/// A registered stream as announced to the sink by `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Index assigned at registration, stable for the session.
    pub index: usize,
    pub kind: StreamKind,
    pub timebase: Timebase,
}

/// A stamped access unit, borrowed from the scheduler's staging buffer.
///
/// The payload is only valid for the duration of the
/// [`submit`](crate::sink::ContainerSink::submit) call; sinks that need it
/// later must copy it (see [`Packet::to_owned_packet`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    pub stream_index: usize,
    pub kind: StreamKind,
    /// Sequence number of the access unit this packet was read from.
    pub sequence: u64,
    pub pts: u64,
    pub dts: u64,
    pub keyframe: bool,
    pub payload: &'a [u8],
}

impl Packet<'_> {
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    pub fn to_owned_packet(&self) -> OwnedPacket {
        OwnedPacket {
            stream_index: self.stream_index,
            kind: self.kind,
            sequence: self.sequence,
            pts: self.pts,
            dts: self.dts,
            keyframe: self.keyframe,
            payload: self.payload.to_vec(),
        }
    }
}

/// A packet whose payload has been copied out of the staging buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedPacket {
    pub stream_index: usize,
    pub kind: StreamKind,
    pub sequence: u64,
    pub pts: u64,
    pub dts: u64,
    pub keyframe: bool,
    pub payload: Vec<u8>,
}

impl OwnedPacket {
    pub fn as_packet(&self) -> Packet<'_> {
        Packet {
            stream_index: self.stream_index,
            kind: self.kind,
            sequence: self.sequence,
            pts: self.pts,
            dts: self.dts,
            keyframe: self.keyframe,
            payload: &self.payload,
        }
    }
}
