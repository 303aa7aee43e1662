//! Minimal length-prefixed container.
//!
//! All integers are big-endian.
//!
//! ```text
//! header:  "AVMX" | version:u8 | stream_count:u8
//!          stream_count x ( kind:u8 | tb_num:u32 | tb_den:u32 )
//! packet:  'P' | stream:u8 | flags:u8 | pts:u64 | dts:u64 | size:u32 | payload
//! trailer: 'T' | stream_count x packets:u64
//! ```
//!
//! `kind` is 0 for video and 1 for audio. Bit 0 of `flags` marks a keyframe.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::{ContainerSink, Phase};
use crate::error::SinkError;
use crate::media::{Packet, StreamDescriptor, StreamKind};

pub const MAGIC: &[u8; 4] = b"AVMX";
pub const VERSION: u8 = 1;
pub const PACKET_TAG: u8 = b'P';
pub const TRAILER_TAG: u8 = b'T';
pub const FLAG_KEYFRAME: u8 = 0x01;

#[derive(Debug)]
struct StreamSlot {
    descriptor: StreamDescriptor,
    packets: u64,
    last_dts: Option<u64>,
}

/// Writes packets as framed records to `W`.
///
/// Enforces the sink call order itself and rejects a packet whose dts is
/// earlier than the previous one on the same stream.
pub struct FramedSink<W: Write> {
    writer: Option<W>,
    streams: Vec<StreamSlot>,
    phase: Phase,
}

impl FramedSink<BufWriter<File>> {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> FramedSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
            streams: Vec::new(),
            phase: Phase::default(),
        }
    }

    /// Packets written so far for stream `index`.
    pub fn packets(&self, index: usize) -> u64 {
        self.streams.get(index).map_or(0, |s| s.packets)
    }

    fn writer(&mut self) -> Result<&mut W, SinkError> {
        self.writer.as_mut().ok_or(SinkError::State("sink closed"))
    }
}

impl<W: Write> ContainerSink for FramedSink<W> {
    fn open(&mut self, streams: &[StreamDescriptor]) -> Result<(), SinkError> {
        if streams.len() > u8::MAX as usize {
            return Err(SinkError::State("too many streams"));
        }
        self.phase.advance(Phase::Created, Phase::Opened, "open called twice")?;
        self.streams = streams
            .iter()
            .map(|&descriptor| StreamSlot {
                descriptor,
                packets: 0,
                last_dts: None,
            })
            .collect();
        Ok(())
    }

    fn write_header(&mut self) -> Result<(), SinkError> {
        self.phase.require(Phase::Opened, "write_header out of order")?;

        let mut header = Vec::with_capacity(6 + 9 * self.streams.len());
        header.extend_from_slice(MAGIC);
        header.push(VERSION);
        header.push(self.streams.len() as u8);
        for slot in &self.streams {
            let d = &slot.descriptor;
            header.push(match d.kind {
                StreamKind::Video => 0,
                StreamKind::Audio => 1,
            });
            header.extend_from_slice(&d.timebase.num().to_be_bytes());
            header.extend_from_slice(&d.timebase.den().to_be_bytes());
        }
        self.writer()?.write_all(&header)?;

        self.phase = Phase::Writing;
        tracing::debug!(streams = self.streams.len(), "framed header written");
        Ok(())
    }

    fn submit(&mut self, packet: &Packet<'_>) -> Result<(), SinkError> {
        self.phase.require(Phase::Writing, "submit outside header/trailer")?;

        let slot = self
            .streams
            .get(packet.stream_index)
            .ok_or(SinkError::UnknownStream(packet.stream_index))?;
        if let Some(previous) = slot.last_dts
            && packet.dts < previous
        {
            return Err(SinkError::OutOfOrder {
                stream: packet.stream_index,
                dts: packet.dts,
                previous,
            });
        }
        let size = u32::try_from(packet.size())
            .map_err(|_| SinkError::State("packet larger than 4 GiB"))?;

        let mut record = [0u8; 23];
        record[0] = PACKET_TAG;
        record[1] = packet.stream_index as u8;
        record[2] = if packet.keyframe { FLAG_KEYFRAME } else { 0 };
        record[3..11].copy_from_slice(&packet.pts.to_be_bytes());
        record[11..19].copy_from_slice(&packet.dts.to_be_bytes());
        record[19..23].copy_from_slice(&size.to_be_bytes());

        let writer = self.writer()?;
        writer.write_all(&record)?;
        writer.write_all(packet.payload)?;

        let slot = &mut self.streams[packet.stream_index];
        slot.packets += 1;
        slot.last_dts = Some(packet.dts);
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<(), SinkError> {
        self.phase.require(Phase::Writing, "write_trailer out of order")?;

        let mut trailer = Vec::with_capacity(1 + 8 * self.streams.len());
        trailer.push(TRAILER_TAG);
        for slot in &self.streams {
            trailer.extend_from_slice(&slot.packets.to_be_bytes());
        }
        let writer = self.writer()?;
        writer.write_all(&trailer)?;
        writer.flush()?;

        self.phase = Phase::Finished;
        tracing::debug!("framed trailer written");
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut writer) = self.writer.take()
            && let Err(e) = writer.flush()
        {
            tracing::warn!(error = %e, "flush on close failed");
        }
        self.phase = Phase::Closed;
    }
}
