//! Interleaved audio/video access-unit scheduling.
//!
//! Reads pre-encoded access units per stream, stamps them against a shared
//! wall-clock origin, flags H.264 keyframes, and hands the resulting
//! packets to a container sink tick by tick until every stream runs dry.
//!
//! ```no_run
//! use avmux::sink::FramedSink;
//! use avmux::store::FileStore;
//! use avmux::{CancelToken, MuxConfig, Muxer};
//!
//! let store = FileStore::new("./media");
//! let mut sink = FramedSink::create("out.avmx")?;
//! let report = Muxer::new(MuxConfig::default()).run(&store, &mut sink, &CancelToken::new())?;
//! println!("{} packets", report.total_packets());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod clock;
pub mod driver;
pub mod error;
pub mod media;
pub mod muxer;
pub mod scheduler;
pub mod sink;
pub mod store;

pub use clock::SessionClock;
pub use error::{MuxError, Result, SinkError, SinkStage, StoreError};
pub use media::{Packet, StreamDescriptor, StreamKind, StreamSpec, Timebase};
pub use muxer::{MuxConfig, MuxReport, Muxer};
pub use scheduler::{CancelToken, Scheduler, SchedulerConfig, StreamReport};
pub use sink::ContainerSink;
pub use store::AccessUnitStore;
