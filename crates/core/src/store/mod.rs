//! Per-stream sources of encoded access units.
//!
//! A store hands out the payload of access unit `sequence` for a stream
//! kind. Stores are stateless with respect to earlier fetches: fetching the
//! same `(kind, sequence)` twice yields the same bytes. Drivers fetch
//! sequence numbers strictly in order starting at 0, and the first absent
//! unit ends that stream for the session.
//!
//! | Store | Backing | Used by |
//! |-------|---------|---------|
//! | [`FileStore`] | One file per access unit | CLI |
//! | [`MemoryStore`] | In-process buffers | Tests, embedding hosts |

pub mod file;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::StoreError;
use crate::media::StreamKind;

pub use file::{FileStore, StreamLayout};

/// Sequential supplier of encoded access units.
pub trait AccessUnitStore {
    /// Copy access unit `sequence` of `kind` into `buf`.
    ///
    /// Returns the payload length, or `Ok(None)` if no such unit exists.
    /// A payload longer than `buf` fails with [`StoreError::Overflow`];
    /// it is never truncated.
    fn fetch(
        &self,
        kind: StreamKind,
        sequence: u64,
        buf: &mut [u8],
    ) -> Result<Option<usize>, StoreError>;
}

impl<T: AccessUnitStore + ?Sized> AccessUnitStore for Arc<T> {
    fn fetch(
        &self,
        kind: StreamKind,
        sequence: u64,
        buf: &mut [u8],
    ) -> Result<Option<usize>, StoreError> {
        (**self).fetch(kind, sequence, buf)
    }
}

/// Copy `payload` into the front of `buf`, refusing to truncate.
pub(crate) fn stage(payload: &[u8], buf: &mut [u8]) -> Result<usize, StoreError> {
    if payload.len() > buf.len() {
        return Err(StoreError::Overflow {
            size: payload.len(),
            capacity: buf.len(),
        });
    }
    buf[..payload.len()].copy_from_slice(payload);
    Ok(payload.len())
}

/// In-memory access-unit store.
///
/// Cloning is cheap and clones share the same units, so a host can keep
/// appending while a session reads.
#[derive(Clone, Default)]
pub struct MemoryStore {
    units: Arc<RwLock<HashMap<StreamKind, Vec<Vec<u8>>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`push`](Self::push) for a whole stream.
    pub fn with_units<I, P>(self, kind: StreamKind, units: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Vec<u8>>,
    {
        {
            let mut map = self.units.write();
            let stream = map.entry(kind).or_default();
            stream.extend(units.into_iter().map(Into::into));
        }
        self
    }

    /// Append one access unit; returns its sequence number.
    pub fn push(&self, kind: StreamKind, payload: impl Into<Vec<u8>>) -> u64 {
        let mut map = self.units.write();
        let stream = map.entry(kind).or_default();
        stream.push(payload.into());
        (stream.len() - 1) as u64
    }

    /// Number of units held for `kind`.
    pub fn len(&self, kind: StreamKind) -> usize {
        self.units.read().get(&kind).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, kind: StreamKind) -> bool {
        self.len(kind) == 0
    }
}

impl AccessUnitStore for MemoryStore {
    fn fetch(
        &self,
        kind: StreamKind,
        sequence: u64,
        buf: &mut [u8],
    ) -> Result<Option<usize>, StoreError> {
        let map = self.units.read();
        let Some(payload) = map
            .get(&kind)
            .and_then(|units| usize::try_from(sequence).ok().and_then(|i| units.get(i)))
        else {
            return Ok(None);
        };
        stage(payload, buf).map(Some)
    }
}
