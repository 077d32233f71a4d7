//! Save/load contract for the core.
//!
//! Components capture an owned snapshot type; callers pick the encoding.
//! With `savestate-postcard` enabled snapshots also round-trip through
//! postcard bytes.

#[cfg(feature = "savestate-serde")]
use serde::{Deserialize, Serialize};

/// Metadata stored next to every snapshot.
#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMeta {
    /// Version of the snapshot payload.
    pub format_version: u32,
    /// Caller-defined tick or frame counter at capture time.
    pub tick: u64,
}

impl Default for SnapshotMeta {
    fn default() -> Self {
        Self {
            format_version: 1,
            tick: 0,
        }
    }
}

/// Snapshot payload bundled with its metadata.
#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T, M = SnapshotMeta> {
    pub meta: M,
    pub data: T,
}

pub trait SaveState {
    type State;
    type Error;

    /// Bump when the layout of `State` changes.
    const FORMAT_VERSION: u32 = 1;

    fn save(&self, meta: SnapshotMeta) -> Result<Snapshot<Self::State>, Self::Error>;

    /// Restores from `snapshot`. On error the component is left unchanged.
    fn load(&mut self, snapshot: &Snapshot<Self::State>) -> Result<(), Self::Error>;
}

#[cfg(feature = "savestate-postcard")]
impl<T> Snapshot<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    pub fn to_postcard_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_stdvec(self)
    }

    pub fn from_postcard_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
