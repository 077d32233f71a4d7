use std::fmt;

use crate::memory::ppu as ppu_mem;

#[derive(Debug)]
pub enum Error {
    /// Raw mirroring value does not name a supported layout.
    InvalidMirroring(u8),
    /// Pattern remaps only accept 1, 2, 4 or 8 KiB windows.
    InvalidPageSize(usize),
    /// Remap address is not aligned to the requested window size.
    MisalignedPage { address: u16, size: usize },
    /// A CHR ROM page was requested before any CHR ROM was attached.
    MissingChrRom,
    /// Name-table page count outside `0..=4`.
    InvalidNameTableCount(usize),
    /// Logical name table index outside `0..4`.
    InvalidTable(usize),
    /// Persisted state does not match the declared bank usage.
    StateLayout {
        bank: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A persisted page window points past the memory backing it.
    StateWindow {
        bank: &'static str,
        slot: usize,
        page: u16,
    },
    /// A persisted counter or cursor is outside the range the core produces.
    StateField { field: &'static str, value: i64 },
    /// Wrapper for postcard encode/decode failures.
    #[cfg(feature = "savestate-postcard")]
    Postcard(postcard::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMirroring(mode) => write!(f, "unknown mirroring mode {mode}"),
            Self::InvalidPageSize(size) => write!(
                f,
                "pattern window of {size} bytes is not a multiple of {} up to {}",
                ppu_mem::PAGE_SIZE,
                ppu_mem::PATTERN_SPACE
            ),
            Self::MisalignedPage { address, size } => {
                write!(f, "address {address:#06X} is not aligned to {size} bytes")
            }
            Self::MissingChrRom => write!(f, "no CHR ROM attached"),
            Self::InvalidNameTableCount(count) => {
                write!(f, "name-table page count {count} outside 0..=4")
            }
            Self::InvalidTable(table) => write!(f, "name table {table} outside 0..4"),
            Self::StateLayout {
                bank,
                expected,
                actual,
            } => write!(f, "{bank} state expected {expected} bytes, got {actual}"),
            Self::StateWindow { bank, slot, page } => {
                write!(f, "{bank} window {slot} points at missing page {page}")
            }
            Self::StateField { field, value } => write!(f, "{field} {value} out of range"),
            #[cfg(feature = "savestate-postcard")]
            Self::Postcard(err) => write!(f, "postcard error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            #[cfg(feature = "savestate-postcard")]
            Self::Postcard(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(feature = "savestate-postcard")]
impl From<postcard::Error> for Error {
    fn from(value: postcard::Error) -> Self {
        Self::Postcard(value)
    }
}
