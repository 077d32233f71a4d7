//! Runtime configuration shared by the PPU core.

pub mod region;

pub use region::{Region, Timing};
