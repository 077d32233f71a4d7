//! Cycle-accurate NES 2C02 picture processing unit.
//!
//! The core is a single [`Ppu`] context driven by a bus driver through
//! [`PpuHost`]. The driver lets master-clock time accumulate, and the core
//! catches up whenever a register is touched or the driver asks for a
//! forecast of upcoming interrupts.

pub mod config;
pub mod error;
pub mod host;
pub mod mem_block;
pub mod memory;
pub mod ppu;
pub mod state;

pub use config::{Region, Timing};
pub use error::Error;
pub use host::{Interrupt, PpuHost, PredictFlags};
pub use ppu::{
    BankUsage, ColorMap, FrameBuffer, Mirroring, PageSource, PatternTargets, Ppu, PpuStatus,
    RenderOption, Window, savestate::PpuState,
};
pub use state::{SaveState, Snapshot, SnapshotMeta};

#[cfg(test)]
mod tests {
    use ctor::ctor;
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    pub(crate) const TEST_COUNT: usize = 1000;

    #[ctor]
    fn init_tracing() {
        let subscriber = FmtSubscriber::builder()
            .with_file(true)
            .with_line_number(true)
            .with_max_level(Level::DEBUG)
            .pretty()
            .finish();
        tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
    }
}
