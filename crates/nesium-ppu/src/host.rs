//! The boundary between the PPU core and the machine around it.
//!
//! The bus driver owns the CPU, the interrupt queue and the cartridge; the
//! core only sees them through [`PpuHost`]. Mapper hooks default to no-ops so
//! simple boards implement just the five CPU-side methods.

use bitflags::bitflags;

use crate::ppu::Ppu;

/// Interrupt sources the PPU schedules on the host queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interrupt {
    /// Vertical-blank NMI.
    Nmi,
    /// Cartridge IRQ driven by scanline/address-line counters.
    MapperIrq,
}

bitflags! {
    /// Interrupt sources a prediction pass should forecast.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PredictFlags: u8 {
        const NMI = 0b01;
        const MAPPER_IRQ = 0b10;
    }
}

impl Default for PredictFlags {
    fn default() -> Self {
        Self::all()
    }
}

impl PredictFlags {
    pub(crate) fn interrupts(self) -> impl Iterator<Item = Interrupt> {
        [
            (PredictFlags::NMI, Interrupt::Nmi),
            (PredictFlags::MAPPER_IRQ, Interrupt::MapperIrq),
        ]
        .into_iter()
        .filter(move |(flag, _)| self.contains(*flag))
        .map(|(_, kind)| kind)
    }
}

/// Services the core consumes from the bus driver.
///
/// Times are absolute master-clock timestamps. Hooks that receive the PPU
/// may call back into it (register access, re-prediction); a nested
/// synchronization request is ignored while the outer replay is running.
pub trait PpuHost {
    /// Current master-clock timestamp of the CPU.
    fn cpu_time(&self) -> u64;

    /// Reads one byte from the CPU bus (OAM DMA source).
    fn cpu_read(&mut self, addr: u16) -> u8;

    /// Schedules `kind` to fire at `timestamp`.
    fn cpu_set_interrupt(&mut self, kind: Interrupt, timestamp: u64);

    /// Drops any pending registration for `kind`.
    fn cpu_clear_interrupt(&mut self, kind: Interrupt);

    /// Stalls the CPU for `cycles` master clocks.
    fn cpu_burn(&mut self, cycles: u64);

    /// Dot 1 of every scanline.
    fn scanline_start(&mut self, _ppu: &mut Ppu, _line: i16) {}

    /// Dot 257 of every rendered scanline.
    fn hblank_start(&mut self, _ppu: &mut Ppu, _line: i16) {}

    /// Dot 321 of every rendered scanline.
    fn prefetch_start(&mut self, _ppu: &mut Ppu, _line: i16) {}

    /// `$2000` was written; pattern table selection may have moved.
    fn vram_banking_changed(&mut self, _ppu: &mut Ppu) {}

    /// A video memory address was put on the PPU bus.
    fn address_line(&mut self, _addr: u16) {}

    /// A prediction pass is about to call the `virtual_*` hooks.
    ///
    /// Mappers snapshot whatever counters the virtual hooks advance.
    fn begin_prediction(&mut self) {}

    /// The prediction pass is over; restore the snapshot.
    fn end_prediction(&mut self) {}

    /// Prediction counterpart of [`PpuHost::scanline_start`].
    ///
    /// Must not touch committed mapper state; returns `true` when the
    /// simulated event would raise the mapper IRQ.
    fn virtual_scanline_start(&mut self, _line: i16) -> bool {
        false
    }

    /// Prediction counterpart of [`PpuHost::hblank_start`].
    fn virtual_hblank_start(&mut self, _line: i16) -> bool {
        false
    }

    /// Prediction counterpart of [`PpuHost::prefetch_start`].
    fn virtual_prefetch_start(&mut self, _line: i16) -> bool {
        false
    }
}
