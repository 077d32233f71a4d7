//! `$4014` sprite DMA, clocked once per PPU cycle alongside the renderer.
//!
//! After a one-CPU-cycle startup delay the unit alternates a CPU bus read
//! and an OAM write, three PPU cycles apart, until 256 bytes have moved.

#[cfg(feature = "savestate-serde")]
use serde::{Deserialize, Serialize};

use crate::{host::PpuHost, memory::ppu as ppu_mem};

/// PPU cycles before the first read (one CPU cycle).
pub(crate) const INITIAL_DELAY: u8 = 3;
/// PPU cycles between a read and the following write, and vice versa.
pub(crate) const ACCESS_CYCLES: u8 = 3;
/// CPU cycles the transfer steals from the instruction engine.
pub(crate) const STALL_CPU_CYCLES: u64 = 514;

#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) enum DmaPhase {
    #[default]
    Read,
    Write,
}

#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct OamDma {
    /// Cycles until the next access; zero when idle.
    pub(crate) timer: u8,
    pub(crate) read_addr: u16,
    /// Bytes written so far.
    pub(crate) written: u16,
    pub(crate) byte: u8,
    pub(crate) phase: DmaPhase,
}

impl OamDma {
    pub(crate) fn start(&mut self, page: u8) {
        *self = Self {
            timer: INITIAL_DELAY,
            read_addr: u16::from(page) << 8,
            written: 0,
            byte: 0,
            phase: DmaPhase::Read,
        };
    }

    #[inline]
    pub(crate) fn active(&self) -> bool {
        self.timer != 0
    }

    /// One PPU cycle. Writes go through the shared OAM cursor.
    pub(crate) fn step<H: PpuHost + ?Sized>(&mut self, host: &mut H, oam: &mut [u8], oam_addr: &mut u8) {
        if self.timer == 0 {
            return;
        }
        if usize::from(self.written) >= ppu_mem::OAM_RAM_SIZE {
            self.timer = 0;
            return;
        }
        self.timer -= 1;
        if self.timer > 0 {
            return;
        }
        match self.phase {
            DmaPhase::Read => {
                self.byte = host.cpu_read(self.read_addr);
                self.read_addr = self.read_addr.wrapping_add(1);
                self.phase = DmaPhase::Write;
            }
            DmaPhase::Write => {
                oam[usize::from(*oam_addr)] = self.byte;
                *oam_addr = oam_addr.wrapping_add(1);
                self.written += 1;
                self.phase = DmaPhase::Read;
            }
        }
        self.timer = ACCESS_CYCLES;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Interrupt;

    struct PageHost;

    impl PpuHost for PageHost {
        fn cpu_time(&self) -> u64 {
            0
        }
        fn cpu_read(&mut self, addr: u16) -> u8 {
            (addr & 0xFF) as u8 ^ 0x5A
        }
        fn cpu_set_interrupt(&mut self, _kind: Interrupt, _timestamp: u64) {}
        fn cpu_clear_interrupt(&mut self, _kind: Interrupt) {}
        fn cpu_burn(&mut self, _cycles: u64) {}
    }

    #[test]
    fn transfers_a_page_in_1536_cycles() {
        let mut dma = OamDma::default();
        let mut oam = [0u8; ppu_mem::OAM_RAM_SIZE];
        let mut oam_addr = 0u8;
        dma.start(0x02);

        for _ in 0..1535 {
            dma.step(&mut PageHost, &mut oam, &mut oam_addr);
        }
        assert_eq!(dma.written, 255);
        dma.step(&mut PageHost, &mut oam, &mut oam_addr);
        assert_eq!(dma.written, 256);
        assert!(oam.iter().enumerate().all(|(i, &b)| b == i as u8 ^ 0x5A));

        dma.step(&mut PageHost, &mut oam, &mut oam_addr);
        assert!(!dma.active());
    }

    #[test]
    fn writes_start_at_the_oam_cursor_and_wrap() {
        let mut dma = OamDma::default();
        let mut oam = [0u8; ppu_mem::OAM_RAM_SIZE];
        let mut oam_addr = 0xFEu8;
        dma.start(0x00);
        for _ in 0..12 {
            dma.step(&mut PageHost, &mut oam, &mut oam_addr);
        }
        assert_eq!(oam[0xFE], 0x5A);
        assert_eq!(oam[0xFF], 0x5B);
        assert_eq!(oam_addr, 0x00);
    }
}
