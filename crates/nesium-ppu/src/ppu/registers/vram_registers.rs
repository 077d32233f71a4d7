use super::VramAddr;

/// The loopy `v/t/x/w` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct VramRegisters {
    /// Current VRAM address; only ever loaded from `t`.
    pub(crate) v: VramAddr,
    /// Address/scroll latch assembled by register writes.
    pub(crate) t: VramAddr,
    /// Fine X scroll (0..=7).
    pub(crate) x: u8,
    /// Write toggle shared by `$2005` and `$2006`.
    pub(crate) w: bool,
}

impl VramRegisters {
    /// `$2005`: coarse/fine X on the first write, coarse/fine Y on the second.
    pub(crate) fn write_scroll(&mut self, value: u8) {
        if self.w {
            self.t.set_coarse_y(value >> 3);
            self.t.set_fine_y(value & 0b111);
        } else {
            self.t.set_coarse_x(value >> 3);
            self.x = value & 0b111;
        }
        self.w = !self.w;
    }

    /// `$2006`: high six bits first (bit 14 cleared), then the low byte,
    /// which also copies `t` into `v`.
    pub(crate) fn write_addr(&mut self, value: u8) {
        if self.w {
            self.t = VramAddr::new((self.t.raw() & 0xFF00) | u16::from(value));
            self.v = self.t;
        } else {
            self.t = VramAddr::new((self.t.raw() & 0x00FF) | (u16::from(value & 0x3F) << 8));
        }
        self.w = !self.w;
    }

    /// Start of frame: `v ← t`.
    pub(crate) fn reload(&mut self) {
        self.v = self.t;
    }

    pub(crate) fn reset_latch(&mut self) {
        self.w = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_pair_assembles_t() {
        let mut regs = VramRegisters::default();
        regs.write_scroll(0b1010_1101);
        regs.write_scroll(0b0110_0011);
        assert_eq!(regs.t.coarse_x(), 0b10101);
        assert_eq!(regs.x, 0b101);
        assert_eq!(regs.t.coarse_y(), 0b01100);
        assert_eq!(regs.t.fine_y(), 0b011);
        assert!(!regs.w);
    }

    #[test]
    fn address_pair_loads_v_on_second_write() {
        let mut regs = VramRegisters::default();
        regs.write_addr(0xFF);
        assert_eq!(regs.t.raw(), 0x3F00);
        assert_eq!(regs.v.raw(), 0);
        regs.write_addr(0x10);
        assert_eq!(regs.v.raw(), 0x3F10);
    }
}
