//! CPU-visible register file and the internal loopy latches.

mod control;
mod mask;
mod status;
mod vram_addr;
mod vram_registers;

pub(crate) use control::Control;
pub(crate) use mask::Mask;
pub(crate) use status::Status;
pub use vram_addr::VramAddr;
pub(crate) use vram_registers::VramRegisters;

/// Everything `$2000-$2007` can observe or change, apart from video memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub(crate) struct Registers {
    pub(crate) control: Control,
    pub(crate) mask: Mask,
    /// VBlank, sprite-0 hit and overflow.
    pub(crate) status: Status,
    /// OAM cursor driven by `$2003`/`$2004`, sprite evaluation and DMA.
    pub(crate) oam_addr: u8,
    pub(crate) vram: VramRegisters,
    /// Delayed `$2007` read buffer.
    pub(crate) read_buffer: u8,
    /// Last byte written to any port; write-only ports read back as this.
    pub(crate) write_buffer: u8,
}

impl Registers {
    /// `$2000`; also routes the name-table bits into `t`.
    pub(crate) fn write_control(&mut self, value: u8) {
        self.control = Control::from_bits_retain(value);
        self.vram.t.set_nametable(self.control.nametable_index());
    }

    /// `$2002` read: latches the flags, then clears VBlank and the toggle.
    ///
    /// `race` is set on the exact cycle VBlank was raised; the bit then reads
    /// as clear but VBlank is still consumed.
    pub(crate) fn read_status(&mut self, race: bool) -> u8 {
        let mut data = self.write_buffer & 0x1F;
        data |= (self.status & (Status::SPRITE_OVERFLOW | Status::SPRITE_ZERO_HIT)).bits();
        if self.status.contains(Status::VERTICAL_BLANK) {
            if !race {
                data |= Status::VERTICAL_BLANK.bits();
            }
            self.status.remove(Status::VERTICAL_BLANK);
        }
        self.vram.reset_latch();
        data
    }
}
