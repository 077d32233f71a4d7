use bitflags::bitflags;

// 14 13 12 | 11 10 | 9 8 7 6 5 | 4 3 2 1 0
//  fine y  |  NT   |  coarse y |  coarse x
bitflags! {
    pub(crate) struct VramAddrMask: u16 {
        const COARSE_X = 0x001F;
        const COARSE_Y = 0x03E0;
        const NAMETABLE_X = 0x0400;
        const NAMETABLE_Y = 0x0800;
        const NAMETABLE = 0x0C00;
        const FINE_Y = 0x7000;
        const ALL = 0x7FFF;
    }
}

const COARSE_Y_SHIFT: u16 = 5;
const NAMETABLE_SHIFT: u16 = 10;
const FINE_Y_SHIFT: u16 = 12;

/// One of the 15-bit loopy registers (`v` or `t`).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct VramAddr(u16);

impl VramAddr {
    pub fn new(raw: u16) -> Self {
        Self(raw & VramAddrMask::ALL.bits())
    }

    #[inline]
    pub fn raw(self) -> u16 {
        self.0
    }

    /// Address as seen on the 14-bit PPU bus.
    #[inline]
    pub fn bus_addr(self) -> u16 {
        self.0 & crate::memory::ppu::VRAM_MIRROR_MASK
    }

    #[inline]
    pub fn coarse_x(self) -> u8 {
        (self.0 & VramAddrMask::COARSE_X.bits()) as u8
    }

    #[inline]
    pub fn coarse_y(self) -> u8 {
        ((self.0 & VramAddrMask::COARSE_Y.bits()) >> COARSE_Y_SHIFT) as u8
    }

    /// Logical name table (0..=3).
    #[inline]
    pub fn nametable(self) -> u8 {
        ((self.0 & VramAddrMask::NAMETABLE.bits()) >> NAMETABLE_SHIFT) as u8
    }

    #[inline]
    pub fn fine_y(self) -> u8 {
        ((self.0 & VramAddrMask::FINE_Y.bits()) >> FINE_Y_SHIFT) as u8
    }

    /// Offset of the current tile inside its 4 KiB name-table window.
    #[inline]
    pub fn tile_offset(self) -> u16 {
        self.0 & 0x0FFF
    }

    pub(crate) fn set_coarse_x(&mut self, cx: u8) {
        self.0 = (self.0 & !VramAddrMask::COARSE_X.bits()) | u16::from(cx & 0x1F);
    }

    pub(crate) fn set_coarse_y(&mut self, cy: u8) {
        self.0 = (self.0 & !VramAddrMask::COARSE_Y.bits()) | (u16::from(cy & 0x1F) << COARSE_Y_SHIFT);
    }

    pub(crate) fn set_nametable(&mut self, nt: u8) {
        self.0 = (self.0 & !VramAddrMask::NAMETABLE.bits()) | (u16::from(nt & 0b11) << NAMETABLE_SHIFT);
    }

    pub(crate) fn set_fine_y(&mut self, fy: u8) {
        self.0 = (self.0 & !VramAddrMask::FINE_Y.bits()) | (u16::from(fy & 0b111) << FINE_Y_SHIFT);
    }

    /// `$2007` post-increment; wraps within 15 bits.
    pub(crate) fn increment(&mut self, step: u16) {
        self.0 = self.0.wrapping_add(step) & VramAddrMask::ALL.bits();
    }

    /// Moves to the next tile column, flipping the horizontal name table on wrap.
    pub(crate) fn increment_x(&mut self) {
        if self.coarse_x() == 31 {
            self.set_coarse_x(0);
            self.0 ^= VramAddrMask::NAMETABLE_X.bits();
        } else {
            self.set_coarse_x(self.coarse_x() + 1);
        }
    }

    /// Moves to the next pixel row.
    ///
    /// Row 29 wraps to 0 and flips the vertical name table; rows 30 and 31
    /// (only reachable through register writes) wrap to 0 without the flip.
    pub(crate) fn increment_y(&mut self) {
        let fine_y = self.fine_y() + 1;
        if fine_y <= 7 {
            self.set_fine_y(fine_y);
            return;
        }
        self.set_fine_y(0);
        match self.coarse_y() + 1 {
            30 => {
                self.set_coarse_y(0);
                self.0 ^= VramAddrMask::NAMETABLE_Y.bits();
            }
            y if y > 31 => self.set_coarse_y(0),
            y => self.set_coarse_y(y),
        }
    }

    /// Copies coarse X and the horizontal name-table bit from `t`.
    pub(crate) fn copy_horizontal(&mut self, t: VramAddr) {
        let bits = (VramAddrMask::COARSE_X | VramAddrMask::NAMETABLE_X).bits();
        self.0 = (self.0 & !bits) | (t.0 & bits);
    }
}

impl core::fmt::Debug for VramAddr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VramAddr")
            .field("raw", &format_args!("{:#06X}", self.0))
            .field("fine_y", &self.fine_y())
            .field("nametable", &self.nametable())
            .field("coarse_y", &self.coarse_y())
            .field("coarse_x", &self.coarse_x())
            .finish()
    }
}
