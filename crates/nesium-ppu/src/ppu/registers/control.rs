use bitflags::bitflags;

use crate::memory::ppu as ppu_mem;

bitflags! {
    /// `$2000` PPUCTRL.
    ///
    /// ```text
    /// 7 6 5 4 3 2 1 0
    /// V P H B S I N N
    /// ```
    /// `NN` base name table, `I` address increment, `S` 8x8 sprite table,
    /// `B` background table, `H` 8x16 sprites, `P` master/slave, `V` NMI.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub(crate) struct Control: u8 {
        const NAMETABLE = 0b0000_0011;
        /// `$2007` accesses step by 32 instead of 1.
        const INCREMENT_32 = 0b0000_0100;
        /// 8x8 sprites fetch from `$1000`.
        const SPRITE_TABLE = 0b0000_1000;
        /// Background fetches from `$1000`.
        const BACKGROUND_TABLE = 0b0001_0000;
        const SPRITE_SIZE_16 = 0b0010_0000;
        const MASTER_SLAVE = 0b0100_0000;
        /// Raise NMI when VBlank starts.
        const GENERATE_NMI = 0b1000_0000;
    }
}

impl Control {
    pub(crate) fn nametable_index(self) -> u8 {
        self.bits() & Control::NAMETABLE.bits()
    }

    pub(crate) fn vram_increment(self) -> u16 {
        if self.contains(Control::INCREMENT_32) {
            32
        } else {
            1
        }
    }

    /// Pattern base for 8x8 sprites (8x16 sprites pick it from the tile).
    pub(crate) fn sprite_tileset(self) -> u16 {
        if self.contains(Control::SPRITE_TABLE) {
            ppu_mem::PATTERN_TABLE_1
        } else {
            0
        }
    }

    pub(crate) fn background_tileset(self) -> u16 {
        if self.contains(Control::BACKGROUND_TABLE) {
            ppu_mem::PATTERN_TABLE_1
        } else {
            0
        }
    }

    pub(crate) fn sprite_height(self) -> u8 {
        if self.contains(Control::SPRITE_SIZE_16) {
            16
        } else {
            8
        }
    }

    pub(crate) fn nmi_enabled(self) -> bool {
        self.contains(Control::GENERATE_NMI)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_every_field() {
        let ctrl = Control::from_bits_retain(0b1011_1110);
        assert_eq!(ctrl.nametable_index(), 2);
        assert_eq!(ctrl.vram_increment(), 32);
        assert_eq!(ctrl.sprite_tileset(), 0x1000);
        assert_eq!(ctrl.background_tileset(), 0x1000);
        assert_eq!(ctrl.sprite_height(), 16);
        assert!(ctrl.nmi_enabled());

        let ctrl = Control::empty();
        assert_eq!(ctrl.vram_increment(), 1);
        assert_eq!(ctrl.sprite_height(), 8);
        assert_eq!(ctrl.background_tileset(), 0);
    }
}
