//! Address constants for the PPU side of the NES memory map.
//!
//! Everything the core decodes (register mirrors, pattern/name/palette
//! windows, OAM) is named here so the pipelines never carry bare numbers.

/// PPU address space and register layout.
pub mod ppu {
    /// First CPU-visible PPU register address.
    pub const REGISTER_BASE: u16 = 0x2000;
    /// Last CPU address that still mirrors the register file.
    pub const REGISTER_MIRROR_END: u16 = 0x3FFF;
    /// Mask for decoding register mirrors (`addr & 0x0007`).
    pub const REGISTER_SELECT_MASK: u16 = 0x0007;
    /// DMA port used for transferring a CPU page into OAM (`$4014`).
    pub const OAM_DMA: u16 = 0x4014;

    /// Address mask applied to every PPU bus access (16 KiB space).
    pub const VRAM_MIRROR_MASK: u16 = 0x3FFF;
    /// Highest address served through the `$2007` read buffer.
    pub const BUFFERED_READ_END: u16 = 0x3EFF;

    /// Granularity of every remappable window (name table or pattern page).
    pub const PAGE_SIZE: usize = 0x0400;
    /// Number of 1 KiB windows in the pattern table space.
    pub const PATTERN_PAGES: usize = 8;
    /// Pattern table space (`$0000-$1FFF`).
    pub const PATTERN_SPACE: usize = PAGE_SIZE * PATTERN_PAGES;
    /// Pattern table base address for table 1.
    pub const PATTERN_TABLE_1: u16 = 0x1000;

    /// Base address of name table 0.
    pub const NAMETABLE_BASE: u16 = 0x2000;
    /// Logical name tables visible through `$2000-$2FFF`.
    pub const NAMETABLE_COUNT: usize = 4;
    /// Internal name-table VRAM: room for four independent pages.
    pub const NAMETABLE_VRAM_SIZE: usize = PAGE_SIZE * NAMETABLE_COUNT;
    /// Offset of the attribute table inside each name table.
    pub const ATTRIBUTE_OFFSET: u16 = 0x03C0;

    /// Palette RAM base address (`$3F00`).
    pub const PALETTE_BASE: u16 = 0x3F00;
    /// Palette RAM byte count.
    pub const PALETTE_RAM_SIZE: usize = 0x20;
    /// Offset of the sprite palettes inside palette RAM.
    pub const SPRITE_PALETTE_OFFSET: usize = 0x10;

    /// Primary Object Attribute Memory (OAM) byte count.
    pub const OAM_RAM_SIZE: usize = 0x100;
    /// Secondary OAM byte count used during sprite evaluation.
    pub const SECONDARY_OAM_RAM_SIZE: usize = 0x20;
    /// Sprites held by primary OAM.
    pub const OAM_SPRITES: u8 = 64;
    /// Sprites selected per scanline.
    pub const SPRITES_PER_LINE: usize = 8;
    /// Tile index used for dummy fetches of empty sprite slots.
    pub const DUMMY_SPRITE_TILE: u16 = 0xFF;

    /// Visible frame width in pixels.
    pub const FRAME_WIDTH: usize = 256;
    /// Visible frame height in pixels.
    pub const FRAME_HEIGHT: usize = 240;

    /// CPU-visible PPU register identifiers.
    #[repr(u16)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Register {
        /// `$2000` - PPUCTRL
        Control = 0x2000,
        /// `$2001` - PPUMASK
        Mask = 0x2001,
        /// `$2002` - PPUSTATUS
        Status = 0x2002,
        /// `$2003` - OAMADDR
        OamAddr = 0x2003,
        /// `$2004` - OAMDATA
        OamData = 0x2004,
        /// `$2005` - PPUSCROLL
        Scroll = 0x2005,
        /// `$2006` - PPUADDR
        Addr = 0x2006,
        /// `$2007` - PPUDATA
        Data = 0x2007,
    }

    impl Register {
        pub const fn addr(self) -> u16 {
            self as u16
        }

        /// Resolves the register selected by any mirror in `$2000-$3FFF`.
        pub const fn from_cpu_addr(addr: u16) -> Self {
            match addr & REGISTER_SELECT_MASK {
                0 => Self::Control,
                1 => Self::Mask,
                2 => Self::Status,
                3 => Self::OamAddr,
                4 => Self::OamData,
                5 => Self::Scroll,
                6 => Self::Addr,
                _ => Self::Data,
            }
        }
    }
}
