//! Video memory: paged name/pattern tables, palette RAM and primary OAM.
//!
//! Every name table and every 1 KiB pattern window points at a page of
//! internal VRAM or of CHR ROM. ROM windows (and read-only VRAM windows)
//! silently drop writes. Pattern windows exist in three copies: the internal
//! set used by `$2007`, and the background and sprite sets the renderer
//! fetches from, which normally mirror the internal set but can be split by
//! boards that feed the two layers from different banks.

use bitflags::bitflags;
#[cfg(feature = "savestate-serde")]
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::Error,
    mem_block::ppu::{NameTableVram, OamRam, PaletteRam, PatternVram},
    memory::ppu as ppu_mem,
};

/// Logical-to-physical name-table layouts.
#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mirroring {
    /// `$2000=$2400`, `$2800=$2C00`.
    #[default]
    Horizontal,
    /// `$2000=$2800`, `$2400=$2C00`.
    Vertical,
    /// Every table shows page 0.
    OneScreen2000,
    /// Every table shows page 1.
    OneScreen2400,
    /// Every table shows page 2.
    OneScreen2800,
    /// Every table shows page 3.
    OneScreen2C00,
    /// Four independent pages.
    FourScreen,
}

impl Mirroring {
    /// Alias used by boards with a single switchable screen.
    pub const ONE_SCREEN: Mirroring = Mirroring::OneScreen2000;

    /// Decodes the raw mode numbering used by cartridge glue.
    ///
    /// `2` and `3` both select the `$2000` page.
    pub fn from_raw(raw: u8) -> Result<Self, Error> {
        Ok(match raw {
            0 => Mirroring::Horizontal,
            1 => Mirroring::Vertical,
            2 | 3 => Mirroring::OneScreen2000,
            4 => Mirroring::OneScreen2400,
            5 => Mirroring::OneScreen2800,
            6 => Mirroring::OneScreen2C00,
            7 => Mirroring::FourScreen,
            other => return Err(Error::InvalidMirroring(other)),
        })
    }

    /// Internal VRAM page shown by each logical table.
    pub const fn pages(self) -> [u16; ppu_mem::NAMETABLE_COUNT] {
        match self {
            Mirroring::Horizontal => [0, 0, 1, 1],
            Mirroring::Vertical => [0, 1, 0, 1],
            Mirroring::OneScreen2000 => [0; 4],
            Mirroring::OneScreen2400 => [1; 4],
            Mirroring::OneScreen2800 => [2; 4],
            Mirroring::OneScreen2C00 => [3; 4],
            Mirroring::FourScreen => [0, 1, 2, 3],
        }
    }
}

/// Backing memory of a page.
#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PageSource {
    /// Internal name-table VRAM (for name tables) or pattern VRAM (CHR RAM).
    #[default]
    Vram,
    /// Cartridge CHR ROM; always read-only.
    ChrRom,
}

bitflags! {
    /// Which pattern window sets a remap updates.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PatternTargets: u8 {
        /// The set `$2007` reads and writes through.
        const INTERNAL = 1 << 0;
        /// The set background fetches read from.
        const BACKGROUND = 1 << 1;
        /// The set sprite fetches read from.
        const SPRITES = 1 << 2;
    }
}

/// How much of the video memory is backed by writable RAM for the current
/// cartridge. Only these banks go into save states.
#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BankUsage {
    /// Name-table VRAM pages in use (0..=4).
    pub name_tables: u8,
    /// Whether the pattern tables are CHR RAM.
    pub pattern_vram: bool,
}

impl Default for BankUsage {
    fn default() -> Self {
        Self {
            name_tables: ppu_mem::NAMETABLE_COUNT as u8,
            pattern_vram: true,
        }
    }
}

/// A 1 KiB window onto a backing page.
#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Window {
    pub source: PageSource,
    pub page: u16,
    pub writable: bool,
}

impl Window {
    const fn vram(page: u16) -> Self {
        Self {
            source: PageSource::Vram,
            page,
            writable: true,
        }
    }
}

type PatternWindows = [Window; ppu_mem::PATTERN_PAGES];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Vram {
    pub(crate) name_vram: NameTableVram,
    pub(crate) pattern_vram: PatternVram,
    chr_rom: Vec<u8>,
    pub(crate) name_tables: [Window; ppu_mem::NAMETABLE_COUNT],
    pub(crate) patterns: PatternWindows,
    pub(crate) background_patterns: PatternWindows,
    pub(crate) sprite_patterns: PatternWindows,
    pub(crate) mirroring: Mirroring,
    pub(crate) default_mirroring: Mirroring,
    pub(crate) bank_usage: BankUsage,
    pub(crate) palette: PaletteRam,
    pub(crate) oam: OamRam,
}

impl Default for Vram {
    fn default() -> Self {
        let mut vram = Self {
            name_vram: NameTableVram::new(),
            pattern_vram: PatternVram::new(),
            chr_rom: Vec::new(),
            name_tables: [Window::default(); ppu_mem::NAMETABLE_COUNT],
            patterns: [Window::default(); ppu_mem::PATTERN_PAGES],
            background_patterns: [Window::default(); ppu_mem::PATTERN_PAGES],
            sprite_patterns: [Window::default(); ppu_mem::PATTERN_PAGES],
            mirroring: Mirroring::default(),
            default_mirroring: Mirroring::default(),
            bank_usage: BankUsage::default(),
            palette: PaletteRam::new(),
            oam: OamRam::new(),
        };
        vram.apply_mirroring(Mirroring::default());
        vram.map_8k_pattern_vram();
        vram
    }
}

impl Vram {
    /// Power-on/reset layout: default mirroring and 8 KiB of CHR RAM.
    pub(crate) fn reset_layout(&mut self) {
        self.apply_mirroring(self.default_mirroring);
        self.map_8k_pattern_vram();
    }

    pub(crate) fn set_chr_rom(&mut self, rom: Vec<u8>) {
        self.chr_rom = rom;
    }

    fn rom_pages(&self) -> usize {
        self.chr_rom.len() / ppu_mem::PAGE_SIZE
    }

    /// Pages `source` can back; `vram_pages` for the internal bank.
    pub(crate) fn page_limit(&self, source: PageSource, vram_pages: usize) -> Result<usize, Error> {
        match source {
            PageSource::Vram => Ok(vram_pages),
            PageSource::ChrRom => match self.rom_pages() {
                0 => Err(Error::MissingChrRom),
                pages => Ok(pages),
            },
        }
    }

    fn resolve(&self, source: PageSource, page: u16, vram_pages: usize) -> Result<Window, Error> {
        let pages = self.page_limit(source, vram_pages)?;
        Ok(Window {
            source,
            page: (usize::from(page) % pages) as u16,
            writable: source == PageSource::Vram,
        })
    }

    pub(crate) fn apply_mirroring(&mut self, mirroring: Mirroring) {
        self.mirroring = mirroring;
        for (window, page) in self.name_tables.iter_mut().zip(mirroring.pages()) {
            *window = Window::vram(page);
        }
    }

    pub(crate) fn map_name_table(
        &mut self,
        table: usize,
        source: PageSource,
        page: u16,
        writable: bool,
    ) -> Result<(), Error> {
        if table >= ppu_mem::NAMETABLE_COUNT {
            return Err(Error::InvalidTable(table));
        }
        let mut window = self.resolve(source, page, ppu_mem::NAMETABLE_COUNT)?;
        window.writable &= writable;
        self.name_tables[table] = window;
        Ok(())
    }

    /// Points `size` bytes of pattern space starting at `address` at bank
    /// `page` (counted in `size` units) of `source`.
    pub(crate) fn map_pattern(
        &mut self,
        address: u16,
        size: usize,
        source: PageSource,
        page: u16,
        targets: PatternTargets,
    ) -> Result<(), Error> {
        if size == 0 || size % ppu_mem::PAGE_SIZE != 0 || size > ppu_mem::PATTERN_SPACE {
            return Err(Error::InvalidPageSize(size));
        }
        if usize::from(address) % size != 0 || usize::from(address) >= ppu_mem::PATTERN_SPACE {
            return Err(Error::MisalignedPage { address, size });
        }
        let first = usize::from(address) / ppu_mem::PAGE_SIZE;
        let count = size / ppu_mem::PAGE_SIZE;
        for i in 0..count {
            let bank_page = usize::from(page) * count + i;
            let window = self.resolve(source, bank_page as u16, ppu_mem::PATTERN_PAGES)?;
            let slot = first + i;
            if targets.contains(PatternTargets::INTERNAL) {
                self.patterns[slot] = window;
            }
            if targets.contains(PatternTargets::BACKGROUND) {
                self.background_patterns[slot] = window;
            }
            if targets.contains(PatternTargets::SPRITES) {
                self.sprite_patterns[slot] = window;
            }
        }
        Ok(())
    }

    /// Copies the internal pattern windows over the renderer's sets.
    pub(crate) fn sync_pattern_sets(&mut self) {
        self.background_patterns = self.patterns;
        self.sprite_patterns = self.patterns;
    }

    pub(crate) fn map_8k_pattern_vram(&mut self) {
        for (i, window) in self.patterns.iter_mut().enumerate() {
            *window = Window::vram(i as u16);
        }
        self.sync_pattern_sets();
    }

    fn window_byte(&self, window: Window, offset: usize, name_space: bool) -> u8 {
        let index = usize::from(window.page) * ppu_mem::PAGE_SIZE + (offset & (ppu_mem::PAGE_SIZE - 1));
        match window.source {
            PageSource::Vram if name_space => self.name_vram[index],
            PageSource::Vram => self.pattern_vram[index],
            PageSource::ChrRom => self.chr_rom.get(index).copied().unwrap_or(0),
        }
    }

    /// Name-table byte at `offset` (0..0x3FF) of logical table `table`.
    #[inline]
    pub(crate) fn name_byte(&self, table: u8, offset: u16) -> u8 {
        let window = self.name_tables[usize::from(table & 3)];
        self.window_byte(window, usize::from(offset), true)
    }

    #[inline]
    pub(crate) fn background_pattern(&self, addr: u16) -> u8 {
        let addr = usize::from(addr) & (ppu_mem::PATTERN_SPACE - 1);
        self.window_byte(self.background_patterns[addr / ppu_mem::PAGE_SIZE], addr, false)
    }

    #[inline]
    pub(crate) fn sprite_pattern(&self, addr: u16) -> u8 {
        let addr = usize::from(addr) & (ppu_mem::PATTERN_SPACE - 1);
        self.window_byte(self.sprite_patterns[addr / ppu_mem::PAGE_SIZE], addr, false)
    }

    fn palette_index(addr: u16) -> usize {
        if addr & 3 == 0 {
            0
        } else {
            usize::from(addr) & (ppu_mem::PALETTE_RAM_SIZE - 1)
        }
    }

    /// CPU-side read of the 14-bit PPU bus.
    pub(crate) fn read(&self, addr: u16) -> u8 {
        let addr = addr & ppu_mem::VRAM_MIRROR_MASK;
        match addr {
            0x0000..=0x1FFF => {
                let addr = usize::from(addr);
                self.window_byte(self.patterns[addr / ppu_mem::PAGE_SIZE], addr, false)
            }
            0x2000..=0x3EFF => {
                let rel = addr - ppu_mem::NAMETABLE_BASE;
                self.name_byte(((rel >> 10) & 3) as u8, rel)
            }
            _ => self.palette[Self::palette_index(addr)],
        }
    }

    /// CPU-side write of the 14-bit PPU bus.
    pub(crate) fn write(&mut self, addr: u16, data: u8) {
        let addr = addr & ppu_mem::VRAM_MIRROR_MASK;
        let (window, offset, name_space) = match addr {
            0x0000..=0x1FFF => {
                let addr = usize::from(addr);
                (self.patterns[addr / ppu_mem::PAGE_SIZE], addr, false)
            }
            0x2000..=0x3EFF => {
                let rel = usize::from(addr - ppu_mem::NAMETABLE_BASE);
                (self.name_tables[(rel >> 10) & 3], rel, true)
            }
            _ => {
                self.palette[Self::palette_index(addr)] = data;
                return;
            }
        };
        if !window.writable || window.source != PageSource::Vram {
            return;
        }
        let index = usize::from(window.page) * ppu_mem::PAGE_SIZE + (offset & (ppu_mem::PAGE_SIZE - 1));
        if name_space {
            self.name_vram[index] = data;
        } else {
            self.pattern_vram[index] = data;
        }
    }

    /// Palette entry `index` of background palette `palette`.
    #[inline]
    pub(crate) fn background_color(&self, palette: u8, index: u8) -> u8 {
        self.palette[usize::from(palette & 3) * 4 + usize::from(index & 3)]
    }

    #[inline]
    pub(crate) fn sprite_color(&self, palette: u8, index: u8) -> u8 {
        self.palette
            [ppu_mem::SPRITE_PALETTE_OFFSET + usize::from(palette & 3) * 4 + usize::from(index & 3)]
    }

    /// Universal background color (`$3F00`).
    #[inline]
    pub(crate) fn backdrop(&self) -> u8 {
        self.palette[0]
    }

    pub(crate) fn set_bank_usage(&mut self, usage: BankUsage) -> Result<(), Error> {
        if usize::from(usage.name_tables) > ppu_mem::NAMETABLE_COUNT {
            let err = Error::InvalidNameTableCount(usize::from(usage.name_tables));
            warn!("rejected bank usage: {err}");
            return Err(err);
        }
        self.bank_usage = usage;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_mirroring_pairs_tables() {
        let mut vram = Vram::default();
        vram.apply_mirroring(Mirroring::Horizontal);
        vram.write(0x2005, 0xAA);
        assert_eq!(vram.read(0x2405), 0xAA);
        assert_eq!(vram.read(0x2805), 0x00);
        vram.write(0x2C10, 0x55);
        assert_eq!(vram.read(0x2810), 0x55);
        assert_eq!(vram.read(0x3C10), 0x55);
    }

    #[test]
    fn vertical_and_single_screen_layouts() {
        let mut vram = Vram::default();
        vram.apply_mirroring(Mirroring::Vertical);
        vram.write(0x2400, 0x11);
        assert_eq!(vram.read(0x2C00), 0x11);
        assert_eq!(vram.read(0x2000), 0x00);

        vram.apply_mirroring(Mirroring::OneScreen2C00);
        vram.write(0x2000, 0x22);
        assert_eq!(vram.read(0x2400), 0x22);
        assert_eq!(vram.name_vram[3 * ppu_mem::PAGE_SIZE], 0x22);
    }

    #[test]
    fn raw_mirroring_rejects_unknown_modes() {
        assert_eq!(Mirroring::from_raw(3).ok(), Some(Mirroring::ONE_SCREEN));
        assert!(matches!(
            Mirroring::from_raw(8),
            Err(Error::InvalidMirroring(8))
        ));
    }

    #[test]
    fn palette_entry_zero_mirrors() {
        let mut vram = Vram::default();
        vram.write(0x3F10, 0x0F);
        assert_eq!(vram.read(0x3F00), 0x0F);
        vram.write(0x3F04, 0x21);
        assert_eq!(vram.read(0x3F14), 0x21);
        assert_eq!(vram.palette[4], 0x00);
        vram.write(0x3F05, 0x16);
        assert_eq!(vram.read(0x3F25), 0x16);
    }

    #[test]
    fn rom_windows_ignore_writes() {
        let mut vram = Vram::default();
        let rom: Vec<u8> = (0..0x4000).map(|i| (i / ppu_mem::PAGE_SIZE) as u8).collect();
        vram.set_chr_rom(rom);
        vram.map_pattern(0x0000, 0x1000, PageSource::ChrRom, 1, PatternTargets::INTERNAL)
            .expect("map 4k bank");
        vram.sync_pattern_sets();
        assert_eq!(vram.read(0x0000), 4);
        assert_eq!(vram.read(0x0C00), 7);
        vram.write(0x0000, 0xEE);
        assert_eq!(vram.read(0x0000), 4);
        assert_eq!(vram.background_pattern(0x0400), 5);
        assert_eq!(vram.sprite_pattern(0x0800), 6);
    }

    #[test]
    fn expanded_remap_splits_background_and_sprites() {
        let mut vram = Vram::default();
        vram.set_chr_rom(vec![0x77; 0x2000]);
        vram.map_pattern(0x1000, 0x0400, PageSource::ChrRom, 0, PatternTargets::SPRITES)
            .expect("map sprite bank");
        assert_eq!(vram.sprite_pattern(0x1000), 0x77);
        assert_eq!(vram.background_pattern(0x1000), 0x00);
        assert_eq!(vram.read(0x1000), 0x00);
    }

    #[test]
    fn remap_validation() {
        let mut vram = Vram::default();
        assert!(matches!(
            vram.map_pattern(0, 0x0300, PageSource::Vram, 0, PatternTargets::INTERNAL),
            Err(Error::InvalidPageSize(0x0300))
        ));
        assert!(matches!(
            vram.map_pattern(0x0400, 0x0800, PageSource::Vram, 0, PatternTargets::INTERNAL),
            Err(Error::MisalignedPage { .. })
        ));
        assert!(matches!(
            vram.map_pattern(0, 0x0400, PageSource::ChrRom, 0, PatternTargets::INTERNAL),
            Err(Error::MissingChrRom)
        ));
        assert!(matches!(
            vram.map_name_table(4, PageSource::Vram, 0, true),
            Err(Error::InvalidTable(4))
        ));
    }

    #[test]
    fn read_only_name_table_keeps_contents() {
        let mut vram = Vram::default();
        vram.write(0x2000, 0x42);
        vram.map_name_table(1, PageSource::Vram, 0, false)
            .expect("map read-only table");
        vram.write(0x2400, 0x99);
        assert_eq!(vram.read(0x2400), 0x42);
    }
}
