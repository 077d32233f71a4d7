//! Background tile fetcher and pixel shifters.
//!
//! Each tile takes eight cycles: name byte, attribute byte and the two
//! pattern planes, two cycles apiece. Attributes travel through a two-deep
//! latch (`latch` is the tile being fetched next, `buffer` the one on screen)
//! so fine-X scrolled pixels near a tile edge still pick the right palette.

#[cfg(feature = "savestate-serde")]
use serde::{Deserialize, Serialize};

use super::Ppu;
use crate::{
    config::region::{PREFETCH_END, PREFETCH_START, RENDER_CLOCKS},
    host::PpuHost,
    memory::ppu as ppu_mem,
};

/// Bytes per tile in pattern memory (two 8-byte planes).
const BYTES_PER_TILE: u16 = 16;
/// Offset of the second plane.
const PLANE_OFFSET: u16 = 8;
const TILE_WIDTH: u8 = 8;

/// Which lines may fetch on a given cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FetchKind {
    None,
    /// Tile fetches for the current line. These also run on the pre-render
    /// line so mappers watching A12 see the same traffic every line.
    Visible,
    /// Prefetch of the next line's first two tiles during HBlank.
    Always,
}

/// One of the four memory accesses of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FetchStep {
    Name,
    Attribute,
    PatternLow,
    PatternHigh,
}

const FETCH_TABLE: [FetchKind; 342] = {
    let mut table = [FetchKind::None; 342];
    let mut cycle = 2;
    while cycle <= 341 {
        if cycle <= RENDER_CLOCKS {
            table[cycle as usize] = FetchKind::Visible;
        } else if cycle >= PREFETCH_START && cycle <= PREFETCH_END {
            table[cycle as usize] = FetchKind::Always;
        }
        cycle += 2;
    }
    table
};

#[inline]
pub(crate) fn fetch_kind(cycle: u16) -> FetchKind {
    FETCH_TABLE
        .get(usize::from(cycle))
        .copied()
        .unwrap_or(FetchKind::None)
}

#[inline]
pub(crate) fn fetch_step(cycle: u16) -> FetchStep {
    match (cycle.wrapping_sub(1) % 8) / 2 {
        0 => FetchStep::Name,
        1 => FetchStep::Attribute,
        2 => FetchStep::PatternLow,
        _ => FetchStep::PatternHigh,
    }
}

/// Shift registers, attribute pipeline and reload counter.
#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct BgShifter {
    pub(crate) low_shift: u8,
    pub(crate) high_shift: u8,
    pub(crate) low_feed: u8,
    pub(crate) high_feed: u8,
    /// Attribute of the tile on screen, with its 2-bit selector shift.
    pub(crate) buffer: u8,
    pub(crate) buffer_tag: u8,
    /// Attribute of the next tile.
    pub(crate) latch: u8,
    pub(crate) latch_tag: u8,
    /// Pixels until the next reload (8..=0).
    pub(crate) counter: u8,
}

/// Bytes gathered by the fetcher for the tile being assembled.
#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct BgFetch {
    pub(crate) name: u8,
    pub(crate) attribute: u8,
    pub(crate) tag: u8,
    pub(crate) pattern_low: u8,
    pub(crate) pattern_high: u8,
    /// Fine Y of the tile row.
    pub(crate) row: u8,
}

impl BgShifter {
    /// Moves freshly fetched data into the feeds and advances the attribute pipeline.
    pub(crate) fn load(&mut self, fetch: &BgFetch) {
        self.low_feed = fetch.pattern_low;
        self.high_feed = fetch.pattern_high;
        self.buffer = self.latch;
        self.buffer_tag = self.latch_tag;
        self.latch = fetch.attribute;
        self.latch_tag = fetch.tag;
        self.counter = TILE_WIDTH;
    }

    /// Counter tick before a pixel; reloads at zero.
    #[inline]
    pub(crate) fn prelogic(&mut self, fetch: &BgFetch) {
        self.counter = self.counter.saturating_sub(1);
        if self.counter == 0 {
            self.load(fetch);
        }
    }

    /// Shifts one pixel out, pulling the next bit from the feeds.
    #[inline]
    pub(crate) fn postlogic(&mut self) {
        self.low_shift = (self.low_shift << 1) | (self.low_feed >> 7);
        self.low_feed <<= 1;
        self.high_shift = (self.high_shift << 1) | (self.high_feed >> 7);
        self.high_feed <<= 1;
    }

    /// 2-bit color index at fine-X offset `fine_x`.
    #[inline]
    pub(crate) fn sample(&self, fine_x: u8) -> u8 {
        let low = (self.low_shift << fine_x) >> 7;
        let high = (self.high_shift << fine_x) >> 7;
        (high << 1) | low
    }

    /// Palette selected for the pixel just sampled.
    #[inline]
    pub(crate) fn palette(&self, fine_x: u8) -> u8 {
        let (attribute, shift) = if self.counter <= fine_x {
            (self.latch, self.latch_tag)
        } else {
            (self.buffer, self.buffer_tag)
        };
        (attribute >> shift) & 0x03
    }
}

impl Ppu {
    /// Per-cycle background fetch work for lines -1..=239.
    pub(super) fn background_clock<H: PpuHost + ?Sized>(&mut self, host: &mut H) {
        let cycle = self.renderer.clock;
        let vram = &mut self.registers.vram;

        if cycle == PREFETCH_START {
            // Horizontal bits come back from t before the y step.
            vram.v.copy_horizontal(vram.t);
            vram.v.increment_y();
        }

        match fetch_kind(cycle) {
            FetchKind::None => return,
            FetchKind::Visible | FetchKind::Always => {}
        }

        let v = vram.v;
        let fetch = &mut self.renderer.bg_fetch;
        match fetch_step(cycle) {
            FetchStep::Name => {
                host.address_line(ppu_mem::NAMETABLE_BASE + v.tile_offset());
                fetch.name = self.vram.name_byte(v.nametable(), v.tile_offset() & 0x03FF);
            }
            FetchStep::Attribute => {
                let x = u16::from(v.coarse_x());
                let y = u16::from(v.coarse_y());
                let row = v.fine_y();
                let offset = ppu_mem::ATTRIBUTE_OFFSET
                    + ((y * u16::from(TILE_WIDTH) + u16::from(row)) / 32) * 8
                    + x / 4;
                host.address_line(
                    ppu_mem::NAMETABLE_BASE + u16::from(v.nametable()) * ppu_mem::PAGE_SIZE as u16 + offset,
                );
                fetch.attribute = self.vram.name_byte(v.nametable(), offset);
                fetch.tag = ((x & 2) | ((y & 2) << 1)) as u8;
                fetch.row = row;
                self.registers.vram.v.increment_x();
            }
            step @ (FetchStep::PatternLow | FetchStep::PatternHigh) => {
                let mut addr = u16::from(fetch.name) * BYTES_PER_TILE
                    + self.registers.control.background_tileset()
                    + u16::from(fetch.row);
                if step == FetchStep::PatternHigh {
                    addr += PLANE_OFFSET;
                }
                host.address_line(addr);
                let data = self.vram.background_pattern(addr);
                if step == FetchStep::PatternLow {
                    fetch.pattern_low = data;
                } else {
                    fetch.pattern_high = data;
                    if cycle >= PREFETCH_START {
                        // No pixels run during HBlank, so shift a whole tile here.
                        let shifter = &mut self.renderer.background;
                        shifter.low_shift = shifter.low_feed;
                        shifter.high_shift = shifter.high_feed;
                        shifter.load(fetch);
                    }
                }
            }
        }
    }

    /// Background half of a visible pixel.
    pub(super) fn background_pixel(&mut self, rendering: bool) {
        let x = usize::from(self.renderer.pixel);
        let fine_x = self.registers.vram.x;
        let shifter = &mut self.renderer.background;

        if !rendering {
            shifter.prelogic(&self.renderer.bg_fetch);
            shifter.postlogic();
            self.renderer.bg_pixels[x] = 0;
            return;
        }

        shifter.prelogic(&self.renderer.bg_fetch);
        let pixel = shifter.sample(fine_x);
        shifter.postlogic();

        if pixel == 0 || (x < usize::from(TILE_WIDTH) && self.registers.mask.clip_background()) {
            self.renderer.bg_pixels[x] = 0;
            self.put_backdrop();
            return;
        }

        self.renderer.bg_pixels[x] = pixel;
        if !self.options.active.background_layer {
            return;
        }
        let palette = self.renderer.background.palette(fine_x);
        let index = self.vram.background_color(palette, pixel);
        self.put_color(index);
    }

    /// Background output while the layer is disabled: backdrop only.
    pub(super) fn background_pixel_stub(&mut self, rendering: bool) {
        self.renderer.bg_pixels[usize::from(self.renderer.pixel)] = 0;
        if rendering {
            self.put_backdrop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_table_covers_visible_and_prefetch_windows() {
        assert_eq!(fetch_kind(1), FetchKind::None);
        assert_eq!(fetch_kind(2), FetchKind::Visible);
        assert_eq!(fetch_kind(256), FetchKind::Visible);
        assert_eq!(fetch_kind(258), FetchKind::None);
        assert_eq!(fetch_kind(320), FetchKind::None);
        assert_eq!(fetch_kind(321), FetchKind::None);
        assert_eq!(fetch_kind(322), FetchKind::Always);
        assert_eq!(fetch_kind(336), FetchKind::Always);
        assert_eq!(fetch_kind(338), FetchKind::None);
        assert_eq!(fetch_kind(400), FetchKind::None);
    }

    #[test]
    fn fetch_sequence_repeats_every_eight_cycles() {
        let steps: Vec<_> = (1..=8).map(fetch_step).collect();
        assert_eq!(
            steps,
            [
                FetchStep::Name,
                FetchStep::Name,
                FetchStep::Attribute,
                FetchStep::Attribute,
                FetchStep::PatternLow,
                FetchStep::PatternLow,
                FetchStep::PatternHigh,
                FetchStep::PatternHigh,
            ]
        );
        assert_eq!(fetch_step(322), FetchStep::Name);
        assert_eq!(fetch_step(336), FetchStep::PatternHigh);
    }

    #[test]
    fn attribute_pipeline_is_two_deep() {
        let mut shifter = BgShifter::default();
        let first = BgFetch {
            attribute: 0b0000_0001,
            tag: 0,
            ..BgFetch::default()
        };
        let second = BgFetch {
            attribute: 0b1100_0000,
            tag: 6,
            ..BgFetch::default()
        };
        shifter.load(&first);
        shifter.load(&second);
        assert_eq!((shifter.buffer, shifter.buffer_tag), (0b0000_0001, 0));
        assert_eq!((shifter.latch, shifter.latch_tag), (0b1100_0000, 6));
        shifter.counter = 8;
        assert_eq!(shifter.palette(0), 1);
        shifter.counter = 2;
        assert_eq!(shifter.palette(3), 3);
    }

    #[test]
    fn shifters_feed_from_the_next_tile() {
        let mut shifter = BgShifter {
            low_shift: 0b1000_0000,
            high_shift: 0b0000_0000,
            low_feed: 0b1000_0000,
            high_feed: 0b1000_0000,
            ..BgShifter::default()
        };
        assert_eq!(shifter.sample(0), 1);
        shifter.postlogic();
        assert_eq!(shifter.low_shift, 0b0000_0001);
        assert_eq!(shifter.high_shift, 0b0000_0001);
        assert_eq!(shifter.sample(7), 3);
    }

    #[test]
    fn counter_reloads_every_tile() {
        let mut shifter = BgShifter::default();
        let fetch = BgFetch {
            pattern_low: 0xAA,
            ..BgFetch::default()
        };
        shifter.prelogic(&fetch);
        assert_eq!(shifter.counter, 8);
        assert_eq!(shifter.low_feed, 0xAA);
        for _ in 0..7 {
            shifter.prelogic(&BgFetch::default());
        }
        assert_eq!(shifter.counter, 1);
        assert_eq!(shifter.low_feed, 0xAA);
    }
}
