//! Per-line render context and the dispatch into the two pipelines.

#[cfg(feature = "savestate-serde")]
use serde::{Deserialize, Serialize};

use super::{
    Ppu,
    background::{BgFetch, BgShifter},
    sprite_eval::SpriteEvaluation,
    sprite_pipeline::SpriteSlot,
};
use crate::{
    config::region::PRE_RENDER_LINE,
    host::PpuHost,
    mem_block::ppu::{PixelLine, SecondaryOamRam},
    memory::ppu as ppu_mem,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Renderer {
    pub(crate) line: i16,
    /// Next pixel column (0..=256).
    pub(crate) pixel: u16,
    /// Dot within the line, starting at 1.
    pub(crate) clock: u16,
    pub(crate) odd_clock: bool,
    pub(crate) background: BgShifter,
    pub(crate) bg_fetch: BgFetch,
    pub(crate) sprites: [SpriteSlot; ppu_mem::SPRITES_PER_LINE],
    pub(crate) sprite_eval: SpriteEvaluation,
    pub(crate) secondary_oam: SecondaryOamRam,
    /// Slots valid on this line.
    pub(crate) sprite_count: u8,
    /// Background color indices of the current line; 0 where transparent,
    /// clipped or disabled.
    pub(crate) bg_pixels: PixelLine,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            line: PRE_RENDER_LINE,
            pixel: 0,
            clock: 1,
            odd_clock: true,
            background: BgShifter::default(),
            bg_fetch: BgFetch::default(),
            sprites: [SpriteSlot::default(); ppu_mem::SPRITES_PER_LINE],
            sprite_eval: SpriteEvaluation::default(),
            secondary_oam: SecondaryOamRam::filled(0xFF),
            sprite_count: 0,
            bg_pixels: PixelLine::new(),
        }
    }
}

impl Renderer {
    fn rewind(&mut self, line: i16) {
        self.line = line;
        self.pixel = 0;
        self.clock = 1;
        self.odd_clock = true;
    }

    /// Start of the pre-render line.
    pub(crate) fn frame(&mut self) {
        self.rewind(PRE_RENDER_LINE);
        self.sprite_count = 0;
        self.background = BgShifter::default();
        self.bg_fetch = BgFetch::default();
    }

    /// Start of a visible line.
    pub(crate) fn line(&mut self, line: i16) {
        self.rewind(line);
        // Pixels clock the counter before drawing; one extra tick keeps the
        // first reload aligned with the prefetched tiles.
        self.background.counter = self.background.counter.wrapping_add(1);
        self.sprite_count = self.sprite_eval.count;
    }

    #[inline]
    pub(crate) fn tick(&mut self) {
        self.clock += 1;
        self.odd_clock = !self.odd_clock;
    }
}

/// Presentation toggles. Changes are cached and applied at the end of a frame.
#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderOption {
    /// Draw frames at all; off means frame skipping.
    Rendering,
    BackgroundLayer,
    /// Sprites drawn behind the background.
    SpriteBackLayer,
    SpriteFrontLayer,
}

#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RenderOptions {
    pub(crate) rendering: bool,
    pub(crate) background_layer: bool,
    pub(crate) sprite_back_layer: bool,
    pub(crate) sprite_front_layer: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            rendering: true,
            background_layer: true,
            sprite_back_layer: true,
            sprite_front_layer: true,
        }
    }
}

impl RenderOptions {
    pub(crate) fn get(&self, option: RenderOption) -> bool {
        match option {
            RenderOption::Rendering => self.rendering,
            RenderOption::BackgroundLayer => self.background_layer,
            RenderOption::SpriteBackLayer => self.sprite_back_layer,
            RenderOption::SpriteFrontLayer => self.sprite_front_layer,
        }
    }

    pub(crate) fn set(&mut self, option: RenderOption, value: bool) {
        let slot = match option {
            RenderOption::Rendering => &mut self.rendering,
            RenderOption::BackgroundLayer => &mut self.background_layer,
            RenderOption::SpriteBackLayer => &mut self.sprite_back_layer,
            RenderOption::SpriteFrontLayer => &mut self.sprite_front_layer,
        };
        *slot = value;
    }
}

/// Options in effect plus the pending copy the host edits.
#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct OptionCache {
    pub(crate) active: RenderOptions,
    pub(crate) cached: RenderOptions,
}

impl Ppu {
    /// Fetch work for one dot of lines -1..=239.
    pub(super) fn render_clock<H: PpuHost + ?Sized>(&mut self, host: &mut H) {
        if self.registers.mask.background_enabled() {
            self.background_clock(host);
        }
        if self.registers.mask.sprites_enabled() {
            self.sprite_clock(host);
        }
        self.renderer.tick();
    }

    /// One visible pixel (dots 1..=256 of lines 0..=239).
    pub(super) fn render_pixel(&mut self) {
        let rendering = self.options.active.rendering || self.force_rendering;
        let mask = self.registers.mask;

        if !mask.rendering_enabled() {
            self.background_pixel_stub(rendering);
        } else {
            if mask.background_enabled() {
                self.background_pixel(rendering);
            } else {
                self.background_pixel_stub(rendering);
            }
            if mask.sprites_enabled() {
                self.sprite_pixel(rendering);
            }
        }
        self.renderer.pixel += 1;
    }

    /// Writes palette entry `index` at the current raster position.
    #[inline]
    pub(super) fn put_color(&mut self, index: u8) {
        let color = self.color_map.get(index & self.registers.mask.palette_mask());
        let (x, y) = (
            usize::from(self.renderer.pixel),
            self.renderer.line.max(0) as usize,
        );
        self.frame.put(x, y, color);
    }

    #[inline]
    pub(super) fn put_backdrop(&mut self) {
        self.put_color(self.vram.backdrop());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_start_bumps_counter_and_latches_sprite_count() {
        let mut renderer = Renderer::default();
        renderer.sprite_eval.count = 5;
        renderer.background.counter = 3;
        renderer.clock = 200;
        renderer.line(12);
        assert_eq!(renderer.line, 12);
        assert_eq!(renderer.clock, 1);
        assert!(renderer.odd_clock);
        assert_eq!(renderer.background.counter, 4);
        assert_eq!(renderer.sprite_count, 5);
    }

    #[test]
    fn frame_start_clears_background_only() {
        let mut renderer = Renderer::default();
        renderer.background.latch = 0xAA;
        renderer.sprites[0].index = 9;
        renderer.sprite_count = 3;
        renderer.frame();
        assert_eq!(renderer.background, BgShifter::default());
        assert_eq!(renderer.sprite_count, 0);
        assert_eq!(renderer.sprites[0].index, 9);
        assert_eq!(renderer.line, PRE_RENDER_LINE);
    }

    #[test]
    fn options_round_trip() {
        let mut options = RenderOptions::default();
        options.set(RenderOption::SpriteBackLayer, false);
        assert!(!options.get(RenderOption::SpriteBackLayer));
        assert!(options.get(RenderOption::SpriteFrontLayer));
    }
}
