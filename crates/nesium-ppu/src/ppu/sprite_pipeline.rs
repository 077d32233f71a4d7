//! Sprite fetches (dots 257..=320) and the per-pixel sprite multiplexer.

#[cfg(feature = "savestate-serde")]
use serde::{Deserialize, Serialize};

use super::{
    Ppu,
    registers::Status,
    sprite::{SpriteAttributes, entry, sprite_row},
    sprite_eval::{EVAL_LAST, EvalDot, EvalMemory},
};
use crate::{config::region::HBLANK_START, host::PpuHost, memory::ppu as ppu_mem};

const BYTES_PER_TILE: u16 = 16;
const PLANE_OFFSET: u16 = 8;
/// Last sprite fetch dot.
const FETCH_LAST: u16 = 320;
/// 8x16 sprites take their table from tile bit 0.
const TALL_BANK_BIT: u8 = 0x01;

/// One of the eight per-line sprite output units.
#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SpriteSlot {
    /// Primary OAM index, kept for the sprite-0 hit test.
    pub(crate) index: u8,
    pub(crate) low: u8,
    pub(crate) high: u8,
    pub(crate) attributes: SpriteAttributes,
    /// Pixels until the sprite starts shifting out.
    pub(crate) counter: u8,
    /// Nothing left to draw on this line.
    pub(crate) dead: bool,
}

impl Default for SpriteSlot {
    fn default() -> Self {
        Self {
            index: 0,
            low: 0,
            high: 0,
            attributes: SpriteAttributes::empty(),
            counter: 0,
            dead: true,
        }
    }
}

impl SpriteSlot {
    /// Emits the next 2-bit pixel once the X counter has run out.
    ///
    /// Returns `None` while the sprite is still waiting or already dead.
    #[inline]
    fn shift_out(&mut self) -> Option<u8> {
        if self.dead {
            return None;
        }
        if self.counter > 0 {
            self.counter -= 1;
            return None;
        }
        let pixel = if self.attributes.contains(SpriteAttributes::FLIP_HORIZONTAL) {
            let pixel = (self.low & 0x01) | ((self.high & 0x01) << 1);
            self.low >>= 1;
            self.high >>= 1;
            pixel
        } else {
            let pixel = (self.low >> 7) | ((self.high >> 7) << 1);
            self.low <<= 1;
            self.high <<= 1;
            pixel
        };
        if self.low | self.high == 0 {
            self.dead = true;
        }
        Some(pixel)
    }
}

/// Fetch slot for dot `cycle` of the 257..=320 window: `(slot, step 1..=4)`.
#[inline]
fn fetch_position(cycle: u16) -> (usize, u8) {
    let position = cycle - HBLANK_START;
    let slot = position / 8;
    let step = (position - slot * 8) / 2 + 1;
    (usize::from(slot), step as u8)
}

impl Ppu {
    /// Sprite work for one dot of lines -1..=239.
    pub(super) fn sprite_clock<H: PpuHost + ?Sized>(&mut self, host: &mut H) {
        let cycle = self.renderer.clock;
        if cycle <= EVAL_LAST {
            let dot = EvalDot {
                cycle,
                odd: self.renderer.odd_clock,
                target_line: i32::from(self.renderer.line) + 1,
                sprite_height: self.registers.control.sprite_height(),
            };
            let mut mem = EvalMemory {
                oam: &self.vram.oam,
                oam_addr: &mut self.registers.oam_addr,
                secondary: &mut self.renderer.secondary_oam,
            };
            if self.renderer.sprite_eval.clock(dot, &mut mem) {
                self.registers.status.insert(Status::SPRITE_OVERFLOW);
            }
        } else if cycle <= FETCH_LAST {
            self.sprite_fetch(cycle, host);
        }
    }

    fn sprite_fetch<H: PpuHost + ?Sized>(&mut self, cycle: u16, host: &mut H) {
        if cycle == HBLANK_START {
            self.renderer.sprites = [SpriteSlot::default(); ppu_mem::SPRITES_PER_LINE];
            self.renderer.sprite_count = 0;
        }
        if self.renderer.odd_clock {
            return;
        }

        let (slot_index, step) = fetch_position(cycle);
        let base = slot_index * entry::BYTES;
        let secondary = &self.renderer.secondary_oam;
        let (y, tile, attributes, x) = (
            secondary[base + usize::from(entry::Y)],
            secondary[base + usize::from(entry::TILE)],
            SpriteAttributes::from_bits_retain(secondary[base + usize::from(entry::ATTRIBUTES)]),
            secondary[base + usize::from(entry::X)],
        );
        let count = self.renderer.sprite_eval.count;
        let slot = &mut self.renderer.sprites[slot_index];
        slot.index = self.renderer.sprite_eval.indices[slot_index];

        match step {
            1 | 2 => {
                if step == 1 {
                    slot.attributes = attributes;
                    slot.counter = x;
                }
                // Garbage name-table fetches, visible only on the address lines.
                host.address_line(ppu_mem::NAMETABLE_BASE + self.registers.vram.v.tile_offset());
            }
            _ if slot_index >= usize::from(count) => {
                // Empty slots fetch tile $FF and stay transparent.
                let mut addr = ppu_mem::DUMMY_SPRITE_TILE * BYTES_PER_TILE
                    + self.registers.control.sprite_tileset();
                if step == 4 {
                    addr += PLANE_OFFSET;
                }
                host.address_line(addr & (ppu_mem::PATTERN_SPACE as u16 - 1));
            }
            _ => {
                let height = self.registers.control.sprite_height();
                let mut addr = if height == 8 {
                    u16::from(tile) * BYTES_PER_TILE + self.registers.control.sprite_tileset()
                } else {
                    let bank = if tile & TALL_BANK_BIT != 0 {
                        ppu_mem::PATTERN_TABLE_1
                    } else {
                        0
                    };
                    u16::from(tile & !TALL_BANK_BIT) * BYTES_PER_TILE + bank
                };
                let line = i32::from(self.renderer.line) + 1;
                let mut row = sprite_row(line, y, height, slot.attributes);
                if row >= 8 {
                    addr += BYTES_PER_TILE;
                    row -= 8;
                }
                addr += row;
                if step == 4 {
                    addr += PLANE_OFFSET;
                }
                let addr = addr & (ppu_mem::PATTERN_SPACE as u16 - 1);
                host.address_line(addr);
                let data = self.vram.sprite_pattern(addr);
                if step == 3 {
                    slot.low = data;
                } else {
                    slot.high = data;
                }
                if slot.low | slot.high != 0 {
                    slot.dead = false;
                }
            }
        }
    }

    /// Sprite half of a visible pixel; runs after the background half.
    pub(super) fn sprite_pixel(&mut self, rendering: bool) {
        let count = usize::from(self.renderer.sprite_count).min(ppu_mem::SPRITES_PER_LINE);

        if !rendering {
            for slot in &mut self.renderer.sprites[..count] {
                slot.shift_out();
            }
            return;
        }

        let x = usize::from(self.renderer.pixel);
        let clip = x < 8 && self.registers.mask.clip_sprites();
        let bg_pixel = self.renderer.bg_pixels[x];
        let mut locked = false;

        for i in 0..count {
            let slot = &mut self.renderer.sprites[i];
            if locked {
                slot.shift_out();
                continue;
            }
            let Some(pixel) = slot.shift_out() else {
                continue;
            };
            if pixel == 0 {
                continue;
            }
            // Only the front-most opaque sprite reaches the multiplexer.
            locked = true;
            if clip {
                continue;
            }
            let (index, attributes) = (slot.index, slot.attributes);

            if i == 0
                && index == 0
                && bg_pixel != 0
                && !self.registers.status.contains(Status::SPRITE_ZERO_HIT)
            {
                self.registers.status.insert(Status::SPRITE_ZERO_HIT);
            }

            let layer_on = if attributes.contains(SpriteAttributes::PRIORITY_BEHIND_BACKGROUND) {
                bg_pixel == 0 && self.options.active.sprite_back_layer
            } else {
                self.options.active.sprite_front_layer
            };
            if !layer_on {
                continue;
            }
            let color = self.vram.sprite_color(attributes.palette(), pixel);
            self.put_color(color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_positions_cover_eight_slots() {
        assert_eq!(fetch_position(257), (0, 1));
        assert_eq!(fetch_position(258), (0, 1));
        assert_eq!(fetch_position(262), (0, 3));
        assert_eq!(fetch_position(264), (0, 4));
        assert_eq!(fetch_position(266), (1, 1));
        assert_eq!(fetch_position(320), (7, 4));
    }

    #[test]
    fn counter_delays_then_shifts_msb_first() {
        let mut slot = SpriteSlot {
            low: 0b1000_0001,
            high: 0b1000_0000,
            counter: 2,
            dead: false,
            ..SpriteSlot::default()
        };
        assert_eq!(slot.shift_out(), None);
        assert_eq!(slot.shift_out(), None);
        assert_eq!(slot.shift_out(), Some(3));
        for _ in 0..6 {
            assert_eq!(slot.shift_out(), Some(0));
        }
        assert_eq!(slot.shift_out(), Some(1));
        assert!(slot.dead);
        assert_eq!(slot.shift_out(), None);
    }

    #[test]
    fn horizontal_flip_shifts_lsb_first() {
        let mut slot = SpriteSlot {
            low: 0b0000_0010,
            high: 0b0000_0001,
            attributes: SpriteAttributes::FLIP_HORIZONTAL,
            dead: false,
            ..SpriteSlot::default()
        };
        assert_eq!(slot.shift_out(), Some(2));
        assert_eq!(slot.shift_out(), Some(1));
        assert!(slot.dead);
    }
}
