//! System palette and the emphasis-aware color map.
//!
//! Palette RAM stores 6-bit color indices. The color map turns an index into
//! a packed RGB565 value; the `$2001` emphasis bits tint it.

/// Default 2C02 system palette as (R, G, B).
const SYSTEM_PALETTE: [(u8, u8, u8); COLOR_COUNT] = [
    (84, 84, 84),
    (0, 30, 116),
    (8, 16, 144),
    (48, 0, 136),
    (68, 0, 100),
    (92, 0, 48),
    (84, 4, 0),
    (60, 24, 0),
    (32, 42, 0),
    (8, 58, 0),
    (0, 64, 0),
    (0, 60, 0),
    (0, 50, 60),
    (0, 0, 0),
    (0, 0, 0),
    (0, 0, 0),
    (152, 150, 152),
    (8, 76, 196),
    (48, 50, 236),
    (92, 30, 228),
    (136, 20, 176),
    (160, 20, 100),
    (152, 34, 32),
    (120, 60, 0),
    (84, 90, 0),
    (40, 114, 0),
    (8, 124, 0),
    (0, 118, 40),
    (0, 102, 120),
    (0, 0, 0),
    (0, 0, 0),
    (0, 0, 0),
    (236, 238, 236),
    (76, 154, 236),
    (120, 124, 236),
    (176, 98, 236),
    (228, 84, 236),
    (236, 88, 180),
    (236, 106, 100),
    (212, 136, 32),
    (160, 170, 0),
    (116, 196, 0),
    (76, 208, 32),
    (56, 204, 108),
    (56, 180, 204),
    (60, 60, 60),
    (0, 0, 0),
    (0, 0, 0),
    (236, 238, 236),
    (168, 204, 236),
    (188, 188, 236),
    (212, 178, 236),
    (236, 174, 236),
    (236, 174, 212),
    (236, 180, 176),
    (228, 196, 144),
    (204, 210, 120),
    (180, 222, 120),
    (168, 226, 144),
    (152, 226, 180),
    (160, 214, 228),
    (160, 162, 160),
    (0, 0, 0),
    (0, 0, 0),
];

/// Number of addressable colors.
pub const COLOR_COUNT: usize = 64;

/// Packs 8-bit channels into RGB565.
#[inline]
pub const fn pack_rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}

/// Expands an RGB565 value back into 8-bit channels.
#[inline]
pub const fn unpack_rgb565(color: u16) -> (u8, u8, u8) {
    (
        ((color >> 11) << 3) as u8,
        (((color >> 5) & 0x3F) << 2) as u8,
        ((color & 0x1F) << 3) as u8,
    )
}

/// Index-to-color lookup with emphasis tinting.
///
/// `base` holds the untinted colors (the host may replace them); `map` is
/// what the renderer reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColorMap {
    base: [u16; COLOR_COUNT],
    map: [u16; COLOR_COUNT],
    emphasis: u8,
}

impl Default for ColorMap {
    fn default() -> Self {
        let mut base = [0u16; COLOR_COUNT];
        for (slot, &(r, g, b)) in base.iter_mut().zip(SYSTEM_PALETTE.iter()) {
            *slot = pack_rgb565(r, g, b);
        }
        Self {
            base,
            map: base,
            emphasis: 0,
        }
    }
}

impl ColorMap {
    #[inline]
    pub fn get(&self, index: u8) -> u16 {
        self.map[usize::from(index) & (COLOR_COUNT - 1)]
    }

    /// Untinted color for `index`.
    pub fn base(&self, index: u8) -> u16 {
        self.base[usize::from(index) & (COLOR_COUNT - 1)]
    }

    /// Replaces one color and re-applies the current emphasis to it.
    pub fn set_color(&mut self, index: u8, color: u16) {
        let index = usize::from(index) & (COLOR_COUNT - 1);
        self.base[index] = color;
        self.map[index] = tint(index, color, self.emphasis);
    }

    /// Current emphasis bits (`$2001` bits 5..7 shifted down).
    pub fn emphasis(&self) -> u8 {
        self.emphasis
    }

    /// Rebuilds the map when the emphasis bits change.
    pub(crate) fn set_emphasis(&mut self, emphasis: u8) {
        let emphasis = emphasis & 0x07;
        if emphasis == self.emphasis {
            return;
        }
        self.emphasis = emphasis;
        for (index, slot) in self.map.iter_mut().enumerate() {
            *slot = tint(index, self.base[index], emphasis);
        }
    }
}

/// Darkens the channels that are not emphasized to two thirds.
///
/// All three emphasis bits share one attenuator, so setting all of them
/// dims every channel. The black column (`$xE`, `$xF`) is left alone.
fn tint(index: usize, color: u16, emphasis: u8) -> u16 {
    if emphasis == 0 || matches!(index & 0x0F, 0x0E | 0x0F) {
        return color;
    }
    let red = emphasis & 0x01 != 0;
    let green = emphasis & 0x02 != 0;
    let blue = emphasis & 0x04 != 0;
    let darken = |channel: u8, keep: bool| {
        if keep {
            channel
        } else {
            (u16::from(channel) * 2 / 3) as u8
        }
    };
    let (r, g, b) = unpack_rgb565(color);
    pack_rgb565(
        darken(r, !(green || blue)),
        darken(g, !(red || blue)),
        darken(b, !(red || green)),
    )
}
