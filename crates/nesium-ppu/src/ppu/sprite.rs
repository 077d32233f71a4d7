use bitflags::bitflags;

bitflags! {
    /// Attribute bits stored in sprite byte 2.
    ///
    /// Bit layout:
    /// ```text
    /// 7 6 5 4 3 2 1 0
    /// V H P . . . p p
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "savestate-serde", derive(serde::Serialize, serde::Deserialize))]
    pub(crate) struct SpriteAttributes: u8 {
        /// Sprite palette select (0..=3).
        const PALETTE = 0b0000_0011;
        /// Drawn behind opaque background pixels.
        const PRIORITY_BEHIND_BACKGROUND = 0b0010_0000;
        const FLIP_HORIZONTAL = 0b0100_0000;
        const FLIP_VERTICAL = 0b1000_0000;
    }
}

impl SpriteAttributes {
    #[inline]
    pub(crate) fn palette(self) -> u8 {
        self.bits() & Self::PALETTE.bits()
    }
}

/// Byte offsets of a four-byte OAM entry.
pub(crate) mod entry {
    pub(crate) const Y: u8 = 0;
    pub(crate) const TILE: u8 = 1;
    pub(crate) const ATTRIBUTES: u8 = 2;
    pub(crate) const X: u8 = 3;
    pub(crate) const BYTES: usize = 4;
}

/// Row of a sprite covering `line`, counted from the top of its bitmap.
///
/// Callers have already established that `line` falls inside the sprite.
#[inline]
pub(crate) fn sprite_row(line: i32, y: u8, height: u8, attributes: SpriteAttributes) -> u16 {
    let y = i32::from(y);
    let row = if attributes.contains(SpriteAttributes::FLIP_VERTICAL) {
        y + i32::from(height) - 1 - line
    } else {
        line - y
    };
    row.clamp(0, i32::from(height) - 1) as u16
}

/// Whether `line` falls within `[y, y + height)`.
#[inline]
pub(crate) fn covers_line(line: i32, y: u8, height: u8) -> bool {
    let y = i32::from(y);
    line >= y && line < y + i32::from(height)
}
