use bitflags::bitflags;

bitflags! {
    /// `$2001` PPUMASK.
    ///
    /// ```text
    /// 7 6 5 4 3 2 1 0
    /// B G R S b s l g
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub(crate) struct Mask: u8 {
        const GRAYSCALE = 0b0000_0001;
        /// Background visible in columns 0..=7.
        const SHOW_BACKGROUND_LEFT = 0b0000_0010;
        /// Sprites visible in columns 0..=7.
        const SHOW_SPRITES_LEFT = 0b0000_0100;
        const SHOW_BACKGROUND = 0b0000_1000;
        const SHOW_SPRITES = 0b0001_0000;
        const EMPHASIZE_RED = 0b0010_0000;
        const EMPHASIZE_GREEN = 0b0100_0000;
        const EMPHASIZE_BLUE = 0b1000_0000;
        const EMPHASIS = 0b1110_0000;
    }
}

impl Mask {
    pub(crate) fn background_enabled(self) -> bool {
        self.contains(Mask::SHOW_BACKGROUND)
    }

    pub(crate) fn sprites_enabled(self) -> bool {
        self.contains(Mask::SHOW_SPRITES)
    }

    /// Either layer enabled; the pipelines run only while this holds.
    pub(crate) fn rendering_enabled(self) -> bool {
        self.intersects(Mask::SHOW_BACKGROUND | Mask::SHOW_SPRITES)
    }

    pub(crate) fn clip_background(self) -> bool {
        !self.contains(Mask::SHOW_BACKGROUND_LEFT)
    }

    pub(crate) fn clip_sprites(self) -> bool {
        !self.contains(Mask::SHOW_SPRITES_LEFT)
    }

    /// Index mask applied to palette lookups (`0x30` forces grayscale).
    pub(crate) fn palette_mask(self) -> u8 {
        if self.contains(Mask::GRAYSCALE) {
            0x30
        } else {
            0x3F
        }
    }

    pub(crate) fn emphasis(self) -> Mask {
        self & Mask::EMPHASIS
    }
}
