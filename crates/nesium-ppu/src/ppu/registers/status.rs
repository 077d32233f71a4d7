use bitflags::bitflags;

bitflags! {
    /// `$2002` PPUSTATUS flag bits. The low five bits read back as the last
    /// byte written to any port.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub(crate) struct Status: u8 {
        const SPRITE_OVERFLOW = 0b0010_0000;
        const SPRITE_ZERO_HIT = 0b0100_0000;
        const VERTICAL_BLANK = 0b1000_0000;
    }
}
