use core::fmt;

#[cfg(feature = "savestate-serde")]
use serde::{Deserialize, Serialize};

/// Dots in one scanline, identical across timing standards.
pub const CYCLES_PER_LINE: u16 = 341;
/// Pre-render line.
pub const PRE_RENDER_LINE: i16 = -1;
/// Last visible line.
pub const LAST_VISIBLE_LINE: i16 = 239;
/// Post-render idle line.
pub const IDLE_LINE: i16 = 240;
/// First vertical-blank line; VBlank and the NMI start here.
pub const VBLANK_LINE: i16 = 241;

/// Last dot that produces a pixel.
pub const RENDER_CLOCKS: u16 = 256;
/// First dot of horizontal blank (sprite fetches begin).
pub const HBLANK_START: u16 = 257;
/// First dot of the next-line background prefetch.
pub const PREFETCH_START: u16 = 321;
/// Last dot of the background prefetch window.
pub const PREFETCH_END: u16 = 336;
/// Dot on the pre-render line dropped on odd frames.
pub const ODD_FRAME_SKIP_CYCLE: u16 = 329;

/// Video timing standard driving the PPU.
#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Region {
    /// North American / Japanese NTSC timing.
    #[default]
    Ntsc,
    /// European PAL timing.
    Pal,
}

/// Derived constants for one timing standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timing {
    /// Master clocks per PPU cycle.
    pub ppu_divider: u64,
    /// Master clocks per CPU cycle.
    pub cpu_divider: u64,
    /// Highest scanline number before wrapping to the pre-render line.
    pub last_line: i16,
}

impl Region {
    pub const fn timing(self) -> Timing {
        match self {
            Region::Ntsc => Timing {
                ppu_divider: 4,
                cpu_divider: 12,
                last_line: 260,
            },
            Region::Pal => Timing {
                ppu_divider: 5,
                cpu_divider: 16,
                last_line: 310,
            },
        }
    }
}

impl Timing {
    /// Scanlines per frame, pre-render line included.
    pub const fn lines_per_frame(self) -> u32 {
        (self.last_line + 2) as u32
    }

    /// PPU cycles in an even frame (or any frame with background disabled).
    pub const fn cycles_per_frame(self) -> u64 {
        self.lines_per_frame() as u64 * CYCLES_PER_LINE as u64
    }

    /// Safety margin added to every prediction horizon, in master clocks.
    ///
    /// The CPU may overrun its requested slice by up to one instruction, so
    /// predictions reach eight CPU cycles plus one PPU cycle further.
    pub const fn prediction_padding(self) -> u64 {
        8 * self.cpu_divider + self.ppu_divider
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Region::Ntsc => "ntsc",
            Region::Pal => "pal",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_lengths_match_standards() {
        assert_eq!(Region::Ntsc.timing().cycles_per_frame(), 89_342);
        assert_eq!(Region::Pal.timing().cycles_per_frame(), 106_392);
    }

    #[test]
    fn display_names() {
        assert_eq!(Region::Ntsc.to_string(), "ntsc");
        assert_eq!(Region::Pal.to_string(), "pal");
    }
}
