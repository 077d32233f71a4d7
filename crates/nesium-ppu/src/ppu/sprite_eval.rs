//! Secondary-OAM builder run during dots 1..=256 of lines -1..=239.
//!
//! Dots 1..=64 fill secondary OAM with `$FF`. Dots 65..=256 scan primary OAM
//! for the next line: primary OAM is read on even dots and secondary OAM is
//! written on odd dots, so the machine suspends whenever it needs the other
//! parity. After eight hits it keeps scanning in overflow mode, where `m`
//! drifts along with `n` and the wrong bytes get compared as Y.

#[cfg(feature = "savestate-serde")]
use serde::{Deserialize, Serialize};

use super::sprite::{covers_line, entry};
use crate::memory::ppu as ppu_mem;

/// Last dot of the secondary-OAM clear.
pub(crate) const CLEAR_LAST: u16 = 64;
/// First evaluation dot.
pub(crate) const EVAL_FIRST: u16 = 65;
/// Last evaluation dot.
pub(crate) const EVAL_LAST: u16 = 256;

#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) enum EvalPhase {
    /// Copying `OAM[n]` into the next secondary slot.
    #[default]
    CopyEntry,
    /// Advancing `n` and picking the next phase.
    Scan,
    /// Eight sprites found; hunting for a ninth.
    Overflow,
    Done,
}

#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SpriteEvaluation {
    /// Primary OAM index of each copied sprite.
    pub(crate) indices: [u8; ppu_mem::SPRITES_PER_LINE],
    pub(crate) phase: EvalPhase,
    /// 1-based step inside `phase`.
    pub(crate) step: u8,
    /// Sprites copied so far (0..=8).
    pub(crate) count: u8,
    pub(crate) n: u8,
    pub(crate) m: u8,
    /// Secondary OAM writes suppressed.
    pub(crate) locked: bool,
    /// Byte in flight between the read and write halves.
    pub(crate) data: u8,
}

impl Default for SpriteEvaluation {
    fn default() -> Self {
        Self {
            indices: [0; ppu_mem::SPRITES_PER_LINE],
            phase: EvalPhase::CopyEntry,
            step: 1,
            count: 0,
            n: 0,
            m: 0,
            locked: false,
            data: 0,
        }
    }
}

/// The dot being evaluated.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EvalDot {
    pub(crate) cycle: u16,
    pub(crate) odd: bool,
    /// Line whose sprites are being gathered.
    pub(crate) target_line: i32,
    pub(crate) sprite_height: u8,
}

/// Memory the evaluator touches.
pub(crate) struct EvalMemory<'a> {
    pub(crate) oam: &'a [u8],
    /// Primary OAM cursor, visible through `$2003`/`$2004`.
    pub(crate) oam_addr: &'a mut u8,
    pub(crate) secondary: &'a mut [u8],
}

impl EvalMemory<'_> {
    fn read(&mut self, n: u8, m: u8) -> u8 {
        *self.oam_addr = (u16::from(n) * entry::BYTES as u16 + u16::from(m)) as u8;
        self.oam[usize::from(*self.oam_addr)]
    }

    fn write_secondary(&mut self, slot: u8, offset: u8, data: u8) {
        let index = usize::from(slot) * entry::BYTES + usize::from(offset);
        if let Some(byte) = self.secondary.get_mut(index) {
            *byte = data;
        }
    }
}

impl SpriteEvaluation {
    pub(crate) fn reset(&mut self) {
        *self = Self {
            indices: self.indices,
            ..Self::default()
        };
    }

    fn jump(&mut self, phase: EvalPhase) {
        self.phase = phase;
        self.step = 1;
    }

    /// Runs one dot. Returns `true` when the overflow flag should be raised.
    pub(crate) fn clock(&mut self, dot: EvalDot, mem: &mut EvalMemory<'_>) -> bool {
        if dot.cycle <= CLEAR_LAST {
            if !dot.odd && dot.cycle >= 2 {
                mem.write_secondary(0, (dot.cycle / 2 - 1) as u8, 0xFF);
            }
            return false;
        }
        if dot.cycle > EVAL_LAST {
            return false;
        }
        if dot.cycle == EVAL_FIRST {
            self.reset();
        }

        let can_read = !dot.odd;
        let can_write = dot.odd;
        let in_range = |y: u8| covers_line(dot.target_line, y, dot.sprite_height);
        let mut overflow = false;

        loop {
            match self.phase {
                EvalPhase::CopyEntry => {
                    let offset = (self.step - 1) / 2;
                    if self.step % 2 == 1 {
                        if !can_read {
                            break;
                        }
                        self.data = mem.read(self.n, offset);
                        self.step += 1;
                        continue;
                    }
                    if !can_write {
                        break;
                    }
                    if !self.locked {
                        mem.write_secondary(self.count, offset, self.data);
                    }
                    match self.step {
                        2 if !in_range(self.data) => self.jump(EvalPhase::Scan),
                        8 => {
                            self.indices[usize::from(self.count)] = self.n;
                            self.count += 1;
                            self.jump(EvalPhase::Scan);
                        }
                        _ => self.step += 1,
                    }
                }
                EvalPhase::Scan => {
                    self.n += 1;
                    if self.n >= ppu_mem::OAM_SPRITES {
                        self.n = 0;
                        self.jump(EvalPhase::Done);
                    } else if usize::from(self.count) < ppu_mem::SPRITES_PER_LINE {
                        self.jump(EvalPhase::CopyEntry);
                    } else {
                        self.locked = true;
                        self.jump(EvalPhase::Overflow);
                    }
                }
                EvalPhase::Overflow => match self.step {
                    1 => {
                        if !can_read {
                            break;
                        }
                        self.data = mem.read(self.n, self.m);
                        self.step = 2;
                    }
                    2 => {
                        if in_range(self.data) {
                            overflow = true;
                            self.step = 3;
                        } else {
                            // Hardware bug: m moves with n instead of staying at 0.
                            self.n += 1;
                            self.m = (self.m + 1) & 3;
                            if self.n >= ppu_mem::OAM_SPRITES {
                                self.n = 0;
                                self.jump(EvalPhase::Done);
                            } else {
                                self.jump(EvalPhase::Overflow);
                            }
                        }
                    }
                    3..=5 => {
                        if !can_read {
                            break;
                        }
                        self.data = mem.read(self.n, self.m);
                        self.m += 1;
                        if self.m > 3 {
                            self.m = 0;
                            self.n = self.n.wrapping_add(1);
                        }
                        self.step += 1;
                    }
                    _ => self.jump(EvalPhase::Done),
                },
                EvalPhase::Done => break,
            }
        }
        overflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem_block::ppu::{OamRam, SecondaryOamRam};

    fn run_line(oam: &OamRam, target_line: i32, height: u8) -> (SpriteEvaluation, SecondaryOamRam, bool) {
        let mut eval = SpriteEvaluation::default();
        let mut secondary = SecondaryOamRam::filled(0x00);
        let mut oam_addr = 0u8;
        let mut overflow = false;
        for cycle in 1..=EVAL_LAST {
            let dot = EvalDot {
                cycle,
                odd: cycle % 2 == 1,
                target_line,
                sprite_height: height,
            };
            let mut mem = EvalMemory {
                oam,
                oam_addr: &mut oam_addr,
                secondary: &mut secondary,
            };
            overflow |= eval.clock(dot, &mut mem);
        }
        (eval, secondary, overflow)
    }

    fn hidden_oam() -> OamRam {
        OamRam::filled(0xF0)
    }

    #[test]
    fn no_sprites_in_range() {
        let (eval, secondary, overflow) = run_line(&hidden_oam(), 40, 8);
        assert_eq!(eval.count, 0);
        assert!(!overflow);
        assert!(secondary.iter().all(|&b| b == 0xFF || b == 0xF0));
        assert_eq!(eval.phase, EvalPhase::Done);
    }

    #[test]
    fn copies_matching_entries_in_order() {
        let mut oam = hidden_oam();
        for (slot, sprite) in [3usize, 10, 42].into_iter().enumerate() {
            let base = sprite * 4;
            oam[base..base + 4].copy_from_slice(&[20, slot as u8 + 1, 0x40, 100 + slot as u8]);
        }
        let (eval, secondary, overflow) = run_line(&oam, 24, 8);
        assert_eq!(eval.count, 3);
        assert_eq!(&eval.indices[..3], &[3, 10, 42]);
        assert_eq!(&secondary[0..4], &[20, 1, 0x40, 100]);
        assert_eq!(&secondary[8..12], &[20, 3, 0x40, 102]);
        assert_eq!(secondary[12], 0xF0);
        assert!(!overflow);
    }

    #[test]
    fn ninth_sprite_sets_overflow() {
        let mut oam = hidden_oam();
        for sprite in 0..9 {
            oam[sprite * 4] = 50;
        }
        let (eval, _, overflow) = run_line(&oam, 52, 8);
        assert_eq!(eval.count, 8);
        assert!(eval.locked);
        assert!(overflow);
    }

    #[test]
    fn sixteen_pixel_sprites_widen_the_range() {
        let mut oam = hidden_oam();
        oam[0] = 100;
        let (eval, _, _) = run_line(&oam, 115, 16);
        assert_eq!(eval.count, 1);
        let (eval, _, _) = run_line(&oam, 115, 8);
        assert_eq!(eval.count, 0);
    }

    #[test]
    fn overflow_scan_reads_diagonally() {
        // Eight hits, then the Y bytes of the later sprites are out of range
        // but their tile bytes look like an in-range Y once m drifts.
        let mut oam = hidden_oam();
        for sprite in 0..8 {
            oam[sprite * 4] = 10;
        }
        for sprite in 8..64 {
            oam[sprite * 4] = 0xF0;
            oam[sprite * 4 + 1] = 10;
        }
        let (_, _, overflow) = run_line(&oam, 12, 8);
        assert!(overflow, "tile byte of sprite 9 is compared as Y");

        let mut oam = hidden_oam();
        for sprite in 0..8 {
            oam[sprite * 4] = 10;
        }
        oam[8 * 4 + 1] = 0xF0;
        oam[9 * 4] = 10;
        oam[9 * 4 + 1] = 0xF0;
        for sprite in 10..64 {
            oam[sprite * 4] = 0xF0;
        }
        let (_, _, overflow) = run_line(&oam, 12, 8);
        assert!(!overflow, "a real ninth sprite is missed when m has drifted");
    }

    #[test]
    fn random_oam_selects_first_eight_in_range() {
        use rand::Rng;

        let mut rng = rand::rng();
        for _ in 0..crate::tests::TEST_COUNT {
            let mut oam = OamRam::new();
            rng.fill(oam.as_mut_slice());
            let line = rng.random_range(0..240);
            let expected: Vec<u8> = (0..64u8)
                .filter(|&n| covers_line(line, oam[usize::from(n) * 4], 8))
                .collect();

            let (eval, secondary, overflow) = run_line(&oam, line, 8);
            let copied = expected.len().min(8);
            assert_eq!(usize::from(eval.count), copied);
            assert_eq!(&eval.indices[..copied], &expected[..copied]);
            for (slot, &n) in expected[..copied].iter().enumerate() {
                let base = usize::from(n) * 4;
                assert_eq!(&secondary[slot * 4..slot * 4 + 4], &oam[base..base + 4]);
            }
            if expected.len() < 8 {
                assert!(!overflow);
            }
        }
    }
}
