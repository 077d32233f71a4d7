//! Full snapshot of the core for save states.

#[cfg(feature = "savestate-serde")]
use serde::{Deserialize, Serialize};

use std::ops::RangeInclusive;

use super::{
    Ppu,
    background::{BgFetch, BgShifter},
    clock::{ClockState, ScanState},
    oam_dma::OamDma,
    predictor::Prediction,
    registers::{Control, Mask, Registers, Status, VramAddr, VramRegisters},
    renderer::{OptionCache, Renderer},
    sprite::entry,
    sprite_eval::{EvalPhase, SpriteEvaluation},
    sprite_pipeline::SpriteSlot,
    vram::{Mirroring, Vram, Window},
};
use crate::{
    config::{
        Region,
        region::{CYCLES_PER_LINE, PRE_RENDER_LINE},
    },
    error::Error,
    mem_block::ppu::{OamRam, PaletteRam, PixelLine, SecondaryOamRam},
    memory::ppu as ppu_mem,
    state::{SaveState, Snapshot, SnapshotMeta},
};

#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct RegisterState {
    pub(crate) control: u8,
    pub(crate) mask: u8,
    pub(crate) status: u8,
    pub(crate) oam_addr: u8,
    pub(crate) v: u16,
    pub(crate) t: u16,
    pub(crate) fine_x: u8,
    pub(crate) write_toggle: bool,
    pub(crate) read_buffer: u8,
    pub(crate) write_buffer: u8,
}

impl RegisterState {
    fn capture(regs: &Registers) -> Self {
        Self {
            control: regs.control.bits(),
            mask: regs.mask.bits(),
            status: regs.status.bits(),
            oam_addr: regs.oam_addr,
            v: regs.vram.v.raw(),
            t: regs.vram.t.raw(),
            fine_x: regs.vram.x,
            write_toggle: regs.vram.w,
            read_buffer: regs.read_buffer,
            write_buffer: regs.write_buffer,
        }
    }

    fn restore(&self) -> Registers {
        Registers {
            control: Control::from_bits_retain(self.control),
            mask: Mask::from_bits_retain(self.mask),
            status: Status::from_bits_retain(self.status),
            oam_addr: self.oam_addr,
            vram: VramRegisters {
                v: VramAddr::new(self.v),
                t: VramAddr::new(self.t),
                x: self.fine_x & 0x07,
                w: self.write_toggle,
            },
            read_buffer: self.read_buffer,
            write_buffer: self.write_buffer,
        }
    }
}

#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RenderState {
    pub(crate) line: i16,
    pub(crate) pixel: u16,
    pub(crate) clock: u16,
    pub(crate) odd_clock: bool,
    pub(crate) background: BgShifter,
    pub(crate) bg_fetch: BgFetch,
    pub(crate) sprites: [SpriteSlot; ppu_mem::SPRITES_PER_LINE],
    pub(crate) sprite_eval: SpriteEvaluation,
    pub(crate) secondary_oam: SecondaryOamRam,
    pub(crate) sprite_count: u8,
    pub(crate) bg_pixels: PixelLine,
}

impl RenderState {
    fn capture(render: &Renderer) -> Self {
        Self {
            line: render.line,
            pixel: render.pixel,
            clock: render.clock,
            odd_clock: render.odd_clock,
            background: render.background,
            bg_fetch: render.bg_fetch,
            sprites: render.sprites,
            sprite_eval: render.sprite_eval,
            secondary_oam: render.secondary_oam.clone(),
            sprite_count: render.sprite_count,
            bg_pixels: render.bg_pixels.clone(),
        }
    }

    /// Rejects evaluator and pipeline counters the renderer would index
    /// with.
    fn check(&self) -> Result<(), Error> {
        let eval = &self.sprite_eval;
        let per_line = ppu_mem::SPRITES_PER_LINE as i64;
        // A copy in progress still has a free secondary slot.
        let eval_count = if eval.phase == EvalPhase::CopyEntry {
            0..=per_line - 1
        } else {
            0..=per_line
        };
        let step = match eval.phase {
            EvalPhase::CopyEntry => 1..=2 * entry::BYTES as i64,
            EvalPhase::Overflow => 1..=6,
            EvalPhase::Scan | EvalPhase::Done => 0..=i64::from(u8::MAX),
        };
        check_field("sprite count", self.sprite_count.into(), 0..=per_line)?;
        check_field("evaluated sprite count", eval.count.into(), eval_count)?;
        check_field("evaluation step", eval.step.into(), step)?;
        check_field(
            "evaluation sprite",
            eval.n.into(),
            // The overflow scan can step one past the last sprite.
            0..=i64::from(ppu_mem::OAM_SPRITES),
        )?;
        check_field("evaluation byte", eval.m.into(), 0..=entry::BYTES as i64 - 1)
    }

    fn restore(&self) -> Renderer {
        Renderer {
            line: self.line,
            pixel: self.pixel.min(ppu_mem::FRAME_WIDTH as u16),
            clock: self.clock,
            odd_clock: self.odd_clock,
            background: self.background,
            bg_fetch: self.bg_fetch,
            sprites: self.sprites,
            sprite_eval: self.sprite_eval,
            secondary_oam: self.secondary_oam.clone(),
            sprite_count: self.sprite_count,
            bg_pixels: self.bg_pixels.clone(),
        }
    }
}

/// Paging layout and the banks backed by writable memory.
#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MemoryState {
    pub(crate) mirroring: Mirroring,
    pub(crate) name_tables: [Window; ppu_mem::NAMETABLE_COUNT],
    pub(crate) patterns: [Window; ppu_mem::PATTERN_PAGES],
    pub(crate) background_patterns: [Window; ppu_mem::PATTERN_PAGES],
    pub(crate) sprite_patterns: [Window; ppu_mem::PATTERN_PAGES],
    /// Only the declared name-table pages.
    pub(crate) name_vram: Vec<u8>,
    /// Empty unless pattern VRAM is declared writable.
    pub(crate) pattern_vram: Vec<u8>,
    pub(crate) palette: PaletteRam,
    pub(crate) oam: OamRam,
}

/// Everything needed to resume the core exactly where it was captured.
///
/// CHR ROM and the color map's base palette belong to the host and are not
/// part of the snapshot.
#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PpuState {
    pub(crate) region: Region,
    pub(crate) clock: ClockState,
    pub(crate) scan: ScanState,
    pub(crate) prediction: Prediction,
    pub(crate) time_warp: bool,
    pub(crate) vblank_race: u8,
    pub(crate) registers: RegisterState,
    pub(crate) hblank_started: bool,
    pub(crate) force_rendering: bool,
    pub(crate) render: RenderState,
    pub(crate) dma: OamDma,
    pub(crate) options: OptionCache,
    pub(crate) frame_count: u64,
    pub(crate) memory: MemoryState,
}

impl PpuState {
    pub fn region(&self) -> Region {
        self.region
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(feature = "savestate-postcard")]
impl PpuState {
    pub fn to_postcard_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(postcard::to_stdvec(self)?)
    }

    pub fn from_postcard_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(postcard::from_bytes(bytes)?)
    }
}

fn check_field(field: &'static str, value: i64, range: RangeInclusive<i64>) -> Result<(), Error> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(Error::StateField { field, value })
    }
}

fn check_windows(
    vram: &Vram,
    bank: &'static str,
    windows: &[Window],
    vram_pages: usize,
) -> Result<(), Error> {
    for (slot, window) in windows.iter().enumerate() {
        if usize::from(window.page) >= vram.page_limit(window.source, vram_pages)? {
            return Err(Error::StateWindow {
                bank,
                slot,
                page: window.page,
            });
        }
    }
    Ok(())
}

impl MemoryState {
    fn check_windows(&self, vram: &Vram) -> Result<(), Error> {
        check_windows(vram, "name table", &self.name_tables, ppu_mem::NAMETABLE_COUNT)?;
        for (bank, windows) in [
            ("pattern", &self.patterns),
            ("background pattern", &self.background_patterns),
            ("sprite pattern", &self.sprite_patterns),
        ] {
            check_windows(vram, bank, windows, ppu_mem::PATTERN_PAGES)?;
        }
        Ok(())
    }
}

impl PpuState {
    /// Validates everything the core indexes with before any of it is
    /// applied.
    fn check(&self, vram: &Vram) -> Result<(), Error> {
        let last_line = self.region.timing().last_line;
        check_field(
            "scanline",
            self.scan.line.into(),
            i64::from(PRE_RENDER_LINE)..=i64::from(last_line),
        )?;
        check_field(
            "line timer",
            self.scan.timer.into(),
            1..=i64::from(CYCLES_PER_LINE),
        )?;
        self.render.check()?;
        self.memory.check_windows(vram)
    }
}

impl Ppu {
    fn name_bank_len(&self) -> usize {
        usize::from(self.vram.bank_usage.name_tables) * ppu_mem::PAGE_SIZE
    }

    fn pattern_bank_len(&self) -> usize {
        if self.vram.bank_usage.pattern_vram {
            ppu_mem::PATTERN_SPACE
        } else {
            0
        }
    }

    pub(crate) fn capture_state(&self) -> PpuState {
        let vram = &self.vram;
        PpuState {
            region: self.region,
            clock: self.clock,
            scan: self.scan,
            prediction: self.prediction,
            time_warp: self.time_warp,
            vblank_race: self.vblank_race,
            registers: RegisterState::capture(&self.registers),
            hblank_started: self.hblank_started,
            force_rendering: self.force_rendering,
            render: RenderState::capture(&self.renderer),
            dma: self.dma,
            options: self.options,
            frame_count: self.frame_count,
            memory: MemoryState {
                mirroring: vram.mirroring,
                name_tables: vram.name_tables,
                patterns: vram.patterns,
                background_patterns: vram.background_patterns,
                sprite_patterns: vram.sprite_patterns,
                name_vram: vram.name_vram[..self.name_bank_len()].to_vec(),
                pattern_vram: vram.pattern_vram[..self.pattern_bank_len()].to_vec(),
                palette: vram.palette.clone(),
                oam: vram.oam.clone(),
            },
        }
    }

    /// Applies `state`. Nothing changes when the bank layout does not match
    /// or when a window, counter or cursor in it is out of range.
    ///
    /// ROM windows are checked against the CHR ROM attached now, so the host
    /// attaches it before loading.
    pub(crate) fn restore_state(&mut self, state: &PpuState) -> Result<(), Error> {
        let memory = &state.memory;
        let (name_len, pattern_len) = (self.name_bank_len(), self.pattern_bank_len());
        if memory.name_vram.len() != name_len {
            return Err(Error::StateLayout {
                bank: "name table",
                expected: name_len,
                actual: memory.name_vram.len(),
            });
        }
        if memory.pattern_vram.len() != pattern_len {
            return Err(Error::StateLayout {
                bank: "pattern table",
                expected: pattern_len,
                actual: memory.pattern_vram.len(),
            });
        }
        state.check(&self.vram)?;

        self.set_region(state.region);
        self.clock = state.clock;
        self.clock.buffer %= self.timing.ppu_divider;
        self.scan = state.scan;
        self.prediction = state.prediction;
        self.time_warp = state.time_warp;
        self.vblank_race = state.vblank_race;
        self.registers = state.registers.restore();
        self.hblank_started = state.hblank_started;
        self.force_rendering = state.force_rendering;
        self.renderer = state.render.restore();
        self.dma = state.dma;
        self.options = state.options;
        self.frame_count = state.frame_count;

        let vram = &mut self.vram;
        vram.mirroring = memory.mirroring;
        vram.name_tables = memory.name_tables;
        vram.patterns = memory.patterns;
        vram.background_patterns = memory.background_patterns;
        vram.sprite_patterns = memory.sprite_patterns;
        vram.name_vram[..name_len].copy_from_slice(&memory.name_vram);
        vram.pattern_vram[..pattern_len].copy_from_slice(&memory.pattern_vram);
        vram.palette = memory.palette.clone();
        vram.oam = memory.oam.clone();

        self.color_map
            .set_emphasis(self.registers.mask.emphasis().bits() >> 5);
        Ok(())
    }
}

impl SaveState for Ppu {
    type State = PpuState;
    type Error = Error;

    fn save(&self, meta: SnapshotMeta) -> Result<Snapshot<PpuState>, Error> {
        Ok(Snapshot {
            meta: SnapshotMeta {
                format_version: Self::FORMAT_VERSION,
                ..meta
            },
            data: self.capture_state(),
        })
    }

    fn load(&mut self, snapshot: &Snapshot<PpuState>) -> Result<(), Error> {
        self.restore_state(&snapshot.data)
    }
}
