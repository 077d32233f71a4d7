//! Catch-up synchronization and the scanline state machine.
//!
//! The core never runs ahead of the host. Elapsed master clocks are pulled
//! from [`PpuHost::cpu_time`] (or handed in through [`Ppu::advance`]),
//! converted to PPU cycles with the remainder carried over, and replayed one
//! cycle at a time.

#[cfg(feature = "savestate-serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{Ppu, registers::Status};
use crate::{
    config::region::{
        CYCLES_PER_LINE, HBLANK_START, LAST_VISIBLE_LINE, ODD_FRAME_SKIP_CYCLE, PRE_RENDER_LINE,
        PREFETCH_START, RENDER_CLOCKS, VBLANK_LINE,
    },
    host::PpuHost,
};

/// Host-time bookkeeping.
#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct ClockState {
    /// Host timestamp of the last synchronization.
    pub(crate) counter: u64,
    /// Master clocks not yet worth a whole PPU cycle; always below the divider.
    pub(crate) buffer: u64,
}

/// Position of the raster.
#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ScanState {
    pub(crate) line: i16,
    /// Cycles left in the line, counting down from 341.
    pub(crate) timer: u16,
    pub(crate) odd_frame: bool,
}

impl Default for ScanState {
    fn default() -> Self {
        Self {
            line: PRE_RENDER_LINE,
            timer: CYCLES_PER_LINE,
            odd_frame: false,
        }
    }
}

impl ScanState {
    /// Current dot, 1..=341.
    #[inline]
    pub(crate) fn cycle(&self) -> u16 {
        CYCLES_PER_LINE - self.timer + 1
    }

    /// Whether this dot is the one dropped on odd frames.
    #[inline]
    pub(crate) fn skips(&self, background: bool) -> bool {
        background
            && self.odd_frame
            && self.line == PRE_RENDER_LINE
            && self.cycle() == ODD_FRAME_SKIP_CYCLE
    }

    /// Counts one cycle off the line. Returns `true` when the line ended;
    /// the caller moves to [`ScanState::next_line`].
    #[inline]
    pub(crate) fn tick(&mut self) -> bool {
        self.timer = self.timer.saturating_sub(1);
        if self.timer == 0 {
            self.timer = CYCLES_PER_LINE;
            return true;
        }
        false
    }

    #[inline]
    pub(crate) fn next_line(&self, last_line: i16) -> i16 {
        if self.line >= last_line {
            PRE_RENDER_LINE
        } else {
            self.line + 1
        }
    }
}

impl Ppu {
    /// Catches up with the host clock.
    ///
    /// Ignored while the core is initializing or while another replay is
    /// already running (a mapper hook calling back in); the caller then sees
    /// the state as of the cycle being replayed.
    pub fn synchronize<H: PpuHost + ?Sized>(&mut self, host: &mut H) {
        if self.initializing > 0 {
            return;
        }
        if self.sync_depth > 0 {
            debug!(depth = self.sync_depth, "nested ppu synchronization ignored");
            return;
        }
        let cycles = self.elapsed_cycles(host);
        if cycles == 0 {
            return;
        }
        self.sync_depth += 1;
        self.process(cycles, host);
        self.sync_depth -= 1;
    }

    /// Replays `elapsed` master clocks explicitly, for hosts that drive the
    /// core in slices instead of through the catch-up path.
    ///
    /// Returns the master clocks actually consumed (whole PPU cycles).
    pub fn advance<H: PpuHost + ?Sized>(&mut self, elapsed: u64, host: &mut H) -> u64 {
        if self.sync_depth > 0 {
            debug!(depth = self.sync_depth, "nested ppu advance ignored");
            return 0;
        }
        self.clock.counter = host.cpu_time();
        let cycles = self.convert(elapsed);
        self.sync_depth += 1;
        let processed = self.process(cycles, host);
        self.sync_depth -= 1;
        self.clock.counter = host.cpu_time();
        processed * self.timing.ppu_divider
    }

    /// Master-clock position of the next cycle to be replayed.
    #[inline]
    pub fn cursor(&self) -> u64 {
        self.clock.counter.saturating_sub(self.clock.buffer)
    }

    /// Master clocks → whole PPU cycles, carrying the remainder.
    fn convert(&mut self, elapsed: u64) -> u64 {
        let divider = self.timing.ppu_divider;
        let total = elapsed + self.clock.buffer;
        let cycles = total / divider;
        self.clock.buffer = total - cycles * divider;
        cycles
    }

    fn elapsed_cycles<H: PpuHost + ?Sized>(&mut self, host: &mut H) -> u64 {
        let now = host.cpu_time();
        let elapsed = now.saturating_sub(self.clock.counter);
        self.clock.counter = now;
        self.convert(elapsed)
    }

    fn process<H: PpuHost + ?Sized>(&mut self, mut cycles: u64, host: &mut H) -> u64 {
        let mut current = 0;
        while current < cycles {
            self.step(host);
            current += 1;
            if self.time_warp {
                // DMA stole CPU time mid-replay; pick the stolen cycles up now.
                self.time_warp = false;
                let extra = self.elapsed_cycles(host);
                trace!(extra, "ppu time warp");
                cycles += extra;
            }
        }
        cycles
    }

    /// One PPU cycle.
    fn step<H: PpuHost + ?Sized>(&mut self, host: &mut H) {
        let mut cycle = self.scan.cycle();
        if self.scan.skips(self.registers.mask.background_enabled()) {
            self.scan.timer -= 1;
            self.renderer.tick();
            cycle += 1;
        }

        if self.dma.active() {
            self.dma
                .step(host, self.vram.oam.as_mut_slice(), &mut self.registers.oam_addr);
        }

        if cycle == 1 {
            if self.scan.line == PRE_RENDER_LINE {
                self.start_frame();
            }
            self.start_scanline(host);
        }

        let line = self.scan.line;
        if (PRE_RENDER_LINE..=LAST_VISIBLE_LINE).contains(&line) {
            self.render_clock(host);
            if line >= 0 && cycle <= RENDER_CLOCKS {
                self.render_pixel();
            }
            if cycle == HBLANK_START {
                self.hblank_started = true;
                host.hblank_start(self, line);
            } else if cycle == PREFETCH_START {
                host.prefetch_start(self, line);
            }
        }

        self.vblank_race = self.vblank_race.saturating_sub(1);

        if self.scan.tick() {
            self.end_scanline();
            if self.scan.line >= self.timing.last_line {
                self.end_frame();
            }
            self.scan.line = self.scan.next_line(self.timing.last_line);
        }
    }

    fn start_frame(&mut self) {
        if self.registers.mask.rendering_enabled() {
            self.registers.vram.reload();
        }
        self.renderer.frame();
    }

    fn start_scanline<H: PpuHost + ?Sized>(&mut self, host: &mut H) {
        let line = self.scan.line;
        if (0..=LAST_VISIBLE_LINE).contains(&line) {
            self.renderer.line(line);
            // Sprite 0 must be drawn even on skipped frames so hit timing holds.
            if self.renderer.sprite_count > 0 && self.renderer.sprites[0].index == 0 {
                self.force_rendering = true;
            }
        } else if line == VBLANK_LINE {
            self.registers.status.insert(Status::VERTICAL_BLANK);
            self.vblank_race = 1;
        }
        host.scanline_start(self, line);
    }

    fn end_scanline(&mut self) {
        let line = self.scan.line;
        if (0..=LAST_VISIBLE_LINE).contains(&line) {
            self.force_rendering = false;
        }
        self.hblank_started = false;
        if line >= self.timing.last_line {
            self.registers.status.remove(
                Status::VERTICAL_BLANK | Status::SPRITE_ZERO_HIT | Status::SPRITE_OVERFLOW,
            );
        }
    }

    fn end_frame(&mut self) {
        self.scan.odd_frame = !self.scan.odd_frame;
        if self.options.active.rendering {
            self.frame.swap();
        }
        self.options.active = self.options.cached;
        self.frame_count += 1;
    }
}
