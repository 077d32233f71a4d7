//! The 2C02 picture processing unit.
//!
//! [`Ppu`] is the whole core in one context object: register file, video
//! memory, render pipelines, OAM DMA and the catch-up clock. Every entry
//! point that can observe or change timing takes the [`PpuHost`] so the core
//! can first replay the cycles that elapsed since it last ran.

mod background;
mod clock;
mod frame_buffer;
mod oam_dma;
mod palette;
mod predictor;
mod registers;
mod renderer;
pub(crate) mod savestate;
mod sprite;
mod sprite_eval;
mod sprite_pipeline;
mod vram;

use core::fmt;

use tracing::{debug, trace, warn};

pub use frame_buffer::{FRAME_PIXELS, FrameBuffer};
pub use palette::{COLOR_COUNT, ColorMap, pack_rgb565, unpack_rgb565};
pub use registers::VramAddr;
pub use renderer::RenderOption;
pub use vram::{BankUsage, Mirroring, PageSource, PatternTargets, Window};

use crate::{
    config::{
        Region, Timing,
        region::{IDLE_LINE, LAST_VISIBLE_LINE, PRE_RENDER_LINE, VBLANK_LINE},
    },
    error::Error,
    host::{PpuHost, PredictFlags},
    memory::ppu::{self as ppu_mem, Register as PpuRegister},
};
use clock::{ClockState, ScanState};
use oam_dma::{OamDma, STALL_CPU_CYCLES};
use predictor::Prediction;
use registers::{Mask, Registers};
use renderer::{OptionCache, Renderer};
use vram::Vram;

/// Coarse phase of the raster, for presentation and debugging layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PpuStatus {
    /// Inside [`Ppu::reset`].
    Initializing,
    /// Pre-render line: sprite evaluation for line 0, no pixels.
    Evaluating,
    /// Visible line, pixels being produced.
    Rasterizing,
    /// Visible line past dot 256.
    HBlank,
    /// Visible line with both layers disabled.
    ForcedBlank,
    /// Post-render line 240.
    Idling,
    VBlank,
    Unknown,
}

/// Cycle-accurate PPU core.
#[derive(Clone)]
pub struct Ppu {
    region: Region,
    timing: Timing,
    registers: Registers,
    vram: Vram,
    renderer: Renderer,
    color_map: ColorMap,
    frame: FrameBuffer,
    dma: OamDma,
    clock: ClockState,
    scan: ScanState,
    prediction: Prediction,
    /// Set by a DMA trigger during replay; the replay re-reads the host clock.
    time_warp: bool,
    /// Non-zero on the cycle VBlank is raised (`$2002` read race).
    vblank_race: u8,
    hblank_started: bool,
    /// Draw this line even while frame skipping (sprite 0 is on it).
    force_rendering: bool,
    options: OptionCache,
    frame_count: u64,
    /// Replay nesting guard; non-zero while cycles are being processed.
    sync_depth: u32,
    initializing: u32,
}

impl fmt::Debug for Ppu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ppu")
            .field("region", &self.region)
            .field("registers", &self.registers)
            .field("scanline", &self.scan.line)
            .field("cycle", &self.scan.cycle())
            .field("odd_frame", &self.scan.odd_frame)
            .field("frame_count", &self.frame_count)
            .field("sync_depth", &self.sync_depth)
            .finish()
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new(Region::default())
    }
}

impl Ppu {
    /// Power-on state: cleared memory, 8 KiB of CHR RAM, default mirroring.
    pub fn new(region: Region) -> Self {
        Self {
            region,
            timing: region.timing(),
            registers: Registers::default(),
            vram: Vram::default(),
            renderer: Renderer::default(),
            color_map: ColorMap::default(),
            frame: FrameBuffer::new(),
            dma: OamDma::default(),
            clock: ClockState::default(),
            scan: ScanState::default(),
            prediction: Prediction::default(),
            time_warp: false,
            vblank_race: 0,
            hblank_started: false,
            force_rendering: false,
            options: OptionCache::default(),
            frame_count: 0,
            sync_depth: 0,
            initializing: 0,
        }
    }

    /// Reset line: registers, raster and pipelines go back to their initial
    /// state and the clock re-anchors to the host's current time. Memory
    /// contents survive; the paging layout returns to the defaults and both
    /// frame planes are blanked.
    pub fn reset<H: PpuHost + ?Sized>(&mut self, host: &mut H) {
        self.initializing += 1;

        self.clock = ClockState {
            counter: host.cpu_time(),
            buffer: 0,
        };
        self.scan = ScanState::default();
        self.prediction = Prediction::default();
        self.registers = Registers::default();
        self.color_map.set_emphasis(0);
        self.dma = OamDma::default();
        self.time_warp = false;
        self.vblank_race = 0;
        self.hblank_started = false;
        self.force_rendering = false;
        self.vram.reset_layout();
        self.renderer = Renderer::default();
        self.frame.clear();

        self.initializing -= 1;
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Switches the timing standard. Takes effect on the next cycle.
    pub fn set_region(&mut self, region: Region) {
        self.region = region;
        self.timing = region.timing();
        self.clock.buffer %= self.timing.ppu_divider;
        if self.scan.line > self.timing.last_line {
            self.scan.line = PRE_RENDER_LINE;
        }
    }

    /// CPU read of `$2000-$3FFF`.
    pub fn read_register<H: PpuHost + ?Sized>(&mut self, addr: u16, host: &mut H) -> u8 {
        self.synchronize(host);

        match PpuRegister::from_cpu_addr(addr) {
            PpuRegister::Status => self.registers.read_status(self.vblank_race > 0),
            PpuRegister::OamData => {
                let addr = self.registers.oam_addr;
                let data = self.vram.oam[usize::from(addr)];
                // Byte 2 has no storage for bits 2..=4.
                if addr % 4 == 2 { data & 0xE3 } else { data }
            }
            PpuRegister::Data => self.read_data(host),
            PpuRegister::Control
            | PpuRegister::Mask
            | PpuRegister::OamAddr
            | PpuRegister::Scroll
            | PpuRegister::Addr => self.registers.write_buffer,
        }
    }

    /// CPU write of `$2000-$3FFF`, or of `$4014` to start OAM DMA.
    pub fn write_register<H: PpuHost + ?Sized>(&mut self, addr: u16, data: u8, host: &mut H) {
        if addr == ppu_mem::OAM_DMA {
            self.start_oam_dma(data, host);
            return;
        }
        self.synchronize(host);
        self.registers.write_buffer = data;

        match PpuRegister::from_cpu_addr(addr) {
            PpuRegister::Control => {
                let nmi_before = self.registers.control.nmi_enabled();
                self.registers.write_control(data);
                if nmi_before != self.registers.control.nmi_enabled() {
                    self.repredict_interrupts(PredictFlags::NMI, host);
                }
                host.vram_banking_changed(self);
            }
            PpuRegister::Mask => {
                self.registers.mask = Mask::from_bits_retain(data);
                self.color_map
                    .set_emphasis(self.registers.mask.emphasis().bits() >> 5);
            }
            PpuRegister::Status => {}
            PpuRegister::OamAddr => self.registers.oam_addr = data,
            PpuRegister::OamData => {
                let addr = self.registers.oam_addr;
                self.vram.oam[usize::from(addr)] = data;
                self.registers.oam_addr = addr.wrapping_add(1);
            }
            PpuRegister::Scroll => self.registers.vram.write_scroll(data),
            PpuRegister::Addr => self.registers.vram.write_addr(data),
            PpuRegister::Data => self.write_data(data, host),
        }
    }

    fn read_data<H: PpuHost + ?Sized>(&mut self, host: &mut H) -> u8 {
        let addr = self.registers.vram.v.bus_addr();
        host.address_line(addr);
        let data = if addr <= ppu_mem::BUFFERED_READ_END {
            let buffered = self.registers.read_buffer;
            self.registers.read_buffer = self.vram.read(addr);
            buffered
        } else {
            self.vram.read(addr)
        };
        self.registers
            .vram
            .v
            .increment(self.registers.control.vram_increment());
        data
    }

    fn write_data<H: PpuHost + ?Sized>(&mut self, data: u8, host: &mut H) {
        let addr = self.registers.vram.v.bus_addr();
        host.address_line(addr);
        self.vram.write(addr, data);
        self.registers
            .vram
            .v
            .increment(self.registers.control.vram_increment());
    }

    /// `$4014`: copies CPU page `page` into OAM over the next ~1536 cycles.
    ///
    /// The CPU is stalled for 514 CPU cycles and the transfer is replayed
    /// before control returns, so code after the trigger sees the new OAM.
    pub fn start_oam_dma<H: PpuHost + ?Sized>(&mut self, page: u8, host: &mut H) {
        self.synchronize(host);
        trace!(page, oam_addr = self.registers.oam_addr, "oam dma start");
        self.dma.start(page);
        host.cpu_burn(STALL_CPU_CYCLES * self.timing.cpu_divider);
        if self.sync_depth > 0 {
            self.time_warp = true;
        } else {
            self.synchronize(host);
        }
    }

    /// Phase of the raster. Does not synchronize.
    pub fn status(&self) -> PpuStatus {
        let line = self.scan.line;
        if self.initializing > 0 {
            PpuStatus::Initializing
        } else if line == PRE_RENDER_LINE {
            PpuStatus::Evaluating
        } else if (0..=LAST_VISIBLE_LINE).contains(&line) {
            if !self.registers.mask.rendering_enabled() {
                PpuStatus::ForcedBlank
            } else if self.hblank_started {
                PpuStatus::HBlank
            } else {
                PpuStatus::Rasterizing
            }
        } else if line == IDLE_LINE {
            PpuStatus::Idling
        } else if line >= VBLANK_LINE {
            PpuStatus::VBlank
        } else {
            PpuStatus::Unknown
        }
    }

    /// Queues a render option change; it applies at the end of the frame.
    pub fn set_option(&mut self, option: RenderOption, value: bool) {
        self.options.cached.set(option, value);
    }

    /// Pending (not necessarily active) value of `option`.
    pub fn option(&self, option: RenderOption) -> bool {
        self.options.cached.get(option)
    }

    pub fn set_mirroring<H: PpuHost + ?Sized>(&mut self, mirroring: Mirroring, host: &mut H) {
        self.synchronize(host);
        self.vram.apply_mirroring(mirroring);
    }

    /// Mirroring from the integer mode used by cartridge headers.
    pub fn set_mirroring_raw<H: PpuHost + ?Sized>(
        &mut self,
        raw: u8,
        host: &mut H,
    ) -> Result<(), Error> {
        let mirroring = Mirroring::from_raw(raw).inspect_err(|err| {
            warn!("rejected mirroring: {err}");
        })?;
        self.set_mirroring(mirroring, host);
        Ok(())
    }

    pub fn mirroring(&self) -> Mirroring {
        self.vram.mirroring
    }

    /// Layout restored by [`Ppu::reset`].
    pub fn set_default_mirroring(&mut self, mirroring: Mirroring) {
        self.vram.default_mirroring = mirroring;
    }

    /// Points logical name table `table` (0..4) at a 1 KiB page.
    pub fn map_name_table<H: PpuHost + ?Sized>(
        &mut self,
        table: usize,
        source: PageSource,
        page: u16,
        writable: bool,
        host: &mut H,
    ) -> Result<(), Error> {
        self.synchronize(host);
        self.vram
            .map_name_table(table, source, page, writable)
            .inspect_err(|err| warn!("rejected name table remap: {err}"))
    }

    /// Remaps `size` bytes of pattern space at `address` for both the CPU
    /// and the renderer.
    pub fn map_pattern<H: PpuHost + ?Sized>(
        &mut self,
        address: u16,
        size: usize,
        source: PageSource,
        page: u16,
        host: &mut H,
    ) -> Result<(), Error> {
        self.synchronize(host);
        self.vram
            .map_pattern(address, size, source, page, PatternTargets::INTERNAL)
            .inspect_err(|err| warn!("rejected pattern remap: {err}"))?;
        self.vram.sync_pattern_sets();
        Ok(())
    }

    /// Remaps only the selected pattern sets, for boards that feed the
    /// background and sprites from different banks.
    pub fn map_pattern_split<H: PpuHost + ?Sized>(
        &mut self,
        address: u16,
        size: usize,
        source: PageSource,
        page: u16,
        targets: PatternTargets,
        host: &mut H,
    ) -> Result<(), Error> {
        self.synchronize(host);
        if targets.is_empty() {
            debug!(address, "pattern remap without targets ignored");
            return Ok(());
        }
        self.vram
            .map_pattern(address, size, source, page, targets)
            .inspect_err(|err| warn!("rejected pattern remap: {err}"))
    }

    /// Maps all eight pattern windows onto the internal 8 KiB of CHR RAM.
    pub fn set_8k_pattern_vram<H: PpuHost + ?Sized>(&mut self, host: &mut H) {
        self.synchronize(host);
        self.vram.map_8k_pattern_vram();
    }

    /// Attaches the cartridge's CHR ROM. Windows are not remapped.
    pub fn load_chr_rom(&mut self, rom: Vec<u8>) {
        self.vram.set_chr_rom(rom);
    }

    /// Declares which banks are backed by writable memory (and persisted).
    pub fn set_bank_usage(&mut self, usage: BankUsage) -> Result<(), Error> {
        self.vram.set_bank_usage(usage)
    }

    pub fn bank_usage(&self) -> BankUsage {
        self.vram.bank_usage
    }

    /// Current name table window `table`.
    pub fn name_table(&self, table: usize) -> Option<Window> {
        self.vram.name_tables.get(table).copied()
    }

    /// Reads the PPU bus without side effects.
    pub fn peek(&self, addr: u16) -> u8 {
        self.vram.read(addr)
    }

    /// Frame buffers; [`FrameBuffer::render`] is the last presented frame.
    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn color_map(&self) -> &ColorMap {
        &self.color_map
    }

    /// Lets the host install its own palette.
    pub fn color_map_mut(&mut self) -> &mut ColorMap {
        &mut self.color_map
    }

    pub fn oam(&self) -> &[u8] {
        self.vram.oam.as_slice()
    }

    pub fn oam_mut(&mut self) -> &mut [u8] {
        self.vram.oam.as_mut_slice()
    }

    pub fn palette(&self) -> &[u8] {
        self.vram.palette.as_slice()
    }

    pub fn scanline(&self) -> i16 {
        self.scan.line
    }

    /// Dot within the scanline, 1..=341.
    pub fn cycle(&self) -> u16 {
        self.scan.cycle()
    }

    pub fn odd_frame(&self) -> bool {
        self.scan.odd_frame
    }

    /// Completed frames since power-on.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn hblank_started(&self) -> bool {
        self.hblank_started
    }

    /// Replay nesting depth; non-zero inside mapper hooks.
    pub fn sync_depth(&self) -> u32 {
        self.sync_depth
    }

    /// Loopy `v`.
    pub fn vram_addr(&self) -> VramAddr {
        self.registers.vram.v
    }

    /// Whether an OAM DMA transfer is still running.
    pub fn oam_dma_active(&self) -> bool {
        self.dma.active()
    }
}
