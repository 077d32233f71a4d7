#![allow(dead_code)]

use ctor::ctor;
use nesium_ppu::{Interrupt, Ppu, PpuHost, Region};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[ctor]
fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_file(true)
        .with_line_number(true)
        .with_max_level(Level::DEBUG)
        .pretty()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

/// Opaque tile: every pixel uses color 1.
pub const SOLID_TILE: u8 = 1;
/// Transparent tile: the pattern planes stay zero.
pub const EMPTY_TILE: u8 = 0;

/// Points in a scanline where the mapper hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapperPoint {
    ScanlineStart,
    HblankStart,
    PrefetchStart,
}

/// Bus driver stand-in: a CPU clock the test moves by hand, 64 KiB of CPU
/// memory for DMA, and an interrupt queue holding one entry per kind.
#[derive(Debug, Clone)]
pub struct ScriptedHost {
    pub time: u64,
    pub ram: Vec<u8>,
    pub pending: Vec<(Interrupt, u64)>,
    pub history: Vec<(Interrupt, u64)>,
    pub burned: u64,
    /// Whether `cpu_burn` moves the CPU clock (a stalled CPU still lets time pass).
    pub burn_moves_time: bool,
    /// Read `$2002` from the scanline hook and record `(line, ppu line, depth, data)`.
    pub probe_status_in_hook: bool,
    pub hook_probes: Vec<(i16, i16, u32, u8)>,
    /// Master clocks `advance` reported when called from the probing hook.
    pub hook_advances: Vec<u64>,
    /// The simulated mapper raises its IRQ at this point of this line.
    pub irq_at: Option<(MapperPoint, i16)>,
    /// Committed hook calls, in order.
    pub mapper_hooks: Vec<(MapperPoint, i16)>,
    /// Forecast hook calls, and how many of them ran outside a prediction.
    pub virtual_hooks: Vec<(MapperPoint, i16)>,
    pub stray_virtual_hooks: usize,
    pub predicting: bool,
    pub predictions: usize,
    /// Record `address_line` traffic between HBlank start and the prefetch.
    pub log_sprite_fetches: bool,
    pub sprite_fetches: Vec<(i16, u16)>,
    hblank_line: Option<i16>,
}

impl Default for ScriptedHost {
    fn default() -> Self {
        Self {
            time: 0,
            ram: vec![0; 0x10000],
            pending: Vec::new(),
            history: Vec::new(),
            burned: 0,
            burn_moves_time: true,
            probe_status_in_hook: false,
            hook_probes: Vec::new(),
            hook_advances: Vec::new(),
            irq_at: None,
            mapper_hooks: Vec::new(),
            virtual_hooks: Vec::new(),
            stray_virtual_hooks: 0,
            predicting: false,
            predictions: 0,
            log_sprite_fetches: false,
            sprite_fetches: Vec::new(),
            hblank_line: None,
        }
    }
}

impl ScriptedHost {
    pub fn pending(&self, kind: Interrupt) -> Option<u64> {
        self.pending
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|&(_, time)| time)
    }

    fn virtual_hook(&mut self, point: MapperPoint, line: i16) -> bool {
        if !self.predicting {
            self.stray_virtual_hooks += 1;
        }
        self.virtual_hooks.push((point, line));
        self.irq_at == Some((point, line))
    }
}

impl PpuHost for ScriptedHost {
    fn cpu_time(&self) -> u64 {
        self.time
    }

    fn cpu_read(&mut self, addr: u16) -> u8 {
        self.ram[usize::from(addr)]
    }

    fn cpu_set_interrupt(&mut self, kind: Interrupt, timestamp: u64) {
        self.pending.retain(|(k, _)| *k != kind);
        self.pending.push((kind, timestamp));
        self.history.push((kind, timestamp));
    }

    fn cpu_clear_interrupt(&mut self, kind: Interrupt) {
        self.pending.retain(|(k, _)| *k != kind);
    }

    fn cpu_burn(&mut self, cycles: u64) {
        self.burned += cycles;
        if self.burn_moves_time {
            self.time += cycles;
        }
    }

    fn scanline_start(&mut self, ppu: &mut Ppu, line: i16) {
        self.mapper_hooks.push((MapperPoint::ScanlineStart, line));
        if self.probe_status_in_hook {
            let data = ppu.read_register(0x2002, self);
            self.hook_probes
                .push((line, ppu.scanline(), ppu.sync_depth(), data));
            let consumed = ppu.advance(64, self);
            self.hook_advances.push(consumed);
        }
    }

    fn hblank_start(&mut self, _ppu: &mut Ppu, line: i16) {
        self.mapper_hooks.push((MapperPoint::HblankStart, line));
        self.hblank_line = Some(line);
    }

    fn prefetch_start(&mut self, _ppu: &mut Ppu, line: i16) {
        self.mapper_hooks.push((MapperPoint::PrefetchStart, line));
        self.hblank_line = None;
    }

    fn address_line(&mut self, addr: u16) {
        if let (true, Some(line)) = (self.log_sprite_fetches, self.hblank_line) {
            self.sprite_fetches.push((line, addr));
        }
    }

    fn begin_prediction(&mut self) {
        self.predicting = true;
        self.predictions += 1;
    }

    fn end_prediction(&mut self) {
        self.predicting = false;
    }

    fn virtual_scanline_start(&mut self, line: i16) -> bool {
        self.virtual_hook(MapperPoint::ScanlineStart, line)
    }

    fn virtual_hblank_start(&mut self, line: i16) -> bool {
        self.virtual_hook(MapperPoint::HblankStart, line)
    }

    fn virtual_prefetch_start(&mut self, line: i16) -> bool {
        self.virtual_hook(MapperPoint::PrefetchStart, line)
    }
}

pub fn powered(region: Region) -> (Ppu, ScriptedHost) {
    let mut host = ScriptedHost::default();
    let mut ppu = Ppu::new(region);
    ppu.reset(&mut host);
    (ppu, host)
}

/// Moves the CPU clock by `cycles` PPU cycles and catches the PPU up.
pub fn run_cycles(ppu: &mut Ppu, host: &mut ScriptedHost, cycles: u64) {
    host.time += cycles * ppu.timing().ppu_divider;
    ppu.synchronize(host);
}

/// Steps one PPU cycle at a time until the raster reaches `(line, cycle)`.
pub fn run_to(ppu: &mut Ppu, host: &mut ScriptedHost, line: i16, cycle: u16) {
    let limit = 2 * ppu.timing().cycles_per_frame();
    for _ in 0..limit {
        if ppu.scanline() == line && ppu.cycle() == cycle {
            return;
        }
        run_cycles(ppu, host, 1);
    }
    panic!("raster never reached line {line} cycle {cycle}");
}

/// PPU cycles until the current frame ends, stepping one cycle at a time.
pub fn frame_length(ppu: &mut Ppu, host: &mut ScriptedHost) -> u64 {
    let start = ppu.frame_count();
    let mut cycles = 0;
    while ppu.frame_count() == start {
        run_cycles(ppu, host, 1);
        cycles += 1;
    }
    cycles
}

/// Runs until `frames` more frames have ended.
pub fn run_frames(ppu: &mut Ppu, host: &mut ScriptedHost, frames: u64) {
    let target = ppu.frame_count() + frames;
    while ppu.frame_count() < target {
        run_cycles(ppu, host, 1024);
    }
}

pub fn poke(ppu: &mut Ppu, host: &mut ScriptedHost, addr: u16, data: u8) {
    ppu.write_register(0x2006, (addr >> 8) as u8, host);
    ppu.write_register(0x2006, addr as u8, host);
    ppu.write_register(0x2007, data, host);
}

/// Scene used by the render tests, written with rendering off:
/// - tile 1 opaque in pattern table 0;
/// - name table 0 filled with `bg_tile`;
/// - backdrop `$0F`, background color `$30`, sprite color `$16`;
/// - OAM hidden except for the entries in `sprites` (`[y, tile, attr, x]`).
///
/// Scroll is reset to the top-left corner; `mask` is written last.
pub fn load_scene(
    ppu: &mut Ppu,
    host: &mut ScriptedHost,
    bg_tile: u8,
    sprites: &[[u8; 4]],
    mask: u8,
) {
    ppu.write_register(0x2001, 0x00, host);
    for row in 0..8u16 {
        poke(ppu, host, u16::from(SOLID_TILE) * 16 + row, 0xFF);
    }
    ppu.write_register(0x2006, 0x20, host);
    ppu.write_register(0x2006, 0x00, host);
    for _ in 0..960 {
        ppu.write_register(0x2007, bg_tile, host);
    }
    for _ in 0..64 {
        ppu.write_register(0x2007, 0x00, host);
    }
    poke(ppu, host, 0x3F00, 0x0F);
    poke(ppu, host, 0x3F01, 0x30);
    poke(ppu, host, 0x3F11, 0x16);

    let oam = ppu.oam_mut();
    oam.fill(0xF0);
    for (slot, sprite) in sprites.iter().enumerate() {
        oam[slot * 4..slot * 4 + 4].copy_from_slice(sprite);
    }

    ppu.write_register(0x2000, 0x00, host);
    ppu.write_register(0x2005, 0x00, host);
    ppu.write_register(0x2005, 0x00, host);
    ppu.write_register(0x2001, mask, host);
}

/// Reads `$2002` at `(line, cycle)` of the current or next frame.
pub fn status_at(ppu: &mut Ppu, host: &mut ScriptedHost, line: i16, cycle: u16) -> u8 {
    run_to(ppu, host, line, cycle);
    ppu.read_register(0x2002, host)
}
