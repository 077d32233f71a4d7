//! Forecasts NMI and mapper IRQ timestamps without committing any state.
//!
//! The bus driver runs the CPU in coarse slices and asks the core where the
//! next interrupts fall. The forecast walks a copy of the raster position,
//! asks the mapper's `virtual_*` hooks what would happen, and registers the
//! hits on the host's interrupt queue. A register write that moves future
//! events re-runs the forecast over what is left of the horizon.

#[cfg(feature = "savestate-serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::Ppu;
use crate::{
    config::region::{HBLANK_START, PREFETCH_START, VBLANK_LINE},
    host::{Interrupt, PpuHost, PredictFlags},
};

/// Origin and length of the last forecast, kept for re-prediction.
#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct Prediction {
    /// Master-clock position the forecast started from.
    pub(crate) timestamp: u64,
    /// Padded horizon in master clocks.
    pub(crate) cycles: u64,
}

impl Ppu {
    /// Registers every interrupt due within `horizon` master clocks from now.
    ///
    /// Previous registrations for the selected sources are cleared first. The
    /// horizon is padded so an instruction overrunning its slice still sees
    /// the event.
    pub fn predict_interrupts<H: PpuHost + ?Sized>(
        &mut self,
        horizon: u64,
        flags: PredictFlags,
        host: &mut H,
    ) {
        self.synchronize(host);

        self.prediction = Prediction {
            timestamp: self.cursor(),
            cycles: horizon + self.timing.prediction_padding(),
        };
        let cycles = self.prediction.cycles / self.timing.ppu_divider;
        if cycles == 0 {
            debug!("empty prediction horizon");
            return;
        }
        self.forecast(cycles, flags, host);
    }

    /// Re-runs the forecast over what is left of the last horizon.
    pub fn repredict_interrupts<H: PpuHost + ?Sized>(&mut self, flags: PredictFlags, host: &mut H) {
        self.synchronize(host);

        let elapsed = self.cursor().saturating_sub(self.prediction.timestamp);
        let remaining = self.prediction.cycles.saturating_sub(elapsed);
        let cycles = remaining / self.timing.ppu_divider;
        if cycles == 0 {
            return;
        }
        self.forecast(cycles, flags, host);
    }

    fn forecast<H: PpuHost + ?Sized>(&mut self, cycles: u64, flags: PredictFlags, host: &mut H) {
        if flags.is_empty() {
            return;
        }
        for kind in flags.interrupts() {
            host.cpu_clear_interrupt(kind);
        }

        let origin = self.cursor();
        let divider = self.timing.ppu_divider;
        let last_line = self.timing.last_line;
        let background = self.registers.mask.background_enabled();
        let nmi_armed = flags.contains(PredictFlags::NMI) && self.registers.control.nmi_enabled();
        let mapper = flags.contains(PredictFlags::MAPPER_IRQ);
        let mut scan = self.scan;

        host.begin_prediction();
        for current in 0..cycles {
            let mut cycle = scan.cycle();
            if scan.skips(background) {
                scan.timer -= 1;
                cycle += 1;
            }

            let (nmi, irq) = match cycle {
                1 => (
                    nmi_armed && scan.line == VBLANK_LINE,
                    mapper && host.virtual_scanline_start(scan.line),
                ),
                HBLANK_START => (false, mapper && host.virtual_hblank_start(scan.line)),
                PREFETCH_START => (false, mapper && host.virtual_prefetch_start(scan.line)),
                _ => (false, false),
            };
            if nmi || irq {
                let time = origin + current * divider;
                if nmi {
                    trace!(time, "predicted nmi");
                    host.cpu_set_interrupt(Interrupt::Nmi, time);
                }
                if irq {
                    trace!(time, line = scan.line, "predicted mapper irq");
                    host.cpu_set_interrupt(Interrupt::MapperIrq, time);
                }
            }

            if scan.tick() {
                if scan.line >= last_line {
                    scan.odd_frame = !scan.odd_frame;
                }
                scan.line = scan.next_line(last_line);
            }
        }
        host.end_prediction();
    }
}
