use crate::bus::Bus;
use serde::{Deserialize, Serialize};

const OAMDATA: u16 = 0x2004;

/// OAM DMA, started by a write to `$4014`.
///
/// Stalls the CPU for 513 cycles, plus one when started on an odd cycle.
/// The last 512 cycles alternate between reading the next source byte and
/// writing it to OAMDATA.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Dma {
    page: u8,
    cycles_left: u16,
    buffer: u8,
}

impl Dma {
    pub fn reset(&mut self) {
        self.cycles_left = 0;
    }

    pub fn active(&self) -> bool {
        self.cycles_left > 0
    }

    pub fn start(&mut self, cycles: u64, page: u8) {
        self.page = page;
        self.cycles_left = if cycles % 2 == 0 { 513 } else { 514 };
        log::debug!("oam dma from ${:02X}00, {} cycles", page, self.cycles_left);
    }

    pub fn tick(&mut self, bus: &mut Bus) {
        if self.cycles_left <= 512 {
            if self.cycles_left % 2 == 0 {
                let addr = ((self.page as u16) << 8) + 256 - self.cycles_left / 2;
                self.buffer = bus.read(addr);
            } else {
                bus.write(OAMDATA, self.buffer);
            }
        }
        self.cycles_left -= 1;
    }
}
