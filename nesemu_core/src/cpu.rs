use crate::bus::Bus;
use addressing::{AddrMode, ADDR_MODES};
use dma::Dma;
use op_code::{OP_CYCLES, OP_FUNCS, OP_NAMES};
use serde::{Deserialize, Serialize};
use status::Status;

mod addressing;
mod dma;
mod op_code;
mod status;

const NMI_VECTOR: u16 = 0xfffa;
const RESET_VECTOR: u16 = 0xfffc;
const IRQ_VECTOR: u16 = 0xfffe;
const INTERRUPT_CYCLES: i16 = 7;

/// Register snapshot for tracing and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuRegisters {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub p: u8,
    pub cycles: u64,
}

/// 2A03 CPU core.
///
/// An instruction runs completely on the first cycle it is fetched and the
/// following ticks only burn its remaining cycles, so memory effects land on
/// the first cycle of each instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cpu {
    a: u8,
    x: u8,
    y: u8,
    pc: u16,
    sp: u8,
    p: Status,

    cycles: u64,
    cycles_until_next: i16,

    op: u8,
    op_mode: AddrMode,
    op_address: u16,
    cross_page: bool,

    nmi: bool,
    irq: bool,
    dma: Dma,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            pc: 0,
            sp: 0xfd,
            p: Status::from_bits_truncate(0x24),

            cycles: 0,
            cycles_until_next: 0,

            op: 0xea,
            op_mode: AddrMode::IMP,
            op_address: 0,
            cross_page: false,

            nmi: false,
            irq: false,
            dma: Dma::default(),
        }
    }

    /// Power-on entry: loads the reset vector with the stack left at `$FD`.
    pub fn power_on(&mut self, bus: &mut Bus) {
        *self = Self::new();
        self.pc = self.read_word(RESET_VECTOR, bus);
        self.cycles_until_next = INTERRUPT_CYCLES;
    }

    /// The reset button: S drops by three as if the CPU pushed, I is set,
    /// the reset vector is loaded and the next 7 cycles are idle.
    pub fn reset(&mut self, bus: &mut Bus) {
        self.sp = self.sp.wrapping_sub(3);
        self.p.insert(Status::IRQ_OFF);
        self.pc = self.read_word(RESET_VECTOR, bus);

        self.cycles = 0;
        self.cycles_until_next = INTERRUPT_CYCLES;
        self.nmi = false;
        self.irq = false;
        self.dma.reset();
    }

    /// Advances exactly one CPU cycle.
    pub fn tick(&mut self, bus: &mut Bus) {
        if self.dma.active() {
            self.dma.tick(bus);
        } else {
            if self.cycles_until_next <= 0 {
                if self.nmi {
                    self.nmi = false;
                    self.interrupt(NMI_VECTOR, bus);
                } else if self.irq && !self.p.contains(Status::IRQ_OFF) {
                    self.interrupt(IRQ_VECTOR, bus);
                } else {
                    self.exec(bus);
                }
            }
            self.cycles_until_next -= 1;

            if let Some(page) = bus.take_dma_request() {
                self.dma.start(self.cycles, page);
            }
        }

        self.cycles += 1;
    }

    fn exec(&mut self, bus: &mut Bus) {
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("{}", self.trace(bus));
        }

        self.op = self.fetch_byte(bus);
        self.addressing(self.op, bus);

        let base = OP_CYCLES[self.op as usize];
        self.cycles_until_next += base as i16;
        if self.cross_page
            && matches!(
                (self.op_mode, base),
                (AddrMode::ABX | AddrMode::ABY, 4) | (AddrMode::IZY, 5)
            )
        {
            self.cycles_until_next += 1;
        }

        let func = OP_FUNCS[self.op as usize];
        func(self, bus);
    }

    fn interrupt(&mut self, vector: u16, bus: &mut Bus) {
        self.push_word(self.pc, bus);
        self.push_byte(self.p.pushed(false), bus);
        self.p.insert(Status::IRQ_OFF);
        self.pc = self.read_word(vector, bus);
        self.cycles_until_next += INTERRUPT_CYCLES;
    }

    /// Latches an NMI, serviced at the next instruction boundary.
    pub fn request_nmi(&mut self) {
        self.nmi = true;
    }

    /// Level-triggered IRQ line. Mappers 0-3 never drive it.
    pub fn set_irq(&mut self, level: bool) {
        self.irq = level;
    }

    pub fn set_pc(&mut self, addr: u16) {
        self.pc = addr;
    }

    pub fn set_cycles(&mut self, cycles: u64) {
        self.cycles = cycles;
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// true when the next tick starts a new instruction or interrupt
    pub fn at_instruction_boundary(&self) -> bool {
        self.cycles_until_next <= 0 && !self.dma.active()
    }

    pub fn dma_active(&self) -> bool {
        self.dma.active()
    }

    pub fn registers(&self) -> CpuRegisters {
        CpuRegisters {
            a: self.a,
            x: self.x,
            y: self.y,
            sp: self.sp,
            pc: self.pc,
            p: self.p.bits(),
            cycles: self.cycles,
        }
    }

    /// One nestest style line for the instruction at PC, e.g.
    /// `C000  4C F5 C5  JMP  A:00 X:00 Y:00 P:24 SP:FD CYC:7`
    pub fn trace(&self, bus: &Bus) -> String {
        let op = bus.peek(self.pc) as usize;
        let len = ADDR_MODES[op].len();

        let mut bytes = format!("{:02X}", op);
        for i in 1..=len {
            bytes += &format!(" {:02X}", bus.peek(self.pc.wrapping_add(i)));
        }

        format!(
            "{:04X}  {:<8} {:>4}  A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} CYC:{}",
            self.pc,
            bytes,
            OP_NAMES[op],
            self.a,
            self.x,
            self.y,
            self.p.bits(),
            self.sp,
            self.cycles
        )
    }
}

impl Cpu {
    fn fetch_byte(&mut self, bus: &mut Bus) -> u8 {
        let b = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        b
    }

    fn fetch_word(&mut self, bus: &mut Bus) -> u16 {
        let d = self.read_word(self.pc, bus);
        self.pc = self.pc.wrapping_add(2);
        d
    }

    fn read_word(&mut self, addr: u16, bus: &mut Bus) -> u16 {
        let lb = bus.read(addr) as u16;
        let hb = bus.read(addr.wrapping_add(1)) as u16;
        (hb << 8) | lb
    }

    fn push_byte(&mut self, b: u8, bus: &mut Bus) {
        bus.write(0x100 + self.sp as u16, b);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pop_byte(&mut self, bus: &mut Bus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(0x100 + self.sp as u16)
    }

    fn push_word(&mut self, d: u16, bus: &mut Bus) {
        self.push_byte((d >> 8) as u8, bus);
        self.push_byte(d as u8, bus);
    }

    fn pop_word(&mut self, bus: &mut Bus) -> u16 {
        let lb = self.pop_byte(bus) as u16;
        let hb = self.pop_byte(bus) as u16;
        (hb << 8) | lb
    }
}
