use crate::bus::{Bus, Joypad};
use crate::cart::Cartridge;
use crate::cpu::Cpu;
use crate::error::{Error, Result};
use crate::ppu::{Frame, Palette, HEIGHT, WIDTH};
use crate::state::{self, MachineState};
use std::path::Path;

/// The whole machine: CPU, bus (RAM, PPU, joypad, cartridge) and the frame
/// the PPU draws into.
#[derive(Clone)]
pub struct Nes {
    cpu: Cpu,
    bus: Bus,
    frame: Box<Frame>,
}

impl Nes {
    pub fn new(cart: Cartridge) -> Self {
        let mut bus = Bus::new(cart);
        let mut cpu = Cpu::new();
        cpu.power_on(&mut bus);

        Self {
            cpu,
            bus,
            frame: Box::new([0u32; WIDTH * HEIGHT]),
        }
    }

    pub fn from_ines(data: &[u8]) -> Result<Self> {
        Ok(Self::new(Cartridge::from_ines(data)?))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Cartridge::load(path)?))
    }

    pub fn reset(&mut self) {
        log::info!("reset");
        self.bus.reset();
        self.cpu.reset(&mut self.bus);
    }

    /// Installs `cart` and resets, returning the previous cartridge.
    pub fn swap_cartridge(&mut self, cart: Cartridge) -> Cartridge {
        log::info!("inserting cartridge {:?}", cart.name());
        let old = self.bus.swap_cartridge(cart);
        self.reset();
        old
    }

    /// Loads a ROM file and swaps it in. On error the running cartridge stays.
    pub fn load_cartridge<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let cart = Cartridge::load(path)?;
        self.swap_cartridge(cart);
        Ok(())
    }

    /// One CPU cycle: three PPU dots, then the CPU.
    pub fn tick(&mut self) {
        let mut nmi = false;
        for _ in 0..3 {
            nmi |= self.bus.tick_ppu(&mut self.frame);
        }
        if nmi {
            self.cpu.request_nmi();
        }
        self.cpu.tick(&mut self.bus);
    }

    /// Runs until the PPU enters vblank.
    pub fn run_frame(&mut self) {
        loop {
            self.tick();
            if self.bus.ppu_mut().take_frame_ready() {
                break;
            }
        }
    }

    /// Runs until the CPU is about to start its next instruction.
    pub fn step_instruction(&mut self) {
        self.tick();
        while !self.cpu.at_instruction_boundary() {
            self.tick();
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn frame_count(&self) -> u64 {
        self.bus.ppu().frame_count()
    }

    pub fn joypad(&self) -> &Joypad {
        self.bus.joypad()
    }

    pub fn joypad_mut(&mut self) -> &mut Joypad {
        self.bus.joypad_mut()
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.bus.ppu_mut().set_palette(palette);
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    pub fn cart(&self) -> &Cartridge {
        self.bus.cart()
    }

    /// nestest style line for the instruction at PC
    pub fn trace(&self) -> String {
        self.cpu.trace(&self.bus)
    }

    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let state = MachineState {
            cpu: self.cpu.clone(),
            bus: self.bus.state(),
        };
        state::encode(self.bus.cart().fingerprint(), &state)
    }

    /// Restores a snapshot taken with the same cartridge. On error the
    /// machine is left untouched.
    pub fn restore(&mut self, data: &[u8]) -> Result<()> {
        let (fingerprint, body) = state::read_header(data)?;
        if fingerprint != self.bus.cart().fingerprint() {
            return Err(Error::CartridgeMismatch);
        }
        let state = state::decode(body)?;

        let mut bus = self.bus.clone();
        bus.set_state(state.bus)?;
        self.cpu = state.cpu;
        self.bus = bus;
        Ok(())
    }
}

impl std::fmt::Debug for Nes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Nes")
            .field("cpu", &self.cpu)
            .field("cart", self.bus.cart())
            .finish()
    }
}
