use crate::cart::{CartState, Cartridge};
use crate::error::{Error, Result};
use crate::ppu::{Frame, Ppu};
use serde::{Deserialize, Serialize};

pub use self::joypad::{Buttons, Joypad, Player};

mod joypad;

const RAM_SIZE: usize = 0x800;
const OAMDMA: u16 = 0x4014;

/// Everything mapped into the CPU address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cartridge,
    Ppu,
    Ram,
    Joypad,
    DmaPort,
}

impl Device {
    pub fn claims(self, addr: u16) -> bool {
        match self {
            Device::Cartridge => Cartridge::claims(addr),
            Device::Ppu => (0x2000..=0x3fff).contains(&addr),
            Device::Ram => addr <= 0x1fff,
            Device::Joypad => Joypad::claims(addr),
            Device::DmaPort => addr == OAMDMA,
        }
    }
}

/// Snapshot form of [`Bus`]. The device registry is fixed wiring and is left out.
#[derive(Serialize, Deserialize)]
pub struct BusState {
    pub(crate) ram: Box<[u8]>,
    pub(crate) ppu: Ppu,
    pub(crate) joypad: Joypad,
    pub(crate) cart: CartState,
    pub(crate) dma_request: Option<u8>,
}

#[derive(Clone)]
pub struct Bus {
    ram: Box<[u8; RAM_SIZE]>,
    ppu: Ppu,
    joypad: Joypad,
    cart: Cartridge,

    dma_request: Option<u8>,
    devices: Vec<Device>,
}

impl Bus {
    pub fn new(cart: Cartridge) -> Self {
        Self {
            ram: Box::new([0u8; RAM_SIZE]),
            ppu: Ppu::new(),
            joypad: Joypad::default(),
            cart,

            dma_request: None,
            devices: vec![
                Device::Cartridge,
                Device::Ppu,
                Device::Ram,
                Device::Joypad,
                Device::DmaPort,
            ],
        }
    }

    fn device(&self, addr: u16) -> Option<Device> {
        self.devices.iter().copied().find(|d| d.claims(addr))
    }

    pub fn read(&mut self, addr: u16) -> u8 {
        match self.device(addr) {
            Some(Device::Cartridge) => self.cart.cpu_read(addr),
            Some(Device::Ppu) => self.ppu.read_register(addr, &self.cart),
            Some(Device::Ram) => self.ram[addr as usize & (RAM_SIZE - 1)],
            Some(Device::Joypad) => self.joypad.read(addr),
            Some(Device::DmaPort) | None => 0,
        }
    }

    pub fn write(&mut self, addr: u16, data: u8) {
        match self.device(addr) {
            Some(Device::Cartridge) => self.cart.cpu_write(addr, data),
            Some(Device::Ppu) => self.ppu.write_register(addr, data, &mut self.cart),
            Some(Device::Ram) => self.ram[addr as usize & (RAM_SIZE - 1)] = data,
            Some(Device::Joypad) => self.joypad.write(addr, data),
            Some(Device::DmaPort) => self.dma_request = Some(data),
            None => {}
        }
    }

    /// Read without side effects, for tracing.
    pub fn peek(&self, addr: u16) -> u8 {
        match self.device(addr) {
            Some(Device::Cartridge) => self.cart.cpu_read(addr),
            Some(Device::Ram) => self.ram[addr as usize & (RAM_SIZE - 1)],
            Some(Device::Joypad) => self.joypad.peek(addr),
            _ => 0,
        }
    }

    /// The page written to `$4014` since the last call.
    pub fn take_dma_request(&mut self) -> Option<u8> {
        self.dma_request.take()
    }

    /// Runs one PPU dot, returns whether it raised NMI.
    pub fn tick_ppu(&mut self, frame: &mut Frame) -> bool {
        self.ppu.tick(&self.cart, frame);
        self.ppu.take_nmi()
    }

    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn ppu_mut(&mut self) -> &mut Ppu {
        &mut self.ppu
    }

    pub fn joypad(&self) -> &Joypad {
        &self.joypad
    }

    pub fn joypad_mut(&mut self) -> &mut Joypad {
        &mut self.joypad
    }

    pub fn cart(&self) -> &Cartridge {
        &self.cart
    }

    /// Installs another cartridge, the machine should be reset afterwards.
    pub fn swap_cartridge(&mut self, cart: Cartridge) -> Cartridge {
        std::mem::replace(&mut self.cart, cart)
    }

    pub fn reset(&mut self) {
        self.ppu.reset();
        self.joypad.reset();
        self.cart.reset();
        self.dma_request = None;
    }

    pub fn state(&self) -> BusState {
        BusState {
            ram: self.ram[..].into(),
            ppu: self.ppu.clone(),
            joypad: self.joypad.clone(),
            cart: self.cart.state(),
            dma_request: self.dma_request,
        }
    }

    /// Checks and installs a decoded state. May leave the bus partly updated
    /// on error, callers restore into a copy.
    pub fn set_state(&mut self, state: BusState) -> Result<()> {
        let ram =
            Box::<[u8; RAM_SIZE]>::try_from(state.ram).map_err(|_| Error::InvalidSnapshot)?;
        self.ppu.load_state(state.ppu)?;
        self.cart.set_state(state.cart)?;
        self.ram = ram;
        self.joypad = state.joypad;
        self.dma_request = state.dma_request;
        Ok(())
    }
}
