#![allow(clippy::identity_op)]

pub mod bus;
pub mod cart;
pub mod cpu;
mod error;
pub mod netplay;
mod nes;
pub mod ppu;
pub mod state;

pub use bus::{Bus, Buttons, Joypad, Player};
pub use cart::{Cartridge, Mirroring};
pub use cpu::{Cpu, CpuRegisters};
pub use error::{Error, Result};
pub use nes::Nes;
pub use ppu::{Frame, Palette, Ppu, HEIGHT, WIDTH};

/// NES NTSC
pub const MASTER_CLOCK: f64 = 21_477_272.0;

/// cpu frequency
pub const CPU_FREQUENCY: f64 = MASTER_CLOCK / 12.0;
