use super::{Mapper, MapperState, Mirroring};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

const BANK_SIZE: usize = 0x4000;

/// 002, UxROM
///
/// 0x8000-0xbfff: 16 KB switchable PRG banks,
/// 0xc000-0xffff: 16 KB PRG bank (fixed to the last bank),
/// 8 KB CHR
#[derive(Clone, Serialize, Deserialize)]
pub struct Mapper002 {
    prg_bank: usize,

    mirroring: Mirroring,
}

impl Mapper002 {
    pub fn new(mirroring: Mirroring) -> Self {
        Self {
            prg_bank: 0,

            mirroring,
        }
    }
}

impl Mapper for Mapper002 {
    fn read_prg(&self, prg: &[u8], addr: u16) -> u8 {
        let base = match addr {
            0x8000..=0xbfff => self.prg_bank * BANK_SIZE,
            _ => prg.len() - BANK_SIZE,
        };
        prg[(base + (addr as usize & (BANK_SIZE - 1))) % prg.len()]
    }

    fn write_prg(&mut self, _addr: u16, data: u8) {
        self.prg_bank = data as usize;
        log::debug!("uxrom: prg bank {}", self.prg_bank);
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
    }

    fn state(&self) -> MapperState {
        MapperState::Uxrom(self.clone())
    }

    fn set_state(&mut self, state: MapperState) -> Result<()> {
        match state {
            MapperState::Uxrom(m) => {
                *self = m;
                Ok(())
            }
            _ => Err(Error::InvalidSnapshot),
        }
    }

    fn boxed_clone(&self) -> Box<dyn Mapper> {
        Box::new(self.clone())
    }
}
