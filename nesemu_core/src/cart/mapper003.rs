use super::{Mapper, MapperState, Mirroring};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

const CHR_BANK_SIZE: usize = 0x2000;

/// 003, CNROM
///
/// 16 KB or 32 KB PRG,
/// 8 KB switchable CHR banks
#[derive(Clone, Serialize, Deserialize)]
pub struct Mapper003 {
    chr_bank: usize,

    mirroring: Mirroring,
}

impl Mapper003 {
    pub fn new(mirroring: Mirroring) -> Self {
        Self {
            chr_bank: 0,

            mirroring,
        }
    }
}

impl Mapper for Mapper003 {
    fn read_prg(&self, prg: &[u8], addr: u16) -> u8 {
        prg[(addr as usize - 0x8000) % prg.len()]
    }

    fn write_prg(&mut self, _addr: u16, data: u8) {
        self.chr_bank = data as usize;
        log::debug!("cnrom: chr bank {}", self.chr_bank);
    }

    fn chr_offset(&self, addr: u16) -> usize {
        self.chr_bank * CHR_BANK_SIZE + addr as usize
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn reset(&mut self) {
        self.chr_bank = 0;
    }

    fn state(&self) -> MapperState {
        MapperState::Cnrom(self.clone())
    }

    fn set_state(&mut self, state: MapperState) -> Result<()> {
        match state {
            MapperState::Cnrom(m) => {
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
