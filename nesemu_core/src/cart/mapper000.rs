use super::{Mapper, MapperState, Mirroring};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// 000, NROM
///
/// 16 KB (mirrored) or 32 KB PRG, 8 KB CHR, no registers
#[derive(Clone, Serialize, Deserialize)]
pub struct Mapper000 {
    mirroring: Mirroring,
}

impl Mapper000 {
    pub fn new(mirroring: Mirroring) -> Self {
        Self { mirroring }
    }
}

impl Mapper for Mapper000 {
    fn read_prg(&self, prg: &[u8], addr: u16) -> u8 {
        prg[(addr as usize - 0x8000) % prg.len()]
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn state(&self) -> MapperState {
        MapperState::Nrom(self.clone())
    }

    fn set_state(&mut self, state: MapperState) -> Result<()> {
        match state {
            MapperState::Nrom(m) => {
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
