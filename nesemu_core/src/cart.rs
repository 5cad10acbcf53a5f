use crate::error::{Error, Result};
use bit_field::BitField;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

mod mapper000;
mod mapper001;
mod mapper002;
mod mapper003;

const INES_HEADER_SIZE: usize = 0x10;
const TRAINER_SIZE: usize = 0x200;
const PRG_ROM_BANK_SIZE: usize = 0x4000;
const CHR_ROM_BANK_SIZE: usize = 0x2000;
const PRG_RAM_SIZE: usize = 0x8000;
const CHR_RAM_SIZE: usize = 0x2000;

const MIRRORING_MAP: [[usize; 4]; 5] = [
    [0x000, 0x000, 0x400, 0x400], // Horizontal
    [0x000, 0x400, 0x000, 0x400], // Vertical
    [0x000, 0x000, 0x000, 0x000], // SingleScreen0
    [0x400, 0x400, 0x400, 0x400], // SingleScreen1
    [0x000, 0x400, 0x800, 0xc00], // FourScreen
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(usize)]
pub enum Mirroring {
    Horizontal = 0,
    Vertical = 1,
    SingleScreen0 = 2,
    SingleScreen1 = 3,
    FourScreen = 4,
}

impl Mirroring {
    /// Offset into the 4 KiB of physical nametable memory for a PPU address
    /// in `$2000-$3EFF`.
    pub fn nametable_offset(self, addr: u16) -> usize {
        let n = (addr as usize >> 10) & 0b11;
        MIRRORING_MAP[self as usize][n] + (addr as usize & 0x3ff)
    }
}

/// Banking registers of whichever mapper the cartridge uses.
#[derive(Serialize, Deserialize)]
pub enum MapperState {
    Nrom(mapper000::Mapper000),
    Mmc1(mapper001::Mapper001),
    Uxrom(mapper002::Mapper002),
    Cnrom(mapper003::Mapper003),
}

/// Everything a cartridge contributes to a snapshot. ROM is left out, the
/// fingerprint in the header already ties a snapshot to its game.
#[derive(Serialize, Deserialize)]
pub struct CartState {
    mapper: MapperState,
    prg_ram: Option<Box<[u8]>>,
    chr_ram: Option<Vec<u8>>,
}

pub struct Cartridge {
    prg_rom: Arc<[u8]>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    prg_ram: Box<[u8; PRG_RAM_SIZE]>,
    has_prg_ram: bool,

    mapper_number: u8,
    name: String,
    fingerprint: u64,

    mapper: Box<dyn Mapper>,
}

impl Cartridge {
    pub fn from_ines(data: &[u8]) -> Result<Self> {
        if data.len() < INES_HEADER_SIZE || data[..4] != [b'N', b'E', b'S', 0x1a] {
            return Err(Error::InvalidInesHeader);
        }

        let prg_banks = data[4] as usize;
        let chr_banks = data[5] as usize;
        let f6 = data[6];
        let f7 = data[7];

        if prg_banks == 0 {
            return Err(Error::InvalidInesHeader);
        }

        let has_prg_ram = f6.get_bit(1);
        let trainer = f6.get_bit(2);
        let mirroring = if f6.get_bit(3) {
            Mirroring::FourScreen
        } else if f6.get_bit(0) {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        let mapper_number = (f7 & 0xf0) | (f6 >> 4);

        let prg_offset = INES_HEADER_SIZE + trainer as usize * TRAINER_SIZE;
        let prg_len = prg_banks * PRG_ROM_BANK_SIZE;
        let prg_rom: Arc<[u8]> = data
            .get(prg_offset..prg_offset + prg_len)
            .ok_or(Error::TruncatedRom)?
            .into();

        let chr_offset = prg_offset + prg_len;
        let chr_is_ram = chr_banks == 0;
        let chr = if chr_is_ram {
            vec![0u8; CHR_RAM_SIZE]
        } else {
            let chr_len = chr_banks * CHR_ROM_BANK_SIZE;
            data.get(chr_offset..chr_offset + chr_len)
                .ok_or(Error::TruncatedRom)?
                .to_vec()
        };

        let mapper: Box<dyn Mapper> = match mapper_number {
            0 => Box::new(mapper000::Mapper000::new(mirroring)),
            1 => Box::new(mapper001::Mapper001::new(mirroring, chr_is_ram)),
            2 => Box::new(mapper002::Mapper002::new(mirroring)),
            3 => Box::new(mapper003::Mapper003::new(mirroring)),
            n => return Err(Error::UnsupportedMapper(n)),
        };

        let chr_rom: &[u8] = if chr_is_ram { &[] } else { &chr };
        let fingerprint = fnv1a(&[&prg_rom[..], chr_rom]);

        log::info!(
            "MAPPER: {:03}, PRG ROM: {} * 16KB, CHR {}: {} * 8KB, MIRRORING: {:?}, PRG RAM: {}",
            mapper_number,
            prg_banks,
            if chr_is_ram { "RAM" } else { "ROM" },
            chr_banks.max(1),
            mirroring,
            has_prg_ram,
        );
        if trainer {
            log::warn!("skipping 512 byte trainer");
        }

        Ok(Self {
            prg_rom,
            chr,
            chr_is_ram,
            prg_ram: Box::new([0u8; PRG_RAM_SIZE]),
            has_prg_ram,

            mapper_number,
            name: String::new(),
            fingerprint,

            mapper,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let mut cart = Self::from_ines(&data)?;
        cart.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(cart)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mapper_number(&self) -> u8 {
        self.mapper_number
    }

    /// FNV-1a hash over PRG-ROM and CHR-ROM, identifies the game in snapshots.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring()
    }

    pub fn claims(addr: u16) -> bool {
        addr >= 0x4020
    }

    pub fn cpu_read(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7fff if self.has_prg_ram => {
                self.prg_ram[self.mapper.prg_ram_offset(addr) % PRG_RAM_SIZE]
            }
            0x8000..=0xffff => self.mapper.read_prg(&self.prg_rom, addr),
            _ => 0,
        }
    }

    pub fn cpu_write(&mut self, addr: u16, data: u8) {
        match addr {
            0x6000..=0x7fff if self.has_prg_ram => {
                self.prg_ram[self.mapper.prg_ram_offset(addr) % PRG_RAM_SIZE] = data;
            }
            0x8000..=0xffff => self.mapper.write_prg(addr, data),
            _ => {}
        }
    }

    pub fn ppu_read(&self, addr: u16) -> u8 {
        self.chr[self.mapper.chr_offset(addr & 0x1fff) % self.chr.len()]
    }

    /// Only CHR-RAM accepts writes.
    pub fn ppu_write(&mut self, addr: u16, data: u8) {
        if self.chr_is_ram {
            let len = self.chr.len();
            self.chr[self.mapper.chr_offset(addr & 0x1fff) % len] = data;
        }
    }

    pub fn reset(&mut self) {
        self.mapper.reset();
    }

    pub(crate) fn state(&self) -> CartState {
        CartState {
            mapper: self.mapper.state(),
            prg_ram: self.has_prg_ram.then(|| self.prg_ram[..].into()),
            chr_ram: self.chr_is_ram.then(|| self.chr.clone()),
        }
    }

    /// Memories must match the board layout; nothing changes on error.
    pub(crate) fn set_state(&mut self, state: CartState) -> Result<()> {
        let prg_ram = match (state.prg_ram, self.has_prg_ram) {
            (Some(ram), true) => Some(
                Box::<[u8; PRG_RAM_SIZE]>::try_from(ram).map_err(|_| Error::InvalidSnapshot)?,
            ),
            (None, false) => None,
            _ => return Err(Error::InvalidSnapshot),
        };
        let chr_ram = match (state.chr_ram, self.chr_is_ram) {
            (Some(chr), true) if chr.len() == self.chr.len() => Some(chr),
            (None, false) => None,
            _ => return Err(Error::InvalidSnapshot),
        };

        self.mapper.set_state(state.mapper)?;
        if let Some(ram) = prg_ram {
            self.prg_ram = ram;
        }
        if let Some(chr) = chr_ram {
            self.chr = chr;
        }
        Ok(())
    }
}

impl Clone for Cartridge {
    fn clone(&self) -> Self {
        Self {
            prg_rom: self.prg_rom.clone(),
            chr: self.chr.clone(),
            chr_is_ram: self.chr_is_ram,
            prg_ram: self.prg_ram.clone(),
            has_prg_ram: self.has_prg_ram,

            mapper_number: self.mapper_number,
            name: self.name.clone(),
            fingerprint: self.fingerprint,

            mapper: self.mapper.boxed_clone(),
        }
    }
}

impl std::fmt::Debug for Cartridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cartridge")
            .field("name", &self.name)
            .field("mapper", &self.mapper_number)
            .field("prg_rom", &self.prg_rom.len())
            .field("chr", &self.chr.len())
            .field("chr_is_ram", &self.chr_is_ram)
            .field("mirroring", &self.mirroring())
            .finish()
    }
}

/// Address translation and bank registers of one mapper family.
///
/// Mappers only hold banking state, the memories stay in [`Cartridge`].
#[allow(unused_variables)]
pub trait Mapper: Send {
    /// `addr` is in `$8000-$FFFF`
    fn read_prg(&self, prg: &[u8], addr: u16) -> u8;
    fn write_prg(&mut self, addr: u16, data: u8) {}

    /// offset into CHR memory for a pattern table address in `$0000-$1FFF`
    fn chr_offset(&self, addr: u16) -> usize {
        addr as usize
    }

    /// offset into PRG-RAM for an address in `$6000-$7FFF`
    fn prg_ram_offset(&self, addr: u16) -> usize {
        (addr & 0x1fff) as usize
    }

    fn mirroring(&self) -> Mirroring;

    fn reset(&mut self) {}

    fn state(&self) -> MapperState;
    /// fails when `state` belongs to another mapper
    fn set_state(&mut self, state: MapperState) -> Result<()>;

    fn boxed_clone(&self) -> Box<dyn Mapper>;
}

fn fnv1a(chunks: &[&[u8]]) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for chunk in chunks {
        for &b in chunk.iter() {
            h ^= b as u64;
            h = h.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
    h
}
