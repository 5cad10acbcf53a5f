use super::{Mapper, MapperState, Mirroring};
use crate::error::{Error, Result};
use bit_field::BitField;
use serde::{Deserialize, Serialize};

const PRG_BANK_SIZE: usize = 0x4000;
const PRG_RAM_BANK_SIZE: usize = 0x2000;
const CHR_BANK_SIZE: usize = 0x1000;
const UPPER_256K: usize = 0x40000;

/// marker bit: the shift register is full once it reaches bit 0
const SHIFTER_EMPTY: u8 = 0b1_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum PRGMode {
    Full,
    FixedFirst,
    FixedLast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum CHRMode {
    Full,
    Half,
}

/// 001, MMC1 (SxROM)
///
/// Registers are loaded serially, one bit per write to 0x8000-0xffff.
/// Boards with CHR-RAM reuse the CHR bank lines as PRG-RAM bank select and
/// as the 256 KB PRG base (SOROM, SUROM, SXROM).
#[derive(Clone, Serialize, Deserialize)]
pub struct Mapper001 {
    shifter: u8,
    prg_mode: PRGMode,
    chr_mode: CHRMode,

    prg_bank: usize,
    chr_bank0: usize,
    chr_bank1: usize,
    prg_ram_bank: usize,
    upper_256k: bool,
    chr_is_ram: bool,

    mirroring: Mirroring,
}

impl Mapper001 {
    pub fn new(mirroring: Mirroring, chr_is_ram: bool) -> Self {
        Self {
            shifter: SHIFTER_EMPTY,
            prg_mode: PRGMode::FixedLast,
            chr_mode: CHRMode::Full,

            prg_bank: 0,
            chr_bank0: 0,
            chr_bank1: 0,
            prg_ram_bank: 0,
            upper_256k: false,
            chr_is_ram,

            mirroring,
        }
    }

    fn handle_write(&mut self, addr: u16) {
        let bits = self.shifter;

        match addr.get_bits(13..15) {
            0 => {
                self.mirroring = match bits.get_bits(0..2) {
                    0b00 => Mirroring::SingleScreen0,
                    0b01 => Mirroring::SingleScreen1,
                    0b10 => Mirroring::Vertical,
                    _ => Mirroring::Horizontal,
                };
                self.prg_mode = PRGMode::from_bits(bits.get_bits(2..4));
                self.chr_mode = CHRMode::from_bits(bits.get_bit(4));
                log::debug!(
                    "mmc1: control {:05b}, {:?}, prg {:?}, chr {:?}",
                    bits,
                    self.mirroring,
                    self.prg_mode,
                    self.chr_mode
                );
            }
            1 => {
                self.chr_bank0 = bits as usize;
                self.update_board_banks(bits);
            }
            2 => {
                self.chr_bank1 = bits as usize;
                if self.chr_mode == CHRMode::Half {
                    self.update_board_banks(bits);
                }
            }
            _ => self.prg_bank = bits.get_bits(0..4) as usize,
        }
    }

    fn update_board_banks(&mut self, bits: u8) {
        if self.chr_is_ram {
            self.prg_ram_bank = bits.get_bits(2..4) as usize;
            self.upper_256k = bits.get_bit(4);
        }
    }
}

impl Mapper for Mapper001 {
    fn read_prg(&self, prg: &[u8], addr: u16) -> u8 {
        let high = addr >= 0xc000;
        let last = (prg.len() / PRG_BANK_SIZE).clamp(1, 16) - 1;

        let bank = match self.prg_mode {
            PRGMode::Full => (self.prg_bank & !1) | high as usize,
            PRGMode::FixedFirst if high => self.prg_bank,
            PRGMode::FixedFirst => 0,
            PRGMode::FixedLast if high => last,
            PRGMode::FixedLast => self.prg_bank,
        };

        let base = bank * PRG_BANK_SIZE + self.upper_256k as usize * UPPER_256K;
        prg[(base + (addr as usize & (PRG_BANK_SIZE - 1))) % prg.len()]
    }

    fn write_prg(&mut self, addr: u16, data: u8) {
        if data.get_bit(7) {
            self.shifter = SHIFTER_EMPTY;
            self.prg_mode = PRGMode::FixedLast;
        } else {
            let full = self.shifter.get_bit(0);
            self.shifter >>= 1;
            self.shifter.set_bit(4, data.get_bit(0));

            if full {
                self.handle_write(addr);
                self.shifter = SHIFTER_EMPTY;
            }
        }
    }

    fn chr_offset(&self, addr: u16) -> usize {
        let addr = addr as usize;
        match self.chr_mode {
            CHRMode::Full => (self.chr_bank0 & !1) * CHR_BANK_SIZE + addr,
            CHRMode::Half if addr < CHR_BANK_SIZE => self.chr_bank0 * CHR_BANK_SIZE + addr,
            CHRMode::Half => self.chr_bank1 * CHR_BANK_SIZE + (addr & (CHR_BANK_SIZE - 1)),
        }
    }

    fn prg_ram_offset(&self, addr: u16) -> usize {
        self.prg_ram_bank * PRG_RAM_BANK_SIZE + (addr as usize & (PRG_RAM_BANK_SIZE - 1))
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn reset(&mut self) {
        self.shifter = SHIFTER_EMPTY;
        self.prg_mode = PRGMode::FixedLast;
    }

    fn state(&self) -> MapperState {
        MapperState::Mmc1(self.clone())
    }

    fn set_state(&mut self, state: MapperState) -> Result<()> {
        match state {
            MapperState::Mmc1(m) => {
                *self = Self {
                    chr_is_ram: self.chr_is_ram,
                    ..m
                };
                Ok(())
            }
            _ => Err(Error::InvalidSnapshot),
        }
    }

    fn boxed_clone(&self) -> Box<dyn Mapper> {
        Box::new(self.clone())
    }
}

impl PRGMode {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0b00 | 0b01 => PRGMode::Full,
            0b10 => PRGMode::FixedFirst,
            _ => PRGMode::FixedLast,
        }
    }
}

impl CHRMode {
    fn from_bits(half: bool) -> Self {
        if half {
            CHRMode::Half
        } else {
            CHRMode::Full
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::ines;
    use super::super::{Cartridge, Mirroring};

    fn load(cart: &mut Cartridge, addr: u16, value: u8) {
        for i in 0..5 {
            cart.cpu_write(addr, (value >> i) & 1);
        }
    }

    #[test]
    fn test_power_on_fixes_last_bank() {
        let cart = Cartridge::from_ines(&ines(1, 8, 2, 0)).unwrap();
        assert_eq!(cart.cpu_read(0x8000), 0);
        assert_eq!(cart.cpu_read(0xc000), 7);
    }

    #[test]
    fn test_control_serial_load() {
        let mut cart = Cartridge::from_ines(&ines(1, 8, 2, 0)).unwrap();

        // 1, 1, 1, 1, 0: horizontal, fix last bank, 8 KB CHR
        for b in [1, 1, 1, 1, 0] {
            cart.cpu_write(0x8000, b);
        }
        assert_eq!(cart.mirroring(), Mirroring::Horizontal);
        assert_eq!(cart.cpu_read(0xc000), 7);

        load(&mut cart, 0xe000, 3);
        assert_eq!(cart.cpu_read(0x8000), 3);
        assert_eq!(cart.cpu_read(0xffff), 7);
    }

    #[test]
    fn test_reset_bit_restarts_shift() {
        let mut cart = Cartridge::from_ines(&ines(1, 8, 2, 0)).unwrap();
        load(&mut cart, 0x8000, 0b0_1000); // fix first bank
        load(&mut cart, 0xe000, 5);
        assert_eq!(cart.cpu_read(0x8000), 0);
        assert_eq!(cart.cpu_read(0xc000), 5);

        cart.cpu_write(0x8000, 1);
        cart.cpu_write(0x8000, 1);
        cart.cpu_write(0x8000, 0x80);
        assert_eq!(cart.cpu_read(0x8000), 5);
        assert_eq!(cart.cpu_read(0xc000), 7);

        // a full five writes are needed again after the reset
        load(&mut cart, 0xe000, 2);
        assert_eq!(cart.cpu_read(0x8000), 2);
    }

    #[test]
    fn test_prg_32k_mode() {
        let mut cart = Cartridge::from_ines(&ines(1, 8, 2, 0)).unwrap();
        load(&mut cart, 0x8000, 0b0_0010);
        load(&mut cart, 0xe000, 5);
        assert_eq!(cart.mirroring(), Mirroring::Vertical);
        assert_eq!(cart.cpu_read(0x8000), 4);
        assert_eq!(cart.cpu_read(0xc000), 5);
    }

    #[test]
    fn test_chr_modes() {
        let mut cart = Cartridge::from_ines(&ines(1, 2, 4, 0)).unwrap();
        // 8 KB mode ignores the low bit: 4 KB banks 3|1 -> 8 KB bank 1
        load(&mut cart, 0xa000, 3);
        assert_eq!(cart.ppu_read(0x0000), 0x81);
        assert_eq!(cart.ppu_read(0x1000), 0x81);

        load(&mut cart, 0x8000, 0b1_1100);
        load(&mut cart, 0xa000, 5);
        load(&mut cart, 0xc000, 0);
        assert_eq!(cart.ppu_read(0x0000), 0x82);
        assert_eq!(cart.ppu_read(0x1000), 0x80);
    }

    #[test]
    fn test_prg_ram_banks_on_chr_ram_boards() {
        let mut cart = Cartridge::from_ines(&ines(1, 8, 0, 0b0010)).unwrap();
        cart.cpu_write(0x6000, 0x11);
        load(&mut cart, 0xa000, 0b0_0100);
        assert_eq!(cart.cpu_read(0x6000), 0);
        cart.cpu_write(0x6000, 0x22);
        load(&mut cart, 0xa000, 0);
        assert_eq!(cart.cpu_read(0x6000), 0x11);
    }

    #[test]
    fn test_upper_256k() {
        let mut cart = Cartridge::from_ines(&ines(1, 32, 0, 0)).unwrap();
        assert_eq!(cart.cpu_read(0xc000), 15);
        load(&mut cart, 0xa000, 0b1_0000);
        assert_eq!(cart.cpu_read(0x8000), 16);
        assert_eq!(cart.cpu_read(0xc000), 31);
    }
}
