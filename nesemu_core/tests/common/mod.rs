#![allow(dead_code)]

use nesemu_core::Nes;

pub const RESET: u16 = 0x8000;
pub const HANDLER: u16 = 0x9000;

/// iNES image builder. PRG defaults to NOPs with the reset vector at
/// `$8000` and both interrupt vectors at an idle loop at `$9000`.
pub struct Rom {
    mapper: u8,
    flags6: u8,
    prg: Vec<u8>,
    chr: Vec<u8>,
}

impl Rom {
    pub fn nrom() -> Self {
        let mut rom = Self {
            mapper: 0,
            flags6: 0,
            prg: vec![0xea; 0x8000],
            chr: vec![0; 0x2000],
        };
        rom.vector(0xfffa, HANDLER)
            .vector(0xfffc, RESET)
            .vector(0xfffe, HANDLER);
        rom.code(HANDLER, &[0x4c, 0x00, 0x90]);
        rom
    }

    /// `banks` 16 KiB PRG banks, each filled with its own index.
    pub fn banked(mapper: u8, banks: u8, chr_banks: u8) -> Self {
        let mut prg = vec![];
        for bank in 0..banks {
            prg.extend(std::iter::repeat(bank).take(0x4000));
        }
        Self {
            mapper,
            flags6: 0,
            prg,
            chr: vec![0; chr_banks as usize * 0x2000],
        }
    }

    /// Places bytes at a CPU address in the last 32 KiB of PRG.
    pub fn code(&mut self, addr: u16, bytes: &[u8]) -> &mut Self {
        let offset = self.prg.len() - 0x8000 + (addr as usize - 0x8000);
        self.prg[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn vector(&mut self, addr: u16, target: u16) -> &mut Self {
        self.code(addr, &target.to_le_bytes())
    }

    pub fn chr(&mut self, offset: usize, bytes: &[u8]) -> &mut Self {
        self.chr[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn flags6(&mut self, flags: u8) -> &mut Self {
        self.flags6 = flags;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut data = vec![
            b'N',
            b'E',
            b'S',
            0x1a,
            (self.prg.len() / 0x4000) as u8,
            (self.chr.len() / 0x2000) as u8,
            (self.mapper << 4) | (self.flags6 & 0x0f),
            self.mapper & 0xf0,
        ];
        data.resize(0x10, 0);
        data.extend_from_slice(&self.prg);
        data.extend_from_slice(&self.chr);
        data
    }

    pub fn nes(&self) -> Nes {
        Nes::from_ines(&self.build()).unwrap()
    }
}

/// Ticks until the CPU sits at the start of an instruction.
pub fn boot(nes: &mut Nes) {
    while !nes.cpu().at_instruction_boundary() {
        nes.tick();
    }
}

/// A small game loop: polls player 1 every frame, stores the buttons at
/// `$00`, moves sprite 0 by them and tints the backdrop. Rendering is on
/// with one background tile and one sprite.
pub fn demo_rom() -> Rom {
    let mut rom = Rom::nrom();
    // tile 1 solid, tile 2 a checker
    rom.chr(0x10, &[0xff; 16]);
    rom.chr(0x20, &[0xaa, 0x55, 0xaa, 0x55, 0xaa, 0x55, 0xaa, 0x55]);

    #[rustfmt::skip]
    let reset = [
        0x78,                   // SEI
        0xa2, 0xff, 0x9a,       // LDX #$FF, TXS
        0xad, 0x02, 0x20,       // LDA $2002
        0xa9, 0x3f, 0x8d, 0x06, 0x20, 0xa9, 0x00, 0x8d, 0x06, 0x20, // $2006 = $3F00
        0xa2, 0x00,             // LDX #0
        0xbd, 0x00, 0xa0,       // palettes: LDA $A000,X
        0x8d, 0x07, 0x20,       // STA $2007
        0xe8, 0xe0, 0x20,       // INX, CPX #$20
        0xd0, 0xf5,             // BNE palettes
        0xa9, 0x20, 0x8d, 0x06, 0x20, 0xa9, 0x42, 0x8d, 0x06, 0x20, // $2006 = $2042
        0xa9, 0x01, 0x8d, 0x07, 0x20, // solid tile at (2, 2)
        0xa9, 0x02, 0x8d, 0x07, 0x20, // checker at (3, 2)
        0xa9, 0x00, 0x8d, 0x05, 0x20, 0x8d, 0x05, 0x20, // scroll 0, 0
        0xa9, 0x40, 0x85, 0x10, // sprite x at $10
        0xa9, 0x80, 0x8d, 0x00, 0x20, // PPUCTRL: NMI
        0xa9, 0x1e, 0x8d, 0x01, 0x20, // PPUMASK: show everything
        0x4c, 0x48, 0x80,       // idle: JMP idle
    ];
    rom.code(0x8000, &reset);

    #[rustfmt::skip]
    let nmi = [
        0xa9, 0x01, 0x8d, 0x16, 0x40, 0xa9, 0x00, 0x8d, 0x16, 0x40, // strobe
        0xa2, 0x08,             // LDX #8
        0xad, 0x16, 0x40,       // poll: LDA $4016
        0x4a, 0x26, 0x00,       // LSR, ROL $00
        0xca, 0xd0, 0xf7,       // DEX, BNE poll
        0xa5, 0x00, 0x29, 0x80, // LDA $00, AND #$80 (A ends up in bit 7)
        0xf0, 0x02, 0xe6, 0x10, // BEQ +2, INC $10 while A is held
        0xa9, 0x28, 0x85, 0x11, // sprite y
        0xa9, 0x01, 0x85, 0x12, // tile 1
        0xa9, 0x00, 0x85, 0x13, // attributes
        0xa5, 0x10, 0x85, 0x14, // x
        0xa9, 0x00, 0x8d, 0x03, 0x20, // OAMADDR = 0
        0xa5, 0x11, 0x8d, 0x04, 0x20, 0xa5, 0x12, 0x8d, 0x04, 0x20,
        0xa5, 0x13, 0x8d, 0x04, 0x20, 0xa5, 0x14, 0x8d, 0x04, 0x20,
        0xa9, 0x3f, 0x8d, 0x06, 0x20, 0xa9, 0x00, 0x8d, 0x06, 0x20,
        0xa5, 0x00, 0x29, 0x3f, 0x8d, 0x07, 0x20, // backdrop = buttons
        0xa9, 0x00, 0x8d, 0x05, 0x20, 0x8d, 0x05, 0x20, 0x8d, 0x06, 0x20, 0x8d, 0x06, 0x20,
        0x40,                   // RTI
    ];
    rom.code(0x9100, &nmi);
    rom.vector(0xfffa, 0x9100);

    #[rustfmt::skip]
    let palettes = [
        0x0f, 0x01, 0x11, 0x21, 0x0f, 0x06, 0x16, 0x26,
        0x0f, 0x09, 0x19, 0x29, 0x0f, 0x0c, 0x1c, 0x2c,
        0x0f, 0x14, 0x24, 0x34, 0x0f, 0x17, 0x27, 0x37,
        0x0f, 0x1a, 0x2a, 0x3a, 0x0f, 0x12, 0x22, 0x32,
    ];
    rom.code(0xa000, &palettes);
    rom
}
