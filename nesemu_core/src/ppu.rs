use self::regs::*;
use crate::cart::Cartridge;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

pub use self::palettes::{Palette, NTSC_PALETTE};

mod palettes;
mod regs;
mod render;

pub const WIDTH: usize = 256;
pub const HEIGHT: usize = 240;

/// ARGB pixels, row major
pub type Frame = [u32; WIDTH * HEIGHT];

const OAM_SIZE: usize = 0x100;
const SECONDARY_OAM_SIZE: usize = 0x20;
const NAMETABLE_SIZE: usize = 0x1000;
const PALETTES_SIZE: usize = 0x20;

const PRE_RENDER_LINE: i16 = -1;
const VBLANK_LINE: i16 = 241;
const LAST_LINE: i16 = 260;
const DOTS_PER_LINE: u16 = 341;

/// One of the eight sprites fetched for the next scanline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct SpriteSlot {
    lo: u8,
    hi: u8,
    attr: u8,
    /// dots left until the sprite starts shifting out
    x: u8,
}

impl Default for SpriteSlot {
    fn default() -> Self {
        Self {
            lo: 0,
            hi: 0,
            attr: 0,
            x: 0xff,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Ppu {
    nametables: Box<[u8]>,
    palettes: [u8; PALETTES_SIZE],
    oam: Box<[u8]>,
    secondary_oam: [u8; SECONDARY_OAM_SIZE],
    secondary_count: usize,

    ctrl: PpuCtrl,
    mask: PpuMask,
    status: PpuStatus,
    oam_addr: u8,
    data_buf: u8,

    v: VramAddr,
    t: VramAddr,
    x: u16,
    w: bool,

    scanline: i16,
    dot: u16,
    frame_count: u64,
    frame_ready: bool,
    nmi: bool,

    bg_patterns: ShiftReg,
    bg_attrs: ShiftReg,
    next_tile: u8,
    next_attr: u8,
    next_lo: u8,
    next_hi: u8,

    sprites: [SpriteSlot; 8],
    sprite0_next: bool,
    sprite0_in_line: bool,

    /// host configuration, not machine state
    #[serde(skip)]
    palette: Palette,
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            nametables: vec![0u8; NAMETABLE_SIZE].into_boxed_slice(),
            palettes: [0u8; PALETTES_SIZE],
            oam: vec![0u8; OAM_SIZE].into_boxed_slice(),
            secondary_oam: [0xff; SECONDARY_OAM_SIZE],
            secondary_count: 0,

            ctrl: PpuCtrl::default(),
            mask: PpuMask::default(),
            status: PpuStatus::default(),
            oam_addr: 0,
            data_buf: 0,

            v: VramAddr::default(),
            t: VramAddr::default(),
            x: 0,
            w: false,

            scanline: PRE_RENDER_LINE,
            dot: 0,
            frame_count: 0,
            frame_ready: false,
            nmi: false,

            bg_patterns: ShiftReg::default(),
            bg_attrs: ShiftReg::default(),
            next_tile: 0,
            next_attr: 0,
            next_lo: 0,
            next_hi: 0,

            sprites: [SpriteSlot::default(); 8],
            sprite0_next: false,
            sprite0_in_line: false,

            palette: Palette::default(),
        }
    }

    /// Clears registers, scroll and timing. Memory contents survive.
    pub fn reset(&mut self) {
        self.ctrl = PpuCtrl::default();
        self.mask = PpuMask::default();
        self.status = PpuStatus::default();
        self.oam_addr = 0;
        self.data_buf = 0;

        self.v = VramAddr::default();
        self.t = VramAddr::default();
        self.x = 0;
        self.w = false;

        self.scanline = PRE_RENDER_LINE;
        self.dot = 0;
        self.frame_count = 0;
        self.frame_ready = false;
        self.nmi = false;

        self.bg_patterns = ShiftReg::default();
        self.bg_attrs = ShiftReg::default();
        self.sprites = [SpriteSlot::default(); 8];
        self.secondary_count = 0;
        self.sprite0_next = false;
        self.sprite0_in_line = false;
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    /// Runs one dot, then advances the (scanline, dot) counter.
    pub fn tick(&mut self, cart: &Cartridge, frame: &mut Frame) {
        let rendering = self.mask.rendering();

        match self.scanline {
            PRE_RENDER_LINE => self.pre_render_dot(cart, rendering),
            0..=239 => self.visible_dot(cart, frame, rendering),
            VBLANK_LINE if self.dot == 1 => {
                self.status.set_vblank(true);
                self.frame_ready = true;
                if self.ctrl.nmi_on() {
                    self.nmi = true;
                }
            }
            _ => {}
        }

        self.advance(rendering);
    }

    fn advance(&mut self, rendering: bool) {
        // odd frames drop the last pre-render dot while rendering
        if self.scanline == PRE_RENDER_LINE
            && self.dot == DOTS_PER_LINE - 2
            && rendering
            && self.frame_count % 2 == 1
        {
            self.scanline = 0;
            self.dot = 0;
            return;
        }

        self.dot += 1;
        if self.dot == DOTS_PER_LINE {
            self.dot = 0;
            self.scanline += 1;
            if self.scanline > LAST_LINE {
                self.scanline = PRE_RENDER_LINE;
                self.frame_count += 1;
            }
        }
    }

    pub fn take_nmi(&mut self) -> bool {
        std::mem::take(&mut self.nmi)
    }

    pub fn take_frame_ready(&mut self) -> bool {
        std::mem::take(&mut self.frame_ready)
    }

    /// `(scanline, dot)` of the next dot to run, scanline -1 is pre-render
    pub fn timing(&self) -> (i16, u16) {
        (self.scanline, self.dot)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn peek_oam(&self, index: u8) -> u8 {
        self.oam[index as usize]
    }

    pub fn peek_palette(&self, index: u8) -> u8 {
        self.palettes[palette_index(index as u16)]
    }

    /// `(v, t, fine x, w)`
    pub fn scroll(&self) -> (u16, u16, u16, bool) {
        (self.v.raw(), self.t.raw(), self.x, self.w)
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

impl Ppu {
    pub fn read_register(&mut self, addr: u16, cart: &Cartridge) -> u8 {
        match addr & 0x07 {
            0x02 => {
                let b = (self.status.bits() & 0xe0) | (self.data_buf & 0x1f);
                self.status.set_vblank(false);
                self.w = false;
                b
            }
            0x04 => self.oam[self.oam_addr as usize],
            0x07 => {
                let addr = self.v.addr();
                let data = if addr < 0x3f00 {
                    let buffered = self.data_buf;
                    self.data_buf = self.read_vram(cart, addr);
                    buffered
                } else {
                    // the buffer picks up the nametable byte under the palette
                    self.data_buf = self.read_vram(cart, addr - 0x1000);
                    self.read_vram(cart, addr)
                };
                self.v.inc(self.ctrl.addr_inc());
                data
            }
            r => {
                log::warn!("read of write-only ppu register {:#06x}", 0x2000 + r);
                0
            }
        }
    }

    pub fn write_register(&mut self, addr: u16, data: u8, cart: &mut Cartridge) {
        match addr & 0x07 {
            0x00 => {
                let was_on = self.ctrl.nmi_on();
                self.ctrl.set(data);
                self.t.set_nm(self.ctrl.nametable());
                if !was_on && self.ctrl.nmi_on() && self.status.vblank() {
                    self.nmi = true;
                }
            }
            0x01 => self.mask.set(data),
            0x03 => self.oam_addr = data,
            0x04 => {
                self.oam[self.oam_addr as usize] = data;
                self.oam_addr = self.oam_addr.wrapping_add(1);
            }
            0x05 => {
                if !self.w {
                    self.t.set_coarse_x((data >> 3) as u16);
                    self.x = (data & 0b111) as u16;
                } else {
                    self.t.set_coarse_y((data >> 3) as u16);
                    self.t.set_fine_y((data & 0b111) as u16);
                }
                self.w = !self.w;
            }
            0x06 => {
                if !self.w {
                    self.t.set_high(data);
                } else {
                    self.t.set_low(data);
                    self.v = self.t;
                }
                self.w = !self.w;
            }
            0x07 => {
                self.write_vram(cart, self.v.addr(), data);
                self.v.inc(self.ctrl.addr_inc());
            }
            r => log::warn!("write to read-only ppu register {:#06x}", 0x2000 + r),
        }
    }

    fn read_vram(&self, cart: &Cartridge, addr: u16) -> u8 {
        let addr = addr & 0x3fff;
        match addr {
            0x0000..=0x1fff => cart.ppu_read(addr),
            0x2000..=0x3eff => self.nametables[cart.mirroring().nametable_offset(addr)],
            _ => self.palettes[palette_index(addr)],
        }
    }

    fn write_vram(&mut self, cart: &mut Cartridge, addr: u16, data: u8) {
        let addr = addr & 0x3fff;
        match addr {
            0x0000..=0x1fff => cart.ppu_write(addr, data),
            0x2000..=0x3eff => {
                self.nametables[cart.mirroring().nametable_offset(addr)] = data;
            }
            _ => self.palettes[palette_index(addr)] = data & 0x3f,
        }
    }
}

/// `$3F10/$3F14/$3F18/$3F1C` share storage with `$3F00/$3F04/$3F08/$3F0C`
fn palette_index(addr: u16) -> usize {
    let i = addr as usize & 0x1f;
    if i & 0x13 == 0x10 {
        i & 0x0f
    } else {
        i
    }
}

impl Ppu {
    /// Rejects decoded states the renderer could index out of bounds with.
    fn validate(&self) -> Result<()> {
        let valid = self.nametables.len() == NAMETABLE_SIZE
            && self.oam.len() == OAM_SIZE
            && (PRE_RENDER_LINE..=LAST_LINE).contains(&self.scanline)
            && self.dot < DOTS_PER_LINE
            && self.x < 8
            && self.v.raw() <= 0x7fff
            && self.t.raw() <= 0x7fff
            && self.secondary_count <= 8;
        if valid {
            Ok(())
        } else {
            Err(Error::InvalidSnapshot)
        }
    }

    /// Takes over a decoded state, keeping the current color palette.
    pub(crate) fn load_state(&mut self, mut state: Ppu) -> Result<()> {
        state.validate()?;
        state.palette = std::mem::take(&mut self.palette);
        *self = state;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::tests::ines;
    use proptest::prelude::*;

    fn setup() -> (Ppu, Cartridge) {
        let cart = Cartridge::from_ines(&ines(0, 1, 1, 0)).unwrap();
        (Ppu::new(), cart)
    }

    fn set_addr(ppu: &mut Ppu, cart: &mut Cartridge, addr: u16) {
        ppu.write_register(0x2006, (addr >> 8) as u8, cart);
        ppu.write_register(0x2006, addr as u8, cart);
    }

    #[test]
    fn test_addr_write_copies_t() {
        let (mut ppu, mut cart) = setup();
        set_addr(&mut ppu, &mut cart, 0x2345);
        let (v, t, _, w) = ppu.scroll();
        assert_eq!(v, 0x2345);
        assert_eq!(v, t);
        assert!(!w);
    }

    #[test]
    fn test_scroll_writes() {
        let (mut ppu, mut cart) = setup();
        ppu.write_register(0x2000, 0b10, &mut cart);
        ppu.write_register(0x2005, 0b0111_1101, &mut cart);
        ppu.write_register(0x2005, 0b0101_1110, &mut cart);
        let (v, t, x, w) = ppu.scroll();
        assert_eq!(v, 0);
        assert_eq!(x, 0b101);
        assert_eq!(t, 0b110_10_01011_01111);
        assert!(!w);
    }

    #[test]
    fn test_status_read_clears_vblank_and_latch() {
        let (mut ppu, mut cart) = setup();
        ppu.status.set_vblank(true);
        ppu.write_register(0x2005, 0x10, &mut cart);
        assert!(ppu.scroll().3);

        assert_eq!(ppu.read_register(0x2002, &cart) & 0x80, 0x80);
        assert!(!ppu.scroll().3);
        assert_eq!(ppu.read_register(0x2002, &cart) & 0x80, 0);
    }

    #[test]
    fn test_data_read_is_buffered() {
        let (mut ppu, mut cart) = setup();
        set_addr(&mut ppu, &mut cart, 0x2400);
        ppu.write_register(0x2007, 0x11, &mut cart);
        ppu.write_register(0x2007, 0x22, &mut cart);

        set_addr(&mut ppu, &mut cart, 0x2400);
        ppu.read_register(0x2007, &cart);
        assert_eq!(ppu.read_register(0x2007, &cart), 0x11);
        assert_eq!(ppu.read_register(0x2007, &cart), 0x22);
    }

    #[test]
    fn test_palette_read_is_direct() {
        let (mut ppu, mut cart) = setup();
        set_addr(&mut ppu, &mut cart, 0x3f01);
        ppu.write_register(0x2007, 0xff, &mut cart);
        assert_eq!(ppu.peek_palette(0x01), 0x3f);

        set_addr(&mut ppu, &mut cart, 0x3f01);
        assert_eq!(ppu.read_register(0x2007, &cart), 0x3f);
    }

    #[test]
    fn test_addr_increment_32() {
        let (mut ppu, mut cart) = setup();
        ppu.write_register(0x2000, 0b100, &mut cart);
        set_addr(&mut ppu, &mut cart, 0x2000);
        ppu.write_register(0x2007, 1, &mut cart);
        assert_eq!(ppu.scroll().0, 0x2020);
    }

    #[test]
    fn test_chr_rom_is_read_only() {
        let (mut ppu, mut cart) = setup();
        set_addr(&mut ppu, &mut cart, 0x0000);
        ppu.write_register(0x2007, 0x55, &mut cart);
        assert_eq!(cart.ppu_read(0x0000), 0x80);
    }

    #[test]
    fn test_oam_port() {
        let (mut ppu, mut cart) = setup();
        ppu.write_register(0x2003, 0xff, &mut cart);
        ppu.write_register(0x2004, 0x12, &mut cart);
        ppu.write_register(0x2004, 0x34, &mut cart);
        assert_eq!(ppu.peek_oam(0xff), 0x12);
        assert_eq!(ppu.peek_oam(0x00), 0x34);

        ppu.write_register(0x2003, 0xff, &mut cart);
        assert_eq!(ppu.read_register(0x2004, &cart), 0x12);
    }

    #[test]
    fn test_nmi_on_ctrl_write_in_vblank() {
        let (mut ppu, mut cart) = setup();
        ppu.status.set_vblank(true);
        ppu.write_register(0x2000, 0x80, &mut cart);
        assert!(ppu.take_nmi());
        // already enabled, no new edge
        ppu.write_register(0x2000, 0x80, &mut cart);
        assert!(!ppu.take_nmi());
    }

    #[test]
    fn test_vblank_and_frame_timing() {
        let (mut ppu, cart) = setup();
        let mut frame = Box::new([0u32; WIDTH * HEIGHT]);
        let mut ticks = 0u32;
        while !ppu.status.vblank() {
            ppu.tick(&cart, &mut frame);
            ticks += 1;
        }
        // pre-render line plus 241 lines plus dot 1 of line 241
        assert_eq!(ticks, 242 * 341 + 2);
        assert!(ppu.take_frame_ready());
        assert!(!ppu.take_frame_ready());
        assert!(!ppu.take_nmi());

        while ppu.timing() != (PRE_RENDER_LINE, 0) {
            ppu.tick(&cart, &mut frame);
        }
        assert_eq!(ppu.frame_count(), 1);
        ppu.tick(&cart, &mut frame);
        ppu.tick(&cart, &mut frame);
        assert!(!ppu.status.vblank());
    }

    #[test]
    fn test_odd_frame_skips_a_dot() {
        let (mut ppu, mut cart) = setup();
        let mut frame = Box::new([0u32; WIDTH * HEIGHT]);
        ppu.write_register(0x2001, 0x18, &mut cart);

        let mut lengths = vec![];
        for _ in 0..4 {
            let mut n = 0u32;
            loop {
                ppu.tick(&cart, &mut frame);
                n += 1;
                if ppu.timing() == (PRE_RENDER_LINE, 0) {
                    break;
                }
            }
            lengths.push(n);
        }
        assert_eq!(lengths, vec![89342, 89341, 89342, 89341]);
    }

    #[test]
    fn test_backdrop_color() {
        let (mut ppu, mut cart) = setup();
        let mut frame = Box::new([0u32; WIDTH * HEIGHT]);
        set_addr(&mut ppu, &mut cart, 0x3f00);
        ppu.write_register(0x2007, 0x30, &mut cart);
        while !ppu.take_frame_ready() {
            ppu.tick(&cart, &mut frame);
        }
        assert!(frame.iter().all(|&c| c == NTSC_PALETTE.color(0, 0x30)));
    }

    #[test]
    fn test_load_state_rejects_out_of_range() {
        let (mut ppu, mut cart) = setup();
        set_addr(&mut ppu, &mut cart, 0x2400);

        let mut fine_x = ppu.clone();
        fine_x.x = 8;
        let mut dot = ppu.clone();
        dot.dot = DOTS_PER_LINE;
        let mut line = ppu.clone();
        line.scanline = LAST_LINE + 1;
        let mut oam = ppu.clone();
        oam.oam = vec![0u8; 4].into_boxed_slice();
        let mut nametables = ppu.clone();
        nametables.nametables = vec![0u8; 0x800].into_boxed_slice();
        for state in [fine_x, dot, line, oam, nametables] {
            assert!(matches!(ppu.load_state(state), Err(Error::InvalidSnapshot)));
        }
        assert_eq!(ppu.scroll().0, 0x2400);

        let mut moved = ppu.clone();
        moved.dot = 100;
        ppu.load_state(moved).unwrap();
        assert_eq!(ppu.dot, 100);
    }

    proptest! {
        #[test]
        fn test_palette_mirrors(i in 0u16..0x20) {
            let (mut ppu, mut cart) = setup();
            set_addr(&mut ppu, &mut cart, 0x3f00 + i);
            ppu.write_register(0x2007, 0x2a, &mut cart);
            let mirror = if i & 0x03 == 0 { i ^ 0x10 } else { i };
            prop_assert_eq!(ppu.peek_palette(mirror as u8), 0x2a);
            prop_assert_eq!(ppu.peek_palette(i as u8 + 0x20), 0x2a);
        }
    }
}
