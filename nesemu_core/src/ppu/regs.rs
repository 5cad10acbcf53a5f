use bit_field::BitField;
use serde::{Deserialize, Serialize};

/// PPU control register
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct PpuCtrl(u8);

impl PpuCtrl {
    pub fn set(&mut self, b: u8) {
        self.0 = b;
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// base nametable address
    pub fn nametable(self) -> u16 {
        self.0.get_bits(..2) as u16
    }

    /// VRAM address increment per CPU read/write of PPUDATA
    pub fn addr_inc(self) -> u16 {
        self.0.get_bit(2) as u16 * 31 + 1
    }

    /// sprite pattern table address for 8x8 sprites
    pub fn sp_pattern_table(self) -> u16 {
        self.0.get_bit(3) as u16 * 0x1000
    }

    /// background pattern table address
    pub fn bg_pattern_table(self) -> u16 {
        self.0.get_bit(4) as u16 * 0x1000
    }

    /// sprite height
    pub fn sp_size(self) -> u16 {
        (self.0.get_bit(5) as u16 + 1) * 8
    }

    /// generate an NMI at the start of the vblank
    pub fn nmi_on(self) -> bool {
        self.0.get_bit(7)
    }
}

/// PPU mask register
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct PpuMask(u8);

impl PpuMask {
    pub fn set(&mut self, b: u8) {
        self.0 = b;
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// gray scale display
    pub fn gray_scale(self) -> bool {
        self.0.get_bit(0)
    }

    /// show background in leftmost 8 pixels of screen
    pub fn show_bg_left(self) -> bool {
        self.0.get_bit(1)
    }

    /// show sprites in leftmost 8 pixels of screen
    pub fn show_sp_left(self) -> bool {
        self.0.get_bit(2)
    }

    pub fn show_bg(self) -> bool {
        self.0.get_bit(3)
    }

    pub fn show_sp(self) -> bool {
        self.0.get_bit(4)
    }

    pub fn rendering(self) -> bool {
        self.show_bg() || self.show_sp()
    }

    /// red, green and blue emphasis bits, red in bit 0
    pub fn emphasis(self) -> u8 {
        self.0.get_bits(5..8)
    }
}

/// PPU status register
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct PpuStatus(u8);

impl PpuStatus {
    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn sp_overflow(self) -> bool {
        self.0.get_bit(5)
    }

    pub fn sp0_hit(self) -> bool {
        self.0.get_bit(6)
    }

    pub fn vblank(self) -> bool {
        self.0.get_bit(7)
    }

    pub fn set_sp_overflow(&mut self, b: bool) {
        self.0.set_bit(5, b);
    }

    pub fn set_sp0_hit(&mut self, b: bool) {
        self.0.set_bit(6, b);
    }

    pub fn set_vblank(&mut self, b: bool) {
        self.0.set_bit(7, b);
    }
}

// from: https://wiki.nesdev.com/w/index.php?title=PPU_scrolling
// fedcba98 76543210
//  yyyNNYY YYYXXXXX
const VX_MASK: u16 = 0b0000_0100_0001_1111;
const VY_MASK: u16 = 0b0111_1011_1110_0000;
const V_MASK: u16 = 0x7fff;

/// PPU vram address, `v` and `t`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VramAddr(u16);

impl VramAddr {
    pub fn new(v: u16) -> Self {
        Self(v & V_MASK)
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    /// address on the 14 bit PPU bus
    pub fn addr(self) -> u16 {
        self.0 & 0x3fff
    }

    pub fn tile_addr(self) -> u16 {
        0x2000 | (self.0 & 0x0fff)
    }

    pub fn attr_addr(self) -> u16 {
        let v = self.0;
        0x23c0 | (v & 0x0c00) | ((v >> 4) & 0x38) | ((v >> 2) & 0x07)
    }

    /// shift of this tile's 2 bit palette inside its attribute byte
    pub fn attr_shift(self) -> u16 {
        ((self.0 >> 4) & 0b100) | (self.0 & 0b10)
    }

    pub fn inc(&mut self, offset: u16) {
        self.0 = self.0.wrapping_add(offset) & V_MASK;
    }

    pub fn inc_coarse_x(&mut self) {
        let cx = self.coarse_x();
        if cx == 31 {
            self.set_coarse_x(0);
            self.switch_nm(0b01); // switch horizontal nametable
        } else {
            self.set_coarse_x(cx + 1);
        }
    }

    pub fn inc_y(&mut self) {
        let y = self.fine_y();
        if y < 7 {
            self.set_fine_y(y + 1);
        } else {
            self.set_fine_y(0);
            let cy = self.coarse_y();
            if cy == 29 {
                self.set_coarse_y(0);
                self.switch_nm(0b10); // switch vertical nametable
            } else if cy == 31 {
                self.set_coarse_y(0);
            } else {
                self.set_coarse_y(cy + 1);
            }
        }
    }

    pub fn coarse_x(self) -> u16 {
        self.0.get_bits(0..5)
    }

    pub fn set_coarse_x(&mut self, b: u16) {
        self.0.set_bits(0..5, b & 0x1f);
    }

    pub fn coarse_y(self) -> u16 {
        self.0.get_bits(5..10)
    }

    pub fn set_coarse_y(&mut self, b: u16) {
        self.0.set_bits(5..10, b & 0x1f);
    }

    pub fn nm(self) -> u16 {
        self.0.get_bits(10..12)
    }

    pub fn set_nm(&mut self, b: u16) {
        self.0.set_bits(10..12, b & 0b11);
    }

    pub fn switch_nm(&mut self, b: u16) {
        self.set_nm(self.nm() ^ b);
    }

    pub fn fine_y(self) -> u16 {
        self.0.get_bits(12..15)
    }

    pub fn set_fine_y(&mut self, b: u16) {
        self.0.set_bits(12..15, b & 0b111);
    }

    /// `$2006` first write: bits 8-13 from `b`, bit 14 cleared
    pub fn set_high(&mut self, b: u8) {
        self.0.set_bits(8..15, (b & 0x3f) as u16);
    }

    /// `$2006` second write
    pub fn set_low(&mut self, b: u8) {
        self.0.set_bits(0..8, b as u16);
    }

    pub fn copy_vx(&mut self, other: VramAddr) {
        self.0 = (self.0 & !VX_MASK) | (other.0 & VX_MASK);
    }

    pub fn copy_vy(&mut self, other: VramAddr) {
        self.0 = (self.0 & !VY_MASK) | (other.0 & VY_MASK);
    }
}

/// A pair of 16 bit shift registers, one bit plane each. The next pixel is
/// at bit 15 offset by fine x, new tiles are loaded into the low byte.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct ShiftReg(u16, u16);

impl ShiftReg {
    pub fn get(self, fine_x: u16) -> u8 {
        let mask = 0x8000 >> fine_x;
        ((self.0 & mask != 0) as u8) | (((self.1 & mask != 0) as u8) << 1)
    }

    pub fn shift(&mut self) {
        self.0 <<= 1;
        self.1 <<= 1;
    }

    pub fn load(&mut self, b0: u8, b1: u8) {
        self.0.set_bits(0..8, b0 as u16);
        self.1.set_bits(0..8, b1 as u16);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_inc_coarse_x_wraps_nametable() {
        let mut v = VramAddr::new(0x001f);
        v.inc_coarse_x();
        assert_eq!(v.raw(), 0x0400);
        v.set_coarse_x(31);
        v.inc_coarse_x();
        assert_eq!(v.raw(), 0x0000);
    }

    #[test]
    fn test_inc_y() {
        // fine y overflow into coarse y
        let mut v = VramAddr::new(0x7000);
        v.inc_y();
        assert_eq!(v.raw(), 0x0020);

        // row 29 wraps and flips the vertical nametable
        let mut v = VramAddr::new(0x7000 | (29 << 5));
        v.inc_y();
        assert_eq!(v.raw(), 0x0800);

        // rows 30 and 31 are attribute memory, 31 wraps without the flip
        let mut v = VramAddr::new(0x7000 | (31 << 5));
        v.inc_y();
        assert_eq!(v.raw(), 0x0000);
    }

    #[test]
    fn test_copy_masks() {
        let mut v = VramAddr::new(0);
        v.copy_vx(VramAddr::new(0x7fff));
        assert_eq!(v.raw(), 0x041f);
        let mut v = VramAddr::new(0);
        v.copy_vy(VramAddr::new(0x7fff));
        assert_eq!(v.raw(), 0x7be0);
    }

    #[test]
    fn test_attr_addr() {
        // coarse x 31, coarse y 29 in the fourth nametable
        let v = VramAddr::new(0x0c00 | (29 << 5) | 31);
        assert_eq!(v.attr_addr(), 0x2fff);
        assert_eq!(v.attr_shift(), 2);
    }

    #[test]
    fn test_shift_reg() {
        let mut s = ShiftReg::default();
        s.load(0b1000_0001, 0b0000_0001);
        for _ in 0..8 {
            s.shift();
        }
        assert_eq!(s.get(0), 0b01);
        assert_eq!(s.get(7), 0b11);
    }

    proptest! {
        #[test]
        fn test_v_stays_15_bit(start in 0u16..0x8000, offsets in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut v = VramAddr::new(start);
            for o in offsets {
                match o % 4 {
                    0 => v.inc(if o & 0x80 != 0 { 32 } else { 1 }),
                    1 => v.inc_coarse_x(),
                    2 => v.inc_y(),
                    _ => v.set_high(o),
                }
                prop_assert!(v.raw() <= 0x7fff);
            }
        }
    }
}
