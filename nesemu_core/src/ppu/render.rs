use super::{Frame, Ppu, SpriteSlot, SECONDARY_OAM_SIZE, WIDTH};
use crate::cart::Cartridge;
use bit_field::BitField;

const SPRITE_PALETTES: u8 = 0x10;

struct SpritePixel {
    pixel: u8,
    palette: u8,
    behind_bg: bool,
}

impl Ppu {
    pub(super) fn pre_render_dot(&mut self, cart: &Cartridge, rendering: bool) {
        if self.dot == 1 {
            self.status.set_vblank(false);
            self.status.set_sp_overflow(false);
            self.status.set_sp0_hit(false);
        }
        if !rendering {
            return;
        }

        self.background_dot(cart);
        if (280..=304).contains(&self.dot) {
            self.v.copy_vy(self.t);
        }
        if self.dot == 257 {
            // nothing was evaluated for scanline 0
            self.sprites = [SpriteSlot::default(); 8];
            self.sprite0_in_line = false;
        }
        if (257..=320).contains(&self.dot) {
            self.oam_addr = 0;
        }
    }

    pub(super) fn visible_dot(&mut self, cart: &Cartridge, frame: &mut Frame, rendering: bool) {
        if rendering {
            match self.dot {
                1 => self.clear_secondary_oam(),
                65 => self.evaluate_sprites(),
                _ => {}
            }
            self.background_dot(cart);
            if (2..=257).contains(&self.dot) {
                self.update_sprites();
            }
        }

        if (1..=256).contains(&self.dot) {
            self.render_pixel(frame);
        }

        if rendering {
            if self.dot == 257 {
                self.fetch_sprites(cart);
            }
            if (257..=320).contains(&self.dot) {
                self.oam_addr = 0;
            }
        }
    }

    /// shifters, the 8-dot fetch cycle and the scroll increments
    fn background_dot(&mut self, cart: &Cartridge) {
        let dot = self.dot;

        if (2..=257).contains(&dot) || (321..=337).contains(&dot) {
            self.bg_patterns.shift();
            self.bg_attrs.shift();

            match (dot - 1) % 8 {
                0 => {
                    self.load_bg_shifters();
                    self.next_tile = self.read_vram(cart, self.v.tile_addr());
                }
                2 => {
                    let attr = self.read_vram(cart, self.v.attr_addr());
                    self.next_attr = (attr >> self.v.attr_shift()) & 0b11;
                }
                4 => self.next_lo = self.read_vram(cart, self.bg_tile_row()),
                6 => self.next_hi = self.read_vram(cart, self.bg_tile_row() + 8),
                7 => self.v.inc_coarse_x(),
                _ => {}
            }
        }

        match dot {
            256 => self.v.inc_y(),
            257 => self.v.copy_vx(self.t),
            _ => {}
        }
    }

    fn bg_tile_row(&self) -> u16 {
        self.ctrl.bg_pattern_table() + self.next_tile as u16 * 16 + self.v.fine_y()
    }

    fn load_bg_shifters(&mut self) {
        self.bg_patterns.load(self.next_lo, self.next_hi);
        let fill = |b: bool| if b { 0xff } else { 0x00 };
        self.bg_attrs.load(
            fill(self.next_attr.get_bit(0)),
            fill(self.next_attr.get_bit(1)),
        );
    }

    fn clear_secondary_oam(&mut self) {
        self.secondary_oam = [0xff; SECONDARY_OAM_SIZE];
        self.secondary_count = 0;
    }

    /// Collects the first eight sprites covering the next scanline.
    fn evaluate_sprites(&mut self) {
        let height = self.ctrl.sp_size() as i16;
        self.sprite0_next = false;

        let mut count = 0;
        for n in 0..64 {
            let entry = &self.oam[n * 4..n * 4 + 4];
            let row = self.scanline - entry[0] as i16;
            if !(0..height).contains(&row) {
                continue;
            }
            if count == 8 {
                self.status.set_sp_overflow(true);
                break;
            }
            self.secondary_oam[count * 4..count * 4 + 4].copy_from_slice(entry);
            if n == 0 {
                self.sprite0_next = true;
            }
            count += 1;
        }
        self.secondary_count = count;
    }

    fn fetch_sprites(&mut self, cart: &Cartridge) {
        let height = self.ctrl.sp_size();
        self.sprite0_in_line = self.sprite0_next;

        for i in 0..8 {
            if i >= self.secondary_count {
                self.sprites[i] = SpriteSlot::default();
                continue;
            }

            let entry = &self.secondary_oam[i * 4..i * 4 + 4];
            let (y, tile, attr, x) = (entry[0], entry[1] as u16, entry[2], entry[3]);

            let mut row = (self.scanline - y as i16) as u16;
            if attr.get_bit(7) {
                row = height - 1 - row;
            }
            let addr = if height == 16 {
                (tile & 1) * 0x1000 + ((tile & 0xfe) + row / 8) * 16 + (row & 7)
            } else {
                self.ctrl.sp_pattern_table() + tile * 16 + row
            };

            let mut lo = cart.ppu_read(addr);
            let mut hi = cart.ppu_read(addr + 8);
            if attr.get_bit(6) {
                lo = lo.reverse_bits();
                hi = hi.reverse_bits();
            }
            self.sprites[i] = SpriteSlot { lo, hi, attr, x };
        }
    }

    fn update_sprites(&mut self) {
        for s in self.sprites.iter_mut() {
            if s.x > 0 {
                s.x -= 1;
            } else {
                s.lo <<= 1;
                s.hi <<= 1;
            }
        }
    }

    fn sprite_pixel(slot: &SpriteSlot) -> u8 {
        if slot.x != 0 {
            return 0;
        }
        (slot.lo >> 7) | ((slot.hi >> 7) << 1)
    }

    fn front_sprite(&self) -> Option<SpritePixel> {
        self.sprites.iter().find_map(|s| {
            let pixel = Self::sprite_pixel(s);
            (pixel != 0).then(|| SpritePixel {
                pixel,
                palette: s.attr & 0b11,
                behind_bg: s.attr.get_bit(5),
            })
        })
    }

    fn render_pixel(&mut self, frame: &mut Frame) {
        let x = self.dot as usize - 1;
        let left = x < 8;

        let show_bg = self.mask.show_bg() && (!left || self.mask.show_bg_left());
        let show_sp = self.mask.show_sp() && (!left || self.mask.show_sp_left());

        let (bg_pixel, bg_palette) = if show_bg {
            (self.bg_patterns.get(self.x), self.bg_attrs.get(self.x))
        } else {
            (0, 0)
        };
        let sprite = if show_sp { self.front_sprite() } else { None };

        if self.sprite0_in_line
            && show_bg
            && show_sp
            && bg_pixel != 0
            && x != WIDTH - 1
            && Self::sprite_pixel(&self.sprites[0]) != 0
        {
            self.status.set_sp0_hit(true);
        }

        let index = match (bg_pixel, sprite) {
            (0, None) => 0,
            (0, Some(s)) => SPRITE_PALETTES + s.palette * 4 + s.pixel,
            (_, Some(s)) if !s.behind_bg => SPRITE_PALETTES + s.palette * 4 + s.pixel,
            (b, _) => bg_palette * 4 + b,
        };

        let mut color = self.palettes[super::palette_index(index as u16)];
        if self.mask.gray_scale() {
            color &= 0x30;
        }
        frame[self.scanline as usize * WIDTH + x] = self.palette.color(self.mask.emphasis(), color);
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Frame, Ppu, HEIGHT, NTSC_PALETTE, WIDTH};
    use crate::cart::tests::ines;
    use crate::cart::Cartridge;

    /// A cartridge whose tile 1 is solid color 3 in both pattern tables.
    fn cart() -> Cartridge {
        let mut rom = ines(0, 1, 1, 0);
        let chr = rom.len() - 0x2000;
        rom[chr..].fill(0);
        for table in [0x0000, 0x1000] {
            rom[chr + table + 16..chr + table + 32].fill(0xff);
        }
        Cartridge::from_ines(&rom).unwrap()
    }

    fn write(ppu: &mut Ppu, cart: &mut Cartridge, addr: u16, data: &[u8]) {
        ppu.write_register(0x2006, (addr >> 8) as u8, cart);
        ppu.write_register(0x2006, addr as u8, cart);
        for &b in data {
            ppu.write_register(0x2007, b, cart);
        }
    }

    fn run_frame(ppu: &mut Ppu, cart: &Cartridge, frame: &mut Frame) {
        while !ppu.take_frame_ready() {
            ppu.tick(cart, frame);
        }
    }

    fn pixel(frame: &Frame, x: usize, y: usize) -> u32 {
        frame[y * WIDTH + x]
    }

    #[test]
    fn test_background_tile() {
        let mut cart = cart();
        let mut ppu = Ppu::new();
        let mut frame = Box::new([0u32; WIDTH * HEIGHT]);

        write(&mut ppu, &mut cart, 0x3f00, &[0x0f, 0x01, 0x02, 0x16]);
        // tile (2, 1) of nametable 0
        write(&mut ppu, &mut cart, 0x2000 + 32 + 2, &[0x01]);
        write(&mut ppu, &mut cart, 0x2000, &[]);
        ppu.write_register(0x2005, 0, &mut cart);
        ppu.write_register(0x2005, 0, &mut cart);
        ppu.write_register(0x2001, 0b0000_1010, &mut cart);

        run_frame(&mut ppu, &cart, &mut frame);
        run_frame(&mut ppu, &cart, &mut frame);

        let backdrop = NTSC_PALETTE.color(0, 0x0f);
        let tile = NTSC_PALETTE.color(0, 0x16);
        assert_eq!(pixel(&frame, 16, 8), tile);
        assert_eq!(pixel(&frame, 23, 15), tile);
        assert_eq!(pixel(&frame, 15, 8), backdrop);
        assert_eq!(pixel(&frame, 24, 8), backdrop);
        assert_eq!(pixel(&frame, 16, 16), backdrop);
    }

    #[test]
    fn test_sprite_zero_hit() {
        let mut cart = cart();
        let mut ppu = Ppu::new();
        let mut frame = Box::new([0u32; WIDTH * HEIGHT]);

        write(&mut ppu, &mut cart, 0x3f00, &[0x0f, 0x01, 0x02, 0x16]);
        write(&mut ppu, &mut cart, 0x3f10, &[0x0f, 0x21, 0x22, 0x2a]);
        write(&mut ppu, &mut cart, 0x2000 + 32 * 4 + 4, &[0x01]);
        write(&mut ppu, &mut cart, 0x2000, &[]);

        // sprite 0 at (36, 33) overlaps the tile at (32, 32)
        ppu.write_register(0x2003, 0, &mut cart);
        for b in [32, 1, 0, 36] {
            ppu.write_register(0x2004, b, &mut cart);
        }
        ppu.write_register(0x2001, 0b0001_1110, &mut cart);

        run_frame(&mut ppu, &cart, &mut frame);
        // the flag holds through vblank
        assert_eq!(ppu.read_register(0x2002, &cart) & 0x40, 0x40);
        assert_eq!(pixel(&frame, 36, 33), NTSC_PALETTE.color(0, 0x2a));
        assert_eq!(pixel(&frame, 35, 33), NTSC_PALETTE.color(0, 0x16));
        // no sprites on the line the sprite's y names
        assert_eq!(pixel(&frame, 36, 32), NTSC_PALETTE.color(0, 0x16));
    }

    #[test]
    fn test_sprite_behind_background() {
        let mut cart = cart();
        let mut ppu = Ppu::new();
        let mut frame = Box::new([0u32; WIDTH * HEIGHT]);

        write(&mut ppu, &mut cart, 0x3f00, &[0x0f, 0x01, 0x02, 0x16]);
        write(&mut ppu, &mut cart, 0x3f10, &[0x0f, 0x21, 0x22, 0x2a]);
        write(&mut ppu, &mut cart, 0x2000 + 32 * 4 + 4, &[0x01]);
        write(&mut ppu, &mut cart, 0x2000, &[]);

        ppu.write_register(0x2003, 0, &mut cart);
        for b in [32, 1, 0b0010_0000, 28] {
            ppu.write_register(0x2004, b, &mut cart);
        }
        ppu.write_register(0x2001, 0b0001_1110, &mut cart);

        run_frame(&mut ppu, &cart, &mut frame);
        // behind the tile, in front of the backdrop
        assert_eq!(pixel(&frame, 32, 33), NTSC_PALETTE.color(0, 0x16));
        assert_eq!(pixel(&frame, 28, 33), NTSC_PALETTE.color(0, 0x2a));
    }

    #[test]
    fn test_sprite_overflow() {
        let mut cart = cart();
        let mut ppu = Ppu::new();
        let mut frame = Box::new([0u32; WIDTH * HEIGHT]);

        ppu.write_register(0x2003, 0, &mut cart);
        for i in 0..64u8 {
            let y = if i < 9 { 100 } else { 0xf0 };
            for b in [y, 0, 0, i] {
                ppu.write_register(0x2004, b, &mut cart);
            }
        }
        ppu.write_register(0x2001, 0b0001_1000, &mut cart);

        run_frame(&mut ppu, &cart, &mut frame);
        assert_eq!(ppu.read_register(0x2002, &cart) & 0x20, 0x20);
    }
}
