use crate::error::{Error, Result};

const COLORS: usize = 64;
const EMPHASIS_VARIANTS: usize = 8;
const BASE_FILE_SIZE: usize = COLORS * 3;
const FULL_FILE_SIZE: usize = COLORS * EMPHASIS_VARIANTS * 3;

/// NTSC 2C02 colors with the 8 emphasis variants precomputed
const NTSC_PAL: &[u8; FULL_FILE_SIZE] = include_bytes!("../../assets/ntsc.pal");

/// attenuation applied to channels that are not emphasized
const EMPHASIS_DIM: f32 = 0.816;

lazy_static::lazy_static! {
    pub static ref NTSC_PALETTE: Palette = Palette::from_table(NTSC_PAL);
}

/// ARGB lookup table indexed by `emphasis * 64 + color`.
#[derive(Clone)]
pub struct Palette {
    colors: Box<[u32; COLORS * EMPHASIS_VARIANTS]>,
}

impl Palette {
    /// Accepts a full 1536 byte table, or a 192 byte base palette whose
    /// emphasis variants are computed.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        match data.len() {
            FULL_FILE_SIZE => {
                let mut table = [0u8; FULL_FILE_SIZE];
                table.copy_from_slice(data);
                Ok(Self::from_table(&table))
            }
            BASE_FILE_SIZE => Ok(Self::from_table(&expand_emphasis(data))),
            n => Err(Error::InvalidPalette(n)),
        }
    }

    fn from_table(table: &[u8; FULL_FILE_SIZE]) -> Self {
        let mut colors = Box::new([0u32; COLORS * EMPHASIS_VARIANTS]);
        for (c, rgb) in colors.iter_mut().zip(table.chunks_exact(3)) {
            *c = 0xff00_0000 | (rgb[0] as u32) << 16 | (rgb[1] as u32) << 8 | rgb[2] as u32;
        }
        Self { colors }
    }

    pub fn color(&self, emphasis: u8, index: u8) -> u32 {
        self.colors[(emphasis as usize & 0b111) * COLORS + (index as usize & 0x3f)]
    }
}

impl Default for Palette {
    fn default() -> Self {
        NTSC_PALETTE.clone()
    }
}

fn expand_emphasis(base: &[u8]) -> [u8; FULL_FILE_SIZE] {
    let mut table = [0u8; FULL_FILE_SIZE];
    for emphasis in 0..EMPHASIS_VARIANTS {
        for (i, rgb) in base.chunks_exact(3).enumerate() {
            for channel in 0..3 {
                let dim = emphasis != 0 && emphasis & (1 << channel) == 0;
                let c = rgb[channel] as f32;
                table[(emphasis * COLORS + i) * 3 + channel] =
                    if dim { (c * EMPHASIS_DIM) as u8 } else { rgb[channel] };
            }
        }
    }
    table
}
