use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Button states in shift order, bit 0 is shifted out first.
    #[derive(Default, Serialize, Deserialize)]
    pub struct Buttons: u8 {
        const A      = 0b0000_0001;
        const B      = 0b0000_0010;
        const SELECT = 0b0000_0100;
        const START  = 0b0000_1000;
        const UP     = 0b0001_0000;
        const DOWN   = 0b0010_0000;
        const LEFT   = 0b0100_0000;
        const RIGHT  = 0b1000_0000;
    }
}

impl Buttons {
    /// `A` first, `1` for pressed, e.g. `10010000` for A + Start
    pub fn to_netplay_string(self) -> String {
        (0..8)
            .map(|i| if self.bits() & (1 << i) != 0 { '1' } else { '0' })
            .collect()
    }

    pub fn from_netplay_string(s: &str) -> Option<Self> {
        if s.len() != 8 {
            return None;
        }
        let mut bits = 0u8;
        for (i, c) in s.chars().enumerate() {
            match c {
                '1' => bits |= 1 << i,
                '0' => {}
                _ => return None,
            }
        }
        Some(Self::from_bits_truncate(bits))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Player {
    One = 0,
    Two = 1,
}

impl Player {
    pub fn other(self) -> Self {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }
}

/// Both controller ports, `$4016` (strobe, player 1) and `$4017` (player 2).
///
/// Hosts update `local` at any time; it only becomes visible to the game once
/// committed, which happens at most once per frame.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Joypad {
    local: Buttons,
    committed: [Buttons; 2],
    strobe: bool,
    shifters: [u8; 2],
}

impl Joypad {
    pub fn claims(addr: u16) -> bool {
        matches!(addr, 0x4016 | 0x4017)
    }

    pub fn read(&mut self, addr: u16) -> u8 {
        if self.strobe {
            self.latch();
        }

        let shifter = &mut self.shifters[(addr & 1) as usize];
        let b = *shifter & 0x01;
        *shifter = (*shifter >> 1) | 0x80;
        b | 0x40
    }

    pub fn peek(&self, addr: u16) -> u8 {
        (self.shifters[(addr & 1) as usize] & 0x01) | 0x40
    }

    pub fn write(&mut self, addr: u16, data: u8) {
        if addr != 0x4016 {
            return;
        }

        let strobe = data & 0x01 != 0;
        if self.strobe || strobe {
            self.latch();
        }
        self.strobe = strobe;
    }

    fn latch(&mut self) {
        self.shifters = [self.committed[0].bits(), self.committed[1].bits()];
    }

    pub fn set_local(&mut self, buttons: Buttons) {
        self.local = buttons;
    }

    pub fn local(&self) -> Buttons {
        self.local
    }

    /// Makes the local buttons visible to the game as `player`.
    pub fn commit(&mut self, player: Player) {
        self.committed[player as usize] = self.local;
    }

    /// Sets a player's state directly, used for the remote side in netplay.
    pub fn set_committed(&mut self, player: Player, buttons: Buttons) {
        self.committed[player as usize] = buttons;
    }

    pub fn committed(&self, player: Player) -> Buttons {
        self.committed[player as usize]
    }

    pub fn reset(&mut self) {
        self.strobe = false;
        self.shifters = [0; 2];
    }
}
