use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Processor status register P
    #[derive(Default, Serialize, Deserialize)]
    pub struct Status: u8 {
        const CARRY     = 0b0000_0001;
        const ZERO      = 0b0000_0010;
        const IRQ_OFF   = 0b0000_0100;
        const DECIMAL   = 0b0000_1000;
        const BREAK     = 0b0001_0000;
        const UNUSED    = 0b0010_0000;
        const OVERFLOW  = 0b0100_0000;
        const NEGATIVE  = 0b1000_0000;
    }
}

impl Status {
    pub fn set_zn(&mut self, b: u8) {
        self.set(Status::ZERO, b == 0);
        self.set(Status::NEGATIVE, (b & 0x80) != 0);
    }

    /// Value pushed by PHP/BRK (`brk`) or an interrupt: bit 5 always set,
    /// B only for software pushes.
    pub fn pushed(self, brk: bool) -> u8 {
        let mut p = self | Status::UNUSED;
        p.set(Status::BREAK, brk);
        p.bits()
    }

    /// PLP/RTI: B and bit 5 keep their current values.
    pub fn pull(&mut self, b: u8) {
        let keep = Status::BREAK | Status::UNUSED;
        *self = (*self & keep) | (Status::from_bits_truncate(b) - keep);
    }

    pub fn carry(self) -> u8 {
        self.contains(Status::CARRY) as u8
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMES: [(Status, char); 8] = [
            (Status::NEGATIVE, 'N'),
            (Status::OVERFLOW, 'V'),
            (Status::UNUSED, '-'),
            (Status::BREAK, 'B'),
            (Status::DECIMAL, 'D'),
            (Status::IRQ_OFF, 'I'),
            (Status::ZERO, 'Z'),
            (Status::CARRY, 'C'),
        ];
        for (flag, c) in NAMES {
            let c = if self.contains(flag) && flag != Status::UNUSED {
                c
            } else {
                '-'
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        let s = Status::from_bits_truncate(0x24);
        assert_eq!(s.to_string(), "-----I--");

        let s = Status::all();
        assert_eq!(s.to_string(), "NV-BDIZC");

        let mut s = Status::default();
        s.set_zn(0);
        assert!(s.contains(Status::ZERO));
        s.set_zn(0x80);
        assert_eq!(s, Status::NEGATIVE);
    }

    #[test]
    fn test_push_pull() {
        let s = Status::CARRY;
        assert_eq!(s.pushed(true), 0b0011_0001);
        assert_eq!(s.pushed(false), 0b0010_0001);

        let mut s = Status::UNUSED;
        s.pull(0xff);
        assert_eq!(s.bits(), 0b1110_1111);

        s.pull(0x00);
        assert_eq!(s, Status::UNUSED);
    }
}
