use super::addressing::AddrMode;
use super::status::Status;
use super::Cpu;
use crate::bus::Bus;

type Op = fn(&mut Cpu, &mut Bus);

#[rustfmt::skip]
pub const OP_FUNCS: [Op; 256] = [
//  00        01        02        03        04        05        06        07        08        09        0a        0b        0c        0d        0e        0f
    Cpu::brk, Cpu::ora, Cpu::kil, Cpu::slo, Cpu::nop, Cpu::ora, Cpu::asl, Cpu::slo, Cpu::php, Cpu::ora, Cpu::asl, Cpu::anc, Cpu::nop, Cpu::ora, Cpu::asl, Cpu::slo, // 00
    Cpu::bpl, Cpu::ora, Cpu::kil, Cpu::slo, Cpu::nop, Cpu::ora, Cpu::asl, Cpu::slo, Cpu::clc, Cpu::ora, Cpu::nop, Cpu::slo, Cpu::nop, Cpu::ora, Cpu::asl, Cpu::slo, // 10
    Cpu::jsr, Cpu::and, Cpu::kil, Cpu::rla, Cpu::bit, Cpu::and, Cpu::rol, Cpu::rla, Cpu::plp, Cpu::and, Cpu::rol, Cpu::anc, Cpu::bit, Cpu::and, Cpu::rol, Cpu::rla, // 20
    Cpu::bmi, Cpu::and, Cpu::kil, Cpu::rla, Cpu::nop, Cpu::and, Cpu::rol, Cpu::rla, Cpu::sec, Cpu::and, Cpu::nop, Cpu::rla, Cpu::nop, Cpu::and, Cpu::rol, Cpu::rla, // 30
    Cpu::rti, Cpu::eor, Cpu::kil, Cpu::sre, Cpu::nop, Cpu::eor, Cpu::lsr, Cpu::sre, Cpu::pha, Cpu::eor, Cpu::lsr, Cpu::alr, Cpu::jmp, Cpu::eor, Cpu::lsr, Cpu::sre, // 40
    Cpu::bvc, Cpu::eor, Cpu::kil, Cpu::sre, Cpu::nop, Cpu::eor, Cpu::lsr, Cpu::sre, Cpu::cli, Cpu::eor, Cpu::nop, Cpu::sre, Cpu::nop, Cpu::eor, Cpu::lsr, Cpu::sre, // 50
    Cpu::rts, Cpu::adc, Cpu::kil, Cpu::rra, Cpu::nop, Cpu::adc, Cpu::ror, Cpu::rra, Cpu::pla, Cpu::adc, Cpu::ror, Cpu::kil, Cpu::jmp, Cpu::adc, Cpu::ror, Cpu::rra, // 60
    Cpu::bvs, Cpu::adc, Cpu::kil, Cpu::rra, Cpu::nop, Cpu::adc, Cpu::ror, Cpu::rra, Cpu::sei, Cpu::adc, Cpu::nop, Cpu::rra, Cpu::nop, Cpu::adc, Cpu::ror, Cpu::rra, // 70
    Cpu::nop, Cpu::sta, Cpu::nop, Cpu::sax, Cpu::sty, Cpu::sta, Cpu::stx, Cpu::sax, Cpu::dey, Cpu::nop, Cpu::txa, Cpu::kil, Cpu::sty, Cpu::sta, Cpu::stx, Cpu::sax, // 80
    Cpu::bcc, Cpu::sta, Cpu::kil, Cpu::kil, Cpu::sty, Cpu::sta, Cpu::stx, Cpu::sax, Cpu::tya, Cpu::sta, Cpu::txs, Cpu::kil, Cpu::kil, Cpu::sta, Cpu::kil, Cpu::kil, // 90
    Cpu::ldy, Cpu::lda, Cpu::ldx, Cpu::lax, Cpu::ldy, Cpu::lda, Cpu::ldx, Cpu::lax, Cpu::tay, Cpu::lda, Cpu::tax, Cpu::kil, Cpu::ldy, Cpu::lda, Cpu::ldx, Cpu::lax, // a0
    Cpu::bcs, Cpu::lda, Cpu::kil, Cpu::lax, Cpu::ldy, Cpu::lda, Cpu::ldx, Cpu::lax, Cpu::clv, Cpu::lda, Cpu::tsx, Cpu::kil, Cpu::ldy, Cpu::lda, Cpu::ldx, Cpu::lax, // b0
    Cpu::cpy, Cpu::cmp, Cpu::nop, Cpu::dcp, Cpu::cpy, Cpu::cmp, Cpu::dec, Cpu::dcp, Cpu::iny, Cpu::cmp, Cpu::dex, Cpu::kil, Cpu::cpy, Cpu::cmp, Cpu::dec, Cpu::dcp, // c0
    Cpu::bne, Cpu::cmp, Cpu::kil, Cpu::dcp, Cpu::nop, Cpu::cmp, Cpu::dec, Cpu::dcp, Cpu::cld, Cpu::cmp, Cpu::nop, Cpu::dcp, Cpu::nop, Cpu::cmp, Cpu::dec, Cpu::dcp, // d0
    Cpu::cpx, Cpu::sbc, Cpu::nop, Cpu::isc, Cpu::cpx, Cpu::sbc, Cpu::inc, Cpu::isc, Cpu::inx, Cpu::sbc, Cpu::nop, Cpu::sbc, Cpu::cpx, Cpu::sbc, Cpu::inc, Cpu::isc, // e0
    Cpu::beq, Cpu::sbc, Cpu::kil, Cpu::isc, Cpu::nop, Cpu::sbc, Cpu::inc, Cpu::isc, Cpu::sed, Cpu::sbc, Cpu::nop, Cpu::isc, Cpu::nop, Cpu::sbc, Cpu::inc, Cpu::isc, // f0
];

/// nestest mnemonics, unofficial opcodes are prefixed with `*`
#[rustfmt::skip]
pub const OP_NAMES: [&str; 256] = [
//  00      01      02      03      04      05      06      07      08      09      0a      0b      0c      0d      0e      0f
    "BRK",  "ORA",  "*KIL", "*SLO", "*NOP", "ORA",  "ASL",  "*SLO", "PHP",  "ORA",  "ASL",  "*ANC", "*NOP", "ORA",  "ASL",  "*SLO", // 00
    "BPL",  "ORA",  "*KIL", "*SLO", "*NOP", "ORA",  "ASL",  "*SLO", "CLC",  "ORA",  "*NOP", "*SLO", "*NOP", "ORA",  "ASL",  "*SLO", // 10
    "JSR",  "AND",  "*KIL", "*RLA", "BIT",  "AND",  "ROL",  "*RLA", "PLP",  "AND",  "ROL",  "*ANC", "BIT",  "AND",  "ROL",  "*RLA", // 20
    "BMI",  "AND",  "*KIL", "*RLA", "*NOP", "AND",  "ROL",  "*RLA", "SEC",  "AND",  "*NOP", "*RLA", "*NOP", "AND",  "ROL",  "*RLA", // 30
    "RTI",  "EOR",  "*KIL", "*SRE", "*NOP", "EOR",  "LSR",  "*SRE", "PHA",  "EOR",  "LSR",  "*ALR", "JMP",  "EOR",  "LSR",  "*SRE", // 40
    "BVC",  "EOR",  "*KIL", "*SRE", "*NOP", "EOR",  "LSR",  "*SRE", "CLI",  "EOR",  "*NOP", "*SRE", "*NOP", "EOR",  "LSR",  "*SRE", // 50
    "RTS",  "ADC",  "*KIL", "*RRA", "*NOP", "ADC",  "ROR",  "*RRA", "PLA",  "ADC",  "ROR",  "*KIL", "JMP",  "ADC",  "ROR",  "*RRA", // 60
    "BVS",  "ADC",  "*KIL", "*RRA", "*NOP", "ADC",  "ROR",  "*RRA", "SEI",  "ADC",  "*NOP", "*RRA", "*NOP", "ADC",  "ROR",  "*RRA", // 70
    "*NOP", "STA",  "*NOP", "*SAX", "STY",  "STA",  "STX",  "*SAX", "DEY",  "*NOP", "TXA",  "*KIL", "STY",  "STA",  "STX",  "*SAX", // 80
    "BCC",  "STA",  "*KIL", "*KIL", "STY",  "STA",  "STX",  "*SAX", "TYA",  "STA",  "TXS",  "*KIL", "*KIL", "STA",  "*KIL", "*KIL", // 90
    "LDY",  "LDA",  "LDX",  "*LAX", "LDY",  "LDA",  "LDX",  "*LAX", "TAY",  "LDA",  "TAX",  "*KIL", "LDY",  "LDA",  "LDX",  "*LAX", // a0
    "BCS",  "LDA",  "*KIL", "*LAX", "LDY",  "LDA",  "LDX",  "*LAX", "CLV",  "LDA",  "TSX",  "*KIL", "LDY",  "LDA",  "LDX",  "*LAX", // b0
    "CPY",  "CMP",  "*NOP", "*DCP", "CPY",  "CMP",  "DEC",  "*DCP", "INY",  "CMP",  "DEX",  "*KIL", "CPY",  "CMP",  "DEC",  "*DCP", // c0
    "BNE",  "CMP",  "*KIL", "*DCP", "*NOP", "CMP",  "DEC",  "*DCP", "CLD",  "CMP",  "*NOP", "*DCP", "*NOP", "CMP",  "DEC",  "*DCP", // d0
    "CPX",  "SBC",  "*NOP", "*ISB", "CPX",  "SBC",  "INC",  "*ISB", "INX",  "SBC",  "NOP",  "*SBC", "CPX",  "SBC",  "INC",  "*ISB", // e0
    "BEQ",  "SBC",  "*KIL", "*ISB", "*NOP", "SBC",  "INC",  "*ISB", "SED",  "SBC",  "*NOP", "*ISB", "*NOP", "SBC",  "INC",  "*ISB", // f0
];

/// Base cycles. Reads through ABX/ABY (4 cycles) and IZY (5 cycles) pay one
/// more on a page cross, taken branches pay one more plus one on a page cross.
#[rustfmt::skip]
pub const OP_CYCLES: [u8; 256] = [
//  0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f
    7, 6, 1, 8, 3, 3, 5, 5, 3, 2, 2, 2, 4, 4, 6, 6, // 00
    2, 5, 1, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 10
    6, 6, 1, 8, 3, 3, 5, 5, 4, 2, 2, 2, 4, 4, 6, 6, // 20
    2, 5, 1, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 30
    6, 6, 1, 8, 3, 3, 5, 5, 3, 2, 2, 2, 3, 4, 6, 6, // 40
    2, 5, 1, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 50
    6, 6, 1, 8, 3, 3, 5, 5, 4, 2, 2, 1, 5, 4, 6, 6, // 60
    2, 5, 1, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 70
    2, 6, 2, 6, 3, 3, 3, 3, 2, 2, 2, 1, 4, 4, 4, 4, // 80
    2, 6, 1, 1, 4, 4, 4, 4, 2, 5, 2, 1, 1, 5, 1, 1, // 90
    2, 6, 2, 6, 3, 3, 3, 3, 2, 2, 2, 1, 4, 4, 4, 4, // a0
    2, 5, 1, 5, 4, 4, 4, 4, 2, 4, 2, 1, 4, 4, 4, 4, // b0
    2, 6, 2, 8, 3, 3, 5, 5, 2, 2, 2, 1, 4, 4, 6, 6, // c0
    2, 5, 1, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // d0
    2, 6, 2, 8, 3, 3, 5, 5, 2, 2, 2, 2, 4, 4, 6, 6, // e0
    2, 5, 1, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // f0
];

impl Cpu {
    fn get_operand(&self, bus: &mut Bus) -> u8 {
        match self.op_mode {
            AddrMode::IMP => {
                debug_assert!(false, "implied op ${:02X} has no operand", self.op);
                0
            }
            AddrMode::ACC => self.a,
            _ => bus.read(self.op_address),
        }
    }

    /// read-modify-write on the accumulator or memory
    fn modify(&mut self, bus: &mut Bus, f: fn(&mut Cpu, u8) -> u8) -> u8 {
        let op = self.get_operand(bus);
        let op = f(self, op);

        if self.op_mode == AddrMode::ACC {
            self.a = op;
        } else {
            bus.write(self.op_address, op);
        }
        op
    }

    /// undefined opcodes run as a single cycle no-op
    fn kil(&mut self, _: &mut Bus) {
        log::warn!("undefined opcode ${:02X} at ${:04X}", self.op, self.pc.wrapping_sub(1));
    }

    fn nop(&mut self, bus: &mut Bus) {
        if !matches!(self.op_mode, AddrMode::IMP | AddrMode::IMM) {
            bus.read(self.op_address);
        }
    }
}

/// arith
impl Cpu {
    fn adc(&mut self, bus: &mut Bus) {
        let op = self.get_operand(bus);
        self._adc(op);
    }

    fn sbc(&mut self, bus: &mut Bus) {
        let op = self.get_operand(bus);
        self._adc(!op);
    }

    fn and(&mut self, bus: &mut Bus) {
        self.a &= self.get_operand(bus);
        self.p.set_zn(self.a);
    }

    fn ora(&mut self, bus: &mut Bus) {
        self.a |= self.get_operand(bus);
        self.p.set_zn(self.a);
    }

    fn eor(&mut self, bus: &mut Bus) {
        self.a ^= self.get_operand(bus);
        self.p.set_zn(self.a);
    }

    fn inc(&mut self, bus: &mut Bus) {
        self.modify(bus, Cpu::_inc);
    }

    fn inx(&mut self, _: &mut Bus) {
        self.x = self.x.wrapping_add(1);
        self.p.set_zn(self.x);
    }

    fn iny(&mut self, _: &mut Bus) {
        self.y = self.y.wrapping_add(1);
        self.p.set_zn(self.y);
    }

    fn dec(&mut self, bus: &mut Bus) {
        self.modify(bus, Cpu::_dec);
    }

    fn dex(&mut self, _: &mut Bus) {
        self.x = self.x.wrapping_sub(1);
        self.p.set_zn(self.x);
    }

    fn dey(&mut self, _: &mut Bus) {
        self.y = self.y.wrapping_sub(1);
        self.p.set_zn(self.y);
    }

    fn asl(&mut self, bus: &mut Bus) {
        self.modify(bus, Cpu::_asl);
    }

    fn lsr(&mut self, bus: &mut Bus) {
        self.modify(bus, Cpu::_lsr);
    }

    fn rol(&mut self, bus: &mut Bus) {
        self.modify(bus, Cpu::_rol);
    }

    fn ror(&mut self, bus: &mut Bus) {
        self.modify(bus, Cpu::_ror);
    }
}

/// branch and jump
impl Cpu {
    fn brk(&mut self, bus: &mut Bus) {
        // skips the padding byte after the opcode
        self.push_word(self.pc.wrapping_add(1), bus);
        self.push_byte(self.p.pushed(true), bus);
        self.p.insert(Status::IRQ_OFF);
        self.pc = self.read_word(0xfffe, bus);
    }

    fn bcc(&mut self, _: &mut Bus) {
        self._branch(!self.p.contains(Status::CARRY));
    }

    fn bcs(&mut self, _: &mut Bus) {
        self._branch(self.p.contains(Status::CARRY));
    }

    fn beq(&mut self, _: &mut Bus) {
        self._branch(self.p.contains(Status::ZERO));
    }

    fn bmi(&mut self, _: &mut Bus) {
        self._branch(self.p.contains(Status::NEGATIVE));
    }

    fn bne(&mut self, _: &mut Bus) {
        self._branch(!self.p.contains(Status::ZERO));
    }

    fn bpl(&mut self, _: &mut Bus) {
        self._branch(!self.p.contains(Status::NEGATIVE));
    }

    fn bvc(&mut self, _: &mut Bus) {
        self._branch(!self.p.contains(Status::OVERFLOW));
    }

    fn bvs(&mut self, _: &mut Bus) {
        self._branch(self.p.contains(Status::OVERFLOW));
    }

    fn jmp(&mut self, _: &mut Bus) {
        self.pc = self.op_address;
    }

    fn jsr(&mut self, bus: &mut Bus) {
        self.push_word(self.pc.wrapping_sub(1), bus);
        self.pc = self.op_address;
    }

    fn rti(&mut self, bus: &mut Bus) {
        let p = self.pop_byte(bus);
        self.p.pull(p);
        self.pc = self.pop_word(bus);
    }

    fn rts(&mut self, bus: &mut Bus) {
        self.pc = self.pop_word(bus).wrapping_add(1);
    }
}

/// move
impl Cpu {
    fn lda(&mut self, bus: &mut Bus) {
        self.a = self.get_operand(bus);
        self.p.set_zn(self.a);
    }

    fn ldx(&mut self, bus: &mut Bus) {
        self.x = self.get_operand(bus);
        self.p.set_zn(self.x);
    }

    fn ldy(&mut self, bus: &mut Bus) {
        self.y = self.get_operand(bus);
        self.p.set_zn(self.y);
    }

    fn pha(&mut self, bus: &mut Bus) {
        self.push_byte(self.a, bus);
    }

    fn php(&mut self, bus: &mut Bus) {
        self.push_byte(self.p.pushed(true), bus);
    }

    fn pla(&mut self, bus: &mut Bus) {
        self.a = self.pop_byte(bus);
        self.p.set_zn(self.a);
    }

    fn plp(&mut self, bus: &mut Bus) {
        let p = self.pop_byte(bus);
        self.p.pull(p);
    }

    fn sta(&mut self, bus: &mut Bus) {
        bus.write(self.op_address, self.a);
    }

    fn stx(&mut self, bus: &mut Bus) {
        bus.write(self.op_address, self.x);
    }

    fn sty(&mut self, bus: &mut Bus) {
        bus.write(self.op_address, self.y);
    }

    fn tax(&mut self, _: &mut Bus) {
        self.x = self.a;
        self.p.set_zn(self.x);
    }

    fn tay(&mut self, _: &mut Bus) {
        self.y = self.a;
        self.p.set_zn(self.y);
    }

    fn tsx(&mut self, _: &mut Bus) {
        self.x = self.sp;
        self.p.set_zn(self.x);
    }

    fn txs(&mut self, _: &mut Bus) {
        self.sp = self.x;
    }

    fn txa(&mut self, _: &mut Bus) {
        self.a = self.x;
        self.p.set_zn(self.a);
    }

    fn tya(&mut self, _: &mut Bus) {
        self.a = self.y;
        self.p.set_zn(self.a);
    }
}

/// flags
impl Cpu {
    fn bit(&mut self, bus: &mut Bus) {
        let op = self.get_operand(bus);
        self.p.set(Status::ZERO, (self.a & op) == 0);
        self.p.set(Status::NEGATIVE, (op & 0x80) != 0);
        self.p.set(Status::OVERFLOW, (op & 0x40) != 0);
    }

    fn cmp(&mut self, bus: &mut Bus) {
        let op = self.get_operand(bus);
        self._cmp(self.a, op);
    }

    fn cpx(&mut self, bus: &mut Bus) {
        let op = self.get_operand(bus);
        self._cmp(self.x, op);
    }

    fn cpy(&mut self, bus: &mut Bus) {
        let op = self.get_operand(bus);
        self._cmp(self.y, op);
    }

    fn clc(&mut self, _: &mut Bus) {
        self.p.remove(Status::CARRY);
    }

    fn cld(&mut self, _: &mut Bus) {
        self.p.remove(Status::DECIMAL);
    }

    fn cli(&mut self, _: &mut Bus) {
        self.p.remove(Status::IRQ_OFF);
    }

    fn clv(&mut self, _: &mut Bus) {
        self.p.remove(Status::OVERFLOW);
    }

    fn sec(&mut self, _: &mut Bus) {
        self.p.insert(Status::CARRY);
    }

    fn sed(&mut self, _: &mut Bus) {
        self.p.insert(Status::DECIMAL);
    }

    fn sei(&mut self, _: &mut Bus) {
        self.p.insert(Status::IRQ_OFF);
    }
}

/// unofficial
impl Cpu {
    fn lax(&mut self, bus: &mut Bus) {
        self.lda(bus);
        self.x = self.a;
    }

    fn sax(&mut self, bus: &mut Bus) {
        bus.write(self.op_address, self.a & self.x);
    }

    fn dcp(&mut self, bus: &mut Bus) {
        let op = self.modify(bus, Cpu::_dec);
        self._cmp(self.a, op);
    }

    fn isc(&mut self, bus: &mut Bus) {
        let op = self.modify(bus, Cpu::_inc);
        self._adc(!op);
    }

    fn slo(&mut self, bus: &mut Bus) {
        let op = self.modify(bus, Cpu::_asl);
        self.a |= op;
        self.p.set_zn(self.a);
    }

    fn rla(&mut self, bus: &mut Bus) {
        let op = self.modify(bus, Cpu::_rol);
        self.a &= op;
        self.p.set_zn(self.a);
    }

    fn sre(&mut self, bus: &mut Bus) {
        let op = self.modify(bus, Cpu::_lsr);
        self.a ^= op;
        self.p.set_zn(self.a);
    }

    fn rra(&mut self, bus: &mut Bus) {
        let op = self.modify(bus, Cpu::_ror);
        self._adc(op);
    }

    fn anc(&mut self, bus: &mut Bus) {
        self.and(bus);
        let n = self.p.contains(Status::NEGATIVE);
        self.p.set(Status::CARRY, n);
    }

    fn alr(&mut self, bus: &mut Bus) {
        self.a &= self.get_operand(bus);
        self.a = self._lsr(self.a);
    }
}

impl Cpu {
    fn _adc(&mut self, op: u8) {
        let sum = self.a as u16 + op as u16 + self.p.carry() as u16;

        self.p.set(Status::CARRY, sum > 0xff);
        self.p.set(
            Status::OVERFLOW,
            (!(self.a ^ op) & (self.a ^ sum as u8) & 0x80) != 0,
        );
        self.a = sum as u8;
        self.p.set_zn(self.a);
    }

    fn _branch(&mut self, taken: bool) {
        if taken {
            self.cycles_until_next += 1 + self.cross_page as i16;
            self.pc = self.op_address;
        }
    }

    fn _cmp(&mut self, a: u8, b: u8) {
        self.p.set(Status::CARRY, a >= b);
        self.p.set_zn(a.wrapping_sub(b));
    }

    fn _inc(&mut self, op: u8) -> u8 {
        let op = op.wrapping_add(1);
        self.p.set_zn(op);
        op
    }

    fn _dec(&mut self, op: u8) -> u8 {
        let op = op.wrapping_sub(1);
        self.p.set_zn(op);
        op
    }

    fn _asl(&mut self, op: u8) -> u8 {
        self.p.set(Status::CARRY, (op & 0x80) != 0);
        let op = op << 1;
        self.p.set_zn(op);
        op
    }

    fn _lsr(&mut self, op: u8) -> u8 {
        self.p.set(Status::CARRY, (op & 0x01) != 0);
        let op = op >> 1;
        self.p.set_zn(op);
        op
    }

    fn _rol(&mut self, op: u8) -> u8 {
        let c = self.p.carry();
        self.p.set(Status::CARRY, (op & 0x80) != 0);
        let op = (op << 1) | c;
        self.p.set_zn(op);
        op
    }

    fn _ror(&mut self, op: u8) -> u8 {
        let c = self.p.carry();
        self.p.set(Status::CARRY, (op & 0x01) != 0);
        let op = (op >> 1) | (c << 7);
        self.p.set_zn(op);
        op
    }
}
