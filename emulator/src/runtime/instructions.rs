use parse_display::Display;
use tracing::debug;

use crate::constants::Word;
use crate::io::Console;

use super::{
    exception::{DecodeError, Opcode},
    registers::{Condition, Reg, Registers},
    trap::TrapVector,
    Computer, ProcessorError,
};

/// Widen the low `bit_count` bits of `value`, read as two's complement, to a
/// full word.
///
/// `bit_count` must be between 1 and 16.
#[must_use]
pub const fn sign_extend(value: Word, bit_count: u32) -> Word {
    debug_assert!(matches!(bit_count, 1..=16));
    let mask = ((1_u32 << bit_count) - 1) as Word;
    let value = value & mask;
    if (value >> (bit_count - 1)) & 1 == 1 {
        value | !mask
    } else {
        value
    }
}

/// Signed offset stored in the low `bit_count` bits of an instruction
const fn offset(word: Word, bit_count: u32) -> i16 {
    sign_extend(word, bit_count) as i16
}

/// Second operand of `ADD` and `AND`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Operand {
    #[display("{0}")]
    Reg(Reg),

    #[display("#{0}")]
    Imm(i16),
}

impl Operand {
    fn value(self, registers: &Registers) -> Word {
        match self {
            Self::Reg(reg) => registers.get(reg),
            Self::Imm(imm) => imm as Word,
        }
    }
}

/// Where `JSR`/`JSRR` jumps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum JsrTarget {
    #[display("jsr  #{0}")]
    Offset(i16),

    #[display("jsrr {0}")]
    Reg(Reg),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Instruction {
    /// Add two values
    #[display("add  {dr}, {sr1}, {operand}")]
    Add { dr: Reg, sr1: Reg, operand: Operand },

    /// Bitwise `and` of two values
    #[display("and  {dr}, {sr1}, {operand}")]
    And { dr: Reg, sr1: Reg, operand: Operand },

    /// Bitwise complement
    #[display("not  {dr}, {sr}")]
    Not { dr: Reg, sr: Reg },

    /// Jump relative to `PC` if one of the tested flags is set
    #[display("br{test} #{offset}")]
    Br { test: Condition, offset: i16 },

    /// Jump to the address in a register. `jmp r7` is a return
    #[display("jmp  {base}")]
    Jmp { base: Reg },

    /// Save `PC` in `R7` and jump
    #[display("{0}")]
    Jsr(JsrTarget),

    /// Load a word relative to `PC`
    #[display("ld   {dr}, #{offset}")]
    Ld { dr: Reg, offset: i16 },

    /// Load a word through a pointer stored relative to `PC`
    #[display("ldi  {dr}, #{offset}")]
    Ldi { dr: Reg, offset: i16 },

    /// Load a word relative to a base register
    #[display("ldr  {dr}, {base}, #{offset}")]
    Ldr { dr: Reg, base: Reg, offset: i16 },

    /// Compute an address relative to `PC`
    #[display("lea  {dr}, #{offset}")]
    Lea { dr: Reg, offset: i16 },

    /// Store a register relative to `PC`
    #[display("st   {sr}, #{offset}")]
    St { sr: Reg, offset: i16 },

    /// Store a register through a pointer stored relative to `PC`
    #[display("sti  {sr}, #{offset}")]
    Sti { sr: Reg, offset: i16 },

    /// Store a register relative to a base register
    #[display("str  {sr}, {base}, #{offset}")]
    Str { sr: Reg, base: Reg, offset: i16 },

    /// Call a built-in service routine
    #[display("trap {0}")]
    Trap(TrapVector),
}

impl Instruction {
    /// Decode an instruction word
    ///
    /// # Errors
    ///
    /// Fails on the `RTI` and `RES` opcodes, and on traps with an unknown
    /// vector.
    pub fn decode(word: Word) -> Result<Self, DecodeError> {
        let dr = Reg::from_field(word, 9);
        let sr1 = Reg::from_field(word, 6);
        let operand = || {
            if word & (1 << 5) == 0 {
                Operand::Reg(Reg::from_field(word, 0))
            } else {
                Operand::Imm(offset(word, 5))
            }
        };

        let instruction = match Opcode::from_word(word) {
            Opcode::Add => Self::Add {
                dr,
                sr1,
                operand: operand(),
            },
            Opcode::And => Self::And {
                dr,
                sr1,
                operand: operand(),
            },
            Opcode::Not => Self::Not { dr, sr: sr1 },
            Opcode::Br => Self::Br {
                test: Condition::from_bits_truncate(word >> 9),
                offset: offset(word, 9),
            },
            Opcode::Jmp => Self::Jmp { base: sr1 },
            Opcode::Jsr => {
                if word & (1 << 11) == 0 {
                    Self::Jsr(JsrTarget::Reg(sr1))
                } else {
                    Self::Jsr(JsrTarget::Offset(offset(word, 11)))
                }
            }
            Opcode::Ld => Self::Ld {
                dr,
                offset: offset(word, 9),
            },
            Opcode::Ldi => Self::Ldi {
                dr,
                offset: offset(word, 9),
            },
            Opcode::Ldr => Self::Ldr {
                dr,
                base: sr1,
                offset: offset(word, 6),
            },
            Opcode::Lea => Self::Lea {
                dr,
                offset: offset(word, 9),
            },
            Opcode::St => Self::St {
                sr: dr,
                offset: offset(word, 9),
            },
            Opcode::Sti => Self::Sti {
                sr: dr,
                offset: offset(word, 9),
            },
            Opcode::Str => Self::Str {
                sr: dr,
                base: sr1,
                offset: offset(word, 6),
            },
            Opcode::Trap => {
                let vector = (word & 0xFF) as u8;
                let vector =
                    TrapVector::try_from(vector).map_err(|_| DecodeError::UnknownTrap(vector))?;
                Self::Trap(vector)
            }
            opcode @ (Opcode::Rti | Opcode::Res) => {
                return Err(DecodeError::ReservedOpcode(opcode));
            }
        };

        Ok(instruction)
    }

    /// Execute the instruction.
    ///
    /// `PC` already points to the next instruction.
    #[tracing::instrument(skip(computer))]
    pub(crate) fn execute<C: Console>(
        &self,
        computer: &mut Computer<C>,
    ) -> Result<(), ProcessorError> {
        use Instruction::{Add, And, Br, Jmp, Jsr, Ld, Ldi, Ldr, Lea, Not, St, Sti, Str, Trap};

        let pc = computer.registers.pc;

        match *self {
            Add { dr, sr1, operand } => {
                let a = computer.registers.get(sr1);
                let b = operand.value(&computer.registers);
                let res = a.wrapping_add(b);
                debug!("{a:#06x} + {b:#06x} = {res:#06x}");
                computer.set_register(dr, res);
            }

            And { dr, sr1, operand } => {
                let a = computer.registers.get(sr1);
                let b = operand.value(&computer.registers);
                let res = a & b;
                debug!("{a:#06x} & {b:#06x} = {res:#06x}");
                computer.set_register(dr, res);
            }

            Not { dr, sr } => {
                let val = computer.registers.get(sr);
                let res = !val;
                debug!("!{val:#06x} = {res:#06x}");
                computer.set_register(dr, res);
            }

            Br { test, offset } => {
                if computer.registers.cond().intersects(test) {
                    computer.jump(pc.wrapping_add_signed(offset));
                }
            }

            Jmp { base } => {
                computer.jump(computer.registers.get(base));
            }

            Jsr(target) => {
                // R7 is written first, `jsrr r7` lands on the return address
                computer.registers.set(Reg::R7, pc);
                let address = match target {
                    JsrTarget::Offset(offset) => pc.wrapping_add_signed(offset),
                    JsrTarget::Reg(base) => computer.registers.get(base),
                };
                computer.jump(address);
            }

            Ld { dr, offset } => {
                let val = computer.read(pc.wrapping_add_signed(offset))?;
                computer.set_register(dr, val);
            }

            Ldi { dr, offset } => {
                let pointer = computer.read(pc.wrapping_add_signed(offset))?;
                let val = computer.read(pointer)?;
                computer.set_register(dr, val);
            }

            Ldr { dr, base, offset } => {
                let address = computer.registers.get(base).wrapping_add_signed(offset);
                let val = computer.read(address)?;
                computer.set_register(dr, val);
            }

            Lea { dr, offset } => {
                computer.set_register(dr, pc.wrapping_add_signed(offset));
            }

            St { sr, offset } => {
                let val = computer.registers.get(sr);
                computer.write(pc.wrapping_add_signed(offset), val);
            }

            Sti { sr, offset } => {
                let val = computer.registers.get(sr);
                let pointer = computer.read(pc.wrapping_add_signed(offset))?;
                computer.write(pointer, val);
            }

            Str { sr, base, offset } => {
                let val = computer.registers.get(sr);
                let address = computer.registers.get(base).wrapping_add_signed(offset);
                computer.write(address, val);
            }

            Trap(vector) => vector.dispatch(computer)?,
        };

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::io::BufferedConsole;

    fn computer() -> Computer<BufferedConsole<Vec<u8>>> {
        Computer::new(BufferedConsole::new(Vec::<u8>::new(), Vec::<u8>::new()))
    }

    fn execute(computer: &mut Computer<BufferedConsole<Vec<u8>>>, word: Word) {
        // Behave as if the instruction was just fetched
        computer.registers.pc = computer.registers.pc.wrapping_add(1);
        Instruction::decode(word)
            .unwrap()
            .execute(computer)
            .unwrap();
    }

    #[test]
    fn sign_extend_test() {
        assert_eq!(sign_extend(0b11111, 5), 0xFFFF);
        assert_eq!(sign_extend(0b01111, 5), 0x000F);
        assert_eq!(sign_extend(0b1_0000_0000, 9), 0xFF00);
        assert_eq!(sign_extend(0x7FF, 11), 0xFFFF);
        assert_eq!(sign_extend(0x3FF, 11), 0x03FF);
        // Bits above the field are ignored
        assert_eq!(sign_extend(0xFFE5, 5), 0x0005);
        assert_eq!(sign_extend(0x8000, 16), 0x8000);

        for bit_count in 1..=15 {
            let sign = 1 << (bit_count - 1);
            let low = sign - 1;
            assert_eq!(sign_extend(low, bit_count), low, "n = {bit_count}");
            assert_eq!(sign_extend(sign, bit_count), !low, "n = {bit_count}");
            assert_eq!(sign_extend(sign | low, bit_count), 0xFFFF, "n = {bit_count}");
        }
    }

    #[test]
    fn decode_test() {
        assert_eq!(
            Instruction::decode(0x1065).unwrap(),
            Instruction::Add {
                dr: Reg::R0,
                sr1: Reg::R1,
                operand: Operand::Imm(5)
            }
        );
        assert_eq!(
            Instruction::decode(0x5482).unwrap(),
            Instruction::And {
                dr: Reg::R2,
                sr1: Reg::R2,
                operand: Operand::Reg(Reg::R2)
            }
        );
        assert_eq!(
            Instruction::decode(0x0E01).unwrap(),
            Instruction::Br {
                test: Condition::all(),
                offset: 1
            }
        );
        assert_eq!(
            Instruction::decode(0x4FFF).unwrap(),
            Instruction::Jsr(JsrTarget::Offset(-1))
        );
        assert_eq!(
            Instruction::decode(0x4080).unwrap(),
            Instruction::Jsr(JsrTarget::Reg(Reg::R2))
        );
        assert_eq!(
            Instruction::decode(0x6A7F).unwrap(),
            Instruction::Ldr {
                dr: Reg::R5,
                base: Reg::R1,
                offset: -1
            }
        );
        assert_eq!(
            Instruction::decode(0xF025).unwrap(),
            Instruction::Trap(TrapVector::Halt)
        );
    }

    #[test]
    fn decode_errors_test() {
        assert_eq!(
            Instruction::decode(0x8000),
            Err(DecodeError::ReservedOpcode(Opcode::Rti))
        );
        assert_eq!(
            Instruction::decode(0xD000),
            Err(DecodeError::ReservedOpcode(Opcode::Res))
        );
        assert_eq!(
            Instruction::decode(0xF0FF),
            Err(DecodeError::UnknownTrap(0xFF))
        );
    }

    #[test]
    fn display_test() {
        insta::assert_snapshot!(Instruction::decode(0x1065).unwrap(), @"add  r0, r1, #5");
        insta::assert_snapshot!(Instruction::decode(0x1DBF).unwrap(), @"add  r6, r6, #-1");
        insta::assert_snapshot!(Instruction::decode(0x5482).unwrap(), @"and  r2, r2, r2");
        insta::assert_snapshot!(Instruction::decode(0x967F).unwrap(), @"not  r3, r1");
        insta::assert_snapshot!(Instruction::decode(0x0BFD).unwrap(), @"brnp #-3");
        insta::assert_snapshot!(Instruction::decode(0xC1C0).unwrap(), @"jmp  r7");
        insta::assert_snapshot!(Instruction::decode(0x4805).unwrap(), @"jsr  #5");
        insta::assert_snapshot!(Instruction::decode(0x4180).unwrap(), @"jsrr r6");
        insta::assert_snapshot!(Instruction::decode(0x2402).unwrap(), @"ld   r2, #2");
        insta::assert_snapshot!(Instruction::decode(0xE1FE).unwrap(), @"lea  r0, #-2");
        insta::assert_snapshot!(Instruction::decode(0x7E3F).unwrap(), @"str  r7, r0, #-1");
        insta::assert_snapshot!(Instruction::decode(0xF022).unwrap(), @"trap puts");
    }

    #[test]
    fn add_test() {
        let mut computer = computer();
        computer.registers.set(Reg::R1, 10);

        // add r0, r1, #5
        execute(&mut computer, 0x1065);
        assert_eq!(computer.registers.get(Reg::R0), 15);
        assert_eq!(computer.registers.cond(), Condition::POSITIVE);

        // add r2, r0, r1
        execute(&mut computer, 0x1401);
        assert_eq!(computer.registers.get(Reg::R2), 25);

        // add r0, r0, #-16
        execute(&mut computer, 0x1030);
        assert_eq!(computer.registers.get(Reg::R0), 0xFFFF);
        assert_eq!(computer.registers.cond(), Condition::NEGATIVE);
    }

    #[test]
    fn add_wraparound_test() {
        let mut computer = computer();
        computer.registers.set(Reg::R0, 0xFFFF);

        // add r0, r0, #1
        execute(&mut computer, 0x1021);
        assert_eq!(computer.registers.get(Reg::R0), 0);
        assert_eq!(computer.registers.cond(), Condition::ZERO);
    }

    #[test]
    fn and_not_test() {
        let mut computer = computer();
        computer.registers.set(Reg::R1, 0b1010_1100);
        computer.registers.set(Reg::R2, 0b0110_0110);

        // and r0, r1, r2
        execute(&mut computer, 0x5042);
        assert_eq!(computer.registers.get(Reg::R0), 0b0010_0100);
        assert_eq!(computer.registers.cond(), Condition::POSITIVE);

        // and r0, r0, #0
        execute(&mut computer, 0x5020);
        assert_eq!(computer.registers.get(Reg::R0), 0);
        assert_eq!(computer.registers.cond(), Condition::ZERO);

        // not r3, r1
        execute(&mut computer, 0x967F);
        assert_eq!(computer.registers.get(Reg::R3), 0xFF53);
        assert_eq!(computer.registers.cond(), Condition::NEGATIVE);
    }

    #[test]
    fn branch_test() {
        let mut computer = computer();
        computer.registers.set_cond(Condition::NEGATIVE);
        computer.registers.pc = 0x3000;

        // brn #4
        execute(&mut computer, 0x0804);
        assert_eq!(computer.registers.pc, 0x3005);

        // brp #4
        computer.registers.pc = 0x3000;
        execute(&mut computer, 0x0204);
        assert_eq!(computer.registers.pc, 0x3001);

        // brnzp #-1 loops on itself
        computer.registers.pc = 0x3000;
        execute(&mut computer, 0x0FFF);
        assert_eq!(computer.registers.pc, 0x3000);

        // Branches do not touch the flags
        assert_eq!(computer.registers.cond(), Condition::NEGATIVE);
    }

    #[test]
    fn jump_test() {
        let mut computer = computer();
        computer.registers.pc = 0x3000;
        computer.registers.set(Reg::R3, 0x4000);

        // jmp r3
        execute(&mut computer, 0xC0C0);
        assert_eq!(computer.registers.pc, 0x4000);

        // jsr #-2
        execute(&mut computer, 0x4FFE);
        assert_eq!(computer.registers.get(Reg::R7), 0x4001);
        assert_eq!(computer.registers.pc, 0x3FFF);

        // jsrr r3
        execute(&mut computer, 0x40C0);
        assert_eq!(computer.registers.get(Reg::R7), 0x4000);
        assert_eq!(computer.registers.pc, 0x4000);

        // jsrr r7 overwrites r7 before reading it
        computer.registers.set(Reg::R7, 0x5000);
        execute(&mut computer, 0x41C0);
        assert_eq!(computer.registers.get(Reg::R7), 0x4001);
        assert_eq!(computer.registers.pc, 0x4001);

        // ret
        execute(&mut computer, 0xC1C0);
        assert_eq!(computer.registers.pc, 0x4001);
    }

    #[test]
    fn load_test() {
        let mut computer = computer();
        computer.registers.pc = 0x3000;
        computer.write(0x3003, 0x8001);
        computer.write(0x2FF1, 0x0042);

        // ld r2, #2
        execute(&mut computer, 0x2402);
        assert_eq!(computer.registers.get(Reg::R2), 0x8001);
        assert_eq!(computer.registers.cond(), Condition::NEGATIVE);

        // ldr r4, r2, #-1 with r2 = 0x2FF2
        computer.registers.set(Reg::R2, 0x2FF2);
        execute(&mut computer, 0x68BF);
        assert_eq!(computer.registers.get(Reg::R4), 0x0042);
        assert_eq!(computer.registers.cond(), Condition::POSITIVE);

        // lea r0, #-2
        computer.registers.pc = 0x3000;
        execute(&mut computer, 0xE1FE);
        assert_eq!(computer.registers.get(Reg::R0), 0x2FFF);
        assert_eq!(computer.registers.cond(), Condition::POSITIVE);
    }

    #[test]
    fn indirect_test() {
        let mut computer = computer();
        computer.registers.pc = 0x3000;
        // The value at A = 0x4000 is V, and the pointer at P = 0x3011 is A
        computer.write(0x4000, 0x1234);
        computer.write(0x3011, 0x4000);

        // ldi r1, #16
        execute(&mut computer, 0xA210);
        assert_eq!(computer.registers.get(Reg::R1), 0x1234);
        assert_eq!(computer.registers.cond(), Condition::POSITIVE);

        // sti r3, #15 with r3 = 0
        computer.registers.pc = 0x3001;
        computer.registers.set(Reg::R3, 0);
        execute(&mut computer, 0xB60F);
        assert_eq!(computer.memory.get(0x4000), 0);
        // Stores do not change the flags
        assert_eq!(computer.registers.cond(), Condition::POSITIVE);
    }

    #[test]
    fn store_test() {
        let mut computer = computer();
        computer.registers.pc = 0x3000;
        computer.registers.set(Reg::R5, 0xCAFE);
        computer.registers.set(Reg::R6, 0x0000);

        // st r5, #-2
        execute(&mut computer, 0x3BFE);
        assert_eq!(computer.memory.get(0x2FFF), 0xCAFE);

        // str r5, r6, #-1 wraps around the address space
        execute(&mut computer, 0x7BBF);
        assert_eq!(computer.memory.get(0xFFFF), 0xCAFE);

        assert_eq!(computer.registers.cond(), Condition::ZERO);
    }
}
