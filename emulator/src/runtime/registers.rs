use bitflags::bitflags;
use parse_display::Display;

use crate::constants as C;

bitflags! {
    /// The condition register.
    ///
    /// After any register-defining instruction exactly one flag is set. The
    /// same bits are used by `BR` to encode which flags it tests.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Condition: C::Word {
        const POSITIVE = 0b001;
        const ZERO     = 0b010;
        const NEGATIVE = 0b100;
    }
}

impl Condition {
    /// Sign class of a word, read as two's complement
    #[must_use]
    pub const fn of(value: C::Word) -> Self {
        if value == 0 {
            Self::ZERO
        } else if value >> 15 == 1 {
            Self::NEGATIVE
        } else {
            Self::POSITIVE
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        // Every register starts at zero
        Condition::ZERO
    }
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let n = if self.contains(Self::NEGATIVE) { 'n' } else { '-' };
        let z = if self.contains(Self::ZERO) { 'z' } else { '-' };
        let p = if self.contains(Self::POSITIVE) { 'p' } else { '-' };
        write!(f, "{n}{z}{p}")
    }
}

/// Only the set flags, as written after `BR`
impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (flag, name) in [
            (Self::NEGATIVE, "n"),
            (Self::ZERO, "z"),
            (Self::POSITIVE, "p"),
        ] {
            if self.contains(flag) {
                f.write_str(name)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    /// General purpose registers, `R7` doubles as the link register
    gp: [C::Word; 8],

    /// Program counter
    pub pc: C::Address,

    /// Condition flags
    cond: Condition,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            gp: [0; 8],
            pc: C::PROGRAM_START,
            cond: Condition::default(),
        }
    }
}

impl Registers {
    #[must_use]
    pub fn get(&self, reg: Reg) -> C::Word {
        self.gp[reg.index()]
    }

    pub fn set(&mut self, reg: Reg, value: C::Word) {
        self.gp[reg.index()] = value;
    }

    #[must_use]
    pub const fn cond(&self) -> Condition {
        self.cond
    }

    pub fn set_cond(&mut self, cond: Condition) {
        self.cond = cond;
    }

    /// Set the condition flags from the current value of a register
    pub fn update_flags(&mut self, reg: Reg) {
        self.cond = Condition::of(self.get(reg));
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (reg, value) in Reg::ALL.iter().zip(self.gp) {
            write!(f, "{reg} = {value:#06x} | ")?;
        }
        write!(f, "pc = {:#06x} | cond = {:?}", self.pc, self.cond)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "lowercase")]
pub enum Reg {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    /// Return address of `JSR`/`JSRR`
    R7,
}

impl Reg {
    pub const ALL: [Reg; 8] = [
        Reg::R0,
        Reg::R1,
        Reg::R2,
        Reg::R3,
        Reg::R4,
        Reg::R5,
        Reg::R6,
        Reg::R7,
    ];

    /// Register encoded in the three bits of `word` starting at `shift`
    #[must_use]
    pub fn from_field(word: C::Word, shift: u32) -> Self {
        Self::ALL[usize::from((word >> shift) & 0b111)]
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}
