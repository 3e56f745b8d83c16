use parse_display::Display;
use thiserror::Error;

use crate::constants::{Address, Word};

/// The 4-bit operation code in the top of an instruction word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "UPPERCASE")]
pub enum Opcode {
    Br,
    Add,
    Ld,
    St,
    Jsr,
    And,
    Ldr,
    Str,
    Rti,
    Not,
    Ldi,
    Sti,
    Jmp,
    Res,
    Lea,
    Trap,
}

impl Opcode {
    const ALL: [Opcode; 16] = [
        Opcode::Br,
        Opcode::Add,
        Opcode::Ld,
        Opcode::St,
        Opcode::Jsr,
        Opcode::And,
        Opcode::Ldr,
        Opcode::Str,
        Opcode::Rti,
        Opcode::Not,
        Opcode::Ldi,
        Opcode::Sti,
        Opcode::Jmp,
        Opcode::Res,
        Opcode::Lea,
        Opcode::Trap,
    ];

    #[must_use]
    pub fn from_word(word: Word) -> Self {
        Self::ALL[usize::from(word >> 12)]
    }
}

/// Why an instruction word could not be decoded
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("opcode {0} is not implemented by this machine")]
    ReservedOpcode(Opcode),

    #[error("unknown trap vector {0:#04x}")]
    UnknownTrap(u8),
}

/// Faults that stop the processor. There is no way to recover from them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Exception {
    #[error("illegal instruction {instruction:#06x} at {address:#06x}")]
    IllegalInstruction {
        address: Address,
        instruction: Word,
        #[source]
        reason: DecodeError,
    },
}
