//! Built-in service routines called by the `TRAP` instruction

use parse_display::Display;
use tracing::{debug, info};

use crate::constants::{Address, Word};
use crate::io::Console;

use super::{registers::Reg, Computer, ProcessorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "lowercase")]
#[repr(u8)]
pub enum TrapVector {
    /// Read a character, without echo
    Getc = 0x20,

    /// Write a character
    Out = 0x21,

    /// Write a string of one character per word
    Puts = 0x22,

    /// Prompt for a character and echo it
    In = 0x23,

    /// Write a string of two characters per word
    Putsp = 0x24,

    /// Stop the computer
    Halt = 0x25,
}

impl TryFrom<u8> for TrapVector {
    type Error = u8;

    fn try_from(vector: u8) -> Result<Self, Self::Error> {
        match vector {
            0x20 => Ok(Self::Getc),
            0x21 => Ok(Self::Out),
            0x22 => Ok(Self::Puts),
            0x23 => Ok(Self::In),
            0x24 => Ok(Self::Putsp),
            0x25 => Ok(Self::Halt),
            other => Err(other),
        }
    }
}

/// Words of the string starting at `start`, up to the terminating zero.
///
/// Reads bypass the keyboard registers and stop after one full turn of the
/// address space.
fn string_at<C: Console>(
    computer: &Computer<C>,
    start: Address,
) -> impl Iterator<Item = Word> + '_ {
    (0..=Address::MAX)
        .map(move |i| computer.memory.get(start.wrapping_add(i)))
        .take_while(|word| *word != 0)
}

impl TrapVector {
    /// Run the routine. `PC` is left untouched and `R7` is not saved.
    #[tracing::instrument(skip(computer))]
    pub(crate) fn dispatch<C: Console>(
        self,
        computer: &mut Computer<C>,
    ) -> Result<(), ProcessorError> {
        let r0 = computer.registers.get(Reg::R0);

        match self {
            Self::Getc => {
                let byte = computer.console.read_byte()?;
                debug!(byte, "getc");
                computer.registers.set(Reg::R0, Word::from(byte));
            }

            Self::Out => {
                computer.console.write_byte((r0 & 0xFF) as u8)?;
                computer.console.flush()?;
            }

            Self::Puts => {
                let bytes: Vec<u8> = string_at(computer, r0)
                    .map(|word| (word & 0xFF) as u8)
                    .collect();
                debug!(len = bytes.len(), "puts");
                for byte in bytes {
                    computer.console.write_byte(byte)?;
                }
                computer.console.flush()?;
            }

            Self::In => {
                computer.console.write_byte(b'>')?;
                computer.console.flush()?;
                let byte = computer.console.read_byte()?;
                computer.console.write_byte(byte)?;
                computer.console.flush()?;
                computer.registers.set(Reg::R0, Word::from(byte));
            }

            Self::Putsp => {
                let bytes: Vec<u8> = string_at(computer, r0)
                    .flat_map(|word| [(word & 0xFF) as u8, ((word & 0xFF00) >> 8) as u8])
                    .take_while(|byte| *byte != 0)
                    .collect();
                debug!(len = bytes.len(), "putsp");
                for byte in bytes {
                    computer.console.write_byte(byte)?;
                }
                computer.console.flush()?;
            }

            Self::Halt => {
                for byte in b"HALT\n" {
                    computer.console.write_byte(*byte)?;
                }
                computer.console.flush()?;
                info!(cycles = computer.cycles, "Halting");
                computer.running = false;
            }
        }

        Ok(())
    }
}
