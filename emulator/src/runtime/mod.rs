use std::io;

use thiserror::Error;
use tracing::{debug, info};

use crate::constants as C;
use crate::image::Image;
use crate::io::Console;

mod exception;
mod instructions;
mod memory;
mod registers;
mod trap;

pub use self::exception::{DecodeError, Exception, Opcode};
pub use self::instructions::{sign_extend, Instruction, JsrTarget, Operand};
pub use self::memory::Memory;
pub use self::registers::{Condition, Reg, Registers};
pub use self::trap::TrapVector;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("CPU exception: {0}")]
    Exception(#[from] Exception),

    #[error("console error: {0}")]
    Io(#[from] io::Error),

    #[error("computer is halted")]
    Halted,
}

type Result<T> = std::result::Result<T, ProcessorError>;

/// The whole machine state: registers, memory and the attached console.
///
/// Nothing is shared between two computers, so any number of them can run
/// side by side.
pub struct Computer<T> {
    pub registers: Registers,
    pub memory: Memory,
    console: T,
    running: bool,
    cycles: u64,
}

impl<T> std::fmt::Debug for Computer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Computer {{ registers: {:?}, memory: [...], running: {}, cycles: {} }}",
            self.registers, self.running, self.cycles
        )
    }
}

impl<T: Console> Computer<T> {
    /// A computer with zeroed registers and memory, about to execute the
    /// instruction at `0x3000`
    #[must_use]
    pub fn new(console: T) -> Self {
        Self {
            registers: Registers::default(),
            memory: Memory::default(),
            console,
            running: true,
            cycles: 0,
        }
    }

    /// Copy an image in memory
    pub fn load(&mut self, image: &Image) {
        debug!(
            origin = image.origin,
            len = image.words.len(),
            "Loading image"
        );
        self.memory.load(image);
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Number of instructions executed so far
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    #[must_use]
    pub const fn console(&self) -> &T {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut T {
        &mut self.console
    }

    #[must_use]
    pub fn into_console(self) -> T {
        self.console
    }

    /// Read memory like the processor does, polling the keyboard if needed
    ///
    /// # Errors
    ///
    /// Fails if the console can't be polled
    pub fn read(&mut self, address: C::Address) -> Result<C::Word> {
        Ok(self.memory.read(address, &mut self.console)?)
    }

    pub fn write(&mut self, address: C::Address, value: C::Word) {
        self.memory.write(address, value);
    }

    /// Set a register and the condition flags after it
    fn set_register(&mut self, reg: Reg, value: C::Word) {
        self.registers.set(reg, value);
        self.registers.update_flags(reg);
    }

    fn jump(&mut self, address: C::Address) {
        debug!("Jumping to address {address:#06x}");
        self.registers.pc = address;
    }

    #[tracing::instrument(skip(self), err)]
    fn decode_instruction(&mut self) -> Result<Instruction> {
        let address = self.registers.pc;
        let word = self.read(address)?;
        self.registers.pc = address.wrapping_add(1);
        Instruction::decode(word).map_err(|reason| {
            Exception::IllegalInstruction {
                address,
                instruction: word,
                reason,
            }
            .into()
        })
    }

    /// Fetch, decode and execute one instruction
    ///
    /// # Errors
    ///
    /// Any error stops the computer for good.
    #[tracing::instrument(skip(self), level = "debug", fields(pc = self.registers.pc))]
    pub fn step(&mut self) -> Result<()> {
        if !self.running {
            return Err(ProcessorError::Halted);
        }

        let res = self
            .decode_instruction()
            .and_then(|inst| {
                debug!("Executing instruction \"{inst}\"");
                inst.execute(self)
            });

        if res.is_err() {
            self.running = false;
        }
        res?;

        self.cycles += 1;
        debug!("Register state {}", self.registers);
        Ok(())
    }

    /// Run until the program halts
    ///
    /// # Errors
    ///
    /// Returns the first error hit by [`Computer::step`]
    #[tracing::instrument(skip(self))]
    pub fn run(&mut self) -> Result<()> {
        info!(pc = self.registers.pc, "Starting");
        while self.running {
            self.step()?;
        }
        Ok(())
    }

    /// Run at most `limit` instructions, returning `true` once the program
    /// has halted
    ///
    /// # Errors
    ///
    /// Returns the first error hit by [`Computer::step`]
    pub fn run_for(&mut self, limit: u64) -> Result<bool> {
        for _ in 0..limit {
            if !self.running {
                break;
            }
            self.step()?;
        }
        Ok(!self.running)
    }
}
