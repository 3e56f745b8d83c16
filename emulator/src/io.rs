//! Character I/O used by the keyboard registers and the trap routines

use std::collections::VecDeque;
use std::io::{self, Write};

/// A byte-oriented terminal the computer talks to.
pub trait Console {
    /// Check, without blocking, if a byte can be read
    fn byte_available(&mut self) -> io::Result<bool>;

    /// Read one byte, blocking until one is available.
    ///
    /// Implementations return an [`io::ErrorKind::UnexpectedEof`] error when
    /// the input is exhausted.
    fn read_byte(&mut self) -> io::Result<u8>;

    fn write_byte(&mut self, byte: u8) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

impl<C: Console + ?Sized> Console for &mut C {
    fn byte_available(&mut self) -> io::Result<bool> {
        (**self).byte_available()
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        (**self).read_byte()
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        (**self).write_byte(byte)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// A console fed from a fixed input queue.
///
/// Used for tests and when the standard input is not a terminal.
#[derive(Debug, Default)]
pub struct BufferedConsole<W> {
    input: VecDeque<u8>,
    output: W,
}

impl<W: Write> BufferedConsole<W> {
    #[must_use]
    pub fn new(input: impl Into<VecDeque<u8>>, output: W) -> Self {
        Self {
            input: input.into(),
            output,
        }
    }

    /// Queue more input bytes
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    #[must_use]
    pub fn output(&self) -> &W {
        &self.output
    }

    #[must_use]
    pub fn into_output(self) -> W {
        self.output
    }
}

impl<W: Write> Console for BufferedConsole<W> {
    fn byte_available(&mut self) -> io::Result<bool> {
        Ok(!self.input.is_empty())
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        self.input
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "end of input"))
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.output.write_all(&[byte])
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}
