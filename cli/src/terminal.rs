//! The console used when the standard input is a terminal

use std::collections::VecDeque;
use std::io::{self, IsTerminal, Stdout, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use lc3_emulator::{BufferedConsole, Console};
use tracing::{trace, warn};

/// A console the run loop can check for Ctrl-C between instructions
pub trait Interruptible: Console {
    fn poll_interrupt(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: Write> Interruptible for BufferedConsole<W> {}

impl Interruptible for TerminalConsole {
    fn poll_interrupt(&mut self) -> io::Result<()> {
        self.pump()
    }
}

/// Keeps the terminal in raw mode until dropped
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!(error = %e, "Could not restore the terminal");
        }
    }
}

/// Reads keys from the terminal in raw mode, so programs get them unbuffered
/// and without echo.
///
/// Raw mode turns off the interrupt signal: Ctrl-C is read like any other key
/// and reported as an [`io::ErrorKind::Interrupted`] error.
pub struct TerminalConsole {
    pending: VecDeque<u8>,
    stdout: Stdout,
    /// Write newlines as `\r\n`, only when the output is the terminal
    crlf: bool,
    _raw: RawMode,
}

impl TerminalConsole {
    pub fn new() -> io::Result<Self> {
        let stdout = io::stdout();
        let crlf = stdout.is_terminal();
        Ok(Self {
            pending: VecDeque::new(),
            stdout,
            crlf,
            _raw: RawMode::enable()?,
        })
    }

    /// Queue the keys typed so far, without blocking
    pub fn pump(&mut self) -> io::Result<()> {
        while event::poll(Duration::ZERO)? {
            let event = event::read()?;
            self.handle(&event)?;
        }
        Ok(())
    }

    fn handle(&mut self, event: &Event) -> io::Result<()> {
        if let Event::Key(key) = event {
            if let Some(byte) = key_to_byte(key)? {
                trace!(byte, "Key pressed");
                self.pending.push_back(byte);
            }
        }
        Ok(())
    }
}

impl Console for TerminalConsole {
    fn byte_available(&mut self) -> io::Result<bool> {
        self.pump()?;
        Ok(!self.pending.is_empty())
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        loop {
            if let Some(byte) = self.pending.pop_front() {
                return Ok(byte);
            }
            let event = event::read()?;
            self.handle(&event)?;
        }
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        write_output(&mut self.stdout, byte, self.crlf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()
    }
}

/// Raw mode also disables the translation of newlines, so a terminal needs
/// the carriage return written out
fn write_output<W: Write>(out: &mut W, byte: u8, crlf: bool) -> io::Result<()> {
    if crlf && byte == b'\n' {
        out.write_all(b"\r\n")
    } else {
        out.write_all(&[byte])
    }
}

/// The byte a key press sends to the program, if any
fn key_to_byte(key: &KeyEvent) -> io::Result<Option<u8>> {
    if key.kind == KeyEventKind::Release {
        return Ok(None);
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let byte = match key.code {
        KeyCode::Char('c' | 'C') if ctrl => {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"));
        }
        KeyCode::Char(c) if ctrl && c.is_ascii_alphabetic() => {
            Some(c.to_ascii_lowercase() as u8 - b'a' + 1)
        }
        KeyCode::Char(c) if c.is_ascii() => Some(c as u8),
        KeyCode::Enter => Some(b'\n'),
        KeyCode::Tab => Some(b'\t'),
        KeyCode::Backspace => Some(0x08),
        KeyCode::Esc => Some(0x1B),
        _ => None,
    };

    Ok(byte)
}
