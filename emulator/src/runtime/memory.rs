use std::io;

use tracing::trace;

use crate::constants::{
    Address, Word, KEYBOARD_DATA, KEYBOARD_READY, KEYBOARD_STATUS, MEMORY_SIZE,
};
use crate::image::Image;
use crate::io::Console;

/// Holds the memory cells of the computer.
///
/// It has 65536 words, so any [`Address`] is valid.
#[derive(Clone)]
pub struct Memory {
    inner: Box<[Word]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            inner: vec![0; MEMORY_SIZE].into_boxed_slice(),
        }
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Memory {{ [{} words] }}", self.inner.len())
    }
}

impl Memory {
    /// Get the word stored at an address, without triggering any device
    #[must_use]
    pub fn get(&self, address: Address) -> Word {
        self.inner[usize::from(address)]
    }

    /// Read a word as the processor does.
    ///
    /// Reading the keyboard status register polls the console first: if a
    /// byte is waiting it is consumed into the keyboard data register and the
    /// status register gets its ready bit, otherwise the status is cleared.
    ///
    /// # Errors
    ///
    /// Propagates console errors raised while polling the keyboard
    pub fn read<C: Console>(&mut self, address: Address, console: &mut C) -> io::Result<Word> {
        if address == KEYBOARD_STATUS {
            if console.byte_available()? {
                let byte = console.read_byte()?;
                trace!(byte, "Key ready");
                self.write(KEYBOARD_STATUS, KEYBOARD_READY);
                self.write(KEYBOARD_DATA, Word::from(byte));
            } else {
                self.write(KEYBOARD_STATUS, 0);
            }
        }

        Ok(self.get(address))
    }

    /// Store a word. Device registers behave like plain storage here.
    pub fn write(&mut self, address: Address, value: Word) {
        self.inner[usize::from(address)] = value;
    }

    /// Copy an image at its origin
    pub fn load(&mut self, image: &Image) {
        let start = usize::from(image.origin);
        // Images are checked to fit when parsed
        let end = image.end().min(self.inner.len());
        let len = end - start;
        self.inner[start..end].copy_from_slice(&image.words[..len]);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::io::BufferedConsole;

    #[test]
    fn plain_read_write_test() {
        let mut memory = Memory::default();
        let mut console = BufferedConsole::new(Vec::<u8>::new(), Vec::<u8>::new());

        assert_eq!(memory.read(0x1234, &mut console).unwrap(), 0);
        memory.write(0x1234, 0xBEEF);
        assert_eq!(memory.read(0x1234, &mut console).unwrap(), 0xBEEF);

        memory.write(0xFFFF, 42);
        assert_eq!(memory.get(0xFFFF), 42);
    }

    #[test]
    fn keyboard_poll_test() {
        let mut memory = Memory::default();
        let mut console = BufferedConsole::new(b"k".to_vec(), Vec::<u8>::new());

        assert_eq!(
            memory.read(KEYBOARD_STATUS, &mut console).unwrap(),
            KEYBOARD_READY
        );
        assert_eq!(memory.read(KEYBOARD_DATA, &mut console).unwrap(), 0x6B);
        assert!(!console.byte_available().unwrap());

        // Nothing left: the status is cleared, the data register keeps its value
        assert_eq!(memory.read(KEYBOARD_STATUS, &mut console).unwrap(), 0);
        assert_eq!(memory.get(KEYBOARD_DATA), 0x6B);
    }

    #[test]
    fn keyboard_write_has_no_side_effect_test() {
        let mut memory = Memory::default();
        let mut console = BufferedConsole::new(b"k".to_vec(), Vec::<u8>::new());

        memory.write(KEYBOARD_STATUS, 0x1234);
        memory.write(KEYBOARD_DATA, 0x5678);
        assert_eq!(memory.get(KEYBOARD_STATUS), 0x1234);
        assert_eq!(memory.get(KEYBOARD_DATA), 0x5678);
        assert!(console.byte_available().unwrap());

        // Reading the data register alone does not poll
        assert_eq!(memory.read(KEYBOARD_DATA, &mut console).unwrap(), 0x5678);
        assert!(console.byte_available().unwrap());
    }

    #[test]
    fn load_test() {
        let mut memory = Memory::default();
        let image = Image {
            origin: 0x3000,
            words: vec![1, 2, 3],
        };
        memory.load(&image);
        assert_eq!(memory.get(0x2FFF), 0);
        assert_eq!(memory.get(0x3000), 1);
        assert_eq!(memory.get(0x3002), 3);
        assert_eq!(memory.get(0x3003), 0);

        let tail = Image {
            origin: 0xFFFE,
            words: vec![7, 8],
        };
        memory.load(&tail);
        assert_eq!(memory.get(0xFFFF), 8);
    }
}
