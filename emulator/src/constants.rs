pub type Address = u16;
pub type Word = u16;

/// Total size of the computer memory, in words
pub const MEMORY_SIZE: usize = 1 << 16;

/// Where the program counter starts
pub const PROGRAM_START: Address = 0x3000;

/// Keyboard status register. Bit 15 is set when a key is waiting in [`KEYBOARD_DATA`]
pub const KEYBOARD_STATUS: Address = 0xFE00;

/// Keyboard data register
pub const KEYBOARD_DATA: Address = 0xFE02;

/// Value of the keyboard status register when a key is ready
pub const KEYBOARD_READY: Word = 1 << 15;
