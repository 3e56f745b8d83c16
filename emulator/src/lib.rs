//! An emulator for the LC-3, a 16-bit word-addressed educational computer.
//!
//! Load one or more [`Image`]s in a [`Computer`], then call
//! [`Computer::run`] until the program halts.

pub mod constants;
pub mod image;
pub mod io;
pub mod runtime;

pub use self::{
    image::{Image, ImageError},
    io::{BufferedConsole, Console},
    runtime::{Computer, Exception, ProcessorError},
};
