//! Character I/O for the LC-3.
//!
//! The CPU never touches the console directly. Everything it needs goes
//! through [`IoBridge`]:
//! - a non-blocking poll used by the keyboard status register
//! - a blocking single-byte read used by GETC and IN
//! - byte output used by the OUT, PUTS, PUTSP, IN and HALT traps
//!
//! [`ScriptedIo`] feeds canned input and captures output for tests and the
//! web bindings. [`TerminalIo`] drives a real terminal in raw mode.

#[cfg(feature = "terminal")]
mod terminal;

#[cfg(feature = "terminal")]
pub use terminal::TerminalIo;

use std::collections::VecDeque;
use std::io;

/// The I/O surface seen by the CPU.
pub trait IoBridge {
    /// Return whether a byte can be read without blocking.
    ///
    /// Must return immediately.
    fn poll_input(&mut self) -> io::Result<bool>;

    /// Read one byte, blocking until one is available.
    fn read_byte(&mut self) -> io::Result<u8>;

    /// Emit one byte.
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;

    /// Push buffered output to the device.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Emit every byte of `bytes`.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        for &byte in bytes {
            self.write_byte(byte)?;
        }
        Ok(())
    }
}

impl<T: IoBridge + ?Sized> IoBridge for &mut T {
    fn poll_input(&mut self) -> io::Result<bool> {
        (**self).poll_input()
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

/// In-memory I/O: input is queued up front, output is captured.
///
/// Reading past the end of the queued input fails with
/// [`io::ErrorKind::UnexpectedEof`] rather than blocking forever.
#[derive(Debug, Clone, Default)]
pub struct ScriptedIo {
    input: VecDeque<u8>,
    output: Vec<u8>,
    flushes: usize,
}

impl ScriptedIo {
    /// Create with no pending input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with `input` already queued.
    pub fn with_input(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Queue one more input byte.
    pub fn push_input(&mut self, byte: u8) {
        self.input.push_back(byte);
    }

    /// Queue several input bytes.
    pub fn write_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    /// Number of input bytes not yet consumed.
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    /// Everything written so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Output decoded lossily as UTF-8.
    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Drain and return everything written so far.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// How many times `flush` was called.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl IoBridge for ScriptedIo {
    fn poll_input(&mut self) -> io::Result<bool> {
        Ok(!self.input.is_empty())
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        self.input.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "scripted input exhausted")
        })
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.output.push(byte);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
