//! Raw-mode terminal backend.

use super::IoBridge;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::time::Duration;

/// Console I/O with line buffering and echo turned off.
///
/// Raw mode is entered on construction and left again on drop, so the
/// terminal is restored on every exit path that unwinds. Ctrl-C arrives as
/// a key press in raw mode and is reported as [`io::ErrorKind::Interrupted`]
/// by whichever call reads it, so the run loop has to poll now and then
/// even when the program never touches the keyboard.
pub struct TerminalIo {
    pending: VecDeque<u8>,
    out: io::Stdout,
}

impl TerminalIo {
    /// Put the terminal into raw mode.
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        log::debug!("terminal switched to raw mode");
        Ok(Self {
            pending: VecDeque::new(),
            out: io::stdout(),
        })
    }

    fn next_key_byte(&mut self) -> io::Result<Option<u8>> {
        match event::read()? {
            Event::Key(key) => key_to_byte(key),
            _ => Ok(None),
        }
    }
}

impl IoBridge for TerminalIo {
    /// Drains every queued terminal event, so a Ctrl-C is seen even
    /// behind keys the program has not read yet.
    fn poll_input(&mut self) -> io::Result<bool> {
        while event::poll(Duration::ZERO)? {
            if let Some(byte) = self.next_key_byte()? {
                self.pending.push_back(byte);
            }
        }
        Ok(!self.pending.is_empty())
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        if let Some(byte) = self.pending.pop_front() {
            return Ok(byte);
        }
        loop {
            if let Some(byte) = self.next_key_byte()? {
                return Ok(byte);
            }
        }
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        // Raw mode turns off output post-processing.
        if byte == b'\n' {
            self.out.write_all(b"\r\n")
        } else {
            self.out.write_all(&[byte])
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Drop for TerminalIo {
    fn drop(&mut self) {
        let _ = self.out.flush();
        if let Err(e) = terminal::disable_raw_mode() {
            log::error!("failed to restore terminal mode: {}", e);
        }
    }
}

/// Translate a key press into the byte an LC-3 program expects.
fn key_to_byte(key: KeyEvent) -> io::Result<Option<u8>> {
    if key.kind != KeyEventKind::Press {
        return Ok(None);
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let byte = match key.code {
        KeyCode::Char('c') if ctrl => {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"));
        }
        KeyCode::Char(c) if ctrl && c.is_ascii_alphabetic() => {
            Some(c.to_ascii_lowercase() as u8 & 0x1F)
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
