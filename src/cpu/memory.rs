//! LC-3 memory subsystem.
//!
//! 65536 sixteen-bit words. Two addresses near the top of the space are
//! keyboard registers, and only *reads* treat them specially:
//! - KBSR (0xFE00): reading it polls the keyboard; bit 15 is set when a
//!   key is waiting, and the key is latched into KBDR
//! - KBDR (0xFE02): holds the last latched key
//!
//! Writes to either address are ordinary stores.

use crate::io::IoBridge;
use crate::word::Word;
use serde::Serialize;
use std::io;
use thiserror::Error;

/// The number of addressable words.
pub const MEMORY_SIZE: usize = 1 << 16;

/// Keyboard status register.
pub const KBSR: Word = 0xFE00;

/// Keyboard data register.
pub const KBDR: Word = 0xFE02;

/// KBSR bit signalling that KBDR holds a fresh key.
const KBSR_READY: Word = 1 << 15;

/// LC-3 memory: 65536 words.
///
/// Serializable for state dumps, but never read back: the cell vector must
/// always cover the full address space.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Memory {
    cells: Vec<Word>,
}

impl Memory {
    /// Create a new memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
        }
    }

    /// Read a word as the CPU sees it.
    ///
    /// Reading KBSR polls `io` first. The poll never blocks; if a key is
    /// waiting it is consumed and latched into KBDR.
    pub fn read<I: IoBridge + ?Sized>(&mut self, addr: Word, io: &mut I) -> Result<Word, MemoryError> {
        if addr == KBSR {
            if io.poll_input()? {
                let key = io.read_byte()?;
                self.cells[KBSR as usize] = KBSR_READY;
                self.cells[KBDR as usize] = key as Word;
            } else {
                self.cells[KBSR as usize] = 0;
            }
        }
        Ok(self.cells[addr as usize])
    }

    /// Read a word without any device side effects.
    #[inline]
    pub fn peek(&self, addr: Word) -> Word {
        self.cells[addr as usize]
    }

    /// Store a word. No address is special on write.
    #[inline]
    pub fn write(&mut self, addr: Word, value: Word) {
        self.cells[addr as usize] = value;
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Copy `words` into memory starting at `origin`.
    ///
    /// Words that would land past 0xFFFF are dropped. Returns how many
    /// were stored.
    pub fn load(&mut self, origin: Word, words: &[Word]) -> usize {
        let start = origin as usize;
        let count = words.len().min(MEMORY_SIZE - start);
        self.cells[start..start + count].copy_from_slice(&words[..count]);
        count
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: Word, count: usize) -> Vec<(Word, Word)> {
        let start = start as usize;
        let end = (start + count).min(MEMORY_SIZE);
        (start..end)
            .map(|i| (i as Word, self.cells[i]))
            .collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only count non-zero cells
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The keyboard poll behind KBSR failed.
    #[error("keyboard I/O failed: {0}")]
    Keyboard(#[from] io::Error),
}

impl MemoryError {
    /// The kind of the underlying I/O error.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            MemoryError::Keyboard(e) => e.kind(),
        }
    }
}
