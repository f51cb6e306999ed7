//! # LC-3 Emulator
//!
//! An emulator of the LC-3, the 16-bit educational computer.
//!
//! The machine runs a fetch-decode-execute loop over memory loaded from
//! one or more object images, until the HALT trap or an unimplemented
//! opcode stops it. Console I/O goes through an [`IoBridge`], so the same
//! CPU can drive a raw-mode terminal or a scripted buffer.

pub mod word;
pub mod cpu;
pub mod io;
pub mod image;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use word::{sign_extend, Word};
pub use cpu::{Cpu, CpuState, CpuError, Memory, Registers, Reg, CondFlag, Instruction, Opcode, Snapshot};
pub use io::{IoBridge, ScriptedIo};
pub use image::{ProgramImage, ImageError, load_image, save_image};

#[cfg(feature = "terminal")]
pub use io::TerminalIo;
