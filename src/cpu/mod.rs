//! CPU emulation for the LC-3.
//!
//! This module implements the complete LC-3 architecture:
//! - 65536 sixteen-bit memory words with memory-mapped keyboard registers
//! - 8 general registers, PC and the N/Z/P condition flags
//! - 16-opcode instruction set (two of them reserved)

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;

pub use memory::{Memory, MemoryError};
pub use registers::{CondFlag, InvalidRegister, Reg, Registers};
pub use decode::{Instruction, Opcode, Operand, TrapVector, DecodeError};
pub use execute::{Cpu, CpuError, CpuState, Snapshot};
