//! CPU execution engine for the LC-3.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::cpu::{Memory, Registers};
use crate::cpu::decode::{self, DecodeError, Instruction, Opcode, Operand, TrapVector};
use crate::cpu::memory::MemoryError;
use crate::cpu::registers::{CondFlag, Reg};
use crate::image::ProgramImage;
use crate::io::IoBridge;
use crate::word::Word;
use log::{debug, error, trace, warn};
use serde::{Serialize, Deserialize};
use std::io;
use thiserror::Error;

/// Prompt printed by the IN trap.
pub const IN_PROMPT: &str = "Enter a character: ";

/// Notice printed by the HALT trap.
pub const HALT_NOTICE: &str = "HALT\n";

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed the HALT trap).
    Halted,
    /// CPU fetched an unimplemented opcode at `pc`.
    Faulted { opcode: Opcode, pc: Word },
}

/// The LC-3 CPU, together with the memory and I/O it owns.
pub struct Cpu<I: IoBridge> {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count (for profiling).
    pub cycles: u64,
    /// Console device.
    io: I,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl<I: IoBridge> Cpu<I> {
    /// Create a new CPU with zeroed memory and power-on registers.
    pub fn new(io: I) -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            io,
            last_instr: None,
        }
    }

    /// Reset the CPU to initial state. The I/O device is kept.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Load raw words at `origin`. Returns how many words fit.
    pub fn load_program(&mut self, origin: Word, program: &[Word]) -> usize {
        self.mem.load(origin, program)
    }

    /// Copy an image into memory at its origin.
    pub fn load_image(&mut self, image: &ProgramImage) -> usize {
        let stored = self.mem.load(image.origin, &image.words);
        debug!("loaded {} words at x{:04X}", stored, image.origin);
        stored
    }

    /// Load several images in order and point PC at the first one.
    ///
    /// Later images overwrite earlier ones where they overlap. With no
    /// images, PC stays where it was.
    pub fn boot(&mut self, images: &[ProgramImage]) {
        for image in images {
            self.load_image(image);
        }
        if let Some(first) = images.first() {
            self.regs.jump(first.origin);
        }
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, or an error. Once the CPU
    /// has halted or faulted this returns [`CpuError::NotRunning`] and
    /// changes nothing.
    ///
    /// If the console fails partway through an instruction, PC and R7 are
    /// put back and the CPU stays `Running`, so the same instruction runs
    /// again on the next step. Output already written is not taken back.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        // Fetch
        let pc = self.regs.pc;
        let raw = self.mem.read(pc, &mut self.io)?;

        // Advance PC before decode; all PC-relative offsets use the new value
        self.regs.advance_pc();

        // Decode
        let instr = match decode::decode(raw) {
            Ok(instr) => instr,
            Err(DecodeError::Reserved(opcode)) => {
                self.state = CpuState::Faulted { opcode, pc };
                error!("unimplemented opcode {} (x{:04X}) at x{:04X}", opcode, raw, pc);
                return Err(CpuError::ReservedOpcode { opcode, pc });
            }
        };
        trace!("x{:04X}: {:<20} {:?}", pc, instr.to_string(), self.regs);

        // Execute. An instruction whose I/O fails is rolled back to its
        // fetch so that stepping again retries it.
        let link = self.regs.get(Reg::R7);
        if let Err(e) = self.execute(instr) {
            self.regs.jump(pc);
            self.regs.set(Reg::R7, link);
            debug!("x{:04X}: {} did not complete: {}", pc, instr, e);
            return Err(e);
        }

        // Update state
        self.cycles += 1;
        self.last_instr = Some(instr);

        Ok(instr)
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles.saturating_add(max_cycles);

        while self.state == CpuState::Running && self.cycles < limit {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction) -> Result<(), CpuError> {
        match instr {
            // ==================== Operate ====================

            Instruction::Add { dr, sr1, src2 } => {
                let value = self.regs.get(sr1).wrapping_add(self.operand(src2));
                self.regs.define(dr, value);
            }

            Instruction::And { dr, sr1, src2 } => {
                let value = self.regs.get(sr1) & self.operand(src2);
                self.regs.define(dr, value);
            }

            Instruction::Not { dr, sr } => {
                let value = !self.regs.get(sr);
                self.regs.define(dr, value);
            }

            // ==================== Data Movement ====================

            Instruction::Ld { dr, offset } => {
                let addr = self.regs.pc_relative(offset);
                let value = self.mem.read(addr, &mut self.io)?;
                self.regs.define(dr, value);
            }

            Instruction::Ldi { dr, offset } => {
                let pointer = self.regs.pc_relative(offset);
                let addr = self.mem.read(pointer, &mut self.io)?;
                let value = self.mem.read(addr, &mut self.io)?;
                self.regs.define(dr, value);
            }

            Instruction::Ldr { dr, base, offset } => {
                let addr = self.regs.get(base).wrapping_add(offset);
                let value = self.mem.read(addr, &mut self.io)?;
                self.regs.define(dr, value);
            }

            Instruction::Lea { dr, offset } => {
                // Address only; memory is never touched
                let addr = self.regs.pc_relative(offset);
                self.regs.define(dr, addr);
            }

            Instruction::St { sr, offset } => {
                let addr = self.regs.pc_relative(offset);
                self.mem.write(addr, self.regs.get(sr));
            }

            Instruction::Sti { sr, offset } => {
                let pointer = self.regs.pc_relative(offset);
                let addr = self.mem.read(pointer, &mut self.io)?;
                self.mem.write(addr, self.regs.get(sr));
            }

            Instruction::Str { sr, base, offset } => {
                let addr = self.regs.get(base).wrapping_add(offset);
                self.mem.write(addr, self.regs.get(sr));
            }

            // ==================== Control ====================

            Instruction::Br { nzp, offset } => {
                if nzp & self.regs.cond.bits() != 0 {
                    let target = self.regs.pc_relative(offset);
                    self.regs.jump(target);
                }
            }

            Instruction::Jmp { base } => {
                self.regs.jump(self.regs.get(base));
            }

            Instruction::Jsr { offset } => {
                self.regs.set(Reg::R7, self.regs.pc);
                let target = self.regs.pc_relative(offset);
                self.regs.jump(target);
            }

            Instruction::Jsrr { base } => {
                self.regs.set(Reg::R7, self.regs.pc);
                self.regs.jump(self.regs.get(base));
            }

            Instruction::Trap { vector } => {
                self.regs.set(Reg::R7, self.regs.pc);
                self.trap(vector)?;
            }
        }

        Ok(())
    }

    /// Resolve the second operand of ADD/AND.
    fn operand(&self, src2: Operand) -> Word {
        match src2 {
            Operand::Reg(r) => self.regs.get(r),
            Operand::Imm(imm) => imm,
        }
    }

    /// Run a built-in trap routine.
    fn trap(&mut self, vector: TrapVector) -> Result<(), CpuError> {
        match vector {
            TrapVector::Getc => {
                let byte = self.io.read_byte()?;
                self.regs.define(Reg::R0, byte as Word);
            }

            TrapVector::Out => {
                self.io.write_byte(self.regs.get(Reg::R0) as u8)?;
                self.io.flush()?;
            }

            TrapVector::Puts => {
                let mut addr = self.regs.get(Reg::R0);
                loop {
                    let c = self.mem.peek(addr);
                    if c == 0 {
                        break;
                    }
                    self.io.write_byte(c as u8)?;
                    addr = addr.wrapping_add(1);
                }
                self.io.flush()?;
            }

            TrapVector::In => {
                self.io.write_all(IN_PROMPT.as_bytes())?;
                self.io.flush()?;
                let byte = self.io.read_byte()?;
                self.io.write_byte(byte)?;
                self.io.flush()?;
                self.regs.define(Reg::R0, byte as Word);
            }

            TrapVector::Putsp => {
                let mut addr = self.regs.get(Reg::R0);
                'words: loop {
                    let packed = self.mem.peek(addr);
                    if packed == 0 {
                        break;
                    }
                    for byte in [packed as u8, (packed >> 8) as u8] {
                        if byte == 0 {
                            break 'words;
                        }
                        self.io.write_byte(byte)?;
                    }
                    addr = addr.wrapping_add(1);
                }
                self.io.flush()?;
            }

            TrapVector::Halt => {
                self.io.write_all(HALT_NOTICE.as_bytes())?;
                self.io.flush()?;
                self.state = CpuState::Halted;
                debug!("halted after {} instructions", self.cycles + 1);
            }

            TrapVector::Other(code) => {
                warn!("no routine for trap vector x{:02X}; continuing", code);
            }
        }

        Ok(())
    }

    /// The console device.
    pub fn io(&self) -> &I {
        &self.io
    }

    /// Mutable access to the console device.
    pub fn io_mut(&mut self) -> &mut I {
        &mut self.io
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU has faulted.
    pub fn is_faulted(&self) -> bool {
        matches!(self.state, CpuState::Faulted { .. })
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }

    /// Capture registers and state for reporting.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            cycles: self.cycles,
            pc: self.regs.pc,
            cond: self.regs.cond,
            registers: *self.regs.gprs(),
            last_instruction: self.last_instr,
        }
    }
}

impl<I: IoBridge + Default> Default for Cpu<I> {
    fn default() -> Self {
        Self::new(I::default())
    }
}

impl<I: IoBridge> std::fmt::Debug for Cpu<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// A serializable view of the machine after (or during) a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: CpuState,
    pub cycles: u64,
    pub pc: Word,
    pub cond: CondFlag,
    pub registers: [Word; 8],
    pub last_instruction: Option<Instruction>,
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("unimplemented opcode {opcode} at x{pc:04X}")]
    ReservedOpcode { opcode: Opcode, pc: Word },

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("console I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CpuError {
    /// True when the console reported a user interrupt (Ctrl-C).
    pub fn is_interrupt(&self) -> bool {
        match self {
            CpuError::Memory(e) => e.kind() == io::ErrorKind::Interrupted,
            CpuError::Io(e) => e.kind() == io::ErrorKind::Interrupted,
            _ => false,
        }
    }
}
