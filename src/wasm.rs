//! WebAssembly bindings for the LC-3 emulator.
//!
//! This module provides JavaScript-friendly wrappers around the core emulator.
//! Console input is queued from JavaScript and output is collected until
//! the page asks for it.

use wasm_bindgen::prelude::*;
use crate::{Cpu, CpuError, Instruction, ProgramImage, Reg, ScriptedIo};
use crate::cpu::decode::decode;
use crate::cpu::TrapVector;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly CPU wrapper.
#[wasm_bindgen]
pub struct WasmCpu {
    cpu: Cpu<ScriptedIo>,
    images: Vec<ProgramImage>,
}

#[wasm_bindgen]
impl WasmCpu {
    /// Create a new CPU instance.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(ScriptedIo::new()),
            images: Vec::new(),
        }
    }

    /// Load an object image. The first image loaded sets the entry point.
    /// Returns the number of words stored.
    #[wasm_bindgen]
    pub fn load_image(&mut self, bytes: &[u8]) -> Result<usize, JsError> {
        let image = ProgramImage::from_bytes(bytes)
            .map_err(|e| JsError::new(&e.to_string()))?;

        let stored = self.cpu.load_image(&image);
        if self.images.is_empty() {
            self.cpu.regs.jump(image.origin);
        }
        self.images.push(image);

        Ok(stored)
    }

    /// Queue keyboard input.
    #[wasm_bindgen]
    pub fn push_input(&mut self, text: &str) {
        self.cpu.io_mut().write_input(text.as_bytes());
    }

    /// Step one instruction. Returns the executed instruction as text.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let instr = self.cpu.step().map_err(to_js)?;
        Ok(instr.to_string())
    }

    /// Run until halt, fault, `max_cycles` instructions, or a GETC/IN
    /// with no queued input.
    ///
    /// Returns the total cycle count. When input runs out the page can
    /// queue more and call `run` again.
    #[wasm_bindgen]
    pub fn run(&mut self, max_cycles: u32) -> Result<u64, JsError> {
        let start = self.cpu.cycles;
        while self.cpu.is_running() && self.cpu.cycles - start < max_cycles as u64 {
            if self.is_waiting_for_input() {
                break;
            }
            self.cpu.step().map_err(to_js)?;
        }
        Ok(self.cpu.cycles)
    }

    /// True when the next instruction reads a key and none is queued.
    #[wasm_bindgen]
    pub fn is_waiting_for_input(&self) -> bool {
        let next = decode(self.cpu.mem.peek(self.cpu.regs.pc));
        self.cpu.io().pending_input() == 0
            && matches!(next, Ok(Instruction::Trap { vector: TrapVector::Getc | TrapVector::In }))
    }

    /// Reset CPU to initial state with loaded images.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.cpu.io_mut().take_output();
        self.cpu.boot(&self.images);
    }

    /// Drain console output produced so far.
    #[wasm_bindgen]
    pub fn take_output(&mut self) -> String {
        String::from_utf8_lossy(&self.cpu.io_mut().take_output()).into_owned()
    }

    /// Check if CPU is running.
    #[wasm_bindgen]
    pub fn is_running(&self) -> bool {
        self.cpu.is_running()
    }

    /// Check if CPU is halted.
    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.cpu.is_halted()
    }

    /// Check if CPU hit an unimplemented opcode.
    #[wasm_bindgen]
    pub fn is_faulted(&self) -> bool {
        self.cpu.is_faulted()
    }

    /// Get cycle count.
    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.cpu.cycles
    }

    /// Get program counter.
    #[wasm_bindgen]
    pub fn pc(&self) -> u16 {
        self.cpu.regs.pc
    }

    /// Get a general purpose register (0-7).
    #[wasm_bindgen]
    pub fn register(&self, index: u8) -> u16 {
        self.cpu.regs.get(Reg::from_bits(index as u16))
    }

    /// Get the condition flag as `n`, `z` or `p`.
    #[wasm_bindgen]
    pub fn cond(&self) -> String {
        self.cpu.regs.cond.as_char().to_string()
    }

    /// Get state as string.
    #[wasm_bindgen]
    pub fn state(&self) -> String {
        format!("{:?}", self.cpu.state)
    }

    /// Read memory without triggering device side effects.
    #[wasm_bindgen]
    pub fn memory_at(&self, addr: u16) -> u16 {
        self.cpu.mem.peek(addr)
    }

    /// Get a range of memory.
    #[wasm_bindgen]
    pub fn memory_range(&self, start: u16, count: usize) -> Vec<u16> {
        self.cpu.mem.dump(start, count).into_iter().map(|(_, w)| w).collect()
    }

    /// Get registers and state as JSON.
    #[wasm_bindgen]
    pub fn snapshot_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.cpu.snapshot()).map_err(|e| JsError::new(&e.to_string()))
    }
}

impl Default for WasmCpu {
    fn default() -> Self {
        Self::new()
    }
}

fn to_js(e: CpuError) -> JsError {
    JsError::new(&e.to_string())
}

/// Describe a single instruction word as assembly text.
#[wasm_bindgen]
pub fn wasm_describe(word: u16) -> String {
    match decode(word) {
        Ok(instr) => instr.to_string(),
        Err(e) => e.to_string(),
    }
}
