//! LC-3 CPU registers.
//!
//! The LC-3 has:
//! - R0-R7: eight 16-bit general purpose registers
//! - PC: the address of the next instruction to fetch
//! - COND: the condition flags, exactly one of N, Z or P

use crate::word::{self, Word};
use serde::{Serialize, Deserialize};
use std::fmt;
use thiserror::Error;

/// Default load address for programs that do not say otherwise.
pub const PC_START: Word = 0x3000;

/// A general purpose register selector (R0-R7).
///
/// Serialized as the bare register number. Numbers above 7 are rejected
/// when deserializing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Reg(u8);

impl Reg {
    pub const R0: Reg = Reg(0);
    pub const R1: Reg = Reg(1);
    pub const R2: Reg = Reg(2);
    pub const R3: Reg = Reg(3);
    pub const R4: Reg = Reg(4);
    pub const R5: Reg = Reg(5);
    pub const R6: Reg = Reg(6);
    /// Link register for JSR and TRAP.
    pub const R7: Reg = Reg(7);

    /// Build a selector from the low 3 bits of `bits`.
    pub const fn from_bits(bits: Word) -> Self {
        Reg((bits & 0x7) as u8)
    }

    /// The register number, 0-7.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The selector as a 3-bit instruction field.
    pub const fn bits(self) -> Word {
        self.0 as Word
    }
}

impl TryFrom<u8> for Reg {
    type Error = InvalidRegister;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        if index < 8 {
            Ok(Reg(index))
        } else {
            Err(InvalidRegister(index))
        }
    }
}

impl From<Reg> for u8 {
    fn from(reg: Reg) -> u8 {
        reg.0
    }
}

/// A register number outside R0-R7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no register R{0}; the LC-3 has R0-R7")]
pub struct InvalidRegister(pub u8);

impl fmt::Debug for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// The condition flag held in COND.
///
/// The discriminants are the bit values used by the BR instruction's
/// `nzp` mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CondFlag {
    /// Last result was positive.
    Pos = 1 << 0,
    /// Last result was zero.
    Zro = 1 << 1,
    /// Last result was negative.
    Neg = 1 << 2,
}

impl CondFlag {
    /// Classify a value by its sign.
    pub const fn from_value(value: Word) -> Self {
        if value == 0 {
            CondFlag::Zro
        } else if word::is_negative(value) {
            CondFlag::Neg
        } else {
            CondFlag::Pos
        }
    }

    /// The flag as a 3-bit mask.
    pub const fn bits(self) -> Word {
        self as Word
    }

    /// Short mnemonic: `n`, `z` or `p`.
    pub fn as_char(self) -> char {
        match self {
            CondFlag::Neg => 'n',
            CondFlag::Zro => 'z',
            CondFlag::Pos => 'p',
        }
    }
}

/// The LC-3 register file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// R0-R7.
    gpr: [Word; 8],

    /// Program counter, always the address of the next fetch.
    pub pc: Word,

    /// Condition flags.
    pub cond: CondFlag,
}

impl Registers {
    /// Create a register file in its power-on state: everything zero,
    /// COND = Z and PC at the default origin.
    pub fn new() -> Self {
        Self {
            gpr: [0; 8],
            pc: PC_START,
            cond: CondFlag::Zro,
        }
    }

    /// Return to the power-on state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read a general purpose register.
    #[inline]
    pub fn get(&self, r: Reg) -> Word {
        self.gpr[r.index()]
    }

    /// Write a general purpose register without touching COND.
    #[inline]
    pub fn set(&mut self, r: Reg, value: Word) {
        self.gpr[r.index()] = value;
    }

    /// Write a destination register and recompute COND from it.
    ///
    /// This is the only path that changes COND.
    pub fn define(&mut self, dr: Reg, value: Word) {
        self.set(dr, value);
        self.update_flags(dr);
    }

    /// Recompute COND from the current value of `r`.
    pub fn update_flags(&mut self, r: Reg) {
        self.cond = CondFlag::from_value(self.get(r));
    }

    /// Increment the program counter by 1, wrapping at 0xFFFF.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> Word {
        let old = self.pc;
        self.pc = self.pc.wrapping_add(1);
        old
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: Word) {
        self.pc = addr;
    }

    /// The address `offset` words away from the (already advanced) PC.
    pub fn pc_relative(&self, offset: Word) -> Word {
        self.pc.wrapping_add(offset)
    }

    /// All eight general purpose registers.
    pub fn gprs(&self) -> &[Word; 8] {
        &self.gpr
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.gpr.iter().enumerate() {
            write!(f, "R{}=x{:04X} ", i, value)?;
        }
        write!(f, "PC=x{:04X} COND={}", self.pc, self.cond.as_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reg_serde_rejects_out_of_range() {
        assert_eq!(serde_json::to_string(&Reg::R5).unwrap(), "5");
        assert_eq!(serde_json::from_str::<Reg>("7").unwrap(), Reg::R7);

        let err = serde_json::from_str::<Reg>("8").unwrap_err();
        assert!(err.to_string().contains("no register R8"));
        assert_eq!(Reg::try_from(200), Err(InvalidRegister(200)));
    }

    #[test]
    fn test_power_on_state() {
        let regs = Registers::new();
        assert_eq!(regs.pc, 0x3000);
        assert_eq!(regs.cond, CondFlag::Zro);
        assert!(regs.gprs().iter().all(|&r| r == 0));
    }

    #[test]
    fn test_define_updates_flags() {
        let mut regs = Registers::new();

        regs.define(Reg::R3, 100);
        assert_eq!(regs.get(Reg::R3), 100);
        assert_eq!(regs.cond, CondFlag::Pos);

        regs.define(Reg::R3, 0x8000);
        assert_eq!(regs.cond, CondFlag::Neg);

        regs.define(Reg::R1, 0);
        assert_eq!(regs.cond, CondFlag::Zro);
    }

    #[test]
    fn test_set_leaves_flags_alone() {
        let mut regs = Registers::new();
        regs.set(Reg::R7, 0xFFFF);
        assert_eq!(regs.cond, CondFlag::Zro);
    }

    #[test]
    fn test_advance_pc_wraps() {
        let mut regs = Registers::new();
        regs.pc = 0xFFFF;

        let old = regs.advance_pc();
        assert_eq!(old, 0xFFFF);
        assert_eq!(regs.pc, 0);
    }

    #[test]
    fn test_pc_relative() {
        let mut regs = Registers::new();
        regs.pc = 0x3001;
        assert_eq!(regs.pc_relative(0xFFFF), 0x3000);
        assert_eq!(regs.pc_relative(0x00FF), 0x3100);
    }

    #[test]
    fn test_reg_from_bits_masks() {
        assert_eq!(Reg::from_bits(0b1111), Reg::R7);
        assert_eq!(Reg::from_bits(0b1000), Reg::R0);
        assert_eq!(format!("{}", Reg::R5), "R5");
    }

    proptest! {
        #[test]
        fn prop_exactly_one_flag(value: u16) {
            let mut regs = Registers::new();
            regs.define(Reg::R0, value);

            let bits = regs.cond.bits();
            prop_assert_eq!(bits.count_ones(), 1);

            let expected = if value == 0 {
                CondFlag::Zro
            } else if value & 0x8000 != 0 {
                CondFlag::Neg
            } else {
                CondFlag::Pos
            };
            prop_assert_eq!(regs.cond, expected);
        }
    }
}
