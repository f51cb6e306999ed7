//! Instruction decoder for the LC-3.
//!
//! Every instruction is one 16-bit word. The top 4 bits select one of 16
//! opcodes; two of them (RTI and the reserved code) are not implemented and
//! decode to an error.
//!
//! ```text
//!  15  12 11  9 8   6 5 4       0
//! +------+-----+-----+-+---------+
//! |  op  | DR  | SR1 |i|  imm5   |   ADD / AND
//! +------+-----+-----+-+---------+
//! ```

use crate::cpu::registers::Reg;
use crate::word::{field, sign_extend, to_signed, Word};
use serde::{Serialize, Deserialize};
use std::fmt;
use thiserror::Error;

/// The 16 opcodes, in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Br = 0,
    Add,
    Ld,
    St,
    Jsr,
    And,
    Ldr,
    Str,
    /// Return from interrupt (unimplemented).
    Rti,
    Not,
    Ldi,
    Sti,
    Jmp,
    /// Reserved (unimplemented).
    Res,
    Lea,
    Trap,
}

impl Opcode {
    /// The opcode in the top 4 bits of `instr`.
    pub const fn of(instr: Word) -> Self {
        match instr >> 12 {
            0 => Opcode::Br,
            1 => Opcode::Add,
            2 => Opcode::Ld,
            3 => Opcode::St,
            4 => Opcode::Jsr,
            5 => Opcode::And,
            6 => Opcode::Ldr,
            7 => Opcode::Str,
            8 => Opcode::Rti,
            9 => Opcode::Not,
            10 => Opcode::Ldi,
            11 => Opcode::Sti,
            12 => Opcode::Jmp,
            13 => Opcode::Res,
            14 => Opcode::Lea,
            _ => Opcode::Trap,
        }
    }

    /// The opcode shifted into place.
    pub const fn bits(self) -> Word {
        (self as Word) << 12
    }

    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Br => "BR",
            Opcode::Add => "ADD",
            Opcode::Ld => "LD",
            Opcode::St => "ST",
            Opcode::Jsr => "JSR",
            Opcode::And => "AND",
            Opcode::Ldr => "LDR",
            Opcode::Str => "STR",
            Opcode::Rti => "RTI",
            Opcode::Not => "NOT",
            Opcode::Ldi => "LDI",
            Opcode::Sti => "STI",
            Opcode::Jmp => "JMP",
            Opcode::Res => "RES",
            Opcode::Lea => "LEA",
            Opcode::Trap => "TRAP",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Trap vectors, taken from the low 8 bits of a TRAP instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrapVector {
    /// Read a character into R0, no echo.
    Getc,
    /// Write the character in R0.
    Out,
    /// Write a string of one character per word.
    Puts,
    /// Prompt, read and echo a character into R0.
    In,
    /// Write a string of two characters per word.
    Putsp,
    /// Stop the machine.
    Halt,
    /// Any vector without a built-in routine.
    Other(u8),
}

impl TrapVector {
    pub const GETC: u8 = 0x20;
    pub const OUT: u8 = 0x21;
    pub const PUTS: u8 = 0x22;
    pub const IN: u8 = 0x23;
    pub const PUTSP: u8 = 0x24;
    pub const HALT: u8 = 0x25;

    pub const fn from_u8(vector: u8) -> Self {
        match vector {
            Self::GETC => TrapVector::Getc,
            Self::OUT => TrapVector::Out,
            Self::PUTS => TrapVector::Puts,
            Self::IN => TrapVector::In,
            Self::PUTSP => TrapVector::Putsp,
            Self::HALT => TrapVector::Halt,
            other => TrapVector::Other(other),
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            TrapVector::Getc => Self::GETC,
            TrapVector::Out => Self::OUT,
            TrapVector::Puts => Self::PUTS,
            TrapVector::In => Self::IN,
            TrapVector::Putsp => Self::PUTSP,
            TrapVector::Halt => Self::HALT,
            TrapVector::Other(v) => v,
        }
    }
}

/// Second operand of ADD and AND.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// Register mode (bit 5 clear).
    Reg(Reg),
    /// Immediate mode (bit 5 set); already sign-extended from 5 bits.
    Imm(Word),
}

/// A decoded LC-3 instruction.
///
/// Offsets and immediates are stored sign-extended to a full word, ready
/// to be added with wrapping arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Operate ====================

    /// DR := SR1 + operand
    Add { dr: Reg, sr1: Reg, src2: Operand },

    /// DR := SR1 & operand
    And { dr: Reg, sr1: Reg, src2: Operand },

    /// DR := !SR
    Not { dr: Reg, sr: Reg },

    // ==================== Data Movement ====================

    /// DR := mem[PC + offset9]
    Ld { dr: Reg, offset: Word },

    /// DR := mem[mem[PC + offset9]]
    Ldi { dr: Reg, offset: Word },

    /// DR := mem[BaseR + offset6]
    Ldr { dr: Reg, base: Reg, offset: Word },

    /// DR := PC + offset9
    Lea { dr: Reg, offset: Word },

    /// mem[PC + offset9] := SR
    St { sr: Reg, offset: Word },

    /// mem[mem[PC + offset9]] := SR
    Sti { sr: Reg, offset: Word },

    /// mem[BaseR + offset6] := SR
    Str { sr: Reg, base: Reg, offset: Word },

    // ==================== Control ====================

    /// If any of the `nzp` mask bits match COND, PC := PC + offset9
    Br { nzp: Word, offset: Word },

    /// PC := BaseR (RET is JMP R7)
    Jmp { base: Reg },

    /// R7 := PC; PC := PC + offset11
    Jsr { offset: Word },

    /// R7 := PC; PC := BaseR
    Jsrr { base: Reg },

    /// R7 := PC; run a system routine
    Trap { vector: TrapVector },
}

/// Decode one instruction word.
///
/// Bits that the ISA leaves unused are ignored.
pub fn decode(instr: Word) -> Result<Instruction, DecodeError> {
    let dr = Reg::from_bits(field(instr, 9, 3));
    let sr1 = Reg::from_bits(field(instr, 6, 3));
    let offset6 = sign_extend(instr, 6);
    let offset9 = sign_extend(instr, 9);

    let operand = || {
        if field(instr, 5, 1) != 0 {
            Operand::Imm(sign_extend(instr, 5))
        } else {
            Operand::Reg(Reg::from_bits(instr))
        }
    };

    let instruction = match Opcode::of(instr) {
        Opcode::Add => Instruction::Add { dr, sr1, src2: operand() },
        Opcode::And => Instruction::And { dr, sr1, src2: operand() },
        Opcode::Not => Instruction::Not { dr, sr: sr1 },
        Opcode::Ld => Instruction::Ld { dr, offset: offset9 },
        Opcode::Ldi => Instruction::Ldi { dr, offset: offset9 },
        Opcode::Ldr => Instruction::Ldr { dr, base: sr1, offset: offset6 },
        Opcode::Lea => Instruction::Lea { dr, offset: offset9 },
        Opcode::St => Instruction::St { sr: dr, offset: offset9 },
        Opcode::Sti => Instruction::Sti { sr: dr, offset: offset9 },
        Opcode::Str => Instruction::Str { sr: dr, base: sr1, offset: offset6 },
        Opcode::Br => Instruction::Br { nzp: field(instr, 9, 3), offset: offset9 },
        Opcode::Jmp => Instruction::Jmp { base: sr1 },
        Opcode::Jsr => {
            if field(instr, 11, 1) != 0 {
                Instruction::Jsr { offset: sign_extend(instr, 11) }
            } else {
                Instruction::Jsrr { base: sr1 }
            }
        }
        Opcode::Trap => Instruction::Trap {
            vector: TrapVector::from_u8(field(instr, 0, 8) as u8),
        },
        op @ (Opcode::Rti | Opcode::Res) => return Err(DecodeError::Reserved(op)),
    };

    Ok(instruction)
}

/// Encode an instruction back to a word.
///
/// Offsets are truncated to their field width.
pub fn encode(instr: &Instruction) -> Word {
    let dr = |r: Reg| r.bits() << 9;
    let sr1 = |r: Reg| r.bits() << 6;
    let operand = |src2: Operand| match src2 {
        Operand::Reg(r) => r.bits(),
        Operand::Imm(imm) => 1 << 5 | (imm & 0x1F),
    };

    match *instr {
        Instruction::Add { dr: d, sr1: s, src2 } => Opcode::Add.bits() | dr(d) | sr1(s) | operand(src2),
        Instruction::And { dr: d, sr1: s, src2 } => Opcode::And.bits() | dr(d) | sr1(s) | operand(src2),
        Instruction::Not { dr: d, sr } => Opcode::Not.bits() | dr(d) | sr1(sr) | 0x3F,
        Instruction::Ld { dr: d, offset } => Opcode::Ld.bits() | dr(d) | (offset & 0x1FF),
        Instruction::Ldi { dr: d, offset } => Opcode::Ldi.bits() | dr(d) | (offset & 0x1FF),
        Instruction::Ldr { dr: d, base, offset } => Opcode::Ldr.bits() | dr(d) | sr1(base) | (offset & 0x3F),
        Instruction::Lea { dr: d, offset } => Opcode::Lea.bits() | dr(d) | (offset & 0x1FF),
        Instruction::St { sr, offset } => Opcode::St.bits() | dr(sr) | (offset & 0x1FF),
        Instruction::Sti { sr, offset } => Opcode::Sti.bits() | dr(sr) | (offset & 0x1FF),
        Instruction::Str { sr, base, offset } => Opcode::Str.bits() | dr(sr) | sr1(base) | (offset & 0x3F),
        Instruction::Br { nzp, offset } => Opcode::Br.bits() | (nzp & 0x7) << 9 | (offset & 0x1FF),
        Instruction::Jmp { base } => Opcode::Jmp.bits() | sr1(base),
        Instruction::Jsr { offset } => Opcode::Jsr.bits() | 1 << 11 | (offset & 0x7FF),
        Instruction::Jsrr { base } => Opcode::Jsr.bits() | sr1(base),
        Instruction::Trap { vector } => Opcode::Trap.bits() | vector.code() as Word,
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op2 = |src2: &Operand| match src2 {
            Operand::Reg(r) => format!("{}", r),
            Operand::Imm(imm) => format!("#{}", to_signed(*imm)),
        };
        let off = |offset: &Word| to_signed(*offset);

        match self {
            Instruction::Add { dr, sr1, src2 } => write!(f, "ADD {}, {}, {}", dr, sr1, op2(src2)),
            Instruction::And { dr, sr1, src2 } => write!(f, "AND {}, {}, {}", dr, sr1, op2(src2)),
            Instruction::Not { dr, sr } => write!(f, "NOT {}, {}", dr, sr),
            Instruction::Ld { dr, offset } => write!(f, "LD {}, #{}", dr, off(offset)),
            Instruction::Ldi { dr, offset } => write!(f, "LDI {}, #{}", dr, off(offset)),
            Instruction::Ldr { dr, base, offset } => write!(f, "LDR {}, {}, #{}", dr, base, off(offset)),
            Instruction::Lea { dr, offset } => write!(f, "LEA {}, #{}", dr, off(offset)),
            Instruction::St { sr, offset } => write!(f, "ST {}, #{}", sr, off(offset)),
            Instruction::Sti { sr, offset } => write!(f, "STI {}, #{}", sr, off(offset)),
            Instruction::Str { sr, base, offset } => write!(f, "STR {}, {}, #{}", sr, base, off(offset)),
            Instruction::Br { nzp, offset } => {
                f.write_str("BR")?;
                for (bit, c) in [(4, 'n'), (2, 'z'), (1, 'p')] {
                    if nzp & bit != 0 {
                        write!(f, "{}", c)?;
                    }
                }
                write!(f, " #{}", off(offset))
            }
            Instruction::Jmp { base } if *base == Reg::R7 => f.write_str("RET"),
            Instruction::Jmp { base } => write!(f, "JMP {}", base),
            Instruction::Jsr { offset } => write!(f, "JSR #{}", off(offset)),
            Instruction::Jsrr { base } => write!(f, "JSRR {}", base),
            Instruction::Trap { vector } => match vector {
                TrapVector::Getc => f.write_str("GETC"),
                TrapVector::Out => f.write_str("OUT"),
                TrapVector::Puts => f.write_str("PUTS"),
                TrapVector::In => f.write_str("IN"),
                TrapVector::Putsp => f.write_str("PUTSP"),
                TrapVector::Halt => f.write_str("HALT"),
                TrapVector::Other(v) => write!(f, "TRAP x{:02X}", v),
            },
        }
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unimplemented opcode {0}")]
    Reserved(Opcode),
}
