//! Whole-program tests: images built from instructions, run to completion
//! against scripted console I/O.

use lc3::cpu::decode::{encode, Instruction, Operand, TrapVector};
use lc3::{
    load_image, save_image, CondFlag, Cpu, CpuError, CpuState, Opcode, ProgramImage, Reg,
    ScriptedIo, Word,
};

fn add_imm(dr: Reg, sr1: Reg, imm: i16) -> Instruction {
    Instruction::Add { dr, sr1, src2: Operand::Imm(imm as Word) }
}

fn trap(vector: TrapVector) -> Word {
    encode(&Instruction::Trap { vector })
}

fn halt() -> Word {
    trap(TrapVector::Halt)
}

fn boot(images: &[ProgramImage], input: &[u8]) -> Cpu<ScriptedIo> {
    let mut cpu = Cpu::new(ScriptedIo::with_input(input));
    cpu.boot(images);
    cpu
}

#[test]
fn test_sum_loop() {
    let program = vec![
        encode(&Instruction::And { dr: Reg::R0, sr1: Reg::R0, src2: Operand::Imm(0) }),
        encode(&Instruction::And { dr: Reg::R1, sr1: Reg::R1, src2: Operand::Imm(0) }),
        encode(&add_imm(Reg::R1, Reg::R1, 5)),
        encode(&Instruction::Add { dr: Reg::R0, sr1: Reg::R0, src2: Operand::Reg(Reg::R1) }),
        encode(&add_imm(Reg::R1, Reg::R1, -1)),
        encode(&Instruction::Br { nzp: 0b001, offset: (-3i16) as Word }),
        halt(),
    ];
    let mut cpu = boot(&[ProgramImage::new(0x3000, program)], b"");

    let executed = cpu.run().unwrap();

    assert_eq!(cpu.regs.get(Reg::R0), 15);
    assert_eq!(cpu.regs.get(Reg::R1), 0);
    assert_eq!(executed, 19);
    assert_eq!(cpu.state, CpuState::Halted);
}

#[test]
fn test_hello_world_from_file() {
    let mut words = vec![
        encode(&Instruction::Lea { dr: Reg::R0, offset: 2 }),
        trap(TrapVector::Puts),
        halt(),
    ];
    words.extend("Hello, World!\n".bytes().map(Word::from));
    words.push(0);
    let image = ProgramImage::new(0x3000, words);

    let path = std::env::temp_dir().join(format!("lc3-hello-{}.obj", std::process::id()));
    save_image(&path, &image).unwrap();
    let loaded = load_image(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let mut cpu = boot(&[loaded], b"");
    cpu.run().unwrap();

    assert_eq!(cpu.io().output_str(), "Hello, World!\nHALT\n");
}

#[test]
fn test_packed_string() {
    let program = vec![
        encode(&Instruction::Lea { dr: Reg::R0, offset: 2 }),
        trap(TrapVector::Putsp),
        halt(),
        0x6F47, // "Go"
        0x2121, // "!!"
        0x0000,
    ];
    let mut cpu = boot(&[ProgramImage::new(0x3000, program)], b"");

    cpu.run().unwrap();

    assert_eq!(cpu.io().output_str(), "Go!!HALT\n");
}

#[test]
fn test_keyboard_polling_echo() {
    let program = vec![
        encode(&Instruction::Ldi { dr: Reg::R1, offset: 7 }),          // x3000: R1 = KBSR
        encode(&Instruction::Br { nzp: 0b011, offset: (-2i16) as Word }), // x3001: wait
        encode(&Instruction::Ldi { dr: Reg::R0, offset: 6 }),          // x3002: R0 = KBDR
        encode(&add_imm(Reg::R2, Reg::R0, -10)),                       // x3003
        encode(&Instruction::Br { nzp: 0b010, offset: 2 }),            // x3004: newline ends
        trap(TrapVector::Out),                                         // x3005
        encode(&Instruction::Br { nzp: 0b111, offset: (-7i16) as Word }), // x3006
        halt(),                                                        // x3007
        0xFE00,                                                        // x3008
        0xFE02,                                                        // x3009
    ];
    let mut cpu = boot(&[ProgramImage::new(0x3000, program)], b"ok\n");

    cpu.run().unwrap();

    assert_eq!(cpu.io().output_str(), "okHALT\n");
    assert_eq!(cpu.io().pending_input(), 0);
}

#[test]
fn test_getc_out_echo() {
    let program = vec![
        trap(TrapVector::Getc),
        trap(TrapVector::Out),
        trap(TrapVector::In),
        trap(TrapVector::Out),
        halt(),
    ];
    let mut cpu = boot(&[ProgramImage::new(0x3000, program)], b"AB");

    cpu.run().unwrap();

    assert_eq!(cpu.io().output_str(), "AEnter a character: BBHALT\n");
    assert_eq!(cpu.regs.get(Reg::R0), b'B' as Word);
    assert_eq!(cpu.regs.cond, CondFlag::Pos);
}

#[test]
fn test_subroutine_saves_link_register() {
    let program = vec![
        encode(&Instruction::Ld { dr: Reg::R0, offset: 4 }),                 // x3000
        encode(&Instruction::Jsr { offset: 4 }),                             // x3001
        halt(),                                                              // x3002
        0,                                                                   // x3003: saved R7
        0,                                                                   // x3004
        b'Z' as Word,                                                        // x3005
        encode(&Instruction::St { sr: Reg::R7, offset: (-4i16) as Word }),  // x3006
        trap(TrapVector::Out),                                               // x3007
        trap(TrapVector::Out),                                               // x3008
        encode(&Instruction::Ld { dr: Reg::R7, offset: (-7i16) as Word }),  // x3009
        encode(&Instruction::Jmp { base: Reg::R7 }),                         // x300A
    ];
    let mut cpu = boot(&[ProgramImage::new(0x3000, program)], b"");

    let executed = cpu.run().unwrap();

    assert_eq!(cpu.io().output_str(), "ZZHALT\n");
    assert_eq!(executed, 8);
    assert_eq!(cpu.regs.get(Reg::R7), 0x3003);
}

#[test]
fn test_later_images_overwrite_earlier() {
    let code = ProgramImage::new(
        0x3000,
        vec![
            encode(&Instruction::Lea { dr: Reg::R0, offset: 2 }),
            trap(TrapVector::Puts),
            halt(),
            b'A' as Word,
            0,
        ],
    );
    let patch = ProgramImage::new(0x3003, vec![b'B' as Word]);
    let mut cpu = boot(&[code, patch], b"");

    assert_eq!(cpu.regs.pc, 0x3000);
    cpu.run().unwrap();

    assert_eq!(cpu.io().output_str(), "BHALT\n");
}

#[test]
fn test_entry_follows_first_image() {
    let first = ProgramImage::new(0x5000, vec![halt()]);
    let code = ProgramImage::new(0x3000, vec![0xD000]);
    let mut cpu = boot(&[first, code], b"");

    assert_eq!(cpu.regs.pc, 0x5000);
    cpu.run().unwrap();
    assert!(cpu.is_halted());
}

#[test]
fn test_fault_stops_the_machine() {
    let program = vec![encode(&add_imm(Reg::R3, Reg::R3, 9)), 0xD000, halt()];
    let mut cpu = boot(&[ProgramImage::new(0x3000, program)], b"");

    let err = cpu.run().unwrap_err();

    assert!(matches!(err, CpuError::ReservedOpcode { opcode: Opcode::Res, pc: 0x3001 }));
    assert_eq!(err.to_string(), "unimplemented opcode RES at x3001");
    assert_eq!(cpu.state, CpuState::Faulted { opcode: Opcode::Res, pc: 0x3001 });
    assert_eq!(cpu.regs.get(Reg::R3), 9);
    assert!(cpu.io().output().is_empty());
}

#[test]
fn test_pc_wraps_around_top_of_memory() {
    let mut cpu = Cpu::new(ScriptedIo::new());
    cpu.load_program(0xFFFF, &[encode(&add_imm(Reg::R0, Reg::R0, 1))]);
    cpu.load_program(0x0000, &[halt()]);
    cpu.regs.jump(0xFFFF);

    cpu.run().unwrap();

    assert_eq!(cpu.regs.get(Reg::R0), 1);
    assert_eq!(cpu.regs.pc, 0x0001);
}

#[test]
fn test_snapshot_after_limited_run() {
    let spin = encode(&Instruction::Br { nzp: 0b111, offset: 0xFFFF });
    let mut cpu = boot(&[ProgramImage::new(0x3000, vec![spin])], b"");

    cpu.run_limited(1000).unwrap();
    let snap = cpu.snapshot();

    assert_eq!(snap.state, CpuState::Running);
    assert_eq!(snap.cycles, 1000);
    assert_eq!(snap.pc, 0x3000);
    assert_eq!(
        snap.last_instruction,
        Some(Instruction::Br { nzp: 0b111, offset: 0xFFFF })
    );
}
