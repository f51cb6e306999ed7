//! LC-3 Emulator - CLI Entry Point
//!
//! `lc3-emu [OPTIONS] <IMAGE>...` loads each object image in order and runs
//! from the first image's origin until the program halts.
//!
//! Exit status:
//! - 0: the program halted (or `--max-cycles` ran out)
//! - 1: an image could not be loaded
//! - 2: usage error
//! - 3: the program hit an unimplemented opcode
//! - 4: console I/O failed
//! - 130: interrupted with Ctrl-C

use clap::Parser;
use lc3::{load_image, Cpu, CpuError, CpuState, IoBridge, TerminalIo, Word};
use log::LevelFilter;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

const EXIT_LOAD_FAILED: u8 = 1;
const EXIT_FAULT: u8 = 3;
const EXIT_IO: u8 = 4;
const EXIT_INTERRUPTED: u8 = 130;

/// Instructions executed between checks of the console for Ctrl-C.
const SLICE: u64 = 10_000;

#[derive(Parser, Debug)]
#[command(name = "lc3-emu")]
#[command(version)]
#[command(about = "An emulator for the LC-3 16-bit educational computer")]
struct Cli {
    /// Object images to load, in order
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Start address instead of the first image's origin (x3000, 0x3000 or #12288)
    #[arg(short, long, value_parser = parse_address)]
    entry: Option<Word>,

    /// Stop after this many instructions
    #[arg(short, long)]
    max_cycles: Option<u64>,

    /// Log every executed instruction
    #[arg(short, long)]
    trace: bool,

    /// Print the final machine state as JSON on stderr
    #[arg(long)]
    dump_state: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.trace);

    let mut images = Vec::with_capacity(cli.images.len());
    for path in &cli.images {
        match load_image(path) {
            Ok(image) => images.push(image),
            Err(e) => {
                eprintln!("failed to load image: {}", e);
                return ExitCode::from(EXIT_LOAD_FAILED);
            }
        }
    }

    let io = match TerminalIo::new() {
        Ok(io) => io,
        Err(e) => {
            eprintln!("failed to configure terminal: {}", e);
            return ExitCode::from(EXIT_IO);
        }
    };

    let mut cpu = Cpu::new(io);
    cpu.boot(&images);
    if let Some(entry) = cli.entry {
        cpu.regs.jump(entry);
    }
    log::info!("starting at x{:04X}", cpu.regs.pc);

    let result = run_sliced(&mut cpu, cli.max_cycles);
    let snapshot = cpu.snapshot();

    // Leave raw mode before reporting anything.
    drop(cpu);

    let code = report(result, snapshot.state);

    if cli.dump_state {
        match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => eprintln!("{}", json),
            Err(e) => eprintln!("failed to serialize state: {}", e),
        }
    }

    code
}

/// Run in slices, polling the console in between.
///
/// Raw mode delivers Ctrl-C as a key press, which is only noticed when the
/// console is polled. A program that never reads the keyboard still gets
/// polled here, and the interrupt comes back as `CpuError::Io`.
fn run_sliced<I: IoBridge>(cpu: &mut Cpu<I>, max_cycles: Option<u64>) -> Result<u64, CpuError> {
    let mut executed = 0;
    while cpu.is_running() {
        let budget = match max_cycles {
            Some(max) => (max - executed).min(SLICE),
            None => SLICE,
        };
        if budget == 0 {
            break;
        }
        executed += cpu.run_limited(budget)?;
        if cpu.is_running() {
            cpu.io_mut().poll_input()?;
        }
    }
    Ok(executed)
}

/// Map the outcome of a run to a message and an exit status.
fn report(result: Result<u64, CpuError>, state: CpuState) -> ExitCode {
    match result {
        Ok(executed) => {
            if state == CpuState::Running {
                eprintln!("stopped after {} instructions (--max-cycles)", executed);
            }
            ExitCode::SUCCESS
        }
        Err(e) if e.is_interrupt() => {
            eprintln!();
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e @ CpuError::ReservedOpcode { .. }) => {
            eprintln!("{}", e);
            ExitCode::from(EXIT_FAULT)
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(EXIT_IO)
        }
    }
}

/// `RUST_LOG` picks the level unless `--trace` forces everything on.
///
/// Lines end in CRLF since the terminal is in raw mode while the CPU runs.
fn init_logging(trace: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if trace {
        builder.filter_level(LevelFilter::Trace);
    }
    builder.format(|buf, record| {
        write!(buf, "[{:<5} {}] {}\r\n", record.level(), record.target(), record.args())
    });
    builder.init();
}

/// Parse an address as LC-3 style hex (`x3000`), C style hex (`0x3000`),
/// bare hex (`3000`) or `#`-prefixed decimal (`#12288`).
fn parse_address(s: &str) -> Result<Word, String> {
    let s = s.trim();
    if let Some(decimal) = s.strip_prefix('#') {
        return decimal
            .parse::<Word>()
            .map_err(|e| format!("invalid decimal address '{}': {}", s, e));
    }

    let hex = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .or_else(|| s.strip_prefix('x'))
        .or_else(|| s.strip_prefix('X'))
        .unwrap_or(s);
    Word::from_str_radix(hex, 16).map_err(|e| format!("invalid hex address '{}': {}", s, e))
}
