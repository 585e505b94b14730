use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use clap_num::maybe_hex;

use chip8_glow::emu::{Chip8, MEMORY_SIZE, PROGRAM_START_ADDRESS, disassemble};

/// Memory listing for CHIP-8 programs.
///
/// Prints one line per instruction word: address, raw word and mnemonic.
/// Words that are not instructions (usually sprite data) get no mnemonic.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Path to the CHIP-8 ROM file
    rom_path: PathBuf,

    /// First address to list (accepts 0x-prefixed hex)
    #[arg(long, value_parser = maybe_hex::<u16>)]
    start: Option<u16>,

    /// Number of bytes to list; defaults to the end of the loaded program
    #[arg(long, value_parser = maybe_hex::<u16>)]
    len: Option<u16>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let rom = std::fs::read(&args.rom_path).context("Failed to read ROM file")?;

    let mut chip8 = Chip8::new();
    chip8
        .load(&rom)
        .context("Failed to load ROM into CHIP-8 memory")?;

    let start = args.start.map_or(PROGRAM_START_ADDRESS, usize::from);
    let end = match args.len {
        Some(len) => start + usize::from(len),
        None => PROGRAM_START_ADDRESS + rom.len(),
    }
    .min(MEMORY_SIZE);

    for addr in (start..end).step_by(2) {
        let Ok(word) = chip8.word_at(addr) else {
            break;
        };
        println!("{addr:04X}: {word:04X} {}", disassemble(word));
    }

    Ok(())
}
