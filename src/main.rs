//! CLI front-end: loads a ROM, drives the core for a bounded run, and exits.
//! Rendering, audio, and keyboard scanning are external collaborators (§1);
//! this binary exercises the core end-to-end without any of them wired in.

mod bits;
mod bus;
mod cartridge;
mod cpu;
mod error;
mod joypad;
mod mapper;
mod memory;
mod nes;
mod opcodes;
mod ppu;
mod ram;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use cartridge::Cartridge;
use nes::Nes;

/// Number of CPU instructions executed per simulated frame. The core is
/// instruction-stepped, not cycle-stepped (§1 Non-goals), so this stands in
/// for the ~29780 PPU dots of a real frame without claiming cycle accuracy.
const INSTRUCTIONS_PER_FRAME: u32 = 2000;

/// Frames run before the CLI reports state and exits, since no renderer
/// collaborator is wired into the core crate (§10.4).
const FRAMES_TO_RUN: u32 = 60;

#[derive(Debug, Parser)]
#[clap(name = "nes-core", about = "A NES emulator core: CPU, bus, PPU, and cartridge loader", long_about = None)]
struct Cli {
    /// Path to an iNES ROM image.
    rom: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(1);
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> error::Result<()> {
    let cartridge = Cartridge::from_path(cli.rom)?;
    let mut nes = Nes::new(cartridge)?;

    for frame in 0..FRAMES_TO_RUN {
        for _ in 0..INSTRUCTIONS_PER_FRAME {
            nes.step()?;
        }
        nes.enter_vblank()?;
        let _screen = nes.produce_frame();
        nes.leave_vblank();
        log::debug!("frame {frame} rendered, pc={:#06x}", nes.cpu_pc());
    }

    log::info!("ran {FRAMES_TO_RUN} frames cleanly");
    Ok(())
}
