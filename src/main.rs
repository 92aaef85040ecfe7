//! Headless machine runner.
//!
//! Loads a cartridge and drives it frame by frame at NTSC pace, with no
//! picture output; useful for smoke-testing a ROM and watching the
//! interpreter rate. Usage: famivm [path/to/game.nes] [frames]

use std::error::Error;
use std::time::{Duration, Instant};
use std::{env, fs, process, thread};

use ansi_term::Colour::{Green, Red};
use famivm::cartridge::cartridge::Cartridge;
use famivm::machine::{AlwaysSafe, Machine};

/// NTSC vertical blank: one frame per 16.67 ms.
const FRAME_DURATION: Duration = Duration::from_nanos(16_666_667);

/// Instruction budget per frame. Generous for the stock core, so games
/// never starve; idle loops soak up the remainder.
const INSTRUCTIONS_PER_FRAME: u32 = 9000;

fn main() {
    env_logger::init();

    let path = env::args().nth(1).unwrap_or_else(|| "game.nes".to_string());
    let frames: u32 = env::args()
        .nth(2)
        .and_then(|count| count.parse().ok())
        .unwrap_or(600);

    if let Err(error) = run(&path, frames) {
        println!("{}: {}", Red.bold().paint("ERROR"), error);
        process::exit(1);
    }
}

fn run(path: &str, frames: u32) -> Result<(), Box<dyn Error>> {
    let bytes = fs::read(path)?;
    let cartridge = Cartridge::parse(&bytes)?;
    let mut machine = Machine::new(cartridge, Box::new(AlwaysSafe), None)?;

    machine.start();
    for _ in 0..frames {
        let frame_start = Instant::now();

        machine.nmi()?;
        machine.advance(INSTRUCTIONS_PER_FRAME)?;
        machine.log_instructions_per_second();

        // Pace to ~60 fps; the interpreter far outruns the real console.
        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_DURATION {
            thread::sleep(FRAME_DURATION - elapsed);
        }
    }
    machine.stop();
    let executed = machine.instruction_count();

    // Persistence smoke test: the image must restore onto the machine it
    // came from. Restoring rebuilds the interpreter, so read the counter
    // first.
    let image = machine.save_state();
    machine.load_state(&image)?;

    println!(
        "{}: {} ran {} frames, {} instructions, stopped at pc {:04x}, state image {} bytes",
        Green.bold().paint("INFO"),
        path,
        frames,
        executed,
        machine.pc(),
        image.len()
    );
    Ok(())
}
