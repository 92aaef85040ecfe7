//! Mapper 2 ([UNROM](https://www.nesdev.org/wiki/UxROM)): swappable PRG
//! banks at $8000–$BFFF behind a single-field switchboard, the last chunk
//! fixed at $C000–$FFFF, CHR-RAM.
//!
//! The fixed chunk is installed as writeback ROM: stores into $C000–$FFFF
//! are bank-select commands, which is how the board's real discrete logic
//! takes them.

use crate::bus::Handler;
use crate::cartridge::cartridge::Cartridge;
use crate::cartridge::mapper::Mirroring;
use crate::cartridge::mapper::mapper::MapperAssembly;
use crate::cartridge::mapper::switchboard::UnromSwitchboard;
use crate::memory::{FixedRom, MirrorRam, Ram};

pub fn assemble(cartridge: &Cartridge) -> MapperAssembly {
    let Some((fixed, swappable)) = cartridge.prg.split_last() else {
        return MapperAssembly { cpu: Vec::new(), ppu: Vec::new() };
    };

    let mut cpu = Vec::new();
    cpu.push(Handler::Switchboard(UnromSwitchboard::new(
        0x8000,
        0x4000,
        swappable.to_vec(),
    )));
    cpu.push(Handler::FixedRom(FixedRom::new(0xc000, fixed.clone())));

    let mut ppu = Vec::new();
    ppu.push(Handler::Ram(Ram::new(0, 0x2000)));
    match cartridge.mirroring {
        Mirroring::Horizontal => {
            ppu.push(Handler::Ram(Ram::new(0x2000, 0x400)));
            ppu.push(Handler::Ram(Ram::new(0x2800, 0x400)));
        }
        // Folding RAM across all four spans, so writes into the mirrored
        // range land in the backing nametables instead of warning.
        Mirroring::Vertical => ppu.push(Handler::MirrorRam(MirrorRam::new(0x2000, 0x800))),
    }
    ppu.push(Handler::Ram(Ram::new(0x3f00, 0x20)));

    MapperAssembly { cpu, ppu }
}
