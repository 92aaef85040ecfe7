//! Mapper 30 ([UNROM 512](https://www.nesdev.org/wiki/UNROM_512)): UNROM
//! with a multi-field control byte adding CHR bank and nametable select.
//!
//! The CHR field only gets reported to the renderer; the PPU bus carries a
//! single 8 KiB CHR-RAM window regardless. When the cartridge declares
//! ignore-mirroring (single-screen), the nametable range is one
//! `SelectableRam` whose offset the switchboard drives through a shared
//! cell; both ends of that cell are created here so the coupling stays
//! inside this mapper.

use std::cell::Cell;
use std::rc::Rc;

use crate::bus::Handler;
use crate::cartridge::cartridge::Cartridge;
use crate::cartridge::mapper::Mirroring;
use crate::cartridge::mapper::mapper::MapperAssembly;
use crate::cartridge::mapper::switchboard::Unrom512Switchboard;
use crate::memory::{FixedRom, MirrorRam, Ram, SelectableRam};

pub fn assemble(cartridge: &Cartridge) -> MapperAssembly {
    let Some((fixed, swappable)) = cartridge.prg.split_last() else {
        return MapperAssembly { cpu: Vec::new(), ppu: Vec::new() };
    };

    let nametable_offset = cartridge
        .ignore_mirroring
        .then(|| Rc::new(Cell::new(0usize)));

    let mut cpu = Vec::new();
    cpu.push(Handler::Switchboard512(Unrom512Switchboard::new(
        0x8000,
        0x4000,
        swappable.to_vec(),
        nametable_offset.clone(),
    )));
    cpu.push(Handler::FixedRom(FixedRom::new(0xc000, fixed.clone())));

    let mut ppu = Vec::new();
    ppu.push(Handler::Ram(Ram::new(0, 0x2000)));
    match nametable_offset {
        Some(offset) => {
            ppu.push(Handler::SelectableRam(SelectableRam::new(
                0x2000, 0x23ff, 0x800, offset,
            )));
        }
        None => match cartridge.mirroring {
            Mirroring::Horizontal => {
                ppu.push(Handler::Ram(Ram::new(0x2000, 0x400)));
                ppu.push(Handler::Ram(Ram::new(0x2800, 0x400)));
            }
            Mirroring::Vertical => ppu.push(Handler::MirrorRam(MirrorRam::new(0x2000, 0x800))),
        },
    }
    ppu.push(Handler::Ram(Ram::new(0x3f00, 0x20)));

    MapperAssembly { cpu, ppu }
}
