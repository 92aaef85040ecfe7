//! Mapper 0 ([NROM](https://www.nesdev.org/wiki/NROM)): no bankswitching.
//! Up to two fixed PRG chunks at $8000/$C000 and an optional CHR ROM.

use crate::bus::Handler;
use crate::cartridge::cartridge::Cartridge;
use crate::cartridge::mapper::Mirroring;
use crate::cartridge::mapper::mapper::MapperAssembly;
use crate::memory::{Ram, Rom};

pub fn assemble(cartridge: &Cartridge) -> MapperAssembly {
    let mut cpu = Vec::new();
    cpu.push(Handler::Rom(Rom::new(0x8000, cartridge.prg[0].clone())));
    if let Some(upper) = cartridge.prg.get(1) {
        cpu.push(Handler::Rom(Rom::new(0xc000, upper.clone())));
    }

    let mut ppu = Vec::new();
    // No CHR chunk means the host supplies graphics some other way; the
    // pattern range is left to the diagnostic fallback.
    if let Some(chr) = cartridge.chr.first() {
        ppu.push(Handler::Rom(Rom::new(0, chr.clone())));
    }
    match cartridge.mirroring {
        Mirroring::Horizontal => {
            ppu.push(Handler::Ram(Ram::new(0x2000, 0x400)));
            ppu.push(Handler::Ram(Ram::new(0x2800, 0x400)));
        }
        // One contiguous two-span block serialized as a single array; the
        // state-image layout for this mapper depends on it.
        Mirroring::Vertical => ppu.push(Handler::Ram(Ram::new(0x2000, 0x800))),
    }
    ppu.push(Handler::Ram(Ram::new(0x3f00, 0x20)));

    MapperAssembly { cpu, ppu }
}
