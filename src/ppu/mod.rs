//! PPU (Picture Processing Unit) register emulation for the NES.
//!
//! See [PPU](https://www.nesdev.org/wiki/PPU), [PPU registers](https://www.nesdev.org/wiki/PPU_registers),
//! [PPU memory map](https://www.nesdev.org/wiki/PPU_memory_map). Behavioral rather than
//! cycle-accurate: no dot clock and no scanline rendering. The register couplings games
//! depend on ($2002 toggle reset, $2006/$2007 latching, $2000 nametable select) are
//! modeled exactly, and the pattern, nametable, and palette memory behind them is held
//! on a PPU-side bus the host queries directly.

pub mod ppu;
