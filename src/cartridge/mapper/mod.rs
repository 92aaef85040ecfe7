//! Cartridge mappers: handler assemblies for the PRG/CHR windows and
//! nametable layout.
//!
//! Mapper 0 (NROM), mapper 2 (UNROM), mapper 30 (UNROM 512), plus the
//! switchboards that decode bankswitch writes.

/// Nametable mirroring mode for the PPU bus layout.
#[derive(Clone, Copy)]
pub enum Mirroring {
    Horizontal,
    Vertical,
}

pub mod mapper;

pub mod mapper0;
pub mod mapper2;
pub mod mapper30;
pub mod switchboard;
