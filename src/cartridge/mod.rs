//! Cartridge parsing and mapper support.
//!
//! - **cartridge**: parses images (headered or header-zeroed), holds PRG/CHR chunks.
//! - **mapper**: NROM (0), UNROM (2), UNROM 512 (30); switchboards and nametable layout.

pub mod cartridge;
pub mod mapper;
