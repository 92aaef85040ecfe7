//! Mapper assembly contract: each strategy turns a cartridge into the
//! handler sets installed on the two buses.

use crate::bus::Handler;
use crate::cartridge::cartridge::{Cartridge, CartridgeError};
use crate::cartridge::mapper::{mapper0, mapper2, mapper30};

/// Handlers a mapper contributes, one list per bus. The machine installs
/// them in order after its own peripherals.
pub struct MapperAssembly {
    pub cpu: Vec<Handler>,
    pub ppu: Vec<Handler>,
}

/// Closed dispatch on the mapper id.
pub fn assemble(cartridge: &Cartridge) -> Result<MapperAssembly, CartridgeError> {
    if cartridge.prg.is_empty() {
        return Err(CartridgeError::NoPrg);
    }
    match cartridge.mapper {
        0 => Ok(mapper0::assemble(cartridge)),
        2 => Ok(mapper2::assemble(cartridge)),
        30 => Ok(mapper30::assemble(cartridge)),
        id => Err(CartridgeError::UnsupportedMapper(id)),
    }
}
