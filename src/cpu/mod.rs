//! 6502 CPU emulation for the NES.
//!
//! Behavioral interpreter covering the documented instruction set a licensed
//! game actually executes; instruction-counted rather than clocked. The ALU
//! departures from stock silicon are listed in [`cpu`].

pub mod cpu;
pub mod flags;

#[cfg(test)]
mod tests;
