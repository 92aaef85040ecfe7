//! Inert APU register block at $4000–$4013, $4015, and $4017.
//!
//! No audio is synthesized in this machine. Games still write their sound
//! engine's register traffic here; hosts that want music watch those writes
//! through a bus tap and drive real playback externally. Accepting and
//! discarding the traffic keeps that code off the unmapped-address warning
//! path. $4016 belongs to the controller, not this block.

pub struct Apu;

impl Apu {
    pub fn read(&self, _address: usize) -> u8 {
        0
    }

    pub fn write(&mut self, _address: usize, _value: u8) {}
}
