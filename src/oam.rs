//! Sprite RAM (OAM): 64 sprites of 4 bytes each, filled by $4014 DMA.
//!
//! The handler claims two registers. $2003 (OAM address) is inert here:
//! games on this machine always transfer whole pages, so partial addressing
//! is never needed. $4014 takes a page number; the bus copies that 256-byte
//! CPU page into this table. Reads of either register return 0.

use crate::bus::{StateError, StateReader};

pub const OAM_SIZE: usize = 256;

pub struct Oam {
    bytes: [u8; OAM_SIZE],
}

impl Oam {
    pub fn new() -> Self {
        Oam { bytes: [0; OAM_SIZE] }
    }

    pub fn register_read(&self, _address: usize) -> u8 {
        0
    }

    pub fn register_write(&mut self, _address: usize, _value: u8) {}

    /// Replace the whole table; the bus calls this to complete a $4014 DMA.
    pub fn load_page(&mut self, page: &[u8; OAM_SIZE]) {
        self.bytes.copy_from_slice(page);
    }

    pub fn byte(&self, index: usize) -> u8 {
        self.bytes.get(index).copied().unwrap_or(0)
    }

    pub fn sprite_y(&self, sprite: usize) -> u8 {
        self.byte(sprite << 2)
    }

    pub fn sprite_tile(&self, sprite: usize) -> u8 {
        self.byte((sprite << 2) + 1)
    }

    pub fn sprite_attributes(&self, sprite: usize) -> u8 {
        self.byte((sprite << 2) + 2)
    }

    pub fn sprite_x(&self, sprite: usize) -> u8 {
        self.byte((sprite << 2) + 3)
    }

    pub fn save(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.bytes);
    }

    pub fn load(&mut self, reader: &mut StateReader<'_>) -> Result<(), StateError> {
        reader.read_exact(&mut self.bytes)
    }
}

impl Default for Oam {
    fn default() -> Self {
        Oam::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprites_decode_in_four_byte_strides() {
        let mut oam = Oam::new();
        let mut page = [0u8; OAM_SIZE];
        page[8] = 0x30; // sprite 2 y
        page[9] = 0x41; // sprite 2 tile
        page[10] = 0xc3; // sprite 2 attributes
        page[11] = 0x77; // sprite 2 x
        oam.load_page(&page);

        assert_eq!(oam.sprite_y(2), 0x30);
        assert_eq!(oam.sprite_tile(2), 0x41);
        assert_eq!(oam.sprite_attributes(2), 0xc3);
        assert_eq!(oam.sprite_x(2), 0x77);
        // Out-of-table sprites read as 0 rather than panicking.
        assert_eq!(oam.sprite_y(64), 0);
    }
}
