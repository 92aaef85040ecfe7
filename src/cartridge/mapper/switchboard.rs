//! Bankswitch decoders: handlers that redirect reads into a selected PRG
//! bank and interpret writes as bank-select commands.
//!
//! Two flavors. The single-field board takes the written byte as the bank
//! index verbatim (UNROM-style discrete logic). The multi-field board is
//! [UNROM 512](https://www.nesdev.org/wiki/UNROM_512): one control byte packs
//! nametable select (bit 7), CHR bank (bits 6–5), and PRG bank (bits 4–0).
//! Only the PRG selection affects reads here; the CHR field is reported to
//! the renderer and the nametable field drives a shared RAM offset.
//!
//! A selection outside the bank collection answers reads with a warning and
//! 0. Only the PRG selection is serialized (one byte); the multi-field
//! auxiliary fields are rebuilt by the game's next control write.

use std::cell::Cell;
use std::rc::Rc;

use crate::bus::{StateError, StateReader};
use crate::memory::NAMETABLE_SIZE;

/// Single-field bankswitch: `current = written byte`.
pub struct UnromSwitchboard {
    lower: usize,
    upper: usize,
    current: usize,
    banks: Vec<Vec<u8>>,
}

impl UnromSwitchboard {
    pub fn new(lower: usize, size: usize, banks: Vec<Vec<u8>>) -> Self {
        UnromSwitchboard {
            lower,
            upper: lower + size - 1,
            current: 0,
            banks,
        }
    }

    pub fn read(&self, address: usize) -> u8 {
        match self.banks.get(self.current) {
            Some(bank) => bank[address - self.lower],
            None => {
                log::warn!(
                    "prg bank {} selected but only {} banks exist",
                    self.current,
                    self.banks.len()
                );
                0
            }
        }
    }

    pub fn select(&mut self, value: u8) {
        self.current = value as usize;
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn range(&self) -> (usize, usize) {
        (self.lower, self.upper)
    }

    pub fn save(&self, out: &mut Vec<u8>) {
        out.push(self.current as u8);
    }

    pub fn load(&mut self, reader: &mut StateReader<'_>) -> Result<(), StateError> {
        self.current = reader.read_u8()? as usize;
        Ok(())
    }
}

/// Multi-field bankswitch: bit 7 nametable, bits 6–5 CHR, bits 4–0 PRG.
pub struct Unrom512Switchboard {
    lower: usize,
    upper: usize,
    current: usize,
    chr_bank: usize,
    nametable: usize,
    nametable_offset: Option<Rc<Cell<usize>>>,
    banks: Vec<Vec<u8>>,
}

impl Unrom512Switchboard {
    pub fn new(
        lower: usize,
        size: usize,
        banks: Vec<Vec<u8>>,
        nametable_offset: Option<Rc<Cell<usize>>>,
    ) -> Self {
        Unrom512Switchboard {
            lower,
            upper: lower + size - 1,
            current: 0,
            chr_bank: 0,
            nametable: 0,
            nametable_offset,
            banks,
        }
    }

    pub fn read(&self, address: usize) -> u8 {
        match self.banks.get(self.current) {
            Some(bank) => bank[address - self.lower],
            None => {
                log::warn!(
                    "prg bank {} selected but only {} banks exist",
                    self.current,
                    self.banks.len()
                );
                0
            }
        }
    }

    pub fn select(&mut self, value: u8) {
        let value = value as usize;
        self.nametable = value >> 7;
        if let Some(offset) = &self.nametable_offset {
            offset.set(if self.nametable == 1 { NAMETABLE_SIZE } else { 0 });
        }
        self.chr_bank = (value & 0x7f) >> 5;
        self.current = value & 0x1f;
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn chr_bank(&self) -> usize {
        self.chr_bank
    }

    pub fn nametable(&self) -> usize {
        self.nametable
    }

    pub fn range(&self) -> (usize, usize) {
        (self.lower, self.upper)
    }

    pub fn save(&self, out: &mut Vec<u8>) {
        out.push(self.current as u8);
    }

    pub fn load(&mut self, reader: &mut StateReader<'_>) -> Result<(), StateError> {
        self.current = reader.read_u8()? as usize;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn banks(count: usize) -> Vec<Vec<u8>> {
        (0..count).map(|i| vec![i as u8; 0x4000]).collect()
    }

    #[test]
    fn single_field_takes_the_byte_verbatim() {
        let mut board = UnromSwitchboard::new(0x8000, 0x4000, banks(4));
        assert_eq!(board.read(0x8000), 0);
        board.select(2);
        assert_eq!(board.read(0x8000), 2);
        assert_eq!(board.read(0xbfff), 2);
        assert_eq!(board.current(), 2);
    }

    #[test]
    fn out_of_range_selection_reads_zero() {
        let mut board = UnromSwitchboard::new(0x8000, 0x4000, banks(2));
        board.select(9);
        assert_eq!(board.read(0x8000), 0);
    }

    #[test]
    fn multi_field_unpacks_nametable_chr_and_prg() {
        let offset = Rc::new(Cell::new(0usize));
        let mut board =
            Unrom512Switchboard::new(0x8000, 0x4000, banks(8), Some(Rc::clone(&offset)));

        board.select(0b1_10_00101);
        assert_eq!(board.current(), 5);
        assert_eq!(board.chr_bank(), 2);
        assert_eq!(board.nametable(), 1);
        assert_eq!(offset.get(), NAMETABLE_SIZE);
        assert_eq!(board.read(0x8000), 5);

        board.select(0b0_01_00011);
        assert_eq!(board.current(), 3);
        assert_eq!(board.chr_bank(), 1);
        assert_eq!(offset.get(), 0);
    }

    #[test]
    fn serialization_keeps_only_the_prg_field() {
        let mut board = Unrom512Switchboard::new(0x8000, 0x4000, banks(8), None);
        board.select(0b1_11_00110);
        let mut out = Vec::new();
        board.save(&mut out);
        assert_eq!(out, vec![6]);

        let mut restored = Unrom512Switchboard::new(0x8000, 0x4000, banks(8), None);
        let mut reader = StateReader::new(&out);
        restored.load(&mut reader).unwrap();
        assert_eq!(restored.current(), 6);
        assert_eq!(restored.chr_bank(), 0);
    }
}
