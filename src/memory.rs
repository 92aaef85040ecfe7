//! Storage handlers for the two buses: ROM, RAM, and the RAM variants the
//! mappers lay nametables out with.
//!
//! Every handler owns an inclusive `[lower, upper]` bus range. RAM-backed
//! handlers keep their array sized `lower + size` so reads and writes index by
//! bus address with no offset subtraction; save/load serialize the full
//! backing array, dead prefix included, which keeps the state image layout
//! stable across versions.

use std::cell::Cell;
use std::rc::Rc;

use crate::bus::{StateError, StateReader};

/// One nametable's worth of bytes.
pub const NAMETABLE_SIZE: usize = 0x400;

/// Read-only bytes installed at a fixed bus range. Writes are dropped.
pub struct Rom {
    lower: usize,
    upper: usize,
    data: Vec<u8>,
}

impl Rom {
    pub fn new(lower: usize, data: Vec<u8>) -> Self {
        let upper = lower + data.len() - 1;
        Rom { lower, upper, data }
    }

    pub fn read(&self, address: usize) -> u8 {
        self.data[address - self.lower]
    }

    pub fn range(&self) -> (usize, usize) {
        (self.lower, self.upper)
    }
}

/// ROM whose writes are not dropped: the bus routes them to the mapper's
/// switchboard as bank-select commands, so a fixed bank's address range
/// doubles as the bankswitch port (how UNROM boards take commands).
pub struct FixedRom {
    rom: Rom,
}

impl FixedRom {
    pub fn new(lower: usize, data: Vec<u8>) -> Self {
        FixedRom { rom: Rom::new(lower, data) }
    }

    pub fn read(&self, address: usize) -> u8 {
        self.rom.read(address)
    }

    pub fn range(&self) -> (usize, usize) {
        self.rom.range()
    }
}

/// Plain RAM over `[lower, lower + size - 1]`.
pub struct Ram {
    lower: usize,
    upper: usize,
    bytes: Vec<u8>,
}

impl Ram {
    pub fn new(lower: usize, size: usize) -> Self {
        Ram {
            lower,
            upper: lower + size - 1,
            bytes: vec![0; lower + size],
        }
    }

    pub fn read(&self, address: usize) -> u8 {
        self.bytes[address]
    }

    pub fn write(&mut self, address: usize, value: u8) {
        self.bytes[address] = value;
    }

    pub fn range(&self) -> (usize, usize) {
        (self.lower, self.upper)
    }

    pub fn save(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.bytes);
    }

    pub fn load(&mut self, reader: &mut StateReader<'_>) -> Result<(), StateError> {
        reader.read_exact(&mut self.bytes)
    }
}

/// RAM whose effective index is `address + offset`, with the offset living in
/// a cell shared with the multi-field switchboard. Bit 7 of a bankswitch
/// write slides all accesses by one nametable span, which is how single-screen
/// mirroring selects its screen. The offset is rebuilt by the game's next
/// bankswitch write after a restore, so it is not serialized.
pub struct SelectableRam {
    lower: usize,
    upper: usize,
    bytes: Vec<u8>,
    offset: Rc<Cell<usize>>,
}

impl SelectableRam {
    pub fn new(lower: usize, upper: usize, size: usize, offset: Rc<Cell<usize>>) -> Self {
        SelectableRam {
            lower,
            upper,
            bytes: vec![0; lower + size],
            offset,
        }
    }

    pub fn read(&self, address: usize) -> u8 {
        self.bytes[address + self.offset.get()]
    }

    pub fn write(&mut self, address: usize, value: u8) {
        let index = address + self.offset.get();
        self.bytes[index] = value;
    }

    pub fn range(&self) -> (usize, usize) {
        (self.lower, self.upper)
    }

    pub fn save(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.bytes);
    }

    pub fn load(&mut self, reader: &mut StateReader<'_>) -> Result<(), StateError> {
        reader.read_exact(&mut self.bytes)
    }
}

/// Vertically mirrored nametable RAM: backs two nametables of storage but
/// covers all four nametable spans; addresses at or past the third span fold
/// down by two spans before indexing, so $2800 and $2000 hit the same cell.
pub struct MirrorRam {
    lower: usize,
    upper: usize,
    size: usize,
    bytes: Vec<u8>,
}

impl MirrorRam {
    pub fn new(lower: usize, size: usize) -> Self {
        MirrorRam {
            lower,
            upper: lower + size * 2 - 1,
            size,
            bytes: vec![0; lower + size],
        }
    }

    fn fold(&self, address: usize) -> usize {
        if address >= self.lower + self.size {
            address - self.size
        } else {
            address
        }
    }

    pub fn read(&self, address: usize) -> u8 {
        self.bytes[self.fold(address)]
    }

    pub fn write(&mut self, address: usize, value: u8) {
        let index = self.fold(address);
        self.bytes[index] = value;
    }

    pub fn range(&self) -> (usize, usize) {
        (self.lower, self.upper)
    }

    pub fn save(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.bytes);
    }

    pub fn load(&mut self, reader: &mut StateReader<'_>) -> Result<(), StateError> {
        reader.read_exact(&mut self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::bus::StateReader;

    #[test]
    fn ram_indexes_by_bus_address() {
        let mut ram = Ram::new(0x2000, 0x400);
        ram.write(0x2005, 0xab);
        assert_eq!(ram.read(0x2005), 0xab);
        assert_eq!(ram.range(), (0x2000, 0x23ff));
    }

    #[test]
    fn ram_serializes_full_backing_array() {
        let ram = Ram::new(0x3f00, 0x20);
        let mut out = Vec::new();
        ram.save(&mut out);
        assert_eq!(out.len(), 0x3f20);
    }

    #[test]
    fn mirror_ram_folds_upper_spans() {
        let mut ram = MirrorRam::new(0x2000, 0x800);
        assert_eq!(ram.range(), (0x2000, 0x2fff));
        for k in [0usize, 1, 0x3ff, 0x7ff] {
            ram.write(0x2000 + k, (k & 0xff) as u8);
            assert_eq!(ram.read(0x2800 + k), (k & 0xff) as u8);
        }
        ram.write(0x2fff, 0x77);
        assert_eq!(ram.read(0x27ff), 0x77);
    }

    #[test]
    fn selectable_ram_follows_shared_offset() {
        let offset = Rc::new(Cell::new(0usize));
        let mut ram = SelectableRam::new(0x2000, 0x23ff, 0x800, Rc::clone(&offset));
        ram.write(0x2000, 0x11);
        offset.set(NAMETABLE_SIZE);
        ram.write(0x2000, 0x22);
        assert_eq!(ram.read(0x2000), 0x22);
        offset.set(0);
        assert_eq!(ram.read(0x2000), 0x11);
    }

    #[test]
    fn ram_round_trips_through_state_stream() {
        let mut ram = Ram::new(0, 8);
        ram.write(3, 0x5a);
        let mut out = Vec::new();
        ram.save(&mut out);

        let mut restored = Ram::new(0, 8);
        let mut reader = StateReader::new(&out);
        restored.load(&mut reader).unwrap();
        assert_eq!(restored.read(3), 0x5a);
    }
}
