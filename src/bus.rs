//! Address bus: per-address dispatch to handlers, bus taps, and the
//! deduplicated save walk.
//!
//! Each bus owns a slot table with one entry per address and an arena of
//! handlers; installing a handler writes its arena index into every slot of
//! its range, so many slots can share one handler. Reads and writes are O(1):
//! slot lookup, then a match on the handler variant. Slots nobody claimed hit
//! the diagnostic fallback, which logs the access (with the CPU registers and
//! the selected PRG bank) and answers 0; stray accesses are the usual
//! ROM-compatibility symptom.
//!
//! Taps ([`BusListener`]) observe traffic over a range without sitting in the
//! slot table: reads are announced before dispatch, writes after. Install and
//! uninstall are pure side-table edits; removing a tap restores bit-identical
//! bus behavior, and taps never appear in the save walk.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use thiserror::Error;

use crate::apu::Apu;
use crate::cartridge::cartridge::CartridgeError;
use crate::cartridge::mapper::switchboard::{Unrom512Switchboard, UnromSwitchboard};
use crate::controller::Controller;
use crate::memory::{FixedRom, MirrorRam, Ram, Rom, SelectableRam};
use crate::oam::{Oam, OAM_SIZE};
use crate::ppu::ppu::Ppu;

/// CPU-visible address space plus a guard region, so code that indexes a
/// little past the 64 KiB boundary (unwrapped indexed addressing) lands in
/// diagnosable territory instead of crashing.
pub const CPU_BUS_SIZE: usize = 0x10000 + 0x100;
/// PPU-visible address space.
pub const PPU_BUS_SIZE: usize = 0x4000;

/// Slot value meaning "no handler installed".
const UNMAPPED: usize = usize::MAX;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BusKind {
    Cpu,
    Ppu,
}

/// CPU register values published once per executed instruction so bus
/// diagnostics can say where a stray access came from.
#[derive(Clone, Copy, Default)]
pub struct CpuSnapshot {
    pub pc: usize,
    pub sp: usize,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub carry: u8,
    pub zero: bool,
    pub interrupt_disable: bool,
    pub decimal: bool,
    pub overflow: bool,
    pub negative: bool,
}

impl CpuSnapshot {
    /// One-line register rendering used in warnings and fatal diagnostics.
    pub fn describe(&self) -> String {
        format!(
            " a: {:x} x: {:x} y: {:x} pc: {:x} sp: {:x} C: {} Z: {} I: {} D: {} V: {} N: {}",
            self.a,
            self.x,
            self.y,
            self.pc,
            self.sp,
            self.carry,
            self.zero,
            self.interrupt_disable,
            self.decimal,
            self.overflow,
            self.negative
        )
    }
}

/// Observer attached over an address range; see the module doc for ordering.
pub trait BusListener {
    fn on_read(&mut self, _address: usize) {}
    fn on_write(&mut self, _address: usize, _value: u8) {}
}

/// Host-supplied handler (a "virtual register"): the embedding application
/// installs these to give games extra memory-mapped services, e.g. soundtrack
/// or status-bar control ports above the stock hardware range. They hold no
/// machine state and never participate in save/restore.
pub trait HostDevice {
    fn lower(&self) -> usize;
    fn upper(&self) -> usize;
    fn read(&mut self, address: usize) -> u8;
    fn write(&mut self, address: usize, value: u8);
}

struct Tap {
    lower: usize,
    upper: usize,
    listener: Rc<RefCell<dyn BusListener>>,
}

/// Everything installable on a bus. Storage and peripherals are closed
/// variants; `Host` is the extension point.
pub enum Handler {
    Rom(Rom),
    FixedRom(FixedRom),
    Ram(Ram),
    SelectableRam(SelectableRam),
    MirrorRam(MirrorRam),
    Switchboard(UnromSwitchboard),
    Switchboard512(Unrom512Switchboard),
    PpuRegisters(Ppu),
    Oam(Oam),
    Apu(Apu),
    Controller(Controller),
    Host(Rc<RefCell<dyn HostDevice>>),
}

impl Handler {
    /// The inclusive slot ranges this handler claims. Composite peripherals
    /// claim several disjoint ranges; leaving a gap (like $2004 between the
    /// PPU registers and OAM) keeps that gap on the diagnostic fallback.
    fn ranges(&self) -> Vec<(usize, usize)> {
        match self {
            Handler::Rom(rom) => vec![rom.range()],
            Handler::FixedRom(rom) => vec![rom.range()],
            Handler::Ram(ram) => vec![ram.range()],
            Handler::SelectableRam(ram) => vec![ram.range()],
            Handler::MirrorRam(ram) => vec![ram.range()],
            Handler::Switchboard(switchboard) => vec![switchboard.range()],
            Handler::Switchboard512(switchboard) => vec![switchboard.range()],
            Handler::PpuRegisters(_) => vec![(0x2000, 0x2002), (0x2005, 0x2007)],
            Handler::Oam(_) => vec![(0x2003, 0x2003), (0x4014, 0x4014)],
            Handler::Apu(_) => vec![(0x4000, 0x4013), (0x4015, 0x4015), (0x4017, 0x4017)],
            Handler::Controller(_) => vec![(0x4016, 0x4016)],
            Handler::Host(device) => {
                let device = device.borrow();
                vec![(device.lower(), device.upper())]
            }
        }
    }

    fn save(&self, out: &mut Vec<u8>) {
        match self {
            Handler::Rom(_) | Handler::FixedRom(_) | Handler::Apu(_) | Handler::Host(_) => {}
            Handler::Ram(ram) => ram.save(out),
            Handler::SelectableRam(ram) => ram.save(out),
            Handler::MirrorRam(ram) => ram.save(out),
            Handler::Switchboard(switchboard) => switchboard.save(out),
            Handler::Switchboard512(switchboard) => switchboard.save(out),
            Handler::PpuRegisters(ppu) => ppu.save(out),
            Handler::Oam(oam) => oam.save(out),
            Handler::Controller(controller) => controller.save(out),
        }
    }

    fn load(&mut self, reader: &mut StateReader<'_>) -> Result<(), StateError> {
        match self {
            Handler::Rom(_) | Handler::FixedRom(_) | Handler::Apu(_) | Handler::Host(_) => Ok(()),
            Handler::Ram(ram) => ram.load(reader),
            Handler::SelectableRam(ram) => ram.load(reader),
            Handler::MirrorRam(ram) => ram.load(reader),
            Handler::Switchboard(switchboard) => switchboard.load(reader),
            Handler::Switchboard512(switchboard) => switchboard.load(reader),
            Handler::PpuRegisters(ppu) => ppu.load(reader),
            Handler::Oam(oam) => oam.load(reader),
            Handler::Controller(controller) => controller.load(reader),
        }
    }
}

pub struct Bus {
    kind: BusKind,
    slots: Vec<usize>,
    handlers: Vec<Handler>,
    taps: Vec<Tap>,
    cpu_state: Rc<Cell<CpuSnapshot>>,
}

impl Bus {
    pub fn new(kind: BusKind, cpu_state: Rc<Cell<CpuSnapshot>>) -> Self {
        let size = match kind {
            BusKind::Cpu => CPU_BUS_SIZE,
            BusKind::Ppu => PPU_BUS_SIZE,
        };
        Bus {
            kind,
            slots: vec![UNMAPPED; size],
            handlers: Vec::new(),
            taps: Vec::new(),
            cpu_state,
        }
    }

    /// Install a handler across every slot it claims. Later installs win on
    /// overlap. Returns the handler's arena index.
    pub fn add(&mut self, handler: Handler) -> usize {
        let id = self.handlers.len();
        for (lower, upper) in handler.ranges() {
            for slot in lower..=upper.min(self.slots.len() - 1) {
                self.slots[slot] = id;
            }
        }
        self.handlers.push(handler);
        id
    }

    /// Attach a listener over `[address, address + size)`.
    pub fn install_tap(
        &mut self,
        address: usize,
        size: usize,
        listener: Rc<RefCell<dyn BusListener>>,
    ) {
        if size == 0 {
            return;
        }
        self.taps.push(Tap {
            lower: address,
            upper: address + size - 1,
            listener,
        });
    }

    /// Detach every listener whose range lies within `[address, address +
    /// size)`. Detaching where nothing is attached is a no-op.
    pub fn uninstall_tap(&mut self, address: usize, size: usize) {
        if size == 0 {
            return;
        }
        let upper = address + size - 1;
        self.taps
            .retain(|tap| !(tap.lower >= address && tap.upper <= upper));
    }

    pub fn read8(&mut self, address: usize) -> u8 {
        for tap in &self.taps {
            if address >= tap.lower && address <= tap.upper {
                tap.listener.borrow_mut().on_read(address);
            }
        }
        self.dispatch_read(address)
    }

    /// Little-endian 16-bit read via two 8-bit reads.
    pub fn read16(&mut self, address: usize) -> usize {
        let lo = self.read8(address) as usize;
        let hi = self.read8(address + 1) as usize;
        (hi << 8) | lo
    }

    pub fn write8(&mut self, address: usize, value: u8) {
        self.dispatch_write(address, value);
        for tap in &self.taps {
            if address >= tap.lower && address <= tap.upper {
                tap.listener.borrow_mut().on_write(address, value);
            }
        }
    }

    /// Side-effect-free read into storage handlers, for host queries (palette,
    /// nametable, and pattern lookups). Registers with read side effects are
    /// not peekable and answer 0.
    pub fn peek8(&self, address: usize) -> u8 {
        let id = match self.slots.get(address) {
            Some(&id) if id != UNMAPPED => id,
            _ => {
                self.warn("read", address);
                return 0;
            }
        };
        match &self.handlers[id] {
            Handler::Rom(rom) => rom.read(address),
            Handler::FixedRom(rom) => rom.read(address),
            Handler::Ram(ram) => ram.read(address),
            Handler::SelectableRam(ram) => ram.read(address),
            Handler::MirrorRam(ram) => ram.read(address),
            Handler::Switchboard(switchboard) => switchboard.read(address),
            Handler::Switchboard512(switchboard) => switchboard.read(address),
            _ => 0,
        }
    }

    fn dispatch_read(&mut self, address: usize) -> u8 {
        let id = match self.slots.get(address) {
            Some(&id) if id != UNMAPPED => id,
            _ => {
                self.warn("read", address);
                return 0;
            }
        };
        match &mut self.handlers[id] {
            Handler::Rom(rom) => rom.read(address),
            Handler::FixedRom(rom) => rom.read(address),
            Handler::Ram(ram) => ram.read(address),
            Handler::SelectableRam(ram) => ram.read(address),
            Handler::MirrorRam(ram) => ram.read(address),
            Handler::Switchboard(switchboard) => switchboard.read(address),
            Handler::Switchboard512(switchboard) => switchboard.read(address),
            Handler::PpuRegisters(ppu) => ppu.register_read(address),
            Handler::Oam(oam) => oam.register_read(address),
            Handler::Apu(apu) => apu.read(address),
            Handler::Controller(controller) => controller.read(address),
            Handler::Host(device) => device.borrow_mut().read(address),
        }
    }

    fn dispatch_write(&mut self, address: usize, value: u8) {
        let id = match self.slots.get(address) {
            Some(&id) if id != UNMAPPED => id,
            _ => {
                self.warn("write", address);
                return;
            }
        };
        // A write into the fixed bank is a bank-select command for the
        // switchboard, not a store.
        if matches!(self.handlers[id], Handler::FixedRom(_)) {
            self.select_bank(value);
            return;
        }
        // $4014 takes a page number and copies that CPU page into OAM.
        if address == 0x4014 && matches!(self.handlers[id], Handler::Oam(_)) {
            self.oam_dma(id, value);
            return;
        }
        match &mut self.handlers[id] {
            Handler::Rom(_) | Handler::FixedRom(_) => {}
            Handler::Ram(ram) => ram.write(address, value),
            Handler::SelectableRam(ram) => ram.write(address, value),
            Handler::MirrorRam(ram) => ram.write(address, value),
            Handler::Switchboard(switchboard) => switchboard.select(value),
            Handler::Switchboard512(switchboard) => switchboard.select(value),
            Handler::PpuRegisters(ppu) => ppu.register_write(address, value),
            Handler::Oam(oam) => oam.register_write(address, value),
            Handler::Apu(apu) => apu.write(address, value),
            Handler::Controller(controller) => controller.write(address, value),
            Handler::Host(device) => device.borrow_mut().write(address, value),
        }
    }

    fn select_bank(&mut self, value: u8) {
        for handler in &mut self.handlers {
            match handler {
                Handler::Switchboard(switchboard) => {
                    switchboard.select(value);
                    return;
                }
                Handler::Switchboard512(switchboard) => {
                    switchboard.select(value);
                    return;
                }
                _ => {}
            }
        }
    }

    fn oam_dma(&mut self, id: usize, page: u8) {
        let base = (page as usize) << 8;
        let mut copy = [0u8; OAM_SIZE];
        for (i, byte) in copy.iter_mut().enumerate() {
            *byte = self.read8(base + i);
        }
        if let Handler::Oam(oam) = &mut self.handlers[id] {
            oam.load_page(&copy);
        }
    }

    fn warn(&self, direction: &str, address: usize) {
        let bank = match self.lower_prg_bank() {
            Some(bank) => bank.to_string(),
            None => String::new(),
        };
        log::warn!(
            "Address: {:x} was {}? Cpu status:{} bank: {}",
            address,
            direction,
            self.cpu_state.get().describe(),
            bank
        );
    }

    /// Currently selected PRG bank when a switchboard sits at the bottom of
    /// the PRG window, else `None`.
    pub fn lower_prg_bank(&self) -> Option<usize> {
        if self.kind != BusKind::Cpu {
            return None;
        }
        let id = *self.slots.get(0x8000)?;
        if id == UNMAPPED {
            return None;
        }
        match &self.handlers[id] {
            Handler::Switchboard(switchboard) => Some(switchboard.current()),
            Handler::Switchboard512(switchboard) => Some(switchboard.current()),
            _ => None,
        }
    }

    /// Currently selected CHR bank, reported by the multi-field switchboard.
    pub fn chr_bank(&self) -> Option<usize> {
        self.handlers.iter().find_map(|handler| match handler {
            Handler::Switchboard512(switchboard) => Some(switchboard.chr_bank()),
            _ => None,
        })
    }

    pub fn ppu(&self) -> Option<&Ppu> {
        self.handlers.iter().find_map(|handler| match handler {
            Handler::PpuRegisters(ppu) => Some(ppu),
            _ => None,
        })
    }

    pub fn ppu_mut(&mut self) -> Option<&mut Ppu> {
        self.handlers.iter_mut().find_map(|handler| match handler {
            Handler::PpuRegisters(ppu) => Some(ppu),
            _ => None,
        })
    }

    pub fn oam(&self) -> Option<&Oam> {
        self.handlers.iter().find_map(|handler| match handler {
            Handler::Oam(oam) => Some(oam),
            _ => None,
        })
    }

    pub fn controller_mut(&mut self) -> Option<&mut Controller> {
        self.handlers.iter_mut().find_map(|handler| match handler {
            Handler::Controller(controller) => Some(controller),
            _ => None,
        })
    }

    /// Serialize every unique handler exactly once, in slot order. Handlers
    /// covering several slots (or several ranges) contribute at their first
    /// slot only, so mirrored and composite handlers are never written twice.
    pub fn save(&self, out: &mut Vec<u8>) {
        let mut visited = vec![false; self.handlers.len()];
        for &id in &self.slots {
            if id == UNMAPPED || visited[id] {
                continue;
            }
            visited[id] = true;
            self.handlers[id].save(out);
        }
    }

    /// Mirror of [`save`](Bus::save): same walk, same order.
    pub fn load(&mut self, reader: &mut StateReader<'_>) -> Result<(), StateError> {
        let mut visited = vec![false; self.handlers.len()];
        for slot in 0..self.slots.len() {
            let id = self.slots[slot];
            if id == UNMAPPED || visited[id] {
                continue;
            }
            visited[id] = true;
            self.handlers[id].load(reader)?;
        }
        Ok(())
    }
}

/// Errors raised while restoring a saved state image.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state image ended early at offset {offset}, wanted {wanted} more byte(s)")]
    UnexpectedEnd { offset: usize, wanted: usize },
    #[error("machine could not be rebuilt for restore: {0}")]
    Rebuild(#[from] CartridgeError),
}

/// Cursor over a saved state image. Multi-byte integers are big-endian.
pub struct StateReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> StateReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        StateReader { bytes, pos: 0 }
    }

    pub fn read_u8(&mut self) -> Result<u8, StateError> {
        let byte = *self.bytes.get(self.pos).ok_or(StateError::UnexpectedEnd {
            offset: self.pos,
            wanted: 1,
        })?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_bool(&mut self) -> Result<bool, StateError> {
        Ok(self.read_u8()? == 1)
    }

    pub fn read_u32(&mut self) -> Result<u32, StateError> {
        let mut raw = [0u8; 4];
        self.read_exact(&mut raw)?;
        Ok(u32::from_be_bytes(raw))
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), StateError> {
        let end = self.pos + buf.len();
        let source = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| StateError::UnexpectedEnd {
                offset: self.pos,
                wanted: end - self.bytes.len(),
            })?;
        buf.copy_from_slice(source);
        self.pos = end;
        Ok(())
    }
}

pub fn push_bool(out: &mut Vec<u8>, value: bool) {
    out.push(if value { 1 } else { 0 });
}

pub fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_bus() -> Bus {
        Bus::new(BusKind::Cpu, Rc::new(Cell::new(CpuSnapshot::default())))
    }

    #[test]
    fn installed_handler_covers_exactly_its_range() {
        let mut bus = cpu_bus();
        bus.add(Handler::Ram(Ram::new(0x6000, 0x100)));
        bus.write8(0x6000, 0x11);
        bus.write8(0x60ff, 0x22);
        assert_eq!(bus.read8(0x6000), 0x11);
        assert_eq!(bus.read8(0x60ff), 0x22);
        // One past either end is unmapped and reads as 0.
        assert_eq!(bus.read8(0x5fff), 0);
        assert_eq!(bus.read8(0x6100), 0);
        bus.write8(0x6100, 0x33);
        assert_eq!(bus.read8(0x6100), 0);
    }

    #[test]
    fn later_install_wins_on_overlap() {
        let mut bus = cpu_bus();
        bus.add(Handler::Ram(Ram::new(0x6000, 0x100)));
        bus.write8(0x6010, 0x55);
        bus.add(Handler::Rom(Rom::new(0x6000, vec![0xaa; 0x100])));
        assert_eq!(bus.read8(0x6010), 0xaa);
    }

    #[test]
    fn read16_is_little_endian() {
        let mut bus = cpu_bus();
        bus.add(Handler::Ram(Ram::new(0, 0x100)));
        bus.write8(0x10, 0x34);
        bus.write8(0x11, 0x12);
        assert_eq!(bus.read16(0x10), 0x1234);
    }

    struct Recorder {
        reads: Vec<usize>,
        writes: Vec<(usize, u8)>,
    }

    impl BusListener for Recorder {
        fn on_read(&mut self, address: usize) {
            self.reads.push(address);
        }

        fn on_write(&mut self, address: usize, value: u8) {
            self.writes.push((address, value));
        }
    }

    #[test]
    fn tap_observes_range_and_uninstall_restores_behavior() {
        let mut bus = cpu_bus();
        bus.add(Handler::Ram(Ram::new(0, 0x1000)));
        let recorder = Rc::new(RefCell::new(Recorder {
            reads: Vec::new(),
            writes: Vec::new(),
        }));
        bus.install_tap(0x200, 0x10, Rc::clone(&recorder) as Rc<RefCell<dyn BusListener>>);

        bus.write8(0x200, 0x42);
        assert_eq!(bus.read8(0x200), 0x42);
        bus.read8(0x2ff); // outside the tap
        assert_eq!(recorder.borrow().writes, vec![(0x200, 0x42)]);
        assert_eq!(recorder.borrow().reads, vec![0x200]);

        bus.uninstall_tap(0x200, 0x10);
        bus.write8(0x201, 0x43);
        assert_eq!(bus.read8(0x201), 0x43);
        assert_eq!(recorder.borrow().writes.len(), 1);
        // Uninstalling again is a harmless no-op.
        bus.uninstall_tap(0x200, 0x10);
    }

    #[test]
    fn save_visits_shared_handler_once() {
        let mut bus = cpu_bus();
        bus.add(Handler::Oam(Oam::new()));
        let mut out = Vec::new();
        bus.save(&mut out);
        // OAM claims $2003 and $4014 but serializes its 256 bytes once.
        assert_eq!(out.len(), OAM_SIZE);
    }

    #[test]
    fn short_image_reports_unexpected_end() {
        let mut bus = cpu_bus();
        bus.add(Handler::Ram(Ram::new(0, 0x100)));
        let image = vec![0u8; 0x80];
        let mut reader = StateReader::new(&image);
        assert!(bus.load(&mut reader).is_err());
    }
}
