//! PPU register set: $2000–$2002 and $2005–$2007 as one state machine.
//!
//! See [PPU registers](https://www.nesdev.org/wiki/PPU_registers) and
//! [PPU scrolling](https://www.nesdev.org/wiki/PPU_scrolling). This machine
//! does no scanline rendering; the registers exist so games can run their
//! normal register traffic and so the host can query what to draw. The
//! registers couple to each other, and those couplings are the part games
//! actually rely on:
//!
//! - a $2000 write re-resolves the active nametable base from bits 1–0;
//! - a $2002 read clears vblank and resets BOTH the $2005 and $2006 write
//!   toggles (how games re-synchronize their scroll writes);
//! - every $2006 write recombines the vram address, re-checks it against the
//!   four nametable bases, and disarms the $2007 read latch;
//! - $2007 has the classic one-read delay: a disarmed read returns 0 and
//!   arms the latch without advancing the address.
//!
//! The struct owns the PPU-side bus; $2007 traffic goes through it, and the
//! host's pattern/nametable/palette queries peek into it. The vram address
//! is deliberately not masked to the PPU range: a game that walks past $3FFF
//! shows up in the bus diagnostics instead of silently wrapping.

use crate::bus::{Bus, StateError, StateReader, push_bool, push_u32};

pub const NAMETABLE_0: usize = 0x2000;
pub const NAMETABLE_1: usize = 0x2400;
pub const NAMETABLE_2: usize = 0x2800;
pub const NAMETABLE_3: usize = 0x2c00;

pub const ATTRIBUTE_TABLE_0: usize = 0x23c0;
pub const ATTRIBUTE_TABLE_1: usize = 0x27c0;
pub const ATTRIBUTE_TABLE_2: usize = 0x2bc0;
pub const ATTRIBUTE_TABLE_3: usize = 0x2fc0;

pub const BACKGROUND_PALETTE: usize = 0x3f00;
pub const SPRITE_PALETTE: usize = 0x3f10;

const STATUS_VBLANK: u8 = 0x80;

pub struct Ppu {
    pub bus: Bus,
    control: u8,
    mask: u8,
    status: u8,
    scroll_x: u8,
    scroll_y: u8,
    scroll_on_x: bool,
    address_lo: u8,
    address_hi: u8,
    write_hi: bool,
    vram_address: usize,
    nametable_address: usize,
    read_enabled: bool,
}

impl Ppu {
    pub fn new(bus: Bus) -> Self {
        Ppu {
            bus,
            control: 0,
            mask: 0,
            status: 0,
            scroll_x: 0,
            scroll_y: 0,
            scroll_on_x: true,
            address_lo: 0,
            address_hi: 0,
            write_hi: true,
            vram_address: 0,
            nametable_address: 0,
            read_enabled: false,
        }
    }

    /// CPU-side read of one of the six registers.
    pub fn register_read(&mut self, address: usize) -> u8 {
        match address {
            0x2000 => self.control,
            0x2001 => self.mask,
            0x2002 => self.on_status_read(),
            0x2007 => self.on_data_read(),
            // $2005/$2006 are write-only latches.
            _ => 0,
        }
    }

    /// CPU-side write to one of the six registers.
    pub fn register_write(&mut self, address: usize, value: u8) {
        match address {
            0x2000 => self.on_control_write(value),
            0x2001 => self.mask = value,
            0x2005 => self.on_scroll_write(value),
            0x2006 => self.on_address_write(value),
            0x2007 => self.on_data_write(value),
            // $2002 writes are ignored.
            _ => {}
        }
    }

    fn on_control_write(&mut self, value: u8) {
        self.control = value;
        self.nametable_address = match value & 0x3 {
            0 => NAMETABLE_0,
            1 => NAMETABLE_1,
            2 => NAMETABLE_2,
            _ => NAMETABLE_3,
        };
    }

    fn on_status_read(&mut self) -> u8 {
        let value = self.status;
        self.status &= !STATUS_VBLANK;
        self.scroll_on_x = true;
        self.write_hi = true;
        value
    }

    fn on_scroll_write(&mut self, value: u8) {
        if self.scroll_on_x {
            self.scroll_x = value;
        } else {
            self.scroll_y = value;
        }
        self.scroll_on_x = !self.scroll_on_x;
    }

    fn on_address_write(&mut self, value: u8) {
        if self.write_hi {
            self.address_hi = value;
        } else {
            self.address_lo = value;
        }
        self.write_hi = !self.write_hi;
        self.vram_address = ((self.address_hi as usize) << 8) | self.address_lo as usize;
        if matches!(
            self.vram_address,
            NAMETABLE_0 | NAMETABLE_1 | NAMETABLE_2 | NAMETABLE_3
        ) {
            self.nametable_address = self.vram_address;
        }
        self.read_enabled = false;
    }

    fn on_data_read(&mut self) -> u8 {
        if self.read_enabled {
            let value = self.bus.read8(self.vram_address);
            self.increment_vram_address();
            value
        } else {
            self.read_enabled = true;
            0
        }
    }

    fn on_data_write(&mut self, value: u8) {
        self.bus.write8(self.vram_address, value);
        self.increment_vram_address();
    }

    fn increment_vram_address(&mut self) {
        self.vram_address += if self.control & 0x04 != 0 { 32 } else { 1 };
    }

    pub fn set_in_vblank(&mut self) {
        self.status |= STATUS_VBLANK;
    }

    pub fn in_vblank(&self) -> bool {
        self.status & STATUS_VBLANK != 0
    }

    pub fn nmi_enabled(&self) -> bool {
        self.control & 0x80 != 0
    }

    /// 0 for 8×8 sprites, 1 for 8×16.
    pub fn sprite_size(&self) -> u8 {
        (self.control & 0x20) >> 5
    }

    pub fn background_pattern_table(&self) -> u8 {
        (self.control & 0x10) >> 4
    }

    pub fn sprite_pattern_table(&self) -> u8 {
        (self.control & 0x08) >> 3
    }

    pub fn background_visible(&self) -> bool {
        self.mask & 0x08 != 0
    }

    pub fn sprites_visible(&self) -> bool {
        self.mask & 0x10 != 0
    }

    pub fn monochrome(&self) -> bool {
        self.mask & 0x01 != 0
    }

    pub fn scroll_x(&self) -> u8 {
        self.scroll_x
    }

    pub fn scroll_y(&self) -> u8 {
        self.scroll_y
    }

    /// The nametable base most recently selected via $2000 or $2006.
    pub fn nametable_address(&self) -> usize {
        self.nametable_address
    }

    pub fn vram_address(&self) -> usize {
        self.vram_address
    }

    /// Register state only; the owned bus is serialized separately so the
    /// state image keeps its CPU-side-then-PPU-side section order.
    pub fn save(&self, out: &mut Vec<u8>) {
        out.push(self.control);
        out.push(self.mask);
        out.push(self.status);
        out.push(self.scroll_x);
        out.push(self.scroll_y);
        push_bool(out, self.scroll_on_x);
        out.push(self.address_lo);
        out.push(self.address_hi);
        push_bool(out, self.write_hi);
        push_u32(out, self.vram_address as u32);
        push_u32(out, self.nametable_address as u32);
    }

    pub fn load(&mut self, reader: &mut StateReader<'_>) -> Result<(), StateError> {
        self.control = reader.read_u8()?;
        self.mask = reader.read_u8()?;
        self.status = reader.read_u8()?;
        self.scroll_x = reader.read_u8()?;
        self.scroll_y = reader.read_u8()?;
        self.scroll_on_x = reader.read_bool()?;
        self.address_lo = reader.read_u8()?;
        self.address_hi = reader.read_u8()?;
        self.write_hi = reader.read_bool()?;
        self.vram_address = reader.read_u32()? as usize;
        self.nametable_address = reader.read_u32()? as usize;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::bus::{BusKind, CpuSnapshot, Handler};
    use crate::memory::Ram;

    fn ppu_with_ram() -> Ppu {
        let mut bus = Bus::new(BusKind::Ppu, Rc::new(Cell::new(CpuSnapshot::default())));
        bus.add(Handler::Ram(Ram::new(0x2000, 0x800)));
        Ppu::new(bus)
    }

    #[test]
    fn status_read_clears_vblank_and_resets_both_toggles() {
        let mut ppu = ppu_with_ram();
        ppu.set_in_vblank();
        ppu.register_write(0x2005, 0x10); // scroll toggle now on y
        ppu.register_write(0x2006, 0x21); // address toggle now on lo

        let status = ppu.register_read(0x2002);
        assert_eq!(status & 0x80, 0x80);
        assert!(!ppu.in_vblank());

        // Next $2005 write must be X again, next $2006 write the high byte.
        ppu.register_write(0x2005, 0x42);
        assert_eq!(ppu.scroll_x(), 0x42);
        ppu.register_write(0x2006, 0x24);
        ppu.register_write(0x2006, 0x00);
        assert_eq!(ppu.vram_address(), 0x2400);
    }

    #[test]
    fn control_write_selects_the_nametable_base() {
        let mut ppu = ppu_with_ram();
        ppu.register_write(0x2000, 0x02);
        assert_eq!(ppu.nametable_address(), NAMETABLE_2);
        ppu.register_write(0x2000, 0x00);
        assert_eq!(ppu.nametable_address(), NAMETABLE_0);
        assert_eq!(ppu.register_read(0x2000), 0x00);
    }

    #[test]
    fn address_write_matching_a_nametable_base_updates_it() {
        let mut ppu = ppu_with_ram();
        ppu.register_write(0x2006, 0x2c);
        ppu.register_write(0x2006, 0x00);
        assert_eq!(ppu.nametable_address(), NAMETABLE_3);
        // A non-base address leaves the selection alone.
        ppu.register_write(0x2006, 0x2c);
        ppu.register_write(0x2006, 0x10);
        assert_eq!(ppu.nametable_address(), NAMETABLE_3);
    }

    #[test]
    fn data_port_writes_then_reads_with_the_one_read_delay() {
        let mut ppu = ppu_with_ram();
        ppu.register_write(0x2006, 0x20);
        ppu.register_write(0x2006, 0x00);
        ppu.register_write(0x2007, 0xaa);
        ppu.register_write(0x2007, 0xbb);

        ppu.register_write(0x2006, 0x20);
        ppu.register_write(0x2006, 0x00);
        assert_eq!(ppu.register_read(0x2007), 0); // disarmed read
        assert_eq!(ppu.register_read(0x2007), 0xaa);
        assert_eq!(ppu.register_read(0x2007), 0xbb);
    }

    #[test]
    fn increment_follows_the_control_bit() {
        let mut ppu = ppu_with_ram();
        ppu.register_write(0x2000, 0x04);
        ppu.register_write(0x2006, 0x20);
        ppu.register_write(0x2006, 0x00);
        ppu.register_write(0x2007, 0x01);
        assert_eq!(ppu.vram_address(), 0x2020);
        ppu.register_write(0x2000, 0x00);
        ppu.register_write(0x2007, 0x02);
        assert_eq!(ppu.vram_address(), 0x2021);
    }

    #[test]
    fn register_state_round_trips() {
        let mut ppu = ppu_with_ram();
        ppu.register_write(0x2000, 0x91);
        ppu.register_write(0x2001, 0x1e);
        ppu.set_in_vblank();
        ppu.register_write(0x2005, 0x11);
        ppu.register_write(0x2006, 0x24);

        let mut out = Vec::new();
        ppu.save(&mut out);
        assert_eq!(out.len(), 17);

        let mut restored = ppu_with_ram();
        let mut reader = StateReader::new(&out);
        restored.load(&mut reader).unwrap();
        assert_eq!(restored.register_read(0x2000), 0x91);
        assert_eq!(restored.register_read(0x2001), 0x1e);
        assert!(restored.in_vblank());
        assert_eq!(restored.scroll_x(), 0x11);
        // Mid-latch toggles restore too: the next $2006 write is the low byte.
        restored.register_write(0x2006, 0x08);
        assert_eq!(restored.vram_address(), 0x2408);
    }
}
