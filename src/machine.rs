//! The assembled console: cartridge, interpreter, both buses, and the
//! hooks a host hangs rendering, audio, and input off.
//!
//! A host drives this from its own frame clock. Once per frame it calls
//! [`Machine::nmi`] and then [`Machine::advance`] with its instruction
//! budget; between frames it reads the query surface to draw the picture
//! and feeds controller state back in. Nothing here owns a thread and
//! nothing blocks.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::apu::Apu;
use crate::bus::{
    Bus, BusKind, BusListener, CpuSnapshot, Handler, HostDevice, StateError, StateReader,
};
use crate::cartridge::cartridge::{Cartridge, CartridgeError};
use crate::cartridge::mapper::mapper;
use crate::controller::{Button, Controller};
use crate::cpu::cpu::{Cpu, ExecutionError};
use crate::memory::Ram;
use crate::oam::Oam;
use crate::ppu::ppu::{BACKGROUND_PALETTE, NAMETABLE_0, Ppu, SPRITE_PALETTE};

const CPU_RAM_SIZE: usize = 0x800;

/// Calls to [`Machine::log_instructions_per_second`] between emitted rate
/// lines. Hosts call it once per frame, so this is a few seconds apart.
const IPS_LOG_INTERVAL: u32 = 200;

/// Decides, per frame, whether the interpreter may take an NMI at its
/// current position. Games that save and restore every register in their
/// handler are safe anywhere; games that do not need the host to describe
/// the regions where interruption cannot corrupt them.
pub trait NmiSafePolicy {
    fn is_pc_in_safe_range(&self, pc: usize) -> bool;
}

/// Policy for games whose NMI handler preserves everything it touches.
pub struct AlwaysSafe;

impl NmiSafePolicy for AlwaysSafe {
    fn is_pc_in_safe_range(&self, _pc: usize) -> bool {
        true
    }
}

/// Told whenever a game finishes rewriting a pattern tile, so a host can
/// re-rasterize just that tile instead of diffing pattern memory.
pub trait TileListener {
    fn on_tile_completed(&mut self, address: usize);
}

/// Adapter that turns raw pattern-range writes into tile completions. A
/// tile is 16 bytes; games copying one always finish on its last byte.
struct TileWatch {
    listener: Rc<RefCell<dyn TileListener>>,
}

impl BusListener for TileWatch {
    fn on_write(&mut self, address: usize, _value: u8) {
        // Offset $F is the last byte of the tile's second bitplane.
        if address & 0xf == 0xf {
            self.listener.borrow_mut().on_tile_completed(address - 0xf);
        }
    }
}

/// An installed event generator, remembered so the wiring survives the
/// bus rebuild a state restore performs.
struct TapRegistration {
    address: usize,
    size: usize,
    listener: Rc<RefCell<dyn BusListener>>,
}

/// Attributes of one hardware sprite, decoded from its third OAM byte.
#[derive(Clone, Copy, Debug)]
pub struct SpriteAttributes {
    pub palette: u8,
    pub behind_background: bool,
    pub flip_horizontally: bool,
    pub flip_vertically: bool,
}

pub struct Machine {
    cartridge: Cartridge,
    cpu: Cpu,
    cpu_bus: Bus,
    cpu_state: Rc<Cell<CpuSnapshot>>,
    nmi_policy: Box<dyn NmiSafePolicy>,
    tile_listener: Option<Rc<RefCell<dyn TileListener>>>,
    devices: Vec<Rc<RefCell<dyn HostDevice>>>,
    taps: Vec<TapRegistration>,
    alive: bool,
    ips_countdown: u32,
}

impl Machine {
    /// Wire a parsed cartridge into a runnable console. The interpreter
    /// starts at the cartridge's reset vector, stopped.
    pub fn new(
        cartridge: Cartridge,
        nmi_policy: Box<dyn NmiSafePolicy>,
        tile_listener: Option<Rc<RefCell<dyn TileListener>>>,
    ) -> Result<Self, CartridgeError> {
        let cpu_state = Rc::new(Cell::new(CpuSnapshot::default()));
        let (mut cpu, cpu_bus) = Self::assemble(
            &cartridge,
            Rc::clone(&cpu_state),
            tile_listener.clone(),
            &[],
            &[],
        )?;
        cpu.reset();
        Ok(Machine {
            cartridge,
            cpu,
            cpu_bus,
            cpu_state,
            nmi_policy,
            tile_listener,
            devices: Vec::new(),
            taps: Vec::new(),
            alive: false,
            ips_countdown: IPS_LOG_INTERVAL,
        })
    }

    /// Build both buses from scratch: PPU bus first, then the CPU bus with
    /// the PPU register block folded in, mapper handlers on top, and any
    /// host devices and event generators rewired. The interpreter is
    /// created last so it can read its vectors through the finished bus.
    fn assemble(
        cartridge: &Cartridge,
        cpu_state: Rc<Cell<CpuSnapshot>>,
        tile_listener: Option<Rc<RefCell<dyn TileListener>>>,
        devices: &[Rc<RefCell<dyn HostDevice>>],
        taps: &[TapRegistration],
    ) -> Result<(Cpu, Bus), CartridgeError> {
        let assembly = mapper::assemble(cartridge)?;

        let mut ppu_bus = Bus::new(BusKind::Ppu, Rc::clone(&cpu_state));
        for handler in assembly.ppu {
            ppu_bus.add(handler);
        }
        if let Some(listener) = tile_listener {
            ppu_bus.install_tap(0, 0x2000, Rc::new(RefCell::new(TileWatch { listener })));
        }

        let mut cpu_bus = Bus::new(BusKind::Cpu, Rc::clone(&cpu_state));
        cpu_bus.add(Handler::Ram(Ram::new(0, CPU_RAM_SIZE)));
        cpu_bus.add(Handler::Controller(Controller::default()));
        cpu_bus.add(Handler::Oam(Oam::default()));
        cpu_bus.add(Handler::PpuRegisters(Ppu::new(ppu_bus)));
        cpu_bus.add(Handler::Apu(Apu));
        for handler in assembly.cpu {
            cpu_bus.add(handler);
        }
        for device in devices {
            cpu_bus.add(Handler::Host(Rc::clone(device)));
        }
        for tap in taps {
            cpu_bus.install_tap(tap.address, tap.size, Rc::clone(&tap.listener));
        }

        let cpu = Cpu::new(&mut cpu_bus, cpu_state);
        Ok((cpu, cpu_bus))
    }

    /// Run exactly `instructions` interpreter steps. The first fatal
    /// instruction stops the batch and surfaces its error.
    pub fn advance(&mut self, instructions: u32) -> Result<(), ExecutionError> {
        for _ in 0..instructions {
            self.cpu.execute(&mut self.cpu_bus)?;
        }
        Ok(())
    }

    /// Frame boundary. Raises the vblank status bit, then delivers an NMI
    /// if the game asked for one and the policy clears the current pc.
    /// Does nothing while the machine is stopped.
    pub fn nmi(&mut self) -> Result<(), ExecutionError> {
        if !self.alive {
            return Ok(());
        }
        if let Some(ppu) = self.cpu_bus.ppu_mut() {
            ppu.set_in_vblank();
        }
        let wanted = self.cpu_bus.ppu().map(Ppu::nmi_enabled).unwrap_or(false);
        if wanted && self.nmi_policy.is_pc_in_safe_range(self.cpu.pc) {
            self.cpu.nmi(&mut self.cpu_bus)?;
        }
        Ok(())
    }

    /// Arm the machine and restart the rate timer. NMIs deliver only
    /// while alive.
    pub fn start(&mut self) {
        self.stop();
        self.cpu.start_timer();
        self.alive = true;
        log::info!("machine started at pc {:04x}", self.cpu.pc);
    }

    /// Disarm. Held buttons are released so none sticks across a pause.
    pub fn stop(&mut self) {
        if self.alive {
            self.alive = false;
            if let Some(controller) = self.cpu_bus.controller_mut() {
                controller.clear();
            }
        }
    }

    /// Soft reset: back to the reset vector with RAM, VRAM, and mapper
    /// state intact.
    pub fn reset(&mut self) {
        self.stop();
        self.cpu.reset();
        self.start();
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Emit an interpreter rate line every [`IPS_LOG_INTERVAL`]th call.
    pub fn log_instructions_per_second(&mut self) {
        self.ips_countdown -= 1;
        if self.ips_countdown == 0 {
            self.ips_countdown = IPS_LOG_INTERVAL;
            log::info!(
                "interpreter rate: {:.0} instructions per second",
                self.cpu.instructions_per_second()
            );
        }
    }

    /// Serialize the whole machine: interpreter registers, then every
    /// CPU-bus handler in slot order, then the PPU-side bus the same way.
    pub fn save_state(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.cpu.save(&mut out);
        self.cpu_bus.save(&mut out);
        if let Some(ppu) = self.cpu_bus.ppu() {
            ppu.bus.save(&mut out);
        }
        out
    }

    /// Restore a [`save_state`](Machine::save_state) image. The machine is
    /// rebuilt from its cartridge first, so ROM contents and wiring come
    /// from the cartridge and only mutable state comes from the image. A
    /// corrupt image leaves a freshly reset machine behind, not a
    /// half-restored one.
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        let (mut cpu, mut cpu_bus) = Self::assemble(
            &self.cartridge,
            Rc::clone(&self.cpu_state),
            self.tile_listener.clone(),
            &self.devices,
            &self.taps,
        )?;
        let mut reader = StateReader::new(bytes);
        let result = Self::restore_into(&mut cpu, &mut cpu_bus, &mut reader);
        if result.is_err() {
            cpu.reset();
        }
        self.cpu = cpu;
        self.cpu_bus = cpu_bus;
        result
    }

    fn restore_into(
        cpu: &mut Cpu,
        cpu_bus: &mut Bus,
        reader: &mut StateReader<'_>,
    ) -> Result<(), StateError> {
        cpu.load(reader)?;
        cpu_bus.load(reader)?;
        if let Some(ppu) = cpu_bus.ppu_mut() {
            ppu.bus.load(reader)?;
        }
        Ok(())
    }

    /// Attach a listener to `[address, address + size)` on the CPU bus.
    /// Reads are reported before the handler runs, writes after, so the
    /// listener snapshots the bus as the game saw it.
    pub fn install_event_generator(
        &mut self,
        address: usize,
        size: usize,
        listener: Rc<RefCell<dyn BusListener>>,
    ) {
        self.cpu_bus
            .install_tap(address, size, Rc::clone(&listener));
        self.taps.push(TapRegistration {
            address,
            size,
            listener,
        });
    }

    /// Detach every event generator whose range lies within
    /// `[address, address + size)`.
    pub fn uninstall_event_generator(&mut self, address: usize, size: usize) {
        self.cpu_bus.uninstall_tap(address, size);
        if size == 0 {
            return;
        }
        self.taps
            .retain(|tap| !(tap.address >= address && tap.address + tap.size <= address + size));
    }

    /// Map a host device into CPU address space. Its claimed range
    /// shadows whatever was installed there before.
    pub fn install_device(&mut self, device: Rc<RefCell<dyn HostDevice>>) {
        self.cpu_bus.add(Handler::Host(Rc::clone(&device)));
        self.devices.push(device);
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        if let Some(controller) = self.cpu_bus.controller_mut() {
            controller.set_button(button, pressed);
        }
    }

    pub fn a(&self) -> u8 {
        self.cpu.a
    }

    pub fn x(&self) -> u8 {
        self.cpu.x
    }

    pub fn y(&self) -> u8 {
        self.cpu.y
    }

    pub fn pc(&self) -> usize {
        self.cpu.pc
    }

    pub fn instruction_count(&self) -> u64 {
        self.cpu.instruction_count()
    }

    pub fn lower_prg_bank(&self) -> Option<usize> {
        self.cpu_bus.lower_prg_bank()
    }

    pub fn chr_bank(&self) -> Option<usize> {
        self.cpu_bus.chr_bank()
    }

    fn ppu(&self) -> Option<&Ppu> {
        self.cpu_bus.ppu()
    }

    pub fn nmi_enabled(&self) -> bool {
        self.ppu().map(Ppu::nmi_enabled).unwrap_or(false)
    }

    pub fn in_vblank(&self) -> bool {
        self.ppu().map(Ppu::in_vblank).unwrap_or(false)
    }

    pub fn background_visible(&self) -> bool {
        self.ppu().map(Ppu::background_visible).unwrap_or(false)
    }

    pub fn sprites_visible(&self) -> bool {
        self.ppu().map(Ppu::sprites_visible).unwrap_or(false)
    }

    pub fn monochrome(&self) -> bool {
        self.ppu().map(Ppu::monochrome).unwrap_or(false)
    }

    /// 0 for 8x8 sprites, 1 for 8x16.
    pub fn sprite_size(&self) -> u8 {
        self.ppu().map(Ppu::sprite_size).unwrap_or(0)
    }

    pub fn background_pattern_table(&self) -> u8 {
        self.ppu().map(Ppu::background_pattern_table).unwrap_or(0)
    }

    pub fn sprite_pattern_table(&self) -> u8 {
        self.ppu().map(Ppu::sprite_pattern_table).unwrap_or(0)
    }

    pub fn scroll_x(&self) -> u8 {
        self.ppu().map(Ppu::scroll_x).unwrap_or(0)
    }

    pub fn scroll_y(&self) -> u8 {
        self.ppu().map(Ppu::scroll_y).unwrap_or(0)
    }

    /// Base address of the nametable the game last selected.
    pub fn nametable_address(&self) -> usize {
        self.ppu().map(Ppu::nametable_address).unwrap_or(NAMETABLE_0)
    }

    /// One 16-color palette block, background or sprite. When the game
    /// turned the monochrome bit on, entries collapse to the grey column.
    pub fn palette(&self, sprite: bool) -> [u8; 16] {
        let mut colors = [0u8; 16];
        if let Some(ppu) = self.ppu() {
            let base = if sprite {
                SPRITE_PALETTE
            } else {
                BACKGROUND_PALETTE
            };
            let mask = if ppu.monochrome() { 0xf0 } else { 0xff };
            for (index, color) in colors.iter_mut().enumerate() {
                *color = ppu.bus.peek8(base + index) & mask;
            }
        }
        colors
    }

    /// Two-bit color of one pixel of a pattern tile. `tile` indexes the
    /// whole pattern range, so tiles in the upper table start at 256.
    /// Column `x` counts from the low bit of each bitplane byte.
    pub fn chr_pixel(&self, tile: usize, x: usize, y: usize) -> u8 {
        match self.ppu() {
            Some(ppu) => {
                let base = tile * 16;
                let lower = ppu.bus.peek8(base + y);
                let upper = ppu.bus.peek8(base + y + 8);
                (((upper >> x) & 1) << 1) | ((lower >> x) & 1)
            }
            None => 0,
        }
    }

    /// Tile index at column `x`, row `y` of the nametable at `base`.
    pub fn nametable_tile(&self, base: usize, x: usize, y: usize) -> u8 {
        match self.ppu() {
            Some(ppu) => ppu.bus.peek8(base + y * 32 + x),
            None => 0,
        }
    }

    /// Palette index for the tile at column `x`, row `y`, taken from the
    /// attribute table at `base`. One attribute byte covers a 4x4 tile
    /// square, two bits per 2x2 quadrant.
    pub fn attribute(&self, base: usize, x: usize, y: usize) -> u8 {
        let Some(ppu) = self.ppu() else {
            return 0;
        };
        let mut value = ppu.bus.peek8(base + (y / 4) * 8 + x / 4);
        if (y / 2) % 2 == 1 {
            value >>= 4;
        }
        if (x / 2) % 2 == 1 {
            value >>= 2;
        }
        value & 0x3
    }

    pub fn sprite_y(&self, sprite: usize) -> u8 {
        self.cpu_bus.oam().map(|oam| oam.sprite_y(sprite)).unwrap_or(0)
    }

    pub fn sprite_tile(&self, sprite: usize) -> u8 {
        self.cpu_bus
            .oam()
            .map(|oam| oam.sprite_tile(sprite))
            .unwrap_or(0)
    }

    pub fn sprite_x(&self, sprite: usize) -> u8 {
        self.cpu_bus.oam().map(|oam| oam.sprite_x(sprite)).unwrap_or(0)
    }

    pub fn sprite_attributes(&self, sprite: usize) -> SpriteAttributes {
        let raw = self
            .cpu_bus
            .oam()
            .map(|oam| oam.sprite_attributes(sprite))
            .unwrap_or(0);
        SpriteAttributes {
            palette: raw & 0x3,
            behind_background: raw & 0x20 != 0,
            flip_horizontally: raw & 0x40 != 0,
            flip_vertically: raw & 0x80 != 0,
        }
    }
}
