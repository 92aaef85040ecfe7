//! 6502 interpreter, behavioral rather than cycle-accurate.
//!
//! See [6502 instruction reference](https://www.nesdev.org/obelisk-6502-guide/reference.html).
//! Instructions are counted, not clocked; the host advances the machine by
//! instruction budget per frame. A few deliberate departures from stock
//! silicon are part of the execution model and must not be "fixed":
//!
//! - the overflow flag is only ever set by BIT and PLP/RTI, never by ADC/SBC;
//! - indexed address sums are not wrapped (`$FF,X` can leave the zero page,
//!   `$FFFF,Y` can leave the 16-bit range; the bus is sized to absorb it);
//! - the stack pointer is a full bus address: TXS sets `$0100 + X` and TSX
//!   returns only the low byte;
//! - `nmi` pushes the resume address minus one and both RTI and RTS add one
//!   back when they pop;
//! - of the `(zp,X)` column only LDA is implemented, the rest of the column
//!   and BRK stop execution with an error.
//!
//! The carry flag lives in a `u8` holding 0 or 1 so it can feed arithmetic
//! directly; the remaining flags are plain booleans and only meet as a byte
//! in `pack_flags`/`unpack_flags`.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use ansi_term::Colour::Red;
use thiserror::Error;

use crate::bus::{Bus, CpuSnapshot, StateError, StateReader, push_bool};
use crate::cpu::flags::{
    FLAG_CARRY, FLAG_DECIMAL, FLAG_INTERRUPT_DISABLE, FLAG_NEGATIVE, FLAG_OVERFLOW, FLAG_ZERO,
};

/// Start of the interrupt vector table: NMI at $FFFA, reset at $FFFC,
/// IRQ/BRK at $FFFE.
pub const VECTORS_ADDRESS: usize = 0xfffa;

/// Upper bound on instructions executed inside one `nmi` invocation. A
/// handler that never reaches RTI is abandoned at this count.
pub const NMI_INSTRUCTION_CEILING: usize = 900;

const RTI_OPCODE: u8 = 0x40;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("unsupported opcode ${opcode:02x} at pc {pc:04x}:{registers}")]
    UnsupportedInstruction {
        opcode: u8,
        pc: usize,
        registers: String,
    },
}

pub struct Cpu {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    /// Full bus address, not a one-byte offset into page one.
    pub sp: usize,
    pub pc: usize,
    /// 0 or 1, so it can be added into arithmetic without a branch.
    pub carry: u8,
    pub zero: bool,
    pub interrupt_disable: bool,
    pub decimal: bool,
    pub overflow: bool,
    pub negative: bool,
    pub nmi_vector: usize,
    pub reset_vector: usize,
    pub irq_vector: usize,
    instruction_count: u64,
    timer_start: Instant,
    snapshot: Rc<Cell<CpuSnapshot>>,
}

impl Cpu {
    /// Reads the three vectors from the already-assembled bus and starts with
    /// every register zeroed. Call [`Cpu::reset`] to jump to the reset vector.
    pub fn new(bus: &mut Bus, snapshot: Rc<Cell<CpuSnapshot>>) -> Self {
        let nmi_vector = bus.read16(VECTORS_ADDRESS);
        let reset_vector = bus.read16(VECTORS_ADDRESS + 2);
        let irq_vector = bus.read16(VECTORS_ADDRESS + 4);
        Cpu {
            a: 0,
            x: 0,
            y: 0,
            sp: 0,
            pc: 0,
            carry: 0,
            zero: false,
            interrupt_disable: false,
            decimal: false,
            overflow: false,
            negative: false,
            nmi_vector,
            reset_vector,
            irq_vector,
            instruction_count: 0,
            timer_start: Instant::now(),
            snapshot,
        }
    }

    /// Jumps to the reset vector. Registers keep their values; the game's
    /// init code is responsible for anything it cares about, including TXS.
    pub fn reset(&mut self) {
        self.pc = self.reset_vector;
    }

    /// Executes the instruction at `pc` and returns its opcode.
    pub fn execute(&mut self, bus: &mut Bus) -> Result<u8, ExecutionError> {
        self.publish_snapshot();
        let opcode = bus.read8(self.pc);
        match opcode {
            0xa9 => self.lda_immediate(bus),
            0xa5 => self.lda_zero_page(bus),
            0xb5 => self.lda_zero_page_x(bus),
            0xad => self.lda_absolute(bus),
            0xbd => self.lda_absolute_x(bus),
            0xb9 => self.lda_absolute_y(bus),
            0xa1 => self.lda_indirect_x(bus),
            0xb1 => self.lda_indirect_y(bus),
            0xa2 => self.ldx_immediate(bus),
            0xa6 => self.ldx_zero_page(bus),
            0xb6 => self.ldx_zero_page_y(bus),
            0xae => self.ldx_absolute(bus),
            0xbe => self.ldx_absolute_y(bus),
            0xa0 => self.ldy_immediate(bus),
            0xa4 => self.ldy_zero_page(bus),
            0xb4 => self.ldy_zero_page_x(bus),
            0xac => self.ldy_absolute(bus),
            0xbc => self.ldy_absolute_x(bus),
            0x85 => self.sta_zero_page(bus),
            0x95 => self.sta_zero_page_x(bus),
            0x8d => self.sta_absolute(bus),
            0x9d => self.sta_absolute_x(bus),
            0x99 => self.sta_absolute_y(bus),
            0x91 => self.sta_indirect_y(bus),
            0x86 => self.stx_zero_page(bus),
            0x96 => self.stx_zero_page_y(bus),
            0x8e => self.stx_absolute(bus),
            0x84 => self.sty_zero_page(bus),
            0x94 => self.sty_zero_page_x(bus),
            0x8c => self.sty_absolute(bus),
            0xaa => self.tax(),
            0xa8 => self.tay(),
            0xba => self.tsx(),
            0x8a => self.txa(),
            0x9a => self.txs(),
            0x98 => self.tya(),
            0x48 => self.pha(bus),
            0x08 => self.php(bus),
            0x68 => self.pla(bus),
            0x28 => self.plp(bus),
            0x69 => self.adc_immediate(bus),
            0x65 => self.adc_zero_page(bus),
            0x75 => self.adc_zero_page_x(bus),
            0x6d => self.adc_absolute(bus),
            0x7d => self.adc_absolute_x(bus),
            0x79 => self.adc_absolute_y(bus),
            0x71 => self.adc_indirect_y(bus),
            0xe9 => self.sbc_immediate(bus),
            0xe5 => self.sbc_zero_page(bus),
            0xf5 => self.sbc_zero_page_x(bus),
            0xed => self.sbc_absolute(bus),
            0xfd => self.sbc_absolute_x(bus),
            0xf9 => self.sbc_absolute_y(bus),
            0xf1 => self.sbc_indirect_y(bus),
            0xc9 => self.cmp_immediate(bus),
            0xc5 => self.cmp_zero_page(bus),
            0xd5 => self.cmp_zero_page_x(bus),
            0xcd => self.cmp_absolute(bus),
            0xdd => self.cmp_absolute_x(bus),
            0xd9 => self.cmp_absolute_y(bus),
            0xd1 => self.cmp_indirect_y(bus),
            0xe0 => self.cpx_immediate(bus),
            0xe4 => self.cpx_zero_page(bus),
            0xec => self.cpx_absolute(bus),
            0xc0 => self.cpy_immediate(bus),
            0xc4 => self.cpy_zero_page(bus),
            0xcc => self.cpy_absolute(bus),
            0x29 => self.and_immediate(bus),
            0x25 => self.and_zero_page(bus),
            0x35 => self.and_zero_page_x(bus),
            0x2d => self.and_absolute(bus),
            0x3d => self.and_absolute_x(bus),
            0x39 => self.and_absolute_y(bus),
            0x31 => self.and_indirect_y(bus),
            0x09 => self.ora_immediate(bus),
            0x05 => self.ora_zero_page(bus),
            0x15 => self.ora_zero_page_x(bus),
            0x0d => self.ora_absolute(bus),
            0x1d => self.ora_absolute_x(bus),
            0x19 => self.ora_absolute_y(bus),
            0x11 => self.ora_indirect_y(bus),
            0x49 => self.eor_immediate(bus),
            0x45 => self.eor_zero_page(bus),
            0x55 => self.eor_zero_page_x(bus),
            0x4d => self.eor_absolute(bus),
            0x5d => self.eor_absolute_x(bus),
            0x59 => self.eor_absolute_y(bus),
            0x51 => self.eor_indirect_y(bus),
            0x24 => self.bit_zero_page(bus),
            0x2c => self.bit_absolute(bus),
            0x0a => self.asl_accumulator(),
            0x06 => self.asl_zero_page(bus),
            0x16 => self.asl_zero_page_x(bus),
            0x0e => self.asl_absolute(bus),
            0x1e => self.asl_absolute_x(bus),
            0x4a => self.lsr_accumulator(),
            0x46 => self.lsr_zero_page(bus),
            0x56 => self.lsr_zero_page_x(bus),
            0x4e => self.lsr_absolute(bus),
            0x5e => self.lsr_absolute_x(bus),
            0x2a => self.rol_accumulator(),
            0x26 => self.rol_zero_page(bus),
            0x36 => self.rol_zero_page_x(bus),
            0x2e => self.rol_absolute(bus),
            0x3e => self.rol_absolute_x(bus),
            0x6a => self.ror_accumulator(),
            0x66 => self.ror_zero_page(bus),
            0x76 => self.ror_zero_page_x(bus),
            0x6e => self.ror_absolute(bus),
            0x7e => self.ror_absolute_x(bus),
            0xe6 => self.inc_zero_page(bus),
            0xf6 => self.inc_zero_page_x(bus),
            0xee => self.inc_absolute(bus),
            0xfe => self.inc_absolute_x(bus),
            0xe8 => self.inx(),
            0xc8 => self.iny(),
            0xc6 => self.dec_zero_page(bus),
            0xd6 => self.dec_zero_page_x(bus),
            0xce => self.dec_absolute(bus),
            0xde => self.dec_absolute_x(bus),
            0xca => self.dex(),
            0x88 => self.dey(),
            0x4c => self.jmp_absolute(bus),
            0x6c => self.jmp_indirect(bus),
            0x20 => self.jsr(bus),
            0x60 => self.rts(bus),
            0x40 => self.rti(bus),
            0x90 => self.bcc(bus),
            0xb0 => self.bcs(bus),
            0xf0 => self.beq(bus),
            0xd0 => self.bne(bus),
            0x30 => self.bmi(bus),
            0x10 => self.bpl(bus),
            0x50 => self.bvc(bus),
            0x70 => self.bvs(bus),
            0x18 => self.clc(),
            0xd8 => self.cld(),
            0x58 => self.cli(),
            0xb8 => self.clv(),
            0x38 => self.sec(),
            0xf8 => self.sed(),
            0x78 => self.sei(),
            0xea => self.nop(),
            // LDA is the only implemented member of the (zp,X) column.
            0x01 | 0x21 | 0x41 | 0x61 | 0x81 | 0xc1 | 0xe1 => return Err(self.fatal(opcode)),
            0x00 => return Err(self.fatal(opcode)),
            _ => return Err(self.fatal(opcode)),
        }
        self.instruction_count += 1;
        Ok(opcode)
    }

    /// Enters the NMI handler and runs it to its RTI (or to the instruction
    /// ceiling). The pushed return address is one short of the interrupted
    /// `pc`; RTI adds the one back.
    pub fn nmi(&mut self, bus: &mut Bus) -> Result<(), ExecutionError> {
        let return_point = self.pc.wrapping_sub(1);
        self.push(bus, ((return_point & 0xff00) >> 8) as u8);
        self.push(bus, (return_point & 0xff) as u8);
        let flags = self.pack_flags();
        self.push(bus, flags);
        self.pc = self.nmi_vector;
        for _ in 0..NMI_INSTRUCTION_CEILING {
            if self.execute(bus)? == RTI_OPCODE {
                break;
            }
        }
        Ok(())
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    pub fn start_timer(&mut self) {
        self.instruction_count = 0;
        self.timer_start = Instant::now();
    }

    pub fn instructions_per_second(&self) -> f64 {
        let seconds = self.timer_start.elapsed().as_secs_f64();
        if seconds > 0.0 {
            self.instruction_count as f64 / seconds
        } else {
            0.0
        }
    }

    pub fn registers_string(&self) -> String {
        self.publish_snapshot();
        self.snapshot.get().describe()
    }

    /// Thirteen bytes: pc and sp as little-endian words, the three data
    /// registers, then the flags.
    pub fn save(&self, out: &mut Vec<u8>) {
        out.push((self.pc & 0xff) as u8);
        out.push(((self.pc & 0xff00) >> 8) as u8);
        out.push((self.sp & 0xff) as u8);
        out.push(((self.sp & 0xff00) >> 8) as u8);
        out.push(self.a);
        out.push(self.x);
        out.push(self.y);
        push_bool(out, self.interrupt_disable);
        push_bool(out, self.decimal);
        out.push(self.carry);
        push_bool(out, self.negative);
        push_bool(out, self.zero);
        push_bool(out, self.overflow);
    }

    pub fn load(&mut self, reader: &mut StateReader<'_>) -> Result<(), StateError> {
        let pc_lo = reader.read_u8()? as usize;
        let pc_hi = reader.read_u8()? as usize;
        self.pc = (pc_hi << 8) | pc_lo;
        let sp_lo = reader.read_u8()? as usize;
        let sp_hi = reader.read_u8()? as usize;
        self.sp = (sp_hi << 8) | sp_lo;
        self.a = reader.read_u8()?;
        self.x = reader.read_u8()?;
        self.y = reader.read_u8()?;
        self.interrupt_disable = reader.read_bool()?;
        self.decimal = reader.read_bool()?;
        self.carry = reader.read_u8()?;
        self.negative = reader.read_bool()?;
        self.zero = reader.read_bool()?;
        self.overflow = reader.read_bool()?;
        Ok(())
    }

    /// Pushes the register values where bus diagnostics can see them. Runs
    /// once per instruction, before dispatch.
    fn publish_snapshot(&self) {
        self.snapshot.set(CpuSnapshot {
            pc: self.pc,
            sp: self.sp,
            a: self.a,
            x: self.x,
            y: self.y,
            carry: self.carry,
            zero: self.zero,
            interrupt_disable: self.interrupt_disable,
            decimal: self.decimal,
            overflow: self.overflow,
            negative: self.negative,
        });
    }

    /// Bordered register dump for crash reporting. The fatal path prints
    /// it before surfacing its error; hosts can call it from their own
    /// handlers too.
    pub fn print_registers(&self) {
        println!("{}", "*".repeat(64));
        println!("Cpu status:{}", self.registers_string());
        println!("{}", "*".repeat(64));
    }

    fn fatal(&mut self, opcode: u8) -> ExecutionError {
        let registers = self.snapshot.get().describe();
        log::error!("unsupported opcode ${:02x} at pc {:04x}", opcode, self.pc);
        println!(
            "{} unsupported opcode ${:02x} at pc {:04x}",
            Red.bold().paint("ERROR"),
            opcode,
            self.pc
        );
        self.print_registers();
        ExecutionError::UnsupportedInstruction {
            opcode,
            pc: self.pc,
            registers,
        }
    }

    fn immediate_value(&mut self, bus: &mut Bus) -> u8 {
        let value = bus.read8(self.pc + 1);
        self.pc += 2;
        value
    }

    fn zero_page_address(&mut self, bus: &mut Bus) -> usize {
        let address = bus.read8(self.pc + 1) as usize;
        self.pc += 2;
        address
    }

    fn zero_page_x_address(&mut self, bus: &mut Bus) -> usize {
        // Indexed sums are not wrapped back into the zero page.
        let address = bus.read8(self.pc + 1) as usize + self.x as usize;
        self.pc += 2;
        address
    }

    fn zero_page_y_address(&mut self, bus: &mut Bus) -> usize {
        let address = bus.read8(self.pc + 1) as usize + self.y as usize;
        self.pc += 2;
        address
    }

    fn absolute_address(&mut self, bus: &mut Bus) -> usize {
        let address = bus.read16(self.pc + 1);
        self.pc += 3;
        address
    }

    fn absolute_x_address(&mut self, bus: &mut Bus) -> usize {
        // Can exceed $FFFF; the bus slot table is sized for the overhang.
        let address = bus.read16(self.pc + 1) + self.x as usize;
        self.pc += 3;
        address
    }

    fn absolute_y_address(&mut self, bus: &mut Bus) -> usize {
        let address = bus.read16(self.pc + 1) + self.y as usize;
        self.pc += 3;
        address
    }

    fn indirect_x_address(&mut self, bus: &mut Bus) -> usize {
        let pointer = bus.read8(self.pc + 1) as usize + self.x as usize;
        let address = bus.read16(pointer);
        self.pc += 2;
        address
    }

    fn indirect_y_address(&mut self, bus: &mut Bus) -> usize {
        let pointer = bus.read8(self.pc + 1) as usize;
        let address = bus.read16(pointer) + self.y as usize;
        self.pc += 2;
        address
    }

    fn push(&mut self, bus: &mut Bus, value: u8) {
        bus.write8(self.sp, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pop(&mut self, bus: &mut Bus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read8(self.sp)
    }

    fn branch(&mut self, bus: &mut Bus, condition: bool) {
        let offset = bus.read8(self.pc + 1) as i8;
        if condition {
            self.pc = (self.pc as i64 + 2 + offset as i64) as usize;
        } else {
            self.pc += 2;
        }
    }

    fn update_zero_and_negative_flags(&mut self, value: u8) {
        self.zero = value == 0;
        self.negative = value & 0x80 != 0;
    }

    /// The overflow flag is left untouched; only BIT and flag pops write it.
    fn add_with_carry(&mut self, value: u8) {
        let sum = self.a as u32 + value as u32 + self.carry as u32;
        self.carry = if sum > 0xff { 1 } else { 0 };
        self.a = (sum & 0xff) as u8;
        self.update_zero_and_negative_flags(self.a);
    }

    fn subtract_with_borrow(&mut self, value: u8) {
        let difference = self.a as i32 - value as i32 - (1 - self.carry as i32);
        self.carry = if difference < 0 { 0 } else { 1 };
        self.a = (difference & 0xff) as u8;
        self.update_zero_and_negative_flags(self.a);
    }

    /// Carry comes from the unsigned comparison, negative from the signed one.
    fn compare(&mut self, register: u8, value: u8) {
        self.carry = if register >= value { 1 } else { 0 };
        self.zero = register == value;
        self.negative = (register as i8) < (value as i8);
    }

    fn bit(&mut self, value: u8) {
        self.zero = self.a & value == 0;
        self.negative = value & 0x80 != 0;
        self.overflow = value & 0x40 != 0;
    }

    fn shift_left_memory(&mut self, bus: &mut Bus, address: usize) {
        let value = bus.read8(address);
        self.carry = (value & 0x80) >> 7;
        let result = value << 1;
        bus.write8(address, result);
        self.update_zero_and_negative_flags(result);
    }

    fn shift_right_memory(&mut self, bus: &mut Bus, address: usize) {
        let value = bus.read8(address);
        self.carry = value & 0x01;
        let result = value >> 1;
        bus.write8(address, result);
        self.update_zero_and_negative_flags(result);
    }

    fn rotate_left_memory(&mut self, bus: &mut Bus, address: usize) {
        let value = bus.read8(address);
        let wide = ((value as u16) << 1) | self.carry as u16;
        self.carry = if wide > 0xff { 1 } else { 0 };
        let result = (wide & 0xff) as u8;
        bus.write8(address, result);
        self.update_zero_and_negative_flags(result);
    }

    fn rotate_right_memory(&mut self, bus: &mut Bus, address: usize) {
        let value = bus.read8(address);
        let wide = value as u16 | ((self.carry as u16) << 8);
        self.carry = value & 0x01;
        let result = (wide >> 1) as u8;
        bus.write8(address, result);
        self.update_zero_and_negative_flags(result);
    }

    fn increment_memory(&mut self, bus: &mut Bus, address: usize) {
        let value = bus.read8(address).wrapping_add(1);
        bus.write8(address, value);
        self.update_zero_and_negative_flags(value);
    }

    fn decrement_memory(&mut self, bus: &mut Bus, address: usize) {
        let value = bus.read8(address).wrapping_sub(1);
        bus.write8(address, value);
        self.update_zero_and_negative_flags(value);
    }

    fn pack_flags(&self) -> u8 {
        let mut byte = 0;
        if self.carry == 1 {
            byte |= FLAG_CARRY;
        }
        if self.zero {
            byte |= FLAG_ZERO;
        }
        if self.interrupt_disable {
            byte |= FLAG_INTERRUPT_DISABLE;
        }
        if self.decimal {
            byte |= FLAG_DECIMAL;
        }
        if self.overflow {
            byte |= FLAG_OVERFLOW;
        }
        if self.negative {
            byte |= FLAG_NEGATIVE;
        }
        byte
    }

    fn unpack_flags(&mut self, byte: u8) {
        self.carry = if byte & FLAG_CARRY != 0 { 1 } else { 0 };
        self.zero = byte & FLAG_ZERO != 0;
        self.interrupt_disable = byte & FLAG_INTERRUPT_DISABLE != 0;
        self.decimal = byte & FLAG_DECIMAL != 0;
        self.overflow = byte & FLAG_OVERFLOW != 0;
        self.negative = byte & FLAG_NEGATIVE != 0;
    }

    fn lda_immediate(&mut self, bus: &mut Bus) {
        let value = self.immediate_value(bus);
        self.a = value;
        self.update_zero_and_negative_flags(self.a);
    }

    fn lda_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        self.a = bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn lda_zero_page_x(&mut self, bus: &mut Bus) {
        let address = self.zero_page_x_address(bus);
        self.a = bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn lda_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        self.a = bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn lda_absolute_x(&mut self, bus: &mut Bus) {
        let address = self.absolute_x_address(bus);
        self.a = bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn lda_absolute_y(&mut self, bus: &mut Bus) {
        let address = self.absolute_y_address(bus);
        self.a = bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn lda_indirect_x(&mut self, bus: &mut Bus) {
        let address = self.indirect_x_address(bus);
        self.a = bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn lda_indirect_y(&mut self, bus: &mut Bus) {
        let address = self.indirect_y_address(bus);
        self.a = bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn ldx_immediate(&mut self, bus: &mut Bus) {
        let value = self.immediate_value(bus);
        self.x = value;
        self.update_zero_and_negative_flags(self.x);
    }

    fn ldx_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        self.x = bus.read8(address);
        self.update_zero_and_negative_flags(self.x);
    }

    fn ldx_zero_page_y(&mut self, bus: &mut Bus) {
        let address = self.zero_page_y_address(bus);
        self.x = bus.read8(address);
        self.update_zero_and_negative_flags(self.x);
    }

    fn ldx_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        self.x = bus.read8(address);
        self.update_zero_and_negative_flags(self.x);
    }

    fn ldx_absolute_y(&mut self, bus: &mut Bus) {
        let address = self.absolute_y_address(bus);
        self.x = bus.read8(address);
        self.update_zero_and_negative_flags(self.x);
    }

    fn ldy_immediate(&mut self, bus: &mut Bus) {
        let value = self.immediate_value(bus);
        self.y = value;
        self.update_zero_and_negative_flags(self.y);
    }

    fn ldy_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        self.y = bus.read8(address);
        self.update_zero_and_negative_flags(self.y);
    }

    fn ldy_zero_page_x(&mut self, bus: &mut Bus) {
        let address = self.zero_page_x_address(bus);
        self.y = bus.read8(address);
        self.update_zero_and_negative_flags(self.y);
    }

    fn ldy_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        self.y = bus.read8(address);
        self.update_zero_and_negative_flags(self.y);
    }

    fn ldy_absolute_x(&mut self, bus: &mut Bus) {
        let address = self.absolute_x_address(bus);
        self.y = bus.read8(address);
        self.update_zero_and_negative_flags(self.y);
    }

    fn sta_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        bus.write8(address, self.a);
    }

    fn sta_zero_page_x(&mut self, bus: &mut Bus) {
        let address = self.zero_page_x_address(bus);
        bus.write8(address, self.a);
    }

    fn sta_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        bus.write8(address, self.a);
    }

    fn sta_absolute_x(&mut self, bus: &mut Bus) {
        let address = self.absolute_x_address(bus);
        bus.write8(address, self.a);
    }

    fn sta_absolute_y(&mut self, bus: &mut Bus) {
        let address = self.absolute_y_address(bus);
        bus.write8(address, self.a);
    }

    fn sta_indirect_y(&mut self, bus: &mut Bus) {
        let address = self.indirect_y_address(bus);
        bus.write8(address, self.a);
    }

    fn stx_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        bus.write8(address, self.x);
    }

    fn stx_zero_page_y(&mut self, bus: &mut Bus) {
        let address = self.zero_page_y_address(bus);
        bus.write8(address, self.x);
    }

    fn stx_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        bus.write8(address, self.x);
    }

    fn sty_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        bus.write8(address, self.y);
    }

    fn sty_zero_page_x(&mut self, bus: &mut Bus) {
        let address = self.zero_page_x_address(bus);
        bus.write8(address, self.y);
    }

    fn sty_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        bus.write8(address, self.y);
    }

    fn tax(&mut self) {
        self.x = self.a;
        self.update_zero_and_negative_flags(self.x);
        self.pc += 1;
    }

    fn tay(&mut self) {
        self.y = self.a;
        self.update_zero_and_negative_flags(self.y);
        self.pc += 1;
    }

    /// Only the low byte of the full-address stack pointer lands in X.
    fn tsx(&mut self) {
        self.x = (self.sp & 0xff) as u8;
        self.update_zero_and_negative_flags(self.x);
        self.pc += 1;
    }

    fn txa(&mut self) {
        self.a = self.x;
        self.update_zero_and_negative_flags(self.a);
        self.pc += 1;
    }

    /// Rebuilds the stack pointer as a full page-one address. No flags.
    fn txs(&mut self) {
        self.sp = 0x100 + self.x as usize;
        self.pc += 1;
    }

    fn tya(&mut self) {
        self.a = self.y;
        self.update_zero_and_negative_flags(self.a);
        self.pc += 1;
    }

    fn pha(&mut self, bus: &mut Bus) {
        self.push(bus, self.a);
        self.pc += 1;
    }

    fn php(&mut self, bus: &mut Bus) {
        let flags = self.pack_flags();
        self.push(bus, flags);
        self.pc += 1;
    }

    fn pla(&mut self, bus: &mut Bus) {
        self.a = self.pop(bus);
        self.update_zero_and_negative_flags(self.a);
        self.pc += 1;
    }

    fn plp(&mut self, bus: &mut Bus) {
        let flags = self.pop(bus);
        self.unpack_flags(flags);
        self.pc += 1;
    }

    fn adc_immediate(&mut self, bus: &mut Bus) {
        let value = self.immediate_value(bus);
        self.add_with_carry(value);
    }

    fn adc_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        let value = bus.read8(address);
        self.add_with_carry(value);
    }

    fn adc_zero_page_x(&mut self, bus: &mut Bus) {
        let address = self.zero_page_x_address(bus);
        let value = bus.read8(address);
        self.add_with_carry(value);
    }

    fn adc_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        let value = bus.read8(address);
        self.add_with_carry(value);
    }

    fn adc_absolute_x(&mut self, bus: &mut Bus) {
        let address = self.absolute_x_address(bus);
        let value = bus.read8(address);
        self.add_with_carry(value);
    }

    fn adc_absolute_y(&mut self, bus: &mut Bus) {
        let address = self.absolute_y_address(bus);
        let value = bus.read8(address);
        self.add_with_carry(value);
    }

    fn adc_indirect_y(&mut self, bus: &mut Bus) {
        let address = self.indirect_y_address(bus);
        let value = bus.read8(address);
        self.add_with_carry(value);
    }

    fn sbc_immediate(&mut self, bus: &mut Bus) {
        let value = self.immediate_value(bus);
        self.subtract_with_borrow(value);
    }

    fn sbc_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        let value = bus.read8(address);
        self.subtract_with_borrow(value);
    }

    fn sbc_zero_page_x(&mut self, bus: &mut Bus) {
        let address = self.zero_page_x_address(bus);
        let value = bus.read8(address);
        self.subtract_with_borrow(value);
    }

    fn sbc_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        let value = bus.read8(address);
        self.subtract_with_borrow(value);
    }

    fn sbc_absolute_x(&mut self, bus: &mut Bus) {
        let address = self.absolute_x_address(bus);
        let value = bus.read8(address);
        self.subtract_with_borrow(value);
    }

    fn sbc_absolute_y(&mut self, bus: &mut Bus) {
        let address = self.absolute_y_address(bus);
        let value = bus.read8(address);
        self.subtract_with_borrow(value);
    }

    fn sbc_indirect_y(&mut self, bus: &mut Bus) {
        let address = self.indirect_y_address(bus);
        let value = bus.read8(address);
        self.subtract_with_borrow(value);
    }

    fn cmp_immediate(&mut self, bus: &mut Bus) {
        let value = self.immediate_value(bus);
        self.compare(self.a, value);
    }

    fn cmp_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        let value = bus.read8(address);
        self.compare(self.a, value);
    }

    fn cmp_zero_page_x(&mut self, bus: &mut Bus) {
        let address = self.zero_page_x_address(bus);
        let value = bus.read8(address);
        self.compare(self.a, value);
    }

    fn cmp_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        let value = bus.read8(address);
        self.compare(self.a, value);
    }

    fn cmp_absolute_x(&mut self, bus: &mut Bus) {
        let address = self.absolute_x_address(bus);
        let value = bus.read8(address);
        self.compare(self.a, value);
    }

    fn cmp_absolute_y(&mut self, bus: &mut Bus) {
        let address = self.absolute_y_address(bus);
        let value = bus.read8(address);
        self.compare(self.a, value);
    }

    fn cmp_indirect_y(&mut self, bus: &mut Bus) {
        let address = self.indirect_y_address(bus);
        let value = bus.read8(address);
        self.compare(self.a, value);
    }

    fn cpx_immediate(&mut self, bus: &mut Bus) {
        let value = self.immediate_value(bus);
        self.compare(self.x, value);
    }

    fn cpx_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        let value = bus.read8(address);
        self.compare(self.x, value);
    }

    fn cpx_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        let value = bus.read8(address);
        self.compare(self.x, value);
    }

    fn cpy_immediate(&mut self, bus: &mut Bus) {
        let value = self.immediate_value(bus);
        self.compare(self.y, value);
    }

    fn cpy_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        let value = bus.read8(address);
        self.compare(self.y, value);
    }

    fn cpy_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        let value = bus.read8(address);
        self.compare(self.y, value);
    }

    fn and_immediate(&mut self, bus: &mut Bus) {
        let value = self.immediate_value(bus);
        self.a &= value;
        self.update_zero_and_negative_flags(self.a);
    }

    fn and_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        self.a &= bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn and_zero_page_x(&mut self, bus: &mut Bus) {
        let address = self.zero_page_x_address(bus);
        self.a &= bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn and_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        self.a &= bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn and_absolute_x(&mut self, bus: &mut Bus) {
        let address = self.absolute_x_address(bus);
        self.a &= bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn and_absolute_y(&mut self, bus: &mut Bus) {
        let address = self.absolute_y_address(bus);
        self.a &= bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn and_indirect_y(&mut self, bus: &mut Bus) {
        let address = self.indirect_y_address(bus);
        self.a &= bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn ora_immediate(&mut self, bus: &mut Bus) {
        let value = self.immediate_value(bus);
        self.a |= value;
        self.update_zero_and_negative_flags(self.a);
    }

    fn ora_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        self.a |= bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn ora_zero_page_x(&mut self, bus: &mut Bus) {
        let address = self.zero_page_x_address(bus);
        self.a |= bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn ora_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        self.a |= bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn ora_absolute_x(&mut self, bus: &mut Bus) {
        let address = self.absolute_x_address(bus);
        self.a |= bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn ora_absolute_y(&mut self, bus: &mut Bus) {
        let address = self.absolute_y_address(bus);
        self.a |= bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn ora_indirect_y(&mut self, bus: &mut Bus) {
        let address = self.indirect_y_address(bus);
        self.a |= bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn eor_immediate(&mut self, bus: &mut Bus) {
        let value = self.immediate_value(bus);
        self.a ^= value;
        self.update_zero_and_negative_flags(self.a);
    }

    fn eor_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        self.a ^= bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn eor_zero_page_x(&mut self, bus: &mut Bus) {
        let address = self.zero_page_x_address(bus);
        self.a ^= bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn eor_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        self.a ^= bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn eor_absolute_x(&mut self, bus: &mut Bus) {
        let address = self.absolute_x_address(bus);
        self.a ^= bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn eor_absolute_y(&mut self, bus: &mut Bus) {
        let address = self.absolute_y_address(bus);
        self.a ^= bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn eor_indirect_y(&mut self, bus: &mut Bus) {
        let address = self.indirect_y_address(bus);
        self.a ^= bus.read8(address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn bit_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        let value = bus.read8(address);
        self.bit(value);
    }

    fn bit_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        let value = bus.read8(address);
        self.bit(value);
    }

    fn asl_accumulator(&mut self) {
        self.carry = (self.a & 0x80) >> 7;
        self.a <<= 1;
        self.update_zero_and_negative_flags(self.a);
        self.pc += 1;
    }

    fn asl_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        self.shift_left_memory(bus, address);
    }

    fn asl_zero_page_x(&mut self, bus: &mut Bus) {
        let address = self.zero_page_x_address(bus);
        self.shift_left_memory(bus, address);
    }

    fn asl_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        self.shift_left_memory(bus, address);
    }

    fn asl_absolute_x(&mut self, bus: &mut Bus) {
        let address = self.absolute_x_address(bus);
        self.shift_left_memory(bus, address);
    }

    fn lsr_accumulator(&mut self) {
        self.carry = self.a & 0x01;
        self.a >>= 1;
        self.update_zero_and_negative_flags(self.a);
        self.pc += 1;
    }

    fn lsr_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        self.shift_right_memory(bus, address);
    }

    fn lsr_zero_page_x(&mut self, bus: &mut Bus) {
        let address = self.zero_page_x_address(bus);
        self.shift_right_memory(bus, address);
    }

    fn lsr_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        self.shift_right_memory(bus, address);
    }

    fn lsr_absolute_x(&mut self, bus: &mut Bus) {
        let address = self.absolute_x_address(bus);
        self.shift_right_memory(bus, address);
    }

    fn rol_accumulator(&mut self) {
        let wide = ((self.a as u16) << 1) | self.carry as u16;
        self.carry = if wide > 0xff { 1 } else { 0 };
        self.a = (wide & 0xff) as u8;
        self.update_zero_and_negative_flags(self.a);
        self.pc += 1;
    }

    fn rol_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        self.rotate_left_memory(bus, address);
    }

    fn rol_zero_page_x(&mut self, bus: &mut Bus) {
        let address = self.zero_page_x_address(bus);
        self.rotate_left_memory(bus, address);
    }

    fn rol_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        self.rotate_left_memory(bus, address);
    }

    fn rol_absolute_x(&mut self, bus: &mut Bus) {
        let address = self.absolute_x_address(bus);
        self.rotate_left_memory(bus, address);
    }

    fn ror_accumulator(&mut self) {
        let wide = self.a as u16 | ((self.carry as u16) << 8);
        self.carry = self.a & 0x01;
        self.a = (wide >> 1) as u8;
        self.update_zero_and_negative_flags(self.a);
        self.pc += 1;
    }

    fn ror_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        self.rotate_right_memory(bus, address);
    }

    fn ror_zero_page_x(&mut self, bus: &mut Bus) {
        let address = self.zero_page_x_address(bus);
        self.rotate_right_memory(bus, address);
    }

    fn ror_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        self.rotate_right_memory(bus, address);
    }

    fn ror_absolute_x(&mut self, bus: &mut Bus) {
        let address = self.absolute_x_address(bus);
        self.rotate_right_memory(bus, address);
    }

    fn inc_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        self.increment_memory(bus, address);
    }

    fn inc_zero_page_x(&mut self, bus: &mut Bus) {
        let address = self.zero_page_x_address(bus);
        self.increment_memory(bus, address);
    }

    fn inc_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        self.increment_memory(bus, address);
    }

    fn inc_absolute_x(&mut self, bus: &mut Bus) {
        let address = self.absolute_x_address(bus);
        self.increment_memory(bus, address);
    }

    fn inx(&mut self) {
        self.x = self.x.wrapping_add(1);
        self.update_zero_and_negative_flags(self.x);
        self.pc += 1;
    }

    fn iny(&mut self) {
        self.y = self.y.wrapping_add(1);
        self.update_zero_and_negative_flags(self.y);
        self.pc += 1;
    }

    fn dec_zero_page(&mut self, bus: &mut Bus) {
        let address = self.zero_page_address(bus);
        self.decrement_memory(bus, address);
    }

    fn dec_zero_page_x(&mut self, bus: &mut Bus) {
        let address = self.zero_page_x_address(bus);
        self.decrement_memory(bus, address);
    }

    fn dec_absolute(&mut self, bus: &mut Bus) {
        let address = self.absolute_address(bus);
        self.decrement_memory(bus, address);
    }

    fn dec_absolute_x(&mut self, bus: &mut Bus) {
        let address = self.absolute_x_address(bus);
        self.decrement_memory(bus, address);
    }

    fn dex(&mut self) {
        self.x = self.x.wrapping_sub(1);
        self.update_zero_and_negative_flags(self.x);
        self.pc += 1;
    }

    fn dey(&mut self) {
        self.y = self.y.wrapping_sub(1);
        self.update_zero_and_negative_flags(self.y);
        self.pc += 1;
    }

    fn jmp_absolute(&mut self, bus: &mut Bus) {
        self.pc = bus.read16(self.pc + 1);
    }

    /// Plain little-endian pointer read, without the page-boundary quirk.
    fn jmp_indirect(&mut self, bus: &mut Bus) {
        let pointer = bus.read16(self.pc + 1);
        self.pc = bus.read16(pointer);
    }

    fn jsr(&mut self, bus: &mut Bus) {
        let target = bus.read16(self.pc + 1);
        // The pushed address is the last byte of this instruction; RTS adds 1.
        let return_point = self.pc + 2;
        self.push(bus, ((return_point & 0xff00) >> 8) as u8);
        self.push(bus, (return_point & 0xff) as u8);
        self.pc = target;
    }

    fn rts(&mut self, bus: &mut Bus) {
        let lo = self.pop(bus) as usize;
        let hi = self.pop(bus) as usize;
        self.pc = ((hi << 8) | lo) + 1;
    }

    fn rti(&mut self, bus: &mut Bus) {
        let flags = self.pop(bus);
        self.unpack_flags(flags);
        let lo = self.pop(bus) as usize;
        let hi = self.pop(bus) as usize;
        self.pc = ((hi << 8) | lo) + 1;
    }

    fn bcc(&mut self, bus: &mut Bus) {
        self.branch(bus, self.carry == 0);
    }

    fn bcs(&mut self, bus: &mut Bus) {
        self.branch(bus, self.carry == 1);
    }

    fn beq(&mut self, bus: &mut Bus) {
        self.branch(bus, self.zero);
    }

    fn bne(&mut self, bus: &mut Bus) {
        self.branch(bus, !self.zero);
    }

    fn bmi(&mut self, bus: &mut Bus) {
        self.branch(bus, self.negative);
    }

    fn bpl(&mut self, bus: &mut Bus) {
        self.branch(bus, !self.negative);
    }

    fn bvc(&mut self, bus: &mut Bus) {
        self.branch(bus, !self.overflow);
    }

    fn bvs(&mut self, bus: &mut Bus) {
        self.branch(bus, self.overflow);
    }

    fn clc(&mut self) {
        self.carry = 0;
        self.pc += 1;
    }

    fn cld(&mut self) {
        self.decimal = false;
        self.pc += 1;
    }

    fn cli(&mut self) {
        self.interrupt_disable = false;
        self.pc += 1;
    }

    fn clv(&mut self) {
        self.overflow = false;
        self.pc += 1;
    }

    fn sec(&mut self) {
        self.carry = 1;
        self.pc += 1;
    }

    fn sed(&mut self) {
        self.decimal = true;
        self.pc += 1;
    }

    fn sei(&mut self) {
        self.interrupt_disable = true;
        self.pc += 1;
    }

    fn nop(&mut self) {
        self.pc += 1;
    }
}
