use std::cell::Cell;
use std::rc::Rc;

use crate::bus::{Bus, BusKind, CpuSnapshot, Handler, StateReader};
use crate::cpu::cpu::{Cpu, ExecutionError, NMI_INSTRUCTION_CEILING};
use crate::cpu::flags::{FLAG_CARRY, FLAG_ZERO};
use crate::memory::Ram;

fn cpu_and_bus(program: &[u8]) -> (Cpu, Bus) {
    let state = Rc::new(Cell::new(CpuSnapshot::default()));
    let mut bus = Bus::new(BusKind::Cpu, Rc::clone(&state));
    let mut ram = Ram::new(0, 0x10000);
    for (i, byte) in program.iter().enumerate() {
        ram.write(0x8000 + i, *byte);
    }
    ram.write(0xfffc, 0x00);
    ram.write(0xfffd, 0x80);
    bus.add(Handler::Ram(ram));
    let mut cpu = Cpu::new(&mut bus, state);
    cpu.reset();
    (cpu, bus)
}

fn cpu_and_bus_with_nmi(program: &[u8], handler: &[u8]) -> (Cpu, Bus) {
    let state = Rc::new(Cell::new(CpuSnapshot::default()));
    let mut bus = Bus::new(BusKind::Cpu, Rc::clone(&state));
    let mut ram = Ram::new(0, 0x10000);
    for (i, byte) in program.iter().enumerate() {
        ram.write(0x8000 + i, *byte);
    }
    for (i, byte) in handler.iter().enumerate() {
        ram.write(0x9000 + i, *byte);
    }
    ram.write(0xfffa, 0x00);
    ram.write(0xfffb, 0x90);
    ram.write(0xfffc, 0x00);
    ram.write(0xfffd, 0x80);
    bus.add(Handler::Ram(ram));
    let mut cpu = Cpu::new(&mut bus, state);
    cpu.reset();
    (cpu, bus)
}

fn run(cpu: &mut Cpu, bus: &mut Bus, instructions: usize) {
    for _ in 0..instructions {
        cpu.execute(bus).unwrap();
    }
}

#[test]
fn lda_immediate_loads_value() {
    let (mut cpu, mut bus) = cpu_and_bus(&[
        0xa9, 0x42, // LDA #$42
    ]);
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.a, 0x42);
    assert!(!cpu.zero);
    assert!(!cpu.negative);
}

#[test]
fn adc_carries_into_zero() {
    let (mut cpu, mut bus) = cpu_and_bus(&[
        0xa9, 0xff, // LDA #$FF
        0x69, 0x01, // ADC #$01
    ]);
    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.a, 0x00);
    assert_eq!(cpu.carry, 1);
    assert!(cpu.zero);
}

#[test]
fn adc_leaves_overflow_alone() {
    // 0x7F + 1 overflows in the signed sense; the V flag still stays clear.
    let (mut cpu, mut bus) = cpu_and_bus(&[
        0xa9, 0x7f, // LDA #$7F
        0x69, 0x01, // ADC #$01
    ]);
    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.a, 0x80);
    assert!(cpu.negative);
    assert!(!cpu.overflow);
}

#[test]
fn sbc_clears_carry_on_borrow() {
    let (mut cpu, mut bus) = cpu_and_bus(&[
        0x38, // SEC
        0xa9, 0x10, // LDA #$10
        0xe9, 0x20, // SBC #$20
    ]);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.a, 0xf0);
    assert_eq!(cpu.carry, 0);
    assert!(cpu.negative);
}

#[test]
fn cmp_splits_unsigned_and_signed_comparisons() {
    // 0x7F < 0x80 unsigned (carry clear) but 127 > -128 signed, so the
    // negative flag stays clear even though 0x7F - 0x80 has bit 7 set.
    let (mut cpu, mut bus) = cpu_and_bus(&[
        0xa9, 0x7f, // LDA #$7F
        0xc9, 0x80, // CMP #$80
    ]);
    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.carry, 0);
    assert!(!cpu.negative);
    assert!(!cpu.zero);
}

#[test]
fn txs_builds_a_full_page_one_address() {
    let (mut cpu, mut bus) = cpu_and_bus(&[
        0xa2, 0xff, // LDX #$FF
        0x9a, // TXS
        0xa9, 0x42, // LDA #$42
        0x48, // PHA
        0xa9, 0x00, // LDA #$00
        0x68, // PLA
        0xba, // TSX
    ]);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.sp, 0x1ff);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.a, 0x42);
    assert_eq!(cpu.sp, 0x1ff);
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.x, 0xff);
}

#[test]
fn asl_memory_takes_zero_flag_from_the_result() {
    let (mut cpu, mut bus) = cpu_and_bus(&[
        0xa9, 0x80, // LDA #$80
        0x85, 0x10, // STA $10
        0x06, 0x10, // ASL $10
    ]);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(bus.read8(0x10), 0x00);
    assert_eq!(cpu.carry, 1);
    assert!(cpu.zero);
}

#[test]
fn rol_and_ror_move_carry_through_memory() {
    let (mut cpu, mut bus) = cpu_and_bus(&[
        0xa2, 0xff, // LDX #$FF
        0x9a, // TXS
        0x38, // SEC
        0xa9, 0x80, // LDA #$80
        0x85, 0x10, // STA $10
        0x26, 0x10, // ROL $10
        0x66, 0x10, // ROR $10
    ]);
    run(&mut cpu, &mut bus, 6);
    // 0x80 rolled left with carry in: memory 0x01, carry out 1.
    assert_eq!(bus.read8(0x10), 0x01);
    assert_eq!(cpu.carry, 1);
    run(&mut cpu, &mut bus, 1);
    // 0x01 rotated right with carry in: memory 0x80, carry out 1.
    assert_eq!(bus.read8(0x10), 0x80);
    assert_eq!(cpu.carry, 1);
}

#[test]
fn flag_byte_uses_the_interpreter_layout() {
    let (mut cpu, mut bus) = cpu_and_bus(&[
        0xa2, 0xff, // LDX #$FF
        0x9a, // TXS
        0x38, // SEC
        0xa9, 0x00, // LDA #$00
        0x08, // PHP
        0x68, // PLA
    ]);
    run(&mut cpu, &mut bus, 6);
    assert_eq!(cpu.a, FLAG_CARRY | FLAG_ZERO);
}

#[test]
fn plp_restores_pushed_flags() {
    let (mut cpu, mut bus) = cpu_and_bus(&[
        0xa2, 0xff, // LDX #$FF
        0x9a, // TXS
        0x38, // SEC
        0x08, // PHP
        0x18, // CLC
        0x28, // PLP
    ]);
    run(&mut cpu, &mut bus, 6);
    assert_eq!(cpu.carry, 1);
}

#[test]
fn bne_loops_until_zero() {
    let (mut cpu, mut bus) = cpu_and_bus(&[
        0xa2, 0x03, // LDX #$03
        0xca, // DEX
        0xd0, 0xfd, // BNE -3
    ]);
    run(&mut cpu, &mut bus, 7);
    assert_eq!(cpu.x, 0x00);
    assert_eq!(cpu.pc, 0x8005);
}

#[test]
fn jsr_and_rts_resume_after_the_call() {
    let (mut cpu, mut bus) = cpu_and_bus(&[
        0xa2, 0xff, // LDX #$FF
        0x9a, // TXS
        0x20, 0x09, 0x80, // JSR $8009
        0xa9, 0x11, // LDA #$11
        0xea, // NOP
        0xa9, 0x22, // LDA #$22 (subroutine)
        0x60, // RTS
    ]);
    run(&mut cpu, &mut bus, 3); // LDX, TXS, JSR
    assert_eq!(cpu.pc, 0x8009);
    run(&mut cpu, &mut bus, 2); // LDA #$22, RTS
    assert_eq!(cpu.a, 0x22);
    assert_eq!(cpu.pc, 0x8006);
    assert_eq!(cpu.sp, 0x1ff);
    run(&mut cpu, &mut bus, 1); // LDA #$11
    assert_eq!(cpu.a, 0x11);
}

#[test]
fn jmp_indirect_reads_a_plain_pointer() {
    let (mut cpu, mut bus) = cpu_and_bus(&[
        0xa9, 0x00, // LDA #$00
        0x85, 0x20, // STA $20
        0xa9, 0x90, // LDA #$90
        0x85, 0x21, // STA $21
        0x6c, 0x20, 0x00, // JMP ($0020)
    ]);
    run(&mut cpu, &mut bus, 5);
    assert_eq!(cpu.pc, 0x9000);
}

#[test]
fn lda_indirect_x_is_the_only_member_of_its_column() {
    let (mut cpu, mut bus) = cpu_and_bus(&[
        0xa9, 0x99, // LDA #$99
        0x8d, 0x34, 0x12, // STA $1234
        0xa9, 0x34, // LDA #$34
        0x85, 0x24, // STA $24
        0xa9, 0x12, // LDA #$12
        0x85, 0x25, // STA $25
        0xa2, 0x04, // LDX #$04
        0xa1, 0x20, // LDA ($20,X)
        0x01, 0x20, // ORA ($20,X)
    ]);
    run(&mut cpu, &mut bus, 8);
    assert_eq!(cpu.a, 0x99);
    let err = cpu.execute(&mut bus).unwrap_err();
    match err {
        ExecutionError::UnsupportedInstruction { opcode, pc, .. } => {
            assert_eq!(opcode, 0x01);
            assert_eq!(pc, 0x8011);
        }
    }
}

#[test]
fn brk_stops_execution() {
    let (mut cpu, mut bus) = cpu_and_bus(&[
        0x00, // BRK
    ]);
    let err = cpu.execute(&mut bus).unwrap_err();
    assert!(matches!(
        err,
        ExecutionError::UnsupportedInstruction { opcode: 0x00, .. }
    ));
}

#[test]
fn nmi_preserves_flags_and_resumes() {
    let (mut cpu, mut bus) = cpu_and_bus_with_nmi(
        &[
            0xa2, 0xff, // LDX #$FF
            0x9a, // TXS
            0x38, // SEC
            0xea, // NOP
        ],
        &[
            0x18, // CLC
            0xa9, 0x05, // LDA #$05
            0x40, // RTI
        ],
    );
    run(&mut cpu, &mut bus, 3); // LDX, TXS, SEC
    let resume = cpu.pc;
    cpu.nmi(&mut bus).unwrap();
    assert_eq!(cpu.a, 0x05);
    assert_eq!(cpu.pc, resume);
    assert_eq!(cpu.carry, 1);
    assert_eq!(cpu.sp, 0x1ff);
}

#[test]
fn nmi_abandons_a_handler_that_never_returns() {
    let (mut cpu, mut bus) = cpu_and_bus_with_nmi(
        &[
            0xa2, 0xff, // LDX #$FF
            0x9a, // TXS
        ],
        &[
            0x4c, 0x00, 0x90, // JMP $9000
        ],
    );
    run(&mut cpu, &mut bus, 2);
    let before = cpu.instruction_count();
    cpu.nmi(&mut bus).unwrap();
    assert_eq!(
        cpu.instruction_count() - before,
        NMI_INSTRUCTION_CEILING as u64
    );
}

#[test]
fn register_state_round_trips() {
    let (mut cpu, mut bus) = cpu_and_bus(&[
        0xa2, 0xff, // LDX #$FF
        0x9a, // TXS
        0xa9, 0x42, // LDA #$42
        0xa0, 0x07, // LDY #$07
        0x38, // SEC
    ]);
    run(&mut cpu, &mut bus, 5);

    let mut out = Vec::new();
    cpu.save(&mut out);
    assert_eq!(out.len(), 13);

    let state = Rc::new(Cell::new(CpuSnapshot::default()));
    let mut restored = Cpu::new(&mut bus, state);
    let mut reader = StateReader::new(&out);
    restored.load(&mut reader).unwrap();
    assert_eq!(restored.pc, cpu.pc);
    assert_eq!(restored.sp, 0x1ff);
    assert_eq!(restored.a, 0x42);
    assert_eq!(restored.x, 0xff);
    assert_eq!(restored.y, 0x07);
    assert_eq!(restored.carry, 1);
}
