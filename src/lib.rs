//! famivm: a behavioral NES-style virtual machine.
//!
//! Runs game code written for the stock console without modeling clock
//! cycles. The interpreter executes whole instructions, the picture
//! registers keep their observable coupling, and the host supplies the
//! audiovisual half: it raises one NMI per frame through the
//! [machine](machine), advances a fixed instruction budget, and draws by
//! querying machine state between frames.
//!
//! ## Modules (NESdev references)
//!
//! - **apu** – inert [APU](https://www.nesdev.org/wiki/APU) register block; sound is host-side
//! - **bus** – slot-per-address dispatch, event-generator taps, the state image
//! - **cartridge** – [iNES](https://www.nesdev.org/wiki/INES) parsing; mappers
//!   [NROM (0)](https://www.nesdev.org/wiki/NROM), [UNROM (2)](https://www.nesdev.org/wiki/UxROM),
//!   [UNROM 512 (30)](https://www.nesdev.org/wiki/UNROM_512)
//! - **controller** – [$4016](https://www.nesdev.org/wiki/Standard_controller) strobe, byte-per-button reads
//! - **cpu** – [6502](https://www.nesdev.org/wiki/CPU) interpreter, documented opcodes, [NMI](https://www.nesdev.org/wiki/NMI) delivery
//! - **machine** – the assembled console and the host-facing query surface
//! - **memory** – ROM, RAM, and bank-switchable storage handlers
//! - **oam** – sprite memory and the $4014 page copy
//! - **ppu** – the six picture registers and their cross-register coupling

pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod controller;
pub mod cpu;
pub mod machine;
pub mod memory;
pub mod oam;
pub mod ppu;
