//! Layout of the packed status byte used by PHP/PLP, RTI, and the NMI entry
//! sequence.
//!
//! This is not the hardware P register order: carry rides bit 6 here and
//! negative bit 0. PLP and RTI unpack exactly this layout, and packed bytes
//! end up inside saved RAM images, so the layout must stay put.

pub const FLAG_NEGATIVE: u8 = 1 << 0;
pub const FLAG_OVERFLOW: u8 = 1 << 1;
// bit 2 would hold break mode; it is never set
pub const FLAG_DECIMAL: u8 = 1 << 3; // Tracked but no arithmetic effect
pub const FLAG_INTERRUPT_DISABLE: u8 = 1 << 4;
pub const FLAG_ZERO: u8 = 1 << 5;
pub const FLAG_CARRY: u8 = 1 << 6;
