//! Controller port at $4016.
//!
//! [Standard controller](https://www.nesdev.org/wiki/Standard_controller)
//! protocol, byte-per-button flavor: the game strobes by writing 1 then 0,
//! which rewinds the read index; each read then returns one whole button
//! state byte (0 or 1) and advances to the next. Reads past the eighth
//! button return 0; the index does not wrap.

use crate::bus::{StateError, StateReader};

/// Buttons in hardware read order.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Button {
    A,
    B,
    Select,
    Start,
    Up,
    Down,
    Left,
    Right,
}

pub struct Controller {
    buttons: [u8; 8],
    last_written: u8,
    index: u8,
}

impl Controller {
    /// A controller with no buttons pressed.
    pub fn new() -> Self {
        Controller {
            buttons: [0; 8],
            last_written: 0,
            index: 0,
        }
    }

    /// Read the next button byte and advance the index.
    pub fn read(&mut self, _address: usize) -> u8 {
        let value = self.buttons.get(self.index as usize).copied().unwrap_or(0);
        self.index = self.index.wrapping_add(1);
        value
    }

    /// A 1-then-0 write sequence rewinds the read index to button A.
    pub fn write(&mut self, _address: usize, value: u8) {
        if value == 0 && self.last_written == 1 {
            self.index = 0;
        }
        self.last_written = value;
    }

    /// Host-side input feed.
    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.buttons[button as usize] = pressed as u8;
    }

    /// Release everything, used when the machine stops.
    pub fn clear(&mut self) {
        self.buttons = [0; 8];
    }

    pub fn save(&self, out: &mut Vec<u8>) {
        out.push(self.last_written);
        out.push(self.index);
        out.extend_from_slice(&self.buttons);
    }

    pub fn load(&mut self, reader: &mut StateReader<'_>) -> Result<(), StateError> {
        self.last_written = reader.read_u8()?;
        self.index = reader.read_u8()?;
        reader.read_exact(&mut self.buttons)
    }
}

impl Default for Controller {
    fn default() -> Self {
        Controller::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strobe_rewinds_and_reads_walk_the_buttons() {
        let mut pad = Controller::new();
        pad.set_button(Button::A, true);
        pad.set_button(Button::Start, true);

        pad.write(0x4016, 1);
        pad.write(0x4016, 0);
        assert_eq!(pad.read(0x4016), 1); // A
        assert_eq!(pad.read(0x4016), 0); // B
        assert_eq!(pad.read(0x4016), 0); // Select
        assert_eq!(pad.read(0x4016), 1); // Start

        // Strobing again rewinds to A.
        pad.write(0x4016, 1);
        pad.write(0x4016, 0);
        assert_eq!(pad.read(0x4016), 1);
    }

    #[test]
    fn reads_past_the_last_button_return_zero() {
        let mut pad = Controller::new();
        pad.set_button(Button::Right, true);
        for _ in 0..7 {
            pad.read(0x4016);
        }
        assert_eq!(pad.read(0x4016), 1); // Right, the eighth read
        assert_eq!(pad.read(0x4016), 0);
        assert_eq!(pad.read(0x4016), 0);
    }

    #[test]
    fn writing_one_alone_does_not_rewind() {
        let mut pad = Controller::new();
        pad.set_button(Button::A, true);
        pad.write(0x4016, 1);
        pad.write(0x4016, 0);
        pad.read(0x4016);
        pad.read(0x4016);
        // A lone 1 write must not rewind until the falling edge.
        pad.write(0x4016, 1);
        assert_eq!(pad.read(0x4016), 0); // still Select
        pad.write(0x4016, 0);
        assert_eq!(pad.read(0x4016), 1); // rewound to A
    }

    #[test]
    fn state_round_trips() {
        let mut pad = Controller::new();
        pad.set_button(Button::B, true);
        pad.write(0x4016, 1);
        pad.write(0x4016, 0);
        pad.read(0x4016);

        let mut out = Vec::new();
        pad.save(&mut out);
        assert_eq!(out.len(), 10);

        let mut restored = Controller::new();
        let mut reader = StateReader::new(&out);
        restored.load(&mut reader).unwrap();
        assert_eq!(restored.read(0x4016), 1); // B, index picked up where it was
    }
}
