//! Strobe latch + serial button shift register, memory-mapped at 0x4016/0x4017.

use crate::memory::{invalid_read, invalid_write, MemoryPort};
use crate::error::Result;

pub const FIRST_JOYPAD_ADDRESS: u16 = 0x4016;
pub const SECOND_JOYPAD_ADDRESS: u16 = 0x4017;

const MAX_READS: u32 = 24;
/// The NES hardware quirk: after the 8 real button bits, the controller's
/// shift register keeps shifting out the signature byte stream for games
/// that probe it to detect a genuine controller; this core only reaches
/// read index 19 as a 1, every other post-8 index as 0.
const SIGNATURE_READ_INDEX: u32 = 19;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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

const BUTTON_ORDER: [Button; 8] = [
    Button::A,
    Button::B,
    Button::Select,
    Button::Start,
    Button::Up,
    Button::Down,
    Button::Left,
    Button::Right,
];

/// A snapshot of which buttons are currently held down. The host owns the
/// real keyboard-scanning collaborator (§6); this is the boolean-per-button
/// contract the joypad reads through.
#[derive(Default, Clone, Copy)]
pub struct ButtonState {
    pub a: bool,
    pub b: bool,
    pub select: bool,
    pub start: bool,
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl ButtonState {
    fn is_down(&self, button: Button) -> bool {
        match button {
            Button::A => self.a,
            Button::B => self.b,
            Button::Select => self.select,
            Button::Start => self.start,
            Button::Up => self.up,
            Button::Down => self.down,
            Button::Left => self.left,
            Button::Right => self.right,
        }
    }
}

pub struct Joypad {
    buttons: ButtonState,
    last_write: u8,
    reads_issued: u32,
}

impl Joypad {
    pub fn new() -> Self {
        Joypad {
            buttons: ButtonState::default(),
            last_write: 0,
            reads_issued: 0,
        }
    }

    pub fn set_buttons(&mut self, buttons: ButtonState) {
        self.buttons = buttons;
    }

    fn strobe(&self, byte: u8) -> bool {
        self.last_write & 1 == 1 && byte & 1 == 0
    }

    fn write(&mut self, byte: u8) {
        if self.strobe(byte) {
            self.reads_issued = 0;
        }
        self.last_write = byte;
    }

    fn read(&mut self) -> u8 {
        if self.reads_issued == MAX_READS {
            self.reads_issued = 0;
        }

        let result = if self.reads_issued == SIGNATURE_READ_INDEX {
            true
        } else {
            match BUTTON_ORDER.get(self.reads_issued as usize) {
                Some(&button) => self.buttons.is_down(button),
                None => false,
            }
        };

        self.reads_issued += 1;
        result as u8
    }
}

impl Default for Joypad {
    fn default() -> Self {
        Self::new()
    }
}

/// Fronts both joypad ports at their fixed addresses. Joypad 2 is modeled as
/// an always-disconnected read-only port, matching the "read-only for this
/// purpose" scope carved out in §4.8.
pub struct JoypadPort {
    first: Joypad,
}

impl JoypadPort {
    pub fn new() -> Self {
        JoypadPort {
            first: Joypad::new(),
        }
    }

    pub fn set_first_joypad_buttons(&mut self, buttons: ButtonState) {
        self.first.set_buttons(buttons);
    }
}

impl Default for JoypadPort {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPort for JoypadPort {
    fn is_readable(&self, address: u16) -> bool {
        matches!(address, FIRST_JOYPAD_ADDRESS | SECOND_JOYPAD_ADDRESS)
    }

    fn is_writable(&self, address: u16) -> bool {
        address == FIRST_JOYPAD_ADDRESS
    }

    fn read_byte(&mut self, address: u16) -> Result<u8> {
        match address {
            FIRST_JOYPAD_ADDRESS => Ok(self.first.read()),
            SECOND_JOYPAD_ADDRESS => Ok(0),
            _ => Err(invalid_read(address)),
        }
    }

    fn write_byte(&mut self, address: u16, value: u8) -> Result<()> {
        match address {
            FIRST_JOYPAD_ADDRESS => {
                self.first.write(value);
                Ok(())
            }
            _ => Err(invalid_write(address)),
        }
    }
}
