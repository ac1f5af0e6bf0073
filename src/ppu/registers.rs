//! PPU control/mask/status bitflags and the double-latched 16-bit register
//! shared by `scroll` and `vram_address`.

use bitflags::bitflags;

bitflags! {
    #[derive(Default)]
    pub struct Control: u8 {
        const NAME_TABLE_LOW       = 0b0000_0001;
        const NAME_TABLE_HIGH      = 0b0000_0010;
        const VRAM_ADDRESS_STRIDE  = 0b0000_0100;
        const SPRITE_PATTERN_HALF  = 0b0000_1000;
        const BACKGROUND_PATTERN_HALF = 0b0001_0000;
        const SPRITE_HEIGHT        = 0b0010_0000;
        const MASTER_SLAVE         = 0b0100_0000;
        const GENERATE_NMI         = 0b1000_0000;
    }

    #[derive(Default)]
    pub struct Mask: u8 {
        const GREYSCALE                  = 0b0000_0001;
        const SHOW_BACKGROUND_LEFTMOST   = 0b0000_0010;
        const SHOW_SPRITES_LEFTMOST      = 0b0000_0100;
        const SHOW_BACKGROUND            = 0b0000_1000;
        const SHOW_SPRITES               = 0b0001_0000;
    }

    #[derive(Default)]
    pub struct Status: u8 {
        const SPRITE_OVERFLOW = 0b0010_0000;
        const SPRITE_ZERO_HIT = 0b0100_0000;
        const V_BLANK         = 0b1000_0000;
    }
}

impl Control {
    pub fn base_name_table_id(&self) -> u8 {
        self.bits() & 0b11
    }

    pub fn vram_address_stride(&self) -> u16 {
        if self.contains(Control::VRAM_ADDRESS_STRIDE) {
            32
        } else {
            1
        }
    }

    pub fn sprite_pattern_half(&self) -> u16 {
        if self.contains(Control::SPRITE_PATTERN_HALF) {
            0x1000
        } else {
            0x0000
        }
    }

    pub fn background_pattern_half(&self) -> u16 {
        if self.contains(Control::BACKGROUND_PATTERN_HALF) {
            0x1000
        } else {
            0x0000
        }
    }

    pub fn sprite_height(&self) -> u8 {
        if self.contains(Control::SPRITE_HEIGHT) {
            16
        } else {
            8
        }
    }

    pub fn nmi_enabled(&self) -> bool {
        self.contains(Control::GENERATE_NMI)
    }
}

impl Mask {
    pub fn show_background(&self) -> bool {
        self.contains(Mask::SHOW_BACKGROUND)
    }

    pub fn show_sprites(&self) -> bool {
        self.contains(Mask::SHOW_SPRITES)
    }
}

/// A 16-bit register fed by two sequential byte writes.
///
/// Backs both `scroll` and `vram_address` (§4.6): each write toggles which
/// half is filled next, and a direct `write_address` (used internally once
/// both halves of the VRAM address have landed) completes the latch outright.
#[derive(Default, Clone, Copy)]
pub struct DoubleLatch {
    value: u16,
    latch_complete: bool,
}

impl DoubleLatch {
    pub fn new() -> Self {
        DoubleLatch {
            value: 0,
            latch_complete: true,
        }
    }

    pub fn write_byte(&mut self, byte: u8) {
        if self.latch_complete {
            self.value = (byte as u16) << 8;
        } else {
            self.value |= byte as u16;
        }
        self.latch_complete = !self.latch_complete;
    }

    pub fn write_address(&mut self, value: u16) {
        self.value = value;
        self.latch_complete = true;
    }

    pub fn increment(&mut self, delta: u16) {
        self.value = self.value.wrapping_add(delta);
    }

    pub fn reset_latch(&mut self) {
        self.latch_complete = true;
    }

    pub fn value(&self) -> u16 {
        self.value
    }

    pub fn low_byte(&self) -> u8 {
        self.value as u8
    }

    pub fn high_byte(&self) -> u8 {
        (self.value >> 8) as u8
    }

    pub fn is_latch_complete(&self) -> bool {
        self.latch_complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_latch_is_complete_and_zero() {
        let latch = DoubleLatch::new();
        assert!(latch.is_latch_complete());
        assert_eq!(latch.value(), 0);
    }

    #[test]
    fn two_writes_form_a_16_bit_value() {
        let mut latch = DoubleLatch::new();
        latch.write_byte(0x20);
        assert!(!latch.is_latch_complete());
        latch.write_byte(0x00);
        assert!(latch.is_latch_complete());
        assert_eq!(latch.value(), 0x2000);
    }

    #[test]
    fn increment_wraps_at_16_bits() {
        let mut latch = DoubleLatch::new();
        latch.write_address(0xFFFF);
        latch.increment(1);
        assert_eq!(latch.value(), 0);
    }
}
