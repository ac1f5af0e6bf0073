//! The Picture Processing Unit: VRAM (component G), the memory-mapped
//! register file with its double-latched writes and buffered reads
//! (component H), and the frame producer (component I).

mod frame;
mod palette;
mod registers;
mod vram;

pub use frame::{SCREEN_HEIGHT, SCREEN_WIDTH};
pub use palette::{Colour, PALETTE_TABLE};
pub use registers::{Control, Mask, Status};

use crate::cartridge::Mirroring;
use crate::error::Result;
use crate::memory::{invalid_read, invalid_write, MemoryPort};
use registers::DoubleLatch;
use vram::Vram;

pub const OAM_SIZE: usize = 256;

pub struct Ppu {
    vram: Vram,
    control: Control,
    mask: Mask,
    status: Status,
    oam: [u8; OAM_SIZE],
    oam_address: u8,
    scroll: DoubleLatch,
    vram_address: DoubleLatch,
    data_buffer: u8,
}

impl Ppu {
    pub fn new(mirroring: Mirroring, chr: &[u8]) -> Self {
        Ppu {
            vram: Vram::new(mirroring, chr),
            control: Control::default(),
            mask: Mask::default(),
            status: Status::default(),
            oam: [0; OAM_SIZE],
            oam_address: 0,
            scroll: DoubleLatch::new(),
            vram_address: DoubleLatch::new(),
            data_buffer: 0,
        }
    }

    pub fn produce_frame(&self) -> Vec<u8> {
        frame::produce_frame(&self.vram, &self.control, &self.mask, &self.oam)
    }

    /// Sets or clears the vblank status flag. Returns whether the caller
    /// should now raise NMI on the CPU (vblank entered and NMI-on-vblank is
    /// enabled in the control register) — deciding when vblank boundaries
    /// occur is the host's job (§5), not the PPU's.
    pub fn set_vblank(&mut self, active: bool) -> bool {
        self.status.set(Status::V_BLANK, active);
        active && self.control.nmi_enabled()
    }

    /// Called by the bus when the CPU writes to 0x4014. OAM-DMA is handled
    /// outside the PPU's regular `MemoryPort` dispatch because it must pull
    /// 256 bytes from the bus, and giving the PPU a bus reference of its own
    /// would create the reference cycle design note 9 warns against; the bus
    /// reads the page itself and feeds each byte in here.
    pub fn write_oam_byte_during_dma(&mut self, offset: u8, value: u8) {
        let index = self.oam_address.wrapping_add(offset);
        self.oam[index as usize] = value;
    }

    pub fn oam_address(&self) -> u8 {
        self.oam_address
    }
}

impl MemoryPort for Ppu {
    fn is_readable(&self, address: u16) -> bool {
        matches!(address, 0x2002 | 0x2004 | 0x2007)
    }

    fn is_writable(&self, address: u16) -> bool {
        matches!(
            address,
            0x2000 | 0x2001 | 0x2003 | 0x2004 | 0x2005 | 0x2006 | 0x2007
        )
    }

    fn read_byte(&mut self, address: u16) -> Result<u8> {
        match address {
            0x2002 => {
                let value = self.status.bits();
                self.status.set(Status::V_BLANK, false);
                self.scroll.reset_latch();
                self.vram_address.reset_latch();
                Ok(value)
            }
            0x2004 => Ok(self.oam[self.oam_address as usize]),
            0x2007 => {
                let address = self.vram_address.value();
                let mut data = self.data_buffer;
                self.data_buffer = self.vram.read(address);
                if address >= 0x3F00 {
                    data = self.data_buffer;
                }
                self.vram_address.increment(self.control.vram_address_stride());
                Ok(data)
            }
            _ => Err(invalid_read(address)),
        }
    }

    fn write_byte(&mut self, address: u16, value: u8) -> Result<()> {
        match address {
            0x2000 => {
                self.control = Control::from_bits_truncate(value);
                Ok(())
            }
            0x2001 => {
                self.mask = Mask::from_bits_truncate(value);
                Ok(())
            }
            0x2003 => {
                self.oam_address = value;
                Ok(())
            }
            0x2004 => {
                self.oam[self.oam_address as usize] = value;
                self.oam_address = self.oam_address.wrapping_add(1);
                Ok(())
            }
            0x2005 => {
                self.scroll.write_byte(value);
                Ok(())
            }
            0x2006 => {
                self.vram_address.write_byte(value);
                Ok(())
            }
            0x2007 => {
                self.vram.write(self.vram_address.value(), value);
                self.vram_address.increment(self.control.vram_address_stride());
                Ok(())
            }
            _ => Err(invalid_write(address)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vram_address_latching_scenario() {
        let mut ppu = Ppu::new(Mirroring::Horizontal, &[]);
        ppu.write_byte(0x2006, 0x20).unwrap();
        ppu.write_byte(0x2006, 0x00).unwrap();
        assert_eq!(ppu.vram_address.value(), 0x2000);

        ppu.write_byte(0x2007, 0x42).unwrap();
        assert_eq!(ppu.vram.read(0x2000), 0x42);
        assert_eq!(ppu.vram_address.value(), 0x2001);

        ppu.write_byte(0x2006, 0x11).unwrap();
        assert!(!ppu.vram_address.is_latch_complete());
        ppu.read_byte(0x2002).unwrap();
        assert!(ppu.vram_address.is_latch_complete());
    }

    #[test]
    fn status_read_clears_vblank_and_latch() {
        let mut ppu = Ppu::new(Mirroring::Horizontal, &[]);
        ppu.set_vblank(true);
        ppu.scroll.write_byte(0x01);
        assert!(!ppu.scroll.is_latch_complete());

        let status = ppu.read_byte(0x2002).unwrap();
        assert_eq!(status & 0x80, 0x80);
        assert!(ppu.scroll.is_latch_complete());
        assert_eq!(ppu.read_byte(0x2002).unwrap() & 0x80, 0);
    }

    #[test]
    fn oam_dma_writes_starting_at_oam_address() {
        let mut ppu = Ppu::new(Mirroring::Horizontal, &[]);
        ppu.write_byte(0x2003, 0x10).unwrap();
        for i in 0..=255u8 {
            ppu.write_oam_byte_during_dma(i, i);
        }
        assert_eq!(ppu.oam[0x10], 0);
        assert_eq!(ppu.oam[0x10 + 5], 5);
    }

    #[test]
    fn vblank_sets_nmi_only_when_enabled() {
        let mut ppu = Ppu::new(Mirroring::Horizontal, &[]);
        assert!(!ppu.set_vblank(true));
        ppu.set_vblank(false);
        ppu.write_byte(0x2000, Control::GENERATE_NMI.bits()).unwrap();
        assert!(ppu.set_vblank(true));
    }
}
