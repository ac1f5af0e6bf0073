//! Address dispatch across the heterogeneous device set: RAM, PPU registers,
//! the joypad port, and the cartridge mapper.
//!
//! A `Bus` is a transient view constructed fresh for a single CPU step. It
//! borrows each device mutably rather than owning them, so the top-level
//! `Nes` struct (src/nes.rs) remains the sole owner and the borrow checker
//! is satisfied without reference counting — the adaptation the ownership
//! model in §5 calls for in a language without a shared-pointer default.

use crate::error::Result;
use crate::joypad::JoypadPort;
use crate::mapper::Mapper;
use crate::memory::{invalid_read, invalid_write, MemoryPort};
use crate::ppu::Ppu;
use crate::ram::Ram;

const OAM_DMA_ADDRESS: u16 = 0x4014;

pub struct Bus<'a> {
    pub ram: &'a mut Ram,
    pub ppu: &'a mut Ppu,
    pub joypad: &'a mut JoypadPort,
    pub mapper: &'a mut dyn Mapper,
}

impl<'a> Bus<'a> {
    pub fn new(
        ram: &'a mut Ram,
        ppu: &'a mut Ppu,
        joypad: &'a mut JoypadPort,
        mapper: &'a mut dyn Mapper,
    ) -> Self {
        Bus {
            ram,
            ppu,
            joypad,
            mapper,
        }
    }

    fn perform_oam_dma(&mut self, page: u8) -> Result<()> {
        let base = (page as u16) << 8;
        for offset in 0..=255u8 {
            let byte = self.read_byte(base + offset as u16)?;
            self.ppu.write_oam_byte_during_dma(offset, byte);
        }
        Ok(())
    }
}

impl<'a> MemoryPort for Bus<'a> {
    fn is_readable(&self, address: u16) -> bool {
        self.ram.is_readable(address)
            || self.ppu.is_readable(address)
            || self.joypad.is_readable(address)
            || self.mapper.is_readable(address)
    }

    fn is_writable(&self, address: u16) -> bool {
        address == OAM_DMA_ADDRESS
            || self.ram.is_writable(address)
            || self.ppu.is_writable(address)
            || self.joypad.is_writable(address)
            || self.mapper.is_writable(address)
    }

    fn read_byte(&mut self, address: u16) -> Result<u8> {
        if self.ram.is_readable(address) {
            return self.ram.read_byte(address);
        }
        if self.ppu.is_readable(address) {
            return self.ppu.read_byte(address);
        }
        if self.joypad.is_readable(address) {
            return self.joypad.read_byte(address);
        }
        if self.mapper.is_readable(address) {
            return self.mapper.read_byte(address);
        }
        Err(invalid_read(address))
    }

    fn write_byte(&mut self, address: u16, value: u8) -> Result<()> {
        if address == OAM_DMA_ADDRESS {
            return self.perform_oam_dma(value);
        }
        if self.ram.is_writable(address) {
            return self.ram.write_byte(address, value);
        }
        if self.ppu.is_writable(address) {
            return self.ppu.write_byte(address, value);
        }
        if self.joypad.is_writable(address) {
            return self.joypad.write_byte(address, value);
        }
        if self.mapper.is_writable(address) {
            return self.mapper.write_byte(address, value);
        }
        Err(invalid_write(address))
    }
}
