//! Memory mappers: the cartridge window's read/write contract at [0x6000, 0xFFFF].
//!
//! Only NROM (mapper id 0) is implemented; the trait is the extension point for
//! future mappers.

use crate::cartridge::Cartridge;
use crate::error::{Error, Result};
use crate::memory::{invalid_read, invalid_write, MemoryPort};

const PRG_RAM_START: u16 = 0x6000;
const PRG_RAM_END: u16 = 0x7FFF;
const PRG_RAM_SIZE: usize = 8 * 1024;
const PRG_ROM_START: u16 = 0x8000;
const PRG_ROM_BANK_SIZE: u16 = 0x4000;

pub fn make_mapper(cartridge: Cartridge) -> Result<Box<dyn Mapper>> {
    let mapper_id = cartridge.header().mapper_id;
    match mapper_id {
        Nrom::ID => Ok(Box::new(Nrom::new(cartridge)?)),
        other => Err(Error::MemoryMapperNotSupported(other)),
    }
}

/// A memory mapper is a [`MemoryPort`] fronting the cartridge's PRG-RAM/PRG-ROM
/// window, plus read/write access to the cartridge's CHR section for the PPU.
pub trait Mapper: MemoryPort {
    fn read_chr_byte(&self, address: u16) -> Option<u8>;
    fn write_chr_byte(&mut self, address: u16, value: u8) -> bool;
}

pub struct Nrom {
    cartridge: Cartridge,
    prg_ram: [u8; PRG_RAM_SIZE],
}

impl Nrom {
    pub const ID: u8 = 0;

    fn new(cartridge: Cartridge) -> Result<Self> {
        let header = cartridge.header();

        if header.num_prg_rom_banks != 1 && header.num_prg_rom_banks != 2 {
            return Err(Error::InvalidCartridgeHeader(format!(
                "NROM must have either 1 or 2 16 KiB PRG-ROM banks, this one has {}",
                header.num_prg_rom_banks
            )));
        }
        if header.num_chr_rom_banks != 1 {
            return Err(Error::InvalidCartridgeHeader(format!(
                "NROM must have a single 8 KiB CHR-ROM bank, this one has {}",
                header.num_chr_rom_banks
            )));
        }
        if header.has_battery_backed_sram {
            return Err(Error::InvalidCartridgeHeader(
                "NROM doesn't support battery-backed SRAM, but this cartridge has it".into(),
            ));
        }

        Ok(Nrom {
            cartridge,
            prg_ram: [0; PRG_RAM_SIZE],
        })
    }

    fn is_prg_ram(address: u16) -> bool {
        (PRG_RAM_START..=PRG_RAM_END).contains(&address)
    }

    /// With a single 16 KiB bank, the upper half [0xC000, 0xFFFF] folds back
    /// onto the same bank so the one bank answers the whole 32 KiB window.
    fn translate_prg_rom(&self, address: u16) -> usize {
        let offset = address - PRG_ROM_START;
        if self.cartridge.header().num_prg_rom_banks == 1 && offset >= PRG_ROM_BANK_SIZE {
            (offset - PRG_ROM_BANK_SIZE) as usize
        } else {
            offset as usize
        }
    }
}

impl MemoryPort for Nrom {
    fn is_readable(&self, address: u16) -> bool {
        Self::is_prg_ram(address) || address >= PRG_ROM_START
    }

    fn is_writable(&self, address: u16) -> bool {
        Self::is_prg_ram(address)
    }

    fn read_byte(&mut self, address: u16) -> Result<u8> {
        if Self::is_prg_ram(address) {
            return Ok(self.prg_ram[(address - PRG_RAM_START) as usize]);
        }
        if address >= PRG_ROM_START {
            let index = self.translate_prg_rom(address);
            return Ok(self.cartridge.prg_rom()[index]);
        }
        Err(invalid_read(address))
    }

    fn write_byte(&mut self, address: u16, value: u8) -> Result<()> {
        if Self::is_prg_ram(address) {
            self.prg_ram[(address - PRG_RAM_START) as usize] = value;
            return Ok(());
        }
        Err(invalid_write(address))
    }
}

impl Mapper for Nrom {
    fn read_chr_byte(&self, address: u16) -> Option<u8> {
        self.cartridge.chr_rom().get(address as usize).copied()
    }

    fn write_chr_byte(&mut self, address: u16, value: u8) -> bool {
        // CHR-RAM (num_chr_rom_banks == 0) would accept writes; NROM always
        // carries exactly one CHR-ROM bank (enforced in `new`), so this is a
        // flat byte array either way and write-through is accepted uniformly,
        // per the open question on CHR-RAM handling.
        match self.cartridge.chr_rom_mut().get_mut(address as usize) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_bytes(prg_banks: u8, chr_banks: u8) -> Vec<u8> {
        let mut bytes = vec![b'N', b'E', b'S', 0x1A, prg_banks, chr_banks, 0, 0];
        bytes.resize(16, 0);
        bytes.resize(16 + prg_banks as usize * 16384 + chr_banks as usize * 8192, 0);
        bytes
    }

    #[test]
    fn single_bank_mirrors_into_upper_half() {
        let mut bytes = rom_bytes(1, 1);
        bytes[16] = 0x42; // first byte of the single PRG-ROM bank
        let cart = Cartridge::from_bytes(&bytes).unwrap();
        let mut mapper = Nrom::new(cart).unwrap();
        assert_eq!(mapper.read_byte(0x8000).unwrap(), 0x42);
        assert_eq!(mapper.read_byte(0xC000).unwrap(), 0x42);
    }

    #[test]
    fn two_banks_map_contiguously() {
        let mut bytes = rom_bytes(2, 1);
        bytes[16] = 0x11;
        bytes[16 + 16384] = 0x22;
        let cart = Cartridge::from_bytes(&bytes).unwrap();
        let mut mapper = Nrom::new(cart).unwrap();
        assert_eq!(mapper.read_byte(0x8000).unwrap(), 0x11);
        assert_eq!(mapper.read_byte(0xC000).unwrap(), 0x22);
    }

    #[test]
    fn prg_ram_is_readable_and_writable() {
        let bytes = rom_bytes(1, 1);
        let cart = Cartridge::from_bytes(&bytes).unwrap();
        let mut mapper = Nrom::new(cart).unwrap();
        mapper.write_byte(0x6000, 0x99).unwrap();
        assert_eq!(mapper.read_byte(0x6000).unwrap(), 0x99);
    }

    #[test]
    fn writing_prg_rom_is_rejected() {
        let bytes = rom_bytes(1, 1);
        let cart = Cartridge::from_bytes(&bytes).unwrap();
        let mut mapper = Nrom::new(cart).unwrap();
        assert!(mapper.write_byte(0x8000, 1).is_err());
    }

    #[test]
    fn unsupported_mapper_id_is_rejected() {
        let mut bytes = rom_bytes(1, 1);
        bytes[6] = 0x10; // mapper id 1 in the low nibble
        let cart = Cartridge::from_bytes(&bytes).unwrap();
        let err = make_mapper(cart).unwrap_err();
        assert!(matches!(err, Error::MemoryMapperNotSupported(1)));
    }
}
