//! iNES header parsing and the raw PRG/CHR byte storage of a cartridge.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

const HEADER_SIZE: usize = 16;
const TRAINER_SIZE: usize = 512;
const PRG_ROM_BANK_SIZE: usize = 16 * 1024;
const CHR_ROM_BANK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    FourScreen,
}

#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub num_prg_rom_banks: u8,
    pub num_chr_rom_banks: u8,
    pub mapper_id: u8,
    pub has_battery_backed_sram: bool,
    pub has_trainer: bool,
    pub mirroring: Mirroring,
}

impl Header {
    pub fn has_chr_ram(&self) -> bool {
        self.num_chr_rom_banks == 0
    }

    fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::InvalidCartridgeHeader(
                "header shorter than 16 bytes".into(),
            ));
        }
        if &bytes[0..4] != [b'N', b'E', b'S', 0x1A] {
            return Err(Error::InvalidCartridgeHeader(
                "signature does not read NES<EOF>".into(),
            ));
        }

        let control_byte_one = bytes[6];
        let control_byte_two = bytes[7];

        let mirroring = if control_byte_one & 0b1000 != 0 {
            Mirroring::FourScreen
        } else if control_byte_one & 0b1 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        let mapper_id = (control_byte_two & 0xF0) | (control_byte_one >> 4);

        Ok(Header {
            num_prg_rom_banks: bytes[4],
            num_chr_rom_banks: bytes[5],
            mapper_id,
            has_battery_backed_sram: control_byte_one & 0b10 != 0,
            has_trainer: control_byte_one & 0b100 != 0,
            mirroring,
        })
    }
}

/// The raw bytes of a loaded ROM image, split out into its PRG-ROM and
/// CHR-ROM/RAM sections after the header has been validated.
pub struct Cartridge {
    header: Header,
    prg_rom: Vec<u8>,
    chr_rom: Vec<u8>,
}

impl Cartridge {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).map_err(|_| Error::CantOpenFile(path.to_path_buf()))?;
        log::info!("loaded cartridge from {}", path.display());
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = Header::parse(bytes)?;

        if header.has_trainer {
            return Err(Error::InvalidCartridge(
                "trainer-present cartridges are not supported".into(),
            ));
        }

        let prg_offset = HEADER_SIZE;
        let prg_size = header.num_prg_rom_banks as usize * PRG_ROM_BANK_SIZE;
        let chr_offset = prg_offset + prg_size;
        let chr_size = header.num_chr_rom_banks as usize * CHR_ROM_BANK_SIZE;

        if bytes.len() < chr_offset + chr_size {
            return Err(Error::InvalidCartridgeHeader(
                "file too short for the PRG/CHR sizes its header advertises".into(),
            ));
        }

        log::info!(
            "cartridge header: mapper {} prg_banks={} chr_banks={} mirroring={:?}",
            header.mapper_id,
            header.num_prg_rom_banks,
            header.num_chr_rom_banks,
            header.mirroring
        );

        Ok(Cartridge {
            header,
            prg_rom: bytes[prg_offset..prg_offset + prg_size].to_vec(),
            chr_rom: bytes[chr_offset..chr_offset + chr_size].to_vec(),
        })
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }

    pub fn chr_rom(&self) -> &[u8] {
        &self.chr_rom
    }

    pub fn chr_rom_mut(&mut self) -> &mut Vec<u8> {
        &mut self.chr_rom
    }
}
