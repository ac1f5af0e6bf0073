//! Top-level `Nes`: the one owner of RAM, cartridge/mapper, PPU, joypad, and
//! CPU. A `Bus` (src/bus.rs) is constructed fresh for each CPU step by
//! borrowing these directly — no shared pointers, no interior mutability, per
//! the ownership model in §5.

use crate::bus::Bus;
use crate::cartridge::Cartridge;
use crate::cpu::{Cpu, InterruptKind};
use crate::error::Result;
use crate::joypad::{ButtonState, JoypadPort};
use crate::mapper::{make_mapper, Mapper};
use crate::ppu::Ppu;
use crate::ram::Ram;

pub struct Nes {
    ram: Ram,
    ppu: Ppu,
    joypad: JoypadPort,
    mapper: Box<dyn Mapper>,
    cpu: Cpu,
}

impl Nes {
    pub fn new(cartridge: Cartridge) -> Result<Self> {
        let mirroring = cartridge.header().mirroring;
        let chr = cartridge.chr_rom().to_vec();
        let mut mapper = make_mapper(cartridge)?;

        let mut ram = Ram::new();
        let mut ppu = Ppu::new(mirroring, &chr);
        let mut joypad = JoypadPort::new();
        let cpu = {
            let mut bus = Bus::new(&mut ram, &mut ppu, &mut joypad, mapper.as_mut());
            Cpu::new(&mut bus)?
        };

        Ok(Nes {
            ram,
            ppu,
            joypad,
            mapper,
            cpu,
        })
    }

    fn bus(&mut self) -> Bus<'_> {
        Bus::new(
            &mut self.ram,
            &mut self.ppu,
            &mut self.joypad,
            self.mapper.as_mut(),
        )
    }

    /// Fetches, decodes, and executes one CPU instruction.
    pub fn step(&mut self) -> Result<()> {
        let mut bus = self.bus();
        self.cpu.execute_instruction(&mut bus)
    }

    pub fn set_joypad1_buttons(&mut self, buttons: ButtonState) {
        self.joypad.set_first_joypad_buttons(buttons);
    }

    /// Marks vblank entry. If the PPU's control register has NMI-on-vblank
    /// enabled, raises NMI on the CPU — the host decides when vblank
    /// boundaries occur (§5), the PPU only reports whether NMI should follow.
    pub fn enter_vblank(&mut self) -> Result<()> {
        let should_nmi = self.ppu.set_vblank(true);
        if should_nmi {
            let mut bus = self.bus();
            self.cpu.hardware_interrupt(&mut bus, InterruptKind::Nmi)?;
        }
        Ok(())
    }

    pub fn leave_vblank(&mut self) {
        self.ppu.set_vblank(false);
    }

    pub fn produce_frame(&self) -> Vec<u8> {
        self.ppu.produce_frame()
    }

    pub fn cpu_pc(&self) -> u16 {
        self.cpu.pc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_bytes() -> Vec<u8> {
        let mut bytes = vec![b'N', b'E', b'S', 0x1A, 1, 1, 0, 0];
        bytes.resize(16 + 16384 + 8192, 0);
        bytes
    }

    #[test]
    fn boots_and_steps_without_error() {
        let cart = Cartridge::from_bytes(&rom_bytes()).unwrap();
        let mut nes = Nes::new(cart).unwrap();
        // Fresh ROM is all zeros, so this decodes to BRK (opcode 0x00) at the
        // reset vector, which is a legal, handled opcode.
        nes.step().unwrap();
    }

    #[test]
    fn vblank_without_nmi_enabled_does_not_touch_pc() {
        let cart = Cartridge::from_bytes(&rom_bytes()).unwrap();
        let mut nes = Nes::new(cart).unwrap();
        let pc_before = nes.cpu_pc();
        nes.enter_vblank().unwrap();
        assert_eq!(nes.cpu_pc(), pc_before);
    }

    #[test]
    fn produce_frame_is_screen_sized() {
        let cart = Cartridge::from_bytes(&rom_bytes()).unwrap();
        let nes = Nes::new(cart).unwrap();
        assert_eq!(nes.produce_frame().len(), 256 * 240);
    }
}
