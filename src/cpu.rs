//! The 6502 interpreter: registers, flags, stack, interrupts, and the
//! addressing-mode x operation instruction decoder over the official
//! opcode set.

use crate::bits::{combine_bytes, is_negative, sign_extend, split_bytes};
use crate::bus::Bus;
use crate::error::{Error, Result};
use crate::memory::MemoryPort;
use crate::opcodes::{AddressingMode, Operation, INSTRUCTIONS};

use bitflags::bitflags;

bitflags! {
    pub struct ProcessorStatus: u8 {
        const CARRY             = 0b0000_0001;
        const ZERO              = 0b0000_0010;
        const INTERRUPT_DISABLE = 0b0000_0100;
        const DECIMAL           = 0b0000_1000;
        const BREAK             = 0b0001_0000;
        const UNUSED            = 0b0010_0000;
        const OVERFLOW          = 0b0100_0000;
        const NEGATIVE          = 0b1000_0000;
    }
}

const STACK_BASE: u16 = 0x0100;
const NMI_VECTOR: u16 = 0xFFFA;
const RESET_VECTOR: u16 = 0xFFFC;
const IRQ_VECTOR: u16 = 0xFFFE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptKind {
    Reset,
    Nmi,
    Irq,
}

fn addressing_size(mode: AddressingMode) -> u16 {
    use AddressingMode::*;
    match mode {
        Implied | Accumulator => 1,
        Immediate | ZeroPage | ZeroPageX | ZeroPageY | IndirectX | IndirectY | Relative => 2,
        Absolute | AbsoluteX | AbsoluteY | Indirect => 3,
    }
}

/// Forces bit 5 on and drops bit 4, per the pull-from-stack invariant in
/// the data model: every value that lands in `p` from the stack is masked
/// this way, whether it arrived via PLP or RTI.
fn mask_pulled_status(value: u8) -> ProcessorStatus {
    let mut flags = ProcessorStatus::from_bits_truncate(value);
    flags.remove(ProcessorStatus::BREAK);
    flags.insert(ProcessorStatus::UNUSED);
    flags
}

pub struct Cpu {
    pub pc: u16,
    pub sp: u8,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub p: ProcessorStatus,
}

impl Cpu {
    /// Boots straight into the reset state: `sp = 0xFF`, `p` with only the
    /// unused bit set, registers zeroed, `pc` from the reset vector.
    pub fn new(bus: &mut Bus) -> Result<Self> {
        let mut cpu = Cpu {
            pc: 0,
            sp: 0xFF,
            a: 0,
            x: 0,
            y: 0,
            p: ProcessorStatus::UNUSED,
        };
        cpu.hardware_interrupt(bus, InterruptKind::Reset)?;
        Ok(cpu)
    }

    pub fn hardware_interrupt(&mut self, bus: &mut Bus, kind: InterruptKind) -> Result<()> {
        match kind {
            InterruptKind::Reset => {
                self.sp = 0xFF;
                self.a = 0;
                self.x = 0;
                self.y = 0;
                self.p = ProcessorStatus::UNUSED;
                self.pc = bus.read_pointer(RESET_VECTOR)?;
            }
            InterruptKind::Nmi => {
                self.push_pointer(bus, self.pc)?;
                self.push_byte(bus, (self.p | ProcessorStatus::UNUSED).bits())?;
                self.p.insert(ProcessorStatus::INTERRUPT_DISABLE);
                self.pc = bus.read_pointer(NMI_VECTOR)?;
            }
            InterruptKind::Irq => {
                if !self.p.contains(ProcessorStatus::INTERRUPT_DISABLE) {
                    self.push_pointer(bus, self.pc)?;
                    self.push_byte(bus, (self.p | ProcessorStatus::UNUSED).bits())?;
                    self.p.insert(ProcessorStatus::INTERRUPT_DISABLE);
                    self.pc = bus.read_pointer(IRQ_VECTOR)?;
                }
            }
        }
        Ok(())
    }

    fn push_byte(&mut self, bus: &mut Bus, value: u8) -> Result<()> {
        bus.write_byte(STACK_BASE + self.sp as u16, value)?;
        self.sp = self.sp.wrapping_sub(1);
        Ok(())
    }

    fn pull_byte(&mut self, bus: &mut Bus) -> Result<u8> {
        self.sp = self.sp.wrapping_add(1);
        bus.read_byte(STACK_BASE + self.sp as u16)
    }

    fn push_pointer(&mut self, bus: &mut Bus, value: u16) -> Result<()> {
        let (low, high) = split_bytes(value);
        self.push_byte(bus, high)?;
        self.push_byte(bus, low)?;
        Ok(())
    }

    fn pull_pointer(&mut self, bus: &mut Bus) -> Result<u16> {
        let low = self.pull_byte(bus)?;
        let high = self.pull_byte(bus)?;
        Ok(combine_bytes(low, high))
    }

    fn update_zero_negative(&mut self, value: u8) {
        self.p.set(ProcessorStatus::ZERO, value == 0);
        self.p.set(ProcessorStatus::NEGATIVE, is_negative(value));
    }

    fn compare(&mut self, register: u8, operand: u8) {
        self.p.set(ProcessorStatus::CARRY, register >= operand);
        self.update_zero_negative(register.wrapping_sub(operand));
    }

    fn adc(&mut self, operand: u8) {
        let carry_in = self.p.contains(ProcessorStatus::CARRY) as u16;
        let sum = self.a as u16 + operand as u16 + carry_in;
        let result = sum as u8;
        self.p.set(ProcessorStatus::CARRY, sum > 0xFF);
        let overflow = (!(self.a ^ operand) & (self.a ^ result) & 0x80) != 0;
        self.p.set(ProcessorStatus::OVERFLOW, overflow);
        self.a = result;
        self.update_zero_negative(self.a);
    }

    /// SBC is ADC against the bitwise complement of the operand: the carry
    /// and overflow arithmetic fall out identically, so there is no
    /// separate borrow path to get wrong.
    fn sbc(&mut self, operand: u8) {
        self.adc(!operand);
    }

    fn asl(&mut self, value: u8) -> u8 {
        self.p.set(ProcessorStatus::CARRY, is_negative(value));
        let result = value << 1;
        self.update_zero_negative(result);
        result
    }

    fn lsr(&mut self, value: u8) -> u8 {
        self.p.set(ProcessorStatus::CARRY, value & 1 == 1);
        let result = value >> 1;
        self.update_zero_negative(result);
        result
    }

    fn rol(&mut self, value: u8) -> u8 {
        let carry_in = self.p.contains(ProcessorStatus::CARRY) as u8;
        self.p.set(ProcessorStatus::CARRY, is_negative(value));
        let result = (value << 1) | carry_in;
        self.update_zero_negative(result);
        result
    }

    fn ror(&mut self, value: u8) -> u8 {
        let carry_in = self.p.contains(ProcessorStatus::CARRY) as u8;
        self.p.set(ProcessorStatus::CARRY, value & 1 == 1);
        let result = (value >> 1) | (carry_in << 7);
        self.update_zero_negative(result);
        result
    }

    fn branch_if(&mut self, condition: bool, target: u16) {
        if condition {
            self.pc = target;
        }
    }

    /// Resolves the effective address for `mode` using the bytes at the
    /// current `pc`, without mutating `pc` itself. `None` for modes with no
    /// memory operand (implied, accumulator).
    fn effective_address(&self, bus: &mut Bus, mode: AddressingMode) -> Result<Option<u16>> {
        use AddressingMode::*;
        let pc = self.pc;
        match mode {
            Implied | Accumulator => Ok(None),
            Immediate => Ok(Some(pc.wrapping_add(1))),
            ZeroPage => Ok(Some(bus.read_byte(pc.wrapping_add(1))? as u16)),
            ZeroPageX => {
                let base = bus.read_byte(pc.wrapping_add(1))?;
                Ok(Some(base.wrapping_add(self.x) as u16))
            }
            ZeroPageY => {
                let base = bus.read_byte(pc.wrapping_add(1))?;
                Ok(Some(base.wrapping_add(self.y) as u16))
            }
            Absolute => Ok(Some(bus.read_pointer(pc.wrapping_add(1))?)),
            AbsoluteX => {
                let base = bus.read_pointer(pc.wrapping_add(1))?;
                Ok(Some(base.wrapping_add(self.x as u16)))
            }
            AbsoluteY => {
                let base = bus.read_pointer(pc.wrapping_add(1))?;
                Ok(Some(base.wrapping_add(self.y as u16)))
            }
            Indirect => Ok(Some(bus.deref_pointer(pc.wrapping_add(1))?)),
            IndirectX => {
                let zp = bus.read_byte(pc.wrapping_add(1))?.wrapping_add(self.x);
                let low = bus.read_byte(zp as u16)?;
                let high = bus.read_byte(zp.wrapping_add(1) as u16)?;
                Ok(Some(combine_bytes(low, high)))
            }
            IndirectY => {
                let zp = bus.read_byte(pc.wrapping_add(1))?;
                let low = bus.read_byte(zp as u16)?;
                let high = bus.read_byte(zp.wrapping_add(1) as u16)?;
                let base = combine_bytes(low, high);
                Ok(Some(base.wrapping_add(self.y as u16)))
            }
            Relative => {
                let offset = bus.read_byte(pc.wrapping_add(1))?;
                let target = pc.wrapping_add(2).wrapping_add(sign_extend(offset));
                Ok(Some(target))
            }
        }
    }

    /// Fetches, decodes, and executes one instruction. On an unknown opcode
    /// `pc` is left untouched, matching the "raise; do not advance" policy.
    pub fn execute_instruction(&mut self, bus: &mut Bus) -> Result<()> {
        let opcode = bus.read_byte(self.pc)?;
        let instruction = INSTRUCTIONS[opcode as usize];
        if instruction.1 == Operation::XXX {
            return Err(Error::UnknownOpcode(opcode));
        }

        let mode = instruction.2;
        let address = self.effective_address(bus, mode)?;
        self.pc = self.pc.wrapping_add(addressing_size(mode));

        self.dispatch(bus, instruction.1, address)
    }

    fn dispatch(
        &mut self,
        bus: &mut Bus,
        operation: Operation,
        address: Option<u16>,
    ) -> Result<()> {
        use Operation::*;
        match operation {
            ADC => self.adc(bus.read_byte(address.unwrap())?),
            SBC => self.sbc(bus.read_byte(address.unwrap())?),
            AND => {
                self.a &= bus.read_byte(address.unwrap())?;
                self.update_zero_negative(self.a);
            }
            ORA => {
                self.a |= bus.read_byte(address.unwrap())?;
                self.update_zero_negative(self.a);
            }
            EOR => {
                self.a ^= bus.read_byte(address.unwrap())?;
                self.update_zero_negative(self.a);
            }
            ASL | LSR | ROL | ROR => {
                let value = match address {
                    Some(addr) => bus.read_byte(addr)?,
                    None => self.a,
                };
                let result = match operation {
                    ASL => self.asl(value),
                    LSR => self.lsr(value),
                    ROL => self.rol(value),
                    ROR => self.ror(value),
                    _ => unreachable!(),
                };
                match address {
                    Some(addr) => bus.write_byte(addr, result)?,
                    None => self.a = result,
                }
            }
            INC => {
                let value = bus.read_byte(address.unwrap())?.wrapping_add(1);
                self.update_zero_negative(value);
                bus.write_byte(address.unwrap(), value)?;
            }
            DEC => {
                let value = bus.read_byte(address.unwrap())?.wrapping_sub(1);
                self.update_zero_negative(value);
                bus.write_byte(address.unwrap(), value)?;
            }
            INX => {
                self.x = self.x.wrapping_add(1);
                self.update_zero_negative(self.x);
            }
            INY => {
                self.y = self.y.wrapping_add(1);
                self.update_zero_negative(self.y);
            }
            DEX => {
                self.x = self.x.wrapping_sub(1);
                self.update_zero_negative(self.x);
            }
            DEY => {
                self.y = self.y.wrapping_sub(1);
                self.update_zero_negative(self.y);
            }
            LDA => {
                self.a = bus.read_byte(address.unwrap())?;
                self.update_zero_negative(self.a);
            }
            LDX => {
                self.x = bus.read_byte(address.unwrap())?;
                self.update_zero_negative(self.x);
            }
            LDY => {
                self.y = bus.read_byte(address.unwrap())?;
                self.update_zero_negative(self.y);
            }
            STA => bus.write_byte(address.unwrap(), self.a)?,
            STX => bus.write_byte(address.unwrap(), self.x)?,
            STY => bus.write_byte(address.unwrap(), self.y)?,
            SEC => self.p.insert(ProcessorStatus::CARRY),
            SED => self.p.insert(ProcessorStatus::DECIMAL),
            SEI => self.p.insert(ProcessorStatus::INTERRUPT_DISABLE),
            CLC => self.p.remove(ProcessorStatus::CARRY),
            CLD => self.p.remove(ProcessorStatus::DECIMAL),
            CLI => self.p.remove(ProcessorStatus::INTERRUPT_DISABLE),
            CLV => self.p.remove(ProcessorStatus::OVERFLOW),
            CMP => self.compare(self.a, bus.read_byte(address.unwrap())?),
            CPX => self.compare(self.x, bus.read_byte(address.unwrap())?),
            CPY => self.compare(self.y, bus.read_byte(address.unwrap())?),
            JMP => self.pc = address.unwrap(),
            JSR => {
                let return_address = self.pc.wrapping_sub(1);
                self.push_pointer(bus, return_address)?;
                self.pc = address.unwrap();
            }
            RTS => self.pc = self.pull_pointer(bus)?.wrapping_add(1),
            RTI => {
                let status = self.pull_byte(bus)?;
                self.p = mask_pulled_status(status);
                self.pc = self.pull_pointer(bus)?;
            }
            BCC => self.branch_if(!self.p.contains(ProcessorStatus::CARRY), address.unwrap()),
            BCS => self.branch_if(self.p.contains(ProcessorStatus::CARRY), address.unwrap()),
            BEQ => self.branch_if(self.p.contains(ProcessorStatus::ZERO), address.unwrap()),
            BNE => self.branch_if(!self.p.contains(ProcessorStatus::ZERO), address.unwrap()),
            BMI => self.branch_if(self.p.contains(ProcessorStatus::NEGATIVE), address.unwrap()),
            BPL => self.branch_if(!self.p.contains(ProcessorStatus::NEGATIVE), address.unwrap()),
            BVC => self.branch_if(!self.p.contains(ProcessorStatus::OVERFLOW), address.unwrap()),
            BVS => self.branch_if(self.p.contains(ProcessorStatus::OVERFLOW), address.unwrap()),
            PHA => self.push_byte(bus, self.a)?,
            PHP => self.push_byte(bus, self.p.bits())?,
            PLA => {
                self.a = self.pull_byte(bus)?;
                self.update_zero_negative(self.a);
            }
            PLP => {
                let status = self.pull_byte(bus)?;
                self.p = mask_pulled_status(status);
            }
            TAX => {
                self.x = self.a;
                self.update_zero_negative(self.x);
            }
            TAY => {
                self.y = self.a;
                self.update_zero_negative(self.y);
            }
            TSX => {
                self.x = self.sp;
                self.update_zero_negative(self.x);
            }
            TXA => {
                self.a = self.x;
                self.update_zero_negative(self.a);
            }
            TXS => self.sp = self.x,
            TYA => {
                self.a = self.y;
                self.update_zero_negative(self.a);
            }
            BRK => {
                self.push_pointer(bus, self.pc)?;
                self.push_byte(
                    bus,
                    (self.p | ProcessorStatus::BREAK | ProcessorStatus::UNUSED).bits(),
                )?;
                self.p.insert(ProcessorStatus::INTERRUPT_DISABLE);
                self.pc = bus.read_pointer(IRQ_VECTOR)?;
            }
            BIT => {
                let value = bus.read_byte(address.unwrap())?;
                self.p.set(ProcessorStatus::ZERO, self.a & value == 0);
                self.p
                    .set(ProcessorStatus::OVERFLOW, value & 0b0100_0000 != 0);
                self.p.set(ProcessorStatus::NEGATIVE, is_negative(value));
            }
            NOP => {}
            XXX => unreachable!("decoded before dispatch"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::{Cartridge, Mirroring};
    use crate::joypad::JoypadPort;
    use crate::mapper::{make_mapper, Mapper};
    use crate::ppu::Ppu;
    use crate::ram::Ram;

    const PROGRAM_START: u16 = 0x0600;

    /// A harness owning every device a `Bus` needs to borrow, with a program
    /// loaded at 0x0600 and the reset vector pointed there via the
    /// cartridge's own PRG-ROM bytes.
    struct Harness {
        ram: Ram,
        ppu: Ppu,
        joypad: JoypadPort,
        mapper: Box<dyn Mapper>,
        cpu: Cpu,
    }

    impl Harness {
        fn new(program: &[u8]) -> Self {
            let mut ram = Ram::new();
            for (i, &byte) in program.iter().enumerate() {
                ram.write_byte(PROGRAM_START + i as u16, byte).unwrap();
            }

            let mut rom = vec![b'N', b'E', b'S', 0x1A, 1, 1, 0, 0];
            rom.resize(16 + 16384 + 8192, 0);
            let prg_start = 16;
            rom[prg_start + 0x3FFC] = (PROGRAM_START & 0xFF) as u8;
            rom[prg_start + 0x3FFD] = (PROGRAM_START >> 8) as u8;
            let cart = Cartridge::from_bytes(&rom).unwrap();
            let mapper = make_mapper(cart).unwrap();
            let ppu = Ppu::new(Mirroring::Horizontal, &[]);
            let joypad = JoypadPort::new();

            let mut harness = Harness {
                ram,
                ppu,
                joypad,
                mapper,
                cpu: Cpu {
                    pc: 0,
                    sp: 0xFF,
                    a: 0,
                    x: 0,
                    y: 0,
                    p: ProcessorStatus::UNUSED,
                },
            };
            let cpu = {
                let mut bus = harness.bus();
                Cpu::new(&mut bus).unwrap()
            };
            harness.cpu = cpu;
            harness
        }

        fn bus(&mut self) -> Bus<'_> {
            Bus::new(
                &mut self.ram,
                &mut self.ppu,
                &mut self.joypad,
                self.mapper.as_mut(),
            )
        }

        fn run_until(&mut self, end_pc: u16) {
            while self.cpu.pc != end_pc {
                let mut bus = self.bus();
                self.cpu.execute_instruction(&mut bus).unwrap();
            }
        }

        fn read(&mut self, address: u16) -> u8 {
            let mut bus = self.bus();
            bus.read_byte(address).unwrap()
        }
    }

    #[test]
    fn scenario_a_loads() {
        let program = [0xA9, 0x01, 0xA2, 0x02, 0xA0, 0x03];
        let mut harness = Harness::new(&program);
        harness.run_until(PROGRAM_START + program.len() as u16);
        assert_eq!(harness.cpu.a, 0x01);
        assert_eq!(harness.cpu.x, 0x02);
        assert_eq!(harness.cpu.y, 0x03);
        assert_eq!(harness.cpu.p.bits(), 0x20);
        assert_eq!(harness.cpu.sp, 0xFF);
        assert_eq!(harness.cpu.pc, 0x0606);
    }

    #[test]
    fn scenario_b_push_pull() {
        let program = [0xA9, 0x11, 0x48, 0xA9, 0x00, 0x48, 0x08, 0x68, 0x28];
        let mut harness = Harness::new(&program);
        harness.run_until(PROGRAM_START + program.len() as u16);
        assert_eq!(harness.cpu.a, 0x22);
        assert_eq!(harness.cpu.p.bits(), 0x20);
        assert_eq!(harness.cpu.sp, 0xFE);
        assert_eq!(harness.read(0x01FF), 0x11);
        assert_eq!(harness.read(0x01FD), 0x22);
    }

    #[test]
    fn scenario_c_jmp_skips_dead_code() {
        let program = [0x4C, 0x05, 0x06, 0xA9, 0x01, 0xA9, 0x00];
        let mut harness = Harness::new(&program);
        harness.run_until(PROGRAM_START + program.len() as u16);
        assert_eq!(harness.cpu.a, 0x00);
        assert_eq!(harness.cpu.pc, 0x0607);
    }

    #[test]
    fn scenario_d_jsr_rts_round_trip() {
        let program = [
            0xA9, 0xFF, 0x85, 0x00, 0x4C, 0x0E, 0x06, 0xE6, 0x00, 0xE6, 0x01, 0xE6, 0x02, 0x60,
            0x08, 0x20, 0x07, 0x06, 0x08, 0x20, 0x07, 0x06, 0x08, 0x20, 0x1A, 0x06, 0xEA,
        ];
        let mut harness = Harness::new(&program);
        harness.run_until(PROGRAM_START + program.len() as u16);
        assert_eq!(harness.read(0x0000), 0x01);
        assert_eq!(harness.read(0x0001), 0x02);
        assert_eq!(harness.read(0x0002), 0x02);
        assert_eq!(harness.cpu.sp, 0xFA);
    }

    #[test]
    fn scenario_e_dec_and_flags() {
        let program = [
            0xA9, 0x42, 0x85, 0x05, 0x8D, 0x00, 0x04, 0x8D, 0x01, 0x04, 0xC6, 0x00, 0x08, 0xA2,
            0x02, 0xD6, 0x03, 0x08, 0xD6, 0x03, 0x08, 0xCE, 0x00, 0x04, 0x08, 0xDE, 0xFD, 0x03,
            0x08,
        ];
        let mut harness = Harness::new(&program);
        harness.run_until(PROGRAM_START + program.len() as u16);
        assert_eq!(harness.read(0x0000), 0xFF);
        assert_eq!(harness.read(0x0400), 0x41);
        assert_eq!(harness.read(0x0401), 0x42);
        assert_eq!(harness.cpu.p.bits(), 0xA0);
    }

    #[test]
    fn scenario_f_branch_taken_skips_immediate_load() {
        let program = [0x38, 0xB0, 0x02, 0xA9, 0xFF, 0x00];
        let mut harness = Harness::new(&program);
        {
            let mut bus = harness.bus();
            harness.cpu.execute_instruction(&mut bus).unwrap(); // SEC
        }
        assert!(harness.cpu.p.contains(ProcessorStatus::CARRY));
        {
            let mut bus = harness.bus();
            harness.cpu.execute_instruction(&mut bus).unwrap(); // BCS +2, taken
        }
        assert_eq!(harness.cpu.pc, 0x0605);
        assert_eq!(harness.cpu.a, 0x00);
    }

    #[test]
    fn unknown_opcode_does_not_advance_pc() {
        let mut harness = Harness::new(&[0x02]);
        let pc_before = harness.cpu.pc;
        let result = {
            let mut bus = harness.bus();
            harness.cpu.execute_instruction(&mut bus)
        };
        assert!(matches!(result, Err(Error::UnknownOpcode(0x02))));
        assert_eq!(harness.cpu.pc, pc_before);
    }

    #[test]
    fn adc_sets_carry_and_overflow_on_signed_boundary() {
        // 0x7F + 0x01 = 0x80: no unsigned carry, but signed overflow.
        let mut harness = Harness::new(&[0xA9, 0x7F, 0x69, 0x01]);
        harness.run_until(PROGRAM_START + 4);
        assert_eq!(harness.cpu.a, 0x80);
        assert!(!harness.cpu.p.contains(ProcessorStatus::CARRY));
        assert!(harness.cpu.p.contains(ProcessorStatus::OVERFLOW));
        assert!(harness.cpu.p.contains(ProcessorStatus::NEGATIVE));
    }
}
