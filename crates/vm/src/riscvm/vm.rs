use std::{
    fmt::{self, Debug, Display},
    ops::ControlFlow,
};

use thiserror::Error;

use crate::riscvm::{
    consts::{N_REGS, WORD_SIZE},
    cpu::Cpu,
    disasm::disassemble,
    dispatch::DispatchTable,
    image::FlatImage,
    inst::{ExecutionSnapshot, ExecutionTrace},
    inst_decoder::dispatch_key,
    memory::{Attributes, Memory, MemoryError, MemoryRegion, RegionKind},
    reg::{Registers, SP},
};

pub trait VmProgram {}

/// No program image copied into ROM yet.
#[derive(Debug)]
pub struct Empty {}

impl VmProgram for Empty {}

/// A program image was copied into ROM, the VM can run.
#[derive(Debug)]
pub struct Loaded {
    image_size: usize,
}

impl VmProgram for Loaded {}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error("illegal instruction 0x{word:08x} at pc 0x{pc:08x}")]
    IllegalInstruction { pc: u32, word: u32 },
    #[error("image of {size} bytes does not fit into {capacity} bytes of ROM")]
    ImageTooLarge { size: usize, capacity: u32 },
    #[error("pc 0x{0:08x} is not aligned to an instruction boundary")]
    MisalignedPc(u32),
    #[error("there is no register x{0}")]
    InvalidRegister(u32),
}

/// Construction parameters of a VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// ROM base address, execution starts here.
    pub entry_point: u32,
    pub rom_size: u32,
    pub ram_base: u32,
    pub ram_size: u32,
    /// Translate address 0 to offset 0 of the ROM, for binaries relying on
    /// the legacy translation.
    pub zero_address_alias: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            entry_point: configuration::ROM_BASE,
            rom_size: configuration::ROM_SIZE,
            ram_base: configuration::RAM_BASE,
            ram_size: configuration::RAM_SIZE,
            zero_address_alias: false,
        }
    }
}

/// Why the run loop stopped without a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// The word fetched at `pc` was zero.
    ZeroWord { pc: u32 },
    /// `pc` left the ROM address range.
    PcOutOfRange { pc: u32 },
    /// The step callback asked to stop, `pc` is the next instruction.
    Cancelled { pc: u32 },
}

impl Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::ZeroWord { pc } => write!(f, "zero word at pc 0x{pc:08x}"),
            HaltReason::PcOutOfRange { pc } => write!(f, "pc 0x{pc:08x} outside of ROM"),
            HaltReason::Cancelled { pc } => write!(f, "cancelled before pc 0x{pc:08x}"),
        }
    }
}

/// Outcome of a single fetch/decode/execute iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Executed(ExecutionTrace),
    Halted(HaltReason),
}

#[derive(Debug)]
pub struct Vm<Program: VmProgram> {
    /// 32 general-purpose registers and the program counter.
    /// RISC-Vs calling convention https://riscv.org/wp-content/uploads/2024/12/riscv-calling.pdf:
    /// Register | ABI Name | Description                        | Saver
    /// -------- | -------- | ---------------------------------- | -----
    /// x0       | zero     | Hard-wired zero                    | -
    /// x1       | ra       | Return address                     | Caller
    /// x2       | sp       | Stack pointer                      | Callee
    /// x3       | gp       | Global pointer                     | -
    /// x4       | tp       | Thread pointer                     | -
    /// x5–7     | t0–2     | Temporaries                        | Caller
    /// x8       | s0/fp    | Saved register/frame pointer       | Callee
    /// x9       | s1       | Saved register                     | Callee
    /// x10–11   | a0–1     | Function arguments/return values   | Caller
    /// x12–17   | a2–7     | Function arguments                 | Caller
    /// x18–27   | s2–11    | Saved registers                    | Callee
    /// x28–31   | t3–6     | Temporaries                        | Caller
    pub(crate) cpu: Cpu,

    /// ROM holding the program image and RAM for data and stack.
    pub(crate) memory: Memory,

    pub(crate) dispatch: DispatchTable,

    program: Program,
}

impl<Program: VmProgram> Vm<Program> {
    /// Register read for handlers, `i` is a decoded 5 bit field.
    #[inline]
    pub(crate) fn read_reg(&self, i: u32) -> u32 {
        self.cpu.regs.read(i)
    }

    /// Register write for handlers, writes to `x0` are discarded.
    #[inline]
    pub(crate) fn write_reg(&mut self, i: u32, data: u32) {
        self.cpu.regs.write(i, data)
    }

    pub fn read_register(&self, i: u32) -> Result<u32, VmError> {
        if i as usize >= N_REGS {
            return Err(VmError::InvalidRegister(i));
        }
        Ok(self.read_reg(i))
    }

    pub fn write_register(&mut self, i: u32, value: u32) -> Result<(), VmError> {
        if i as usize >= N_REGS {
            return Err(VmError::InvalidRegister(i));
        }
        self.write_reg(i, value);
        Ok(())
    }

    pub fn registers(&self) -> &Registers {
        &self.cpu.regs
    }

    pub fn pc(&self) -> u32 {
        self.cpu.pc
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.cpu.pc = pc;
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn rom(&self) -> &MemoryRegion {
        &self.memory.rom
    }

    pub fn ram(&self) -> &MemoryRegion {
        &self.memory.ram
    }

    /// The register file in architectural order.
    pub fn dump_registers(&self) -> [u32; N_REGS] {
        self.cpu.regs.snapshot()
    }

    /// The first `words` words of ROM as `(address, word)` pairs, stops early
    /// at the end of ROM.
    pub fn dump_rom(&self, words: usize) -> Vec<(u32, u32)> {
        let rom = &self.memory.rom;
        (0..words)
            .map(|i| rom.base().wrapping_add(i as u32 * WORD_SIZE))
            .map_while(|addr| rom.read_u32(addr).ok().map(|word| (addr, word)))
            .collect()
    }

    // Typed loads into and stores from registers, routed to the region
    // containing `addr`.

    pub fn load_u8(&mut self, addr: u32, rd: u32) -> Result<(), VmError> {
        let value = self.memory.read_u8(addr)? as u32;
        self.write_load(addr, rd, value);
        Ok(())
    }

    pub fn load_u16(&mut self, addr: u32, rd: u32) -> Result<(), VmError> {
        let value = self.memory.read_u16(addr)? as u32;
        self.write_load(addr, rd, value);
        Ok(())
    }

    pub fn load_u32(&mut self, addr: u32, rd: u32) -> Result<(), VmError> {
        let value = self.memory.read_u32(addr)?;
        self.write_load(addr, rd, value);
        Ok(())
    }

    pub fn load_s8(&mut self, addr: u32, rd: u32) -> Result<(), VmError> {
        let value = self.memory.read_s8(addr)? as u32;
        self.write_load(addr, rd, value);
        Ok(())
    }

    pub fn load_s16(&mut self, addr: u32, rd: u32) -> Result<(), VmError> {
        let value = self.memory.read_s16(addr)? as u32;
        self.write_load(addr, rd, value);
        Ok(())
    }

    pub fn load_s32(&mut self, addr: u32, rd: u32) -> Result<(), VmError> {
        let value = self.memory.read_s32(addr)? as u32;
        self.write_load(addr, rd, value);
        Ok(())
    }

    fn write_load(&mut self, addr: u32, rd: u32, value: u32) {
        self.write_reg(rd, value);
        tracing::trace!("\tload x{} = 0x{:x} from 0x{:x}", rd, value, addr);
    }

    pub fn store_u8(&mut self, addr: u32, rs: u32) -> Result<(), VmError> {
        let value = self.read_reg(rs);
        self.memory.write_u8(addr, value as u8)?;
        tracing::trace!("\tstore byte 0x{:x} to 0x{:x}", value as u8, addr);
        Ok(())
    }

    pub fn store_u16(&mut self, addr: u32, rs: u32) -> Result<(), VmError> {
        let value = self.read_reg(rs);
        self.memory.write_u16(addr, value as u16)?;
        tracing::trace!("\tstore half 0x{:x} to 0x{:x}", value as u16, addr);
        Ok(())
    }

    pub fn store_u32(&mut self, addr: u32, rs: u32) -> Result<(), VmError> {
        let value = self.read_reg(rs);
        self.memory.write_u32(addr, value)?;
        tracing::trace!("\tstore word 0x{:x} to 0x{:x}", value, addr);
        Ok(())
    }
}

impl Vm<Empty> {
    /// Allocates ROM and RAM, installs the RV32I handlers, points `sp` at the
    /// top of RAM and `pc` at the ROM base.
    pub fn new(config: VmConfig) -> Result<Self, VmError> {
        let rom = MemoryRegion::new(
            config.entry_point,
            config.rom_size,
            RegionKind::Rom,
            Attributes::READ_ONLY,
        )?
        .with_zero_address_alias(config.zero_address_alias);
        let ram = MemoryRegion::new(
            config.ram_base,
            config.ram_size,
            RegionKind::Ram,
            Attributes::READ_WRITE | Attributes::NO_EXECUTE,
        )?;

        let mut cpu = Cpu::new(rom.base());
        cpu.regs.write(SP, ram.base().wrapping_add(ram.size()));

        tracing::debug!(
            "vm created, rom 0x{:08x}..0x{:08x}, ram 0x{:08x}..0x{:08x}",
            rom.base(),
            rom.end(),
            ram.base(),
            ram.end()
        );

        Ok(Vm {
            cpu,
            memory: Memory { rom, ram },
            dispatch: DispatchTable::rv32i(),
            program: Empty {},
        })
    }

    /// Copies a flat binary to the start of ROM.
    pub fn load_bin(mut self, bin: &[u8]) -> Result<Vm<Loaded>, VmError> {
        let capacity = self.memory.rom.size();
        if bin.len() > capacity as usize {
            return Err(VmError::ImageTooLarge {
                size: bin.len(),
                capacity,
            });
        }

        self.memory.rom.copy_from(0, bin)?;
        tracing::debug!(
            "loaded {} bytes at 0x{:08x}",
            bin.len(),
            self.memory.rom.base()
        );

        Ok(Vm {
            cpu: self.cpu,
            memory: self.memory,
            dispatch: self.dispatch,
            program: Loaded {
                image_size: bin.len(),
            },
        })
    }

    pub fn load_image(self, image: &FlatImage) -> Result<Vm<Loaded>, VmError> {
        self.load_bin(image.bytes())
    }
}

impl Vm<Loaded> {
    /// Size of the loaded program image in bytes.
    pub fn image_size(&self) -> usize {
        self.program.image_size
    }

    /// Runs until the program halts or faults.
    pub fn run(&mut self) -> Result<HaltReason, VmError> {
        self.run_with(|_| ControlFlow::Continue(()))
    }

    /// Runs until the program halts, faults or `on_step` breaks. `on_step`
    /// sees the trace of every executed instruction.
    pub fn run_with<F>(&mut self, mut on_step: F) -> Result<HaltReason, VmError>
    where
        F: FnMut(&ExecutionTrace) -> ControlFlow<()>,
    {
        loop {
            match self.step() {
                Ok(Step::Executed(trace)) => {
                    if on_step(&trace).is_break() {
                        let reason = HaltReason::Cancelled { pc: self.cpu.pc };
                        tracing::info!("execution stopped, {}", reason);
                        return Ok(reason);
                    }
                }
                Ok(Step::Halted(reason)) => {
                    tracing::info!("execution halted, {}", reason);
                    return Ok(reason);
                }
                Err(err) => {
                    tracing::error!("error in step: {}", err);
                    return Err(err);
                }
            }
        }
    }

    /// Fetches the word at `pc`, advances `pc` and executes the word.
    pub fn step(&mut self) -> Result<Step, VmError> {
        let pc = self.cpu.pc;
        // the whole word has to be inside ROM, a trailing partial word is not
        let rom = &self.memory.rom;
        if !rom.contains(pc) || pc as u64 + WORD_SIZE as u64 > rom.end() {
            return Ok(Step::Halted(HaltReason::PcOutOfRange { pc }));
        }
        if pc % WORD_SIZE != 0 {
            return Err(VmError::MisalignedPc(pc));
        }

        let word = self.memory.rom.read_u32(pc)?;
        if word == 0 {
            return Ok(Step::Halted(HaltReason::ZeroWord { pc }));
        }

        let input = self.snapshot();
        self.cpu.pc = pc.wrapping_add(WORD_SIZE);

        let handler = dispatch_key(word)
            .and_then(|key| self.dispatch.lookup(key))
            .ok_or(VmError::IllegalInstruction { pc, word })?;

        tracing::trace!(
            "executing 0x{:x} - 0x{:08x} {}",
            pc,
            word,
            disassemble(word).unwrap_or_default()
        );
        handler(self, word)?;

        Ok(Step::Executed(ExecutionTrace {
            input,
            output: self.snapshot(),
            word,
        }))
    }

    fn snapshot(&self) -> ExecutionSnapshot {
        ExecutionSnapshot {
            pc: self.cpu.pc,
            regs: self.cpu.regs.snapshot(),
        }
    }
}

impl Display for Vm<Loaded> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== RISC-V VM State ===")?;
        writeln!(f, "Registers:")?;

        for i in (0..N_REGS).step_by(4) {
            write!(f, "  ")?;
            for reg_idx in i..i + 4 {
                write!(
                    f,
                    "x{:2}({:>4}): 0x{:08x}  ",
                    reg_idx,
                    Registers::abi_name(reg_idx as u32).unwrap_or("?"),
                    self.cpu.regs.read(reg_idx as u32)
                )?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\nProgram Counter:")?;
        writeln!(f, "  pc: 0x{:08x}", self.cpu.pc)?;

        let rom = &self.memory.rom;
        let ram = &self.memory.ram;
        writeln!(f, "\nMemory:")?;
        for region in [rom, ram] {
            writeln!(
                f,
                "  {} 0x{:08x}..0x{:08x} {}",
                region.kind(),
                region.base(),
                region.end(),
                region.attrs()
            )?;
        }

        writeln!(f, "\nProgram Information:")?;
        writeln!(f, "  Image size: {} bytes", self.image_size())?;

        let words = self.image_size().div_ceil(WORD_SIZE as usize);
        if words > 0 {
            writeln!(f, "\nDisassembled Code:")?;
            for (addr, word) in self.dump_rom(words) {
                match disassemble(word) {
                    Some(text) => writeln!(f, "  0x{:08x}: {:08x}  {}", addr, word, text)?,
                    None => writeln!(f, "  0x{:08x}: {:08x}  .word", addr, word)?,
                }
            }
        }

        Ok(())
    }
}
