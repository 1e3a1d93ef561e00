use crate::riscvm::{consts::WORD_SIZE, reg::Registers};

/// Architectural state of a single hart.
#[derive(Debug, Clone, Default)]
pub struct Cpu {
    pub regs: Registers,
    /// Address of the next instruction to fetch. While a handler runs it
    /// already points past the instruction being executed.
    pub pc: u32,
}

impl Cpu {
    pub fn new(pc: u32) -> Self {
        Cpu {
            regs: Registers::new(),
            pc,
        }
    }

    /// Address of the instruction currently executing, the fetch step has
    /// already advanced `pc` past it.
    #[inline]
    pub fn inst_addr(&self) -> u32 {
        self.pc.wrapping_sub(WORD_SIZE)
    }

    /// Sets `pc` to `inst_addr() + offset`.
    #[inline]
    pub fn jump_relative(&mut self, offset: i32) {
        self.pc = self.inst_addr().wrapping_add(offset as u32);
    }
}
