use crate::riscvm::{
    bits::extract_bits,
    consts::{FUNCT7_ALT, N_REGS, branch},
    inst_decoder::{BType, IShift, IType, JType, RType, SType, UType},
    vm::{Loaded, Vm, VmError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTrace {
    pub input: ExecutionSnapshot,
    pub output: ExecutionSnapshot,
    /// The raw instruction word that was executed.
    pub word: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSnapshot {
    pub pc: u32,
    pub regs: [u32; N_REGS],
}

// Handlers run after the fetch step advanced `pc` past the instruction, so
// `self.cpu.pc` is both the link value and the fall-through address.
// PC-relative targets are computed from `inst_addr()` instead.
impl Vm<Loaded> {
    // --- U/J-type ---
    pub(crate) fn inst_lui(&mut self, word: u32) -> Result<(), VmError> {
        let UType { rd, imm } = UType::from(word);
        self.write_reg(rd, imm as u32);
        tracing::trace!("\tLUI x{} = 0x{:x}", rd, imm);
        Ok(())
    }

    pub(crate) fn inst_auipc(&mut self, word: u32) -> Result<(), VmError> {
        let UType { rd, imm } = UType::from(word);
        let value = self.cpu.inst_addr().wrapping_add(imm as u32);
        self.write_reg(rd, value);
        tracing::trace!("\tAUIPC x{} = 0x{:x}", rd, value);
        Ok(())
    }

    pub(crate) fn inst_jal(&mut self, word: u32) -> Result<(), VmError> {
        let JType { rd, offset } = JType::from(word);
        let link = self.cpu.pc;
        self.cpu.jump_relative(offset);
        self.write_reg(rd, link);
        tracing::trace!("\tJAL link 0x{:x}, new pc 0x{:x}", link, self.cpu.pc);
        Ok(())
    }

    pub(crate) fn inst_jalr(&mut self, word: u32) -> Result<(), VmError> {
        let IType { rd, rs1, imm } = IType::from(word);
        // rs1 has to be read before rd is written, they may be the same register
        let target = self.read_reg(rs1).wrapping_add(imm as u32) & !1;
        let link = self.cpu.pc;
        self.cpu.pc = target;
        self.write_reg(rd, link);
        tracing::trace!("\tJALR link 0x{:x}, new pc 0x{:x}", link, target);
        Ok(())
    }

    // --- B-type ---
    pub(crate) fn inst_branch(&mut self, word: u32) -> Result<(), VmError> {
        let BType {
            rs1,
            rs2,
            funct3,
            offset,
        } = BType::from(word);
        let lhs = self.read_reg(rs1);
        let rhs = self.read_reg(rs2);

        let taken = match funct3 {
            branch::BEQ => lhs == rhs,
            branch::BNE => lhs != rhs,
            branch::BLT => (lhs as i32) < (rhs as i32),
            branch::BGE => (lhs as i32) >= (rhs as i32),
            branch::BLTU => lhs < rhs,
            branch::BGEU => lhs >= rhs,
            _ => {
                return Err(VmError::IllegalInstruction {
                    pc: self.cpu.inst_addr(),
                    word,
                });
            }
        };

        if taken {
            let from = self.cpu.inst_addr();
            self.cpu.jump_relative(offset);
            tracing::trace!("\tbranch taken 0x{:x} -> 0x{:x}", from, self.cpu.pc);
        } else {
            tracing::trace!("\tbranch not taken, continuing at 0x{:x}", self.cpu.pc);
        }
        Ok(())
    }

    // --- Loads and stores ---
    fn load_addr(&self, IType { rs1, imm, .. }: IType) -> u32 {
        self.read_reg(rs1).wrapping_add(imm as u32)
    }

    fn store_addr(&self, SType { rs1, offset, .. }: SType) -> u32 {
        self.read_reg(rs1).wrapping_add(offset as u32)
    }

    pub(crate) fn inst_lb(&mut self, word: u32) -> Result<(), VmError> {
        let args = IType::from(word);
        self.load_s8(self.load_addr(args), args.rd)
    }

    pub(crate) fn inst_lh(&mut self, word: u32) -> Result<(), VmError> {
        let args = IType::from(word);
        self.load_s16(self.load_addr(args), args.rd)
    }

    pub(crate) fn inst_lw(&mut self, word: u32) -> Result<(), VmError> {
        let args = IType::from(word);
        self.load_s32(self.load_addr(args), args.rd)
    }

    pub(crate) fn inst_lbu(&mut self, word: u32) -> Result<(), VmError> {
        let args = IType::from(word);
        self.load_u8(self.load_addr(args), args.rd)
    }

    pub(crate) fn inst_lhu(&mut self, word: u32) -> Result<(), VmError> {
        let args = IType::from(word);
        self.load_u16(self.load_addr(args), args.rd)
    }

    pub(crate) fn inst_sb(&mut self, word: u32) -> Result<(), VmError> {
        let args = SType::from(word);
        self.store_u8(self.store_addr(args), args.rs2)
    }

    pub(crate) fn inst_sh(&mut self, word: u32) -> Result<(), VmError> {
        let args = SType::from(word);
        self.store_u16(self.store_addr(args), args.rs2)
    }

    pub(crate) fn inst_sw(&mut self, word: u32) -> Result<(), VmError> {
        let args = SType::from(word);
        self.store_u32(self.store_addr(args), args.rs2)
    }

    // --- Register-immediate ALU ---
    fn alu_imm(&mut self, word: u32, name: &str, op: impl FnOnce(u32, i32) -> u32) {
        let IType { rd, rs1, imm } = IType::from(word);
        let value = op(self.read_reg(rs1), imm);
        self.write_reg(rd, value);
        tracing::trace!("\t{} x{} = 0x{:x}", name, rd, value);
    }

    pub(crate) fn inst_addi(&mut self, word: u32) -> Result<(), VmError> {
        self.alu_imm(word, "ADDI", |lhs, imm| lhs.wrapping_add(imm as u32));
        Ok(())
    }

    pub(crate) fn inst_slti(&mut self, word: u32) -> Result<(), VmError> {
        self.alu_imm(word, "SLTI", |lhs, imm| ((lhs as i32) < imm) as u32);
        Ok(())
    }

    pub(crate) fn inst_sltiu(&mut self, word: u32) -> Result<(), VmError> {
        // the immediate is sign-extended first, then compared unsigned
        self.alu_imm(word, "SLTIU", |lhs, imm| (lhs < imm as u32) as u32);
        Ok(())
    }

    pub(crate) fn inst_xori(&mut self, word: u32) -> Result<(), VmError> {
        self.alu_imm(word, "XORI", |lhs, imm| lhs ^ imm as u32);
        Ok(())
    }

    pub(crate) fn inst_ori(&mut self, word: u32) -> Result<(), VmError> {
        self.alu_imm(word, "ORI", |lhs, imm| lhs | imm as u32);
        Ok(())
    }

    pub(crate) fn inst_andi(&mut self, word: u32) -> Result<(), VmError> {
        self.alu_imm(word, "ANDI", |lhs, imm| lhs & imm as u32);
        Ok(())
    }

    pub(crate) fn inst_slli(&mut self, word: u32) -> Result<(), VmError> {
        let IShift { rd, rs1, shamt, .. } = IShift::from(word);
        let value = self.read_reg(rs1) << shamt;
        self.write_reg(rd, value);
        tracing::trace!("\tSLLI x{} = 0x{:x}", rd, value);
        Ok(())
    }

    pub(crate) fn inst_srli_srai(&mut self, word: u32) -> Result<(), VmError> {
        let IShift {
            rd,
            rs1,
            shamt,
            funct7,
        } = IShift::from(word);
        let data = self.read_reg(rs1);
        let value = if funct7 == FUNCT7_ALT {
            ((data as i32) >> shamt) as u32
        } else {
            data >> shamt
        };
        self.write_reg(rd, value);
        tracing::trace!(
            "\t{} x{} = 0x{:x}",
            if funct7 == FUNCT7_ALT { "SRAI" } else { "SRLI" },
            rd,
            value
        );
        Ok(())
    }

    // --- Register-register ALU ---
    fn alu_reg(&mut self, word: u32, name: &str, op: impl FnOnce(u32, u32) -> u32) {
        let RType { rd, rs1, rs2, .. } = RType::from(word);
        let lhs = self.read_reg(rs1);
        let rhs = self.read_reg(rs2);
        let value = op(lhs, rhs);
        self.write_reg(rd, value);
        tracing::trace!("\t{} 0x{:x}, 0x{:x} = 0x{:x}", name, lhs, rhs, value);
    }

    pub(crate) fn inst_add_sub(&mut self, word: u32) -> Result<(), VmError> {
        if RType::from(word).funct7 == FUNCT7_ALT {
            self.alu_reg(word, "SUB", u32::wrapping_sub);
        } else {
            self.alu_reg(word, "ADD", u32::wrapping_add);
        }
        Ok(())
    }

    pub(crate) fn inst_sll(&mut self, word: u32) -> Result<(), VmError> {
        self.alu_reg(word, "SLL", |lhs, rhs| lhs << extract_bits(rhs, 0, 5));
        Ok(())
    }

    pub(crate) fn inst_slt(&mut self, word: u32) -> Result<(), VmError> {
        self.alu_reg(word, "SLT", |lhs, rhs| ((lhs as i32) < (rhs as i32)) as u32);
        Ok(())
    }

    pub(crate) fn inst_sltu(&mut self, word: u32) -> Result<(), VmError> {
        self.alu_reg(word, "SLTU", |lhs, rhs| (lhs < rhs) as u32);
        Ok(())
    }

    pub(crate) fn inst_xor(&mut self, word: u32) -> Result<(), VmError> {
        self.alu_reg(word, "XOR", |lhs, rhs| lhs ^ rhs);
        Ok(())
    }

    pub(crate) fn inst_srl_sra(&mut self, word: u32) -> Result<(), VmError> {
        if RType::from(word).funct7 == FUNCT7_ALT {
            self.alu_reg(word, "SRA", |lhs, rhs| {
                ((lhs as i32) >> extract_bits(rhs, 0, 5)) as u32
            });
        } else {
            self.alu_reg(word, "SRL", |lhs, rhs| lhs >> extract_bits(rhs, 0, 5));
        }
        Ok(())
    }

    pub(crate) fn inst_or(&mut self, word: u32) -> Result<(), VmError> {
        self.alu_reg(word, "OR", |lhs, rhs| lhs | rhs);
        Ok(())
    }

    pub(crate) fn inst_and(&mut self, word: u32) -> Result<(), VmError> {
        self.alu_reg(word, "AND", |lhs, rhs| lhs & rhs);
        Ok(())
    }

    // --- System ---
    // A single hart executing in order needs no memory ordering, and there is
    // no trap handling, so both are no-ops.
    pub(crate) fn inst_fence(&mut self, word: u32) -> Result<(), VmError> {
        tracing::trace!("\tFENCE 0x{:08x} ignored", word);
        Ok(())
    }

    pub(crate) fn inst_ecall_ebreak(&mut self, word: u32) -> Result<(), VmError> {
        let name = if extract_bits(word, 20, 12) == 1 {
            "EBREAK"
        } else {
            "ECALL"
        };
        tracing::trace!("\t{} ignored", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::riscvm::{
        reg::{A0, A1, A2, RA, T0, ZERO},
        vm::{Empty, VmConfig},
    };
    use test_log::test;

    const BASE: u32 = 0x1_0000;

    fn vm() -> Vm<Loaded> {
        Vm::<Empty>::new(VmConfig::default())
            .and_then(|vm| vm.load_bin(&[]))
            .expect("default vm should build")
    }

    /// Executes `word` as if it was fetched from `BASE + at`.
    fn exec(vm: &mut Vm<Loaded>, at: u32, word: u32) -> Result<(), VmError> {
        vm.cpu.pc = BASE + at + 4;
        let key = crate::riscvm::inst_decoder::dispatch_key(word).expect("known opcode");
        let handler = vm.dispatch.lookup(key).expect("installed handler");
        handler(vm, word)
    }

    #[test]
    fn auipc_is_relative_to_the_instruction() {
        let mut vm = vm();
        // auipc a0, 0x1
        exec(&mut vm, 8, 0x0000_1517).unwrap();
        assert_eq!(vm.read_reg(A0), BASE + 8 + 0x1000);
    }

    #[test]
    fn jal_links_and_jumps() {
        let mut vm = vm();
        // jal ra, 16
        exec(&mut vm, 4, 0x0100_00ef).unwrap();
        assert_eq!(vm.cpu.pc, BASE + 4 + 16);
        assert_eq!(vm.read_reg(RA), BASE + 8);

        // jal zero, -4
        exec(&mut vm, 8, 0xffdf_f06f).unwrap();
        assert_eq!(vm.cpu.pc, BASE + 4);
        assert_eq!(vm.read_reg(ZERO), 0);
    }

    #[test]
    fn jalr_clears_the_low_bit() {
        let mut vm = vm();
        vm.write_reg(A0, BASE + 0x101);
        // jalr ra, 3(a0)
        exec(&mut vm, 0, 0x0035_00e7).unwrap();
        assert_eq!(vm.cpu.pc, BASE + 0x104);
        assert_eq!(vm.read_reg(RA), BASE + 4);

        // jalr a0, 0(a0) reads a0 before linking into it
        vm.write_reg(A0, BASE + 0x40);
        exec(&mut vm, 0x20, 0x0005_0567).unwrap();
        assert_eq!(vm.cpu.pc, BASE + 0x40);
        assert_eq!(vm.read_reg(A0), BASE + 0x24);
    }

    #[test]
    fn branches() {
        let mut vm = vm();
        vm.write_reg(A0, -1i32 as u32);
        vm.write_reg(A1, 1);

        // blt a0, a1, 8 is taken, -1 < 1 signed
        exec(&mut vm, 0, 0x00b5_4463).unwrap();
        assert_eq!(vm.cpu.pc, BASE + 8);

        // bltu a0, a1, 8 is not taken, 0xffffffff > 1 unsigned
        exec(&mut vm, 0, 0x00b5_6463).unwrap();
        assert_eq!(vm.cpu.pc, BASE + 4);

        // bge a1, a0, -4
        exec(&mut vm, 8, 0xfea5_dee3).unwrap();
        assert_eq!(vm.cpu.pc, BASE + 4);

        // bgeu a0, a1, 8
        exec(&mut vm, 0, 0x00b5_7463).unwrap();
        assert_eq!(vm.cpu.pc, BASE + 8);

        // bne a0, a0, 8 is not taken
        exec(&mut vm, 0, 0x00a5_1463).unwrap();
        assert_eq!(vm.cpu.pc, BASE + 4);
    }

    #[test]
    fn undefined_branch_funct3_is_illegal() {
        let mut vm = vm();
        let word = 0x0000_2463;
        assert!(matches!(
            exec(&mut vm, 12, word),
            Err(VmError::IllegalInstruction { pc, word: w }) if pc == BASE + 12 && w == word
        ));
    }

    #[test]
    fn immediate_alu() {
        let mut vm = vm();
        vm.write_reg(A0, 5);

        // slti a1, a0, -1
        exec(&mut vm, 0, 0xfff5_2593).unwrap();
        assert_eq!(vm.read_reg(A1), 0);
        // sltiu a1, a0, -1, -1 is the largest unsigned value
        exec(&mut vm, 0, 0xfff5_3593).unwrap();
        assert_eq!(vm.read_reg(A1), 1);
        // xori a1, a0, -1
        exec(&mut vm, 0, 0xfff5_4593).unwrap();
        assert_eq!(vm.read_reg(A1), !5);
        // ori a1, a0, 0x10
        exec(&mut vm, 0, 0x0105_6593).unwrap();
        assert_eq!(vm.read_reg(A1), 0x15);
        // andi a1, a0, 4
        exec(&mut vm, 0, 0x0045_7593).unwrap();
        assert_eq!(vm.read_reg(A1), 4);
        // addi a1, a0, -6 wraps
        exec(&mut vm, 0, 0xffa5_0593).unwrap();
        assert_eq!(vm.read_reg(A1), u32::MAX);
    }

    #[test]
    fn shifts_by_immediate() {
        let mut vm = vm();
        vm.write_reg(A0, 0x8000_0010);

        // slli a1, a0, 4
        exec(&mut vm, 0, 0x0045_1593).unwrap();
        assert_eq!(vm.read_reg(A1), 0x0000_0100);
        // srli a1, a0, 4
        exec(&mut vm, 0, 0x0045_5593).unwrap();
        assert_eq!(vm.read_reg(A1), 0x0800_0001);
        // srai a1, a0, 4
        exec(&mut vm, 0, 0x4045_5593).unwrap();
        assert_eq!(vm.read_reg(A1), 0xf800_0001);
    }

    #[test]
    fn register_alu() {
        let mut vm = vm();
        vm.write_reg(A0, 7);
        vm.write_reg(A1, 0xffff_fffd); // -3

        // add a2, a0, a1
        exec(&mut vm, 0, 0x00b5_0633).unwrap();
        assert_eq!(vm.read_reg(A2), 4);
        // sub a2, a0, a1
        exec(&mut vm, 0, 0x40b5_0633).unwrap();
        assert_eq!(vm.read_reg(A2), 10);
        // slt a2, a1, a0
        exec(&mut vm, 0, 0x00a5_a633).unwrap();
        assert_eq!(vm.read_reg(A2), 1);
        // sltu a2, a1, a0
        exec(&mut vm, 0, 0x00a5_b633).unwrap();
        assert_eq!(vm.read_reg(A2), 0);
        // xor a2, a0, a1
        exec(&mut vm, 0, 0x00b5_4633).unwrap();
        assert_eq!(vm.read_reg(A2), 7 ^ 0xffff_fffd);
        // or a2, a0, a1
        exec(&mut vm, 0, 0x00b5_6633).unwrap();
        assert_eq!(vm.read_reg(A2), 0xffff_ffff);
        // and a2, a0, a1
        exec(&mut vm, 0, 0x00b5_7633).unwrap();
        assert_eq!(vm.read_reg(A2), 5);
    }

    #[test]
    fn register_shifts_use_the_low_five_bits() {
        let mut vm = vm();
        vm.write_reg(A0, 0x8000_0001);
        vm.write_reg(A1, 33);

        // sll a2, a0, a1
        exec(&mut vm, 0, 0x00b5_1633).unwrap();
        assert_eq!(vm.read_reg(A2), 0x0000_0002);
        // srl a2, a0, a1
        exec(&mut vm, 0, 0x00b5_5633).unwrap();
        assert_eq!(vm.read_reg(A2), 0x4000_0000);
        // sra a2, a0, a1
        exec(&mut vm, 0, 0x40b5_5633).unwrap();
        assert_eq!(vm.read_reg(A2), 0xc000_0000);
    }

    #[test]
    fn writes_to_x0_are_discarded() {
        let mut vm = vm();
        // addi zero, zero, 5
        exec(&mut vm, 0, 0x0050_0013).unwrap();
        // lui zero, 0x12345
        exec(&mut vm, 0, 0x1234_5037).unwrap();
        // jal zero, 8
        exec(&mut vm, 0, 0x0080_006f).unwrap();
        assert_eq!(vm.read_reg(ZERO), 0);
    }

    #[test]
    fn loads_and_stores() {
        let mut vm = vm();
        let ram = vm.memory.ram.base();
        vm.write_reg(T0, ram);
        vm.write_reg(A0, 0x8081_82f3);

        // sw a0, 4(t0)
        exec(&mut vm, 0, 0x00a2_a223).unwrap();
        // lb a1, 4(t0)
        exec(&mut vm, 0, 0x0042_8583).unwrap();
        assert_eq!(vm.read_reg(A1), 0xffff_fff3);
        // lbu a1, 4(t0)
        exec(&mut vm, 0, 0x0042_c583).unwrap();
        assert_eq!(vm.read_reg(A1), 0xf3);
        // lh a1, 6(t0)
        exec(&mut vm, 0, 0x0062_9583).unwrap();
        assert_eq!(vm.read_reg(A1), 0xffff_8081);
        // lhu a1, 6(t0)
        exec(&mut vm, 0, 0x0062_d583).unwrap();
        assert_eq!(vm.read_reg(A1), 0x8081);

        // sb a0, 0(t0), sh a0, 2(t0)
        exec(&mut vm, 0, 0x00a2_8023).unwrap();
        exec(&mut vm, 0, 0x00a2_9123).unwrap();
        // lw a1, 0(t0)
        exec(&mut vm, 0, 0x0002_a583).unwrap();
        assert_eq!(vm.read_reg(A1), 0x82f3_00f3);
    }

    #[test]
    fn out_of_bounds_load_faults() {
        let mut vm = vm();
        vm.write_reg(T0, 0x4000_0000);
        // lw a1, 0(t0)
        assert!(matches!(
            exec(&mut vm, 0, 0x0002_a583),
            Err(VmError::Memory(_))
        ));
    }

    #[test]
    fn system_instructions_are_no_ops() {
        let mut vm = vm();
        let before = vm.dump_registers();
        exec(&mut vm, 0, 0x0000_0073).unwrap(); // ecall
        exec(&mut vm, 0, 0x0010_0073).unwrap(); // ebreak
        exec(&mut vm, 0, 0x0ff0_000f).unwrap(); // fence
        assert_eq!(vm.dump_registers(), before);
        assert_eq!(vm.cpu.pc, BASE + 4);
    }
}
