use std::fmt::{self, Debug};

use crate::riscvm::{
    consts::{DISPATCH_TABLE_SIZE, key},
    vm::{Loaded, Vm, VmError},
};

/// Executes one instruction word against the VM.
pub type Handler = fn(&mut Vm<Loaded>, u32) -> Result<(), VmError>;

/// Maps dispatch keys to instruction handlers.
///
/// Every VM owns its table, it is filled once at construction and only read
/// afterwards. Empty slots stand for encodings without a handler.
pub struct DispatchTable {
    handlers: Box<[Option<Handler>; DISPATCH_TABLE_SIZE]>,
}

impl DispatchTable {
    pub fn empty() -> DispatchTable {
        DispatchTable {
            handlers: Box::new([None; DISPATCH_TABLE_SIZE]),
        }
    }

    /// Table with a handler for every RV32I instruction.
    pub fn rv32i() -> DispatchTable {
        type LoadedVm = Vm<Loaded>;
        let mut table = DispatchTable::empty();

        table.install(key::LUI, LoadedVm::inst_lui);
        table.install(key::AUIPC, LoadedVm::inst_auipc);
        table.install(key::JAL, LoadedVm::inst_jal);
        table.install(key::JALR, LoadedVm::inst_jalr);
        table.install(key::BRANCH, LoadedVm::inst_branch);

        table.install(key::LB, LoadedVm::inst_lb);
        table.install(key::LH, LoadedVm::inst_lh);
        table.install(key::LW, LoadedVm::inst_lw);
        table.install(key::LBU, LoadedVm::inst_lbu);
        table.install(key::LHU, LoadedVm::inst_lhu);
        table.install(key::SB, LoadedVm::inst_sb);
        table.install(key::SH, LoadedVm::inst_sh);
        table.install(key::SW, LoadedVm::inst_sw);

        table.install(key::ADDI, LoadedVm::inst_addi);
        table.install(key::SLTI, LoadedVm::inst_slti);
        table.install(key::SLTIU, LoadedVm::inst_sltiu);
        table.install(key::XORI, LoadedVm::inst_xori);
        table.install(key::ORI, LoadedVm::inst_ori);
        table.install(key::ANDI, LoadedVm::inst_andi);
        table.install(key::SLLI, LoadedVm::inst_slli);
        table.install(key::SRLI_SRAI, LoadedVm::inst_srli_srai);

        table.install(key::ADD_SUB, LoadedVm::inst_add_sub);
        table.install(key::SLL, LoadedVm::inst_sll);
        table.install(key::SLT, LoadedVm::inst_slt);
        table.install(key::SLTU, LoadedVm::inst_sltu);
        table.install(key::XOR, LoadedVm::inst_xor);
        table.install(key::SRL_SRA, LoadedVm::inst_srl_sra);
        table.install(key::OR, LoadedVm::inst_or);
        table.install(key::AND, LoadedVm::inst_and);

        table.install(key::FENCE, LoadedVm::inst_fence);
        table.install(key::ECALL_EBREAK, LoadedVm::inst_ecall_ebreak);

        table
    }

    /// Installs `handler` under `key`, replacing any previous handler.
    pub fn install(&mut self, key: u16, handler: Handler) {
        match self.handlers.get_mut(key as usize) {
            Some(slot) => *slot = Some(handler),
            None => tracing::warn!("dispatch key 0x{:x} is outside of the table", key),
        }
    }

    pub fn lookup(&self, key: u16) -> Option<Handler> {
        self.handlers.get(key as usize).copied().flatten()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.handlers.iter().filter(|h| h.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("installed", &self.len())
            .finish()
    }
}
