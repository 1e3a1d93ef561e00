pub use configuration::{N_REGS, WORD_SIZE};

/// Number of slots in the dispatch table, `funct3` (3 bits) above the
/// opcode without its two fixed low bits (5 bits).
pub const DISPATCH_TABLE_SIZE: usize = 512;

/// `funct7` value selecting SUB, SRA and SRAI over ADD, SRL and SRLI.
pub const FUNCT7_ALT: u32 = 0x20;

/// Major opcodes (bits 0..=6 of the instruction word).
pub mod opcode {
    pub const MASK: u32 = 0x7f;

    pub const LOAD: u32 = 0x03;
    pub const MISC_MEM: u32 = 0x0f;
    pub const OP_IMM: u32 = 0x13;
    pub const AUIPC: u32 = 0x17;
    pub const STORE: u32 = 0x23;
    pub const OP: u32 = 0x33;
    pub const LUI: u32 = 0x37;
    pub const BRANCH: u32 = 0x63;
    pub const JALR: u32 = 0x67;
    pub const JAL: u32 = 0x6f;
    pub const SYSTEM: u32 = 0x73;
}

/// Dispatch keys, `(funct3 << 5) | (opcode >> 2)` for the opcodes shared by
/// several instructions and `opcode >> 2` for the rest.
pub mod key {
    // U/J-type
    pub const LUI: u16 = 0x0d;
    pub const AUIPC: u16 = 0x05;
    pub const JAL: u16 = 0x1b;

    // R-type, shifts by immediate share the OP_IMM opcode
    pub const SLLI: u16 = 0x24;
    pub const SRLI_SRAI: u16 = 0xa4;
    pub const ADD_SUB: u16 = 0x0c;
    pub const SLL: u16 = 0x2c;
    pub const SLT: u16 = 0x4c;
    pub const SLTU: u16 = 0x6c;
    pub const XOR: u16 = 0x8c;
    pub const SRL_SRA: u16 = 0xac;
    pub const OR: u16 = 0xcc;
    pub const AND: u16 = 0xec;

    // I/S/B-type
    pub const JALR: u16 = 0x19;
    pub const BRANCH: u16 = 0x18;
    pub const LB: u16 = 0x00;
    pub const LH: u16 = 0x20;
    pub const LW: u16 = 0x40;
    pub const LBU: u16 = 0x80;
    pub const LHU: u16 = 0xa0;
    pub const SB: u16 = 0x08;
    pub const SH: u16 = 0x28;
    pub const SW: u16 = 0x48;
    pub const ADDI: u16 = 0x04;
    pub const SLTI: u16 = 0x44;
    pub const SLTIU: u16 = 0x64;
    pub const XORI: u16 = 0x84;
    pub const ORI: u16 = 0xc4;
    pub const ANDI: u16 = 0xe4;

    pub const FENCE: u16 = 0x03;
    pub const ECALL_EBREAK: u16 = 0x1c;
}

/// `funct3` values of the branch instructions.
pub mod branch {
    pub const BEQ: u32 = 0b000;
    pub const BNE: u32 = 0b001;
    pub const BLT: u32 = 0b100;
    pub const BGE: u32 = 0b101;
    pub const BLTU: u32 = 0b110;
    pub const BGEU: u32 = 0b111;
}
