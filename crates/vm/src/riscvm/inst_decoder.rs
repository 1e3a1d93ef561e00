//! Bit-exact decoding of RV32I instruction words.
//!
//! Register fields sit at the same position in every format that has them,
//! the immediates are scattered differently per format.

use crate::riscvm::{
    bits::{extract_bits, sign_extend, test_bit},
    consts::opcode,
};

#[inline]
pub const fn opcode(word: u32) -> u32 {
    word & opcode::MASK
}

#[inline]
pub const fn rd(word: u32) -> u32 {
    extract_bits(word, 7, 5)
}

#[inline]
pub const fn funct3(word: u32) -> u32 {
    extract_bits(word, 12, 3)
}

#[inline]
pub const fn rs1(word: u32) -> u32 {
    extract_bits(word, 15, 5)
}

#[inline]
pub const fn rs2(word: u32) -> u32 {
    extract_bits(word, 20, 5)
}

#[inline]
pub const fn funct7(word: u32) -> u32 {
    extract_bits(word, 25, 7)
}

/// Shift amount of SLLI/SRLI/SRAI, the low 5 bits of the I-immediate.
#[inline]
pub const fn shamt(word: u32) -> u32 {
    extract_bits(word, 20, 5)
}

/// U-type: bits 12..=31 stay in place, the low 12 bits are zero.
#[inline]
pub const fn imm_u(word: u32) -> i32 {
    sign_extend(word & 0xffff_f000, 32)
}

/// J-type: imm[20|10:1|11|19:12] in bits 31..=12.
#[inline]
pub const fn imm_j(word: u32) -> i32 {
    let imm = (test_bit(word, 31) << 20)
        | (extract_bits(word, 12, 8) << 12)
        | (test_bit(word, 20) << 11)
        | (extract_bits(word, 21, 10) << 1);
    sign_extend(imm, 21)
}

/// B-type: imm[12|10:5] in bits 31..=25 and imm[4:1|11] in bits 11..=7.
#[inline]
pub const fn imm_b(word: u32) -> i32 {
    let imm = (test_bit(word, 31) << 12)
        | (test_bit(word, 7) << 11)
        | (extract_bits(word, 25, 6) << 5)
        | (extract_bits(word, 8, 4) << 1);
    sign_extend(imm, 13)
}

/// I-type: imm[11:0] in bits 31..=20.
#[inline]
pub const fn imm_i(word: u32) -> i32 {
    sign_extend(extract_bits(word, 20, 12), 12)
}

/// S-type: imm[11:5] in bits 31..=25 and imm[4:0] in bits 11..=7.
#[inline]
pub const fn imm_s(word: u32) -> i32 {
    let imm = extract_bits(word, 7, 5) | (extract_bits(word, 25, 7) << 5);
    sign_extend(imm, 12)
}

/// Derives the dispatch table key of `word`.
///
/// Opcodes shared by several instructions (loads, stores, register and
/// immediate ALU ops) are told apart by `funct3`, which lands above the
/// opcode with its two constant low bits dropped. Every other opcode maps to
/// a single handler. Returns `None` for opcodes outside of RV32I.
pub const fn dispatch_key(word: u32) -> Option<u16> {
    let op = opcode(word);
    match op {
        opcode::LOAD | opcode::OP_IMM | opcode::STORE | opcode::OP => {
            Some(((funct3(word) << 5) | (op >> 2)) as u16)
        }
        opcode::MISC_MEM
        | opcode::SYSTEM
        | opcode::AUIPC
        | opcode::LUI
        | opcode::BRANCH
        | opcode::JALR
        | opcode::JAL => Some((op >> 2) as u16),
        _ => None,
    }
}

// Operands of each format, decoded from the raw word.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RType {
    pub rd: u32,
    pub rs1: u32,
    pub rs2: u32,
    pub funct7: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IType {
    pub rd: u32,
    pub rs1: u32,
    pub imm: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IShift {
    pub rd: u32,
    pub rs1: u32,
    pub shamt: u32,
    pub funct7: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SType {
    pub rs1: u32,
    pub rs2: u32,
    pub offset: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BType {
    pub rs1: u32,
    pub rs2: u32,
    pub funct3: u32,
    pub offset: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UType {
    pub rd: u32,
    pub imm: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JType {
    pub rd: u32,
    pub offset: i32,
}

impl From<u32> for RType {
    fn from(word: u32) -> Self {
        RType {
            rd: rd(word),
            rs1: rs1(word),
            rs2: rs2(word),
            funct7: funct7(word),
        }
    }
}

impl From<u32> for IType {
    fn from(word: u32) -> Self {
        IType {
            rd: rd(word),
            rs1: rs1(word),
            imm: imm_i(word),
        }
    }
}

impl From<u32> for IShift {
    fn from(word: u32) -> Self {
        IShift {
            rd: rd(word),
            rs1: rs1(word),
            shamt: shamt(word),
            funct7: funct7(word),
        }
    }
}

impl From<u32> for SType {
    fn from(word: u32) -> Self {
        SType {
            rs1: rs1(word),
            rs2: rs2(word),
            offset: imm_s(word),
        }
    }
}

impl From<u32> for BType {
    fn from(word: u32) -> Self {
        BType {
            rs1: rs1(word),
            rs2: rs2(word),
            funct3: funct3(word),
            offset: imm_b(word),
        }
    }
}

impl From<u32> for UType {
    fn from(word: u32) -> Self {
        UType {
            rd: rd(word),
            imm: imm_u(word),
        }
    }
}

impl From<u32> for JType {
    fn from(word: u32) -> Self {
        JType {
            rd: rd(word),
            offset: imm_j(word),
        }
    }
}
