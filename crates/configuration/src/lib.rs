#![no_std]

//! Memory layout and machine constants shared by the VM and its host.

/// Number of general purpose registers in RV32I.
pub const N_REGS: usize = 32;

/// Size of an uncompressed instruction and of a machine word, in bytes.
pub const WORD_SIZE: u32 = 4;

/// Default ROM base address, the program image is copied here and execution starts here.
pub const ROM_BASE: u32 = 0x1_0000;
/// Default ROM size in bytes (32 KiB).
pub const ROM_SIZE: u32 = 32 * 1024;

/// RAM base address, placed right above the ROM address space.
pub const RAM_BASE: u32 = 0x2_0000;
/// Default RAM size in bytes (32 KiB).
pub const RAM_SIZE: u32 = 32 * 1024;

/// Initial stack pointer, one past the last RAM byte. The stack grows down.
pub const STACK_TOP: u32 = RAM_BASE + RAM_SIZE;
