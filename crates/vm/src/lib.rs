//! RV32I emulator with a flat ROM holding the program and a RAM for data and
//! stack.

pub mod riscvm;

pub use riscvm::{
    disasm::disassemble,
    image::{FlatImage, ImageLoadingError},
    inst::{ExecutionSnapshot, ExecutionTrace},
    memory::{Attributes, MemoryError, RegionKind},
    vm::{Empty, HaltReason, Loaded, Step, Vm, VmConfig, VmError},
};
