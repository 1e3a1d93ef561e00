pub mod bits;
pub mod consts;
pub mod cpu;
pub mod disasm;
pub mod dispatch;
pub mod image;
pub mod inst;
pub mod inst_decoder;
pub mod memory;
pub mod reg;
pub mod vm;
