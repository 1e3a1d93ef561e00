use crate::riscvm::consts::N_REGS;

// Architectural register numbers by ABI name.
pub const ZERO: u32 = 0;
pub const RA: u32 = 1;
pub const SP: u32 = 2;
pub const GP: u32 = 3;
pub const TP: u32 = 4;
pub const T0: u32 = 5;
pub const T1: u32 = 6;
pub const T2: u32 = 7;
pub const S0: u32 = 8;
pub const S1: u32 = 9;
pub const A0: u32 = 10;
pub const A1: u32 = 11;
pub const A2: u32 = 12;
pub const A3: u32 = 13;
pub const A4: u32 = 14;
pub const A5: u32 = 15;
pub const A6: u32 = 16;
pub const A7: u32 = 17;
pub const S2: u32 = 18;
pub const S3: u32 = 19;
pub const S4: u32 = 20;
pub const S5: u32 = 21;
pub const S6: u32 = 22;
pub const S7: u32 = 23;
pub const S8: u32 = 24;
pub const S9: u32 = 25;
pub const S10: u32 = 26;
pub const S11: u32 = 27;
pub const T3: u32 = 28;
pub const T4: u32 = 29;
pub const T5: u32 = 30;
pub const T6: u32 = 31;

/// ABI names in architectural order, see
/// https://riscv.org/wp-content/uploads/2024/12/riscv-calling.pdf
#[rustfmt::skip]
pub const ABI_NAMES: [&str; N_REGS] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2",
    "s0", "s1", "a0", "a1", "a2", "a3", "a4", "a5",
    "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7",
    "s8", "s9", "s10", "s11", "t3", "t4", "t5", "t6",
];

/// The 32 general purpose registers. `x0` reads as zero no matter what was
/// written to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registers {
    regs: [u32; N_REGS],
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads register `i`, `i` must be below 32.
    #[inline]
    pub(crate) fn read(&self, i: u32) -> u32 {
        self.regs[i as usize]
    }

    /// Writes register `i`, writes to `x0` are discarded.
    #[inline]
    pub(crate) fn write(&mut self, i: u32, value: u32) {
        if i != ZERO {
            self.regs[i as usize] = value;
        }
    }

    /// Copy of the whole register file in architectural order.
    pub fn snapshot(&self) -> [u32; N_REGS] {
        self.regs
    }

    /// Looks up a register number by its ABI name (`"sp"`, `"fp"`) or its
    /// numeric name (`"x2"`).
    pub fn index_of(name: &str) -> Option<u32> {
        if name == "fp" {
            return Some(S0);
        }
        if let Some(pos) = ABI_NAMES.iter().position(|abi| *abi == name) {
            return Some(pos as u32);
        }
        name.strip_prefix('x')
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|n| (*n as usize) < N_REGS)
    }

    pub fn abi_name(i: u32) -> Option<&'static str> {
        ABI_NAMES.get(i as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn x0_is_hard_wired() {
        let mut regs = Registers::new();
        regs.write(ZERO, 0xdead_beef);
        assert_eq!(regs.read(ZERO), 0);

        regs.write(T6, 7);
        assert_eq!(regs.read(T6), 7);
        assert_eq!(regs.snapshot()[31], 7);
    }

    #[test]
    fn names() {
        assert_eq!(Registers::index_of("sp"), Some(SP));
        assert_eq!(Registers::index_of("fp"), Some(S0));
        assert_eq!(Registers::index_of("s11"), Some(S11));
        assert_eq!(Registers::index_of("x31"), Some(31));
        assert_eq!(Registers::index_of("x32"), None);
        assert_eq!(Registers::index_of("pc"), None);
        assert_eq!(Registers::abi_name(A0), Some("a0"));
        assert_eq!(Registers::abi_name(32), None);
    }
}
