use riscv_isa::Target;

/// Renders `word` as RV32I assembly, `None` when it is not a valid RV32I
/// instruction. The zero word halts execution and is never rendered.
pub fn disassemble(word: u32) -> Option<String> {
    if word == 0 || word & 0b11 != 0b11 {
        return None;
    }
    let target = Target::from_str_strict("RV32I").ok()?;
    match riscv_isa::decode_le_bytes(&word.to_le_bytes(), &target) {
        Some((inst, 4)) => Some(inst.to_string()),
        _ => None,
    }
}
