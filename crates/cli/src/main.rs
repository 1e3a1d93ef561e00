use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use rnv::{FlatImage, Vm, VmConfig, riscvm::reg::Registers};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Runs a flat RV32I binary", arg_required_else_help(true))]
struct Args {
    /// Flat little-endian binary, loaded at the ROM base
    image: PathBuf,

    /// ROM base address, execution starts here
    #[arg(long, value_parser = parse_u32, default_value_t = configuration::ROM_BASE)]
    entry: u32,

    /// ROM size in bytes
    #[arg(long, value_parser = parse_u32, default_value_t = configuration::ROM_SIZE)]
    rom_size: u32,

    /// RAM base address
    #[arg(long, value_parser = parse_u32, default_value_t = configuration::RAM_BASE)]
    ram_base: u32,

    /// RAM size in bytes
    #[arg(long, value_parser = parse_u32, default_value_t = configuration::RAM_SIZE)]
    ram_size: u32,

    /// Number of ROM words printed before running
    #[arg(long, default_value_t = 16)]
    dump_rom: usize,

    /// Treat address 0 as the first byte of ROM
    #[arg(long)]
    zero_address_alias: bool,

    /// Register printed after the run, by ABI name or as `xN`
    #[arg(long = "print-reg", value_name = "REG")]
    print_regs: Vec<String>,
}

/// Accepts decimal and `0x` prefixed hexadecimal numbers.
fn parse_u32(s: &str) -> Result<u32, String> {
    let s = s.replace('_', "");
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number {s:?}: {e}"))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::debug!("{:?}", args);

    let image = match FlatImage::load(&args.image) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("failed to load {}: {e}", args.image.display());
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = image.check_fits(args.rom_size) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let config = VmConfig {
        entry_point: args.entry,
        rom_size: args.rom_size,
        ram_base: args.ram_base,
        ram_size: args.ram_size,
        zero_address_alias: args.zero_address_alias,
    };
    let mut vm = match Vm::new(config).and_then(|vm| vm.load_image(&image)) {
        Ok(vm) => vm,
        Err(e) => {
            eprintln!("failed to create vm: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("ROM ({} byte image):", vm.image_size());
    for (addr, word) in vm.dump_rom(args.dump_rom) {
        println!("  0x{addr:08x}: 0x{word:08x}");
    }

    tracing::info!("running {}", args.image.display());
    let result = vm.run();
    println!("{vm}");

    for name in &args.print_regs {
        match Registers::index_of(name) {
            Some(i) => match vm.read_register(i) {
                Ok(value) => println!("{name} = 0x{value:08x}"),
                Err(e) => eprintln!("{e}"),
            },
            None => eprintln!("unknown register {name:?}"),
        }
    }

    match result {
        Ok(reason) => {
            println!("halted: {reason}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("fault: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn numbers() {
        assert_eq!(parse_u32("4096"), Ok(4096));
        assert_eq!(parse_u32("0x1_0000"), Ok(0x1_0000));
        assert_eq!(parse_u32("0XFF"), Ok(0xff));
        assert!(parse_u32("0xfffffffff").is_err());
        assert!(parse_u32("ten").is_err());
    }

    #[test]
    fn args() {
        Args::command().debug_assert();

        let args = Args::parse_from([
            "rnv",
            "prog.bin",
            "--entry",
            "0x8000",
            "--dump-rom",
            "4",
            "--print-reg",
            "a0",
            "--print-reg",
            "x5",
        ]);
        assert_eq!(args.image, PathBuf::from("prog.bin"));
        assert_eq!(args.entry, 0x8000);
        assert_eq!(args.rom_size, configuration::ROM_SIZE);
        assert_eq!(args.dump_rom, 4);
        assert!(!args.zero_address_alias);
        assert_eq!(args.print_regs, vec!["a0", "x5"]);
    }
}
