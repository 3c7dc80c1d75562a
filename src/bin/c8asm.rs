use std::fs;

use clap::Parser;
use log::info;

use chip8_core::assembler::assembler::assemble_program;
use chip8_runtime::config::config::AsmArgs;

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        eprintln!("c8asm: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = AsmArgs::parse();
    let output = args.output_path();

    let source = fs::read(&args.input)
        .map_err(|err| format!("failed to read {}: {err}", args.input.display()))?;

    let rom = assemble_program(&source, args.eti)
        .map_err(|err| format!("{}: {err}", args.input.display()))?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed to create {}: {err}", parent.display()))?;
    }

    fs::write(&output, &rom)
        .map_err(|err| format!("failed to write {}: {err}", output.display()))?;

    info!("wrote {} bytes to {}", rom.len(), output.display());
    Ok(())
}
