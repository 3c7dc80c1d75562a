use std::path::PathBuf;

use clap::Parser;

use chip8_runtime::config::config::{Args, AsmArgs, default_output_path};
use chip8_runtime::display::display::SCALE;

#[test]
fn runtime_defaults() {
    let args = Args::try_parse_from(["chip8_runtime", "pong.ch8"]).unwrap();
    assert_eq!(args.rom, PathBuf::from("pong.ch8"));
    assert!(!args.is_assembly());
    assert!(!args.eti);
    assert_eq!(args.speed, 700);
    assert_eq!(args.scale, SCALE);
}

#[test]
fn assembly_inferred_from_extension() {
    for name in ["game.asm", "game.c8", "GAME.SRC"] {
        let args = Args::try_parse_from(["chip8_runtime", name]).unwrap();
        assert!(args.is_assembly(), "{name}");
    }

    let args = Args::try_parse_from(["chip8_runtime", "--asm", "--eti", "--speed", "1000", "game.txt"]).unwrap();
    assert!(args.is_assembly());
    assert!(args.eti);
    assert_eq!(args.speed, 1000);
}

#[test]
fn missing_rom_is_an_error() {
    assert!(Args::try_parse_from(["chip8_runtime"]).is_err());
}

#[test]
fn c8asm_output_path() {
    let args = AsmArgs::try_parse_from(["c8asm", "src/game.asm"]).unwrap();
    assert_eq!(args.output_path(), PathBuf::from("src/game.ch8"));

    let args = AsmArgs::try_parse_from(["c8asm", "game.asm", "-o", "out/rom.bin"]).unwrap();
    assert_eq!(args.output_path(), PathBuf::from("out/rom.bin"));

    assert_eq!(default_output_path(&PathBuf::from("noext")), PathBuf::from("noext.ch8"));
}
