use std::env;
use std::error::Error;
use std::fs;
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::{error, info};

use chip8_core::clock::clock::Clock;
use chip8_core::error::error::VmError;
use chip8_core::loader::loader::{load_assembly, load_rom};
use chip8_core::outcome::outcome::StepOutcome;
use chip8_core::vm::vm::Vm;
use chip8_runtime::config::config::Args;
use chip8_runtime::display::display::DisplayWindow;

const FRAME_HZ: u64 = 60;

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        eprintln!("chip8_runtime: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let data = fs::read(&args.rom)
        .map_err(|err| format!("failed to read {}: {err}", args.rom.display()))?;

    let mut vm = if args.is_assembly() {
        load_assembly(&data, args.eti)?
    } else {
        load_rom(&data, args.eti)?
    };
    vm.speed = args.speed.max(1);

    if env::var_os("CHIP8_HEADLESS").is_some() {
        return run_headless(&mut vm, args.frames);
    }

    let mut display = DisplayWindow::new(args.scale)?;
    while display.is_open() {
        for (key, down) in display.poll_keys() {
            if down {
                vm.press_key(key);
            } else {
                vm.release_key(key);
            }
        }

        if run_frame(&mut vm)? == StepOutcome::Exited {
            info!("program exited after {} cycles", vm.cycles);
            break;
        }

        display.render(&vm.snapshot())?;
    }

    Ok(())
}

/// Run whatever the clock says is owed, capped so a stall cannot turn
/// into a long burst.
fn run_frame<C: Clock>(vm: &mut Vm<C>) -> Result<StepOutcome, VmError> {
    let limit = (vm.speed / FRAME_HZ).max(1) * 2;
    vm.run_pending(limit).inspect_err(|err| {
        error!("{err}; {}", vm.regs.reg_state());
    })
}

fn run_headless<C: Clock>(vm: &mut Vm<C>, frames: u64) -> Result<(), Box<dyn Error>> {
    let frame = Duration::from_nanos(1_000_000_000 / FRAME_HZ);

    for _ in 0..frames {
        if run_frame(vm)? == StepOutcome::Exited {
            break;
        }
        thread::sleep(frame);
    }

    println!("{}", vm.regs.reg_state());
    Ok(())
}
