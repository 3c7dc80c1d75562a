pub mod vm {
    use log::{trace, warn};

    use crate::chip8_engine::chip8_engine::*;
    use crate::clock::clock::{Clock, NANOS_PER_SECOND, SystemClock, TIMER_HZ};
    use crate::error::error::VmError;
    use crate::memory::memory::Memory;
    use crate::outcome::outcome::StepOutcome;
    use crate::video::video::{LOW_PITCH, Video};

    macro_rules! extract_opcode {
        ($value:expr) => {
            ($value >> 0xc) as u8
        };
    }

    pub const STACK_SIZE: usize = 16;

    /// Instructions per second a freshly loaded program runs at.
    pub const DEFAULT_SPEED: u64 = 700;

    #[allow(non_snake_case)]
    #[derive(Clone, Debug, Default, PartialEq, Eq)]
    pub struct Registers {
        pub V: [u8; 16],
        /// HP-48 flag registers, reachable through `LD R, Vx`/`LD Vx, R`.
        pub R: [u8; 8],
        pub I: u16,
        pub PC: u16,
        pub SP: usize,
        // timers hold the clock reading at which they reach zero
        pub DT: u64,
        pub ST: u64,
    }

    impl Registers {
        pub fn reg_state(&self) -> String {
            format!(
                "V={:02X?} I={:#05X} PC={:#05X} SP={}",
                self.V, self.I, self.PC, self.SP
            )
        }
    }

    /// A CHIP-8 / CHIP-8E / SUPER-CHIP interpreter.
    ///
    /// The VM never sleeps; the host asks how many instructions are owed
    /// (`pending_cycles`) and steps until caught up. `clock` and `cycles`
    /// together pace execution at `speed` instructions per second.
    pub struct Vm<C: Clock = SystemClock> {
        pub regs: Registers,
        pub memory: Memory,
        pub video: Video,
        pub stack: [u16; STACK_SIZE],
        pub keys: [bool; 16],
        /// Register waiting for a key press, if the CPU is parked on `LD Vx, K`.
        pub w: Option<usize>,
        pub cycles: u64,
        pub speed: u64,
        /// Clock reading that pacing is measured from.
        pub clock: u64,
        /// Address execution starts at (0x200, or 0x600 for ETI-660 programs).
        pub base: usize,
        /// Size of the loaded program in bytes.
        pub size: usize,
        /// Boot image plus program, copied into memory on reset.
        pub rom: Vec<u8>,
        time: C,
    }

    impl<C: Clock> Vm<C> {
        pub fn new(base: usize, time: C) -> Vm<C> {
            let clock = time.now();
            Vm {
                regs: Registers {
                    PC: base as u16,
                    ..Registers::default()
                },
                memory: Memory::new(),
                video: Video::new(),
                stack: [0; STACK_SIZE],
                keys: [false; 16],
                w: None,
                cycles: 0,
                speed: DEFAULT_SPEED,
                clock,
                base,
                size: 0,
                rom: Vec::new(),
                time,
            }
        }

        /// Current clock reading in nanoseconds.
        pub fn now(&self) -> u64 {
            self.time.now()
        }

        pub fn reset(&mut self) {
            self.memory.load(&self.rom);
            self.video.set_pitch(LOW_PITCH);
            self.keys = [false; 16];
            self.stack = [0; STACK_SIZE];
            self.regs = Registers {
                PC: self.base as u16,
                ..Registers::default()
            };
            self.w = None;
            self.cycles = 0;
            self.clock = self.now();
        }

        /// Fetch, decode and execute one instruction.
        ///
        /// `pc` is advanced before the handler runs, so an invalid opcode
        /// leaves the VM positioned on the following instruction and the
        /// caller may keep stepping.
        pub fn step(&mut self) -> Result<StepOutcome, VmError> {
            if self.w.is_some() {
                return Ok(StepOutcome::Waiting);
            }

            let address = self.regs.PC;
            let instruction = self.memory.read_u16(address as usize);
            self.regs.PC = (address + 2) & 0xFFF;
            trace!("{address:#05X}: {instruction:04X}");

            let outcome = match extract_opcode!(instruction) {
                0x0 => opcode_0x0(self, instruction),
                0x1 => opcode_0x1(self, instruction),
                0x2 => opcode_0x2(self, instruction),
                0x3 => opcode_0x3(self, instruction),
                0x4 => opcode_0x4(self, instruction),
                0x5 => opcode_0x5(self, instruction),
                0x6 => opcode_0x6(self, instruction),
                0x7 => opcode_0x7(self, instruction),
                0x8 => opcode_0x8(self, instruction),
                0x9 => opcode_0x9(self, instruction),
                0xA => opcode_0xA(self, instruction),
                0xB => opcode_0xB(self, instruction),
                0xC => opcode_0xC(self, instruction),
                0xD => opcode_0xD(self, instruction),
                0xE => opcode_0xE(self, instruction),
                _ => opcode_0xF(self, instruction),
            };

            match outcome {
                Ok(outcome) => {
                    self.cycles += 1;
                    Ok(outcome)
                }
                Err(err) => {
                    if err.is_fatal() {
                        warn!("halting at {address:#05X}: {err}");
                    } else {
                        warn!("{err}");
                    }
                    Err(err)
                }
            }
        }

        /// Instructions owed given the time elapsed since `clock`.
        pub fn pending_cycles(&self) -> u64 {
            let elapsed = self.now().saturating_sub(self.clock) as u128;
            let target = elapsed * self.speed as u128 / NANOS_PER_SECOND as u128;
            (target as u64).saturating_sub(self.cycles)
        }

        /// Step until caught up with the clock, parked on a key wait,
        /// exited, or `limit` instructions have run.
        pub fn run_pending(&mut self, limit: u64) -> Result<StepOutcome, VmError> {
            if self.is_waiting() {
                return Ok(StepOutcome::Waiting);
            }

            let mut outcome = StepOutcome::Executed;
            for _ in 0..self.pending_cycles().min(limit) {
                outcome = self.step()?;
                if outcome != StepOutcome::Executed {
                    break;
                }
            }
            Ok(outcome)
        }

        pub fn is_waiting(&self) -> bool {
            self.w.is_some()
        }

        pub fn is_key_down(&self, key: u8) -> bool {
            self.keys[(key & 0xF) as usize]
        }

        /// Mark a key as held. If the CPU is waiting on `LD Vx, K` the key
        /// is delivered to `Vx` and execution resumes.
        pub fn press_key(&mut self, key: u8) {
            let key = key & 0xF;
            self.keys[key as usize] = true;

            if let Some(x) = self.w.take() {
                self.regs.V[x] = key;
                // time spent parked is not owed as cycles
                let paced = self.cycles as u128 * NANOS_PER_SECOND as u128 / self.speed.max(1) as u128;
                self.clock = self.now().saturating_sub(paced as u64);
            }
        }

        pub fn release_key(&mut self, key: u8) {
            self.keys[(key & 0xF) as usize] = false;
        }

        fn timer_deadline(&self, ticks: u8) -> u64 {
            let nanos = (ticks as u64 * NANOS_PER_SECOND).div_ceil(TIMER_HZ);
            self.now() + nanos
        }

        fn timer_ticks(&self, deadline: u64) -> u8 {
            let remaining = deadline.saturating_sub(self.now());
            (remaining * TIMER_HZ / NANOS_PER_SECOND).min(0xFF) as u8
        }

        pub fn set_delay_timer(&mut self, ticks: u8) {
            self.regs.DT = self.timer_deadline(ticks);
        }

        pub fn set_sound_timer(&mut self, ticks: u8) {
            self.regs.ST = self.timer_deadline(ticks);
        }

        pub fn delay_timer(&self) -> u8 {
            self.timer_ticks(self.regs.DT)
        }

        pub fn sound_timer(&self) -> u8 {
            self.timer_ticks(self.regs.ST)
        }

        pub(crate) fn push_return(&mut self, addr: u16) -> Result<(), VmError> {
            if self.regs.SP >= STACK_SIZE {
                return Err(VmError::StackOverflow);
            }
            self.stack[self.regs.SP] = addr;
            self.regs.SP += 1;
            Ok(())
        }

        pub(crate) fn pop_return(&mut self) -> Result<u16, VmError> {
            if self.regs.SP == 0 {
                return Err(VmError::StackUnderflow);
            }
            self.regs.SP -= 1;
            Ok(self.stack[self.regs.SP])
        }

        pub fn video(&self) -> &Video {
            &self.video
        }

        /// A copy of the frame, safe to render while the VM keeps running.
        pub fn snapshot(&self) -> Video {
            self.video.clone()
        }

        pub fn pitch(&self) -> usize {
            self.video.pitch()
        }

        pub fn width(&self) -> usize {
            self.video.width()
        }

        pub fn height(&self) -> usize {
            self.video.height()
        }

        pub fn pixel(&self, x: usize, y: usize) -> bool {
            self.video.pixel(x, y)
        }
    }
}
