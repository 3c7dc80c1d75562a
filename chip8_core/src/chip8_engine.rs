pub mod chip8_engine {
    use rand::Rng;

    use crate::clock::clock::Clock;
    use crate::error::error::VmError;
    use crate::loader::loader::{ASCII_FONT_ADDR, ASCII_SPRITE_ADDR, HIGH_FONT_ADDR, LOW_FONT_ADDR};
    use crate::outcome::outcome::StepOutcome;
    use crate::video::video::{HIGH_PITCH, LOW_PITCH};
    use crate::vm::vm::Vm;

    // One handler per leading nibble (0x0, 0x1, ... 0xF). Nibbles that
    // cover several instructions decode the rest of the word themselves
    // using the extract macros (NNN, X, KK, Y, Z).
    //
    // `pc` already points at the next instruction when a handler runs;
    // skips add 2 more, jumps overwrite it.

    macro_rules! extract_nnn {
        ($value:expr) => {
            ($value & 0x0FFF) as u16
        };
    }

    macro_rules! extract_x {
        ($value:expr) => {
            (($value >> 0x8) & 0xF) as usize
        };
    }

    macro_rules! extract_kk {
        ($value:expr) => {
            ($value & 0xFF) as u8
        };
    }

    macro_rules! extract_y {
        ($value:expr) => {
            (($value >> 0x4) & 0xF) as usize
        };
    }

    macro_rules! extract_z {
        ($value:expr) => {
            ($value & 0xF) as u8
        };
    }

    type Outcome = Result<StepOutcome, VmError>;

    fn executed() -> Outcome {
        Ok(StepOutcome::Executed)
    }

    fn invalid<C: Clock>(vm: &Vm<C>, instruction: u16) -> Outcome {
        Err(VmError::InvalidOpcode {
            opcode: instruction,
            address: vm.regs.PC.wrapping_sub(2) & 0xFFF,
        })
    }

    fn skip_if<C: Clock>(vm: &mut Vm<C>, cond: bool) -> Outcome {
        if cond {
            vm.regs.PC = (vm.regs.PC + 2) & 0xFFF;
        }
        executed()
    }

    /// Binary coded decimal by double-dabble: shift `value` left through
    /// the BCD digits, adding 3 to any digit >= 5 before each shift.
    /// Digits come back most significant first.
    pub fn bcd(value: u32, bits: u32, digits: u32) -> Vec<u8> {
        let mut scratch = value as u64;
        for _ in 0..bits {
            for d in 0..digits {
                let shift = bits + 4 * d;
                if (scratch >> shift) & 0xF >= 5 {
                    scratch += 3 << shift;
                }
            }
            scratch <<= 1;
        }
        (0..digits)
            .rev()
            .map(|d| ((scratch >> (bits + 4 * d)) & 0xF) as u8)
            .collect()
    }

    pub fn opcode_0x0<C: Clock>(vm: &mut Vm<C>, instruction: u16) -> Outcome {
        let var_z = extract_z!(instruction) as usize;
        let scroll_bits = (vm.video.pitch() >> 2) as u32;

        match instruction {
            0x00E0 => vm.video.clear(),
            0x00EE => vm.regs.PC = vm.pop_return()?,
            0x00FB => vm.video.scroll_right(scroll_bits),
            0x00FC => vm.video.scroll_left(scroll_bits),
            0x00FD => {
                // park on the EXIT so further steps keep exiting
                vm.regs.PC = vm.regs.PC.wrapping_sub(2) & 0xFFF;
                return Ok(StepOutcome::Exited);
            }
            0x00FE => vm.video.set_pitch(LOW_PITCH),
            0x00FF => vm.video.set_pitch(HIGH_PITCH),
            _ => {
                // scroll counts are in high-res rows
                let rows = if vm.video.pitch() == LOW_PITCH { var_z >> 1 } else { var_z };
                match instruction & 0xFFF0 {
                    0x00B0 => vm.video.scroll_up(rows),
                    0x00C0 => vm.video.scroll_down(rows),
                    _ => return invalid(vm, instruction),
                }
            }
        }
        executed()
    }

    pub fn opcode_0x1<C: Clock>(vm: &mut Vm<C>, instruction: u16) -> Outcome {
        vm.regs.PC = extract_nnn!(instruction);
        executed()
    }

    pub fn opcode_0x2<C: Clock>(vm: &mut Vm<C>, instruction: u16) -> Outcome {
        vm.push_return(vm.regs.PC)?;
        vm.regs.PC = extract_nnn!(instruction);
        executed()
    }

    pub fn opcode_0x3<C: Clock>(vm: &mut Vm<C>, instruction: u16) -> Outcome {
        let var_x = extract_x!(instruction);
        let var_kk = extract_kk!(instruction);

        let equal = vm.regs.V[var_x] == var_kk;
        skip_if(vm, equal)
    }

    pub fn opcode_0x4<C: Clock>(vm: &mut Vm<C>, instruction: u16) -> Outcome {
        let var_x = extract_x!(instruction);
        let var_kk = extract_kk!(instruction);

        let differ = vm.regs.V[var_x] != var_kk;
        skip_if(vm, differ)
    }

    pub fn opcode_0x5<C: Clock>(vm: &mut Vm<C>, instruction: u16) -> Outcome {
        let v_x = vm.regs.V[extract_x!(instruction)];
        let v_y = vm.regs.V[extract_y!(instruction)];

        match extract_z!(instruction) {
            0x0 => skip_if(vm, v_x == v_y),
            0x1 => skip_if(vm, v_x > v_y),
            0x2 => skip_if(vm, v_x < v_y),
            _ => invalid(vm, instruction),
        }
    }

    pub fn opcode_0x6<C: Clock>(vm: &mut Vm<C>, instruction: u16) -> Outcome {
        vm.regs.V[extract_x!(instruction)] = extract_kk!(instruction);
        executed()
    }

    pub fn opcode_0x7<C: Clock>(vm: &mut Vm<C>, instruction: u16) -> Outcome {
        let var_x = extract_x!(instruction);
        let var_kk = extract_kk!(instruction);

        vm.regs.V[var_x] = vm.regs.V[var_x].wrapping_add(var_kk);
        vm.regs.V[0xF] = (vm.regs.V[var_x] < var_kk) as u8;
        executed()
    }

    pub fn opcode_0x8<C: Clock>(vm: &mut Vm<C>, instruction: u16) -> Outcome {
        let var_x = extract_x!(instruction);
        let var_y = extract_y!(instruction);
        let v_x = vm.regs.V[var_x];
        let v_y = vm.regs.V[var_y];

        match extract_z!(instruction) {
            0x0 => vm.regs.V[var_x] = v_y,
            0x1 => vm.regs.V[var_x] = v_x | v_y,
            0x2 => vm.regs.V[var_x] = v_x & v_y,
            0x3 => vm.regs.V[var_x] = v_x ^ v_y,
            0x4 => {
                vm.regs.V[var_x] = v_x.wrapping_add(v_y);
                vm.regs.V[0xF] = (vm.regs.V[var_x] < v_y) as u8;
            }
            0x5 => {
                vm.regs.V[0xF] = (v_x >= v_y) as u8;
                vm.regs.V[var_x] = v_x.wrapping_sub(v_y);
            }
            0x6 => {
                vm.regs.V[0xF] = v_x & 1;
                vm.regs.V[var_x] = v_x >> 1;
            }
            0x7 => {
                vm.regs.V[0xF] = (v_y >= v_x) as u8;
                vm.regs.V[var_x] = v_y.wrapping_sub(v_x);
            }
            0xE => {
                vm.regs.V[0xF] = v_x >> 7;
                vm.regs.V[var_x] = v_x << 1;
            }
            _ => return invalid(vm, instruction),
        }
        executed()
    }

    pub fn opcode_0x9<C: Clock>(vm: &mut Vm<C>, instruction: u16) -> Outcome {
        let var_x = extract_x!(instruction);
        let v_x = vm.regs.V[var_x];
        let v_y = vm.regs.V[extract_y!(instruction)];

        match extract_z!(instruction) {
            0x0 => return skip_if(vm, v_x != v_y),
            0x1 => {
                let product = v_x as u16 * v_y as u16;
                vm.regs.V[var_x] = product as u8;
                vm.regs.V[0xF] = (product >> 8) as u8;
            }
            0x2 => {
                let (quotient, remainder) = v_x.checked_div(v_y).map_or((0, 0), |q| (q, v_x % v_y));
                vm.regs.V[var_x] = quotient;
                vm.regs.V[0xF] = remainder;
            }
            0x3 => {
                let value = ((v_x as u32) << 8) | v_y as u32;
                let digits = bcd(value, 16, 5);
                vm.memory.write_bytes(vm.regs.I as usize, &digits);
            }
            _ => return invalid(vm, instruction),
        }
        executed()
    }

    pub fn opcode_0xA<C: Clock>(vm: &mut Vm<C>, instruction: u16) -> Outcome {
        vm.regs.I = extract_nnn!(instruction);
        executed()
    }

    pub fn opcode_0xB<C: Clock>(vm: &mut Vm<C>, instruction: u16) -> Outcome {
        vm.regs.PC = (extract_nnn!(instruction) + vm.regs.V[0] as u16) & 0xFFF;
        executed()
    }

    pub fn opcode_0xC<C: Clock>(vm: &mut Vm<C>, instruction: u16) -> Outcome {
        let var_x = extract_x!(instruction);
        let var_kk = extract_kk!(instruction);

        let mut rng = rand::rng();
        let random_value: u8 = rng.random();

        vm.regs.V[var_x] = random_value & var_kk;
        executed()
    }

    pub fn opcode_0xD<C: Clock>(vm: &mut Vm<C>, instruction: u16) -> Outcome {
        let x = vm.regs.V[extract_x!(instruction)] as usize;
        let y = vm.regs.V[extract_y!(instruction)] as usize;
        let var_z = extract_z!(instruction) as usize;

        // n = 0 draws a 16 row sprite, two bytes wide in high-res
        let (rows, row_bytes) = match var_z {
            0 if vm.video.pitch() == HIGH_PITCH => (16, 2),
            0 => (16, 1),
            n => (n, 1),
        };

        let sprite = vm.memory.read_bytes(vm.regs.I as usize, rows * row_bytes);
        let collision = vm.video.draw_sprite(&sprite, row_bytes, x, y);
        vm.regs.V[0xF] = collision as u8;
        executed()
    }

    pub fn opcode_0xE<C: Clock>(vm: &mut Vm<C>, instruction: u16) -> Outcome {
        let down = vm.is_key_down(vm.regs.V[extract_x!(instruction)]);

        match extract_kk!(instruction) {
            0x9E => skip_if(vm, down),
            0xA1 => skip_if(vm, !down),
            _ => invalid(vm, instruction),
        }
    }

    pub fn opcode_0xF<C: Clock>(vm: &mut Vm<C>, instruction: u16) -> Outcome {
        let var_x = extract_x!(instruction);
        let v_x = vm.regs.V[var_x];
        let addr = vm.regs.I as usize;

        match extract_kk!(instruction) {
            0x07 => vm.regs.V[var_x] = vm.delay_timer(),
            0x0A => {
                vm.w = Some(var_x);
                return Ok(StepOutcome::Waiting);
            }
            0x15 => vm.set_delay_timer(v_x),
            0x18 => vm.set_sound_timer(v_x),
            0x1E => vm.regs.I = (vm.regs.I + v_x as u16) & 0xFFF,
            0x29 => vm.regs.I = (LOW_FONT_ADDR + (v_x & 0xF) as usize * 5) as u16,
            0x30 => vm.regs.I = (HIGH_FONT_ADDR + (v_x & 0xF) as usize * 10) as u16,
            0x33 => {
                let digits = bcd(v_x as u32, 8, 3);
                vm.memory.write_bytes(addr, &digits);
            }
            0x55 => {
                let regs = vm.regs.V;
                vm.memory.write_bytes(addr, &regs[..=var_x]);
            }
            0x65 => {
                for i in 0..=var_x {
                    vm.regs.V[i] = vm.memory.read_u8(addr + i);
                }
            }
            0x75 if var_x < 8 => {
                let regs = vm.regs.V;
                vm.regs.R[..=var_x].copy_from_slice(&regs[..=var_x]);
            }
            0x85 if var_x < 8 => {
                let flags = vm.regs.R;
                vm.regs.V[..=var_x].copy_from_slice(&flags[..=var_x]);
            }
            0x94 => {
                // glyphs are packed as 3 bytes: row count then 5 row nibbles
                let glyph = vm.memory.read_bytes(ASCII_FONT_ADDR + (v_x & 0x3F) as usize * 3, 3);
                let rows = [
                    glyph[0] & 0xF,
                    glyph[1] >> 4,
                    glyph[1] & 0xF,
                    glyph[2] >> 4,
                    glyph[2] & 0xF,
                ];
                for (i, row) in rows.iter().enumerate() {
                    vm.memory.write_u8(ASCII_SPRITE_ADDR + i, row << 4);
                }
                vm.regs.I = ASCII_SPRITE_ADDR as u16;
                vm.regs.V[0] = glyph[0] >> 4;
            }
            _ => return invalid(vm, instruction),
        }
        executed()
    }

}
