pub mod loader {
    use log::info;

    use crate::assembler::assembler::{BASE_ADDRESS, ETI_BASE_ADDRESS, assemble_program};
    use crate::clock::clock::{Clock, SystemClock};
    use crate::error::error::{Chip8Error, VmError};
    use crate::memory::memory::MEMORY_SIZE;
    use crate::vm::vm::{DEFAULT_SPEED, Vm};

    pub const LOW_FONT_ADDR: usize = 0x000;
    pub const HIGH_FONT_ADDR: usize = 0x050;
    pub const ASCII_FONT_ADDR: usize = 0x100;
    /// `LD A, Vx` unpacks the selected glyph here.
    pub const ASCII_SPRITE_ADDR: usize = 0x1C0;

    pub const BOOT_ROM_SIZE: usize = 0x200;

    // CHIP-8 font sprites are 4x5 pixels, 5 bytes per glyph (0-F).
    const CHIP8_SPRITES: [u8; 80] = [
        0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
        0x20, 0x60, 0x20, 0x20, 0x70, // 1
        0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
        0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
        0x90, 0x90, 0xF0, 0x10, 0x10, // 4
        0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
        0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
        0xF0, 0x10, 0x20, 0x40, 0x40, // 7
        0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
        0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
        0xF0, 0x90, 0xF0, 0x90, 0x90, // A
        0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
        0xF0, 0x80, 0x80, 0x80, 0xF0, // C
        0xE0, 0x90, 0x90, 0x90, 0xE0, // D
        0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
        0xF0, 0x80, 0xF0, 0x80, 0x80, // F
    ];

    // SUPER-CHIP 8x10 font, 10 bytes per glyph (0-F).
    const SCHIP_SPRITES: [u8; 160] = [
        0x3C, 0x7E, 0xE7, 0xC3, 0xC3, 0xC3, 0xC3, 0xE7, 0x7E, 0x3C, // 0
        0x18, 0x38, 0x58, 0x18, 0x18, 0x18, 0x18, 0x18, 0x18, 0x3C, // 1
        0x3E, 0x7F, 0xC3, 0x06, 0x0C, 0x18, 0x30, 0x60, 0xFF, 0xFF, // 2
        0x3C, 0x7E, 0xC3, 0x03, 0x0E, 0x0E, 0x03, 0xC3, 0x7E, 0x3C, // 3
        0x06, 0x0E, 0x1E, 0x36, 0x66, 0xC6, 0xFF, 0xFF, 0x06, 0x06, // 4
        0xFF, 0xFF, 0xC0, 0xC0, 0xFC, 0xFE, 0x03, 0xC3, 0x7E, 0x3C, // 5
        0x3E, 0x7C, 0xC0, 0xC0, 0xFC, 0xFE, 0xC3, 0xC3, 0x7E, 0x3C, // 6
        0xFF, 0xFF, 0x03, 0x06, 0x0C, 0x18, 0x30, 0x60, 0x60, 0x60, // 7
        0x3C, 0x7E, 0xC3, 0xC3, 0x7E, 0x7E, 0xC3, 0xC3, 0x7E, 0x3C, // 8
        0x3C, 0x7E, 0xC3, 0xC3, 0x7F, 0x3F, 0x03, 0x03, 0x3E, 0x7C, // 9
        0x7E, 0xFF, 0xC3, 0xC3, 0xC3, 0xFF, 0xFF, 0xC3, 0xC3, 0xC3, // A
        0xFC, 0xFC, 0xC3, 0xC3, 0xFC, 0xFC, 0xC3, 0xC3, 0xFC, 0xFC, // B
        0x3C, 0xFF, 0xC3, 0xC0, 0xC0, 0xC0, 0xC0, 0xC3, 0xFF, 0x3C, // C
        0xFC, 0xFE, 0xC3, 0xC3, 0xC3, 0xC3, 0xC3, 0xC3, 0xFE, 0xFC, // D
        0xFF, 0xFF, 0xC0, 0xC0, 0xFF, 0xFF, 0xC0, 0xC0, 0xFF, 0xFF, // E
        0xFF, 0xFF, 0xC0, 0xC0, 0xFF, 0xFF, 0xC0, 0xC0, 0xC0, 0xC0, // F
    ];

    // CHIP-8E character set, indexed by `ascii & 0x3F`. Each glyph is five
    // rows of 4 pixels held in the low nibble.
    const ASCII_GLYPHS: [[u8; 5]; 64] = [
        [0xE, 0xA, 0xE, 0x8, 0x6], // @
        [0x4, 0xA, 0xE, 0xA, 0xA], // A
        [0xC, 0xA, 0xC, 0xA, 0xC], // B
        [0x6, 0x8, 0x8, 0x8, 0x6], // C
        [0xC, 0xA, 0xA, 0xA, 0xC], // D
        [0xE, 0x8, 0xC, 0x8, 0xE], // E
        [0xE, 0x8, 0xC, 0x8, 0x8], // F
        [0x6, 0x8, 0xA, 0xA, 0x6], // G
        [0xA, 0xA, 0xE, 0xA, 0xA], // H
        [0xE, 0x4, 0x4, 0x4, 0xE], // I
        [0x2, 0x2, 0x2, 0xA, 0x4], // J
        [0xA, 0xA, 0xC, 0xA, 0xA], // K
        [0x8, 0x8, 0x8, 0x8, 0xE], // L
        [0xA, 0xE, 0xE, 0xA, 0xA], // M
        [0xC, 0xA, 0xA, 0xA, 0xA], // N
        [0x4, 0xA, 0xA, 0xA, 0x4], // O
        [0xC, 0xA, 0xC, 0x8, 0x8], // P
        [0x4, 0xA, 0xA, 0xC, 0x6], // Q
        [0xC, 0xA, 0xC, 0xA, 0xA], // R
        [0x6, 0x8, 0x4, 0x2, 0xC], // S
        [0xE, 0x4, 0x4, 0x4, 0x4], // T
        [0xA, 0xA, 0xA, 0xA, 0xE], // U
        [0xA, 0xA, 0xA, 0xA, 0x4], // V
        [0xA, 0xA, 0xE, 0xE, 0xA], // W
        [0xA, 0xA, 0x4, 0xA, 0xA], // X
        [0xA, 0xA, 0x4, 0x4, 0x4], // Y
        [0xE, 0x2, 0x4, 0x8, 0xE], // Z
        [0x6, 0x4, 0x4, 0x4, 0x6], // [
        [0x8, 0x8, 0x4, 0x2, 0x2], // \
        [0xC, 0x4, 0x4, 0x4, 0xC], // ]
        [0x4, 0xA, 0x0, 0x0, 0x0], // ^
        [0x0, 0x0, 0x0, 0x0, 0xE], // _
        [0x0, 0x0, 0x0, 0x0, 0x0], // space
        [0x4, 0x4, 0x4, 0x0, 0x4], // !
        [0xA, 0xA, 0x0, 0x0, 0x0], // "
        [0xA, 0xE, 0xA, 0xE, 0xA], // #
        [0x6, 0xC, 0x4, 0x6, 0xC], // $
        [0xA, 0x2, 0x4, 0x8, 0xA], // %
        [0x4, 0xA, 0x4, 0xA, 0x6], // &
        [0x4, 0x4, 0x0, 0x0, 0x0], // '
        [0x2, 0x4, 0x4, 0x4, 0x2], // (
        [0x8, 0x4, 0x4, 0x4, 0x8], // )
        [0x0, 0xA, 0x4, 0xA, 0x0], // *
        [0x0, 0x4, 0xE, 0x4, 0x0], // +
        [0x0, 0x0, 0x0, 0x4, 0x8], // ,
        [0x0, 0x0, 0xE, 0x0, 0x0], // -
        [0x0, 0x0, 0x0, 0x0, 0x4], // .
        [0x2, 0x2, 0x4, 0x8, 0x8], // /
        [0xE, 0xA, 0xA, 0xA, 0xE], // 0
        [0x4, 0xC, 0x4, 0x4, 0xE], // 1
        [0xE, 0x2, 0xE, 0x8, 0xE], // 2
        [0xE, 0x2, 0x6, 0x2, 0xE], // 3
        [0xA, 0xA, 0xE, 0x2, 0x2], // 4
        [0xE, 0x8, 0xE, 0x2, 0xE], // 5
        [0xE, 0x8, 0xE, 0xA, 0xE], // 6
        [0xE, 0x2, 0x2, 0x4, 0x4], // 7
        [0xE, 0xA, 0xE, 0xA, 0xE], // 8
        [0xE, 0xA, 0xE, 0x2, 0xE], // 9
        [0x0, 0x4, 0x0, 0x4, 0x0], // :
        [0x0, 0x4, 0x0, 0x4, 0x8], // ;
        [0x2, 0x4, 0x8, 0x4, 0x2], // <
        [0x0, 0xE, 0x0, 0xE, 0x0], // =
        [0x8, 0x4, 0x2, 0x4, 0x8], // >
        [0xE, 0x2, 0x6, 0x0, 0x4], // ?
    ];

    const ASCII_GLYPH_ROWS: u8 = 5;

    const fn boot_rom() -> [u8; BOOT_ROM_SIZE] {
        let mut rom = [0u8; BOOT_ROM_SIZE];

        let mut i = 0;
        while i < CHIP8_SPRITES.len() {
            rom[LOW_FONT_ADDR + i] = CHIP8_SPRITES[i];
            i += 1;
        }

        i = 0;
        while i < SCHIP_SPRITES.len() {
            rom[HIGH_FONT_ADDR + i] = SCHIP_SPRITES[i];
            i += 1;
        }

        // pack each glyph as: row count, then the five row nibbles
        i = 0;
        while i < ASCII_GLYPHS.len() {
            let g = ASCII_GLYPHS[i];
            let addr = ASCII_FONT_ADDR + i * 3;
            rom[addr] = (ASCII_GLYPH_ROWS << 4) | g[0];
            rom[addr + 1] = (g[1] << 4) | g[2];
            rom[addr + 2] = (g[3] << 4) | g[4];
            i += 1;
        }

        rom
    }

    /// Fonts and character tables occupying 0x000-0x1FF.
    pub const BOOT_ROM: [u8; BOOT_ROM_SIZE] = boot_rom();

    pub fn load_rom(program: &[u8], eti_mode: bool) -> Result<Vm<SystemClock>, VmError> {
        load_rom_with_clock(program, eti_mode, SystemClock::new())
    }

    /// Build a VM around a raw program image. The program lands at 0x200
    /// (0x600 for ETI-660 programs) behind the boot ROM and the VM is reset
    /// ready to run.
    pub fn load_rom_with_clock<C: Clock>(program: &[u8], eti_mode: bool, clock: C) -> Result<Vm<C>, VmError> {
        let base = if eti_mode { ETI_BASE_ADDRESS } else { BASE_ADDRESS };
        let max_size = MEMORY_SIZE - base;
        if program.len() > max_size {
            return Err(VmError::ProgramTooLarge {
                size: program.len(),
                max_size,
            });
        }

        let mut rom = BOOT_ROM.to_vec();
        rom.resize(base, 0);
        rom.extend_from_slice(program);

        let mut vm = Vm::new(base, clock);
        vm.size = program.len();
        vm.speed = DEFAULT_SPEED;
        vm.rom = rom;
        vm.reset();

        info!("loaded {} byte program at {base:#05X}", program.len());
        Ok(vm)
    }

    pub fn load_assembly(source: &[u8], eti_mode: bool) -> Result<Vm<SystemClock>, Chip8Error> {
        load_assembly_with_clock(source, eti_mode, SystemClock::new())
    }

    pub fn load_assembly_with_clock<C: Clock>(source: &[u8], eti_mode: bool, clock: C) -> Result<Vm<C>, Chip8Error> {
        let program = assemble_program(source, eti_mode)?;
        Ok(load_rom_with_clock(&program, eti_mode, clock)?)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn boot_rom_layout() {
            assert_eq!(&BOOT_ROM[..5], &[0xF0, 0x90, 0x90, 0x90, 0xF0]);
            assert_eq!(BOOT_ROM[HIGH_FONT_ADDR], 0x3C);
            // 'A' is glyph 1
            assert_eq!(&BOOT_ROM[ASCII_FONT_ADDR + 3..ASCII_FONT_ADDR + 6], &[0x54, 0xAE, 0xAA]);
            assert!(BOOT_ROM[ASCII_SPRITE_ADDR..].iter().all(|&b| b == 0));
        }
    }
}
