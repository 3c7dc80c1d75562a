pub mod memory {
    pub const MEMORY_SIZE: usize = 0x1000;

    // addresses are 12 bits wide; everything wraps at 4K.
    const ADDRESS_MASK: usize = MEMORY_SIZE - 1;

    /// The 4K CHIP-8 address space.
    ///
    /// All accessors mask the address to 12 bits, so reads and writes
    /// through `I` near the top of memory wrap back to 0x000 instead of
    /// faulting.
    #[derive(Clone)]
    pub struct Memory {
        bytes: Box<[u8; MEMORY_SIZE]>,
    }

    impl Default for Memory {
        fn default() -> Memory {
            Memory::new()
        }
    }

    impl Memory {
        pub fn new() -> Memory {
            Memory {
                bytes: Box::new([0; MEMORY_SIZE]),
            }
        }

        pub fn clear(&mut self) {
            self.bytes.fill(0);
        }

        /// Copy an image into memory starting at 0x000. Anything past the
        /// end of the address space is dropped; callers size-check first.
        pub fn load(&mut self, image: &[u8]) {
            self.clear();
            let len = image.len().min(MEMORY_SIZE);
            self.bytes[..len].copy_from_slice(&image[..len]);
        }

        pub fn read_u8(&self, addr: usize) -> u8 {
            self.bytes[addr & ADDRESS_MASK]
        }

        pub fn write_u8(&mut self, addr: usize, value: u8) {
            self.bytes[addr & ADDRESS_MASK] = value;
        }

        // opcodes are big-endian in memory (hi byte then lo byte).
        pub fn read_u16(&self, addr: usize) -> u16 {
            let hi = self.read_u8(addr) as u16;
            let lo = self.read_u8(addr + 1) as u16;
            (hi << 8) | lo
        }

        pub fn read_bytes(&self, addr: usize, len: usize) -> Vec<u8> {
            (0..len).map(|idx| self.read_u8(addr + idx)).collect()
        }

        pub fn write_bytes(&mut self, addr: usize, data: &[u8]) {
            for (idx, byte) in data.iter().enumerate() {
                self.write_u8(addr + idx, *byte);
            }
        }

        pub fn as_slice(&self) -> &[u8] {
            &self.bytes[..]
        }
    }
}
