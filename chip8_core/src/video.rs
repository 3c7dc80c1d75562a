pub mod video {
    /// Bytes of video memory; enough for the 128x64 high-res mode.
    pub const VIDEO_SIZE: usize = 0x400;

    /// Bytes per row in 64x32 mode.
    pub const LOW_PITCH: usize = 8;

    /// Bytes per row in 128x64 mode.
    pub const HIGH_PITCH: usize = 16;

    /// Monochrome, 1 bit per pixel frame buffer. `pitch` bytes make up
    /// one row; the screen is `pitch * 8` pixels wide and `pitch * 4`
    /// rows tall. The most significant bit of a byte is its leftmost
    /// pixel.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct Video {
        buf: [u8; VIDEO_SIZE],
        pitch: usize,
    }

    impl Default for Video {
        fn default() -> Video {
            Video::new()
        }
    }

    impl Video {
        pub fn new() -> Video {
            Video {
                buf: [0; VIDEO_SIZE],
                pitch: LOW_PITCH,
            }
        }

        pub fn clear(&mut self) {
            self.buf.fill(0);
        }

        pub fn pitch(&self) -> usize {
            self.pitch
        }

        /// Switch resolution. The screen is cleared.
        pub fn set_pitch(&mut self, pitch: usize) {
            self.pitch = pitch;
            self.clear();
        }

        pub fn width(&self) -> usize {
            self.pitch * 8
        }

        pub fn height(&self) -> usize {
            self.pitch * 4
        }

        /// The active part of the buffer, `pitch * height` bytes.
        pub fn bytes(&self) -> &[u8] {
            &self.buf[..self.pitch * self.height()]
        }

        pub fn pixel(&self, x: usize, y: usize) -> bool {
            if x >= self.width() || y >= self.height() {
                return false;
            }
            let byte = self.buf[y * self.pitch + x / 8];
            (byte >> (7 - x % 8)) & 1 == 1
        }

        // flips one pixel and returns true when it was lit before.
        fn toggle(&mut self, x: usize, y: usize) -> bool {
            let pos = y * self.pitch + x / 8;
            let mask = 0x80 >> (x % 8);
            let was_set = self.buf[pos] & mask != 0;
            self.buf[pos] ^= mask;
            was_set
        }

        /// XOR a sprite onto the screen at (`x_pos`, `y_pos`). Each row of
        /// the sprite is `row_bytes` wide. Sprites wrap at both screen
        /// edges. Returns true when any lit pixel was turned off.
        pub fn draw_sprite(&mut self, sprite: &[u8], row_bytes: usize, x_pos: usize, y_pos: usize) -> bool {
            let (width, height) = (self.width(), self.height());
            let mut collision = false;

            for (byte_index, byte) in sprite.iter().enumerate() {
                let y = (y_pos + byte_index / row_bytes) % height;
                let x_base = x_pos + (byte_index % row_bytes) * 8;

                for bit_index in 0..8 {
                    if (byte >> (7 - bit_index)) & 1 == 0 {
                        continue;
                    }
                    let x = (x_base + bit_index) % width;
                    collision |= self.toggle(x, y);
                }
            }
            collision
        }

        /// Scroll the screen down by `rows` rows, filling blank rows in at
        /// the top.
        pub fn scroll_down(&mut self, rows: usize) {
            let len = self.pitch * self.height();
            let shift = (rows * self.pitch).min(len);
            self.buf.copy_within(0..len - shift, shift);
            self.buf[..shift].fill(0);
        }

        pub fn scroll_up(&mut self, rows: usize) {
            let len = self.pitch * self.height();
            let shift = (rows * self.pitch).min(len);
            self.buf.copy_within(shift..len, 0);
            self.buf[len - shift..len].fill(0);
        }

        /// Shift every row right by `bits` pixels (1..=7).
        pub fn scroll_right(&mut self, bits: u32) {
            let pitch = self.pitch;
            let len = pitch * self.height();
            for row in self.buf[..len].chunks_mut(pitch) {
                let mut carry = 0u8;
                for byte in row.iter_mut() {
                    let b = *byte;
                    *byte = (b >> bits) | carry;
                    carry = b << (8 - bits);
                }
            }
        }

        /// Shift every row left by `bits` pixels (1..=7).
        pub fn scroll_left(&mut self, bits: u32) {
            let pitch = self.pitch;
            let len = pitch * self.height();
            for row in self.buf[..len].chunks_mut(pitch) {
                let mut carry = 0u8;
                for byte in row.iter_mut().rev() {
                    let b = *byte;
                    *byte = (b << bits) | carry;
                    carry = b >> (8 - bits);
                }
            }
        }
    }

}
