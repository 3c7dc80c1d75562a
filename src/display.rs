pub mod display {
    use minifb::{Key, Window, WindowOptions};

    use chip8_core::video::video::Video;

    const WHITE: u32 = 0xFFFFFF;
    const BLACK: u32 = 0x000000;

    // frame buffer is always kept at the high-res size; low-res pixels
    // are doubled
    const WIDTH: usize = 128;
    const HEIGHT: usize = 64;

    /// Default window pixels per low-res CHIP-8 pixel.
    pub const SCALE: usize = 10;

    // COSMAC VIP hex keypad laid over 1234/QWER/ASDF/ZXCV, indexed by key.
    const KEYMAP: [Key; 16] = [
        Key::X,
        Key::Key1,
        Key::Key2,
        Key::Key3,
        Key::Q,
        Key::W,
        Key::E,
        Key::A,
        Key::S,
        Key::D,
        Key::Z,
        Key::C,
        Key::Key4,
        Key::R,
        Key::F,
        Key::V,
    ];

    pub struct DisplayWindow {
        pub window: Window,
        pub buf: Vec<u32>,
        keys: [bool; 16],
    }

    impl DisplayWindow {
        pub fn new(scale: usize) -> Result<DisplayWindow, minifb::Error> {
            let mut window = Window::new(
                "Chip8",
                WIDTH / 2 * scale,
                HEIGHT / 2 * scale,
                WindowOptions::default(),
            )?;
            window.set_target_fps(60);

            Ok(DisplayWindow {
                window,
                buf: vec![BLACK; WIDTH * HEIGHT],
                keys: [false; 16],
            })
        }

        pub fn is_open(&self) -> bool {
            self.window.is_open() && !self.window.is_key_down(Key::Escape)
        }

        /// Keys whose state changed since the last poll, as (key, pressed).
        pub fn poll_keys(&mut self) -> Vec<(u8, bool)> {
            let mut changes = Vec::new();
            for (key, mapped) in KEYMAP.iter().enumerate() {
                let down = self.window.is_key_down(*mapped);
                if down != self.keys[key] {
                    self.keys[key] = down;
                    changes.push((key as u8, down));
                }
            }
            changes
        }

        /// Copy a frame into the window buffer and present it.
        pub fn render(&mut self, frame: &Video) -> Result<(), minifb::Error> {
            let factor = WIDTH / frame.width();

            for y in 0..HEIGHT {
                for x in 0..WIDTH {
                    let lit = frame.pixel(x / factor, y / factor);
                    self.buf[y * WIDTH + x] = if lit { WHITE } else { BLACK };
                }
            }

            self.window.update_with_buffer(&self.buf, WIDTH, HEIGHT)
        }
    }
}
