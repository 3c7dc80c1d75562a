pub mod config {
    use std::path::{Path, PathBuf};

    use clap::Parser;

    use chip8_core::vm::vm::DEFAULT_SPEED;

    use crate::display::display::SCALE;

    /// Source file extensions that are assembled before loading.
    const ASSEMBLY_EXTENSIONS: [&str; 3] = ["asm", "c8", "src"];

    #[derive(Parser, Debug)]
    #[command(version, about = "Run a CHIP-8, CHIP-8E or SUPER-CHIP program", long_about = None)]
    pub struct Args {
        /// Program image, or assembly source
        pub rom: PathBuf,

        /// Treat the input as assembly source
        #[arg(long)]
        pub asm: bool,

        /// Load at 0x600 (ETI-660)
        #[arg(long)]
        pub eti: bool,

        /// Instructions per second
        #[arg(long, default_value_t = DEFAULT_SPEED)]
        pub speed: u64,

        /// Window pixels per CHIP-8 pixel
        #[arg(long, default_value_t = SCALE)]
        pub scale: usize,

        /// Frames to run when CHIP8_HEADLESS is set
        #[arg(long, default_value_t = 600)]
        pub frames: u64,
    }

    impl Args {
        pub fn is_assembly(&self) -> bool {
            self.asm
                || self
                    .rom
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ASSEMBLY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        }
    }

    #[derive(Parser, Debug)]
    #[command(name = "c8asm", version, about = "Assemble CHIP-8 source into a program image", long_about = None)]
    pub struct AsmArgs {
        /// Assembly source file
        pub input: PathBuf,

        /// Output file (default: input with a .ch8 extension)
        #[arg(short, long)]
        pub out: Option<PathBuf>,

        /// Assemble for a 0x600 load address (ETI-660)
        #[arg(long)]
        pub eti: bool,
    }

    impl AsmArgs {
        pub fn output_path(&self) -> PathBuf {
            self.out
                .clone()
                .unwrap_or_else(|| default_output_path(&self.input))
        }
    }

    pub fn default_output_path(input: &Path) -> PathBuf {
        let mut out = input.to_path_buf();
        out.set_extension("ch8");
        out
    }
}
