pub mod assembler;
pub mod chip8_engine;
pub mod clock;
pub mod error;
pub mod loader;
pub mod memory;
pub mod outcome;
pub mod scanner;
pub mod video;
pub mod vm;
