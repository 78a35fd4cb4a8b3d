mod bits;
mod chip8;
mod execute;
mod font;
mod opcode;
mod runner;
mod types;

pub use chip8::*;
pub use opcode::*;
pub use runner::*;
pub use types::*;
