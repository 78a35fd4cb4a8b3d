pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;

/// One byte per pixel (0 = off, nonzero = on), row-major:
/// pixel `(x, y)` lives at `y * DISPLAY_X + x`.
pub type FrameBuffer = [u8; DISPLAY_X * DISPLAY_Y];

/// Fatal interpreter conditions.
///
/// Every variant means the ROM (or the data it computed) is broken; none of
/// them are recoverable and execution must not continue past them.
#[derive(Debug, thiserror::Error)]
pub enum Chip8Error {
    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomTooLarge { size: usize, max_size: usize },

    #[error("memory access out of bounds at address {address:#06X}")]
    MemoryOutOfBounds { address: u16 },

    #[error("call stack overflow: calls nested deeper than {max_depth}")]
    StackOverflow { max_depth: usize },

    #[error("stack underflow: return with no subroutine call outstanding")]
    StackUnderflow,

    #[error("unknown opcode: {opcode:#06X}")]
    UnknownOpcode { opcode: u16 },
}
