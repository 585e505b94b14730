/// Outcome of a single `Chip8::step` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepResult {
    /// An instruction was fetched and executed.
    Executed,
    /// An unrecognised word was fetched and skipped over.
    Unknown { opcode: u16 },
    /// A key-wait is armed; nothing was fetched.
    Suspended,
}

impl StepResult {
    /// True if the step consumed an instruction word.
    pub fn consumed_instruction(self) -> bool {
        !matches!(self, StepResult::Suspended)
    }
}

/// Error types that can occur during CHIP-8 emulation
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Chip8Error {
    #[error("Program is too large ({size} bytes), max size is {max_size} bytes")]
    ProgramTooLarge { size: usize, max_size: usize },

    #[error("Memory access out of bounds at address {address:#06X}")]
    OutOfBounds { address: usize },

    #[error("Stack underflow: attempted to return from a subroutine with empty call stack")]
    StackUnderflow,
}

pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;
/// A type alias for the CHIP-8 display buffer representation
pub type Display<T> = [[T; DISPLAY_X]; DISPLAY_Y];

pub const MEMORY_SIZE: usize = 4096;
pub const PROGRAM_START_ADDRESS: usize = 0x200;
pub const MAX_PROGRAM_SIZE: usize = MEMORY_SIZE - PROGRAM_START_ADDRESS;
