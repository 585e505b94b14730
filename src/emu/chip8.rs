use rand::{SeedableRng, rngs::StdRng};

use super::{
    Chip8Error, FONT, FONT_END_ADDRESS, FONT_START_ADDRESS, Framebuffer, Keypad, MAX_PROGRAM_SIZE,
    MEMORY_SIZE, Opcode, PROGRAM_START_ADDRESS, StepResult,
};
use crate::u4;

/// CHIP-8 virtual machine state
pub struct Chip8 {
    /// 4KB memory array
    pub(crate) memory: [u8; MEMORY_SIZE],
    /// Display buffer: 64x32 monochrome pixels plus afterglow history
    pub(crate) display: Framebuffer,

    /// Program counter: address of the next instruction to execute
    pub(crate) pc: u16,
    /// Index register: used for memory operations
    pub(crate) i: u16,
    /// General-purpose registers V0-VF (VF is used as a flag register)
    pub(crate) v: [u8; 16],
    /// Call stack for subroutine returns
    pub(crate) stack: Vec<u16>,

    /// Delay timer: decrements at 60Hz until it reaches 0
    pub(crate) delay_timer: u8,
    /// Sound timer: decrements at 60Hz, beeps while non-zero
    pub(crate) sound_timer: u8,

    /// Key state and the pending Fx0A wait
    pub(crate) keypad: Keypad,

    pub(crate) rng: StdRng,
}

impl Chip8 {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Creates a machine whose Cxnn results are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let mut chip8 = Chip8 {
            memory: [0; MEMORY_SIZE],
            display: Framebuffer::new(),
            pc: PROGRAM_START_ADDRESS as u16,
            i: 0,
            v: [0; 16],
            stack: Vec::new(),
            delay_timer: 0,
            sound_timer: 0,
            keypad: Keypad::new(),
            rng,
        };
        chip8.reset();
        chip8
    }

    /// Restores power-on state: zeroed memory with the font, cleared registers,
    /// timers, stack, keypad and display, PC at the program start.
    pub fn reset(&mut self) {
        self.memory = [0; MEMORY_SIZE];
        self.memory[FONT_START_ADDRESS..FONT_END_ADDRESS].copy_from_slice(&FONT);

        self.display.reset();
        self.pc = PROGRAM_START_ADDRESS as u16;
        self.i = 0;
        self.v = [0; 16];
        self.stack.clear();
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.keypad.reset();
    }

    /// Resets the machine and copies `program` to the program start address.
    ///
    /// Oversized programs are rejected before anything is touched.
    pub fn load(&mut self, program: &[u8]) -> Result<(), Chip8Error> {
        if program.len() > MAX_PROGRAM_SIZE {
            return Err(Chip8Error::ProgramTooLarge {
                size: program.len(),
                max_size: MAX_PROGRAM_SIZE,
            });
        }

        self.reset();

        let program_end = PROGRAM_START_ADDRESS + program.len();
        self.memory[PROGRAM_START_ADDRESS..program_end].copy_from_slice(program);

        log::debug!("loaded {} byte program", program.len());
        Ok(())
    }

    /// Executes a single CPU cycle (fetch, decode, execute).
    ///
    /// Does nothing while a key wait is pending.
    pub fn step(&mut self) -> Result<StepResult, Chip8Error> {
        if self.keypad.pending_wait().is_some() {
            return Ok(StepResult::Suspended);
        }

        let opcode = self.fetch()?;
        let decoded_opcode = Opcode::decode(opcode);

        log::trace!("{:03X}: {opcode:04X} {decoded_opcode}", self.pc);
        self.pc = self.pc.wrapping_add(2);

        self.execute(decoded_opcode)
    }

    /// Returns true if the sound timer is greater than zero, indicating a beep should be played.
    pub fn should_beep(&self) -> bool {
        self.sound_timer > 0
    }

    /// Presses `key`, resolving a pending key wait into its target register.
    pub fn key_down(&mut self, key: u4) {
        if let Some(target) = self.keypad.key_down(key) {
            self.v[target] = key.get();
        }
    }

    pub fn key_up(&mut self, key: u4) {
        self.keypad.key_up(key);
    }

    pub fn is_key_down(&self, key: u4) -> bool {
        self.keypad.is_key_down(key)
    }

    /// Register the machine is suspended on, if a key wait is pending.
    pub fn pending_key_wait(&self) -> Option<u4> {
        self.keypad.pending_wait()
    }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        &self.memory
    }

    pub fn display(&self) -> &Framebuffer {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut Framebuffer {
        &mut self.display
    }

    pub fn keypad(&self) -> &Keypad {
        &self.keypad
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn i(&self) -> u16 {
        self.i
    }

    pub fn v(&self) -> &[u8; 16] {
        &self.v
    }

    pub fn stack(&self) -> &[u16] {
        &self.stack
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    /// Reads the big-endian instruction word at `addr`.
    pub fn word_at(&self, addr: usize) -> Result<u16, Chip8Error> {
        let bytes = self
            .memory
            .get(addr..addr + 2)
            .ok_or(Chip8Error::OutOfBounds { address: addr })?;

        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Fetches the next 16-bit opcode from memory.
    fn fetch(&self) -> Result<u16, Chip8Error> {
        self.word_at(self.pc as usize)
    }

    /// Borrows `len` bytes of memory starting at `addr`, failing if any of them is out of range.
    pub(crate) fn mem_range(&self, addr: usize, len: usize) -> Result<&[u8], Chip8Error> {
        self.memory
            .get(addr..addr + len)
            .ok_or(Chip8Error::OutOfBounds {
                address: addr + len.saturating_sub(1),
            })
    }

    pub(crate) fn mem_range_mut(
        &mut self,
        addr: usize,
        len: usize,
    ) -> Result<&mut [u8], Chip8Error> {
        self.memory
            .get_mut(addr..addr + len)
            .ok_or(Chip8Error::OutOfBounds {
                address: addr + len.saturating_sub(1),
            })
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emu::FONT_GLYPH_SIZE;

    #[test]
    fn font_is_loaded_at_glyph_addresses() {
        let chip8 = Chip8::with_seed(0);

        for digit in 0..16 {
            let addr = digit * FONT_GLYPH_SIZE;
            assert_eq!(
                &chip8.memory()[addr..addr + FONT_GLYPH_SIZE],
                &FONT[addr..addr + FONT_GLYPH_SIZE]
            );
        }
    }

    #[test]
    fn load_places_program_at_start_address() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.load(&[0x12, 0x34, 0x56]).unwrap();

        assert_eq!(&chip8.memory()[0x200..0x203], &[0x12, 0x34, 0x56]);
        assert_eq!(chip8.memory()[0x203], 0);
        assert_eq!(chip8.pc(), 0x200);
    }

    #[test]
    fn load_accepts_exactly_max_size() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.load(&vec![0xAB; MAX_PROGRAM_SIZE]).unwrap();
        assert_eq!(chip8.memory()[MEMORY_SIZE - 1], 0xAB);
    }

    #[test]
    fn load_rejects_oversized_program_without_touching_state() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.load(&[0x60, 0x01]).unwrap();
        chip8.v[3] = 9;

        let err = chip8.load(&vec![0xFF; MAX_PROGRAM_SIZE + 1]).unwrap_err();
        assert_eq!(
            err,
            Chip8Error::ProgramTooLarge {
                size: MAX_PROGRAM_SIZE + 1,
                max_size: MAX_PROGRAM_SIZE
            }
        );
        assert_eq!(&chip8.memory()[0x200..0x203], &[0x60, 0x01, 0x00]);
        assert_eq!(chip8.v()[3], 9);
    }

    #[test]
    fn load_resets_previous_program() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.load(&[0xAA, 0xBB, 0xCC, 0xDD]).unwrap();
        chip8.v[0] = 1;
        chip8.stack.push(0x204);
        chip8.key_down(u4::new(2));

        chip8.load(&[0x11]).unwrap();
        assert_eq!(&chip8.memory()[0x200..0x204], &[0x11, 0, 0, 0]);
        assert_eq!(chip8.v()[0], 0);
        assert!(chip8.stack().is_empty());
        assert!(!chip8.is_key_down(u4::new(2)));
    }

    #[test]
    fn reset_twice_matches_reset_once() {
        let mut once = Chip8::with_seed(0);
        once.load(&[0x60, 0x05, 0xD0, 0x05]).unwrap();
        once.step().unwrap();
        once.step().unwrap();
        once.delay_timer = 4;
        once.keypad.arm_wait(u4::new(1));
        once.reset();

        let mut twice = Chip8::with_seed(0);
        twice.load(&[0x60, 0x05, 0xD0, 0x05]).unwrap();
        twice.step().unwrap();
        twice.step().unwrap();
        twice.delay_timer = 4;
        twice.keypad.arm_wait(u4::new(1));
        twice.reset();
        twice.reset();

        assert_eq!(once.memory()[..], twice.memory()[..]);
        assert_eq!(once.pc(), twice.pc());
        assert_eq!(once.i(), twice.i());
        assert_eq!(once.v(), twice.v());
        assert_eq!(once.stack(), twice.stack());
        assert_eq!(once.delay_timer(), twice.delay_timer());
        assert_eq!(once.sound_timer(), twice.sound_timer());
        assert_eq!(once.pending_key_wait(), twice.pending_key_wait());
        assert_eq!(once.display().pixels(), twice.display().pixels());
        assert_eq!(twice.display().history_len(), 0);
        assert_eq!(twice.pc(), 0x200);
        assert_eq!(twice.pending_key_wait(), None);
        assert!(twice.display().pixels().iter().flatten().all(|p| !p));
    }

    #[test]
    fn fetch_past_end_of_memory_fails() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.pc = 0x0FFF;
        assert_eq!(
            chip8.step(),
            Err(Chip8Error::OutOfBounds { address: 0x0FFF })
        );
    }

    #[test]
    fn key_down_resolves_pending_wait_into_register() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.keypad.arm_wait(u4::new(6));

        chip8.key_down(u4::new(0xE));
        assert_eq!(chip8.v()[6], 0xE);
        assert_eq!(chip8.pending_key_wait(), None);
        assert!(chip8.is_key_down(u4::new(0xE)));
    }
}
