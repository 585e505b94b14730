use rand::Rng;

use super::{
    Chip8, Chip8Error, FONT_GLYPH_SIZE, FONT_START_ADDRESS, MEMORY_SIZE, Opcode, OpcodeALU,
    StepResult,
};
use crate::u4;

impl Chip8 {
    /// Executes an already decoded instruction. The PC must already point past it.
    pub(crate) fn execute(&mut self, opcode: Opcode) -> Result<StepResult, Chip8Error> {
        match opcode {
            Opcode::Nop => {}
            Opcode::ClearDisplay => {
                self.display.clear();
            }
            Opcode::Jump { nnn } => {
                self.pc = nnn;
            }
            Opcode::JumpWithOffset { nnn } => {
                self.pc = nnn.wrapping_add(self.v[0].into());
            }
            Opcode::Call { nnn } => {
                self.stack.push(self.pc);
                self.pc = nnn;
            }
            Opcode::Return => {
                self.pc = self.stack.pop().ok_or(Chip8Error::StackUnderflow)?;
            }
            Opcode::SkipRegEqualImm { x, nn } => {
                self.skip_if(self.v[x] == nn);
            }
            Opcode::SkipRegNotEqualImm { x, nn } => {
                self.skip_if(self.v[x] != nn);
            }
            Opcode::SkipRegEqualReg { x, y } => {
                self.skip_if(self.v[x] == self.v[y]);
            }
            Opcode::SkipRegNotEqualReg { x, y } => {
                self.skip_if(self.v[x] != self.v[y]);
            }
            Opcode::SetRegImm { x, nn } => {
                self.v[x] = nn;
            }
            Opcode::AddRegImm { x, nn } => {
                self.v[x] = self.v[x].wrapping_add(nn);
            }
            Opcode::ALU { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Opcode::Random { x, nn } => {
                let rand_byte: u8 = self.rng.random();
                self.v[x] = rand_byte & nn;
            }
            Opcode::SetIndexImm { nnn } => {
                self.i = nnn;
            }
            Opcode::AddIndexReg { x } => {
                let (res, overflow) = self.i.overflowing_add(self.v[x].into());
                self.i = res;
                self.v[0xF] = overflow as u8;
            }
            Opcode::Draw { x, y, n } => {
                self.execute_draw(x, y, n);
            }
            Opcode::SkipIfPressed { x } => {
                self.skip_if(self.key_in_register(x));
            }
            Opcode::SkipIfNotPressed { x } => {
                self.skip_if(!self.key_in_register(x));
            }
            Opcode::WaitForKey { x } => {
                self.keypad.arm_wait(x);
            }
            Opcode::ReadDelayTimer { x } => {
                self.v[x] = self.delay_timer;
            }
            Opcode::SetDelayTimer { x } => {
                self.delay_timer = self.v[x];
            }
            Opcode::SetSoundTimer { x } => {
                self.sound_timer = self.v[x];
            }
            Opcode::FontChar { x } => {
                self.i = (FONT_START_ADDRESS + self.v[x] as usize * FONT_GLYPH_SIZE) as u16;
            }
            Opcode::BCD { x } => {
                let value = self.v[x];
                let digits = [value / 100, (value / 10) % 10, value % 10];
                // Digits that would land past the end of memory are dropped.
                let start = self.i as usize;
                for (slot, digit) in self.memory.iter_mut().skip(start).zip(digits) {
                    *slot = digit;
                }
            }
            Opcode::StoreRegs { x } => {
                let count = usize::from(x) + 1;
                let regs = self.v;
                self.mem_range_mut(self.i as usize, count)?
                    .copy_from_slice(&regs[..count]);
            }
            Opcode::LoadRegs { x } => {
                let count = usize::from(x) + 1;
                let mut loaded = [0; 16];
                loaded[..count].copy_from_slice(self.mem_range(self.i as usize, count)?);
                self.v[..count].copy_from_slice(&loaded[..count]);
            }
            Opcode::Unknown(opcode) => {
                log::warn!(
                    "ignoring unknown opcode {opcode:#06X} at {:#05X}",
                    self.pc.wrapping_sub(2)
                );
                return Ok(StepResult::Unknown { opcode });
            }
        };

        Ok(StepResult::Executed)
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.pc = self.pc.wrapping_add(2);
        }
    }

    /// Keys above 0xF do not exist and are never pressed.
    fn key_in_register(&self, x: u4) -> bool {
        u4::try_from(self.v[x]).is_ok_and(|key| self.keypad.is_key_down(key))
    }

    // The flag is written before the result, so the result survives when x is VF.
    fn execute_alu(&mut self, x: u4, y: u4, op: OpcodeALU) {
        match op {
            OpcodeALU::Set => self.v[x] = self.v[y],
            OpcodeALU::Or => self.v[x] |= self.v[y],
            OpcodeALU::And => self.v[x] &= self.v[y],
            OpcodeALU::Xor => self.v[x] ^= self.v[y],
            OpcodeALU::Add => {
                let (res, overflow) = self.v[x].overflowing_add(self.v[y]);
                self.v[0xF] = overflow as u8;
                self.v[x] = res;
            }
            OpcodeALU::Sub => {
                let (res, borrow) = self.v[x].overflowing_sub(self.v[y]);
                self.v[0xF] = !borrow as u8; // Notice that borrow is inverted
                self.v[x] = res;
            }
            OpcodeALU::SubReverse => {
                let (res, borrow) = self.v[y].overflowing_sub(self.v[x]);
                self.v[0xF] = !borrow as u8;
                self.v[x] = res;
            }
            OpcodeALU::ShiftRight => {
                let (value, lsb) = (self.v[x] >> 1, self.v[x] & 1);
                self.v[0xF] = lsb;
                self.v[x] = value;
            }
            OpcodeALU::ShiftLeft => {
                let (value, msb) = (self.v[x] << 1, (self.v[x] >> 7) & 1);
                self.v[0xF] = msb;
                self.v[x] = value;
            }
        }
    }

    /// Sprite rows past the end of memory are cut off.
    fn execute_draw(&mut self, x: u4, y: u4, n: u4) {
        let x_pos = self.v[x] as usize;
        let y_pos = self.v[y] as usize;

        let start = (self.i as usize).min(MEMORY_SIZE);
        let end = (start + usize::from(n)).min(MEMORY_SIZE);
        let rows = &self.memory[start..end];

        let collision = self.display.draw_sprite(x_pos, y_pos, rows);
        self.v[0xF] = collision as u8;
    }
}
