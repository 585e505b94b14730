use std::fmt;

use crate::u4;

/// CHIP-8 instruction opcodes.
///
/// The fields (x, y, n, nn, nnn) correspond to the operands encoded in the opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// 0000 - Do nothing.
    Nop,

    /// 1nnn - Jump to location nnn.
    Jump { nnn: u16 },
    /// Bnnn - Jump to location nnn + V0.
    JumpWithOffset { nnn: u16 },

    /// 2nnn - Call subroutine at nnn.
    Call { nnn: u16 },
    /// 00EE - Return from a subroutine.
    Return,

    /// 3xnn - Skip next instruction if Vx == nn.
    SkipRegEqualImm { x: u4, nn: u8 },
    /// 4xnn - Skip next instruction if Vx != nn.
    SkipRegNotEqualImm { x: u4, nn: u8 },
    /// 5xy0 - Skip next instruction if Vx == Vy.
    SkipRegEqualReg { x: u4, y: u4 },
    /// 9xy0 - Skip next instruction if Vx != Vy.
    SkipRegNotEqualReg { x: u4, y: u4 },

    /// 6xnn - Set Vx = nn.
    SetRegImm { x: u4, nn: u8 },
    /// 7xnn - Set Vx = Vx + nn.
    AddRegImm { x: u4, nn: u8 },
    /// Annn - Set I = nnn.
    SetIndexImm { nnn: u16 },
    /// Fx1E - Set I = I + Vx.
    AddIndexReg { x: u4 },

    /// 8xyN - ALU operations
    ALU { x: u4, y: u4, op: OpcodeALU },
    /// Cxnn - Set Vx = random byte AND nn.
    Random { x: u4, nn: u8 },

    /// 00E0 - Clear the display.
    ClearDisplay,
    /// Dxyn - Display sprite.
    Draw { x: u4, y: u4, n: u4 },

    /// Ex9E - Skip next instruction if key with the value of Vx is pressed.
    SkipIfPressed { x: u4 },
    /// ExA1 - Skip next instruction if key with the value of Vx is not pressed.
    SkipIfNotPressed { x: u4 },
    /// Fx0A - Suspend until a key is pressed, store the value of the key in Vx.
    WaitForKey { x: u4 },

    /// Fx07 - Set Vx = delay timer value.
    ReadDelayTimer { x: u4 },
    /// Fx15 - Set delay timer = Vx.
    SetDelayTimer { x: u4 },
    /// Fx18 - Set sound timer = Vx.
    SetSoundTimer { x: u4 },

    /// Fx29 - Set I = location of sprite for digit Vx.
    FontChar { x: u4 },
    /// Fx33 - Store BCD representation of Vx in memory locations I, I+1, and I+2.
    BCD { x: u4 },

    /// Fx55 - Store registers V0 through Vx in memory starting at location I.
    StoreRegs { x: u4 },
    /// Fx65 - Read registers V0 through Vx from memory starting at location I.
    LoadRegs { x: u4 },

    /// Any word outside the instruction set, including invalid 8xyN forms.
    Unknown(u16),
}

/// ALU operations for the 8xyN instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpcodeALU {
    /// 8xy0 - Vx = Vy
    Set,
    /// 8xy1 - Vx = Vx OR Vy
    Or,
    /// 8xy2 - Vx = Vx AND Vy
    And,
    /// 8xy3 - Vx = Vx XOR Vy
    Xor,
    /// 8xy4 - Vx = Vx + Vy
    Add,
    /// 8xy5 - Vx = Vx - Vy
    Sub,
    /// 8xy6 - Vx = Vx SHR 1
    ShiftRight,
    /// 8xy7 - Vx = Vy - Vx
    SubReverse,
    /// 8xyE - Vx = Vx SHL 1
    ShiftLeft,
}

impl Opcode {
    /// Decode a 16-bit raw opcode into an `Opcode` enum variant.
    pub fn decode(opcode: u16) -> Self {
        let nibble = (
            ((opcode & 0xF000) >> 12) as u8,
            ((opcode & 0x0F00) >> 8) as u8,
            ((opcode & 0x00F0) >> 4) as u8,
            (opcode & 0x000F) as u8,
        );

        let x = u4::new(nibble.1);
        let y = u4::new(nibble.2);
        let n = u4::new(nibble.3);
        let nn = (opcode & 0x00FF) as u8;
        let nnn = opcode & 0x0FFF;

        match (nibble.0, nibble.1, nibble.2, nibble.3) {
            (0x0, 0x0, 0x0, 0x0) => Opcode::Nop,
            (0x0, 0x0, 0xE, 0x0) => Opcode::ClearDisplay,
            (0x0, 0x0, 0xE, 0xE) => Opcode::Return,
            (0x1, _, _, _) => Opcode::Jump { nnn },
            (0x2, _, _, _) => Opcode::Call { nnn },
            (0x3, _, _, _) => Opcode::SkipRegEqualImm { x, nn },
            (0x4, _, _, _) => Opcode::SkipRegNotEqualImm { x, nn },
            (0x5, _, _, 0x0) => Opcode::SkipRegEqualReg { x, y },
            (0x6, _, _, _) => Opcode::SetRegImm { x, nn },
            (0x7, _, _, _) => Opcode::AddRegImm { x, nn },
            (0x8, _, _, _) => Opcode::ALU {
                x,
                y,
                op: match nibble.3 {
                    0x0 => OpcodeALU::Set,
                    0x1 => OpcodeALU::Or,
                    0x2 => OpcodeALU::And,
                    0x3 => OpcodeALU::Xor,
                    0x4 => OpcodeALU::Add,
                    0x5 => OpcodeALU::Sub,
                    0x6 => OpcodeALU::ShiftRight,
                    0x7 => OpcodeALU::SubReverse,
                    0xE => OpcodeALU::ShiftLeft,
                    _ => return Opcode::Unknown(opcode),
                },
            },
            (0x9, _, _, 0x0) => Opcode::SkipRegNotEqualReg { x, y },
            (0xA, _, _, _) => Opcode::SetIndexImm { nnn },
            (0xB, _, _, _) => Opcode::JumpWithOffset { nnn },
            (0xC, _, _, _) => Opcode::Random { x, nn },
            (0xD, _, _, _) => Opcode::Draw { x, y, n },
            (0xE, _, 0x9, 0xE) => Opcode::SkipIfPressed { x },
            (0xE, _, 0xA, 0x1) => Opcode::SkipIfNotPressed { x },
            (0xF, _, 0x0, 0xA) => Opcode::WaitForKey { x },
            (0xF, _, 0x0, 0x7) => Opcode::ReadDelayTimer { x },
            (0xF, _, 0x1, 0x5) => Opcode::SetDelayTimer { x },
            (0xF, _, 0x1, 0x8) => Opcode::SetSoundTimer { x },
            (0xF, _, 0x1, 0xE) => Opcode::AddIndexReg { x },
            (0xF, _, 0x2, 0x9) => Opcode::FontChar { x },
            (0xF, _, 0x3, 0x3) => Opcode::BCD { x },
            (0xF, _, 0x5, 0x5) => Opcode::StoreRegs { x },
            (0xF, _, 0x6, 0x5) => Opcode::LoadRegs { x },

            _ => Opcode::Unknown(opcode),
        }
    }
}

/// Assembly mnemonic for the instruction. `Unknown` renders as an empty string.
impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Opcode::Nop => write!(f, "NOP"),
            Opcode::ClearDisplay => write!(f, "CLS"),
            Opcode::Return => write!(f, "RET"),
            Opcode::Jump { nnn } => write!(f, "JP {nnn:03X}"),
            Opcode::JumpWithOffset { nnn } => write!(f, "JP V0, {nnn:03X}"),
            Opcode::Call { nnn } => write!(f, "CALL {nnn:03X}"),
            Opcode::SkipRegEqualImm { x, nn } => write!(f, "SE V{x:X}, {nn:02X}"),
            Opcode::SkipRegNotEqualImm { x, nn } => write!(f, "SNE V{x:X}, {nn:02X}"),
            Opcode::SkipRegEqualReg { x, y } => write!(f, "SE V{x:X}, V{y:X}"),
            Opcode::SkipRegNotEqualReg { x, y } => write!(f, "SNE V{x:X}, V{y:X}"),
            Opcode::SetRegImm { x, nn } => write!(f, "LD V{x:X}, {nn:02X}"),
            Opcode::AddRegImm { x, nn } => write!(f, "ADD V{x:X}, {nn:02X}"),
            Opcode::SetIndexImm { nnn } => write!(f, "LD I, {nnn:03X}"),
            Opcode::AddIndexReg { x } => write!(f, "ADD I, V{x:X}"),
            Opcode::ALU { x, y, op } => match op {
                OpcodeALU::Set => write!(f, "LD V{x:X}, V{y:X}"),
                OpcodeALU::Or => write!(f, "OR V{x:X}, V{y:X}"),
                OpcodeALU::And => write!(f, "AND V{x:X}, V{y:X}"),
                OpcodeALU::Xor => write!(f, "XOR V{x:X}, V{y:X}"),
                OpcodeALU::Add => write!(f, "ADD V{x:X}, V{y:X}"),
                OpcodeALU::Sub => write!(f, "SUB V{x:X}, V{y:X}"),
                OpcodeALU::ShiftRight => write!(f, "SHR V{x:X}"),
                OpcodeALU::SubReverse => write!(f, "SUBN V{x:X}, V{y:X}"),
                OpcodeALU::ShiftLeft => write!(f, "SHL V{x:X}"),
            },
            Opcode::Random { x, nn } => write!(f, "RND V{x:X}, {nn:02X}"),
            Opcode::Draw { x, y, n } => write!(f, "DRW V{x:X}, V{y:X}, {n:X}"),
            Opcode::SkipIfPressed { x } => write!(f, "SKP V{x:X}"),
            Opcode::SkipIfNotPressed { x } => write!(f, "SKNP V{x:X}"),
            Opcode::WaitForKey { x } => write!(f, "LD V{x:X}, K"),
            Opcode::ReadDelayTimer { x } => write!(f, "LD V{x:X}, DT"),
            Opcode::SetDelayTimer { x } => write!(f, "LD DT, V{x:X}"),
            Opcode::SetSoundTimer { x } => write!(f, "LD ST, V{x:X}"),
            Opcode::FontChar { x } => write!(f, "LD F, V{x:X}"),
            Opcode::BCD { x } => write!(f, "LD B, V{x:X}"),
            Opcode::StoreRegs { x } => write!(f, "LD [I], V{x:X}"),
            Opcode::LoadRegs { x } => write!(f, "LD V{x:X}, [I]"),
            Opcode::Unknown(_) => Ok(()),
        }
    }
}

/// Disassembles a single instruction word, returning an empty string for unknown words.
pub fn disassemble(opcode: u16) -> String {
    Opcode::decode(opcode).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_operand_fields() {
        assert_eq!(
            Opcode::decode(0xD125),
            Opcode::Draw {
                x: u4::new(1),
                y: u4::new(2),
                n: u4::new(5)
            }
        );
        assert_eq!(Opcode::decode(0x2ABC), Opcode::Call { nnn: 0xABC });
        assert_eq!(
            Opcode::decode(0x7F10),
            Opcode::AddRegImm {
                x: u4::new(0xF),
                nn: 0x10
            }
        );
    }

    #[test]
    fn rejects_gaps_in_the_instruction_space() {
        for word in [0x00E1, 0x0123, 0x5121, 0x8128, 0x812F, 0x9121, 0xE19F, 0xF1FF] {
            assert_eq!(Opcode::decode(word), Opcode::Unknown(word), "{word:#06X}");
        }
    }

    #[test]
    fn mnemonics() {
        let cases = [
            (0x0000, "NOP"),
            (0x00E0, "CLS"),
            (0x00EE, "RET"),
            (0x12A4, "JP 2A4"),
            (0x2300, "CALL 300"),
            (0x330A, "SE V3, 0A"),
            (0x4AFF, "SNE VA, FF"),
            (0x51E0, "SE V1, VE"),
            (0x6B07, "LD VB, 07"),
            (0x7201, "ADD V2, 01"),
            (0x8120, "LD V1, V2"),
            (0x8121, "OR V1, V2"),
            (0x8122, "AND V1, V2"),
            (0x8123, "XOR V1, V2"),
            (0x8124, "ADD V1, V2"),
            (0x8125, "SUB V1, V2"),
            (0x8126, "SHR V1"),
            (0x8127, "SUBN V1, V2"),
            (0x812E, "SHL V1"),
            (0x9450, "SNE V4, V5"),
            (0xA123, "LD I, 123"),
            (0xB400, "JP V0, 400"),
            (0xC30F, "RND V3, 0F"),
            (0xD01F, "DRW V0, V1, F"),
            (0xE79E, "SKP V7"),
            (0xE7A1, "SKNP V7"),
            (0xF207, "LD V2, DT"),
            (0xF20A, "LD V2, K"),
            (0xF215, "LD DT, V2"),
            (0xF218, "LD ST, V2"),
            (0xF21E, "ADD I, V2"),
            (0xF229, "LD F, V2"),
            (0xF233, "LD B, V2"),
            (0xF255, "LD [I], V2"),
            (0xF265, "LD V2, [I]"),
        ];

        for (word, text) in cases {
            assert_eq!(disassemble(word), text, "{word:#06X}");
        }
    }

    #[test]
    fn unknown_words_disassemble_to_nothing() {
        assert_eq!(disassemble(0x0FFF), "");
        assert_eq!(disassemble(0xFFFF), "");
    }
}
