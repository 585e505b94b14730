use std::collections::VecDeque;

use super::{DISPLAY_X, DISPLAY_Y, Display};

/// Number of recent frames retained for afterglow compositing.
pub const AFTERGLOW_FRAMES: usize = 6;

/// One lit pixel of a composited frame.
///
/// `level` is the age rank of the snapshot the pixel came from: 0 is the oldest
/// retained frame and higher levels are more recent, so a renderer should paint
/// higher levels brighter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlowPixel {
    pub x: usize,
    pub y: usize,
    pub level: u8,
}

/// Monochrome 64x32 framebuffer with a short history of composited frames.
pub struct Framebuffer {
    pixels: Display<bool>,
    history: VecDeque<Display<bool>>,
}

impl Framebuffer {
    pub fn new() -> Self {
        Self {
            pixels: [[false; DISPLAY_X]; DISPLAY_Y],
            history: VecDeque::with_capacity(AFTERGLOW_FRAMES),
        }
    }

    /// Turns every pixel off. History is left alone so the trail keeps fading.
    pub fn clear(&mut self) {
        self.pixels = [[false; DISPLAY_X]; DISPLAY_Y];
    }

    /// Clears the pixels and forgets all retained frames.
    pub fn reset(&mut self) {
        self.clear();
        self.history.clear();
    }

    /// XORs an 8-pixel-wide sprite onto the grid with its top-left corner at (x, y).
    ///
    /// Pixels that land outside the grid are dropped rather than wrapped around.
    /// Returns true if any lit pixel was turned off.
    pub fn draw_sprite(&mut self, x: usize, y: usize, rows: &[u8]) -> bool {
        let mut collision = false;

        for (row, sprite_byte) in rows.iter().enumerate() {
            let py = y + row;
            if py >= DISPLAY_Y {
                break;
            }

            for col in 0..8 {
                let px = x + col;
                if px >= DISPLAY_X {
                    break;
                }

                // If current sprite bit is non-zero
                if (sprite_byte & (0x80 >> col)) != 0 {
                    let pixel = &mut self.pixels[py][px];
                    collision |= *pixel;

                    // Flip the pixel
                    *pixel ^= true;
                }
            }
        }

        collision
    }

    /// Get the state of a pixel on the display (true = on, false = off).
    pub fn pixel(&self, y: usize, x: usize) -> bool {
        self.pixels[y][x]
    }

    pub fn pixels(&self) -> &Display<bool> {
        &self.pixels
    }

    /// Number of frames currently retained for compositing.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Snapshots the current frame into the history and returns every lit pixel
    /// of every retained frame, oldest frame first.
    pub fn composite(&mut self) -> Vec<GlowPixel> {
        if self.history.len() == AFTERGLOW_FRAMES {
            self.history.pop_front();
        }
        self.history.push_back(self.pixels);

        let mut glow = Vec::new();
        for (level, frame) in self.history.iter().enumerate() {
            for (y, row) in frame.iter().enumerate() {
                for (x, _) in row.iter().enumerate().filter(|(_, lit)| **lit) {
                    glow.push(GlowPixel {
                        x,
                        y,
                        level: level as u8,
                    });
                }
            }
        }

        glow
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit_count(fb: &Framebuffer) -> usize {
        fb.pixels().iter().flatten().filter(|p| **p).count()
    }

    #[test]
    fn drawing_twice_toggles_back_and_reports_collision() {
        let mut fb = Framebuffer::new();

        assert!(!fb.draw_sprite(3, 4, &[0xFF]));
        assert_eq!(lit_count(&fb), 8);
        assert!((3..11).all(|x| fb.pixel(4, x)));

        assert!(fb.draw_sprite(3, 4, &[0xFF]));
        assert_eq!(lit_count(&fb), 0);
    }

    #[test]
    fn collision_only_counts_lit_destination_pixels() {
        let mut fb = Framebuffer::new();
        fb.draw_sprite(0, 0, &[0xF0]);

        assert!(!fb.draw_sprite(0, 0, &[0x0F]));
        assert_eq!(lit_count(&fb), 8);
        assert!(fb.draw_sprite(0, 0, &[0x80]));
        assert!(!fb.pixel(0, 0));
    }

    #[test]
    fn sprites_are_clipped_not_wrapped() {
        let mut fb = Framebuffer::new();

        fb.draw_sprite(60, 30, &[0xFF, 0xFF, 0xFF]);
        assert_eq!(lit_count(&fb), 4 * 2);
        assert!(!fb.pixel(0, 0));
        assert!(!fb.pixel(30, 0));
        assert!(fb.pixel(31, 63));

        // Entirely off-screen origins draw nothing.
        assert!(!fb.draw_sprite(200, 0, &[0xFF]));
        assert!(!fb.draw_sprite(0, 40, &[0xFF]));
        assert_eq!(lit_count(&fb), 8);
    }

    #[test]
    fn clear_turns_everything_off() {
        let mut fb = Framebuffer::new();
        fb.draw_sprite(10, 10, &[0xAA, 0x55]);
        fb.clear();
        assert_eq!(lit_count(&fb), 0);
    }

    #[test]
    fn composite_orders_frames_oldest_first_with_rising_levels() {
        let mut fb = Framebuffer::new();

        fb.draw_sprite(0, 0, &[0x80]);
        let first = fb.composite();
        assert_eq!(first, vec![GlowPixel { x: 0, y: 0, level: 0 }]);

        fb.draw_sprite(0, 0, &[0x80]);
        fb.draw_sprite(5, 1, &[0x80]);
        let second = fb.composite();
        assert_eq!(
            second,
            vec![
                GlowPixel { x: 0, y: 0, level: 0 },
                GlowPixel { x: 5, y: 1, level: 1 },
            ]
        );
    }

    #[test]
    fn history_is_bounded_and_evicts_oldest() {
        let mut fb = Framebuffer::new();
        fb.draw_sprite(0, 0, &[0x80]);
        fb.composite();
        fb.clear();

        for _ in 0..AFTERGLOW_FRAMES - 1 {
            fb.composite();
        }
        assert_eq!(fb.history_len(), AFTERGLOW_FRAMES);
        assert_eq!(fb.composite(), Vec::new());
        assert_eq!(fb.history_len(), AFTERGLOW_FRAMES);
    }

    #[test]
    fn reset_drops_history() {
        let mut fb = Framebuffer::new();
        fb.draw_sprite(0, 0, &[0x80]);
        fb.composite();
        fb.reset();
        assert_eq!(fb.history_len(), 0);
        assert_eq!(fb.composite(), Vec::new());
    }
}
