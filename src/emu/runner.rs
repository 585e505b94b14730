use super::{Chip8, Chip8Error, GlowPixel, StepResult};
use crate::u4;

/// Instructions executed per 60Hz timer tick unless configured otherwise.
pub const DEFAULT_CYCLES_PER_TICK: u32 = 10;

/// Host-side collaborators of a running machine.
///
/// All hooks default to doing nothing, so a headless frontend is just `()`.
pub trait Frontend {
    /// The sound timer became non-zero.
    fn start_sound(&mut self) {}

    /// The sound timer ran out.
    fn stop_sound(&mut self) {}

    /// A composited frame is ready, oldest afterglow layer first.
    fn present(&mut self, _frame: &[GlowPixel]) {}
}

impl Frontend for () {}

/// Fixed-cadence driver: every `cycles_per_tick` executed instructions it ticks the
/// timers, drives the sound hooks and presents a composited frame.
///
/// The runner never reads a clock. Calling [`Chip8Runner::run_frame`] once per
/// 1/60 s is what makes the timers run at 60Hz.
pub struct Chip8Runner<F: Frontend = ()> {
    chip8: Chip8,
    frontend: F,
    cycles_per_tick: u32,
    cycles: u32,
    sound_playing: bool,
    presented: bool,
}

impl<F: Frontend> Chip8Runner<F> {
    pub fn new(chip8: Chip8, frontend: F) -> Self {
        Self {
            chip8,
            frontend,
            cycles_per_tick: DEFAULT_CYCLES_PER_TICK,
            cycles: 0,
            sound_playing: false,
            presented: false,
        }
    }

    /// Sets how many instructions run per timer tick. Zero is treated as one.
    pub fn with_cycles_per_tick(mut self, cycles_per_tick: u32) -> Self {
        self.cycles_per_tick = cycles_per_tick.max(1);
        self
    }

    pub fn cycles_per_tick(&self) -> u32 {
        self.cycles_per_tick
    }

    /// Loads a new program, restarting the tick count and silencing any sound.
    pub fn load(&mut self, program: &[u8]) -> Result<(), Chip8Error> {
        self.chip8.load(program)?;
        self.cycles = 0;
        if self.sound_playing {
            self.sound_playing = false;
            self.frontend.stop_sound();
        }
        Ok(())
    }

    /// Runs one machine step, ticking when the cadence is reached.
    ///
    /// Suspended steps (pending key wait) do not count towards the cadence.
    pub fn step(&mut self) -> Result<StepResult, Chip8Error> {
        let result = self.chip8.step()?;

        if result.consumed_instruction() {
            self.cycles += 1;
            if self.cycles == self.cycles_per_tick {
                self.cycles = 0;
                self.tick();
            }
        }

        Ok(result)
    }

    /// Runs exactly `cycles_per_tick` steps, one host frame's worth.
    ///
    /// A frame is presented even when no tick fired (e.g. during a key wait),
    /// so the afterglow keeps fading while the timers stay paused.
    pub fn run_frame(&mut self) -> Result<(), Chip8Error> {
        self.presented = false;
        for _ in 0..self.cycles_per_tick {
            self.step()?;
        }
        if !self.presented {
            self.present();
        }
        Ok(())
    }

    fn tick(&mut self) {
        let chip8 = &mut self.chip8;
        chip8.delay_timer = chip8.delay_timer.saturating_sub(1);

        if chip8.sound_timer > 0 {
            if !self.sound_playing {
                log::debug!("sound on");
                self.sound_playing = true;
                self.frontend.start_sound();
            }
            chip8.sound_timer -= 1;
        } else if self.sound_playing {
            log::debug!("sound off");
            self.sound_playing = false;
            self.frontend.stop_sound();
        }

        self.present();
    }

    fn present(&mut self) {
        let frame = self.chip8.display.composite();
        self.frontend.present(&frame);
        self.presented = true;
    }

    /// Returns true while the frontend has been asked to play sound.
    pub fn should_beep(&self) -> bool {
        self.sound_playing
    }

    pub fn key_down(&mut self, key: u4) {
        self.chip8.key_down(key)
    }

    pub fn key_up(&mut self, key: u4) {
        self.chip8.key_up(key)
    }

    pub fn chip8_ref(&self) -> &Chip8 {
        &self.chip8
    }

    pub fn chip8_mut(&mut self) -> &mut Chip8 {
        &mut self.chip8
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    pub fn frontend_mut(&mut self) -> &mut F {
        &mut self.frontend
    }
}
