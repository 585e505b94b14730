use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::Context;
use clap::Parser;
use pixels::{Pixels, SurfaceTexture};
use rodio::{OutputStream, OutputStreamBuilder, Sink, Source, source::SquareWave};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, KeyCode, NamedKey},
    window::{Window, WindowId},
};

use chip8_glow::{
    emu::{
        AFTERGLOW_FRAMES, Chip8, Chip8Runner, DEFAULT_CYCLES_PER_TICK, DISPLAY_X, DISPLAY_Y,
        Frontend, GlowPixel,
    },
    u4,
};

/// Host frames per second; one timer tick is run per frame.
const FRAME_RATE: f32 = 60.0;
const FRAME_TIME_STEP: f32 = 1.0 / FRAME_RATE;

const BACKGROUND: [u8; 4] = [0x22, 0x26, 0x29, 0xFF];

/// Afterglow palette, oldest retained frame first.
const AFTERGLOW_PALETTE: [[u8; 4]; AFTERGLOW_FRAMES] = [
    [0x54, 0x60, 0x66, 0xFF],
    [0x8E, 0xA1, 0xAA, 0xFF],
    [0xC2, 0xDA, 0xE7, 0xFF],
    [0xD6, 0xF1, 0xFF, 0xFF],
    [0xD6, 0xF1, 0xFF, 0xFF],
    [0xD6, 0xF1, 0xFF, 0xFF],
];

/// Mapping from physical keyboard keys to CHIP-8 hex keypad (0x0-0xF).
const KEY_MAP: [KeyCode; 16] = [
    KeyCode::KeyX,   // 0x00
    KeyCode::Digit1, // 0x01
    KeyCode::Digit2, // 0x02
    KeyCode::Digit3, // 0x03
    KeyCode::KeyQ,   // 0x04
    KeyCode::KeyW,   // 0x05
    KeyCode::KeyE,   // 0x06
    KeyCode::KeyA,   // 0x07
    KeyCode::KeyS,   // 0x08
    KeyCode::KeyD,   // 0x09
    KeyCode::KeyZ,   // 0x0A
    KeyCode::KeyC,   // 0x0B
    KeyCode::Digit4, // 0x0C
    KeyCode::KeyR,   // 0x0D
    KeyCode::KeyF,   // 0x0E
    KeyCode::KeyV,   // 0x0F
];

/// Speaker and latest composited frame, handed to the runner as its frontend.
struct Host {
    /// Audio output stream (must be kept alive).
    _audio_stream: OutputStream,
    audio_sink: Sink,
    frame: Vec<GlowPixel>,
}

impl Frontend for Host {
    fn start_sound(&mut self) {
        self.audio_sink.play();
    }

    fn stop_sound(&mut self) {
        self.audio_sink.pause();
    }

    fn present(&mut self, frame: &[GlowPixel]) {
        self.frame.clear();
        self.frame.extend_from_slice(frame);
    }
}

struct App {
    pixels: Option<Pixels<'static>>,
    window: Option<Arc<Window>>,

    runner: Chip8Runner<Host>,
    /// Used for delta time calculation.
    last_frame_instant: Instant,
    frame_dt_accumulator: f32,

    /// Stores the result of the application to be returned from main.
    exit_result: anyhow::Result<()>,
}

impl App {
    fn new(rom: &[u8], args: &Args) -> anyhow::Result<Self> {
        // Initialize audio
        let mut _audio_stream = OutputStreamBuilder::open_default_stream()
            .context("Failed to open audio output stream")?;
        _audio_stream.log_on_drop(false);

        let audio_sink = Sink::connect_new(_audio_stream.mixer());
        audio_sink.pause();
        audio_sink.append(SquareWave::new(220.0).amplify(0.1));

        let host = Host {
            _audio_stream,
            audio_sink,
            frame: Vec::new(),
        };

        // Initialize CHIP-8
        let chip8 = match args.seed {
            Some(seed) => Chip8::with_seed(seed),
            None => Chip8::new(),
        };
        let mut runner =
            Chip8Runner::new(chip8, host).with_cycles_per_tick(args.cycles_per_tick);
        runner
            .load(rom)
            .context("Failed to load ROM into CHIP-8 memory")?;

        Ok(Self {
            pixels: None,
            window: None,
            runner,
            last_frame_instant: Instant::now(),
            frame_dt_accumulator: 0.0,
            exit_result: Ok(()),
        })
    }

    fn process_display(&mut self) -> anyhow::Result<()> {
        let buff = self
            .pixels
            .as_mut()
            .context("Pixels surface not initialized")?
            .frame_mut();

        for pxl in buff.chunks_exact_mut(4) {
            pxl.copy_from_slice(&BACKGROUND);
        }

        // Later layers are more recent and overwrite older, dimmer ones.
        for glow in &self.runner.frontend().frame {
            let i = (glow.y * DISPLAY_X + glow.x) * 4;
            let color = AFTERGLOW_PALETTE[usize::from(glow.level).min(AFTERGLOW_FRAMES - 1)];
            buff[i..i + 4].copy_from_slice(&color);
        }

        Ok(())
    }

    fn try_resumed(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window = {
            let size = LogicalSize::new(DISPLAY_X as u32 * 10, DISPLAY_Y as u32 * 10);
            let min_size = LogicalSize::new(DISPLAY_X as u32, DISPLAY_Y as u32);

            Arc::new(
                event_loop
                    .create_window(
                        Window::default_attributes()
                            .with_title("chip8-glow")
                            .with_inner_size(size)
                            .with_min_inner_size(min_size),
                    )
                    .context("Failed to create window")?,
            )
        };

        self.window = Some(window.clone());
        self.pixels = {
            let window_size = window.inner_size();
            let surface_texture =
                SurfaceTexture::new(window_size.width, window_size.height, window.clone());

            let pixels = Pixels::new(DISPLAY_X as u32, DISPLAY_Y as u32, surface_texture)
                .context("Failed to create pixels surface")?;

            window.request_redraw();
            Some(pixels)
        };

        // Avoid large dt on first frame
        self.last_frame_instant = Instant::now();
        Ok(())
    }

    fn try_window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        event: WindowEvent,
    ) -> anyhow::Result<()> {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                self.pixels
                    .as_mut()
                    .context("Pixels surface not initialized")?
                    .resize_surface(size.width, size.height)
                    .context("Failed to resize pixels surface")?;
            }

            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                self.frame_dt_accumulator += (now - self.last_frame_instant).as_secs_f32();
                self.last_frame_instant = now;

                // Run one batch per elapsed 1/60 s so the timers stay at 60Hz.
                while self.frame_dt_accumulator >= FRAME_TIME_STEP {
                    self.frame_dt_accumulator -= FRAME_TIME_STEP;
                    self.runner.run_frame().context("Chip8 Execution error")?;
                }

                self.process_display()?;

                self.pixels
                    .as_ref()
                    .context("Pixels surface not initialized")?
                    .render()
                    .context("Pixels render error")?;

                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                let Some(key) = KEY_MAP.iter().position(|&k| k == event.physical_key) else {
                    return Ok(());
                };
                let key = u4::new(key as u8);

                match event.state {
                    ElementState::Pressed if !event.repeat => self.runner.key_down(key),
                    ElementState::Pressed => {}
                    ElementState::Released => self.runner.key_up(key),
                }
            }

            _ => (),
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.try_resumed(event_loop) {
            self.exit_result = Err(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Err(e) = self.try_window_event(event_loop, event) {
            self.exit_result = Err(e);
            event_loop.exit();
        }
    }
}

/// CHIP-8 emulator with a phosphor afterglow display.
///
/// Keys 1-4, Q-R, A-F, Z-V map to CHIP-8 keys.
/// Escape is used to exit the emulator.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Path to the CHIP-8 ROM file
    rom_path: PathBuf,

    /// Instructions executed per 60Hz timer tick
    #[arg(long, default_value_t = DEFAULT_CYCLES_PER_TICK)]
    cycles_per_tick: u32,

    /// Seed for the random number instruction
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let rom = std::fs::read(&args.rom_path).context("Failed to read ROM file")?;

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(&rom, &args).context("Failed to initialize application")?;
    event_loop
        .run_app(&mut app)
        .context("Error occurred during event loop execution")?;

    // Return the result captured during the event loop
    app.exit_result
}
