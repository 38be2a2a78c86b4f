use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode as WinitKeyCode, PhysicalKey};
use winit::window::{Fullscreen, Window, WindowId};

use shadow_mapping_basic::{
    AppControl, AssetDir, FrameRecorder, HeadlessDevice, KeyCode, NamedKey, Renderer, Settings,
    ShadowMappingApp,
};

/// Simulated frame interval of headless runs.
const HEADLESS_FRAME_SECONDS: f32 = 1.0 / 60.0;

const USAGE: &str = "Usage: shadow-mapping-basic [--headless] [--frames <n>] [--press <key>]... [--reduced] [--assets <dir>]";

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let settings = options.settings();

    if options.headless {
        return run_headless(&settings, &options);
    }
    match run_interactive(settings.clone()) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --headless mode (set DISPLAY or WAYLAND_DISPLAY to enable rendering)."
                );
                run_headless(&settings, &options)
            } else {
                Err(err)
            }
        }
    }
}

fn run_headless(settings: &Settings, options: &CliOptions) -> Result<()> {
    let mut device = HeadlessDevice::default();
    let assets = AssetDir::new(&settings.asset_dir);
    let mut app = ShadowMappingApp::setup(&mut device, &assets, settings)?;
    println!("Shader variant: {}", app.variant().name());

    let mut gfx = FrameRecorder::new();
    let mut presses = options.presses.iter().copied();
    for frame in 0..options.frames {
        if let Some(key) = presses.next() {
            let was_fullscreen = app.is_fullscreen();
            if app.key_down(key) == AppControl::Exit {
                println!("Quit requested at frame {frame}");
                return Ok(());
            }
            if app.is_fullscreen() != was_fullscreen {
                println!("Fullscreen: {}", on_off(app.is_fullscreen()));
            }
        }

        let elapsed = frame as f32 * HEADLESS_FRAME_SECONDS;
        app.update(elapsed, settings.window_size);
        gfx.begin_frame();
        app.draw(&mut gfx);
        let recorded = gfx.finish_frame();
        let eye = app.camera().eye();
        println!(
            "Frame {frame} t={elapsed:.3} eye=({:.2}, {:.2}, {:.2}) passes={} draws={}",
            eye.x,
            eye.y,
            eye.z,
            recorded.passes.len(),
            recorded.draw_count()
        );
    }
    Ok(())
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn run_interactive(settings: Settings) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut shell = WindowShell {
        settings,
        state: None,
        last_error: None,
    };
    event_loop
        .run_app(&mut shell)
        .context("event loop terminated with error")?;

    match shell.last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Owns the window, renderer and demo once the event loop has resumed.
struct WindowShell {
    settings: Settings,
    state: Option<RunningState>,
    last_error: Option<anyhow::Error>,
}

struct RunningState {
    renderer: Renderer,
    app: ShadowMappingApp,
    gfx: FrameRecorder,
    started: Instant,
}

impl WindowShell {
    fn start(&self, event_loop: &ActiveEventLoop) -> Result<RunningState> {
        let (width, height) = self.settings.window_size;
        let attributes = Window::default_attributes()
            .with_title(self.settings.title.clone())
            .with_inner_size(LogicalSize::new(width as f64, height as f64));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );

        let mut renderer = block_on(Renderer::new(Arc::clone(&window)))?;
        let assets = AssetDir::new(&self.settings.asset_dir);
        let app = ShadowMappingApp::setup(&mut renderer, &assets, &self.settings)?;
        let size = renderer.size();
        info!(
            "rendering at {}x{} physical pixels (scale factor {:.2})",
            size.width,
            size.height,
            window.scale_factor()
        );

        Ok(RunningState {
            renderer,
            app,
            gfx: FrameRecorder::new(),
            started: Instant::now(),
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.last_error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for WindowShell {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(state) => self.state = Some(state),
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if window_id != state.renderer.window_id() {
            return;
        }
        let result = match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
                Ok(())
            }
            WindowEvent::Resized(size) => {
                state.renderer.resize(size);
                Ok(())
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if state.handle_key(&event) == AppControl::Exit {
                    event_loop.exit();
                }
                Ok(())
            }
            WindowEvent::RedrawRequested => state.redraw(),
            _ => Ok(()),
        };
        if let Err(err) = result {
            self.fail(event_loop, err);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.renderer.window().request_redraw();
        }
    }
}

impl RunningState {
    fn handle_key(&mut self, event: &KeyEvent) -> AppControl {
        if event.state != ElementState::Pressed || event.repeat {
            return AppControl::Continue;
        }
        let PhysicalKey::Code(code) = event.physical_key else {
            return AppControl::Continue;
        };
        let Some(key) = map_keycode(code) else {
            return AppControl::Continue;
        };
        self.app
            .set_fullscreen(self.renderer.window().fullscreen().is_some());
        let control = self.app.key_down(key);
        self.sync_fullscreen();
        control
    }

    fn sync_fullscreen(&self) {
        let window = self.renderer.window();
        let wanted = self.app.is_fullscreen();
        if window.fullscreen().is_some() != wanted {
            window.set_fullscreen(wanted.then_some(Fullscreen::Borderless(None)));
        }
    }

    fn redraw(&mut self) -> Result<()> {
        let size = self.renderer.size();
        self.app.update(
            self.started.elapsed().as_secs_f32(),
            (size.width, size.height),
        );
        self.gfx.begin_frame();
        self.app.draw(&mut self.gfx);
        let frame = self.gfx.finish_frame();

        match self.renderer.render(&frame) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = self.renderer.window().inner_size();
                self.renderer.resize(size);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(anyhow!("GPU is out of memory"));
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("Surface timeout; retrying next frame");
            }
            Err(err) => {
                warn!("Surface error: {err}; skipping frame");
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

fn map_keycode(code: WinitKeyCode) -> Option<KeyCode> {
    use WinitKeyCode as Key;
    Some(match code {
        Key::Escape => KeyCode::Named(NamedKey::Escape),
        Key::Space => KeyCode::Named(NamedKey::Space),
        Key::Enter => KeyCode::Named(NamedKey::Enter),
        Key::Tab => KeyCode::Named(NamedKey::Tab),
        Key::Backspace => KeyCode::Named(NamedKey::Backspace),
        Key::ArrowLeft => KeyCode::Named(NamedKey::Left),
        Key::ArrowRight => KeyCode::Named(NamedKey::Right),
        Key::ArrowUp => KeyCode::Named(NamedKey::Up),
        Key::ArrowDown => KeyCode::Named(NamedKey::Down),
        Key::Digit0 => KeyCode::Digit(0),
        Key::Digit1 => KeyCode::Digit(1),
        Key::Digit2 => KeyCode::Digit(2),
        Key::Digit3 => KeyCode::Digit(3),
        Key::Digit4 => KeyCode::Digit(4),
        Key::Digit5 => KeyCode::Digit(5),
        Key::Digit6 => KeyCode::Digit(6),
        Key::Digit7 => KeyCode::Digit(7),
        Key::Digit8 => KeyCode::Digit(8),
        Key::Digit9 => KeyCode::Digit(9),
        Key::KeyA => KeyCode::Character('A'),
        Key::KeyB => KeyCode::Character('B'),
        Key::KeyC => KeyCode::Character('C'),
        Key::KeyD => KeyCode::Character('D'),
        Key::KeyE => KeyCode::Character('E'),
        Key::KeyF => KeyCode::Character('F'),
        Key::KeyG => KeyCode::Character('G'),
        Key::KeyH => KeyCode::Character('H'),
        Key::KeyI => KeyCode::Character('I'),
        Key::KeyJ => KeyCode::Character('J'),
        Key::KeyK => KeyCode::Character('K'),
        Key::KeyL => KeyCode::Character('L'),
        Key::KeyM => KeyCode::Character('M'),
        Key::KeyN => KeyCode::Character('N'),
        Key::KeyO => KeyCode::Character('O'),
        Key::KeyP => KeyCode::Character('P'),
        Key::KeyQ => KeyCode::Character('Q'),
        Key::KeyR => KeyCode::Character('R'),
        Key::KeyS => KeyCode::Character('S'),
        Key::KeyT => KeyCode::Character('T'),
        Key::KeyU => KeyCode::Character('U'),
        Key::KeyV => KeyCode::Character('V'),
        Key::KeyW => KeyCode::Character('W'),
        Key::KeyX => KeyCode::Character('X'),
        Key::KeyY => KeyCode::Character('Y'),
        Key::KeyZ => KeyCode::Character('Z'),
        Key::F1 => KeyCode::Function(1),
        Key::F2 => KeyCode::Function(2),
        Key::F3 => KeyCode::Function(3),
        Key::F4 => KeyCode::Function(4),
        Key::F5 => KeyCode::Function(5),
        Key::F6 => KeyCode::Function(6),
        Key::F7 => KeyCode::Function(7),
        Key::F8 => KeyCode::Function(8),
        Key::F9 => KeyCode::Function(9),
        Key::F10 => KeyCode::Function(10),
        Key::F11 => KeyCode::Function(11),
        Key::F12 => KeyCode::Function(12),
        _ => return None,
    })
}

struct CliOptions {
    headless: bool,
    frames: u32,
    presses: Vec<KeyCode>,
    reduced: bool,
    assets: Option<PathBuf>,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        Self::parse_from(env::args().skip(1))
    }

    fn parse_from(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        let mut options = Self {
            headless: false,
            frames: 1,
            presses: Vec::new(),
            reduced: false,
            assets: None,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--headless" => options.headless = true,
                "--reduced" => options.reduced = true,
                "--frames" => {
                    let value = expect_value(&mut args, "--frames")?;
                    options.frames = value
                        .parse()
                        .with_context(|| format!("invalid frame count {value}"))?;
                }
                "--press" => {
                    let value = expect_value(&mut args, "--press")?;
                    let key = KeyCode::from_name(&value)
                        .ok_or_else(|| anyhow!("unknown key name {value}"))?;
                    options.presses.push(key);
                }
                "--assets" => {
                    options.assets = Some(PathBuf::from(expect_value(&mut args, "--assets")?));
                }
                other => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
            }
        }
        Ok(options)
    }

    fn settings(&self) -> Settings {
        let mut settings = Settings {
            force_reduced_shaders: self.reduced,
            ..Settings::default()
        };
        if let Some(dir) = &self.assets {
            settings.asset_dir = dir.clone();
        }
        settings
    }
}

fn expect_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| anyhow!("{flag} expects a value. {USAGE}"))
}
