use std::any::Any;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::info;
use pollster::block_on;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::PhysicalKey;
use winit::platform::run_on_demand::EventLoopExtRunOnDemand;
use winit::window::WindowBuilder;

use moto_showcase::{
    assemble_frame, default_bindings, load_mesh_file, unit_cube, Binding, InputState, KeyCode,
    Mesh, MeshSource, NamedKey, Renderer, SceneState,
};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let mut state = SceneState::new();
    if let Some(hours) = options.start_time {
        state.cycle.set_time(hours);
    }

    let meshes = load_meshes(&state, &options.assets_dir)?;
    print_summary(&state, &meshes);

    if options.headless {
        return Ok(());
    }

    match run_interactive(&mut state, &meshes) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Scene summary printed above; set DISPLAY or install X11 libs to enable rendering, or pass --headless."
                );
            }
            Err(err)
        }
    }
}

/// Loads every OBJ the scene references, plus the built-in marker cube.
fn load_meshes(state: &SceneState, assets_dir: &Path) -> Result<HashMap<MeshSource, Mesh>> {
    let mut meshes = HashMap::new();
    for object in &state.objects {
        if let MeshSource::File(name) = &object.mesh {
            let mesh = load_mesh_file(assets_dir, name)
                .with_context(|| format!("failed to load mesh for {}", object.name))?;
            meshes.insert(object.mesh.clone(), mesh);
        }
    }
    meshes.insert(MeshSource::BuiltinCube, unit_cube());
    Ok(meshes)
}

fn print_summary(state: &SceneState, meshes: &HashMap<MeshSource, Mesh>) {
    println!(
        "Loaded scene with {} objects ({} point lights)",
        state.objects.len(),
        state.point_lights.len()
    );
    for object in &state.objects {
        let triangles = meshes
            .get(&object.mesh)
            .map(Mesh::triangle_count)
            .unwrap_or(0);
        let source = match &object.mesh {
            MeshSource::File(name) => name.as_str(),
            MeshSource::BuiltinCube => "builtin cube",
        };
        println!(" - {} ({source}, {triangles} triangles)", object.name);
    }
    println!(
        "Time of day: {:.2}h ({:?}), sun intensity {:.2}",
        state.cycle.time_of_day(),
        state.cycle.phase(),
        state.cycle.sun_intensity()
    );
}

fn run_interactive(state: &mut SceneState, meshes: &HashMap<MeshSource, Mesh>) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let mut event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Moto Showcase")
            .with_inner_size(LogicalSize::new(1024.0, 768.0))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let renderer = block_on(Renderer::new(Arc::clone(&window), meshes))?;
    renderer.set_sky_phase(state.cycle.phase());

    let mut app = AppState {
        renderer,
        state,
        input: InputState::new(),
        bindings: default_bindings(),
        last_error: None,
    };

    event_loop
        .run_on_demand(|event, target| {
            target.set_control_flow(ControlFlow::Poll);
            if let Err(err) = app.process_event(&event, target) {
                app.last_error = Some(err);
                target.exit();
            }
        })
        .context("event loop failed")?;

    if let Some(err) = app.last_error {
        return Err(err);
    }
    Ok(())
}

struct AppState<'a> {
    renderer: Renderer,
    state: &'a mut SceneState,
    input: InputState,
    bindings: Vec<Binding>,
    last_error: Option<anyhow::Error>,
}

impl AppState<'_> {
    fn process_event(
        &mut self,
        event: &Event<()>,
        target: &EventLoopWindowTarget<()>,
    ) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } if *window_id == self.renderer.window_id() => {
                match event {
                    WindowEvent::CloseRequested => {
                        target.exit();
                    }
                    WindowEvent::Resized(size) => {
                        self.renderer.resize(*size);
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        self.handle_keyboard(event);
                    }
                    WindowEvent::RedrawRequested => {
                        self.render_frame(target)?;
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                self.renderer.window().request_redraw();
            }
            _ => {}
        }
        Ok(())
    }

    /// One frame: drain input into the scene state, advance the clock,
    /// snapshot a packet and render it. Sky phase events retune the sky
    /// palette as they surface.
    fn render_frame(&mut self, target: &EventLoopWindowTarget<()>) -> Result<()> {
        for action in self.input.resolve_actions(&self.bindings) {
            if let Some(phase) = self.state.apply(action) {
                self.renderer.set_sky_phase(phase);
            }
        }
        if let Some(phase) = self.state.advance_frame() {
            self.renderer.set_sky_phase(phase);
        }
        if self.state.quit_requested() {
            target.exit();
            return Ok(());
        }

        let packet = assemble_frame(self.state, self.renderer.aspect());
        self.renderer.update_globals(&packet);
        if let Err(err) = self.renderer.render(&packet) {
            match err {
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                    let size = self.renderer.window().inner_size();
                    self.renderer.resize(size);
                }
                wgpu::SurfaceError::OutOfMemory => {
                    return Err(anyhow!("GPU is out of memory"));
                }
                wgpu::SurfaceError::Timeout => {
                    info!("Surface timeout; retrying next frame");
                }
                wgpu::SurfaceError::Other => {
                    return Err(anyhow!("surface error: {err}"));
                }
            }
        }
        Ok(())
    }

    fn handle_keyboard(&self, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let Some(keycode) = map_keycode(code) else {
            return;
        };
        match event.state {
            ElementState::Pressed => self.input.set_key_down(keycode),
            ElementState::Released => self.input.set_key_up(keycode),
        }
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

fn map_keycode(code: winit::keyboard::KeyCode) -> Option<KeyCode> {
    use winit::keyboard::KeyCode as Key;
    Some(match code {
        Key::Escape => KeyCode::Named(NamedKey::Escape),
        Key::Space => KeyCode::Named(NamedKey::Space),
        Key::ArrowLeft => KeyCode::Named(NamedKey::Left),
        Key::ArrowRight => KeyCode::Named(NamedKey::Right),
        Key::ArrowUp => KeyCode::Named(NamedKey::Up),
        Key::ArrowDown => KeyCode::Named(NamedKey::Down),
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
        _ => return None,
    })
}

struct CliOptions {
    assets_dir: PathBuf,
    headless: bool,
    start_time: Option<f32>,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut assets_dir = None;
        let mut headless = false;
        let mut start_time = None;
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--headless" => headless = true,
                "--time" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--time requires a value in hours"))?;
                    let hours = value
                        .parse::<f32>()
                        .with_context(|| format!("bad --time value {value:?}"))?;
                    start_time = Some(hours);
                }
                other if other.starts_with("--") => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Usage: moto-showcase [assets-dir] [--headless] [--time <hours>]"
                    ));
                }
                other => {
                    if assets_dir.replace(PathBuf::from(other)).is_some() {
                        return Err(anyhow!("more than one assets directory given"));
                    }
                }
            }
        }
        Ok(Self {
            assets_dir: assets_dir.unwrap_or_else(|| PathBuf::from("assets")),
            headless,
            start_time,
        })
    }
}
