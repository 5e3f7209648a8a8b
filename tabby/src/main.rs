use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use glam::{Vec2, Vec3};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use tabby_render::{Engine, Light, Mesh, Scene};
use tabby_vk::GraphicsContext;
use tabby_vk::config::{EngineSettings, PipelineSettings};
use tabby_vk::types::Vertex;
use tabby_vk::winit;

const USAGE: &str =
    "usage: tabby <vertex.spv> <fragment.spv> [--instancing <instance.spv>] [model.obj] [texture.png]";

/// Whether to enable validation layers or not
const VALIDATION: bool = cfg!(debug_assertions);

const INSTANCES: usize = 4;

const CAMERA_STEP: f32 = 0.1;

#[derive(Debug, Default)]
struct Args {
    vertex_shader: PathBuf,
    fragment_shader: PathBuf,
    instance_shader: Option<PathBuf>,
    model: Option<PathBuf>,
    texture: Option<PathBuf>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut positional = Vec::new();
        let mut instance_shader = None;
        while let Some(arg) = args.next() {
            if arg == "--instancing" {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--instancing needs a shader\n{USAGE}"))?;
                instance_shader = Some(PathBuf::from(path));
            } else {
                positional.push(PathBuf::from(arg));
            }
        }
        let mut positional = positional.into_iter();
        let (Some(vertex_shader), Some(fragment_shader)) = (positional.next(), positional.next())
        else {
            anyhow::bail!(USAGE);
        };
        Ok(Self {
            vertex_shader,
            fragment_shader,
            instance_shader,
            model: positional.next(),
            texture: positional.next(),
        })
    }
}

/// A single colored triangle, used when no model is given
fn triangle() -> Mesh {
    let corner = |pos: Vec3, color: Vec3, tex_coord: Vec2| Vertex {
        pos,
        color,
        tex_coord,
        normal: Vec3::Z,
    };
    Mesh::new(
        "triangle",
        vec![
            corner(Vec3::new(-0.5, -0.5, 0.0), Vec3::X, Vec2::new(0.0, 1.0)),
            corner(Vec3::new(0.5, -0.5, 0.0), Vec3::Y, Vec2::new(1.0, 1.0)),
            corner(Vec3::new(0.0, 0.5, 0.0), Vec3::Z, Vec2::new(0.5, 0.0)),
        ],
        vec![0, 1, 2],
    )
}

// Fields are dropped in order, the scene has to go before the engine
struct RenderState {
    scene: Scene<GraphicsContext>,
    engine: Engine,
    started: Instant,
    last_fps: Option<u32>,
}

impl RenderState {
    fn new(window: &winit::window::Window, args: &Args) -> anyhow::Result<Self> {
        let pipeline = PipelineSettings::from_spirv_files(
            &args.vertex_shader,
            &args.fragment_shader,
            args.instance_shader.as_deref(),
        )?;
        let settings = EngineSettings::builder()
            .application_name("Tabby")
            .validation(VALIDATION)
            .pipeline(pipeline)
            .build()?;
        let mut engine = Engine::new(window, settings)?;
        let mut scene = Scene::new(engine.context_mut(), None, None)?;

        let object = match &args.model {
            Some(path) => scene.load_model(path)?,
            None => scene.add_mesh(Arc::new(triangle())),
        };
        if let Some(path) = &args.texture {
            let material = scene.load_image_texture(engine.context_mut(), path)?;
            if let Some(object) = scene.object_mut(object) {
                object.material = material;
            }
        }
        if args.instance_shader.is_some() {
            for i in 0..INSTANCES {
                if let Some(id) = scene.create_instance(object) {
                    if let Some(instance) = scene.instance_mut(id) {
                        instance.data.pos = Vec3::new(1.5 * (i as f32 + 1.0), 0.0, 0.0);
                    }
                }
            }
        }
        let light = scene.create_light();
        if let Some(light) = scene.light_mut(light) {
            *light = Light {
                position: Vec3::new(3.0, 3.0, 3.0),
                ..Default::default()
            };
        }
        scene.actualize(engine.context_mut())?;
        info!("Scene ready with {} objects", scene.objects().len());

        Ok(Self {
            scene,
            engine,
            started: Instant::now(),
            last_fps: None,
        })
    }

    fn draw(&mut self) -> anyhow::Result<()> {
        let degrees = self.started.elapsed().as_secs_f32() * 45.0;
        for id in self.scene.objects().iter().map(|o| o.id()).collect::<Vec<_>>() {
            if let Some(object) = self.scene.object_mut(id) {
                object.transform.degrees = degrees;
            }
        }
        self.scene.update(self.engine.context())?;
        self.engine.draw_frame()?;
        if self.engine.fps() != self.last_fps {
            self.last_fps = self.engine.fps();
            if let Some(fps) = self.last_fps {
                info!("{fps} fps");
            }
        }
        Ok(())
    }

    /// WASD moves the camera along its view direction
    fn move_camera(&mut self, key: winit::keyboard::KeyCode) {
        use winit::keyboard::KeyCode;
        let camera = self.scene.camera_mut();
        let forward = camera.direction.normalize_or_zero() * CAMERA_STEP;
        let right = camera.direction.cross(camera.up).normalize_or_zero() * CAMERA_STEP;
        match key {
            KeyCode::KeyW => camera.position += forward,
            KeyCode::KeyS => camera.position -= forward,
            KeyCode::KeyA => camera.position -= right,
            KeyCode::KeyD => camera.position += right,
            _ => {}
        }
    }

    fn shutdown(self) {
        if let Err(err) = self.engine.finish_drawing() {
            error!("Waiting for the device failed: {err}");
        }
    }
}

struct App {
    args: Args,
    window: Option<winit::window::Window>,
    render_state: Option<RenderState>,
    error: Option<anyhow::Error>,
}

impl App {
    fn fail(&mut self, event_loop: &winit::event_loop::ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        if let Some(render_state) = self.render_state.take() {
            render_state.shutdown();
        }
        self.error = Some(err);
        event_loop.exit();
    }
}

impl winit::application::ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &winit::event_loop::ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window = match event_loop.create_window(
            winit::window::WindowAttributes::default()
                .with_title("Tabby")
                .with_resizable(true),
        ) {
            Ok(window) => window,
            Err(err) => return self.fail(event_loop, anyhow::anyhow!("{err}")),
        };
        match RenderState::new(&window, &self.args) {
            Ok(render_state) => self.render_state = Some(render_state),
            Err(err) => return self.fail(event_loop, err),
        }
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &winit::event_loop::ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: winit::event::WindowEvent,
    ) {
        let Some(render_state) = self.render_state.as_mut() else {
            return;
        };
        let result = match event {
            winit::event::WindowEvent::CloseRequested => {
                if let Some(render_state) = self.render_state.take() {
                    render_state.shutdown();
                }
                event_loop.exit();
                Ok(())
            }
            winit::event::WindowEvent::Resized(size) => render_state
                .engine
                .resize(size.width, size.height)
                .map_err(anyhow::Error::from),
            winit::event::WindowEvent::KeyboardInput { event, .. } => {
                if let (winit::event::ElementState::Pressed, winit::keyboard::PhysicalKey::Code(key)) =
                    (event.state, event.physical_key)
                {
                    render_state.move_camera(key);
                }
                Ok(())
            }
            winit::event::WindowEvent::RedrawRequested => {
                match self.window.as_ref().map(|window| window.inner_size()) {
                    // do not draw while minimized
                    Some(size) if size.width == 0 || size.height == 0 => Ok(()),
                    _ => render_state.draw(),
                }
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            self.fail(event_loop, err);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &winit::event_loop::ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse(std::env::args().skip(1))?;
    let event_loop =
        winit::event_loop::EventLoop::new().map_err(|err| anyhow::anyhow!("{err}"))?;
    event_loop.set_control_flow(winit::event_loop::ControlFlow::Poll);
    let mut app = App {
        args,
        window: None,
        render_state: None,
        error: None,
    };
    event_loop
        .run_app(&mut app)
        .map_err(|err| anyhow::anyhow!("{err}"))?;
    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Args> {
        Args::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn shaders_are_required() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["main.vert.spv"]).is_err());
    }

    #[test]
    fn optional_paths() {
        let args = parse(&[
            "main.vert.spv",
            "main.frag.spv",
            "--instancing",
            "instance.vert.spv",
            "cube.obj",
        ])
        .unwrap();
        assert_eq!(args.instance_shader, Some(PathBuf::from("instance.vert.spv")));
        assert_eq!(args.model, Some(PathBuf::from("cube.obj")));
        assert_eq!(args.texture, None);
        assert!(parse(&["a", "b", "--instancing"]).is_err());
    }
}
