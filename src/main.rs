//! Immersive Sphere - Demo Host
//!
//! Shows a slowly turning background panorama and a spinning quad on the
//! sphere, either as the flat preview, warped for the display, or wrapped on
//! a 3D sphere.
//!
//! Usage: `immersive-sphere [background] [quad] [fade-video]`
//!
//! Keys: `P` sphere preview, `S` warp for the sphere, `F` fade the quad to the
//! video, `Ctrl+S` save settings, `Esc` quit.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use glam::{Quat, Vec3};
use immersive_sphere::gpu::{GpuContext, SphereRenderer, WindowSurface};
use immersive_sphere::render::{RenderList, RenderOp, WHITE};
use immersive_sphere::telemetry::{init_logging, FrameTimer, LogConfig};
use immersive_sphere::{ObjectId, Scene, SphereSettings};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, Modifiers, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

const WINDOW_TITLE: &str = "Immersive Sphere";
const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 720;
const FADE_DURATION: Duration = Duration::from_secs(1);
/// Title refresh interval in frames
const TITLE_INTERVAL: u64 = 60;

/// Media the demo shows
struct Assets {
    background: PathBuf,
    quad: PathBuf,
    fade_video: PathBuf,
}

impl Assets {
    fn from_args() -> Self {
        let mut args = std::env::args().skip(1).map(PathBuf::from);
        Self {
            background: args.next().unwrap_or_else(|| PathBuf::from("spherical.png")),
            quad: args.next().unwrap_or_else(|| PathBuf::from("video_frame.png")),
            fade_video: args.next().unwrap_or_else(|| PathBuf::from("fade.gif")),
        }
    }
}

/// Everything alive while the window is open
struct Running {
    window: Arc<Window>,
    gpu: GpuContext,
    surface: WindowSurface,
    renderer: SphereRenderer,
    scene: Scene,
    list: RenderList,
    background: ObjectId,
    quad: ObjectId,
    draw_sphere: bool,
    frame: u64,
    timer: FrameTimer,
}

enum AppState {
    Uninitialized { settings: SphereSettings },
    Running(Box<Running>),
    Failed,
}

struct SphereApp {
    state: AppState,
    assets: Assets,
    modifiers: Modifiers,
}

impl SphereApp {
    fn new(settings: SphereSettings, assets: Assets) -> Self {
        Self {
            state: AppState::Uninitialized { settings },
            assets,
            modifiers: Modifiers::default(),
        }
    }

    fn start(event_loop: &ActiveEventLoop, settings: SphereSettings, assets: &Assets) -> anyhow::Result<Running> {
        let window_attributes = WindowAttributes::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT));
        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .context("Failed to create window")?,
        );

        tracing::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        let (gpu, surface) =
            pollster::block_on(GpuContext::new(Arc::clone(&window))).context("Failed to initialize GPU")?;

        let mut scene = Scene::new(settings);
        let (canvas_width, canvas_height) = (scene.canvas().width(), scene.canvas().height());
        if canvas_width > gpu.max_texture_size() {
            tracing::warn!(
                "Canvas {}x{} exceeds the GPU texture limit of {}",
                canvas_width,
                canvas_height,
                gpu.max_texture_size()
            );
        }

        let renderer = SphereRenderer::for_scene(&gpu, &scene);
        let background = scene.create_object_from_image(&assets.background);
        let quad = scene.create_object_from_image(&assets.quad);

        Ok(Running {
            window,
            gpu,
            surface,
            renderer,
            scene,
            list: RenderList::new(),
            background,
            quad,
            draw_sphere: false,
            frame: 0,
            timer: FrameTimer::default(),
        })
    }
}

impl Running {
    /// Turn the background and spin the quad
    fn animate(&mut self) {
        let frame = self.frame as f32;

        if let Some(background) = self.scene.object_mut(self.background) {
            background.rotation = Quat::from_axis_angle(Vec3::Z, (-frame / 10.0).to_radians());
        }

        if let Some(quad) = self.scene.object_mut(self.quad) {
            // Swing between -30 and 30 degrees while spinning
            let q1 = Quat::from_axis_angle(Vec3::Y, (30.0 * (frame / 20.0).sin()).to_radians());
            let q2 = Quat::from_axis_angle(Vec3::Z, frame.to_radians());
            let q3 = Quat::from_axis_angle(Vec3::X, (frame * 3.0).to_radians());
            quad.rotation = q3 * q2 * q1;
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        self.timer.begin_frame();
        self.frame += 1;

        self.animate();
        self.scene.update();

        self.list.clear();
        self.scene.render(&mut self.list);
        self.list.push(RenderOp::Clear(WHITE));

        let (width, height) = self.surface.size();
        if self.draw_sphere {
            let radius = width.min(height) as f32 * 0.4;
            let center = Vec3::new(width as f32 / 2.0, height as f32 / 2.0, 10.0);
            self.scene.draw_sphere(center, radius, &mut self.list);
        } else {
            self.scene.draw(width, height, &mut self.list);
        }

        match self.renderer.render_to_surface(&self.gpu, &self.surface, &self.list) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.reconfigure(&self.gpu);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                tracing::error!("Out of GPU memory, exiting");
                event_loop.exit();
            }
            Err(e) => tracing::warn!("Surface error: {:?}", e),
        }

        if self.frame % TITLE_INTERVAL == 0 {
            let stats = self.timer.stats();
            self.window
                .set_title(&format!("{} - {:.0} fps ({:.1} ms)", WINDOW_TITLE, stats.fps, stats.avg_ms));
        }
    }

    fn handle_key(&mut self, key: KeyCode, command: bool, fade_video: &Path) {
        match key {
            KeyCode::KeyS if command => match self.scene.settings().save_default() {
                Ok(path) => tracing::info!("Saved sphere settings to {}", path.display()),
                Err(e) => tracing::error!("Failed to save sphere settings: {}", e),
            },
            KeyCode::KeyP => {
                self.draw_sphere = !self.draw_sphere;
                tracing::info!("Sphere preview {}", if self.draw_sphere { "on" } else { "off" });
            }
            KeyCode::KeyS => {
                let settings = self.scene.settings_mut();
                settings.render_for_sphere = !settings.render_for_sphere;
                tracing::info!("Render for sphere: {}", settings.render_for_sphere);
            }
            KeyCode::KeyF => {
                if let Some(quad) = self.scene.object_mut(self.quad) {
                    quad.fade_to_video(fade_video, Some(FADE_DURATION));
                }
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for SphereApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Uninitialized { settings } = &self.state else {
            return;
        };

        tracing::info!("Creating window...");
        match Self::start(event_loop, settings.clone(), &self.assets) {
            Ok(running) => {
                tracing::info!("Immersive Sphere ready!");
                tracing::info!("P: sphere preview, S: render for sphere, F: fade, Ctrl+S: save, ESC: exit");
                running.window.request_redraw();
                self.state = AppState::Running(Box::new(running));
            }
            Err(e) => {
                tracing::error!("Startup failed: {:#}", e);
                self.state = AppState::Failed;
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let AppState::Running(running) = &mut self.state else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                tracing::info!("Close requested, exiting...");
                event_loop.exit();
            }
            WindowEvent::ModifiersChanged(new_modifiers) => {
                self.modifiers = new_modifiers;
            }
            WindowEvent::Resized(new_size) => {
                running.surface.resize(&running.gpu, new_size.width, new_size.height);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                let command = self.modifiers.state().super_key() || self.modifiers.state().control_key();
                running.handle_key(key, command, &self.assets.fade_video);
            }
            WindowEvent::RedrawRequested => {
                running.redraw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Running(running) = &self.state else {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        };

        // Presentation paces the loop
        running.window.request_redraw();
        event_loop.set_control_flow(ControlFlow::Poll);
    }
}

fn main() -> anyhow::Result<()> {
    let log_config = LogConfig::default();
    // Keep the guard alive for the program duration
    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("Immersive Sphere v{}", env!("CARGO_PKG_VERSION"));

    let settings = match SphereSettings::default_path() {
        Some(path) => {
            tracing::info!("Loading sphere settings from {}", path.display());
            SphereSettings::load_or_default(&path)
        }
        None => SphereSettings::default(),
    };

    tracing::info!(
        "Sphere resolution {}, fov {}, render for sphere: {}",
        settings.sphere_resolution,
        settings.fov,
        settings.render_for_sphere
    );

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = SphereApp::new(settings, Assets::from_args());
    event_loop.run_app(&mut app).context("Event loop error")?;
    Ok(())
}
