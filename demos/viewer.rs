// Minimal map viewer: loads the .tmx given on the command line and draws
// every layer with arrow-key panning. Escape quits.
//
//     cargo run --example viewer -- path/to/map.tmx

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use glam::{Mat4, Vec2};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use wgpu_tmx::{GpuContext, TileMapRenderer, load_level};

/// Camera pan speed in world pixels per second.
const PAN_SPEED: f32 = 300.0;
/// Seconds between animation frame advances.
const ANIM_INTERVAL: f32 = 0.15;

struct Viewer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    map: TileMapRenderer,
    /// World-space position at the centre of the view.
    camera_pos: Vec2,
    /// Arrow keys currently held: left, right, up, down.
    held: [bool; 4],
    last_frame: Instant,
    anim_timer: f32,
}

impl Viewer {
    async fn new(window: Arc<Window>, map_path: &Path) -> Self {
        let size = window.inner_size();

        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(Arc::clone(&window)).unwrap();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                compatible_surface: Some(&surface),
                ..Default::default()
            })
            .await
            .expect("no suitable GPU adapter found");

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .expect("failed to create device");

        let caps = surface.get_capabilities(&adapter);
        let format = caps.formats[0];

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let ctx = GpuContext {
            device: device.clone(),
            queue: queue.clone(),
            output_format: format,
        };
        let map = load_level(map_path, &ctx).expect("failed to load map");
        for index in 0..map.layer_count() {
            println!("layer {index}: {:?}", map.layer_name(index).unwrap_or(""));
        }

        // World origin at the bottom-left of the screen to start with.
        let camera_pos = Vec2::new(config.width as f32 * 0.5, config.height as f32 * 0.5);

        Self {
            window,
            surface,
            device,
            queue,
            config,
            map,
            camera_pos,
            held: [false; 4],
            last_frame: Instant::now(),
            anim_timer: 0.0,
        }
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Pixel-perfect orthographic view centred on `camera_pos`, world y up.
    fn camera_matrix(&self) -> Mat4 {
        let half_w = self.config.width as f32 * 0.5;
        let half_h = self.config.height as f32 * 0.5;
        Mat4::orthographic_rh(
            self.camera_pos.x - half_w,
            self.camera_pos.x + half_w,
            self.camera_pos.y - half_h,
            self.camera_pos.y + half_h,
            -1.0,
            1.0,
        )
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32().min(0.25);
        self.last_frame = now;

        let mut dir = Vec2::ZERO;
        if self.held[0] {
            dir.x -= 1.0;
        }
        if self.held[1] {
            dir.x += 1.0;
        }
        if self.held[2] {
            dir.y += 1.0;
        }
        if self.held[3] {
            dir.y -= 1.0;
        }
        self.camera_pos += dir * PAN_SPEED * dt;

        self.anim_timer += dt;
        let advance = self.anim_timer >= ANIM_INTERVAL;
        if advance {
            self.anim_timer -= ANIM_INTERVAL;
        }

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost) => {
                self.surface.configure(&self.device, &self.config);
                return;
            }
            Err(e) => {
                eprintln!("render error: {e}");
                return;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // The map passes load the existing target, so clear it first.
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.08,
                        g: 0.08,
                        b: 0.10,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        self.queue.submit(std::iter::once(encoder.finish()));

        self.map
            .render_all(&view, self.camera_matrix(), Vec2::ZERO, advance);
        frame.present();
    }
}

struct App {
    map_path: PathBuf,
    viewer: Option<Viewer>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let window = Arc::new(
            event_loop
                .create_window(
                    Window::default_attributes()
                        .with_title("wgpu_tmx viewer")
                        .with_inner_size(PhysicalSize::new(1280u32, 720u32)),
                )
                .unwrap(),
        );
        self.viewer = Some(pollster::block_on(Viewer::new(window, &self.map_path)));
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(viewer) = self.viewer.as_ref() {
            viewer.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(viewer) = self.viewer.as_mut() else { return };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::Resized(size) => viewer.resize(size),

            WindowEvent::RedrawRequested => viewer.redraw(),

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => {
                let down = state == ElementState::Pressed;
                match code {
                    KeyCode::Escape if down => event_loop.exit(),
                    KeyCode::ArrowLeft => viewer.held[0] = down,
                    KeyCode::ArrowRight => viewer.held[1] = down,
                    KeyCode::ArrowUp => viewer.held[2] = down,
                    KeyCode::ArrowDown => viewer.held[3] = down,
                    _ => {}
                }
            }

            _ => {}
        }
    }
}

fn main() {
    env_logger::init();

    let map_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .expect("usage: viewer <map.tmx>");

    let event_loop = EventLoop::new().unwrap();
    let mut app = App {
        map_path,
        viewer: None,
    };
    event_loop.run_app(&mut app).unwrap();
}
