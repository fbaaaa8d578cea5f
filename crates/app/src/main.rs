//! Frame loop demo binary.
//!
//! Drives the renderer through the winit event loop: clears the screen
//! every frame, keeps per-slot uniforms up to date, and exercises the
//! geometry registry. Drawing registered geometry requires a pipeline from
//! an external provider (shader compilation lives outside this
//! workspace); without one the demo records a clear-only frame.

use std::path::Path;

use anyhow::Result;
use glam::{Mat4, Vec2};
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use frameloop_core::{RendererConfig, Timer};
use frameloop_platform::Window;
use frameloop_renderer::{FrameUniforms, PipelineProvider, Renderer};
use frameloop_rhi::descriptor::{
    BindingKind, DescriptorPool, DescriptorSetLayout, FrameDescriptorSets,
};

/// Clear color for the demo (dark blue-gray).
const CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.15, 1.0];

/// Registry name of the demo geometry.
const TRIANGLE: &str = "triangle";

/// Registry name of the per-frame uniform set.
const FRAME_UNIFORMS: &str = "frame";

/// Per-frame descriptor machinery for the demo's uniform set.
struct FrameDescriptors {
    sets: FrameDescriptorSets,
    // Kept alive for the sets allocated from/against them
    #[allow(dead_code)]
    pool: DescriptorPool,
    #[allow(dead_code)]
    layout: DescriptorSetLayout,
}

impl FrameDescriptors {
    fn new(renderer: &Renderer) -> frameloop_rhi::RhiResult<Self> {
        let device = renderer.device().clone();
        let frame_count = renderer.frame_count();

        let layout = DescriptorSetLayout::per_frame_uniform(device.clone())?;
        let mut pool = DescriptorPool::new(
            device.clone(),
            frame_count as u32,
            &[(BindingKind::UniformBuffer, frame_count as u32)],
        )?;
        let sets = FrameDescriptorSets::allocate(device, &mut pool, &layout, frame_count)?;

        Ok(Self { sets, pool, layout })
    }
}

struct App {
    // Dropped in declaration order: descriptor objects and any pipeline
    // must go before the renderer, which tears the device down
    descriptors: Option<FrameDescriptors>,
    pipeline: Option<Box<dyn PipelineProvider>>,
    renderer: Option<Renderer>,
    window: Option<Window>,
    config: RendererConfig,
    timer: Timer,
}

impl App {
    fn new(config: RendererConfig) -> Self {
        Self {
            descriptors: None,
            // A pipeline provider (compiled shaders + pipeline layout) is
            // supplied by external tooling; the demo runs without one
            pipeline: None,
            renderer: None,
            window: None,
            config,
            timer: Timer::new(),
        }
    }

    fn setup_scene(&mut self) -> Result<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        // A single triangle: interleaved position (xy) + color (rgb)
        #[rustfmt::skip]
        let vertices: [f32; 15] = [
             0.0, -0.5,   1.0, 0.0, 0.0,
             0.5,  0.5,   0.0, 1.0, 0.0,
            -0.5,  0.5,   0.0, 0.0, 1.0,
        ];
        let indices: [u32; 3] = [0, 1, 2];

        renderer
            .resources_mut()
            .create_geometry(TRIANGLE, bytemuck::cast_slice(&vertices), &indices)?;

        // One uniform buffer per frame slot, bound to each slot's set
        renderer
            .resources_mut()
            .create_uniforms::<FrameUniforms>(FRAME_UNIFORMS)?;

        let descriptors = FrameDescriptors::new(renderer)?;
        let buffers = renderer
            .resources()
            .uniform_buffers(FRAME_UNIFORMS)
            .expect("uniform set was just created");
        descriptors.sets.bind_uniform_buffers(0, &buffers)?;

        self.descriptors = Some(descriptors);

        info!("Demo scene registered");
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        let Some(frame) = renderer.begin_frame()? else {
            // Swapchain was stale or the window is minimized; retry on
            // the next redraw
            return Ok(());
        };

        // The slot's fence has signaled, so this slot's uniform buffer is
        // no longer read by the GPU and may be overwritten
        let extent = renderer.extent();
        let uniforms = FrameUniforms::new(
            Mat4::IDENTITY,
            Vec2::new(extent.width as f32, extent.height as f32),
            self.timer.elapsed_secs(),
        );
        renderer
            .resources()
            .write_uniform(FRAME_UNIFORMS, frame.frame_slot, &uniforms)?;

        renderer.begin_render_pass(frame, CLEAR_COLOR)?;
        renderer.set_viewport_and_scissor(frame);

        if let Some(pipeline) = self.pipeline.as_deref() {
            renderer.bind_pipeline(frame, pipeline);
            if let Some(descriptors) = &self.descriptors {
                renderer.bind_descriptor_set(frame, pipeline.layout(), &descriptors.sets);
            }
            renderer.draw_geometry(frame);
        }

        renderer.draw_ui(frame, None);

        renderer.end_render_pass(frame);
        renderer.end_frame(frame)?;

        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match Window::new(
            event_loop,
            self.config.window.width,
            self.config.window.height,
            &self.config.window.title,
        ) {
            Ok(window) => window,
            Err(e) => {
                error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match Renderer::new(&window, &self.config) {
            Ok(renderer) => {
                self.renderer = Some(renderer);
                self.window = Some(window);

                if let Err(e) = self.setup_scene() {
                    error!("Failed to set up demo scene: {:?}", e);
                    event_loop.exit();
                    return;
                }

                info!("Initialization complete, entering main loop");
            }
            Err(e) => {
                error!("Failed to create renderer: {:?}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                info!("Window resized to {}x{}", size.width, size.height);
                if let Some(ref mut renderer) = self.renderer {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    // Fatal: a failed acquire/submit/present terminates
                    // the loop rather than retrying
                    error!("Render error: {:?}", e);
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    frameloop_core::init_logging();

    let config = RendererConfig::load_or_default(Path::new("frameloop.toml"));
    info!(
        "Starting frameloop ({}x{}, {} frames in flight)",
        config.window.width, config.window.height, config.frames_in_flight
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
