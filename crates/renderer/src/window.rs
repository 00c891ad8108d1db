use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use storm::Storm;
use tracing::{error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::gpu::GpuState;
use crate::runtime::{time_source_for_policy, BoxedTimeSource, FrameScheduler, RenderPolicy};
use crate::types::RendererConfig;

/// Everything the frame callback needs to own.
struct WindowState {
    window: Arc<Window>,
    gpu: GpuState,
    storm: Storm,
    time_source: BoxedTimeSource,
}

impl WindowState {
    fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self> {
        let size = window.inner_size();
        let gpu = GpuState::new(window.as_ref(), size, config.antialiasing, &config.params)?;
        let storm = match config.seed {
            Some(seed) => Storm::new(config.tuning.clone(), seed)?,
            None => Storm::from_entropy(config.tuning.clone())?,
        };
        Ok(Self {
            window,
            gpu,
            storm,
            time_source: time_source_for_policy(&config.policy),
        })
    }

    /// One animation frame: re-measure, advance the storm, draw.
    ///
    /// The per-frame size check is the authoritative resize mechanism; the
    /// `Resized` event only shortens the window between a size change and the
    /// next scheduled frame.
    fn render_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        let measured = self.window.inner_size();
        if needs_resize(self.gpu.size(), measured) {
            self.gpu.resize(measured);
        }
        let sample = self.time_source.sample();
        let intensity = self.storm.advance_to(Duration::from_secs_f32(sample.seconds));
        self.gpu.render(sample.seconds, intensity)
    }

    fn export_frame(&mut self, time: Option<f32>, path: &std::path::Path) -> Result<()> {
        let seconds = time.unwrap_or(0.0).max(0.0);
        let intensity = self.storm.advance_to(Duration::from_secs_f32(seconds));
        let written = self.gpu.render_export(seconds, intensity, path)?;
        info!(path = %written.display(), time = seconds, "exported lightning frame");
        Ok(())
    }
}

/// Opens a window and drives the lightning effect until it is closed.
///
/// For the export policy the window stays invisible and the loop exits after
/// the single frame has been written.
pub fn run_windowed(config: RendererConfig) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let exporting = matches!(config.policy, RenderPolicy::Export { .. });
    let window = WindowBuilder::new()
        .with_title(&config.window_title)
        .with_inner_size(window_size)
        .with_visible(!exporting)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window.clone(), &config)?;
    let mut scheduler = FrameScheduler::new(&config.policy);
    let policy = config.policy.clone();

    if scheduler.ready_for_frame(Instant::now()) {
        state.window.request_redraw();
    }

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == state.window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                elwt.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let escape = matches!(event.logical_key, Key::Named(NamedKey::Escape));
                if escape && event.state == ElementState::Pressed && !event.repeat {
                    elwt.exit();
                }
            }
            WindowEvent::Resized(new_size) => {
                state.gpu.resize(new_size);
                // Still frames render on demand, so a resize must repaint.
                state.window.request_redraw();
            }
            WindowEvent::RedrawRequested => {
                if let RenderPolicy::Export { time, ref path } = policy {
                    if let Err(err) = state.export_frame(time, path) {
                        error!(error = %err, "failed to export frame");
                    }
                    elwt.exit();
                    return;
                }
                match state.render_frame() {
                    Ok(()) => scheduler.mark_rendered(Instant::now()),
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        state.gpu.resize(state.window.inner_size());
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        error!("surface out of memory; stopping renderer");
                        elwt.exit();
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        warn!("surface timeout; retrying next frame");
                    }
                    Err(other) => {
                        warn!(error = ?other, "surface error; retrying next frame");
                    }
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            let now = Instant::now();
            if scheduler.ready_for_frame(now) {
                state.window.request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            } else if let Some(deadline) = scheduler.next_deadline() {
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            } else {
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}

/// True when the window's measured size differs from the configured surface.
fn needs_resize(current: PhysicalSize<u32>, measured: PhysicalSize<u32>) -> bool {
    measured.width != 0 && measured.height != 0 && measured != current
}

#[cfg(test)]
mod tests {
    use super::needs_resize;
    use winit::dpi::PhysicalSize;

    #[test]
    fn resize_triggers_only_on_real_changes() {
        let current = PhysicalSize::new(1280, 720);
        assert!(!needs_resize(current, PhysicalSize::new(1280, 720)));
        assert!(needs_resize(current, PhysicalSize::new(1281, 720)));
        assert!(needs_resize(current, PhysicalSize::new(1280, 719)));
    }

    #[test]
    fn degenerate_measurements_are_ignored() {
        let current = PhysicalSize::new(1280, 720);
        assert!(!needs_resize(current, PhysicalSize::new(0, 720)));
        assert!(!needs_resize(current, PhysicalSize::new(1280, 0)));
    }
}
