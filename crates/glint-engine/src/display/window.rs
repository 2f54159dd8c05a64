use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

use crate::device::{Gpu, GpuInit};
use crate::render::RenderTarget;

/// Pump iterations to wait for the platform to hand out the window.
const STARTUP_PUMPS: usize = 100;

/// Window configuration.
#[derive(Debug, Clone)]
pub struct DisplayConfig {
    pub title: String,
    /// Initial inner size in logical pixels.
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
    /// FIFO presentation when set, otherwise the fastest non-vsync mode.
    pub vsync: bool,
    pub gpu: GpuInit,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            title: "glint".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
            vsync: true,
            gpu: GpuInit::default(),
        }
    }
}

/// Event-side state fed by winit callbacks.
struct DisplayState {
    config: DisplayConfig,
    window: Option<Arc<Window>>,
    create_error: Option<anyhow::Error>,
    close_requested: bool,
    pending_resize: Option<PhysicalSize<u32>>,
}

impl ApplicationHandler for DisplayState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height))
            .with_resizable(self.config.resizable);

        match event_loop.create_window(attrs) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(e) => {
                self.create_error = Some(anyhow::Error::new(e).context("failed to create window"));
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.close_requested = true,
            WindowEvent::Resized(size) => self.pending_resize = Some(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    self.pending_resize = Some(window.inner_size());
                }
            }
            _ => {}
        }
    }
}

/// An open window with its GPU context.
pub struct Display {
    event_loop: EventLoop<()>,
    state: DisplayState,
    window: Arc<Window>,
    gpu: Gpu,
}

/// One frame's drawing surface: the context plus the swapchain target.
pub struct Frame<'a> {
    pub gpu: &'a Gpu,
    pub screen: RenderTarget<'a>,
}

impl Display {
    /// Opens a `width` x `height` window titled `title` with default settings.
    pub fn create(width: u32, height: u32, title: &str) -> Result<Self> {
        Self::with_config(DisplayConfig {
            title: title.to_string(),
            width,
            height,
            ..DisplayConfig::default()
        })
    }

    pub fn with_config(config: DisplayConfig) -> Result<Self> {
        let mut event_loop = EventLoop::new().context("failed to create winit EventLoop")?;

        let mut gpu_init = config.gpu.clone();
        gpu_init.present_mode = if config.vsync {
            wgpu::PresentMode::Fifo
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let mut state = DisplayState {
            config,
            window: None,
            create_error: None,
            close_requested: false,
            pending_resize: None,
        };

        // The window only exists once the platform resumes the app.
        for _ in 0..STARTUP_PUMPS {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut state)
            {
                anyhow::bail!("event loop exited during start-up (code {code})");
            }
            if let Some(err) = state.create_error.take() {
                return Err(err);
            }
            if state.window.is_some() {
                break;
            }
        }
        let window = state
            .window
            .clone()
            .context("platform never resumed the application")?;

        let gpu = pollster::block_on(Gpu::with_window(Arc::clone(&window), gpu_init))
            .context("GPU initialization failed for window")?;

        log::info!(
            "display open: {:?} {}x{}",
            state.config.title,
            window.inner_size().width,
            window.inner_size().height
        );

        Ok(Self {
            event_loop,
            state,
            window,
            gpu,
        })
    }

    /// Whether the user asked to close the window.
    pub fn should_close(&self) -> bool {
        self.state.close_requested
    }

    /// Presents the current frame and processes pending window events.
    pub fn refresh(&mut self) {
        self.window.pre_present_notify();
        self.gpu.present();

        if let PumpStatus::Exit(_) = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state)
        {
            self.state.close_requested = true;
        }

        if let Some(size) = self.state.pending_resize.take() {
            log::debug!("display resized to {}x{}", size.width, size.height);
            self.gpu.resize_surface(size);
        }
    }

    /// Width over height of the drawable area.
    pub fn aspect(&self) -> f32 {
        let size = self
            .gpu
            .surface_size()
            .unwrap_or_else(|| self.window.inner_size());
        aspect_ratio(size.width, size.height)
    }

    /// Acquires the swapchain image for this frame.
    ///
    /// `Ok(None)` means the frame should be skipped (minimized window,
    /// transient surface loss).
    pub fn frame(&mut self) -> Result<Option<Frame<'_>>> {
        match self.gpu.acquire_screen() {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(action) => anyhow::bail!("swapchain acquisition failed: {action:?}"),
        }

        let gpu = &self.gpu;
        Ok(gpu.screen_target().map(|screen| Frame { gpu, screen }))
    }

    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Closes the window and releases the GPU context.
    pub fn free(self) {
        let Self {
            event_loop,
            state,
            window,
            gpu,
        } = self;

        // Surface first, then the window it was created from.
        drop(gpu);
        drop(state);
        drop(window);
        drop(event_loop);
        log::info!("display closed");
    }
}

pub(crate) fn aspect_ratio(width: u32, height: u32) -> f32 {
    width as f32 / height.max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_of_common_sizes() {
        assert_eq!(aspect_ratio(1280, 720), 1280.0 / 720.0);
        assert_eq!(aspect_ratio(512, 512), 1.0);
    }

    #[test]
    fn zero_height_does_not_divide_by_zero() {
        assert_eq!(aspect_ratio(800, 0), 800.0);
    }

    #[test]
    fn default_config_is_vsynced_and_resizable() {
        let cfg = DisplayConfig::default();
        assert!(cfg.vsync);
        assert!(cfg.resizable);
        assert_eq!((cfg.width, cfg.height), (1280, 720));
    }
}
