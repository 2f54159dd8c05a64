use std::cell::Cell;
use std::sync::Arc;

use anyhow::{Context, Result};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use super::surface::{self, AcquiredFrame, Screen, SCREEN_DEPTH_FORMAT};
use super::GpuInit;
use crate::render::RenderTarget;

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM); terminate gracefully.
    Fatal,
}

/// Running totals of GPU objects allocated through a [`Gpu`].
///
/// Only buffers and textures are counted; views, samplers and pipelines are
/// derived objects.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct AllocationStats {
    pub buffers: u64,
    pub textures: u64,
}

/// The GPU context every glint call is issued against.
///
/// Owns the wgpu instance/adapter/device/queue and, for window-bound contexts,
/// the presentation surface. All calls are expected on one thread; the
/// allocation counters live in a `Cell`, so `Gpu` is not `Sync`.
pub struct Gpu {
    /// wgpu instance used to create the adapter and surface.
    instance: wgpu::Instance,

    /// Selected adapter.
    adapter: wgpu::Adapter,

    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,

    /// Window surface; `None` for headless contexts.
    screen: Option<Screen>,

    stats: Cell<AllocationStats>,
}

impl Gpu {
    /// Creates a context with no presentation surface.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn headless(init: GpuInit) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: init.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = request_device(&adapter, &init).await?;

        Ok(Self::assemble(instance, adapter, device, queue, None))
    }

    /// Creates a context bound to `window`, with a configured swapchain and a
    /// window-sized depth buffer.
    pub async fn with_window(window: Arc<Window>, init: GpuInit) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: init.backends,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = request_device(&adapter, &init).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface::choose_surface_format(&surface_caps, init.prefer_srgb)
            .context("no supported surface formats")?;
        let alpha_mode = surface::choose_alpha_mode(&surface_caps, init.alpha_mode);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: init.present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
        };
        surface.configure(&device, &config);

        let (depth, depth_view) = surface::create_depth(&device, size);
        log::info!(
            "surface configured: {}x{} {:?} ({:?})",
            size.width,
            size.height,
            format,
            init.present_mode
        );

        let screen = Screen {
            surface,
            config,
            size,
            depth,
            depth_view,
            current: None,
        };

        Ok(Self::assemble(instance, adapter, device, queue, Some(screen)))
    }

    fn assemble(
        instance: wgpu::Instance,
        adapter: wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        screen: Option<Screen>,
    ) -> Self {
        let info = adapter.get_info();
        log::info!("using adapter {} ({:?})", info.name, info.backend);

        Self {
            instance,
            adapter,
            device,
            queue,
            screen,
            stats: Cell::new(AllocationStats::default()),
        }
    }

    /// Returns the wgpu instance.
    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    /// Returns the selected adapter.
    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Buffers and textures allocated through this context so far.
    pub fn stats(&self) -> AllocationStats {
        self.stats.get()
    }

    pub(crate) fn create_buffer(&self, desc: &wgpu::BufferDescriptor<'_>) -> wgpu::Buffer {
        self.bump(|s| s.buffers += 1);
        log::trace!("create buffer {:?} ({} bytes)", desc.label, desc.size);
        self.device.create_buffer(desc)
    }

    pub(crate) fn create_buffer_init(
        &self,
        desc: &wgpu::util::BufferInitDescriptor<'_>,
    ) -> wgpu::Buffer {
        use wgpu::util::DeviceExt;

        self.bump(|s| s.buffers += 1);
        log::trace!("create buffer {:?} ({} bytes, initialized)", desc.label, desc.contents.len());
        self.device.create_buffer_init(desc)
    }

    pub(crate) fn create_texture(&self, desc: &wgpu::TextureDescriptor<'_>) -> wgpu::Texture {
        self.bump(|s| s.textures += 1);
        log::trace!(
            "create texture {:?} {}x{}x{} {:?}",
            desc.label,
            desc.size.width,
            desc.size.height,
            desc.size.depth_or_array_layers,
            desc.format
        );
        self.device.create_texture(desc)
    }

    fn bump(&self, f: impl FnOnce(&mut AllocationStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    // ── window surface ────────────────────────────────────────────────────

    /// Returns the current drawable size, or `None` for headless contexts.
    pub fn surface_size(&self) -> Option<PhysicalSize<u32>> {
        self.screen.as_ref().map(|s| s.size)
    }

    /// Returns the swapchain format, or `None` for headless contexts.
    pub fn surface_format(&self) -> Option<wgpu::TextureFormat> {
        self.screen.as_ref().map(|s| s.config.format)
    }

    /// Reconfigures the surface and the screen depth buffer after a resize.
    pub fn resize_surface(&mut self, new_size: PhysicalSize<u32>) {
        if let Some(screen) = self.screen.as_mut() {
            surface::apply_resize(screen, &self.device, new_size);
        }
    }

    /// Acquires the next swapchain image if none is held yet.
    ///
    /// Returns `true` when a screen target is available afterwards.
    pub fn acquire_screen(&mut self) -> std::result::Result<bool, SurfaceErrorAction> {
        let Some(screen) = self.screen.as_mut() else {
            return Ok(false);
        };
        if screen.current.is_some() {
            return Ok(true);
        }
        if screen.size.width == 0 || screen.size.height == 0 {
            return Ok(false);
        }

        match screen.surface.get_current_texture() {
            Ok(texture) => {
                let view = texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                screen.current = Some(AcquiredFrame { texture, view });
                Ok(true)
            }
            Err(err) => {
                log::debug!("surface acquire failed: {err}");
                match surface::map_surface_error(screen, &self.device, err) {
                    SurfaceErrorAction::Fatal => Err(SurfaceErrorAction::Fatal),
                    _ => Ok(false),
                }
            }
        }
    }

    /// Render target for the acquired swapchain image plus the screen depth
    /// buffer. `None` until [`Gpu::acquire_screen`] succeeds.
    pub fn screen_target(&self) -> Option<RenderTarget<'_>> {
        let screen = self.screen.as_ref()?;
        let frame = screen.current.as_ref()?;
        Some(RenderTarget::new(
            &frame.view,
            screen.config.format,
            Some((&screen.depth_view, SCREEN_DEPTH_FORMAT)),
            (screen.config.width, screen.config.height),
        ))
    }

    /// Presents the acquired swapchain image, if any.
    pub fn present(&mut self) {
        if let Some(frame) = self.screen.as_mut().and_then(|s| s.current.take()) {
            drop(frame.view);
            frame.texture.present();
        }
    }
}

async fn request_device(
    adapter: &wgpu::Adapter,
    init: &GpuInit,
) -> Result<(wgpu::Device, wgpu::Queue)> {
    adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("glint device"),
            required_features: init.required_features,
            required_limits: init.required_limits.clone(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        })
        .await
        .context("failed to create wgpu device/queue")
}
