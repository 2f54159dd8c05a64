//! GPU context management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue (headless or window-bound)
//! - creating & configuring the Surface (swapchain) and its depth buffer
//! - counting buffer/texture allocations for diagnostics

mod gpu;
mod init;
mod surface;

pub use gpu::{AllocationStats, Gpu, SurfaceErrorAction};
pub use init::GpuInit;
