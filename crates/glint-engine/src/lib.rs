//! glint engine crate.
//!
//! Shader programs, GPU resources and a window/display over wgpu. Every call
//! goes through one [`Gpu`] context on one thread.

pub mod device;
pub mod display;
pub mod loader;
pub mod logging;
pub mod render;
pub mod shader;

pub use device::{Gpu, GpuInit};
pub use display::{Display, DisplayConfig};
