//! GPU resource loading and lifecycle.
//!
//! Every resource is exclusively owned by its wrapper. `free(self)` destroys
//! the GPU memory eagerly; dropping a wrapper releases it lazily.

mod cubemap;
mod error;
mod framebuffer;
mod mipmap;
mod readback;
mod storage;
mod texture;
mod vertex_array;

pub use cubemap::{load_cubemap, CubeFace, Cubemap};
pub use error::LoadError;
pub use framebuffer::{
    load_framebuffer, read_framebuffer, resize_framebuffer, FrameBufferObject, FBO_COLOR_FORMAT,
};
pub use storage::{
    load_storage_buffer, read_storage_buffer, update_storage_buffer, ShaderStorageBuffer,
};
pub use texture::{load_texture, texture_from_rgba, Texture, TEXTURE_FORMAT};
pub use vertex_array::{
    load_vertex_array, VertexArrayObject, VertexLayout, NORMAL_SLOT, POSITION_SLOT, TEXCOORD_SLOT,
};
