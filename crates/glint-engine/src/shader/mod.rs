//! Shader compilation, linking and reflection.
//!
//! Sources are parsed and validated with naga (WGSL, or GLSL 450 chosen by
//! file extension). Compile and link failures are logged and recorded on the
//! returned program rather than returned as errors.

mod error;
mod program;
mod reflect;
mod stage;

pub use error::ShaderError;
pub use program::{
    create_compute_program, create_program, ProgramStatus, ShaderProgram, StorageBlockIndex,
    UniformLocation,
};
pub use stage::{compile, CompiledStage, ShaderStage, SourceLanguage};
