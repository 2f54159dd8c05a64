//! Draw and dispatch commands.
//!
//! `Gpu::bind` makes a program current; the returned binding carries uniform
//! writes, resource bindings and the draw/dispatch calls. Every command is
//! recorded into its own encoder and submitted immediately.

mod binding;
mod pass;
mod target;

pub use binding::{ProgramBinding, Sampled};
pub use target::RenderTarget;
