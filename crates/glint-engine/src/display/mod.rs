//! Window + GPU context lifecycle.
//!
//! A [`Display`] is Open from [`Display::create`] until [`Display::free`]
//! consumes it. The caller drives the frame loop: draw into
//! [`Display::frame`], then [`Display::refresh`] to present and poll events.

mod window;

pub use window::{Display, DisplayConfig, Frame};
