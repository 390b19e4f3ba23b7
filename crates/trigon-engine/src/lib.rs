//! Trigon engine crate.
//!
//! Renders one animated triangle through a programmable pipeline. The core
//! (geometry, shader program, animation, frame loop) talks to two
//! capabilities: a [`gfx::GraphicsContext`] for the GPU and a
//! [`window::DisplaySurface`] for the window system.

pub mod animation;
pub mod device;
pub mod driver;
pub mod geometry;
pub mod gfx;
pub mod logging;
pub mod shader;
pub mod window;
