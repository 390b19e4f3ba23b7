//! Display surface capability.
//!
//! The frame loop only needs to pump window-system events, learn whether the
//! user asked to close, know the framebuffer size and signal presentation.
//! [`WinitSurface`] does this for a real window; [`HeadlessSurface`] closes
//! itself after a fixed number of frames.

mod headless;
mod runtime;

pub use headless::HeadlessSurface;
pub use runtime::{SurfaceConfig, SurfaceInitError, WinitSurface};

pub trait DisplaySurface {
    /// Processes pending window-system events without blocking.
    fn poll_events(&mut self);

    /// `true` once the user (or the platform) requested the surface to close.
    fn should_close(&self) -> bool;

    /// Signals that the frame submitted to the graphics context is complete.
    fn present(&mut self);

    /// Drawable size in physical pixels.
    fn framebuffer_size(&self) -> (u32, u32);
}
