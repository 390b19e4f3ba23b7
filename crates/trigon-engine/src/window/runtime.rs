use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::error::{EventLoopError, OsError};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

use super::DisplaySurface;

/// How long a single startup pump may wait for the platform to resume.
const STARTUP_PUMP_TIMEOUT: Duration = Duration::from_millis(16);

/// Startup pumps before giving up on the first `resumed`.
const STARTUP_PUMP_LIMIT: usize = 256;

/// Window configuration.
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl SurfaceConfig {
    pub const DEFAULT_TITLE: &'static str = "Test Window";
    pub const DEFAULT_WIDTH: u32 = 800;
    pub const DEFAULT_HEIGHT: u32 = 600;
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            title: Self::DEFAULT_TITLE.to_string(),
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
        }
    }
}

#[derive(Debug, Error)]
pub enum SurfaceInitError {
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] EventLoopError),

    #[error("failed to create window: {0}")]
    Window(#[from] OsError),

    #[error("event loop exited before a window was created")]
    NotResumed,
}

/// Event handler state. Lives outside the event loop so the loop can be
/// pumped from the frame driver instead of owning control flow.
struct SurfaceState {
    config: SurfaceConfig,
    window: Option<Arc<Window>>,
    size: PhysicalSize<u32>,
    close_requested: bool,
    create_error: Option<OsError>,
}

impl SurfaceState {
    fn new(config: SurfaceConfig) -> Self {
        let size = PhysicalSize::new(config.width, config.height);
        Self {
            config,
            window: None,
            size,
            close_requested: false,
            create_error: None,
        }
    }
}

impl ApplicationHandler for SurfaceState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(self.config.title.as_str())
            .with_inner_size(LogicalSize::new(
                f64::from(self.config.width),
                f64::from(self.config.height),
            ));

        match event_loop.create_window(attrs) {
            Ok(window) => {
                self.size = window.inner_size();
                self.window = Some(Arc::new(window));
            }
            Err(e) => {
                log::error!("failed to create window: {e}");
                self.create_error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::debug!("close requested");
                self.close_requested = true;
            }
            WindowEvent::Resized(new_size) => {
                self.size = new_size;
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    self.size = window.inner_size();
                }
            }
            _ => {}
        }
    }
}

/// A winit window driven by polling.
///
/// The event loop is pumped once per frame with a zero timeout, so the caller
/// keeps control of the loop.
pub struct WinitSurface {
    event_loop: EventLoop<()>,
    state: SurfaceState,
    window: Arc<Window>,
}

impl WinitSurface {
    /// Creates the event loop and pumps it until the platform delivers the
    /// first `resumed`, which creates the window.
    pub fn create(config: &SurfaceConfig) -> Result<Self, SurfaceInitError> {
        let mut event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut state = SurfaceState::new(config.clone());

        for _ in 0..STARTUP_PUMP_LIMIT {
            let status = event_loop.pump_app_events(Some(STARTUP_PUMP_TIMEOUT), &mut state);
            if state.window.is_some() || state.create_error.is_some() {
                break;
            }
            if let PumpStatus::Exit(code) = status {
                log::warn!("event loop exited during startup (code {code})");
                break;
            }
        }

        if let Some(e) = state.create_error.take() {
            return Err(SurfaceInitError::Window(e));
        }
        let window = state.window.clone().ok_or(SurfaceInitError::NotResumed)?;

        log::info!(
            "window \"{}\" created: {}x{} physical",
            config.title,
            state.size.width,
            state.size.height
        );

        Ok(Self {
            event_loop,
            state,
            window,
        })
    }

    /// The window, shared with the graphics context that renders into it.
    pub fn window(&self) -> Arc<Window> {
        self.window.clone()
    }
}

impl DisplaySurface for WinitSurface {
    fn poll_events(&mut self) {
        if let PumpStatus::Exit(code) = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state)
        {
            log::debug!("event loop exited (code {code})");
            self.state.close_requested = true;
        }
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn present(&mut self) {
        self.window.request_redraw();
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        (self.state.size.width, self.state.size.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_window_contract() {
        let c = SurfaceConfig::default();
        assert_eq!(c.title, "Test Window");
        assert_eq!((c.width, c.height), (800, 600));
    }

    #[test]
    fn state_starts_at_configured_size() {
        let s = SurfaceState::new(SurfaceConfig::default());
        assert_eq!(s.size, PhysicalSize::new(800, 600));
        assert!(!s.close_requested);
        assert!(s.window.is_none());
    }
}
