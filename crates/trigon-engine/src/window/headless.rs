use super::DisplaySurface;

/// A surface without a window that requests close after `frames` presents.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    remaining: u64,
    size: (u32, u32),
    polls: u64,
    presented: u64,
}

impl HeadlessSurface {
    pub fn new(frames: u64, size: (u32, u32)) -> Self {
        Self {
            remaining: frames,
            size,
            polls: 0,
            presented: 0,
        }
    }

    /// Simulates a framebuffer resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl DisplaySurface for HeadlessSurface {
    fn poll_events(&mut self) {
        self.polls += 1;
    }

    fn should_close(&self) -> bool {
        self.remaining == 0
    }

    fn present(&mut self) {
        self.presented += 1;
        self.remaining = self.remaining.saturating_sub(1);
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closes_after_frame_budget() {
        let mut s = HeadlessSurface::new(2, (800, 600));
        assert!(!s.should_close());
        s.present();
        assert!(!s.should_close());
        s.present();
        assert!(s.should_close());
        assert_eq!(s.presented(), 2);
    }

    #[test]
    fn zero_frames_is_closed_from_the_start() {
        assert!(HeadlessSurface::new(0, (1, 1)).should_close());
    }

    #[test]
    fn resize_updates_framebuffer_size() {
        let mut s = HeadlessSurface::new(1, (800, 600));
        s.resize(1024, 768);
        assert_eq!(s.framebuffer_size(), (1024, 768));
    }
}
