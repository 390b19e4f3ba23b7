/// Straight-alpha RGBA color used for framebuffer clears.
///
/// Components are expected in `[0, 1]`. Clears are not blended, so unlike a
/// compositing color there is no premultiplication step.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// Opaque black, the background of every frame.
    pub const BLACK: Self = Self::rgba(0.0, 0.0, 0.0, 1.0);

    #[inline]
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Clamps all channels to `[0, 1]`.
    #[inline]
    pub fn clamped(self) -> Self {
        Self {
            r: self.r.clamp(0.0, 1.0),
            g: self.g.clamp(0.0, 1.0),
            b: self.b.clamp(0.0, 1.0),
            a: self.a.clamp(0.0, 1.0),
        }
    }

    /// Converts to the `f64` color wgpu uses for clear load operations.
    #[inline]
    pub fn to_wgpu(self) -> wgpu::Color {
        let c = self.clamped();
        wgpu::Color {
            r: c.r as f64,
            g: c.g as f64,
            b: c.b as f64,
            a: c.a as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn black_is_opaque() {
        assert_eq!(Color::BLACK, Color::rgba(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn clamped_limits_channels() {
        let c = Color::rgba(-1.0, 2.0, 0.5, 1.5).clamped();
        assert_eq!(c, Color::rgba(0.0, 1.0, 0.5, 1.0));
    }

    #[test]
    fn to_wgpu_widens_components() {
        let c = Color::rgba(0.25, 0.5, 0.75, 1.0).to_wgpu();
        assert_eq!((c.r, c.g, c.b, c.a), (0.25, 0.5, 0.75, 1.0));
    }
}
