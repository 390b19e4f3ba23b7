//! Per-tick animation of the triangle's model transform.
//!
//! Three independent oscillators advance once per tick:
//! - offset bounces between `-MAX_OFFSET` and `MAX_OFFSET`
//! - angle spins forward one degree and wraps at 360
//! - size bounces between `MIN_SIZE` and `MAX_SIZE`
//!
//! Offset and size are kept as integral step counts so the bounds are hit
//! exactly instead of drifting with float accumulation.

use glam::{Mat4, Vec3};

/// Offset steps per unit (one step is 0.005).
const OFFSET_RESOLUTION: f32 = 200.0;
const MAX_OFFSET_STEPS: i32 = 140;

/// Size steps per unit (one step is 0.001).
const SIZE_RESOLUTION: f32 = 1000.0;
const MIN_SIZE_STEPS: i32 = 100;
const MAX_SIZE_STEPS: i32 = 800;
const INITIAL_SIZE_STEPS: i32 = 400;

pub const OFFSET_STEP: f32 = 1.0 / OFFSET_RESOLUTION;
pub const MAX_OFFSET: f32 = MAX_OFFSET_STEPS as f32 / OFFSET_RESOLUTION;

pub const ANGLE_STEP_DEGREES: f32 = 1.0;

pub const SIZE_STEP: f32 = 1.0 / SIZE_RESOLUTION;
pub const MIN_SIZE: f32 = MIN_SIZE_STEPS as f32 / SIZE_RESOLUTION;
pub const MAX_SIZE: f32 = MAX_SIZE_STEPS as f32 / SIZE_RESOLUTION;
pub const INITIAL_SIZE: f32 = INITIAL_SIZE_STEPS as f32 / SIZE_RESOLUTION;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OffsetDirection {
    Increasing,
    Decreasing,
}

impl OffsetDirection {
    fn flipped(self) -> Self {
        match self {
            OffsetDirection::Increasing => OffsetDirection::Decreasing,
            OffsetDirection::Decreasing => OffsetDirection::Increasing,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SizeDirection {
    Growing,
    Shrinking,
}

impl SizeDirection {
    fn flipped(self) -> Self {
        match self {
            SizeDirection::Growing => SizeDirection::Shrinking,
            SizeDirection::Shrinking => SizeDirection::Growing,
        }
    }
}

/// Model transform for one frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform(Mat4);

impl Transform {
    /// `translate(offset, offset, 0) · rotate_z(angle) · scale(size, size, 1)`.
    pub fn from_components(offset: f32, angle_degrees: f32, size: f32) -> Self {
        let m = Mat4::IDENTITY
            * Mat4::from_translation(Vec3::new(offset, offset, 0.0))
            * Mat4::from_rotation_z(angle_degrees.to_radians())
            * Mat4::from_scale(Vec3::new(size, size, 1.0));
        Self(m)
    }

    #[inline]
    pub fn matrix(&self) -> Mat4 {
        self.0
    }

    /// Column-major layout expected by matrix uniforms.
    #[inline]
    pub fn to_cols_array(&self) -> [f32; 16] {
        self.0.to_cols_array()
    }

    #[inline]
    pub fn from_cols_array(cols: &[f32; 16]) -> Self {
        Self(Mat4::from_cols_array(cols))
    }

    pub fn abs_diff_eq(&self, other: &Transform, max_abs_diff: f32) -> bool {
        self.0.abs_diff_eq(other.0, max_abs_diff)
    }
}

/// Animation state machine, mutated once per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationState {
    offset_steps: i32,
    offset_direction: OffsetDirection,
    angle_degrees: f32,
    size_steps: i32,
    size_direction: SizeDirection,
}

impl Default for AnimationState {
    fn default() -> Self {
        Self {
            offset_steps: 0,
            offset_direction: OffsetDirection::Increasing,
            angle_degrees: 0.0,
            size_steps: INITIAL_SIZE_STEPS,
            size_direction: SizeDirection::Growing,
        }
    }
}

impl AnimationState {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn offset(&self) -> f32 {
        self.offset_steps as f32 / OFFSET_RESOLUTION
    }

    #[inline]
    pub fn offset_direction(&self) -> OffsetDirection {
        self.offset_direction
    }

    #[inline]
    pub fn angle_degrees(&self) -> f32 {
        self.angle_degrees
    }

    #[inline]
    pub fn size(&self) -> f32 {
        self.size_steps as f32 / SIZE_RESOLUTION
    }

    #[inline]
    pub fn size_direction(&self) -> SizeDirection {
        self.size_direction
    }

    /// Transform for the current state, without advancing.
    pub fn transform(&self) -> Transform {
        Transform::from_components(self.offset(), self.angle_degrees, self.size())
    }

    /// Advances every oscillator by one tick and returns the new transform.
    pub fn advance(&mut self) -> Transform {
        self.offset_steps += match self.offset_direction {
            OffsetDirection::Increasing => 1,
            OffsetDirection::Decreasing => -1,
        };
        if self.offset_steps.abs() >= MAX_OFFSET_STEPS {
            self.offset_direction = self.offset_direction.flipped();
        }

        self.angle_degrees += ANGLE_STEP_DEGREES;
        if self.angle_degrees >= 360.0 {
            self.angle_degrees -= 360.0;
        }

        self.size_steps += match self.size_direction {
            SizeDirection::Growing => 1,
            SizeDirection::Shrinking => -1,
        };
        if self.size_steps >= MAX_SIZE_STEPS || self.size_steps <= MIN_SIZE_STEPS {
            self.size_direction = self.size_direction.flipped();
        }

        self.transform()
    }
}
