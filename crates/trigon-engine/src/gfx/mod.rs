//! Graphics context capability.
//!
//! The renderer core talks to the GPU exclusively through [`GraphicsContext`]:
//! buffer and vertex-array objects for geometry, shader and program objects
//! for the pipeline, and a handful of binding/draw primitives per frame.
//!
//! Two contexts are provided:
//! - [`WgpuContext`] renders to a window through wgpu
//! - [`RecordingContext`] records commands without a device

mod color;
mod context;
mod error;
mod objects;
pub mod recording;
mod wgpu_context;
mod wgsl;

pub use color::Color;
pub use context::{
    BufferHandle, GraphicsContext, ProgramHandle, ShaderHandle, ShaderStage, Topology,
    UniformLocation, VertexArrayHandle, VertexAttribute, VertexFormat, VertexLayout,
};
pub use error::{ContextError, ResourceKind};
pub use recording::RecordingContext;
pub use wgpu_context::WgpuContext;
