use std::fmt;

use crate::device::SurfaceErrorAction;

use super::{Color, ContextError};

// ── handles ───────────────────────────────────────────────────────────────

/// Buffer object handle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BufferHandle(pub(crate) u32);

/// Vertex array object handle (buffer + attribute layout).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexArrayHandle(pub(crate) u32);

/// Shader object handle (one pipeline stage).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ShaderHandle(pub(crate) u32);

/// Program object handle (linked stages).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ProgramHandle(pub(crate) u32);

/// Uniform slot inside a linked program.
///
/// WGSL uniforms are addressed by their `@binding` index in bind group 0.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformLocation(pub(crate) u32);

impl UniformLocation {
    #[inline]
    pub fn binding(self) -> u32 {
        self.0
    }
}

// ── pipeline vocabulary ───────────────────────────────────────────────────

/// Programmable pipeline stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Primitive assembly mode for `draw_arrays`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Topology {
    Triangles,
}

impl Topology {
    pub(crate) fn to_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            Topology::Triangles => wgpu::PrimitiveTopology::TriangleList,
        }
    }
}

/// Component type and count of one vertex attribute.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexFormat {
    Float32x3,
}

impl VertexFormat {
    pub fn size(self) -> u64 {
        match self {
            VertexFormat::Float32x3 => 12,
        }
    }

    pub(crate) fn to_wgpu(self) -> wgpu::VertexFormat {
        match self {
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        }
    }
}

/// One enabled attribute inside an interleaved vertex buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u64,
}

/// How a vertex array interprets its buffer.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct VertexLayout {
    /// Bytes between consecutive vertices.
    pub stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Tightly packed layout with a single attribute at offset 0.
    pub fn packed(location: u32, format: VertexFormat) -> Self {
        Self {
            stride: format.size(),
            attributes: vec![VertexAttribute {
                location,
                format,
                offset: 0,
            }],
        }
    }

    pub fn provides(&self, location: u32) -> bool {
        self.attributes.iter().any(|a| a.location == location)
    }
}

// ── capability ────────────────────────────────────────────────────────────

/// Graphics context capability consumed by the renderer core.
///
/// The primitives follow the classic object model: buffers and vertex arrays
/// hold geometry, shader objects compile one stage each, program objects link
/// stages and expose uniforms. Binding state (`use_program`,
/// `bind_vertex_array`) is sticky until replaced or cleared with `None`.
///
/// Status queries (`compile_shader`, `link_program`, `validate_program`) return
/// a success flag; the matching `*_info_log` call returns the diagnostic text
/// produced by the most recent attempt.
pub trait GraphicsContext {
    /// Allocates a buffer object and uploads `data` as static vertex storage.
    fn create_buffer(&mut self, data: &[u8]) -> Result<BufferHandle, ContextError>;

    /// Allocates a vertex array describing how `buffer` feeds vertex inputs.
    fn create_vertex_array(
        &mut self,
        buffer: BufferHandle,
        layout: &VertexLayout,
    ) -> Result<VertexArrayHandle, ContextError>;

    fn create_shader(&mut self, stage: ShaderStage) -> Result<ShaderHandle, ContextError>;

    /// Replaces the source text of `shader`.
    fn shader_source(&mut self, shader: ShaderHandle, source: &str);

    /// Compiles the current source; returns the compile-status flag.
    fn compile_shader(&mut self, shader: ShaderHandle) -> bool;

    fn shader_info_log(&self, shader: ShaderHandle) -> String;

    fn create_program(&mut self) -> Result<ProgramHandle, ContextError>;

    /// Attaches a stage. Linking fails while any attached stage is uncompiled.
    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle);

    /// Links attached stages; returns the link-status flag.
    fn link_program(&mut self, program: ProgramHandle) -> bool;

    /// Checks that a linked program can execute here; returns the validate-status flag.
    fn validate_program(&mut self, program: ProgramHandle) -> bool;

    fn program_info_log(&self, program: ProgramHandle) -> String;

    /// Looks up a uniform by name. `None` when absent or the program is not linked.
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    /// Sets the drawable area in physical pixels.
    fn set_viewport(&mut self, width: u32, height: u32);

    fn clear(&mut self, color: Color);

    fn use_program(&mut self, program: Option<ProgramHandle>);

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>);

    /// Writes a 4x4 matrix (16 column-major floats) into the active program.
    fn uniform_matrix4(&mut self, location: UniformLocation, columns: &[f32; 16]);

    /// Draws `count` vertices starting at `first` from the bound vertex array.
    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32);

    /// Submits everything recorded since the previous frame.
    fn end_frame(&mut self) -> Result<(), SurfaceErrorAction>;
}
