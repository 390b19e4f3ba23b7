//! Headless graphics context that records commands instead of rasterizing.
//!
//! Shader stages go through the same WGSL front-end as the wgpu context, so
//! compile/link/validate results are identical. Useful for tests and for
//! running the frame loop where no adapter is available.

use std::collections::HashMap;

use crate::device::SurfaceErrorAction;

use super::objects::ObjectTable;
use super::{
    BufferHandle, Color, ContextError, GraphicsContext, ProgramHandle, ResourceKind,
    ShaderHandle, ShaderStage, Topology, UniformLocation, VertexArrayHandle, VertexLayout,
};

/// A state change or draw submitted to a [`RecordingContext`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Viewport { width: u32, height: u32 },
    Clear(Color),
    UseProgram(Option<ProgramHandle>),
    BindVertexArray(Option<VertexArrayHandle>),
    UniformMatrix4 { location: UniformLocation, columns: [f32; 16] },
    DrawArrays { topology: Topology, first: u32, count: u32 },
    EndFrame,
}

#[derive(Debug, Default)]
pub struct RecordingContext {
    objects: ObjectTable,
    buffers: HashMap<BufferHandle, Vec<u8>>,
    vertex_arrays: HashMap<VertexArrayHandle, (BufferHandle, VertexLayout)>,
    commands: Vec<Command>,
    reject: Option<ResourceKind>,
    frames: u64,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context that refuses every allocation of `kind`.
    pub fn rejecting(kind: ResourceKind) -> Self {
        Self {
            reject: Some(kind),
            ..Self::default()
        }
    }

    /// Commands recorded since creation (or the last [`take_commands`](Self::take_commands)).
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames
    }

    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    pub fn vertex_array(
        &self,
        vertex_array: VertexArrayHandle,
    ) -> Option<(BufferHandle, &VertexLayout)> {
        self.vertex_arrays
            .get(&vertex_array)
            .map(|(buffer, layout)| (*buffer, layout))
    }

    fn check_allocation(&self, kind: ResourceKind) -> Result<(), ContextError> {
        if self.reject == Some(kind) {
            return Err(ContextError::allocation(kind, "rejected by recording context"));
        }
        Ok(())
    }
}

impl GraphicsContext for RecordingContext {
    fn create_buffer(&mut self, data: &[u8]) -> Result<BufferHandle, ContextError> {
        self.check_allocation(ResourceKind::Buffer)?;
        let handle = BufferHandle(self.objects.next_id());
        self.buffers.insert(handle, data.to_vec());
        Ok(handle)
    }

    fn create_vertex_array(
        &mut self,
        buffer: BufferHandle,
        layout: &VertexLayout,
    ) -> Result<VertexArrayHandle, ContextError> {
        self.check_allocation(ResourceKind::VertexArray)?;
        if !self.buffers.contains_key(&buffer) {
            return Err(ContextError::UnknownHandle {
                kind: ResourceKind::Buffer,
                id: buffer.0,
            });
        }
        let handle = VertexArrayHandle(self.objects.next_id());
        self.vertex_arrays.insert(handle, (buffer, layout.clone()));
        Ok(handle)
    }

    fn create_shader(&mut self, stage: ShaderStage) -> Result<ShaderHandle, ContextError> {
        self.check_allocation(ResourceKind::Shader)?;
        Ok(self.objects.create_shader(stage))
    }

    fn shader_source(&mut self, shader: ShaderHandle, source: &str) {
        self.objects.shader_source(shader, source);
    }

    fn compile_shader(&mut self, shader: ShaderHandle) -> bool {
        self.objects.compile_shader(shader)
    }

    fn shader_info_log(&self, shader: ShaderHandle) -> String {
        self.objects.shader_info_log(shader)
    }

    fn create_program(&mut self) -> Result<ProgramHandle, ContextError> {
        self.check_allocation(ResourceKind::Program)?;
        Ok(self.objects.create_program())
    }

    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        self.objects.attach_shader(program, shader);
    }

    fn link_program(&mut self, program: ProgramHandle) -> bool {
        self.objects.link_program(program)
    }

    fn validate_program(&mut self, program: ProgramHandle) -> bool {
        self.objects.validate_program(program)
    }

    fn program_info_log(&self, program: ProgramHandle) -> String {
        self.objects.program_info_log(program)
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.objects.uniform_location(program, name)
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.commands.push(Command::Viewport { width, height });
    }

    fn clear(&mut self, color: Color) {
        self.commands.push(Command::Clear(color));
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.commands.push(Command::UseProgram(program));
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        self.commands.push(Command::BindVertexArray(vertex_array));
    }

    fn uniform_matrix4(&mut self, location: UniformLocation, columns: &[f32; 16]) {
        self.commands.push(Command::UniformMatrix4 {
            location,
            columns: *columns,
        });
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        self.commands.push(Command::DrawArrays { topology, first, count });
    }

    fn end_frame(&mut self) -> Result<(), SurfaceErrorAction> {
        self.commands.push(Command::EndFrame);
        self.frames += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::VertexFormat;

    #[test]
    fn buffer_keeps_uploaded_bytes() {
        let mut ctx = RecordingContext::new();
        let b = ctx.create_buffer(&[1, 2, 3]).unwrap();
        assert_eq!(ctx.buffer_data(b), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn vertex_array_requires_known_buffer() {
        let mut ctx = RecordingContext::new();
        let layout = VertexLayout::packed(0, VertexFormat::Float32x3);
        let err = ctx
            .create_vertex_array(BufferHandle(99), &layout)
            .unwrap_err();
        assert!(matches!(err, ContextError::UnknownHandle { kind: ResourceKind::Buffer, id: 99 }));
    }

    #[test]
    fn rejecting_context_refuses_allocation() {
        let mut ctx = RecordingContext::rejecting(ResourceKind::Program);
        assert!(ctx.create_buffer(&[0]).is_ok());
        let err = ctx.create_program().unwrap_err();
        assert!(matches!(err, ContextError::Allocation { kind: ResourceKind::Program, .. }));
    }

    #[test]
    fn end_frame_counts_frames() {
        let mut ctx = RecordingContext::new();
        ctx.clear(Color::BLACK);
        assert!(ctx.end_frame().is_ok());
        assert_eq!(ctx.frames_submitted(), 1);
        assert_eq!(ctx.take_commands(), vec![Command::Clear(Color::BLACK), Command::EndFrame]);
        assert!(ctx.commands().is_empty());
    }
}
