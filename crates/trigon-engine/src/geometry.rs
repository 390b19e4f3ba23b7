//! Static vertex geometry and its binding discipline.

use bytemuck::{Pod, Zeroable};

use crate::gfx::{
    BufferHandle, ContextError, GraphicsContext, Topology, VertexArrayHandle, VertexFormat,
    VertexLayout,
};

/// Attribute location the vertex stage reads positions from.
pub const POSITION_LOCATION: u32 = 0;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
}

impl Vertex {
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { position: [x, y, z] }
    }

    /// Three tightly packed floats at [`POSITION_LOCATION`].
    pub fn layout() -> VertexLayout {
        VertexLayout::packed(POSITION_LOCATION, VertexFormat::Float32x3)
    }
}

/// The triangle spanning the bottom corners and top-center of clip space.
pub const TRIANGLE: [Vertex; 3] = [
    Vertex::new(-1.0, -1.0, 0.0),
    Vertex::new(1.0, -1.0, 0.0),
    Vertex::new(0.0, 1.0, 0.0),
];

/// Vertex data uploaded once into a buffer object, plus the vertex array
/// describing it.
///
/// Handles are valid for the lifetime of the context that issued them; there
/// is no explicit release.
#[derive(Debug)]
pub struct GeometryBuffer {
    vertex_array: VertexArrayHandle,
    vertex_buffer: BufferHandle,
    vertex_count: u32,
}

impl GeometryBuffer {
    /// Uploads `vertices` as static storage and records their layout.
    pub fn create<C: GraphicsContext>(
        ctx: &mut C,
        vertices: &[Vertex],
    ) -> Result<Self, ContextError> {
        let vertex_buffer = ctx.create_buffer(bytemuck::cast_slice(vertices))?;
        let vertex_array = ctx.create_vertex_array(vertex_buffer, &Vertex::layout())?;

        log::debug!(
            "geometry uploaded: {} vertices ({} bytes)",
            vertices.len(),
            std::mem::size_of_val(vertices)
        );

        Ok(Self {
            vertex_array,
            vertex_buffer,
            vertex_count: vertices.len() as u32,
        })
    }

    #[inline]
    pub fn vertex_array(&self) -> VertexArrayHandle {
        self.vertex_array
    }

    #[inline]
    pub fn vertex_buffer(&self) -> BufferHandle {
        self.vertex_buffer
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Binds the vertex array. It stays bound until the guard is dropped or
    /// [`BoundGeometry::unbind`] is called.
    pub fn bind<'a, C: GraphicsContext>(&'a self, ctx: &'a mut C) -> BoundGeometry<'a, C> {
        ctx.bind_vertex_array(Some(self.vertex_array));
        BoundGeometry { geometry: self, ctx }
    }
}

/// A [`GeometryBuffer`] bound on a context. Drawing is only possible through this guard.
pub struct BoundGeometry<'a, C: GraphicsContext> {
    geometry: &'a GeometryBuffer,
    ctx: &'a mut C,
}

impl<C: GraphicsContext> BoundGeometry<'_, C> {
    /// Draws every vertex as a triangle list.
    pub fn draw(&mut self) {
        self.ctx
            .draw_arrays(Topology::Triangles, 0, self.geometry.vertex_count);
    }

    pub fn unbind(self) {}
}

impl<C: GraphicsContext> Drop for BoundGeometry<'_, C> {
    fn drop(&mut self) {
        self.ctx.bind_vertex_array(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::recording::Command;
    use crate::gfx::{RecordingContext, ResourceKind};

    #[test]
    fn vertex_is_twelve_bytes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 12);
        assert_eq!(Vertex::layout().stride, 12);
    }

    #[test]
    fn create_uploads_packed_positions() {
        let mut ctx = RecordingContext::new();
        let geo = GeometryBuffer::create(&mut ctx, &TRIANGLE).unwrap();

        assert_eq!(geo.vertex_count(), 3);

        let bytes = ctx.buffer_data(geo.vertex_buffer()).unwrap();
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(floats, [-1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 0.0, 1.0, 0.0]);

        let (buffer, layout) = ctx.vertex_array(geo.vertex_array()).unwrap();
        assert_eq!(buffer, geo.vertex_buffer());
        assert_eq!(layout, &Vertex::layout());
        assert!(layout.provides(POSITION_LOCATION));
    }

    #[test]
    fn draw_submits_three_vertex_triangle_list() {
        let mut ctx = RecordingContext::new();
        let geo = GeometryBuffer::create(&mut ctx, &TRIANGLE).unwrap();

        let mut bound = geo.bind(&mut ctx);
        bound.draw();
        bound.unbind();

        assert_eq!(
            ctx.commands(),
            &[
                Command::BindVertexArray(Some(geo.vertex_array())),
                Command::DrawArrays { topology: Topology::Triangles, first: 0, count: 3 },
                Command::BindVertexArray(None),
            ]
        );
    }

    #[test]
    fn guard_unbinds_on_drop() {
        let mut ctx = RecordingContext::new();
        let geo = GeometryBuffer::create(&mut ctx, &TRIANGLE).unwrap();
        {
            let _bound = geo.bind(&mut ctx);
        }
        assert_eq!(ctx.commands().last(), Some(&Command::BindVertexArray(None)));
    }

    #[test]
    fn allocation_rejection_is_reported() {
        let mut ctx = RecordingContext::rejecting(ResourceKind::Buffer);
        let err = GeometryBuffer::create(&mut ctx, &TRIANGLE).unwrap_err();
        assert!(matches!(err, ContextError::Allocation { kind: ResourceKind::Buffer, .. }));
    }

    #[test]
    fn vertex_array_rejection_is_reported() {
        let mut ctx = RecordingContext::rejecting(ResourceKind::VertexArray);
        let err = GeometryBuffer::create(&mut ctx, &TRIANGLE).unwrap_err();
        assert!(matches!(
            err,
            ContextError::Allocation { kind: ResourceKind::VertexArray, .. }
        ));
    }
}
