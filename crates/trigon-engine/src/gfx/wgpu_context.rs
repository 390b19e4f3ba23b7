use std::collections::{HashMap, HashSet};
use std::num::NonZeroU64;
use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::device::{Gpu, GpuInit, SurfaceErrorAction};

use super::objects::ObjectTable;
use super::wgsl::{self, LinkedProgram};
use super::{
    BufferHandle, Color, ContextError, GraphicsContext, ProgramHandle, ResourceKind,
    ShaderHandle, ShaderStage, Topology, UniformLocation, VertexArrayHandle, VertexLayout,
};

struct VertexArrayEntry {
    buffer: BufferHandle,
    layout: VertexLayout,
}

/// Device-side objects for a linked program.
///
/// Created the first time the program is put in use; pipelines additionally
/// depend on the vertex array and topology and are cached per draw key.
struct ProgramGpu {
    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    vertex_entry: String,
    fragment_entry: String,
    vertex_inputs: Vec<u32>,
    pipeline_layout: wgpu::PipelineLayout,
    uniform_buffers: HashMap<u32, UniformSlot>,
    bind_group: Option<wgpu::BindGroup>,
}

struct UniformSlot {
    buffer: wgpu::Buffer,
    accepts_mat4: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct PipelineKey {
    program: ProgramHandle,
    vertex_array: VertexArrayHandle,
    topology: Topology,
}

struct DrawCall {
    key: PipelineKey,
    first: u32,
    count: u32,
}

/// Graphics context backed by a wgpu device and a window surface.
///
/// State changes are applied immediately to the bookkeeping; draws are
/// recorded and encoded into a single render pass by `end_frame`. Uniform
/// writes go through the queue, so every draw in a frame observes the last
/// value written before submission.
pub struct WgpuContext {
    window: Arc<Window>,
    gpu: Gpu,

    objects: ObjectTable,
    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    vertex_arrays: HashMap<VertexArrayHandle, VertexArrayEntry>,
    programs: HashMap<ProgramHandle, ProgramGpu>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    unusable: HashSet<ProgramHandle>,

    current_program: Option<ProgramHandle>,
    current_vertex_array: Option<VertexArrayHandle>,
    clear: Option<Color>,
    draws: Vec<DrawCall>,
}

impl WgpuContext {
    /// Brings up adapter, device and surface for `window`.
    pub fn new(window: Arc<Window>, init: GpuInit) -> Result<Self, ContextError> {
        let gpu = pollster::block_on(Gpu::new(window.clone(), init))
            .map_err(|e| ContextError::Init(format!("{e:#}")))?;

        log::info!(
            "graphics context ready: {}x{} {:?}",
            gpu.size().width,
            gpu.size().height,
            gpu.surface_format()
        );

        Ok(Self {
            window,
            gpu,
            objects: ObjectTable::default(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            programs: HashMap::new(),
            pipelines: HashMap::new(),
            unusable: HashSet::new(),
            current_program: None,
            current_vertex_array: None,
            clear: None,
            draws: Vec::new(),
        })
    }

    fn forget_program(&mut self, handle: ProgramHandle) {
        self.programs.remove(&handle);
        self.pipelines.retain(|key, _| key.program != handle);
        self.unusable.remove(&handle);
    }

    /// Realizes a linked, valid program on the device. Returns `false` when the
    /// program cannot execute (draws using it are skipped).
    fn ensure_program(&mut self, handle: ProgramHandle) -> bool {
        if self.programs.contains_key(&handle) {
            return true;
        }
        if self.unusable.contains(&handle) {
            return false;
        }

        let Some(program) = self.objects.program(handle) else {
            log::warn!("use_program: unknown program {handle:?}");
            return false;
        };

        let usable = match program.linked() {
            None => Err("program is not linked".to_string()),
            Some(linked) if program.is_validated() => Ok(linked),
            Some(linked) => wgsl::validate(linked).map(|()| linked),
        };

        match usable {
            Ok(linked) => {
                let gpu = realize_program(self.gpu.device(), linked);
                self.programs.insert(handle, gpu);
                true
            }
            Err(reason) => {
                log::warn!("program {handle:?} cannot execute, draws are skipped: {reason}");
                self.unusable.insert(handle);
                false
            }
        }
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> bool {
        if self.pipelines.contains_key(&key) {
            return true;
        }

        let Some(program) = self.programs.get(&key.program) else { return false };
        let Some(vertex_array) = self.vertex_arrays.get(&key.vertex_array) else {
            log::warn!("draw_arrays: unknown vertex array {:?}", key.vertex_array);
            return false;
        };

        if let Some(missing) = program
            .vertex_inputs
            .iter()
            .find(|loc| !vertex_array.layout.provides(**loc))
        {
            log::error!(
                "vertex array {:?} provides no attribute for shader input location {missing}",
                key.vertex_array
            );
            return false;
        }

        let attributes: Vec<wgpu::VertexAttribute> = vertex_array
            .layout
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: a.format.to_wgpu(),
                offset: a.offset,
                shader_location: a.location,
            })
            .collect();

        let pipeline = self
            .gpu
            .device()
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("trigon pipeline"),
                layout: Some(&program.pipeline_layout),

                vertex: wgpu::VertexState {
                    module: &program.vertex_module,
                    entry_point: Some(program.vertex_entry.as_str()),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: vertex_array.layout.stride,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                },

                fragment: Some(wgpu::FragmentState {
                    module: &program.fragment_module,
                    entry_point: Some(program.fragment_entry.as_str()),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.gpu.surface_format(),
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),

                primitive: wgpu::PrimitiveState {
                    topology: key.topology.to_wgpu(),
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },

                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        log::debug!("created pipeline for {key:?}");
        self.pipelines.insert(key, pipeline);
        true
    }
}

fn realize_program(device: &wgpu::Device, linked: &LinkedProgram) -> ProgramGpu {
    let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("trigon vertex stage"),
        source: wgpu::ShaderSource::Wgsl(linked.vertex.source.as_str().into()),
    });
    let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("trigon fragment stage"),
        source: wgpu::ShaderSource::Wgsl(linked.fragment.source.as_str().into()),
    });

    let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = linked
        .uniforms
        .iter()
        .map(|u| wgpu::BindGroupLayoutEntry {
            binding: u.binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(u.size),
            },
            count: None,
        })
        .collect();

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("trigon uniforms bgl"),
        entries: &layout_entries,
    });

    let uniform_buffers: HashMap<u32, UniformSlot> = linked
        .uniforms
        .iter()
        .map(|u| {
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("trigon uniform buffer"),
                size: u.size.max(4).next_multiple_of(16),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let slot = UniformSlot {
                buffer,
                accepts_mat4: u.is_mat4x4_f32(),
            };
            (u.binding, slot)
        })
        .collect();

    // A layout slot without a bound group fails validation, so programs
    // without uniforms get an empty pipeline layout.
    let (bind_group, group_layouts) = if linked.uniforms.is_empty() {
        (None, Vec::new())
    } else {
        let entries: Vec<wgpu::BindGroupEntry> = uniform_buffers
            .iter()
            .map(|(binding, slot)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: slot.buffer.as_entire_binding(),
            })
            .collect();
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("trigon uniforms bind group"),
            layout: &bind_group_layout,
            entries: &entries,
        });
        (Some(bind_group), vec![&bind_group_layout])
    };

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("trigon pipeline layout"),
        bind_group_layouts: &group_layouts,
        immediate_size: 0,
    });

    ProgramGpu {
        vertex_module,
        fragment_module,
        vertex_entry: linked.vertex.entry_point.clone(),
        fragment_entry: linked.fragment.entry_point.clone(),
        vertex_inputs: linked.vertex_inputs.iter().map(|v| v.location).collect(),
        pipeline_layout,
        uniform_buffers,
        bind_group,
    }
}

impl GraphicsContext for WgpuContext {
    fn create_buffer(&mut self, data: &[u8]) -> Result<BufferHandle, ContextError> {
        if data.is_empty() {
            return Err(ContextError::allocation(ResourceKind::Buffer, "empty vertex data"));
        }
        let max = self.gpu.device().limits().max_buffer_size;
        if data.len() as u64 > max {
            return Err(ContextError::allocation(
                ResourceKind::Buffer,
                format!("{} bytes exceeds the device limit of {max}", data.len()),
            ));
        }

        let buffer = self
            .gpu
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("trigon vertex buffer"),
                contents: data,
                usage: wgpu::BufferUsages::VERTEX,
            });

        let handle = BufferHandle(self.objects.next_id());
        self.buffers.insert(handle, buffer);
        Ok(handle)
    }

    fn create_vertex_array(
        &mut self,
        buffer: BufferHandle,
        layout: &VertexLayout,
    ) -> Result<VertexArrayHandle, ContextError> {
        if !self.buffers.contains_key(&buffer) {
            return Err(ContextError::UnknownHandle {
                kind: ResourceKind::Buffer,
                id: buffer.0,
            });
        }

        let limits = self.gpu.device().limits();
        if layout.attributes.len() as u32 > limits.max_vertex_attributes {
            return Err(ContextError::allocation(
                ResourceKind::VertexArray,
                format!("{} attributes exceeds the device limit", layout.attributes.len()),
            ));
        }
        if layout.stride > u64::from(limits.max_vertex_buffer_array_stride) {
            return Err(ContextError::allocation(
                ResourceKind::VertexArray,
                format!("stride {} exceeds the device limit", layout.stride),
            ));
        }

        let handle = VertexArrayHandle(self.objects.next_id());
        self.vertex_arrays.insert(
            handle,
            VertexArrayEntry {
                buffer,
                layout: layout.clone(),
            },
        );
        Ok(handle)
    }

    fn create_shader(&mut self, stage: ShaderStage) -> Result<ShaderHandle, ContextError> {
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
        Ok(self.objects.create_program())
    }

    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        self.objects.attach_shader(program, shader);
    }

    fn link_program(&mut self, program: ProgramHandle) -> bool {
        self.forget_program(program);
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
        self.gpu.resize(PhysicalSize::new(width, height));
    }

    fn clear(&mut self, color: Color) {
        self.clear = Some(color);
        self.draws.clear();
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        if let Some(handle) = program {
            self.ensure_program(handle);
        }
        self.current_program = program;
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        self.current_vertex_array = vertex_array;
    }

    fn uniform_matrix4(&mut self, location: UniformLocation, columns: &[f32; 16]) {
        let Some(handle) = self.current_program else {
            log::warn!("uniform_matrix4: no program in use");
            return;
        };
        let Some(slot) = self
            .programs
            .get(&handle)
            .and_then(|p| p.uniform_buffers.get(&location.binding()))
        else {
            return;
        };
        if !slot.accepts_mat4 {
            log::warn!(
                "uniform_matrix4: binding {} of program {handle:?} is not a mat4x4<f32>",
                location.binding()
            );
            return;
        }
        self.gpu
            .queue()
            .write_buffer(&slot.buffer, 0, bytemuck::cast_slice(columns.as_slice()));
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        let (Some(program), Some(vertex_array)) = (self.current_program, self.current_vertex_array)
        else {
            log::warn!("draw_arrays: requires a program in use and a bound vertex array");
            return;
        };
        if count == 0 || !self.programs.contains_key(&program) {
            return;
        }

        let key = PipelineKey {
            program,
            vertex_array,
            topology,
        };
        if self.ensure_pipeline(key) {
            self.draws.push(DrawCall { key, first, count });
        }
    }

    fn end_frame(&mut self) -> Result<(), SurfaceErrorAction> {
        let clear = self.clear.take();
        let draws = std::mem::take(&mut self.draws);

        let mut frame = match self.gpu.begin_frame() {
            Ok(f) => f,
            Err(err) => return Err(self.gpu.handle_surface_error(err)),
        };

        {
            let load = match clear {
                Some(c) => wgpu::LoadOp::Clear(c.to_wgpu()),
                None => wgpu::LoadOp::Load,
            };

            let mut rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("trigon frame pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for draw in &draws {
                let Some(pipeline) = self.pipelines.get(&draw.key) else { continue };
                let Some(program) = self.programs.get(&draw.key.program) else { continue };
                let Some(buffer) = self
                    .vertex_arrays
                    .get(&draw.key.vertex_array)
                    .and_then(|va| self.buffers.get(&va.buffer))
                else {
                    continue;
                };

                rpass.set_pipeline(pipeline);
                if let Some(bind_group) = &program.bind_group {
                    rpass.set_bind_group(0, bind_group, &[]);
                }
                rpass.set_vertex_buffer(0, buffer.slice(..));
                rpass.draw(draw.first..draw.first + draw.count, 0..1);
            }
        }

        self.window.pre_present_notify();
        self.gpu.submit(frame);
        Ok(())
    }
}
