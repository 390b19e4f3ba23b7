//! CPU-side WGSL front-end.
//!
//! Compile, link and validate are performed with naga (the shader compiler
//! wgpu itself embeds) so every failure yields text that can be logged. GPU
//! objects are only created from stages that passed all three steps, which
//! keeps wgpu's own validation from ever rejecting a module.

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, Binding, Handle, Module, Scalar, Type, TypeInner, VectorSize};

use super::ShaderStage;

/// A single stage that parsed and exposes exactly one entry point for its stage.
#[derive(Debug, Clone)]
pub(crate) struct CompiledStage {
    pub stage: ShaderStage,
    pub source: String,
    pub module: Module,
    pub entry_point: String,
}

/// A user-defined (`@location`) stage input or output.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InterfaceVar {
    pub location: u32,
    pub ty: TypeInner,
}

/// A `var<uniform>` resource declared by a stage.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UniformBinding {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub size: u64,
    pub ty: TypeInner,
}

/// A vertex + fragment pair whose interfaces agree.
#[derive(Debug, Clone)]
pub(crate) struct LinkedProgram {
    pub vertex: CompiledStage,
    pub fragment: CompiledStage,
    pub uniforms: Vec<UniformBinding>,
    pub vertex_inputs: Vec<InterfaceVar>,
}

impl UniformBinding {
    /// Whether a 16-float column-major matrix upload fits this uniform.
    pub fn is_mat4x4_f32(&self) -> bool {
        matches!(
            self.ty,
            TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                scalar: Scalar::F32,
            }
        )
    }
}

impl LinkedProgram {
    pub fn uniform(&self, name: &str) -> Option<&UniformBinding> {
        self.uniforms.iter().find(|u| u.name == name)
    }
}

fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    }
}

// ── compile ───────────────────────────────────────────────────────────────

/// Parses `source` and checks it provides one entry point for `stage`.
pub(crate) fn compile(stage: ShaderStage, source: &str) -> Result<CompiledStage, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;

    let wanted = naga_stage(stage);
    let mut entries = module.entry_points.iter().filter(|ep| ep.stage == wanted);

    let entry = entries
        .next()
        .ok_or_else(|| format!("{stage} shader declares no @{stage} entry point"))?;
    if entries.next().is_some() {
        return Err(format!("{stage} shader declares more than one @{stage} entry point"));
    }
    let entry_point = entry.name.clone();

    Ok(CompiledStage {
        stage,
        source: source.to_string(),
        module,
        entry_point,
    })
}

// ── reflection ────────────────────────────────────────────────────────────

fn collect_locations(
    module: &Module,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut Vec<InterfaceVar>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => out.push(InterfaceVar {
            location: *location,
            ty: module.types[ty].inner.clone(),
        }),
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for m in members {
                    collect_locations(module, m.ty, m.binding.as_ref(), out);
                }
            }
        }
    }
}

fn writes_position(module: &Module, ty: Handle<Type>, binding: Option<&Binding>) -> bool {
    match binding {
        Some(Binding::BuiltIn(naga::BuiltIn::Position { .. })) => true,
        Some(_) => false,
        None => match &module.types[ty].inner {
            TypeInner::Struct { members, .. } => members
                .iter()
                .any(|m| writes_position(module, m.ty, m.binding.as_ref())),
            _ => false,
        },
    }
}

fn entry(stage: &CompiledStage) -> Option<&naga::EntryPoint> {
    stage
        .module
        .entry_points
        .iter()
        .find(|ep| ep.name == stage.entry_point && ep.stage == naga_stage(stage.stage))
}

pub(crate) fn stage_inputs(stage: &CompiledStage) -> Vec<InterfaceVar> {
    let mut out = Vec::new();
    if let Some(ep) = entry(stage) {
        for arg in &ep.function.arguments {
            collect_locations(&stage.module, arg.ty, arg.binding.as_ref(), &mut out);
        }
    }
    out
}

pub(crate) fn stage_outputs(stage: &CompiledStage) -> Vec<InterfaceVar> {
    let mut out = Vec::new();
    if let Some(result) = entry(stage).and_then(|ep| ep.function.result.as_ref()) {
        collect_locations(&stage.module, result.ty, result.binding.as_ref(), &mut out);
    }
    out
}

fn stage_uniforms(stage: &CompiledStage) -> Vec<UniformBinding> {
    let module = &stage.module;
    module
        .global_variables
        .iter()
        .filter(|(_, var)| var.space == AddressSpace::Uniform)
        .filter_map(|(_, var)| {
            let rb = var.binding.as_ref()?;
            let inner = &module.types[var.ty].inner;
            Some(UniformBinding {
                name: var.name.clone().unwrap_or_default(),
                group: rb.group,
                binding: rb.binding,
                size: inner.size(module.to_ctx()) as u64,
                ty: inner.clone(),
            })
        })
        .collect()
}

// ── link ──────────────────────────────────────────────────────────────────

fn single_stage<'a>(
    stages: &'a [CompiledStage],
    stage: ShaderStage,
    errors: &mut Vec<String>,
) -> Option<&'a CompiledStage> {
    let mut matching = stages.iter().filter(|s| s.stage == stage);
    let first = matching.next();
    match (first, matching.next()) {
        (None, _) => {
            errors.push(format!("no {stage} shader attached"));
            None
        }
        (Some(_), Some(_)) => {
            errors.push(format!("more than one {stage} shader attached"));
            None
        }
        (Some(s), None) => Some(s),
    }
}

fn merge_uniforms(
    vertex: Vec<UniformBinding>,
    fragment: Vec<UniformBinding>,
    errors: &mut Vec<String>,
) -> Vec<UniformBinding> {
    let mut merged = vertex;
    for u in fragment {
        let same_slot = merged
            .iter()
            .find(|m| m.group == u.group && m.binding == u.binding);
        match same_slot {
            Some(m) if m.ty != u.ty => errors.push(format!(
                "uniform slot {}:{} is declared with different types by the vertex and fragment stages",
                u.group, u.binding
            )),
            Some(_) => {}
            None => {
                if merged.iter().any(|m| m.name == u.name && !u.name.is_empty()) {
                    errors.push(format!(
                        "uniform `{}` is bound to different slots by the vertex and fragment stages",
                        u.name
                    ));
                } else {
                    merged.push(u);
                }
            }
        }
    }
    merged
}

/// Links the attached stages into a program.
///
/// Requires exactly one vertex and one fragment stage; every fragment input
/// must be written by the vertex stage with the same type, and uniforms shared
/// by both stages must agree on slot and type.
pub(crate) fn link(stages: &[CompiledStage]) -> Result<LinkedProgram, String> {
    let mut errors = Vec::new();

    let vertex = single_stage(stages, ShaderStage::Vertex, &mut errors);
    let fragment = single_stage(stages, ShaderStage::Fragment, &mut errors);

    let (Some(vertex), Some(fragment)) = (vertex, fragment) else {
        return Err(errors.join("\n"));
    };

    let produced = stage_outputs(vertex);
    for input in stage_inputs(fragment) {
        match produced.iter().find(|o| o.location == input.location) {
            None => errors.push(format!(
                "fragment input at location {} is not written by the vertex stage",
                input.location
            )),
            Some(o) if o.ty != input.ty => errors.push(format!(
                "type mismatch at location {} between vertex output and fragment input",
                input.location
            )),
            Some(_) => {}
        }
    }

    let uniforms = merge_uniforms(stage_uniforms(vertex), stage_uniforms(fragment), &mut errors);

    if !errors.is_empty() {
        return Err(errors.join("\n"));
    }

    Ok(LinkedProgram {
        vertex: vertex.clone(),
        fragment: fragment.clone(),
        uniforms,
        vertex_inputs: stage_inputs(vertex),
    })
}

// ── validate ──────────────────────────────────────────────────────────────

fn validate_stage(stage: &CompiledStage, errors: &mut Vec<String>) {
    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::default());
    if let Err(e) = validator.validate(&stage.module) {
        let rendered = e.emit_to_string(&stage.source);
        errors.push(format!("{} stage: {}", stage.stage, rendered.trim_end()));
    }

    for (_, var) in stage.module.global_variables.iter() {
        let Some(rb) = var.binding.as_ref() else { continue };
        let name = var.name.as_deref().unwrap_or("<unnamed>");
        if var.space != AddressSpace::Uniform {
            errors.push(format!(
                "{} stage: resource `{name}` is not a uniform buffer; only uniforms are supported",
                stage.stage
            ));
        } else if rb.group != 0 {
            errors.push(format!(
                "{} stage: uniform `{name}` uses bind group {}; only group 0 is available",
                stage.stage, rb.group
            ));
        }
    }
}

/// Checks that a linked program can execute on this pipeline.
pub(crate) fn validate(program: &LinkedProgram) -> Result<(), String> {
    let mut errors = Vec::new();

    validate_stage(&program.vertex, &mut errors);
    validate_stage(&program.fragment, &mut errors);

    let writes_pos = entry(&program.vertex)
        .and_then(|ep| ep.function.result.as_ref())
        .is_some_and(|r| writes_position(&program.vertex.module, r.ty, r.binding.as_ref()));
    if !writes_pos {
        errors.push("vertex stage does not write @builtin(position)".to_string());
    }

    if !stage_outputs(&program.fragment).iter().any(|o| o.location == 0) {
        errors.push("fragment stage does not write a color to @location(0)".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = r#"
@group(0) @binding(0) var<uniform> model: mat4x4<f32>;

@vertex
fn vs_main(@location(0) pos: vec3<f32>) -> @builtin(position) vec4<f32> {
    return model * vec4<f32>(pos, 1.0);
}
"#;

    const FS: &str = r#"
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.0, 0.0, 1.0);
}
"#;

    fn vs() -> CompiledStage {
        compile(ShaderStage::Vertex, VS).unwrap()
    }

    fn fs() -> CompiledStage {
        compile(ShaderStage::Fragment, FS).unwrap()
    }

    // ── compile ───────────────────────────────────────────────────────────

    #[test]
    fn compile_finds_entry_point() {
        assert_eq!(vs().entry_point, "vs_main");
        assert_eq!(fs().entry_point, "fs_main");
    }

    #[test]
    fn compile_reports_syntax_error() {
        let log = compile(ShaderStage::Vertex, "@vertex fn vs_main( {").unwrap_err();
        assert!(!log.trim().is_empty());
    }

    #[test]
    fn compile_rejects_wrong_stage() {
        let log = compile(ShaderStage::Vertex, FS).unwrap_err();
        assert!(log.contains("no @vertex entry point"), "{log}");
    }

    // ── reflection ────────────────────────────────────────────────────────

    #[test]
    fn reflects_vertex_input_and_uniform() {
        let v = vs();
        let inputs = stage_inputs(&v);
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].location, 0);

        let uniforms = stage_uniforms(&v);
        assert_eq!(uniforms.len(), 1);
        assert_eq!(uniforms[0].name, "model");
        assert_eq!((uniforms[0].group, uniforms[0].binding), (0, 0));
        assert_eq!(uniforms[0].size, 64);
    }

    // ── link ──────────────────────────────────────────────────────────────

    #[test]
    fn link_pairs_stages() {
        let p = link(&[vs(), fs()]).unwrap();
        assert!(p.uniform("model").is_some());
        assert!(p.uniform("view").is_none());
    }

    #[test]
    fn link_requires_vertex_stage() {
        let log = link(&[fs()]).unwrap_err();
        assert!(log.contains("no vertex shader attached"), "{log}");
    }

    #[test]
    fn link_rejects_duplicate_stage() {
        let log = link(&[vs(), vs(), fs()]).unwrap_err();
        assert!(log.contains("more than one vertex shader"), "{log}");
    }

    #[test]
    fn link_rejects_unwritten_fragment_input() {
        let fs_in = compile(
            ShaderStage::Fragment,
            "@fragment fn fs_main(@location(2) c: vec4<f32>) -> @location(0) vec4<f32> { return c; }",
        )
        .unwrap();
        let log = link(&[vs(), fs_in]).unwrap_err();
        assert!(log.contains("location 2"), "{log}");
    }

    // ── validate ──────────────────────────────────────────────────────────

    #[test]
    fn validate_accepts_default_pair() {
        let p = link(&[vs(), fs()]).unwrap();
        assert!(validate(&p).is_ok());
    }

    #[test]
    fn validate_rejects_uniform_outside_group_zero() {
        let vs_g1 = compile(
            ShaderStage::Vertex,
            r#"
@group(1) @binding(0) var<uniform> model: mat4x4<f32>;
@vertex
fn vs_main(@location(0) pos: vec3<f32>) -> @builtin(position) vec4<f32> {
    return model * vec4<f32>(pos, 1.0);
}
"#,
        )
        .unwrap();
        let p = link(&[vs_g1, fs()]).unwrap();
        let log = validate(&p).unwrap_err();
        assert!(log.contains("bind group 1"), "{log}");
    }

    #[test]
    fn validate_renders_naga_diagnostic_with_source() {
        let vs_bad = compile(
            ShaderStage::Vertex,
            r#"
@vertex
fn vs_main(@builtin(frag_depth) d: f32) -> @builtin(position) vec4<f32> {
    return vec4<f32>(d);
}
"#,
        )
        .unwrap();
        let p = link(&[vs_bad, fs()]).unwrap();
        let log = validate(&p).unwrap_err();
        assert!(log.starts_with("vertex stage: "), "{log}");
        assert!(log.contains("vs_main"), "{log}");
        assert!(log.contains("wgsl"), "{log}");
    }

    #[test]
    fn matrix_uploads_only_fit_mat4_uniforms() {
        assert!(stage_uniforms(&vs())[0].is_mat4x4_f32());

        let tinted = compile(
            ShaderStage::Fragment,
            r#"
@group(0) @binding(1) var<uniform> tint: vec4<f32>;
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return tint;
}
"#,
        )
        .unwrap();
        let p = link(&[vs(), tinted]).unwrap();
        assert!(p.uniform("model").is_some_and(UniformBinding::is_mat4x4_f32));
        assert!(p.uniform("tint").is_some_and(|u| !u.is_mat4x4_f32()));
    }
}
