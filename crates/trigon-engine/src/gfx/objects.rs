//! Shader and program object bookkeeping shared by every context.
//!
//! Contexts differ in how they realize programs on a device; the object model
//! (sources, status flags, info logs, attachments) is identical.

use std::collections::HashMap;

use super::wgsl::{self, CompiledStage, LinkedProgram};
use super::{ProgramHandle, ShaderHandle, ShaderStage, UniformLocation};

#[derive(Debug)]
pub(crate) struct ShaderObject {
    pub stage: ShaderStage,
    source: String,
    compiled: Option<CompiledStage>,
    info_log: String,
}

impl ShaderObject {
    fn new(stage: ShaderStage) -> Self {
        Self {
            stage,
            source: String::new(),
            compiled: None,
            info_log: String::new(),
        }
    }

    fn compile(&mut self) -> bool {
        match wgsl::compile(self.stage, &self.source) {
            Ok(stage) => {
                self.compiled = Some(stage);
                self.info_log.clear();
                true
            }
            Err(log) => {
                self.compiled = None;
                self.info_log = log;
                false
            }
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct ProgramObject {
    attached: Vec<ShaderHandle>,
    linked: Option<LinkedProgram>,
    validated: bool,
    info_log: String,
}

impl ProgramObject {
    pub fn linked(&self) -> Option<&LinkedProgram> {
        self.linked.as_ref()
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    fn validate(&mut self) -> bool {
        let result = match &self.linked {
            Some(program) => wgsl::validate(program),
            None => Err("program is not linked".to_string()),
        };
        self.validated = result.is_ok();
        self.info_log = result.err().unwrap_or_default();
        self.validated
    }
}

/// Handle allocation plus shader/program tables.
///
/// Handles are never reused; `0` is reserved as "no object".
#[derive(Debug, Default)]
pub(crate) struct ObjectTable {
    next_id: u32,
    shaders: HashMap<ShaderHandle, ShaderObject>,
    programs: HashMap<ProgramHandle, ProgramObject>,
}

impl ObjectTable {
    pub fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn create_shader(&mut self, stage: ShaderStage) -> ShaderHandle {
        let handle = ShaderHandle(self.next_id());
        self.shaders.insert(handle, ShaderObject::new(stage));
        handle
    }

    pub fn shader_source(&mut self, handle: ShaderHandle, source: &str) {
        match self.shaders.get_mut(&handle) {
            Some(shader) => source.clone_into(&mut shader.source),
            None => log::warn!("shader_source: unknown shader {handle:?}"),
        }
    }

    pub fn compile_shader(&mut self, handle: ShaderHandle) -> bool {
        match self.shaders.get_mut(&handle) {
            Some(shader) => shader.compile(),
            None => {
                log::warn!("compile_shader: unknown shader {handle:?}");
                false
            }
        }
    }

    pub fn shader_info_log(&self, handle: ShaderHandle) -> String {
        self.shaders
            .get(&handle)
            .map(|s| s.info_log.clone())
            .unwrap_or_default()
    }

    pub fn create_program(&mut self) -> ProgramHandle {
        let handle = ProgramHandle(self.next_id());
        self.programs.insert(handle, ProgramObject::default());
        handle
    }

    pub fn program(&self, handle: ProgramHandle) -> Option<&ProgramObject> {
        self.programs.get(&handle)
    }

    pub fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        if !self.shaders.contains_key(&shader) {
            log::warn!("attach_shader: unknown shader {shader:?}");
            return;
        }
        match self.programs.get_mut(&program) {
            Some(p) if !p.attached.contains(&shader) => p.attached.push(shader),
            Some(_) => {}
            None => log::warn!("attach_shader: unknown program {program:?}"),
        }
    }

    /// Links the program from the current compiled state of its attachments.
    pub fn link_program(&mut self, handle: ProgramHandle) -> bool {
        let Some(program) = self.programs.get(&handle) else {
            log::warn!("link_program: unknown program {handle:?}");
            return false;
        };

        let mut stages = Vec::with_capacity(program.attached.len());
        let mut errors = Vec::new();
        for shader in &program.attached {
            match self.shaders.get(shader) {
                Some(ShaderObject { compiled: Some(stage), .. }) => stages.push(stage.clone()),
                Some(s) => errors.push(format!("attached {} shader is not compiled", s.stage)),
                None => {}
            }
        }

        let result = if errors.is_empty() {
            wgsl::link(&stages)
        } else {
            Err(errors.join("\n"))
        };

        let Some(program) = self.programs.get_mut(&handle) else {
            return false;
        };
        program.validated = false;
        match result {
            Ok(linked) => {
                program.linked = Some(linked);
                program.info_log.clear();
                true
            }
            Err(log) => {
                program.linked = None;
                program.info_log = log;
                false
            }
        }
    }

    pub fn validate_program(&mut self, handle: ProgramHandle) -> bool {
        match self.programs.get_mut(&handle) {
            Some(program) => program.validate(),
            None => {
                log::warn!("validate_program: unknown program {handle:?}");
                false
            }
        }
    }

    pub fn program_info_log(&self, handle: ProgramHandle) -> String {
        self.programs
            .get(&handle)
            .map(|p| p.info_log.clone())
            .unwrap_or_default()
    }

    pub fn uniform_location(&self, handle: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let linked = self.programs.get(&handle)?.linked()?;
        linked
            .uniform(name)
            .filter(|u| u.group == 0)
            .map(|u| UniformLocation(u.binding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = "@vertex fn vs_main(@location(0) p: vec3<f32>) -> @builtin(position) vec4<f32> { return vec4<f32>(p, 1.0); }";
    const FS: &str = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";

    fn compiled(table: &mut ObjectTable, stage: ShaderStage, src: &str) -> ShaderHandle {
        let s = table.create_shader(stage);
        table.shader_source(s, src);
        table.compile_shader(s);
        s
    }

    #[test]
    fn handles_are_unique_and_nonzero() {
        let mut t = ObjectTable::default();
        let a = t.create_shader(ShaderStage::Vertex);
        let b = t.create_program();
        assert_ne!(a.0, 0);
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn compile_failure_fills_info_log() {
        let mut t = ObjectTable::default();
        let s = compiled(&mut t, ShaderStage::Vertex, "not wgsl at all");
        assert!(!t.shader_info_log(s).is_empty());
    }

    #[test]
    fn link_fails_for_uncompiled_attachment() {
        let mut t = ObjectTable::default();
        let v = compiled(&mut t, ShaderStage::Vertex, "broken(");
        let f = compiled(&mut t, ShaderStage::Fragment, FS);
        let p = t.create_program();
        t.attach_shader(p, v);
        t.attach_shader(p, f);
        assert!(!t.link_program(p));
        assert!(t.program_info_log(p).contains("not compiled"));
    }

    #[test]
    fn validate_requires_link() {
        let mut t = ObjectTable::default();
        let p = t.create_program();
        assert!(!t.validate_program(p));
        assert_eq!(t.program_info_log(p), "program is not linked");
    }

    #[test]
    fn linked_program_validates() {
        let mut t = ObjectTable::default();
        let v = compiled(&mut t, ShaderStage::Vertex, VS);
        let f = compiled(&mut t, ShaderStage::Fragment, FS);
        let p = t.create_program();
        t.attach_shader(p, v);
        t.attach_shader(p, f);
        assert!(t.link_program(p));
        assert!(t.validate_program(p));
        assert!(t.program(p).is_some_and(|p| p.is_validated()));
        assert_eq!(t.uniform_location(p, "model"), None);
    }
}
