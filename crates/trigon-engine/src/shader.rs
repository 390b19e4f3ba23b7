//! Shader program construction and activation.
//!
//! Building a program never panics and never aborts on shader errors: every
//! compile, link and validate failure becomes a [`ShaderDiagnostic`] that is
//! logged and returned alongside whatever program object was produced. The
//! caller decides what a degraded program means for it.

use thiserror::Error;

use crate::animation::Transform;
use crate::gfx::{GraphicsContext, ProgramHandle, ShaderHandle, ShaderStage, UniformLocation};

/// Vertex stage of the triangle program.
pub const VERTEX_SHADER: &str = include_str!("shaders/triangle.vert.wgsl");

/// Fragment stage of the triangle program (opaque red).
pub const FRAGMENT_SHADER: &str = include_str!("shaders/triangle.frag.wgsl");

/// Name of the model-matrix uniform read by the vertex stage.
pub const MODEL_UNIFORM: &str = "model";

/// Upper bound on the characters kept from any info log.
pub const MAX_DIAGNOSTIC_LEN: usize = 1024;

fn bounded(log: impl AsRef<str>) -> String {
    log.as_ref().chars().take(MAX_DIAGNOSTIC_LEN).collect()
}

/// A reported, non-fatal problem encountered while building a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShaderDiagnostic {
    #[error("error compiling the {stage} shader: '{log}'")]
    Compile { stage: ShaderStage, log: String },

    #[error("error linking program: '{log}'")]
    Link { log: String },

    #[error("error validating program: '{log}'")]
    Validate { log: String },

    #[error("shader creation failed: {reason}")]
    ProgramCreate { reason: String },
}

impl ShaderDiagnostic {
    /// The captured log or reason text.
    pub fn log(&self) -> &str {
        match self {
            ShaderDiagnostic::Compile { log, .. }
            | ShaderDiagnostic::Link { log }
            | ShaderDiagnostic::Validate { log } => log,
            ShaderDiagnostic::ProgramCreate { reason } => reason,
        }
    }
}

/// Outcome of [`ShaderProgram::build`].
#[derive(Debug)]
pub enum ProgramBuild {
    /// Every stage compiled, the program linked and validated.
    Ready(ShaderProgram),
    /// A program object exists but at least one step failed.
    Degraded {
        program: ShaderProgram,
        diagnostics: Vec<ShaderDiagnostic>,
    },
    /// No program object could be created.
    Failed(Vec<ShaderDiagnostic>),
}

impl ProgramBuild {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProgramBuild::Ready(_))
    }

    pub fn program(&self) -> Option<&ShaderProgram> {
        match self {
            ProgramBuild::Ready(program) | ProgramBuild::Degraded { program, .. } => Some(program),
            ProgramBuild::Failed(_) => None,
        }
    }

    pub fn diagnostics(&self) -> &[ShaderDiagnostic] {
        match self {
            ProgramBuild::Ready(_) => &[],
            ProgramBuild::Degraded { diagnostics, .. } | ProgramBuild::Failed(diagnostics) => {
                diagnostics
            }
        }
    }

    /// Consumes the build, returning the program if one exists.
    pub fn into_program(self) -> Option<ShaderProgram> {
        match self {
            ProgramBuild::Ready(program) | ProgramBuild::Degraded { program, .. } => Some(program),
            ProgramBuild::Failed(_) => None,
        }
    }
}

/// A program object plus the model uniform location resolved at build time.
#[derive(Debug)]
pub struct ShaderProgram {
    program: ProgramHandle,
    model_location: Option<UniformLocation>,
}

impl ShaderProgram {
    /// Creates, compiles, links and validates a two-stage program.
    ///
    /// A stage that fails to compile is reported and left unattached; linking
    /// is still attempted and reports the missing stage. Validation only runs
    /// after a successful link. `model_location` is resolved only when every
    /// step succeeded.
    pub fn build<C: GraphicsContext>(
        ctx: &mut C,
        vertex_source: &str,
        fragment_source: &str,
    ) -> ProgramBuild {
        let program = match ctx.create_program() {
            Ok(p) => p,
            Err(e) => {
                return failed(ShaderDiagnostic::ProgramCreate {
                    reason: bounded(e.to_string()),
                });
            }
        };

        let mut diagnostics = Vec::new();

        for (stage, source) in [
            (ShaderStage::Vertex, vertex_source),
            (ShaderStage::Fragment, fragment_source),
        ] {
            match compile_stage(ctx, stage, source) {
                Ok(shader) => ctx.attach_shader(program, shader),
                Err(StageError::Create(e)) => {
                    return failed(ShaderDiagnostic::ProgramCreate {
                        reason: bounded(format!("{stage} shader: {e}")),
                    });
                }
                Err(StageError::Compile(log)) => {
                    report(&mut diagnostics, ShaderDiagnostic::Compile { stage, log });
                }
            }
        }

        if !ctx.link_program(program) {
            let log = bounded(ctx.program_info_log(program));
            report(&mut diagnostics, ShaderDiagnostic::Link { log });
        } else if !ctx.validate_program(program) {
            let log = bounded(ctx.program_info_log(program));
            report(&mut diagnostics, ShaderDiagnostic::Validate { log });
        }

        if diagnostics.is_empty() {
            let model_location = ctx.uniform_location(program, MODEL_UNIFORM);
            if model_location.is_none() {
                log::warn!("program {program:?} has no `{MODEL_UNIFORM}` uniform");
            }
            log::debug!("program {program:?} ready");
            ProgramBuild::Ready(ShaderProgram { program, model_location })
        } else {
            ProgramBuild::Degraded {
                program: ShaderProgram { program, model_location: None },
                diagnostics,
            }
        }
    }

    #[inline]
    pub fn handle(&self) -> ProgramHandle {
        self.program
    }

    #[inline]
    pub fn model_location(&self) -> Option<UniformLocation> {
        self.model_location
    }

    /// Looks up a uniform by name; `None` when the program does not declare it.
    pub fn uniform_location<C: GraphicsContext>(
        &self,
        ctx: &C,
        name: &str,
    ) -> Option<UniformLocation> {
        ctx.uniform_location(self.program, name)
    }

    /// Puts the program in use until the guard is dropped or deactivated.
    pub fn activate<'a, C: GraphicsContext>(&'a self, ctx: &'a mut C) -> ActiveProgram<'a, C> {
        ctx.use_program(Some(self.program));
        ActiveProgram { program: self, ctx }
    }
}

/// A [`ShaderProgram`] in use on a context. Uniform uploads go through this guard.
pub struct ActiveProgram<'a, C: GraphicsContext> {
    program: &'a ShaderProgram,
    ctx: &'a mut C,
}

impl<'a, C: GraphicsContext> ActiveProgram<'a, C> {
    /// Uploads `transform` as 16 column-major floats.
    pub fn set_matrix_uniform(&mut self, location: UniformLocation, transform: &Transform) {
        self.ctx.uniform_matrix4(location, &transform.to_cols_array());
    }

    /// Uploads `transform` to the model uniform. Returns `false` when the
    /// program has no model location.
    pub fn set_model(&mut self, transform: &Transform) -> bool {
        match self.program.model_location {
            Some(location) => {
                self.set_matrix_uniform(location, transform);
                true
            }
            None => false,
        }
    }

    /// Reborrows the context, e.g. to bind geometry while the program is in use.
    pub fn context(&mut self) -> &mut C {
        self.ctx
    }

    pub fn deactivate(self) {}
}

impl<C: GraphicsContext> Drop for ActiveProgram<'_, C> {
    fn drop(&mut self) {
        self.ctx.use_program(None);
    }
}

enum StageError {
    Create(crate::gfx::ContextError),
    Compile(String),
}

fn compile_stage<C: GraphicsContext>(
    ctx: &mut C,
    stage: ShaderStage,
    source: &str,
) -> Result<ShaderHandle, StageError> {
    let shader = ctx.create_shader(stage).map_err(StageError::Create)?;
    ctx.shader_source(shader, source);
    if ctx.compile_shader(shader) {
        Ok(shader)
    } else {
        Err(StageError::Compile(bounded(ctx.shader_info_log(shader))))
    }
}

fn report(diagnostics: &mut Vec<ShaderDiagnostic>, diagnostic: ShaderDiagnostic) {
    log::error!("{diagnostic}");
    diagnostics.push(diagnostic);
}

fn failed(diagnostic: ShaderDiagnostic) -> ProgramBuild {
    log::error!("{diagnostic}");
    ProgramBuild::Failed(vec![diagnostic])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::recording::Command;
    use crate::gfx::{RecordingContext, ResourceKind};

    const BAD_GROUP_VS: &str = "
        @group(1) @binding(0) var<uniform> model: mat4x4<f32>;
        @vertex fn vs_main(@location(0) p: vec3<f32>) -> @builtin(position) vec4<f32> {
            return model * vec4<f32>(p, 1.0);
        }";

    fn ready(ctx: &mut RecordingContext) -> ShaderProgram {
        match ShaderProgram::build(ctx, VERTEX_SHADER, FRAGMENT_SHADER) {
            ProgramBuild::Ready(p) => p,
            other => panic!("expected ready program, got {:?}", other.diagnostics()),
        }
    }

    // ── build ─────────────────────────────────────────────────────────────

    #[test]
    fn embedded_sources_build_ready() {
        let mut ctx = RecordingContext::new();
        let program = ready(&mut ctx);
        assert_eq!(program.model_location(), Some(UniformLocation(0)));
        assert_eq!(
            program.uniform_location(&ctx, MODEL_UNIFORM),
            program.model_location()
        );
        assert_eq!(program.uniform_location(&ctx, "missing"), None);
    }

    #[test]
    fn invalid_vertex_source_is_reported_not_fatal() {
        let mut ctx = RecordingContext::new();
        let build = ShaderProgram::build(&mut ctx, "fn vs_main( {", FRAGMENT_SHADER);

        assert!(build.program().is_some());
        let diags = build.diagnostics();
        assert!(matches!(
            &diags[0],
            ShaderDiagnostic::Compile { stage: ShaderStage::Vertex, log } if !log.is_empty()
        ));
        // The vertex stage was never attached, so the link reports it.
        assert!(matches!(
            &diags[1],
            ShaderDiagnostic::Link { log } if log.contains("no vertex shader")
        ));
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn link_failure_skips_validation() {
        let mut ctx = RecordingContext::new();
        let build = ShaderProgram::build(&mut ctx, FRAGMENT_SHADER, FRAGMENT_SHADER);
        let diags = build.diagnostics();
        assert!(diags.iter().any(|d| matches!(d, ShaderDiagnostic::Link { .. })));
        assert!(!diags.iter().any(|d| matches!(d, ShaderDiagnostic::Validate { .. })));
    }

    #[test]
    fn validation_failure_degrades_without_model_location() {
        let mut ctx = RecordingContext::new();
        let build = ShaderProgram::build(&mut ctx, BAD_GROUP_VS, FRAGMENT_SHADER);

        assert!(!build.is_ready());
        assert!(matches!(
            build.diagnostics(),
            [ShaderDiagnostic::Validate { log }] if log.contains("bind group 1")
        ));
        let program = build.into_program().unwrap();
        assert_eq!(program.model_location(), None);
    }

    #[test]
    fn program_allocation_rejection_fails() {
        let mut ctx = RecordingContext::rejecting(ResourceKind::Program);
        let build = ShaderProgram::build(&mut ctx, VERTEX_SHADER, FRAGMENT_SHADER);
        assert!(build.program().is_none());
        assert!(matches!(build.diagnostics(), [ShaderDiagnostic::ProgramCreate { .. }]));
    }

    #[test]
    fn shader_allocation_rejection_fails() {
        let mut ctx = RecordingContext::rejecting(ResourceKind::Shader);
        let build = ShaderProgram::build(&mut ctx, VERTEX_SHADER, FRAGMENT_SHADER);
        assert!(matches!(build, ProgramBuild::Failed(_)));
    }

    // ── diagnostics ───────────────────────────────────────────────────────

    #[test]
    fn oversized_compile_log_is_truncated() {
        let source = format!("@vertex fn {}( {{", "v".repeat(5_000));
        let mut ctx = RecordingContext::new();
        let build = ShaderProgram::build(&mut ctx, &source, FRAGMENT_SHADER);

        let Some(ShaderDiagnostic::Compile { stage, log }) = build.diagnostics().first() else {
            panic!("expected a compile diagnostic, got {:?}", build.diagnostics());
        };
        assert_eq!(*stage, ShaderStage::Vertex);
        assert_eq!(log.chars().count(), MAX_DIAGNOSTIC_LEN);
    }

    #[test]
    fn diagnostics_are_bounded() {
        let long = "é".repeat(MAX_DIAGNOSTIC_LEN * 3);
        let b = bounded(&long);
        assert_eq!(b.chars().count(), MAX_DIAGNOSTIC_LEN);
        assert_eq!(bounded("short"), "short");
    }

    #[test]
    fn diagnostic_display_names_stage() {
        let d = ShaderDiagnostic::Compile {
            stage: ShaderStage::Fragment,
            log: "bad".into(),
        };
        assert_eq!(d.to_string(), "error compiling the fragment shader: 'bad'");
        assert_eq!(d.log(), "bad");
    }

    // ── activation ────────────────────────────────────────────────────────

    #[test]
    fn active_program_pushes_column_major_model() {
        let mut ctx = RecordingContext::new();
        let program = ready(&mut ctx);
        ctx.take_commands();

        let t = Transform::from_components(0.1, 0.0, 0.5);
        let mut active = program.activate(&mut ctx);
        assert!(active.set_model(&t));
        active.deactivate();

        assert_eq!(
            ctx.commands(),
            &[
                Command::UseProgram(Some(program.handle())),
                Command::UniformMatrix4 {
                    location: UniformLocation(0),
                    columns: t.to_cols_array(),
                },
                Command::UseProgram(None),
            ]
        );
    }

    #[test]
    fn set_model_without_location_is_skipped() {
        let mut ctx = RecordingContext::new();
        let program = ShaderProgram::build(&mut ctx, BAD_GROUP_VS, FRAGMENT_SHADER)
            .into_program()
            .unwrap();
        ctx.take_commands();

        {
            let mut active = program.activate(&mut ctx);
            assert!(!active.set_model(&Transform::from_components(0.0, 0.0, 1.0)));
        }
        assert_eq!(
            ctx.commands(),
            &[Command::UseProgram(Some(program.handle())), Command::UseProgram(None)]
        );
    }
}
