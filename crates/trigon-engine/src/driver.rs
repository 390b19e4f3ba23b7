//! The per-frame loop.

use crate::animation::AnimationState;
use crate::device::SurfaceErrorAction;
use crate::geometry::GeometryBuffer;
use crate::gfx::{Color, GraphicsContext};
use crate::shader::ShaderProgram;
use crate::window::DisplaySurface;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameControl {
    Continue,
    Exit,
}

/// Owns everything one frame needs and executes frames in a fixed order.
pub struct FrameDriver {
    geometry: GeometryBuffer,
    program: ShaderProgram,
    animation: AnimationState,
    presented: u64,
}

impl FrameDriver {
    pub fn new(
        geometry: GeometryBuffer,
        program: ShaderProgram,
        animation: AnimationState,
    ) -> Self {
        Self {
            geometry,
            program,
            animation,
            presented: 0,
        }
    }

    pub fn animation(&self) -> &AnimationState {
        &self.animation
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    pub fn geometry(&self) -> &GeometryBuffer {
        &self.geometry
    }

    /// Frames presented since creation.
    pub fn frames_presented(&self) -> u64 {
        self.presented
    }

    /// Runs one iteration: events, viewport, clear, animate, draw, submit, present.
    ///
    /// A frame the surface could not accept is skipped without presenting;
    /// an unrecoverable surface error exits.
    pub fn frame<S, C>(&mut self, surface: &mut S, ctx: &mut C) -> FrameControl
    where
        S: DisplaySurface,
        C: GraphicsContext,
    {
        if surface.should_close() {
            return FrameControl::Exit;
        }
        surface.poll_events();

        let (width, height) = surface.framebuffer_size();
        ctx.set_viewport(width, height);
        ctx.clear(Color::BLACK);

        let transform = self.animation.advance();

        let mut active = self.program.activate(ctx);
        active.set_model(&transform);

        let mut bound = self.geometry.bind(active.context());
        bound.draw();
        bound.unbind();

        active.deactivate();

        match ctx.end_frame() {
            Ok(()) => {}
            Err(SurfaceErrorAction::Fatal) => {
                log::error!("surface lost beyond recovery; stopping");
                return FrameControl::Exit;
            }
            Err(action) => {
                log::debug!("frame not presented: {action:?}");
                return FrameControl::Continue;
            }
        }

        surface.present();
        self.presented += 1;
        FrameControl::Continue
    }

    /// Runs frames until the surface closes. Returns the number presented.
    pub fn run<S, C>(&mut self, surface: &mut S, ctx: &mut C) -> u64
    where
        S: DisplaySurface,
        C: GraphicsContext,
    {
        let start = self.presented;
        while self.frame(surface, ctx) == FrameControl::Continue {}

        let frames = self.presented - start;
        log::info!("frame loop finished after {frames} frames");
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::Transform;
    use crate::geometry::TRIANGLE;
    use crate::gfx::recording::Command;
    use crate::gfx::{RecordingContext, Topology};
    use crate::shader::{FRAGMENT_SHADER, ProgramBuild, VERTEX_SHADER};
    use crate::window::HeadlessSurface;

    fn driver(ctx: &mut RecordingContext, vertex_source: &str) -> FrameDriver {
        let geometry = GeometryBuffer::create(ctx, &TRIANGLE).unwrap();
        let program = ShaderProgram::build(ctx, vertex_source, FRAGMENT_SHADER)
            .into_program()
            .unwrap();
        ctx.take_commands();
        FrameDriver::new(geometry, program, AnimationState::new())
    }

    // ── frame ─────────────────────────────────────────────────────────────

    #[test]
    fn frame_issues_commands_in_order() {
        let mut ctx = RecordingContext::new();
        let mut d = driver(&mut ctx, VERTEX_SHADER);
        let mut surface = HeadlessSurface::new(5, (800, 600));

        assert_eq!(d.frame(&mut surface, &mut ctx), FrameControl::Continue);

        let program = d.program().handle();
        let location = d.program().model_location().unwrap();
        let expected = Transform::from_components(0.005, 1.0, 0.401);

        assert_eq!(
            ctx.commands(),
            &[
                Command::Viewport { width: 800, height: 600 },
                Command::Clear(Color::BLACK),
                Command::UseProgram(Some(program)),
                Command::UniformMatrix4 { location, columns: expected.to_cols_array() },
                Command::BindVertexArray(Some(d.geometry().vertex_array())),
                Command::DrawArrays { topology: Topology::Triangles, first: 0, count: 3 },
                Command::BindVertexArray(None),
                Command::UseProgram(None),
                Command::EndFrame,
            ]
        );
        assert_eq!(surface.polls(), 1);
        assert_eq!(surface.presented(), 1);
    }

    #[test]
    fn missing_model_location_skips_uniform_upload() {
        let vs = "
            @group(3) @binding(0) var<uniform> model: mat4x4<f32>;
            @vertex fn vs_main(@location(0) p: vec3<f32>) -> @builtin(position) vec4<f32> {
                return model * vec4<f32>(p, 1.0);
            }";
        let mut ctx = RecordingContext::new();
        let mut d = driver(&mut ctx, vs);
        let mut surface = HeadlessSurface::new(1, (800, 600));

        d.frame(&mut surface, &mut ctx);

        assert!(!ctx
            .commands()
            .iter()
            .any(|c| matches!(c, Command::UniformMatrix4 { .. })));
        assert!(ctx.commands().contains(&Command::DrawArrays {
            topology: Topology::Triangles,
            first: 0,
            count: 3
        }));
    }

    #[test]
    fn viewport_follows_framebuffer_resize() {
        let mut ctx = RecordingContext::new();
        let mut d = driver(&mut ctx, VERTEX_SHADER);
        let mut surface = HeadlessSurface::new(3, (800, 600));

        d.frame(&mut surface, &mut ctx);
        surface.resize(1280, 720);
        ctx.take_commands();
        d.frame(&mut surface, &mut ctx);

        assert_eq!(ctx.commands()[0], Command::Viewport { width: 1280, height: 720 });
    }

    #[test]
    fn closed_surface_exits_without_drawing() {
        let mut ctx = RecordingContext::new();
        let mut d = driver(&mut ctx, VERTEX_SHADER);
        let mut surface = HeadlessSurface::new(0, (800, 600));

        assert_eq!(d.frame(&mut surface, &mut ctx), FrameControl::Exit);
        assert!(ctx.commands().is_empty());
        assert_eq!(surface.polls(), 0);
        assert_eq!(d.animation(), &AnimationState::new());
    }

    // ── run ───────────────────────────────────────────────────────────────

    #[test]
    fn run_stops_when_surface_closes() {
        let mut ctx = RecordingContext::new();
        let mut d = driver(&mut ctx, VERTEX_SHADER);
        let mut surface = HeadlessSurface::new(10, (800, 600));

        assert_eq!(d.run(&mut surface, &mut ctx), 10);
        assert_eq!(ctx.frames_submitted(), 10);
        assert_eq!(surface.presented(), 10);
        assert_eq!(d.frames_presented(), 10);
        assert_eq!(d.animation().angle_degrees(), 10.0);
    }

    #[test]
    fn degraded_program_still_runs() {
        let mut ctx = RecordingContext::new();
        let geometry = GeometryBuffer::create(&mut ctx, &TRIANGLE).unwrap();
        let build = ShaderProgram::build(&mut ctx, "not a shader", FRAGMENT_SHADER);
        let ProgramBuild::Degraded { program, .. } = build else {
            panic!("expected degraded build");
        };

        let mut d = FrameDriver::new(geometry, program, AnimationState::new());
        let mut surface = HeadlessSurface::new(3, (800, 600));
        assert_eq!(d.run(&mut surface, &mut ctx), 3);
    }
}
