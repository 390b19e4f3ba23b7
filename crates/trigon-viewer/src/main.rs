use anyhow::{Context, Result};

use trigon_engine::animation::AnimationState;
use trigon_engine::device::GpuInit;
use trigon_engine::driver::FrameDriver;
use trigon_engine::geometry::{GeometryBuffer, TRIANGLE};
use trigon_engine::gfx::WgpuContext;
use trigon_engine::logging::{LoggingConfig, init_logging};
use trigon_engine::shader::{FRAGMENT_SHADER, ProgramBuild, ShaderProgram, VERTEX_SHADER};
use trigon_engine::window::{SurfaceConfig, WinitSurface};

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    // Declared before the context so the context drops first.
    let mut surface =
        WinitSurface::create(&SurfaceConfig::default()).context("window initialization failed")?;

    let mut ctx = WgpuContext::new(surface.window(), GpuInit::default())
        .context("graphics context initialization failed")?;

    let geometry =
        GeometryBuffer::create(&mut ctx, &TRIANGLE).context("failed to upload triangle geometry")?;

    let program = match ShaderProgram::build(&mut ctx, VERTEX_SHADER, FRAGMENT_SHADER) {
        ProgramBuild::Ready(program) => program,
        ProgramBuild::Degraded { program, diagnostics } => {
            log::warn!(
                "continuing with a degraded shader program ({} diagnostics)",
                diagnostics.len()
            );
            program
        }
        ProgramBuild::Failed(diagnostics) => {
            let reasons: Vec<String> = diagnostics.iter().map(ToString::to_string).collect();
            anyhow::bail!("shader program creation failed: {}", reasons.join("; "));
        }
    };

    let mut driver = FrameDriver::new(geometry, program, AnimationState::new());
    let frames = driver.run(&mut surface, &mut ctx);

    log::info!("window closed after {frames} frames");
    Ok(())
}
