//! Logo splash: a glitch shader pass over a looping hum.

use anyhow::{Context, Result};
use engine::{LoopHandle, State, StateContext, UniformValue};
use preprocess::ProcessParams;
use tracing::debug;

use super::{queue_transition, MenuState};
use crate::shared::GameShared;
use crate::synth;

/// Timer advance per second; the splash lasts five seconds.
const ADVANCE_RATE: f32 = 0.2;

pub struct LogoState {
    shared: GameShared,
    timer: f32,
    elapsed: f32,
    hum: Option<LoopHandle>,
    pulse_seed: u32,
    pulsed_second: u32,
    finished: bool,
}

impl LogoState {
    pub fn new(shared: GameShared) -> Self {
        Self {
            shared,
            timer: 0.0,
            elapsed: 0.0,
            hum: None,
            pulse_seed: 0x5eed_0001,
            pulsed_second: 0,
            finished: false,
        }
    }
}

impl State for LogoState {
    fn name(&self) -> &'static str {
        "logo"
    }

    fn init(&mut self, ctx: &mut StateContext<'_>) -> Result<()> {
        let source = ctx
            .resources
            .load_text("shaders/logo.glsl")
            .context("logo shader missing")?;
        let built = self
            .shared
            .shaders
            .process(&source, ProcessParams::new().with_token("GLITCH", "0.35"));
        ctx.programs
            .install(ctx.gfx, "logo", &built.vertex, &built.fragment);
        self.hum = Some(ctx.audio.play_loop("hum", 0.3));
        Ok(())
    }

    fn update(&mut self, ctx: &mut StateContext<'_>) {
        self.timer += ADVANCE_RATE * ctx.dt;
        self.elapsed += ctx.dt;

        // Once a second, roll whether the hum swells or recedes.
        let second = self.elapsed as u32;
        if second != self.pulsed_second {
            self.pulsed_second = second;
            let roll = synth::xorshift(&mut self.pulse_seed) as f32 / u32::MAX as f32;
            let volume = if roll > 0.5 { 0.5 } else { 0.12 };
            if let Some(hum) = &self.hum {
                hum.set_volume(volume);
            }
        }

        ctx.gfx
            .bind_default_framebuffer(ctx.surface_size.0, ctx.surface_size.1);
        ctx.gfx.clear(0.02, 0.01, 0.05, 1.0);
        if let Some(program) = ctx.programs.get("logo") {
            ctx.gfx.fullscreen_pass(
                program,
                &[
                    ("u_time", UniformValue::F32(self.elapsed)),
                    ("u_fade", UniformValue::F32(self.timer.min(1.0))),
                    (
                        "u_resolution",
                        UniformValue::Vec2([ctx.surface_size.0 as f32, ctx.surface_size.1 as f32]),
                    ),
                ],
            );
        }

        if self.timer >= 1.0 && !self.finished {
            self.finished = true;
            debug!("logo finished");
            if let Some(hum) = self.hum.take() {
                hum.stop();
            }
            queue_transition(ctx.defer, Box::new(MenuState::new(self.shared.clone())));
        }
    }

    fn teardown(&mut self, _ctx: &mut StateContext<'_>) {
        if let Some(hum) = self.hum.take() {
            hum.stop();
        }
    }
}
