//! Main menu: four rows rendered by a fullscreen shader pass.

use anyhow::{Context, Result};
use engine::{KeyCode, State, StateContext, UniformValue};
use preprocess::ProcessParams;
use tracing::{debug, warn};

use super::{queue_transition, EditorState};
use crate::shared::GameShared;

/// Language-table keys, in display order.
const OPTIONS: [&str; 4] = ["menu.play", "menu.options", "menu.editor", "menu.quit"];

pub struct MenuState {
    shared: GameShared,
    selected: usize,
    time: f32,
}

impl MenuState {
    pub fn new(shared: GameShared) -> Self {
        Self {
            shared,
            selected: 0,
            time: 0.0,
        }
    }

    fn selected_label(&self) -> &str {
        self.shared.lang.get(OPTIONS[self.selected])
    }

    fn move_selection(&mut self, ctx: &StateContext<'_>, delta: isize) {
        let len = OPTIONS.len() as isize;
        self.selected = (self.selected as isize + delta).rem_euclid(len) as usize;
        ctx.audio.play("move");
        debug!(label = self.selected_label(), "menu selection");
    }

    fn activate(&mut self, ctx: &StateContext<'_>) {
        match self.selected {
            // Play and editor both ride the first available level.
            0 | 2 => match self.shared.library.first_level() {
                Some(level) => {
                    ctx.audio.play("confirm");
                    let id = level.qualified_id();
                    debug!(level = %id, "entering editor");
                    queue_transition(
                        ctx.defer,
                        Box::new(EditorState::new(self.shared.clone(), id)),
                    );
                }
                None => {
                    warn!("no levels installed");
                    ctx.audio.play("locked");
                }
            },
            1 => ctx.audio.play("locked"),
            _ => {
                debug!("quit selected");
                ctx.running.clear();
            }
        }
    }
}

impl State for MenuState {
    fn name(&self) -> &'static str {
        "menu"
    }

    fn init(&mut self, ctx: &mut StateContext<'_>) -> Result<()> {
        let source = ctx
            .resources
            .load_text("shaders/menu.glsl")
            .context("menu shader missing")?;
        let built = self.shared.shaders.process(
            &source,
            ProcessParams::new().with_token("OPTION_COUNT", OPTIONS.len().to_string()),
        );
        ctx.programs
            .install(ctx.gfx, "menu", &built.vertex, &built.fragment);
        for key in OPTIONS {
            debug!(key, label = self.shared.lang.get(key), "menu row");
        }
        Ok(())
    }

    fn update(&mut self, ctx: &mut StateContext<'_>) {
        self.time += ctx.dt;

        if ctx.input.any_pressed(&[KeyCode::KeyW, KeyCode::ArrowUp]) {
            self.move_selection(ctx, -1);
        }
        if ctx.input.any_pressed(&[KeyCode::KeyS, KeyCode::ArrowDown]) {
            self.move_selection(ctx, 1);
        }
        if ctx.input.any_pressed(&[KeyCode::Space, KeyCode::Enter]) {
            self.activate(ctx);
        }

        ctx.gfx
            .bind_default_framebuffer(ctx.surface_size.0, ctx.surface_size.1);
        ctx.gfx.clear(0.03, 0.02, 0.06, 1.0);
        if let Some(program) = ctx.programs.get("menu") {
            ctx.gfx.fullscreen_pass(
                program,
                &[
                    ("u_time", UniformValue::F32(self.time)),
                    ("u_selected", UniformValue::I32(self.selected as i32)),
                    (
                        "u_resolution",
                        UniformValue::Vec2([ctx.surface_size.0 as f32, ctx.surface_size.1 as f32]),
                    ),
                ],
            );
        }
    }
}
