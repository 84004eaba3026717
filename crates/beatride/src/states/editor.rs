//! Track editor: rides a level's track into an off-screen scene target,
//! then post-processes the scene color to the screen.

use anyhow::{bail, Context, Result};
use engine::{DrawMode, KeyCode, Mesh, RenderTarget, State, StateContext, UniformValue, Vertex};
use glam::{Mat4, Vec3};
use preprocess::ProcessParams;
use tracing::{debug, warn};

use super::{queue_transition, MenuState};
use crate::shared::GameShared;
use crate::track::{self, TrackSegment};

pub struct EditorState {
    shared: GameShared,
    level_id: String,
    tempo: f32,
    segments: Vec<TrackSegment>,
    beat: f32,
    time: f32,
    track_mesh: Mesh,
    gate_mesh: Mesh,
    scene: RenderTarget,
    wireframe: bool,
    leaving: bool,
}

impl EditorState {
    pub fn new(shared: GameShared, level_id: String) -> Self {
        Self {
            shared,
            level_id,
            tempo: 120.0,
            segments: Vec::new(),
            beat: 0.0,
            time: 0.0,
            track_mesh: Mesh::default(),
            gate_mesh: Mesh::default(),
            scene: RenderTarget::unallocated(),
            wireframe: false,
            leaving: false,
        }
    }

    fn camera(&self, surface: (i32, i32)) -> Mat4 {
        let aspect = surface.0.max(1) as f32 / surface.1.max(1) as f32;
        let projection = Mat4::perspective_rh_gl(60f32.to_radians(), aspect, 0.1, 400.0);
        let view = match track::ride_at(&self.segments, self.beat) {
            Some(sample) => {
                let yaw = sample.yaw_degrees.to_radians();
                let forward = Vec3::new(yaw.sin(), 0.0, -yaw.cos());
                let eye = sample.position + Vec3::new(0.0, 1.5, 0.0);
                Mat4::look_at_rh(eye, eye + forward, Vec3::Y)
            }
            None => Mat4::look_at_rh(Vec3::new(0.0, 2.0, 6.0), Vec3::ZERO, Vec3::Y),
        };
        projection * view
    }
}

impl State for EditorState {
    fn name(&self) -> &'static str {
        "editor"
    }

    fn init(&mut self, ctx: &mut StateContext<'_>) -> Result<()> {
        let (tempo, track_path, level_name) = {
            let Some(level) = self.shared.library.level(&self.level_id) else {
                bail!("unknown level '{}'", self.level_id);
            };
            (
                level.manifest.tempo,
                level.track_path().to_path_buf(),
                level.manifest.name.clone(),
            )
        };
        self.tempo = tempo;

        let document = ctx
            .resources
            .load_text(&track_path)
            .with_context(|| format!("track for level '{}'", self.level_id))?;
        self.segments = track::parse_track(&document);
        if self.segments.is_empty() {
            warn!(level = %self.level_id, "track has no segments");
        }
        debug!(
            level = %self.level_id,
            segments = self.segments.len(),
            tempo = self.tempo,
            "editor ready"
        );

        self.track_mesh = ctx.gfx.create_mesh(&track_vertices(&self.segments));
        self.gate_mesh = ctx.gfx.create_mesh(&gate_vertices(&self.segments));

        let scene_src = ctx
            .resources
            .load_text("shaders/track.glsl")
            .context("track shader missing")?;
        let built = self
            .shared
            .shaders
            .process(&scene_src, ProcessParams::new().with_token("LEVEL", level_name));
        ctx.programs
            .install(ctx.gfx, "track", &built.vertex, &built.fragment);

        let post_src = ctx
            .resources
            .load_text("shaders/post.glsl")
            .context("post shader missing")?;
        let built = self
            .shared
            .shaders
            .process(&post_src, ProcessParams::new().with_define("SCANLINES"));
        ctx.programs
            .install(ctx.gfx, "post", &built.vertex, &built.fragment);
        Ok(())
    }

    fn update(&mut self, ctx: &mut StateContext<'_>) {
        self.time += ctx.dt;
        self.beat += self.tempo / 60.0 * ctx.dt;

        if ctx.input.was_pressed(KeyCode::Tab) {
            self.wireframe = !self.wireframe;
            ctx.audio.play("move");
            debug!(wireframe = self.wireframe, "wireframe toggled");
        }
        if ctx.input.was_pressed(KeyCode::Escape) && !self.leaving {
            self.leaving = true;
            ctx.audio.play("confirm");
            queue_transition(ctx.defer, Box::new(MenuState::new(self.shared.clone())));
        }

        self.scene
            .ensure_size(ctx.gfx, ctx.surface_size.0, ctx.surface_size.1);
        self.scene.bind(ctx.gfx);
        ctx.gfx.set_depth_test(true);
        ctx.gfx.clear(0.01, 0.02, 0.04, 1.0);

        let view_proj = self.camera(ctx.surface_size);
        if let Some(program) = ctx.programs.get("track") {
            ctx.gfx.set_wireframe(self.wireframe);
            let uniforms = [
                ("u_view_proj", UniformValue::from(view_proj)),
                ("u_time", UniformValue::F32(self.time)),
                ("u_beat", UniformValue::F32(self.beat.fract())),
            ];
            ctx.gfx
                .draw_mesh(program, &self.track_mesh, DrawMode::LineStrip, &uniforms);
            ctx.gfx
                .draw_mesh(program, &self.gate_mesh, DrawMode::Triangles, &uniforms);
            // Back to fill before the post pass draws its triangle.
            ctx.gfx.set_wireframe(false);
        }

        ctx.gfx
            .bind_default_framebuffer(ctx.surface_size.0, ctx.surface_size.1);
        ctx.gfx.set_depth_test(false);
        ctx.gfx.bind_color_texture(0, self.scene.color_texture());
        if let Some(program) = ctx.programs.get("post") {
            ctx.gfx.fullscreen_pass(
                program,
                &[
                    ("u_scene", UniformValue::I32(0)),
                    ("u_time", UniformValue::F32(self.time)),
                    ("u_beat", UniformValue::F32(self.beat.fract())),
                    (
                        "u_resolution",
                        UniformValue::Vec2([ctx.surface_size.0 as f32, ctx.surface_size.1 as f32]),
                    ),
                ],
            );
        }
    }

    fn teardown(&mut self, ctx: &mut StateContext<'_>) {
        ctx.gfx.release_mesh(&mut self.track_mesh);
        ctx.gfx.release_mesh(&mut self.gate_mesh);
        self.scene.release(ctx.gfx);
    }
}

fn track_vertices(segments: &[TrackSegment]) -> Vec<Vertex> {
    let count = segments.len().max(1) as f32;
    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            let t = index as f32 / count;
            Vertex {
                position: segment.position.to_array(),
                color: [0.2 + 0.8 * t, 0.9 - 0.5 * t, 1.0],
            }
        })
        .collect()
}

/// One small diamond (two triangles) above each segment; every fourth gate
/// is orange to mark a bar start.
fn gate_vertices(segments: &[TrackSegment]) -> Vec<Vertex> {
    let mut vertices = Vec::with_capacity(segments.len() * 6);
    for (index, segment) in segments.iter().enumerate() {
        let center = segment.position + Vec3::new(0.0, 1.0, 0.0);
        let yaw = segment.yaw_degrees.to_radians();
        let side = Vec3::new(yaw.cos(), 0.0, yaw.sin()) * 0.6;
        let up = Vec3::new(0.0, 0.8, 0.0);
        let color = if index % 4 == 0 {
            [1.0, 0.6, 0.2]
        } else {
            [0.3, 0.7, 1.0]
        };
        let quad = [center - side, center + up, center + side, center - up];
        for corner in [quad[0], quad[1], quad[3], quad[1], quad[2], quad[3]] {
            vertices.push(Vertex {
                position: corner.to_array(),
                color,
            });
        }
    }
    vertices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::states::harness::{self, Rig};

    #[test]
    fn init_loads_the_track_and_rides_at_tempo() {
        let dir = tempfile::tempdir().expect("tempdir");
        let shared = harness::demo_content(dir.path());
        let mut rig = Rig::new(dir.path());
        let mut editor = EditorState::new(shared, "demo.first".to_string());

        editor.init(&mut rig.ctx(0.0)).expect("init");
        assert_eq!(editor.segments.len(), 4, "malformed line skipped");
        assert_eq!(editor.tempo, 120.0);

        editor.update(&mut rig.ctx(0.5));
        assert!((editor.beat - 1.0).abs() < 1e-3, "120 bpm is two beats per second");
        assert!(!editor.scene.is_allocated(), "headless target stays unallocated");
    }

    #[test]
    fn unknown_level_fails_init() {
        let mut rig = Rig::new(".");
        let mut editor = EditorState::new(harness::empty_shared(), "nowhere.nothing".to_string());
        assert!(editor.init(&mut rig.ctx(0.0)).is_err());
    }

    #[test]
    fn escape_queues_the_menu_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let shared = harness::demo_content(dir.path());
        let mut rig = Rig::new(dir.path());
        let mut editor = EditorState::new(shared, "demo.first".to_string());
        editor.init(&mut rig.ctx(0.0)).expect("init");

        rig.tap(KeyCode::Escape);
        rig.latch();
        editor.update(&mut rig.ctx(0.016));
        assert_eq!(rig.defer.len(), 1);

        rig.tap(KeyCode::Escape);
        rig.latch();
        editor.update(&mut rig.ctx(0.016));
        assert_eq!(rig.defer.len(), 1, "second escape does not re-queue");
    }

    #[test]
    fn tab_toggles_wireframe() {
        let dir = tempfile::tempdir().expect("tempdir");
        let shared = harness::demo_content(dir.path());
        let mut rig = Rig::new(dir.path());
        let mut editor = EditorState::new(shared, "demo.first".to_string());
        editor.init(&mut rig.ctx(0.0)).expect("init");

        rig.tap(KeyCode::Tab);
        rig.latch();
        editor.update(&mut rig.ctx(0.016));
        assert!(editor.wireframe);

        rig.tap(KeyCode::Tab);
        rig.latch();
        editor.update(&mut rig.ctx(0.016));
        assert!(!editor.wireframe);
    }

    #[test]
    fn mesh_builders_cover_every_segment() {
        let segments = track::parse_track("0,0,0:0\n1,0,-2:90\n");
        assert_eq!(track_vertices(&segments).len(), 2);
        assert_eq!(gate_vertices(&segments).len(), 12);
    }
}
