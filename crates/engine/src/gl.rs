//! Graphics facade over a glow GL 3.3 core context.
//!
//! `Graphics` starts detached; `attach` hands it the function table once a
//! window exists. Every draw operation is a quiet no-op while detached, which
//! keeps states runnable headless. Unsafe glow calls stay inside this module
//! and `target`; the rest of the workspace sees safe methods only.
//!
//! Types:
//!
//! - `GraphicsError` classifies compile, link, and allocation failures with
//!   the driver's diagnostic text attached.
//! - `LinkedProgram` is a linked GL program plus its introspected uniform
//!   name-to-location map; setting an unknown uniform is ignored.
//! - `ProgramCache` maps program names to linked programs. A failed link
//!   leaves the slot empty, so draws through that name do nothing.
//! - `Mesh` / `Vertex` cover position-and-color geometry uploads.
//! - `UniformValue` is the tagged value passed to the by-name uniform
//!   setters.
use std::collections::HashMap;
use std::rc::Rc;

use glow::HasContext;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum GraphicsError {
    #[error("vertex shader compile failed: {0}")]
    VertexCompile(String),

    #[error("fragment shader compile failed: {0}")]
    FragmentCompile(String),

    #[error("program link failed: {0}")]
    Link(String),

    #[error("graphics context not attached")]
    Detached,

    #[error("gl object allocation failed: {0}")]
    Allocation(String),
}

#[derive(Debug, Clone, Copy)]
pub enum UniformValue {
    F32(f32),
    I32(i32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat4([f32; 16]),
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        Self::F32(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        Self::I32(value)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(value: [f32; 2]) -> Self {
        Self::Vec2(value)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(value: [f32; 3]) -> Self {
        Self::Vec3(value)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(value: [f32; 4]) -> Self {
        Self::Vec4(value)
    }
}

impl From<glam::Vec2> for UniformValue {
    fn from(value: glam::Vec2) -> Self {
        Self::Vec2(value.to_array())
    }
}

impl From<glam::Vec3> for UniformValue {
    fn from(value: glam::Vec3) -> Self {
        Self::Vec3(value.to_array())
    }
}

impl From<glam::Vec4> for UniformValue {
    fn from(value: glam::Vec4) -> Self {
        Self::Vec4(value.to_array())
    }
}

impl From<glam::Mat4> for UniformValue {
    fn from(value: glam::Mat4) -> Self {
        Self::Mat4(value.to_cols_array())
    }
}

#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

/// Uploaded geometry. Handles are absent when created detached or after
/// release; drawing a hollow mesh does nothing.
#[derive(Debug, Default)]
pub struct Mesh {
    vao: Option<glow::VertexArray>,
    vbo: Option<glow::Buffer>,
    vertex_count: i32,
}

impl Mesh {
    pub fn vertex_count(&self) -> i32 {
        self.vertex_count
    }

    pub fn is_uploaded(&self) -> bool {
        self.vao.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    Triangles,
    Lines,
    LineStrip,
}

fn gl_mode(mode: DrawMode) -> u32 {
    match mode {
        DrawMode::Triangles => glow::TRIANGLES,
        DrawMode::Lines => glow::LINES,
        DrawMode::LineStrip => glow::LINE_STRIP,
    }
}

#[derive(Debug)]
pub struct LinkedProgram {
    handle: glow::Program,
    uniforms: HashMap<String, glow::UniformLocation>,
}

impl LinkedProgram {
    pub fn uniform_count(&self) -> usize {
        self.uniforms.len()
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.contains_key(name)
    }
}

#[derive(Default)]
pub struct ProgramCache {
    programs: HashMap<String, LinkedProgram>,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Links `vertex`/`fragment` and stores the result under `name`. Failures
    /// are logged and leave the slot empty; draws through the name are then
    /// ineffective.
    pub fn install(&mut self, gfx: &Graphics, name: &str, vertex: &str, fragment: &str) {
        match gfx.link_program(vertex, fragment) {
            Ok(program) => {
                debug!(name, uniforms = program.uniform_count(), "program linked");
                if let Some(old) = self.programs.insert(name.to_string(), program) {
                    gfx.release_program(old);
                }
            }
            Err(GraphicsError::Detached) => {
                debug!(name, "program install skipped; graphics detached");
            }
            Err(err) => {
                warn!(name, error = %err, "program link failed");
                if let Some(old) = self.programs.remove(name) {
                    gfx.release_program(old);
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&LinkedProgram> {
        self.programs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    pub fn release_all(&mut self, gfx: &Graphics) {
        for (_, program) in self.programs.drain() {
            gfx.release_program(program);
        }
    }
}

pub struct Graphics {
    gl: Option<Rc<glow::Context>>,
    // Attribute-less VAO for fullscreen passes driven by gl_VertexID.
    blank_vao: Option<glow::VertexArray>,
}

impl Default for Graphics {
    fn default() -> Self {
        Self::new()
    }
}

impl Graphics {
    pub fn new() -> Self {
        Self {
            gl: None,
            blank_vao: None,
        }
    }

    pub fn attach(&mut self, gl: Rc<glow::Context>) {
        let blank_vao = unsafe {
            match gl.create_vertex_array() {
                Ok(vao) => Some(vao),
                Err(err) => {
                    warn!(error = %err, "blank vertex array allocation failed");
                    None
                }
            }
        };
        self.blank_vao = blank_vao;
        self.gl = Some(gl);
        debug!("graphics attached");
    }

    pub fn detach(&mut self) {
        if let Some(vao) = self.blank_vao.take() {
            if let Some(gl) = self.gl.as_deref() {
                unsafe { gl.delete_vertex_array(vao) };
            }
        }
        self.gl = None;
    }

    pub fn is_attached(&self) -> bool {
        self.gl.is_some()
    }

    pub(crate) fn gl(&self) -> Option<&glow::Context> {
        self.gl.as_deref()
    }

    /// Compiles and links a program, introspecting every active uniform into
    /// the name map. Array uniforms are registered under their bare name.
    pub fn link_program(
        &self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<LinkedProgram, GraphicsError> {
        let Some(gl) = self.gl.as_deref() else {
            return Err(GraphicsError::Detached);
        };
        unsafe {
            let vertex = compile_stage(gl, glow::VERTEX_SHADER, vertex_src)
                .map_err(GraphicsError::VertexCompile)?;
            let fragment = match compile_stage(gl, glow::FRAGMENT_SHADER, fragment_src) {
                Ok(fragment) => fragment,
                Err(log) => {
                    gl.delete_shader(vertex);
                    return Err(GraphicsError::FragmentCompile(log));
                }
            };

            let program = match gl.create_program() {
                Ok(program) => program,
                Err(err) => {
                    gl.delete_shader(vertex);
                    gl.delete_shader(fragment);
                    return Err(GraphicsError::Allocation(err));
                }
            };
            gl.attach_shader(program, vertex);
            gl.attach_shader(program, fragment);
            gl.link_program(program);
            let linked = gl.get_program_link_status(program);
            gl.detach_shader(program, vertex);
            gl.detach_shader(program, fragment);
            gl.delete_shader(vertex);
            gl.delete_shader(fragment);

            if !linked {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(GraphicsError::Link(log));
            }

            let uniforms = introspect_uniforms(gl, program);
            Ok(LinkedProgram {
                handle: program,
                uniforms,
            })
        }
    }

    pub fn release_program(&self, program: LinkedProgram) {
        if let Some(gl) = self.gl.as_deref() {
            unsafe { gl.delete_program(program.handle) };
        }
    }

    pub fn create_mesh(&self, vertices: &[Vertex]) -> Mesh {
        let vertex_count = vertices.len() as i32;
        let Some(gl) = self.gl.as_deref() else {
            debug!(vertices = vertex_count, "mesh upload skipped; graphics detached");
            return Mesh {
                vao: None,
                vbo: None,
                vertex_count,
            };
        };
        unsafe {
            let vao = match gl.create_vertex_array() {
                Ok(vao) => vao,
                Err(err) => {
                    warn!(error = %err, "vertex array allocation failed");
                    return Mesh {
                        vao: None,
                        vbo: None,
                        vertex_count,
                    };
                }
            };
            let vbo = match gl.create_buffer() {
                Ok(vbo) => vbo,
                Err(err) => {
                    warn!(error = %err, "vertex buffer allocation failed");
                    gl.delete_vertex_array(vao);
                    return Mesh {
                        vao: None,
                        vbo: None,
                        vertex_count,
                    };
                }
            };

            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(vertices),
                glow::STATIC_DRAW,
            );
            let stride = std::mem::size_of::<Vertex>() as i32;
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 3, glow::FLOAT, false, stride, 12);
            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);

            Mesh {
                vao: Some(vao),
                vbo: Some(vbo),
                vertex_count,
            }
        }
    }

    pub fn release_mesh(&self, mesh: &mut Mesh) {
        let vao = mesh.vao.take();
        let vbo = mesh.vbo.take();
        mesh.vertex_count = 0;
        let Some(gl) = self.gl.as_deref() else {
            return;
        };
        unsafe {
            if let Some(vao) = vao {
                gl.delete_vertex_array(vao);
            }
            if let Some(vbo) = vbo {
                gl.delete_buffer(vbo);
            }
        }
    }

    pub fn clear(&self, r: f32, g: f32, b: f32, a: f32) {
        let Some(gl) = self.gl.as_deref() else {
            return;
        };
        unsafe {
            gl.clear_color(r, g, b, a);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
    }

    pub fn set_viewport(&self, width: i32, height: i32) {
        if let Some(gl) = self.gl.as_deref() {
            unsafe { gl.viewport(0, 0, width, height) };
        }
    }

    pub fn bind_default_framebuffer(&self, width: i32, height: i32) {
        let Some(gl) = self.gl.as_deref() else {
            return;
        };
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.viewport(0, 0, width, height);
        }
    }

    pub fn set_depth_test(&self, enabled: bool) {
        let Some(gl) = self.gl.as_deref() else {
            return;
        };
        unsafe {
            if enabled {
                gl.enable(glow::DEPTH_TEST);
            } else {
                gl.disable(glow::DEPTH_TEST);
            }
        }
    }

    pub fn set_wireframe(&self, enabled: bool) {
        let Some(gl) = self.gl.as_deref() else {
            return;
        };
        let mode = if enabled { glow::LINE } else { glow::FILL };
        unsafe { gl.polygon_mode(glow::FRONT_AND_BACK, mode) };
    }

    pub fn bind_color_texture(&self, unit: u32, texture: Option<glow::Texture>) {
        let Some(gl) = self.gl.as_deref() else {
            return;
        };
        unsafe {
            gl.active_texture(glow::TEXTURE0 + unit);
            gl.bind_texture(glow::TEXTURE_2D, texture);
        }
    }

    /// Attribute-less fullscreen triangle; the vertex stage derives positions
    /// from `gl_VertexID`.
    pub fn fullscreen_pass(&self, program: &LinkedProgram, uniforms: &[(&str, UniformValue)]) {
        let Some(gl) = self.gl.as_deref() else {
            debug!("fullscreen pass skipped; graphics detached");
            return;
        };
        let Some(vao) = self.blank_vao else {
            return;
        };
        unsafe {
            gl.use_program(Some(program.handle));
            apply_uniforms(gl, program, uniforms);
            gl.bind_vertex_array(Some(vao));
            gl.draw_arrays(glow::TRIANGLES, 0, 3);
            gl.bind_vertex_array(None);
        }
    }

    pub fn draw_mesh(
        &self,
        program: &LinkedProgram,
        mesh: &Mesh,
        mode: DrawMode,
        uniforms: &[(&str, UniformValue)],
    ) {
        let Some(gl) = self.gl.as_deref() else {
            debug!("mesh draw skipped; graphics detached");
            return;
        };
        let Some(vao) = mesh.vao else {
            return;
        };
        unsafe {
            gl.use_program(Some(program.handle));
            apply_uniforms(gl, program, uniforms);
            gl.bind_vertex_array(Some(vao));
            gl.draw_arrays(gl_mode(mode), 0, mesh.vertex_count);
            gl.bind_vertex_array(None);
        }
    }
}

unsafe fn compile_stage(gl: &glow::Context, kind: u32, source: &str) -> Result<glow::Shader, String> {
    let shader = gl.create_shader(kind)?;
    gl.shader_source(shader, source);
    gl.compile_shader(shader);
    if gl.get_shader_compile_status(shader) {
        Ok(shader)
    } else {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        Err(log)
    }
}

unsafe fn introspect_uniforms(
    gl: &glow::Context,
    program: glow::Program,
) -> HashMap<String, glow::UniformLocation> {
    let mut uniforms = HashMap::new();
    let count = gl.get_active_uniforms(program);
    for index in 0..count {
        if let Some(info) = gl.get_active_uniform(program, index) {
            if let Some(location) = gl.get_uniform_location(program, &info.name) {
                // Array uniforms report as name[0]; keep the bare name.
                let name = info.name.trim_end_matches("[0]").to_string();
                uniforms.insert(name, location);
            }
        }
    }
    uniforms
}

unsafe fn apply_uniforms(
    gl: &glow::Context,
    program: &LinkedProgram,
    uniforms: &[(&str, UniformValue)],
) {
    for (name, value) in uniforms {
        let Some(location) = program.uniforms.get(*name) else {
            continue;
        };
        match value {
            UniformValue::F32(v) => gl.uniform_1_f32(Some(location), *v),
            UniformValue::I32(v) => gl.uniform_1_i32(Some(location), *v),
            UniformValue::Vec2(v) => gl.uniform_2_f32(Some(location), v[0], v[1]),
            UniformValue::Vec3(v) => gl.uniform_3_f32(Some(location), v[0], v[1], v[2]),
            UniformValue::Vec4(v) => gl.uniform_4_f32(Some(location), v[0], v[1], v[2], v[3]),
            UniformValue::Mat4(v) => gl.uniform_matrix_4_f32_slice(Some(location), false, v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_draw_paths_are_noops() {
        let gfx = Graphics::new();
        assert!(!gfx.is_attached());
        gfx.clear(0.0, 0.0, 0.0, 1.0);
        gfx.set_depth_test(true);
        gfx.set_wireframe(true);
        gfx.bind_default_framebuffer(640, 480);

        let mut mesh = gfx.create_mesh(&[Vertex {
            position: [0.0; 3],
            color: [1.0; 3],
        }]);
        assert_eq!(mesh.vertex_count(), 1);
        assert!(!mesh.is_uploaded());
        gfx.release_mesh(&mut mesh);
        assert_eq!(mesh.vertex_count(), 0);
    }

    #[test]
    fn link_while_detached_reports_detached() {
        let gfx = Graphics::new();
        assert!(matches!(
            gfx.link_program("void main(){}", "void main(){}"),
            Err(GraphicsError::Detached)
        ));
    }

    #[test]
    fn install_while_detached_leaves_the_slot_empty() {
        let gfx = Graphics::new();
        let mut cache = ProgramCache::new();
        cache.install(&gfx, "logo", "void main(){}", "void main(){}");
        assert!(cache.get("logo").is_none());
        assert!(!cache.contains("logo"));
        cache.release_all(&gfx);
    }

    #[test]
    fn uniform_values_convert_from_math_types() {
        assert!(matches!(UniformValue::from(1.5f32), UniformValue::F32(v) if v == 1.5));
        match UniformValue::from(glam::Vec2::new(3.0, 4.0)) {
            UniformValue::Vec2(v) => assert_eq!(v, [3.0, 4.0]),
            other => panic!("unexpected variant: {other:?}"),
        }
        let identity = UniformValue::from(glam::Mat4::IDENTITY);
        match identity {
            UniformValue::Mat4(m) => {
                assert_eq!(m[0], 1.0);
                assert_eq!(m[5], 1.0);
                assert_eq!(m[1], 0.0);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
