//! Offscreen render target: RGBA8 color texture plus a depth renderbuffer.
//!
//! A target starts unallocated with size (-1, -1); `ensure_size` allocates or
//! reallocates lazily, and only when the requested size actually differs.
//! While graphics are detached the target stays unallocated and the sentinel
//! size survives, so a later attach sees a size mismatch and allocates then.

use glow::HasContext;
use tracing::{debug, warn};

use crate::gl::Graphics;

#[derive(Debug)]
pub struct RenderTarget {
    width: i32,
    height: i32,
    fbo: Option<glow::Framebuffer>,
    color: Option<glow::Texture>,
    depth: Option<glow::Renderbuffer>,
}

impl Default for RenderTarget {
    fn default() -> Self {
        Self::unallocated()
    }
}

fn needs_realloc(current: (i32, i32), requested: (i32, i32)) -> bool {
    current != requested
}

impl RenderTarget {
    pub fn unallocated() -> Self {
        Self {
            width: -1,
            height: -1,
            fbo: None,
            color: None,
            depth: None,
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.fbo.is_some()
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    /// Allocates GL storage at `width` x `height`, replacing any previous
    /// allocation of a different size. Same-size calls return immediately.
    pub fn ensure_size(&mut self, gfx: &Graphics, width: i32, height: i32) {
        if !needs_realloc((self.width, self.height), (width, height)) {
            return;
        }
        self.release(gfx);

        let Some(gl) = gfx.gl() else {
            return;
        };
        unsafe {
            let fbo = match gl.create_framebuffer() {
                Ok(fbo) => fbo,
                Err(err) => {
                    warn!(error = %err, "framebuffer allocation failed");
                    return;
                }
            };
            let color = match gl.create_texture() {
                Ok(color) => color,
                Err(err) => {
                    warn!(error = %err, "color texture allocation failed");
                    gl.delete_framebuffer(fbo);
                    return;
                }
            };
            let depth = match gl.create_renderbuffer() {
                Ok(depth) => depth,
                Err(err) => {
                    warn!(error = %err, "depth renderbuffer allocation failed");
                    gl.delete_texture(color);
                    gl.delete_framebuffer(fbo);
                    return;
                }
            };

            gl.bind_texture(glow::TEXTURE_2D, Some(color));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width,
                height,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                None,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.bind_texture(glow::TEXTURE_2D, None);

            gl.bind_renderbuffer(glow::RENDERBUFFER, Some(depth));
            gl.renderbuffer_storage(glow::RENDERBUFFER, glow::DEPTH_COMPONENT24, width, height);
            gl.bind_renderbuffer(glow::RENDERBUFFER, None);

            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(color),
                0,
            );
            gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                glow::DEPTH_ATTACHMENT,
                glow::RENDERBUFFER,
                Some(depth),
            );
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);

            self.fbo = Some(fbo);
            self.color = Some(color);
            self.depth = Some(depth);
            self.width = width;
            self.height = height;

            if status != glow::FRAMEBUFFER_COMPLETE {
                warn!(status, "framebuffer incomplete, releasing target");
                self.release(gfx);
                return;
            }
            debug!(width, height, "render target allocated");
        }
    }

    /// Binds the target and sets the viewport to its size. Falls back to the
    /// default framebuffer when unallocated.
    pub fn bind(&self, gfx: &Graphics) {
        let Some(gl) = gfx.gl() else {
            return;
        };
        match self.fbo {
            Some(fbo) => unsafe {
                gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
                gl.viewport(0, 0, self.width, self.height);
            },
            None => unsafe {
                gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            },
        }
    }

    pub fn color_texture(&self) -> Option<glow::Texture> {
        self.color
    }

    pub fn release(&mut self, gfx: &Graphics) {
        let fbo = self.fbo.take();
        let color = self.color.take();
        let depth = self.depth.take();
        self.width = -1;
        self.height = -1;
        let Some(gl) = gfx.gl() else {
            return;
        };
        unsafe {
            if let Some(fbo) = fbo {
                gl.delete_framebuffer(fbo);
            }
            if let Some(color) = color {
                gl.delete_texture(color);
            }
            if let Some(depth) = depth {
                gl.delete_renderbuffer(depth);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realloc_triggers_on_any_size_change() {
        assert!(needs_realloc((-1, -1), (800, 600)));
        assert!(!needs_realloc((800, 600), (800, 600)));
        assert!(needs_realloc((800, 600), (640, 480)));
    }

    #[test]
    fn detached_ensure_size_keeps_the_sentinel() {
        let gfx = Graphics::new();
        let mut target = RenderTarget::unallocated();
        target.ensure_size(&gfx, 800, 600);
        assert!(!target.is_allocated());
        assert_eq!(target.size(), (-1, -1));
        assert!(target.color_texture().is_none());
        target.bind(&gfx);
        target.release(&gfx);
        assert_eq!(target.size(), (-1, -1));
    }
}
