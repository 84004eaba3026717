//! Window and GL context bring-up via winit and glutin.
//!
//! `WindowHost` bundles the window, the current GL context, and the window
//! surface, and exposes the loaded glow function table behind an `Rc` so the
//! graphics facade can share it. Creation requires a display server; the
//! rest of the engine stays testable without one.

use std::ffi::CString;
use std::num::NonZeroU32;
use std::rc::Rc;

use anyhow::{anyhow, Context as _, Result};
use glutin::config::ConfigTemplateBuilder;
use glutin::context::{ContextApi, ContextAttributesBuilder, PossiblyCurrentContext, Version};
use glutin::display::GetGlDisplay;
use glutin::prelude::*;
use glutin::surface::{Surface, SurfaceAttributesBuilder, WindowSurface};
use glutin_winit::DisplayBuilder;
use raw_window_handle::HasRawWindowHandle;
use tracing::info;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event_loop::EventLoop;
use winit::window::{Window, WindowBuilder};

pub struct WindowHost {
    surface: Surface<WindowSurface>,
    context: PossiblyCurrentContext,
    gl: Rc<glow::Context>,
    // Declared last so the surface never outlives the window it targets.
    window: Window,
}

impl WindowHost {
    /// Creates the window, picks the GL config with the most samples, and
    /// makes a 3.3 context current on its surface.
    pub fn new(event_loop: &EventLoop<()>, title: &str, size: (u32, u32)) -> Result<Self> {
        let window_builder = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(LogicalSize::new(size.0, size.1));

        let template = ConfigTemplateBuilder::new().with_transparency(false);
        let (window, gl_config) = DisplayBuilder::new()
            .with_window_builder(Some(window_builder))
            .build(event_loop, template, |configs| {
                configs
                    .reduce(|best, candidate| {
                        if candidate.num_samples() > best.num_samples() {
                            candidate
                        } else {
                            best
                        }
                    })
                    .expect("at least one GL config")
            })
            .map_err(|err| anyhow!("display creation failed: {err}"))?;
        let window = window.ok_or_else(|| anyhow!("window creation failed"))?;
        let raw_window_handle = window.raw_window_handle();

        let context_attributes = ContextAttributesBuilder::new()
            .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
            .build(Some(raw_window_handle));
        let gl_display = gl_config.display();
        let not_current = unsafe {
            gl_display
                .create_context(&gl_config, &context_attributes)
                .context("GL context creation failed")?
        };

        let inner = window.inner_size();
        let surface_attributes = SurfaceAttributesBuilder::<WindowSurface>::new().build(
            raw_window_handle,
            NonZeroU32::new(inner.width).unwrap_or(NonZeroU32::MIN),
            NonZeroU32::new(inner.height).unwrap_or(NonZeroU32::MIN),
        );
        let surface = unsafe {
            gl_display
                .create_window_surface(&gl_config, &surface_attributes)
                .context("GL surface creation failed")?
        };
        let context = not_current
            .make_current(&surface)
            .context("GL context activation failed")?;

        let gl = unsafe {
            glow::Context::from_loader_function(|symbol| {
                let symbol = CString::new(symbol).expect("GL symbol name contains NUL");
                gl_display.get_proc_address(&symbol) as *const _
            })
        };

        info!(
            title,
            width = inner.width,
            height = inner.height,
            "window created"
        );

        Ok(Self {
            surface,
            context,
            gl: Rc::new(gl),
            window,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn gl(&self) -> Rc<glow::Context> {
        Rc::clone(&self.gl)
    }

    pub fn scale_factor(&self) -> f64 {
        self.window.scale_factor()
    }

    pub fn framebuffer_size(&self) -> (i32, i32) {
        let size = self.window.inner_size();
        (size.width as i32, size.height as i32)
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    pub fn resize_surface(&self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.surface.resize(
            &self.context,
            NonZeroU32::new(size.width).unwrap_or(NonZeroU32::MIN),
            NonZeroU32::new(size.height).unwrap_or(NonZeroU32::MIN),
        );
    }

    pub fn swap_buffers(&self) -> Result<()> {
        self.surface
            .swap_buffers(&self.context)
            .context("swap buffers failed")
    }
}
