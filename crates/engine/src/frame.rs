//! The frame driver: winit event loop, per-frame step order, and shutdown.
//!
//! Each redraw runs the same sequence. Latch input, toggle the overlay on
//! F5, drain the deferred queue, hand the context to the active state, swap
//! buffers. Clearing the run flag from anywhere ends the loop; states then
//! tear down while the GL context is still current.

use std::time::Instant;

use anyhow::{Context as _, Result};
use tracing::{debug, info, warn};
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};

use crate::audio::AudioHost;
use crate::defer::DeferredQueue;
use crate::gl::{Graphics, ProgramCache};
use crate::input::{InputState, KeyCode};
use crate::logbuf::OverlayLog;
use crate::resources::ResourceLoader;
use crate::state::{RunFlag, State, StateContext, StateManager};
use crate::window::WindowHost;

#[derive(Debug, Clone)]
pub struct FrameConfig {
    pub title: String,
    pub size: (u32, u32),
    /// Start with the debug overlay visible.
    pub overlay: bool,
}

struct FrameDriver {
    manager: StateManager,
    programs: ProgramCache,
    audio: AudioHost,
    input: InputState,
    defer: DeferredQueue,
    gfx: Graphics,
    resources: ResourceLoader,
    running: RunFlag,
    overlay_log: OverlayLog,
    overlay_visible: bool,
    overlay_was_on: bool,
    surface_size: (i32, i32),
    scale_factor: f64,
    last_frame: Instant,
    window: WindowHost,
}

impl FrameDriver {
    fn frame(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.input.latch();
        if self.input.was_pressed(KeyCode::F5) {
            self.overlay_visible = !self.overlay_visible;
        }
        let overlay_on = self.overlay_visible || self.manager.overlay_requested();
        if overlay_on && !self.overlay_was_on {
            info!(lines = self.overlay_log.len(), "debug overlay visible");
        }
        self.overlay_was_on = overlay_on;

        // Drain first so transitions requested last frame run before update.
        let events = self.defer.drain();
        let mut ctx = StateContext {
            dt,
            input: &self.input,
            audio: &self.audio,
            defer: &self.defer,
            gfx: &self.gfx,
            programs: &mut self.programs,
            resources: &self.resources,
            surface_size: self.surface_size,
            scale_factor: self.scale_factor,
            running: &self.running,
        };
        for event in events {
            event(&mut self.manager, &mut ctx);
        }
        self.manager.update_active(&mut ctx);
    }

    fn shutdown(&mut self) {
        info!("frame driver stopping");
        let mut ctx = StateContext {
            dt: 0.0,
            input: &self.input,
            audio: &self.audio,
            defer: &self.defer,
            gfx: &self.gfx,
            programs: &mut self.programs,
            resources: &self.resources,
            surface_size: self.surface_size,
            scale_factor: self.scale_factor,
            running: &self.running,
        };
        self.manager.clear(&mut ctx);
        self.programs.release_all(&self.gfx);
        self.gfx.detach();
    }
}

/// Opens the window, installs `initial` through the deferred queue, and runs
/// the event loop until the run flag clears or the window closes.
pub fn run(
    config: FrameConfig,
    audio: AudioHost,
    resources: ResourceLoader,
    overlay_log: OverlayLog,
    initial: Box<dyn State>,
) -> Result<()> {
    let event_loop = EventLoop::new().context("event loop creation failed")?;
    let window = WindowHost::new(&event_loop, &config.title, config.size)?;
    let mut gfx = Graphics::new();
    gfx.attach(window.gl());

    let surface_size = window.framebuffer_size();
    let scale_factor = window.scale_factor();
    let mut driver = FrameDriver {
        manager: StateManager::new(),
        programs: ProgramCache::new(),
        audio,
        input: InputState::default(),
        defer: DeferredQueue::new(),
        gfx,
        resources,
        running: RunFlag::new(),
        overlay_log,
        overlay_visible: config.overlay,
        overlay_was_on: false,
        surface_size,
        scale_factor,
        last_frame: Instant::now(),
        window,
    };

    driver.defer.defer(move |manager, ctx| {
        if let Err(err) = manager.set_active(initial, ctx) {
            warn!(error = %err, "initial state failed to start");
            ctx.running.clear();
        }
    });

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);
            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => {
                        debug!("close requested");
                        driver.running.clear();
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        driver.input.record(&event);
                    }
                    WindowEvent::Resized(size) => {
                        driver.window.resize_surface(size);
                        driver.surface_size = (size.width as i32, size.height as i32);
                    }
                    WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                        driver.scale_factor = scale_factor;
                    }
                    WindowEvent::RedrawRequested => {
                        driver.frame();
                        if let Err(err) = driver.window.swap_buffers() {
                            warn!(error = %err, "swap buffers failed");
                        }
                    }
                    _ => {}
                },
                Event::AboutToWait => {
                    if driver.running.is_running() {
                        driver.window.request_redraw();
                    } else {
                        driver.shutdown();
                        elwt.exit();
                    }
                }
                _ => {}
            }
        })
        .context("event loop terminated abnormally")
}
