//! Core runtime: windowing, a GL facade, audio mixing, keyboard input, the
//! state lifecycle, and the frame driver that ties them together.
//!
//! Everything except `window` and `frame` runs without a display or an audio
//! device. Graphics start detached and every draw call no-ops until a
//! context attaches, the audio host degrades to a disabled mode, and state
//! lifecycle tests drive frames by hand.

pub mod audio;
pub mod defer;
pub mod frame;
pub mod gl;
pub mod input;
pub mod logbuf;
pub mod resources;
pub mod state;
pub mod target;
pub mod window;

pub use audio::{AudioHost, Clip, LoopHandle};
pub use defer::{DeferredEvent, DeferredQueue};
pub use frame::FrameConfig;
pub use gl::{
    DrawMode, Graphics, GraphicsError, LinkedProgram, Mesh, ProgramCache, UniformValue, Vertex,
};
pub use input::{InputState, KeyCode};
pub use logbuf::OverlayLog;
pub use resources::{ResourceError, ResourceLoader};
pub use state::{RunFlag, State, StateContext, StateManager};
pub use target::RenderTarget;
pub use window::WindowHost;
