//! Keyboard snapshot with per-frame press and release edges.
//!
//! Raw winit key events are staged as they arrive and folded in at `latch`,
//! which the frame driver calls once at the top of every frame. Edges live
//! for exactly one frame; a press and release landing between two latches
//! still reports both edges.
use std::collections::HashSet;

use winit::event::{ElementState, KeyEvent};
use winit::keyboard::PhysicalKey;

pub use winit::keyboard::KeyCode;

#[derive(Debug, Default)]
pub struct InputState {
    held: HashSet<KeyCode>,
    pressed: HashSet<KeyCode>,
    released: HashSet<KeyCode>,
    staged: Vec<(KeyCode, bool)>,
}

impl InputState {
    /// Stages a raw window event; repeats and non-code keys are ignored.
    pub fn record(&mut self, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        if event.repeat {
            return;
        }
        self.record_key(code, event.state == ElementState::Pressed);
    }

    /// Stages a synthetic key change; the test path and the driver path meet
    /// here.
    pub fn record_key(&mut self, code: KeyCode, down: bool) {
        self.staged.push((code, down));
    }

    /// Folds staged events into the held set and recomputes this frame's
    /// edges.
    pub fn latch(&mut self) {
        self.pressed.clear();
        self.released.clear();
        for (code, down) in self.staged.drain(..) {
            if down {
                if self.held.insert(code) {
                    self.pressed.insert(code);
                }
            } else if self.held.remove(&code) {
                self.released.insert(code);
            }
        }
    }

    pub fn is_held(&self, code: KeyCode) -> bool {
        self.held.contains(&code)
    }

    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.pressed.contains(&code)
    }

    pub fn was_released(&self, code: KeyCode) -> bool {
        self.released.contains(&code)
    }

    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|code| self.pressed.contains(code))
    }
}
