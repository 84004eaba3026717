//! Game states: logo splash, menu, and the track editor.

mod editor;
mod logo;
mod menu;

pub use editor::EditorState;
pub use logo::LogoState;
pub use menu::MenuState;

use engine::{DeferredQueue, State};
use tracing::warn;

/// Queues a state swap for the next frame boundary; the deferred queue is
/// the only transition path. A failed init is logged and the previous state
/// stays active.
fn queue_transition(defer: &DeferredQueue, next: Box<dyn State>) {
    defer.defer(move |manager, ctx| {
        let name = next.name();
        if let Err(err) = manager.set_active(next, ctx) {
            warn!(state = name, error = %err, "state transition failed");
        }
    });
}
