//! State lifecycle protocol and the manager that owns the active state.
//!
//! Types:
//!
//! - `State` is the lifecycle trait: fail-fast `init`, per-frame `update`, a
//!   `teardown` hook for releasing GPU objects, and an overlay request.
//! - `StateContext` is the capability bundle handed to every lifecycle call.
//!   It deliberately does not expose the `StateManager`, so a state can never
//!   replace itself synchronously; transitions go through the deferred queue.
//! - `StateManager` holds exactly one live state and swaps it with
//!   init-before-teardown ordering.
//! - `RunFlag` is the process-wide shutdown latch shared with the frame
//!   driver.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::audio::AudioHost;
use crate::defer::DeferredQueue;
use crate::gl::{Graphics, ProgramCache};
use crate::input::InputState;
use crate::resources::ResourceLoader;

pub struct StateContext<'a> {
    /// Seconds elapsed since the previous frame.
    pub dt: f32,
    pub input: &'a InputState,
    pub audio: &'a AudioHost,
    pub defer: &'a DeferredQueue,
    pub gfx: &'a Graphics,
    pub programs: &'a mut ProgramCache,
    pub resources: &'a ResourceLoader,
    /// Framebuffer size in physical pixels.
    pub surface_size: (i32, i32),
    pub scale_factor: f64,
    pub running: &'a RunFlag,
}

pub trait State {
    fn name(&self) -> &'static str;

    /// Loads everything the state needs up front. An error here aborts the
    /// transition and leaves the previous state active.
    fn init(&mut self, ctx: &mut StateContext<'_>) -> Result<()>;

    fn update(&mut self, ctx: &mut StateContext<'_>);

    /// Runs right before the state is dropped; release GL objects here.
    fn teardown(&mut self, _ctx: &mut StateContext<'_>) {}

    /// States that want the debug overlay regardless of the user toggle.
    fn wants_overlay(&self) -> bool {
        false
    }
}

/// Cloneable shutdown latch; starts in the running position.
#[derive(Clone)]
pub struct RunFlag(Arc<AtomicBool>);

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl RunFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

#[derive(Default)]
pub struct StateManager {
    active: Option<Box<dyn State>>,
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `next` as the active state. `next.init` runs first; only once
    /// it succeeds does the outgoing state tear down, so GPU resources may
    /// transiently coexist across the swap. An init error leaves the previous
    /// state active and propagates.
    pub fn set_active(
        &mut self,
        mut next: Box<dyn State>,
        ctx: &mut StateContext<'_>,
    ) -> Result<()> {
        next.init(ctx)?;
        debug!(state = next.name(), "state initialised");
        if let Some(mut old) = self.active.replace(next) {
            old.teardown(ctx);
            debug!(state = old.name(), "state released");
        }
        Ok(())
    }

    pub fn update_active(&mut self, ctx: &mut StateContext<'_>) {
        if let Some(active) = self.active.as_mut() {
            active.update(ctx);
        }
    }

    pub fn overlay_requested(&self) -> bool {
        self.active
            .as_ref()
            .map(|state| state.wants_overlay())
            .unwrap_or(false)
    }

    pub fn has_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_name(&self) -> Option<&'static str> {
        self.active.as_ref().map(|state| state.name())
    }

    /// Tears down and drops the active state; the shutdown path, run while
    /// the GL context is still alive.
    pub fn clear(&mut self, ctx: &mut StateContext<'_>) {
        if let Some(mut old) = self.active.take() {
            old.teardown(ctx);
            debug!(state = old.name(), "state released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Journal = Arc<Mutex<Vec<String>>>;

    fn note(journal: &Journal, entry: impl Into<String>) {
        journal.lock().unwrap().push(entry.into());
    }

    struct Fixture {
        input: InputState,
        audio: AudioHost,
        defer: DeferredQueue,
        gfx: Graphics,
        programs: ProgramCache,
        resources: ResourceLoader,
        running: RunFlag,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                input: InputState::default(),
                audio: AudioHost::disabled(),
                defer: DeferredQueue::new(),
                gfx: Graphics::new(),
                programs: ProgramCache::new(),
                resources: ResourceLoader::new("."),
                running: RunFlag::new(),
            }
        }

        fn ctx(&mut self) -> StateContext<'_> {
            StateContext {
                dt: 1.0 / 60.0,
                input: &self.input,
                audio: &self.audio,
                defer: &self.defer,
                gfx: &self.gfx,
                programs: &mut self.programs,
                resources: &self.resources,
                surface_size: (640, 480),
                scale_factor: 1.0,
                running: &self.running,
            }
        }
    }

    /// One driver frame: drain the queue, run the snapshot, then update.
    fn pump(fixture: &mut Fixture, manager: &mut StateManager) {
        let events = fixture.defer.drain();
        let mut ctx = fixture.ctx();
        for event in events {
            event(manager, &mut ctx);
        }
        manager.update_active(&mut ctx);
    }

    struct Probe {
        label: &'static str,
        journal: Journal,
    }

    impl State for Probe {
        fn name(&self) -> &'static str {
            self.label
        }

        fn init(&mut self, _ctx: &mut StateContext<'_>) -> Result<()> {
            note(&self.journal, format!("init {}", self.label));
            Ok(())
        }

        fn update(&mut self, _ctx: &mut StateContext<'_>) {
            note(&self.journal, format!("update {}", self.label));
        }

        fn teardown(&mut self, _ctx: &mut StateContext<'_>) {
            note(&self.journal, format!("teardown {}", self.label));
        }
    }

    struct Chainer {
        journal: Journal,
    }

    impl State for Chainer {
        fn name(&self) -> &'static str {
            "chainer"
        }

        fn init(&mut self, _ctx: &mut StateContext<'_>) -> Result<()> {
            note(&self.journal, "init chainer");
            Ok(())
        }

        fn update(&mut self, ctx: &mut StateContext<'_>) {
            note(&self.journal, "update chainer");
            let journal_a = self.journal.clone();
            ctx.defer.defer(move |manager, ctx| {
                note(&journal_a, "event a");
                let probe = Probe {
                    label: "a",
                    journal: journal_a.clone(),
                };
                manager.set_active(Box::new(probe), ctx).unwrap();
            });
            let journal_b = self.journal.clone();
            ctx.defer.defer(move |manager, ctx| {
                note(
                    &journal_b,
                    format!("event b sees {}", manager.active_name().unwrap_or("none")),
                );
                let probe = Probe {
                    label: "b",
                    journal: journal_b.clone(),
                };
                manager.set_active(Box::new(probe), ctx).unwrap();
            });
            note(&self.journal, "update chainer done");
        }

        fn teardown(&mut self, _ctx: &mut StateContext<'_>) {
            note(&self.journal, "teardown chainer");
        }
    }

    struct FailingInit;

    impl State for FailingInit {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn init(&mut self, _ctx: &mut StateContext<'_>) -> Result<()> {
            anyhow::bail!("resources unavailable")
        }

        fn update(&mut self, _ctx: &mut StateContext<'_>) {}
    }

    #[test]
    fn two_deferred_transitions_run_in_order_after_update_returns() {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let mut fixture = Fixture::new();
        let mut manager = StateManager::new();

        {
            let mut ctx = fixture.ctx();
            let chainer = Chainer {
                journal: journal.clone(),
            };
            manager.set_active(Box::new(chainer), &mut ctx).unwrap();
        }

        // First frame: the chainer's update enqueues both transitions but
        // neither may run inside it.
        pump(&mut fixture, &mut manager);
        assert_eq!(manager.active_name(), Some("chainer"));
        assert_eq!(fixture.defer.len(), 2);

        // Second frame: both transitions run FIFO; the second observes the
        // first one's init effect.
        pump(&mut fixture, &mut manager);
        assert_eq!(manager.active_name(), Some("b"));

        let entries = journal.lock().unwrap().clone();
        assert_eq!(
            entries,
            vec![
                "init chainer",
                "update chainer",
                "update chainer done",
                "event a",
                "init a",
                "teardown chainer",
                "event b sees a",
                "init b",
                "teardown a",
                "update b",
            ]
        );
    }

    #[test]
    fn events_enqueued_while_draining_wait_one_frame() {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let mut fixture = Fixture::new();
        let mut manager = StateManager::new();

        let outer = journal.clone();
        fixture.defer.defer(move |_, ctx| {
            note(&outer, "first");
            let inner = outer.clone();
            ctx.defer.defer(move |_, _| {
                note(&inner, "second");
            });
        });

        pump(&mut fixture, &mut manager);
        assert_eq!(*journal.lock().unwrap(), vec!["first"]);

        pump(&mut fixture, &mut manager);
        assert_eq!(*journal.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn failed_init_keeps_the_previous_state_active() {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let mut fixture = Fixture::new();
        let mut manager = StateManager::new();
        let mut ctx = fixture.ctx();

        let probe = Probe {
            label: "start",
            journal: journal.clone(),
        };
        manager.set_active(Box::new(probe), &mut ctx).unwrap();

        let err = manager.set_active(Box::new(FailingInit), &mut ctx);
        assert!(err.is_err());
        assert_eq!(manager.active_name(), Some("start"));

        // The survivor was never torn down.
        let entries = journal.lock().unwrap().clone();
        assert_eq!(entries, vec!["init start"]);
    }

    #[test]
    fn clear_tears_down_the_active_state() {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let mut fixture = Fixture::new();
        let mut manager = StateManager::new();
        let mut ctx = fixture.ctx();

        let probe = Probe {
            label: "only",
            journal: journal.clone(),
        };
        manager.set_active(Box::new(probe), &mut ctx).unwrap();
        manager.clear(&mut ctx);

        assert!(!manager.has_active());
        assert_eq!(*journal.lock().unwrap(), vec!["init only", "teardown only"]);
    }

    #[test]
    fn update_without_an_active_state_is_a_noop() {
        let mut fixture = Fixture::new();
        let mut manager = StateManager::new();
        let mut ctx = fixture.ctx();
        manager.update_active(&mut ctx);
        assert!(!manager.overlay_requested());
    }
}
