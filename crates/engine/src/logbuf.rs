//! Bounded ring buffer of recent log lines, fed by a `tracing_subscriber`
//! layer installed next to the fmt layer. The frame driver owns a handle and
//! exposes the snapshot to whatever draws the debug overlay; presentation is
//! not this module's concern.
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

const DEFAULT_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct OverlayLog {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl Default for OverlayLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl OverlayLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    pub fn push_line(&self, line: String) {
        let mut lines = self.lines.lock().expect("overlay log lock poisoned");
        while lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .expect("overlay log lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().expect("overlay log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The subscriber layer feeding this buffer.
    pub fn layer(&self) -> OverlayLayer {
        OverlayLayer { log: self.clone() }
    }
}

pub struct OverlayLayer {
    log: OverlayLog,
}

impl<S: Subscriber> Layer<S> for OverlayLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        let level = event.metadata().level();
        self.log
            .push_line(format!("{level} {}{}", visitor.message, visitor.fields));
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn keeps_only_the_most_recent_lines() {
        let log = OverlayLog::new(3);
        for index in 0..5 {
            log.push_line(format!("line {index}"));
        }
        assert_eq!(log.snapshot(), vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn layer_captures_message_and_fields() {
        let log = OverlayLog::new(8);
        let subscriber = tracing_subscriber::registry().with(log.layer());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(voice = 3, "clip started");
        });

        let lines = log.snapshot();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("clip started"));
        assert!(lines[0].contains("voice=3"));
        assert!(lines[0].starts_with("INFO"));
    }
}
