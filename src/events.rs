//! Orchestrator event bus.
//!
//! External overlays subscribe for review lifecycle events. Emission is
//! at-least-once in spec order; subscribers are best-effort and a panicking
//! subscriber never affects the review.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::types::{Issue, PillarGrade, SummaryCounts};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum ReviewEvent {
    #[serde(rename = "review.started", rename_all = "camelCase")]
    Started {
        url: String,
        session_id: String,
        spec: String,
    },
    #[serde(rename = "review.issue_found")]
    IssueFound(Issue),
    #[serde(rename = "review.completed", rename_all = "camelCase")]
    Completed {
        session_id: String,
        summary: SummaryCounts,
        pillar_grades: std::collections::BTreeMap<String, PillarGrade>,
    },
    #[serde(rename = "capture_mode.changed", rename_all = "camelCase")]
    CaptureModeChanged { enabled: bool },
}

impl ReviewEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ReviewEvent::Started { .. } => "review.started",
            ReviewEvent::IssueFound(_) => "review.issue_found",
            ReviewEvent::Completed { .. } => "review.completed",
            ReviewEvent::CaptureModeChanged { .. } => "capture_mode.changed",
        }
    }
}

type Subscriber = Box<dyn Fn(&ReviewEvent) + Send + Sync>;

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(&ReviewEvent) + Send + Sync + 'static,
    {
        self.subscribers
            .lock()
            .expect("event bus poisoned")
            .push(Box::new(subscriber));
    }

    pub fn emit(&self, event: &ReviewEvent) {
        let subscribers = self.subscribers.lock().expect("event bus poisoned");
        for subscriber in subscribers.iter() {
            let _ = catch_unwind(AssertUnwindSafe(|| subscriber(event)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn events_reach_all_subscribers_in_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        bus.subscribe(move |event| {
            sink.lock().unwrap().push(event.name().to_string());
        });

        bus.emit(&ReviewEvent::Started {
            url: "https://example.test".into(),
            session_id: "review_20260115120000001".into(),
            spec: "web-baseline".into(),
        });
        bus.emit(&ReviewEvent::CaptureModeChanged { enabled: true });

        let names = seen.lock().unwrap();
        assert_eq!(
            *names,
            vec!["review.started".to_string(), "capture_mode.changed".into()]
        );
    }

    #[test]
    fn panicking_subscriber_does_not_poison_the_bus() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        bus.subscribe(|_| panic!("subscriber bug"));
        let counter = Arc::clone(&count);
        bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&ReviewEvent::CaptureModeChanged { enabled: false });
        bus.emit(&ReviewEvent::CaptureModeChanged { enabled: true });
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn event_serialization_uses_dotted_names() {
        let event = ReviewEvent::CaptureModeChanged { enabled: true };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"capture_mode.changed\""));
        assert!(json.contains("\"enabled\":true"));
    }
}
