//! Completion and progress events emitted by the core registries.
//!
//! Every core operation reports its outcome on a two-channel surface: a
//! positive completion event carrying a result payload, or
//! [`Event::OperationFailed`] carrying a human-readable message. Errors never
//! cross the core boundary as `Err` values (construction-time validation
//! excepted) — the shell observes the receiver and renders what arrives.
//!
//! Delivery is an `std::sync::mpsc` channel. Within one package load,
//! progress events are strictly increasing and the final
//! [`Event::PackagesLoaded`] is emitted at most once, after all progress
//! events. Install/uninstall/upgrade emit exactly one terminal event each.

use std::sync::mpsc::{channel, Receiver, Sender};

use crate::mirrors::MirrorLatency;
use crate::packages::PackageRecord;

/// An event emitted by a core component.
#[derive(Debug, Clone)]
pub enum Event {
    /// A configuration document was saved or deleted.
    ConfigChanged { domain: String },

    /// Environment lifecycle completions.
    EnvCreated { name: String },
    EnvDeleted { name: String },
    EnvImported { name: String },

    /// Mirror registry completions.
    MirrorAdded { name: String },
    MirrorRemoved { name: String },
    MirrorChanged { name: String, url: String },

    /// Latency probe finished; results ascending by latency.
    SpeedTestFinished { results: Vec<MirrorLatency> },

    /// Incremental progress for a long-running operation, 0..=100.
    Progress { percent: u8 },

    /// Full package record set from a load or update check.
    PackagesLoaded { packages: Vec<PackageRecord> },

    /// Package operation completions, carrying the original spec/name.
    PackageInstalled { spec: String },
    PackageUninstalled { name: String },
    PackageUpgraded { name: String },

    /// The negative channel: any operation's failure message.
    OperationFailed { message: String },
}

/// Sending half handed to core components.
///
/// Cloneable; `emit` never fails. A sink whose receiver has been dropped
/// silently discards events, so components never need to care whether
/// anyone is listening.
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<Event>,
}

impl EventSink {
    /// Emit an event, ignoring a disconnected receiver.
    pub fn emit(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    /// Emit an [`Event::OperationFailed`] with the given message.
    pub fn fail(&self, message: impl Into<String>) {
        self.emit(Event::OperationFailed {
            message: message.into(),
        });
    }

    /// A sink with no observer, for callers that ignore events.
    pub fn detached() -> Self {
        let (tx, _rx) = channel();
        Self { tx }
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EventSink")
    }
}

/// Create a connected sink/receiver pair.
pub struct EventBus;

impl EventBus {
    pub fn new() -> (EventSink, Receiver<Event>) {
        let (tx, rx) = channel();
        (EventSink { tx }, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitted_events_arrive_in_order() {
        let (sink, rx) = EventBus::new();
        sink.emit(Event::Progress { percent: 25 });
        sink.emit(Event::Progress { percent: 100 });

        assert!(matches!(rx.recv().unwrap(), Event::Progress { percent: 25 }));
        assert!(matches!(rx.recv().unwrap(), Event::Progress { percent: 100 }));
    }

    #[test]
    fn detached_sink_discards_silently() {
        let sink = EventSink::detached();
        sink.emit(Event::EnvCreated { name: "dev".into() });
        sink.fail("nobody listening");
    }

    #[test]
    fn emit_survives_dropped_receiver() {
        let (sink, rx) = EventBus::new();
        drop(rx);
        sink.emit(Event::EnvDeleted { name: "dev".into() });
    }

    #[test]
    fn fail_wraps_message() {
        let (sink, rx) = EventBus::new();
        sink.fail("boom");
        match rx.recv().unwrap() {
            Event::OperationFailed { message } => assert_eq!(message, "boom"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn cloned_sinks_share_one_receiver() {
        let (sink, rx) = EventBus::new();
        let second = sink.clone();
        sink.emit(Event::Progress { percent: 1 });
        second.emit(Event::Progress { percent: 2 });
        assert_eq!(rx.iter().take(2).count(), 2);
    }
}
