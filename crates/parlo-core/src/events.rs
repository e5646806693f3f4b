use std::sync::Arc;

use crate::session::SessionState;
use crate::signal::IncomingCallOffer;

/// Events emitted by the core to native UI listeners.
#[derive(Debug, Clone)]
pub enum ParloEvent {
    SessionChanged(SessionState),
    IncomingCall(IncomingCallOffer),
    IncomingCallEnded { reason: CallEndReason },
    CallFailed { message: String },
}

/// Why a pending incoming-call offer went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEndReason {
    Accepted,
    Declined,
    Replaced,
}

/// Trait for receiving events from the core.
/// Implementations must be Send + Sync (called from tokio tasks).
pub trait ParloEventListener: Send + Sync {
    fn on_event(&self, event: ParloEvent);
}

/// Internal event emitter that dispatches to registered listeners.
#[derive(Clone)]
pub struct EventEmitter {
    listeners: Arc<std::sync::RwLock<Vec<Arc<dyn ParloEventListener>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(std::sync::RwLock::new(Vec::new())),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn ParloEventListener>) {
        self.listeners.write().unwrap().push(listener);
    }

    pub fn emit(&self, event: ParloEvent) {
        let listeners = self.listeners.read().unwrap();
        for listener in listeners.iter() {
            listener.on_event(event.clone());
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        count: Arc<AtomicUsize>,
    }

    impl ParloEventListener for CountingListener {
        fn on_event(&self, _event: ParloEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn emitter_dispatches_to_listener() {
        let emitter = EventEmitter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let listener = Arc::new(CountingListener { count: count.clone() });

        emitter.add_listener(listener);
        emitter.emit(ParloEvent::SessionChanged(SessionState::default()));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn emitter_dispatches_to_multiple_listeners() {
        let emitter = EventEmitter::new();
        let count1 = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::new(AtomicUsize::new(0));

        emitter.add_listener(Arc::new(CountingListener { count: count1.clone() }));
        emitter.add_listener(Arc::new(CountingListener { count: count2.clone() }));

        emitter.emit(ParloEvent::CallFailed { message: "no pending call".into() });

        assert_eq!(count1.load(Ordering::SeqCst), 1);
        assert_eq!(count2.load(Ordering::SeqCst), 1);
    }

    struct EventCapture {
        events: Arc<std::sync::Mutex<Vec<ParloEvent>>>,
    }

    impl ParloEventListener for EventCapture {
        fn on_event(&self, event: ParloEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn emitter_delivers_correct_events() {
        let emitter = EventEmitter::new();
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let listener = Arc::new(EventCapture { events: events.clone() });

        emitter.add_listener(listener);
        emitter.emit(ParloEvent::IncomingCallEnded { reason: CallEndReason::Declined });

        let captured = events.lock().unwrap();
        assert_eq!(captured.len(), 1);
        match &captured[0] {
            ParloEvent::IncomingCallEnded { reason } => {
                assert_eq!(*reason, CallEndReason::Declined);
            }
            _ => panic!("expected IncomingCallEnded"),
        }
    }
}
