use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use serde_json::Value;

use super::validation::FieldError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Change,
    Error,
    BeforeSetSubmission,
    StateChanged,
    Submit,
    SubmitDone,
    SubmitError,
    Cancel,
    Custom,
}

/// Events an engine instance emits to its subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Change { value: Value, modified: bool },
    Error(Vec<FieldError>),
    BeforeSetSubmission,
    /// Disabled, should-disable or visibility flags changed.
    StateChanged,
    Submit,
    SubmitDone,
    SubmitError,
    Cancel,
    Custom { name: String, data: Value },
}

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::Change { .. } => EventKind::Change,
            EngineEvent::Error(_) => EventKind::Error,
            EngineEvent::BeforeSetSubmission => EventKind::BeforeSetSubmission,
            EngineEvent::StateChanged => EventKind::StateChanged,
            EngineEvent::Submit => EventKind::Submit,
            EngineEvent::SubmitDone => EventKind::SubmitDone,
            EngineEvent::SubmitError => EventKind::SubmitError,
            EngineEvent::Cancel => EventKind::Cancel,
            EngineEvent::Custom { .. } => EventKind::Custom,
        }
    }
}

type Handler = Rc<dyn Fn(&EngineEvent)>;

#[derive(Default)]
struct EmitterInner {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(u64, EventKind, Handler)>>,
}

/// Synchronous per-instance event emitter.
#[derive(Default)]
pub struct Emitter {
    inner: Rc<EmitterInner>,
}

/// Removes its listener when dropped.
#[must_use = "dropping the guard unsubscribes the listener"]
pub struct ListenerGuard {
    emitter: Weak<EmitterInner>,
    id: u64,
}

impl ListenerGuard {
    /// Keep the listener for the emitter's whole lifetime.
    #[cfg(test)]
    pub(crate) fn detach(self) {
        std::mem::forget(self);
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.emitter.upgrade() {
            inner
                .listeners
                .borrow_mut()
                .retain(|(id, _, _)| *id != self.id);
        }
    }
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, kind: EventKind, handler: impl Fn(&EngineEvent) + 'static) -> ListenerGuard {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, kind, Rc::new(handler)));
        ListenerGuard {
            emitter: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Deliver to a snapshot of the current listeners, so handlers may
    /// subscribe or unsubscribe while the event is in flight.
    pub fn emit(&self, event: &EngineEvent) {
        let kind = event.kind();
        let handlers: Vec<Handler> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .filter(|(_, listener_kind, _)| *listener_kind == kind)
            .map(|(_, _, handler)| Rc::clone(handler))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner
            .listeners
            .borrow()
            .iter()
            .filter(|(_, listener_kind, _)| *listener_kind == kind)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_guard_unsubscribes() {
        let emitter = Emitter::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let guard = emitter.on(EventKind::Submit, move |_| counter.set(counter.get() + 1));
        emitter.emit(&EngineEvent::Submit);
        drop(guard);
        emitter.emit(&EngineEvent::Submit);
        assert_eq!(hits.get(), 1);
        assert_eq!(emitter.listener_count(EventKind::Submit), 0);
    }

    #[test]
    fn listeners_only_see_their_kind() {
        let emitter = Emitter::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        emitter
            .on(EventKind::Change, move |event| sink.borrow_mut().push(event.clone()))
            .detach();
        emitter.emit(&EngineEvent::Cancel);
        emitter.emit(&EngineEvent::Change {
            value: Value::Bool(true),
            modified: true,
        });
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn handlers_may_subscribe_during_emit() {
        let emitter = Rc::new(Emitter::new());
        let inner_emitter = Rc::clone(&emitter);
        let extra = Rc::new(RefCell::new(Vec::new()));
        let guards = Rc::clone(&extra);
        emitter
            .on(EventKind::Submit, move |_| {
                guards
                    .borrow_mut()
                    .push(inner_emitter.on(EventKind::Submit, |_| {}));
            })
            .detach();
        emitter.emit(&EngineEvent::Submit);
        assert_eq!(emitter.listener_count(EventKind::Submit), 2);
    }
}
