use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::binding::BindingKey;
use crate::engine::EngineInstance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    /// An engine instance announcing itself to the visual behind its tag.
    Bind,
}

/// One channel of the bus, scoped to a single binding key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    kind: TopicKind,
    key: BindingKey,
}

impl Topic {
    pub fn bind(key: BindingKey) -> Self {
        Self {
            kind: TopicKind::Bind,
            key,
        }
    }

    pub fn kind(&self) -> TopicKind {
        self.kind
    }

    pub fn key(&self) -> &BindingKey {
        &self.key
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TopicKind::Bind => write!(f, "bind:{}", self.key),
        }
    }
}

#[derive(Clone)]
pub enum BusMessage {
    Bind(Rc<EngineInstance>),
}

impl fmt::Debug for BusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusMessage::Bind(instance) => f.debug_tuple("Bind").field(&instance.id()).finish(),
        }
    }
}

type BusHandler = Rc<dyn Fn(&BindingKey, &BusMessage)>;

#[derive(Default)]
struct BusInner {
    next_id: Cell<u64>,
    topics: RefCell<HashMap<Topic, Vec<(u64, BusHandler)>>>,
}

/// Synchronous publish/subscribe channel pairing engine instances with visuals.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

/// Unsubscribes when dropped.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    bus: Weak<BusInner>,
    topic: Topic,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.bus.upgrade() else {
            return;
        };
        let mut topics = inner.topics.borrow_mut();
        if let Some(handlers) = topics.get_mut(&self.topic) {
            handlers.retain(|(id, _)| *id != self.id);
            if handlers.is_empty() {
                topics.remove(&self.topic);
            }
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        topic: Topic,
        handler: impl Fn(&BindingKey, &BusMessage) + 'static,
    ) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .topics
            .borrow_mut()
            .entry(topic.clone())
            .or_default()
            .push((id, Rc::new(handler)));
        Subscription {
            bus: Rc::downgrade(&self.inner),
            topic,
            id,
        }
    }

    /// Deliver `message` to the topic's current subscribers; returns how many
    /// received it. Nothing is queued for later subscribers.
    pub fn emit(&self, topic: &Topic, message: BusMessage) -> usize {
        let handlers: Vec<BusHandler> = self
            .inner
            .topics
            .borrow()
            .get(topic)
            .map(|handlers| handlers.iter().map(|(_, handler)| Rc::clone(handler)).collect())
            .unwrap_or_default();
        if handlers.is_empty() {
            tracing::trace!(%topic, ?message, "no subscriber, dropping message");
            return 0;
        }
        for handler in &handlers {
            handler(&topic.key, &message);
        }
        handlers.len()
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.inner
            .topics
            .borrow()
            .get(topic)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn topic_count(&self) -> usize {
        self.inner.topics.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_form_definition;
    use crate::engine::{ComponentCatalog, EngineOptions, Form};
    use serde_json::json;

    fn instance() -> Rc<EngineInstance> {
        let definition = parse_form_definition(&json!({
            "components": [{"type": "textfield", "key": "a"}]
        }))
        .expect("definition");
        let form = Form::create(definition, &ComponentCatalog::with_natives(), EngineOptions::default())
            .expect("form");
        form.instances().remove(0)
    }

    #[test]
    fn delivers_only_to_the_matching_key() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let _sub = bus.subscribe(Topic::bind(BindingKey::new("c0")), move |key, _| {
            assert_eq!(key.id(), "c0");
            counter.set(counter.get() + 1);
        });
        let instance = instance();
        assert_eq!(bus.emit(&Topic::bind(BindingKey::new("c1")), BusMessage::Bind(Rc::clone(&instance))), 0);
        assert_eq!(bus.emit(&Topic::bind(BindingKey::new("c0")), BusMessage::Bind(instance)), 1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn dropping_the_subscription_unsubscribes() {
        let bus = EventBus::new();
        let topic = Topic::bind(BindingKey::new("c0"));
        let sub = bus.subscribe(topic.clone(), |_, _| {});
        assert_eq!(bus.subscriber_count(&topic), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(&topic), 0);
        assert_eq!(bus.topic_count(), 0);
    }

    #[test]
    fn handlers_may_unsubscribe_during_delivery() {
        let bus = EventBus::new();
        let topic = Topic::bind(BindingKey::new("c0"));
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let inner = Rc::clone(&slot);
        *slot.borrow_mut() = Some(bus.subscribe(topic.clone(), move |_, _| {
            inner.borrow_mut().take();
        }));
        assert_eq!(bus.emit(&topic, BusMessage::Bind(instance())), 1);
        assert_eq!(bus.subscriber_count(&topic), 0);
    }
}
