use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crossterm::event::{KeyEvent, KeyEventKind};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use serde_json::{Map, Value};

use super::BridgeContext;
use super::binding::{BindingKey, Pairing, VisualId};
use super::bus::{BusMessage, Subscription, Topic};
use super::control::Control;
use super::descriptor::VisualDescriptor;
use crate::dom::{CustomElement, Element, FieldEvent, UiHost, WeakElement, WeakUiHost};
use crate::domain::{FieldCategory, ValidationRules};
use crate::engine::{EngineEvent, EngineInstance, EventKind, FieldError, InstanceId, ListenerGuard};
use crate::visuals::{FileStatus, FileVisual, ValueError, VisualBehavior};

#[derive(Default)]
struct AdapterState {
    key: Option<BindingKey>,
    subscription: Option<Subscription>,
    instance: Option<Rc<EngineInstance>>,
    listeners: Vec<ListenerGuard>,
    control: Control,
    options: Map<String, Value>,
    properties: Map<String, Value>,
    seeds: usize,
}

/// Behaviour shared by every visual: pairing with an engine instance, the
/// value surface, error reconciliation and read-only propagation.
///
/// The visual owns its reference to the engine instance; the engine only
/// reaches the visual through listeners holding weak handles.
pub struct VisualComponent {
    id: VisualId,
    this: Weak<VisualComponent>,
    element: WeakElement,
    host: WeakUiHost,
    descriptor: Rc<VisualDescriptor>,
    behavior: Rc<dyn VisualBehavior>,
    context: BridgeContext,
    state: RefCell<AdapterState>,
    // Set while this visual pushes a value, so the echoed change is not pulled back.
    syncing: Cell<bool>,
}

impl VisualComponent {
    /// Build the visual for `element` and subscribe to its binding key, before
    /// the engine gets a chance to attach.
    pub fn new(
        element: &Element,
        host: &UiHost,
        descriptor: Rc<VisualDescriptor>,
        behavior: Rc<dyn VisualBehavior>,
        context: BridgeContext,
    ) -> Rc<Self> {
        let visual = Rc::new_cyclic(|this| Self {
            id: VisualId::next(),
            this: this.clone(),
            element: element.downgrade(),
            host: host.downgrade(),
            descriptor,
            behavior,
            context,
            state: RefCell::new(AdapterState::default()),
            syncing: Cell::new(false),
        });
        visual.subscribe();
        visual
    }

    pub fn id(&self) -> VisualId {
        self.id
    }

    pub fn tag(&self) -> &str {
        &self.descriptor.tag
    }

    pub fn category(&self) -> FieldCategory {
        self.descriptor.category
    }

    pub fn element(&self) -> Option<Element> {
        self.element.upgrade()
    }

    pub fn key(&self) -> Option<BindingKey> {
        self.state.borrow().key.clone()
    }

    /// The visual running on `element`, if it is an upgraded bridged tag.
    pub fn from_element(element: &Element) -> Option<Rc<Self>> {
        let custom = element.custom()?;
        let visual = custom.as_any().downcast_ref::<Self>()?;
        visual.this.upgrade()
    }

    /// Follow the element's binding key, re-subscribing when it changes.
    fn subscribe(&self) {
        let key = self.element.upgrade().and_then(|element| BindingKey::from_element(&element));
        let (subscription, previous_key, displaced) = {
            let mut state = self.state.borrow_mut();
            if state.key == key && (key.is_none() || state.subscription.is_some()) {
                return;
            }
            let previous_key = std::mem::replace(&mut state.key, key.clone());
            let displaced = state
                .instance
                .take()
                .map(|instance| (instance, std::mem::take(&mut state.listeners)));
            (state.subscription.take(), previous_key, displaced)
        };
        drop(subscription);
        if let (Some((instance, listeners)), Some(previous_key)) = (displaced, previous_key) {
            drop(listeners);
            if self.context.bindings.release(&previous_key, self.id) {
                instance.set_ui_managed(false);
            }
            tracing::debug!(visual = %self.id, key = %previous_key, "binding key changed, unbinding");
        }
        let Some(key) = key else {
            return;
        };
        let this = self.this.clone();
        let subscription = self
            .context
            .bus
            .subscribe(Topic::bind(key.clone()), move |_, message| {
                let Some(visual) = this.upgrade() else {
                    return;
                };
                match message {
                    BusMessage::Bind(instance) => visual.bind(Rc::clone(instance)),
                }
            });
        tracing::trace!(visual = %self.id, %key, "subscribed for bind");
        self.state.borrow_mut().subscription = Some(subscription);
    }

    /// Pair with `instance`. Repeated binds of the same instance are no-ops;
    /// a newer instance under the same key replaces the current one.
    pub fn bind(&self, instance: Rc<EngineInstance>) {
        let Some(key) = self.key() else {
            tracing::warn!(visual = %self.id, "bind delivered to a visual without a key");
            return;
        };
        let current = self.state.borrow().instance.clone();
        if let Some(current) = &current {
            if current.id() == instance.id() {
                tracing::trace!(visual = %self.id, %key, "already bound");
                return;
            }
            // Instance ids grow monotonically, so an older id is a stale render.
            if instance.id() < current.id() {
                tracing::debug!(
                    visual = %self.id,
                    %key,
                    stale = %instance.id(),
                    bound = %current.id(),
                    "ignoring bind from a stale instance"
                );
                return;
            }
        }

        let stale_listeners = {
            let mut state = self.state.borrow_mut();
            state.instance = Some(Rc::clone(&instance));
            std::mem::take(&mut state.listeners)
        };
        drop(stale_listeners);
        if let Some(previous) = current {
            previous.set_ui_managed(false);
            tracing::debug!(
                visual = %self.id,
                %key,
                previous = %previous.id(),
                next = %instance.id(),
                "rebinding to a fresh instance"
            );
        }
        let pairing = Pairing {
            instance: instance.id(),
            visual: self.id,
        };
        if let Some(stale) = self.context.bindings.claim(&key, pairing)
            && stale.visual != self.id
        {
            tracing::warn!(%key, stale = %stale.visual, visual = %self.id, "key moved to another visual");
        }
        instance.set_ui_managed(true);

        let listeners = self.listen(&instance);
        {
            let mut state = self.state.borrow_mut();
            state.listeners = listeners;
            state.control.set_rules(instance.schema().validate.clone());
        }
        self.seed(&instance);
        self.refresh_read_only(&instance);
        self.request_refresh();
        tracing::debug!(visual = %self.id, %key, instance = %instance.id(), "bound");
    }

    fn listen(&self, instance: &EngineInstance) -> Vec<ListenerGuard> {
        let id = instance.id();
        [
            EventKind::BeforeSetSubmission,
            EventKind::Change,
            EventKind::Error,
            EventKind::StateChanged,
        ]
        .into_iter()
        .map(|kind| {
            let this = self.this.clone();
            instance.on(kind, move |event| {
                if let Some(visual) = this.upgrade() {
                    visual.on_engine_event(id, event);
                }
            })
        })
        .collect()
    }

    fn on_engine_event(&self, source: InstanceId, event: &EngineEvent) {
        let Some(instance) = self.instance() else {
            return;
        };
        if instance.id() != source {
            tracing::trace!(visual = %self.id, %source, "ignoring event from a stale instance");
            return;
        }
        match event {
            EngineEvent::BeforeSetSubmission => {
                self.state.borrow_mut().control.clear_errors();
            }
            EngineEvent::Change { value, .. } if !self.syncing.get() => {
                self.write_value(&instance, value.clone());
            }
            EngineEvent::Error(_) => {
                self.reconcile_errors(&instance);
            }
            _ => {}
        }
        self.refresh_read_only(&instance);
        self.request_refresh();
    }

    /// Engine data, then schema default, then the empty value.
    fn seed(&self, instance: &EngineInstance) {
        let seeded = instance
            .data_value()
            .filter(|value| !value.is_null())
            .unwrap_or_else(|| instance.default_value());
        let value = self.resolve(instance, seeded);
        let mut state = self.state.borrow_mut();
        state.control.set_value(value);
        state.seeds += 1;
    }

    pub fn seed_count(&self) -> usize {
        self.state.borrow().seeds
    }

    /// The paired instance, if this visual still holds the active pairing.
    /// A pairing taken over by another visual is dropped here.
    pub fn instance(&self) -> Option<Rc<EngineInstance>> {
        let (instance, key) = {
            let state = self.state.borrow();
            (state.instance.clone()?, state.key.clone()?)
        };
        match self.context.bindings.active(&key) {
            Some(pairing) if pairing.visual == self.id && pairing.instance == instance.id() => {
                Some(instance)
            }
            _ => {
                let discarded = {
                    let mut state = self.state.borrow_mut();
                    state.instance = None;
                    std::mem::take(&mut state.listeners)
                };
                drop(discarded);
                tracing::debug!(visual = %self.id, %key, "pairing taken over, visual is inert");
                None
            }
        }
    }

    pub fn is_bound(&self) -> bool {
        self.instance().is_some()
    }

    /// Field value, or `Null` while unbound.
    pub fn value(&self) -> Value {
        let Some(instance) = self.instance() else {
            return Value::Null;
        };
        if instance.input_refs() == 0 {
            return instance.data_value_or_empty();
        }
        self.state.borrow().control.value().clone()
    }

    /// Engine-to-visual value write; does not touch engine data.
    pub fn set_value(&self, value: Value) {
        let Some(instance) = self.instance() else {
            tracing::trace!(visual = %self.id, "unbound visual ignores value");
            return;
        };
        self.write_value(&instance, value);
        self.request_refresh();
    }

    fn write_value(&self, instance: &EngineInstance, value: Value) {
        let value = self.resolve(instance, value);
        self.state.borrow_mut().control.set_value(value);
    }

    /// Pick the row's entry out of per-row arrays, then normalize; values
    /// the visual cannot hold fall back to the empty value.
    fn resolve(&self, instance: &EngineInstance, value: Value) -> Value {
        let schema = instance.schema();
        let value = match (value, instance.row_position()) {
            (Value::Array(items), Some(index))
                if schema.multiple && !items.is_empty() && items.iter().all(Value::is_array) =>
            {
                let len = items.len();
                match items.into_iter().nth(index) {
                    Some(item) => item,
                    None => {
                        let err = ValueError::IndexOutOfRange { index, len };
                        tracing::warn!(key = instance.key(), %err, "using the empty value");
                        return instance.empty_value();
                    }
                }
            }
            (value, _) => value,
        };
        match self.behavior.normalize_value(schema, &value) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key = instance.key(), %err, "using the empty value");
                instance.empty_value()
            }
        }
    }

    /// Push the current value into the engine and have it emit `change`.
    pub fn on_change(&self, keep_raw: bool) {
        let Some(instance) = self.instance() else {
            tracing::trace!(visual = %self.id, "unbound visual ignores change");
            return;
        };
        let value = match self.value() {
            Value::Null => instance.empty_value(),
            value => value,
        };
        let value = if keep_raw {
            value
        } else {
            self.behavior.to_engine(instance.schema(), value)
        };
        self.state.borrow_mut().control.validate();
        self.syncing.set(true);
        instance.update_value(value, true);
        instance.trigger_change(true);
        self.syncing.set(false);
        self.request_refresh();
    }

    /// Apply a key press through the category's behaviour.
    pub fn handle_key(&self, key: &KeyEvent) -> bool {
        if key.kind == KeyEventKind::Release {
            return false;
        }
        let Some(instance) = self.instance() else {
            return false;
        };
        if self.is_read_only() {
            return false;
        }
        let current = self.state.borrow().control.value().clone();
        let Some(edited) = self.behavior.handle_key(instance.schema(), &current, key) else {
            return false;
        };
        self.state.borrow_mut().control.set_value(edited);
        self.on_change(false);
        true
    }

    /// Raise a field event through the element to the engine side.
    pub fn emit_field_event(&self, name: &str, data: Value) {
        match self.element.upgrade() {
            Some(element) => element.dispatch_field_event(&FieldEvent::new(name, data)),
            None => tracing::trace!(visual = %self.id, name, "element gone, dropping field event"),
        }
    }

    /// Pick the error to show. Control rules the engine no longer reports are
    /// dropped; the pick itself never becomes a control rule.
    fn reconcile_errors(&self, instance: &EngineInstance) -> Option<FieldError> {
        let errors = instance.errors();
        let mut state = self.state.borrow_mut();
        state.control.retain_errors(|rule| {
            errors
                .iter()
                .any(|error| error.context.validator == rule)
        });
        errors
            .iter()
            .find(|error| error.processor || state.control.has_error(&error.context.validator))
            .or_else(|| errors.first())
            .cloned()
    }

    pub fn is_error(&self) -> bool {
        self.instance()
            .and_then(|instance| self.reconcile_errors(&instance))
            .is_some()
    }

    pub fn error_message(&self) -> Option<String> {
        self.instance()
            .and_then(|instance| self.reconcile_errors(&instance))
            .map(|error| error.message)
    }

    fn effective_read_only(instance: &EngineInstance) -> bool {
        let schema = instance.schema();
        instance.options().read_only
            || instance.is_disabled()
            || instance.should_disable()
            || schema.disabled
            || schema.read_only
    }

    fn refresh_read_only(&self, instance: &EngineInstance) {
        let read_only = Self::effective_read_only(instance);
        self.state.borrow_mut().control.set_disabled(read_only);
    }

    /// Recomputed from the engine on every call while bound.
    pub fn is_read_only(&self) -> bool {
        match self.instance() {
            Some(instance) => {
                self.refresh_read_only(&instance);
                Self::effective_read_only(&instance)
            }
            None => self.state.borrow().control.is_disabled(),
        }
    }

    /// Position inside the nearest repeating-row ancestor; `None` outside rows.
    pub fn index(&self) -> Option<usize> {
        self.instance()?.row_position()
    }

    pub fn control(&self) -> Control {
        self.state.borrow().control.clone()
    }

    /// Custom options forwarded by the factory.
    pub fn options(&self) -> Map<String, Value> {
        self.state.borrow().options.clone()
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        self.state.borrow().properties.get(name).cloned()
    }

    pub fn file_statuses(&self) -> Vec<FileStatus> {
        if self.descriptor.category != FieldCategory::File {
            return Vec::new();
        }
        FileVisual::statuses(&self.value())
    }

    pub fn paint(&self) -> Line<'static> {
        let Some(instance) = self.instance() else {
            return Line::from(Span::styled(
                format!("<{}> (unbound)", self.descriptor.tag),
                Style::default().fg(Color::DarkGray),
            ));
        };
        let schema = instance.schema();
        let label = schema.label.clone().unwrap_or_else(|| schema.key.clone());
        let text = self.behavior.display_value(schema, &self.value());
        let value_style = if self.is_read_only() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };
        let mut spans = vec![
            Span::styled(format!("{label}: "), Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(text, value_style),
        ];
        if let Some(message) = self.error_message() {
            spans.push(Span::styled(
                format!("  ! {message}"),
                Style::default().fg(Color::Red),
            ));
        }
        Line::from(spans)
    }

    /// Release the bus subscription, engine listeners and the pairing.
    pub fn teardown(&self) {
        let (subscription, instance, listeners, key) = {
            let mut state = self.state.borrow_mut();
            (
                state.subscription.take(),
                state.instance.take(),
                std::mem::take(&mut state.listeners),
                state.key.clone(),
            )
        };
        drop(subscription);
        drop(listeners);
        if let (Some(instance), Some(key)) = (instance, key)
            && self.context.bindings.release(&key, self.id)
        {
            instance.set_ui_managed(false);
        }
        tracing::trace!(visual = %self.id, "torn down");
    }

    fn request_refresh(&self) {
        if let Some(host) = self.host.upgrade() {
            host.request_refresh();
        }
    }
}

impl CustomElement for VisualComponent {
    fn value(&self) -> Option<Value> {
        self.instance().map(|_| VisualComponent::value(self))
    }

    fn set_value(&self, value: Value) {
        VisualComponent::set_value(self, value);
    }

    fn attribute_changed(&self, name: &str, _value: Option<&str>) {
        if name == "id" || name == super::binding::FIELD_ATTR {
            self.subscribe();
        }
    }

    fn property_changed(&self, name: &str, value: &Value) {
        match name {
            "customOptions" => {
                self.state.borrow_mut().options = value.as_object().cloned().unwrap_or_default();
            }
            "validate" => match serde_json::from_value::<ValidationRules>(value.clone()) {
                Ok(rules) => self.state.borrow_mut().control.set_rules(rules),
                Err(err) => tracing::warn!(visual = %self.id, %err, "ignoring malformed rules"),
            },
            other => {
                self.state
                    .borrow_mut()
                    .properties
                    .insert(other.to_string(), value.clone());
            }
        }
    }

    fn disconnected(&self) {
        self.teardown();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
