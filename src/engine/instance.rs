use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use regex::Regex;
use serde_json::Value;

use super::component::ComponentClass;
use super::events::{EngineEvent, Emitter, EventKind, ListenerGuard};
use super::options::EngineOptions;
use super::path::DataPath;
use super::validation::{ErrorContext, FieldError, FieldRules};
use crate::dom::{Element, WeakElement};
use crate::domain::{FieldCategory, FieldSchema, FormDisplay};

/// Unique across every instance ever created in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        InstanceId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) type SharedData = Rc<RefCell<Value>>;

pub(crate) struct InstanceInit {
    pub node_id: String,
    pub schema: Rc<FieldSchema>,
    pub class: Rc<dyn ComponentClass>,
    pub path: DataPath,
    pub row_index: Option<usize>,
    pub parent: Option<Weak<EngineInstance>>,
    pub data: SharedData,
    pub options: Rc<EngineOptions>,
    pub display: FormDisplay,
    pub rules: Option<FieldRules>,
}

#[derive(Default)]
struct InstanceState {
    errors: Vec<FieldError>,
    custom_validity: Option<String>,
    disabled: bool,
    should_disable: bool,
    visible: bool,
    ui_managed: bool,
    pristine: bool,
    input_refs: usize,
    attach_passes: usize,
    row_count: usize,
    mask: Option<Regex>,
    element: WeakElement,
}

/// The engine's live object for one schema node.
pub struct EngineInstance {
    id: InstanceId,
    node_id: String,
    schema: Rc<FieldSchema>,
    category: FieldCategory,
    class: Rc<dyn ComponentClass>,
    path: DataPath,
    row_index: Option<usize>,
    parent: Option<Weak<EngineInstance>>,
    data: SharedData,
    options: Rc<EngineOptions>,
    display: FormDisplay,
    rules: Option<FieldRules>,
    events: Emitter,
    state: RefCell<InstanceState>,
    // Held here so engine-side wiring lives exactly as long as the instance.
    wiring: RefCell<Vec<(&'static str, ListenerGuard)>>,
    redraws: Cell<usize>,
}

impl EngineInstance {
    pub(crate) fn new(init: InstanceInit) -> Rc<Self> {
        let category = init.class.category();
        Rc::new(Self {
            id: InstanceId::next(),
            node_id: init.node_id,
            category,
            schema: init.schema,
            class: init.class,
            path: init.path,
            row_index: init.row_index,
            parent: init.parent,
            data: init.data,
            options: init.options,
            display: init.display,
            rules: init.rules,
            events: Emitter::new(),
            state: RefCell::new(InstanceState {
                visible: true,
                pristine: true,
                ..Default::default()
            }),
            wiring: RefCell::new(Vec::new()),
            redraws: Cell::new(0),
        })
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Schema node id, qualified by row position for grid children.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn key(&self) -> &str {
        &self.schema.key
    }

    pub fn category(&self) -> FieldCategory {
        self.category
    }

    pub fn class(&self) -> Rc<dyn ComponentClass> {
        Rc::clone(&self.class)
    }

    pub fn path(&self) -> &DataPath {
        &self.path
    }

    pub fn display(&self) -> FormDisplay {
        self.display
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn parent(&self) -> Option<Rc<EngineInstance>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Row index of this instance within its own grid, if it is a direct row child.
    pub fn row_index(&self) -> Option<usize> {
        self.row_index
    }

    /// Position inside the nearest repeating-row ancestor, walking up the tree.
    pub fn row_position(&self) -> Option<usize> {
        let mut row = self.row_index;
        let mut parent = self.parent();
        while let Some(node) = parent {
            if node.category().is_row_container() {
                return row;
            }
            row = node.row_index;
            parent = node.parent();
        }
        None
    }

    pub fn on(&self, kind: EventKind, handler: impl Fn(&EngineEvent) + 'static) -> ListenerGuard {
        self.events.on(kind, handler)
    }

    pub fn emit(&self, event: &EngineEvent) {
        self.events.emit(event);
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.events.listener_count(kind)
    }

    /// Keep engine-side subscriptions alive for the instance's lifetime,
    /// replacing whatever was previously held under `slot`.
    pub fn replace_wiring(&self, slot: &'static str, guards: Vec<ListenerGuard>) {
        let stale = {
            let mut wiring = self.wiring.borrow_mut();
            let (stale, kept): (Vec<_>, Vec<_>) =
                wiring.drain(..).partition(|(name, _)| *name == slot);
            *wiring = kept;
            stale
        };
        drop(stale);
        self.wiring
            .borrow_mut()
            .extend(guards.into_iter().map(|guard| (slot, guard)));
    }

    /// Raw value at this instance's data path; `None` when absent.
    pub fn data_value(&self) -> Option<Value> {
        if !self.category.is_input() {
            return None;
        }
        self.path.get(&self.data.borrow()).cloned()
    }

    pub fn data_value_or_empty(&self) -> Value {
        match self.data_value() {
            Some(Value::Null) | None => self.empty_value(),
            Some(value) => value,
        }
    }

    pub fn empty_value(&self) -> Value {
        if self.schema.multiple && self.category.is_input() {
            return Value::Array(Vec::new());
        }
        self.class.empty_value(self)
    }

    /// Schema default with multi-value wrapping applied, or the empty value.
    pub fn default_value(&self) -> Value {
        match &self.schema.default_value {
            Some(Value::Null) | None => self.empty_value(),
            Some(value) => wrap_multiple(&self.schema, value.clone()),
        }
    }

    pub fn set_value(&self, value: Value) -> bool {
        if !self.category.is_input() {
            return false;
        }
        let mut data = self.data.borrow_mut();
        if self.path.get(&data) == Some(&value) {
            return false;
        }
        self.path.set(&mut data, value);
        true
    }

    pub fn update_value(&self, value: Value, modified: bool) -> bool {
        let changed = self.set_value(value);
        if changed && modified {
            self.state.borrow_mut().pristine = false;
        }
        changed
    }

    pub fn trigger_change(&self, modified: bool) {
        let value = self.data_value_or_empty();
        self.emit(&EngineEvent::Change { value, modified });
    }

    pub fn is_pristine(&self) -> bool {
        self.state.borrow().pristine
    }

    /// Validation errors plus any custom validity message.
    pub fn errors(&self) -> Vec<FieldError> {
        let state = self.state.borrow();
        let mut errors = state.errors.clone();
        if let Some(message) = &state.custom_validity {
            errors.push(FieldError {
                message: message.clone(),
                context: ErrorContext {
                    key: self.schema.key.clone(),
                    path: self.path.to_string(),
                    validator: "custom".to_string(),
                    index: None,
                },
                processor: true,
            });
        }
        errors
    }

    pub fn set_errors(&self, errors: Vec<FieldError>) {
        self.state.borrow_mut().errors = errors;
        let all = self.errors();
        self.emit(&EngineEvent::Error(all));
    }

    pub fn set_custom_validity(&self, message: Option<String>) {
        self.state.borrow_mut().custom_validity = message;
        let all = self.errors();
        self.emit(&EngineEvent::Error(all));
    }

    /// Run this field's own rules against its current data.
    pub fn validate(&self) -> Vec<FieldError> {
        let errors = match &self.rules {
            Some(rules) => rules.check(
                &self.schema,
                self.category,
                &self.path.to_string(),
                &self.data_value_or_empty(),
            ),
            None => Vec::new(),
        };
        self.set_errors(errors.clone());
        errors
    }

    pub fn is_disabled(&self) -> bool {
        self.state.borrow().disabled
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.replace_flag(|state| &mut state.disabled, disabled);
    }

    /// Conditional-logic driven disable flag, inherited from ancestors.
    pub fn should_disable(&self) -> bool {
        self.state.borrow().should_disable
            || self.parent().is_some_and(|parent| parent.should_disable())
    }

    pub fn set_should_disable(&self, should_disable: bool) {
        self.replace_flag(|state| &mut state.should_disable, should_disable);
    }

    pub fn is_visible(&self) -> bool {
        self.state.borrow().visible
    }

    pub fn set_visible(&self, visible: bool) {
        self.replace_flag(|state| &mut state.visible, visible);
    }

    fn replace_flag(&self, field: impl FnOnce(&mut InstanceState) -> &mut bool, value: bool) {
        let changed = {
            let mut state = self.state.borrow_mut();
            let slot = field(&mut state);
            std::mem::replace(slot, value) != value
        };
        if changed {
            self.emit(&EngineEvent::StateChanged);
        }
    }

    pub fn is_ui_managed(&self) -> bool {
        self.state.borrow().ui_managed
    }

    pub fn set_ui_managed(&self, managed: bool) {
        self.state.borrow_mut().ui_managed = managed;
    }

    /// Number of native input refs found by the last attach pass.
    pub fn input_refs(&self) -> usize {
        self.state.borrow().input_refs
    }

    pub(crate) fn set_input_refs(&self, refs: usize) {
        self.state.borrow_mut().input_refs = refs;
    }

    pub fn attach_passes(&self) -> usize {
        self.state.borrow().attach_passes
    }

    pub(crate) fn record_attach_pass(&self) {
        self.state.borrow_mut().attach_passes += 1;
    }

    pub fn mask(&self) -> Option<Regex> {
        self.state.borrow().mask.clone()
    }

    pub(crate) fn set_mask(&self, mask: Option<Regex>) {
        self.state.borrow_mut().mask = mask;
    }

    pub fn element(&self) -> Option<Element> {
        self.state.borrow().element.upgrade()
    }

    pub(crate) fn set_element(&self, element: &Element) {
        self.state.borrow_mut().element = element.downgrade();
    }

    pub fn row_count(&self) -> usize {
        self.state.borrow().row_count
    }

    pub(crate) fn set_row_count(&self, rows: usize) {
        self.state.borrow_mut().row_count = rows;
    }

    pub fn redraws(&self) -> usize {
        self.redraws.get()
    }

    /// Re-run the class attach against the instance's current element.
    pub fn redraw(self: &Rc<Self>, host: &crate::dom::UiHost) -> bool {
        let Some(element) = self.element() else {
            return false;
        };
        self.redraws.set(self.redraws.get() + 1);
        self.class.attach(self, &element, host);
        true
    }

    /// Put engine data back onto the element's visual.
    pub fn restore_value(&self, element: &Element) {
        element.set_value(self.data_value_or_empty());
    }
}

pub(crate) fn wrap_multiple(schema: &FieldSchema, value: Value) -> Value {
    if schema.multiple && !value.is_array() {
        Value::Array(vec![value])
    } else {
        value
    }
}

impl fmt::Debug for EngineInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineInstance")
            .field("id", &self.id)
            .field("node_id", &self.node_id)
            .field("type", &self.schema.type_name)
            .field("path", &self.path.to_string())
            .finish()
    }
}
