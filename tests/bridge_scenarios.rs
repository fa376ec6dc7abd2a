use std::cell::RefCell;
use std::rc::Rc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::{Value, json};

use formbridge::bridge::{
    BindingKey, BridgeContext, BusMessage, RegistrationService, SUBMIT_STATE_ATTR, Topic,
    VisualComponent,
};
use formbridge::dom::{Element, MountMode, UiHost};
use formbridge::domain::parse_form_definition;
use formbridge::engine::{
    ComponentCatalog, EngineEvent, EngineOptions, ErrorContext, EventKind, FieldError, Form,
};
use formbridge::{FormSession, SessionOptions};

fn session(definition: Value) -> FormSession {
    FormSession::new(&definition, SessionOptions::default()).expect("session")
}

fn signup() -> Value {
    json!({
        "title": "Signup",
        "components": [
            {"type": "textfield", "key": "name", "label": "Name", "validate": {"minLength": 5}},
            {"type": "checkbox", "key": "terms", "label": "Terms"},
            {"type": "number", "key": "age", "label": "Age"},
            {"type": "textfield", "key": "locked", "label": "Locked", "readOnly": true}
        ]
    })
}

fn people() -> Value {
    json!({
        "components": [
            {"type": "datagrid", "key": "people", "components": [
                {"type": "textfield", "key": "name", "label": "Name"},
                {"type": "textfield", "key": "aliases", "multiple": true}
            ]},
            {"type": "textfield", "key": "note", "label": "Note"}
        ]
    })
}

fn field_error(validator: &str, message: &str) -> FieldError {
    FieldError {
        message: message.to_string(),
        context: ErrorContext {
            key: "name".to_string(),
            path: "name".to_string(),
            validator: validator.to_string(),
            index: None,
        },
        processor: false,
    }
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

/// Host, bridge and form wired up by hand, for scenarios that re-attach.
fn mounted(definition: Value) -> (UiHost, BridgeContext, Form, Element) {
    let host = UiHost::new();
    let context = BridgeContext::new();
    let service = RegistrationService::new(context.clone());
    let mut catalog = ComponentCatalog::with_natives();
    service.install(&mut catalog, &host).expect("install");
    let definition = parse_form_definition(&definition).expect("definition");
    let mut form = Form::create(definition, &catalog, EngineOptions::default()).expect("form");
    let element = host.mount(&form.render(), MountMode::Compiled);
    form.attach(&element, &host);
    (host, context, form, element)
}

#[test]
fn checkbox_toggle_reaches_engine_data() {
    let mut session = session(signup());
    let visual = session.visual("terms").expect("visual");
    assert_eq!(visual.control().value(), &json!(false));

    let instance = session.form().instance("terms").expect("instance");
    let changes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&changes);
    let _guard = instance.on(EventKind::Change, move |event| {
        if let EngineEvent::Change { value, modified } = event {
            sink.borrow_mut().push((value.clone(), *modified));
        }
    });

    assert!(session.send_key("terms", key(KeyCode::Char(' '))).expect("key"));
    assert_eq!(session.submission()["terms"], json!(true));
    assert_eq!(visual.value(), json!(true));
    assert_eq!(*changes.borrow(), vec![(json!(true), true)]);
}

#[test]
fn visual_change_event_updates_engine() {
    let session = session(signup());
    let visual = session.visual("terms").expect("visual");
    visual.emit_field_event("checkedChange", json!(true));
    assert_eq!(session.submission()["terms"], json!(true));
    assert_eq!(visual.value(), json!(true));
}

#[test]
fn other_field_events_are_re_emitted_by_the_engine() {
    let session = session(signup());
    let instance = session.form().instance("name").expect("instance");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let _guard = instance.on(EventKind::Custom, move |event| {
        if let EngineEvent::Custom { name, .. } = event {
            sink.borrow_mut().push(name.clone());
        }
    });
    session
        .visual("name")
        .expect("visual")
        .emit_field_event("focus", Value::Null);
    assert_eq!(*seen.borrow(), vec!["focus".to_string()]);
}

#[test]
fn raw_injection_recreates_static_tags() {
    let session = FormSession::new(
        &signup(),
        SessionOptions::default().with_mount_mode(MountMode::RawInjection),
    )
    .expect("session");
    let instance = session.form().instance("name").expect("instance");
    assert_eq!(instance.attach_passes(), 2);
    let visual = session.visual("name").expect("visual after fallback");
    assert!(visual.is_bound());
    assert!(visual.element().expect("tag").framework_version().is_some());
}

#[test]
fn compiled_mount_attaches_once() {
    let session = session(signup());
    let instance = session.form().instance("name").expect("instance");
    assert_eq!(instance.attach_passes(), 1);
    assert!(instance.is_ui_managed());
}

#[test]
fn stale_binds_are_ignored() {
    let (host, context, mut form, element) = mounted(signup());
    let first = form.instance("name").expect("first render");
    let tag = element.find_by_tag("fb-textfield").expect("tag");
    let visual = VisualComponent::from_element(&tag).expect("visual");
    assert_eq!(visual.instance().expect("bound").id(), first.id());

    form.rebuild().expect("rebuild");
    form.attach(&element, &host);
    let second = form.instance("name").expect("second render");
    assert!(second.id() > first.id());
    assert_eq!(visual.instance().expect("rebound").id(), second.id());
    assert!(!first.is_ui_managed());

    let key = BindingKey::for_instance(&first);
    context
        .bus
        .emit(&Topic::bind(key.clone()), BusMessage::Bind(Rc::clone(&first)));
    assert_eq!(visual.instance().expect("still bound").id(), second.id());
    let pairing = context.bindings.active(&key).expect("pairing");
    assert_eq!(pairing.instance, second.id());
    assert_eq!(pairing.visual, visual.id());
}

#[test]
fn repeated_attach_binds_once() {
    let session = session(signup());
    let visual = session.visual("name").expect("visual");
    assert_eq!(visual.seed_count(), 1);
    let instance = session.form().instance("name").expect("instance");
    assert!(instance.redraw(session.host()));
    assert_eq!(instance.redraws(), 1);
    assert_eq!(visual.seed_count(), 1);
}

#[test]
fn read_only_combines_every_source() {
    let mut session = session(signup());
    let visual = session.visual("name").expect("visual");
    let instance = session.form().instance("name").expect("instance");
    assert!(!visual.is_read_only());

    instance.set_disabled(true);
    assert!(visual.is_read_only());
    assert!(visual.control().is_disabled());
    assert!(!session.send_key("name", key(KeyCode::Char('x'))).expect("key"));
    instance.set_disabled(false);
    assert!(!visual.is_read_only());
    assert!(!visual.control().is_disabled());
}

#[test]
fn read_only_is_the_or_of_all_five_flags() {
    let definition = json!({
        "components": [
            {"type": "textfield", "key": "plain"},
            {"type": "textfield", "key": "off", "disabled": true},
            {"type": "textfield", "key": "fixed", "readOnly": true},
            {"type": "textfield", "key": "both", "disabled": true, "readOnly": true}
        ]
    });
    let fields = [
        ("plain", false, false),
        ("off", true, false),
        ("fixed", false, true),
        ("both", true, true),
    ];
    for global in [false, true] {
        let session = FormSession::new(
            &definition,
            SessionOptions::default().with_read_only(global),
        )
        .expect("session");
        for (key, schema_disabled, schema_read_only) in fields {
            let visual = session.visual(key).expect("visual");
            let instance = session.form().instance(key).expect("instance");
            for disabled in [false, true] {
                for should_disable in [false, true] {
                    instance.set_disabled(disabled);
                    instance.set_should_disable(should_disable);
                    let expected = global
                        || disabled
                        || should_disable
                        || schema_disabled
                        || schema_read_only;
                    assert_eq!(
                        visual.is_read_only(),
                        expected,
                        "global={global} key={key} disabled={disabled} should_disable={should_disable}"
                    );
                    assert_eq!(visual.control().is_disabled(), expected);
                }
            }
        }
    }
}

#[test]
fn error_precedence_prefers_processors_and_active_rules() {
    let mut session = session(signup());
    session.type_text("name", "ab").expect("typed");
    let visual = session.visual("name").expect("visual");
    let instance = session.form().instance("name").expect("instance");
    assert!(visual.control().has_error("minLength"));

    instance.set_errors(vec![
        field_error("pattern", "bad pattern"),
        field_error("minLength", "too short"),
    ]);
    assert!(visual.is_error());
    assert_eq!(visual.error_message().as_deref(), Some("too short"));

    instance.set_errors(vec![field_error("pattern", "bad pattern")]);
    assert!(!visual.control().has_error("minLength"));
    instance.set_custom_validity(Some("name is taken".to_string()));
    assert_eq!(visual.error_message().as_deref(), Some("name is taken"));
    assert!(!visual.control().has_error("pattern"));

    instance.set_custom_validity(None);
    instance.set_errors(vec![
        field_error("maxLength", "too long"),
        field_error("pattern", "bad pattern"),
    ]);
    assert_eq!(visual.error_message().as_deref(), Some("too long"));

    instance.set_errors(Vec::new());
    assert!(!visual.is_error());
    assert!(visual.control().errors().is_empty());
}

#[test]
fn fallback_errors_never_become_active_rules() {
    let session = session(signup());
    let visual = session.visual("name").expect("visual");
    let instance = session.form().instance("name").expect("instance");

    instance.set_errors(vec![field_error("pattern", "bad pattern")]);
    assert_eq!(visual.error_message().as_deref(), Some("bad pattern"));
    assert!(visual.control().errors().is_empty());

    instance.set_custom_validity(Some("name is taken".to_string()));
    assert_eq!(visual.error_message().as_deref(), Some("name is taken"));
    assert!(visual.control().errors().is_empty());
}

#[test]
fn row_index_follows_the_grid() {
    let mut session = session(people());
    session
        .set_submission(json!({"people": [{"name": "a"}, {"name": "b"}], "note": "hi"}))
        .expect("submission");
    let second = session.visual("people[1].name").expect("row visual");
    assert_eq!(second.index(), Some(1));
    assert_eq!(second.value(), json!("b"));
    assert_eq!(session.visual("note").expect("note").index(), None);

    assert_eq!(session.add_row("people").expect("row"), 3);
    assert_eq!(
        session.visual("people[2].name").expect("new row").index(),
        Some(2)
    );
}

#[test]
fn per_row_arrays_pick_the_row_entry() {
    let mut session = session(people());
    session
        .set_submission(json!({"people": [{}, {}]}))
        .expect("submission");
    let visual = session.visual("people[1].aliases").expect("visual");
    visual.set_value(json!([["a"], ["b", "c"]]));
    assert_eq!(visual.control().value(), &json!(["b", "c"]));

    visual.set_value(json!([["only"]]));
    assert_eq!(visual.control().value(), &json!([]));
}

#[test]
fn normalized_values_round_trip() {
    let session = session(signup());
    let visual = session.visual("age").expect("visual");
    visual.set_value(json!("7.50"));
    let once = visual.value();
    assert_eq!(once, json!(7.5));
    visual.set_value(once.clone());
    assert_eq!(visual.value(), once);
}

#[test]
fn unmount_releases_visuals() {
    let mut session = session(people());
    let old = session.visual("note").expect("visual");
    session.redraw().expect("redraw");
    assert!(!old.is_bound());
    let fresh = session.visual("note").expect("fresh visual");
    assert_ne!(old.id(), fresh.id());
    let key = fresh.key().expect("key");
    assert_eq!(session.context().bus.subscriber_count(&Topic::bind(key)), 1);
}

#[test]
fn button_mirrors_submit_outcome() {
    let mut session = session(json!({
        "components": [
            {"type": "textfield", "key": "name", "validate": {"required": true}},
            {"type": "button", "key": "submit", "label": "Send"}
        ]
    }));
    let button = session.visual("submit").expect("button");
    let tag = button.element().expect("tag");

    assert!(session.submit().is_err());
    assert_eq!(tag.attribute(SUBMIT_STATE_ATTR).as_deref(), Some("error"));

    session.set_value("name", json!("Ada")).expect("name");
    assert!(session.submit().is_ok());
    assert_eq!(tag.attribute(SUBMIT_STATE_ATTR).as_deref(), Some("done"));
}

#[test]
fn wizard_wraps_its_pages_in_a_container_tag() {
    let mut session = session(json!({
        "display": "wizard",
        "components": [
            {"type": "wizard", "key": "steps", "components": [
                {"type": "textfield", "key": "city", "label": "City"}
            ]}
        ]
    }));
    assert!(session.html().contains("<fb-wizard"));
    assert!(session.visual("steps").is_some());
    session.set_value("city", json!("Oslo")).expect("city");
    assert_eq!(session.submission()["city"], json!("Oslo"));
}

#[test]
fn pdf_display_keys_by_field() {
    let session = session(json!({
        "display": "pdf",
        "components": [{"type": "textfield", "key": "name"}]
    }));
    let visual = session.visual("name").expect("visual");
    let key = visual.key().expect("key");
    assert_eq!(key.field(), Some("name"));
    assert_eq!(
        visual.element().expect("tag").attribute("field").as_deref(),
        Some("name")
    );
}

#[test]
fn dates_are_stored_canonically() {
    let mut session = session(json!({
        "components": [{"type": "datetime", "key": "when"}]
    }));
    session
        .set_value("when", json!("2024-03-05 14:30"))
        .expect("date");
    assert_eq!(session.submission()["when"], json!("2024-03-05T14:30:00"));
}

#[test]
fn unknown_component_types_fail_the_session() {
    let err = FormSession::new(
        &json!({"components": [{"type": "mystery", "key": "x"}]}),
        SessionOptions::default(),
    )
    .err()
    .expect("unknown type");
    assert!(format!("{err:#}").contains("unknown component type 'mystery'"));
}
