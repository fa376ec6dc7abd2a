use std::rc::Rc;

use anyhow::{Context, Result, bail};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use indexmap::IndexMap;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::text::Line;
use ratatui::widgets::{Paragraph, Widget};
use serde_json::Value;

use super::options::SessionOptions;
use crate::bridge::{BridgeContext, RegistrationService, VisualComponent};
use crate::dom::{Element, UiHost};
use crate::domain::parse_form_definition;
use crate::engine::render::find_own;
use crate::engine::{ComponentCatalog, EngineInstance, FieldError, Form};

/// One form mounted on a host with every bridged visual paired to its
/// engine instance.
pub struct FormSession {
    host: UiHost,
    context: BridgeContext,
    form: Form,
    options: SessionOptions,
    mounted: Option<Element>,
}

impl FormSession {
    /// Parse `definition`, register the visuals, build the form and mount it.
    /// Registration failures are fatal.
    pub fn new(definition: &Value, options: SessionOptions) -> Result<Self> {
        let mut definition =
            parse_form_definition(definition).context("failed to parse form definition")?;
        if let Some(display) = options.display {
            definition.display = display;
        }

        let host = UiHost::new();
        let context = BridgeContext::new();
        let service = RegistrationService::new(context.clone());
        let mut catalog = ComponentCatalog::with_natives();
        let report = service
            .install(&mut catalog, &host)
            .context("failed to register visual components")?;
        service
            .verify(&catalog, &host)
            .context("visual component registration is incomplete")?;
        tracing::debug!(
            classes = report.classes.len(),
            tags = report.tags.len(),
            "session registrations ready"
        );

        let form = Form::create(definition, &catalog, options.engine_options())
            .context("failed to build form")?;
        let mut session = Self {
            host,
            context,
            form,
            options,
            mounted: None,
        };
        session.mount();
        Ok(session)
    }

    pub fn host(&self) -> &UiHost {
        &self.host
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn context(&self) -> &BridgeContext {
        &self.context
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    fn mount(&mut self) {
        let markup = self.form.render();
        let element = self.host.mount(&markup, self.options.mount_mode);
        self.form.attach(&element, &self.host);
        self.mounted = Some(element);
    }

    /// Tear the mounted tree down and rebuild every instance from current data.
    pub fn redraw(&mut self) -> Result<()> {
        if let Some(element) = self.mounted.take() {
            self.host.unmount(&element);
        }
        self.form.rebuild().context("failed to rebuild form")?;
        self.mount();
        Ok(())
    }

    fn lookup(&self, key: &str) -> Result<Rc<EngineInstance>> {
        self.form
            .instance(key)
            .with_context(|| format!("no component '{key}'"))
    }

    fn visual_for(&self, instance: &EngineInstance) -> Option<Rc<VisualComponent>> {
        let container = instance.element()?;
        let id = instance.id();
        let tag = find_own(&container, &|element| {
            VisualComponent::from_element(element)
                .and_then(|visual| visual.instance())
                .is_some_and(|bound| bound.id() == id)
        })?;
        VisualComponent::from_element(&tag)
    }

    /// The visual currently bound to the component at `key` (path or key).
    pub fn visual(&self, key: &str) -> Option<Rc<VisualComponent>> {
        let instance = self.form.instance(key)?;
        self.visual_for(&instance)
    }

    pub fn visuals(&self) -> Vec<Rc<VisualComponent>> {
        self.form
            .instances()
            .iter()
            .filter_map(|instance| self.visual_for(instance))
            .collect()
    }

    /// Enter `value` as user input. Without a bound visual the value goes
    /// straight into engine data.
    pub fn set_value(&mut self, key: &str, value: Value) -> Result<()> {
        let instance = self.lookup(key)?;
        match self.visual_for(&instance) {
            Some(visual) => {
                if visual.is_read_only() {
                    bail!("component '{key}' is read-only");
                }
                visual.set_value(value);
                visual.on_change(false);
            }
            None => {
                tracing::debug!(key, "no bound visual; writing engine data");
                instance.update_value(value, true);
                instance.trigger_change(true);
            }
        }
        self.after_edit(&instance);
        Ok(())
    }

    /// Type `text` into the visual at `key`, one key press per character.
    pub fn type_text(&mut self, key: &str, text: &str) -> Result<usize> {
        let mut accepted = 0;
        for ch in text.chars() {
            if self.send_key(key, KeyEvent::new(KeyCode::Char(ch), KeyModifiers::NONE))? {
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    pub fn send_key(&mut self, key: &str, event: KeyEvent) -> Result<bool> {
        let instance = self.lookup(key)?;
        let visual = self
            .visual_for(&instance)
            .with_context(|| format!("no visual bound to '{key}'"))?;
        let accepted = visual.handle_key(&event);
        if accepted {
            self.after_edit(&instance);
        }
        Ok(accepted)
    }

    fn after_edit(&self, instance: &EngineInstance) {
        if self.options.auto_validate {
            instance.validate();
        }
    }

    /// Replace the submission; redraws when grid rows changed.
    pub fn set_submission(&mut self, data: Value) -> Result<()> {
        if self.form.set_submission(data) {
            tracing::debug!("row counts changed, redrawing");
            self.redraw()?;
        }
        Ok(())
    }

    pub fn submission(&self) -> Value {
        self.form.submission()
    }

    pub fn validate(&self) -> Vec<FieldError> {
        self.form.validate()
    }

    pub fn submit(&self) -> Result<Value, Vec<FieldError>> {
        self.form.submit()
    }

    pub fn add_row(&mut self, grid: &str) -> Result<usize> {
        let rows = self.form.add_row(grid)?;
        self.redraw()?;
        Ok(rows)
    }

    pub fn remove_row(&mut self, grid: &str, index: usize) -> Result<usize> {
        let rows = self.form.remove_row(grid, index)?;
        self.redraw()?;
        Ok(rows)
    }

    /// Error currently shown per field path.
    pub fn field_errors(&self) -> IndexMap<String, String> {
        self.form
            .instances()
            .iter()
            .filter_map(|instance| {
                let message = match self.visual_for(instance) {
                    Some(visual) => visual.error_message(),
                    None => instance.errors().into_iter().next().map(|error| error.message),
                }?;
                Some((instance.path().to_string(), message))
            })
            .collect()
    }

    /// The mounted document, as it stands after attach.
    pub fn html(&self) -> String {
        match &self.mounted {
            Some(element) => element.to_markup().to_html(),
            None => self.form.render().to_html(),
        }
    }

    /// Plain-text rendering of every bound visual, one line per field.
    pub fn preview(&self, width: u16) -> String {
        let lines: Vec<Line<'static>> = self.visuals().iter().map(|visual| visual.paint()).collect();
        let height = u16::try_from(lines.len()).unwrap_or(u16::MAX).max(1);
        let area = Rect::new(0, 0, width.max(1), height);
        let mut buffer = Buffer::empty(area);
        Paragraph::new(lines).render(area, &mut buffer);
        (0..area.height)
            .map(|y| {
                let row: String = (0..area.width).map(|x| buffer[(x, y)].symbol()).collect();
                row.trim_end().to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition() -> Value {
        json!({
            "title": "Signup",
            "components": [
                {"type": "textfield", "key": "name", "label": "Name", "validate": {"required": true}},
                {"type": "checkbox", "key": "terms", "label": "Terms"},
                {"type": "panel", "key": "extra", "components": [
                    {"type": "number", "key": "age", "label": "Age"}
                ]}
            ]
        })
    }

    #[test]
    fn every_input_gets_a_bound_visual() {
        let session = FormSession::new(&definition(), SessionOptions::default()).expect("session");
        assert!(session.visual("name").is_some());
        assert!(session.visual("age").is_some());
        assert!(session.visual("extra").is_none());
        assert_eq!(session.visuals().len(), 3);
    }

    #[test]
    fn user_input_reaches_the_submission() {
        let mut session =
            FormSession::new(&definition(), SessionOptions::default()).expect("session");
        session.type_text("name", "Ada").expect("typed");
        session.set_value("age", json!("36")).expect("age");
        let submission = session.submission();
        assert_eq!(submission["name"], json!("Ada"));
        assert_eq!(submission["age"], json!(36));
    }

    #[test]
    fn submit_reports_missing_required_fields() {
        let session = FormSession::new(&definition(), SessionOptions::default()).expect("session");
        let errors = session.submit().expect_err("name is required");
        assert_eq!(errors[0].context.key, "name");
        assert!(session.field_errors().contains_key("name"));
    }

    #[test]
    fn read_only_sessions_reject_input() {
        let mut session = FormSession::new(
            &definition(),
            SessionOptions::default().with_read_only(true),
        )
        .expect("session");
        assert!(session.set_value("name", json!("x")).is_err());
    }

    #[test]
    fn preview_lists_fields() {
        let mut session =
            FormSession::new(&definition(), SessionOptions::default()).expect("session");
        session.set_value("name", json!("Ada")).expect("name");
        let preview = session.preview(40);
        assert!(preview.lines().next().is_some_and(|line| line.starts_with("Name: Ada")));
    }
}
