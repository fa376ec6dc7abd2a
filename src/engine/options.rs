/// Engine-wide options shared by every instance of a form.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Global read-only switch, e.g. when viewing a submitted form.
    pub read_only: bool,
    /// Omit labels from rendered markup.
    pub hide_labels: bool,
}

impl EngineOptions {
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_hide_labels(mut self, hide: bool) -> Self {
        self.hide_labels = hide;
        self
    }
}
