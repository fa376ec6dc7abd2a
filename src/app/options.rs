use crate::dom::MountMode;
use crate::domain::FormDisplay;
use crate::engine::EngineOptions;

/// Configuration for one [`FormSession`](super::FormSession).
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Engine-wide read-only switch.
    pub read_only: bool,
    /// How rendered markup reaches the host.
    pub mount_mode: MountMode,
    /// Validate and publish errors after every user edit.
    pub auto_validate: bool,
    /// Overrides the definition's display mode when set.
    pub display: Option<FormDisplay>,
    pub hide_labels: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            mount_mode: MountMode::Compiled,
            auto_validate: true,
            display: None,
            hide_labels: false,
        }
    }
}

impl SessionOptions {
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_mount_mode(mut self, mode: MountMode) -> Self {
        self.mount_mode = mode;
        self
    }

    pub fn with_auto_validate(mut self, enabled: bool) -> Self {
        self.auto_validate = enabled;
        self
    }

    pub fn with_display(mut self, display: FormDisplay) -> Self {
        self.display = Some(display);
        self
    }

    pub fn with_hide_labels(mut self, hide: bool) -> Self {
        self.hide_labels = hide;
        self
    }

    pub(crate) fn engine_options(&self) -> EngineOptions {
        EngineOptions::default()
            .with_read_only(self.read_only)
            .with_hide_labels(self.hide_labels)
    }
}
