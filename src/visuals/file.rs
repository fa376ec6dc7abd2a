use serde_json::{Map, Value};

use super::{ValueError, VisualBehavior};
use crate::domain::FieldSchema;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Pending,
    Uploading { progress: u8 },
    Done,
    Error { message: String },
}

impl UploadState {
    fn label(&self) -> &'static str {
        match self {
            UploadState::Pending => "pending",
            UploadState::Uploading { .. } => "uploading",
            UploadState::Done => "done",
            UploadState::Error { .. } => "error",
        }
    }
}

/// Per-file status; upload failures are recorded here instead of raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    pub name: String,
    pub size: Option<u64>,
    pub url: Option<String>,
    pub state: UploadState,
}

impl FileStatus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            url: None,
            state: UploadState::Pending,
        }
    }

    fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            state: UploadState::Error {
                message: message.into(),
            },
            ..Self::new(name)
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let map = match value {
            Value::String(name) if !name.is_empty() => return Self::new(name.clone()),
            Value::Object(map) => map,
            _ => return Self::failed("", "unsupported file entry"),
        };
        let name = map.get("name").and_then(Value::as_str).unwrap_or_default();
        if name.is_empty() {
            return Self::failed("", "missing file name");
        }
        let url = map.get("url").and_then(Value::as_str).map(str::to_string);
        let state = match map.get("status").and_then(Value::as_str) {
            Some("uploading") => UploadState::Uploading {
                progress: map
                    .get("progress")
                    .and_then(Value::as_u64)
                    .unwrap_or(0)
                    .min(100) as u8,
            },
            Some("error") => UploadState::Error {
                message: map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("upload failed")
                    .to_string(),
            },
            Some("done") => UploadState::Done,
            Some("pending") => UploadState::Pending,
            _ if url.is_some() => UploadState::Done,
            _ => UploadState::Pending,
        };
        Self {
            name: name.to_string(),
            size: map.get("size").and_then(Value::as_u64),
            url,
            state,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        if let Some(size) = self.size {
            map.insert("size".to_string(), Value::from(size));
        }
        if let Some(url) = &self.url {
            map.insert("url".to_string(), Value::String(url.clone()));
        }
        map.insert(
            "status".to_string(),
            Value::String(self.state.label().to_string()),
        );
        match &self.state {
            UploadState::Uploading { progress } => {
                map.insert("progress".to_string(), Value::from(*progress));
            }
            UploadState::Error { message } => {
                map.insert("message".to_string(), Value::String(message.clone()));
            }
            UploadState::Pending | UploadState::Done => {}
        }
        Value::Object(map)
    }
}

/// File list; entries are canonical status objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileVisual;

impl FileVisual {
    pub fn statuses(value: &Value) -> Vec<FileStatus> {
        match value {
            Value::Array(items) => items.iter().map(FileStatus::from_value).collect(),
            Value::Null => Vec::new(),
            single => vec![FileStatus::from_value(single)],
        }
    }
}

impl VisualBehavior for FileVisual {
    fn normalize(&self, _schema: &FieldSchema, value: &Value) -> Result<Value, ValueError> {
        Ok(Value::Array(
            Self::statuses(value)
                .iter()
                .map(FileStatus::to_value)
                .collect(),
        ))
    }

    fn normalize_value(&self, schema: &FieldSchema, value: &Value) -> Result<Value, ValueError> {
        self.normalize(schema, value)
    }

    fn display_value(&self, _schema: &FieldSchema, value: &Value) -> String {
        Self::statuses(value)
            .iter()
            .map(|status| match &status.state {
                UploadState::Uploading { progress } => format!("{} ({progress}%)", status.name),
                UploadState::Error { message } => format!("{} (error: {message})", status.name),
                UploadState::Pending => format!("{} (pending)", status.name),
                UploadState::Done => status.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn broken_entries_become_error_statuses() {
        let statuses = FileVisual::statuses(&json!([
            {"name": "cv.pdf", "url": "https://files/cv.pdf", "size": 12},
            {"size": 3},
            {"name": "photo.png", "status": "uploading", "progress": 250}
        ]));
        assert_eq!(statuses[0].state, UploadState::Done);
        assert_eq!(
            statuses[1].state,
            UploadState::Error {
                message: "missing file name".to_string()
            }
        );
        assert_eq!(statuses[2].state, UploadState::Uploading { progress: 100 });
    }

    #[test]
    fn normalized_entries_carry_their_status() {
        let schema = FieldSchema::new("file", "attachments");
        let value = FileVisual
            .normalize_value(&schema, &json!("notes.txt"))
            .expect("file list");
        assert_eq!(value, json!([{"name": "notes.txt", "status": "pending"}]));
        assert_eq!(FileVisual.display_value(&schema, &value), "notes.txt (pending)");
    }
}
