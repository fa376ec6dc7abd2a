use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
#[cfg(feature = "toml")]
use anyhow::bail;
use serde_json::Value;

use super::DocumentFormat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputDestination {
    Stdout,
    File(PathBuf),
}

impl OutputDestination {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    fn describe(&self) -> String {
        match self {
            Self::Stdout => "stdout".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// Where submissions (or rendered documents) go and in which format.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: DocumentFormat,
    pub pretty: bool,
    pub destinations: Vec<OutputDestination>,
}

impl OutputOptions {
    pub fn new(format: DocumentFormat) -> Self {
        Self {
            format,
            pretty: true,
            destinations: vec![OutputDestination::Stdout],
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_destinations(mut self, destinations: Vec<OutputDestination>) -> Self {
        self.destinations = destinations;
        self
    }
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self::new(DocumentFormat::default())
    }
}

/// Serialize a submission once and write it to every destination.
pub fn emit(submission: &Value, options: &OutputOptions) -> Result<()> {
    if options.destinations.is_empty() {
        tracing::debug!("no output destinations, submission dropped");
        return Ok(());
    }
    let payload = serialize_value(submission, options)?;
    emit_text(&payload, &options.destinations)
}

/// Write already rendered text, such as the mounted markup, as-is.
pub fn emit_text(text: &str, destinations: &[OutputDestination]) -> Result<()> {
    for destination in destinations {
        write_to(destination, text)
            .with_context(|| format!("failed to write to {}", destination.describe()))?;
        tracing::debug!(destination = %destination.describe(), bytes = text.len(), "output written");
    }
    Ok(())
}

pub fn serialize_value(value: &Value, options: &OutputOptions) -> Result<String> {
    let text = match options.format {
        DocumentFormat::Json if options.pretty => serde_json::to_string_pretty(value)?,
        DocumentFormat::Json => serde_json::to_string(value)?,
        #[cfg(feature = "yaml")]
        DocumentFormat::Yaml => serde_yaml::to_string(value)?,
        #[cfg(feature = "toml")]
        DocumentFormat::Toml => {
            if !value.is_object() {
                bail!("TOML output needs an object at the top level");
            }
            if options.pretty {
                toml::to_string_pretty(value)?
            } else {
                toml::to_string(value)?
            }
        }
    };
    Ok(text)
}

fn write_to(destination: &OutputDestination, text: &str) -> Result<()> {
    let mut line = text.trim_end_matches('\n').to_string();
    line.push('\n');
    match destination {
        OutputDestination::Stdout => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(line.as_bytes())?;
            stdout.flush()?;
        }
        OutputDestination::File(path) => fs::write(path, line)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("formbridge-{}-{name}", std::process::id()))
    }

    #[test]
    fn no_destinations_writes_nothing() {
        let options = OutputOptions::default().with_destinations(Vec::new());
        emit(&json!({"ok": true}), &options).unwrap();
    }

    #[test]
    fn compact_json_stays_on_one_line() {
        let options = OutputOptions::default().with_pretty(false);
        let payload = serialize_value(&json!({"name": "Ada", "terms": true}), &options).unwrap();
        assert_eq!(payload, r#"{"name":"Ada","terms":true}"#);
    }

    #[test]
    fn submission_lands_in_file_with_one_trailing_newline() {
        let path = scratch("submission.json");
        let options =
            OutputOptions::default().with_destinations(vec![OutputDestination::file(&path)]);
        emit(&json!({"name": "Ada"}), &options).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"Ada\""));
        assert!(contents.ends_with("}\n"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn rendered_text_ends_with_one_newline() {
        let path = scratch("form.html");
        emit_text("<div></div>\n\n", &[OutputDestination::file(&path)]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "<div></div>\n");
        let _ = fs::remove_file(path);
    }

    #[cfg(feature = "toml")]
    #[test]
    fn toml_rejects_scalar_submissions() {
        let options = OutputOptions::new(DocumentFormat::Toml);
        assert!(serialize_value(&json!(3), &options).is_err());
    }
}
