use std::fmt::Write as FmtWrite;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, ValueEnum};
use color_eyre::eyre::{Report, Result, WrapErr, eyre};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use formbridge::dom::MountMode;
use formbridge::domain::FormDisplay;
use formbridge::{
    DocumentFormat, FormSession, OutputDestination, OutputOptions, SessionOptions, emit,
    emit_text, parse_with_fallback,
};

const LOG_ENV: &str = "FORMBRIDGE_LOG";

#[derive(Debug, Parser)]
#[command(
    name = "formbridge",
    version,
    about = "Mount a form definition headlessly, fill it in and print the submission"
)]
struct Cli {
    /// Form definition: file path, inline payload, or "-" for stdin
    #[arg(short = 'F', long = "form", value_name = "SPEC")]
    form: String,

    /// Submission data loaded before any --set: file path, inline payload, or "-"
    #[arg(short = 'd', long = "data", value_name = "SPEC")]
    data: Option<String>,

    /// Enter a value as user input (value is parsed as JSON, else taken as text)
    #[arg(long = "set", value_name = "KEY=VALUE", action = ArgAction::Append)]
    sets: Vec<String>,

    /// Override the definition's display mode
    #[arg(long = "display", value_enum)]
    display: Option<DisplayArg>,

    /// Mount the whole form read-only
    #[arg(long = "read-only")]
    read_only: bool,

    /// Inject markup as a raw string instead of compiling it
    #[arg(long = "raw-injection")]
    raw_injection: bool,

    /// Write the mounted document instead of submitting
    #[arg(long = "html")]
    html: bool,

    /// Print a text preview of every bound field to stderr
    #[arg(long = "preview")]
    preview: bool,

    /// Output destinations ("-" writes to stdout). Accepts multiple values per flag use.
    #[arg(short = 'o', long = "output", value_name = "DEST", num_args = 1.., action = ArgAction::Append)]
    outputs: Vec<String>,

    /// Emit compact JSON/TOML rather than pretty formatting
    #[arg(long = "no-pretty")]
    no_pretty: bool,

    /// Overwrite output files even if they already exist
    #[arg(short = 'f', long = "force", short_alias = 'y', alias = "yes")]
    force: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DisplayArg {
    Form,
    Wizard,
    Pdf,
}

impl From<DisplayArg> for FormDisplay {
    fn from(display: DisplayArg) -> Self {
        match display {
            DisplayArg::Form => FormDisplay::Form,
            DisplayArg::Wizard => FormDisplay::Wizard,
            DisplayArg::Pdf => FormDisplay::Pdf,
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();
    let cli = Cli::parse();

    let mut diagnostics = DiagnosticCollector::default();
    if cli.form == "-" && cli.data.as_deref() == Some("-") {
        diagnostics.push_input("form/data", "cannot read form and data from stdin simultaneously");
    }
    let form = load_value(&cli.form, "form")
        .map_err(|err| diagnostics.push_input("form", format!("{err:#}")))
        .ok();
    let data = match cli.data.as_deref() {
        Some(spec) => load_value(spec, "data")
            .map_err(|err| diagnostics.push_input("data", format!("{err:#}")))
            .ok(),
        None => None,
    };
    let sets = parse_sets(&cli.sets, &mut diagnostics);
    let output = build_output_options(&cli, &mut diagnostics);
    diagnostics.into_result()?;
    let form = form.ok_or_else(|| eyre!("form definition missing"))?;

    let mut options = SessionOptions::default().with_read_only(cli.read_only);
    if cli.raw_injection {
        options = options.with_mount_mode(MountMode::RawInjection);
    }
    if let Some(display) = cli.display {
        options = options.with_display(display.into());
    }

    let mut session = FormSession::new(&form, options).map_err(anyhow_report)?;
    if let Some(data) = data {
        session.set_submission(data).map_err(anyhow_report)?;
    }
    for (key, value) in sets {
        session
            .set_value(&key, value)
            .map_err(anyhow_report)
            .wrap_err_with(|| format!("failed to set '{key}'"))?;
    }

    if cli.preview {
        eprintln!("{}", session.preview(80));
    }
    if cli.html {
        return emit_text(&session.html(), &output.destinations).map_err(anyhow_report);
    }

    match session.submit() {
        Ok(submission) => emit(&submission, &output).map_err(anyhow_report),
        Err(errors) => {
            let mut body = format!("{} field(s) failed validation:\n", errors.len());
            for error in &errors {
                let _ = writeln!(body, "  {}: {}", error.context.path, error.message);
            }
            Err(eyre!(body))
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn anyhow_report(err: anyhow::Error) -> Report {
    eyre!("{err:#}")
}

fn load_value(spec: &str, label: &str) -> Result<Value> {
    if spec == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .wrap_err("failed to read from stdin")?;
        return parse_contents(&buffer, DocumentFormat::default(), label);
    }
    let path = Path::new(spec);
    if !path.exists() {
        return parse_contents(spec, DocumentFormat::default(), &format!("inline {label}"));
    }
    let contents = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {label} from {}", path.display()))?;
    let format = DocumentFormat::from_path(path).unwrap_or_default();
    parse_contents(&contents, format, label)
}

fn parse_contents(contents: &str, format: DocumentFormat, label: &str) -> Result<Value> {
    parse_with_fallback(contents, format).map_err(|err| eyre!("failed to parse {label}: {err:#}"))
}

fn parse_sets(raw: &[String], diagnostics: &mut DiagnosticCollector) -> Vec<(String, Value)> {
    raw.iter()
        .filter_map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Some((
                key.trim().to_string(),
                serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string())),
            )),
            _ => {
                diagnostics.push_input("set", format!("expected KEY=VALUE, got '{entry}'"));
                None
            }
        })
        .collect()
}

#[derive(Default)]
struct DiagnosticCollector {
    messages: Vec<String>,
}

impl DiagnosticCollector {
    fn push_input(&mut self, label: &str, message: impl Into<String>) {
        self.messages
            .push(format!("input ({label}): {}", message.into()));
    }

    fn push_output(&mut self, message: impl Into<String>) {
        self.messages.push(format!("output: {}", message.into()));
    }

    fn into_result(self) -> Result<()> {
        if self.messages.is_empty() {
            return Ok(());
        }
        let mut body = String::from("encountered input/output issues:\n");
        for (idx, msg) in self.messages.iter().enumerate() {
            let _ = writeln!(body, "  {}. {}", idx + 1, msg);
        }
        Err(eyre!(body))
    }
}

fn build_output_options(cli: &Cli, diagnostics: &mut DiagnosticCollector) -> OutputOptions {
    let mut destinations = Vec::new();
    let mut format: Option<DocumentFormat> = None;
    for raw in &cli.outputs {
        if raw.trim().is_empty() {
            diagnostics.push_output("output destination cannot be empty");
            continue;
        }
        if raw == "-" {
            destinations.push(OutputDestination::Stdout);
            continue;
        }
        let path = PathBuf::from(raw);
        // markup output ignores the extension
        if !cli.html {
            match DocumentFormat::from_path(&path) {
                Some(detected) => match format {
                    Some(existing) if existing != detected => diagnostics.push_output(format!(
                        "output file {} uses {detected} but other destinations use {existing}; align extensions",
                        path.display()
                    )),
                    _ => format = Some(detected),
                },
                None => diagnostics.push_output(format!(
                    "cannot infer format from output file {}; use .json/.yaml/.toml",
                    path.display()
                )),
            }
        }
        if path.exists() && !cli.force {
            diagnostics.push_output(format!(
                "file {} already exists (pass --force to overwrite)",
                path.display()
            ));
        }
        destinations.push(OutputDestination::file(path));
    }
    if destinations.is_empty() {
        destinations.push(OutputDestination::Stdout);
    }
    OutputOptions::new(format.unwrap_or_default())
        .with_pretty(!cli.no_pretty)
        .with_destinations(destinations)
}
