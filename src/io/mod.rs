mod format;
mod input;
mod output;

pub use format::DocumentFormat;
pub use input::{parse_document_str, parse_with_fallback};
pub use output::{OutputDestination, OutputOptions, emit, emit_text, serialize_value};
