use thiserror::Error;

/// A value the visual cannot represent; callers recover to the empty value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("'{0}' is not a recognised date")]
    InvalidDate(String),
    #[error("'{0}' is not a recognised time")]
    InvalidTime(String),
    #[error("'{0}' is not a number")]
    InvalidNumber(String),
    #[error("'{0}' is not a boolean")]
    InvalidBoolean(String),
    #[error("row index {index} is out of range for {len} values")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("expected {expected}, found {found}")]
    Unsupported {
        expected: &'static str,
        found: &'static str,
    },
}
