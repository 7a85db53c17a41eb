//! Code generation error types.

/// Error type for code generation.
///
/// Lets both logical errors (inconsistent analysis results) and formatting
/// errors propagate with `?` while emitting C text.
#[derive(Debug)]
pub enum CodeGenError {
    /// A logical error in code generation
    Logic(String),
    /// A formatting error while writing C text
    Format(std::fmt::Error),
}

impl std::fmt::Display for CodeGenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeGenError::Logic(s) => write!(f, "{}", s),
            CodeGenError::Format(e) => write!(f, "C generation error: {}", e),
        }
    }
}

impl std::error::Error for CodeGenError {}

impl From<String> for CodeGenError {
    fn from(s: String) -> Self {
        CodeGenError::Logic(s)
    }
}

impl From<std::fmt::Error> for CodeGenError {
    fn from(e: std::fmt::Error) -> Self {
        CodeGenError::Format(e)
    }
}
