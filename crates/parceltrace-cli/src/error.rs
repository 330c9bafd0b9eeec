use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] parceltrace_core::ValidationError),

    #[error(transparent)]
    Build(#[from] parceltrace_core::BuildError),

    #[error("line {line}: {message}")]
    Input { line: usize, message: String },

    #[error("strict mode failed: {failed} of {total} queries did not succeed")]
    StrictModeViolation { failed: usize, total: usize },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Build(_) | Self::Input { .. } => 2,
            Self::StrictModeViolation { .. } => 5,
            Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}
