use filingscope_core::{CoreError, StoreError, ValidationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("strict mode failed: warnings={warning_count}, errors={error_count}")]
    StrictModeViolation {
        warning_count: usize,
        error_count: usize,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Command(_) => 2,
            Self::Store(StoreError::Io(_)) => 10,
            Self::Store(_) => 3,
            Self::Core(CoreError::Validation(_)) => 2,
            Self::Core(CoreError::Store(StoreError::Io(_))) => 10,
            Self::Core(CoreError::Store(_)) => 3,
            Self::Core(CoreError::Serialization(_)) => 4,
            Self::Core(CoreError::Io(_)) => 10,
            Self::StrictModeViolation { .. } => 5,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_category() {
        assert_eq!(CliError::Validation(ValidationError::EmptyEntityId).exit_code(), 2);
        assert_eq!(
            CliError::Core(CoreError::Validation(ValidationError::EmptySecurityId)).exit_code(),
            2
        );
        assert_eq!(
            CliError::StrictModeViolation {
                warning_count: 1,
                error_count: 0
            }
            .exit_code(),
            5
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(CliError::Store(StoreError::Io(io)).exit_code(), 10);
        assert_eq!(
            CliError::Store(StoreError::UnknownEntity(String::from("ghost"))).exit_code(),
            3
        );
    }
}
