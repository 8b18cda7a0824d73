use crate::util::SyncError;
use thiserror::Error;

/// Structured error type for modelsync library operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error(
        "Unsupported type '{type_name}'{}",
        .dialect.as_ref().map(|d| format!(" for {d}")).unwrap_or_default()
    )]
    UnsupportedType {
        type_name: String,
        dialect: Option<String>,
    },

    #[error("Failed to load model: {message}")]
    Load { message: String },

    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Introspection failed: {message}")]
    Introspection { message: String },

    #[error("Planning failed: {message}")]
    Plan { message: String },

    #[error("Lint check failed with {count} error(s)")]
    LintFailed {
        count: usize,
        issues: Vec<crate::lint::LintResult>,
    },

    #[error("Plan changed since review: expected fingerprint {expected}, got {actual}")]
    PlanMismatch { expected: String, actual: String },

    #[error("Runtime error: {message}")]
    Runtime { message: String },
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn introspection(message: impl Into<String>) -> Self {
        Self::Introspection {
            message: message.into(),
        }
    }

    pub fn plan(message: impl Into<String>) -> Self {
        Self::Plan {
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Maps a model-side library error, keeping configuration and type errors distinct.
    pub(crate) fn from_model(error: SyncError) -> Self {
        match error {
            SyncError::Configuration(message) => Self::Configuration { message },
            SyncError::UnsupportedType { type_name, dialect } => {
                Self::UnsupportedType { type_name, dialect }
            }
            other => Self::load(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_errors_keep_their_kind() {
        assert!(matches!(
            Error::from_model(SyncError::configuration("dup")),
            Error::Configuration { .. }
        ));

        let err = Error::from_model(SyncError::unsupported_in_dialect("Byte", "postgres"));
        assert_eq!(err.to_string(), "Unsupported type 'Byte' for postgres");

        assert!(matches!(
            Error::from_model(SyncError::ParseError("bad json".into())),
            Error::Load { .. }
        ));
    }
}
