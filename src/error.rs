//! Error types for the specification engine.
//!
//! Every pipeline stage fails with its own variant so callers can tell a
//! malformed document from a failing command or a bad pattern.

use crate::command::CommandError;

/// Top-level error type for validating, building and running a specification.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The document does not have the required shape.
    #[error("schema error at {path}: {message}")]
    Schema { path: String, message: String },

    /// The external command failed to start or exited unsuccessfully.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The filter pattern (or its flag combination) does not compile.
    #[error("invalid filter pattern {pattern:?}: {message}")]
    Pattern { pattern: String, message: String },

    /// The split key is not a field of the extracted records.
    #[error("split key {key:?} not found in match (collected groups: {})", .fields.join(", "))]
    SplitKey { key: String, fields: Vec<String> },

    /// An `apply` entry names a transform outside the registry.
    #[error("unknown transform {name:?} for field {field:?} (known: {})", .known.join(", "))]
    UnknownTransform {
        field: String,
        name: String,
        known: Vec<&'static str>,
    },

    /// A numeric transform met a value that is not a number.
    #[error("transform {transform} on field {field:?} cannot use value {value:?}")]
    Reduction {
        field: String,
        transform: &'static str,
        value: String,
    },
}

impl Error {
    pub(crate) fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_schema() {
        let err = Error::schema("/command", "missing required member");
        assert_eq!(
            err.to_string(),
            "schema error at /command: missing required member"
        );
    }

    #[test]
    fn display_split_key_lists_fields() {
        let err = Error::SplitKey {
            key: "disk".to_string(),
            fields: vec!["size".to_string(), "used".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "split key \"disk\" not found in match (collected groups: size, used)"
        );
    }

    #[test]
    fn command_error_is_transparent() {
        let err = Error::from(CommandError::Exit {
            program: "df".to_string(),
            code: Some(2),
            stderr: "no such device".to_string(),
        });
        assert!(err.to_string().contains("exit code 2"));
        assert!(err.to_string().contains("no such device"));
    }
}
