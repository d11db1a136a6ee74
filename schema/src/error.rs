//! Schema validation errors.

use std::fmt;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur when building or validating a schema pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Two message definitions share a full name.
    DuplicateMessage { name: String },

    /// A field number appears twice within one message.
    DuplicateFieldNumber { message: String, number: u32 },

    /// A field number is zero or outside the 29-bit range.
    InvalidFieldNumber { message: String, number: i64 },

    /// A field refers to a message type the pool does not define.
    UnresolvedType {
        message: String,
        field: String,
        type_name: String,
    },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateMessage { name } => write!(f, "duplicate message {name}"),
            Self::DuplicateFieldNumber { message, number } => {
                write!(f, "duplicate field number {number} in {message}")
            }
            Self::InvalidFieldNumber { message, number } => {
                write!(f, "invalid field number {number} in {message}")
            }
            Self::UnresolvedType {
                message,
                field,
                type_name,
            } => {
                write!(
                    f,
                    "field {message}.{field} refers to unknown message type {type_name}"
                )
            }
        }
    }
}

impl std::error::Error for SchemaError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_type_display() {
        let err = SchemaError::UnresolvedType {
            message: "pkg.Outer".to_string(),
            field: "inner".to_string(),
            type_name: "pkg.Missing".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("pkg.Outer.inner"));
        assert!(msg.contains("pkg.Missing"));
    }
}
