//! Configuration errors shared across the drift workspace.

use std::error::Error;
use std::fmt;

use crate::field::ValueType;

/// Errors raised while declaring fields, computing record layouts, or
/// resolving initial values at particle construction.
///
/// All variants carry enough context to be actionable without a debugger;
/// they propagate immediately rather than being collected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The field name is reserved for the depth column in output files.
    ReservedName {
        /// The offending name.
        name: String,
    },
    /// The field's type cannot be placed in a kernel-visible record.
    UnsupportedType {
        /// Name of the offending field.
        field: String,
        /// Its declared type.
        value_type: ValueType,
    },
    /// No field with this name exists in the shape.
    UnknownField {
        /// The requested name.
        name: String,
    },
    /// A sampled initial value was requested without a time value.
    MissingTime {
        /// The field whose initial value needed sampling.
        field: String,
    },
    /// A value could not be coerced to the field's declared type.
    TypeMismatch {
        /// Name of the field being written.
        field: String,
        /// The field's declared type.
        expected: ValueType,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReservedName { name } => {
                write!(f, "field name '{name}' is reserved for the depth column")
            }
            Self::UnsupportedType { field, value_type } => {
                write!(
                    f,
                    "field '{field}': {value_type} variables cannot be packed into kernel records"
                )
            }
            Self::UnknownField { name } => write!(f, "no field named '{name}' in shape"),
            Self::MissingTime { field } => {
                write!(
                    f,
                    "cannot initialise field '{field}' from a sampled field without a time value"
                )
            }
            Self::TypeMismatch { field, expected } => {
                write!(f, "value cannot be coerced to {expected} for field '{field}'")
            }
        }
    }
}

impl Error for ConfigError {}
