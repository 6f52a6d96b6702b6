//! Particle status codes.

use std::fmt;

/// Execution state tag carried by every particle.
///
/// The tag round-trips through a packed `int32` record field so kernels
/// can read and set it: `Success=0`, `Error=1`, `Delete=2`. Custom codes
/// should be `>= 8` so they never alias a built-in code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Normal state; kernels keep advecting this particle.
    Success,
    /// The particle hit an error; execution handles it out of band.
    Error,
    /// The particle is marked for removal from its set.
    Delete,
    /// Application-defined state.
    Custom(i32),
}

impl StatusCode {
    /// The stable integer encoding used inside packed records.
    pub fn as_i32(&self) -> i32 {
        match *self {
            Self::Success => 0,
            Self::Error => 1,
            Self::Delete => 2,
            Self::Custom(code) => code,
        }
    }

    /// Decode a status read back from a record field.
    pub fn from_i32(code: i32) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::Error,
            2 => Self::Delete,
            other => Self::Custom(other),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Delete => write!(f, "delete"),
            Self::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_codes_round_trip() {
        for code in [StatusCode::Success, StatusCode::Error, StatusCode::Delete] {
            assert_eq!(StatusCode::from_i32(code.as_i32()), code);
        }
    }

    #[test]
    fn custom_codes_round_trip() {
        assert_eq!(StatusCode::from_i32(40), StatusCode::Custom(40));
        assert_eq!(StatusCode::Custom(40).as_i32(), 40);
    }
}
