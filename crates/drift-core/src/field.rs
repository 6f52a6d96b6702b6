//! Field declarations and the runtime value model.
//!
//! A [`FieldSpec`] declares one named, typed particle attribute together
//! with its initial-value source and persistence flag. Specs are immutable
//! once constructed; shapes are built from ordered lists of them.

use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::traits::SampledField;

/// Scalar type tag for one particle attribute.
///
/// `I16` is declarable (interpreted-mode storage widens it to 32 bits) but
/// is rejected by the record layout engine: 2-byte slots would break the
/// wide-first natural-alignment scheme kernels rely on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// 16-bit signed integer. Not packable into kernel records.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// Opaque pointer-sized slot, handed to kernels untouched.
    Ptr,
}

impl ValueType {
    /// Storage width of this type in bytes.
    pub fn width_bytes(&self) -> usize {
        match self {
            Self::I16 => 2,
            Self::I32 | Self::F32 => 4,
            Self::I64 | Self::F64 | Self::Ptr => 8,
        }
    }

    /// Whether this type occupies an 8-byte slot in a packed record.
    pub fn is_wide(&self) -> bool {
        matches!(self, Self::I64 | Self::F64 | Self::Ptr)
    }

    /// Whether the layout engine can place this type in a packed record.
    pub fn is_packable(&self) -> bool {
        !matches!(self, Self::I16)
    }

    /// The zero value of this type.
    ///
    /// `I16` zero-initializes as a widened `I32`, matching interpreted-mode
    /// storage.
    pub fn zero(&self) -> Value {
        match self {
            Self::I16 | Self::I32 => Value::I32(0),
            Self::I64 => Value::I64(0),
            Self::F32 => Value::F32(0.0),
            Self::F64 => Value::F64(0.0),
            Self::Ptr => Value::Ptr(0),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I16 => "int16",
            Self::I32 => "int32",
            Self::I64 => "int64",
            Self::F32 => "float32",
            Self::F64 => "float64",
            Self::Ptr => "ptr",
        };
        write!(f, "{name}")
    }
}

/// A runtime attribute value.
///
/// The variant is the value's *current* type; writes into a store coerce
/// to the field's declared [`ValueType`] first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    /// 32-bit signed integer.
    I32(i32),
    /// 64-bit signed integer.
    I64(i64),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// Opaque pointer-sized payload.
    Ptr(u64),
}

impl Value {
    /// The type tag of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::I32(_) => ValueType::I32,
            Self::I64(_) => ValueType::I64,
            Self::F32(_) => ValueType::F32,
            Self::F64(_) => ValueType::F64,
            Self::Ptr(_) => ValueType::Ptr,
        }
    }

    /// Numeric view of this value. `Ptr` payloads render as their address.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::I32(v) => v as f64,
            Self::I64(v) => v as f64,
            Self::F32(v) => v as f64,
            Self::F64(v) => v,
            Self::Ptr(v) => v as f64,
        }
    }

    /// Coerce this value to `target`, applying lossy numeric casts.
    ///
    /// Float-to-int truncates; narrowing wraps or saturates per `as`-cast
    /// semantics. A `Ptr` slot accepts only pointer or integer payloads,
    /// and pointer payloads convert to nothing but `Ptr`: silently turning
    /// an address into a float is always a caller bug. Returns `None` when
    /// the conversion is not meaningful.
    pub fn coerce_to(self, target: ValueType) -> Option<Value> {
        match (self, target) {
            (Self::Ptr(v), ValueType::Ptr) => Some(Self::Ptr(v)),
            (Self::Ptr(_), _) => None,
            (_, ValueType::Ptr) => match self {
                Self::I32(v) => Some(Self::Ptr(v as u64)),
                Self::I64(v) => Some(Self::Ptr(v as u64)),
                _ => None,
            },
            // I16 fields live as widened 32-bit values wrapped to i16 range.
            (_, ValueType::I16) => Some(Self::I32(self.cast_i64() as i16 as i32)),
            (_, ValueType::I32) => Some(Self::I32(self.cast_i64() as i32)),
            (_, ValueType::I64) => Some(Self::I64(self.cast_i64())),
            (_, ValueType::F32) => Some(Self::F32(self.as_f64() as f32)),
            (_, ValueType::F64) => Some(Self::F64(self.as_f64())),
        }
    }

    fn cast_i64(self) -> i64 {
        match self {
            Self::I32(v) => v as i64,
            Self::I64(v) => v,
            Self::F32(v) => v as i64,
            Self::F64(v) => v as i64,
            Self::Ptr(v) => v as i64,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Ptr(v) => write!(f, "{v:#x}"),
        }
    }
}

/// Where a field's initial value comes from, fixed at declaration time.
#[derive(Clone)]
pub enum InitialValue {
    /// A literal default, coerced to the field's declared type.
    Literal(Value),
    /// Sampled from an external physical field at the particle's own
    /// spatial and time coordinates. Requires a time at construction.
    Sampled(Arc<dyn SampledField>),
    /// No declared default; the field zero-initializes.
    Unset,
}

impl fmt::Debug for InitialValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Self::Sampled(_) => f.write_str("Sampled(..)"),
            Self::Unset => f.write_str("Unset"),
        }
    }
}

/// Name of the depth column reserved by output writers.
pub const RESERVED_DEPTH_NAME: &str = "z";

/// Declaration of one particle attribute.
///
/// Immutable once constructed. The name must be unique within a shape;
/// uniqueness is enforced by the shape builder, which treats a repeated
/// name as a subclass override.
#[derive(Clone, Debug)]
pub struct FieldSpec {
    name: String,
    value_type: ValueType,
    initial: InitialValue,
    to_write: bool,
}

impl FieldSpec {
    /// Declare a field.
    ///
    /// # Errors
    ///
    /// `ConfigError::ReservedName` if `name` is `"z"`, which output
    /// writers use for the depth column.
    pub fn new(
        name: impl Into<String>,
        value_type: ValueType,
        initial: InitialValue,
        to_write: bool,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if name == RESERVED_DEPTH_NAME {
            return Err(ConfigError::ReservedName { name });
        }
        Ok(Self {
            name,
            value_type,
            initial,
            to_write,
        })
    }

    /// Declare a persisted field with a literal default.
    pub fn literal(
        name: impl Into<String>,
        value_type: ValueType,
        value: Value,
    ) -> Result<Self, ConfigError> {
        Self::new(name, value_type, InitialValue::Literal(value), true)
    }

    /// Declare a persisted field whose initial value is sampled from an
    /// external physical field at construction time.
    pub fn sampled(
        name: impl Into<String>,
        value_type: ValueType,
        source: Arc<dyn SampledField>,
    ) -> Result<Self, ConfigError> {
        Self::new(name, value_type, InitialValue::Sampled(source), true)
    }

    /// The field's name as used within kernels.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field's declared scalar type.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// The field's initial-value source.
    pub fn initial(&self) -> &InitialValue {
        &self.initial
    }

    /// Whether this field is persisted by output writers.
    pub fn to_write(&self) -> bool {
        self.to_write
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_name_fails_construction() {
        let err = FieldSpec::new("z", ValueType::F32, InitialValue::Unset, true).unwrap_err();
        assert!(matches!(err, ConfigError::ReservedName { name } if name == "z"));
    }

    #[test]
    fn wide_types_are_exactly_the_eight_byte_ones() {
        for vt in [ValueType::I64, ValueType::F64, ValueType::Ptr] {
            assert!(vt.is_wide());
            assert_eq!(vt.width_bytes(), 8);
        }
        for vt in [ValueType::I32, ValueType::F32] {
            assert!(!vt.is_wide());
            assert_eq!(vt.width_bytes(), 4);
        }
        assert!(!ValueType::I16.is_wide());
    }

    #[test]
    fn i16_is_not_packable() {
        assert!(!ValueType::I16.is_packable());
        for vt in [
            ValueType::I32,
            ValueType::I64,
            ValueType::F32,
            ValueType::F64,
            ValueType::Ptr,
        ] {
            assert!(vt.is_packable());
        }
    }

    #[test]
    fn float_to_int_coercion_truncates() {
        assert_eq!(
            Value::F64(3.9).coerce_to(ValueType::I32),
            Some(Value::I32(3))
        );
        assert_eq!(
            Value::F32(-2.5).coerce_to(ValueType::I64),
            Some(Value::I64(-2))
        );
    }

    #[test]
    fn int_to_float_coercion_widens() {
        assert_eq!(
            Value::I32(7).coerce_to(ValueType::F64),
            Some(Value::F64(7.0))
        );
    }

    #[test]
    fn float_into_ptr_is_rejected() {
        assert_eq!(Value::F64(1.0).coerce_to(ValueType::Ptr), None);
        assert_eq!(Value::Ptr(0xdead).coerce_to(ValueType::F32), None);
    }

    #[test]
    fn int_into_ptr_is_allowed() {
        assert_eq!(
            Value::I64(0x1000).coerce_to(ValueType::Ptr),
            Some(Value::Ptr(0x1000))
        );
    }

    #[test]
    fn i16_coercion_wraps_to_sixteen_bits() {
        assert_eq!(
            Value::I32(0x1_00_01).coerce_to(ValueType::I16),
            Some(Value::I32(1))
        );
    }

    #[test]
    fn display_names_match_cache_key_vocabulary() {
        assert_eq!(ValueType::F32.to_string(), "float32");
        assert_eq!(ValueType::I64.to_string(), "int64");
        assert_eq!(ValueType::Ptr.to_string(), "ptr");
    }
}
