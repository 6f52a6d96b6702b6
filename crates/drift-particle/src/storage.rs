//! The two storage surfaces over a particle's logical fields.
//!
//! Interpreted storage boxes each field independently; packed storage
//! lays all fields into one contiguous record per [`RecordLayout`] and
//! exposes the raw base pointer natively compiled kernels consume. Both
//! surfaces implement the same `get`/`set` contract and are observably
//! interchangeable per field name.

#![allow(unsafe_code)]

use std::sync::Arc;

use indexmap::IndexMap;

use drift_core::{ConfigError, Value, ValueType};

use crate::layout::RecordLayout;
use crate::shape::ParticleShape;

/// Storage capability of one particle, selected once at construction.
#[derive(Debug)]
pub enum ParticleStore {
    /// Each field an independently boxed value.
    Interpreted(InterpretedStore),
    /// All fields packed into one contiguous kernel-visible record.
    Packed(PackedRecord),
}

impl ParticleStore {
    /// Read a field by name.
    pub fn get(&self, name: &str) -> Result<Value, ConfigError> {
        match self {
            Self::Interpreted(store) => store.get(name),
            Self::Packed(record) => record.get(name),
        }
    }

    /// Write a field by name, coercing to its declared type.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), ConfigError> {
        match self {
            Self::Interpreted(store) => store.set(name, value),
            Self::Packed(record) => record.set(name, value),
        }
    }

    /// The packed record, when in packed mode.
    pub fn as_packed_mut(&mut self) -> Option<&mut PackedRecord> {
        match self {
            Self::Packed(record) => Some(record),
            Self::Interpreted(_) => None,
        }
    }
}

/// Per-field boxed storage for interpreted-mode particles.
///
/// Fields keep their declared order; `int16` fields are held widened to
/// 32 bits (the layout engine rejects them, interpreted mode does not).
#[derive(Clone, Debug)]
pub struct InterpretedStore {
    values: IndexMap<String, (ValueType, Value)>,
}

impl InterpretedStore {
    /// Create zero-initialized storage for every field of `shape`.
    pub fn for_shape(shape: &ParticleShape) -> Self {
        let values = shape
            .iter()
            .map(|spec| {
                (
                    spec.name().to_string(),
                    (spec.value_type(), spec.value_type().zero()),
                )
            })
            .collect();
        Self { values }
    }

    /// Read a field by name.
    pub fn get(&self, name: &str) -> Result<Value, ConfigError> {
        self.values
            .get(name)
            .map(|(_, value)| *value)
            .ok_or_else(|| ConfigError::UnknownField {
                name: name.to_string(),
            })
    }

    /// Write a field by name, coercing to its declared type.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), ConfigError> {
        let (value_type, slot) =
            self.values
                .get_mut(name)
                .ok_or_else(|| ConfigError::UnknownField {
                    name: name.to_string(),
                })?;
        *slot = value
            .coerce_to(*value_type)
            .ok_or_else(|| ConfigError::TypeMismatch {
                field: name.to_string(),
                expected: *value_type,
            })?;
        Ok(())
    }
}

/// One contiguous packed particle record.
///
/// Backed by 8-byte words so the base address is always suitably aligned
/// for every field the layout can place; field access is offset
/// arithmetic in native byte order, which is what compiled kernels read.
#[derive(Clone, Debug)]
pub struct PackedRecord {
    layout: Arc<RecordLayout>,
    words: Box<[u64]>,
}

impl PackedRecord {
    /// Allocate a zeroed record for `layout`.
    pub fn new(layout: Arc<RecordLayout>) -> Self {
        let words = vec![0u64; layout.word_len()].into_boxed_slice();
        Self { layout, words }
    }

    /// The layout this record was allocated against.
    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// Raw base pointer for handing the record to native code.
    ///
    /// Valid for `layout().size_bytes()` bytes, for as long as the record
    /// itself is alive and not moved behind the caller's back.
    pub fn as_ptr(&mut self) -> *mut u8 {
        self.words.as_mut_ptr().cast()
    }

    fn bytes(&self) -> &[u8] {
        // SAFETY: `words` is a live allocation of `word_len()` u64s, so
        // reinterpreting it as `8 * word_len()` bytes stays in bounds,
        // and u8 has no alignment or validity requirements.
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast(), self.words.len() * 8) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: same bounds as `bytes`; the &mut self borrow guarantees
        // exclusive access for the lifetime of the returned slice.
        unsafe {
            std::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast(), self.words.len() * 8)
        }
    }

    /// Read a field by name.
    pub fn get(&self, name: &str) -> Result<Value, ConfigError> {
        let slot = self
            .layout
            .slot(name)
            .ok_or_else(|| ConfigError::UnknownField {
                name: name.to_string(),
            })?;
        let bytes = self.bytes();
        let at = slot.offset;
        let value = match slot.value_type {
            ValueType::I32 => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&bytes[at..at + 4]);
                Value::I32(i32::from_ne_bytes(buf))
            }
            ValueType::F32 => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&bytes[at..at + 4]);
                Value::F32(f32::from_ne_bytes(buf))
            }
            ValueType::I64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes[at..at + 8]);
                Value::I64(i64::from_ne_bytes(buf))
            }
            ValueType::F64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes[at..at + 8]);
                Value::F64(f64::from_ne_bytes(buf))
            }
            ValueType::Ptr => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes[at..at + 8]);
                Value::Ptr(u64::from_ne_bytes(buf))
            }
            ValueType::I16 => unreachable!("int16 fields are rejected by RecordLayout::compute"),
        };
        Ok(value)
    }

    /// Write a field by name, coercing to its declared type.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), ConfigError> {
        let (value_type, at) = {
            let slot = self
                .layout
                .slot(name)
                .ok_or_else(|| ConfigError::UnknownField {
                    name: name.to_string(),
                })?;
            (slot.value_type, slot.offset)
        };
        let coerced = value
            .coerce_to(value_type)
            .ok_or_else(|| ConfigError::TypeMismatch {
                field: name.to_string(),
                expected: value_type,
            })?;
        let bytes = self.bytes_mut();
        match coerced {
            Value::I32(v) => bytes[at..at + 4].copy_from_slice(&v.to_ne_bytes()),
            Value::F32(v) => bytes[at..at + 4].copy_from_slice(&v.to_ne_bytes()),
            Value::I64(v) => bytes[at..at + 8].copy_from_slice(&v.to_ne_bytes()),
            Value::F64(v) => bytes[at..at + 8].copy_from_slice(&v.to_ne_bytes()),
            Value::Ptr(v) => bytes[at..at + 8].copy_from_slice(&v.to_ne_bytes()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ShapeBuilder;
    use drift_core::{FieldSpec, InitialValue, ValueType};

    fn test_shape() -> ParticleShape {
        ShapeBuilder::base()
            .field(FieldSpec::new("mass", ValueType::F64, InitialValue::Unset, true).unwrap())
            .field(FieldSpec::new("flag", ValueType::I32, InitialValue::Unset, false).unwrap())
            .build()
    }

    fn packed_store(shape: &ParticleShape) -> ParticleStore {
        let layout = Arc::new(RecordLayout::compute(shape).unwrap());
        ParticleStore::Packed(PackedRecord::new(layout))
    }

    #[test]
    fn packed_record_starts_zeroed() {
        let shape = test_shape();
        let store = packed_store(&shape);
        assert_eq!(store.get("mass").unwrap(), Value::F64(0.0));
        assert_eq!(store.get("flag").unwrap(), Value::I32(0));
    }

    #[test]
    fn both_surfaces_agree_field_by_field() {
        let shape = test_shape();
        let mut interpreted = ParticleStore::Interpreted(InterpretedStore::for_shape(&shape));
        let mut packed = packed_store(&shape);

        let writes = [
            ("lon", Value::F64(3.5)),
            ("lat", Value::I32(-2)),
            ("time", Value::F32(8.25)),
            ("id", Value::I64(99)),
            ("mass", Value::F64(1.5e3)),
            ("flag", Value::I32(7)),
        ];
        for (name, value) in writes {
            interpreted.set(name, value).unwrap();
            packed.set(name, value).unwrap();
        }
        for (name, _) in writes {
            assert_eq!(
                interpreted.get(name).unwrap(),
                packed.get(name).unwrap(),
                "divergence on '{name}'"
            );
        }
    }

    #[test]
    fn writes_coerce_to_the_declared_type_in_both_modes() {
        let shape = test_shape();
        let mut interpreted = ParticleStore::Interpreted(InterpretedStore::for_shape(&shape));
        let mut packed = packed_store(&shape);
        for store in [&mut interpreted, &mut packed] {
            store.set("flag", Value::F64(9.9)).unwrap();
            assert_eq!(store.get("flag").unwrap(), Value::I32(9));
        }
    }

    #[test]
    fn unknown_field_errors_in_both_modes() {
        let shape = test_shape();
        let interpreted = ParticleStore::Interpreted(InterpretedStore::for_shape(&shape));
        let packed = packed_store(&shape);
        for store in [&interpreted, &packed] {
            assert!(matches!(
                store.get("nope"),
                Err(ConfigError::UnknownField { .. })
            ));
        }
    }

    #[test]
    fn float_into_ptr_slot_is_a_type_mismatch() {
        let shape = ShapeBuilder::base().extend_for_kernels().build();
        let mut packed = packed_store(&shape);
        assert!(matches!(
            packed.set("cxi", Value::F64(1.0)),
            Err(ConfigError::TypeMismatch { .. })
        ));
        packed.set("cxi", Value::Ptr(0xbeef)).unwrap();
        assert_eq!(packed.get("cxi").unwrap(), Value::Ptr(0xbeef));
    }

    #[test]
    fn record_pointer_is_stable_and_eight_byte_aligned() {
        let shape = test_shape();
        let layout = Arc::new(RecordLayout::compute(&shape).unwrap());
        let mut record = PackedRecord::new(layout);
        let ptr = record.as_ptr();
        assert_eq!(ptr as usize % 8, 0);
        record.set("mass", Value::F64(2.0)).unwrap();
        assert_eq!(record.as_ptr(), ptr);
    }

    #[test]
    fn packed_bytes_match_offset_arithmetic() {
        let shape = test_shape();
        let layout = Arc::new(RecordLayout::compute(&shape).unwrap());
        let mut record = PackedRecord::new(layout.clone());
        record.set("mass", Value::F64(42.0)).unwrap();

        let offset = layout.slot("mass").unwrap().offset;
        let bytes = record.bytes();
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[offset..offset + 8]);
        assert_eq!(f64::from_ne_bytes(buf), 42.0);
    }
}
