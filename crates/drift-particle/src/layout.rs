//! The record layout engine.
//!
//! Computes, at run time, the binary layout of a packed particle record
//! from a shape's field declarations. The layout is what natively
//! compiled kernels are generated against, so the rules are rigid: every
//! wide field precedes every narrow field (keeping each naturally aligned
//! with no interior padding), and the record is padded to a multiple of
//! 8 bytes so records can be stored contiguously.

use smallvec::SmallVec;

use drift_core::{ConfigError, ValueType};

use crate::shape::ParticleShape;

/// Name of the trailing alignment slot, when one is needed.
pub const PAD_FIELD_NAME: &str = "pad";

/// Placement of one field inside a packed record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSlot {
    /// Field name.
    pub name: String,
    /// Declared scalar type.
    pub value_type: ValueType,
    /// Byte offset from the record base.
    pub offset: usize,
}

/// Binary layout of a packed particle record.
///
/// Immutable once computed. Kernels compiled against a layout stay valid
/// exactly as long as the originating shape's cache key does; callers
/// evict compiled kernels when the key changes.
#[derive(Clone, Debug)]
pub struct RecordLayout {
    slots: SmallVec<[FieldSlot; 16]>,
    size: usize,
    padded: bool,
    cache_key: String,
}

impl RecordLayout {
    /// Compute the layout for `shape`.
    ///
    /// Every field type is validated before any offset is assigned, so an
    /// unsupported type rejects the whole shape atomically and commits
    /// nothing.
    ///
    /// # Errors
    ///
    /// `ConfigError::UnsupportedType` if any field's type cannot be
    /// packed (currently `int16`).
    pub fn compute(shape: &ParticleShape) -> Result<Self, ConfigError> {
        for spec in shape.iter() {
            if !spec.value_type().is_packable() {
                return Err(ConfigError::UnsupportedType {
                    field: spec.name().to_string(),
                    value_type: spec.value_type(),
                });
            }
        }

        let mut slots: SmallVec<[FieldSlot; 16]> = SmallVec::new();
        let mut offset = 0;
        for spec in shape.iter_layout_order() {
            slots.push(FieldSlot {
                name: spec.name().to_string(),
                value_type: spec.value_type(),
                offset,
            });
            offset += spec.value_type().width_bytes();
        }

        let cache_key = shape.cache_key();
        let padded = offset % 8 != 0;
        if padded {
            slots.push(FieldSlot {
                name: PAD_FIELD_NAME.to_string(),
                value_type: ValueType::F32,
                offset,
            });
            offset += 4;
        }

        Ok(Self {
            slots,
            size: offset,
            padded,
            cache_key,
        })
    }

    /// Look up a field's placement.
    pub fn slot(&self, name: &str) -> Option<&FieldSlot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Record size in bytes. Always a multiple of 8.
    pub fn size_bytes(&self) -> usize {
        self.size
    }

    /// Record size in 8-byte words.
    pub fn word_len(&self) -> usize {
        self.size / 8
    }

    /// Whether a trailing pad slot was appended.
    pub fn is_padded(&self) -> bool {
        self.padded
    }

    /// Iterate over the slots in placement order, including the pad slot.
    pub fn iter(&self) -> impl Iterator<Item = &FieldSlot> {
        self.slots.iter()
    }

    /// The originating shape's structural cache key.
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }
}
