//! Particle shapes: ordered, inheritance-merged field declarations.

use indexmap::IndexMap;

use drift_core::{FieldSpec, InitialValue, Value, ValueType};

/// Names of the built-in particle attributes.
pub mod fields {
    /// Longitude, degrees east.
    pub const LON: &str = "lon";
    /// Latitude, degrees north.
    pub const LAT: &str = "lat";
    /// Depth below the surface.
    pub const DEPTH: &str = "depth";
    /// Particle time.
    pub const TIME: &str = "time";
    /// Particle identity.
    pub const ID: &str = "id";
    /// Per-particle timestep.
    pub const DT: &str = "dt";
    /// Execution status tag.
    pub const STATE: &str = "state";
    /// Kernel grid-index cache slots, in x/y/z/time order.
    pub const INDEX_CACHES: [&str; 4] = ["cxi", "cyi", "czi", "cti"];
}

fn builtin(name: &str, value_type: ValueType, initial: InitialValue, to_write: bool) -> FieldSpec {
    FieldSpec::new(name, value_type, initial, to_write)
        .expect("built-in particle fields have valid names")
}

/// Ordered field declarations defining one particle class.
///
/// Field order is the merged declaration order: ancestors first, then the
/// class's own fields, with a repeated name overriding the inherited spec
/// in place.
#[derive(Clone, Debug)]
pub struct ParticleShape {
    specs: IndexMap<String, FieldSpec>,
}

impl ParticleShape {
    /// Look up a field declaration by name.
    pub fn spec(&self, name: &str) -> Option<&FieldSpec> {
        self.specs.get(name)
    }

    /// Iterate over the declarations in merged order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.specs.values()
    }

    /// Iterate in the order fields are placed in a packed record: every
    /// wide (8-byte) field before every narrow (4-byte) one, stable
    /// within each class.
    pub fn iter_layout_order(&self) -> impl Iterator<Item = &FieldSpec> {
        self.specs
            .values()
            .filter(|s| s.value_type().is_wide())
            .chain(self.specs.values().filter(|s| !s.value_type().is_wide()))
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the shape declares no fields.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Deterministic structural key over the layout-ordered
    /// `(name, type)` pairs.
    ///
    /// Two shapes with equal keys produce identical record layouts, so
    /// kernel library names derived from the key stay valid exactly as
    /// long as the layout does.
    pub fn cache_key(&self) -> String {
        let parts: Vec<String> = self
            .iter_layout_order()
            .map(|s| format!("{}:{}", s.name(), s.value_type()))
            .collect();
        parts.join("-")
    }
}

/// Builds a [`ParticleShape`] from base attributes, inherited shapes, and
/// per-class field declarations.
#[derive(Clone, Debug, Default)]
pub struct ShapeBuilder {
    specs: IndexMap<String, FieldSpec>,
}

impl ShapeBuilder {
    /// Start from an empty shape.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the built-in attribute set every particle class
    /// carries: `lon`, `lat`, `depth` (float32), `time` (float64),
    /// `id` (int64), and the unpersisted `dt` (float32, seeds NaN) and
    /// `state` (int32) bookkeeping fields.
    pub fn base() -> Self {
        let mut builder = Self::new();
        for spec in [
            builtin(fields::LON, ValueType::F32, InitialValue::Unset, true),
            builtin(fields::LAT, ValueType::F32, InitialValue::Unset, true),
            builtin(fields::DEPTH, ValueType::F32, InitialValue::Unset, true),
            builtin(fields::TIME, ValueType::F64, InitialValue::Unset, true),
            builtin(fields::ID, ValueType::I64, InitialValue::Unset, true),
            builtin(fields::DT, ValueType::F32, InitialValue::Unset, false),
            builtin(
                fields::STATE,
                ValueType::I32,
                InitialValue::Literal(Value::I32(0)),
                false,
            ),
        ] {
            builder.insert(spec);
        }
        builder
    }

    /// Start from an existing shape's declarations (inheritance).
    pub fn derive_from(parent: &ParticleShape) -> Self {
        Self {
            specs: parent.specs.clone(),
        }
    }

    /// Declare a field. A repeated name overrides the earlier declaration
    /// in place, preserving its position in the merged order.
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.insert(spec);
        self
    }

    /// Append the opaque grid-index cache slots natively compiled kernels
    /// dereference (`cxi`, `cyi`, `czi`, `cti`).
    pub fn extend_for_kernels(mut self) -> Self {
        for name in fields::INDEX_CACHES {
            self.insert(builtin(name, ValueType::Ptr, InitialValue::Unset, false));
        }
        self
    }

    /// Finish the shape.
    pub fn build(self) -> ParticleShape {
        ParticleShape { specs: self.specs }
    }

    fn insert(&mut self, spec: FieldSpec) {
        self.specs.insert(spec.name().to_string(), spec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_core::ConfigError;

    #[test]
    fn base_shape_declares_the_builtin_attributes() {
        let shape = ShapeBuilder::base().build();
        for name in [
            fields::LON,
            fields::LAT,
            fields::DEPTH,
            fields::TIME,
            fields::ID,
            fields::DT,
            fields::STATE,
        ] {
            assert!(shape.spec(name).is_some(), "missing builtin '{name}'");
        }
        assert!(!shape.spec(fields::DT).unwrap().to_write());
        assert!(!shape.spec(fields::STATE).unwrap().to_write());
    }

    #[test]
    fn derived_shape_keeps_ancestor_order_first() {
        let parent = ShapeBuilder::base()
            .field(FieldSpec::literal("age", ValueType::F32, Value::F32(0.0)).unwrap())
            .build();
        let child = ShapeBuilder::derive_from(&parent)
            .field(FieldSpec::literal("mass", ValueType::F64, Value::F64(1.0)).unwrap())
            .build();
        let names: Vec<&str> = child.iter().map(|s| s.name()).collect();
        let age_pos = names.iter().position(|n| *n == "age").unwrap();
        let mass_pos = names.iter().position(|n| *n == "mass").unwrap();
        assert!(age_pos < mass_pos);
    }

    #[test]
    fn repeated_name_overrides_in_place() {
        let parent = ShapeBuilder::base()
            .field(FieldSpec::literal("age", ValueType::F32, Value::F32(0.0)).unwrap())
            .build();
        let child = ShapeBuilder::derive_from(&parent)
            .field(FieldSpec::literal("age", ValueType::F64, Value::F64(0.0)).unwrap())
            .build();
        assert_eq!(child.len(), parent.len());
        assert_eq!(
            child.spec("age").unwrap().value_type(),
            ValueType::F64
        );
    }

    #[test]
    fn layout_order_puts_wide_fields_first() {
        let shape = ShapeBuilder::base().extend_for_kernels().build();
        let mut seen_narrow = false;
        for spec in shape.iter_layout_order() {
            if spec.value_type().is_wide() {
                assert!(!seen_narrow, "wide field after a narrow one");
            } else {
                seen_narrow = true;
            }
        }
    }

    #[test]
    fn cache_key_is_stable_and_type_sensitive() {
        let a = ShapeBuilder::base().build();
        let b = ShapeBuilder::base().build();
        assert_eq!(a.cache_key(), b.cache_key());

        let widened = ShapeBuilder::base()
            .field(FieldSpec::literal("lon", ValueType::F64, Value::F64(0.0)).unwrap())
            .build();
        assert_ne!(a.cache_key(), widened.cache_key());
    }

    #[test]
    fn reserved_depth_name_cannot_enter_a_shape() {
        let err = FieldSpec::literal("z", ValueType::F32, Value::F32(0.0)).unwrap_err();
        assert!(matches!(err, ConfigError::ReservedName { .. }));
    }
}
