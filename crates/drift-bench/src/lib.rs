//! Benchmark-only crate; see `benches/`.
//!
//! Shared fixtures for the drift benchmarks.

use std::sync::Arc;

use drift_core::{FieldSpec, InitialValue, ValueType};
use drift_particle::{ParticleShape, ShapeBuilder};

/// A kernel-ready shape with `extra` user fields, alternating wide and
/// narrow types so the layout engine has real reordering work to do.
pub fn shape_with_extras(extra: usize) -> Arc<ParticleShape> {
    let mut builder = ShapeBuilder::base().extend_for_kernels();
    for i in 0..extra {
        let value_type = if i % 2 == 0 {
            ValueType::F64
        } else {
            ValueType::F32
        };
        builder = builder.field(
            FieldSpec::new(format!("user{i}"), value_type, InitialValue::Unset, true)
                .expect("generated field names are not reserved"),
        );
    }
    Arc::new(builder.build())
}
