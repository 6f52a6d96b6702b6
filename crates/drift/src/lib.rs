//! Drift: low-level machinery for Lagrangian particle simulation.
//!
//! This is the top-level facade crate re-exporting the public API of the
//! drift sub-crates. For most users, adding `drift` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use drift::prelude::*;
//! use std::sync::Arc;
//!
//! // Declare a particle class: the built-in attributes plus a mass.
//! let shape = Arc::new(
//!     ShapeBuilder::base()
//!         .field(FieldSpec::literal("mass", ValueType::F64, Value::F64(1.0)).unwrap())
//!         .build(),
//! );
//!
//! // The packed layout kernels are generated against.
//! let layout = RecordLayout::compute(&shape).unwrap();
//! assert_eq!(layout.size_bytes() % 8, 0);
//!
//! // Mint a particle in packed storage.
//! let ledger = IdLedger::new();
//! let mut pool = IdPool::new();
//! let mut particle = ParticleBuilder::new(shape, pool.next())
//!     .lon(4.5)
//!     .lat(52.0)
//!     .time(0.0)
//!     .packed()
//!     .build(&ledger)
//!     .unwrap();
//! assert!(particle.record_ptr().is_some());
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `drift-core` | Value model, ids, status codes, trait seams |
//! | [`particle`] | `drift-particle` | Shapes, record layouts, storage, the entity |
//! | [`jit`] | `drift-jit` | Kernel compilation, loading, registry |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Value model, identifiers, status codes, and trait seams (`drift-core`).
pub mod types {
    pub use drift_core::*;
}

/// Shapes, record layouts, storage surfaces, and the particle entity
/// (`drift-particle`).
pub mod particle {
    pub use drift_particle::*;
}

/// Kernel compilation, loading, and lifecycle (`drift-jit`).
pub mod jit {
    pub use drift_jit::*;
}

/// The types most call sites need.
pub mod prelude {
    pub use drift_core::{
        ConfigError, FieldSpec, IdLedger, IdPool, InitialValue, ParticleId, SampledField,
        SpatialIdGrid, StatusCode, Value, ValueType,
    };
    pub use drift_jit::{
        library_name_for, JitConfig, KernelLibrary, LibraryError, LibraryRegistry,
        SymbolSignature,
    };
    pub use drift_particle::{
        Particle, ParticleBuilder, ParticleShape, RecordLayout, ShapeBuilder,
    };
}
