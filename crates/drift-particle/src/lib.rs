//! Record layout engine, storage surfaces, and the particle entity.
//!
//! A [`ParticleShape`] is an ordered, inheritance-merged set of field
//! declarations. [`RecordLayout`] computes the binary layout natively
//! compiled kernels consume; [`ParticleStore`] offers the interpreted and
//! packed access surfaces over the same logical fields; [`Particle`]
//! composes a shape with an identity. The packed record is a raw-pointer
//! surface for natively compiled kernels, so its module carries the
//! crate's only `unsafe` code (two byte-view casts, each with a
//! `SAFETY` comment).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod layout;
pub mod particle;
pub mod shape;
pub mod storage;

pub use layout::{FieldSlot, RecordLayout, PAD_FIELD_NAME};
pub use particle::{Particle, ParticleBuilder};
pub use shape::{fields, ParticleShape, ShapeBuilder};
pub use storage::{InterpretedStore, PackedRecord, ParticleStore};
