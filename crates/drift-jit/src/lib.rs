//! Compilation, loading, and lifecycle of native advection kernels.
//!
//! Generated kernel source is compiled by an external C compiler into a
//! shared module, loaded into the running process, and handed out as
//! typed symbol handles. The [`LibraryRegistry`] multiplexes libraries by
//! name, deduplicating compile and load work, and tracks live callers so
//! teardown never unloads code something still depends on.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod compiler;
pub mod config;
pub mod error;
pub mod library;
pub mod registry;

pub use compiler::KernelCompiler;
pub use config::JitConfig;
pub use error::{CompileError, LibraryError};
pub use library::{
    BoundSymbol, CType, KernelLibrary, ReturnKind, SymbolSignature, MODULE_EXTENSION,
};
pub use registry::{library_name_for, LibraryRegistry};
