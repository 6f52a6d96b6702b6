//! One loaded kernel library and its symbol handles.

#![allow(unsafe_code)]

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};

use indexmap::IndexMap;
use libloading::Library;
use log::{debug, warn};
use smallvec::SmallVec;

use crate::compiler::KernelCompiler;
use crate::config::JitConfig;
use crate::error::{CompileError, LibraryError};

/// Platform extension of compiled kernel modules.
#[cfg(windows)]
pub const MODULE_EXTENSION: &str = "dll";
/// Platform extension of compiled kernel modules.
#[cfg(not(windows))]
pub const MODULE_EXTENSION: &str = "so";

/// C scalar kinds appearing in kernel signatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CType {
    /// `int`.
    I32,
    /// `long long`.
    I64,
    /// `float`.
    F32,
    /// `double`.
    F64,
    /// Any pointer argument.
    Ptr,
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I32 => "int32",
            Self::I64 => "int64",
            Self::F32 => "float32",
            Self::F64 => "float64",
            Self::Ptr => "ptr",
        };
        write!(f, "{name}")
    }
}

/// Return kind of a kernel entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnKind {
    /// `void`.
    Void,
    /// A scalar return.
    Value(CType),
}

/// Declared signature of one kernel entry point.
#[derive(Clone, Debug)]
pub struct SymbolSignature {
    /// Exported symbol name.
    pub name: String,
    /// Declared return kind.
    pub ret: ReturnKind,
    /// Declared argument kinds, in order.
    pub args: SmallVec<[CType; 8]>,
}

impl SymbolSignature {
    /// Declare a signature.
    pub fn new(
        name: impl Into<String>,
        ret: ReturnKind,
        args: impl IntoIterator<Item = CType>,
    ) -> Self {
        Self {
            name: name.into(),
            ret,
            args: args.into_iter().collect(),
        }
    }
}

/// A resolved kernel entry point: declared signature plus raw address.
///
/// The address stays valid only while the owning library remains loaded;
/// unloading while handles are outstanding is the documented hazard of
/// the lifecycle, not prevented here. Invoking the symbol is the
/// caller's `unsafe` cast to the matching `extern "C"` function type.
pub struct BoundSymbol {
    signature: SymbolSignature,
    address: *const (),
}

impl BoundSymbol {
    /// The declared signature.
    pub fn signature(&self) -> &SymbolSignature {
        &self.signature
    }

    /// Raw address of the entry point.
    pub fn address(&self) -> *const () {
        self.address
    }
}

impl fmt::Debug for BoundSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundSymbol")
            .field("name", &self.signature.name)
            .field("address", &self.address)
            .finish()
    }
}

#[derive(Debug, Default)]
struct LibState {
    compiled: bool,
    handle: Option<Library>,
}

/// One natively compiled kernel module and its lifecycle state.
///
/// Walks unbuilt -> compiled -> loaded, back to compiled on
/// [`unload`](KernelLibrary::unload). Callers announce themselves with
/// [`register`](KernelLibrary::register)/[`deregister`](KernelLibrary::deregister);
/// the reference count is plain arithmetic and goes negative if misused —
/// that is a caller error and is deliberately not corrected or reported
/// here.
#[derive(Debug)]
pub struct KernelLibrary {
    name: String,
    src_path: PathBuf,
    lib_path: PathBuf,
    log_path: PathBuf,
    compiler: KernelCompiler,
    state: Mutex<LibState>,
    refs: Mutex<i64>,
    unreferenced: Condvar,
}

impl KernelLibrary {
    /// Create an unbuilt library named `name` with artifacts under the
    /// config's work directory.
    pub fn new(name: &str, config: &JitConfig) -> Self {
        let base = config.work_dir.join(name);
        Self {
            name: name.to_string(),
            src_path: base.with_extension("c"),
            lib_path: base.with_extension(MODULE_EXTENSION),
            log_path: base.with_extension("log"),
            compiler: KernelCompiler::new(config),
            state: Mutex::new(LibState::default()),
            refs: Mutex::new(0),
            unreferenced: Condvar::new(),
        }
    }

    /// The library's registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the kernel source artifact.
    pub fn src_path(&self) -> &Path {
        &self.src_path
    }

    /// Path of the compiled module artifact.
    pub fn lib_path(&self) -> &Path {
        &self.lib_path
    }

    /// Path of the compile log artifact.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Persist generated kernel source as this library's source artifact.
    ///
    /// # Errors
    ///
    /// [`CompileError::Artifact`] when the work directory or source file
    /// cannot be written.
    pub fn write_source(&self, source: &str) -> Result<(), CompileError> {
        if let Some(parent) = self.src_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CompileError::Artifact {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
        std::fs::write(&self.src_path, source).map_err(|e| CompileError::Artifact {
            path: self.src_path.clone(),
            reason: e.to_string(),
        })
    }

    /// Whether the module artifact has been built.
    pub fn is_compiled(&self) -> bool {
        self.state.lock().unwrap().compiled
    }

    /// Whether the module is currently loaded into the process.
    pub fn is_loaded(&self) -> bool {
        self.state.lock().unwrap().handle.is_some()
    }

    /// Compile if unbuilt, then load if not loaded. A no-op when already
    /// loaded.
    ///
    /// An already-compiled library is never recompiled, even if the
    /// source artifact has changed since: names are derived from shape
    /// cache keys, so a stale entry must be evicted, not rebuilt in
    /// place.
    ///
    /// # Errors
    ///
    /// [`LibraryError::Compile`] when the compiler fails (carrying its
    /// command line and captured log), [`LibraryError::Load`] when the
    /// built module cannot be loaded.
    pub fn ensure_ready(&self) -> Result<(), LibraryError> {
        let mut state = self.state.lock().unwrap();
        if !state.compiled {
            self.compiler
                .compile(&self.src_path, &self.lib_path, &self.log_path)?;
            state.compiled = true;
        }
        if state.handle.is_none() {
            // SAFETY: loading runs the module's initializers. Kernel
            // modules are compiled from generated C with no static
            // constructors; the path is this library's own artifact.
            let handle = unsafe { Library::new(&self.lib_path) }.map_err(|e| {
                LibraryError::Load {
                    path: self.lib_path.clone(),
                    reason: e.to_string(),
                }
            })?;
            state.handle = Some(handle);
            debug!("loaded kernel library '{}'", self.name);
        }
        Ok(())
    }

    /// Resolve kernel entry points against the loaded module.
    ///
    /// Lenient by design: a signature with an empty name, or a symbol the
    /// module does not export, is silently omitted from the result
    /// rather than failing the batch. Returns an empty table when the
    /// library is not loaded.
    pub fn bind_symbols(&self, signatures: &[SymbolSignature]) -> IndexMap<String, BoundSymbol> {
        let state = self.state.lock().unwrap();
        let mut bound = IndexMap::new();
        let Some(handle) = &state.handle else {
            return bound;
        };
        for signature in signatures {
            if signature.name.is_empty() {
                continue;
            }
            // SAFETY: the symbol is only transported as a raw address;
            // interpreting it as a callable is the caller's unsafe step,
            // checked against the declared signature.
            let address = match unsafe {
                handle.get::<unsafe extern "C" fn()>(signature.name.as_bytes())
            } {
                Ok(symbol) => *symbol as *const (),
                Err(_) => continue,
            };
            bound.insert(
                signature.name.clone(),
                BoundSymbol {
                    signature: signature.clone(),
                    address,
                },
            );
        }
        bound
    }

    /// Announce a live caller.
    pub fn register(&self) {
        *self.refs.lock().unwrap() += 1;
    }

    /// Retract a live caller. Signals teardown when the count reaches
    /// zero.
    pub fn deregister(&self) {
        let mut refs = self.refs.lock().unwrap();
        *refs -= 1;
        if *refs <= 0 {
            self.unreferenced.notify_all();
        }
    }

    /// The current live-caller count.
    pub fn ref_count(&self) -> i64 {
        *self.refs.lock().unwrap()
    }

    /// Block until the live-caller count is zero or below.
    ///
    /// Uncancellable; a caller that forgot to
    /// [`deregister`](KernelLibrary::deregister) blocks this forever.
    pub fn wait_until_unreferenced(&self) {
        let mut refs = self.refs.lock().unwrap();
        while *refs > 0 {
            refs = self.unreferenced.wait(refs).unwrap();
        }
    }

    /// Release the native handle. Tolerates a never-loaded library.
    ///
    /// Permitted even while callers are registered; outstanding
    /// [`BoundSymbol`] addresses dangle afterwards. Teardown is the only
    /// path that waits for the reference count first.
    pub fn unload(&self) {
        let mut state = self.state.lock().unwrap();
        if state.handle.take().is_some() {
            debug!("unloaded kernel library '{}'", self.name);
        }
    }

    /// Remove the compiled module and log artifacts. The source artifact
    /// is kept for diagnosis.
    pub fn cleanup_artifacts(&self) {
        for path in [&self.lib_path, &self.log_path] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!("could not remove artifact {}: {e}", path.display());
                }
            }
        }
    }
}
