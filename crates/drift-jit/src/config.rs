//! Jit configuration parameters.

use std::env;
use std::path::PathBuf;

/// Environment variable overriding the native compiler executable.
pub const COMPILER_ENV_VAR: &str = "CC";

/// Configuration for kernel compilation and library management.
///
/// Immutable after creation; a [`LibraryRegistry`](crate::LibraryRegistry)
/// clones what it needs at construction.
#[derive(Clone, Debug)]
pub struct JitConfig {
    /// Directory receiving per-library artifacts (source, module, log).
    pub work_dir: PathBuf,
    /// Include directory passed to the compiler with `-I`, typically the
    /// toolkit's C header tree.
    pub include_dir: Option<PathBuf>,
    /// Explicit compiler executable. Takes priority over every other
    /// resolution rule.
    pub compiler_override: Option<String>,
    /// Whether a distributed runtime is driving execution. Selects the
    /// MPI compiler wrapper when no override is set.
    pub distributed: bool,
}

impl JitConfig {
    /// Create a config with no override, no include dir, and no
    /// distributed runtime.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            include_dir: None,
            compiler_override: None,
            distributed: false,
        }
    }

    /// Create a config taking the compiler override from the `CC`
    /// environment variable, when set and non-empty.
    pub fn from_env(work_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::new(work_dir);
        config.compiler_override = env::var(COMPILER_ENV_VAR)
            .ok()
            .filter(|cc| !cc.is_empty());
        config
    }

    /// Set the include directory.
    pub fn with_include_dir(mut self, include_dir: impl Into<PathBuf>) -> Self {
        self.include_dir = Some(include_dir.into());
        self
    }

    /// Set the compiler override.
    pub fn with_compiler(mut self, compiler: impl Into<String>) -> Self {
        self.compiler_override = Some(compiler.into());
        self
    }

    /// Mark a distributed runtime as present.
    pub fn with_distributed(mut self, distributed: bool) -> Self {
        self.distributed = distributed;
        self
    }
}
