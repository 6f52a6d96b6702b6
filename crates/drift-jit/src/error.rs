//! Error types for kernel compilation and library lifecycle.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Errors from invoking the native compiler.
///
/// Every variant carries the full command line; a failed compilation also
/// carries the captured log so the diagnosis never requires re-running
/// the compiler by hand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompileError {
    /// The compiler executable could not be spawned.
    MissingCompiler {
        /// The command line that was attempted.
        command: String,
        /// The spawn failure as reported by the OS.
        reason: String,
    },
    /// The compiler ran and exited non-zero.
    Failed {
        /// The command line that was invoked.
        command: String,
        /// Captured stdout/stderr from the log artifact.
        log: String,
    },
    /// A source or log artifact could not be written or read.
    Artifact {
        /// Path of the artifact.
        path: PathBuf,
        /// The underlying I/O failure.
        reason: String,
    },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCompiler { command, reason } => {
                write!(
                    f,
                    "could not invoke native compiler ({reason}); check the compiler exists: {command}"
                )
            }
            Self::Failed { command, log } => {
                write!(
                    f,
                    "compilation failed\ncommand: {command}\nlog output:\n{log}"
                )
            }
            Self::Artifact { path, reason } => {
                write!(f, "cannot access artifact {}: {reason}", path.display())
            }
        }
    }
}

impl Error for CompileError {}

/// Errors from the library lifecycle.
#[derive(Debug)]
pub enum LibraryError {
    /// Compilation failed; see the chained [`CompileError`].
    Compile(CompileError),
    /// The compiled module could not be loaded into the process.
    Load {
        /// Path of the module that failed to load.
        path: PathBuf,
        /// The loader's diagnostic.
        reason: String,
    },
}

impl fmt::Display for LibraryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile(err) => write!(f, "{err}"),
            Self::Load { path, reason } => {
                write!(f, "failed to load {}: {reason}", path.display())
            }
        }
    }
}

impl Error for LibraryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Compile(err) => Some(err),
            Self::Load { .. } => None,
        }
    }
}

impl From<CompileError> for LibraryError {
    fn from(err: CompileError) -> Self {
        Self::Compile(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_compile_surfaces_command_and_log() {
        let err = CompileError::Failed {
            command: "gcc -Wall -o k.so k.c".to_string(),
            log: "k.c:1: error: expected ';'".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("gcc -Wall -o k.so k.c"));
        assert!(text.contains("expected ';'"));
    }

    #[test]
    fn missing_compiler_surfaces_the_command_line() {
        let err = CompileError::MissingCompiler {
            command: "/no/such/cc -o k.so k.c".to_string(),
            reason: "No such file or directory".to_string(),
        };
        assert!(err.to_string().contains("/no/such/cc -o k.so k.c"));
    }

    #[test]
    fn library_error_chains_its_compile_cause() {
        use std::error::Error as _;
        let err = LibraryError::from(CompileError::Failed {
            command: "cc".to_string(),
            log: String::new(),
        });
        assert!(err.source().is_some());
    }
}
