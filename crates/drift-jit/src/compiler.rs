//! Native compiler invocation.
//!
//! Kernels compile through an external C compiler resolved from the
//! configuration: an explicit override wins, then the MPI wrapper when a
//! distributed runtime is present, then plain `gcc`. Compilation blocks
//! the calling thread until the compiler exits — it is the only
//! suspending operation in the toolkit, and it carries no timeout.

use std::fs::File;
use std::io::Write as _;
use std::path::Path;
use std::process::{Command, Stdio};

use log::debug;

use crate::config::JitConfig;
use crate::error::CompileError;

/// Compiler used when a distributed runtime is present and no override
/// is set.
pub const MPI_COMPILER: &str = "mpicc";

/// Compiler used when nothing else applies.
pub const DEFAULT_COMPILER: &str = "gcc";

fn artifact_error(path: &Path, err: std::io::Error) -> CompileError {
    CompileError::Artifact {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Invokes the configured native compiler to build one shared module.
#[derive(Clone, Debug)]
pub struct KernelCompiler {
    executable: String,
    compile_flags: Vec<String>,
    link_flags: Vec<String>,
}

impl KernelCompiler {
    /// Resolve the compiler and flag set for `config`.
    pub fn new(config: &JitConfig) -> Self {
        let executable = match &config.compiler_override {
            Some(cc) => cc.clone(),
            None if config.distributed => MPI_COMPILER.to_string(),
            None => DEFAULT_COMPILER.to_string(),
        };

        let arch_flag = if cfg!(target_pointer_width = "64") {
            "-m64"
        } else {
            "-m32"
        };
        let mut compile_flags = vec!["-Wall".to_string(), "-fPIC".to_string()];
        if let Some(include_dir) = &config.include_dir {
            compile_flags.push(format!("-I{}", include_dir.display()));
        }
        compile_flags.push("-g".to_string());
        compile_flags.push("-O3".to_string());
        compile_flags.push(arch_flag.to_string());

        let link_flags = vec!["-shared".to_string(), arch_flag.to_string()];

        Self {
            executable,
            compile_flags,
            link_flags,
        }
    }

    /// The resolved compiler executable.
    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// The full argument vector for compiling `src` into `lib`.
    pub fn command_line(&self, src: &Path, lib: &Path) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.compile_flags.len() + self.link_flags.len() + 4);
        argv.push(self.executable.clone());
        argv.extend(self.compile_flags.iter().cloned());
        argv.push("-o".to_string());
        argv.push(lib.display().to_string());
        argv.push(src.display().to_string());
        argv.extend(self.link_flags.iter().cloned());
        argv
    }

    /// Compile `src` into the shared module `lib`, capturing all compiler
    /// output into `log_path`.
    ///
    /// Blocks until the compiler exits.
    ///
    /// # Errors
    ///
    /// [`CompileError::MissingCompiler`] when the executable cannot be
    /// spawned, [`CompileError::Failed`] (carrying the captured log) on a
    /// non-zero exit, [`CompileError::Artifact`] when the log file cannot
    /// be written.
    pub fn compile(&self, src: &Path, lib: &Path, log_path: &Path) -> Result<(), CompileError> {
        let argv = self.command_line(src, lib);
        let rendered = argv.join(" ");

        let mut log_file = File::create(log_path).map_err(|e| artifact_error(log_path, e))?;
        writeln!(log_file, "Compiling: {rendered}").map_err(|e| artifact_error(log_path, e))?;
        let stdout = log_file
            .try_clone()
            .map_err(|e| artifact_error(log_path, e))?;

        debug!("compiling {} -> {}", src.display(), lib.display());
        let status = Command::new(&argv[0])
            .args(&argv[1..])
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(log_file))
            .status()
            .map_err(|e| CompileError::MissingCompiler {
                command: rendered.clone(),
                reason: e.to_string(),
            })?;

        if !status.success() {
            let log = std::fs::read_to_string(log_path).unwrap_or_default();
            return Err(CompileError::Failed {
                command: rendered,
                log,
            });
        }
        debug!("compiled {}", lib.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn override_beats_distributed_beats_default() {
        let base = JitConfig::new(".");
        assert_eq!(KernelCompiler::new(&base).executable(), DEFAULT_COMPILER);

        let distributed = JitConfig::new(".").with_distributed(true);
        assert_eq!(KernelCompiler::new(&distributed).executable(), MPI_COMPILER);

        let forced = JitConfig::new(".")
            .with_distributed(true)
            .with_compiler("icc");
        assert_eq!(KernelCompiler::new(&forced).executable(), "icc");
    }

    #[test]
    fn command_line_has_the_expected_shape() {
        let config = JitConfig::new(".").with_include_dir("/opt/drift/include");
        let compiler = KernelCompiler::new(&config);
        let argv = compiler.command_line(&PathBuf::from("k.c"), &PathBuf::from("k.so"));

        assert_eq!(argv[0], DEFAULT_COMPILER);
        assert!(argv.contains(&"-Wall".to_string()));
        assert!(argv.contains(&"-fPIC".to_string()));
        assert!(argv.contains(&"-I/opt/drift/include".to_string()));
        assert!(argv.contains(&"-shared".to_string()));
        let o_pos = argv.iter().position(|a| a == "-o").unwrap();
        assert_eq!(argv[o_pos + 1], "k.so");
        assert_eq!(argv[o_pos + 2], "k.c");
        // Link args come after the source file.
        assert!(argv.iter().position(|a| a == "-shared").unwrap() > o_pos + 2);
    }

    #[test]
    fn arch_flag_matches_host_pointer_width() {
        let compiler = KernelCompiler::new(&JitConfig::new("."));
        let argv = compiler.command_line(&PathBuf::from("k.c"), &PathBuf::from("k.so"));
        let expected = if cfg!(target_pointer_width = "64") {
            "-m64"
        } else {
            "-m32"
        };
        assert_eq!(argv.iter().filter(|a| *a == expected).count(), 2);
    }
}
