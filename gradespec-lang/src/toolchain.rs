use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use gradespec_exec::{ProcessCommand, ProgramCommand};

/// The flavour of a C++ build, each with its own extra flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildMode {
    /// Just the base flags.
    Plain,
    /// Base flags plus the warning flags, for the `compile` checks.
    Strict,
    /// Base flags plus the sanitizers, for the `memory_errors` checks.
    Sanitized,
    /// Base flags plus the instrumentation needed by `gcov`.
    Coverage,
}

/// The C++ compiler and the flags used for building the checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toolchain {
    /// The compiler executable, searched in `$PATH`.
    pub cxx: String,
    /// The C++ standard, passed as `-std=<std>`.
    pub std: String,
    /// Flags used by every build.
    pub flags: Vec<String>,
    /// Extra flags of [`BuildMode::Strict`].
    pub warning_flags: Vec<String>,
    /// Extra flags of [`BuildMode::Sanitized`], used both for compiling and linking.
    pub sanitizer_flags: Vec<String>,
    /// Extra flags of [`BuildMode::Coverage`], used both for compiling and linking.
    pub coverage_flags: Vec<String>,
    /// The `gcov` executable, searched in `$PATH`.
    pub gcov: String,
    /// Directory, relative to the working directory, with the assertion header.
    pub harness_dir: PathBuf,
    /// The header with the assertion macros included by the generated drivers.
    pub harness_header: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        let strings = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
        Toolchain {
            cxx: "g++".into(),
            std: "c++17".into(),
            flags: strings(&["-g"]),
            warning_flags: strings(&["-Wall", "-Wextra", "-pedantic"]),
            sanitizer_flags: strings(&["-fsanitize=address,undefined", "-fno-omit-frame-pointer"]),
            coverage_flags: strings(&["--coverage", "-O0"]),
            gcov: "gcov".into(),
            harness_dir: PathBuf::from("support"),
            harness_header: "cs12x_test.h".into(),
        }
    }
}

impl Toolchain {
    fn mode_flags(&self, mode: BuildMode) -> &[String] {
        match mode {
            BuildMode::Plain => &[],
            BuildMode::Strict => &self.warning_flags,
            BuildMode::Sanitized => &self.sanitizer_flags,
            BuildMode::Coverage => &self.coverage_flags,
        }
    }

    /// The include directories for a build started from `workdir`: the working directory itself
    /// (for `#include "<target>"` in the generated drivers) and the harness directory.
    pub fn include_dirs(&self, workdir: &Path) -> Vec<PathBuf> {
        vec![workdir.to_owned(), workdir.join(&self.harness_dir)]
    }

    fn base_command(
        &self,
        description: String,
        mode: BuildMode,
        include_dirs: &[PathBuf],
    ) -> ProcessCommand {
        let mut command = ProcessCommand::new(description, ProgramCommand::system(&self.cxx));
        command
            .arg(format!("-std={}", self.std))
            .args(self.flags.iter().cloned())
            .args(self.mode_flags(mode).iter().cloned());
        for dir in include_dirs {
            command.arg(format!("-I{}", dir.display()));
        }
        command
    }

    /// Compile the sources to object files only, one per source. The objects are written in the
    /// working directory of the command, which the caller sets to the scratch directory.
    pub fn compile_objects(
        &self,
        mode: BuildMode,
        sources: &[PathBuf],
        include_dirs: &[PathBuf],
        scratch: &Path,
    ) -> ProcessCommand {
        let mut command = self.base_command(
            format!("Compilation of {}", join_names(sources)),
            mode,
            include_dirs,
        );
        command.arg("-c");
        for source in sources {
            command.path_arg(source);
        }
        command.cwd(scratch);
        command
    }

    /// Compile and link the inputs (sources or objects) into the `output` executable.
    pub fn build_executable(
        &self,
        mode: BuildMode,
        inputs: &[PathBuf],
        output: &Path,
        include_dirs: &[PathBuf],
        scratch: &Path,
    ) -> ProcessCommand {
        let mut command = self.base_command(
            format!("Build of {}", output.display()),
            mode,
            include_dirs,
        );
        command.arg("-o").path_arg(output);
        for input in inputs {
            command.path_arg(input);
        }
        command.cwd(scratch);
        command
    }

    /// Run `gcov` on `source` without writing `.gcov` files, looking for the coverage data inside
    /// `object_dir`.
    pub fn gcov_command(&self, source: &Path, object_dir: &Path) -> ProcessCommand {
        let mut command = ProcessCommand::new(
            format!("Coverage of {}", source.display()),
            ProgramCommand::system(&self.gcov),
        );
        command
            .arg("-n")
            .arg("-o")
            .path_arg(object_dir)
            .path_arg(source)
            .cwd(object_dir);
        command
    }
}

/// The object file produced by `-c` for that source, relative to the build directory.
pub fn object_name(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".into());
    PathBuf::from(format!("{}.o", stem))
}

fn join_names(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join(", ")
}
