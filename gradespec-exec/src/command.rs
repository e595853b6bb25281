use std::path::{Path, PathBuf};

use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};

/// Program of a [`ProcessCommand`](struct.ProcessCommand.html) to execute.
///
/// There is a distinction between a `System` command, which has to be searched in the `PATH`
/// env var, and a `Local` command, which is a path to an executable (e.g. a freshly compiled
/// binary inside the scratch space).
///
/// ```
/// use gradespec_exec::ProgramCommand;
///
/// let sys_cmd = ProgramCommand::System("g++".into()); // looking at $PATH
/// let local_cmd = ProgramCommand::Local("/tmp/scratch/unit_test".into());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProgramCommand {
    /// A system command, searched in `$PATH` if it's not absolute.
    System(PathBuf),
    /// A path to an executable, not to be searched in the `$PATH`.
    Local(PathBuf),
}

impl ProgramCommand {
    /// Make a new `ProgramCommand::System`.
    pub fn system<P: Into<PathBuf>>(path: P) -> ProgramCommand {
        ProgramCommand::System(path.into())
    }

    /// Make a new `ProgramCommand::Local`.
    pub fn local<P: Into<PathBuf>>(path: P) -> ProgramCommand {
        ProgramCommand::Local(path.into())
    }

    /// Find the actual executable to spawn.
    pub fn resolve(&self) -> Result<PathBuf, Error> {
        match self {
            ProgramCommand::System(cmd) => which::which(cmd)
                .with_context(|| format!("Executable {:?} not found", cmd)),
            ProgramCommand::Local(cmd) => Ok(cmd.clone()),
        }
    }
}

impl std::fmt::Display for ProgramCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgramCommand::System(cmd) | ProgramCommand::Local(cmd) => {
                write!(f, "{}", cmd.display())
            }
        }
    }
}

/// An external process to run with a deadline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessCommand {
    /// A textual description of the process, used only for the logs.
    pub description: String,
    /// The program to run.
    pub program: ProgramCommand,
    /// The arguments to pass to the program.
    pub args: Vec<String>,
    /// The working directory, if `None` the one of the grader is used.
    pub cwd: Option<PathBuf>,
    /// The content to feed to the standard input. Without it the standard input is `/dev/null`.
    pub stdin: Option<Vec<u8>>,
    /// Additional environment variables.
    pub env: Vec<(String, String)>,
}

impl ProcessCommand {
    /// Make a new command without arguments.
    pub fn new<S: Into<String>>(description: S, program: ProgramCommand) -> ProcessCommand {
        ProcessCommand {
            description: description.into(),
            program,
            args: vec![],
            cwd: None,
            stdin: None,
            env: vec![],
        }
    }

    /// Append an argument.
    pub fn arg<S: Into<String>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Append some arguments.
    pub fn args<S: Into<String>, I: IntoIterator<Item = S>>(&mut self, args: I) -> &mut Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a path as an argument.
    pub fn path_arg<P: AsRef<Path>>(&mut self, path: P) -> &mut Self {
        self.args.push(path.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Set the working directory.
    pub fn cwd<P: Into<PathBuf>>(&mut self, cwd: P) -> &mut Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the content of the standard input.
    pub fn stdin<B: Into<Vec<u8>>>(&mut self, stdin: B) -> &mut Self {
        self.stdin = Some(stdin.into());
        self
    }

    /// Add an environment variable.
    pub fn env<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// The command line, for logging and error messages.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
