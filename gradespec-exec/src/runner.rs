use std::io::{Read, Write};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitid, Id, WaitPidFlag};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};

use crate::ProcessCommand;

/// Appended to a captured stream that exceeded the output limit.
pub const TRUNCATION_MARKER: &str = "\n[output truncated]\n";

/// Default limit on the captured bytes of each stream.
pub const DEFAULT_OUTPUT_LIMIT: usize = 1024 * 1024;

/// How a process that ran to completion terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessStatus {
    /// The process exited with this exit code.
    Exited(i32),
    /// The process was killed by the signal with this number and name.
    Signaled(i32, String),
}

impl ProcessStatus {
    fn from_exit_status(status: ExitStatus) -> ProcessStatus {
        if let Some(code) = status.code() {
            return ProcessStatus::Exited(code);
        }
        let signal = status.signal().unwrap_or_default();
        let name = Signal::try_from(signal)
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|_| format!("signal {}", signal));
        ProcessStatus::Signaled(signal, name)
    }
}

/// The outcome of running a [`ProcessCommand`] with a deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessResult {
    /// The process terminated on its own before the deadline.
    Completed {
        status: ProcessStatus,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        elapsed: Duration,
    },
    /// The deadline expired and the process group was killed.
    TimedOut {
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        elapsed: Duration,
    },
    /// The process could not be started at all.
    FailedToStart { error: String },
}

impl ProcessResult {
    /// Whether the process exited with code zero.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ProcessResult::Completed {
                status: ProcessStatus::Exited(0),
                ..
            }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProcessResult::TimedOut { .. })
    }

    pub fn status(&self) -> Option<&ProcessStatus> {
        match self {
            ProcessResult::Completed { status, .. } => Some(status),
            _ => None,
        }
    }

    pub fn stdout(&self) -> &[u8] {
        match self {
            ProcessResult::Completed { stdout, .. } | ProcessResult::TimedOut { stdout, .. } => {
                stdout
            }
            ProcessResult::FailedToStart { .. } => &[],
        }
    }

    pub fn stderr(&self) -> &[u8] {
        match self {
            ProcessResult::Completed { stderr, .. } | ProcessResult::TimedOut { stderr, .. } => {
                stderr
            }
            ProcessResult::FailedToStart { .. } => &[],
        }
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(self.stdout()).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(self.stderr()).into_owned()
    }

    /// The wall time spent by the process, zero if it never started.
    pub fn elapsed(&self) -> Duration {
        match self {
            ProcessResult::Completed { elapsed, .. } | ProcessResult::TimedOut { elapsed, .. } => {
                *elapsed
            }
            ProcessResult::FailedToStart { .. } => Duration::ZERO,
        }
    }
}

/// Something able to spawn a process, wait for it up to a deadline and collect its outputs.
pub trait ProcessRunner: Send + Sync {
    /// Run the command, killing it (and everything it spawned) after `deadline`.
    fn run(&self, command: &ProcessCommand, deadline: Duration) -> ProcessResult;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for Arc<R> {
    fn run(&self, command: &ProcessCommand, deadline: Duration) -> ProcessResult {
        self.as_ref().run(command, deadline)
    }
}

/// Runs the processes on the local machine, each in its own process group.
#[derive(Debug, Clone)]
pub struct LocalProcessRunner {
    /// Maximum number of bytes kept for each of stdout and stderr.
    pub output_limit: usize,
}

impl Default for LocalProcessRunner {
    fn default() -> Self {
        LocalProcessRunner {
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }
}

impl LocalProcessRunner {
    pub fn new(output_limit: usize) -> LocalProcessRunner {
        LocalProcessRunner { output_limit }
    }
}

/// Read the whole stream, keeping at most `limit` bytes.
fn drain<R: Read + Send + 'static>(mut stream: R, limit: usize) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut kept = Vec::new();
        let mut truncated = false;
        let mut buf = [0u8; 8192];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let room = limit.saturating_sub(kept.len());
                    if n > room {
                        truncated = true;
                    }
                    kept.extend_from_slice(&buf[..n.min(room)]);
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Failed to read the output of a process: {}", e);
                    break;
                }
            }
        }
        if truncated {
            kept.extend_from_slice(TRUNCATION_MARKER.as_bytes());
        }
        kept
    })
}

/// Block until the process exits, without reaping it.
fn wait_exit(pid: u32) -> nix::Result<()> {
    loop {
        let id = Id::Pid(Pid::from_raw(pid as i32));
        match waitid(id, WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT) {
            Err(Errno::EINTR) => continue,
            result => return result.map(|_| ()),
        }
    }
}

fn kill_group(pid: u32) {
    // ESRCH just means that every process of the group is already gone.
    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        if e != Errno::ESRCH {
            warn!("Failed to kill process group {}: {}", pid, e);
        }
    }
}

impl ProcessRunner for LocalProcessRunner {
    fn run(&self, command: &ProcessCommand, deadline: Duration) -> ProcessResult {
        let program = match command.program.resolve() {
            Ok(program) => program,
            Err(e) => {
                return ProcessResult::FailedToStart {
                    error: format!("{:#}", e),
                }
            }
        };
        trace!("Running {}: {}", command.description, command.command_line());

        let mut cmd = Command::new(&program);
        cmd.args(&command.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);
        if command.stdin.is_some() {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }
        if let Some(cwd) = &command.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        let start = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ProcessResult::FailedToStart {
                    error: format!("Failed to start {}: {}", program.display(), e),
                }
            }
        };
        let pid = child.id();

        let stdin_writer = match (child.stdin.take(), command.stdin.clone()) {
            (Some(mut stdin), Some(data)) => Some(std::thread::spawn(move || {
                // The process may exit without reading everything.
                let _ = stdin.write_all(&data);
            })),
            _ => None,
        };
        let stdout_reader = child.stdout.take().map(|s| drain(s, self.output_limit));
        let stderr_reader = child.stderr.take().map(|s| drain(s, self.output_limit));

        let (sender, receiver) = crossbeam_channel::bounded(1);
        let waiter = std::thread::Builder::new()
            .name(format!("Waiter for {}", pid))
            .spawn(move || {
                let _ = sender.send(wait_exit(pid));
            });
        if let Err(e) = waiter {
            kill_group(pid);
            let _ = child.wait();
            return ProcessResult::FailedToStart {
                error: format!("Failed to spawn the waiter thread: {}", e),
            };
        }

        let timed_out = match receiver.recv_timeout(deadline) {
            Ok(Ok(())) => false,
            Ok(Err(e)) => {
                warn!("Failed to wait for {}: {}", command.description, e);
                false
            }
            Err(RecvTimeoutError::Timeout) => {
                debug!(
                    "{} exceeded the deadline of {:?}, killing it",
                    command.description, deadline
                );
                true
            }
            Err(RecvTimeoutError::Disconnected) => false,
        };
        let elapsed = start.elapsed();
        // The leader is not reaped yet, so the group id cannot belong to anyone else. Leftover
        // processes would keep the pipes open.
        kill_group(pid);
        if timed_out {
            let _ = receiver.recv();
        }
        let status = child.wait();

        if let Some(writer) = stdin_writer {
            let _ = writer.join();
        }
        let stdout = stdout_reader
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        let stderr = stderr_reader
            .and_then(|h| h.join().ok())
            .unwrap_or_default();

        match status {
            _ if timed_out => ProcessResult::TimedOut {
                stdout,
                stderr,
                elapsed,
            },
            Ok(status) => {
                let status = ProcessStatus::from_exit_status(status);
                trace!("{} terminated with {:?}", command.description, status);
                ProcessResult::Completed {
                    status,
                    stdout,
                    stderr,
                    elapsed,
                }
            }
            Err(e) => ProcessResult::FailedToStart {
                error: format!("Failed to wait for {}: {}", program.display(), e),
            },
        }
    }
}

/// A fake runner that don't actually spawn anything and always fails to start.
#[derive(Default, Debug)]
pub struct ErrorProcessRunner;

impl ProcessRunner for ErrorProcessRunner {
    fn run(&self, _command: &ProcessCommand, _deadline: Duration) -> ProcessResult {
        ProcessResult::FailedToStart {
            error: "Nope".to_owned(),
        }
    }
}

/// A fake runner that don't actually spawn anything and always exits with code 0 and no output.
#[derive(Default, Debug)]
pub struct SuccessProcessRunner;

impl ProcessRunner for SuccessProcessRunner {
    fn run(&self, _command: &ProcessCommand, _deadline: Duration) -> ProcessResult {
        ProcessResult::Completed {
            status: ProcessStatus::Exited(0),
            stdout: vec![],
            stderr: vec![],
            elapsed: Duration::ZERO,
        }
    }
}

type FakeResponder = dyn Fn(&ProcessCommand, Duration) -> ProcessResult + Send + Sync;

/// A fake runner that records every command it receives and answers with a closure.
pub struct FakeProcessRunner {
    responder: Box<FakeResponder>,
    commands: Mutex<Vec<ProcessCommand>>,
}

impl FakeProcessRunner {
    pub fn new<F>(responder: F) -> FakeProcessRunner
    where
        F: Fn(&ProcessCommand, Duration) -> ProcessResult + Send + Sync + 'static,
    {
        FakeProcessRunner {
            responder: Box::new(responder),
            commands: Mutex::new(vec![]),
        }
    }

    /// The commands received so far, in order.
    pub fn commands(&self) -> Vec<ProcessCommand> {
        match self.commands.lock() {
            Ok(commands) => commands.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl std::fmt::Debug for FakeProcessRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeProcessRunner")
            .field("commands", &self.commands)
            .finish()
    }
}

impl ProcessRunner for FakeProcessRunner {
    fn run(&self, command: &ProcessCommand, deadline: Duration) -> ProcessResult {
        match self.commands.lock() {
            Ok(mut commands) => commands.push(command.clone()),
            Err(poisoned) => poisoned.into_inner().push(command.clone()),
        }
        (self.responder)(command, deadline)
    }
}
