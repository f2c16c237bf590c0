//! Centralized command execution with consistent error handling.
//!
//! Every external tool goes through [`Cmd`]. Standard output and standard
//! error are merged, streamed line-by-line to `tracing` (target
//! `apkbuild::tool`) and captured so a failure can report what the tool said.
//! A command can be bounded by a timeout and interrupted through a
//! [`CancelToken`]; either way the child is killed.

use std::ffi::{OsStr, OsString};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use wait_timeout::ChildExt;

/// How often the output loop wakes up to check deadlines and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Placeholder printed instead of secret arguments.
const REDACTED: &str = "****";

/// Failure of an external command.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The program could not be started.
    #[error("failed to execute '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Reading the program's output failed.
    #[error("failed to read output of '{command}': {source}")]
    Stream {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The program ran to completion with a failure status.
    #[error("'{command}' exited with {}{}", exit_code(*.code), output_suffix(.output))]
    Exit {
        command: String,
        code: Option<i32>,
        output: String,
    },

    /// The program exceeded its time budget and was killed.
    #[error("'{command}' timed out after {timeout:?}{}", output_suffix(.output))]
    TimedOut {
        command: String,
        timeout: Duration,
        output: String,
    },

    /// The program was killed because the build was cancelled.
    #[error("'{command}' was cancelled{}", output_suffix(.output))]
    Cancelled { command: String, output: String },
}

impl ProcessError {
    /// Command line that failed, secrets redacted.
    pub fn command_line(&self) -> &str {
        match self {
            Self::Launch { command, .. }
            | Self::Stream { command, .. }
            | Self::Exit { command, .. }
            | Self::TimedOut { command, .. }
            | Self::Cancelled { command, .. } => command,
        }
    }

    /// Output captured before the failure, if the program got that far.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Exit { output, .. }
            | Self::TimedOut { output, .. }
            | Self::Cancelled { output, .. } => Some(output),
            Self::Launch { .. } | Self::Stream { .. } => None,
        }
    }
}

fn exit_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "termination by signal".to_string(),
    }
}

fn output_suffix(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(":\n{}", trimmed)
    }
}

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit status of the command.
    pub status: ExitStatus,
    /// Merged stdout and stderr, one line per tool line.
    pub output: String,
}

impl CommandResult {
    /// Returns true if the command exited successfully.
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Shared flag used to abort running commands.
///
/// Clones observe the same flag; cancelling any clone cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Running commands are killed at their next poll.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
struct Arg {
    value: OsString,
    secret: bool,
}

/// Builder for configuring command execution.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: PathBuf,
    args: Vec<Arg>,
    current_dir: Option<PathBuf>,
    timeout: Option<Duration>,
    cancel: Option<CancelToken>,
}

enum Interrupt {
    TimedOut(Duration),
    Cancelled,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: PathBuf::from(program.as_ref()),
            args: Vec::new(),
            current_dir: None,
            timeout: None,
            cancel: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(Arg {
            value: arg.as_ref().to_os_string(),
            secret: false,
        });
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Add a path as an argument.
    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    /// Add an argument that must never appear in logs or errors.
    pub fn secret_arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(Arg {
            value: arg.as_ref().to_os_string(),
            secret: true,
        });
        self
    }

    /// Set the working directory.
    pub fn dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// Kill the command if it runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Kill the command once `token` is cancelled.
    pub fn cancel_token(mut self, token: &CancelToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments in order, secrets included.
    pub fn arg_values(&self) -> impl Iterator<Item = &OsStr> {
        self.args.iter().map(|a| a.value.as_os_str())
    }

    /// Human-readable command line with secret arguments redacted.
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        for arg in &self.args {
            if arg.secret {
                parts.push(REDACTED.to_string());
            } else {
                parts.push(arg.value.to_string_lossy().into_owned());
            }
        }
        parts.join(" ")
    }

    /// Run the command, streaming merged output, and wait for it to exit.
    pub fn run(self) -> Result<CommandResult, ProcessError> {
        let command_line = self.command_line();
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(ProcessError::Cancelled {
                command: command_line,
                output: String::new(),
            });
        }
        tracing::info!("Running: {}", command_line);

        let mut cmd = Command::new(&self.program);
        cmd.args(self.args.iter().map(|a| &a.value));
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| ProcessError::Launch {
            command: command_line.clone(),
            source,
        })?;

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, tx.clone()));
        }
        drop(tx);

        let started = Instant::now();
        let mut output = String::new();
        let mut stream_error = None;
        let mut interrupt = None;

        loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(line)) => {
                    tracing::info!(target: "apkbuild::tool", "{}", line);
                    output.push_str(&line);
                    output.push('\n');
                }
                Ok(Err(err)) => {
                    if stream_error.is_none() {
                        stream_error = Some(err);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if let Some(reason) = self.interrupted(started) {
                kill(&mut child);
                interrupt = Some(reason);
                break;
            }
        }

        if let Some(reason) = interrupt {
            // Readers may still hold pipes inherited by grandchildren; leave them.
            let _ = child.wait();
            return Err(match reason {
                Interrupt::TimedOut(timeout) => ProcessError::TimedOut {
                    command: command_line,
                    timeout,
                    output,
                },
                Interrupt::Cancelled => ProcessError::Cancelled {
                    command: command_line,
                    output,
                },
            });
        }

        for reader in readers {
            let _ = reader.join();
        }

        let status = self.wait(&mut child, started, &command_line, &output)?;

        if let Some(source) = stream_error {
            return Err(ProcessError::Stream {
                command: command_line,
                source,
            });
        }

        let result = CommandResult { status, output };

        if !result.success() {
            return Err(ProcessError::Exit {
                command: command_line,
                code: result.status.code(),
                output: result.output,
            });
        }

        Ok(result)
    }

    fn interrupted(&self, started: Instant) -> Option<Interrupt> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Some(Interrupt::Cancelled);
        }
        match self.timeout {
            Some(timeout) if started.elapsed() >= timeout => Some(Interrupt::TimedOut(timeout)),
            _ => None,
        }
    }

    // Output is drained, but the process may not have exited yet.
    fn wait(
        &self,
        child: &mut Child,
        started: Instant,
        command_line: &str,
        output: &str,
    ) -> Result<ExitStatus, ProcessError> {
        let waited = match self.timeout {
            Some(timeout) => {
                let remaining = timeout.saturating_sub(started.elapsed());
                child.wait_timeout(remaining)
            }
            None => child.wait().map(Some),
        };

        match waited {
            Ok(Some(status)) => Ok(status),
            Ok(None) => {
                kill(child);
                let _ = child.wait();
                Err(ProcessError::TimedOut {
                    command: command_line.to_string(),
                    timeout: self.timeout.unwrap_or_default(),
                    output: output.to_string(),
                })
            }
            Err(source) => Err(ProcessError::Stream {
                command: command_line.to_string(),
                source,
            }),
        }
    }
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::debug!("Failed to kill child {}: {}", child.id(), e);
    }
}

fn spawn_reader<R>(source: R, tx: Sender<io::Result<String>>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(source);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(|c| c == '\n' || c == '\r')
                        .to_string();
                    if tx.send(Ok(line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    })
}

// =============================================================================
// Tests
// =============================================================================
