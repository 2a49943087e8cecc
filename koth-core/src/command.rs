//! External command execution
//!
//! Commands are full shell command lines handed to `sh -c`, so pipes,
//! redirection and other metacharacters behave as they would in a terminal.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// Exit code reported when the command produced no exit status of its own
pub const ABNORMAL_EXIT_CODE: i32 = 1;

/// Outcome of running an external command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    /// A command succeeded iff it wrote nothing to stderr and exited with 0.
    pub fn succeeded(&self) -> bool {
        self.stderr.is_empty() && self.exit_code == 0
    }

    fn from_output(stdout: &[u8], stderr: &[u8], status: ExitStatus) -> Self {
        let stdout = String::from_utf8_lossy(stdout).into_owned();
        let stderr = String::from_utf8_lossy(stderr).into_owned();

        match status.code() {
            Some(exit_code) => Self {
                stdout,
                stderr,
                exit_code,
            },
            None => Self::abnormal(stdout, stderr, describe_abnormal_exit(status)),
        }
    }

    /// Result for a command that never produced an exit status.
    ///
    /// Stderr keeps whatever the command wrote; only when it is empty does the
    /// description take its place, so the failure is never silent.
    fn abnormal(stdout: String, stderr: String, description: String) -> Self {
        Self {
            stdout,
            stderr: if stderr.is_empty() { description } else { stderr },
            exit_code: ABNORMAL_EXIT_CODE,
        }
    }
}

#[cfg(unix)]
fn describe_abnormal_exit(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;

    match status.signal() {
        Some(signal) => format!("process terminated by signal {}", signal),
        None => format!("process terminated abnormally: {}", status),
    }
}

#[cfg(not(unix))]
fn describe_abnormal_exit(status: ExitStatus) -> String {
    format!("process terminated abnormally: {}", status)
}

/// Executes a command line and reports its outcome
///
/// Handlers only see this trait, so the execution strategy can change
/// without touching them.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> CommandResult;
}

/// Runs commands through a POSIX shell
#[derive(Debug, Clone)]
pub struct ShellCommandRunner {
    shell: String,
    timeout: Option<Duration>,
}

impl Default for ShellCommandRunner {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            timeout: None,
        }
    }
}

impl ShellCommandRunner {
    /// Runner without a time limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill commands that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use a different shell binary; it must accept `-c <command>`
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn execute(&self, command: &str) -> CommandResult {
        let mut child = Command::new(&self.shell);
        child
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.output()).await {
                Ok(output) => output,
                Err(_) => {
                    return CommandResult::abnormal(
                        String::new(),
                        String::new(),
                        format!("command timed out after {:?}", limit),
                    );
                }
            },
            None => child.output().await,
        };

        match output {
            Ok(output) => CommandResult::from_output(&output.stdout, &output.stderr, output.status),
            Err(e) => CommandResult::abnormal(String::new(), String::new(), e.to_string()),
        }
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(&self, command: &str) -> CommandResult {
        let started = Instant::now();
        let result = self.execute(command).await;

        debug!(
            command = command,
            exit_code = result.exit_code,
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        if !result.succeeded() {
            warn!(
                command = command,
                exit_code = result.exit_code,
                stderr = %result.stderr.trim_end(),
                "Command reported failure"
            );
        }

        result
    }
}
