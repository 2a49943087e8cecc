//! Owner lookup for the status endpoint

use crate::command::CommandRunner;
use crate::error::{AgentError, AgentResult};
use std::path::{Path, PathBuf};

/// Where the current owner of the host is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerSource {
    /// Run a command; its stdout, untrimmed, is the identifier
    Command(String),
    /// Read a file; its contents, trimmed, are the identifier
    File(PathBuf),
}

impl OwnerSource {
    /// The command wins whenever it is non-empty.
    pub fn resolve(owner_cmd: &str, file: impl Into<PathBuf>) -> Self {
        if owner_cmd.is_empty() {
            OwnerSource::File(file.into())
        } else {
            OwnerSource::Command(owner_cmd.to_string())
        }
    }

    /// Determine the current owner.
    ///
    /// A failing command or an unreadable file is reported to the caller;
    /// it never ends the process.
    pub async fn identify(&self, runner: &dyn CommandRunner) -> AgentResult<String> {
        match self {
            OwnerSource::Command(command) => {
                let result = runner.run(command).await;
                if result.succeeded() {
                    Ok(result.stdout)
                } else {
                    Err(AgentError::CommandFailed {
                        command: command.clone(),
                        result,
                    })
                }
            }
            OwnerSource::File(path) => read_owner_file(path).await,
        }
    }
}

async fn read_owner_file(path: &Path) -> AgentResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| AgentError::OwnerFile {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(String::from_utf8_lossy(&bytes).trim().to_string())
}
