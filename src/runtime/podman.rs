use super::{Engine, EngineCommand, EngineError, EngineOutput};
use async_trait::async_trait;
use log::{debug, warn};
use std::process::Stdio;
use tokio::process::Command;

/// Builds engine invocations from the configured executable.
///
/// The configured path may carry leading arguments (`podman --remote`),
/// which are kept in front of every subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Podman {
    program: String,
    leading: Vec<String>,
}

impl Podman {
    pub fn new(path: &str) -> Self {
        let mut words = path.split_whitespace().map(str::to_string);
        let program = words.next().unwrap_or_else(|| "podman".to_string());
        Self {
            program,
            leading: words.collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn is_remote(&self) -> bool {
        self.leading.iter().any(|arg| arg == "--remote")
    }

    /// Leading arguments other than `--remote`.
    pub fn leading_without_remote(&self) -> impl Iterator<Item = &str> {
        self.leading
            .iter()
            .map(String::as_str)
            .filter(|arg| *arg != "--remote")
    }

    pub fn command<I, S>(&self, args: I) -> EngineCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EngineCommand::new(self.program.clone())
            .args(self.leading.iter().cloned())
            .args(args)
    }
}

impl Default for Podman {
    fn default() -> Self {
        Self::new("podman")
    }
}

/// Runs engine commands as child processes.
#[derive(Debug, Default, Clone)]
pub struct ProcessEngine;

impl ProcessEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Engine for ProcessEngine {
    async fn run(&self, command: &EngineCommand) -> Result<EngineOutput, EngineError> {
        debug!("Running {}", command);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|source| EngineError::Spawn {
            command: command.copy_text(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            warn!(
                "{} exited with {:?}: {}",
                command.program,
                output.status.code(),
                stderr
            );
            return Err(EngineError::Failed {
                command: command.copy_text(),
                code: output.status.code(),
                stderr,
            });
        }

        Ok(EngineOutput { stdout, stderr })
    }
}
