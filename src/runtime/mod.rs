use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

pub mod podman;
pub use podman::{Podman, ProcessEngine};

#[cfg(test)]
pub mod testing;

/// A fully resolved engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl EngineCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Command text suitable for pasting into a shell.
    ///
    /// `--format` templates only exist so output can be parsed and are left out.
    pub fn copy_text(&self) -> String {
        let mut parts = vec![quote(&self.program)];
        let mut args = self.args.iter();
        while let Some(arg) = args.next() {
            if arg == "--format" {
                args.next();
                continue;
            }
            if arg.starts_with("--format=") {
                continue;
            }
            parts.push(quote(arg));
        }
        parts.join(" ")
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("\"{}\"", word.replace('"', "\\\""))
    }
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {}: {stderr}", exit_code(.code))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl EngineError {
    /// Copy-paste text of the command that failed.
    pub fn command(&self) -> &str {
        match self {
            EngineError::Spawn { command, .. } | EngineError::Failed { command, .. } => command,
        }
    }
}

fn exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "signal".to_string(),
    }
}

/// The external container engine.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Run `command` to completion.  A non-zero exit is an error.
    async fn run(&self, command: &EngineCommand) -> Result<EngineOutput, EngineError>;
}
