//! Scripted engine used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Engine, EngineCommand, EngineError, EngineOutput};

/// Answers commands from a table keyed by the space-joined argument list
/// (program excluded).  Unknown commands fail with exit code 125.
#[derive(Default)]
pub struct ScriptedEngine {
    responses: Mutex<HashMap<String, Result<String, String>>>,
    calls: Mutex<Vec<EngineCommand>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, args: &str, stdout: &str) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .insert(args.to_string(), Ok(stdout.to_string()));
        self
    }

    pub fn fail(&self, args: &str, stderr: &str) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .insert(args.to_string(), Err(stderr.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<EngineCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// How many times a command with exactly these arguments ran.
    pub fn count(&self, args: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.args.join(" ") == args)
            .count()
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    async fn run(&self, command: &EngineCommand) -> Result<EngineOutput, EngineError> {
        self.calls.lock().unwrap().push(command.clone());
        let key = command.args.join(" ");
        let response = self.responses.lock().unwrap().get(&key).cloned();
        match response {
            Some(Ok(stdout)) => Ok(EngineOutput {
                stdout,
                stderr: String::new(),
            }),
            Some(Err(stderr)) => Err(EngineError::Failed {
                command: command.copy_text(),
                code: Some(1),
                stderr,
            }),
            None => Err(EngineError::Failed {
                command: command.copy_text(),
                code: Some(125),
                stderr: format!("unscripted command: {key}"),
            }),
        }
    }
}
