//! Operator-facing progress and error reporting.
//!
//! A [`Reporter`] is handed to every operation that wants to show progress;
//! there is no process-wide status indicator.

use std::future::Future;

use log::{error, info};

use crate::runtime::EngineError;

pub trait Reporter: Send + Sync {
    /// An operation started.
    fn progress(&self, operation: &str);
    /// An operation ended, successfully or not.
    fn finished(&self, operation: &str, ok: bool);
    fn info(&self, message: &str);
    /// Report a failure, with the command text to copy when there is one.
    fn error(&self, message: &str, command: Option<&str>);

    fn engine_error(&self, context: &str, err: &EngineError) {
        self.error(&format!("{context}: {err}"), Some(err.command()));
    }
}

/// Reports through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn progress(&self, operation: &str) {
        info!("{}...", operation);
    }

    fn finished(&self, operation: &str, ok: bool) {
        if ok {
            info!("{} completed", operation);
        } else {
            error!("{} failed", operation);
        }
    }

    fn info(&self, message: &str) {
        info!("{}", message);
    }

    fn error(&self, message: &str, command: Option<&str>) {
        match command {
            Some(command) => error!("{}\n  command: {}", message, command),
            None => error!("{}", message),
        }
    }
}

/// Run `task` between `progress` and `finished` notifications.
pub async fn with_status<T, E, F>(
    reporter: &dyn Reporter,
    operation: &str,
    task: F,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    reporter.progress(operation);
    let result = task.await;
    reporter.finished(operation, result.is_ok());
    result
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingReporter;
    use super::*;

    #[tokio::test]
    async fn with_status_reports_both_ends() {
        let reporter = RecordingReporter::default();
        let result: Result<u8, ()> = with_status(&reporter, "Pruning", async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
        assert_eq!(
            reporter.events(),
            vec!["progress: Pruning", "finished: Pruning ok=true"]
        );
    }

    #[tokio::test]
    async fn with_status_reports_failure() {
        let reporter = RecordingReporter::default();
        let result: Result<(), &str> = with_status(&reporter, "Stopping", async { Err("x") }).await;
        assert!(result.is_err());
        assert_eq!(reporter.events()[1], "finished: Stopping ok=false");
    }
}
