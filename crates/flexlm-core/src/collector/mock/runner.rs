//! In-memory `lmutil` runner.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::collector::command::{CommandError, CommandOutput, LmutilRunner};

/// A scripted outcome of one `lmutil` run.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// The command ran and produced this output.
    Output(CommandOutput),
    /// The executable could not be started.
    SpawnError(String),
    /// The command exceeded its timeout.
    Timeout,
    /// The command never finishes (for cancellation tests).
    Hang,
}

impl MockResponse {
    /// Successful run printing `stdout`.
    pub fn stdout(stdout: impl Into<String>) -> Self {
        MockResponse::Output(CommandOutput {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        })
    }

    /// Failed run with the given exit code.
    pub fn exit(exit_code: i32, stderr: impl Into<String>) -> Self {
        MockResponse::Output(CommandOutput {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        })
    }
}

/// Runner that replays scripted responses.
///
/// Responses are consumed in order; the last one repeats once the queue
/// is down to a single entry.
#[derive(Debug, Default)]
pub struct MockRunner {
    responses: Mutex<VecDeque<MockResponse>>,
    calls: AtomicUsize,
    last_args: Mutex<Vec<String>>,
}

impl MockRunner {
    pub fn new(responses: impl IntoIterator<Item = MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Runner that always returns `stdout` with exit code 0.
    pub fn always(stdout: impl Into<String>) -> Self {
        Self::new([MockResponse::stdout(stdout)])
    }

    /// Number of `run` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Arguments of the most recent call.
    pub fn last_args(&self) -> Vec<String> {
        self.last_args
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_response(&self) -> MockResponse {
        let mut queue = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.len() > 1 {
            queue.pop_front().unwrap_or(MockResponse::Timeout)
        } else {
            queue.front().cloned().unwrap_or(MockResponse::Timeout)
        }
    }
}

#[async_trait]
impl LmutilRunner for MockRunner {
    async fn run(&self, args: &[String]) -> Result<CommandOutput, CommandError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_args.lock().unwrap_or_else(PoisonError::into_inner) = args.to_vec();

        match self.next_response() {
            MockResponse::Output(out) => Ok(out),
            MockResponse::SpawnError(msg) => Err(CommandError::Spawn(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                msg,
            ))),
            MockResponse::Timeout => Err(CommandError::Timeout(Duration::from_secs(30))),
            MockResponse::Hang => {
                std::future::pending::<()>().await;
                Err(CommandError::Timeout(Duration::MAX))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_responses_replay_in_order_and_last_repeats() {
        let runner = MockRunner::new([MockResponse::exit(1, "boom"), MockResponse::stdout("ok")]);
        let args = vec!["lmstat".to_string()];

        assert_eq!(runner.run(&args).await.unwrap().exit_code, 1);
        assert_eq!(runner.run(&args).await.unwrap().stdout, "ok");
        assert_eq!(runner.run(&args).await.unwrap().stdout, "ok");
        assert_eq!(runner.calls(), 3);
        assert_eq!(runner.last_args(), args);
    }

    #[tokio::test]
    async fn test_error_responses() {
        let runner = MockRunner::new([
            MockResponse::SpawnError("nope".into()),
            MockResponse::Timeout,
        ]);
        assert!(matches!(runner.run(&[]).await, Err(CommandError::Spawn(_))));
        assert!(matches!(runner.run(&[]).await, Err(CommandError::Timeout(_))));
    }
}
