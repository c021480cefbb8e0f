use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::error::{resolve_failure, ProcessError};
use super::runner::{ExitStatus, LineItem, LineStream, ProcessCommand, ProcessRunner};

/// Scripted `ProcessRunner` for tests.
///
/// Each expectation answers with a fixed set of stdout lines and an exit
/// outcome, resolved through the same failure chain as real processes.
#[derive(Clone, Default)]
pub struct MockProcessRunner {
    expectations: Arc<Mutex<Vec<MockExpectation>>>,
    call_history: Arc<Mutex<Vec<ProcessCommand>>>,
}

type ArgsMatcher = Box<dyn Fn(&[String]) -> bool + Send + Sync>;

struct MockExpectation {
    program: String,
    args_matcher: Option<ArgsMatcher>,
    lines: Vec<String>,
    stderr: String,
    status: ExitStatus,
    spawn_error: Option<std::io::ErrorKind>,
    times_called: usize,
    expected_times: Option<usize>,
}

pub struct MockCommandConfig {
    runner: MockProcessRunner,
    expectation: MockExpectation,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_command(&self, program: &str) -> MockCommandConfig {
        MockCommandConfig {
            runner: self.clone(),
            expectation: MockExpectation {
                program: program.to_string(),
                args_matcher: None,
                lines: Vec::new(),
                stderr: String::new(),
                status: ExitStatus::Success,
                spawn_error: None,
                times_called: 0,
                expected_times: None,
            },
        }
    }

    pub fn verify_called(&self, program: &str, times: usize) -> bool {
        let history = locked(&self.call_history);
        history.iter().filter(|cmd| cmd.program == program).count() == times
    }

    pub fn get_call_history(&self) -> Vec<ProcessCommand> {
        locked(&self.call_history).clone()
    }

    pub fn reset(&self) {
        locked(&self.expectations).clear();
        locked(&self.call_history).clear();
    }

    fn respond(&self, command: &ProcessCommand) -> Vec<LineItem> {
        let display = command.display();
        let mut expectations = locked(&self.expectations);

        for expectation in expectations.iter_mut() {
            if expectation.program != command.program {
                continue;
            }
            if let Some(ref matcher) = expectation.args_matcher {
                if !matcher(&command.args) {
                    continue;
                }
            }

            expectation.times_called += 1;
            if let Some(expected) = expectation.expected_times {
                if expectation.times_called > expected {
                    return vec![Err(ProcessError::MockExpectationNotMet(format!(
                        "Command '{}' called {} times, expected {}",
                        display, expectation.times_called, expected
                    )))];
                }
            }

            if let Some(kind) = expectation.spawn_error {
                let error = std::io::Error::new(kind, "mock spawn failure");
                return vec![Err(resolve_failure(
                    &command.program,
                    &[],
                    Some(error),
                    ExitStatus::Error(-1),
                ))];
            }

            let mut items: Vec<LineItem> = expectation.lines.iter().cloned().map(Ok).collect();
            if !expectation.status.success() {
                items.push(Err(resolve_failure(
                    &display,
                    expectation.stderr.as_bytes(),
                    None,
                    expectation.status,
                )));
            }
            return items;
        }

        vec![Err(ProcessError::MockExpectationNotMet(format!(
            "No expectation found for command: {}",
            display
        )))]
    }
}

impl ProcessRunner for MockProcessRunner {
    fn run_lines(&self, command: ProcessCommand) -> LineStream {
        locked(&self.call_history).push(command.clone());
        let items = self.respond(&command);
        Box::pin(futures::stream::iter(items))
    }
}

impl MockCommandConfig {
    pub fn with_args<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.expectation.args_matcher = Some(Box::new(matcher));
        self
    }

    pub fn returns_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expectation.lines = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn returns_stderr(mut self, stderr: &str) -> Self {
        self.expectation.stderr = stderr.to_string();
        self
    }

    pub fn returns_exit_code(mut self, code: i32) -> Self {
        self.expectation.status = if code == 0 {
            ExitStatus::Success
        } else {
            ExitStatus::Error(code)
        };
        self
    }

    pub fn fails_to_spawn(mut self, kind: std::io::ErrorKind) -> Self {
        self.expectation.spawn_error = Some(kind);
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.expectation.expected_times = Some(n);
        self
    }

    pub fn finish(self) {
        locked(&self.runner.expectations).push(self.expectation);
    }
}
