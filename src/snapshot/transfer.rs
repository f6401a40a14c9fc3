//! Transfer invocation with retries
//!
//! The invoker runs the transfer command until it exits with status zero or
//! the attempt ceiling is reached. Each attempt is synchronous and its output
//! goes straight into the snapshot's [`TransferLog`].
//!
//! State machine:
//!
//! ```text
//! Idle -> Attempting -> Succeeded
//!                    -> Retrying -> Attempting
//!                    -> Exhausted
//! ```

use std::fs::File;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{debug, error, info, warn, Dispatch};

use crate::error::{SnapvaultError, SnapvaultResult, TransferExit};

use super::command::TransferCommand;
use super::log::TransferLog;

/// Default number of attempts before a transfer is given up
pub const DEFAULT_RETRY_CEILING: u32 = 10;

/// Runs one attempt of the transfer tool
///
/// `output` receives both stdout and stderr of the attempt.
pub trait TransferRunner {
    fn run(&mut self, command: &TransferCommand, output: File) -> SnapvaultResult<TransferExit>;
}

/// Runs the transfer tool as a blocking child process
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl TransferRunner for ProcessRunner {
    fn run(&mut self, command: &TransferCommand, output: File) -> SnapvaultResult<TransferExit> {
        let spawn_error = |e: std::io::Error| SnapvaultError::TransferSpawn {
            program: command.program().to_string_lossy().into_owned(),
            reason: e.to_string(),
        };

        let stderr = output.try_clone().map_err(spawn_error)?;
        let status = Command::new(command.program())
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::from(output))
            .stderr(Stdio::from(stderr))
            .status()
            .map_err(spawn_error)?;

        Ok(match status.code() {
            Some(code) => TransferExit::Code(code),
            None => TransferExit::Terminated,
        })
    }
}

/// Where the retry loop currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokerState {
    Idle,
    Attempting(u32),
    Retrying { attempt: u32, exit: TransferExit },
    Succeeded { attempts: u32 },
    Exhausted { attempts: u32, exit: TransferExit },
}

impl InvokerState {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Exhausted { .. })
    }
}

/// A transfer that finished with status zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Attempts used, including the successful one
    pub attempts: u32,
}

/// Runs a transfer command with a bounded number of retries
#[derive(Debug, Clone)]
pub struct TransferInvoker {
    ceiling: u32,
    retry_delay: Duration,
    dispatch: Dispatch,
}

impl TransferInvoker {
    /// Create an invoker allowing `ceiling` attempts (at least one)
    pub fn new(ceiling: u32, dispatch: Dispatch) -> Self {
        Self {
            ceiling: ceiling.max(1),
            retry_delay: Duration::ZERO,
            dispatch,
        }
    }

    /// Wait this long between a failed attempt and the next one
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Maximum number of attempts
    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Run `command` until it succeeds or the ceiling is reached
    ///
    /// # Errors
    ///
    /// Returns [`SnapvaultError::TransferFailed`] with the last exit status
    /// when every attempt failed. A runner error (the tool could not be
    /// started, the log could not be written) ends the loop immediately.
    pub fn invoke(
        &self,
        runner: &mut dyn TransferRunner,
        command: &TransferCommand,
        log: &mut TransferLog,
    ) -> SnapvaultResult<TransferOutcome> {
        tracing::dispatcher::with_default(&self.dispatch, || -> SnapvaultResult<TransferOutcome> {
            info!("running command: {}", command);

            let mut state = InvokerState::Idle;
            loop {
                state = self.step(state, runner, command, log)?;
                match state {
                    InvokerState::Succeeded { attempts } => {
                        info!(attempts, "transfer completed successfully");
                        info!("transfer output logged to {}", log.path().display());
                        return Ok(TransferOutcome { attempts });
                    }
                    InvokerState::Exhausted { attempts, exit } => {
                        error!(attempts, %exit, "transfer failed, giving up");
                        info!("transfer output logged to {}", log.path().display());
                        return Err(SnapvaultError::TransferFailed { exit, attempts });
                    }
                    _ => {}
                }
            }
        })
    }

    /// Advance the state machine by one transition
    fn step(
        &self,
        state: InvokerState,
        runner: &mut dyn TransferRunner,
        command: &TransferCommand,
        log: &mut TransferLog,
    ) -> SnapvaultResult<InvokerState> {
        Ok(match state {
            InvokerState::Idle => InvokerState::Attempting(1),

            InvokerState::Attempting(attempt) => {
                debug!(attempt, ceiling = self.ceiling, "starting transfer attempt");
                log.begin_attempt(attempt, self.ceiling, command)?;
                let exit = runner.run(command, log.sink()?)?;
                log.end_attempt(attempt, exit)?;

                if exit.success() {
                    InvokerState::Succeeded { attempts: attempt }
                } else if attempt >= self.ceiling {
                    InvokerState::Exhausted {
                        attempts: attempt,
                        exit,
                    }
                } else {
                    InvokerState::Retrying { attempt, exit }
                }
            }

            InvokerState::Retrying { attempt, exit } => {
                warn!(attempt, ceiling = self.ceiling, %exit, "transfer attempt failed, retrying");
                if !self.retry_delay.is_zero() {
                    std::thread::sleep(self.retry_delay);
                }
                InvokerState::Attempting(attempt + 1)
            }

            terminal => terminal,
        })
    }
}
