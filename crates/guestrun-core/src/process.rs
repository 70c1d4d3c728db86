//! Guest process runner.
//!
//! Starting a guest program is fire-and-forget; completion is discovered by
//! polling the process manager until an exit code shows up. When output is
//! captured, the command's stdout/stderr are redirected to per-run temporary
//! files that are downloaded after exit and then removed.
//!
//! ```text
//! Starting ──start ok──▶ Running ──exit code seen──▶ Completed
//!    │                      │
//!    └──start error──▶ Failed ◀──cancelled / retries exhausted
//! ```

use crate::command::GuestCommand;
use crate::config::{RunnerConfig, DEFAULT_POLL_INTERVAL};
use crate::error::{CoreError, Result};
use crate::session::Session;
use crate::transfer::{GuestFileTransfer, TransferResponse};
use chrono::{DateTime, Utc};
use guestrun_vim::{GuestAuth, ManagedObjectRef, ProgramSpec, VimError};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Process id of a program started in the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuestPid(i64);

impl GuestPid {
    /// Wrap a raw guest pid.
    pub fn new(pid: i64) -> Self {
        Self(pid)
    }

    /// Get the raw pid.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for GuestPid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for GuestPid {
    fn from(pid: i64) -> Self {
        Self(pid)
    }
}

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Start request in flight.
    Starting,
    /// Started; exit code not observed yet.
    Running,
    /// Exit code observed.
    Completed,
    /// Could not start, or waiting was abandoned.
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Per-run options.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Block until the program exits (default: false).
    pub wait: bool,
    /// Interval between status polls (default: 1s).
    pub poll_interval: Duration,
    /// Capture stdout/stderr through temporary guest files (default: true).
    pub capture_output: bool,
    /// Abandons waiting when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            wait: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            capture_output: true,
            cancel: None,
        }
    }
}

impl RunOptions {
    /// Set whether to wait for completion.
    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    /// Set the poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set whether to capture output.
    pub fn capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    /// Stop waiting once `token` is cancelled.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Temporary guest files receiving a run's output.
///
/// Named `<temp_dir>/<id>.out` and `<temp_dir>/<id>.err` with a fresh random
/// id per run, so concurrent runs in one guest never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    id: Uuid,
    dir: String,
}

impl OutputFiles {
    /// Allocate file names under `temp_dir`.
    pub fn new(temp_dir: &str) -> Self {
        Self::with_id(temp_dir, Uuid::new_v4())
    }

    /// Use a specific id.
    pub fn with_id(temp_dir: &str, id: Uuid) -> Self {
        Self {
            id,
            dir: temp_dir.trim_end_matches('/').to_string(),
        }
    }

    /// The random id shared by both files.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Path receiving stdout.
    pub fn stdout_path(&self) -> String {
        format!("{}/{}.out", self.dir, self.id)
    }

    /// Path receiving stderr.
    pub fn stderr_path(&self) -> String {
        format!("{}/{}.err", self.dir, self.id)
    }

    /// Glob matching every file of this run.
    pub fn pattern(&self) -> String {
        format!("{}/{}.*", self.dir, self.id)
    }

    fn redirect(&self, arguments: &str) -> String {
        let redirection = format!("> {} 2> {}", self.stdout_path(), self.stderr_path());
        if arguments.is_empty() {
            redirection
        } else {
            format!("{arguments} {redirection}")
        }
    }

    fn removal(&self, remove_program: &str) -> ProgramSpec {
        ProgramSpec::new(remove_program, format!("-rf {}", self.pattern()))
    }
}

/// Terminal state of a guest program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    /// Guest pid.
    pub pid: GuestPid,
    /// Exit code, passed through uninterpreted.
    pub exit_code: i32,
    /// Download response for stdout, when output was captured.
    pub stdout: Option<TransferResponse>,
    /// Download response for stderr, when output was captured.
    pub stderr: Option<TransferResponse>,
    /// Why captured output could not be downloaded. The exit code is still valid.
    pub output_error: Option<String>,
    /// When the start request was issued.
    pub started_at: DateTime<Utc>,
    /// When the exit code was observed.
    pub finished_at: DateTime<Utc>,
}

impl ProcessResult {
    /// Check if the program exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Captured stdout as text.
    pub fn stdout_text(&self) -> Option<Cow<'_, str>> {
        self.stdout.as_ref().map(TransferResponse::text)
    }

    /// Captured stderr as text.
    pub fn stderr_text(&self) -> Option<Cow<'_, str>> {
        self.stderr.as_ref().map(TransferResponse::text)
    }
}

/// What [`ProcessRunner::run`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Started without waiting; the caller owns further polling.
    Started(GuestPid),
    /// Waited until the program exited.
    Completed(ProcessResult),
}

impl RunOutcome {
    /// Pid of the started program.
    pub fn pid(&self) -> GuestPid {
        match self {
            Self::Started(pid) => *pid,
            Self::Completed(result) => result.pid,
        }
    }

    /// The result, if the run was waited on.
    pub fn into_result(self) -> Option<ProcessResult> {
        match self {
            Self::Started(_) => None,
            Self::Completed(result) => Some(result),
        }
    }
}

/// Runs programs inside guests.
///
/// Blocks the calling task while waiting; no background tasks are spawned.
/// The runner never times out on its own: bound it with a
/// [`RetryPolicy`](crate::RetryPolicy) limit or a cancellation token.
#[derive(Clone)]
pub struct ProcessRunner {
    session: Session,
    transfer: GuestFileTransfer,
    config: RunnerConfig,
}

impl ProcessRunner {
    /// Create a runner that fetches output through `transfer`.
    pub fn new(transfer: GuestFileTransfer, config: RunnerConfig) -> Self {
        Self {
            session: transfer.session().clone(),
            transfer,
            config,
        }
    }

    /// The runner configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Build the program spec for `command`, redirecting into `output` if given.
    pub fn program_spec(
        &self,
        command: &GuestCommand,
        output: Option<&OutputFiles>,
    ) -> Result<ProgramSpec> {
        let mut spec = command.to_program_spec()?;
        if let Some(files) = output {
            spec.arguments = files.redirect(&spec.arguments);
        }
        Ok(spec)
    }

    /// Start `spec` in the guest. Errors are not retried.
    pub async fn start(
        &self,
        vm: &ManagedObjectRef,
        auth: &GuestAuth,
        spec: &ProgramSpec,
    ) -> Result<GuestPid> {
        let process_manager = self.session.process_manager()?;
        let pid = self
            .session
            .service()
            .start_program_in_guest(process_manager, vm, auth, spec)
            .await
            .map_err(|source| CoreError::StartProgram {
                program: spec.program_path.clone(),
                source,
            })?;
        Ok(GuestPid(pid))
    }

    /// Poll once. `None` means still running.
    pub async fn poll_exit_code(
        &self,
        vm: &ManagedObjectRef,
        auth: &GuestAuth,
        pid: GuestPid,
    ) -> Result<Option<i32>> {
        let processes = self
            .session
            .service()
            .list_processes_in_guest(self.session.process_manager()?, vm, auth, &[pid.0])
            .await?;

        processes
            .iter()
            .find(|p| p.pid == pid.0)
            .map(|p| p.exit_code)
            .ok_or_else(|| {
                CoreError::Vim(VimError::InvalidResponse(format!(
                    "process {pid} missing from listing"
                )))
            })
    }

    /// Poll until an exit code is observed.
    ///
    /// Every failed poll is treated as transient: it is logged and followed
    /// by a longer backoff, until the retry policy gives up (never, by
    /// default) or the options' token is cancelled.
    pub async fn wait_for_exit(
        &self,
        vm: &ManagedObjectRef,
        auth: &GuestAuth,
        pid: GuestPid,
        options: &RunOptions,
    ) -> Result<i32> {
        let start = std::time::Instant::now();
        let mut polls = 0u32;
        let mut failures = 0u32;

        loop {
            if options.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                return Err(CoreError::Cancelled { pid: pid.0 });
            }

            polls += 1;
            match self.poll_exit_code(vm, auth, pid).await {
                Ok(Some(exit_code)) => {
                    tracing::debug!(
                        vm = %vm,
                        pid = pid.0,
                        exit_code,
                        polls,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Guest process exited"
                    );
                    return Ok(exit_code);
                }
                Ok(None) => {
                    failures = 0;
                    tracing::trace!(pid = pid.0, polls, "Guest process still running");
                    pause(options.poll_interval, options, pid).await?;
                }
                Err(e) => {
                    failures += 1;
                    if self.config.retry.exhausted(failures) {
                        tracing::warn!(
                            pid = pid.0,
                            attempts = failures,
                            error = %e,
                            "Giving up on guest process"
                        );
                        return Err(CoreError::PollRetriesExhausted {
                            pid: pid.0,
                            attempts: failures,
                            source: Box::new(e),
                        });
                    }
                    let delay = self.config.retry.backoff(options.poll_interval);
                    tracing::warn!(
                        pid = pid.0,
                        attempt = failures,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Process status poll failed, retrying"
                    );
                    pause(delay, options, pid).await?;
                }
            }
        }
    }

    /// Run `command` in the guest.
    ///
    /// Without `wait`, returns as soon as the program is started. With
    /// `wait`, polls to completion, then (when capturing) downloads both
    /// output files and issues a best-effort removal of them.
    ///
    /// Once an exit code is observed the run always completes; a failed
    /// output download is reported in [`ProcessResult::output_error`].
    pub async fn run(
        &self,
        vm: &ManagedObjectRef,
        auth: &GuestAuth,
        command: impl Into<GuestCommand>,
        options: RunOptions,
    ) -> Result<RunOutcome> {
        let command = command.into();
        let output = options
            .capture_output
            .then(|| OutputFiles::new(&self.config.temp_dir));
        let spec = self.program_spec(&command, output.as_ref())?;

        let start = std::time::Instant::now();
        let started_at = Utc::now();
        tracing::debug!(
            vm = %vm,
            state = %RunState::Starting,
            program = %spec.program_path,
            capture_output = options.capture_output,
            "Starting guest program"
        );

        let pid = match self.start(vm, auth, &spec).await {
            Ok(pid) => pid,
            Err(e) => {
                tracing::warn!(
                    vm = %vm,
                    state = %RunState::Failed,
                    program = %spec.program_path,
                    error = %e,
                    "Guest program did not start"
                );
                return Err(e);
            }
        };

        if !options.wait {
            tracing::info!(vm = %vm, pid = pid.0, "Guest program started");
            return Ok(RunOutcome::Started(pid));
        }
        tracing::debug!(
            vm = %vm,
            pid = pid.0,
            state = %RunState::Running,
            "Waiting for guest program"
        );

        let exit_code = match self.wait_for_exit(vm, auth, pid, &options).await {
            Ok(code) => code,
            Err(e) => {
                tracing::warn!(
                    vm = %vm,
                    pid = pid.0,
                    state = %RunState::Failed,
                    error = %e,
                    "Stopped waiting for guest program"
                );
                return Err(e);
            }
        };
        let finished_at = Utc::now();

        let (stdout, stderr, output_error) = match &output {
            Some(files) => {
                let collected = self.collect_output(vm, auth, pid, files, &options).await;
                self.remove_output(vm, auth, files).await;
                match collected {
                    Ok((stdout, stderr)) => (Some(stdout), Some(stderr), None),
                    Err(e) => (None, None, Some(e.to_string())),
                }
            }
            None => (None, None, None),
        };

        tracing::info!(
            vm = %vm,
            pid = pid.0,
            state = %RunState::Completed,
            exit_code,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Guest program completed"
        );

        Ok(RunOutcome::Completed(ProcessResult {
            pid,
            exit_code,
            stdout,
            stderr,
            output_error,
            started_at,
            finished_at,
        }))
    }

    /// Reserved for in-guest script execution.
    pub async fn execute_script(
        &self,
        _vm: &ManagedObjectRef,
        _auth: &GuestAuth,
        _script: &str,
    ) -> Result<ProcessResult> {
        Err(CoreError::NotImplemented("execute_script"))
    }

    /// Download both output files, retrying transient failures like polls.
    /// The caller owns cleanup.
    async fn collect_output(
        &self,
        vm: &ManagedObjectRef,
        auth: &GuestAuth,
        pid: GuestPid,
        files: &OutputFiles,
        options: &RunOptions,
    ) -> Result<(TransferResponse, TransferResponse)> {
        let mut failures = 0u32;
        loop {
            let result = async {
                let stdout = self.transfer.download(vm, auth, &files.stdout_path()).await?;
                let stderr = self.transfer.download(vm, auth, &files.stderr_path()).await?;
                Ok::<_, CoreError>((stdout, stderr))
            }
            .await;

            let e = match result {
                Ok(pair) => return Ok(pair),
                Err(e) => e,
            };

            failures += 1;
            if !e.is_transient() || self.config.retry.exhausted(failures) {
                tracing::warn!(
                    pid = pid.0,
                    attempts = failures,
                    error = %e,
                    "Could not download captured output"
                );
                return Err(if e.is_transient() {
                    CoreError::PollRetriesExhausted {
                        pid: pid.0,
                        attempts: failures,
                        source: Box::new(e),
                    }
                } else {
                    e
                });
            }

            let delay = self.config.retry.backoff(options.poll_interval);
            tracing::warn!(
                pid = pid.0,
                attempt = failures,
                error = %e,
                retry_in_ms = delay.as_millis() as u64,
                "Output download failed, retrying"
            );
            pause(delay, options, pid).await?;
        }
    }

    /// Start removal of the run's temp files without waiting on it.
    /// Failures are reported as a warning event and otherwise ignored.
    async fn remove_output(&self, vm: &ManagedObjectRef, auth: &GuestAuth, files: &OutputFiles) {
        let spec = files.removal(&self.config.remove_program);
        match self.start(vm, auth, &spec).await {
            Ok(pid) => {
                tracing::debug!(
                    vm = %vm,
                    pid = pid.0,
                    pattern = %files.pattern(),
                    "Output cleanup started"
                );
            }
            Err(e) => {
                tracing::warn!(
                    vm = %vm,
                    pattern = %files.pattern(),
                    error = %e,
                    "Output cleanup failed"
                );
            }
        }
    }
}

/// Sleep for `delay`, returning early with `Cancelled` if the options' token fires.
async fn pause(delay: Duration, options: &RunOptions, pid: GuestPid) -> Result<()> {
    match &options.cancel {
        Some(token) => tokio::select! {
            _ = token.cancelled() => Err(CoreError::Cancelled { pid: pid.0 }),
            _ = tokio::time::sleep(delay) => Ok(()),
        },
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}
