//! Configuration for guest operations.
//!
//! Configuration is loaded from environment variables with sensible defaults.
//! Guest credentials are not part of it; they are passed per call.

use crate::retry::RetryPolicy;
use std::time::Duration;

/// Default guest directory for captured output files.
pub const DEFAULT_TEMP_DIR: &str = "/tmp";

/// Default program used to remove captured output files.
pub const DEFAULT_REMOVE_PROGRAM: &str = "/usr/bin/rm";

/// Default interval between process status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default timeout for a single upload or download request.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration validation error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("endpoint host is not set")]
    MissingHost,

    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("guest temp dir must be an absolute path: {0}")]
    RelativeTempDir(String),

    #[error("remove program must be an absolute path: {0}")]
    RelativeRemoveProgram(String),
}

/// Settings for the HTTP side of guest file transfers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Verify the TLS certificate of transfer URLs. Independent of the
    /// control-plane session's trust decision.
    pub verify_tls: bool,
    /// Timeout for one request.
    pub timeout: Duration,
    /// Host substituted for the `*` wildcard host in ticket URLs.
    pub endpoint_host: Option<String>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            verify_tls: false,
            timeout: DEFAULT_TRANSFER_TIMEOUT,
            endpoint_host: None,
        }
    }
}

/// Settings for the guest process runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Guest-writable directory holding `<id>.out` / `<id>.err`.
    pub temp_dir: String,
    /// Executable invoked as `<remove_program> -rf <temp_dir>/<id>.*`.
    pub remove_program: String,
    /// Failure handling while waiting on a process.
    pub retry: RetryPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            temp_dir: DEFAULT_TEMP_DIR.to_string(),
            remove_program: DEFAULT_REMOVE_PROGRAM.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl RunnerConfig {
    /// Validate paths used inside the guest.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.temp_dir.starts_with('/') {
            return Err(ConfigError::RelativeTempDir(self.temp_dir.clone()));
        }
        if !self.remove_program.starts_with('/') {
            return Err(ConfigError::RelativeRemoveProgram(
                self.remove_program.clone(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestRunConfig {
    /// Management endpoint host.
    pub host: Option<String>,
    /// Management endpoint port. Read by the connection bootstrap that
    /// implements [`VimService`](guestrun_vim::VimService), not by this crate.
    pub port: u16,
    /// Verify the control-plane TLS certificate. Read by the connection
    /// bootstrap, like `port`; transfers use `transfer_verify_tls`.
    pub verify_tls: bool,
    /// Verify the TLS certificate of transfer URLs.
    pub transfer_verify_tls: bool,
    /// Timeout for one upload or download request.
    pub transfer_timeout: Duration,
    /// Interval between process status polls.
    pub poll_interval: Duration,
    /// Guest directory for captured output.
    pub temp_dir: String,
    /// Guest program removing captured output.
    pub remove_program: String,
    /// Consecutive poll failures tolerated; unbounded when `None`.
    pub max_poll_failures: Option<u32>,
}

impl Default for GuestRunConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 443,
            verify_tls: true,
            transfer_verify_tls: false,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            temp_dir: DEFAULT_TEMP_DIR.to_string(),
            remove_program: DEFAULT_REMOVE_PROGRAM.to_string(),
            max_poll_failures: None,
        }
    }
}

impl GuestRunConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GUESTRUN_HOST` | unset |
    /// | `GUESTRUN_PORT` | `443` |
    /// | `GUESTRUN_VERIFY_TLS` | `true` |
    /// | `GUESTRUN_TRANSFER_VERIFY_TLS` | `false` |
    /// | `GUESTRUN_TRANSFER_TIMEOUT_SECS` | `300` |
    /// | `GUESTRUN_POLL_INTERVAL_MS` | `1000` |
    /// | `GUESTRUN_TEMP_DIR` | `/tmp` |
    /// | `GUESTRUN_REMOVE_PROGRAM` | `/usr/bin/rm` |
    /// | `GUESTRUN_MAX_POLL_FAILURES` | unset (retry forever) |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        let flag = |key: &str, fallback: bool| {
            lookup(key)
                .map(|v| v != "false" && v != "0")
                .unwrap_or(fallback)
        };

        Self {
            host: lookup("GUESTRUN_HOST").filter(|v| !v.is_empty()),
            port: lookup("GUESTRUN_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),
            verify_tls: flag("GUESTRUN_VERIFY_TLS", default.verify_tls),
            transfer_verify_tls: flag(
                "GUESTRUN_TRANSFER_VERIFY_TLS",
                default.transfer_verify_tls,
            ),
            transfer_timeout: lookup("GUESTRUN_TRANSFER_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.transfer_timeout),
            poll_interval: lookup("GUESTRUN_POLL_INTERVAL_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default.poll_interval),
            temp_dir: lookup("GUESTRUN_TEMP_DIR").unwrap_or(default.temp_dir),
            remove_program: lookup("GUESTRUN_REMOVE_PROGRAM").unwrap_or(default.remove_program),
            max_poll_failures: lookup("GUESTRUN_MAX_POLL_FAILURES").and_then(|v| v.parse().ok()),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_none() {
            return Err(ConfigError::MissingHost);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        self.runner_config().validate()
    }

    /// Settings for [`GuestFileTransfer`](crate::GuestFileTransfer).
    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            verify_tls: self.transfer_verify_tls,
            timeout: self.transfer_timeout,
            endpoint_host: self.host.clone(),
        }
    }

    /// Settings for [`ProcessRunner`](crate::ProcessRunner).
    pub fn runner_config(&self) -> RunnerConfig {
        let retry = match self.max_poll_failures {
            Some(max) => RetryPolicy::bounded(max),
            None => RetryPolicy::unbounded(),
        };
        RunnerConfig {
            temp_dir: self.temp_dir.clone(),
            remove_program: self.remove_program.clone(),
            retry,
        }
    }

    /// Default run options carrying the configured poll interval.
    pub fn run_options(&self) -> crate::RunOptions {
        crate::RunOptions::default().poll_interval(self.poll_interval)
    }
}
