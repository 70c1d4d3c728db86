//! # guestrun-core
//!
//! Run commands inside virtual machine guests, move files in and out of them,
//! and list virtual machines, all through a virtualization management
//! endpoint.
//!
//! ## Architecture
//!
//! ```text
//!  ProcessRunner ──────────▶ GuestFileTransfer ──────▶ HttpTransfer
//!   run / start /             upload / download         (reqwest)
//!   wait_for_exit                  │ tickets
//!        │                         │
//!        ▼                         ▼
//!  ┌───────────────────────────────────────┐
//!  │ Session (service catalog + connection)│◀──── PropertyCollector
//!  └───────────────────────────────────────┘       list_objects / list_vms
//!                      │
//!                      ▼
//!           VimService (guestrun-vim)
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use guestrun_core::{
//!     GuestAuth, GuestFileTransfer, GuestRunConfig, ProcessRunner, PropertyCollector,
//!     RunOptions, Session,
//! };
//!
//! # use std::sync::Arc;
//! # async fn example(service: Arc<dyn guestrun_vim::VimService>) -> guestrun_core::Result<()> {
//! let config = GuestRunConfig::from_env();
//! config.validate()?;
//!
//! // `service` is an already-authenticated connection
//! let session = Session::open(service).await?;
//!
//! // Inventory
//! let vms = PropertyCollector::new(session.clone()).list_vms().await?;
//! for vm in &vms {
//!     println!("{}", vm.to_json());
//! }
//!
//! // Run a command and capture its output
//! let transfer = GuestFileTransfer::from_config(session.clone(), &config.transfer_config())?;
//! let runner = ProcessRunner::new(transfer, config.runner_config());
//! let vm = session.vm_by_moid("vm-42");
//! let auth = GuestAuth::new("root", "secret");
//!
//! let outcome = runner
//!     .run(&vm, &auth, "uname -a", config.run_options().wait(true))
//!     .await?;
//! if let Some(result) = outcome.into_result() {
//!     println!("exit {}: {:?}", result.exit_code, result.stdout_text());
//! }
//! # Ok(())
//! # }
//! ```

mod collector;
mod command;
mod config;
mod error;
mod process;
mod resolver;
mod retry;
mod session;
mod transfer;

pub use collector::{
    build_filter_spec, flatten, PropertyCollector, PropertyQuery, PropertyRecord, VmSummary,
    OBJ_KEY, TRAVERSE_ENTITIES, VM_PROPERTIES, VM_SUMMARY_PROPERTIES,
};
pub use command::{split_command_line, GuestCommand};
pub use config::{
    ConfigError, GuestRunConfig, RunnerConfig, TransferConfig, DEFAULT_POLL_INTERVAL,
    DEFAULT_REMOVE_PROGRAM, DEFAULT_TEMP_DIR, DEFAULT_TRANSFER_TIMEOUT,
};
pub use error::{CoreError, Result};
pub use process::{
    GuestPid, OutputFiles, ProcessResult, ProcessRunner, RunOptions, RunOutcome, RunState,
};
pub use resolver::resolve;
pub use retry::{RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER, MIN_BACKOFF};
pub use session::Session;
pub use transfer::{
    rewrite_wildcard_host, GuestFileTransfer, HttpTransfer, ReqwestTransfer, TransferDirection,
    TransferResponse, TransferTicket,
};

pub use guestrun_vim::{
    GuestAuth, ManagedObjectRef, ProgramSpec, PropertyValue, VimError, VimService,
};
pub use tokio_util::sync::CancellationToken;
