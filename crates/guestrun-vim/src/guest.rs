//! Guest operation payloads: credentials, program specs, process info and
//! file transfer descriptors.

use crate::mor::ManagedObjectRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name/password credential for authenticating inside the guest.
///
/// Passed per call. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct GuestAuth {
    /// Guest account name.
    pub username: String,
    /// Guest account password.
    pub password: String,
    /// Whether the endpoint may reuse an existing interactive guest session.
    pub interactive_session: bool,
}

impl GuestAuth {
    /// Create a non-interactive name/password credential.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            interactive_session: false,
        }
    }
}

impl fmt::Debug for GuestAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuestAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("interactive_session", &self.interactive_session)
            .finish()
    }
}

/// Program to start inside the guest.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramSpec {
    /// Absolute path of the executable.
    pub program_path: String,
    /// Single argument string handed to the guest as-is.
    pub arguments: String,
    /// Working directory; the guest user's default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    /// Extra `NAME=value` environment entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_variables: Vec<String>,
}

impl ProgramSpec {
    /// Create a spec from an executable path and an argument string.
    pub fn new(program_path: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            program_path: program_path.into(),
            arguments: arguments.into(),
            ..Default::default()
        }
    }
}

/// Status of a guest process as reported by the process manager.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestProcessInfo {
    /// Guest process id.
    pub pid: i64,
    /// Process name.
    #[serde(default)]
    pub name: String,
    /// Owning guest account.
    #[serde(default)]
    pub owner: String,
    /// Full command line.
    #[serde(default)]
    pub cmd_line: String,
    /// Exit code; `None` while the process is still running.
    #[serde(default)]
    pub exit_code: Option<i32>,
}

/// Guest operations entry points advertised in the service catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestOperationsManager {
    /// The guest process manager.
    pub process_manager: ManagedObjectRef,
    /// The guest file manager.
    pub file_manager: ManagedObjectRef,
}

/// POSIX attributes applied to a file created in the guest.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttributes {
    /// Owner uid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<u32>,
    /// Group gid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<u32>,
    /// Permission bits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<u32>,
}

/// Download descriptor returned when initiating a transfer from the guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTransferInformation {
    /// One-time URL serving the file contents.
    pub url: String,
    /// File size in bytes.
    pub size: u64,
    /// File attributes.
    #[serde(default)]
    pub attributes: FileAttributes,
}
