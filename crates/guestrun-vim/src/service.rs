//! The management endpoint seam.

use crate::error::Result;
use crate::guest::{
    FileAttributes, FileTransferInformation, GuestAuth, GuestOperationsManager, GuestProcessInfo,
    ProgramSpec,
};
use crate::mor::ManagedObjectRef;
use crate::property::{ObjectContent, PropertyFilterSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Service catalog of the management endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceContent {
    /// Root of the inventory tree.
    pub root_folder: ManagedObjectRef,
    /// The property collector.
    pub property_collector: ManagedObjectRef,
    /// The view manager.
    pub view_manager: ManagedObjectRef,
    /// Guest operations entry points; absent on endpoints without guest operations.
    #[serde(default)]
    pub guest_operations: Option<GuestOperationsManager>,
}

/// Operations of an authenticated management endpoint connection.
///
/// Implementations own transport and login; every method maps to exactly one
/// remote call. Errors are reported as-is, retry decisions belong to callers.
#[async_trait]
pub trait VimService: Send + Sync {
    /// Fetch the service catalog.
    async fn retrieve_service_content(&self) -> Result<ServiceContent>;

    /// Create a view over every object of `types` beneath `container`.
    async fn create_container_view(
        &self,
        view_manager: &ManagedObjectRef,
        container: &ManagedObjectRef,
        types: &[String],
        recursive: bool,
    ) -> Result<ManagedObjectRef>;

    /// Destroy a view created by [`create_container_view`](Self::create_container_view).
    async fn destroy_view(&self, view: &ManagedObjectRef) -> Result<()>;

    /// Retrieve properties for every object selected by `specs`.
    async fn retrieve_contents(
        &self,
        collector: &ManagedObjectRef,
        specs: &[PropertyFilterSpec],
    ) -> Result<Vec<ObjectContent>>;

    /// Start a program in the guest and return its pid without waiting.
    async fn start_program_in_guest(
        &self,
        process_manager: &ManagedObjectRef,
        vm: &ManagedObjectRef,
        auth: &GuestAuth,
        spec: &ProgramSpec,
    ) -> Result<i64>;

    /// List status of the given guest processes.
    async fn list_processes_in_guest(
        &self,
        process_manager: &ManagedObjectRef,
        vm: &ManagedObjectRef,
        auth: &GuestAuth,
        pids: &[i64],
    ) -> Result<Vec<GuestProcessInfo>>;

    /// Obtain a one-time upload URL for `guest_file_path`.
    #[allow(clippy::too_many_arguments)]
    async fn initiate_file_transfer_to_guest(
        &self,
        file_manager: &ManagedObjectRef,
        vm: &ManagedObjectRef,
        auth: &GuestAuth,
        guest_file_path: &str,
        attributes: &FileAttributes,
        file_size: u64,
        overwrite: bool,
    ) -> Result<String>;

    /// Obtain a one-time download descriptor for `guest_file_path`.
    async fn initiate_file_transfer_from_guest(
        &self,
        file_manager: &ManagedObjectRef,
        vm: &ManagedObjectRef,
        auth: &GuestAuth,
        guest_file_path: &str,
    ) -> Result<FileTransferInformation>;
}
