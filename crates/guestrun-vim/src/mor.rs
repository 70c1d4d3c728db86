//! Managed object references.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known managed object type tags.
pub mod kinds {
    /// A virtual machine.
    pub const VIRTUAL_MACHINE: &str = "VirtualMachine";
    /// An inventory folder.
    pub const FOLDER: &str = "Folder";
    /// A container view created by the view manager.
    pub const CONTAINER_VIEW: &str = "ContainerView";
    /// The view manager.
    pub const VIEW_MANAGER: &str = "ViewManager";
    /// The property collector.
    pub const PROPERTY_COLLECTOR: &str = "PropertyCollector";
    /// The guest operations manager.
    pub const GUEST_OPERATIONS_MANAGER: &str = "GuestOperationsManager";
    /// The guest process manager.
    pub const GUEST_PROCESS_MANAGER: &str = "GuestProcessManager";
    /// The guest file manager.
    pub const GUEST_FILE_MANAGER: &str = "GuestFileManager";
}

/// Weak reference into the endpoint's object graph.
///
/// Holding a reference says nothing about whether the object exists;
/// failures surface when the reference is used in a call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManagedObjectRef {
    /// Type tag (e.g. `VirtualMachine`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque identifier (e.g. `vm-42`).
    pub value: String,
}

impl ManagedObjectRef {
    /// Create a reference from a type tag and an opaque id.
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    /// Create a virtual machine reference.
    pub fn virtual_machine(value: impl Into<String>) -> Self {
        Self::new(kinds::VIRTUAL_MACHINE, value)
    }

    /// Check the type tag.
    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for ManagedObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}
