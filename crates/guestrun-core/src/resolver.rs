//! Turning bare identifiers into managed object references.

use crate::session::Session;
use guestrun_vim::{kinds, ManagedObjectRef};

/// Bind an opaque id of type `kind` to `session`.
///
/// No call is made and existence is not checked; a stale or mistyped id
/// only fails once the reference is used.
pub fn resolve(session: &Session, kind: &str, id: impl Into<String>) -> ManagedObjectRef {
    let mor = ManagedObjectRef::new(kind, id);
    tracing::trace!(object = %mor, root = %session.content().root_folder, "Resolved reference");
    mor
}

impl Session {
    /// Reference a virtual machine by its managed object id (e.g. `vm-42`).
    pub fn vm_by_moid(&self, moid: impl Into<String>) -> ManagedObjectRef {
        resolve(self, kinds::VIRTUAL_MACHINE, moid)
    }
}
