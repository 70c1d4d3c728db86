//! Session handle over an authenticated management endpoint connection.

use crate::error::{CoreError, Result};
use guestrun_vim::{ManagedObjectRef, ServiceContent, VimService};
use std::fmt;
use std::sync::Arc;

/// Authenticated connection plus its service catalog.
///
/// Cloning is cheap and clones share the connection. The session is never
/// closed by this crate; whoever created the connection owns its lifetime.
/// Concurrent use is as safe as the underlying [`VimService`] is.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    service: Arc<dyn VimService>,
    content: ServiceContent,
}

impl Session {
    /// Wrap a connection, fetching the service catalog once.
    pub async fn open(service: Arc<dyn VimService>) -> Result<Self> {
        let start = std::time::Instant::now();
        let content = service.retrieve_service_content().await?;
        tracing::info!(
            root_folder = %content.root_folder,
            guest_operations = content.guest_operations.is_some(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Session opened"
        );
        Ok(Self::with_content(service, content))
    }

    /// Wrap a connection whose service catalog is already known.
    pub fn with_content(service: Arc<dyn VimService>, content: ServiceContent) -> Self {
        Self {
            inner: Arc::new(SessionInner { service, content }),
        }
    }

    /// The underlying connection.
    pub fn service(&self) -> &dyn VimService {
        self.inner.service.as_ref()
    }

    /// The service catalog.
    pub fn content(&self) -> &ServiceContent {
        &self.inner.content
    }

    /// The guest process manager.
    pub fn process_manager(&self) -> Result<&ManagedObjectRef> {
        self.content()
            .guest_operations
            .as_ref()
            .map(|ops| &ops.process_manager)
            .ok_or_else(|| CoreError::Unsupported("guest operations manager".into()))
    }

    /// The guest file manager.
    pub fn file_manager(&self) -> Result<&ManagedObjectRef> {
        self.content()
            .guest_operations
            .as_ref()
            .map(|ops| &ops.file_manager)
            .ok_or_else(|| CoreError::Unsupported("guest operations manager".into()))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("content", &self.inner.content)
            .finish_non_exhaustive()
    }
}
