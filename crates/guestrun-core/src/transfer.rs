//! Guest file transfer through one-time ticket URLs.
//!
//! The management endpoint hands out a URL per transfer; the bytes then move
//! over plain HTTP(S) through an [`HttpTransfer`] implementation.

use crate::config::TransferConfig;
use crate::error::{CoreError, Result};
use crate::session::Session;
use async_trait::async_trait;
use bytes::Bytes;
use guestrun_vim::{FileAttributes, GuestAuth, ManagedObjectRef};
use std::borrow::Cow;
use std::sync::Arc;

/// Status and body of a transfer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Bytes,
}

impl TransferResponse {
    /// Create a response.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Check for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Turn a non-success download response into [`CoreError::Download`].
    pub fn error_for_status(self, path: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(CoreError::Download {
                path: path.to_string(),
                status: self.status,
            })
        }
    }
}

/// Byte transport used against ticket URLs.
#[async_trait]
pub trait HttpTransfer: Send + Sync {
    /// PUT the full body to `url`.
    async fn put(&self, url: &str, body: Bytes) -> Result<TransferResponse>;

    /// GET `url`.
    async fn get(&self, url: &str) -> Result<TransferResponse>;
}

/// [`HttpTransfer`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransfer {
    client: reqwest::Client,
}

impl ReqwestTransfer {
    /// Build a client honouring the transfer TLS and timeout settings.
    pub fn new(config: &TransferConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransfer for ReqwestTransfer {
    async fn put(&self, url: &str, body: Bytes) -> Result<TransferResponse> {
        let response = self.client.put(url).body(body).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(TransferResponse { status, body })
    }

    async fn get(&self, url: &str) -> Result<TransferResponse> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(TransferResponse { status, body })
    }
}

/// Direction of a [`TransferTicket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Upload into the guest.
    ToGuest,
    /// Download out of the guest.
    FromGuest,
}

/// One-time transfer descriptor.
///
/// Sending consumes the ticket; the endpoint invalidates it after first use
/// or after its own expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTicket {
    /// URL to send the request to.
    pub url: String,
    /// Size announced (upload) or reported (download) by the endpoint.
    pub expected_size: u64,
    /// Whether an existing guest file may be replaced.
    pub overwrite: bool,
    /// Direction of the transfer.
    pub direction: TransferDirection,
}

/// Upload and download of guest files.
#[derive(Clone)]
pub struct GuestFileTransfer {
    session: Session,
    http: Arc<dyn HttpTransfer>,
    endpoint_host: Option<String>,
}

impl GuestFileTransfer {
    /// Create a transfer helper using `http` for byte transport.
    pub fn new(session: Session, http: Arc<dyn HttpTransfer>) -> Self {
        Self {
            session,
            http,
            endpoint_host: None,
        }
    }

    /// Create a transfer helper with a [`ReqwestTransfer`] built from `config`.
    pub fn from_config(session: Session, config: &TransferConfig) -> Result<Self> {
        let http = Arc::new(ReqwestTransfer::new(config)?);
        Ok(Self::new(session, http).with_endpoint_host(config.endpoint_host.clone()))
    }

    /// Substitute `host` for the `*` wildcard host in ticket URLs.
    pub fn with_endpoint_host(mut self, host: Option<String>) -> Self {
        self.endpoint_host = host;
        self
    }

    /// The session this helper operates on.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Request an upload ticket for exactly `size` bytes.
    pub async fn upload_ticket(
        &self,
        vm: &ManagedObjectRef,
        auth: &GuestAuth,
        target_path: &str,
        size: u64,
        overwrite: bool,
    ) -> Result<TransferTicket> {
        let url = self
            .session
            .service()
            .initiate_file_transfer_to_guest(
                self.session.file_manager()?,
                vm,
                auth,
                target_path,
                &FileAttributes::default(),
                size,
                overwrite,
            )
            .await?;
        Ok(TransferTicket {
            url: self.rewrite_url(url),
            expected_size: size,
            overwrite,
            direction: TransferDirection::ToGuest,
        })
    }

    /// Request a download ticket for `source_path`.
    pub async fn download_ticket(
        &self,
        vm: &ManagedObjectRef,
        auth: &GuestAuth,
        source_path: &str,
    ) -> Result<TransferTicket> {
        let info = self
            .session
            .service()
            .initiate_file_transfer_from_guest(self.session.file_manager()?, vm, auth, source_path)
            .await?;
        Ok(TransferTicket {
            url: self.rewrite_url(info.url),
            expected_size: info.size,
            overwrite: false,
            direction: TransferDirection::FromGuest,
        })
    }

    /// Write `data` to `target_path` in the guest.
    ///
    /// Any non-success status is an error; there is no partial resume.
    pub async fn upload(
        &self,
        vm: &ManagedObjectRef,
        auth: &GuestAuth,
        data: impl Into<Bytes>,
        target_path: &str,
        overwrite: bool,
    ) -> Result<()> {
        let data = data.into();
        let start = std::time::Instant::now();
        tracing::debug!(
            vm = %vm,
            path = %target_path,
            size = data.len(),
            overwrite,
            "Uploading file to guest"
        );

        let ticket = self
            .upload_ticket(vm, auth, target_path, data.len() as u64, overwrite)
            .await?;
        let response = self.http.put(&ticket.url, data).await?;

        if !response.is_success() {
            tracing::warn!(
                vm = %vm,
                path = %target_path,
                status = response.status,
                "Upload rejected"
            );
            return Err(CoreError::Upload {
                path: target_path.to_string(),
                status: response.status,
            });
        }

        tracing::info!(
            vm = %vm,
            path = %target_path,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "File uploaded"
        );
        Ok(())
    }

    /// Read `source_path` from the guest.
    ///
    /// The response is returned whatever its status; use
    /// [`TransferResponse::error_for_status`] for upload-style strictness.
    pub async fn download(
        &self,
        vm: &ManagedObjectRef,
        auth: &GuestAuth,
        source_path: &str,
    ) -> Result<TransferResponse> {
        tracing::debug!(vm = %vm, path = %source_path, "Downloading file from guest");
        let ticket = self.download_ticket(vm, auth, source_path).await?;
        let response = self.http.get(&ticket.url).await?;

        if response.is_success() {
            tracing::trace!(
                path = %source_path,
                size = response.body.len(),
                expected = ticket.expected_size,
                "File downloaded"
            );
        } else {
            tracing::debug!(
                path = %source_path,
                status = response.status,
                "Download returned non-success status"
            );
        }
        Ok(response)
    }

    fn rewrite_url(&self, url: String) -> String {
        match &self.endpoint_host {
            Some(host) => rewrite_wildcard_host(&url, host),
            None => url,
        }
    }
}

/// Replace a literal `*` host in `url` with `host`, keeping scheme, port and path.
pub fn rewrite_wildcard_host(url: &str, host: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let authority_start = scheme_end + 3;
    let rest = &url[authority_start..];
    let host_end = rest
        .find(|c: char| matches!(c, ':' | '/' | '?'))
        .unwrap_or(rest.len());

    if &rest[..host_end] != "*" {
        return url.to_string();
    }
    format!("{}{}{}", &url[..authority_start], host, &rest[host_end..])
}
