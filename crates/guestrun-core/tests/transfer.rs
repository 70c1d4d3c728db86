//! Guest file transfer through one-time tickets.

mod common;

use common::{auth, transfer, vm, Call, FakeGuest};
use guestrun_core::{CoreError, HttpTransfer, TransferDirection};
use guestrun_vim::VimError;

/// Test that uploaded bytes come back unchanged.
#[tokio::test]
async fn test_upload_then_download() {
    let fake = FakeGuest::new();
    let transfer = transfer(&fake);
    let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();

    transfer
        .upload(&vm(), &auth(), payload.clone(), "/tmp/blob.bin", false)
        .await
        .expect("Failed to upload");
    let response = transfer
        .download(&vm(), &auth(), "/tmp/blob.bin")
        .await
        .expect("Failed to download");

    assert!(response.is_success());
    assert_eq!(response.body.as_ref(), payload.as_slice());
}

/// Test that the upload ticket announces the exact payload size.
#[tokio::test]
async fn test_upload_announces_size() {
    let fake = FakeGuest::new();
    let transfer = transfer(&fake);

    transfer
        .upload(&vm(), &auth(), "hello world", "/etc/motd", true)
        .await
        .expect("Failed to upload");

    let calls = fake.calls();
    assert_eq!(
        calls[0],
        Call::TransferToGuest {
            path: "/etc/motd".into(),
            size: 11,
            overwrite: true,
        }
    );
    assert!(matches!(&calls[1], Call::Put(_)));
}

/// Test that an empty upload is still a valid transfer.
#[tokio::test]
async fn test_upload_empty_file() {
    let fake = FakeGuest::new();
    let transfer = transfer(&fake);

    transfer
        .upload(&vm(), &auth(), Vec::<u8>::new(), "/tmp/empty", false)
        .await
        .expect("Failed to upload");

    let response = transfer
        .download(&vm(), &auth(), "/tmp/empty")
        .await
        .expect("Failed to download");
    assert!(response.body.is_empty());
}

/// Test that refusing to overwrite surfaces the endpoint fault.
#[tokio::test]
async fn test_upload_without_overwrite_fails_on_existing_file() {
    let fake = FakeGuest::new();
    let transfer = transfer(&fake);

    transfer
        .upload(&vm(), &auth(), "v1", "/tmp/config", false)
        .await
        .expect("Failed to upload");
    let err = transfer
        .upload(&vm(), &auth(), "v2", "/tmp/config", false)
        .await
        .expect_err("Existing file must not be replaced");

    assert!(matches!(
        err,
        CoreError::Vim(VimError::Fault { ref fault, .. }) if fault == "FileAlreadyExists"
    ));

    transfer
        .upload(&vm(), &auth(), "v2", "/tmp/config", true)
        .await
        .expect("Overwrite must succeed");
    let body = transfer
        .download(&vm(), &auth(), "/tmp/config")
        .await
        .expect("Failed to download");
    assert_eq!(body.text(), "v2");
}

/// Test that any non-success upload status is an error.
#[tokio::test]
async fn test_upload_rejected_status() {
    let fake = FakeGuest::new();
    fake.state().put_status = Some(500);
    let transfer = transfer(&fake);

    let err = transfer
        .upload(&vm(), &auth(), "data", "/tmp/file", false)
        .await
        .expect_err("Upload must fail");

    match err {
        CoreError::Upload { path, status } => {
            assert_eq!(path, "/tmp/file");
            assert_eq!(status, 500);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!fake.state().files.contains_key("/tmp/file"));
}

/// Test that a download returns non-success responses instead of failing.
#[tokio::test]
async fn test_download_returns_error_status() {
    let fake = FakeGuest::new();
    let transfer = transfer(&fake);
    transfer
        .upload(&vm(), &auth(), "data", "/tmp/file", false)
        .await
        .expect("Failed to upload");
    fake.state().get_status = Some(500);

    let response = transfer
        .download(&vm(), &auth(), "/tmp/file")
        .await
        .expect("Download hands back any status");

    assert_eq!(response.status, 500);
    assert!(!response.is_success());
    let err = response
        .error_for_status("/tmp/file")
        .expect_err("Strict check must fail");
    assert!(matches!(err, CoreError::Download { status: 500, .. }));
}

/// Test that downloading a missing file fails at ticket time.
#[tokio::test]
async fn test_download_missing_file() {
    let fake = FakeGuest::new();
    let transfer = transfer(&fake);

    let err = transfer
        .download(&vm(), &auth(), "/nonexistent")
        .await
        .expect_err("Missing file has no ticket");

    assert!(matches!(err, CoreError::Vim(VimError::Fault { .. })));
    assert_eq!(fake.count(|c| matches!(c, Call::Get(_))), 0);
}

/// Test that tickets are single use.
#[tokio::test]
async fn test_ticket_is_single_use() {
    let fake = FakeGuest::new();
    let transfer = transfer(&fake);
    transfer
        .upload(&vm(), &auth(), "data", "/tmp/file", false)
        .await
        .expect("Failed to upload");

    let ticket = transfer
        .download_ticket(&vm(), &auth(), "/tmp/file")
        .await
        .expect("Failed to get ticket");
    assert_eq!(ticket.direction, TransferDirection::FromGuest);
    assert_eq!(ticket.expected_size, 4);

    let first = fake.get(&ticket.url).await.expect("Failed to GET");
    let second = fake.get(&ticket.url).await.expect("Failed to GET");
    assert_eq!(first.status, 200);
    assert_eq!(second.status, 404);
}

/// Test that the wildcard host in ticket URLs is replaced when configured.
#[tokio::test]
async fn test_wildcard_host_rewritten() {
    let fake = FakeGuest::new();
    let transfer = transfer(&fake).with_endpoint_host(Some("esx01.lab".into()));

    let ticket = transfer
        .upload_ticket(&vm(), &auth(), "/tmp/x", 3, false)
        .await
        .expect("Failed to get ticket");
    assert!(ticket.url.starts_with("https://esx01.lab:443/guestFile?"));
    assert_eq!(ticket.direction, TransferDirection::ToGuest);

    transfer
        .upload(&vm(), &auth(), "abc", "/tmp/y", false)
        .await
        .expect("Failed to upload");
    let put = fake
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::Put(url) => Some(url),
            _ => None,
        })
        .expect("PUT must be issued");
    assert!(put.starts_with("https://esx01.lab:443/"));
}

/// Test that ticket URLs are used verbatim without an endpoint host.
#[tokio::test]
async fn test_wildcard_host_kept_by_default() {
    let fake = FakeGuest::new();
    let transfer = transfer(&fake);

    let ticket = transfer
        .upload_ticket(&vm(), &auth(), "/tmp/x", 3, false)
        .await
        .expect("Failed to get ticket");
    assert!(ticket.url.starts_with("https://*:443/"));
}
