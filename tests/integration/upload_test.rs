//! Upload admission and queue scenarios.

use std::time::Duration;

use bytes::Bytes;

use cloudbox_client::testing::Call;
use cloudbox_core::error::TransferError;
use cloudbox_core::events::{EventPayload, ListingEvent, UploadEvent};
use cloudbox_core::types::{QuotaSnapshot, UploadReceipt, UploadSource};

use crate::helpers::{TestApp, drain_events};

const MB: u64 = 1024 * 1024;

fn file(name: &str, size: u64) -> UploadSource {
    UploadSource::from_bytes(name, Bytes::from(vec![0u8; size as usize]))
}

#[tokio::test(start_paused = true)]
async fn test_batch_beyond_quota_rejects_the_overflowing_file() {
    let app = TestApp::new();
    app.login().await;
    app.transport
        .set_quota(QuotaSnapshot::from_usage(90 * MB, 100 * MB));

    let report = app
        .ctx
        .uploads()
        .submit(vec![file("first.bin", 6 * MB), file("second.bin", 6 * MB)], "")
        .await
        .unwrap();
    app.ctx.uploads().wait_idle().await;

    assert_eq!(report.admitted.len(), 1);
    assert_eq!(report.admitted[0].name, "first.bin");
    assert_eq!(report.rejected, vec!["second.bin".to_string()]);
    let notice = report.rejection_notice().unwrap();
    assert!(notice.contains("second.bin"));
    assert!(!notice.contains("first.bin"));
    assert_eq!(app.transport.upload_order(), vec!["first.bin".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_name_collision_is_reported_and_queue_continues() {
    let app = TestApp::new();
    app.login().await;
    app.transport.push_upload(Ok(UploadReceipt::Renamed {
        id: Some("X (1).ext".into()),
        original_name: "X.ext".into(),
        new_name: "X (1).ext".into(),
    }));
    let mut rx = app.ctx.events().subscribe();

    app.ctx
        .uploads()
        .submit(vec![file("X.ext", 10), file("Y.ext", 10)], "")
        .await
        .unwrap();
    app.ctx.uploads().wait_idle().await;
    let events = drain_events(&mut rx, Duration::from_millis(10)).await;

    let completed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            EventPayload::Upload(UploadEvent::Completed { name, receipt, .. }) => {
                Some((name.clone(), receipt.stored_name().to_string()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        completed,
        vec![
            ("X.ext".to_string(), "X (1).ext".to_string()),
            ("Y.ext".to_string(), "Y.ext".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_item_does_not_block_the_next() {
    let app = TestApp::new();
    app.login().await;
    app.transport.push_upload(Err(TransferError::Server {
        status: 500,
        message: "disk error".into(),
    }));
    let mut rx = app.ctx.events().subscribe();

    app.ctx
        .uploads()
        .submit(vec![file("a.txt", 5), file("b.txt", 5), file("c.txt", 5)], "docs")
        .await
        .unwrap();
    app.ctx.uploads().wait_idle().await;
    let events = drain_events(&mut rx, Duration::from_millis(10)).await;

    assert_eq!(
        app.transport.upload_order(),
        vec!["a.txt".to_string(), "b.txt".to_string(), "c.txt".to_string()]
    );
    assert_eq!(app.transport.max_concurrent_uploads(), 1);
    assert!(events.iter().any(|e| matches!(
        e,
        EventPayload::Upload(UploadEvent::Drained {
            succeeded: 2,
            failed: 1
        })
    )));
    assert!(app.transport.calls().contains(&Call::Upload {
        token: "access-3".into(),
        name: "c.txt".into(),
        target: "docs".into(),
        timeout: Duration::from_secs(60 * 60),
    }));
}

#[tokio::test(start_paused = true)]
async fn test_drained_queue_triggers_one_listing_refresh() {
    let app = TestApp::new();
    app.login().await;
    let mut rx = app.ctx.events().subscribe();

    app.ctx
        .uploads()
        .submit(vec![file("a.txt", 5), file("b.txt", 5)], "")
        .await
        .unwrap();
    app.ctx.uploads().wait_idle().await;
    let events = drain_events(&mut rx, Duration::from_millis(50)).await;

    let requested = events
        .iter()
        .filter(|e| matches!(e, EventPayload::Listing(ListingEvent::RefreshRequested { .. })))
        .count();
    assert_eq!(requested, 1);
    let list_calls = app
        .transport
        .calls()
        .into_iter()
        .filter(|c| *c == Call::ListFiles)
        .count();
    assert_eq!(list_calls, 1);
}
