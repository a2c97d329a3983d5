//! Listing, navigation and bulk operation scenarios.

use cloudbox_client::View;
use cloudbox_core::error::AppError;
use cloudbox_core::events::SelectionState;
use cloudbox_core::types::ItemId;

use crate::helpers::{TestApp, record};

#[tokio::test(start_paused = true)]
async fn test_bulk_delete_with_items_already_in_trash() {
    let app = TestApp::new();
    app.login().await;
    let ids: Vec<String> = (0..8).map(|i| format!("f{i}.txt")).collect();
    app.transport
        .set_listing(ids.iter().map(|id| record(id, 1)).collect(), vec![]);
    for id in ["f2.txt", "f5.txt"] {
        app.transport
            .fail_item(id, AppError::conflict("File is already in trash"));
    }
    app.transport
        .fail_item("f7.txt", AppError::server("storage unavailable"));
    let browser = app.ctx.browser();
    browser.refresh().await.unwrap();
    browser.select_all_visible();
    assert_eq!(browser.selection_state(), SelectionState::All);

    let report = browser.bulk_delete().await.unwrap();

    assert_eq!(report.total(), 8);
    assert_eq!(report.succeeded.len(), 5);
    assert_eq!(report.recoverable.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(browser.selection_len(), 0);
    assert_eq!(browser.selection_state(), SelectionState::None);
}

#[tokio::test(start_paused = true)]
async fn test_folder_tree_is_lexicographic_with_implied_parents() {
    let app = TestApp::new();
    app.login().await;
    app.transport.set_listing(
        vec![],
        vec!["music/rock".into(), "docs/2024/q1".into(), "archive".into()],
    );

    let listing = app.ctx.browser().refresh().await.unwrap();
    let paths: Vec<_> = listing
        .folder_tree
        .iter()
        .map(|(_, node)| node.full_path.as_str())
        .collect();

    assert_eq!(
        paths,
        [
            "archive",
            "docs",
            "docs/2024",
            "docs/2024/q1",
            "music",
            "music/rock"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_switching_to_trash_clears_selection() {
    let app = TestApp::new();
    app.login().await;
    app.transport
        .set_listing(vec![record("a.txt", 1), record("b.txt", 1)], vec![]);
    app.transport.set_trash(vec![record("old/c.txt", 1)], vec!["old".into()]);
    let browser = app.ctx.browser();
    browser.refresh().await.unwrap();
    browser.select(ItemId::from("a.txt"));
    assert_eq!(browser.selection_state(), SelectionState::Some);

    browser.navigate(View::Trash { path: "old".into() }).unwrap();

    assert_eq!(browser.selection_len(), 0);
    assert_eq!(browser.visible_ids(), vec![ItemId::from("old/c.txt")]);
}

#[tokio::test(start_paused = true)]
async fn test_share_link_is_absolute() {
    let app = TestApp::new();
    app.login().await;

    let url = app
        .ctx
        .browser()
        .share(&ItemId::from("docs/report.pdf"))
        .await
        .unwrap();

    assert_eq!(url, "https://cloud.example.com/share/report.pdf");
}
