//! Show-after-load ordering and the fallback timer.

mod common;

use std::time::Duration;

use common::{Harness, plain_config};
use skiff_settings::SkiffSettings;

fn shows(h: &Harness, id: &skiff_core::ids::ContextId) -> usize {
    h.hook_names(id).iter().filter(|n| *n == "onShow").count()
}

#[tokio::test(start_paused = true)]
async fn fallback_forces_show_exactly_once() {
    let h = Harness::new();
    let entry = h.boot(&plain_config(), "pages/index/index").await;
    h.load(&entry);

    tokio::time::sleep(Duration::from_millis(999)).await;
    assert_eq!(shows(&h, &entry), 0);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(shows(&h, &entry), 1);

    // The host's own onShow for the same cycle is a duplicate.
    h.show(&entry).await;
    assert_eq!(shows(&h, &entry), 1);

    // A late render still delivers onReady but no second show.
    h.render(&entry);
    assert_eq!(h.hook_names(&entry), vec!["onLoad", "onShow", "onReady"]);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(shows(&h, &entry), 1);
}

#[tokio::test(start_paused = true)]
async fn hide_between_shows_lets_the_next_show_through() {
    let h = Harness::new();
    let entry = h.boot(&plain_config(), "pages/index/index").await;
    h.load(&entry);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(shows(&h, &entry), 1);

    h.hide(&entry).await;
    h.show(&entry).await;
    assert_eq!(h.hook_names(&entry), vec!["onLoad", "onShow", "onHide", "onShow"]);
}

#[tokio::test(start_paused = true)]
async fn render_ack_cancels_the_fallback() {
    let h = Harness::new();
    let entry = h.boot(&plain_config(), "pages/index/index").await;
    h.load(&entry);
    h.render(&entry);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.hook_names(&entry), vec!["onLoad", "onReady"]);

    h.show(&entry).await;
    assert_eq!(shows(&h, &entry), 1);
}

#[tokio::test(start_paused = true)]
async fn fallback_delay_comes_from_settings() {
    let mut settings = SkiffSettings::default();
    settings.runtime.show_fallback_ms = 50;
    let h = Harness::with_settings(settings);
    let entry = h.boot(&plain_config(), "pages/index/index").await;
    h.load(&entry);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(shows(&h, &entry), 1);
}

#[tokio::test(start_paused = true)]
async fn forced_show_releases_the_buffered_host_event() {
    let h = Harness::new();
    let entry = h.boot(&plain_config(), "pages/index/index").await;
    h.load(&entry);
    h.show(&entry).await;
    assert_eq!(shows(&h, &entry), 0);

    tokio::time::sleep(Duration::from_millis(1001)).await;
    assert_eq!(shows(&h, &entry), 1);

    // No duplicate pending: the next host show is a real one.
    h.show(&entry).await;
    assert_eq!(shows(&h, &entry), 2);
}

#[tokio::test]
async fn show_before_load_waits_for_render() {
    let h = Harness::new();
    let entry = h.boot(&plain_config(), "pages/index/index").await;

    h.show(&entry).await;
    h.load(&entry);
    assert_eq!(shows(&h, &entry), 0);
    h.render(&entry);
    assert_eq!(h.hook_names(&entry), vec!["onLoad", "onReady", "onShow"]);
}

#[tokio::test]
async fn components_follow_page_visibility() {
    let h = Harness::new();
    let entry = h.boot(&plain_config(), "pages/index/index").await;
    h.settle(&entry).await;
    h.hide(&entry).await;

    let component: Vec<String> = h
        .hooks_of(&entry)
        .into_iter()
        .filter(|n| n.starts_with("counter."))
        .collect();
    assert_eq!(component, vec!["counter.pageShow", "counter.pageHide"]);
}
