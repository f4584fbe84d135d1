//! Tab groups and tab-tap buffering.

mod common;

use assert_matches::assert_matches;
use common::{Harness, ctx, plain_config, tab_config};
use serde_json::json;
use skiff_core::errors::NavigationError;
use skiff_core::events::{HostEvent, RouteEvent, RouteType, TabItemTap};

fn tap(index: usize, page_path: &str, context_id: Option<u64>) -> HostEvent {
    HostEvent::TabItemTap(TabItemTap {
        context_id: context_id.map(ctx),
        index,
        page_path: page_path.into(),
        text: String::new(),
        from: None,
    })
}

fn taps(h: &Harness, id: &skiff_core::ids::ContextId) -> Vec<String> {
    h.hook_names(id)
        .into_iter()
        .filter(|n| n.starts_with("onTabItemTap"))
        .collect()
}

#[tokio::test]
async fn two_tabs_sharing_a_path_buffer_taps_by_index() {
    let h = Harness::new();
    let config = json!({
        "pages": ["pages/home/home"],
        "tabBar": {"list": [
            {"pagePath": "pages/home/home", "text": "Latest"},
            {"pagePath": "pages/home/home", "text": "Popular"},
        ]},
    });
    let first = h.boot(&config, "pages/home/home").await;
    h.settle(&first).await;

    // Tab 1 has no context yet; its tap must not land on tab 0 which shares the path.
    h.host(tap(1, "pages/home/home", None)).await;
    assert!(taps(&h, &first).is_empty());

    let second = ctx(2);
    h.host(HostEvent::Route(RouteEvent {
        route_type: RouteType::SwitchTab,
        from_id: Some(first.clone()),
        to_id: Some(second.clone()),
        to_page: Some("pages/home/home".into()),
        to_tab_index: Some(1),
    }))
    .await;
    assert_eq!(h.orch.current_pages()[0].tab_index, Some(1));
    assert_eq!(h.orch.current_context_id(), Some(second.clone()));

    // Both the buffered tap and the switch's own tap wait for onLoad.
    assert!(taps(&h, &second).is_empty());
    h.load(&second);
    assert_eq!(h.hook_names(&second)[0], "onLoad");
    assert_eq!(taps(&h, &second), vec!["onTabItemTap#1", "onTabItemTap#1"]);
    assert!(taps(&h, &first).is_empty());
}

#[tokio::test]
async fn tap_on_a_loaded_tab_is_delivered_immediately() {
    let h = Harness::new();
    let home = h.boot(&tab_config(), "pages/home/home").await;
    h.settle(&home).await;

    h.host(tap(0, "pages/home/home", Some(1))).await;
    assert_eq!(taps(&h, &home), vec!["onTabItemTap#0"]);

    // Without a context id the tab is found by index and path.
    h.host(tap(0, "pages/home/home", None)).await;
    assert_eq!(taps(&h, &home).len(), 2);
}

#[tokio::test]
async fn tap_buffered_until_switch_tab_registers_the_tab() {
    let h = Harness::new();
    let home = h.boot(&tab_config(), "pages/home/home").await;
    h.settle(&home).await;

    h.host(tap(1, "pages/me/me", None)).await;
    let me = h.orch.navigator().switch_tab("/pages/me/me").await.unwrap();
    assert!(taps(&h, &me).is_empty());
    h.load(&me);
    assert_eq!(taps(&h, &me), vec!["onTabItemTap#1"]);
}

#[tokio::test]
async fn switch_tab_rejects_non_tab_pages() {
    let h = Harness::new();
    let home = h.boot(&tab_config(), "pages/home/home").await;
    h.settle(&home).await;

    assert_matches!(
        h.orch.navigator().switch_tab("/pages/detail/detail").await,
        Err(NavigationError::NotATab { path }) if path == "pages/detail/detail"
    );
    assert_eq!(h.stack_ids(), vec![home]);
}

#[tokio::test]
async fn switch_tab_without_tab_bar_is_not_a_tab() {
    let h = Harness::new();
    let entry = h.boot(&plain_config(), "pages/index/index").await;
    h.settle(&entry).await;
    assert_matches!(
        h.orch.navigator().switch_tab("/pages/index/index").await,
        Err(NavigationError::NotATab { .. })
    );
}

#[tokio::test]
async fn switch_tab_from_non_tab_root_relaunches_into_the_group() {
    let h = Harness::new();
    let detail = h.boot(&tab_config(), "pages/detail/detail").await;
    h.settle(&detail).await;
    assert!(!h.orch.current_pages()[0].is_tab_group);

    let me = h.orch.navigator().switch_tab("/pages/me/me").await.unwrap();
    let pages = h.orch.current_pages();
    assert_eq!(pages.len(), 1);
    assert!(pages[0].is_tab_group);
    assert_eq!(pages[0].context_id, Some(me));
    assert_eq!(pages[0].tab_index, Some(1));
    assert_eq!(h.hook_names(&detail).last().map(String::as_str), Some("onUnload"));
}

#[tokio::test]
async fn rejected_switch_tab_keeps_pages_above_the_group() {
    let h = Harness::new();
    let home = h.boot(&tab_config(), "pages/home/home").await;
    h.settle(&home).await;
    let detail = h.orch.navigator().navigate_to("/pages/detail/detail").await.unwrap();
    h.settle(&detail).await;
    h.sim.fail_next("switchTab", "host busy");

    assert_matches!(
        h.orch.navigator().switch_tab("/pages/me/me").await,
        Err(NavigationError::ContextCreation(_))
    );
    let pages = h.orch.current_pages();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[1].context_id, Some(detail.clone()));
    assert!(!h.hook_names(&detail).contains(&"onUnload".to_string()));

    let me = h.orch.navigator().switch_tab("/pages/me/me").await.unwrap();
    assert_eq!(h.orch.current_pages().len(), 1);
    assert_eq!(h.orch.current_context_id(), Some(me));
    assert_eq!(h.hook_names(&detail).last().map(String::as_str), Some("onUnload"));
}

#[tokio::test]
async fn redirect_from_tab_group_replaces_the_group() {
    let h = Harness::new();
    let home = h.boot(&tab_config(), "pages/home/home").await;
    h.settle(&home).await;

    let redirected = h.orch.navigator().redirect_to("/pages/detail/detail").await.unwrap();
    assert_eq!(redirected, home);
    let pages = h.orch.current_pages();
    assert_eq!(pages.len(), 1);
    assert!(!pages[0].is_tab_group);
    assert_eq!(pages[0].uri, "pages/detail/detail");
    assert_eq!(h.hook_names(&home).last().map(String::as_str), Some("onUnload"));
}
