mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{id, ids, init_logging, ScriptedRenderer};
use pretty_assertions::assert_eq;
use snap_core::DiscoveryStatus;
use snap_engine::sources::MusinsaAdapter;
use snap_engine::{
    DiscoverySettings, FetchSettings, HttpListingRenderer, ItemDiscoverer, ListingSettings,
    PageRenderer, ReqwestTransport, SourceAdapter,
};
use snap_logging::Logger;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn discoverer() -> ItemDiscoverer {
    let settings = DiscoverySettings {
        page_timeout: Duration::from_secs(2),
        scroll_wait: Duration::ZERO..Duration::ZERO,
    };
    ItemDiscoverer::new(settings, Logger::new("discover"))
}

#[tokio::test]
async fn stops_at_checkpoint_across_renderings() {
    init_logging();
    let adapter = MusinsaAdapter::new();
    let mut renderer = ScriptedRenderer::new(&[
        &["/snap/103?gf=A", "/snap/102?gf=A"],
        &["/snap/101?gf=A", "/snap/100?gf=A", "/snap/99?gf=A"],
        &["/snap/98?gf=A"],
    ]);

    let found = discoverer()
        .discover(&adapter, &mut renderer, Some(&id("100")), 5)
        .await;

    assert_eq!(found.ids, ids(&["101", "102", "103"]));
    assert_eq!(found.status, DiscoveryStatus::BoundaryReached);
    assert_eq!(found.passes, 2);
    assert_eq!(renderer.opened.as_deref(), Some(adapter.listing_url()));
    assert!(renderer.closed);
}

#[tokio::test]
async fn checkpoint_at_nth_newest_returns_the_newer_ones() {
    init_logging();
    let adapter = MusinsaAdapter::new();
    let listing = ["210", "209", "208", "207", "206"];

    for (n, checkpoint) in listing.iter().enumerate() {
        let mut renderer = ScriptedRenderer::single_page(&listing);
        let found = discoverer()
            .discover(&adapter, &mut renderer, Some(&id(checkpoint)), 3)
            .await;

        let mut expected = ids(&listing[..n]);
        expected.reverse();
        assert_eq!(found.ids, expected);
        assert!(!found.ids.contains(&id(checkpoint)));
    }
}

#[tokio::test]
async fn first_run_crawls_until_passes_run_out() {
    init_logging();
    let adapter = MusinsaAdapter::new();
    let mut renderer = ScriptedRenderer::new(&[
        &["/snap/9", "/snap/8"],
        &["/snap/7", "/snap/6"],
        &["/snap/5", "/snap/4"],
    ]);

    let found = discoverer().discover(&adapter, &mut renderer, None, 2).await;

    assert_eq!(found.ids, ids(&["6", "7", "8", "9"]));
    assert_eq!(found.status, DiscoveryStatus::PassesExhausted);
    assert_eq!(found.passes, 2);
}

#[tokio::test]
async fn non_item_links_and_duplicates_are_ignored() {
    init_logging();
    let adapter = MusinsaAdapter::new();
    let mut renderer = ScriptedRenderer::new(&[&[
        "/snap/main/recommend",
        "/snap/12?gf=A",
        "https://www.musinsa.com/snap/12",
        "/snap/11#comments",
    ]]);

    let found = discoverer().discover(&adapter, &mut renderer, None, 3).await;
    assert_eq!(found.ids, ids(&["11", "12"]));
}

#[tokio::test]
async fn listing_that_never_renders_is_empty_not_fatal() {
    init_logging();
    let adapter = MusinsaAdapter::new();
    let mut renderer = ScriptedRenderer::never_ready();

    let found = discoverer()
        .discover(&adapter, &mut renderer, Some(&id("100")), 5)
        .await;

    assert!(found.is_empty());
    assert!(matches!(found.status, DiscoveryStatus::Unavailable { .. }));
    assert!(renderer.closed);
}

#[tokio::test]
async fn rendering_breakdown_discards_partial_results() {
    init_logging();
    let adapter = MusinsaAdapter::new();
    let mut renderer = ScriptedRenderer::new(&[
        &["/snap/30", "/snap/29"],
        &["/snap/28", "/snap/10"],
    ])
    .failing_after(1);

    let found = discoverer()
        .discover(&adapter, &mut renderer, Some(&id("10")), 5)
        .await;

    assert!(found.is_empty());
    assert!(matches!(found.status, DiscoveryStatus::Unavailable { .. }));
    assert_eq!(found.passes, 1);
    assert!(renderer.closed);
}

fn listing_page(ids: &[&str]) -> String {
    let anchors: String = ids
        .iter()
        .map(|id| format!(r#"<li><a href="/snap/{id}?gf=A">look {id}</a></li>"#))
        .collect();
    format!("<html><body><a href=\"/about\">about</a><ul>{anchors}</ul></body></html>")
}

#[tokio::test]
async fn http_listing_renders_page_by_page() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/snap/main/recommend"))
        .and(query_param_is_missing("page"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(listing_page(&["305", "304"]), "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/snap/main/recommend"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(listing_page(&["303", "302", "301"]), "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let adapter = MusinsaAdapter::with_hosts(&server.uri(), &server.uri());
    let transport = Arc::new(ReqwestTransport::new(FetchSettings::default()).unwrap());
    let mut renderer = HttpListingRenderer::new(
        transport,
        adapter.item_link_selector(),
        ListingSettings::default(),
    )
    .unwrap();

    let found = discoverer()
        .discover(&adapter, &mut renderer, Some(&id("302")), 5)
        .await;

    assert_eq!(found.ids, ids(&["303", "304", "305"]));
    assert_eq!(found.status, DiscoveryStatus::BoundaryReached);
}

#[tokio::test]
async fn http_listing_without_links_is_not_ready() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>maintenance</body></html>"))
        .mount(&server)
        .await;

    let transport = Arc::new(ReqwestTransport::new(FetchSettings::default()).unwrap());
    let mut renderer =
        HttpListingRenderer::new(transport, "a[href*='/snap/']", ListingSettings::default())
            .unwrap();

    let err = renderer
        .open(&format!("{}/snap/main/recommend", server.uri()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("never became ready"));
}
