//! Tests for page discovery and link extraction against a mock CMR endpoint.

use std::time::Duration;

use granule_search::{
    discover_pages, extract_links, parse_timestamp, Collections, GranuleFeed, GranuleQuery,
    LinkFilter, PageDescriptor, SearchError, TemporalRange,
};
use reqwest::{Client, Url};
use test_utils::{assets, empty_feed, granule_feed, read_crate_test_file};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COLLECTION: &str = "C1373412034-LPDAAC_ECS";

fn viirs_query(page_size: u32) -> GranuleQuery {
    let temporal = TemporalRange::new(
        parse_timestamp("2021-10-17").unwrap(),
        parse_timestamp("2021-10-19").unwrap(),
    )
    .unwrap();
    GranuleQuery::new(Collections::single(COLLECTION).unwrap(), temporal, page_size).unwrap()
}

fn granules_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}/search/granules", server.uri())).unwrap()
}

fn page(server: &MockServer, index: u64) -> PageDescriptor {
    let url = Url::parse(&format!(
        "{}/search/granules.json?page_size=2&page_num={}",
        server.uri(),
        index
    ))
    .unwrap();
    PageDescriptor { index, url }
}

async fn mount_page(server: &MockServer, index: u64, body: String, delay: Duration) {
    Mock::given(method("GET"))
        .and(path("/search/granules.json"))
        .and(query_param("page_num", index.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

// ============================================================================
// discover_pages
// ============================================================================

#[tokio::test]
async fn test_discover_pages_sends_query_and_paginates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/granules"))
        .and(query_param("concept_id", COLLECTION))
        .and(query_param(
            "temporal",
            "2021-10-17T00:00:00Z,2021-10-19T00:00:00Z",
        ))
        .and(query_param("page_size", "10"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).insert_header("CMR-Hits", "23"))
        .expect(1)
        .mount(&server)
        .await;

    let pages = discover_pages(&Client::new(), &granules_url(&server), &viirs_query(10))
        .await
        .unwrap();

    assert_eq!(pages.len(), 3);
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.index, i as u64 + 1);
        assert_eq!(page.url.path(), "/search/granules.json");
        let pairs: Vec<(String, String)> = page.url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("concept_id".to_string(), COLLECTION.to_string())));
        assert_eq!(
            pairs.last(),
            Some(&("page_num".to_string(), page.index.to_string()))
        );
    }
}

#[tokio::test]
async fn test_discover_pages_zero_hits_yields_no_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/granules"))
        .respond_with(ResponseTemplate::new(200).insert_header("CMR-Hits", "0"))
        .mount(&server)
        .await;

    let pages = discover_pages(&Client::new(), &granules_url(&server), &viirs_query(10))
        .await
        .unwrap();
    assert!(pages.is_empty());
}

#[tokio::test]
async fn test_discover_pages_error_status_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/granules"))
        .respond_with(ResponseTemplate::new(400).insert_header("CMR-Hits", "50"))
        .mount(&server)
        .await;

    let err = discover_pages(&Client::new(), &granules_url(&server), &viirs_query(10))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::DiscoveryFailed { status: 400 }));
    assert_eq!(err.status(), Some(400));
}

#[tokio::test]
async fn test_discover_pages_missing_hits_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/granules"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = discover_pages(&Client::new(), &granules_url(&server), &viirs_query(10))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::MalformedResponse(_)));
}

// ============================================================================
// extract_links
// ============================================================================

#[tokio::test]
async fn test_extract_links_keeps_page_order() {
    let server = MockServer::start().await;

    // First page answers last; order must still follow page index.
    mount_page(
        &server,
        1,
        granule_feed(&[&[assets::VNP09GA_H06V11]]),
        Duration::from_millis(200),
    )
    .await;
    mount_page(
        &server,
        2,
        granule_feed(&[&[assets::VNP09GA_H07V05, assets::VNP09GA_BROWSE]]),
        Duration::ZERO,
    )
    .await;

    let pages = vec![page(&server, 1), page(&server, 2)];
    let report = extract_links(&Client::new(), &pages, &LinkFilter::new(".h5"), 4).await;

    assert!(report.is_complete());
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(
        report.links,
        vec![
            assets::VNP09GA_H06V11.to_string(),
            assets::VNP09GA_H07V05.to_string()
        ]
    );
}

#[tokio::test]
async fn test_extract_links_filters_scheme_and_suffix() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        1,
        granule_feed(&[
            &[
                assets::VNP09GA_HTTP,
                assets::VNP09GA_S3,
                assets::VNP09GA_XML,
                assets::VNP09GA_BROWSE,
                assets::VNP09GA_H06V11,
            ],
            &["ftp://host/x.h5", "https://host/readme.txt"],
        ]),
        Duration::ZERO,
    )
    .await;

    let report = extract_links(
        &Client::new(),
        &[page(&server, 1)],
        &LinkFilter::new(".h5"),
        1,
    )
    .await;

    assert_eq!(report.links, vec![assets::VNP09GA_H06V11.to_string()]);
    for link in &report.links {
        assert!(link.starts_with("https://"));
        assert!(link.ends_with(".h5"));
    }
}

#[tokio::test]
async fn test_extract_links_does_not_deduplicate() {
    let server = MockServer::start().await;
    let body = granule_feed(&[&[assets::VNP09GA_H06V11]]);
    mount_page(&server, 1, body.clone(), Duration::ZERO).await;
    mount_page(&server, 2, body, Duration::ZERO).await;

    let report = extract_links(
        &Client::new(),
        &[page(&server, 1), page(&server, 2)],
        &LinkFilter::new(".h5"),
        2,
    )
    .await;
    assert_eq!(report.links.len(), 2);
}

#[tokio::test]
async fn test_extract_links_empty_when_nothing_matches() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        1,
        granule_feed(&[&[assets::VNP09GA_BROWSE], &[]]),
        Duration::ZERO,
    )
    .await;
    mount_page(&server, 2, empty_feed(), Duration::ZERO).await;

    let report = extract_links(
        &Client::new(),
        &[page(&server, 1), page(&server, 2)],
        &LinkFilter::new(".h5"),
        2,
    )
    .await;

    assert!(report.links.is_empty());
    assert!(report.is_complete());
}

#[tokio::test]
async fn test_extract_links_isolates_failed_pages() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        1,
        granule_feed(&[&[assets::VNP09GA_H06V11]]),
        Duration::ZERO,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/search/granules.json"))
        .and(query_param("page_num", "2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_page(&server, 3, r#"{"feed": {}}"#.to_string(), Duration::ZERO).await;
    mount_page(
        &server,
        4,
        granule_feed(&[&[assets::VNP09GA_H07V05]]),
        Duration::ZERO,
    )
    .await;

    let pages: Vec<PageDescriptor> = (1..=4).map(|i| page(&server, i)).collect();
    let report = extract_links(&Client::new(), &pages, &LinkFilter::new(".h5"), 4).await;

    assert_eq!(
        report.links,
        vec![
            assets::VNP09GA_H06V11.to_string(),
            assets::VNP09GA_H07V05.to_string()
        ]
    );
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.failures.len(), 2);
    assert!(matches!(
        report.failures[0].error,
        SearchError::PageStatus { page: 2, status: 503 }
    ));
    assert!(matches!(
        report.failures[1].error,
        SearchError::MalformedResponse(_)
    ));
}

#[tokio::test]
async fn test_extract_links_transport_failure_is_per_page() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        1,
        granule_feed(&[&[assets::VNP09GA_H06V11]]),
        Duration::ZERO,
    )
    .await;

    // Reserve a port, then release it so the connection is refused.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dead = PageDescriptor {
        index: 2,
        url: Url::parse(&format!("http://127.0.0.1:{port}/search/granules.json?page_num=2"))
            .unwrap(),
    };

    let report = extract_links(
        &Client::new(),
        &[page(&server, 1), dead],
        &LinkFilter::new(".h5"),
        2,
    )
    .await;

    assert_eq!(report.links.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0].error,
        SearchError::ExtractionTransportFailed { page: 2, .. }
    ));
}

// ============================================================================
// end to end
// ============================================================================

#[tokio::test]
async fn test_discover_then_extract() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/granules"))
        .respond_with(ResponseTemplate::new(200).insert_header("CMR-Hits", "3"))
        .mount(&server)
        .await;
    mount_page(
        &server,
        1,
        granule_feed(&[&[assets::VNP09GA_H06V11], &[assets::VNP09GA_H07V05]]),
        Duration::ZERO,
    )
    .await;
    mount_page(&server, 2, granule_feed(&[&[assets::VNP09GA_XML]]), Duration::ZERO).await;

    let client = Client::new();
    let pages = discover_pages(&client, &granules_url(&server), &viirs_query(2))
        .await
        .unwrap();
    assert_eq!(pages.len(), 2);

    let report = extract_links(&client, &pages, &LinkFilter::new(".h5"), 2).await;
    assert!(report.is_complete());
    assert_eq!(report.links.len(), 2);
}

#[test]
fn test_recorded_page_fixture() {
    let body = read_crate_test_file("granule-search", "vnp09ga_page1.json");
    let feed = GranuleFeed::from_slice(body.as_bytes()).unwrap();
    let filter = LinkFilter::new(".h5");

    let links: Vec<&str> = feed.asset_links(&filter).collect();
    assert_eq!(links.len(), 2);
    assert!(links[0].contains("h06v11"));
    assert!(links[1].contains("h07v05"));
}
