use std::time::Duration;

use harvester_core::WorkUnit;
use harvester_engine::{FailureKind, FetchSettings, Fetcher, ReqwestFetcher, Source};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pages(server: &MockServer) -> Source {
    Source::SearchPages {
        base_url: format!("{}/search?type=edismax", server.uri()),
    }
}

fn oai(server: &MockServer) -> Source {
    Source::OaiPmh {
        endpoint: format!("{}/oai2", server.uri()),
        metadata_prefix: "oai_dc".into(),
        set: Some("col:1".into()),
    }
}

#[tokio::test]
async fn fetcher_requests_page_and_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("type", "edismax"))
        .and(query_param("page", "3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>p3</html>", "text/html; charset=utf-8"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(pages(&server), FetchSettings::default()).unwrap();
    let payload = fetcher.fetch(&WorkUnit::Page(3)).await.expect("fetch ok");

    assert_eq!(payload.body.as_ref(), b"<html>p3</html>");
    assert!(payload
        .content_type
        .unwrap()
        .starts_with("text/html"));
}

#[tokio::test]
async fn fetcher_builds_oai_start_and_token_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oai2"))
        .and(query_param("verb", "ListRecords"))
        .and(query_param("metadataPrefix", "oai_dc"))
        .and(query_param("set", "col:1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("first"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oai2"))
        .and(query_param("verb", "ListRecords"))
        .and(query_param("resumptionToken", "oai_dc/200/x"))
        .respond_with(ResponseTemplate::new(200).set_body_string("second"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(oai(&server), FetchSettings::default()).unwrap();
    let first = fetcher.fetch(&WorkUnit::Start).await.unwrap();
    let second = fetcher
        .fetch(&WorkUnit::Token("oai_dc/200/x".into()))
        .await
        .unwrap();

    assert_eq!(first.body.as_ref(), b"first");
    assert_eq!(second.body.as_ref(), b"second");
}

#[tokio::test]
async fn fetcher_sends_configured_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("cookie", "cookie_accepted=true"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let settings = FetchSettings {
        cookie: Some("cookie_accepted=true".into()),
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(pages(&server), settings).unwrap();
    fetcher.fetch(&WorkUnit::Page(1)).await.expect("cookie matched");
}

#[tokio::test]
async fn fetcher_classifies_busy_with_retry_after_hint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(oai(&server), FetchSettings::default()).unwrap();
    let err = fetcher.fetch(&WorkUnit::Start).await.unwrap_err();

    assert_eq!(
        err.kind,
        FailureKind::ServerBusy {
            retry_after: Some(Duration::from_secs(7))
        }
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn fetcher_fails_on_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(pages(&server), FetchSettings::default()).unwrap();
    let err = fetcher.fetch(&WorkUnit::Page(7)).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::HttpStatus(404));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn fetcher_times_out_on_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(pages(&server), settings).unwrap();
    let err = fetcher.fetch(&WorkUnit::Page(2)).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn fetcher_rejects_too_large_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .set_body_string("01234567890"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(pages(&server), settings).unwrap();
    let err = fetcher.fetch(&WorkUnit::Page(1)).await.unwrap_err();

    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
}
