use std::time::Duration;

use snap_engine::{decode_output, FailureKind, FetchSettings, HttpTransport, ReqwestTransport};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn transport_returns_body_and_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/snap/42"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(FetchSettings::default()).unwrap();
    let url = format!("{}/snap/42", server.uri());

    let output = transport.get(&url, TIMEOUT).await.expect("fetch ok");
    assert_eq!(output.metadata.url, url);
    assert_eq!(output.metadata.final_url, url);
    assert_eq!(output.metadata.status, 200);
    assert!(output
        .metadata
        .content_type
        .as_deref()
        .unwrap()
        .starts_with("text/html"));
    assert_eq!(output.bytes, b"<html>ok</html>");
    assert_eq!(decode_output(&output).unwrap(), "<html>ok</html>");
}

#[tokio::test]
async fn browser_like_settings_send_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listing"))
        .and(header("accept-language", "ko-KR,ko;q=0.9,en-US;q=0.8"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(FetchSettings::browser_like()).unwrap();
    let url = format!("{}/listing", server.uri());
    transport.get(&url, TIMEOUT).await.expect("fetch ok");

    let requests = server.received_requests().await.unwrap();
    let agent = requests[0].headers.get("user-agent").unwrap().to_str().unwrap();
    assert!(agent.contains("Mozilla/5.0"));
}

#[tokio::test]
async fn http_status_is_reported_with_transience() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(FetchSettings::default()).unwrap();

    let missing = transport
        .get(&format!("{}/missing", server.uri()), TIMEOUT)
        .await
        .unwrap_err();
    assert_eq!(missing.kind, FailureKind::HttpStatus(404));
    assert!(!missing.is_transient());

    let busy = transport
        .get(&format!("{}/busy", server.uri()), TIMEOUT)
        .await
        .unwrap_err();
    assert_eq!(busy.kind, FailureKind::HttpStatus(503));
    assert!(busy.is_transient());
}

#[tokio::test]
async fn per_call_timeout_is_enforced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(FetchSettings::default()).unwrap();
    let url = format!("{}/slow", server.uri());

    let err = transport
        .get(&url, Duration::from_millis(50))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
    assert!(err.is_transient());
}

#[tokio::test]
async fn oversized_response_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "image/jpeg")
                .set_body_bytes(vec![0u8; 11]),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };
    let transport = ReqwestTransport::new(settings).unwrap();
    let url = format!("{}/large", server.uri());

    let err = transport.get(&url, TIMEOUT).await.unwrap_err();
    assert!(matches!(
        err.kind,
        FailureKind::TooLarge { max_bytes: 10, .. }
    ));
}

#[tokio::test]
async fn malformed_url_is_invalid() {
    let transport = ReqwestTransport::new(FetchSettings::default()).unwrap();
    let err = transport.get("not a url", TIMEOUT).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}
