use spray_core::HttpSettings;
use spray_scanner::{HttpProber, ProbeErrorKind, Prober};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http_settings(disable_http_fallback: bool) -> HttpSettings {
    HttpSettings {
        timeout_secs: 5,
        retries: 0,
        disable_http_fallback,
        ..HttpSettings::default()
    }
}

async fn server_with_admin_page() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><head><title> Admin Console </title></head></html>"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("<title>Not Found</title>"))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_falls_back_to_plain_http() {
    let server = server_with_admin_page().await;
    let prober = HttpProber::new(&http_settings(false), vec![200]).expect("build prober");

    let outcome = prober.probe(&format!("{}/admin", server.uri())).await;

    assert_eq!(outcome.status_code, Some(200));
    assert!(outcome.url.starts_with("http://"));
    assert_eq!(outcome.title.as_deref(), Some("Admin Console"));
    assert_eq!(
        outcome.content_length,
        "<html><head><title> Admin Console </title></head></html>".len() as i64
    );
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn test_title_only_read_for_accepted_statuses() {
    let server = server_with_admin_page().await;
    let prober = HttpProber::new(&http_settings(false), vec![200]).expect("build prober");

    let outcome = prober.probe(&format!("{}/missing", server.uri())).await;

    assert_eq!(outcome.status_code, Some(404));
    assert_eq!(outcome.title, None);
}

#[tokio::test]
async fn test_https_only_reports_transport_error() {
    let server = server_with_admin_page().await;
    let prober = HttpProber::new(&http_settings(true), vec![200]).expect("build prober");

    let outcome = prober.probe(&format!("{}/admin", server.uri())).await;

    assert_eq!(outcome.status_code, None);
    assert_eq!(outcome.content_length, -1);
    assert!(outcome.url.starts_with("https://"));
    let error = outcome.error.expect("probe error");
    assert_eq!(error.kind, ProbeErrorKind::Transport);
    assert!(!error.message.is_empty());
}
