//! Integration tests for the fetch module.
//!
//! These tests verify the rate-limit retry contract with mock HTTP servers.

use std::time::Duration;

use imagepull_core::fetch::{FetchClient, FetchError, FetchOutcome, RequestSpec};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Backoff base small enough to keep retry tests fast.
const FAST_WAIT: Duration = Duration::from_millis(5);

fn spec_for(server: &MockServer, path_str: &str) -> RequestSpec {
    RequestSpec::parse(&format!("{}{}", server.uri(), path_str)).expect("valid test URL")
}

#[tokio::test]
async fn test_success_returns_body_and_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"posts\":[]}"))
        .mount(&server)
        .await;

    let client = FetchClient::new();
    let spec = spec_for(&server, "/posts");
    let outcome = client.fetch_text(&spec, FAST_WAIT, 3).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.status(), 200);
    assert_eq!(outcome.body(), Some("{\"posts\":[]}"));
}

#[tokio::test]
async fn test_rate_limited_then_success_retries_through() {
    let server = MockServer::start().await;
    // First two requests are rate limited, the third succeeds.
    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_string("eventually"))
        .expect(1)
        .mount(&server)
        .await;

    let client = FetchClient::new();
    let spec = spec_for(&server, "/posts");
    let outcome = client.fetch_text(&spec, FAST_WAIT, 3).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.into_body().as_deref(), Some("eventually"));
}

#[tokio::test]
async fn test_exhausting_attempts_on_rate_limits_is_a_distinct_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let client = FetchClient::new();
    let spec = spec_for(&server, "/posts");
    let error = client.fetch_text(&spec, FAST_WAIT, 3).await.unwrap_err();

    assert!(error.is_exhausted(), "expected exhaustion, got {error:?}");
    assert!(matches!(
        error,
        FetchError::RateLimitExhausted { attempts: 3, .. }
    ));
    // The .expect(3) on the mock verifies no fourth attempt was made.
}

#[tokio::test]
async fn test_421_is_also_treated_as_rate_limiting() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(421))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let client = FetchClient::new();
    let spec = spec_for(&server, "/posts");
    let outcome = client.fetch_text(&spec, FAST_WAIT, 3).await.unwrap();
    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_hard_error_is_returned_as_is_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = FetchClient::new();
    let spec = spec_for(&server, "/gone");
    let outcome = client.fetch_text(&spec, FAST_WAIT, 3).await.unwrap();

    match outcome {
        FetchOutcome::Failure { status, diagnostic } => {
            assert_eq!(status, 404);
            assert_eq!(diagnostic, "Not Found");
        }
        FetchOutcome::Success { .. } => panic!("404 must be a failure outcome"),
    }
}

#[tokio::test]
async fn test_server_error_terminates_the_loop_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = FetchClient::new();
    let spec = spec_for(&server, "/flaky");
    let outcome = client.fetch_text(&spec, FAST_WAIT, 5).await.unwrap();
    assert_eq!(outcome.status(), 500);
}

#[tokio::test]
async fn test_connection_refused_is_a_terminal_network_error() {
    // Port 1 is never listening.
    let client = FetchClient::new();
    let spec = RequestSpec::parse("http://127.0.0.1:1/posts").unwrap();
    let error = client.fetch_text(&spec, FAST_WAIT, 3).await.unwrap_err();
    assert!(matches!(error, FetchError::Network { .. }), "{error:?}");
}

#[tokio::test]
async fn test_token_store_refreshes_through_the_client() {
    use imagepull_core::fetch::ApiToken;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("tok-abc"))
        .expect(1)
        .mount(&server)
        .await;

    let client = FetchClient::new();
    let token_spec = spec_for(&server, "/oauth/token");
    for _ in 0..3 {
        let token = client
            .tokens()
            .get_or_refresh("mock-art-site", || async {
                let outcome = client.fetch_text(&token_spec, FAST_WAIT, 3).await?;
                let body = outcome.into_body().ok_or_else(|| {
                    FetchError::credential_refresh("mock-art-site", "token endpoint rejected us")
                })?;
                Ok(ApiToken::new(body, Duration::from_secs(3600)))
            })
            .await
            .unwrap();
        assert_eq!(token, "tok-abc");
    }
    // The .expect(1) on the mock verifies the two later calls reused the
    // stored token instead of refreshing again.
}

#[tokio::test]
async fn test_self_referer_header_is_sent() {
    let server = MockServer::start().await;
    let expected = format!("{}/art/42", server.uri());
    Mock::given(method("GET"))
        .and(path("/art/42"))
        .and(wiremock::matchers::header("referer", expected.as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = FetchClient::new();
    let spec = spec_for(&server, "/art/42").with_self_referer();
    let outcome = client.fetch_text(&spec, FAST_WAIT, 1).await.unwrap();
    assert!(outcome.is_success());
}
