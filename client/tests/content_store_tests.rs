//! Integration tests for the comment content store
//!
//! These tests use mock servers to simulate the pinning API and gateway.

use ballotbox_client::{CommentBody, ContentStore, PinataStore, VotingConfig, VotingError};
use chrono::{TimeZone, Utc};
use ethers::types::Address;
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Helper to create a store pointed at mock servers
fn create_store(api_url: String, gateway_url: String, jwt: Option<&str>) -> PinataStore {
    let config = VotingConfig::sepolia()
        .with_content_store(api_url, gateway_url, jwt.map(str::to_string))
        .with_request_timeout(Duration::from_secs(5))
        .with_max_retries(2)
        .with_retry_config(10, 50, 2.0);
    PinataStore::new(&config).unwrap()
}

fn sample_body() -> CommentBody {
    CommentBody {
        text: "Ship it".to_string(),
        author: Address::repeat_byte(0x0a),
        proposal_id: 7,
        timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    }
}

#[tokio::test]
async fn test_put_pins_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pinning/pinJSONToIPFS"))
        .and(header("authorization", "Bearer test-jwt"))
        .and(body_partial_json(serde_json::json!({
            "pinataContent": {
                "text": "Ship it",
                "proposal_id": 7
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "IpfsHash": "QmPinned",
            "PinSize": 123,
            "Timestamp": "2024-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = create_store(mock_server.uri(), mock_server.uri(), Some("test-jwt"));
    let content_ref = store.put(&sample_body()).await.unwrap();
    assert_eq!(content_ref, "QmPinned");
}

#[tokio::test]
async fn test_put_retries_server_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pinning/pinJSONToIPFS"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/pinning/pinJSONToIPFS"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "IpfsHash": "QmRetry" })),
        )
        .mount(&mock_server)
        .await;

    let store = create_store(mock_server.uri(), mock_server.uri(), Some("test-jwt"));
    assert_eq!(store.put(&sample_body()).await.unwrap(), "QmRetry");
}

#[tokio::test]
async fn test_put_rejected_credentials_are_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pinning/pinJSONToIPFS"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = create_store(mock_server.uri(), mock_server.uri(), Some("bad-jwt"));
    let err = store.put(&sample_body()).await.unwrap_err();
    match err {
        VotingError::ContentStore(msg) => assert!(msg.contains("401")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_put_without_jwt_makes_no_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = create_store(mock_server.uri(), mock_server.uri(), None);
    let err = store.put(&sample_body()).await.unwrap_err();
    assert!(matches!(err, VotingError::NotConfigured(_)));
}

#[tokio::test]
async fn test_test_authentication() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/testAuthentication"))
        .and(header("authorization", "Bearer test-jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "Congratulations! You are communicating with the Pinata API!"
        })))
        .mount(&mock_server)
        .await;

    let store = create_store(mock_server.uri(), mock_server.uri(), Some("test-jwt"));
    assert!(store.test_authentication().await.unwrap());
}

#[tokio::test]
async fn test_get_fetches_body_from_gateway() {
    let mut gateway = mockito::Server::new_async().await;
    let body = sample_body();

    let mock = gateway
        .mock("GET", "/ipfs/QmBody")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(serde_json::to_string(&body).unwrap())
        .expect(1)
        .create_async()
        .await;

    let store = create_store("http://pinning.test".to_string(), gateway.url(), None);
    let fetched = store.get("ipfs://QmBody").await.unwrap();

    assert_eq!(fetched, body);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_get_missing_body() {
    let mut gateway = mockito::Server::new_async().await;

    let mock = gateway
        .mock("GET", "/ipfs/QmMissing")
        .with_status(404)
        .with_body("not found")
        .expect(1)
        .create_async()
        .await;

    let store = create_store("http://pinning.test".to_string(), gateway.url(), None);
    let err = store.get("QmMissing").await.unwrap_err();

    assert!(matches!(err, VotingError::ContentStore(ref msg) if msg.starts_with("HTTP 404")));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_get_rate_limited() {
    let mut gateway = mockito::Server::new_async().await;

    let mock = gateway
        .mock("GET", "/ipfs/QmBusy")
        .with_status(429)
        .with_header("retry-after", "1")
        .expect(3)
        .create_async()
        .await;

    let store = create_store("http://pinning.test".to_string(), gateway.url(), None);
    let err = store.get("QmBusy").await.unwrap_err();

    assert!(matches!(err, VotingError::MaxRetriesExceeded(2)));
    mock.assert_async().await;
}
