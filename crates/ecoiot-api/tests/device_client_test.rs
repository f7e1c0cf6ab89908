#![allow(clippy::unwrap_used)]
// Integration tests for `DeviceClient` using wiremock.

use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ecoiot_api::{
    CommandName, DeviceApi, DeviceClient, DeviceDescriptor, DeviceModel, Error, FailureKind,
    Params, QuickRunParams, Reply,
};

// ── Helpers ─────────────────────────────────────────────────────────

const TIMEOUT: Duration = Duration::from_secs(2);

async fn setup() -> (MockServer, DeviceClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = DeviceClient::with_client(reqwest::Client::new(), &base_url).unwrap();
    (server, client)
}

fn plug() -> DeviceDescriptor {
    DeviceDescriptor::new("10153", DeviceModel::Ac1100).with_name("Pool pump")
}

// ── Read tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_read_device_decodes_padded_json() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/parse_quick_cmd_iot"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "command": [{"cmd": "read_device", "id": 10153, "model": "AC1100"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"command\":[{\"model\":\"AC1100\",\"id\":10153,\"ac_status\":1,\"warning\":0,\"realtime_power\":\"12.5\"}]} %\r\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client
        .request(&plug(), CommandName::ReadDevice, &Params::new(), TIMEOUT)
        .await
        .unwrap();

    let Reply::Body(fields) = reply else {
        panic!("expected a JSON body, got {reply:?}");
    };
    assert_eq!(fields["ac_status"], json!(1));
    assert_eq!(fields["realtime_power"], json!("12.5"));
}

// ── Command tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_quick_run_acknowledged() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/parse_quick_cmd_iot"))
        .and(body_json(json!({
            "command": [{
                "cmd": "quick_run",
                "id": 10153,
                "model": "AC1100",
                "on_type": 0,
                "off_type": 0,
                "always_on": 1,
                "on_time": 0,
                "off_time": 0,
                "val_type": 0,
                "val": 0
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("200 OK%\r\n"))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client
        .request(
            &plug(),
            CommandName::QuickRun,
            &QuickRunParams::ALWAYS_ON.into_params(),
            TIMEOUT,
        )
        .await
        .unwrap();

    assert_eq!(reply, Reply::Ack);
}

#[tokio::test]
async fn test_invalid_id_sends_nothing() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("200 OK"))
        .expect(0)
        .mount(&server)
        .await;

    let device = DeviceDescriptor::new("valve-a", DeviceModel::Wfc01);
    let result = client
        .request(&device, CommandName::QuickStop, &Params::new(), TIMEOUT)
        .await;

    assert!(
        matches!(result, Err(Error::InvalidId { .. })),
        "expected InvalidId error, got: {result:?}"
    );
}

// ── Error classification tests ──────────────────────────────────────

#[tokio::test]
async fn test_garbage_body_is_malformed() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("busy, try later\r\n"))
        .mount(&server)
        .await;

    let err = client
        .request(&plug(), CommandName::ReadDevice, &Params::new(), TIMEOUT)
        .await
        .unwrap_err();

    match err {
        Error::MalformedResponse { ref raw, .. } => {
            assert!(raw.contains("busy"), "raw text should be kept: {raw:?}");
        }
        other => panic!("expected MalformedResponse, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_http_error_status_is_protocol_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let err = client
        .request(&plug(), CommandName::ReadDevice, &Params::new(), TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Protocol { .. }), "got: {err:?}");
    assert_eq!(err.raw_body(), Some("oops"));
}

#[tokio::test]
async fn test_slow_device_times_out() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("200 OK")
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let err = client
        .request(
            &plug(),
            CommandName::ReadDevice,
            &Params::new(),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::Timeout { timeout_ms: 50 }),
        "got: {err:?}"
    );
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_unreachable_gateway_is_transport_error() {
    // Bind a server to get a free port, then shut it down.
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };
    let client =
        DeviceClient::with_client(reqwest::Client::new(), &Url::parse(&uri).unwrap()).unwrap();

    let err = client
        .request(&plug(), CommandName::ReadDevice, &Params::new(), TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transport(_)), "got: {err:?}");
    assert_eq!(err.kind(), FailureKind::Transport);
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_http_client_timeout_classifies_as_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("200 OK")
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    // The HTTP client gives up before the exchange bound does.
    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let client = DeviceClient::with_client(http, &Url::parse(&server.uri()).unwrap()).unwrap();

    let err = client
        .request(&plug(), CommandName::ReadDevice, &Params::new(), TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transport(_)), "got: {err:?}");
    assert_eq!(err.kind(), FailureKind::Timeout);
    assert!(err.is_timeout());
    assert!(!err.is_transport());
}
