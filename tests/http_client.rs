//! Integration tests for the HTTP client against a mocked provider.
//!
//! These exercise the wire format end to end: the `apikey` header, paging
//! query parameters, form and JSON bodies, and status handling.

use std::time::Duration;

use idch::{
    ApiRequest, ClientError, DesiredState, Engine, HttpClient, Location, Locator, NetworkSpec,
    ReconcileError, ResourceClient, VmLifecycle, VmSpec, VmState,
};
use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "test-key";

fn client(server: &MockServer) -> HttpClient {
    HttpClient::new(server.uri(), API_KEY, Duration::from_secs(5)).expect("client builds")
}

fn network(uuid: &str, name: &str) -> Value {
    json!({"uuid": uuid, "name": name, "subnet": "10.1.0.0/24", "is_default": false})
}

#[tokio::test]
async fn listing_sends_key_and_paging_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jkt01/network/networks"))
        .and(header("apikey", API_KEY))
        .and(query_param("page", "1"))
        .and(query_param("limit", "100"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([network("net-1", "backend")])),
        )
        .expect(1)
        .mount(&server)
        .await;
    let http = client(&server);

    let found = Locator::new(&http, Location::Jkt01)
        .network_by_name("backend")
        .await
        .expect("lookup succeeds");

    assert_eq!(found.map(|n| n.uuid), Some(String::from("net-1")));
}

#[tokio::test]
async fn network_create_posts_name_and_refetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jkt01/network/networks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jkt01/network/networks"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([network("net-2", "frontend")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/jkt01/network/network"))
        .and(query_param("name", "frontend"))
        .respond_with(ResponseTemplate::new(200).set_body_json(network("net-2", "frontend")))
        .expect(1)
        .mount(&server)
        .await;
    let http = client(&server);
    let desired = DesiredState::Network(NetworkSpec::present("frontend", Location::Jkt01));

    let result = Engine::new(&http)
        .reconcile(&desired)
        .await
        .expect("reconcile succeeds");

    assert!(result.changed);
    assert_eq!(result.actions, ["create"]);
    assert_eq!(result.attributes.get("uuid"), Some(&json!("net-2")));
}

#[tokio::test]
async fn power_off_sends_form_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sgp01/user-resource/vm/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "uuid": "vm-1",
            "name": "web",
            "hostname": "web",
            "vcpu": 1,
            "memory": 1024,
            "private_ipv4": "10.0.0.2",
            "status": "running",
            "storage": [{"uuid": "disk-1", "name": "vda", "size": 20, "primary": true}]
        }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sgp01/network/ip_addresses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sgp01/user-resource/vm/stop"))
        .and(header("apikey", API_KEY))
        .and(body_string_contains("uuid=vm-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uuid": "vm-1"})))
        .expect(1)
        .mount(&server)
        .await;
    let http = client(&server);
    let desired = DesiredState::Vm(VmSpec {
        state: VmState::Lifecycle(VmLifecycle::Inactive),
        ..VmSpec::named("web", Location::Sgp01)
    });

    let result = Engine::new(&http)
        .reconcile(&desired)
        .await
        .expect("reconcile succeeds");

    assert_eq!(result.actions, ["power-off"]);
}

#[tokio::test]
async fn rejected_listing_surfaces_provider_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jkt02/network/ip_addresses"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid API key"})),
        )
        .mount(&server)
        .await;
    let http = client(&server);

    let err = Locator::new(&http, Location::Jkt02)
        .floating_ip(&idch::FloatingIpKey::Name(String::from("edge")))
        .await
        .expect_err("listing is rejected");

    assert_eq!(
        err,
        ReconcileError::Provider {
            operation: String::from("list floating IPs"),
            status: 401,
            body: json!({"message": "Invalid API key"}),
        }
    );
}

#[tokio::test]
async fn empty_and_plain_text_bodies_are_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/jkt01/storage/disks/disk-9"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/jkt01/network/network/net-9"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;
    let http = client(&server);

    let empty = http
        .request(ApiRequest::delete("jkt01/storage/disks/disk-9"))
        .await
        .expect("request succeeds");
    let plain = http
        .request(ApiRequest::delete("jkt01/network/network/net-9"))
        .await
        .expect("request succeeds");

    assert_eq!((empty.status, empty.body), (204, Value::Null));
    assert_eq!(plain.status, 500);
    assert_eq!(plain.body, json!("Internal Server Error"));
}

#[tokio::test]
async fn unreachable_provider_is_a_transport_error() {
    let server = MockServer::start().await;
    let http = client(&server);
    drop(server);

    let err = http
        .request(ApiRequest::get("jkt01/network/networks"))
        .await
        .expect_err("connection refused");

    assert!(matches!(
        err,
        ClientError::Transport { ref path, .. } if path == "jkt01/network/networks"
    ));
}
