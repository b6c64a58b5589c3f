//! End-to-end deployments against a wiremock Portainer.

use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::{AccessConfig, Config, ContainerConfig, PortainerConfig, RestartPolicyKind};
use crate::errors::Error;
use crate::types::Step;

fn config_for(server: &MockServer) -> Config {
    Config {
        portainer: PortainerConfig {
            url: Url::parse(&format!("{}/api/", server.uri())).unwrap(),
            login: "deployer".into(),
            password: "hunter2".into(),
            endpoint: "production".into(),
            accept_invalid_certs: false,
            request_timeout: Duration::from_secs(5),
            engine_timeout: Duration::from_secs(5),
        },
        container: ContainerConfig {
            image: "app".into(),
            tag: "1.0".into(),
            name: "app-1".into(),
            registry: "registry.example.com".into(),
            published_ports: Some("tcp/8080/80".into()),
            restart_policy: RestartPolicyKind::No,
            volumes: BTreeMap::new(),
            legacy_volume_binds: false,
        },
        access: AccessConfig {
            teams: vec!["ops".into()],
            administrators_only: false,
            public: true,
        },
    }
}

async fn mount_auth_and_endpoints(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth"))
        .and(body_json(json!({"username": "deployer", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jwt": "token-123"})))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/endpoints"))
        .and(header("Authorization", "Bearer token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"Id": 1, "Name": "local"},
            {"Id": 3, "Name": "production"}
        ])))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_no_containers(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/endpoints/3/docker/containers/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_pull_and_create(server: &MockServer) {
    let registry_auth = general_purpose::STANDARD.encode(r#"{"serveraddress":"registry.example.com"}"#);
    Mock::given(method("POST"))
        .and(path("/api/endpoints/3/docker/images/create"))
        .and(query_param("fromImage", "app:1.0"))
        .and(header("X-Registry-Auth", registry_auth.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"status\":\"Status: Downloaded newer image for app:1.0\"}\n"))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/endpoints/3/docker/containers/create"))
        .and(query_param("name", "app-1"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "Id": "c1",
            "Warnings": null,
            "Portainer": {"ResourceControl": {"Id": 42}}
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_teams(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/teams"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"Id": 7, "Name": "ops"},
            {"Id": 8, "Name": "dev"}
        ])))
        .mount(server)
        .await;
}

#[test_log::test(tokio::test)]
async fn test_deploy_end_to_end() {
    let server = MockServer::start().await;
    mount_auth_and_endpoints(&server).await;
    mount_no_containers(&server).await;
    mount_pull_and_create(&server).await;
    mount_teams(&server).await;

    Mock::given(method("PUT"))
        .and(path("/api/resource_controls/42"))
        .and(header("Authorization", "Bearer token-123"))
        .and(body_json(json!({"public": true, "teams": [7]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Id": 42})))
        .expect(1)
        .mount(&server)
        .await;

    let result = crate::deploy(&config_for(&server)).await.unwrap();

    assert_eq!(result.container_id, "c1");
    assert_eq!(result.resource_control_id, 42);
    assert_eq!(result.endpoint.id, 3);
    assert!(result.warnings.is_empty());

    // The create payload carries the port mapping on the bridge network
    let requests = server.received_requests().await.unwrap();
    let create = requests
        .iter()
        .find(|r| r.url.path() == "/api/endpoints/3/docker/containers/create")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&create.body).unwrap();
    assert_eq!(body["Image"], "app:1.0");
    assert_eq!(body["ExposedPorts"], json!({"8080/tcp": {}}));
    assert_eq!(body["HostConfig"]["PortBindings"], json!({"8080/tcp": [{"HostPort": "80"}]}));
    assert_eq!(body["HostConfig"]["NetworkMode"], "bridge");

    // Exactly one access control update
    let updates = requests.iter().filter(|r| r.method.as_str() == "PUT").count();
    assert_eq!(updates, 1);
}

#[tokio::test]
async fn test_deploy_replaces_existing_container() {
    let server = MockServer::start().await;
    mount_auth_and_endpoints(&server).await;
    mount_pull_and_create(&server).await;
    mount_teams(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/endpoints/3/docker/containers/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"Id": "0123456789abcdef", "Names": ["/app-1"], "Image": "app:0.9", "State": "running"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/endpoints/3/docker/containers/0123456789abcdef"))
        .and(query_param("force", "true"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/resource_controls/42"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let result = crate::deploy(&config_for(&server)).await.unwrap();
    assert_eq!(result.removed_containers, vec!["0123456789abcdef".to_string()]);
}

#[tokio::test]
async fn test_deploy_unknown_endpoint_touches_nothing() {
    let server = MockServer::start().await;
    mount_auth_and_endpoints(&server).await;
    Mock::given(path("/api/endpoints/3/docker/containers/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.portainer.endpoint = "staging".into();

    let err = crate::deploy(&config).await.unwrap_err();
    assert!(matches!(err, Error::EndpointNotFound { .. }));
    assert_eq!(err.to_string(), "Endpoint with name 'staging' not found");
}

#[tokio::test]
async fn test_deploy_unknown_team_leaves_container() {
    let server = MockServer::start().await;
    mount_auth_and_endpoints(&server).await;
    mount_no_containers(&server).await;
    mount_pull_and_create(&server).await;
    mount_teams(&server).await;
    Mock::given(method("PUT"))
        .and(path("/api/resource_controls/42"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.access.teams = vec!["qa".into()];

    let err = crate::deploy(&config).await.unwrap_err();
    assert!(matches!(err, Error::TeamNotFound { ref team } if team == "qa"));
    assert_eq!(err.step(), Step::ApplyAccessControl);
}

#[tokio::test]
async fn test_deploy_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"message": "Invalid credentials"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let err = crate::deploy(&config_for(&server)).await.unwrap_err();
    assert!(matches!(err, Error::Auth { ref source } if source.status() == Some(422)));
}
