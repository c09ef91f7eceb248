mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{post_json, read_json, setup_app, TEST_ACCOUNT};
use ec2gw::models::{EntityKind, ServiceInstance, ServiceStatus};
use ec2gw::AppState;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn seed_vpc(state: &AppState) -> Uuid {
    let record = ServiceInstance::new(EntityKind::Vpc, "net", TEST_ACCOUNT);
    let id = state.store.insert(record);
    state.store.set_resource_uuid(id, Uuid::new_v4());
    state.store.set_status(id, ServiceStatus::Active);
    id
}

fn seed_group(state: &AppState, name: &str) -> (Uuid, Uuid) {
    let record = ServiceInstance::new(EntityKind::SecurityGroup, name, TEST_ACCOUNT);
    let id = state.store.insert(record);
    let resource = Uuid::new_v4();
    state.store.set_resource_uuid(id, resource);
    state.store.set_status(id, ServiceStatus::Active);
    (id, resource)
}

async fn mount_empty_group_detail(backend: &MockServer, resource: Uuid) {
    Mock::given(method("GET"))
        .and(path(format!("/v1.0/nrs/provider/security_groups/{resource}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "security_group": { "uuid": resource, "name": "web", "rules": [] }
        })))
        .mount(backend)
        .await;
}

#[tokio::test]
async fn create_security_group_flow() -> Result<()> {
    let (backend, state, app) = setup_app().await?;
    let vpc_id = seed_vpc(&state);

    Mock::given(method("POST"))
        .and(path("/v1.0/nrs/provider/security_groups"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "security_group": { "uuid": Uuid::new_v4(), "taskid": "t-sg" }
        })))
        .mount(&backend)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/v1.0/nrs/provider/tasks/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task": { "status": "SUCCESS" }
        })))
        .mount(&backend)
        .await;

    let response = app
        .oneshot(post_json(
            "/v1/computeservices/CreateSecurityGroup",
            &json!({
                "GroupName": "web",
                "GroupDescription": "frontend rules",
                "VpcId": vpc_id
            }),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await?;
    assert!(body["groupId"].is_string());

    Ok(())
}

#[tokio::test]
async fn authorize_ingress_with_cidr_encodes_service_string() -> Result<()> {
    let (backend, state, app) = setup_app().await?;
    let (group_id, resource) = seed_group(&state, "web");
    mount_empty_group_detail(&backend, resource).await;

    Mock::given(method("POST"))
        .and(path(format!(
            "/v1.0/nrs/provider/security_groups/{resource}/rules"
        )))
        .and(body_partial_json(json!({
            "rule": {
                "source": { "type": "Cidr", "value": "10.0.0.0/24" },
                "destination": { "type": "SecurityGroup", "value": resource.to_string() },
                "service": "tcp:443"
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "rule": { "uuid": Uuid::new_v4() }
        })))
        .expect(1)
        .mount(&backend)
        .await;

    let response = app
        .oneshot(post_json(
            "/v1/computeservices/AuthorizeSecurityGroupIngress",
            &json!({
                "GroupId": group_id,
                "IpPermissions": [{
                    "IpProtocol": "tcp",
                    "FromPort": 443,
                    "ToPort": 443,
                    "IpRanges": [{ "CidrIp": "10.0.0.0/24" }]
                }]
            }),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn both_source_kinds_is_bad_request() -> Result<()> {
    let (backend, state, app) = setup_app().await?;
    let (group_id, resource) = seed_group(&state, "web");
    mount_empty_group_detail(&backend, resource).await;

    let response = app
        .oneshot(post_json(
            "/v1/computeservices/AuthorizeSecurityGroupIngress",
            &json!({
                "GroupId": group_id,
                "IpPermissions": [{
                    "IpProtocol": "tcp",
                    "FromPort": 80,
                    "ToPort": 80,
                    "IpRanges": [{ "CidrIp": "10.0.0.0/24" }],
                    "UserIdGroupPairs": [{ "GroupId": group_id }]
                }]
            }),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn reversed_port_range_is_bad_request() -> Result<()> {
    let (backend, state, app) = setup_app().await?;
    let (group_id, resource) = seed_group(&state, "web");
    mount_empty_group_detail(&backend, resource).await;

    let response = app
        .oneshot(post_json(
            "/v1/computeservices/AuthorizeSecurityGroupIngress",
            &json!({
                "GroupId": group_id,
                "IpPermissions": [{
                    "IpProtocol": "tcp",
                    "FromPort": 90,
                    "ToPort": 80,
                    "IpRanges": [{ "CidrIp": "10.0.0.0/24" }]
                }]
            }),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn duplicate_rule_is_conflict() -> Result<()> {
    let (backend, state, app) = setup_app().await?;
    let (group_id, resource) = seed_group(&state, "web");

    Mock::given(method("GET"))
        .and(path(format!("/v1.0/nrs/provider/security_groups/{resource}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "security_group": {
                "uuid": resource,
                "name": "web",
                "rules": [{
                    "id": Uuid::new_v4(),
                    "source": { "type": "Cidr", "value": "10.0.0.0/24" },
                    "destination": { "type": "SecurityGroup", "value": resource.to_string() },
                    "service": "tcp:443",
                    "reserved": false
                }]
            }
        })))
        .mount(&backend)
        .await;

    let response = app
        .oneshot(post_json(
            "/v1/computeservices/AuthorizeSecurityGroupIngress",
            &json!({
                "GroupId": group_id,
                "IpPermissions": [{
                    "IpProtocol": "tcp",
                    "FromPort": 443,
                    "ToPort": 443,
                    "IpRanges": [{ "CidrIp": "10.0.0.0/24" }]
                }]
            }),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn describe_decodes_backend_rules() -> Result<()> {
    let (backend, state, app) = setup_app().await?;
    let (group_id, resource) = seed_group(&state, "web");
    let peer = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/v1.0/nrs/provider/security_groups/{resource}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "security_group": {
                "uuid": resource,
                "name": "web",
                "rules": [
                    {
                        "id": Uuid::new_v4(),
                        "source": { "type": "SecurityGroup", "value": peer.to_string() },
                        "destination": { "type": "SecurityGroup", "value": resource.to_string() },
                        "service": "tcp:8000-8080",
                        "reserved": false
                    },
                    {
                        "id": Uuid::new_v4(),
                        "source": { "type": "SecurityGroup", "value": resource.to_string() },
                        "destination": { "type": "Cidr", "value": "0.0.0.0/0" },
                        "service": "*:*",
                        "reserved": true
                    }
                ]
            }
        })))
        .mount(&backend)
        .await;

    let response = app
        .oneshot(post_json(
            "/v1/computeservices/DescribeSecurityGroups",
            &json!({ "GroupId": [group_id] }),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await?;
    let group = &body["securityGroupInfo"][0];

    let ingress = group["ipPermissions"].as_array().unwrap();
    assert_eq!(ingress.len(), 1);
    assert_eq!(ingress[0]["IpProtocol"], "tcp");
    assert_eq!(ingress[0]["FromPort"], 8000);
    assert_eq!(ingress[0]["ToPort"], 8080);

    let egress = group["ipPermissionsEgress"].as_array().unwrap();
    assert_eq!(egress.len(), 1);
    assert_eq!(egress[0]["IpProtocol"], "-1");
    assert_eq!(egress[0]["IpRanges"][0]["CidrIp"], "0.0.0.0/0");

    Ok(())
}
