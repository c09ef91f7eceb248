mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{post_json, read_json, setup_app, TEST_ACCOUNT};
use ec2gw::models::{EntityKind, ServiceInstance, ServiceStatus};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_provision_backend(backend: &MockServer, image_id: Uuid, resource: Uuid) {
    Mock::given(method("GET"))
        .and(path(format!("/v1.0/nrs/provider/images/{image_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image": {
                "uuid": image_id,
                "name": "ubuntu-24.04",
                "state": "available",
                "min_disk_size_gb": 20,
                "platform": "linux",
            }
        })))
        .mount(backend)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/nrs/provider/flavors/vm.m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "flavor": { "name": "vm.m1", "vcpus": 2, "ram_mb": 4096, "disk_gb": 40 }
        })))
        .mount(backend)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1.0/nrs/provider/quotas/check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(backend)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1.0/nrs/provider/instances"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "instance": { "uuid": resource, "taskid": "t-run" }
        })))
        .mount(backend)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/v1.0/nrs/provider/tasks/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task": { "status": "SUCCESS" }
        })))
        .mount(backend)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1.0/nrs/provider/instances/{resource}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "instance": {
                "uuid": resource,
                "name": "web-csi",
                "state": "poweredOn",
                "volumes": [
                    { "uuid": Uuid::new_v4(), "boot": true, "size_gb": 40, "device": "/dev/sda1" }
                ]
            }
        })))
        .mount(backend)
        .await;
}

#[tokio::test]
async fn run_then_describe_instance_flow() -> Result<()> {
    let (backend, _state, app) = setup_app().await?;
    let image_id = Uuid::new_v4();
    let resource = Uuid::new_v4();
    mount_provision_backend(&backend, image_id, resource).await;

    let run_resp = app
        .clone()
        .oneshot(post_json(
            "/v1/computeservices/RunInstances",
            &json!({
                "Name": "web",
                "ImageId": image_id,
                "InstanceType": "vm.m1",
                "Placement": { "AvailabilityZone": "site01" },
                "TagSpecification": [
                    { "ResourceType": "instance", "Tags": [{ "Key": "env", "Value": "prod" }] }
                ]
            }),
        ))
        .await?;

    assert_eq!(run_resp.status(), StatusCode::CREATED);
    let run_body = read_json(run_resp).await?;
    let item = &run_body["instancesSet"][0];
    assert_eq!(item["nvl-name"], "web");
    assert_eq!(item["nvl-state"], "ACTIVE");
    assert_eq!(item["nvl-ownerAlias"], TEST_ACCOUNT);
    assert_eq!(item["instanceType"], "vm.m1");
    assert_eq!(item["tagSet"][0]["key"], "env=prod");

    let describe_resp = app
        .clone()
        .oneshot(post_json("/v1/computeservices/DescribeInstances", &json!({})))
        .await?;

    assert_eq!(describe_resp.status(), StatusCode::OK);
    let describe_body = read_json(describe_resp).await?;
    let reservations = describe_body["reservationSet"].as_array().unwrap();
    assert_eq!(reservations.len(), 1);
    let described = &reservations[0]["instancesSet"][0];
    // ACTIVE + poweredOn projects to running
    assert_eq!(described["instanceState"]["name"], "running");
    assert_eq!(described["instanceState"]["code"], 16);

    Ok(())
}

#[tokio::test]
async fn missing_account_header_is_rejected() -> Result<()> {
    let (_backend, _state, app) = setup_app().await?;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/computeservices/DescribeInstances")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = read_json(response).await?;
    assert_eq!(body["error"]["type"], "bad_request");

    Ok(())
}

#[tokio::test]
async fn run_instances_validates_name() -> Result<()> {
    let (_backend, _state, app) = setup_app().await?;

    let response = app
        .oneshot(post_json(
            "/v1/computeservices/RunInstances",
            &json!({
                "Name": "",
                "ImageId": Uuid::new_v4(),
                "InstanceType": "vm.m1"
            }),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await?;
    assert_eq!(body["error"]["type"], "validation_error");

    Ok(())
}

#[tokio::test]
async fn multi_instance_launches_are_rejected() -> Result<()> {
    let (_backend, _state, app) = setup_app().await?;

    let response = app
        .oneshot(post_json(
            "/v1/computeservices/RunInstances",
            &json!({
                "Name": "web",
                "ImageId": Uuid::new_v4(),
                "InstanceType": "vm.m1",
                "MinCount": 3,
                "MaxCount": 3
            }),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn describe_instances_paginates() -> Result<()> {
    let (_backend, state, app) = setup_app().await?;

    for index in 0..6 {
        let record = ServiceInstance::new(
            EntityKind::Instance,
            format!("vm-{index}"),
            TEST_ACCOUNT,
        );
        let id = state.store.insert(record);
        state.store.set_status(id, ServiceStatus::Pending);
    }

    let first_page = read_json(
        app.clone()
            .oneshot(post_json(
                "/v1/computeservices/DescribeInstances",
                &json!({ "MaxResults": 5 }),
            ))
            .await?,
    )
    .await?;

    assert_eq!(first_page["reservationSet"].as_array().unwrap().len(), 5);
    assert_eq!(first_page["nextToken"], "1");

    let second_page = read_json(
        app.clone()
            .oneshot(post_json(
                "/v1/computeservices/DescribeInstances",
                &json!({ "MaxResults": 5, "NextToken": "1" }),
            ))
            .await?,
    )
    .await?;

    assert_eq!(second_page["reservationSet"].as_array().unwrap().len(), 1);
    assert!(second_page["nextToken"].is_null());

    Ok(())
}

#[tokio::test]
async fn quota_refusal_surfaces_as_403() -> Result<()> {
    let (backend, _state, app) = setup_app().await?;
    let image_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/v1.0/nrs/provider/images/{image_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image": {
                "uuid": image_id,
                "name": "ubuntu-24.04",
                "min_disk_size_gb": 20,
                "platform": "linux",
            }
        })))
        .mount(&backend)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/nrs/provider/flavors/vm.m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "flavor": { "name": "vm.m1", "vcpus": 2, "ram_mb": 4096, "disk_gb": 40 }
        })))
        .mount(&backend)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1.0/nrs/provider/quotas/check"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": "compute.instances exceeded"
        })))
        .mount(&backend)
        .await;

    let response = app
        .oneshot(post_json(
            "/v1/computeservices/RunInstances",
            &json!({
                "Name": "web",
                "ImageId": image_id,
                "InstanceType": "vm.m1"
            }),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = read_json(response).await?;
    assert_eq!(body["error"]["type"], "quota_exceeded");
    assert_eq!(body["error"]["message"], "compute.instances exceeded");

    Ok(())
}

#[tokio::test]
async fn api_key_gate_rejects_unknown_callers() -> Result<()> {
    let backend = MockServer::start().await;
    let state = ec2gw::AppState::new(common::test_config(&backend.uri(), Some("sekret")))?;
    let app = ec2gw::router::create_router(state);

    let response = app
        .clone()
        .oneshot(post_json("/v1/computeservices/DescribeInstances", &json!({})))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let mut request = post_json("/v1/computeservices/DescribeInstances", &json!({}));
    request
        .headers_mut()
        .insert("x-api-key", "sekret".parse().unwrap());
    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}
