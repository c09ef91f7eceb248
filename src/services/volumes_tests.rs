use super::*;
use crate::config::Config;
use crate::orchestrator::OrchestratorClient;
use crate::store::InstanceStore;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

fn test_config(backend_url: &str) -> Config {
    Config {
        log_level: "info".to_string(),
        address: "127.0.0.1:0".to_string(),
        api_key: None,
        backend_url: backend_url.to_string(),
        backend_token: None,
        account_acronym: "csi".to_string(),
        poll_interval_secs: 0,
        task_timeout_secs: 2,
        provision_timeout_secs: 2,
    }
}

fn active_volume(store: &InstanceStore, account: &str, boot: bool) -> Uuid {
    let record = ServiceInstance::new(EntityKind::Volume, "data-1", account)
        .with_config(serde_json::json!({ "boot": boot, "size_gb": 50 }));
    let id = store.insert(record);
    store.set_resource_uuid(id, Uuid::new_v4());
    store.set_status(id, ServiceStatus::Active);
    id
}

fn active_instance(store: &InstanceStore, account: &str) -> Uuid {
    let record = ServiceInstance::new(EntityKind::Instance, "web", account);
    let id = store.insert(record);
    store.set_resource_uuid(id, Uuid::new_v4());
    store.set_status(id, ServiceStatus::Active);
    id
}

#[tokio::test]
async fn test_create_volume_checks_quota_first() {
    let server = MockServer::start().await;
    let store = InstanceStore::new();
    let config = test_config(&server.uri());
    let orchestrator = OrchestratorClient::new(&server.uri(), None, reqwest::Client::new()).unwrap();

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v1.0/nrs/provider/quotas/check"))
        .and(matchers::body_partial_json(serde_json::json!({
            "quota": { "deltas": { "compute.blocks": 100, "compute.volumes": 1 } }
        })))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": "compute.blocks exceeded"
        })))
        .mount(&server)
        .await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v1.0/nrs/provider/volumes"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let ctx = Ctx {
        store: &store,
        orchestrator: &orchestrator,
        config: &config,
        account_id: "acc-1".to_string(),
    };

    let err = create_volume(
        &ctx,
        CreateVolumeParams {
            name: "data-1".to_string(),
            size_gb: 100,
            volume_type: None,
            availability_zone: None,
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::QuotaExceeded(_)));
    assert!(store.list("acc-1", EntityKind::Volume).is_empty());
}

#[tokio::test]
async fn test_delete_attached_volume_is_conflict() {
    let server = MockServer::start().await;
    let store = InstanceStore::new();
    let config = test_config(&server.uri());
    let orchestrator = OrchestratorClient::new(&server.uri(), None, reqwest::Client::new()).unwrap();

    let instance_id = active_instance(&store, "acc-1");
    let volume_id = active_volume(&store, "acc-1", false);
    store.update(volume_id, |r| r.parent_id = Some(instance_id));

    let ctx = Ctx {
        store: &store,
        orchestrator: &orchestrator,
        config: &config,
        account_id: "acc-1".to_string(),
    };

    let err = delete_volume(&ctx, volume_id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_attach_already_attached_is_conflict() {
    let server = MockServer::start().await;
    let store = InstanceStore::new();
    let config = test_config(&server.uri());
    let orchestrator = OrchestratorClient::new(&server.uri(), None, reqwest::Client::new()).unwrap();

    let instance_id = active_instance(&store, "acc-1");
    let volume_id = active_volume(&store, "acc-1", false);
    store.update(volume_id, |r| r.parent_id = Some(instance_id));

    let ctx = Ctx {
        store: &store,
        orchestrator: &orchestrator,
        config: &config,
        account_id: "acc-1".to_string(),
    };

    let err = attach_volume(&ctx, volume_id, instance_id, "/dev/sdb")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_detach_root_device_is_rejected() {
    let server = MockServer::start().await;
    let store = InstanceStore::new();
    let config = test_config(&server.uri());
    let orchestrator = OrchestratorClient::new(&server.uri(), None, reqwest::Client::new()).unwrap();

    let instance_id = active_instance(&store, "acc-1");
    let volume_id = active_volume(&store, "acc-1", true);
    store.update(volume_id, |r| r.parent_id = Some(instance_id));

    let ctx = Ctx {
        store: &store,
        orchestrator: &orchestrator,
        config: &config,
        account_id: "acc-1".to_string(),
    };

    let err = detach_volume(&ctx, volume_id).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_attach_and_detach_round_trip() {
    let server = MockServer::start().await;
    let store = InstanceStore::new();
    let config = test_config(&server.uri());
    let orchestrator = OrchestratorClient::new(&server.uri(), None, reqwest::Client::new()).unwrap();

    let instance_id = active_instance(&store, "acc-1");
    let volume_id = active_volume(&store, "acc-1", false);

    Mock::given(matchers::method("POST"))
        .and(matchers::path_regex(r"^/v1.0/nrs/provider/instances/.+/volumes$"))
        .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
            "taskid": "t-attach"
        })))
        .mount(&server)
        .await;

    Mock::given(matchers::method("DELETE"))
        .and(matchers::path_regex(r"^/v1.0/nrs/provider/instances/.+/volumes/.+$"))
        .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
            "taskid": "t-detach"
        })))
        .mount(&server)
        .await;

    Mock::given(matchers::method("GET"))
        .and(matchers::path_regex(r"^/v1.0/nrs/provider/tasks/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "task": { "status": "SUCCESS" }
        })))
        .mount(&server)
        .await;

    let ctx = Ctx {
        store: &store,
        orchestrator: &orchestrator,
        config: &config,
        account_id: "acc-1".to_string(),
    };

    attach_volume(&ctx, volume_id, instance_id, "/dev/sdb")
        .await
        .unwrap();
    let attached = store.get(volume_id).unwrap();
    assert_eq!(attached.parent_id, Some(instance_id));
    assert_eq!(attached.config["device"], "/dev/sdb");

    let views = describe_volumes(&ctx, &[]);
    assert_eq!(views[0].state, "in-use");

    detach_volume(&ctx, volume_id).await.unwrap();
    let detached = store.get(volume_id).unwrap();
    assert_eq!(detached.parent_id, None);

    let views = describe_volumes(&ctx, &[]);
    assert_eq!(views[0].state, "available");
}
