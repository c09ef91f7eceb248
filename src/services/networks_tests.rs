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

#[tokio::test]
async fn test_create_vpc_rejects_bad_cidr() {
    let server = MockServer::start().await;
    let store = InstanceStore::new();
    let config = test_config(&server.uri());
    let orchestrator = OrchestratorClient::new(&server.uri(), None, reqwest::Client::new()).unwrap();

    let ctx = Ctx {
        store: &store,
        orchestrator: &orchestrator,
        config: &config,
        account_id: "acc-1".to_string(),
    };

    let err = create_vpc(&ctx, "net", "10.0.0.0").await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(store.list("acc-1", EntityKind::Vpc).is_empty());
}

#[tokio::test]
async fn test_create_vpc_and_subnet_flow() {
    let server = MockServer::start().await;
    let store = InstanceStore::new();
    let config = test_config(&server.uri());
    let orchestrator = OrchestratorClient::new(&server.uri(), None, reqwest::Client::new()).unwrap();

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v1.0/nrs/provider/vpcs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "vpc": { "uuid": Uuid::new_v4(), "taskid": "t-vpc" }
        })))
        .mount(&server)
        .await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v1.0/nrs/provider/subnets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "subnet": { "uuid": Uuid::new_v4() }
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

    let vpc = create_vpc(&ctx, "net", "10.0.0.0/16").await.unwrap();
    assert_eq!(vpc.status, ServiceStatus::Active);

    let subnet = create_subnet(&ctx, "net-a", vpc.id, "10.0.1.0/24", Some("site01"))
        .await
        .unwrap();
    assert_eq!(subnet.parent_id, Some(vpc.id));

    let views = describe_subnets(&ctx, &[]);
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].state, "available");
}

#[tokio::test]
async fn test_delete_vpc_with_subnets_is_conflict() {
    let server = MockServer::start().await;
    let store = InstanceStore::new();
    let config = test_config(&server.uri());
    let orchestrator = OrchestratorClient::new(&server.uri(), None, reqwest::Client::new()).unwrap();

    let vpc_id = store.insert(ServiceInstance::new(EntityKind::Vpc, "net", "acc-1"));
    store.set_status(vpc_id, ServiceStatus::Active);
    let subnet =
        ServiceInstance::new(EntityKind::Subnet, "net-a", "acc-1").with_parent(vpc_id);
    let subnet_id = store.insert(subnet);
    store.set_status(subnet_id, ServiceStatus::Active);

    Mock::given(matchers::method("DELETE"))
        .and(matchers::path_regex(r"^/v1.0/nrs/provider/vpcs/.+$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let ctx = Ctx {
        store: &store,
        orchestrator: &orchestrator,
        config: &config,
        account_id: "acc-1".to_string(),
    };

    let err = delete_vpc(&ctx, vpc_id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(store.get(vpc_id).unwrap().status, ServiceStatus::Active);
}

#[tokio::test]
async fn test_vpc_listing_is_account_scoped() {
    let server = MockServer::start().await;
    let store = InstanceStore::new();
    let config = test_config(&server.uri());
    let orchestrator = OrchestratorClient::new(&server.uri(), None, reqwest::Client::new()).unwrap();

    let mine = store.insert(ServiceInstance::new(EntityKind::Vpc, "net", "acc-1"));
    store.set_status(mine, ServiceStatus::Active);
    let other = store.insert(ServiceInstance::new(EntityKind::Vpc, "net", "acc-2"));
    store.set_status(other, ServiceStatus::Active);

    let ctx = Ctx {
        store: &store,
        orchestrator: &orchestrator,
        config: &config,
        account_id: "acc-1".to_string(),
    };

    let views = describe_vpcs(&ctx, &[]);
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].record.id, mine);
}
