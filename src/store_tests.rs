use super::*;

fn instance(account: &str, name: &str) -> ServiceInstance {
    ServiceInstance::new(EntityKind::Instance, name, account)
}

#[test]
fn test_insert_get_remove() {
    let store = InstanceStore::new();
    let record = instance("acc-1", "vm-1");
    let id = store.insert(record);

    assert_eq!(store.get(id).unwrap().name, "vm-1");
    assert!(store.remove(id).is_some());
    assert!(store.get(id).is_none());
}

#[test]
fn test_get_by_resource() {
    let store = InstanceStore::new();
    let id = store.insert(instance("acc-1", "vm-1"));
    let resource_uuid = Uuid::new_v4();

    store.set_resource_uuid(id, resource_uuid);

    assert_eq!(store.get_by_resource(resource_uuid).unwrap().id, id);
    assert!(store.get_by_resource(Uuid::new_v4()).is_none());
}

#[test]
fn test_list_is_account_and_kind_scoped() {
    let store = InstanceStore::new();
    store.insert(instance("acc-1", "vm-1"));
    store.insert(instance("acc-1", "vm-2"));
    store.insert(instance("acc-2", "vm-3"));
    store.insert(ServiceInstance::new(EntityKind::Volume, "vol-1", "acc-1"));

    let listed = store.list("acc-1", EntityKind::Instance);
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|r| r.account_id == "acc-1"));
}

#[test]
fn test_set_error_from_pending_is_error_creation() {
    let store = InstanceStore::new();
    let id = store.insert(instance("acc-1", "vm-1"));

    store.set_status(id, ServiceStatus::Pending);
    let record = store.set_error(id, "backend exploded").unwrap();

    assert_eq!(record.status, ServiceStatus::ErrorCreation);
    assert_eq!(record.last_error.as_deref(), Some("backend exploded"));
}

#[test]
fn test_set_error_from_active_is_error() {
    let store = InstanceStore::new();
    let id = store.insert(instance("acc-1", "vm-1"));

    store.set_status(id, ServiceStatus::Active);
    let record = store.set_error(id, "detach failed").unwrap();

    assert_eq!(record.status, ServiceStatus::Error);
}

#[test]
fn test_activating_clears_previous_error() {
    let store = InstanceStore::new();
    let id = store.insert(instance("acc-1", "vm-1"));

    store.set_error(id, "transient");
    let record = store.set_status(id, ServiceStatus::Active).unwrap();

    assert!(record.last_error.is_none());
}

#[test]
fn test_tag_set_is_unique_per_record() {
    let store = InstanceStore::new();
    let id = store.insert(instance("acc-1", "vm-1"));

    assert_eq!(store.add_tag(id, "env:prod"), Some(true));
    assert_eq!(store.add_tag(id, "env:prod"), Some(false));
    assert_eq!(store.remove_tag(id, "env:prod"), Some(true));
    assert_eq!(store.remove_tag(id, "env:prod"), Some(false));
    assert_eq!(store.add_tag(Uuid::new_v4(), "x"), None);
}

#[test]
fn test_children_of_skips_terminated() {
    let store = InstanceStore::new();
    let vpc_id = store.insert(ServiceInstance::new(EntityKind::Vpc, "vpc-1", "acc-1"));

    let subnet = ServiceInstance::new(EntityKind::Subnet, "sub-1", "acc-1").with_parent(vpc_id);
    let subnet_id = store.insert(subnet);
    let gone = ServiceInstance::new(EntityKind::Subnet, "sub-2", "acc-1").with_parent(vpc_id);
    let gone_id = store.insert(gone);
    store.set_status(gone_id, ServiceStatus::Terminated);

    let children = store.children_of(vpc_id, EntityKind::Subnet);
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, subnet_id);
}

#[test]
fn test_name_taken_ignores_terminated_and_case() {
    let store = InstanceStore::new();
    let id = store.insert(instance("acc-1", "WinHost"));
    store.set_status(id, ServiceStatus::Active);

    assert!(store.name_taken("acc-1", EntityKind::Instance, "winhost"));
    assert!(!store.name_taken("acc-2", EntityKind::Instance, "winhost"));

    store.set_status(id, ServiceStatus::Terminated);
    assert!(!store.name_taken("acc-1", EntityKind::Instance, "winhost"));
}
