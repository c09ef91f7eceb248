use crate::models::{EntityKind, ServiceInstance, ServiceStatus};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// In-process registry of service-instance records.
///
/// Stands in for the service controller's instance tables; every plugin
/// operation receives it as an explicit collaborator instead of reaching
/// through a shared controller object.
#[derive(Clone, Default)]
pub struct InstanceStore {
    records: Arc<RwLock<HashMap<Uuid, ServiceInstance>>>,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: ServiceInstance) -> Uuid {
        let id = record.id;
        self.records
            .write()
            .expect("store lock poisoned")
            .insert(id, record);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<ServiceInstance> {
        self.records
            .read()
            .expect("store lock poisoned")
            .get(&id)
            .cloned()
    }

    pub fn get_by_resource(&self, resource_uuid: Uuid) -> Option<ServiceInstance> {
        self.records
            .read()
            .expect("store lock poisoned")
            .values()
            .find(|r| r.resource_uuid == Some(resource_uuid))
            .cloned()
    }

    /// Account-scoped listing, oldest first so pagination stays stable.
    pub fn list(&self, account_id: &str, kind: EntityKind) -> Vec<ServiceInstance> {
        let mut records: Vec<ServiceInstance> = self
            .records
            .read()
            .expect("store lock poisoned")
            .values()
            .filter(|r| r.kind == kind && r.account_id == account_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        records
    }

    pub fn update<F>(&self, id: Uuid, mutate: F) -> Option<ServiceInstance>
    where
        F: FnOnce(&mut ServiceInstance),
    {
        let mut records = self.records.write().expect("store lock poisoned");
        let record = records.get_mut(&id)?;
        mutate(record);
        Some(record.clone())
    }

    pub fn set_status(&self, id: Uuid, status: ServiceStatus) -> Option<ServiceInstance> {
        self.update(id, |r| {
            r.status = status;
            if status == ServiceStatus::Active {
                r.last_error = None;
            }
        })
    }

    pub fn set_resource_uuid(&self, id: Uuid, resource_uuid: Uuid) -> Option<ServiceInstance> {
        self.update(id, |r| r.resource_uuid = Some(resource_uuid))
    }

    /// Marks a record failed, attaching the backend's error text.
    pub fn set_error(&self, id: Uuid, error: impl Into<String>) -> Option<ServiceInstance> {
        let error = error.into();
        self.update(id, move |r| {
            r.status = if r.status == ServiceStatus::Pending || r.status == ServiceStatus::Building
            {
                ServiceStatus::ErrorCreation
            } else {
                ServiceStatus::Error
            };
            r.last_error = Some(error);
        })
    }

    pub fn remove(&self, id: Uuid) -> Option<ServiceInstance> {
        self.records
            .write()
            .expect("store lock poisoned")
            .remove(&id)
    }

    /// Tag sets are unique per record: adding an existing tag returns false.
    pub fn add_tag(&self, id: Uuid, tag: &str) -> Option<bool> {
        let mut records = self.records.write().expect("store lock poisoned");
        let record = records.get_mut(&id)?;
        Some(record.tags.insert(tag.to_string()))
    }

    pub fn remove_tag(&self, id: Uuid, tag: &str) -> Option<bool> {
        let mut records = self.records.write().expect("store lock poisoned");
        let record = records.get_mut(&id)?;
        Some(record.tags.remove(tag))
    }

    /// Dependent links: live child records pointing at `parent_id`.
    pub fn children_of(&self, parent_id: Uuid, kind: EntityKind) -> Vec<ServiceInstance> {
        self.records
            .read()
            .expect("store lock poisoned")
            .values()
            .filter(|r| r.kind == kind && r.parent_id == Some(parent_id) && r.is_live())
            .cloned()
            .collect()
    }

    /// Name collision check scoped to an account; terminated records do not
    /// reserve their name.
    pub fn name_taken(&self, account_id: &str, kind: EntityKind, name: &str) -> bool {
        self.records
            .read()
            .expect("store lock poisoned")
            .values()
            .any(|r| {
                r.kind == kind
                    && r.account_id == account_id
                    && r.name.eq_ignore_ascii_case(name)
                    && r.status != ServiceStatus::Terminated
            })
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
