use crate::models::status::ServiceStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Closed set of entity kinds managed through this gateway.
///
/// Every operation matches exhaustively on this enum; there is no open-ended
/// plugin dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Instance,
    Volume,
    Vpc,
    Subnet,
    SecurityGroup,
    Image,
    KeyPair,
    BackupJob,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Instance => "instance",
            EntityKind::Volume => "volume",
            EntityKind::Vpc => "vpc",
            EntityKind::Subnet => "subnet",
            EntityKind::SecurityGroup => "security_group",
            EntityKind::Image => "image",
            EntityKind::KeyPair => "key_pair",
            EntityKind::BackupJob => "backup_job",
        }
    }
}

/// Control-plane record of a provisioned entity, distinct from the backend
/// resource it wires to via `resource_uuid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub id: Uuid,
    pub kind: EntityKind,
    pub name: String,
    pub desc: String,
    pub account_id: String,
    pub definition: String,
    pub status: ServiceStatus,
    pub resource_uuid: Option<Uuid>,
    pub config: serde_json::Value,
    pub parent_id: Option<Uuid>,
    pub tags: BTreeSet<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ServiceInstance {
    pub fn new(kind: EntityKind, name: impl Into<String>, account_id: impl Into<String>) -> Self {
        ServiceInstance {
            id: Uuid::new_v4(),
            kind,
            name: name.into(),
            desc: String::new(),
            account_id: account_id.into(),
            definition: String::new(),
            status: ServiceStatus::Draft,
            resource_uuid: None,
            config: serde_json::Value::Null,
            parent_id: None,
            tags: BTreeSet::new(),
            last_error: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = definition.into();
        self
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == ServiceStatus::Active
    }

    /// Records that carry live backend resources; DRAFT and TERMINATED ones
    /// do not.
    pub fn is_live(&self) -> bool {
        !matches!(
            self.status,
            ServiceStatus::Draft | ServiceStatus::Terminated
        )
    }
}
