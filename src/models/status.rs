use serde::{Deserialize, Serialize};

/// Lifecycle status of a service-instance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Draft,
    Pending,
    Building,
    Created,
    Active,
    Updating,
    Error,
    ErrorCreation,
    Deleting,
    Terminated,
    Unknown,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Draft => "DRAFT",
            ServiceStatus::Pending => "PENDING",
            ServiceStatus::Building => "BUILDING",
            ServiceStatus::Created => "CREATED",
            ServiceStatus::Active => "ACTIVE",
            ServiceStatus::Updating => "UPDATING",
            ServiceStatus::Error => "ERROR",
            ServiceStatus::ErrorCreation => "ERROR_CREATION",
            ServiceStatus::Deleting => "DELETING",
            ServiceStatus::Terminated => "TERMINATED",
            ServiceStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Live power state reported by the backend resource, not tracked locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    PoweredOn,
    PoweredOff,
    Update,
    Other(String),
}

impl RunState {
    pub fn parse(value: &str) -> Self {
        match value {
            "poweredOn" => RunState::PoweredOn,
            "poweredOff" => RunState::PoweredOff,
            "update" => RunState::Update,
            other => RunState::Other(other.to_string()),
        }
    }
}

/// Externally visible compute-instance state names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Building,
    Running,
    Stopped,
    ShuttingDown,
    Terminated,
    Error,
    Unknown,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Building => "building",
            InstanceState::Running => "running",
            InstanceState::Stopped => "stopped",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
            InstanceState::Error => "error",
            InstanceState::Unknown => "unknown",
        }
    }

    /// EC2 numeric state codes paired with the state names.
    pub fn code(&self) -> i32 {
        match self {
            InstanceState::Pending | InstanceState::Building => 0,
            InstanceState::Running => 16,
            InstanceState::ShuttingDown => 32,
            InstanceState::Terminated => 48,
            InstanceState::Stopped => 80,
            InstanceState::Error | InstanceState::Unknown => 0,
        }
    }
}

/// Projects (status, runstate) onto the instance state vocabulary.
///
/// ACTIVE alone says nothing about power: the live runstate fetched from the
/// backend resource disambiguates it. Unmapped combinations fall through to
/// `unknown`.
pub fn project_instance_state(
    status: ServiceStatus,
    runstate: Option<&RunState>,
) -> InstanceState {
    match status {
        ServiceStatus::Draft | ServiceStatus::Pending => InstanceState::Pending,
        ServiceStatus::Building | ServiceStatus::Created | ServiceStatus::Updating => {
            InstanceState::Building
        }
        ServiceStatus::Error | ServiceStatus::ErrorCreation => InstanceState::Error,
        ServiceStatus::Deleting => InstanceState::ShuttingDown,
        ServiceStatus::Terminated => InstanceState::Terminated,
        ServiceStatus::Active => match runstate {
            Some(RunState::PoweredOn) => InstanceState::Running,
            Some(RunState::PoweredOff) => InstanceState::Stopped,
            Some(RunState::Update) => InstanceState::Building,
            _ => InstanceState::Unknown,
        },
        ServiceStatus::Unknown => InstanceState::Unknown,
    }
}

pub fn project_volume_state(status: ServiceStatus, attached: bool) -> &'static str {
    match status {
        ServiceStatus::Draft | ServiceStatus::Pending | ServiceStatus::Building => "creating",
        ServiceStatus::Created | ServiceStatus::Active | ServiceStatus::Updating => {
            if attached {
                "in-use"
            } else {
                "available"
            }
        }
        ServiceStatus::Deleting => "deleting",
        ServiceStatus::Terminated => "deleted",
        ServiceStatus::Error | ServiceStatus::ErrorCreation => "error",
        ServiceStatus::Unknown => "unknown",
    }
}

/// Shared projection for VPCs, subnets and security groups.
pub fn project_network_state(status: ServiceStatus) -> &'static str {
    match status {
        ServiceStatus::Draft | ServiceStatus::Pending | ServiceStatus::Building => "pending",
        ServiceStatus::Created | ServiceStatus::Active | ServiceStatus::Updating => "available",
        ServiceStatus::Deleting => "deleting",
        ServiceStatus::Error | ServiceStatus::ErrorCreation => "error",
        ServiceStatus::Terminated | ServiceStatus::Unknown => "unknown",
    }
}

pub fn project_image_state(status: ServiceStatus) -> &'static str {
    match status {
        ServiceStatus::Draft | ServiceStatus::Pending | ServiceStatus::Building => "pending",
        ServiceStatus::Created | ServiceStatus::Active | ServiceStatus::Updating => "available",
        ServiceStatus::Error | ServiceStatus::ErrorCreation => "failed",
        _ => "unknown",
    }
}

pub fn project_backup_job_state(status: ServiceStatus) -> &'static str {
    match status {
        ServiceStatus::Draft | ServiceStatus::Pending | ServiceStatus::Building => "pending",
        ServiceStatus::Created | ServiceStatus::Active => "available",
        ServiceStatus::Updating => "updating",
        ServiceStatus::Deleting => "removing",
        ServiceStatus::Error | ServiceStatus::ErrorCreation => "error",
        ServiceStatus::Terminated | ServiceStatus::Unknown => "unknown",
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
