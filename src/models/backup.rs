use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scheduled backup job grouping a set of member instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupJob {
    pub id: Uuid,
    pub name: String,
    /// Availability zone the job runs in.
    pub site: String,
    pub hypervisor: String,
    /// Every N-th run is a full backup, the rest are incremental.
    pub fullbackup_interval: u32,
    /// Retention count.
    pub restore_points: u32,
    pub schedule: BackupSchedule,
    pub instances: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSchedule {
    pub start_time: String,
    pub interval: String,
    pub timezone: String,
    pub enabled: bool,
}

impl Default for BackupSchedule {
    fn default() -> Self {
        BackupSchedule {
            start_time: "00:00".to_string(),
            interval: "24hrs".to_string(),
            timezone: "UTC".to_string(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestorePointKind {
    #[default]
    Full,
    Incremental,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestorePoint {
    pub id: String,
    #[serde(default)]
    pub job_id: Uuid,
    #[serde(rename = "type", default)]
    pub kind: RestorePointKind,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub size: RestorePointSize,
    #[serde(default)]
    pub instances: Vec<Uuid>,
}

/// Size breakdown in MB as reported by the backup engine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RestorePointSize {
    pub total_mb: u64,
    pub full_mb: u64,
    pub incremental_mb: u64,
}
