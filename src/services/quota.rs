use crate::orchestrator::FlavorDetail;
use serde::Serialize;

/// Aggregated resource-quota delta submitted to the quota check before an
/// instance create. Insufficient quota aborts the operation before any
/// backend resource exists, so there is never a partial creation to unwind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaDelta {
    #[serde(rename = "compute.cores")]
    pub cores: u64,
    #[serde(rename = "compute.instances")]
    pub instances: u64,
    #[serde(rename = "compute.ram")]
    pub ram_gb: u64,
    #[serde(rename = "compute.blocks")]
    pub blocks_gb: u64,
    #[serde(rename = "compute.volumes")]
    pub volumes: u64,
}

/// An extra block device declared on the create request, already resolved
/// to concrete numbers.
#[derive(Debug, Clone)]
pub struct AdditionalVolume {
    pub size_gb: u64,
    pub volume_type: Option<String>,
}

/// Boot-volume size resolution, in precedence order: the flavor default,
/// replaced by an explicit root block-device override, replaced by the
/// clone-source volume's size, and finally floored at the image's declared
/// minimum disk size.
pub fn resolve_boot_size(
    flavor_disk_gb: u64,
    boot_override_gb: Option<u64>,
    clone_source_gb: Option<u64>,
    image_min_disk_gb: u64,
) -> u64 {
    let mut size = flavor_disk_gb;
    if let Some(explicit) = boot_override_gb {
        size = explicit;
    }
    if let Some(clone) = clone_source_gb {
        size = clone;
    }
    size.max(image_min_disk_gb)
}

pub fn aggregate_run_quota(
    flavor: &FlavorDetail,
    image_min_disk_gb: u64,
    boot_override_gb: Option<u64>,
    clone_source_gb: Option<u64>,
    additional: &[AdditionalVolume],
) -> QuotaDelta {
    let boot_gb = resolve_boot_size(
        flavor.disk_gb,
        boot_override_gb,
        clone_source_gb,
        image_min_disk_gb,
    );
    let additional_gb: u64 = additional.iter().map(|v| v.size_gb).sum();

    QuotaDelta {
        cores: flavor.vcpus,
        instances: 1,
        ram_gb: flavor.ram_mb / 1024,
        blocks_gb: boot_gb + additional_gb,
        volumes: additional.len() as u64,
    }
}

/// Delta for a standalone volume create.
pub fn volume_quota(size_gb: u64) -> QuotaDelta {
    QuotaDelta {
        cores: 0,
        instances: 0,
        ram_gb: 0,
        blocks_gb: size_gb,
        volumes: 1,
    }
}

/// Delta for an instance-type resize: only the cpu/ram difference matters,
/// and shrinking never frees quota ahead of the backend's own accounting.
pub fn resize_quota(current: &FlavorDetail, target: &FlavorDetail) -> QuotaDelta {
    QuotaDelta {
        cores: target.vcpus.saturating_sub(current.vcpus),
        instances: 0,
        ram_gb: (target.ram_mb / 1024).saturating_sub(current.ram_mb / 1024),
        blocks_gb: 0,
        volumes: 0,
    }
}

#[cfg(test)]
#[path = "quota_tests.rs"]
mod tests;
