use serde::{Deserialize, Serialize};

/// OS family of the image an instance boots from; hostname rules differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Windows,
    Linux,
}

impl OsFamily {
    pub fn from_platform(platform: &str) -> Self {
        if platform.eq_ignore_ascii_case("windows") {
            OsFamily::Windows
        } else {
            OsFamily::Linux
        }
    }
}

/// AWS-shaped block-device declaration on RunInstances / CreateVolume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BlockDeviceMapping {
    pub device_name: Option<String>,
    pub ebs: Option<EbsBlockDevice>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EbsBlockDevice {
    pub volume_size: Option<u64>,
    pub volume_type: Option<String>,
    /// Clone source: build the volume from an existing one instead of empty.
    #[serde(rename = "Nvl_VolumeId")]
    pub source_volume_id: Option<String>,
    pub delete_on_termination: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Placement {
    pub availability_zone: Option<String>,
    pub tenancy: Option<String>,
}

/// AWS-shaped tag pair used by TagSpecifications and the tag actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagPair {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagSpecification {
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagPair>,
}
