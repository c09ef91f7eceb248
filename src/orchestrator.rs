use crate::models::security_group::SecurityGroupRule;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

const API_V1: &str = "v1.0/nrs/provider";
const API_V2: &str = "v2.0/nrs/provider";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("backend transport error: {0}")]
    Transport(String),
    #[error("failed to decode backend response: {0}")]
    Decode(String),
    #[error("task {task} failed: {message}")]
    TaskFailed { task: String, message: String },
    #[error("task {task} still running after {waited_secs}s")]
    TaskTimeout { task: String, waited_secs: u64 },
}

/// Created-resource handle: the backend id plus an optional async task to
/// poll before the resource is usable.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedResource {
    pub uuid: Uuid,
    #[serde(default)]
    pub taskid: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatus {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "SUCCESS" | "FAILURE")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceDetail {
    pub uuid: Uuid,
    #[serde(default)]
    pub name: String,
    /// Live run state: poweredOn, poweredOff, update.
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub flavor: Option<String>,
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub private_ip: Option<String>,
    #[serde(default)]
    pub volumes: Vec<VolumeAttachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeAttachment {
    pub uuid: Uuid,
    #[serde(default)]
    pub boot: bool,
    #[serde(default)]
    pub size_gb: u64,
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeDetail {
    pub uuid: Uuid,
    #[serde(default)]
    pub name: String,
    pub size_gb: u64,
    #[serde(default)]
    pub volume_type: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub bootable: bool,
    #[serde(default)]
    pub attached_to: Option<Uuid>,
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageDetail {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub min_disk_size_gb: u64,
    #[serde(default)]
    pub min_ram_mb: u64,
    #[serde(default = "default_platform")]
    pub platform: String,
}

fn default_platform() -> String {
    "linux".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlavorDetail {
    pub name: String,
    pub vcpus: u64,
    pub ram_mb: u64,
    pub disk_gb: u64,
    #[serde(default)]
    pub volume_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityGroupDetail {
    pub uuid: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub rules: Vec<SecurityGroupRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyPairDetail {
    pub name: String,
    #[serde(default)]
    pub fingerprint: String,
    /// Only present on creation; the backend never returns it again.
    #[serde(default)]
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomizationSpec {
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub params: Vec<String>,
}

/// REST client for the resource-orchestration backend.
///
/// Every call is a single request/response cycle; retry, if any, belongs to
/// the task framework behind the backend, not here.
#[derive(Clone)]
pub struct OrchestratorClient {
    base_url: Url,
    token: Option<String>,
    http: reqwest::Client,
}

impl OrchestratorClient {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        http: reqwest::Client,
    ) -> Result<Self, url::ParseError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        Ok(OrchestratorClient {
            base_url,
            token,
            http,
        })
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, OrchestratorError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;

        let mut request = self.http.request(method, url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(OrchestratorError::Api {
                status: status.as_u16(),
                message: extract_error_message(&bytes),
            });
        }

        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| OrchestratorError::Decode(e.to_string()))
    }

    pub async fn get(&self, path: &str) -> Result<Value, OrchestratorError> {
        self.request(reqwest::Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, OrchestratorError> {
        self.request(reqwest::Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, OrchestratorError> {
        self.request(reqwest::Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, OrchestratorError> {
        self.request(reqwest::Method::DELETE, path, None).await
    }

    // ---- tasks ----

    pub async fn task_status(&self, taskid: &str) -> Result<TaskStatus, OrchestratorError> {
        let value = self.get(&format!("{API_V1}/tasks/{taskid}")).await?;
        decode(unwrap_key(value, "task"))
    }

    // ---- instances ----

    pub async fn create_instance(
        &self,
        payload: &Value,
    ) -> Result<CreatedResource, OrchestratorError> {
        let value = self
            .post(&format!("{API_V1}/instances"), &json!({ "instance": payload }))
            .await?;
        decode(unwrap_key(value, "instance"))
    }

    pub async fn instance_detail(&self, uuid: Uuid) -> Result<InstanceDetail, OrchestratorError> {
        let value = self.get(&format!("{API_V1}/instances/{uuid}")).await?;
        decode(unwrap_key(value, "instance"))
    }

    pub async fn delete_instance(&self, uuid: Uuid) -> Result<Option<String>, OrchestratorError> {
        let value = self.delete(&format!("{API_V1}/instances/{uuid}")).await?;
        Ok(taskid_of(&value))
    }

    pub async fn instance_action(
        &self,
        uuid: Uuid,
        action: &str,
        params: Option<&Value>,
    ) -> Result<Option<String>, OrchestratorError> {
        let mut action_body = json!({ "name": action });
        if let Some(params) = params {
            action_body["params"] = params.clone();
        }
        let value = self
            .put(
                &format!("{API_V1}/instances/{uuid}/action"),
                &json!({ "action": action_body }),
            )
            .await?;
        Ok(taskid_of(&value))
    }

    // ---- volumes ----

    pub async fn create_volume(
        &self,
        payload: &Value,
    ) -> Result<CreatedResource, OrchestratorError> {
        let value = self
            .post(&format!("{API_V1}/volumes"), &json!({ "volume": payload }))
            .await?;
        decode(unwrap_key(value, "volume"))
    }

    pub async fn volume_detail(&self, uuid: Uuid) -> Result<VolumeDetail, OrchestratorError> {
        let value = self.get(&format!("{API_V1}/volumes/{uuid}")).await?;
        decode(unwrap_key(value, "volume"))
    }

    pub async fn delete_volume(&self, uuid: Uuid) -> Result<Option<String>, OrchestratorError> {
        let value = self.delete(&format!("{API_V1}/volumes/{uuid}")).await?;
        Ok(taskid_of(&value))
    }

    pub async fn attach_volume(
        &self,
        instance_uuid: Uuid,
        volume_uuid: Uuid,
        device: &str,
    ) -> Result<Option<String>, OrchestratorError> {
        let value = self
            .post(
                &format!("{API_V1}/instances/{instance_uuid}/volumes"),
                &json!({ "volume": { "uuid": volume_uuid, "device": device } }),
            )
            .await?;
        Ok(taskid_of(&value))
    }

    pub async fn detach_volume(
        &self,
        instance_uuid: Uuid,
        volume_uuid: Uuid,
    ) -> Result<Option<String>, OrchestratorError> {
        let value = self
            .delete(&format!(
                "{API_V1}/instances/{instance_uuid}/volumes/{volume_uuid}"
            ))
            .await?;
        Ok(taskid_of(&value))
    }

    // ---- networks ----

    pub async fn create_vpc(&self, payload: &Value) -> Result<CreatedResource, OrchestratorError> {
        let value = self
            .post(&format!("{API_V1}/vpcs"), &json!({ "vpc": payload }))
            .await?;
        decode(unwrap_key(value, "vpc"))
    }

    pub async fn delete_vpc(&self, uuid: Uuid) -> Result<Option<String>, OrchestratorError> {
        let value = self.delete(&format!("{API_V1}/vpcs/{uuid}")).await?;
        Ok(taskid_of(&value))
    }

    pub async fn create_subnet(
        &self,
        payload: &Value,
    ) -> Result<CreatedResource, OrchestratorError> {
        let value = self
            .post(&format!("{API_V1}/subnets"), &json!({ "subnet": payload }))
            .await?;
        decode(unwrap_key(value, "subnet"))
    }

    pub async fn delete_subnet(&self, uuid: Uuid) -> Result<Option<String>, OrchestratorError> {
        let value = self.delete(&format!("{API_V1}/subnets/{uuid}")).await?;
        Ok(taskid_of(&value))
    }

    // ---- security groups ----

    pub async fn create_security_group(
        &self,
        payload: &Value,
    ) -> Result<CreatedResource, OrchestratorError> {
        let value = self
            .post(
                &format!("{API_V1}/security_groups"),
                &json!({ "security_group": payload }),
            )
            .await?;
        decode(unwrap_key(value, "security_group"))
    }

    pub async fn security_group_detail(
        &self,
        uuid: Uuid,
    ) -> Result<SecurityGroupDetail, OrchestratorError> {
        let value = self
            .get(&format!("{API_V1}/security_groups/{uuid}"))
            .await?;
        decode(unwrap_key(value, "security_group"))
    }

    pub async fn delete_security_group(
        &self,
        uuid: Uuid,
    ) -> Result<Option<String>, OrchestratorError> {
        let value = self
            .delete(&format!("{API_V1}/security_groups/{uuid}"))
            .await?;
        Ok(taskid_of(&value))
    }

    pub async fn create_rule(
        &self,
        group_uuid: Uuid,
        rule: &Value,
    ) -> Result<CreatedResource, OrchestratorError> {
        let value = self
            .post(
                &format!("{API_V1}/security_groups/{group_uuid}/rules"),
                &json!({ "rule": rule }),
            )
            .await?;
        decode(unwrap_key(value, "rule"))
    }

    pub async fn delete_rule(
        &self,
        group_uuid: Uuid,
        rule_id: Uuid,
    ) -> Result<Option<String>, OrchestratorError> {
        let value = self
            .delete(&format!("{API_V1}/security_groups/{group_uuid}/rules/{rule_id}"))
            .await?;
        Ok(taskid_of(&value))
    }

    // ---- catalog ----

    pub async fn list_images(&self) -> Result<Vec<ImageDetail>, OrchestratorError> {
        let value = self.get(&format!("{API_V1}/images")).await?;
        decode(unwrap_key(value, "images"))
    }

    pub async fn image_detail(&self, uuid: Uuid) -> Result<ImageDetail, OrchestratorError> {
        let value = self.get(&format!("{API_V1}/images/{uuid}")).await?;
        decode(unwrap_key(value, "image"))
    }

    pub async fn list_flavors(&self) -> Result<Vec<FlavorDetail>, OrchestratorError> {
        let value = self.get(&format!("{API_V1}/flavors")).await?;
        decode(unwrap_key(value, "flavors"))
    }

    pub async fn flavor_detail(&self, name: &str) -> Result<FlavorDetail, OrchestratorError> {
        let value = self.get(&format!("{API_V1}/flavors/{name}")).await?;
        decode(unwrap_key(value, "flavor"))
    }

    // ---- key pairs ----

    pub async fn list_key_pairs(&self) -> Result<Vec<KeyPairDetail>, OrchestratorError> {
        let value = self.get(&format!("{API_V1}/keypairs")).await?;
        decode(unwrap_key(value, "keypairs"))
    }

    pub async fn create_key_pair(&self, name: &str) -> Result<KeyPairDetail, OrchestratorError> {
        let value = self
            .post(
                &format!("{API_V1}/keypairs"),
                &json!({ "keypair": { "name": name } }),
            )
            .await?;
        decode(unwrap_key(value, "keypair"))
    }

    pub async fn import_key_pair(
        &self,
        name: &str,
        public_key: &str,
    ) -> Result<KeyPairDetail, OrchestratorError> {
        let value = self
            .post(
                &format!("{API_V1}/keypairs"),
                &json!({ "keypair": { "name": name, "public_key": public_key } }),
            )
            .await?;
        decode(unwrap_key(value, "keypair"))
    }

    pub async fn delete_key_pair(&self, name: &str) -> Result<(), OrchestratorError> {
        self.delete(&format!("{API_V1}/keypairs/{name}")).await?;
        Ok(())
    }

    // ---- backup jobs (v2 surface) ----

    pub async fn create_backup_job(
        &self,
        payload: &Value,
    ) -> Result<CreatedResource, OrchestratorError> {
        let value = self
            .post(&format!("{API_V2}/jobs"), &json!({ "job": payload }))
            .await?;
        decode(unwrap_key(value, "job"))
    }

    pub async fn update_backup_job(
        &self,
        uuid: Uuid,
        payload: &Value,
    ) -> Result<Option<String>, OrchestratorError> {
        let value = self
            .put(&format!("{API_V2}/jobs/{uuid}"), &json!({ "job": payload }))
            .await?;
        Ok(taskid_of(&value))
    }

    pub async fn delete_backup_job(&self, uuid: Uuid) -> Result<Option<String>, OrchestratorError> {
        let value = self.delete(&format!("{API_V2}/jobs/{uuid}")).await?;
        Ok(taskid_of(&value))
    }

    pub async fn add_job_instance(
        &self,
        job_uuid: Uuid,
        instance_uuid: Uuid,
    ) -> Result<Option<String>, OrchestratorError> {
        let value = self
            .post(
                &format!("{API_V2}/jobs/{job_uuid}/instances"),
                &json!({ "instance": { "uuid": instance_uuid } }),
            )
            .await?;
        Ok(taskid_of(&value))
    }

    pub async fn remove_job_instance(
        &self,
        job_uuid: Uuid,
        instance_uuid: Uuid,
    ) -> Result<Option<String>, OrchestratorError> {
        let value = self
            .delete(&format!("{API_V2}/jobs/{job_uuid}/instances/{instance_uuid}"))
            .await?;
        Ok(taskid_of(&value))
    }

    pub async fn list_restore_points(
        &self,
        job_uuid: Uuid,
    ) -> Result<Vec<Value>, OrchestratorError> {
        let value = self
            .get(&format!("{API_V2}/jobs/{job_uuid}/restore_points"))
            .await?;
        decode(unwrap_key(value, "restore_points"))
    }

    pub async fn create_restore_point(
        &self,
        job_uuid: Uuid,
        payload: &Value,
    ) -> Result<Option<String>, OrchestratorError> {
        let value = self
            .post(
                &format!("{API_V2}/jobs/{job_uuid}/restore_points"),
                &json!({ "restore_point": payload }),
            )
            .await?;
        Ok(taskid_of(&value))
    }

    pub async fn delete_restore_point(
        &self,
        job_uuid: Uuid,
        restore_point_id: &str,
    ) -> Result<Option<String>, OrchestratorError> {
        let value = self
            .delete(&format!(
                "{API_V2}/jobs/{job_uuid}/restore_points/{restore_point_id}"
            ))
            .await?;
        Ok(taskid_of(&value))
    }

    // ---- customizations ----

    pub async fn list_customizations(&self) -> Result<Vec<CustomizationSpec>, OrchestratorError> {
        let value = self.get(&format!("{API_V1}/customizations")).await?;
        decode(unwrap_key(value, "customizations"))
    }

    pub async fn apply_customization(
        &self,
        instance_uuid: Uuid,
        payload: &Value,
    ) -> Result<Option<String>, OrchestratorError> {
        let value = self
            .post(
                &format!("{API_V1}/instances/{instance_uuid}/customization"),
                &json!({ "customization": payload }),
            )
            .await?;
        Ok(taskid_of(&value))
    }

    // ---- quotas ----

    /// Submits the aggregated quota delta for an account. A backend refusal
    /// surfaces as `Api` with the backend's message; the caller decides how
    /// to map it.
    pub async fn check_quotas<T: Serialize>(
        &self,
        account_id: &str,
        deltas: &T,
    ) -> Result<(), OrchestratorError> {
        let deltas =
            serde_json::to_value(deltas).map_err(|e| OrchestratorError::Decode(e.to_string()))?;
        self.post(
            &format!("{API_V1}/quotas/check"),
            &json!({ "quota": { "account_id": account_id, "deltas": deltas } }),
        )
        .await?;
        Ok(())
    }
}

/// Backend bodies are keyed by the singular resource name; tolerate bare
/// bodies from older backend builds.
fn unwrap_key(mut value: Value, key: &str) -> Value {
    match value.get_mut(key) {
        Some(inner) => inner.take(),
        None => value,
    }
}

fn taskid_of(value: &Value) -> Option<String> {
    value
        .get("taskid")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, OrchestratorError> {
    serde_json::from_value(value).map_err(|e| OrchestratorError::Decode(e.to_string()))
}

fn extract_error_message(bytes: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
        for key in ["error", "message", "detail"] {
            if let Some(message) = value.get(key).and_then(Value::as_str) {
                return message.to_string();
            }
        }
        if let Some(message) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
        {
            return message.to_string();
        }
    }
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
