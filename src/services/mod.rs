use crate::config::Config;
use crate::orchestrator::OrchestratorClient;
use crate::store::InstanceStore;

/// Per-request operation context: the narrow collaborators every plugin
/// function works against, passed explicitly instead of reached through a
/// shared controller object.
pub struct Ctx<'a> {
    pub store: &'a InstanceStore,
    pub orchestrator: &'a OrchestratorClient,
    pub config: &'a Config,
    pub account_id: String,
}

pub mod backup;
pub mod customizations;
pub mod images;
pub mod instances;
pub mod key_pairs;
pub mod networks;
pub mod quota;
pub mod security_groups;
pub mod tags;
pub mod volumes;
