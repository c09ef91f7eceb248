use crate::{config, orchestrator, services, store};

#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub orchestrator: orchestrator::OrchestratorClient,
    pub store: store::InstanceStore,
}

impl AppState {
    pub fn new(config: config::Config) -> Result<Self, url::ParseError> {
        let orchestrator = orchestrator::OrchestratorClient::new(
            &config.backend_url,
            config.backend_token.clone(),
            reqwest::Client::new(),
        )?;
        Ok(AppState {
            config,
            orchestrator,
            store: store::InstanceStore::new(),
        })
    }

    /// Operation context scoped to the calling account.
    pub fn ctx(&self, account_id: String) -> services::Ctx<'_> {
        services::Ctx {
            store: &self.store,
            orchestrator: &self.orchestrator,
            config: &self.config,
            account_id,
        }
    }
}
