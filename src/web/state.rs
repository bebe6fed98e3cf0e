use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    api::ApiClient,
    config::AppConfig,
    forms::{FieldRegistry, FormEngine, FormSchema},
    session::{SessionStore, SessionUpdate},
};

#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    api: ApiClient,
    sessions: SessionStore,
    forms: FormEngine,
}

impl AppState {
    /// Builds the state from configuration. The session store starts pending; call
    /// [`SessionStore::restore`] to make it ready.
    pub fn new(config: AppConfig) -> Result<Self> {
        let api = ApiClient::new(&config).context("failed to initialize backend client")?;

        let schema = match &config.form_schema_path {
            Some(path) => {
                info!(path = %path.display(), "loading form schema from file");
                FormSchema::from_path(path)?
            }
            None => FormSchema::builtin()?,
        };

        let sessions = SessionStore::new(Some(config.session_store_path.clone()));
        let forms = FormEngine::new(schema, FieldRegistry::standard());

        Ok(Self::from_parts(config, api, sessions, forms))
    }

    pub fn from_parts(
        config: AppConfig,
        api: ApiClient,
        sessions: SessionStore,
        forms: FormEngine,
    ) -> Self {
        Self {
            config: Arc::new(config),
            api,
            sessions,
            forms,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn forms(&self) -> &FormEngine {
        &self.forms
    }

    /// Writes to the session store and drops the open forms of every session that ended.
    pub async fn apply_session(&self, update: SessionUpdate) -> Result<()> {
        let ended = self.sessions.apply(update).await?;
        for id in ended {
            self.forms.discard_session(id).await;
        }
        Ok(())
    }
}
