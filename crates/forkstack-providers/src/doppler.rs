//! Doppler secrets, forked by cloning a config.
//!
//! Doppler only allows branch configs named `<root>_<suffix>` inside the
//! root config's environment, so every fork lives at `<production>_<env>`
//! regardless of which environment it was cloned from.

use crate::http::{self, bearer, map_error, read_json};
use crate::{CallContext, ProviderAdapter, ProviderError};
use forkstack_schema::{DopplerConfig, ResourceKind, DEFAULT_SOURCE};
use forkstack_store::ResourceHandle;
use serde::Deserialize;

const DEFAULT_API_URL: &str = "https://api.doppler.com";
const TOKEN_VARS: &[&str] = &["DOPPLER_TOKEN"];

pub struct DopplerAdapter {
    config: DopplerConfig,
    api_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConfigResponse {
    config: ConfigInfo,
}

#[derive(Debug, Deserialize)]
struct ConfigInfo {
    name: String,
}

impl DopplerAdapter {
    pub fn new(config: DopplerConfig) -> Self {
        let api_url = config
            .api_url
            .as_deref()
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_owned();
        Self {
            config,
            api_url,
            token: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_owned());
        self
    }

    pub fn config_name(&self, env: &str) -> String {
        if env == DEFAULT_SOURCE {
            self.config.production.clone()
        } else {
            format!("{}_{env}", self.config.production)
        }
    }

    fn token(&self) -> Result<String, ProviderError> {
        match &self.token {
            Some(t) => Ok(t.clone()),
            None => http::token_from_env(TOKEN_VARS),
        }
    }

    fn handle(&self, config: &str) -> ResourceHandle {
        ResourceHandle::ready(
            ResourceKind::Secrets,
            "doppler",
            format!("doppler://{}/{config}", self.config.project),
        )
    }
}

impl ProviderAdapter for DopplerAdapter {
    fn provider_id(&self) -> &'static str {
        "doppler"
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Secrets
    }

    fn create(
        &self,
        ctx: &CallContext,
        env: &str,
        source: &str,
    ) -> Result<ResourceHandle, ProviderError> {
        let name = self.config_name(env);
        let from = self.config_name(source);
        let body = serde_json::json!({
            "project": self.config.project,
            "config": from,
            "name": name,
        });
        tracing::debug!("doppler: cloning {from} to {name}");
        let resp = http::agent(ctx)?
            .post(&format!("{}/v3/configs/config/clone", self.api_url))
            .header("Authorization", &bearer(&self.token()?))
            .header("Content-Type", "application/json")
            .send(body.to_string().as_bytes())
            .map_err(|e| map_error(e, "doppler clone config"))?;
        let created: ConfigResponse = read_json(resp, "doppler clone config")?;
        Ok(self.handle(&created.config.name))
    }

    fn locate(&self, ctx: &CallContext, env: &str) -> Result<ResourceHandle, ProviderError> {
        let name = self.config_name(env);
        let resp = http::agent(ctx)?
            .get(&format!("{}/v3/configs/config", self.api_url))
            .query("project", &self.config.project)
            .query("config", &name)
            .header("Authorization", &bearer(&self.token()?))
            .call()
            .map_err(|e| map_error(e, "doppler get config"))?;
        let found: ConfigResponse = read_json(resp, "doppler get config")?;
        Ok(self.handle(&found.config.name))
    }

    fn delete(&self, ctx: &CallContext, env: &str) -> Result<(), ProviderError> {
        if env == DEFAULT_SOURCE {
            return Err(ProviderError::permanent(
                "refusing to delete the production config",
            ));
        }
        let name = self.config_name(env);
        tracing::debug!("doppler: deleting config {name}");
        match http::agent(ctx)?
            .delete(&format!("{}/v3/configs/config", self.api_url))
            .query("project", &self.config.project)
            .query("config", &name)
            .header("Authorization", &bearer(&self.token()?))
            .call()
        {
            Ok(_) => Ok(()),
            Err(e) => match map_error(e, "doppler delete config") {
                err if err.is_not_found() => Ok(()),
                err => Err(err),
            },
        }
    }
}
