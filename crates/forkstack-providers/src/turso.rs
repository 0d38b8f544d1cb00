//! Turso databases, forked by seeding a new database from an existing one.

use crate::http::{self, bearer, map_error, read_json};
use crate::{CallContext, ProviderAdapter, ProviderError};
use forkstack_schema::{ResourceKind, TursoConfig, DEFAULT_SOURCE};
use forkstack_store::ResourceHandle;
use serde::{Deserialize, Serialize};

const DEFAULT_API_URL: &str = "https://api.turso.tech";
const TOKEN_VARS: &[&str] = &["TURSO_API_TOKEN", "TURSO_AUTH_TOKEN"];

pub struct TursoAdapter {
    config: TursoConfig,
    api_url: String,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateDatabase<'a> {
    name: &'a str,
    group: &'a str,
    seed: Seed<'a>,
}

#[derive(Debug, Serialize)]
struct Seed<'a> {
    #[serde(rename = "type")]
    seed_type: &'static str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct DatabaseResponse {
    database: DatabaseInfo,
}

#[derive(Debug, Deserialize)]
struct DatabaseInfo {
    #[serde(rename = "Hostname")]
    hostname: String,
}

impl TursoAdapter {
    pub fn new(config: TursoConfig) -> Self {
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

    /// Use `token` instead of reading it from the environment.
    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_owned());
        self
    }

    /// `prod` is the configured production database; everything else is `<project>-<env>`.
    pub fn database_name(&self, project: &str, env: &str) -> String {
        if env == DEFAULT_SOURCE {
            self.config.production.clone()
        } else {
            format!("{project}-{env}")
        }
    }

    fn token(&self) -> Result<String, ProviderError> {
        match &self.token {
            Some(t) => Ok(t.clone()),
            None => http::token_from_env(TOKEN_VARS),
        }
    }

    fn databases_url(&self) -> String {
        format!(
            "{}/v1/organizations/{}/databases",
            self.api_url, self.config.organization
        )
    }

    fn handle(info: &DatabaseInfo) -> ResourceHandle {
        ResourceHandle::ready(
            ResourceKind::Database,
            "turso",
            format!("libsql://{}", info.hostname),
        )
    }
}

impl ProviderAdapter for TursoAdapter {
    fn provider_id(&self) -> &'static str {
        "turso"
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Database
    }

    fn create(
        &self,
        ctx: &CallContext,
        env: &str,
        source: &str,
    ) -> Result<ResourceHandle, ProviderError> {
        let name = self.database_name(ctx.project(), env);
        let seed = self.database_name(ctx.project(), source);
        let body = serde_json::to_vec(&CreateDatabase {
            name: &name,
            group: self.config.group(),
            seed: Seed {
                seed_type: "database",
                name: &seed,
            },
        })
        .map_err(|e| ProviderError::permanent(format!("encoding request: {e}")))?;

        tracing::debug!("turso: creating {name} seeded from {seed}");
        let resp = http::agent(ctx)?
            .post(&self.databases_url())
            .header("Authorization", &bearer(&self.token()?))
            .header("Content-Type", "application/json")
            .send(&body[..])
            .map_err(|e| map_error(e, "turso create database"))?;
        let created: DatabaseResponse = read_json(resp, "turso create database")?;
        Ok(Self::handle(&created.database))
    }

    fn locate(&self, ctx: &CallContext, env: &str) -> Result<ResourceHandle, ProviderError> {
        let name = self.database_name(ctx.project(), env);
        let url = format!("{}/{name}", self.databases_url());
        tracing::debug!("turso: GET {url}");
        let resp = http::agent(ctx)?
            .get(&url)
            .header("Authorization", &bearer(&self.token()?))
            .call()
            .map_err(|e| map_error(e, "turso get database"))?;
        let found: DatabaseResponse = read_json(resp, "turso get database")?;
        Ok(Self::handle(&found.database))
    }

    fn delete(&self, ctx: &CallContext, env: &str) -> Result<(), ProviderError> {
        if env == DEFAULT_SOURCE {
            return Err(ProviderError::permanent(
                "refusing to delete the production database",
            ));
        }
        let name = self.database_name(ctx.project(), env);
        let url = format!("{}/{name}", self.databases_url());
        tracing::debug!("turso: DELETE {url}");
        let result = http::agent(ctx)?
            .delete(&url)
            .header("Authorization", &bearer(&self.token()?))
            .call();
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = map_error(e, "turso delete database");
                if err.is_not_found() {
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }
}
