//! Neon Postgres branches.

use crate::http::{self, bearer, map_error, read_json};
use crate::{CallContext, ProviderAdapter, ProviderError};
use forkstack_schema::{NeonConfig, ResourceKind, DEFAULT_SOURCE};
use forkstack_store::ResourceHandle;
use serde::Deserialize;

const DEFAULT_API_URL: &str = "https://console.neon.tech/api/v2";
const TOKEN_VARS: &[&str] = &["NEON_API_KEY"];

pub struct NeonAdapter {
    config: NeonConfig,
    api_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BranchList {
    branches: Vec<Branch>,
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    branch: Branch,
}

#[derive(Debug, Deserialize)]
struct Branch {
    id: String,
    name: String,
}

impl NeonAdapter {
    pub fn new(config: NeonConfig) -> Self {
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

    fn branch_name<'a>(&'a self, env: &'a str) -> &'a str {
        if env == DEFAULT_SOURCE {
            &self.config.production
        } else {
            env
        }
    }

    fn token(&self) -> Result<String, ProviderError> {
        match &self.token {
            Some(t) => Ok(t.clone()),
            None => http::token_from_env(TOKEN_VARS),
        }
    }

    fn branches_url(&self) -> String {
        format!("{}/projects/{}/branches", self.api_url, self.config.project_id)
    }

    fn handle(&self, branch: &str) -> ResourceHandle {
        ResourceHandle::ready(
            ResourceKind::Database,
            "neon",
            format!("neon://{}/{branch}", self.config.project_id),
        )
    }

    fn find_branch(&self, ctx: &CallContext, name: &str) -> Result<Branch, ProviderError> {
        let resp = http::agent(ctx)?
            .get(&self.branches_url())
            .header("Authorization", &bearer(&self.token()?))
            .call()
            .map_err(|e| map_error(e, "neon list branches"))?;
        let list: BranchList = read_json(resp, "neon list branches")?;
        list.branches
            .into_iter()
            .find(|b| b.name == name)
            .ok_or_else(|| ProviderError::not_found(format!("neon branch '{name}' not found")))
    }
}

impl ProviderAdapter for NeonAdapter {
    fn provider_id(&self) -> &'static str {
        "neon"
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
        let parent = self
            .find_branch(ctx, self.branch_name(source))
            .map_err(|e| {
                if e.is_not_found() {
                    ProviderError::permanent(e.message)
                } else {
                    e
                }
            })?;
        let body = serde_json::json!({
            "branch": { "name": env, "parent_id": parent.id },
            "endpoints": [{ "type": "read_write" }],
        });
        tracing::debug!("neon: branching {env} from {}", parent.name);
        let resp = http::agent(ctx)?
            .post(&self.branches_url())
            .header("Authorization", &bearer(&self.token()?))
            .header("Content-Type", "application/json")
            .send(body.to_string().as_bytes())
            .map_err(|e| map_error(e, "neon create branch"))?;
        let created: BranchResponse = read_json(resp, "neon create branch")?;
        Ok(self.handle(&created.branch.name))
    }

    fn locate(&self, ctx: &CallContext, env: &str) -> Result<ResourceHandle, ProviderError> {
        let branch = self.find_branch(ctx, self.branch_name(env))?;
        Ok(self.handle(&branch.name))
    }

    fn delete(&self, ctx: &CallContext, env: &str) -> Result<(), ProviderError> {
        if env == DEFAULT_SOURCE {
            return Err(ProviderError::permanent(
                "refusing to delete the production branch",
            ));
        }
        let branch = match self.find_branch(ctx, env) {
            Ok(b) => b,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        let url = format!("{}/{}", self.branches_url(), branch.id);
        tracing::debug!("neon: DELETE {url}");
        match http::agent(ctx)?
            .delete(&url)
            .header("Authorization", &bearer(&self.token()?))
            .call()
        {
            Ok(_) => Ok(()),
            Err(e) => match map_error(e, "neon delete branch") {
                err if err.is_not_found() => Ok(()),
                err => Err(err),
            },
        }
    }
}
