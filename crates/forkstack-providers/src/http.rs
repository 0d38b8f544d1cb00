//! Shared plumbing for the HTTP-backed adapters.

use crate::{CallContext, ProviderError};
use std::io::Read;

/// Agent whose global timeout is whatever is left of the call deadline.
pub(crate) fn agent(ctx: &CallContext) -> Result<ureq::Agent, ProviderError> {
    let remaining = ctx.remaining()?;
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(remaining))
        .build();
    Ok(ureq::Agent::new_with_config(config))
}

/// 404 is `NotFound`; 408, 429 and 5xx are worth retrying; any other
/// status is a permanent rejection.
pub(crate) fn classify_status(code: u16, what: &str) -> ProviderError {
    let message = format!("{what}: HTTP {code}");
    match code {
        404 => ProviderError::not_found(message),
        408 | 429 | 500..=599 => ProviderError::transient(message),
        _ => ProviderError::permanent(message),
    }
}

pub(crate) fn map_error(err: ureq::Error, what: &str) -> ProviderError {
    match err {
        ureq::Error::StatusCode(code) => classify_status(code, what),
        ureq::Error::BadUri(uri) => ProviderError::permanent(format!("{what}: bad URI {uri}")),
        other => ProviderError::transient(format!("{what}: {other}")),
    }
}

pub(crate) fn read_body(
    resp: ureq::http::Response<ureq::Body>,
    what: &str,
) -> Result<Vec<u8>, ProviderError> {
    let mut reader = resp.into_body().into_reader();
    let mut body = Vec::new();
    reader
        .read_to_end(&mut body)
        .map_err(|e| ProviderError::transient(format!("{what}: reading response: {e}")))?;
    Ok(body)
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(
    resp: ureq::http::Response<ureq::Body>,
    what: &str,
) -> Result<T, ProviderError> {
    let body = read_body(resp, what)?;
    serde_json::from_slice(&body)
        .map_err(|e| ProviderError::permanent(format!("{what}: unexpected response: {e}")))
}

/// First non-empty value among `vars`; a missing credential is permanent.
pub(crate) fn token_from_env(vars: &[&str]) -> Result<String, ProviderError> {
    vars.iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            ProviderError::permanent(format!("missing credentials: set {}", vars.join(" or ")))
        })
}

pub(crate) fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
