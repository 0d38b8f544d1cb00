//! S3-compatible storage: prefix-copy forks on plain S3, native bucket
//! forks on Tigris. Both speak SigV4-signed path-style requests.

use crate::http::{self, map_error, read_body};
use crate::sigv4::{self, CanonicalRequest, Credentials, EMPTY_PAYLOAD_SHA256};
use crate::{CallContext, ProviderAdapter, ProviderError};
use forkstack_schema::{ResourceKind, S3Config, TigrisConfig, DEFAULT_SOURCE};
use forkstack_store::ResourceHandle;
use std::time::Duration;

/// Object written at the root of every prefix fork.
pub const FORK_MARKER: &str = ".forkstack-fork";

/// Signed client for the handful of S3 calls forking needs.
pub(crate) struct S3Client {
    endpoint: String,
    host: String,
    region: String,
    credentials: Option<Credentials>,
}

impl S3Client {
    fn new(endpoint: &str, region: &str) -> Self {
        let endpoint = endpoint.trim_end_matches('/').to_owned();
        let host = endpoint
            .split_once("://")
            .map_or(endpoint.as_str(), |(_, rest)| rest)
            .split('/')
            .next()
            .unwrap_or_default()
            .to_owned();
        Self {
            endpoint,
            host,
            region: region.to_owned(),
            credentials: None,
        }
    }

    fn credentials(&self) -> Result<Credentials, ProviderError> {
        match &self.credentials {
            Some(c) => Ok(c.clone()),
            None => Credentials::from_env(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn send(
        &self,
        ctx: &CallContext,
        method: &str,
        path: &str,
        query: &[(String, String)],
        extra_headers: &[(String, String)],
        body: &[u8],
        what: &str,
    ) -> Result<ureq::http::Response<ureq::Body>, ProviderError> {
        let creds = self.credentials()?;
        let amz_date = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let payload_hash = if body.is_empty() {
            EMPTY_PAYLOAD_SHA256.to_owned()
        } else {
            sigv4::sha256_hex(body)
        };

        let mut headers = extra_headers.to_vec();
        headers.push(("x-amz-content-sha256".to_owned(), payload_hash.clone()));
        headers.push(("x-amz-date".to_owned(), amz_date.clone()));
        if let Some(token) = &creds.session_token {
            headers.push(("x-amz-security-token".to_owned(), token.clone()));
        }
        let auth = sigv4::authorization(
            &creds,
            &self.region,
            &amz_date,
            &CanonicalRequest {
                method,
                host: &self.host,
                path,
                query,
                headers: &headers,
                payload_hash: &payload_hash,
            },
        )?;

        let qs = sigv4::canonical_query(query);
        let url = if qs.is_empty() {
            format!("{}{path}", self.endpoint)
        } else {
            format!("{}{path}?{qs}", self.endpoint)
        };
        tracing::trace!("s3: {method} {url}");

        let agent = http::agent(ctx)?;
        let result = match method {
            "GET" => with_headers(agent.get(&url), &headers, &auth).call(),
            "HEAD" => with_headers(agent.head(&url), &headers, &auth).call(),
            "DELETE" => with_headers(agent.delete(&url), &headers, &auth).call(),
            "PUT" => with_headers(agent.put(&url), &headers, &auth).send(body),
            other => {
                return Err(ProviderError::permanent(format!(
                    "unsupported method {other}"
                )))
            }
        };
        result.map_err(|e| map_error(e, what))
    }

    fn object_path(bucket: &str, key: &str) -> String {
        format!("/{}/{}", sigv4::uri_encode(bucket, false), sigv4::uri_encode(key, true))
    }

    fn bucket_path(bucket: &str) -> String {
        format!("/{}", sigv4::uri_encode(bucket, false))
    }

    /// Keys under `prefix`, following continuation tokens. `limit` stops early.
    pub fn list_keys(
        &self,
        ctx: &CallContext,
        bucket: &str,
        prefix: &str,
        limit: Option<usize>,
    ) -> Result<Vec<String>, ProviderError> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut query = vec![
                ("list-type".to_owned(), "2".to_owned()),
                ("prefix".to_owned(), prefix.to_owned()),
            ];
            if let Some(max) = limit {
                query.push(("max-keys".to_owned(), max.to_string()));
            }
            if let Some(t) = &token {
                query.push(("continuation-token".to_owned(), t.clone()));
            }
            let resp = self.send(
                ctx,
                "GET",
                &Self::bucket_path(bucket),
                &query,
                &[],
                &[],
                "s3 list objects",
            )?;
            let body = read_body(resp, "s3 list objects")?;
            let xml = String::from_utf8_lossy(&body);
            keys.extend(xml_values(&xml, "Key"));

            if limit.is_some_and(|max| keys.len() >= max) {
                break;
            }
            let truncated = xml_values(&xml, "IsTruncated")
                .first()
                .is_some_and(|v| v == "true");
            token = xml_values(&xml, "NextContinuationToken").into_iter().next();
            if !truncated || token.is_none() {
                break;
            }
        }
        Ok(keys)
    }

    pub fn copy_object(
        &self,
        ctx: &CallContext,
        bucket: &str,
        from: &str,
        to: &str,
    ) -> Result<(), ProviderError> {
        let source = format!("/{bucket}/{}", sigv4::uri_encode(from, true));
        self.send(
            ctx,
            "PUT",
            &Self::object_path(bucket, to),
            &[],
            &[("x-amz-copy-source".to_owned(), source)],
            &[],
            "s3 copy object",
        )?;
        Ok(())
    }

    pub fn put_object(
        &self,
        ctx: &CallContext,
        bucket: &str,
        key: &str,
        body: &[u8],
    ) -> Result<(), ProviderError> {
        self.send(
            ctx,
            "PUT",
            &Self::object_path(bucket, key),
            &[],
            &[],
            body,
            "s3 put object",
        )?;
        Ok(())
    }

    pub fn delete_object(
        &self,
        ctx: &CallContext,
        bucket: &str,
        key: &str,
    ) -> Result<(), ProviderError> {
        match self.send(
            ctx,
            "DELETE",
            &Self::object_path(bucket, key),
            &[],
            &[],
            &[],
            "s3 delete object",
        ) {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn head_bucket(&self, ctx: &CallContext, bucket: &str) -> Result<(), ProviderError> {
        self.send(
            ctx,
            "HEAD",
            &Self::bucket_path(bucket),
            &[],
            &[],
            &[],
            "s3 head bucket",
        )?;
        Ok(())
    }

    pub fn create_bucket(
        &self,
        ctx: &CallContext,
        bucket: &str,
        headers: &[(String, String)],
    ) -> Result<(), ProviderError> {
        self.send(
            ctx,
            "PUT",
            &Self::bucket_path(bucket),
            &[],
            headers,
            &[],
            "s3 create bucket",
        )?;
        Ok(())
    }

    pub fn delete_bucket(&self, ctx: &CallContext, bucket: &str) -> Result<(), ProviderError> {
        match self.send(
            ctx,
            "DELETE",
            &Self::bucket_path(bucket),
            &[],
            &[],
            &[],
            "s3 delete bucket",
        ) {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn with_headers<B>(
    mut req: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
    auth: &str,
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        req = req.header(name.as_str(), value.as_str());
    }
    req.header("Authorization", auth)
}

/// Text content of every `<tag>...</tag>` in `xml`, entity-decoded.
fn xml_values(xml: &str, tag: &str) -> Vec<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut out = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        let Some(end) = after.find(&close) else {
            break;
        };
        out.push(xml_unescape(&after[..end]));
        rest = &after[end + close.len()..];
    }
    out
}

fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Prefix-copy forks inside a single bucket: `<prefix><env>/`.
///
/// Plain S3 has no copy-on-write, so `create` copies every source object
/// server-side. The copy is bounded by `full_copy_timeout_secs`; running out
/// of time is transient and the partial copy is removed.
pub struct S3Adapter {
    client: S3Client,
    config: S3Config,
}

impl S3Adapter {
    pub fn new(config: S3Config) -> Self {
        Self {
            client: S3Client::new(&config.endpoint(), config.region()),
            config,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, access_key_id: &str, secret_access_key: &str) -> Self {
        self.client.credentials = Some(Credentials {
            access_key_id: access_key_id.to_owned(),
            secret_access_key: secret_access_key.to_owned(),
            session_token: None,
        });
        self
    }

    pub fn fork_root(&self, env: &str) -> String {
        format!("{}{env}/", self.config.fork_prefix())
    }

    fn handle(&self, env: &str) -> ResourceHandle {
        ResourceHandle::ready(
            ResourceKind::Storage,
            "s3",
            format!("s3://{}/{}", self.config.bucket, self.fork_root(env)),
        )
    }

    /// Source objects as `(source key, key relative to the source root)`.
    fn source_objects(
        &self,
        ctx: &CallContext,
        source: &str,
    ) -> Result<Vec<(String, String)>, ProviderError> {
        let bucket = &self.config.bucket;
        if source != DEFAULT_SOURCE {
            let root = self.fork_root(source);
            let keys = self.client.list_keys(ctx, bucket, &root, None)?;
            if keys.is_empty() {
                return Err(ProviderError::permanent(format!(
                    "source fork s3://{bucket}/{root} does not exist"
                )));
            }
            return Ok(keys
                .into_iter()
                .filter_map(|k| {
                    let rel = k.strip_prefix(&root)?.to_owned();
                    (rel != FORK_MARKER).then_some((k, rel))
                })
                .collect());
        }

        let fork_prefix = self.config.fork_prefix();
        let keys = self.client.list_keys(ctx, bucket, "", None)?;
        let fork_roots: Vec<String> = keys
            .iter()
            .filter_map(|k| k.strip_suffix(FORK_MARKER).map(str::to_owned))
            .filter(|root| !root.is_empty())
            .collect();
        Ok(keys
            .into_iter()
            .filter(|k| fork_prefix.is_empty() || !k.starts_with(&fork_prefix))
            .filter(|k| !fork_roots.iter().any(|root| k.starts_with(root.as_str())))
            .map(|k| (k.clone(), k))
            .collect())
    }

    fn remove_prefix(&self, ctx: &CallContext, root: &str) -> Result<(), ProviderError> {
        for key in self
            .client
            .list_keys(ctx, &self.config.bucket, root, None)?
        {
            self.client.delete_object(ctx, &self.config.bucket, &key)?;
        }
        Ok(())
    }
}

impl ProviderAdapter for S3Adapter {
    fn provider_id(&self) -> &'static str {
        "s3"
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Storage
    }

    fn create(
        &self,
        ctx: &CallContext,
        env: &str,
        source: &str,
    ) -> Result<ResourceHandle, ProviderError> {
        let bucket = &self.config.bucket;
        let target = self.fork_root(env);
        if !self
            .client
            .list_keys(ctx, bucket, &target, Some(1))?
            .is_empty()
        {
            return Err(ProviderError::permanent(format!(
                "s3://{bucket}/{target} already exists"
            )));
        }

        let objects = self.source_objects(ctx, source)?;
        tracing::debug!(
            "s3: copying {} objects into s3://{bucket}/{target}",
            objects.len()
        );
        let copied = objects.iter().try_for_each(|(from, rel)| {
            if ctx.expired() {
                return Err(ProviderError::transient(format!(
                    "full copy into s3://{bucket}/{target} exceeded its time budget"
                )));
            }
            self.client
                .copy_object(ctx, bucket, from, &format!("{target}{rel}"))
        });
        let marked = copied.and_then(|()| {
            self.client
                .put_object(ctx, bucket, &format!("{target}{FORK_MARKER}"), b"")
        });
        if let Err(e) = marked {
            // Best effort: don't leave a half-copied prefix behind.
            let cleanup = CallContext::new(ctx.project(), Duration::from_secs(30));
            if let Err(cleanup_err) = self.remove_prefix(&cleanup, &target) {
                tracing::warn!("s3: could not remove partial copy {target}: {cleanup_err}");
            }
            return Err(e);
        }
        Ok(self.handle(env))
    }

    fn locate(&self, ctx: &CallContext, env: &str) -> Result<ResourceHandle, ProviderError> {
        let target = self.fork_root(env);
        let keys = self
            .client
            .list_keys(ctx, &self.config.bucket, &target, Some(1))?;
        if keys.is_empty() {
            return Err(ProviderError::not_found(format!(
                "s3://{}/{target} not found",
                self.config.bucket
            )));
        }
        Ok(self.handle(env))
    }

    fn delete(&self, ctx: &CallContext, env: &str) -> Result<(), ProviderError> {
        if env == DEFAULT_SOURCE {
            return Err(ProviderError::permanent(
                "refusing to delete production storage",
            ));
        }
        self.remove_prefix(ctx, &self.fork_root(env))
    }

    fn create_timeout(&self) -> Option<Duration> {
        Some(self.config.full_copy_timeout())
    }
}

/// Tigris copy-on-write bucket forks: `<bucket>-<env>`.
pub struct TigrisAdapter {
    client: S3Client,
    config: TigrisConfig,
}

impl TigrisAdapter {
    pub fn new(config: TigrisConfig) -> Self {
        Self {
            client: S3Client::new(&config.endpoint(), config.region()),
            config,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, access_key_id: &str, secret_access_key: &str) -> Self {
        self.client.credentials = Some(Credentials {
            access_key_id: access_key_id.to_owned(),
            secret_access_key: secret_access_key.to_owned(),
            session_token: None,
        });
        self
    }

    pub fn bucket_name(&self, env: &str) -> String {
        if env == DEFAULT_SOURCE {
            self.config.bucket.clone()
        } else {
            format!("{}-{env}", self.config.bucket)
        }
    }

    fn handle(&self, env: &str) -> ResourceHandle {
        ResourceHandle::ready(
            ResourceKind::Storage,
            "tigris",
            format!("s3://{}/", self.bucket_name(env)),
        )
    }
}

impl ProviderAdapter for TigrisAdapter {
    fn provider_id(&self) -> &'static str {
        "tigris"
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Storage
    }

    fn create(
        &self,
        ctx: &CallContext,
        env: &str,
        source: &str,
    ) -> Result<ResourceHandle, ProviderError> {
        let fork = self.bucket_name(env);
        let parent = self.bucket_name(source);
        tracing::debug!("tigris: forking bucket {parent} into {fork}");
        self.client.create_bucket(
            ctx,
            &fork,
            &[("x-tigris-fork-source-bucket".to_owned(), parent)],
        )?;
        Ok(self.handle(env))
    }

    fn locate(&self, ctx: &CallContext, env: &str) -> Result<ResourceHandle, ProviderError> {
        self.client.head_bucket(ctx, &self.bucket_name(env))?;
        Ok(self.handle(env))
    }

    fn delete(&self, ctx: &CallContext, env: &str) -> Result<(), ProviderError> {
        if env == DEFAULT_SOURCE {
            return Err(ProviderError::permanent(
                "refusing to delete the production bucket",
            ));
        }
        let fork = self.bucket_name(env);
        let keys = match self.client.list_keys(ctx, &fork, "", None) {
            Ok(keys) => keys,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        for key in keys {
            self.client.delete_object(ctx, &fork, &key)?;
        }
        self.client.delete_bucket(ctx, &fork)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_server::{FakeServer, Recorded};
    use crate::ErrorClass;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    fn percent_decode(s: &str) -> String {
        let bytes = s.as_bytes();
        let mut out = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' && i + 2 < bytes.len() {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap();
                out.push(u8::from_str_radix(hex, 16).unwrap());
                i += 3;
            } else {
                out.push(bytes[i]);
                i += 1;
            }
        }
        String::from_utf8(out).unwrap()
    }

    fn query_param(url: &str, name: &str) -> Option<String> {
        let (_, qs) = url.split_once('?')?;
        qs.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            (k == name).then(|| percent_decode(v))
        })
    }

    /// Minimal in-memory S3: one bucket namespace, objects keyed `bucket/key`.
    fn fake_s3(objects: Arc<Mutex<BTreeMap<String, String>>>) -> FakeServer {
        FakeServer::start(move |req: &Recorded| {
            let mut store = objects.lock().unwrap();
            let path = percent_decode(req.path().trim_start_matches('/'));
            let (bucket, key) = path.split_once('/').unwrap_or((path.as_str(), ""));
            match (req.method.as_str(), key.is_empty()) {
                ("GET", true) => {
                    let prefix = query_param(&req.url, "prefix").unwrap_or_default();
                    let max: usize = query_param(&req.url, "max-keys")
                        .map_or(1000, |m| m.parse().unwrap());
                    let full = format!("{bucket}/{prefix}");
                    let keys: Vec<_> = store
                        .keys()
                        .filter(|k| k.starts_with(&full))
                        .take(max)
                        .map(|k| k[bucket.len() + 1..].to_owned())
                        .collect();
                    let contents: String = keys
                        .iter()
                        .map(|k| format!("<Contents><Key>{k}</Key></Contents>"))
                        .collect();
                    (
                        200,
                        format!(
                            "<ListBucketResult><IsTruncated>false</IsTruncated>{contents}</ListBucketResult>"
                        ),
                    )
                }
                ("PUT", false) => {
                    let value = match req.header("x-amz-copy-source") {
                        Some(src) => {
                            let src = percent_decode(src.trim_start_matches('/'));
                            match store.get(&src) {
                                Some(v) => v.clone(),
                                None => return (404, String::new()),
                            }
                        }
                        None => req.body.clone(),
                    };
                    store.insert(format!("{bucket}/{key}"), value);
                    (200, String::new())
                }
                ("DELETE", false) => {
                    store.remove(&format!("{bucket}/{key}"));
                    (204, String::new())
                }
                _ => (405, String::new()),
            }
        })
    }

    fn s3_adapter(endpoint: &str, timeout: Option<u64>) -> S3Adapter {
        S3Adapter::new(S3Config {
            bucket: "assets".to_owned(),
            endpoint: Some(endpoint.to_owned()),
            region: Some("us-east-1".to_owned()),
            prefix: None,
            full_copy_timeout_secs: timeout,
        })
        .with_credentials("AKID", "SECRET")
    }

    fn ctx() -> CallContext {
        CallContext::new("shop", Duration::from_secs(10))
    }

    fn seeded() -> Arc<Mutex<BTreeMap<String, String>>> {
        let mut m = BTreeMap::new();
        m.insert("assets/logo.png".to_owned(), "png".to_owned());
        m.insert("assets/docs/readme.txt".to_owned(), "hello".to_owned());
        m.insert("other/ignored.txt".to_owned(), "x".to_owned());
        Arc::new(Mutex::new(m))
    }

    #[test]
    fn xml_values_extracts_and_unescapes() {
        let xml = "<R><Contents><Key>a&amp;b</Key></Contents><Contents><Key>c</Key></Contents>\
                   <IsTruncated>true</IsTruncated><NextContinuationToken>tok</NextContinuationToken></R>";
        assert_eq!(xml_values(xml, "Key"), vec!["a&b", "c"]);
        assert_eq!(xml_values(xml, "IsTruncated"), vec!["true"]);
        assert_eq!(xml_values(xml, "NextContinuationToken"), vec!["tok"]);
        assert!(xml_values(xml, "Missing").is_empty());
    }

    #[test]
    fn host_is_derived_from_endpoint() {
        let c = S3Client::new("http://127.0.0.1:9000/", "us-east-1");
        assert_eq!(c.host, "127.0.0.1:9000");
        assert_eq!(c.endpoint, "http://127.0.0.1:9000");
    }

    #[test]
    fn create_copies_production_objects_under_fork_prefix() {
        let objects = seeded();
        let server = fake_s3(Arc::clone(&objects));
        let adapter = s3_adapter(&server.url, None);

        let handle = adapter.create(&ctx(), "alice", "prod").unwrap();
        assert_eq!(handle.external_ref, "s3://assets/forks/alice/");

        let store = objects.lock().unwrap();
        assert_eq!(store["assets/forks/alice/logo.png"], "png");
        assert_eq!(store["assets/forks/alice/docs/readme.txt"], "hello");
        assert!(store.contains_key("assets/forks/alice/.forkstack-fork"));
        assert!(!store.contains_key("assets/forks/alice/other/ignored.txt"));

        let signed = server
            .requests()
            .iter()
            .all(|r| r.header("authorization").is_some_and(|a| a.starts_with("AWS4-HMAC-SHA256")));
        assert!(signed, "every request must carry a SigV4 signature");
    }

    #[test]
    fn forks_of_production_skip_existing_forks() {
        let objects = seeded();
        let server = fake_s3(Arc::clone(&objects));
        let adapter = s3_adapter(&server.url, None);
        adapter.create(&ctx(), "alice", "prod").unwrap();
        adapter.create(&ctx(), "bob", "prod").unwrap();

        let store = objects.lock().unwrap();
        assert!(store.contains_key("assets/forks/bob/logo.png"));
        assert!(
            !store.keys().any(|k| k.starts_with("assets/forks/bob/forks/")),
            "forks must not nest"
        );
    }

    #[test]
    fn create_from_fork_copies_that_fork() {
        let objects = seeded();
        let server = fake_s3(Arc::clone(&objects));
        let adapter = s3_adapter(&server.url, None);
        adapter.create(&ctx(), "alice", "prod").unwrap();
        objects
            .lock()
            .unwrap()
            .insert("assets/forks/alice/only-alice.txt".to_owned(), "a".to_owned());

        adapter.create(&ctx(), "bob", "alice").unwrap();
        let store = objects.lock().unwrap();
        assert_eq!(store["assets/forks/bob/only-alice.txt"], "a");
    }

    #[test]
    fn create_refuses_existing_fork() {
        let objects = seeded();
        let server = fake_s3(Arc::clone(&objects));
        let adapter = s3_adapter(&server.url, None);
        adapter.create(&ctx(), "alice", "prod").unwrap();
        let err = adapter.create(&ctx(), "alice", "prod").unwrap_err();
        assert_eq!(err.class, ErrorClass::Permanent);
    }

    #[test]
    fn create_timeout_comes_from_config() {
        let adapter = s3_adapter("http://unused", Some(42));
        assert_eq!(adapter.create_timeout(), Some(Duration::from_secs(42)));
        let default = s3_adapter("http://unused", None);
        assert_eq!(default.create_timeout(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn locate_and_delete_roundtrip() {
        let objects = seeded();
        let server = fake_s3(Arc::clone(&objects));
        let adapter = s3_adapter(&server.url, None);
        assert!(adapter.locate(&ctx(), "alice").unwrap_err().is_not_found());

        adapter.create(&ctx(), "alice", "prod").unwrap();
        assert_eq!(
            adapter.locate(&ctx(), "alice").unwrap().external_ref,
            "s3://assets/forks/alice/"
        );

        adapter.delete(&ctx(), "alice").unwrap();
        assert!(adapter.locate(&ctx(), "alice").unwrap_err().is_not_found());
        assert!(objects.lock().unwrap().contains_key("assets/logo.png"));
        adapter.delete(&ctx(), "alice").unwrap();
    }

    #[test]
    fn tigris_create_sends_fork_header() {
        let server = FakeServer::start(|_| (200, String::new()));
        let adapter = TigrisAdapter::new(TigrisConfig {
            bucket: "uploads".to_owned(),
            endpoint: Some(server.url.clone()),
            region: None,
        })
        .with_credentials("AKID", "SECRET");

        let handle = adapter.create(&ctx(), "alice", "prod").unwrap();
        assert_eq!(handle.external_ref, "s3://uploads-alice/");
        assert_eq!(handle.provider_id, "tigris");

        let req = &server.requests()[0];
        assert_eq!(req.method, "PUT");
        assert_eq!(req.path(), "/uploads-alice");
        assert_eq!(req.header("x-tigris-fork-source-bucket"), Some("uploads"));
        let auth = req.header("authorization").unwrap();
        assert!(auth.contains("/auto/s3/aws4_request"), "{auth}");
        assert!(auth.contains("x-tigris-fork-source-bucket"), "{auth}");
    }

    #[test]
    fn tigris_delete_of_missing_bucket_succeeds() {
        let server = FakeServer::start(|_| (404, String::new()));
        let adapter = TigrisAdapter::new(TigrisConfig {
            bucket: "uploads".to_owned(),
            endpoint: Some(server.url.clone()),
            region: None,
        })
        .with_credentials("AKID", "SECRET");
        adapter.delete(&ctx(), "alice").unwrap();
        assert!(adapter.locate(&ctx(), "alice").unwrap_err().is_not_found());
    }
}
