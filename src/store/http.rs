//! HTTP secret store client.
//!
//! Speaks the store's REST API directly: `<address>/v1/<path>` with the
//! access token in `X-Vault-Token` and the namespace selector in
//! `X-Vault-Namespace`. Directory listings use the non-standard `LIST` verb.
//!
//! # Example
//!
//! ```rust,ignore
//! use vault_migrator::store::{EndpointConfig, HttpSecretStore, SecretStore};
//!
//! let store = HttpSecretStore::new(EndpointConfig::new("https://vault.example.com", "s.token"))?;
//! let names = store.list("kv/issuers/").await?;
//! ```

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, trace};

use super::client::{KeyBackup, SecretStore};
use super::error::{StoreResult, TransportError};

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Connection settings for one store endpoint.
#[derive(Clone)]
pub struct EndpointConfig {
    /// Base URL (e.g. "https://vault.example.com:8200")
    pub address: String,

    /// Access token sent with every request
    pub token: String,

    /// Namespace selector header value, if any
    pub namespace: Option<String>,

    /// Mount path of the transit engine
    pub transit_mount: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl EndpointConfig {
    pub fn new(address: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token: token.into(),
            namespace: Some("admin".to_string()),
            transit_mount: "transit".to_string(),
            timeout: Duration::from_secs(36_000),
        }
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_transit_mount(mut self, mount: impl Into<String>) -> Self {
        self.transit_mount = mount.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("address", &self.address)
            .field("token", &"[REDACTED]")
            .field("namespace", &self.namespace)
            .field("transit_mount", &self.transit_mount)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(default)]
    keys: Vec<String>,
}

/// Secret store backed by a live HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpSecretStore {
    client: Client,
    config: EndpointConfig,
}

impl HttpSecretStore {
    /// Create a client for the given endpoint.
    pub fn new(config: EndpointConfig) -> StoreResult<Self> {
        let client = Client::builder().timeout(config.timeout).build().map_err(|e| {
            TransportError::request(&config.address, format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/v1/{}",
            self.config.address.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        debug!(method = %method, url = %url, "Secret store request");
        let builder = self.client.request(method, url).header(TOKEN_HEADER, &self.config.token);
        match &self.config.namespace {
            Some(namespace) => builder.header(NAMESPACE_HEADER, namespace),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, url: &str) -> StoreResult<Response> {
        let response = builder.send().await.map_err(|e| classify(url, e))?;
        let status = response.status();
        trace!(url = %url, status = %status, "Secret store response");

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
            return Err(TransportError::status(url, status.as_u16(), body));
        }

        Ok(response)
    }

    async fn data<T: serde::de::DeserializeOwned>(
        &self,
        response: Response,
        url: &str,
    ) -> StoreResult<T> {
        let envelope: DataEnvelope<T> = response.json().await.map_err(|e| {
            TransportError::invalid_response(url, format!("Failed to decode response body: {}", e))
        })?;
        Ok(envelope.data)
    }
}

/// Sort a reqwest failure into the three transport classes.
fn classify(url: &str, error: reqwest::Error) -> TransportError {
    if error.is_builder() {
        TransportError::request(url, error.to_string())
    } else if error.is_timeout() || error.is_connect() || error.is_request() {
        TransportError::no_response(url, error.to_string())
    } else {
        TransportError::request(url, error.to_string())
    }
}

#[async_trait]
impl SecretStore for HttpSecretStore {
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let url = self.url(prefix);
        let method = Method::from_bytes(b"LIST")
            .map_err(|e| TransportError::request(&url, format!("Invalid LIST method: {}", e)))?;

        match self.send(self.request(method, &url), &url).await {
            Ok(response) => {
                let data: ListData = self.data(response, &url).await?;
                Ok(data.keys)
            }
            Err(TransportError::Status { status: 404, .. }) => {
                debug!(prefix = %prefix, "Prefix has no children");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn read(&self, path: &str) -> StoreResult<Value> {
        let url = self.url(path);
        let response = self.send(self.request(Method::GET, &url), &url).await?;
        self.data(response, &url).await
    }

    async fn write(&self, path: &str, payload: &Value) -> StoreResult<()> {
        let url = self.url(path);
        self.send(self.request(Method::POST, &url).json(payload), &url).await?;
        Ok(())
    }

    async fn export_key_backup(&self, key_name: &str) -> StoreResult<KeyBackup> {
        let url = self.url(&format!("{}/backup/{}", self.config.transit_mount, key_name));
        let response = self.send(self.request(Method::GET, &url), &url).await?;
        let mut backup: KeyBackup = self.data(response, &url).await?;
        backup.name = key_name.to_string();
        Ok(backup)
    }

    async fn import_key_backup(&self, key_name: &str, backup: &KeyBackup) -> StoreResult<()> {
        let url = self.url(&format!("{}/restore/{}", self.config.transit_mount, key_name));
        let body = json!({
            "name": backup.name,
            "backup": backup.backup,
            "force": true,
        });
        self.send(self.request(Method::POST, &url).json(&body), &url).await?;
        Ok(())
    }

    async fn enable_export_and_backup(&self, key_path: &str) -> StoreResult<()> {
        let mut config = self.read(key_path).await?;
        match config.as_object_mut() {
            Some(fields) => {
                fields.insert("exportable".to_string(), Value::Bool(true));
                fields.insert("allow_plaintext_backup".to_string(), Value::Bool(true));
            }
            None => {
                return Err(TransportError::request(
                    self.url(key_path),
                    "Key configuration is not a JSON object",
                ))
            }
        }

        let config_path = format!("{}/config", key_path.trim_end_matches('/'));
        self.write(&config_path, &config).await
    }
}
