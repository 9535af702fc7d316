use crate::config::SessionConfig;
use crate::errors::{ProviderError, ProviderResult};
use crate::provider::EncryptionProvider;
use crate::types::{
    AuthorizationProof, AuthorizationRequest, EncryptRequest, EncryptedValue, ParamsRequest,
    PublicParams,
};
use crate::wire;
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

/// Encryption provider backed by an HTTP gateway.
#[derive(Clone)]
pub struct HttpGatewayProvider {
    base_url: Url,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpGatewayProvider {
    /// Build a new provider using the provided base URL.
    pub fn new(base_url: impl AsRef<str>) -> ProviderResult<Self> {
        let mut url = Url::parse(base_url.as_ref())
            .map_err(|err| ProviderError::Transport(format!("invalid gateway url: {err}")))?;
        // Endpoints are joined relative to the base, which needs a trailing slash.
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("fhe-session/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: url,
            client,
            timeout: Duration::from_secs(10),
        })
    }

    /// Build a provider for a session configuration, falling back to the
    /// network's default gateway.
    pub fn from_config(config: &SessionConfig) -> ProviderResult<Self> {
        match config.gateway_url() {
            Some(url) => Self::new(url.as_str()),
            None => {
                let network = config.network();
                let url = network.default_gateway_url().ok_or_else(|| {
                    ProviderError::Transport(format!(
                        "no gateway url configured for network `{network}`"
                    ))
                })?;
                Self::new(url)
            }
        }
    }

    /// Override the request timeout (default 10 seconds).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ProviderResult<Url> {
        self.base_url
            .join(path)
            .map_err(|err| ProviderError::Transport(err.to_string()))
    }
}

#[async_trait]
impl EncryptionProvider for HttpGatewayProvider {
    async fn fetch_public_params(&self, request: &ParamsRequest) -> ProviderResult<PublicParams> {
        let mut url = self.endpoint("v1/public-params")?;
        url.query_pairs_mut()
            .append_pair("network", request.network.as_str());
        if let Some(acl) = &request.acl_address {
            url.query_pairs_mut().append_pair("acl", acl);
        }
        debug!(%url, "fetching public parameters");
        let builder = self.client.get(url).timeout(self.timeout);
        let response = ensure_success(builder.send().await?).await?;
        Ok(response.json::<PublicParams>().await?)
    }

    async fn encrypt(&self, request: &EncryptRequest) -> ProviderResult<EncryptedValue> {
        let url = self.endpoint("v1/encrypt")?;
        let body = wire::EncryptBody {
            value: request.value,
            bits: request.width.bits(),
            acl_address: request.acl_address.clone(),
        };
        let builder = self.client.post(url).timeout(self.timeout).json(&body);
        let response = ensure_success(builder.send().await?).await?;
        Ok(response.json::<EncryptedValue>().await?)
    }

    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> ProviderResult<AuthorizationProof> {
        let url = self.endpoint("v1/authorize")?;
        let body = wire::AuthorizeBody {
            resource: request.resource.clone(),
            principal: request.principal.clone(),
            public_key: request.public_key.clone(),
        };
        let builder = self.client.post(url).timeout(self.timeout).json(&body);
        let response = ensure_success(builder.send().await?).await?;
        let payload = response.json::<wire::AuthorizeResponse>().await?;
        Ok(AuthorizationProof {
            resource: request.resource.clone(),
            principal: request.principal.clone(),
            token: payload.token,
            public_key: request.public_key.clone(),
        })
    }
}

async fn ensure_success(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let bytes = response.bytes().await?;
    let message = match serde_json::from_slice::<wire::ErrorResponse>(&bytes) {
        Ok(err) => err.message,
        Err(_) => String::from_utf8_lossy(&bytes).to_string(),
    };
    Err(ProviderError::Status { status, message })
}
