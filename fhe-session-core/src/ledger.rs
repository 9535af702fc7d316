use crate::errors::{ProviderError, ProviderResult};
use crate::provider::LedgerConnection;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ledger connection reporting a fixed chain id. Useful for local development
/// and tests; the chain id can be switched to simulate a wallet changing
/// networks.
#[derive(Debug, Clone)]
pub struct StaticLedger {
    chain_id: Arc<AtomicU64>,
}

impl StaticLedger {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id: Arc::new(AtomicU64::new(chain_id)),
        }
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.chain_id.store(chain_id, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerConnection for StaticLedger {
    async fn chain_id(&self) -> ProviderResult<u64> {
        Ok(self.chain_id.load(Ordering::SeqCst))
    }
}

#[cfg(feature = "http")]
pub use rpc::JsonRpcLedger;

#[cfg(feature = "http")]
mod rpc {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;
    use url::Url;

    #[derive(Serialize)]
    struct RpcRequest<'a> {
        jsonrpc: &'static str,
        id: u64,
        method: &'a str,
        params: [(); 0],
    }

    #[derive(Deserialize)]
    struct RpcResponse {
        result: Option<String>,
        error: Option<RpcError>,
    }

    #[derive(Deserialize)]
    struct RpcError {
        code: i64,
        message: String,
    }

    /// Ledger connection over an Ethereum-style JSON-RPC endpoint.
    #[derive(Clone)]
    pub struct JsonRpcLedger {
        url: Url,
        client: reqwest::Client,
        timeout: Duration,
    }

    impl JsonRpcLedger {
        pub fn new(url: impl AsRef<str>) -> ProviderResult<Self> {
            let url = Url::parse(url.as_ref())
                .map_err(|err| ProviderError::Transport(format!("invalid rpc url: {err}")))?;
            let client = reqwest::Client::builder()
                .user_agent(concat!("fhe-session/", env!("CARGO_PKG_VERSION")))
                .build()?;
            Ok(Self {
                url,
                client,
                timeout: Duration::from_secs(10),
            })
        }

        /// Override the request timeout (default 10 seconds).
        pub fn with_timeout(mut self, timeout: Duration) -> Self {
            self.timeout = timeout;
            self
        }
    }

    #[async_trait]
    impl LedgerConnection for JsonRpcLedger {
        async fn chain_id(&self) -> ProviderResult<u64> {
            let body = RpcRequest {
                jsonrpc: "2.0",
                id: 1,
                method: "eth_chainId",
                params: [],
            };
            let response = self
                .client
                .post(self.url.clone())
                .timeout(self.timeout)
                .json(&body)
                .send()
                .await?
                .error_for_status()?;
            let payload = response.json::<RpcResponse>().await?;
            if let Some(err) = payload.error {
                return Err(ProviderError::InvalidResponse(format!(
                    "rpc error {}: {}",
                    err.code, err.message
                )));
            }
            let raw = payload.result.ok_or_else(|| {
                ProviderError::InvalidResponse("eth_chainId returned no result".into())
            })?;
            parse_quantity(&raw)
        }
    }

    pub(super) fn parse_quantity(raw: &str) -> ProviderResult<u64> {
        let digits = raw.strip_prefix("0x").ok_or_else(|| {
            ProviderError::InvalidResponse(format!("quantity `{raw}` is not 0x-prefixed"))
        })?;
        u64::from_str_radix(digits, 16).map_err(|err| {
            ProviderError::InvalidResponse(format!("invalid quantity `{raw}`: {err}"))
        })
    }
}
