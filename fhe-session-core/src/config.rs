use crate::errors::{Result, SessionError};
use crate::network::Network;
use crate::provider::LedgerConnection;
use crate::retry::RetryPolicy;
use crate::util::parse_address;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const NETWORK_ENV: &str = "FHE_SESSION_NETWORK";
const GATEWAY_ENV: &str = "FHE_SESSION_GATEWAY_URL";
const ACL_ENV: &str = "FHE_SESSION_ACL_ADDRESS";
const MAX_RETRIES_ENV: &str = "FHE_SESSION_MAX_RETRIES";
const BASE_DELAY_ENV: &str = "FHE_SESSION_BASE_DELAY_MS";

/// How a session reaches the remote encryption service and the ledger.
/// Immutable once built.
#[derive(Clone)]
pub struct SessionConfig {
    network: Network,
    ledger: Arc<dyn LedgerConnection>,
    gateway_url: Option<Url>,
    acl_address: Option<String>,
    retry: RetryPolicy,
}

impl SessionConfig {
    /// Start building a configuration seeded from the environment.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::from_env()
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerConnection> {
        &self.ledger
    }

    /// Gateway override, if one was configured.
    pub fn gateway_url(&self) -> Option<&Url> {
        self.gateway_url.as_ref()
    }

    pub fn acl_address(&self) -> Option<&str> {
        self.acl_address.as_deref()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("network", &self.network)
            .field("gateway_url", &self.gateway_url.as_ref().map(Url::as_str))
            .field("acl_address", &self.acl_address)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SessionConfig`].
#[derive(Default)]
pub struct SessionConfigBuilder {
    network: Option<Network>,
    ledger: Option<Arc<dyn LedgerConnection>>,
    gateway_url: Option<String>,
    acl_address: Option<String>,
    max_retries: Option<u32>,
    base_delay: Option<Duration>,
    max_delay: Option<Duration>,
    jitter: bool,
}

impl SessionConfigBuilder {
    /// Initialise the builder using environment configuration.
    ///
    /// * `FHE_SESSION_NETWORK` selects the network (default: `local`).
    /// * `FHE_SESSION_GATEWAY_URL` overrides the gateway endpoint.
    /// * `FHE_SESSION_ACL_ADDRESS` sets the access-control-list contract.
    /// * `FHE_SESSION_MAX_RETRIES` overrides the retry budget (default: 3).
    /// * `FHE_SESSION_BASE_DELAY_MS` overrides the base backoff (default: 1000).
    pub fn from_env() -> Self {
        let mut builder = SessionConfigBuilder::default();

        if let Ok(value) = std::env::var(NETWORK_ENV) {
            builder.network = Network::from_env_value(&value);
        }

        if let Ok(url) = std::env::var(GATEWAY_ENV) {
            if !url.trim().is_empty() {
                builder.gateway_url = Some(url);
            }
        }

        if let Ok(acl) = std::env::var(ACL_ENV) {
            if !acl.trim().is_empty() {
                builder.acl_address = Some(acl);
            }
        }

        if let Ok(retries) = std::env::var(MAX_RETRIES_ENV) {
            if let Ok(retries) = retries.trim().parse::<u32>() {
                builder.max_retries = Some(retries);
            }
        }

        if let Ok(delay) = std::env::var(BASE_DELAY_ENV) {
            if let Ok(millis) = delay.trim().parse::<u64>() {
                builder.base_delay = Some(Duration::from_millis(millis));
            }
        }

        builder
    }

    pub fn network(mut self, network: Network) -> Self {
        self.network = Some(network);
        self
    }

    /// Attach the ledger connection the session verifies the chain with.
    pub fn ledger<L>(mut self, ledger: L) -> Self
    where
        L: LedgerConnection + 'static,
    {
        self.ledger = Some(Arc::new(ledger));
        self
    }

    pub fn shared_ledger(mut self, ledger: Arc<dyn LedgerConnection>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = Some(url.into());
        self
    }

    pub fn acl_address(mut self, address: impl Into<String>) -> Self {
        self.acl_address = Some(address.into());
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    pub fn jitter(mut self, on: bool) -> Self {
        self.jitter = on;
        self
    }

    pub fn build(self) -> Result<SessionConfig> {
        let ledger = self
            .ledger
            .ok_or_else(|| SessionError::Config("a ledger connection is required".into()))?;

        let gateway_url = match self.gateway_url {
            Some(raw) => {
                let url = Url::parse(raw.trim())
                    .map_err(|err| SessionError::Config(format!("invalid gateway url: {err}")))?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(SessionError::Config(format!(
                        "gateway url must use http or https, got `{}`",
                        url.scheme()
                    )));
                }
                Some(url)
            }
            None => None,
        };

        if let Some(acl) = self.acl_address.as_deref() {
            parse_address(acl)
                .map_err(|err| SessionError::Config(format!("invalid acl address: {err}")))?;
        }

        let defaults = RetryPolicy::default();
        let base_delay = self.base_delay.unwrap_or(defaults.base_delay());
        if base_delay.is_zero() {
            return Err(SessionError::Config(
                "retry base delay must be positive".into(),
            ));
        }
        let mut retry = RetryPolicy::new(
            self.max_retries.unwrap_or(defaults.max_retries()),
            base_delay,
        )
        .with_jitter(self.jitter);
        if let Some(cap) = self.max_delay {
            retry = retry.with_max_delay(cap);
        }

        Ok(SessionConfig {
            network: self.network.unwrap_or(Network::Local),
            ledger,
            gateway_url,
            acl_address: self.acl_address,
            retry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::StaticLedger;

    fn clear_env() {
        unsafe {
            for var in [
                NETWORK_ENV,
                GATEWAY_ENV,
                ACL_ENV,
                MAX_RETRIES_ENV,
                BASE_DELAY_ENV,
            ] {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    fn builder_requires_ledger() {
        let err = SessionConfigBuilder::default().build().unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }

    #[test]
    fn builder_defaults() {
        let config = SessionConfigBuilder::default()
            .ledger(StaticLedger::new(31_337))
            .build()
            .unwrap();
        assert_eq!(config.network(), Network::Local);
        assert_eq!(config.retry_policy(), &RetryPolicy::default());
        assert!(config.gateway_url().is_none());
    }

    #[test]
    fn builder_rejects_bad_overrides() {
        let err = SessionConfigBuilder::default()
            .ledger(StaticLedger::new(1))
            .gateway_url("ftp://gateway")
            .build()
            .unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));

        let err = SessionConfigBuilder::default()
            .ledger(StaticLedger::new(1))
            .acl_address("0x1234")
            .build()
            .unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }

    #[test]
    fn builder_rejects_zero_base_delay() {
        let err = SessionConfigBuilder::default()
            .ledger(StaticLedger::new(31_337))
            .base_delay(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::Config("retry base delay must be positive".into())
        );
    }

    #[tokio::test]
    async fn shared_ledger_is_not_copied() {
        let ledger = Arc::new(StaticLedger::new(31_337));
        let config = SessionConfigBuilder::default()
            .shared_ledger(ledger.clone())
            .build()
            .unwrap();
        ledger.set_chain_id(1);
        assert_eq!(config.ledger().chain_id().await.unwrap(), 1);
    }

    #[test]
    fn builder_from_env_overrides() {
        clear_env();
        unsafe {
            std::env::set_var(NETWORK_ENV, "testnet");
            std::env::set_var(MAX_RETRIES_ENV, "5");
            std::env::set_var(BASE_DELAY_ENV, "250");
            std::env::set_var(GATEWAY_ENV, " ");
        }
        let config = SessionConfig::builder()
            .ledger(StaticLedger::new(11_155_111))
            .build();
        unsafe {
            std::env::set_var(BASE_DELAY_ENV, "0");
        }
        let zero_delay = SessionConfig::builder()
            .ledger(StaticLedger::new(11_155_111))
            .build();
        clear_env();

        let config = config.unwrap();
        assert!(matches!(zero_delay, Err(SessionError::Config(_))));

        assert_eq!(config.network(), Network::PublicTest);
        assert_eq!(config.retry_policy().max_retries(), 5);
        assert_eq!(
            config.retry_policy().base_delay(),
            Duration::from_millis(250)
        );
        assert!(config.gateway_url().is_none());
    }
}
