use crate::config::SessionConfig;
use crate::errors::{ProviderError, ProviderResult, Result, SessionError};
use crate::provider::EncryptionProvider;
use crate::retry::retry_async_with;
use crate::types::{
    AuthorizationProof, AuthorizationRequest, BitWidth, EncryptRequest, EncryptedValue,
    ParamsRequest, PublicParams,
};
use std::fmt;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument, warn};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Coarse lifecycle of a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    /// Terminal for the session instance that reached it.
    Failed(SessionError),
}

impl SessionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready)
    }

    pub fn error(&self) -> Option<&SessionError> {
        match self {
            SessionState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Failed(err) => write!(f, "failed: {err}"),
            other => f.write_str(other.label()),
        }
    }
}

/// One binding between this client and a remote encryption provider.
///
/// The session owns its provider handle exclusively. Encrypt and authorize
/// calls are only issued once [`EncryptionSession::initialize`] has brought
/// the session to [`SessionState::Ready`].
pub struct EncryptionSession {
    id: u64,
    config: SessionConfig,
    provider: Box<dyn EncryptionProvider>,
    state: watch::Sender<SessionState>,
    params: RwLock<Option<PublicParams>>,
    init_lock: Mutex<()>,
}

impl EncryptionSession {
    pub fn new(config: SessionConfig, provider: Box<dyn EncryptionProvider>) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            config,
            provider,
            state,
            params: RwLock::new(None),
            init_lock: Mutex::new(()),
        }
    }

    pub fn with_provider<P>(config: SessionConfig, provider: P) -> Self
    where
        P: EncryptionProvider + 'static,
    {
        Self::new(config, Box::new(provider))
    }

    /// Process-unique identifier, used in logs.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Public parameters fetched by the last successful initialization.
    pub fn public_params(&self) -> Option<PublicParams> {
        self.params
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Fetch public parameters and verify the network.
    ///
    /// A no-op once the session is ready; after a failure it starts over.
    #[instrument(skip(self), fields(session = self.id, network = %self.config.network()))]
    pub async fn initialize(&self) -> Result<()> {
        let _guard = self.init_lock.lock().await;
        if self.state.borrow().is_ready() {
            debug!("session already initialized");
            return Ok(());
        }

        let previous = self.state.send_replace(SessionState::Initializing);
        let mut abandoned = RestoreOnDrop {
            state: &self.state,
            previous: Some(previous),
        };
        let outcome = self.load_params().await;
        abandoned.previous = None;
        match outcome {
            Ok(params) => {
                *self
                    .params
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(params);
                self.state.send_replace(SessionState::Ready);
                info!("encryption session ready");
                Ok(())
            }
            Err(cause) => {
                let err = SessionError::Initialization { cause };
                warn!(error = %err, "encryption session failed to initialize");
                self.state.send_replace(SessionState::Failed(err.clone()));
                Err(err)
            }
        }
    }

    async fn load_params(&self) -> ProviderResult<PublicParams> {
        let network = self.config.network();
        let expected = network.expected_chain_id();
        let actual = self.config.ledger().chain_id().await?;
        if actual != expected {
            return Err(ProviderError::ChainMismatch { expected, actual });
        }

        let request = ParamsRequest {
            network,
            acl_address: self.config.acl_address().map(str::to_string),
        };
        let params = self.provider.fetch_public_params(&request).await?;
        params.validate()?;
        if let Some(reported) = params.chain_id {
            if reported != expected {
                return Err(ProviderError::ChainMismatch {
                    expected,
                    actual: reported,
                });
            }
        }
        Ok(params)
    }

    /// Encrypt `value` as an unsigned integer of `width` bits.
    ///
    /// [`BitWidth::U64`] is sent to the provider as a 32-bit request; values
    /// above `u32::MAX` are rejected rather than truncated.
    #[instrument(skip(self, value), fields(session = self.id))]
    pub async fn encrypt_uint(&self, value: u64, width: BitWidth) -> Result<EncryptedValue> {
        self.ensure_ready()?;
        width.check(value)?;
        if width != width.remote() {
            debug!(remote = %width.remote(), "narrowing request for the remote provider");
        }

        let request = EncryptRequest {
            value,
            width: width.remote(),
            acl_address: self.config.acl_address().map(str::to_string),
        };
        retry_async_with(
            self.config.retry_policy(),
            || self.provider.encrypt(&request),
            |err: &ProviderError| err.is_transient(),
        )
        .await
        .map_err(|exhausted| SessionError::Encryption {
            cause: exhausted.error,
            attempts: exhausted.attempts,
        })
    }

    /// Request a signed token a decryption gateway accepts for
    /// `(resource_id, principal_id)`.
    #[instrument(skip(self), fields(session = self.id))]
    pub async fn create_authorization_proof(
        &self,
        resource_id: &str,
        principal_id: &str,
    ) -> Result<AuthorizationProof> {
        let params = self.ensure_ready()?;
        if resource_id.trim().is_empty() {
            return Err(SessionError::InvalidInput("resource id is empty".into()));
        }
        if principal_id.trim().is_empty() {
            return Err(SessionError::InvalidInput("principal id is empty".into()));
        }

        let request = AuthorizationRequest {
            resource: resource_id.to_string(),
            principal: principal_id.to_string(),
            public_key: params.public_key,
        };
        retry_async_with(
            self.config.retry_policy(),
            || self.provider.authorize(&request),
            |err: &ProviderError| err.is_transient(),
        )
        .await
        .map_err(|exhausted| SessionError::Authorization {
            cause: exhausted.error,
        })
    }

    fn ensure_ready(&self) -> Result<PublicParams> {
        if !self.state.borrow().is_ready() {
            return Err(SessionError::NotInitialized);
        }
        self.public_params().ok_or(SessionError::NotInitialized)
    }
}

/// Puts back the pre-initialization state when `initialize` is dropped
/// mid-flight, so observers never see a stale `Initializing`.
struct RestoreOnDrop<'a> {
    state: &'a watch::Sender<SessionState>,
    previous: Option<SessionState>,
}

impl Drop for RestoreOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.state.send_replace(previous);
        }
    }
}

impl fmt::Debug for EncryptionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionSession")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfigBuilder;
    use crate::ledger::StaticLedger;
    use crate::memory::MemoryEncryptionProvider;
    use crate::network::Network;

    fn config(chain_id: u64) -> SessionConfig {
        SessionConfigBuilder::default()
            .network(Network::Local)
            .ledger(StaticLedger::new(chain_id))
            .build()
            .unwrap()
    }

    fn session(chain_id: u64) -> EncryptionSession {
        EncryptionSession::with_provider(config(chain_id), MemoryEncryptionProvider::new())
    }

    #[tokio::test]
    async fn initialize_reaches_ready() {
        let session = session(31_337);
        assert_eq!(session.state(), SessionState::Uninitialized);
        session.initialize().await.unwrap();
        assert!(session.state().is_ready());
        assert!(session.public_params().is_some());
    }

    #[tokio::test]
    async fn wrong_chain_fails_initialization() {
        let session = session(1);
        let err = session.initialize().await.unwrap_err();
        assert_eq!(
            err,
            SessionError::Initialization {
                cause: ProviderError::ChainMismatch {
                    expected: 31_337,
                    actual: 1
                }
            }
        );
        assert_eq!(session.state(), SessionState::Failed(err));
    }

    #[tokio::test]
    async fn provider_reporting_other_chain_is_rejected() {
        let provider = MemoryEncryptionProvider::new().with_chain_id(5);
        let session = EncryptionSession::with_provider(config(31_337), provider);
        let err = session.initialize().await.unwrap_err();
        assert!(matches!(
            err.provider_cause(),
            Some(ProviderError::ChainMismatch { actual: 5, .. })
        ));
    }

    #[tokio::test]
    async fn failed_session_can_be_reinitialized() {
        let ledger = StaticLedger::new(1);
        let config = SessionConfigBuilder::default()
            .network(Network::Local)
            .ledger(ledger.clone())
            .build()
            .unwrap();
        let session = EncryptionSession::with_provider(config, MemoryEncryptionProvider::new());
        assert!(session.initialize().await.is_err());
        assert!(matches!(
            session.encrypt_uint(1, BitWidth::U32).await,
            Err(SessionError::NotInitialized)
        ));

        ledger.set_chain_id(31_337);
        session.initialize().await.unwrap();
        assert!(session.encrypt_uint(1, BitWidth::U32).await.is_ok());
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let session = session(31_337);
        let mut rx = session.subscribe();
        session.initialize().await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SessionState::Ready);
    }

    #[tokio::test]
    async fn authorization_requires_identifiers() {
        let session = session(31_337);
        session.initialize().await.unwrap();
        assert!(matches!(
            session.create_authorization_proof("", "0xabc").await,
            Err(SessionError::InvalidInput(_))
        ));
        let proof = session
            .create_authorization_proof("0xcontract", "0xuser")
            .await
            .unwrap();
        assert_eq!(proof.resource, "0xcontract");
        assert_eq!(proof.public_key, session.public_params().unwrap().public_key);
    }

    #[test]
    fn state_display() {
        assert_eq!(SessionState::Ready.to_string(), "ready");
        assert_eq!(
            SessionState::Failed(SessionError::NotInitialized).to_string(),
            "failed: encryption session is not initialized"
        );
    }
}
