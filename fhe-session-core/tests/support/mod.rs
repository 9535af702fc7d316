use async_trait::async_trait;
use fhe_session_core::{
    AuthorizationProof, AuthorizationRequest, EncryptRequest, EncryptedValue, EncryptionProvider,
    MemoryEncryptionProvider, ParamsRequest, ProviderError, ProviderResult, PublicParams,
    SessionConfig, SessionConfigBuilder, StaticLedger,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Provider that counts calls and fails a scripted number of times.
#[derive(Clone, Default)]
pub struct CountingProvider {
    inner: Arc<MemoryEncryptionProvider>,
    pub fetches: Arc<AtomicU32>,
    pub encrypts: Arc<AtomicU32>,
    pub authorizations: Arc<AtomicU32>,
    failures_left: Arc<AtomicU32>,
    failure: Option<ProviderError>,
    fetch_delay: Duration,
}

#[allow(dead_code)]
impl CountingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` encrypt/authorize calls with `error`.
    pub fn failing(mut self, count: u32, error: ProviderError) -> Self {
        self.failures_left = Arc::new(AtomicU32::new(count));
        self.failure = Some(error);
        self
    }

    /// Suspend inside `fetch_public_params` so callers overlap.
    pub fn slow_fetch(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn encrypt_calls(&self) -> u32 {
        self.encrypts.load(Ordering::SeqCst)
    }

    pub fn authorize_calls(&self) -> u32 {
        self.authorizations.load(Ordering::SeqCst)
    }

    fn scripted_failure(&self, attempt: u32) -> Option<ProviderError> {
        let failure = self.failure.as_ref()?;
        let left = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        left.ok().map(|_| match failure {
            ProviderError::Transport(message) => {
                ProviderError::Transport(format!("{message} (attempt {attempt})"))
            }
            other => other.clone(),
        })
    }
}

#[async_trait]
impl EncryptionProvider for CountingProvider {
    async fn fetch_public_params(&self, request: &ParamsRequest) -> ProviderResult<PublicParams> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        self.inner.fetch_public_params(request).await
    }

    async fn encrypt(&self, request: &EncryptRequest) -> ProviderResult<EncryptedValue> {
        let attempt = self.encrypts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(err) = self.scripted_failure(attempt) {
            return Err(err);
        }
        self.inner.encrypt(request).await
    }

    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> ProviderResult<AuthorizationProof> {
        let attempt = self.authorizations.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(err) = self.scripted_failure(attempt) {
            return Err(err);
        }
        self.inner.authorize(request).await
    }
}

pub fn local_config() -> SessionConfig {
    SessionConfigBuilder::default()
        .ledger(StaticLedger::new(31_337))
        .build()
        .expect("config")
}
