use crate::config::SessionConfig;
use crate::errors::ProviderResult;
use crate::types::{
    AuthorizationProof, AuthorizationRequest, EncryptRequest, EncryptedValue, ParamsRequest,
    PublicParams,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Remote service performing the actual encryption and key management.
#[async_trait]
pub trait EncryptionProvider: Send + Sync {
    /// Fetch the public encryption parameters for a network.
    async fn fetch_public_params(&self, request: &ParamsRequest) -> ProviderResult<PublicParams>;

    /// Encrypt an integer of the requested width.
    async fn encrypt(&self, request: &EncryptRequest) -> ProviderResult<EncryptedValue>;

    /// Produce a signed authorization token for `(resource, principal)`.
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> ProviderResult<AuthorizationProof>;
}

#[async_trait]
impl<T> EncryptionProvider for Arc<T>
where
    T: EncryptionProvider + ?Sized,
{
    async fn fetch_public_params(&self, request: &ParamsRequest) -> ProviderResult<PublicParams> {
        (**self).fetch_public_params(request).await
    }

    async fn encrypt(&self, request: &EncryptRequest) -> ProviderResult<EncryptedValue> {
        (**self).encrypt(request).await
    }

    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> ProviderResult<AuthorizationProof> {
        (**self).authorize(request).await
    }
}

#[async_trait]
impl<T> EncryptionProvider for Box<T>
where
    T: EncryptionProvider + ?Sized,
{
    async fn fetch_public_params(&self, request: &ParamsRequest) -> ProviderResult<PublicParams> {
        (**self).fetch_public_params(request).await
    }

    async fn encrypt(&self, request: &EncryptRequest) -> ProviderResult<EncryptedValue> {
        (**self).encrypt(request).await
    }

    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> ProviderResult<AuthorizationProof> {
        (**self).authorize(request).await
    }
}

/// Wallet/RPC connection used to learn the active network.
#[async_trait]
pub trait LedgerConnection: Send + Sync {
    async fn chain_id(&self) -> ProviderResult<u64>;
}

#[async_trait]
impl<T> LedgerConnection for Arc<T>
where
    T: LedgerConnection + ?Sized,
{
    async fn chain_id(&self) -> ProviderResult<u64> {
        (**self).chain_id().await
    }
}

/// Builds the provider handle a new session will own exclusively.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, config: &SessionConfig) -> ProviderResult<Box<dyn EncryptionProvider>>;
}

impl<F> ProviderFactory for F
where
    F: Fn(&SessionConfig) -> ProviderResult<Box<dyn EncryptionProvider>> + Send + Sync,
{
    fn create(&self, config: &SessionConfig) -> ProviderResult<Box<dyn EncryptionProvider>> {
        self(config)
    }
}
