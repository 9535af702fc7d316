use crate::errors::{ProviderError, ProviderResult};
use crate::provider::EncryptionProvider;
use crate::types::{
    AuthorizationProof, AuthorizationRequest, EncryptRequest, EncryptedValue, HANDLE_LEN, Handle,
    ParamsRequest, PublicParams,
};
use async_trait::async_trait;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

/// In-process stand-in for a remote encryption service.
///
/// Key material is random per instance; handles and proofs are SHA-256
/// commitments, not ciphertexts. Meant for local development and tests only.
pub struct MemoryEncryptionProvider {
    public_key: Vec<u8>,
    crs: Vec<u8>,
    chain_id: Option<u64>,
    counter: AtomicU64,
}

impl Default for MemoryEncryptionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEncryptionProvider {
    /// Construct a provider with fresh random key material.
    pub fn new() -> Self {
        let mut rng = rand::rng();
        let mut public_key = vec![0u8; 32];
        let mut crs = vec![0u8; 64];
        rng.fill_bytes(&mut public_key);
        rng.fill_bytes(&mut crs);
        Self {
            public_key,
            crs,
            chain_id: None,
            counter: AtomicU64::new(0),
        }
    }

    /// Report a fixed chain id instead of echoing the requested network's.
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }
}

#[async_trait]
impl EncryptionProvider for MemoryEncryptionProvider {
    async fn fetch_public_params(&self, request: &ParamsRequest) -> ProviderResult<PublicParams> {
        Ok(PublicParams {
            public_key: self.public_key.clone(),
            crs: self.crs.clone(),
            chain_id: Some(
                self.chain_id
                    .unwrap_or_else(|| request.network.expected_chain_id()),
            ),
            acl_address: request.acl_address.clone(),
        })
    }

    async fn encrypt(&self, request: &EncryptRequest) -> ProviderResult<EncryptedValue> {
        if request.value > request.width.max_value() {
            return Err(ProviderError::Status {
                status: 400,
                message: format!("value does not fit in {} bits", request.width.bits()),
            });
        }
        let nonce = self.counter.fetch_add(1, Ordering::SeqCst);
        let digest = Sha256::new()
            .chain_update(&self.public_key)
            .chain_update(request.value.to_le_bytes())
            .chain_update(request.width.bits().to_le_bytes())
            .chain_update(nonce.to_le_bytes())
            .finalize();
        let mut handle = [0u8; HANDLE_LEN];
        handle.copy_from_slice(&digest);
        let proof = Sha256::new()
            .chain_update(handle)
            .chain_update(request.acl_address.as_deref().unwrap_or_default())
            .finalize();
        Ok(EncryptedValue {
            handles: vec![Handle::new(handle)],
            input_proof: proof.to_vec(),
        })
    }

    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> ProviderResult<AuthorizationProof> {
        let token = Sha256::new()
            .chain_update(&self.public_key)
            .chain_update(request.resource.as_bytes())
            .chain_update([0u8])
            .chain_update(request.principal.as_bytes())
            .finalize();
        Ok(AuthorizationProof {
            resource: request.resource.clone(),
            principal: request.principal.clone(),
            token: token.to_vec(),
            public_key: request.public_key.clone(),
        })
    }
}
