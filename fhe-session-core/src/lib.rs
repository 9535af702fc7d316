//! Client-side session layer in front of a remote homomorphic-encryption
//! service: configuration, lifecycle, and retried encrypt/authorize calls.

pub mod config;
pub mod errors;
#[cfg(feature = "http")]
pub mod gateway;
pub mod ledger;
pub mod manager;
pub mod memory;
pub mod network;
pub mod provider;
pub mod retry;
pub mod session;
pub mod types;
pub mod util;
#[cfg(feature = "http")]
pub mod wire;

pub use config::{SessionConfig, SessionConfigBuilder};
pub use errors::{ProviderError, ProviderResult, Result, SessionError};
#[cfg(feature = "http")]
pub use gateway::HttpGatewayProvider;
#[cfg(feature = "http")]
pub use ledger::JsonRpcLedger;
pub use ledger::StaticLedger;
pub use manager::SessionLifecycleManager;
pub use memory::MemoryEncryptionProvider;
pub use network::Network;
pub use provider::{EncryptionProvider, LedgerConnection, ProviderFactory};
pub use retry::{Exhausted, RetryAttempt, RetryPolicy, retry_async, retry_async_with};
pub use session::{EncryptionSession, SessionState};
pub use types::{
    AuthorizationProof, AuthorizationRequest, BitWidth, EncryptRequest, EncryptedValue, Handle,
    ParamsRequest, PublicParams,
};
