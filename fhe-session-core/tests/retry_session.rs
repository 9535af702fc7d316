mod support;

use fhe_session_core::{
    BitWidth, EncryptionSession, ProviderError, SessionConfigBuilder, SessionError, StaticLedger,
};
use std::time::Duration;
use support::{CountingProvider, local_config};
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn exhausted_encrypt_reports_last_error_and_attempts() {
    let provider =
        CountingProvider::new().failing(u32::MAX, ProviderError::Transport("reset".into()));
    let session = EncryptionSession::with_provider(local_config(), provider.clone());
    session.initialize().await.unwrap();

    let started = Instant::now();
    let err = session.encrypt_uint(1, BitWidth::U32).await.unwrap_err();
    assert_eq!(
        err,
        SessionError::Encryption {
            cause: ProviderError::Transport("reset (attempt 4)".into()),
            attempts: 4,
        }
    );
    assert_eq!(provider.encrypt_calls(), 4);
    assert!(started.elapsed() >= Duration::from_millis(7000));
}

#[tokio::test(start_paused = true)]
async fn encrypt_recovers_after_two_failures() {
    let provider = CountingProvider::new().failing(2, ProviderError::Timeout);
    let session = EncryptionSession::with_provider(local_config(), provider.clone());
    session.initialize().await.unwrap();

    let started = Instant::now();
    let value = session.encrypt_uint(77, BitWidth::U16).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(value.handles.len(), 1);
    assert_eq!(provider.encrypt_calls(), 3);
    assert!(elapsed >= Duration::from_millis(3000), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(7000), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn rejected_requests_are_not_retried() {
    let provider = CountingProvider::new().failing(
        u32::MAX,
        ProviderError::Status {
            status: 400,
            message: "bad request".into(),
        },
    );
    let session = EncryptionSession::with_provider(local_config(), provider.clone());
    session.initialize().await.unwrap();

    let err = session.encrypt_uint(1, BitWidth::U8).await.unwrap_err();
    assert!(matches!(err, SessionError::Encryption { attempts: 1, .. }));
    assert_eq!(provider.encrypt_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn authorization_uses_configured_retry_budget() {
    let config = SessionConfigBuilder::default()
        .ledger(StaticLedger::new(31_337))
        .max_retries(1)
        .base_delay(Duration::from_millis(10))
        .build()
        .unwrap();
    let provider = CountingProvider::new().failing(u32::MAX, ProviderError::Timeout);
    let session = EncryptionSession::with_provider(config, provider.clone());
    session.initialize().await.unwrap();

    let err = session
        .create_authorization_proof("0xcontract", "0xuser")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SessionError::Authorization {
            cause: ProviderError::Timeout
        }
    );
    assert_eq!(provider.authorize_calls(), 2);
}
