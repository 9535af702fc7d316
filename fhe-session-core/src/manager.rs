use crate::config::SessionConfig;
use crate::errors::{Result, SessionError};
use crate::provider::ProviderFactory;
use crate::session::{EncryptionSession, SessionState};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{OnceCell, watch};
use tracing::{debug, info, warn};

struct ManagedSession {
    session: Arc<EncryptionSession>,
    init: OnceCell<Result<()>>,
}

/// Publishes the session's state to the manager once initialization ends,
/// including when the caller drops it before it finishes.
struct PublishOnExit<'a> {
    manager: &'a SessionLifecycleManager,
    managed: &'a Arc<ManagedSession>,
}

impl Drop for PublishOnExit<'_> {
    fn drop(&mut self) {
        let state = match self.managed.session.state() {
            SessionState::Initializing => SessionState::Uninitialized,
            other => other,
        };
        self.manager.publish_if_current(self.managed, state);
    }
}

/// Single source of truth for the session an application context uses.
///
/// Sessions are built lazily through the injected [`ProviderFactory`] and
/// initialized at most once: concurrent callers of
/// [`SessionLifecycleManager::get_or_create`] share the in-flight
/// initialization and observe its outcome.
pub struct SessionLifecycleManager {
    factory: Box<dyn ProviderFactory>,
    current: Mutex<Option<Arc<ManagedSession>>>,
    state: watch::Sender<SessionState>,
}

impl SessionLifecycleManager {
    pub fn new<F>(factory: F) -> Self
    where
        F: ProviderFactory + 'static,
    {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self {
            factory: Box::new(factory),
            current: Mutex::new(None),
            state,
        }
    }

    /// Return the current session, building and initializing one if needed.
    ///
    /// A failed initialization is reported through the returned state, not
    /// as an error; call [`reset`](Self::reset) to try again with a fresh
    /// session. An error is only returned when the provider factory cannot
    /// build a provider.
    pub async fn get_or_create(
        &self,
        config: &SessionConfig,
    ) -> Result<(Arc<EncryptionSession>, SessionState)> {
        let managed = self.managed_session(config)?;
        managed
            .init
            .get_or_init(|| async {
                let _publish = PublishOnExit {
                    manager: self,
                    managed: &managed,
                };
                managed.session.initialize().await
            })
            .await;
        let state = managed.session.state();
        Ok((managed.session.clone(), state))
    }

    /// Like [`get_or_create`](Self::get_or_create), but only succeeds with a
    /// ready session.
    pub async fn ready(&self, config: &SessionConfig) -> Result<Arc<EncryptionSession>> {
        let (session, state) = self.get_or_create(config).await?;
        match state {
            SessionState::Ready => Ok(session),
            SessionState::Failed(err) => Err(err),
            SessionState::Uninitialized | SessionState::Initializing => {
                Err(SessionError::NotInitialized)
            }
        }
    }

    /// Discard the current session. Returns whether one existed.
    pub fn reset(&self) -> bool {
        let previous = self.lock_current().take();
        self.state.send_replace(SessionState::Uninitialized);
        match previous {
            Some(managed) => {
                info!(session = managed.session.id(), "encryption session discarded");
                true
            }
            None => false,
        }
    }

    /// The current session, without creating or initializing one.
    pub fn current(&self) -> Option<Arc<EncryptionSession>> {
        self.lock_current()
            .as_ref()
            .map(|managed| managed.session.clone())
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Error of the current session, when it failed to initialize.
    pub fn last_error(&self) -> Option<SessionError> {
        self.state.borrow().error().cloned()
    }

    /// Watch lifecycle transitions of whichever session is current.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn managed_session(&self, config: &SessionConfig) -> Result<Arc<ManagedSession>> {
        let mut current = self.lock_current();
        if let Some(existing) = current.as_ref() {
            let network = existing.session.config().network();
            if network != config.network() {
                warn!(
                    current = %network,
                    requested = %config.network(),
                    "session is bound to another network; call reset to switch"
                );
            }
            return Ok(existing.clone());
        }

        let provider = self.factory.create(config).map_err(|cause| {
            let err = SessionError::Initialization { cause };
            self.state.send_replace(SessionState::Failed(err.clone()));
            err
        })?;
        let managed = Arc::new(ManagedSession {
            session: Arc::new(EncryptionSession::new(config.clone(), provider)),
            init: OnceCell::new(),
        });
        debug!(
            session = managed.session.id(),
            network = %config.network(),
            "encryption session created"
        );
        self.state.send_replace(SessionState::Initializing);
        *current = Some(managed.clone());
        Ok(managed)
    }

    fn publish_if_current(&self, managed: &Arc<ManagedSession>, state: SessionState) {
        let current = self.lock_current();
        if current
            .as_ref()
            .is_some_and(|existing| Arc::ptr_eq(existing, managed))
        {
            self.state.send_replace(state);
        }
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<Arc<ManagedSession>>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfigBuilder;
    use crate::errors::ProviderError;
    use crate::ledger::StaticLedger;
    use crate::memory::MemoryEncryptionProvider;
    use crate::provider::EncryptionProvider;

    fn memory_factory(
        _config: &SessionConfig,
    ) -> crate::errors::ProviderResult<Box<dyn EncryptionProvider>> {
        Ok(Box::new(MemoryEncryptionProvider::new()))
    }

    fn config(ledger: &StaticLedger) -> SessionConfig {
        SessionConfigBuilder::default()
            .ledger(ledger.clone())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn reuses_existing_session() {
        let manager = SessionLifecycleManager::new(memory_factory);
        let config = config(&StaticLedger::new(31_337));
        assert_eq!(manager.state(), SessionState::Uninitialized);

        let (first, state) = manager.get_or_create(&config).await.unwrap();
        assert_eq!(state, SessionState::Ready);
        let (second, _) = manager.get_or_create(&config).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn reset_after_network_change() {
        let ledger = StaticLedger::new(31_337);
        let config = config(&ledger);
        let manager = SessionLifecycleManager::new(memory_factory);
        let (first, _) = manager.get_or_create(&config).await.unwrap();

        ledger.set_chain_id(1);
        assert!(manager.reset());
        assert_eq!(manager.state(), SessionState::Uninitialized);
        assert!(manager.current().is_none());

        let (second, state) = manager.get_or_create(&config).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(matches!(state, SessionState::Failed(_)));
        assert!(matches!(
            manager.last_error(),
            Some(SessionError::Initialization {
                cause: ProviderError::ChainMismatch { .. }
            })
        ));
    }

    #[tokio::test]
    async fn failed_session_is_not_reinitialized_without_reset() {
        let ledger = StaticLedger::new(1);
        let config = config(&ledger);
        let manager = SessionLifecycleManager::new(memory_factory);
        let (_, state) = manager.get_or_create(&config).await.unwrap();
        assert!(matches!(state, SessionState::Failed(_)));

        ledger.set_chain_id(31_337);
        let (_, state) = manager.get_or_create(&config).await.unwrap();
        assert!(matches!(state, SessionState::Failed(_)));
        assert!(manager.ready(&config).await.is_err());

        manager.reset();
        assert!(manager.ready(&config).await.is_ok());
    }

    #[tokio::test]
    async fn factory_failure_is_reported() {
        let manager = SessionLifecycleManager::new(|_: &SessionConfig| {
            Err::<Box<dyn EncryptionProvider>, _>(ProviderError::Transport("offline".into()))
        });
        let config = config(&StaticLedger::new(31_337));
        let err = manager.get_or_create(&config).await.unwrap_err();
        assert!(matches!(err, SessionError::Initialization { .. }));
        assert_eq!(manager.last_error(), Some(err));
        assert!(manager.current().is_none());
    }
}
