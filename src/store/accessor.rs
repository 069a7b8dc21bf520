//! Weak handle to the store for logic, middleware and guards.

use std::sync::{Arc, Weak};

use tokio::sync::oneshot;

use super::action::ActionRef;
use super::core::{DispatchOutcome, StoreInner};
use super::crash::LogicCrash;
use super::registry::ModuleKey;
use super::snapshot::StateSnapshot;
use crate::error::StoreError;
use crate::mvi::{ModuleAction, ModuleState};

/// Cloneable handle to a [`Store`](super::Store).
///
/// Holds no strong reference: once the store is dropped every call fails
/// with [`StoreError::Closed`].
#[derive(Clone)]
pub struct StoreAccessor {
    inner: Weak<StoreInner>,
}

impl StoreAccessor {
    pub(crate) fn new(inner: Weak<StoreInner>) -> Self {
        Self { inner }
    }

    fn upgrade(&self) -> Result<Arc<StoreInner>, StoreError> {
        self.inner.upgrade().ok_or(StoreError::Closed)
    }

    /// Enqueue an action without waiting for it to be processed.
    pub fn dispatch<A: ModuleAction>(&self, action: A) -> Result<(), StoreError> {
        self.dispatch_ref(Arc::new(action))
    }

    pub fn dispatch_ref(&self, action: ActionRef) -> Result<(), StoreError> {
        self.upgrade()?.enqueue(action, None)
    }

    /// Enqueue an action and wait until it has traversed the middleware chain.
    pub async fn dispatch_and_await<A: ModuleAction>(
        &self,
        action: A,
    ) -> Result<DispatchOutcome, StoreError> {
        self.dispatch_ref_and_await(Arc::new(action)).await
    }

    pub async fn dispatch_ref_and_await(
        &self,
        action: ActionRef,
    ) -> Result<DispatchOutcome, StoreError> {
        let (respond_to, receiver) = oneshot::channel();
        self.upgrade()?.enqueue(action, Some(respond_to))?;
        receiver.await.map_err(|_| StoreError::NoReply)
    }

    /// State of module `S`, waiting for initialization if needed.
    pub async fn select_state<S: ModuleState>(&self) -> Result<Arc<S>, StoreError> {
        self.wait_ready(ModuleKey::of::<S>()).await?;
        self.try_select_state()
    }

    /// State of module `S`, failing with `NotInitialized` instead of waiting.
    pub fn try_select_state<S: ModuleState>(&self) -> Result<Arc<S>, StoreError> {
        self.upgrade()?.state::<S>()
    }

    /// Logic instance of type `L`, waiting for initialization if needed.
    pub async fn select_logic<L: Send + Sync + 'static>(&self) -> Result<Arc<L>, StoreError> {
        let key = self.upgrade()?.logic_key::<L>()?;
        self.wait_ready(key).await?;
        self.try_select_logic()
    }

    pub fn try_select_logic<L: Send + Sync + 'static>(&self) -> Result<Arc<L>, StoreError> {
        self.upgrade()?.logic::<L>()
    }

    /// Full-snapshot read of every module's state.
    pub fn snapshot(&self) -> Result<StateSnapshot, StoreError> {
        Ok(self.upgrade()?.snapshot())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.upgrade().map_or(true, |inner| inner.is_closed())
    }

    pub(crate) fn describe_state(&self, key: ModuleKey) -> Option<String> {
        self.inner.upgrade()?.describe_state(key)
    }

    /// Route a crash to the listeners. Returns `true` if recovered.
    pub(crate) fn report_crash(&self, crash: &LogicCrash) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.crash_listeners().notify(crash))
    }

    async fn wait_ready(&self, key: ModuleKey) -> Result<(), StoreError> {
        let mut ready = {
            let inner = self.upgrade()?;
            if inner.is_closed() {
                return Err(StoreError::Closed);
            }
            if inner.registry().get(key).is_none() {
                return Err(StoreError::StateNotFound {
                    type_name: key.state_type_name(),
                });
            }
            inner.subscribe_ready()
        };
        ready
            .wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| StoreError::Closed)
    }
}
