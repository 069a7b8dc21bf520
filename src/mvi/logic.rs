//! Logic units: per-module async side-effect handlers.

use std::marker::PhantomData;

use async_trait::async_trait;
use tracing::Instrument;

use super::action::ModuleAction;
use crate::store::StoreAccessor;

/// Async handler notified after each action of its module was reduced.
///
/// The handler may dispatch further actions through `store`. Errors and
/// panics are routed to the store's crash listeners.
#[async_trait]
pub trait ModuleLogic: Send + Sync + 'static {
    type Action: ModuleAction;

    /// Run invocations one at a time, in the order their actions were reduced.
    ///
    /// Unordered logic gets a concurrent task per action.
    const ORDERED: bool = false;

    async fn on_action(&self, action: &Self::Action, store: &StoreAccessor) -> anyhow::Result<()>;

    /// Called on every live instance before the store resets.
    async fn before_reset(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Logic for modules that have no side effects.
pub struct NoLogic<A>(PhantomData<fn() -> A>);

impl<A> NoLogic<A> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<A> Default for NoLogic<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<A: ModuleAction> ModuleLogic for NoLogic<A> {
    type Action = A;

    async fn on_action(&self, _action: &A, _store: &StoreAccessor) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Wraps a logic unit so every invocation runs inside a tracing span.
pub struct Traced<L> {
    module: &'static str,
    inner: L,
}

/// Apply [`Traced`] to a logic unit at construction time.
///
/// ```ignore
/// fn create_logic(&self, _store: StoreAccessor) -> Self::Logic {
///     traced(Self::NAME, CounterLogic::default())
/// }
/// ```
pub fn traced<L: ModuleLogic>(module: &'static str, inner: L) -> Traced<L> {
    Traced { module, inner }
}

impl<L> Traced<L> {
    pub fn inner(&self) -> &L {
        &self.inner
    }
}

#[async_trait]
impl<L: ModuleLogic> ModuleLogic for Traced<L> {
    type Action = L::Action;

    const ORDERED: bool = L::ORDERED;

    async fn on_action(&self, action: &Self::Action, store: &StoreAccessor) -> anyhow::Result<()> {
        let span = tracing::debug_span!("logic", module = self.module, action = ?action);
        let started = std::time::Instant::now();
        let result = self.inner.on_action(action, store).instrument(span).await;
        tracing::trace!(
            module = self.module,
            elapsed_us = started.elapsed().as_micros() as u64,
            ok = result.is_ok(),
            "Logic invocation finished"
        );
        result
    }

    async fn before_reset(&self) -> anyhow::Result<()> {
        self.inner.before_reset().await
    }
}
