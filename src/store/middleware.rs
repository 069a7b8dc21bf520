//! Interceptors wrapping every reducer invocation.
//!
//! The chain is fixed when the store is built: explicitly registered
//! middlewares first, module-provided middlewares after them, the reducer
//! as the terminal link.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;

use super::accessor::StoreAccessor;
use super::action::{same_action, ActionRef};
use super::core::DispatchOutcome;
use super::snapshot::StateSnapshot;
use crate::error::{panic_message, ProcessingError, StoreError};

/// Action interceptor.
///
/// Call `next.run(action)` with the received action to continue down the
/// chain. Passing a different action dispatches it anew instead. Returning
/// without calling `next` blocks the action.
///
/// A middleware runs inside the processing loop: awaiting
/// `dispatch_and_await` from here waits on the loop itself and never
/// resolves. Use `dispatch` for follow-up actions.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(
        &self,
        action: ActionRef,
        ctx: &MiddlewareContext,
        next: Next,
    ) -> anyhow::Result<()>;
}

/// What a middleware can see besides the action.
#[derive(Clone)]
pub struct MiddlewareContext {
    store: StoreAccessor,
    module: &'static str,
}

impl MiddlewareContext {
    pub(crate) fn new(store: StoreAccessor, module: &'static str) -> Self {
        Self { store, module }
    }

    /// Name of the module the action targets.
    pub fn module(&self) -> &'static str {
        self.module
    }

    /// Current state of every module; `Closed` once the store is gone.
    pub fn states(&self) -> Result<StateSnapshot, StoreError> {
        self.store.snapshot()
    }

    pub fn store(&self) -> &StoreAccessor {
        &self.store
    }
}

pub(crate) type Reduce = Box<dyn Fn(&ActionRef) -> Result<(), ProcessingError> + Send + Sync>;

/// Reducer link plus the record of whether it ran.
struct Terminal {
    reduce: Reduce,
    reached: Mutex<Option<Result<(), ProcessingError>>>,
}

impl Terminal {
    fn apply(&self, action: &ActionRef) {
        let mut reached = self.reached.lock();
        if reached.is_some() {
            tracing::warn!(
                action = action.action_name(),
                "Middleware forwarded the same action twice, ignoring"
            );
            return;
        }
        *reached = Some((self.reduce)(action));
    }
}

/// Continuation handed to a middleware.
pub struct Next {
    chain: Arc<[Arc<dyn Middleware>]>,
    index: usize,
    original: ActionRef,
    ctx: MiddlewareContext,
    terminal: Arc<Terminal>,
}

impl Next {
    pub async fn run(self, action: ActionRef) -> anyhow::Result<()> {
        if !same_action(&action, &self.original) {
            tracing::debug!(
                from = self.original.action_name(),
                to = action.action_name(),
                "Middleware redirected action"
            );
            self.ctx.store.dispatch_ref(action)?;
            return Ok(());
        }

        let Some(middleware) = self.chain.get(self.index).cloned() else {
            self.terminal.apply(&action);
            return Ok(());
        };

        let ctx = self.ctx.clone();
        let next = Next {
            index: self.index + 1,
            ..self
        };
        middleware.handle(action, &ctx, next).await
    }
}

/// Drive `action` through `chain` and classify what happened.
pub(crate) async fn run_chain(
    chain: Arc<[Arc<dyn Middleware>]>,
    ctx: MiddlewareContext,
    action: ActionRef,
    reduce: Reduce,
) -> DispatchOutcome {
    let terminal = Arc::new(Terminal {
        reduce,
        reached: Mutex::new(None),
    });
    let next = Next {
        chain,
        index: 0,
        original: Arc::clone(&action),
        ctx,
        terminal: Arc::clone(&terminal),
    };

    let result = match AssertUnwindSafe(next.run(action)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!(
            "middleware panicked: {}",
            panic_message(&*payload)
        )),
    };
    let reached = terminal.reached.lock().take();

    match (reached, result) {
        (Some(Err(cause)), _) => DispatchOutcome::Error(cause),
        (_, Err(error)) => DispatchOutcome::Error(ProcessingError::Middleware(error)),
        (Some(Ok(())), Ok(())) => DispatchOutcome::Processed,
        (None, Ok(())) => DispatchOutcome::Blocked,
    }
}

/// Logs every action passing through the chain.
///
/// Added as the outermost middleware when the `actions` debug category is
/// enabled.
pub struct LoggingMiddleware {
    log_state: bool,
}

impl LoggingMiddleware {
    pub fn new(log_state: bool) -> Self {
        Self { log_state }
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(
        &self,
        action: ActionRef,
        ctx: &MiddlewareContext,
        next: Next,
    ) -> anyhow::Result<()> {
        tracing::debug!(
            module = ctx.module(),
            priority = ?action.lane(),
            action = ?action,
            "Action dispatched"
        );
        let key = action.module_key();
        let started = std::time::Instant::now();
        let result = next.run(action).await;

        if self.log_state {
            if let Some(state) = ctx.store().describe_state(key) {
                tracing::debug!(module = ctx.module(), state = %state, "State after action");
            }
        }
        tracing::trace!(
            module = ctx.module(),
            elapsed_us = started.elapsed().as_micros() as u64,
            ok = result.is_ok(),
            "Action handled"
        );
        result
    }
}
