//! Store construction, the processing loop and module lifecycle.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;

use super::accessor::StoreAccessor;
use super::action::ActionRef;
use super::crash::{CrashListener, CrashListeners, LogicCrash};
use super::lifecycle::{LoopHandle, LoopSignal};
use super::middleware::{run_chain, LoggingMiddleware, Middleware, MiddlewareContext, Reduce};
use super::persistence::PersistenceStrategy;
use super::registry::{LogicSlot, ModuleKey, Registry, StateRef};
use super::snapshot::StateSnapshot;
use crate::codec::{CodecRegistry, SerializationContext};
use crate::config::{Config, DebugCategories};
use crate::error::{panic_message, ConfigurationError, ProcessingError, StoreError};
use crate::mvi::{Module, ModuleAction, ModuleState, Priority};

/// Result of an action dispatched with `dispatch_and_await`.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The reducer ran and the new state is visible.
    Processed,
    /// A middleware declined to forward the action.
    Blocked,
    Error(ProcessingError),
}

impl DispatchOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, DispatchOutcome::Processed)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, DispatchOutcome::Blocked)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DispatchOutcome::Error(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    Completed,
    /// Another reset was already running; nothing was changed.
    Skipped,
}

struct Envelope {
    action: ActionRef,
    reply: Option<oneshot::Sender<DispatchOutcome>>,
}

impl Envelope {
    fn discard(self) {
        if let Some(reply) = self.reply {
            let _ = reply.send(DispatchOutcome::Error(ProcessingError::Discarded));
        }
    }
}

/// Receiving ends of both lanes, owned by whichever loop is running.
struct Lanes {
    high: mpsc::UnboundedReceiver<Envelope>,
    normal: mpsc::UnboundedReceiver<Envelope>,
}

impl Lanes {
    fn drain(&mut self) -> usize {
        let mut discarded = 0;
        while let Ok(envelope) = self.high.try_recv() {
            envelope.discard();
            discarded += 1;
        }
        while let Ok(envelope) = self.normal.try_recv() {
            envelope.discard();
            discarded += 1;
        }
        discarded
    }

    fn close(&mut self) {
        self.high.close();
        self.normal.close();
    }
}

struct Cell {
    state: StateRef,
    logic: Option<LogicSlot>,
}

pub(crate) struct StoreInner {
    this: Weak<StoreInner>,
    runtime: Handle,
    registry: Registry,
    codecs: SerializationContext,
    chain: Arc<[Arc<dyn Middleware>]>,
    debug: DebugCategories,
    persistence: Option<Arc<dyn PersistenceStrategy>>,

    cells: Mutex<HashMap<ModuleKey, Cell>>,
    high_tx: mpsc::UnboundedSender<Envelope>,
    normal_tx: mpsc::UnboundedSender<Envelope>,
    lanes: Arc<tokio::sync::Mutex<Lanes>>,
    processing: Mutex<Option<LoopHandle>>,
    tasks: Mutex<JoinSet<()>>,
    crash: CrashListeners,
    ready: watch::Sender<bool>,
    resetting: AtomicBool,
    closed: AtomicBool,
}

impl StoreInner {
    pub(crate) fn accessor(&self) -> StoreAccessor {
        StoreAccessor::new(self.this.clone())
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn crash_listeners(&self) -> &CrashListeners {
        &self.crash
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    pub(crate) fn enqueue(
        &self,
        action: ActionRef,
        reply: Option<oneshot::Sender<DispatchOutcome>>,
    ) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        let lane = match action.lane() {
            Priority::High => &self.high_tx,
            Priority::Normal => &self.normal_tx,
        };
        lane.send(Envelope { action, reply })
            .map_err(|_| StoreError::Closed)
    }

    pub(crate) fn snapshot(&self) -> StateSnapshot {
        let cells = self.cells.lock();
        StateSnapshot::new(
            cells
                .iter()
                .map(|(key, cell)| (*key, Arc::clone(&cell.state)))
                .collect(),
        )
    }

    pub(crate) fn state<S: ModuleState>(&self) -> Result<Arc<S>, StoreError> {
        let key = ModuleKey::of::<S>();
        if self.registry.get(key).is_none() {
            return Err(StoreError::StateNotFound {
                type_name: key.state_type_name(),
            });
        }
        self.check_ready()?;

        let state = {
            let cells = self.cells.lock();
            cells.get(&key).map(|cell| Arc::clone(&cell.state))
        };
        state
            .and_then(|state| state.downcast::<S>().ok())
            .ok_or(StoreError::StateNotFound {
                type_name: key.state_type_name(),
            })
    }

    pub(crate) fn logic_key<L: 'static>(&self) -> Result<ModuleKey, StoreError> {
        self.registry
            .by_logic::<L>()
            .map(|record| record.key())
            .ok_or(StoreError::LogicNotFound {
                type_name: std::any::type_name::<L>(),
            })
    }

    pub(crate) fn logic<L: Send + Sync + 'static>(&self) -> Result<Arc<L>, StoreError> {
        let key = self.logic_key::<L>()?;
        self.check_ready()?;

        let logic = {
            let cells = self.cells.lock();
            cells
                .get(&key)
                .and_then(|cell| cell.logic.as_ref())
                .map(|slot| Arc::clone(&slot.typed))
        };
        logic
            .ok_or(StoreError::NotInitialized)?
            .downcast::<L>()
            .map_err(|_| StoreError::LogicNotFound {
                type_name: std::any::type_name::<L>(),
            })
    }

    pub(crate) fn describe_state(&self, key: ModuleKey) -> Option<String> {
        let record = self.registry.get(key)?;
        let state = {
            let cells = self.cells.lock();
            Arc::clone(&cells.get(&key)?.state)
        };
        Some(record.module.describe_state(&state))
    }

    fn check_ready(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        if !*self.ready.borrow() {
            return Err(StoreError::NotInitialized);
        }
        Ok(())
    }

    // --- Processing ---

    async fn process(&self, envelope: Envelope) {
        let Envelope { action, reply } = envelope;
        let outcome = self.process_action(action).await;

        if let DispatchOutcome::Error(cause) = &outcome {
            tracing::warn!(error = %cause, "Action processing failed");
        }
        if let Some(reply) = reply {
            let _ = reply.send(outcome);
        }
    }

    async fn process_action(&self, action: ActionRef) -> DispatchOutcome {
        let key = action.module_key();
        let Some(record) = self.registry.get(key) else {
            return DispatchOutcome::Error(ProcessingError::ModuleNotFound {
                action: action.action_name(),
            });
        };

        let ctx = MiddlewareContext::new(self.accessor(), record.name());
        let this = self.this.clone();
        let reduce: Reduce = Box::new(move |action: &ActionRef| match this.upgrade() {
            Some(inner) => inner.apply_reducer(key, action),
            None => Err(ProcessingError::Discarded),
        });
        run_chain(Arc::clone(&self.chain), ctx, action, reduce).await
    }

    /// Terminal link: reduce, write the cell, notify logic.
    fn apply_reducer(&self, key: ModuleKey, action: &ActionRef) -> Result<(), ProcessingError> {
        let record = self
            .registry
            .get(key)
            .ok_or(ProcessingError::ModuleNotFound {
                action: action.action_name(),
            })?;
        let module = record.name();

        let current = {
            let cells = self.cells.lock();
            cells.get(&key).map(|cell| Arc::clone(&cell.state))
        }
        .ok_or(ProcessingError::StateMismatch { module })?;

        let next = std::panic::catch_unwind(AssertUnwindSafe(|| {
            record.module.reduce(&current, action)
        }))
        .map_err(|payload| ProcessingError::ReducerPanicked {
            module,
            message: panic_message(&*payload),
        })??;

        if self.debug.state {
            tracing::debug!(module, state = %record.module.describe_state(&next), "State updated");
        }

        let logic = {
            let mut cells = self.cells.lock();
            let cell = cells
                .get_mut(&key)
                .ok_or(ProcessingError::StateMismatch { module })?;
            cell.state = next;
            cell.logic.clone()
        };

        if let Some(logic) = logic {
            self.spawn_logic(module, logic, Arc::clone(action));
        }
        Ok(())
    }

    fn spawn_logic(&self, module: &'static str, logic: LogicSlot, action: ActionRef) {
        let store = self.accessor();
        let action_name = action.action_name();
        if self.debug.logic {
            tracing::debug!(module, action = action_name, "Logic notified");
        }

        // Drawn here, in reduce order, before the task is scheduled.
        let turn = logic
            .order
            .as_ref()
            .map(|order| (Arc::clone(order), order.ticket()));

        let task = async move {
            let _turn = match turn {
                Some((order, ticket)) => {
                    let order = scopeguard::guard(order, move |order| order.finish(ticket));
                    order.wait_turn(ticket).await;
                    Some(order)
                }
                None => None,
            };
            let result = AssertUnwindSafe(logic.erased.on_action(action, store.clone()))
                .catch_unwind()
                .await;
            let crash = match result {
                Ok(Ok(())) => return,
                Ok(Err(error)) => LogicCrash::error(module, action_name, &error),
                Err(payload) => LogicCrash::panic(module, action_name, panic_message(&*payload)),
            };
            if !store.report_crash(&crash) {
                std::panic::resume_unwind(Box::new(crash.to_string()));
            }
        };

        let mut tasks = self.tasks.lock();
        while let Some(finished) = tasks.try_join_next() {
            if let Err(e) = finished {
                if e.is_panic() {
                    tracing::error!(error = %e, "Logic task ended with an unrecovered crash");
                }
            }
        }
        tasks.spawn_on(task, &self.runtime);
    }

    // --- Lifecycle ---

    fn start_loop(&self, initialize: bool) {
        if self.is_closed() {
            return;
        }
        let signal = LoopSignal::default();
        let join = self.runtime.spawn(run_loop(
            self.this.clone(),
            Arc::clone(&self.lanes),
            signal.clone(),
            initialize,
        ));
        *self.processing.lock() = Some(LoopHandle::new(signal, join));
    }

    async fn stop_loop(&self) {
        let handle = self.processing.lock().take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    async fn cancel_logic_tasks(&self) {
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        let in_flight = tasks.len();
        tasks.shutdown().await;
        if in_flight > 0 {
            tracing::debug!(in_flight, "Logic tasks cancelled");
        }
    }

    async fn initialize(&self) {
        if let Some(persistence) = &self.persistence {
            match self.restore(persistence.as_ref()).await {
                Ok(0) => {}
                Ok(restored) => tracing::info!(restored, "Module states restored"),
                Err(e) => tracing::warn!(error = %e, "Failed to restore persisted state"),
            }
        }
        self.install_logic();
        self.ready.send_replace(true);
        tracing::info!(modules = self.registry.len(), "Store initialized");
    }

    async fn restore(&self, persistence: &dyn PersistenceStrategy) -> Result<usize, StoreError> {
        if !persistence
            .has_persisted()
            .await
            .map_err(StoreError::Persistence)?
        {
            return Ok(0);
        }
        let Some(blob) = persistence.load().await.map_err(StoreError::Persistence)? else {
            return Ok(0);
        };
        let snapshot = self.codecs.decode(&blob)?;

        let mut cells = self.cells.lock();
        let mut restored = 0;
        for (key, state) in snapshot.into_states() {
            if let Some(cell) = cells.get_mut(&key) {
                cell.state = state;
                restored += 1;
            }
        }
        Ok(restored)
    }

    fn install_logic(&self) {
        let accessor = self.accessor();
        let created: Vec<(ModuleKey, LogicSlot)> = self
            .registry
            .iter()
            .map(|record| (record.key(), record.module.create_logic(accessor.clone())))
            .collect();

        let mut cells = self.cells.lock();
        for (key, slot) in created {
            if let Some(cell) = cells.get_mut(&key) {
                cell.logic = Some(slot);
            }
        }
    }

    fn initial_cells(&self) -> HashMap<ModuleKey, Cell> {
        self.registry
            .iter()
            .map(|record| {
                (
                    record.key(),
                    Cell {
                        state: record.module.initial_state(),
                        logic: None,
                    },
                )
            })
            .collect()
    }

    async fn reset_modules(&self) -> Result<(), StoreError> {
        tracing::info!("Store reset started");
        self.stop_loop().await;
        self.cancel_logic_tasks().await;

        let live: Vec<(&'static str, LogicSlot)> = {
            let cells = self.cells.lock();
            self.registry
                .iter()
                .filter_map(|record| {
                    let slot = cells.get(&record.key())?.logic.clone()?;
                    Some((record.name(), slot))
                })
                .collect()
        };
        for (module, logic) in live {
            if let Err(source) = logic.erased.before_reset().await {
                tracing::error!(module, error = %source, "before_reset failed, reset aborted");
                self.start_loop(false);
                return Err(StoreError::BeforeReset { module, source });
            }
        }

        self.crash.clear();
        let discarded = self.lanes.lock().await.drain();

        self.ready.send_replace(false);
        let fresh = self.initial_cells();
        *self.cells.lock() = fresh;
        self.install_logic();
        self.ready.send_replace(true);

        self.start_loop(false);
        tracing::info!(discarded, "Store reset completed");
        Ok(())
    }
}

async fn run_loop(
    inner: Weak<StoreInner>,
    lanes: Arc<tokio::sync::Mutex<Lanes>>,
    signal: LoopSignal,
    initialize: bool,
) {
    let mut lanes = lanes.lock().await;
    let Lanes { high, normal } = &mut *lanes;

    if initialize {
        match inner.upgrade() {
            Some(inner) => inner.initialize().await,
            None => return,
        }
    }

    loop {
        let envelope = tokio::select! {
            biased;
            _ = signal.wait() => break,
            envelope = high.recv() => envelope,
            envelope = normal.recv() => envelope,
        };
        // Both senders live in the store; a closed lane means it is gone.
        let Some(envelope) = envelope else {
            break;
        };

        let Some(inner) = inner.upgrade() else {
            envelope.discard();
            break;
        };
        inner.process(envelope).await;
    }
    tracing::debug!("Processing loop stopped");
}

/// The action-dispatch core.
///
/// Build with [`Store::builder`] inside a Tokio runtime. The store starts
/// its processing loop immediately; modules become selectable once
/// initialization (state restore and logic creation) has finished.
///
/// ```ignore
/// let store = Store::builder()
///     .module(CounterModule)
///     .config(&Config::load()?)
///     .build()?;
///
/// store.dispatch(CounterAction::Increment)?;
/// let counter = store.select_state::<Counter>().await?;
/// ```
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    pub fn accessor(&self) -> StoreAccessor {
        self.inner.accessor()
    }

    pub fn dispatch<A: ModuleAction>(&self, action: A) -> Result<(), StoreError> {
        self.inner.enqueue(Arc::new(action), None)
    }

    pub async fn dispatch_and_await<A: ModuleAction>(
        &self,
        action: A,
    ) -> Result<DispatchOutcome, StoreError> {
        self.accessor().dispatch_and_await(action).await
    }

    pub async fn select_state<S: ModuleState>(&self) -> Result<Arc<S>, StoreError> {
        self.accessor().select_state::<S>().await
    }

    pub fn try_select_state<S: ModuleState>(&self) -> Result<Arc<S>, StoreError> {
        self.inner.state::<S>()
    }

    pub async fn select_logic<L: Send + Sync + 'static>(&self) -> Result<Arc<L>, StoreError> {
        self.accessor().select_logic::<L>().await
    }

    pub fn try_select_logic<L: Send + Sync + 'static>(&self) -> Result<Arc<L>, StoreError> {
        self.inner.logic::<L>()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.inner.snapshot()
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn serialization_context(&self) -> &SerializationContext {
        &self.inner.codecs
    }

    pub fn add_crash_listener(&self, listener: Arc<dyn CrashListener>) {
        self.inner.crash.add(listener);
    }

    pub fn crash_listener_count(&self) -> usize {
        self.inner.crash.len()
    }

    /// Encode every codec-registered state and hand it to the persistence
    /// strategy. Does nothing without one.
    pub async fn persist(&self) -> Result<(), StoreError> {
        let Some(persistence) = &self.inner.persistence else {
            return Ok(());
        };
        let blob = self.inner.codecs.encode(&self.inner.snapshot())?;
        persistence
            .save(blob)
            .await
            .map_err(StoreError::Persistence)
    }

    /// Cancel logic work and return every module to its initial state.
    ///
    /// Queued actions are discarded with `ProcessingError::Discarded`. Once
    /// started, the reset runs to completion even if this future is dropped.
    pub async fn reset(&self) -> Result<ResetOutcome, StoreError> {
        if self.inner.is_closed() {
            return Err(StoreError::Closed);
        }
        if self
            .inner
            .resetting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::info!("Reset already in progress, skipping");
            return Ok(ResetOutcome::Skipped);
        }

        let inner = Arc::clone(&self.inner);
        let task = self.inner.runtime.spawn(async move {
            let flag = Arc::clone(&inner);
            let _resetting = scopeguard::guard((), move |_| {
                flag.resetting.store(false, Ordering::SeqCst);
            });
            inner.reset_modules().await
        });

        match task.await {
            Ok(result) => result.map(|_| ResetOutcome::Completed),
            Err(e) => Err(StoreError::ResetAborted(e.to_string())),
        }
    }

    /// Stop processing for good. Queued actions are discarded and every later
    /// dispatch fails with [`StoreError::Closed`].
    pub async fn cleanup(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.stop_loop().await;
        self.inner.cancel_logic_tasks().await;

        let discarded = {
            let mut lanes = self.inner.lanes.lock().await;
            lanes.close();
            lanes.drain()
        };
        tracing::info!(discarded, "Store closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Collects modules and middlewares; [`StoreBuilder::build`] validates them.
#[derive(Default)]
pub struct StoreBuilder {
    registry: Registry,
    middlewares: Vec<Arc<dyn Middleware>>,
    persistence: Option<Arc<dyn PersistenceStrategy>>,
    debug: DebugCategories,
    error: Option<ConfigurationError>,
}

impl StoreBuilder {
    pub fn module<M: Module>(mut self, module: M) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.registry.register(module) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Explicit middlewares run in registration order, before module ones.
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn persistence(mut self, persistence: Arc<dyn PersistenceStrategy>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn debug(mut self, debug: DebugCategories) -> Self {
        self.debug = debug;
        self
    }

    pub fn config(self, config: &Config) -> Self {
        self.debug(config.debug.clone())
    }

    pub fn build(self) -> Result<Store, ConfigurationError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let runtime = Handle::try_current().map_err(|_| ConfigurationError::NoRuntime)?;

        let mut codecs = CodecRegistry::default();
        let mut chain: Vec<Arc<dyn Middleware>> = Vec::new();
        if self.debug.actions {
            chain.push(Arc::new(LoggingMiddleware::new(self.debug.state)));
        }
        chain.extend(self.middlewares);
        for record in self.registry.iter() {
            record.module.register_codecs(&mut codecs);
            chain.extend(record.module.middlewares());
        }

        let (high_tx, high_rx) = mpsc::unbounded_channel();
        let (normal_tx, normal_rx) = mpsc::unbounded_channel();
        let (ready, _) = watch::channel(false);
        let registry = self.registry;
        let debug = self.debug;
        let persistence = self.persistence;

        let inner = Arc::new_cyclic(|this| {
            let mut inner = StoreInner {
                this: this.clone(),
                runtime,
                registry,
                codecs: codecs.into_context(),
                chain: Arc::from(chain),
                debug,
                persistence,
                cells: Mutex::new(HashMap::new()),
                high_tx,
                normal_tx,
                lanes: Arc::new(tokio::sync::Mutex::new(Lanes {
                    high: high_rx,
                    normal: normal_rx,
                })),
                processing: Mutex::new(None),
                tasks: Mutex::new(JoinSet::new()),
                crash: CrashListeners::default(),
                ready,
                resetting: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            };
            inner.cells = Mutex::new(inner.initial_cells());
            inner
        });

        tracing::debug!(
            modules = inner.registry.len(),
            middlewares = inner.chain.len(),
            "Store built"
        );
        inner.start_loop(true);
        Ok(Store { inner })
    }
}
