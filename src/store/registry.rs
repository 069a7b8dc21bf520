//! Typed module registry.
//!
//! Every module registers under one canonical key, the type of its state.
//! The record carries the module, action and logic types as explicit
//! fields; secondary indexes map module and logic types back to the key.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use super::accessor::StoreAccessor;
use super::action::ActionRef;
use super::middleware::Middleware;
use crate::codec::CodecRegistry;
use crate::error::{ConfigurationError, ProcessingError};
use crate::mvi::{Module, ModuleLogic};

pub(crate) type StateRef = Arc<dyn Any + Send + Sync>;

/// Canonical registry key: the module's state type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleKey {
    id: TypeId,
    state: &'static str,
}

impl ModuleKey {
    pub fn of<S: 'static>() -> Self {
        Self {
            id: TypeId::of::<S>(),
            state: std::any::type_name::<S>(),
        }
    }

    pub fn state_type_name(&self) -> &'static str {
        self.state
    }
}

impl fmt::Debug for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleKey({})", self.state)
    }
}

/// Registered module with its associated types.
pub struct ModuleRecord {
    name: &'static str,
    key: ModuleKey,
    module_type: TypeId,
    action_type: TypeId,
    logic_type: TypeId,
    pub(crate) module: Arc<dyn ErasedModule>,
}

impl ModuleRecord {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn key(&self) -> ModuleKey {
        self.key
    }

    pub fn module_type(&self) -> TypeId {
        self.module_type
    }

    pub fn action_type(&self) -> TypeId {
        self.action_type
    }

    pub fn logic_type(&self) -> TypeId {
        self.logic_type
    }
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Module records, populated once when the store is built.
#[derive(Default)]
pub struct Registry {
    records: Vec<ModuleRecord>,
    by_state: HashMap<ModuleKey, usize>,
    by_module: HashMap<TypeId, usize>,
    by_logic: HashMap<TypeId, usize>,
}

impl Registry {
    pub(crate) fn register<M: Module>(&mut self, module: M) -> Result<(), ConfigurationError> {
        let key = ModuleKey::of::<M::State>();
        if let Some(&existing) = self.by_state.get(&key) {
            return Err(ConfigurationError::DuplicateState {
                module: M::NAME,
                existing: self.records[existing].name,
                state: key.state_type_name(),
            });
        }

        let index = self.records.len();
        self.records.push(ModuleRecord {
            name: M::NAME,
            key,
            module_type: TypeId::of::<M>(),
            action_type: TypeId::of::<M::Action>(),
            logic_type: TypeId::of::<M::Logic>(),
            module: Arc::new(ModuleAdapter(module)),
        });
        self.by_state.insert(key, index);
        self.by_module.insert(TypeId::of::<M>(), index);
        self.by_logic.entry(TypeId::of::<M::Logic>()).or_insert(index);

        tracing::debug!(module = M::NAME, state = key.state_type_name(), "Module registered");
        Ok(())
    }

    pub fn get(&self, key: ModuleKey) -> Option<&ModuleRecord> {
        self.by_state.get(&key).map(|&index| &self.records[index])
    }

    pub fn by_module<M: Module>(&self) -> Option<&ModuleRecord> {
        self.by_module
            .get(&TypeId::of::<M>())
            .map(|&index| &self.records[index])
    }

    pub fn by_logic<L: 'static>(&self) -> Option<&ModuleRecord> {
        self.by_logic
            .get(&TypeId::of::<L>())
            .map(|&index| &self.records[index])
    }

    /// Records in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Logic instance stored twice: erased for invocation, typed for lookups.
#[derive(Clone)]
pub(crate) struct LogicSlot {
    pub(crate) erased: Arc<dyn ErasedLogic>,
    pub(crate) typed: Arc<dyn Any + Send + Sync>,
    /// Present for logic that declares `ORDERED`.
    pub(crate) order: Option<Arc<InvocationOrder>>,
}

/// Ticket gate for ordered logic.
///
/// Tickets are drawn synchronously when the action is reduced; the
/// invocation holding ticket `n` starts only after ticket `n - 1` finished.
pub(crate) struct InvocationOrder {
    issued: AtomicU64,
    serving: watch::Sender<u64>,
}

impl InvocationOrder {
    fn new() -> Self {
        let (serving, _) = watch::channel(0);
        Self {
            issued: AtomicU64::new(0),
            serving,
        }
    }

    pub(crate) fn ticket(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) async fn wait_turn(&self, ticket: u64) {
        let mut serving = self.serving.subscribe();
        // Only fails when the sender is gone, and `self` owns it.
        let _ = serving.wait_for(|now| *now >= ticket).await;
    }

    /// Hand the turn to the next ticket.
    pub(crate) fn finish(&self, ticket: u64) {
        self.serving.send_if_modified(|now| {
            if *now == ticket {
                *now += 1;
                true
            } else {
                false
            }
        });
    }
}

pub(crate) trait ErasedModule: Send + Sync {
    fn initial_state(&self) -> StateRef;

    fn reduce(&self, state: &StateRef, action: &ActionRef) -> Result<StateRef, ProcessingError>;

    fn create_logic(&self, store: StoreAccessor) -> LogicSlot;

    fn middlewares(&self) -> Vec<Arc<dyn Middleware>>;

    fn register_codecs(&self, codecs: &mut CodecRegistry);

    fn describe_state(&self, state: &StateRef) -> String;
}

#[async_trait]
pub(crate) trait ErasedLogic: Send + Sync {
    async fn on_action(&self, action: ActionRef, store: StoreAccessor) -> anyhow::Result<()>;

    async fn before_reset(&self) -> anyhow::Result<()>;
}

struct ModuleAdapter<M>(M);

impl<M: Module> ErasedModule for ModuleAdapter<M> {
    fn initial_state(&self) -> StateRef {
        Arc::new(self.0.initial_state())
    }

    fn reduce(&self, state: &StateRef, action: &ActionRef) -> Result<StateRef, ProcessingError> {
        let action = action
            .downcast_ref::<M::Action>()
            .ok_or(ProcessingError::ActionMismatch {
                module: M::NAME,
                action: action.action_name(),
            })?
            .clone();
        let state = (**state)
            .downcast_ref::<M::State>()
            .ok_or(ProcessingError::StateMismatch { module: M::NAME })?
            .clone();
        Ok(Arc::new(self.0.reduce(state, action)))
    }

    fn create_logic(&self, store: StoreAccessor) -> LogicSlot {
        let logic = Arc::new(self.0.create_logic(store));
        LogicSlot {
            erased: Arc::new(LogicAdapter(Arc::clone(&logic))),
            typed: logic,
            order: <M::Logic as ModuleLogic>::ORDERED.then(|| Arc::new(InvocationOrder::new())),
        }
    }

    fn middlewares(&self) -> Vec<Arc<dyn Middleware>> {
        self.0.middlewares()
    }

    fn register_codecs(&self, codecs: &mut CodecRegistry) {
        self.0.register_codecs(codecs);
    }

    fn describe_state(&self, state: &StateRef) -> String {
        match (**state).downcast_ref::<M::State>() {
            Some(state) => format!("{:?}", state),
            None => format!("<{}: unexpected state type>", M::NAME),
        }
    }
}

struct LogicAdapter<L>(Arc<L>);

#[async_trait]
impl<L: ModuleLogic> ErasedLogic for LogicAdapter<L> {
    async fn on_action(&self, action: ActionRef, store: StoreAccessor) -> anyhow::Result<()> {
        match action.downcast_ref::<L::Action>() {
            Some(typed) => self.0.on_action(typed, &store).await,
            None => Ok(()),
        }
    }

    async fn before_reset(&self) -> anyhow::Result<()> {
        self.0.before_reset().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvi::{ModuleAction, ModuleState, NoLogic};

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Flags {
        on: bool,
    }

    impl ModuleState for Flags {}

    #[derive(Debug, Clone)]
    enum FlagAction {
        Toggle,
    }

    impl ModuleAction for FlagAction {
        type Module = FlagModule;
    }

    struct FlagModule;

    impl Module for FlagModule {
        const NAME: &'static str = "flags";
        type State = Flags;
        type Action = FlagAction;
        type Logic = NoLogic<FlagAction>;

        fn initial_state(&self) -> Flags {
            Flags::default()
        }

        fn reduce(&self, state: Flags, action: FlagAction) -> Flags {
            match action {
                FlagAction::Toggle => Flags { on: !state.on },
            }
        }

        fn create_logic(&self, _store: StoreAccessor) -> Self::Logic {
            NoLogic::new()
        }
    }

    struct ShadowModule;

    impl Module for ShadowModule {
        const NAME: &'static str = "shadow";
        type State = Flags;
        type Action = ShadowAction;
        type Logic = NoLogic<ShadowAction>;

        fn initial_state(&self) -> Flags {
            Flags { on: true }
        }

        fn reduce(&self, state: Flags, _action: ShadowAction) -> Flags {
            state
        }

        fn create_logic(&self, _store: StoreAccessor) -> Self::Logic {
            NoLogic::new()
        }
    }

    #[derive(Debug, Clone)]
    struct ShadowAction;

    impl ModuleAction for ShadowAction {
        type Module = ShadowModule;
    }

    #[test]
    fn every_token_resolves_to_the_same_record() {
        let mut registry = Registry::default();
        registry.register(FlagModule).unwrap();

        let by_state = registry.get(ModuleKey::of::<Flags>()).unwrap();
        let by_module = registry.by_module::<FlagModule>().unwrap();
        let by_logic = registry.by_logic::<NoLogic<FlagAction>>().unwrap();

        assert_eq!(by_state.name(), "flags");
        assert_eq!(by_module.key(), by_state.key());
        assert_eq!(by_logic.key(), by_state.key());
        assert_eq!(by_state.action_type(), TypeId::of::<FlagAction>());
    }

    #[test]
    fn duplicate_state_type_is_rejected() {
        let mut registry = Registry::default();
        registry.register(FlagModule).unwrap();

        let err = registry.register(ShadowModule).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::DuplicateState {
                module: "shadow",
                existing: "flags",
                ..
            }
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn erased_reduce_round_trips_typed_state() {
        let mut registry = Registry::default();
        registry.register(FlagModule).unwrap();
        let record = registry.get(ModuleKey::of::<Flags>()).unwrap();

        let state = record.module.initial_state();
        let action: ActionRef = Arc::new(FlagAction::Toggle);
        let next = record.module.reduce(&state, &action).unwrap();

        assert_eq!(next.downcast_ref::<Flags>(), Some(&Flags { on: true }));
        // Old state is untouched.
        assert_eq!(state.downcast_ref::<Flags>(), Some(&Flags { on: false }));
    }

    #[test]
    fn foreign_action_is_a_mismatch() {
        let mut registry = Registry::default();
        registry.register(FlagModule).unwrap();
        let record = registry.get(ModuleKey::of::<Flags>()).unwrap();

        let state = record.module.initial_state();
        let foreign: ActionRef = Arc::new(ShadowAction);
        let err = record.module.reduce(&state, &foreign).unwrap_err();
        assert!(matches!(err, ProcessingError::ActionMismatch { module: "flags", .. }));
    }

    #[tokio::test]
    async fn later_tickets_wait_for_earlier_ones() {
        let order = Arc::new(InvocationOrder::new());
        let first = order.ticket();
        let second = order.ticket();

        let waiter = {
            let order = Arc::clone(&order);
            tokio::spawn(async move { order.wait_turn(second).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        order.wait_turn(first).await;
        order.finish(first);
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();

        // A stale finish does not skip ahead.
        order.finish(first);
        order.finish(second);
        assert_eq!(*order.serving.borrow(), 2);
    }

    #[test]
    fn only_ordered_logic_gets_a_ticket_gate() {
        let mut registry = Registry::default();
        registry.register(FlagModule).unwrap();
        let record = registry.get(ModuleKey::of::<Flags>()).unwrap();
        let slot = record
            .module
            .create_logic(StoreAccessor::new(std::sync::Weak::new()));
        assert!(slot.order.is_none());
    }
}
