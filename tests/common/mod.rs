//! Shared test fixtures: a counter module, a sample graph and store helpers.

#![allow(dead_code, unused_imports)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mvli::codec::CodecRegistry;
use mvli::mvi::{Module, ModuleAction, ModuleLogic, ModuleState, Priority};
use mvli::navigation::{Destination, NavigationGraph, NavigationModule, RouteResolver};
use mvli::store::{Middleware, Store, StoreAccessor};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub count: i64,
    /// Labels of `Mark` actions in the order they were reduced.
    pub marks: Vec<String>,
}

impl ModuleState for Counter {}

#[derive(Debug, Clone, PartialEq)]
pub enum CounterAction {
    Increment,
    Decrement,
    Mark(String),
    /// High priority variant of `Mark`.
    Urgent(String),
    /// Reducer sleeps (blocking) before marking.
    SlowMark(String, Duration),
    /// Logic sleeps before recording completion.
    Work(Duration),
    FailLogic,
    PanicLogic,
    PanicReducer,
}

impl ModuleAction for CounterAction {
    type Module = CounterModule;

    fn priority(&self) -> Priority {
        match self {
            CounterAction::Urgent(_) => Priority::High,
            _ => Priority::Normal,
        }
    }
}

/// Observations made by the counter logic.
#[derive(Default)]
pub struct Probe {
    pub seen: Mutex<Vec<String>>,
    pub work_finished: AtomicUsize,
    pub before_reset_calls: AtomicUsize,
    pub fail_before_reset: AtomicBool,
}

impl Probe {
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

pub struct CounterModule {
    pub probe: Arc<Probe>,
    pub middlewares: Vec<Arc<dyn Middleware>>,
}

impl CounterModule {
    pub fn new(probe: Arc<Probe>) -> Self {
        Self {
            probe,
            middlewares: Vec::new(),
        }
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }
}

impl Module for CounterModule {
    const NAME: &'static str = "counter";

    type State = Counter;
    type Action = CounterAction;
    type Logic = CounterLogic;

    fn initial_state(&self) -> Counter {
        Counter::default()
    }

    fn reduce(&self, mut state: Counter, action: CounterAction) -> Counter {
        match action {
            CounterAction::Increment => state.count += 1,
            CounterAction::Decrement => state.count -= 1,
            CounterAction::Mark(label) | CounterAction::Urgent(label) => state.marks.push(label),
            CounterAction::SlowMark(label, delay) => {
                std::thread::sleep(delay);
                state.marks.push(label);
            }
            CounterAction::PanicReducer => panic!("reducer exploded"),
            CounterAction::Work(_) | CounterAction::FailLogic | CounterAction::PanicLogic => {}
        }
        state
    }

    fn create_logic(&self, _store: StoreAccessor) -> CounterLogic {
        CounterLogic {
            probe: Arc::clone(&self.probe),
        }
    }

    fn middlewares(&self) -> Vec<Arc<dyn Middleware>> {
        self.middlewares.clone()
    }

    fn register_codecs(&self, codecs: &mut CodecRegistry) {
        codecs.register::<Counter>(Self::NAME);
    }
}

pub struct CounterLogic {
    probe: Arc<Probe>,
}

#[async_trait]
impl ModuleLogic for CounterLogic {
    type Action = CounterAction;

    async fn on_action(&self, action: &CounterAction, _store: &StoreAccessor) -> anyhow::Result<()> {
        self.probe.seen.lock().push(format!("{:?}", action));
        match action {
            CounterAction::Work(delay) => {
                tokio::time::sleep(*delay).await;
                self.probe.work_finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            CounterAction::FailLogic => anyhow::bail!("logic failed on purpose"),
            CounterAction::PanicLogic => panic!("logic exploded"),
            _ => Ok(()),
        }
    }

    async fn before_reset(&self) -> anyhow::Result<()> {
        self.probe.before_reset_calls.fetch_add(1, Ordering::SeqCst);
        if self.probe.fail_before_reset.load(Ordering::SeqCst) {
            anyhow::bail!("not ready to reset");
        }
        Ok(())
    }
}

/// A second module that owns an unrelated state, used for isolation checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeting {
    pub text: String,
}

impl ModuleState for Greeting {}

#[derive(Debug, Clone)]
pub enum GreetingAction {
    Set(String),
}

impl ModuleAction for GreetingAction {
    type Module = GreetingModule;
}

pub struct GreetingModule;

impl Module for GreetingModule {
    const NAME: &'static str = "greeting";

    type State = Greeting;
    type Action = GreetingAction;
    type Logic = mvli::mvi::NoLogic<GreetingAction>;

    fn initial_state(&self) -> Greeting {
        Greeting {
            text: "hello".to_string(),
        }
    }

    fn reduce(&self, _state: Greeting, action: GreetingAction) -> Greeting {
        match action {
            GreetingAction::Set(text) => Greeting { text },
        }
    }

    fn create_logic(&self, _store: StoreAccessor) -> Self::Logic {
        mvli::mvi::NoLogic::new()
    }

    fn register_codecs(&self, codecs: &mut CodecRegistry) {
        codecs.register::<Greeting>(Self::NAME);
    }
}

/// Store with the counter module only.
pub fn counter_store() -> (Store, Arc<Probe>) {
    let probe = Arc::new(Probe::default());
    let store = Store::builder()
        .module(CounterModule::new(Arc::clone(&probe)))
        .build()
        .expect("counter store should build");
    (store, probe)
}

/// ```text
/// app (start: home)
/// ├── home
/// ├── home/detail/{id}
/// ├── profile
/// ├── login
/// ├── confirm            (modal)
/// ├── missing
/// ├── signup (start: signup/email)
/// │   ├── email, password, profile
/// └── account (start: account/overview)
///     ├── overview
///     └── settings
/// ```
pub fn sample_graph() -> NavigationGraph {
    NavigationGraph::new("app")
        .start_route("home")
        .not_found("missing")
        .destination(Destination::screen("home").with_title("Home"))
        .destination(Destination::screen("home/detail/{id}").with_title("Detail"))
        .destination(Destination::screen("profile").with_title("Profile"))
        .destination(Destination::screen("login"))
        .destination(Destination::modal("confirm").with_title("Confirm"))
        .destination(Destination::screen("missing"))
        .graph(
            NavigationGraph::new("signup")
                .start_route("email")
                .destination(Destination::screen("email"))
                .destination(Destination::screen("password"))
                .destination(Destination::screen("profile")),
        )
        .graph(
            NavigationGraph::new("account")
                .start_route("overview")
                .destination(Destination::screen("overview"))
                .destination(Destination::screen("settings")),
        )
}

pub fn navigation_module() -> NavigationModule {
    NavigationModule::new(RouteResolver::new(&sample_graph()).expect("sample graph is valid"))
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
