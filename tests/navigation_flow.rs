mod common;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common::{navigation_module, sample_graph};
use mvli::config::NavigationSettings;
use mvli::navigation::{
    Guard, GuardRegistry, GuardResult, GuidedFlowBatch, GuidedFlowDefinition,
    GuidedFlowModification, GuidedFlowStep, NavOptions, NavigationAction, NavigationModule,
    NavigationLogic, NavigationOutcome, NavigationRequest, NavigationState, Navigator,
    RouteResolver,
};
use mvli::store::{ActionRef, Middleware, MiddlewareContext, Next, Store, StoreAccessor};

fn navigation_store(module: NavigationModule) -> (Store, Navigator) {
    let store = Store::builder().module(module).build().unwrap();
    let navigator = Navigator::new(store.accessor());
    (store, navigator)
}

fn paths(state: &NavigationState) -> Vec<&str> {
    state.back_stack.iter().map(|entry| entry.path.as_str()).collect()
}

struct FnGuard<F>(F);

#[async_trait]
impl<F> Guard for FnGuard<F>
where
    F: Fn(&NavigationRequest) -> GuardResult + Send + Sync,
{
    async fn check(&self, _store: &StoreAccessor, request: &NavigationRequest) -> GuardResult {
        (self.0)(request)
    }
}

fn signup_flow() -> GuidedFlowDefinition {
    GuidedFlowDefinition::new(
        "signup",
        vec![
            GuidedFlowStep::new("signup/email"),
            GuidedFlowStep::new("signup/password"),
            GuidedFlowStep::new("signup/profile"),
        ],
    )
}

#[tokio::test]
async fn starts_on_root_and_never_pops_it() {
    let (_store, navigator) = navigation_store(navigation_module());

    let state = navigator.state().await.unwrap();
    assert_eq!(paths(&state), vec!["home"]);
    assert!(!state.view.can_go_back);

    assert_eq!(navigator.navigate("profile").await.unwrap(), NavigationOutcome::Committed);
    let state = navigator.state().await.unwrap();
    assert_eq!(paths(&state), vec!["home", "profile"]);
    assert_eq!(state.view.current_path, "profile");
    assert!(state.view.can_go_back);

    assert_eq!(navigator.back().await.unwrap(), NavigationOutcome::Committed);
    assert_eq!(navigator.back().await.unwrap(), NavigationOutcome::Ignored);
    assert_eq!(paths(&navigator.state().await.unwrap()), vec!["home"]);
}

#[tokio::test]
async fn dismissing_a_modal_restores_the_screen_beneath() {
    let (_store, navigator) = navigation_store(navigation_module());
    navigator.navigate("profile").await.unwrap();
    let before = navigator.state().await.unwrap().view.visible_layers.clone();

    navigator.navigate("confirm").await.unwrap();
    let state = navigator.state().await.unwrap();
    assert!(state.view.has_modals_in_stack);
    let visible: Vec<&str> = state.view.visible_layers.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(visible, vec!["profile", "confirm"]);
    assert_eq!(state.modal_contexts.len(), 1);

    assert_eq!(navigator.dismiss_modal().await.unwrap(), NavigationOutcome::Committed);
    let state = navigator.state().await.unwrap();
    assert_eq!(state.current().unwrap().path, "profile");
    assert_eq!(state.view.visible_layers.len(), 1);
    assert_eq!(state.view.visible_layers, before);
    assert!(state.modal_contexts.is_empty());

    assert_eq!(navigator.dismiss_modal().await.unwrap(), NavigationOutcome::Ignored);
}

#[tokio::test]
async fn popping_a_modal_restores_visible_layers() {
    let (_store, navigator) = navigation_store(navigation_module());
    navigator.navigate("profile").await.unwrap();
    let before = navigator.state().await.unwrap().view.visible_layers.clone();

    navigator.navigate("confirm").await.unwrap();
    navigator.back().await.unwrap();

    let state = navigator.state().await.unwrap();
    assert_eq!(state.current().unwrap().path, "profile");
    assert_eq!(state.view.visible_layers, before);
}

#[tokio::test]
async fn back_stack_options() {
    let (_store, navigator) = navigation_store(navigation_module());
    navigator.navigate("profile").await.unwrap();
    navigator.navigate("login").await.unwrap();
    navigator.navigate("signup/password").await.unwrap();

    assert_eq!(
        navigator.pop_up_to("profile", false).await.unwrap(),
        NavigationOutcome::Committed
    );
    assert_eq!(paths(&navigator.state().await.unwrap()), vec!["home", "profile"]);

    let params = BTreeMap::from([("id".to_string(), "7".to_string())]);
    navigator
        .navigate_with("home/detail/7", params.clone(), NavOptions::single_top())
        .await
        .unwrap();
    navigator
        .navigate_with("home/detail/7", params, NavOptions::single_top())
        .await
        .unwrap();
    let state = navigator.state().await.unwrap();
    assert_eq!(paths(&state), vec!["home", "profile", "home/detail/7"]);
    assert_eq!(state.current().unwrap().params.get("id").map(String::as_str), Some("7"));

    assert_eq!(navigator.clear_back_stack().await.unwrap(), NavigationOutcome::Committed);
    assert_eq!(paths(&navigator.state().await.unwrap()), vec!["home"]);
    assert_eq!(navigator.clear_back_stack().await.unwrap(), NavigationOutcome::Ignored);

    navigator
        .navigate_with("login", BTreeMap::new(), NavOptions::clear_back_stack())
        .await
        .unwrap();
    assert_eq!(paths(&navigator.state().await.unwrap()), vec!["login"]);

    // Would empty the stack.
    assert_eq!(
        navigator.pop_up_to("login", true).await.unwrap(),
        NavigationOutcome::Ignored
    );
}

#[tokio::test]
async fn unknown_paths_land_on_the_not_found_destination() {
    let (_store, navigator) = navigation_store(navigation_module());
    navigator.navigate("no/such/place").await.unwrap();
    let state = navigator.state().await.unwrap();
    assert_eq!(state.current().unwrap().destination.route, "missing");

    let bare = mvli::navigation::NavigationGraph::new("bare")
        .start_route("home")
        .destination(mvli::navigation::Destination::screen("home"));
    let (_store, navigator) =
        navigation_store(NavigationModule::new(RouteResolver::new(&bare).unwrap()));
    assert_eq!(
        navigator.navigate("nowhere").await.unwrap(),
        NavigationOutcome::NotFound {
            path: "nowhere".to_string()
        }
    );
}

#[tokio::test]
async fn guard_pends_then_resumes_after_login() {
    let logged_in = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&logged_in);
    let guards = GuardRegistry::new().register(
        "account",
        Arc::new(FnGuard(move |_: &NavigationRequest| {
            if flag.load(Ordering::SeqCst) {
                GuardResult::Allow
            } else {
                GuardResult::PendAndRedirectTo {
                    route: "login".to_string(),
                    metadata: BTreeMap::from([("reason".to_string(), "auth".to_string())]),
                    hint: Some("sign in first".to_string()),
                }
            }
        })),
    );
    let (_store, navigator) = navigation_store(navigation_module().guards(guards));

    assert_eq!(
        navigator.navigate("account/settings").await.unwrap(),
        NavigationOutcome::Redirected {
            to: "login".to_string()
        }
    );
    let state = navigator.state().await.unwrap();
    assert_eq!(state.current().unwrap().path, "login");
    let pending = state.pending_navigation.clone().unwrap();
    assert_eq!(pending.route, "account/settings");
    assert_eq!(pending.metadata.get("reason").map(String::as_str), Some("auth"));
    assert_eq!(pending.hint.as_deref(), Some("sign in first"));

    logged_in.store(true, Ordering::SeqCst);
    assert_eq!(
        navigator.resume_pending_navigation().await.unwrap(),
        NavigationOutcome::Committed
    );
    let state = navigator.state().await.unwrap();
    assert_eq!(paths(&state), vec!["home", "login", "account/settings"]);
    assert!(state.pending_navigation.is_none());

    assert_eq!(
        navigator.resume_pending_navigation().await.unwrap(),
        NavigationOutcome::Ignored
    );
}

#[tokio::test]
async fn rejected_navigation_leaves_state_untouched() {
    let guards = GuardRegistry::new().register(
        "confirm",
        Arc::new(FnGuard(|_: &NavigationRequest| GuardResult::Reject)),
    );
    let (_store, navigator) = navigation_store(navigation_module().guards(guards));
    let before = navigator.state().await.unwrap();

    assert_eq!(navigator.navigate("confirm").await.unwrap(), NavigationOutcome::Rejected);
    assert_eq!(*navigator.state().await.unwrap(), *before);
}

#[tokio::test]
async fn redirect_loops_are_cut_off() {
    let hops = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hops);
    let guards = GuardRegistry::new().register(
        "*",
        Arc::new(FnGuard(move |request: &NavigationRequest| {
            if request.path() == "profile" {
                counter.fetch_add(1, Ordering::SeqCst);
                GuardResult::RedirectTo("profile".to_string())
            } else {
                GuardResult::Allow
            }
        })),
    );
    let settings = NavigationSettings {
        max_redirects: 2,
        ..NavigationSettings::default()
    };
    let resolver = RouteResolver::new(&sample_graph()).unwrap();
    let module = NavigationModule::with_settings(resolver, settings).guards(guards);
    let (_store, navigator) = navigation_store(module);

    assert_eq!(navigator.navigate("profile").await.unwrap(), NavigationOutcome::Rejected);
    assert_eq!(hops.load(Ordering::SeqCst), 3);
    assert_eq!(navigator.state().await.unwrap().depth(), 1);
}

#[tokio::test]
async fn guided_flow_batch_edits_and_completes_atomically() {
    let completions = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&completions);
    let flow = signup_flow().on_complete(move |_: &StoreAccessor| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let (_store, navigator) = navigation_store(navigation_module());

    assert_eq!(
        navigator.start_guided_flow(flow).await.unwrap(),
        NavigationOutcome::Committed
    );
    let state = navigator.state().await.unwrap();
    assert_eq!(state.current().unwrap().path, "signup/email");
    assert_eq!(state.guided_flow.as_ref().unwrap().current_step, 0);

    let batch = GuidedFlowBatch::new()
        .modify(GuidedFlowModification::RemoveSteps {
            indices: vec![2, 3],
        })
        .modify(GuidedFlowModification::UpdateStepParams {
            index: 1,
            params: BTreeMap::from([("userId".to_string(), "123".to_string())]),
        })
        .then_advance();
    assert_eq!(
        navigator.guided_flow_batch(batch).await.unwrap(),
        NavigationOutcome::Committed
    );

    let state = navigator.state().await.unwrap();
    let flow = state.guided_flow.as_ref().unwrap();
    assert_eq!(flow.definition.len(), 1);
    assert_eq!(flow.definition.steps[0].route, "signup/email");
    assert_eq!(
        flow.definition.steps[0].params.get("userId").map(String::as_str),
        Some("123")
    );
    assert_eq!(flow.current_step, 1);
    assert!(flow.is_completed());
    assert_eq!(completions.load(Ordering::SeqCst), 1);

    assert_eq!(navigator.next_step().await.unwrap(), NavigationOutcome::Ignored);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn guided_flow_steps_forward_and_back() {
    let (_store, navigator) =
        navigation_store(navigation_module().guided_flow(signup_flow()));

    assert_eq!(
        navigator.start_named_guided_flow("signup").await.unwrap(),
        NavigationOutcome::Committed
    );
    navigator.next_step().await.unwrap();
    let state = navigator.state().await.unwrap();
    assert_eq!(paths(&state), vec!["home", "signup/email", "signup/password"]);
    assert_eq!(state.guided_flow.as_ref().unwrap().current_step, 1);

    assert_eq!(navigator.previous_step().await.unwrap(), NavigationOutcome::Committed);
    let state = navigator.state().await.unwrap();
    assert_eq!(paths(&state), vec!["home", "signup/email"]);
    assert_eq!(state.guided_flow.as_ref().unwrap().current_step, 0);

    assert_eq!(navigator.previous_step().await.unwrap(), NavigationOutcome::Ignored);
    assert_eq!(
        navigator.start_named_guided_flow("unknown").await.unwrap(),
        NavigationOutcome::Ignored
    );
}

#[tokio::test]
async fn modifying_a_flow_does_not_navigate() {
    let (_store, navigator) = navigation_store(navigation_module());
    assert_eq!(
        navigator
            .modify_guided_flow(vec![GuidedFlowModification::RemoveSteps { indices: vec![1] }])
            .await
            .unwrap(),
        NavigationOutcome::Ignored
    );

    navigator.start_guided_flow(signup_flow()).await.unwrap();
    navigator
        .modify_guided_flow(vec![GuidedFlowModification::AddSteps {
            steps: vec![GuidedFlowStep::new("account/overview")],
            at: None,
        }])
        .await
        .unwrap();

    let state = navigator.state().await.unwrap();
    assert_eq!(state.current().unwrap().path, "signup/email");
    assert_eq!(state.guided_flow.as_ref().unwrap().definition.len(), 4);
}

#[tokio::test]
async fn plain_dispatch_is_the_same_path() {
    let (store, navigator) = navigation_store(navigation_module());
    store.dispatch(NavigationAction::navigate("profile")).unwrap();

    assert!(
        common::eventually(|| {
            store
                .try_select_state::<NavigationState>()
                .map(|state| state.view.current_path == "profile")
                .unwrap_or(false)
        })
        .await
    );
    navigator.back().await.unwrap();
    assert_eq!(navigator.state().await.unwrap().view.current_path, "home");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unawaited_intents_commit_in_dispatch_order() {
    for _ in 0..100 {
        let (store, _navigator) = navigation_store(navigation_module());
        store.dispatch(NavigationAction::navigate("profile")).unwrap();
        store.dispatch(NavigationAction::navigate("login")).unwrap();
        store.dispatch(NavigationAction::navigate("home/detail/7")).unwrap();

        assert!(
            common::eventually(|| {
                store
                    .try_select_state::<NavigationState>()
                    .map(|state| state.depth() == 4)
                    .unwrap_or(false)
            })
            .await
        );
        let state = store.try_select_state::<NavigationState>().unwrap();
        assert_eq!(paths(&state), vec!["home", "profile", "login", "home/detail/7"]);
    }
}

#[tokio::test]
async fn logic_is_found_by_its_concrete_type() {
    let (store, _navigator) = navigation_store(navigation_module());

    let logic = store.select_logic::<NavigationLogic>().await.unwrap();
    let resolution = logic.resolver().resolve("home/detail/42").unwrap();
    assert_eq!(resolution.params.get("id").map(String::as_str), Some("42"));
    assert_eq!(
        store.registry().by_logic::<NavigationLogic>().unwrap().name(),
        "navigation"
    );
}

/// Blocks every committed navigation update.
struct Freeze;

#[async_trait]
impl Middleware for Freeze {
    async fn handle(
        &self,
        action: ActionRef,
        _ctx: &MiddlewareContext,
        next: Next,
    ) -> anyhow::Result<()> {
        if let Some(NavigationAction::Apply(_)) = action.downcast_ref::<NavigationAction>() {
            return Ok(());
        }
        next.run(action).await
    }
}

#[tokio::test]
async fn blocked_update_is_reported() {
    let store = Store::builder()
        .module(navigation_module())
        .middleware(Arc::new(Freeze))
        .build()
        .unwrap();
    let navigator = Navigator::new(store.accessor());

    assert_eq!(navigator.navigate("profile").await.unwrap(), NavigationOutcome::Blocked);
    assert_eq!(navigator.state().await.unwrap().depth(), 1);
}
