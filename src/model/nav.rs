//! Navigation state for the phone overlay.
//!
//! All mutation goes through [`NavStore::dispatch`], which applies one
//! [`Action`] at a time. The store performs no I/O; the caller supplies the
//! current time so that interaction timestamps stay deterministic.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, IntoStaticStr};
use tracing::trace;

use super::locale::Locale;
use crate::sys::time::Timestamp;

pub const DEFAULT_MAX_STACK_DEPTH: usize = 32;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Route {
    Locked,
    Home,
    App {
        app_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        view: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RouteKind {
    Locked,
    Home,
    App,
}

impl Route {
    pub fn app(app_id: impl Into<String>) -> Self {
        Route::App {
            app_id: app_id.into(),
            view: None,
            params: None,
        }
    }

    pub fn kind(&self) -> RouteKind {
        match self {
            Route::Locked => RouteKind::Locked,
            Route::Home => RouteKind::Home,
            Route::App { .. } => RouteKind::App,
        }
    }

    pub fn app_id(&self) -> Option<&str> {
        match self {
            Route::App { app_id, .. } => Some(app_id),
            _ => None,
        }
    }

    pub fn view(&self) -> Option<&str> {
        match self {
            Route::App { view, .. } => view.as_deref(),
            _ => None,
        }
    }
}

const LOCKED_ROUTE: &Route = &Route::Locked;
const HOME_ROUTE: &Route = &Route::Home;

/// One frame of navigation history. `key` only identifies the frame for
/// transitions; two entries with equal routes still have distinct keys.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NavEntry {
    pub key: u64,
    #[serde(flatten)]
    pub route: Route,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SheetState {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModalState {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default = "yes")]
    pub dismissible: bool,
}

fn yes() -> bool { true }

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PhoneState {
    pub is_open: bool,
    pub is_locked: bool,
    pub locale: Locale,
    pub nav_stack: Vec<NavEntry>,
    pub sheet: Option<SheetState>,
    pub modal: Option<ModalState>,
    pub last_interaction_at: Timestamp,
}

impl PhoneState {
    pub fn depth(&self) -> usize { self.nav_stack.len() }

    pub fn routes(&self) -> impl Iterator<Item = &Route> { self.nav_stack.iter().map(|e| &e.route) }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    OpenPhone,
    ClosePhone,
    LockPhone,
    UnlockPhone,
    GoHome,
    OpenApp {
        app_id: String,
        view: Option<String>,
        params: Option<Value>,
    },
    PushRoute(Route),
    PopRoute,
    SetLocale(Locale),
    SetSheet(Option<SheetState>),
    SetModal(Option<ModalState>),
    Touch,
}

impl Action {
    pub fn open_app(app_id: impl Into<String>) -> Self {
        Action::OpenApp {
            app_id: app_id.into(),
            view: None,
            params: None,
        }
    }
}

/// The stack top. The fallback only applies if the stack were ever empty.
pub fn current_route(state: &PhoneState) -> &Route {
    match state.nav_stack.last() {
        Some(entry) => &entry.route,
        None if state.is_locked => LOCKED_ROUTE,
        None => HOME_ROUTE,
    }
}

#[derive(Debug)]
pub struct NavStore {
    state: PhoneState,
    next_key: u64,
    max_depth: usize,
}

impl NavStore {
    /// A closed, locked phone showing the lock screen.
    pub fn new(locale: Locale, max_depth: usize, now: Timestamp) -> Self {
        let mut store = NavStore {
            state: PhoneState {
                is_open: false,
                is_locked: true,
                locale,
                nav_stack: Vec::new(),
                sheet: None,
                modal: None,
                last_interaction_at: now,
            },
            next_key: 0,
            max_depth: max_depth.max(1),
        };
        store.reset_to(Route::Locked);
        store
    }

    pub fn state(&self) -> &PhoneState { &self.state }

    pub fn current_route(&self) -> &Route { current_route(&self.state) }

    pub fn max_depth(&self) -> usize { self.max_depth }

    pub fn dispatch(&mut self, action: Action, now: Timestamp) {
        trace!(action = <&'static str>::from(&action), "dispatch");
        match action {
            Action::OpenPhone => self.state.is_open = true,
            Action::ClosePhone => {
                self.state.is_open = false;
                self.state.is_locked = true;
                self.reset_to(Route::Locked);
            }
            Action::LockPhone => {
                self.state.is_locked = true;
                self.reset_to(Route::Locked);
            }
            Action::UnlockPhone | Action::GoHome => {
                self.state.is_locked = false;
                self.reset_to(Route::Home);
            }
            Action::OpenApp { app_id, view, params } => {
                self.state.is_locked = false;
                self.push(Route::App { app_id, view, params });
            }
            Action::PushRoute(route) => self.push(route),
            Action::PopRoute => self.pop(),
            Action::SetLocale(locale) => self.state.locale = locale,
            Action::SetSheet(sheet) => self.state.sheet = sheet,
            Action::SetModal(modal) => self.state.modal = modal,
            Action::Touch => {}
        }
        self.state.last_interaction_at = now;
        debug_assert!(!self.state.nav_stack.is_empty());
    }

    fn entry(&mut self, route: Route) -> NavEntry {
        self.next_key += 1;
        NavEntry { key: self.next_key, route }
    }

    fn clear_overlays(&mut self) {
        self.state.sheet = None;
        self.state.modal = None;
    }

    fn reset_to(&mut self, route: Route) {
        let entry = self.entry(route);
        self.state.nav_stack.clear();
        self.state.nav_stack.push(entry);
        self.clear_overlays();
    }

    fn push(&mut self, route: Route) {
        let entry = self.entry(route);
        while self.state.nav_stack.len() >= self.max_depth {
            let evicted = self.state.nav_stack.remove(0);
            trace!(key = evicted.key, "evicting oldest nav entry");
        }
        self.state.nav_stack.push(entry);
        self.clear_overlays();
    }

    fn pop(&mut self) {
        if self.state.nav_stack.len() > 1 {
            self.state.nav_stack.pop();
        } else {
            let base = if self.state.is_locked { Route::Locked } else { Route::Home };
            let entry = self.entry(base);
            self.state.nav_stack.clear();
            self.state.nav_stack.push(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    const T0: Timestamp = Timestamp(1_000);

    fn store() -> NavStore { NavStore::new(Locale::En, DEFAULT_MAX_STACK_DEPTH, T0) }

    fn routes(store: &NavStore) -> Vec<Route> { store.state().routes().cloned().collect() }

    fn sheet() -> SheetState {
        SheetState {
            id: "share".into(),
            title: None,
            payload: Value::Null,
        }
    }

    #[test]
    fn starts_closed_and_locked() {
        let store = store();
        assert!(!store.state().is_open);
        assert!(store.state().is_locked);
        assert_eq!(routes(&store), vec![Route::Locked]);
    }

    #[test]
    fn open_leaves_stack_alone() {
        let mut store = store();
        store.dispatch(Action::OpenPhone, T0);
        assert!(store.state().is_open);
        assert!(store.state().is_locked);
        assert_eq!(routes(&store), vec![Route::Locked]);
    }

    #[test]
    fn close_locks_and_resets() {
        let mut store = store();
        store.dispatch(Action::OpenPhone, T0);
        store.dispatch(Action::open_app("music"), T0);
        store.dispatch(Action::SetSheet(Some(sheet())), T0);
        store.dispatch(Action::ClosePhone, T0);
        let state = store.state();
        assert!(!state.is_open);
        assert!(state.is_locked);
        assert!(state.sheet.is_none());
        assert_eq!(routes(&store), vec![Route::Locked]);
    }

    #[test]
    fn lock_keeps_open_flag() {
        let mut store = store();
        store.dispatch(Action::OpenPhone, T0);
        store.dispatch(Action::UnlockPhone, T0);
        store.dispatch(Action::LockPhone, T0);
        assert!(store.state().is_open);
        assert!(store.state().is_locked);
        assert_eq!(routes(&store), vec![Route::Locked]);
    }

    #[test]
    fn unlock_and_home_reset_to_home() {
        let mut store = store();
        store.dispatch(Action::UnlockPhone, T0);
        assert!(!store.state().is_locked);
        assert_eq!(routes(&store), vec![Route::Home]);

        store.dispatch(Action::open_app("notes"), T0);
        store.dispatch(Action::open_app("music"), T0);
        store.dispatch(Action::GoHome, T0);
        assert_eq!(routes(&store), vec![Route::Home]);
    }

    #[test]
    fn open_app_then_pop_is_symmetric() {
        let mut store = store();
        store.dispatch(Action::UnlockPhone, T0);
        let before = routes(&store);

        store.dispatch(Action::open_app("music"), T0);
        assert_eq!(routes(&store), vec![Route::Home, Route::app("music")]);

        store.dispatch(Action::PopRoute, T0);
        assert_eq!(routes(&store), before);
    }

    #[test]
    fn open_app_unlocks_and_clears_overlays() {
        let mut store = store();
        store.dispatch(
            Action::SetModal(Some(ModalState {
                id: "confirm".into(),
                title: None,
                body: None,
                dismissible: true,
            })),
            T0,
        );
        store.dispatch(Action::open_app("camera"), T0);
        assert!(!store.state().is_locked);
        assert!(store.state().modal.is_none());
        assert_eq!(routes(&store), vec![Route::Locked, Route::app("camera")]);
    }

    #[test]
    fn pop_at_depth_one_falls_back_by_lock_flag() {
        let mut store = store();
        store.dispatch(Action::PopRoute, T0);
        assert_eq!(routes(&store), vec![Route::Locked]);

        store.dispatch(Action::UnlockPhone, T0);
        store.dispatch(Action::PopRoute, T0);
        assert_eq!(routes(&store), vec![Route::Home]);

        // Pushing a locked route while unlocked and popping lands on home.
        store.dispatch(Action::PushRoute(Route::Locked), T0);
        store.dispatch(Action::PopRoute, T0);
        store.dispatch(Action::PopRoute, T0);
        assert_eq!(routes(&store), vec![Route::Home]);
    }

    #[test]
    fn pop_does_not_touch_overlays() {
        let mut store = store();
        store.dispatch(Action::UnlockPhone, T0);
        store.dispatch(Action::SetSheet(Some(sheet())), T0);
        store.dispatch(Action::PopRoute, T0);
        assert!(store.state().sheet.is_some());
    }

    #[test]
    fn field_setters_only_touch_their_field() {
        let mut store = store();
        store.dispatch(Action::UnlockPhone, T0);
        let before = store.state().clone();
        store.dispatch(Action::SetLocale(Locale::Es), T0);
        store.dispatch(Action::SetSheet(Some(sheet())), T0);
        store.dispatch(Action::Touch, T0);
        let after = store.state();
        assert_eq!(after.locale, Locale::Es);
        assert_eq!(after.sheet, Some(sheet()));
        assert_eq!(after.nav_stack, before.nav_stack);
        assert_eq!(after.is_locked, before.is_locked);
        assert_eq!(after.is_open, before.is_open);
    }

    #[test]
    fn every_action_refreshes_interaction_time() {
        let mut store = store();
        store.dispatch(Action::Touch, Timestamp(5_000));
        assert_eq!(store.state().last_interaction_at, Timestamp(5_000));
        store.dispatch(Action::PopRoute, Timestamp(9_000));
        assert_eq!(store.state().last_interaction_at, Timestamp(9_000));
    }

    #[test]
    fn locked_flag_survives_app_on_stack_top() {
        let mut store = store();
        store.dispatch(Action::open_app("music"), T0);
        store.dispatch(Action::PushRoute(Route::app("notes")), T0);
        store.dispatch(Action::LockPhone, T0);
        assert!(store.state().is_locked);
        assert_eq!(store.current_route(), &Route::Locked);
    }

    #[test]
    fn keys_are_unique_per_store() {
        let mut a = store();
        let b = store();
        a.dispatch(Action::UnlockPhone, T0);
        a.dispatch(Action::open_app("music"), T0);
        a.dispatch(Action::open_app("music"), T0);
        let keys: Vec<u64> = a.state().nav_stack.iter().map(|e| e.key).collect();
        assert_eq!(keys.len(), 3);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        // A second store starts its own sequence.
        assert_eq!(b.state().nav_stack[0].key, 1);
    }

    #[test]
    fn stack_depth_is_bounded_by_evicting_oldest() {
        let mut store = NavStore::new(Locale::En, 3, T0);
        store.dispatch(Action::UnlockPhone, T0);
        for app in ["a", "b", "c", "d"] {
            store.dispatch(Action::open_app(app), T0);
        }
        assert_eq!(
            routes(&store),
            vec![Route::app("b"), Route::app("c"), Route::app("d")]
        );
    }

    #[test]
    fn current_route_falls_back_when_stack_is_empty() {
        let mut state = store().state().clone();
        state.nav_stack.clear();
        assert_eq!(current_route(&state), &Route::Locked);
        state.is_locked = false;
        assert_eq!(current_route(&state), &Route::Home);
    }

    #[test]
    fn stack_is_never_empty_over_action_sequences() {
        let actions = [
            Action::OpenPhone,
            Action::ClosePhone,
            Action::LockPhone,
            Action::UnlockPhone,
            Action::GoHome,
            Action::open_app("music"),
            Action::PushRoute(Route::Home),
            Action::PopRoute,
            Action::PopRoute,
            Action::SetLocale(Locale::Es),
            Action::SetSheet(None),
            Action::SetModal(None),
            Action::Touch,
        ];
        // Fixed-seed LCG picks the action sequence.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut store = NavStore::new(Locale::En, 4, T0);
        for step in 0..5_000u64 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let action = actions[(seed >> 33) as usize % actions.len()].clone();
            store.dispatch(action, Timestamp(step));
            assert!(!store.state().nav_stack.is_empty());
            assert!(store.state().depth() <= store.max_depth());
        }
    }
}
