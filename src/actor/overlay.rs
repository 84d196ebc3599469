//! The phone overlay controller.
//!
//! Owns the navigation store and applies everything that feeds it: user
//! actions, keyboard and pointer input, host language changes, the visibility
//! policy, the idle timer and the one-shot content fetch. All state changes
//! funnel through [`OverlayController::dispatch`] in arrival order.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace};

use super::content::{self, ContentError, ContentFuture, ContentSource};
use super::dock::{DockLayout, DockMonitor, DockOffset};
use super::gesture::{PointerEvent, SwipeUnlock};
use super::visibility::{HiddenReason, VisibilityMonitor, VisibilityPolicy};
use crate::actor;
use crate::common::config::Config;
use crate::model::nav::Action;
use crate::model::{AppCache, ArtistContent, Locale, ModalState, NavStore, PhoneState, Route, RouteKind, SheetState};
use crate::sys::host::HostSurface;
use crate::sys::time::Clock;
use crate::ui::chrome::{ChromeControl, clock_label};
use crate::ui::hosts::{self, Dismiss};
use crate::ui::{self, Frame, FrameInputs};


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    pub key: String,
    /// The key went to a text field inside an app.
    pub editable_target: bool,
    pub with_modifier: bool,
}

impl KeyPress {
    pub fn new(key: impl Into<String>) -> Self {
        KeyPress {
            key: key.into(),
            editable_target: false,
            with_modifier: false,
        }
    }
}

#[derive(Debug)]
pub enum Event {
    Dispatch(Action),
    HostLanguageChanged(String),
    Key(KeyPress),
    Pointer(PointerEvent),
    Dismiss(Dismiss),
    Control(ChromeControl),
    Query(oneshot::Sender<Snapshot>),
    Shutdown,
}

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub state: PhoneState,
    pub route: Route,
    pub content_loading: bool,
    pub app_loading: bool,
    pub policy: VisibilityPolicy,
    pub frame: Frame,
}

/// Channels the controller listens to besides its own event queue.
pub struct Inputs {
    pub policy: watch::Receiver<VisibilityPolicy>,
    pub dock: watch::Receiver<DockLayout>,
    pub content: Option<Arc<dyn ContentSource>>,
}

pub struct OverlayController {
    config: Config,
    clock: Arc<dyn Clock>,
    store: NavStore,
    apps: AppCache,
    content: ArtistContent,
    content_loading: bool,
    locale_overridden: bool,
    policy: VisibilityPolicy,
    dock: DockLayout,
    swipe: SwipeUnlock,
    open_tx: watch::Sender<bool>,
    frame_tx: watch::Sender<Frame>,
}

impl OverlayController {
    pub fn new(config: Config, clock: Arc<dyn Clock>, host_language: Option<&str>) -> Self {
        let settings = &config.settings;
        let locale = match host_language {
            Some(tag) => Locale::from_language_tag(tag),
            None => settings.default_locale,
        };
        let store = NavStore::new(locale, settings.navigation.max_stack_depth, clock.now());
        let swipe = SwipeUnlock::new(settings.gesture.unlock_threshold);
        let dock = DockLayout {
            hidden: false,
            offset: DockOffset::default_for(&settings.dock),
        };
        let (open_tx, _) = watch::channel(false);
        let (frame_tx, _) = watch::channel(Frame { launcher: None, phone: None });
        let mut this = OverlayController {
            config,
            clock,
            store,
            apps: AppCache::new(),
            content: ArtistContent::bundled(),
            content_loading: false,
            locale_overridden: false,
            policy: VisibilityPolicy::ENABLED,
            dock,
            swipe,
            open_tx,
            frame_tx,
        };
        this.publish();
        this
    }

    pub fn state(&self) -> &PhoneState { self.store.state() }

    pub fn current_route(&self) -> &Route { self.store.current_route() }

    pub fn content(&self) -> &ArtistContent { &self.content }

    pub fn content_loading(&self) -> bool { self.content_loading }

    pub fn policy(&self) -> VisibilityPolicy { self.policy }

    pub fn locale_overridden(&self) -> bool { self.locale_overridden }

    /// Whether the app on top of the stack is still being instantiated.
    pub fn app_loading(&self) -> bool {
        self.store.current_route().app_id().is_some_and(|id| self.apps.is_loading(id))
    }

    pub fn subscribe_open(&self) -> watch::Receiver<bool> { self.open_tx.subscribe() }

    pub fn subscribe_frames(&self) -> watch::Receiver<Frame> { self.frame_tx.subscribe() }

    pub fn open(&mut self) { self.dispatch(Action::OpenPhone) }

    pub fn close(&mut self) { self.dispatch(Action::ClosePhone) }

    pub fn lock(&mut self) { self.dispatch(Action::LockPhone) }

    pub fn unlock(&mut self) { self.dispatch(Action::UnlockPhone) }

    pub fn go_home(&mut self) { self.dispatch(Action::GoHome) }

    pub fn open_app(&mut self, app_id: &str, view: Option<&str>, params: Option<Value>) {
        self.dispatch(Action::OpenApp {
            app_id: app_id.to_owned(),
            view: view.map(str::to_owned),
            params,
        })
    }

    pub fn push_route(&mut self, route: Route) { self.dispatch(Action::PushRoute(route)) }

    pub fn pop_route(&mut self) { self.dispatch(Action::PopRoute) }

    /// Setting the locale from inside the phone stops host language sync for good.
    pub fn set_locale(&mut self, locale: Locale) { self.dispatch(Action::SetLocale(locale)) }

    pub fn set_sheet(&mut self, sheet: Option<SheetState>) { self.dispatch(Action::SetSheet(sheet)) }

    pub fn set_modal(&mut self, modal: Option<ModalState>) { self.dispatch(Action::SetModal(modal)) }

    pub fn touch(&mut self) { self.dispatch(Action::Touch) }

    /// Applies a user-originated action.
    pub fn dispatch(&mut self, action: Action) {
        if matches!(action, Action::SetLocale(_)) && !self.locale_overridden {
            debug!("locale set by user, no longer following host language");
            self.locale_overridden = true;
        }
        self.apply(action);
    }

    fn apply(&mut self, action: Action) {
        self.store.dispatch(action, self.clock.now());
        self.sync();
    }

    /// Brings everything derived from the store in line after a change.
    fn sync(&mut self) {
        if self.store.state().is_open && self.policy.reason == Some(HiddenReason::RouteExcluded) {
            info!("route excluded, closing phone");
            self.store.dispatch(Action::ClosePhone, self.clock.now());
        }
        if !self.on_lock_screen() {
            self.swipe.reset();
        }
        if let Some(app_id) = self.store.current_route().app_id() {
            self.apps.request(app_id);
        }
        let is_open = self.store.state().is_open;
        self.open_tx.send_if_modified(|open| std::mem::replace(open, is_open) != is_open);
    }

    fn on_lock_screen(&self) -> bool {
        let state = self.store.state();
        state.is_open && (state.is_locked || self.store.current_route().kind() == RouteKind::Locked)
    }

    #[instrument(name = "overlay::handle_event", skip(self))]
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Dispatch(action) => self.dispatch(action),
            Event::HostLanguageChanged(tag) => self.on_host_language(&tag),
            Event::Key(key) => {
                self.handle_key(&key);
            }
            Event::Pointer(pointer) => self.handle_pointer(pointer),
            Event::Dismiss(how) => {
                self.dismiss(how);
            }
            Event::Control(control) => {
                self.press(control);
            }
            Event::Query(reply) => {
                // The asker may have given up waiting.
                _ = reply.send(self.snapshot());
            }
            Event::Shutdown => {}
        }
    }

    /// Returns whether the key was consumed.
    pub fn handle_key(&mut self, key: &KeyPress) -> bool {
        if !self.store.state().is_open {
            return false;
        }
        let keys = &self.config.keys;
        let closes = keys.close.contains(&key.key);
        let goes_home = keys.home.contains(&key.key);
        if closes {
            self.apply(Action::ClosePhone);
            return true;
        }
        if goes_home {
            if key.editable_target || key.with_modifier {
                trace!(key = %key.key, "home key typed into a field");
                return false;
            }
            self.apply(Action::GoHome);
            return true;
        }
        false
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        if !self.store.state().is_open {
            return;
        }
        if matches!(event, PointerEvent::Down { .. }) {
            self.apply(Action::Touch);
        }
        if self.on_lock_screen() && self.swipe.handle(event) {
            debug!("unlocked by swipe");
            self.apply(Action::UnlockPhone);
        }
    }

    /// Dismisses the sheet or modal. Returns whether anything was dismissed.
    pub fn dismiss(&mut self, how: Dismiss) -> bool {
        if !self.store.state().is_open {
            return false;
        }
        match hosts::dismiss(self.store.state(), how) {
            Some(action) => {
                self.apply(action);
                true
            }
            None => {
                trace!(?how, "nothing to dismiss");
                false
            }
        }
    }

    /// Presses a back or home control. Controls that are not drawn do nothing.
    pub fn press(&mut self, control: ChromeControl) -> bool {
        let state = self.store.state();
        if !state.is_open || !control.shown(state) {
            trace!(?control, "control not shown");
            return false;
        }
        self.apply(control.action());
        true
    }

    pub fn on_host_language(&mut self, tag: &str) {
        if self.locale_overridden {
            trace!(tag, "host language ignored, locale was set by user");
            return;
        }
        let locale = Locale::from_language_tag(tag);
        if locale != self.store.state().locale {
            debug!(%locale, "following host language");
            self.apply(Action::SetLocale(locale));
        }
    }

    /// An excluded route keeps the phone closed for as long as it lasts.
    pub fn on_policy(&mut self, policy: VisibilityPolicy) {
        self.policy = policy;
        self.sync();
    }

    pub fn on_dock(&mut self, dock: DockLayout) { self.dock = dock; }

    /// Closes the phone once it has been left alone for the idle timeout.
    /// Returns whether it closed.
    pub fn idle_tick(&mut self) -> bool {
        let state = self.store.state();
        if !state.is_open {
            return false;
        }
        let idle_for = self.clock.now().millis_since(state.last_interaction_at);
        if idle_for < self.config.settings.idle.timeout_ms {
            return false;
        }
        info!(idle_for, "closing idle phone");
        self.apply(Action::ClosePhone);
        true
    }

    pub fn content_loaded(&mut self, result: Result<ArtistContent, ContentError>) {
        self.content_loading = false;
        match result {
            Ok(content) => {
                info!("loaded remote artist content");
                self.content = content;
            }
            Err(e) => info!("keeping bundled artist content: {e}"),
        }
    }

    /// Finishes pending app loads. Returns how many completed.
    pub fn poll_apps(&mut self) -> usize { self.apps.poll() }

    pub fn render(&self) -> Frame {
        ui::render(FrameInputs {
            state: self.store.state(),
            apps: &self.apps,
            content: &self.content,
            swipe: &self.swipe,
            policy: self.policy,
            dock: self.dock,
            clock: clock_label(self.clock.now(), self.config.settings.chrome.hour12),
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.store.state().clone(),
            route: self.store.current_route().clone(),
            content_loading: self.content_loading,
            app_loading: self.app_loading(),
            policy: self.policy,
            frame: self.render(),
        }
    }

    fn publish(&mut self) {
        let frame = self.render();
        self.frame_tx.send_if_modified(|current| {
            if *current == frame {
                return false;
            }
            *current = frame;
            true
        });
    }

    /// Starts the visibility and dock monitors and runs the controller on the
    /// current runtime until `token` is cancelled or a shutdown event arrives.
    pub fn spawn(
        self,
        host: Arc<dyn HostSurface>,
        route_rx: watch::Receiver<String>,
        content: Option<Arc<dyn ContentSource>>,
        token: CancellationToken,
    ) -> (OverlayHandle, watch::Receiver<Frame>, JoinHandle<()>) {
        let token = token.child_token();
        let settings = &self.config.settings;
        let policy =
            VisibilityMonitor::spawn(settings.visibility.clone(), host.clone(), route_rx, token.child_token());
        let dock = DockMonitor::spawn(
            settings.dock.clone(),
            Duration::from_millis(settings.visibility.frame_ms),
            host,
            policy.clone(),
            self.subscribe_open(),
            token.child_token(),
        );
        let frames = self.subscribe_frames();
        let (tx, rx) = actor::channel();
        let task = tokio::spawn(self.run(rx, Inputs { policy, dock, content }, token));
        (OverlayHandle(tx), frames, task)
    }

    #[instrument(name = "overlay", skip_all)]
    pub async fn run(mut self, mut events: Receiver, mut inputs: Inputs, token: CancellationToken) {
        let settings = &self.config.settings;
        let idle_every = Duration::from_millis(settings.idle.poll_ms.max(1));
        let clock_every = Duration::from_millis(settings.chrome.clock_refresh_ms.max(1));
        let mut idle = tokio::time::interval_at(Instant::now() + idle_every, idle_every);
        idle.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut clock = tokio::time::interval_at(Instant::now() + clock_every, clock_every);
        clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut fetch: Option<ContentFuture> = inputs.content.take().map(|source| {
            let fetch_token = token.child_token();
            Box::pin(async move { content::load(source.as_ref(), fetch_token).await }) as ContentFuture
        });
        self.content_loading = fetch.is_some();
        if fetch.is_none() {
            debug!("no content url configured, using bundled content");
        }

        let policy = *inputs.policy.borrow_and_update();
        self.on_policy(policy);
        let dock = *inputs.dock.borrow_and_update();
        self.on_dock(dock);
        self.publish();

        let mut policy_live = true;
        let mut dock_live = true;
        info!("overlay started");
        loop {
            let was_open = self.store.state().is_open;
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                event = events.recv() => match event {
                    Some((_, Event::Shutdown)) | None => break,
                    Some((span, event)) => {
                        let _guard = span.enter();
                        self.handle_event(event);
                    }
                },
                changed = inputs.policy.changed(), if policy_live => match changed {
                    Ok(()) => {
                        let policy = *inputs.policy.borrow_and_update();
                        self.on_policy(policy);
                    }
                    Err(_) => policy_live = false,
                },
                changed = inputs.dock.changed(), if dock_live => match changed {
                    Ok(()) => {
                        let dock = *inputs.dock.borrow_and_update();
                        self.on_dock(dock);
                    }
                    Err(_) => dock_live = false,
                },
                result = async {
                    match fetch.as_mut() {
                        Some(fetch) => fetch.await,
                        None => std::future::pending().await,
                    }
                }, if fetch.is_some() => {
                    fetch = None;
                    self.content_loaded(result);
                }
                _ = idle.tick(), if was_open => {
                    self.idle_tick();
                }
                _ = clock.tick(), if was_open => {}
                _ = tokio::task::yield_now(), if self.apps.any_loading() => {
                    let loaded = self.poll_apps();
                    trace!(loaded, "apps loaded");
                }
            }
            if !was_open && self.store.state().is_open {
                idle.reset();
            }
            self.publish();
        }
        if fetch.is_some() {
            info!("content fetch aborted by shutdown");
        }
        // Stops the monitors spawned alongside the controller.
        token.cancel();
        info!("overlay stopped");
    }
}

/// Cloneable handle for feeding a running controller.
#[derive(Debug, Clone)]
pub struct OverlayHandle(Sender);

impl OverlayHandle {
    pub fn dispatch(&self, action: Action) { self.0.send(Event::Dispatch(action)) }

    pub fn host_language(&self, tag: impl Into<String>) { self.0.send(Event::HostLanguageChanged(tag.into())) }

    pub fn key(&self, key: KeyPress) { self.0.send(Event::Key(key)) }

    pub fn pointer(&self, event: PointerEvent) { self.0.send(Event::Pointer(event)) }

    pub fn dismiss(&self, how: Dismiss) { self.0.send(Event::Dismiss(how)) }

    pub fn press(&self, control: ChromeControl) { self.0.send(Event::Control(control)) }

    pub fn shutdown(&self) { self.0.send(Event::Shutdown) }

    /// `None` once the controller has stopped.
    pub async fn snapshot(&self) -> Option<Snapshot> {
        let (tx, rx) = oneshot::channel();
        self.0.try_send(Event::Query(tx)).ok()?;
        rx.await.ok()
    }
}
