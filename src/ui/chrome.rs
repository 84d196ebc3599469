//! Status bar and navigation controls around the current screen.

use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;

use crate::model::nav::{Action, current_route};
use crate::model::{PhoneState, RouteKind};
use crate::sys::time::Timestamp;

const SIGNAL: &str = "▂▄▆█";
const WIFI: &str = "◠";
const BATTERY: &str = "▮▮▮▯";

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StatusBar {
    pub clock: String,
    pub signal: &'static str,
    pub wifi: &'static str,
    pub battery: &'static str,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChromeView {
    pub status: StatusBar,
    pub back: bool,
    pub home: bool,
    pub home_indicator: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromeControl {
    Back,
    Home,
}

impl ChromeControl {
    pub fn action(self) -> Action {
        match self {
            ChromeControl::Back => Action::PopRoute,
            ChromeControl::Home => Action::GoHome,
        }
    }

    /// Whether the control is drawn for `state`.
    pub fn shown(self, state: &PhoneState) -> bool {
        let kind = current_route(state).kind();
        match self {
            ChromeControl::Back => state.depth() > 1 || kind == RouteKind::App,
            ChromeControl::Home => !state.is_locked && kind != RouteKind::Home,
        }
    }
}

pub fn format_clock<Tz: TimeZone>(at: &DateTime<Tz>, hour12: bool) -> String
where Tz::Offset: std::fmt::Display {
    if hour12 {
        at.format("%-I:%M %p").to_string()
    } else {
        at.format("%H:%M").to_string()
    }
}

/// Clock text for `now` in the local timezone.
pub fn clock_label(now: Timestamp, hour12: bool) -> String {
    match Local.timestamp_millis_opt(now.0 as i64).single() {
        Some(at) => format_clock(&at, hour12),
        None => "--:--".to_string(),
    }
}

pub fn chrome(state: &PhoneState, clock: String) -> ChromeView {
    let back = ChromeControl::Back.shown(state);
    let home = ChromeControl::Home.shown(state);
    ChromeView {
        status: StatusBar {
            clock,
            signal: SIGNAL,
            wifi: WIFI,
            battery: BATTERY,
        },
        back,
        home,
        home_indicator: home,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use test_log::test;

    use super::*;
    use crate::model::nav::DEFAULT_MAX_STACK_DEPTH;
    use crate::model::{Locale, NavEntry, NavStore, Route};

    const T0: Timestamp = Timestamp(0);

    #[test]
    fn clock_formats() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 21, 7, 0).unwrap();
        assert_eq!(format_clock(&at, false), "21:07");
        assert_eq!(format_clock(&at, true), "9:07 PM");
    }

    #[test]
    fn controls_follow_route() {
        let mut store = NavStore::new(Locale::En, DEFAULT_MAX_STACK_DEPTH, T0);
        let locked = chrome(store.state(), String::new());
        assert!(!locked.back && !locked.home && !locked.home_indicator);

        store.dispatch(Action::UnlockPhone, T0);
        let home = chrome(store.state(), String::new());
        assert!(!home.back && !home.home);

        store.dispatch(Action::open_app("music"), T0);
        let app = chrome(store.state(), String::new());
        assert!(app.back && app.home && app.home_indicator);
        assert!(ChromeControl::Back.shown(store.state()));
        store.dispatch(Action::LockPhone, T0);
        assert!(!ChromeControl::Home.shown(store.state()));
        assert_eq!(ChromeControl::Back.action(), Action::PopRoute);
        assert_eq!(ChromeControl::Home.action(), Action::GoHome);
    }

    #[test]
    fn back_shows_for_single_app_entry() {
        let mut store = NavStore::new(Locale::En, DEFAULT_MAX_STACK_DEPTH, T0);
        store.dispatch(Action::UnlockPhone, T0);
        let mut state = store.state().clone();
        state.nav_stack = vec![NavEntry { key: 1, route: Route::app("music") }];
        let view = chrome(&state, String::new());
        assert!(view.back);
        assert!(view.home);
    }
}
