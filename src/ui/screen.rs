//! Picks which screen the phone shows for the current navigation state.

use serde::Serialize;

use crate::actor::gesture::SwipeUnlock;
use crate::model::apps::{self, AppFrame, LaunchAnimation};
use crate::model::nav::current_route;
use crate::model::{AppCache, ArtistContent, Locale, PhoneState, Resolved, Route, RouteKind};

/// Identifies a screen for enter/exit transitions.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TransitionKey {
    pub kind: RouteKind,
    pub app_id: Option<String>,
    pub view: Option<String>,
    pub depth: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HomeIcon {
    pub id: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum ScreenView {
    Lock {
        drag_offset: f64,
        chrome_opacity: f64,
    },
    Home {
        apps: Vec<HomeIcon>,
    },
    App {
        app_id: String,
        launch_animation: LaunchAnimation,
        frame: AppFrame,
    },
    AppLoading {
        app_id: String,
        label: String,
    },
    /// The route names an app that is not in the registry.
    Unavailable {
        app_id: String,
    },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RoutedScreen {
    pub key: TransitionKey,
    pub view: ScreenView,
}

pub fn home_icons(locale: Locale) -> Vec<HomeIcon> {
    apps::home_grid()
        .into_iter()
        .map(|app| HomeIcon {
            id: app.id,
            label: app.labels.get(locale),
            icon: app.icon,
        })
        .collect()
}

/// The lock flag always wins over whatever is on top of the stack.
pub fn route_screen(
    state: &PhoneState,
    apps: &AppCache,
    content: &ArtistContent,
    swipe: &SwipeUnlock,
) -> RoutedScreen {
    let route = current_route(state);
    let depth = state.depth();
    let lock = || RoutedScreen {
        key: TransitionKey { kind: RouteKind::Locked, app_id: None, view: None, depth },
        view: ScreenView::Lock {
            drag_offset: swipe.drag_offset(),
            chrome_opacity: swipe.chrome_opacity(),
        },
    };
    if state.is_locked {
        return lock();
    }
    let key = TransitionKey {
        kind: route.kind(),
        app_id: route.app_id().map(str::to_owned),
        view: route.view().map(str::to_owned),
        depth,
    };
    let view = match route {
        Route::Locked => return lock(),
        Route::Home => ScreenView::Home { apps: home_icons(state.locale) },
        Route::App { app_id, view, params } => match apps.resolve(app_id) {
            Resolved::NotFound => ScreenView::Unavailable { app_id: app_id.clone() },
            Resolved::Loading(def) => ScreenView::AppLoading {
                app_id: app_id.clone(),
                label: def.labels.get(state.locale).to_owned(),
            },
            Resolved::Ready(def, app) => ScreenView::App {
                app_id: app_id.clone(),
                launch_animation: def.launch_animation,
                frame: app.render(view.as_deref(), params.as_ref(), state.locale, content),
            },
        },
    };
    RoutedScreen { key, view }
}
