use serde::Serialize;

use crate::actor::dock::DockLayout;
use crate::actor::visibility::VisibilityPolicy;
use crate::model::Locale;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LauncherView {
    pub bottom: f64,
    pub right: f64,
    pub label: &'static str,
}

fn label(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Open phone",
        Locale::Es => "Abrir teléfono",
    }
}

pub fn launcher(policy: VisibilityPolicy, dock: DockLayout, locale: Locale) -> Option<LauncherView> {
    if !policy.enabled || dock.hidden {
        return None;
    }
    Some(LauncherView {
        bottom: dock.offset.bottom,
        right: dock.offset.right,
        label: label(locale),
    })
}
