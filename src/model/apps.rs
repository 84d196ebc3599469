//! The closed registry of phone apps and their deferred instantiation.
//!
//! Apps are looked up by id in [`APPS`]; an id missing from the table is a
//! normal "not found" result, never a panic. App views are built the first
//! time something navigates to them, through [`AppCache`].

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use strum::Display;
use tracing::debug;

use super::content::ArtistContent;
use super::locale::Locale;
use crate::common::collections::HashMap;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LaunchAnimation {
    Zoom,
    SlideUp,
    Fade,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Labels {
    pub en: &'static str,
    pub es: &'static str,
}

impl Labels {
    pub fn get(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => self.en,
            Locale::Es => self.es,
        }
    }
}

pub type AppLoader = fn(&'static AppDefinition) -> Arc<dyn AppView>;

#[derive(Serialize)]
pub struct AppDefinition {
    pub id: &'static str,
    pub labels: Labels,
    pub icon: &'static str,
    /// Lower sorts first on the home grid.
    pub priority: u8,
    pub launch_animation: LaunchAnimation,
    /// Named sub-views the app understands; anything else shows its main view.
    pub views: &'static [&'static str],
    #[serde(skip)]
    pub loader: AppLoader,
}

impl fmt::Debug for AppDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppDefinition").field("id", &self.id).finish_non_exhaustive()
    }
}

/// What an app shows for one navigation frame.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AppFrame {
    pub title: String,
    pub view: Option<String>,
    pub items: Vec<String>,
}

pub trait AppView: Send + Sync + fmt::Debug {
    fn id(&self) -> &'static str;

    fn render(
        &self,
        view: Option<&str>,
        params: Option<&Value>,
        locale: Locale,
        content: &ArtistContent,
    ) -> AppFrame;
}

/// Generic leaf view. The real screens are supplied by the host front end;
/// this one renders the content lists each app would show.
#[derive(Debug)]
struct LeafApp {
    def: &'static AppDefinition,
}

impl LeafApp {
    fn load(def: &'static AppDefinition) -> Arc<dyn AppView> { Arc::new(LeafApp { def }) }
}

impl AppView for LeafApp {
    fn id(&self) -> &'static str { self.def.id }

    fn render(
        &self,
        view: Option<&str>,
        params: Option<&Value>,
        locale: Locale,
        content: &ArtistContent,
    ) -> AppFrame {
        let view = view.filter(|v| self.def.views.contains(v)).map(str::to_owned);
        let mut items: Vec<String> = match self.def.id {
            "music" => content.tracks.iter().map(|t| t.title.clone()).collect(),
            "releases" => content
                .releases
                .iter()
                .map(|r| match r.year {
                    Some(year) => format!("{} ({year})", r.title),
                    None => r.title.clone(),
                })
                .collect(),
            "photos" | "gallery" => content
                .photos
                .iter()
                .map(|p| p.caption.clone().unwrap_or_else(|| p.url.clone()))
                .collect(),
            "messages" => content.messages.iter().map(|m| format!("{}: {}", m.from, m.body)).collect(),
            "notes" => content.notes.iter().map(|n| n.title.clone()).collect(),
            "contacts" => content.collaborators.iter().map(|c| c.name.clone()).collect(),
            _ => Vec::new(),
        };
        if let Some(filter) = params.and_then(|p| p.get("filter")).and_then(Value::as_str) {
            let needle = filter.to_lowercase();
            items.retain(|item| item.to_lowercase().contains(&needle));
        }
        AppFrame {
            title: self.def.labels.get(locale).to_owned(),
            view,
            items,
        }
    }
}

macro_rules! app {
    ($id:literal, $en:literal, $es:literal, $icon:literal, $prio:literal, $anim:ident, [$($view:literal),*]) => {
        AppDefinition {
            id: $id,
            labels: Labels { en: $en, es: $es },
            icon: $icon,
            priority: $prio,
            launch_animation: LaunchAnimation::$anim,
            views: &[$($view),*],
            loader: LeafApp::load,
        }
    };
}

pub static APPS: &[AppDefinition] = &[
    app!("music", "Music", "Música", "♪", 0, Zoom, ["library", "now-playing"]),
    app!("messages", "Messages", "Mensajes", "✉", 1, SlideUp, ["thread"]),
    app!("photos", "Photos", "Fotos", "▣", 2, Zoom, ["album", "viewer"]),
    app!("releases", "Releases", "Lanzamientos", "◎", 3, Zoom, ["detail"]),
    app!("notes", "Notes", "Notas", "✎", 4, SlideUp, ["note"]),
    app!("camera", "Camera", "Cámara", "◉", 5, Fade, []),
    app!("calendar", "Calendar", "Calendario", "▦", 6, Zoom, ["day"]),
    app!("contacts", "Contacts", "Contactos", "☺", 7, SlideUp, ["detail"]),
    app!("gallery", "Gallery", "Galería", "▤", 8, Zoom, ["viewer"]),
    app!("phone", "Phone", "Teléfono", "✆", 9, SlideUp, ["keypad", "recents"]),
    app!("maps", "Maps", "Mapas", "⌖", 10, Zoom, []),
    app!("weather", "Weather", "Clima", "☀", 11, Fade, []),
    app!("clock", "Clock", "Reloj", "◷", 12, Fade, ["timer", "stopwatch"]),
    app!("calculator", "Calculator", "Calculadora", "±", 13, Zoom, []),
    app!("settings", "Settings", "Ajustes", "⚙", 14, SlideUp, ["language", "about"]),
];

pub fn lookup(id: &str) -> Option<&'static AppDefinition> { APPS.iter().find(|app| app.id == id) }

/// Apps in home-grid order.
pub fn home_grid() -> Vec<&'static AppDefinition> {
    let mut apps: Vec<_> = APPS.iter().collect();
    apps.sort_by_key(|app| app.priority);
    apps
}

#[derive(Debug, Clone)]
enum Slot {
    Loading,
    Ready(Arc<dyn AppView>),
}

#[derive(Debug, Clone)]
pub enum Resolved {
    NotFound,
    Loading(&'static AppDefinition),
    Ready(&'static AppDefinition, Arc<dyn AppView>),
}

/// Instantiates app views on first navigation and keeps them for reuse.
#[derive(Debug, Default)]
pub struct AppCache {
    slots: HashMap<&'static str, Slot>,
}

impl AppCache {
    pub fn new() -> Self { Self::default() }

    /// Starts loading `id` if it is registered and not yet loaded.
    pub fn request(&mut self, id: &str) -> Resolved {
        let Some(def) = lookup(id) else {
            debug!(id, "requested unregistered app");
            return Resolved::NotFound;
        };
        self.slots.entry(def.id).or_insert_with(|| {
            debug!(id = def.id, "loading app");
            Slot::Loading
        });
        self.resolve(id)
    }

    pub fn resolve(&self, id: &str) -> Resolved {
        let Some(def) = lookup(id) else {
            return Resolved::NotFound;
        };
        match self.slots.get(def.id) {
            Some(Slot::Ready(view)) => Resolved::Ready(def, view.clone()),
            Some(Slot::Loading) | None => Resolved::Loading(def),
        }
    }

    /// Completes every pending load. Returns how many finished.
    pub fn poll(&mut self) -> usize {
        let mut finished = 0;
        for (id, slot) in self.slots.iter_mut() {
            if matches!(slot, Slot::Loading) {
                // Pending slots only exist for registered ids.
                if let Some(def) = lookup(id) {
                    *slot = Slot::Ready((def.loader)(def));
                    finished += 1;
                }
            }
        }
        finished
    }

    pub fn is_loading(&self, id: &str) -> bool { matches!(self.slots.get(id), Some(Slot::Loading)) }

    pub fn any_loading(&self) -> bool { self.slots.values().any(|s| matches!(s, Slot::Loading)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::collections::HashSet;

    #[test]
    fn registry_ids_are_unique() {
        let mut seen = HashSet::default();
        for app in APPS {
            assert!(seen.insert(app.id), "duplicate app id {}", app.id);
        }
        assert_eq!(APPS.len(), 15);
    }

    #[test]
    fn lookup_has_explicit_not_found() {
        assert_eq!(lookup("music").map(|a| a.id), Some("music"));
        assert!(lookup("tetris").is_none());
    }

    #[test]
    fn home_grid_is_sorted_by_priority() {
        let grid = home_grid();
        assert!(grid.windows(2).all(|w| w[0].priority <= w[1].priority));
        assert_eq!(grid[0].id, "music");
    }

    #[test]
    fn cache_defers_instantiation_until_polled() {
        let mut cache = AppCache::new();
        assert!(!cache.any_loading());
        assert!(matches!(cache.request("music"), Resolved::Loading(def) if def.id == "music"));
        assert!(cache.is_loading("music"));
        assert_eq!(cache.poll(), 1);
        assert!(!cache.is_loading("music"));
        assert!(matches!(cache.resolve("music"), Resolved::Ready(_, view) if view.id() == "music"));
        // Second request reuses the loaded view.
        assert!(matches!(cache.request("music"), Resolved::Ready(..)));
        assert_eq!(cache.poll(), 0);
    }

    #[test]
    fn cache_reports_unregistered_ids() {
        let mut cache = AppCache::new();
        assert!(matches!(cache.request("tetris"), Resolved::NotFound));
        assert!(!cache.any_loading());
    }

    #[test]
    fn leaf_app_renders_content_in_locale() {
        let def = lookup("music").unwrap();
        let view = (def.loader)(def);
        let content = ArtistContent::bundled();
        let frame = view.render(Some("library"), None, Locale::Es, &content);
        assert_eq!(frame.title, "Música");
        assert_eq!(frame.view.as_deref(), Some("library"));
        assert_eq!(frame.items.len(), content.tracks.len());

        let unknown_view = view.render(Some("karaoke"), None, Locale::En, &content);
        assert_eq!(unknown_view.view, None);
    }

    #[test]
    fn leaf_app_filters_by_param() {
        let def = lookup("music").unwrap();
        let view = (def.loader)(def);
        let params = serde_json::json!({ "filter": "neon" });
        let frame = view.render(None, Some(&params), Locale::En, &ArtistContent::bundled());
        assert_eq!(frame.items, vec!["Neon Tide".to_string()]);
    }
}
