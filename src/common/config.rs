use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::collections::HashSet;
use crate::model::locale::Locale;
use crate::model::nav::DEFAULT_MAX_STACK_DEPTH;

pub fn config_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("phone-shell").join("config.toml"))
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub keys: KeySettings,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Where to fetch artist content from. The bundled content is used when unset
    /// or when the fetch fails.
    #[serde(default)]
    pub content_url: Option<String>,
    /// Locale used until the host reports its language.
    #[serde(default)]
    pub default_locale: Locale,
    #[serde(default)]
    pub navigation: NavigationSettings,
    #[serde(default)]
    pub idle: IdleSettings,
    #[serde(default)]
    pub gesture: GestureSettings,
    #[serde(default)]
    pub visibility: VisibilitySettings,
    #[serde(default)]
    pub dock: DockSettings,
    #[serde(default)]
    pub chrome: ChromeSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            content_url: None,
            default_locale: Locale::En,
            navigation: NavigationSettings::default(),
            idle: IdleSettings::default(),
            gesture: GestureSettings::default(),
            visibility: VisibilitySettings::default(),
            dock: DockSettings::default(),
            chrome: ChromeSettings::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct NavigationSettings {
    /// Pushing past this depth evicts the oldest entry.
    #[serde(default = "default_max_stack_depth")]
    pub max_stack_depth: usize,
}

impl Default for NavigationSettings {
    fn default() -> Self { Self { max_stack_depth: default_max_stack_depth() } }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct IdleSettings {
    /// Close the phone after this long without interaction while open.
    #[serde(default = "default_idle_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_idle_poll_ms")]
    pub poll_ms: u64,
}

impl Default for IdleSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_idle_timeout_ms(),
            poll_ms: default_idle_poll_ms(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct GestureSettings {
    /// Upward drag distance (px) that unlocks the lock screen.
    #[serde(default = "default_unlock_threshold")]
    pub unlock_threshold: f64,
}

impl Default for GestureSettings {
    fn default() -> Self { Self { unlock_threshold: default_unlock_threshold() } }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct VisibilitySettings {
    /// Paths on which the phone never shows (exact match).
    #[serde(default = "default_excluded_routes")]
    pub excluded_routes: Vec<String>,
    /// Path prefixes on which the phone never shows. Matches the prefix itself
    /// and anything below it (`/admin` matches `/admin` and `/admin/events`).
    #[serde(default = "default_excluded_prefixes")]
    pub excluded_prefixes: Vec<String>,
    #[serde(default = "default_visibility_poll_ms")]
    pub fallback_poll_ms: u64,
    /// Coalescing window for layout change notifications.
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,
    #[serde(default)]
    pub fullscreen: FullscreenRule,
    #[serde(default)]
    pub drawer: DrawerRule,
}

impl Default for VisibilitySettings {
    fn default() -> Self {
        Self {
            excluded_routes: default_excluded_routes(),
            excluded_prefixes: default_excluded_prefixes(),
            fallback_poll_ms: default_visibility_poll_ms(),
            frame_ms: default_frame_ms(),
            fullscreen: FullscreenRule::default(),
            drawer: DrawerRule::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct FullscreenRule {
    #[serde(default = "default_fullscreen_width_ratio")]
    pub min_width_ratio: f64,
    #[serde(default = "default_fullscreen_height_ratio")]
    pub min_height_ratio: f64,
    #[serde(default = "default_fullscreen_z_index")]
    pub min_z_index: i64,
}

impl Default for FullscreenRule {
    fn default() -> Self {
        Self {
            min_width_ratio: default_fullscreen_width_ratio(),
            min_height_ratio: default_fullscreen_height_ratio(),
            min_z_index: default_fullscreen_z_index(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct DrawerRule {
    /// The drawer check only runs below this viewport width.
    #[serde(default = "default_mobile_breakpoint")]
    pub mobile_breakpoint: f64,
    #[serde(default = "default_drawer_height_ratio")]
    pub min_height_ratio: f64,
    #[serde(default = "default_drawer_width_ratio")]
    pub min_width_ratio: f64,
    /// Caps the width requirement on wider phones.
    #[serde(default = "default_drawer_width_cap")]
    pub min_width_cap: f64,
    #[serde(default = "default_drawer_edge_tolerance")]
    pub edge_tolerance: f64,
}

impl Default for DrawerRule {
    fn default() -> Self {
        Self {
            mobile_breakpoint: default_mobile_breakpoint(),
            min_height_ratio: default_drawer_height_ratio(),
            min_width_ratio: default_drawer_width_ratio(),
            min_width_cap: default_drawer_width_cap(),
            edge_tolerance: default_drawer_edge_tolerance(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct DockSettings {
    #[serde(default = "default_dock_offset")]
    pub default_bottom: f64,
    #[serde(default = "default_dock_offset")]
    pub default_right: f64,
    /// Floating widgets the launcher has to stay clear of.
    #[serde(default = "default_occupant_selectors")]
    pub occupant_selectors: Vec<String>,
    #[serde(default = "default_dock_right_tolerance")]
    pub right_edge_tolerance: f64,
    /// An occupant counts when its bottom edge is below this fraction of the viewport height.
    #[serde(default = "default_dock_bottom_band")]
    pub bottom_band_ratio: f64,
    #[serde(default = "default_dock_clearance_bottom")]
    pub clearance_bottom: f64,
    #[serde(default = "default_dock_clearance_right")]
    pub clearance_right: f64,
    #[serde(default = "default_dock_poll_ms")]
    pub fallback_poll_ms: u64,
}

impl Default for DockSettings {
    fn default() -> Self {
        Self {
            default_bottom: default_dock_offset(),
            default_right: default_dock_offset(),
            occupant_selectors: default_occupant_selectors(),
            right_edge_tolerance: default_dock_right_tolerance(),
            bottom_band_ratio: default_dock_bottom_band(),
            clearance_bottom: default_dock_clearance_bottom(),
            clearance_right: default_dock_clearance_right(),
            fallback_poll_ms: default_dock_poll_ms(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct ChromeSettings {
    #[serde(default = "default_clock_refresh_ms")]
    pub clock_refresh_ms: u64,
    #[serde(default = "no")]
    pub hour12: bool,
}

impl Default for ChromeSettings {
    fn default() -> Self {
        Self {
            clock_refresh_ms: default_clock_refresh_ms(),
            hour12: false,
        }
    }
}

/// Keys handled while the phone is open. Values are key names as reported by
/// the host (`Escape`, `h`, ...).
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct KeySettings {
    #[serde(default = "default_close_keys")]
    pub close: Vec<String>,
    #[serde(default = "default_home_keys")]
    pub home: Vec<String>,
}

impl Default for KeySettings {
    fn default() -> Self {
        Self {
            close: default_close_keys(),
            home: default_home_keys(),
        }
    }
}

fn no() -> bool { false }

fn default_max_stack_depth() -> usize { DEFAULT_MAX_STACK_DEPTH }
fn default_idle_timeout_ms() -> u64 { 120_000 }
fn default_idle_poll_ms() -> u64 { 5_000 }
fn default_unlock_threshold() -> f64 { 64.0 }

fn default_excluded_routes() -> Vec<String> {
    ["/sign-in", "/sign-up", "/sso-callback", "/test-errors"].map(String::from).to_vec()
}

fn default_excluded_prefixes() -> Vec<String> {
    ["/admin", "/store/checkout", "/store/confirmation"].map(String::from).to_vec()
}

fn default_visibility_poll_ms() -> u64 { 1_200 }
fn default_frame_ms() -> u64 { 16 }
fn default_fullscreen_width_ratio() -> f64 { 0.95 }
fn default_fullscreen_height_ratio() -> f64 { 0.90 }
fn default_fullscreen_z_index() -> i64 { 5_000 }
fn default_mobile_breakpoint() -> f64 { 640.0 }
fn default_drawer_height_ratio() -> f64 { 0.80 }
fn default_drawer_width_ratio() -> f64 { 0.60 }
fn default_drawer_width_cap() -> f64 { 480.0 }
fn default_drawer_edge_tolerance() -> f64 { 4.0 }

fn default_dock_offset() -> f64 { 24.0 }

fn default_occupant_selectors() -> Vec<String> {
    [
        "#chat-widget",
        "[data-sonner-toaster]",
        ".toast-viewport",
        "#cookie-consent",
        "#back-to-top",
        "[data-floating-cart]",
    ]
    .map(String::from)
    .to_vec()
}

fn default_dock_right_tolerance() -> f64 { 32.0 }
fn default_dock_bottom_band() -> f64 { 0.60 }
fn default_dock_clearance_bottom() -> f64 { 16.0 }
fn default_dock_clearance_right() -> f64 { 12.0 }
fn default_dock_poll_ms() -> u64 { 1_500 }
fn default_clock_refresh_ms() -> u64 { 30_000 }
fn default_close_keys() -> Vec<String> { vec!["Escape".to_string()] }
fn default_home_keys() -> Vec<String> { vec!["h".to_string()] }

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&buf)
    }

    pub fn parse(buf: &str) -> anyhow::Result<Config> {
        let config: Config = toml::from_str(buf)?;
        Ok(config)
    }

    /// Reads `path` if it exists, otherwise returns the defaults.
    pub fn read_or_default(path: &Path) -> anyhow::Result<Config> {
        if path.exists() { Self::read(path) } else { Ok(Config::default()) }
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = self.settings.validate();
        issues.extend(self.keys.validate());
        issues
    }
}

impl Settings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if let Some(url) = &self.content_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            issues.push(format!("content_url must be an http(s) URL, got '{url}'"));
        }

        if self.navigation.max_stack_depth < 2 {
            issues.push(format!(
                "navigation.max_stack_depth must be at least 2, got {}",
                self.navigation.max_stack_depth
            ));
        }

        if self.idle.poll_ms == 0 {
            issues.push("idle.poll_ms must be positive".to_string());
        }
        if self.idle.timeout_ms < self.idle.poll_ms {
            issues.push(format!(
                "idle.timeout_ms ({}) should not be shorter than idle.poll_ms ({})",
                self.idle.timeout_ms, self.idle.poll_ms
            ));
        }

        if self.gesture.unlock_threshold <= 0.0 {
            issues.push(format!(
                "gesture.unlock_threshold must be positive, got {}",
                self.gesture.unlock_threshold
            ));
        }

        issues.extend(self.visibility.validate());
        issues.extend(self.dock.validate());

        if self.chrome.clock_refresh_ms == 0 {
            issues.push("chrome.clock_refresh_ms must be positive".to_string());
        }

        issues
    }
}

fn check_ratio(issues: &mut Vec<String>, name: &str, value: f64) {
    if !(value > 0.0 && value <= 1.0) {
        issues.push(format!("{name} must be in (0, 1], got {value}"));
    }
}

impl VisibilitySettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for route in self.excluded_routes.iter().chain(&self.excluded_prefixes) {
            if !route.starts_with('/') {
                issues.push(format!("visibility route '{route}' must start with '/'"));
            }
        }

        if self.fallback_poll_ms == 0 {
            issues.push("visibility.fallback_poll_ms must be positive".to_string());
        }
        if self.frame_ms == 0 {
            issues.push("visibility.frame_ms must be positive".to_string());
        }

        check_ratio(
            &mut issues,
            "visibility.fullscreen.min_width_ratio",
            self.fullscreen.min_width_ratio,
        );
        check_ratio(
            &mut issues,
            "visibility.fullscreen.min_height_ratio",
            self.fullscreen.min_height_ratio,
        );
        check_ratio(&mut issues, "visibility.drawer.min_height_ratio", self.drawer.min_height_ratio);
        check_ratio(&mut issues, "visibility.drawer.min_width_ratio", self.drawer.min_width_ratio);

        if self.drawer.edge_tolerance < 0.0 {
            issues.push(format!(
                "visibility.drawer.edge_tolerance must be non-negative, got {}",
                self.drawer.edge_tolerance
            ));
        }

        issues
    }
}

impl DockSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.default_bottom < 0.0 || self.default_right < 0.0 {
            issues.push(format!(
                "dock default offsets must be non-negative, got bottom={} right={}",
                self.default_bottom, self.default_right
            ));
        }

        let mut seen = HashSet::default();
        for (index, selector) in self.occupant_selectors.iter().enumerate() {
            if selector.trim().is_empty() {
                issues.push(format!("dock.occupant_selectors[{index}] is empty"));
            } else if !seen.insert(selector) {
                issues.push(format!("Duplicate occupant selector '{selector}'"));
            }
        }

        check_ratio(&mut issues, "dock.bottom_band_ratio", self.bottom_band_ratio);

        if self.fallback_poll_ms == 0 {
            issues.push("dock.fallback_poll_ms must be positive".to_string());
        }

        issues
    }
}

impl KeySettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for key in &self.close {
            if self.home.contains(key) {
                issues.push(format!("key '{key}' is bound to both close and home"));
            }
        }
        for key in self.close.iter().chain(&self.home) {
            if key.is_empty() {
                issues.push("empty key binding".to_string());
            }
        }
        issues
    }
}
