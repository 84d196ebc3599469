//! Decides whether the phone launcher may show on the current page.
//!
//! Route exclusion is checked first and never touches the host layout. Only
//! when the route is allowed does a debounced layout scan run, looking for
//! host UI the launcher would collide with.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::surface_watch::SurfaceWatch;
use crate::common::config::{DrawerRule, FullscreenRule, VisibilitySettings};
use crate::sys::geometry::Size;
use crate::sys::host::{ElementInfo, HostSurface, Position};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum HiddenReason {
    RouteExcluded,
    FullscreenOverlay,
    MobileDrawerConflict,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityPolicy {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<HiddenReason>,
}

impl VisibilityPolicy {
    pub const ENABLED: VisibilityPolicy = VisibilityPolicy { enabled: true, reason: None };

    pub fn hidden(reason: HiddenReason) -> Self { Self { enabled: false, reason: Some(reason) } }
}

impl Default for VisibilityPolicy {
    fn default() -> Self { Self::ENABLED }
}

/// Strips the query and fragment and any trailing slash (except on `/`).
fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

/// `/admin` matches `/admin` and `/admin/events` but not `/administrator`.
fn under_prefix(path: &str, prefix: &str) -> bool {
    let prefix = normalize_path(prefix);
    path == prefix || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}

pub fn route_excluded(settings: &VisibilitySettings, path: &str) -> bool {
    let path = normalize_path(path);
    settings.excluded_routes.iter().any(|route| normalize_path(route) == path)
        || settings.excluded_prefixes.iter().any(|prefix| under_prefix(path, prefix))
}

fn is_fullscreen_overlay(rule: &FullscreenRule, viewport: Size, element: &ElementInfo) -> bool {
    element.position == Position::Fixed
        && element.rect.width() >= viewport.width * rule.min_width_ratio
        && element.rect.height() >= viewport.height * rule.min_height_ratio
        && element.numeric_z_index().is_some_and(|z| z >= rule.min_z_index)
}

fn is_mobile_drawer(rule: &DrawerRule, viewport: Size, element: &ElementInfo) -> bool {
    let rect = &element.rect;
    let min_width = (viewport.width * rule.min_width_ratio).min(rule.min_width_cap);
    // Off-screen overhang still counts as touching the edge.
    let hugs_edge =
        rect.left() <= rule.edge_tolerance || rect.right_gap(viewport) <= rule.edge_tolerance;
    element.position == Position::Fixed
        && rect.height() >= viewport.height * rule.min_height_ratio
        && rect.width() >= min_width
        && hugs_edge
}

/// Inspects the host layout. Fullscreen overlays take priority over drawers.
pub fn scan(settings: &VisibilitySettings, host: &dyn HostSurface) -> VisibilityPolicy {
    let viewport = host.viewport();
    let elements: Vec<ElementInfo> =
        host.elements().into_iter().filter(|e| !e.in_phone_root).collect();

    if let Some(overlay) =
        elements.iter().find(|e| is_fullscreen_overlay(&settings.fullscreen, viewport, e))
    {
        debug!(id = %overlay.id, "fullscreen overlay detected");
        return VisibilityPolicy::hidden(HiddenReason::FullscreenOverlay);
    }

    if viewport.width < settings.drawer.mobile_breakpoint
        && let Some(drawer) =
            elements.iter().find(|e| is_mobile_drawer(&settings.drawer, viewport, e))
    {
        debug!(id = %drawer.id, "mobile drawer detected");
        return VisibilityPolicy::hidden(HiddenReason::MobileDrawerConflict);
    }

    VisibilityPolicy::ENABLED
}

pub fn evaluate(settings: &VisibilitySettings, path: &str, host: &dyn HostSurface) -> VisibilityPolicy {
    if route_excluded(settings, path) {
        return VisibilityPolicy::hidden(HiddenReason::RouteExcluded);
    }
    scan(settings, host)
}

/// Follows the current route and, while it is allowed, the host layout.
pub struct VisibilityMonitor {
    settings: Arc<VisibilitySettings>,
    host: Arc<dyn HostSurface>,
    route_rx: watch::Receiver<String>,
    tx: Arc<watch::Sender<VisibilityPolicy>>,
    scanning: Option<CancellationToken>,
}

impl VisibilityMonitor {
    /// Publishes the policy for the current route immediately, then keeps it
    /// up to date until `token` is cancelled.
    pub fn spawn(
        settings: VisibilitySettings,
        host: Arc<dyn HostSurface>,
        mut route_rx: watch::Receiver<String>,
        token: CancellationToken,
    ) -> watch::Receiver<VisibilityPolicy> {
        let path = route_rx.borrow_and_update().clone();
        let initial = evaluate(&settings, &path, host.as_ref());
        let (tx, rx) = watch::channel(initial);
        let mut monitor = VisibilityMonitor {
            settings: Arc::new(settings),
            host,
            route_rx,
            tx: Arc::new(tx),
            scanning: None,
        };
        monitor.on_route(&path, &token);
        tokio::spawn(monitor.run(token));
        rx
    }

    #[instrument(name = "visibility", skip_all)]
    async fn run(mut self, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                changed = self.route_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let path = self.route_rx.borrow_and_update().clone();
                    self.on_route(&path, &token);
                }
            }
        }
        self.stop_scan();
    }

    fn on_route(&mut self, path: &str, token: &CancellationToken) {
        if route_excluded(&self.settings, path) {
            debug!(path, "route excluded");
            self.stop_scan();
            self.tx.send_if_modified(|policy| {
                let excluded = VisibilityPolicy::hidden(HiddenReason::RouteExcluded);
                std::mem::replace(policy, excluded) != excluded
            });
            return;
        }
        if self.scanning.is_some() {
            return;
        }
        let scan_token = token.child_token();
        let frame = Duration::from_millis(self.settings.frame_ms);
        let fallback = Duration::from_millis(self.settings.fallback_poll_ms);
        let settings = self.settings.clone();
        SurfaceWatch::new(
            "visibility scan",
            self.host.clone(),
            frame,
            fallback,
            self.tx.clone(),
            move |host: &dyn HostSurface| scan(&settings, host),
        )
        .spawn(scan_token.clone());
        self.scanning = Some(scan_token);
    }

    fn stop_scan(&mut self) {
        if let Some(scan) = self.scanning.take() {
            scan.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::sys::geometry::Rect;
    use crate::sys::host::HostPage;

    const DESKTOP: Size = Size::new(1280.0, 800.0);
    const MOBILE: Size = Size::new(390.0, 844.0);

    fn settings() -> VisibilitySettings { VisibilitySettings::default() }

    fn fullscreen_overlay(viewport: Size) -> ElementInfo {
        ElementInfo::new("lightbox", Rect::from_xywh(0.0, 0.0, viewport.width, viewport.height))
            .fixed()
            .with_z_index("6000")
    }

    #[test]
    fn excluded_routes_and_prefixes() {
        let s = settings();
        for path in [
            "/sign-in",
            "/sign-up/",
            "/sso-callback?code=1",
            "/test-errors",
            "/admin",
            "/admin/events",
            "/store/checkout",
            "/store/checkout/pay",
            "/store/confirmation/42",
        ] {
            assert!(route_excluded(&s, path), "{path} should be excluded");
        }
        for path in ["/", "/administrator", "/store", "/store/checkouts", "/sign-in-help", "/music"] {
            assert!(!route_excluded(&s, path), "{path} should be allowed");
        }
    }

    #[test]
    fn excluded_route_never_reads_layout() {
        let page = HostPage::new(DESKTOP);
        page.insert(fullscreen_overlay(DESKTOP));
        let policy = evaluate(&settings(), "/admin/events", &page);
        assert_eq!(policy, VisibilityPolicy::hidden(HiddenReason::RouteExcluded));
        assert_eq!(page.read_count(), 0);
    }

    #[test]
    fn fullscreen_overlay_needs_every_condition() {
        let s = settings();
        let page = HostPage::new(DESKTOP);
        assert_eq!(scan(&s, &page), VisibilityPolicy::ENABLED);

        page.insert(fullscreen_overlay(DESKTOP).with_z_index("4999"));
        assert_eq!(scan(&s, &page), VisibilityPolicy::ENABLED);
        page.insert(fullscreen_overlay(DESKTOP).with_z_index("auto"));
        assert_eq!(scan(&s, &page), VisibilityPolicy::ENABLED);
        page.insert(ElementInfo::new("lightbox", Rect::from_xywh(0.0, 0.0, 1280.0, 800.0)).with_z_index("6000"));
        assert_eq!(scan(&s, &page), VisibilityPolicy::ENABLED);

        page.insert(fullscreen_overlay(DESKTOP));
        assert_eq!(scan(&s, &page), VisibilityPolicy::hidden(HiddenReason::FullscreenOverlay));
    }

    #[test]
    fn phone_subtree_is_ignored() {
        let page = HostPage::new(DESKTOP);
        page.insert(fullscreen_overlay(DESKTOP).in_phone_root());
        assert_eq!(scan(&settings(), &page), VisibilityPolicy::ENABLED);
    }

    #[test]
    fn drawer_only_counts_on_narrow_viewports() {
        let s = settings();
        let drawer = ElementInfo::new("nav-drawer", Rect::from_xywh(0.0, 0.0, 300.0, 844.0))
            .fixed()
            .with_z_index("50");

        let page = HostPage::new(MOBILE);
        page.insert(drawer.clone());
        assert_eq!(scan(&s, &page), VisibilityPolicy::hidden(HiddenReason::MobileDrawerConflict));

        page.resize(Size::new(800.0, 844.0));
        assert_eq!(scan(&s, &page), VisibilityPolicy::ENABLED);
    }

    #[test]
    fn drawer_on_right_edge_and_width_cap() {
        let s = settings();
        let page = HostPage::new(Size::new(600.0, 1000.0));
        // 60% of 600 is 360, so 350 wide is too narrow.
        page.insert(ElementInfo::new("d", Rect::from_xywh(250.0, 0.0, 350.0, 900.0)).fixed());
        assert_eq!(scan(&s, &page), VisibilityPolicy::ENABLED);
        page.insert(ElementInfo::new("d", Rect::from_xywh(237.0, 0.0, 360.0, 900.0)).fixed());
        assert_eq!(scan(&s, &page), VisibilityPolicy::hidden(HiddenReason::MobileDrawerConflict));
        // Floating away from both edges.
        page.insert(ElementInfo::new("d", Rect::from_xywh(100.0, 0.0, 360.0, 900.0)).fixed());
        assert_eq!(scan(&s, &page), VisibilityPolicy::ENABLED);
    }

    #[test]
    fn drawer_partly_off_screen_still_conflicts() {
        let s = settings();
        let page = HostPage::new(MOBILE);
        page.insert(ElementInfo::new("left", Rect::from_xywh(-10.0, 0.0, 300.0, 844.0)).fixed());
        assert_eq!(scan(&s, &page), VisibilityPolicy::hidden(HiddenReason::MobileDrawerConflict));

        page.remove("left");
        let right = Rect::from_xywh(MOBILE.width - 280.0, 0.0, 300.0, 844.0);
        page.insert(ElementInfo::new("right", right).fixed());
        assert_eq!(scan(&s, &page), VisibilityPolicy::hidden(HiddenReason::MobileDrawerConflict));
    }

    #[test]
    fn fullscreen_wins_over_drawer() {
        let page = HostPage::new(MOBILE);
        page.insert(ElementInfo::new("drawer", Rect::from_xywh(0.0, 0.0, 300.0, 844.0)).fixed());
        page.insert(fullscreen_overlay(MOBILE));
        assert_eq!(
            scan(&settings(), &page),
            VisibilityPolicy::hidden(HiddenReason::FullscreenOverlay)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_follows_layout_within_one_debounce() {
        let page = Arc::new(HostPage::new(DESKTOP));
        let (_route_tx, route_rx) = watch::channel("/music".to_string());
        let token = CancellationToken::new();
        let mut rx = VisibilityMonitor::spawn(settings(), page.clone(), route_rx, token.clone());
        assert_eq!(*rx.borrow_and_update(), VisibilityPolicy::ENABLED);

        let frame = Duration::from_millis(settings().frame_ms);
        page.insert(fullscreen_overlay(DESKTOP));
        tokio::time::sleep(frame * 2).await;
        assert_eq!(*rx.borrow_and_update(), VisibilityPolicy::hidden(HiddenReason::FullscreenOverlay));

        page.remove("lightbox");
        tokio::time::sleep(frame * 2).await;
        assert_eq!(*rx.borrow_and_update(), VisibilityPolicy::ENABLED);
        token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_stops_scanning_on_excluded_route() {
        let page = Arc::new(HostPage::new(DESKTOP));
        let (route_tx, route_rx) = watch::channel("/admin/events".to_string());
        let token = CancellationToken::new();
        let mut rx = VisibilityMonitor::spawn(settings(), page.clone(), route_rx, token.clone());
        assert_eq!(*rx.borrow_and_update(), VisibilityPolicy::hidden(HiddenReason::RouteExcluded));

        page.insert(fullscreen_overlay(DESKTOP));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(page.read_count(), 0);

        route_tx.send_replace("/music".to_string());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*rx.borrow_and_update(), VisibilityPolicy::hidden(HiddenReason::FullscreenOverlay));
        assert!(page.read_count() > 0);

        route_tx.send_replace("/store/checkout".to_string());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*rx.borrow_and_update(), VisibilityPolicy::hidden(HiddenReason::RouteExcluded));
        let reads = page.read_count();
        page.remove("lightbox");
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(page.read_count(), reads);
        token.cancel();
    }
}
