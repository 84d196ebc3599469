//! Keeps the launcher clear of other floating widgets in the bottom-right corner.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use super::surface_watch::SurfaceWatch;
use super::visibility::VisibilityPolicy;
use crate::common::config::DockSettings;
use crate::sys::host::HostSurface;

/// Distance of the launcher from the viewport's bottom and right edges.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct DockOffset {
    pub bottom: f64,
    pub right: f64,
}

impl DockOffset {
    pub fn default_for(settings: &DockSettings) -> Self {
        DockOffset {
            bottom: settings.default_bottom,
            right: settings.default_right,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct DockLayout {
    pub hidden: bool,
    pub offset: DockOffset,
}

/// Grows the default offset past every known occupant of the bottom-right band.
/// The result is never below the default.
pub fn resolve(settings: &DockSettings, host: &dyn HostSurface) -> DockOffset {
    let viewport = host.viewport();
    let mut offset = DockOffset::default_for(settings);
    let occupants = host
        .query_all(&settings.occupant_selectors)
        .into_iter()
        .filter(|e| e.visible && !e.in_phone_root && !e.rect.is_empty());
    for occupant in occupants {
        let rect = occupant.rect;
        let near_right = rect.right_gap(viewport) <= settings.right_edge_tolerance;
        let in_band = rect.bottom() >= viewport.height * settings.bottom_band_ratio;
        if !(near_right && in_band) {
            continue;
        }
        trace!(id = %occupant.id, "dock occupant");
        offset.bottom = offset.bottom.max(viewport.height - rect.top() + settings.clearance_bottom);
        offset.right = offset.right.max(viewport.width - rect.right() + settings.clearance_right);
    }
    offset
}

/// Runs the occupant scan only while the launcher is actually on screen.
pub struct DockMonitor {
    settings: Arc<DockSettings>,
    frame: Duration,
    host: Arc<dyn HostSurface>,
    policy_rx: watch::Receiver<VisibilityPolicy>,
    open_rx: watch::Receiver<bool>,
    tx: Arc<watch::Sender<DockLayout>>,
    scanning: Option<CancellationToken>,
}

impl DockMonitor {
    pub fn spawn(
        settings: DockSettings,
        frame: Duration,
        host: Arc<dyn HostSurface>,
        policy_rx: watch::Receiver<VisibilityPolicy>,
        open_rx: watch::Receiver<bool>,
        token: CancellationToken,
    ) -> watch::Receiver<DockLayout> {
        let (tx, rx) = watch::channel(DockLayout {
            hidden: true,
            offset: DockOffset::default_for(&settings),
        });
        let mut monitor = DockMonitor {
            settings: Arc::new(settings),
            frame,
            host,
            policy_rx,
            open_rx,
            tx: Arc::new(tx),
            scanning: None,
        };
        monitor.update(&token);
        tokio::spawn(monitor.run(token));
        rx
    }

    #[instrument(name = "dock", skip_all)]
    async fn run(mut self, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                changed = self.policy_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.update(&token);
                }
                changed = self.open_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.update(&token);
                }
            }
        }
        self.stop();
    }

    fn should_show(&mut self) -> bool {
        let enabled = self.policy_rx.borrow_and_update().enabled;
        let open = *self.open_rx.borrow_and_update();
        enabled && !open
    }

    fn update(&mut self, token: &CancellationToken) {
        if !self.should_show() {
            if self.scanning.is_some() {
                debug!("launcher hidden, stopping dock scan");
            }
            self.stop();
            self.tx.send_if_modified(|layout| !std::mem::replace(&mut layout.hidden, true));
            return;
        }
        if self.scanning.is_some() {
            return;
        }
        debug!("launcher shown, starting dock scan");
        let scan_token = token.child_token();
        let fallback = Duration::from_millis(self.settings.fallback_poll_ms);
        let settings = self.settings.clone();
        SurfaceWatch::new(
            "dock scan",
            self.host.clone(),
            self.frame,
            fallback,
            self.tx.clone(),
            move |host: &dyn HostSurface| DockLayout {
                hidden: false,
                offset: resolve(&settings, host),
            },
        )
        .spawn(scan_token.clone());
        self.scanning = Some(scan_token);
    }

    fn stop(&mut self) {
        if let Some(scan) = self.scanning.take() {
            scan.cancel();
        }
    }
}
