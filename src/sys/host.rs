//! The host page the overlay is layered on.
//!
//! The overlay has no coupling to the page's other floating UI, so conflicts
//! are inferred from rendered geometry. `HostSurface` is the read-only view of
//! that geometry: viewport size, a snapshot of laid-out elements, and a stream
//! of change notifications (subtree/attribute mutations and resizes).

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use super::geometry::{Rect, Size};

const EVENT_CAPACITY: usize = 64;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
    Sticky,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ElementInfo {
    pub id: String,
    /// Selectors this element answers to, e.g. `#chat-widget` or `.toast-viewport`.
    #[serde(default)]
    pub selectors: Vec<String>,
    pub rect: Rect,
    #[serde(default)]
    pub position: Position,
    /// Computed `z-index` as reported by the page (`"auto"`, `"6000"`, ...).
    #[serde(default)]
    pub z_index: Option<String>,
    #[serde(default = "yes")]
    pub visible: bool,
    /// Whether the element belongs to the phone overlay's own subtree.
    #[serde(default)]
    pub in_phone_root: bool,
}

fn yes() -> bool { true }

impl ElementInfo {
    pub fn new(id: impl Into<String>, rect: Rect) -> Self {
        Self {
            id: id.into(),
            selectors: Vec::new(),
            rect,
            position: Position::Static,
            z_index: None,
            visible: true,
            in_phone_root: false,
        }
    }

    pub fn fixed(mut self) -> Self {
        self.position = Position::Fixed;
        self
    }

    pub fn with_z_index(mut self, z: impl Into<String>) -> Self {
        self.z_index = Some(z.into());
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn in_phone_root(mut self) -> Self {
        self.in_phone_root = true;
        self
    }

    /// `None` for `auto` or anything that does not parse as an integer.
    pub fn numeric_z_index(&self) -> Option<i64> {
        self.z_index.as_deref().and_then(|z| z.trim().parse().ok())
    }

    pub fn matches(&self, selector: &str) -> bool { self.selectors.iter().any(|s| s == selector) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Mutated,
    Resized,
}

pub trait HostSurface: Send + Sync {
    fn viewport(&self) -> Size;

    fn elements(&self) -> Vec<ElementInfo>;

    /// Elements matching any of `selectors`, from a single snapshot.
    fn query_all(&self, selectors: &[String]) -> Vec<ElementInfo> {
        self.elements()
            .into_iter()
            .filter(|e| selectors.iter().any(|s| e.matches(s)))
            .collect()
    }

    fn subscribe(&self) -> broadcast::Receiver<HostEvent>;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LayoutSnapshot {
    pub viewport: Size,
    #[serde(default)]
    pub elements: Vec<ElementInfo>,
}

impl LayoutSnapshot {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let buf = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&buf)?)
    }
}

#[derive(Debug)]
struct PageState {
    viewport: Size,
    elements: Vec<ElementInfo>,
}

/// In-memory host page. Every mutation notifies subscribers.
#[derive(Debug)]
pub struct HostPage {
    state: RwLock<PageState>,
    events: broadcast::Sender<HostEvent>,
    reads: AtomicUsize,
}

impl HostPage {
    pub fn new(viewport: Size) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(PageState { viewport, elements: Vec::new() }),
            events,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn from_snapshot(snapshot: LayoutSnapshot) -> Self {
        let page = Self::new(snapshot.viewport);
        page.state.write().elements = snapshot.elements;
        page
    }

    pub fn insert(&self, element: ElementInfo) {
        {
            let mut state = self.state.write();
            state.elements.retain(|e| e.id != element.id);
            state.elements.push(element);
        }
        self.notify(HostEvent::Mutated);
    }

    pub fn remove(&self, id: &str) -> Option<ElementInfo> {
        let removed = {
            let mut state = self.state.write();
            let idx = state.elements.iter().position(|e| e.id == id)?;
            state.elements.remove(idx)
        };
        self.notify(HostEvent::Mutated);
        Some(removed)
    }

    pub fn resize(&self, viewport: Size) {
        self.state.write().viewport = viewport;
        self.notify(HostEvent::Resized);
    }

    /// Number of element snapshots taken so far.
    pub fn read_count(&self) -> usize { self.reads.load(Ordering::SeqCst) }

    fn notify(&self, event: HostEvent) {
        trace!(?event, "host page changed");
        // No subscribers is fine; nobody is watching right now.
        _ = self.events.send(event);
    }
}

impl HostSurface for HostPage {
    fn viewport(&self) -> Size { self.state.read().viewport }

    fn elements(&self) -> Vec<ElementInfo> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.state.read().elements.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<HostEvent> { self.events.subscribe() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_z_index_ignores_auto() {
        let rect = Rect::from_xywh(0.0, 0.0, 10.0, 10.0);
        assert_eq!(ElementInfo::new("a", rect).with_z_index("auto").numeric_z_index(), None);
        assert_eq!(ElementInfo::new("a", rect).with_z_index(" 6000").numeric_z_index(), Some(6000));
        assert_eq!(ElementInfo::new("a", rect).numeric_z_index(), None);
    }

    #[test]
    fn mutations_notify_subscribers() {
        let page = HostPage::new(Size::new(1000.0, 800.0));
        let mut rx = page.subscribe();
        page.insert(ElementInfo::new("a", Rect::from_xywh(0.0, 0.0, 10.0, 10.0)));
        page.resize(Size::new(500.0, 800.0));
        assert_eq!(rx.try_recv().ok(), Some(HostEvent::Mutated));
        assert_eq!(rx.try_recv().ok(), Some(HostEvent::Resized));
        assert_eq!(page.viewport(), Size::new(500.0, 800.0));
    }

    #[test]
    fn insert_replaces_same_id() {
        let page = HostPage::new(Size::new(1000.0, 800.0));
        page.insert(ElementInfo::new("a", Rect::from_xywh(0.0, 0.0, 10.0, 10.0)));
        page.insert(ElementInfo::new("a", Rect::from_xywh(5.0, 5.0, 10.0, 10.0)));
        let elements = page.elements();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].rect.left(), 5.0);
    }

    #[test]
    fn query_all_matches_selectors() {
        let page = HostPage::new(Size::new(1000.0, 800.0));
        let rect = Rect::from_xywh(0.0, 0.0, 10.0, 10.0);
        page.insert(ElementInfo::new("a", rect).with_selector("#chat"));
        page.insert(ElementInfo::new("b", rect));
        page.insert(ElementInfo::new("c", rect).with_selector(".toast"));
        let selectors = vec!["#chat".to_string(), ".toast".to_string()];
        assert_eq!(page.query_all(&selectors).len(), 2);
        assert!(page.remove("a").is_some());
        assert_eq!(page.query_all(&selectors[..1]).len(), 0);
        assert!(page.remove("a").is_none());
    }

    #[test]
    fn snapshot_parses_json() {
        let json = r#"{
            "viewport": { "width": 390.0, "height": 844.0 },
            "elements": [
                { "id": "drawer", "rect": { "origin": { "x": 0.0, "y": 0.0 },
                  "size": { "width": 300.0, "height": 844.0 } },
                  "position": "fixed", "z_index": "50" }
            ]
        }"#;
        let snapshot: LayoutSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.elements[0].position, Position::Fixed);
        assert!(snapshot.elements[0].visible);
    }
}
