//! View models for everything the overlay draws.
//!
//! Nothing here holds state; a [`Frame`] is rebuilt from the controller's
//! state whenever something changes.

use serde::Serialize;

pub mod chrome;
pub mod hosts;
pub mod launcher;
pub mod screen;

use self::chrome::ChromeView;
use self::hosts::{ModalView, SheetView};
use self::launcher::LauncherView;
use self::screen::RoutedScreen;
use crate::actor::dock::DockLayout;
use crate::actor::gesture::SwipeUnlock;
use crate::actor::visibility::VisibilityPolicy;
use crate::model::{AppCache, ArtistContent, Locale, PhoneState};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PhoneView {
    pub locale: Locale,
    pub screen: RoutedScreen,
    pub chrome: ChromeView,
    pub sheet: Option<SheetView>,
    pub modal: Option<ModalView>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Frame {
    pub launcher: Option<LauncherView>,
    /// Present only while the phone is open.
    pub phone: Option<PhoneView>,
}

pub struct FrameInputs<'a> {
    pub state: &'a PhoneState,
    pub apps: &'a AppCache,
    pub content: &'a ArtistContent,
    pub swipe: &'a SwipeUnlock,
    pub policy: VisibilityPolicy,
    pub dock: DockLayout,
    pub clock: String,
}

pub fn render(inputs: FrameInputs<'_>) -> Frame {
    let FrameInputs { state, apps, content, swipe, policy, dock, clock } = inputs;
    let phone = state.is_open.then(|| PhoneView {
        locale: state.locale,
        screen: screen::route_screen(state, apps, content, swipe),
        chrome: chrome::chrome(state, clock),
        sheet: hosts::sheet_view(state),
        modal: hosts::modal_view(state),
    });
    let launcher = match phone {
        Some(_) => None,
        None => launcher::launcher(policy, dock, state.locale),
    };
    Frame { launcher, phone }
}
