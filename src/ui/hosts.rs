//! Sheet and modal layers drawn above the current screen.

use serde::Serialize;
use serde_json::Value;

use crate::model::PhoneState;
use crate::model::nav::Action;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SheetView {
    pub id: String,
    pub title: Option<String>,
    pub payload: Value,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ModalView {
    pub id: String,
    pub title: Option<String>,
    pub body: Option<String>,
    pub dismissible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dismiss {
    /// Swipe-down or close button on the sheet.
    Sheet,
    /// Explicit close button on the modal.
    Modal,
    /// Tap on the dimmed area behind the modal.
    ModalBackdrop,
}

pub fn sheet_view(state: &PhoneState) -> Option<SheetView> {
    state.sheet.as_ref().map(|sheet| SheetView {
        id: sheet.id.clone(),
        title: sheet.title.clone(),
        payload: sheet.payload.clone(),
    })
}

pub fn modal_view(state: &PhoneState) -> Option<ModalView> {
    state.modal.as_ref().map(|modal| ModalView {
        id: modal.id.clone(),
        title: modal.title.clone(),
        body: modal.body.clone(),
        dismissible: modal.dismissible,
    })
}

/// The action a dismiss gesture maps to, if it does anything.
pub fn dismiss(state: &PhoneState, how: Dismiss) -> Option<Action> {
    match how {
        Dismiss::Sheet => state.sheet.as_ref().map(|_| Action::SetSheet(None)),
        Dismiss::Modal => state.modal.as_ref().map(|_| Action::SetModal(None)),
        Dismiss::ModalBackdrop => state
            .modal
            .as_ref()
            .filter(|modal| modal.dismissible)
            .map(|_| Action::SetModal(None)),
    }
}
