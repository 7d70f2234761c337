//! Modal surfaces and notification de-duplication.
//!
//! At most one modal of each [`ModalKind`] is open at a time. A request to
//! open a kind that is already showing is suppressed and counted, so a
//! flaky endpoint failing repeatedly still produces a single error dialog.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModalKind {
    Error,
    Presets,
    RebootConfirm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ModalData {
    Error { message: String },
    Presets { camera: usize },
    RebootConfirm { camera: usize },
}

impl ModalData {
    pub fn kind(&self) -> ModalKind {
        match self {
            ModalData::Error { .. } => ModalKind::Error,
            ModalData::Presets { .. } => ModalKind::Presets,
            ModalData::RebootConfirm { .. } => ModalKind::RebootConfirm,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenModal {
    pub data: ModalData,
    /// Requests for this kind that arrived while it was already open
    pub suppressed: u32,
}

/// Registry of open modals, shared between the session and the presentation.
#[derive(Debug, Clone, Default)]
pub struct ModalRegistry {
    open: Arc<Mutex<HashMap<ModalKind, OpenModal>>>,
}

impl ModalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ModalKind, OpenModal>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a modal unless one of the same kind is already showing.
    pub fn try_open(&self, data: ModalData) -> bool {
        let kind = data.kind();
        let mut open = self.lock();
        if let Some(existing) = open.get_mut(&kind) {
            existing.suppressed = existing.suppressed.saturating_add(1);
            debug!("Suppressed {kind:?} modal, one is already open");
            return false;
        }
        open.insert(
            kind,
            OpenModal {
                data,
                suppressed: 0,
            },
        );
        true
    }

    /// Dismiss the open modal of this kind, returning what it showed.
    pub fn close(&self, kind: ModalKind) -> Option<OpenModal> {
        self.lock().remove(&kind)
    }

    pub fn is_open(&self, kind: ModalKind) -> bool {
        self.lock().contains_key(&kind)
    }

    pub fn get(&self, kind: ModalKind) -> Option<OpenModal> {
        self.lock().get(&kind).cloned()
    }

    pub fn open_modals(&self) -> Vec<OpenModal> {
        let mut modals: Vec<OpenModal> = self.lock().values().cloned().collect();
        modals.sort_by_key(|modal| modal.data.kind() as u8);
        modals
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Where user-visible errors go.
pub trait NotificationSurface: Send + Sync {
    fn show_error(&self, message: &str);
}

impl NotificationSurface for ModalRegistry {
    fn show_error(&self, message: &str) {
        error!("{message}");
        self.try_open(ModalData::Error {
            message: message.to_string(),
        });
    }
}

/// Page-level effects of authentication.
pub trait Navigator: Send + Sync {
    /// Leave the control view and go back to key entry.
    fn return_to_entry(&self);

    fn set_title(&self, title: &str);
}
