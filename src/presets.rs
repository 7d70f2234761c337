//! Camera presets: recall, and saving the current position where the
//! server allows it.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::modal::{ModalData, ModalKind, ModalRegistry, NotificationSurface};
use crate::protocol::{Camera, Preset};
use crate::registry::{CameraRef, CameraRegistry};
use crate::session::{Dispatch, SharedState, Skip};
use crate::transport::Dispatcher;
use crate::OurResult;

const SAVE_FAILED: &str = "Unable to save preset";

pub struct PresetManager {
    registry: Arc<CameraRegistry>,
    state: SharedState,
    dispatcher: Dispatcher,
    modals: ModalRegistry,
}

/// A save request detached from the session, so the control loop can keep
/// handling gestures while it is in flight.
pub struct PendingSave {
    dispatcher: Dispatcher,
    modals: ModalRegistry,
    camera: String,
    preset: String,
    url: String,
}

impl PendingSave {
    /// Returns whether the camera accepted the save. A failure is shown
    /// through the (de-duplicated) error surface.
    pub async fn run(self) -> bool {
        match self.dispatcher.send(&self.url).await {
            Ok(()) => {
                info!(camera = %self.camera, "Saved current position as '{}'", self.preset);
                self.modals.close(ModalKind::Presets);
                true
            }
            Err(e) => {
                warn!(camera = %self.camera, "Saving preset '{}' failed: {e}", self.preset);
                self.modals.show_error(SAVE_FAILED);
                false
            }
        }
    }
}

impl PresetManager {
    pub fn new(
        registry: Arc<CameraRegistry>,
        state: SharedState,
        dispatcher: Dispatcher,
        modals: ModalRegistry,
    ) -> Self {
        Self {
            registry,
            state,
            dispatcher,
            modals,
        }
    }

    pub fn list_presets(&self, camera: CameraRef) -> OurResult<&[Preset]> {
        Ok(&self.registry.get(camera)?.presets)
    }

    pub(crate) fn camera_can_save(camera: &Camera) -> bool {
        camera.presets.iter().any(|preset| preset.save_preset.is_some())
    }

    /// Whether "save current position" is offered for this camera.
    pub fn can_save(&self, camera: CameraRef) -> OurResult<bool> {
        Ok(Self::camera_can_save(self.registry.get(camera)?))
    }

    pub fn select_preset(&self, camera: CameraRef, preset: usize) -> OurResult<Dispatch> {
        let record = self.registry.get(camera)?;
        let chosen = self.registry.preset(camera, preset)?;
        let Some(url) = chosen.set_preset.as_deref() else {
            debug!(camera = %record.display_name, "preset '{}' has no recall endpoint", chosen.display_name);
            return Ok(Dispatch::Skipped(Skip::Unsupported));
        };

        if let Err(skip) = self.state.with(|s| s.touch()) {
            debug!(camera = %record.display_name, "preset recall refused: {skip:?}");
            return Ok(Dispatch::Skipped(skip));
        }

        self.dispatcher.fire(&record.display_name, "set-preset", url);
        Ok(Dispatch::Sent)
    }

    /// Open the save dialog for a camera. False if the camera has nothing
    /// to save or a presets dialog is already open.
    pub fn open_dialog(&self, camera: CameraRef) -> OurResult<bool> {
        if !self.can_save(camera)? {
            return Ok(false);
        }
        Ok(self.modals.try_open(ModalData::Presets {
            camera: camera.index(),
        }))
    }

    /// Validate a save request and detach it from the session.
    pub fn prepare_save(
        &self,
        camera: CameraRef,
        preset: usize,
    ) -> OurResult<Result<PendingSave, Skip>> {
        let record = self.registry.get(camera)?;
        let chosen = self.registry.preset(camera, preset)?;
        let Some(url) = chosen.save_preset.as_deref() else {
            return Ok(Err(Skip::Unsupported));
        };
        if let Err(skip) = self.state.with(|s| s.touch()) {
            return Ok(Err(skip));
        }

        Ok(Ok(PendingSave {
            dispatcher: self.dispatcher.clone(),
            modals: self.modals.clone(),
            camera: record.display_name.clone(),
            preset: chosen.display_name.clone(),
            url: url.to_string(),
        }))
    }

    /// Save the camera's current position into a preset and wait for it.
    pub async fn save_preset(&self, camera: CameraRef, preset: usize) -> OurResult<Dispatch> {
        match self.prepare_save(camera, preset)? {
            Ok(pending) => {
                pending.run().await;
                Ok(Dispatch::Sent)
            }
            Err(skip) => Ok(Dispatch::Skipped(skip)),
        }
    }
}
