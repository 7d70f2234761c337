//! The control session: shared state and the components that drive it.
//!
//! A [`Session`] is created for one resolved [`Room`] and owns its flags
//! exclusively. Motion engagement and the reboot lockout are a single
//! [`ControlState`], so a session can never be tilting and rebooting at once.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::info;

use crate::auth::Room;
use crate::claims::Claims;
use crate::config::SessionSettings;
use crate::liveness::LivenessTimer;
use crate::modal::{ModalData, ModalKind, ModalRegistry};
use crate::motion::MotionDispatcher;
use crate::presets::PresetManager;
use crate::protocol::{
    CameraView, PanDirection, Preset, SessionSnapshot, TiltDirection, ZoomDirection,
};
use crate::reboot::RebootOrchestrator;
use crate::registry::{CameraRef, CameraRegistry};
use crate::transport::Dispatcher;
use crate::OurResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum ControlState {
    Active { tilting: bool, zooming: bool },
    /// Controls and stream are locked out until this reboot cycle ends
    Rebooting { cycle: u64 },
}

impl ControlState {
    const IDLE: ControlState = ControlState::Active {
        tilting: false,
        zooming: false,
    };
}

/// Why an operator action produced no request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Skip {
    /// The camera has no endpoint for this action
    Unsupported,
    /// A stop arrived without a matching start
    NotEngaged,
    Rebooting,
    /// The operator's claims do not allow this action
    NotPermitted,
    /// The session has been torn down
    Closed,
}

/// What an operator action did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "outcome", content = "reason")]
pub enum Dispatch {
    /// A command request was issued
    Sent,
    /// State changed but there was no endpoint to call
    LocalOnly,
    Skipped(Skip),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub control: ControlState,
    pub timeout_ticks: u32,
    closed: bool,
    next_cycle: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            control: ControlState::IDLE,
            timeout_ticks: 0,
            closed: false,
            next_cycle: 1,
        }
    }
}

impl SessionState {
    pub fn tilting(&self) -> bool {
        matches!(self.control, ControlState::Active { tilting: true, .. })
    }

    pub fn zooming(&self) -> bool {
        matches!(self.control, ControlState::Active { zooming: true, .. })
    }

    pub fn rebooting(&self) -> bool {
        matches!(self.control, ControlState::Rebooting { .. })
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn accepts_commands(&self) -> Result<(), Skip> {
        if self.closed {
            Err(Skip::Closed)
        } else if self.rebooting() {
            Err(Skip::Rebooting)
        } else {
            Ok(())
        }
    }

    /// Record an accepted action: the preview is live again.
    pub(crate) fn touch(&mut self) -> Result<(), Skip> {
        self.accepts_commands()?;
        self.timeout_ticks = 0;
        Ok(())
    }

    pub(crate) fn engage_pan_tilt(&mut self) -> Result<(), Skip> {
        self.touch()?;
        if let ControlState::Active { tilting, .. } = &mut self.control {
            *tilting = true;
        }
        Ok(())
    }

    pub(crate) fn release_pan_tilt(&mut self) -> Result<(), Skip> {
        match &mut self.control {
            ControlState::Active { tilting, .. } if *tilting => {
                *tilting = false;
                self.timeout_ticks = 0;
                Ok(())
            }
            _ => Err(Skip::NotEngaged),
        }
    }

    pub(crate) fn engage_zoom(&mut self) -> Result<(), Skip> {
        self.touch()?;
        if let ControlState::Active { zooming, .. } = &mut self.control {
            *zooming = true;
        }
        Ok(())
    }

    pub(crate) fn release_zoom(&mut self) -> Result<(), Skip> {
        match &mut self.control {
            ControlState::Active { zooming, .. } if *zooming => {
                *zooming = false;
                self.timeout_ticks = 0;
                Ok(())
            }
            _ => Err(Skip::NotEngaged),
        }
    }

    /// Enter the lockout, returning the cycle that must end it.
    pub(crate) fn begin_reboot(&mut self) -> Result<u64, Skip> {
        self.accepts_commands()?;
        let cycle = self.next_cycle;
        self.next_cycle += 1;
        self.control = ControlState::Rebooting { cycle };
        Ok(cycle)
    }

    /// Leave the lockout if `cycle` is still the current one.
    pub(crate) fn finish_reboot(&mut self, cycle: u64) -> bool {
        if self.control != (ControlState::Rebooting { cycle }) {
            return false;
        }
        self.control = ControlState::IDLE;
        self.timeout_ticks = 0;
        true
    }

    pub(crate) fn tick(&mut self) -> u32 {
        self.timeout_ticks = self.timeout_ticks.saturating_add(1);
        self.timeout_ticks
    }

    fn close(&mut self) {
        self.control = ControlState::IDLE;
        self.closed = true;
    }
}

/// Session state shared by the session components and their timer tasks.
#[derive(Debug, Clone, Default)]
pub struct SharedState(Arc<Mutex<SessionState>>);

impl SharedState {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn get(&self) -> SessionState {
        self.lock().clone()
    }
}

/// One live control screen for one room.
pub struct Session {
    room: Room,
    state: SharedState,
    modals: ModalRegistry,
    motion: MotionDispatcher,
    liveness: LivenessTimer,
    reboot: RebootOrchestrator,
    presets: PresetManager,
}

impl Session {
    /// Build the session and start its liveness ticker. Must be called
    /// inside a tokio runtime.
    pub fn start(
        room: Room,
        dispatcher: Dispatcher,
        settings: SessionSettings,
        claims: Option<Claims>,
        modals: ModalRegistry,
    ) -> Self {
        let state = SharedState::default();
        let registry = room.registry.clone();

        let mut liveness = LivenessTimer::new(state.clone(), settings.liveness_threshold);
        liveness.start();

        info!(
            "Control session started for {} with {} cameras",
            room.info.room,
            registry.len()
        );

        Self {
            motion: MotionDispatcher::new(registry.clone(), state.clone(), dispatcher.clone()),
            reboot: RebootOrchestrator::new(
                registry.clone(),
                state.clone(),
                dispatcher.clone(),
                settings.reboot_lockout,
                claims,
            ),
            presets: PresetManager::new(registry, state.clone(), dispatcher, modals.clone()),
            liveness,
            modals,
            state,
            room,
        }
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn registry(&self) -> &Arc<CameraRegistry> {
        &self.room.registry
    }

    pub fn camera_ref(&self, index: usize) -> Option<CameraRef> {
        self.room.registry.camera_ref(index)
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn modals(&self) -> &ModalRegistry {
        &self.modals
    }

    pub fn start_tilt(&self, camera: CameraRef, direction: TiltDirection) -> OurResult<Dispatch> {
        self.motion.start_tilt(camera, direction)
    }

    pub fn start_pan(&self, camera: CameraRef, direction: PanDirection) -> OurResult<Dispatch> {
        self.motion.start_pan(camera, direction)
    }

    pub fn stop_pan_tilt(&self, camera: CameraRef) -> OurResult<Dispatch> {
        self.motion.stop_pan_tilt(camera)
    }

    pub fn start_zoom(&self, camera: CameraRef, direction: ZoomDirection) -> OurResult<Dispatch> {
        self.motion.start_zoom(camera, direction)
    }

    pub fn stop_zoom(&self, camera: CameraRef) -> OurResult<Dispatch> {
        self.motion.stop_zoom(camera)
    }

    pub fn list_presets(&self, camera: CameraRef) -> OurResult<&[Preset]> {
        self.presets.list_presets(camera)
    }

    pub fn select_preset(&self, camera: CameraRef, preset: usize) -> OurResult<Dispatch> {
        self.presets.select_preset(camera, preset)
    }

    pub fn can_save(&self, camera: CameraRef) -> OurResult<bool> {
        self.presets.can_save(camera)
    }

    pub fn open_presets(&self, camera: CameraRef) -> OurResult<bool> {
        self.presets.open_dialog(camera)
    }

    pub fn presets(&self) -> &PresetManager {
        &self.presets
    }

    pub fn can_reboot(&self, camera: CameraRef) -> OurResult<bool> {
        self.reboot.can_reboot(camera)
    }

    /// Ask for reboot confirmation. False when the camera cannot be
    /// rebooted, a lockout is running or a confirmation is already showing.
    pub fn request_reboot(&self, camera: CameraRef) -> OurResult<bool> {
        if !self.reboot.can_reboot(camera)? {
            return Ok(false);
        }
        let state = self.state.get();
        if state.rebooting() || state.is_closed() {
            return Ok(false);
        }
        Ok(self.modals.try_open(ModalData::RebootConfirm {
            camera: camera.index(),
        }))
    }

    pub fn cancel_reboot(&self) {
        self.modals.close(ModalKind::RebootConfirm);
    }

    pub fn confirm_reboot(&mut self, camera: CameraRef) -> OurResult<Dispatch> {
        self.modals.close(ModalKind::RebootConfirm);
        self.reboot.confirm(camera)
    }

    pub fn stream_url(&self, camera: CameraRef) -> OurResult<String> {
        let record = self.room.registry.get(camera)?;
        Ok(self.liveness.stream_url(record))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.get();
        let cameras = self
            .room
            .registry
            .iter()
            .map(|(camera, record)| CameraView {
                index: camera.index(),
                display_name: record.display_name.clone(),
                stream_url: self.liveness.stream_url(record),
                presets: record
                    .presets
                    .iter()
                    .map(|preset| preset.display_name.clone())
                    .collect(),
                can_save_presets: PresetManager::camera_can_save(record),
                can_reboot: self.reboot.camera_can_reboot(record),
            })
            .collect();

        SessionSnapshot {
            generation: self.room.registry.generation(),
            room: self.room.info.room.clone(),
            control_group: self.room.info.control_group.clone(),
            title: self.room.title(),
            timeout_ticks: state.timeout_ticks,
            tilting: state.tilting(),
            zooming: state.zooming(),
            rebooting: state.rebooting(),
            cameras,
        }
    }

    /// Stop every timer, release the streams and close the session's
    /// dialogs. Idempotent.
    pub fn teardown(&mut self) {
        if self.state.with(|state| state.is_closed()) {
            return;
        }
        self.liveness.stop();
        self.reboot.cancel();
        self.state.with(SessionState::close);
        self.modals.close(ModalKind::Presets);
        self.modals.close(ModalKind::RebootConfirm);
        info!("Control session for {} closed", self.room.info.room);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engagement_transitions() {
        let mut state = SessionState::default();
        assert_eq!(state.release_pan_tilt(), Err(Skip::NotEngaged));

        state.timeout_ticks = 7;
        state.engage_pan_tilt().expect("accepted");
        assert!(state.tilting());
        assert_eq!(state.timeout_ticks, 0);

        state.engage_zoom().expect("accepted");
        assert!(state.zooming());
        state.release_zoom().expect("engaged");
        assert!(!state.zooming());
        assert!(state.tilting());
        assert_eq!(state.release_zoom(), Err(Skip::NotEngaged));
    }

    #[test]
    fn test_reboot_clears_engagement_and_refuses_motion() {
        let mut state = SessionState::default();
        state.engage_pan_tilt().expect("accepted");
        let cycle = state.begin_reboot().expect("idle");
        assert!(state.rebooting());
        assert!(!state.tilting());
        assert_eq!(state.engage_zoom(), Err(Skip::Rebooting));
        assert_eq!(state.release_pan_tilt(), Err(Skip::NotEngaged));
        assert_eq!(state.begin_reboot(), Err(Skip::Rebooting));

        assert!(!state.finish_reboot(cycle + 1));
        state.timeout_ticks = 30;
        assert!(state.finish_reboot(cycle));
        assert!(!state.finish_reboot(cycle));
        assert_eq!(state.control, ControlState::IDLE);
        assert_eq!(state.timeout_ticks, 0);
    }

    #[test]
    fn test_tick_saturates() {
        let mut state = SessionState {
            timeout_ticks: u32::MAX,
            ..Default::default()
        };
        assert_eq!(state.tick(), u32::MAX);
    }

    #[test]
    fn test_closed_session_refuses_commands() {
        let mut state = SessionState::default();
        state.engage_zoom().expect("accepted");
        state.close();
        assert!(!state.zooming());
        assert_eq!(state.touch(), Err(Skip::Closed));
        assert_eq!(state.begin_reboot(), Err(Skip::Closed));
    }
}
