//! The control loop.
//!
//! The presentation layer never calls into a [`Session`] directly: it sends
//! [`ControlEvent`]s through a [`ConsoleHandle`] and the [`Console`] task
//! applies them in order. Exiting, or dropping every handle, tears the
//! session down.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::protocol::{PanDirection, SessionSnapshot, TiltDirection, ZoomDirection};
use crate::registry::CameraRef;
use crate::session::{Dispatch, Session, Skip};
use crate::{OurError, OurResult};

/// Operator gestures. Cameras are addressed by [`CameraRef`], so a gesture
/// from a page drawn for an earlier camera list is rejected.
#[derive(Debug)]
pub enum ControlEvent {
    StartTilt {
        camera: CameraRef,
        direction: TiltDirection,
    },
    StartPan {
        camera: CameraRef,
        direction: PanDirection,
    },
    StopPanTilt {
        camera: CameraRef,
    },
    StartZoom {
        camera: CameraRef,
        direction: ZoomDirection,
    },
    StopZoom {
        camera: CameraRef,
    },
    SelectPreset {
        camera: CameraRef,
        preset: usize,
    },
    OpenPresets {
        camera: CameraRef,
        respond_to: oneshot::Sender<OurResult<bool>>,
    },
    SavePreset {
        camera: CameraRef,
        preset: usize,
    },
    RequestReboot {
        camera: CameraRef,
        respond_to: oneshot::Sender<OurResult<bool>>,
    },
    CancelReboot,
    ConfirmReboot {
        camera: CameraRef,
    },
    Snapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
    Exit,
}

pub struct Console {
    session: Session,
    receiver: mpsc::UnboundedReceiver<ControlEvent>,
    /// Preset saves in flight; aborted with the session
    saves: JoinSet<bool>,
}

/// Cloneable sender side of a running [`Console`].
#[derive(Clone, Debug)]
pub struct ConsoleHandle {
    sender: mpsc::UnboundedSender<ControlEvent>,
}

impl Console {
    pub fn new(session: Session) -> (Self, ConsoleHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let console = Self {
            session,
            receiver,
            saves: JoinSet::new(),
        };
        (console, ConsoleHandle { sender })
    }

    /// Spawn the control loop onto the runtime.
    pub fn spawn(session: Session) -> ConsoleHandle {
        let (console, handle) = Self::new(session);
        tokio::spawn(console.run());
        handle
    }

    pub async fn run(mut self) {
        info!("Console running for {}", self.session.room().info.room);
        while let Some(event) = self.receiver.recv().await {
            if matches!(event, ControlEvent::Exit) {
                break;
            }
            self.handle(event);
        }

        if !self.saves.is_empty() {
            debug!("Abandoning {} preset saves in flight", self.saves.len());
        }
        self.saves.abort_all();
        self.session.teardown();
        info!("Console for {} stopped", self.session.room().info.room);
    }

    fn handle(&mut self, event: ControlEvent) {
        debug!("Console event: {event:?}");
        match event {
            ControlEvent::StartTilt { camera, direction } => {
                self.gesture(camera, |s| s.start_tilt(camera, direction))
            }
            ControlEvent::StartPan { camera, direction } => {
                self.gesture(camera, |s| s.start_pan(camera, direction))
            }
            ControlEvent::StopPanTilt { camera } => {
                self.gesture(camera, |s| s.stop_pan_tilt(camera))
            }
            ControlEvent::StartZoom { camera, direction } => {
                self.gesture(camera, |s| s.start_zoom(camera, direction))
            }
            ControlEvent::StopZoom { camera } => self.gesture(camera, |s| s.stop_zoom(camera)),
            ControlEvent::SelectPreset { camera, preset } => {
                self.gesture(camera, |s| s.select_preset(camera, preset))
            }
            ControlEvent::OpenPresets { camera, respond_to } => {
                let _ = respond_to.send(self.session.open_presets(camera));
            }
            ControlEvent::SavePreset { camera, preset } => {
                // reap finished saves so the set stays small
                while self.saves.try_join_next().is_some() {}
                match self.session.presets().prepare_save(camera, preset) {
                    Ok(Ok(pending)) => {
                        self.saves.spawn(pending.run());
                    }
                    Ok(Err(skip)) => debug!("Preset save skipped: {skip:?}"),
                    Err(e) => warn!("Preset save rejected: {e}"),
                }
            }
            ControlEvent::RequestReboot { camera, respond_to } => {
                let _ = respond_to.send(self.session.request_reboot(camera));
            }
            ControlEvent::CancelReboot => self.session.cancel_reboot(),
            ControlEvent::ConfirmReboot { camera } => {
                let result = self.session.confirm_reboot(camera);
                log_outcome("reboot", camera, result);
            }
            ControlEvent::Snapshot { respond_to } => {
                let _ = respond_to.send(self.session.snapshot());
            }
            ControlEvent::Exit => {}
        }
    }

    fn gesture(&self, camera: CameraRef, action: impl FnOnce(&Session) -> OurResult<Dispatch>) {
        log_outcome("gesture", camera, action(&self.session));
    }
}

fn log_outcome(kind: &str, camera: CameraRef, result: OurResult<Dispatch>) {
    let index = camera.index();
    match result {
        Ok(Dispatch::Skipped(Skip::NotEngaged)) | Ok(Dispatch::Sent) | Ok(Dispatch::LocalOnly) => {}
        Ok(Dispatch::Skipped(skip)) => debug!("{kind} on camera {index} skipped: {skip:?}"),
        Err(e) => warn!("{kind} on camera {index} rejected: {e}"),
    }
}

impl ConsoleHandle {
    fn send(&self, event: ControlEvent) -> OurResult<()> {
        self.sender
            .send(event)
            .map_err(|_| OurError::App("Control session has ended".to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn start_tilt(&self, camera: CameraRef, direction: TiltDirection) -> OurResult<()> {
        self.send(ControlEvent::StartTilt { camera, direction })
    }

    pub fn start_pan(&self, camera: CameraRef, direction: PanDirection) -> OurResult<()> {
        self.send(ControlEvent::StartPan { camera, direction })
    }

    pub fn stop_pan_tilt(&self, camera: CameraRef) -> OurResult<()> {
        self.send(ControlEvent::StopPanTilt { camera })
    }

    pub fn start_zoom(&self, camera: CameraRef, direction: ZoomDirection) -> OurResult<()> {
        self.send(ControlEvent::StartZoom { camera, direction })
    }

    pub fn stop_zoom(&self, camera: CameraRef) -> OurResult<()> {
        self.send(ControlEvent::StopZoom { camera })
    }

    pub fn select_preset(&self, camera: CameraRef, preset: usize) -> OurResult<()> {
        self.send(ControlEvent::SelectPreset { camera, preset })
    }

    pub fn save_preset(&self, camera: CameraRef, preset: usize) -> OurResult<()> {
        self.send(ControlEvent::SavePreset { camera, preset })
    }

    pub async fn open_presets(&self, camera: CameraRef) -> OurResult<bool> {
        let (respond_to, receiver) = oneshot::channel();
        self.send(ControlEvent::OpenPresets { camera, respond_to })?;
        receiver
            .await
            .map_err(|_| OurError::App("Control session did not respond".to_string()))?
    }

    pub async fn request_reboot(&self, camera: CameraRef) -> OurResult<bool> {
        let (respond_to, receiver) = oneshot::channel();
        self.send(ControlEvent::RequestReboot { camera, respond_to })?;
        receiver
            .await
            .map_err(|_| OurError::App("Control session did not respond".to_string()))?
    }

    pub fn cancel_reboot(&self) -> OurResult<()> {
        self.send(ControlEvent::CancelReboot)
    }

    pub fn confirm_reboot(&self, camera: CameraRef) -> OurResult<()> {
        self.send(ControlEvent::ConfirmReboot { camera })
    }

    pub async fn snapshot(&self) -> OurResult<SessionSnapshot> {
        let (respond_to, receiver) = oneshot::channel();
        self.send(ControlEvent::Snapshot { respond_to })?;
        receiver
            .await
            .map_err(|_| OurError::App("Control session did not respond".to_string()))
    }

    pub fn exit(&self) -> OurResult<()> {
        self.send(ControlEvent::Exit)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::auth::Room;
    use crate::claims::Claims;
    use crate::config::SessionSettings;
    use crate::modal::{ModalKind, ModalRegistry};
    use crate::protocol::{Camera, ControlInfo, Preset};
    use crate::registry::CameraRegistry;
    use crate::transport::Dispatcher;
    use crate::transport::testing::{RecordingTransport, settle};

    fn room() -> Room {
        let cam1 = Camera {
            display_name: "cam1".to_string(),
            tilt_up: Some("https://cam1/tilt/up".to_string()),
            pan_tilt_stop: Some("https://cam1/pantilt/stop".to_string()),
            reboot: Some("https://cam1/reboot".to_string()),
            stream: Some("https://cam1/stream".to_string()),
            presets: vec![Preset {
                display_name: "Lectern".to_string(),
                set_preset: Some("https://cam1/preset/1".to_string()),
                save_preset: Some("https://cam1/preset/1/save".to_string()),
            }],
            ..Default::default()
        };
        let cam2 = Camera {
            display_name: "cam2".to_string(),
            stream: Some("https://cam2/stream".to_string()),
            presets: vec![
                Preset {
                    display_name: "Wide".to_string(),
                    set_preset: Some("u1".to_string()),
                    save_preset: None,
                },
                Preset {
                    display_name: "Close".to_string(),
                    set_preset: Some("u2".to_string()),
                    save_preset: None,
                },
            ],
            ..Default::default()
        };
        Room {
            info: ControlInfo {
                room: "ROOM-A".to_string(),
                control_group: "main".to_string(),
                control_key: "tok-1".to_string(),
            },
            registry: Arc::new(CameraRegistry::new(vec![cam1, cam2])),
        }
    }

    /// Start a console; returns its handle and refs to cam1 and cam2.
    fn start(
        transport: &RecordingTransport,
        modals: ModalRegistry,
    ) -> (ConsoleHandle, CameraRef, CameraRef) {
        let room = room();
        let cam1 = room.registry.camera_ref(0).expect("cam1");
        let cam2 = room.registry.camera_ref(1).expect("cam2");
        let session = Session::start(
            room,
            Dispatcher::new(Arc::new(transport.clone())),
            SessionSettings::default(),
            Some(Claims {
                subject: None,
                expires_at: None,
                can_restart_camera: true,
            }),
            modals,
        );
        (Console::spawn(session), cam1, cam2)
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_apply_in_order() {
        let transport = RecordingTransport::default();
        let (handle, cam1, cam2) = start(&transport, ModalRegistry::new());

        handle.stop_pan_tilt(cam1).expect("sent");
        handle.start_tilt(cam1, TiltDirection::Up).expect("sent");
        handle.stop_pan_tilt(cam1).expect("sent");
        handle.select_preset(cam2, 0).expect("sent");
        let snapshot = handle.snapshot().await.expect("snapshot");
        settle().await;

        assert_eq!(
            transport.calls(),
            vec![
                "https://cam1/tilt/up".to_string(),
                "https://cam1/pantilt/stop".to_string(),
                "u1".to_string()
            ]
        );
        assert_eq!(snapshot.room, "ROOM-A");
        assert_eq!(snapshot.generation, cam1.generation());
        assert!(!snapshot.tilting);
        assert!(!snapshot.cameras[1].can_save_presets);
        assert!(snapshot.cameras[0].can_reboot);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reboot_flow_through_console() {
        let transport = RecordingTransport::default();
        let modals = ModalRegistry::new();
        let (handle, cam1, cam2) = start(&transport, modals.clone());

        assert!(handle.request_reboot(cam1).await.expect("answered"));
        assert!(!handle.request_reboot(cam1).await.expect("answered"));
        assert!(!handle.request_reboot(cam2).await.expect("answered"));
        handle.confirm_reboot(cam1).expect("sent");

        let snapshot = handle.snapshot().await.expect("snapshot");
        assert!(snapshot.rebooting);
        assert_eq!(snapshot.cameras[0].stream_url, "");
        assert_eq!(snapshot.cameras[1].stream_url, "");
        assert!(!modals.is_open(ModalKind::RebootConfirm));

        // no confirmation is offered while the lockout runs
        assert!(!handle.request_reboot(cam1).await.expect("answered"));
        assert!(!modals.is_open(ModalKind::RebootConfirm));

        tokio::time::advance(Duration::from_secs(45)).await;
        settle().await;
        let snapshot = handle.snapshot().await.expect("snapshot");
        assert!(!snapshot.rebooting);
        assert_eq!(snapshot.cameras[0].stream_url, "https://cam1/stream");
        assert!(handle.request_reboot(cam1).await.expect("answered"));
    }

    #[tokio::test]
    async fn test_exit_ends_the_loop() {
        let transport = RecordingTransport::default();
        let (handle, cam1, _cam2) = start(&transport, ModalRegistry::new());

        handle.exit().expect("sent");
        settle().await;
        assert!(handle.is_closed());
        assert!(handle.snapshot().await.is_err());
        assert!(handle.start_tilt(cam1, TiltDirection::Up).is_err());
    }

    #[tokio::test]
    async fn test_unknown_camera_is_absorbed() {
        let transport = RecordingTransport::default();
        let (handle, cam1, _cam2) = start(&transport, ModalRegistry::new());
        let missing = CameraRef::new(cam1.generation(), 9);

        handle.start_tilt(missing, TiltDirection::Up).expect("sent");
        assert!(matches!(
            handle.open_presets(missing).await,
            Err(OurError::StaleCamera(_))
        ));
        let snapshot = handle.snapshot().await.expect("still running");
        assert!(!snapshot.tilting);
        settle().await;
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_ref_from_another_camera_list_is_rejected() {
        let transport = RecordingTransport::default();
        let (handle, cam1, _cam2) = start(&transport, ModalRegistry::new());
        let other = CameraRegistry::new(room().registry.iter().map(|(_, c)| c.clone()).collect());
        let stale = other.camera_ref(0).expect("cam1 in other list");
        assert_eq!(stale.index(), cam1.index());

        handle.start_tilt(stale, TiltDirection::Up).expect("sent");
        assert!(matches!(
            handle.request_reboot(stale).await,
            Err(OurError::StaleCamera(_))
        ));
        handle.confirm_reboot(stale).expect("sent");
        let snapshot = handle.snapshot().await.expect("snapshot");
        settle().await;

        assert!(transport.calls().is_empty());
        assert!(!snapshot.tilting);
        assert!(!snapshot.rebooting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_abandons_preset_save_in_flight() {
        let transport = RecordingTransport::failing_after(Duration::from_secs(5));
        let modals = ModalRegistry::new();
        let (handle, cam1, _cam2) = start(&transport, modals.clone());

        assert!(handle.open_presets(cam1).await.expect("answered"));
        handle.save_preset(cam1, 0).expect("sent");
        handle.snapshot().await.expect("save queued");
        settle().await;
        assert_eq!(transport.calls(), vec!["https://cam1/preset/1/save".to_string()]);

        handle.exit().expect("sent");
        settle().await;
        assert!(!modals.is_open(ModalKind::Presets));

        assert!(modals.try_open(crate::modal::ModalData::Presets { camera: 0 }));
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;

        assert!(!modals.is_open(ModalKind::Error));
        assert!(modals.is_open(ModalKind::Presets));
    }
}
