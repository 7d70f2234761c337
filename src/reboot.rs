//! Camera reboot with a fixed lockout window.
//!
//! `Idle -> Rebooting -> Idle`. The lockout timer carries the cycle number
//! of the reboot that started it and only ends that cycle, so the return to
//! idle happens once per reboot however often the console is redrawn.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::claims::Claims;
use crate::protocol::{Camera, CameraAction};
use crate::registry::{CameraRef, CameraRegistry};
use crate::session::{Dispatch, SharedState, Skip};
use crate::transport::Dispatcher;
use crate::OurResult;

pub struct RebootOrchestrator {
    registry: Arc<CameraRegistry>,
    state: SharedState,
    dispatcher: Dispatcher,
    lockout: Duration,
    claims: Option<Claims>,
    lockout_task: Option<JoinHandle<()>>,
}

impl RebootOrchestrator {
    pub fn new(
        registry: Arc<CameraRegistry>,
        state: SharedState,
        dispatcher: Dispatcher,
        lockout: Duration,
        claims: Option<Claims>,
    ) -> Self {
        Self {
            registry,
            state,
            dispatcher,
            lockout,
            claims,
            lockout_task: None,
        }
    }

    fn permitted(&self) -> bool {
        self.claims
            .as_ref()
            .is_some_and(|claims| claims.can_restart_camera)
    }

    pub(crate) fn camera_can_reboot(&self, camera: &Camera) -> bool {
        self.permitted() && camera.reboot.is_some()
    }

    pub fn can_reboot(&self, camera: CameraRef) -> OurResult<bool> {
        Ok(self.camera_can_reboot(self.registry.get(camera)?))
    }

    /// Issue the reboot and start the lockout.
    pub fn confirm(&mut self, camera: CameraRef) -> OurResult<Dispatch> {
        let record = self.registry.get(camera)?;
        if !self.permitted() {
            debug!(camera = %record.display_name, "reboot not permitted by claims");
            return Ok(Dispatch::Skipped(Skip::NotPermitted));
        }
        let Some(url) = record.endpoint(CameraAction::Reboot) else {
            debug!(camera = %record.display_name, "no reboot endpoint, skipping");
            return Ok(Dispatch::Skipped(Skip::Unsupported));
        };

        let cycle = match self.state.with(|s| s.begin_reboot()) {
            Ok(cycle) => cycle,
            Err(skip) => {
                debug!(camera = %record.display_name, "reboot refused: {skip:?}");
                return Ok(Dispatch::Skipped(skip));
            }
        };

        self.dispatcher
            .fire(&record.display_name, CameraAction::Reboot.as_str(), url);
        info!(
            camera = %record.display_name,
            "Rebooting, controls locked for {}s",
            self.lockout.as_secs()
        );

        let state = self.state.clone();
        let lockout = self.lockout;
        let camera_name = record.display_name.clone();
        self.lockout_task = Some(tokio::spawn(async move {
            tokio::time::sleep(lockout).await;
            if state.with(|s| s.finish_reboot(cycle)) {
                info!(camera = %camera_name, "Reboot lockout over, controls unlocked");
            }
        }));

        Ok(Dispatch::Sent)
    }

    /// Abort a pending lockout timer.
    pub fn cancel(&mut self) {
        if let Some(task) = self.lockout_task.take() {
            task.abort();
        }
    }
}

impl Drop for RebootOrchestrator {
    fn drop(&mut self) {
        self.cancel();
    }
}
