//! Pan, tilt and zoom gestures.
//!
//! Pan and tilt share one engagement flag, zoom has its own. A stop is only
//! sent when the matching axis is engaged, so releasing a control that never
//! started a move costs no request. Engagement follows operator intent: it
//! is set when the start is issued, whatever happens to the request.

use std::sync::Arc;

use tracing::debug;

use crate::protocol::{CameraAction, PanDirection, TiltDirection, ZoomDirection};
use crate::registry::{CameraRef, CameraRegistry};
use crate::session::{Dispatch, SessionState, SharedState, Skip};
use crate::transport::Dispatcher;
use crate::OurResult;

pub struct MotionDispatcher {
    registry: Arc<CameraRegistry>,
    state: SharedState,
    dispatcher: Dispatcher,
}

impl MotionDispatcher {
    pub fn new(registry: Arc<CameraRegistry>, state: SharedState, dispatcher: Dispatcher) -> Self {
        Self {
            registry,
            state,
            dispatcher,
        }
    }

    pub fn start_tilt(&self, camera: CameraRef, direction: TiltDirection) -> OurResult<Dispatch> {
        self.start(camera, direction.into(), SessionState::engage_pan_tilt)
    }

    pub fn start_pan(&self, camera: CameraRef, direction: PanDirection) -> OurResult<Dispatch> {
        self.start(camera, direction.into(), SessionState::engage_pan_tilt)
    }

    pub fn stop_pan_tilt(&self, camera: CameraRef) -> OurResult<Dispatch> {
        self.stop(camera, CameraAction::PanTiltStop, SessionState::release_pan_tilt)
    }

    pub fn start_zoom(&self, camera: CameraRef, direction: ZoomDirection) -> OurResult<Dispatch> {
        self.start(camera, direction.into(), SessionState::engage_zoom)
    }

    pub fn stop_zoom(&self, camera: CameraRef) -> OurResult<Dispatch> {
        self.stop(camera, CameraAction::ZoomStop, SessionState::release_zoom)
    }

    fn start(
        &self,
        camera: CameraRef,
        action: CameraAction,
        engage: fn(&mut SessionState) -> Result<(), Skip>,
    ) -> OurResult<Dispatch> {
        let record = self.registry.get(camera)?;
        let Some(url) = record.endpoint(action) else {
            debug!(camera = %record.display_name, action = action.as_str(), "no endpoint, skipping");
            return Ok(Dispatch::Skipped(Skip::Unsupported));
        };

        if let Err(skip) = self.state.with(engage) {
            debug!(camera = %record.display_name, action = action.as_str(), "refused: {skip:?}");
            return Ok(Dispatch::Skipped(skip));
        }

        self.dispatcher
            .fire(&record.display_name, action.as_str(), url);
        Ok(Dispatch::Sent)
    }

    fn stop(
        &self,
        camera: CameraRef,
        action: CameraAction,
        release: fn(&mut SessionState) -> Result<(), Skip>,
    ) -> OurResult<Dispatch> {
        let record = self.registry.get(camera)?;

        if let Err(skip) = self.state.with(release) {
            debug!(camera = %record.display_name, action = action.as_str(), "ignored: {skip:?}");
            return Ok(Dispatch::Skipped(skip));
        }

        match record.endpoint(action) {
            Some(url) => {
                self.dispatcher
                    .fire(&record.display_name, action.as_str(), url);
                Ok(Dispatch::Sent)
            }
            None => {
                debug!(camera = %record.display_name, action = action.as_str(), "stopped locally, no endpoint");
                Ok(Dispatch::LocalOnly)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Camera;
    use crate::transport::testing::{RecordingTransport, settle};
    use crate::OurError;

    fn cam1() -> Camera {
        Camera {
            display_name: "cam1".to_string(),
            tilt_up: Some("https://cam1/tilt/up".to_string()),
            tilt_down: Some("https://cam1/tilt/down".to_string()),
            pan_left: Some("https://cam1/pan/left".to_string()),
            pan_tilt_stop: Some("https://cam1/pantilt/stop".to_string()),
            zoom_in: Some("https://cam1/zoom/in".to_string()),
            zoom_stop: Some("https://cam1/zoom/stop".to_string()),
            stream: Some("https://cam1/stream".to_string()),
            ..Default::default()
        }
    }

    fn bare() -> Camera {
        Camera {
            display_name: "bare".to_string(),
            tilt_up: Some("https://bare/tilt/up".to_string()),
            zoom_in: Some("https://bare/zoom/in".to_string()),
            ..Default::default()
        }
    }

    fn setup() -> (MotionDispatcher, SharedState, RecordingTransport, Arc<CameraRegistry>) {
        let registry = Arc::new(CameraRegistry::new(vec![cam1(), bare()]));
        let state = SharedState::default();
        let transport = RecordingTransport::default();
        let motion = MotionDispatcher::new(
            registry.clone(),
            state.clone(),
            Dispatcher::new(Arc::new(transport.clone())),
        );
        (motion, state, transport, registry)
    }

    #[tokio::test]
    async fn test_start_tilt_sends_and_engages() {
        let (motion, state, transport, registry) = setup();
        let cam = registry.camera_ref(0).expect("cam1");
        state.with(|s| s.timeout_ticks = 12);

        assert_eq!(motion.start_tilt(cam, TiltDirection::Up).expect("dispatch"), Dispatch::Sent);
        settle().await;

        assert_eq!(transport.calls(), vec!["https://cam1/tilt/up".to_string()]);
        let s = state.get();
        assert!(s.tilting());
        assert_eq!(s.timeout_ticks, 0);
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let (motion, state, transport, registry) = setup();
        let cam = registry.camera_ref(0).expect("cam1");
        state.with(|s| s.timeout_ticks = 4);

        assert_eq!(
            motion.stop_pan_tilt(cam).expect("dispatch"),
            Dispatch::Skipped(Skip::NotEngaged)
        );
        assert_eq!(
            motion.stop_zoom(cam).expect("dispatch"),
            Dispatch::Skipped(Skip::NotEngaged)
        );
        settle().await;

        assert!(transport.calls().is_empty());
        let s = state.get();
        assert!(!s.tilting());
        assert_eq!(s.timeout_ticks, 4);
    }

    #[tokio::test]
    async fn test_exactly_one_stop_after_start() {
        let (motion, state, transport, registry) = setup();
        let cam = registry.camera_ref(0).expect("cam1");

        motion.start_pan(cam, PanDirection::Left).expect("dispatch");
        assert_eq!(motion.stop_pan_tilt(cam).expect("dispatch"), Dispatch::Sent);
        assert_eq!(
            motion.stop_pan_tilt(cam).expect("dispatch"),
            Dispatch::Skipped(Skip::NotEngaged)
        );
        settle().await;

        assert_eq!(
            transport.calls(),
            vec![
                "https://cam1/pan/left".to_string(),
                "https://cam1/pantilt/stop".to_string()
            ]
        );
        assert!(!state.get().tilting());
    }

    #[tokio::test]
    async fn test_zoom_stop_always_clears() {
        let (motion, state, transport, registry) = setup();
        let cam = registry.camera_ref(0).expect("cam1");

        motion.start_zoom(cam, ZoomDirection::In).expect("dispatch");
        assert!(state.get().zooming());
        motion.stop_zoom(cam).expect("dispatch");
        assert!(!state.get().zooming());
        settle().await;

        assert_eq!(
            transport.calls(),
            vec![
                "https://cam1/zoom/in".to_string(),
                "https://cam1/zoom/stop".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_absent_endpoint_is_skipped_without_state_change() {
        let (motion, state, transport, registry) = setup();
        let cam = registry.camera_ref(0).expect("cam1");
        state.with(|s| s.timeout_ticks = 9);

        // cam1 has no pan-right or zoom-out endpoint
        assert_eq!(
            motion.start_pan(cam, PanDirection::Right).expect("dispatch"),
            Dispatch::Skipped(Skip::Unsupported)
        );
        assert_eq!(
            motion.start_zoom(cam, ZoomDirection::Out).expect("dispatch"),
            Dispatch::Skipped(Skip::Unsupported)
        );
        settle().await;

        assert!(transport.calls().is_empty());
        let s = state.get();
        assert!(!s.tilting());
        assert!(!s.zooming());
        assert_eq!(s.timeout_ticks, 9);
    }

    #[tokio::test]
    async fn test_engaged_stop_without_endpoint_clears_locally() {
        let (motion, state, transport, registry) = setup();
        let cam = registry.camera_ref(1).expect("bare");

        motion.start_tilt(cam, TiltDirection::Up).expect("dispatch");
        motion.start_zoom(cam, ZoomDirection::In).expect("dispatch");
        assert_eq!(motion.stop_pan_tilt(cam).expect("dispatch"), Dispatch::LocalOnly);
        assert_eq!(motion.stop_zoom(cam).expect("dispatch"), Dispatch::LocalOnly);
        settle().await;

        assert_eq!(transport.calls().len(), 2);
        let s = state.get();
        assert!(!s.tilting());
        assert!(!s.zooming());
    }

    #[tokio::test]
    async fn test_engagement_survives_failed_request() {
        let registry = Arc::new(CameraRegistry::new(vec![cam1()]));
        let state = SharedState::default();
        let transport = RecordingTransport::failing();
        let motion = MotionDispatcher::new(
            registry.clone(),
            state.clone(),
            Dispatcher::new(Arc::new(transport.clone())),
        );
        let cam = registry.camera_ref(0).expect("cam1");

        motion.start_tilt(cam, TiltDirection::Down).expect("dispatch");
        settle().await;

        assert_eq!(transport.calls().len(), 1);
        assert!(state.get().tilting());
    }

    #[tokio::test]
    async fn test_stale_camera_rejected() {
        let (motion, _state, transport, _registry) = setup();
        let other = CameraRegistry::new(vec![cam1()]);
        let stale = other.camera_ref(0).expect("cam1");

        assert!(matches!(
            motion.start_tilt(stale, TiltDirection::Up),
            Err(OurError::StaleCamera(_))
        ));
        settle().await;
        assert!(transport.calls().is_empty());
    }
}
