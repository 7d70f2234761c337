//! Stream liveness: an idle preview is starved to save bandwidth.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::info;

use crate::protocol::Camera;
use crate::session::SharedState;

const TICK: Duration = Duration::from_secs(1);

pub struct LivenessTimer {
    state: SharedState,
    threshold: u32,
    task: Option<JoinHandle<()>>,
}

impl LivenessTimer {
    pub fn new(state: SharedState, threshold: u32) -> Self {
        Self {
            state,
            threshold,
            task: None,
        }
    }

    /// Start counting idle seconds. A no-op if already running.
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }

        let state = self.state.clone();
        let threshold = self.threshold;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + TICK, TICK);
            loop {
                ticker.tick().await;
                if state.with(|s| s.tick()) == threshold {
                    info!("Preview timing out after {threshold}s without control input");
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// The camera's stream URL, or empty while the preview is timed out,
    /// the camera is rebooting or the session is closed.
    pub fn stream_url(&self, camera: &Camera) -> String {
        let state = self.state.get();
        if state.is_closed() || state.rebooting() || state.timeout_ticks >= self.threshold {
            return String::new();
        }
        camera.stream.clone().unwrap_or_default()
    }
}

impl Drop for LivenessTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::settle;

    fn camera() -> Camera {
        Camera {
            display_name: "cam1".to_string(),
            stream: Some("https://cam1/stream".to_string()),
            ..Default::default()
        }
    }

    async fn idle_for(seconds: u32) {
        for _ in 0..seconds {
            tokio::time::advance(TICK).await;
            settle().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_second() {
        let state = SharedState::default();
        let mut timer = LivenessTimer::new(state.clone(), 60);
        timer.start();
        settle().await;
        assert_eq!(state.get().timeout_ticks, 0);

        idle_for(3).await;
        assert_eq!(state.get().timeout_ticks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_withheld_at_threshold() {
        let state = SharedState::default();
        let mut timer = LivenessTimer::new(state.clone(), 60);
        timer.start();
        settle().await;

        idle_for(59).await;
        assert_eq!(timer.stream_url(&camera()), "https://cam1/stream");

        idle_for(1).await;
        assert_eq!(state.get().timeout_ticks, 60);
        assert_eq!(timer.stream_url(&camera()), "");

        state.with(|s| s.touch()).expect("accepted");
        assert_eq!(timer.stream_url(&camera()), "https://cam1/stream");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_ticker() {
        let state = SharedState::default();
        let mut timer = LivenessTimer::new(state.clone(), 5);
        timer.start();
        settle().await;
        idle_for(2).await;

        timer.stop();
        assert!(!timer.is_running());
        idle_for(10).await;
        assert_eq!(state.get().timeout_ticks, 2);
    }

    #[test]
    fn test_camera_without_stream() {
        let timer = LivenessTimer::new(SharedState::default(), 60);
        let camera = Camera::default();
        assert_eq!(timer.stream_url(&camera), "");
    }
}
