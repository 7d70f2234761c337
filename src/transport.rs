//! Camera command transport.
//!
//! Camera commands are single unacknowledged GETs against URLs supplied by
//! the server. [`Dispatcher::fire`] spawns the request and returns at once;
//! a failure is logged as a [`CommandError`] and goes no further.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use crate::config::Settings;
use crate::error::CommandError;
use crate::OurResult;

#[async_trait]
pub trait CommandTransport: Send + Sync + 'static {
    /// Issue one GET against a server-supplied command URL.
    async fn get(&self, url: &str) -> Result<(), CommandError>;
}

/// reqwest-backed transport. Relative command URLs resolve against the
/// control API origin.
pub struct HttpTransport {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(settings: &Settings) -> OurResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self {
            base_url: settings.api_base_url()?,
            client,
        })
    }

    fn resolve(&self, url: &str) -> Result<Url, CommandError> {
        self.base_url.join(url).map_err(|source| CommandError::InvalidUrl {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl CommandTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<(), CommandError> {
        let target = self.resolve(url)?;
        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|source| CommandError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(CommandError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }
}

/// Shared front of a [`CommandTransport`] used by every session component.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn CommandTransport>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn CommandTransport>) -> Self {
        Self { transport }
    }

    /// Fire-and-forget: the caller never waits on the response.
    pub fn fire(&self, camera: &str, action: &'static str, url: &str) {
        let transport = self.transport.clone();
        let camera = camera.to_string();
        let url = url.to_string();
        debug!(camera = %camera, action, "dispatching {url}");

        tokio::spawn(async move {
            match transport.get(&url).await {
                Ok(()) => debug!(camera = %camera, action, "command accepted"),
                Err(e) => warn!(camera = %camera, action, "command failed: {e}"),
            }
        });
    }

    /// Issue a command and wait for the outcome.
    pub async fn send(&self, url: &str) -> Result<(), CommandError> {
        self.transport.get(url).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::CommandTransport;
    use crate::error::CommandError;

    /// Records every URL it is asked to GET.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingTransport {
        calls: Arc<Mutex<Vec<String>>>,
        fail: bool,
        delay: Option<Duration>,
    }

    impl RecordingTransport {
        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        /// Fails every request, each after `delay`.
        pub(crate) fn failing_after(delay: Duration) -> Self {
            Self {
                fail: true,
                delay: Some(delay),
                ..Default::default()
            }
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    #[async_trait]
    impl CommandTransport for RecordingTransport {
        async fn get(&self, url: &str) -> Result<(), CommandError> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(url.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                Err(CommandError::Status {
                    url: url.to_string(),
                    status: 503,
                })
            } else {
                Ok(())
            }
        }
    }

    /// Let spawned fire-and-forget requests run.
    pub(crate) async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }
}
