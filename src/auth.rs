//! Room key authentication and camera list resolution.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::credential::CredentialStore;
use crate::error::{AuthError, FetchError};
use crate::modal::{Navigator, NotificationSurface};
use crate::protocol::{Camera, ControlInfo};
use crate::registry::CameraRegistry;
use crate::{OurError, OurResult};

/// A resolved room: its control information and the camera list fetched
/// with it.
#[derive(Debug, Clone)]
pub struct Room {
    pub info: ControlInfo,
    pub registry: Arc<CameraRegistry>,
}

impl Room {
    pub fn title(&self) -> String {
        room_title(&self.info.room)
    }
}

/// View title for a room.
pub fn room_title(room: &str) -> String {
    format!("{room} Camera Control")
}

#[derive(Debug, Clone)]
pub struct AuthResolver {
    api: ApiClient,
    credentials: CredentialStore,
}

impl AuthResolver {
    pub fn new(api: ApiClient, credentials: CredentialStore) -> Self {
        Self { api, credentials }
    }

    /// Exchange a room key for control information.
    pub async fn resolve(&self, key: &str) -> Result<ControlInfo, AuthError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(AuthError::InvalidCode);
        }
        self.api.get_control_info(key).await
    }

    pub async fn list_cameras(&self, info: &ControlInfo) -> Result<Vec<Camera>, FetchError> {
        self.api.get_cameras(info).await
    }

    /// Full entry flow for a room key: resolve, persist the credential, set
    /// the title and load a fresh camera registry. Failures are reported
    /// through `notifications`; a camera list failure also navigates back
    /// to key entry.
    pub async fn enter_room(
        &self,
        key: &str,
        notifications: &dyn NotificationSurface,
        navigator: &dyn Navigator,
    ) -> OurResult<Room> {
        let info = match self.resolve(key).await {
            Ok(info) => info,
            Err(e) => {
                notifications.show_error(&e.to_string());
                return Err(e.into());
            }
        };
        info!("Room key resolved to {} ({})", info.room, info.control_group);

        if let Err(e) = self.credentials.save(&info, Utc::now()) {
            warn!("Unable to persist control credential: {e}");
        }
        navigator.set_title(&room_title(&info.room));

        self.load_room(info, notifications, navigator).await
    }

    /// Re-open a room with the stored credential, without a new room key.
    pub async fn reenter_room(
        &self,
        room: &str,
        control_group: &str,
        notifications: &dyn NotificationSurface,
        navigator: &dyn Navigator,
    ) -> OurResult<Room> {
        let stored = self
            .credentials
            .load(Utc::now())
            .filter(|stored| stored.room == room && stored.control_group == control_group);

        let Some(stored) = stored else {
            let e = FetchError::NotAuthorized(room.to_string());
            navigator.return_to_entry();
            notifications.show_error(&e.to_string());
            return Err(e.into());
        };

        navigator.set_title(&room_title(room));
        self.load_room(stored.control_info(), notifications, navigator)
            .await
    }

    async fn load_room(
        &self,
        info: ControlInfo,
        notifications: &dyn NotificationSurface,
        navigator: &dyn Navigator,
    ) -> OurResult<Room> {
        match self.list_cameras(&info).await {
            Ok(cameras) => {
                info!("Loaded {} cameras for {}", cameras.len(), info.room);
                Ok(Room {
                    info,
                    registry: Arc::new(CameraRegistry::new(cameras)),
                })
            }
            Err(e) => {
                navigator.return_to_entry();
                notifications.show_error(&e.to_string());
                Err(OurError::Fetch(e))
            }
        }
    }
}
