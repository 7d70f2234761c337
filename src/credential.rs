//! Short-lived persistence of the control credential, so that reopening the
//! console does not force a new room key.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::protocol::ControlInfo;
use crate::OurResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredential {
    pub room: String,
    pub control_group: String,
    pub control_key: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredCredential {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn control_info(&self) -> ControlInfo {
        ControlInfo {
            room: self.room.clone(),
            control_group: self.control_group.clone(),
            control_key: self.control_key.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    ttl: Duration,
}

impl CredentialStore {
    pub fn new(path: PathBuf, ttl: Duration) -> Self {
        Self { path, ttl }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.credential_path(),
            Duration::seconds(settings.credential_ttl_secs),
        )
    }

    /// Overwrite whatever was stored with a freshly resolved credential.
    pub fn save(&self, info: &ControlInfo, now: DateTime<Utc>) -> OurResult<StoredCredential> {
        let stored = StoredCredential {
            room: info.room.clone(),
            control_group: info.control_group.clone(),
            control_key: info.control_key.clone(),
            expires_at: now + self.ttl,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&stored)?)?;
        debug!("Saved control credential for {} to {:?}", stored.room, self.path);
        Ok(stored)
    }

    /// The stored credential, unless it is missing, unreadable or expired.
    pub fn load(&self, now: DateTime<Utc>) -> Option<StoredCredential> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read control credential from {:?}: {e}", self.path);
                return None;
            }
        };

        let stored = match serde_json::from_str::<StoredCredential>(&contents) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Failed to parse control credential from {:?}: {e}", self.path);
                return None;
            }
        };

        if stored.is_expired(now) {
            info!("Stored control credential for {} has expired", stored.room);
            self.clear().ok();
            return None;
        }
        Some(stored)
    }

    pub fn clear(&self) -> OurResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(room: &str, key: &str) -> ControlInfo {
        ControlInfo {
            room: room.to_string(),
            control_group: "main".to_string(),
            control_key: key.to_string(),
        }
    }

    #[test]
    fn test_save_then_load_within_ttl() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CredentialStore::new(dir.path().join("key.json"), Duration::hours(1));
        let now = Utc::now();

        let saved = store.save(&info("ROOM-A", "tok-1"), now).expect("save");
        assert_eq!(saved.expires_at, now + Duration::hours(1));

        let loaded = store.load(now + Duration::minutes(59)).expect("still valid");
        assert_eq!(loaded.control_info(), info("ROOM-A", "tok-1"));
    }

    #[test]
    fn test_expired_credential_is_dropped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("key.json");
        let store = CredentialStore::new(path.clone(), Duration::hours(1));
        let now = Utc::now();

        store.save(&info("ROOM-A", "tok-1"), now).expect("save");
        assert!(store.load(now + Duration::hours(1)).is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_new_resolution_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CredentialStore::new(dir.path().join("nested").join("key.json"), Duration::hours(1));
        let now = Utc::now();

        store.save(&info("ROOM-A", "tok-1"), now).expect("save");
        store.save(&info("ROOM-B", "tok-2"), now).expect("save");
        let loaded = store.load(now).expect("valid");
        assert_eq!(loaded.room, "ROOM-B");
        assert_eq!(loaded.control_key, "tok-2");
    }

    #[test]
    fn test_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("key.json");
        let store = CredentialStore::new(path.clone(), Duration::hours(1));
        assert!(store.load(Utc::now()).is_none());
        assert!(store.clear().is_ok());

        fs::write(&path, "not json").expect("write");
        assert!(store.load(Utc::now()).is_none());
    }
}
