//! Camera descriptor registry.
//!
//! Each successful room resolution builds a brand new registry with a fresh
//! generation number. Consumers address cameras through [`CameraRef`]
//! handles, so a handle taken from an earlier registry is rejected instead
//! of being dispatched against the wrong camera.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::protocol::{Camera, Preset};
use crate::{OurError, OurResult};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Handle to one camera in one specific registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraRef {
    generation: u64,
    index: usize,
}

impl CameraRef {
    /// Rebuild a handle from the parts a client echoed back. Whether it
    /// still names a camera is decided by [`CameraRegistry::get`].
    pub fn new(generation: u64, index: usize) -> Self {
        Self { generation, index }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug)]
pub struct CameraRegistry {
    generation: u64,
    cameras: Vec<Camera>,
}

impl CameraRegistry {
    pub fn new(cameras: Vec<Camera>) -> Self {
        Self {
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            cameras,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    pub fn camera_ref(&self, index: usize) -> Option<CameraRef> {
        (index < self.cameras.len()).then_some(CameraRef {
            generation: self.generation,
            index,
        })
    }

    pub fn refs(&self) -> impl Iterator<Item = CameraRef> + '_ {
        (0..self.cameras.len()).map(|index| CameraRef {
            generation: self.generation,
            index,
        })
    }

    pub fn get(&self, camera: CameraRef) -> OurResult<&Camera> {
        if camera.generation != self.generation {
            return Err(OurError::StaleCamera(format!(
                "camera {} belongs to a replaced camera list",
                camera.index
            )));
        }
        self.cameras
            .get(camera.index)
            .ok_or_else(|| OurError::StaleCamera(format!("no camera at index {}", camera.index)))
    }

    pub fn preset(&self, camera: CameraRef, preset: usize) -> OurResult<&Preset> {
        let record = self.get(camera)?;
        record.presets.get(preset).ok_or_else(|| {
            OurError::App(format!(
                "camera '{}' has no preset at index {preset}",
                record.display_name
            ))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (CameraRef, &Camera)> + '_ {
        self.refs().zip(self.cameras.iter())
    }
}
