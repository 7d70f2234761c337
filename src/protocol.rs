//! Wire types shared between the control API, the session core and the
//! browser bridge.

use serde::{Deserialize, Serialize};
use serde_with::{DefaultOnNull, NoneAsEmptyString, serde_as};

/// Result of resolving a room key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlInfo {
    pub room: String,
    pub control_group: String,
    pub control_key: String,
}

/// One controllable camera as described by the server.
///
/// Every action is an opaque command URL, or `None` when the camera does
/// not support it. Servers send `""` for unsupported actions.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    pub display_name: String,

    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub tilt_up: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub tilt_down: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub pan_left: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub pan_right: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub pan_tilt_stop: Option<String>,

    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub zoom_in: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub zoom_out: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub zoom_stop: Option<String>,

    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub reboot: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub stream: Option<String>,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub presets: Vec<Preset>,
}

impl Camera {
    /// Command URL for a motion action, if the camera supports it
    pub fn endpoint(&self, action: CameraAction) -> Option<&str> {
        let url = match action {
            CameraAction::TiltUp => &self.tilt_up,
            CameraAction::TiltDown => &self.tilt_down,
            CameraAction::PanLeft => &self.pan_left,
            CameraAction::PanRight => &self.pan_right,
            CameraAction::PanTiltStop => &self.pan_tilt_stop,
            CameraAction::ZoomIn => &self.zoom_in,
            CameraAction::ZoomOut => &self.zoom_out,
            CameraAction::ZoomStop => &self.zoom_stop,
            CameraAction::Reboot => &self.reboot,
        };
        url.as_deref()
    }
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub display_name: String,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub set_preset: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub save_preset: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TiltDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanDirection {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoomDirection {
    In,
    Out,
}

/// Every command a camera record can carry, outside of presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraAction {
    TiltUp,
    TiltDown,
    PanLeft,
    PanRight,
    PanTiltStop,
    ZoomIn,
    ZoomOut,
    ZoomStop,
    Reboot,
}

impl CameraAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraAction::TiltUp => "tilt-up",
            CameraAction::TiltDown => "tilt-down",
            CameraAction::PanLeft => "pan-left",
            CameraAction::PanRight => "pan-right",
            CameraAction::PanTiltStop => "pan-tilt-stop",
            CameraAction::ZoomIn => "zoom-in",
            CameraAction::ZoomOut => "zoom-out",
            CameraAction::ZoomStop => "zoom-stop",
            CameraAction::Reboot => "reboot",
        }
    }
}

impl From<TiltDirection> for CameraAction {
    fn from(direction: TiltDirection) -> Self {
        match direction {
            TiltDirection::Up => CameraAction::TiltUp,
            TiltDirection::Down => CameraAction::TiltDown,
        }
    }
}

impl From<PanDirection> for CameraAction {
    fn from(direction: PanDirection) -> Self {
        match direction {
            PanDirection::Left => CameraAction::PanLeft,
            PanDirection::Right => CameraAction::PanRight,
        }
    }
}

impl From<ZoomDirection> for CameraAction {
    fn from(direction: ZoomDirection) -> Self {
        match direction {
            ZoomDirection::In => CameraAction::ZoomIn,
            ZoomDirection::Out => CameraAction::ZoomOut,
        }
    }
}

/// Per-camera view of a session snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraView {
    pub index: usize,
    pub display_name: String,
    /// Empty when the preview has timed out or the camera is rebooting
    pub stream_url: String,
    pub presets: Vec<String>,
    pub can_save_presets: bool,
    pub can_reboot: bool,
}

/// Read-only picture of a control session for the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Camera list generation; per-camera requests must echo it back
    pub generation: u64,
    pub room: String,
    pub control_group: String,
    pub title: String,
    pub timeout_ticks: u32,
    pub tilting: bool,
    pub zooming: bool,
    pub rebooting: bool,
    pub cameras: Vec<CameraView>,
}

/// Generic API response
#[derive(Debug, Serialize)]
pub(crate) struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub(crate) fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: "Success".to_string(),
        }
    }

    pub(crate) fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message,
        }
    }
}
