//! Control session routes: room entry, gestures, presets, reboot and modals.

use super::prelude::*;

use crate::console::ConsoleHandle;
use crate::error::{AuthError, FetchError};
use crate::modal::{ModalData, ModalKind, OpenModal};
use crate::protocol::{PanDirection, SessionSnapshot, TiltDirection, ZoomDirection};
use crate::registry::CameraRef;
use crate::{OurError, OurResult};

const NO_SESSION: &str = "No active control session";

type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

fn reply<T>(status: StatusCode, data: T) -> Reply<T> {
    (status, Json(ApiResponse::success(data)))
}

fn fail<T>(status: StatusCode, message: String) -> Reply<T> {
    (status, Json(ApiResponse::error(message)))
}

fn status_for(error: &OurError) -> StatusCode {
    match error {
        OurError::Auth(AuthError::InvalidCode) | OurError::Fetch(FetchError::NotAuthorized(_)) => {
            StatusCode::UNAUTHORIZED
        }
        OurError::Auth(AuthError::Generic(_)) | OurError::Fetch(FetchError::Generic(_)) => {
            StatusCode::BAD_GATEWAY
        }
        OurError::StaleCamera(_) => StatusCode::NOT_FOUND,
        OurError::App(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Deserialize)]
pub(crate) struct EnterRequest {
    key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResumeRequest {
    room: String,
    control_group: String,
}

/// Camera routes carry the generation of the camera list the page was
/// drawn from.
#[derive(Debug, Deserialize)]
pub(crate) struct CameraQuery {
    generation: u64,
}

impl CameraQuery {
    fn camera(&self, index: usize) -> CameraRef {
        CameraRef::new(self.generation, index)
    }
}

/// Everything the browser needs to draw the console.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConsoleView {
    title: String,
    at_entry: bool,
    session: Option<SessionSnapshot>,
    modals: Vec<OpenModal>,
}

async fn console_view(state: &AppState) -> ConsoleView {
    let session = match state.console().await {
        Some(console) => console.snapshot().await.ok(),
        None => None,
    };
    let view = state.view.get();
    ConsoleView {
        title: view.title,
        at_entry: view.at_entry,
        session,
        modals: state.modals.open_modals(),
    }
}

pub(crate) async fn get_session(State(state): State<Arc<AppState>>) -> Json<ApiResponse<ConsoleView>> {
    Json(ApiResponse::success(console_view(&state).await))
}

#[instrument(skip_all)]
pub(crate) async fn enter_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EnterRequest>,
) -> Reply<ConsoleView> {
    let entered = state
        .resolver
        .enter_room(&request.key, &state.modals, &state.view)
        .await;
    finish_entry(&state, entered).await
}

#[instrument(skip_all)]
pub(crate) async fn resume_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResumeRequest>,
) -> Reply<ConsoleView> {
    let entered = state
        .resolver
        .reenter_room(
            &request.room,
            &request.control_group,
            &state.modals,
            &state.view,
        )
        .await;
    finish_entry(&state, entered).await
}

async fn finish_entry(state: &AppState, entered: OurResult<crate::auth::Room>) -> Reply<ConsoleView> {
    match entered {
        Ok(room) => {
            info!("Entering {}", room.info.room);
            state.replace_session(room).await;
            reply(StatusCode::OK, console_view(state).await)
        }
        Err(e) => {
            if matches!(e, OurError::Fetch(_)) {
                state.end_session().await;
            }
            fail(status_for(&e), e.to_string())
        }
    }
}

pub(crate) async fn exit_session(State(state): State<Arc<AppState>>) -> Reply<bool> {
    let ended = state.end_session().await;
    if ended {
        info!("Control session exited");
    }
    reply(StatusCode::OK, ended)
}

async fn with_console(
    state: &AppState,
    action: impl FnOnce(&ConsoleHandle) -> OurResult<()>,
) -> Reply<()> {
    let Some(console) = state.console().await else {
        return fail(StatusCode::CONFLICT, NO_SESSION.to_string());
    };
    match action(&console) {
        Ok(()) => reply(StatusCode::ACCEPTED, ()),
        Err(e) => {
            error!("Failed to queue control event: {e}");
            fail(status_for(&e), e.to_string())
        }
    }
}

pub(crate) async fn start_tilt(
    State(state): State<Arc<AppState>>,
    Path((index, direction)): Path<(usize, TiltDirection)>,
    Query(query): Query<CameraQuery>,
) -> Reply<()> {
    let camera = query.camera(index);
    with_console(&state, |console| console.start_tilt(camera, direction)).await
}

pub(crate) async fn start_pan(
    State(state): State<Arc<AppState>>,
    Path((index, direction)): Path<(usize, PanDirection)>,
    Query(query): Query<CameraQuery>,
) -> Reply<()> {
    let camera = query.camera(index);
    with_console(&state, |console| console.start_pan(camera, direction)).await
}

pub(crate) async fn stop_pan_tilt(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Query(query): Query<CameraQuery>,
) -> Reply<()> {
    let camera = query.camera(index);
    with_console(&state, |console| console.stop_pan_tilt(camera)).await
}

pub(crate) async fn start_zoom(
    State(state): State<Arc<AppState>>,
    Path((index, direction)): Path<(usize, ZoomDirection)>,
    Query(query): Query<CameraQuery>,
) -> Reply<()> {
    let camera = query.camera(index);
    with_console(&state, |console| console.start_zoom(camera, direction)).await
}

pub(crate) async fn stop_zoom(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Query(query): Query<CameraQuery>,
) -> Reply<()> {
    let camera = query.camera(index);
    with_console(&state, |console| console.stop_zoom(camera)).await
}

pub(crate) async fn select_preset(
    State(state): State<Arc<AppState>>,
    Path((index, preset)): Path<(usize, usize)>,
    Query(query): Query<CameraQuery>,
) -> Reply<()> {
    let camera = query.camera(index);
    with_console(&state, |console| console.select_preset(camera, preset)).await
}

pub(crate) async fn save_preset(
    State(state): State<Arc<AppState>>,
    Path((index, preset)): Path<(usize, usize)>,
    Query(query): Query<CameraQuery>,
) -> Reply<()> {
    let camera = query.camera(index);
    with_console(&state, |console| console.save_preset(camera, preset)).await
}

/// Open the presets dialog. `false` when the camera cannot save or the
/// dialog is already showing.
pub(crate) async fn open_presets(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Query(query): Query<CameraQuery>,
) -> Reply<bool> {
    let Some(console) = state.console().await else {
        return fail(StatusCode::CONFLICT, NO_SESSION.to_string());
    };
    match console.open_presets(query.camera(index)).await {
        Ok(opened) => reply(StatusCode::OK, opened),
        Err(e) => fail(status_for(&e), e.to_string()),
    }
}

pub(crate) async fn request_reboot(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Query(query): Query<CameraQuery>,
) -> Reply<bool> {
    let Some(console) = state.console().await else {
        return fail(StatusCode::CONFLICT, NO_SESSION.to_string());
    };
    match console.request_reboot(query.camera(index)).await {
        Ok(opened) => reply(StatusCode::OK, opened),
        Err(e) => fail(status_for(&e), e.to_string()),
    }
}

pub(crate) async fn confirm_reboot(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Query(query): Query<CameraQuery>,
) -> Reply<()> {
    let camera = query.camera(index);
    with_console(&state, |console| console.confirm_reboot(camera)).await
}

pub(crate) async fn cancel_reboot(State(state): State<Arc<AppState>>) -> Reply<()> {
    with_console(&state, ConsoleHandle::cancel_reboot).await
}

pub(crate) async fn close_modal(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<ModalKind>,
) -> Reply<bool> {
    let closed = state.modals.close(kind);
    if let Some(modal) = &closed {
        debug!("Closed {kind:?} modal after {} suppressed requests", modal.suppressed);
    }
    reply(StatusCode::OK, closed.is_some())
}

#[derive(Template, WebTemplate)]
#[template(path = "console.html")]
pub(crate) struct ConsoleTemplate {
    title: String,
    session: Option<SessionSnapshot>,
    errors: Vec<String>,
}

pub(crate) async fn console_page(State(state): State<Arc<AppState>>) -> ConsoleTemplate {
    let view = console_view(&state).await;
    ConsoleTemplate {
        title: view.title,
        session: view.session,
        errors: view
            .modals
            .into_iter()
            .filter_map(|modal| match modal.data {
                ModalData::Error { message } => Some(message),
                _ => None,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failures_map_to_unauthorized() {
        assert_eq!(
            status_for(&OurError::Auth(AuthError::InvalidCode)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&OurError::Fetch(FetchError::NotAuthorized("ROOM-A".to_string()))),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&OurError::Auth(AuthError::Generic("down".to_string()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&OurError::StaleCamera("9".to_string())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_console_template_renders_cameras() {
        let template = ConsoleTemplate {
            title: "ROOM-A Camera Control".to_string(),
            session: Some(SessionSnapshot {
                generation: 7,
                room: "ROOM-A".to_string(),
                control_group: "main".to_string(),
                title: "ROOM-A Camera Control".to_string(),
                timeout_ticks: 0,
                tilting: false,
                zooming: false,
                rebooting: false,
                cameras: vec![crate::protocol::CameraView {
                    index: 0,
                    display_name: "cam1".to_string(),
                    stream_url: "https://cam1/stream".to_string(),
                    presets: vec!["Wide".to_string()],
                    can_save_presets: false,
                    can_reboot: false,
                }],
            }),
            errors: vec!["Invalid room code".to_string()],
        };
        let html = template.render().expect("renders");
        assert!(html.contains("ROOM-A Camera Control"));
        assert!(html.contains("https://cam1/stream"));
        assert!(html.contains("Invalid room code"));
        assert!(html.contains("generation=7"));
    }
}
