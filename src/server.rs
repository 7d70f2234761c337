//! Browser bridge for the control console, using Axum.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Router, middleware,
    routing::{get, post},
};
use chrono::Utc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::api::ApiClient;
use crate::auth::{AuthResolver, Room};
use crate::claims::{self, Claims};
use crate::config::Settings;
use crate::console::{Console, ConsoleHandle};
use crate::credential::CredentialStore;
use crate::modal::{ModalKind, ModalRegistry, Navigator};
use crate::session::Session;
use crate::transport::{Dispatcher, HttpTransport};
use crate::web_server;
use crate::{OurError, OurResult};

pub(crate) const ENTRY_TITLE: &str = "Camera Control";

/// What the page is showing: key entry or a room's controls.
#[derive(Debug, Clone)]
pub struct ViewState {
    inner: Arc<Mutex<ViewInfo>>,
}

#[derive(Debug, Clone)]
pub struct ViewInfo {
    pub title: String,
    pub at_entry: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ViewInfo {
                title: ENTRY_TITLE.to_string(),
                at_entry: true,
            })),
        }
    }
}

impl ViewState {
    fn lock(&self) -> MutexGuard<'_, ViewInfo> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> ViewInfo {
        self.lock().clone()
    }
}

impl Navigator for ViewState {
    fn return_to_entry(&self) {
        let mut view = self.lock();
        view.at_entry = true;
        view.title = ENTRY_TITLE.to_string();
    }

    fn set_title(&self, title: &str) {
        let mut view = self.lock();
        view.at_entry = false;
        view.title = title.to_string();
    }
}

/// Application state shared across handlers
pub struct AppState {
    pub settings: Settings,
    pub resolver: AuthResolver,
    pub dispatcher: Dispatcher,
    pub modals: ModalRegistry,
    pub view: ViewState,
    pub claims: Option<Claims>,
    console: RwLock<Option<ConsoleHandle>>,
}

impl AppState {
    /// Build the state from settings, with the reqwest-backed API client
    /// and command transport.
    pub fn new(settings: Settings) -> OurResult<Self> {
        let resolver = AuthResolver::new(
            ApiClient::new(&settings)?,
            CredentialStore::from_settings(&settings),
        );
        let dispatcher = Dispatcher::new(Arc::new(HttpTransport::new(&settings)?));

        let claims = match settings.access_token.as_deref() {
            Some(token) => match claims::validate(token, Utc::now()) {
                Ok(claims) => {
                    info!(
                        "Access token accepted, camera restart {}",
                        if claims.can_restart_camera { "allowed" } else { "not allowed" }
                    );
                    Some(claims)
                }
                Err(e) => {
                    warn!("Ignoring access token: {e}");
                    None
                }
            },
            None => None,
        };

        Ok(Self::with_parts(settings, resolver, dispatcher, claims))
    }

    pub fn with_parts(
        settings: Settings,
        resolver: AuthResolver,
        dispatcher: Dispatcher,
        claims: Option<Claims>,
    ) -> Self {
        Self {
            settings,
            resolver,
            dispatcher,
            modals: ModalRegistry::new(),
            view: ViewState::default(),
            claims,
            console: RwLock::new(None),
        }
    }

    /// Start a session for `room`, ending whichever one was running.
    pub async fn replace_session(&self, room: Room) -> ConsoleHandle {
        let session = Session::start(
            room,
            self.dispatcher.clone(),
            self.settings.session_settings(),
            self.claims.clone(),
            self.modals.clone(),
        );
        let handle = Console::spawn(session);

        let previous = self.console.write().await.replace(handle.clone());
        if let Some(previous) = previous {
            // the old loop may already be gone
            let _ = previous.exit();
        }
        handle
    }

    /// End the running session, if any. Returns whether one was running.
    pub async fn end_session(&self) -> bool {
        let previous = self.console.write().await.take();
        self.modals.close(ModalKind::Presets);
        self.modals.close(ModalKind::RebootConfirm);
        match previous {
            Some(handle) => {
                let _ = handle.exit();
                true
            }
            None => false,
        }
    }

    pub async fn console(&self) -> Option<ConsoleHandle> {
        self.console
            .read()
            .await
            .as_ref()
            .filter(|handle| !handle.is_closed())
            .cloned()
    }
}

/// Build the router, split out so tests can serve it on their own listener.
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route(
            "/api/v1/session",
            get(web_server::session::get_session)
                .post(web_server::session::enter_session)
                .delete(web_server::session::exit_session),
        )
        .route(
            "/api/v1/session/resume",
            post(web_server::session::resume_session),
        )
        .route(
            "/api/v1/session/cameras/{index}/tilt/{direction}",
            post(web_server::session::start_tilt),
        )
        .route(
            "/api/v1/session/cameras/{index}/pan/{direction}",
            post(web_server::session::start_pan),
        )
        .route(
            "/api/v1/session/cameras/{index}/pan-tilt/stop",
            post(web_server::session::stop_pan_tilt),
        )
        .route(
            "/api/v1/session/cameras/{index}/zoom/stop",
            post(web_server::session::stop_zoom),
        )
        .route(
            "/api/v1/session/cameras/{index}/zoom/{direction}",
            post(web_server::session::start_zoom),
        )
        .route(
            "/api/v1/session/cameras/{index}/presets",
            post(web_server::session::open_presets),
        )
        .route(
            "/api/v1/session/cameras/{index}/presets/{preset}/select",
            post(web_server::session::select_preset),
        )
        .route(
            "/api/v1/session/cameras/{index}/presets/{preset}/save",
            post(web_server::session::save_preset),
        )
        .route(
            "/api/v1/session/cameras/{index}/reboot",
            post(web_server::session::request_reboot),
        )
        .route(
            "/api/v1/session/cameras/{index}/reboot/confirm",
            post(web_server::session::confirm_reboot),
        )
        .route(
            "/api/v1/session/reboot/cancel",
            post(web_server::session::cancel_reboot),
        )
        .route(
            "/api/v1/modals/{kind}/close",
            post(web_server::session::close_modal),
        )
        .layer(middleware::from_fn(
            web_server::middleware::no_store_middleware,
        ));

    Router::new()
        .route("/", get(web_server::session::console_page))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the web server
pub async fn start_server(host: String, port: u16, settings: Settings) -> OurResult<()> {
    let state = Arc::new(AppState::new(settings)?);
    let app = create_router(state.clone());

    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| OurError::App(format!("Failed to bind to {addr}: {e}")))?;

    info!("Web server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| OurError::App(format!("Server error: {e}")))?;

    if state.end_session().await {
        info!("Closed the active control session on shutdown");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
}
