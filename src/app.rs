use crate::config::Config;
use crate::firestore::FirestoreStore;
use crate::models::MediaKind;
use crate::my_list::{DocumentStore, MemoryStore};
use crate::session::{verify_session, UserId, SESSION_COOKIE};
use crate::tmdb::{TmdbApi, TmdbClient};
use crate::ui::{self, ControllerHandle, Msg, Rejection, Services, ViewModel};
use crate::view;
use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, Redirect},
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::TypedHeader;
use headers::Cookie;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const MAX_BODY_BYTES: usize = 16 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub controller: ControllerHandle,
    pub session_secret: Arc<str>,
}

pub async fn run_server(config: Config) -> Result<()> {
    let tmdb: Arc<dyn TmdbApi> = Arc::new(TmdbClient::new(&config.tmdb_api_key)?);
    let store: Arc<dyn DocumentStore> = match &config.firestore {
        Some(fs) => {
            info!(project = %fs.project_id, "Using Firestore for My List");
            Arc::new(FirestoreStore::new(&fs.project_id, fs.id_token.clone())?)
        }
        None => {
            warn!("FIRESTORE_PROJECT_ID not set, My List is kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let controller = ui::spawn(Services {
        tmdb,
        store,
        list_refresh: config.list_refresh,
    });
    let state = AppState {
        controller,
        session_secret: Arc::from(config.session_secret.as_str()),
    };

    let app = build_router(state);

    info!("Listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/api/view", get(view_json))
        .route("/select", post(select))
        .route("/close", post(close))
        .route("/mute", post(mute))
        .route("/my-list/toggle", post(toggle_list))
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

type Cookies = Option<TypedHeader<Cookie>>;

fn session_user(state: &AppState, cookies: &Cookies) -> Option<UserId> {
    cookies
        .as_ref()
        .and_then(|TypedHeader(c)| c.get(SESSION_COOKIE))
        .and_then(|value| {
            let user = verify_session(value, &state.session_secret);
            if user.is_none() {
                warn!("Ignoring session cookie with a bad signature");
            }
            user
        })
}

/// Apply `action` for whoever the cookie names. The session switch and the
/// action reach the controller as one batch.
async fn dispatch(
    state: &AppState,
    cookies: &Cookies,
    action: Option<Msg>,
) -> Result<(), StatusCode> {
    let mut msgs = vec![Msg::Session(session_user(state, cookies))];
    msgs.extend(action);
    state.controller.dispatch_batch(msgs).await.map_err(|err| {
        if let Some(rejection) = err.downcast_ref::<Rejection>() {
            warn!("Rejected request: {}", rejection);
            StatusCode::NOT_FOUND
        } else {
            error!("UI controller unavailable: {:#}", err);
            StatusCode::SERVICE_UNAVAILABLE
        }
    })
}

async fn home(State(state): State<AppState>, cookies: Cookies) -> Result<Html<String>, StatusCode> {
    dispatch(&state, &cookies, None).await?;
    Ok(Html(view::render_page(&state.controller.view())))
}

async fn view_json(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Json<ViewModel>, StatusCode> {
    dispatch(&state, &cookies, None).await?;
    Ok(Json(ViewModel::clone(&state.controller.view())))
}

#[derive(Debug, Deserialize)]
struct SelectForm {
    media_type: MediaKind,
    id: i64,
}

async fn select(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<SelectForm>,
) -> Result<Redirect, StatusCode> {
    let action = Msg::Select {
        kind: form.media_type,
        id: form.id,
    };
    dispatch(&state, &cookies, Some(action)).await?;
    Ok(Redirect::to("/"))
}

async fn close(State(state): State<AppState>, cookies: Cookies) -> Result<Redirect, StatusCode> {
    dispatch(&state, &cookies, Some(Msg::Close)).await?;
    Ok(Redirect::to("/"))
}

async fn mute(State(state): State<AppState>, cookies: Cookies) -> Result<Redirect, StatusCode> {
    dispatch(&state, &cookies, Some(Msg::ToggleMuted)).await?;
    Ok(Redirect::to("/"))
}

async fn toggle_list(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Redirect, StatusCode> {
    dispatch(&state, &cookies, Some(Msg::ToggleList)).await?;
    Ok(Redirect::to("/"))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
