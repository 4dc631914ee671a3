// ABOUTME: Main entry point for the haven disguised safety portal backend
// ABOUTME: Sets up the web server, routes, and initialization logic

use axum::{
    Router,
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

mod auth_helpers;
mod backend;
mod derive;
mod entities;
mod error;
mod middleware;
mod migration;
mod objects;
mod reconcile;
mod session;
mod storage;
mod types;
mod vault;

#[cfg(test)]
mod integration_tests;

use error::{AppError, Result};
use objects::ObjectStore;
use reconcile::{AuthOutcome, Reconciler};
use session::SessionStore;
use storage::Storage;
use vault::{CaptureMeta, EvidenceVault};

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub sessions: SessionStore,
    pub reconciler: Arc<Reconciler>,
    pub vault: Arc<EvidenceVault>,
}

struct Config {
    addr: String,
    db_url: String,
    objects_dir: String,
}

impl Config {
    fn from_env() -> Self {
        Self {
            addr: std::env::var("HAVEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            db_url: std::env::var("HAVEN_DB")
                .unwrap_or_else(|_| "sqlite:haven.db?mode=rwc".to_string()),
            objects_dir: std::env::var("HAVEN_OBJECTS")
                .unwrap_or_else(|_| "haven_objects".to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "haven=info,tower_http=warn".into()),
        )
        .init();

    let config = Config::from_env();

    let storage = Arc::new(Storage::new(&config.db_url).await?);
    let objects = Arc::new(ObjectStore::new(&config.objects_dir));
    let vault = Arc::new(EvidenceVault::new(Arc::clone(&storage), objects));

    let app_state = AppState {
        storage,
        sessions: SessionStore::new(),
        reconciler: Arc::new(Reconciler::new()),
        vault,
    };

    // Backend-side session expiry: sweep tokens older than the cookie max-age
    let sessions = app_state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(600));
        loop {
            interval.tick().await;
            sessions.cleanup_expired_sessions(session::SESSION_MAX_AGE);
        }
    });

    let app = build_router(app_state);

    let listener = TcpListener::bind(&config.addr).await?;
    println!("📰 Server running on http://{}", config.addr);

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/pin", post(submit_pin))
        .route("/exit", post(quick_exit))
        .route("/preferences", get(get_preferences).put(update_preferences))
        .route("/evidence", post(capture_evidence).get(list_evidence))
        .route("/evidence/:id", axum::routing::patch(update_evidence).delete(destroy_evidence))
        .route("/media/url", post(media_url))
        .route("/media/purge", post(media_purge))
        .route("/objects/:token", get(serve_object))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

async fn submit_pin(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<types::PinRequest>,
) -> Result<(CookieJar, Json<types::PinResponse>)> {
    let outcome = state
        .reconciler
        .authenticate(
            state.storage.as_ref(),
            &state.sessions,
            &req.pin,
            &req.platform_id,
            req.display_name.as_deref().unwrap_or(""),
        )
        .await?;

    match outcome {
        AuthOutcome::Established(established) => {
            // Determine if we should use secure cookies (HTTPS)
            let is_secure = false; // TODO: detect from request or config
            let cookie =
                session::create_session_cookie(established.session_token.clone(), is_secure);
            let jar = jar.add(cookie);

            Ok((
                jar,
                Json(types::PinResponse {
                    status: "ok".to_string(),
                    account_id: Some(established.account_id),
                    display_name: Some(established.display_name),
                    preferences: Some(established.preferences),
                }),
            ))
        }
        AuthOutcome::WrongPin => Ok((
            jar,
            Json(types::PinResponse {
                status: "wrong_pin".to_string(),
                account_id: None,
                display_name: None,
                preferences: None,
            }),
        )),
        AuthOutcome::Busy => Ok((
            jar,
            Json(types::PinResponse {
                status: "busy".to_string(),
                account_id: None,
                display_name: None,
                preferences: None,
            }),
        )),
    }
}

async fn quick_exit(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<types::SimpleResponse>) {
    if let Some(token) = session::session_cookie_value(&jar) {
        state.sessions.remove_session(&token);
    }

    let jar = jar.add(session::create_exit_cookie());
    (jar, Json(types::SimpleResponse { success: true }))
}

async fn get_preferences(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<backend::Preferences>> {
    use crate::backend::AuthBackend;

    let account_id = auth_helpers::account_from_session(&jar, &state)?;
    let prefs = state
        .storage
        .get_preferences(&account_id)
        .await
        .map_err(|err| AppError::Backend(err.to_string()))?;

    Ok(Json(prefs))
}

async fn update_preferences(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<types::UpdatePreferencesRequest>,
) -> Result<Json<types::SimpleResponse>> {
    use crate::backend::AuthBackend;

    let account_id = auth_helpers::account_from_session(&jar, &state)?;
    let prefs = backend::Preferences {
        language: req.language,
        calendar: req.calendar,
    };

    state
        .storage
        .set_preferences(&account_id, &prefs)
        .await
        .map_err(|err| AppError::Backend(err.to_string()))?;

    Ok(Json(types::SimpleResponse { success: true }))
}

async fn capture_evidence(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<types::CaptureRequest>,
) -> Result<Json<types::CaptureResponse>> {
    if !vault::threat_level_in_bounds(req.threat_level) {
        return Err(AppError::InvalidInput(
            "threat level must be between 1 and 5".to_string(),
        ));
    }

    // Fails closed: capture without a session reports failure, not an error
    let Ok(session_data) = auth_helpers::validate_session(&jar, &state) else {
        return Ok(Json(types::CaptureResponse {
            success: false,
            record_id: None,
            storage_key: None,
        }));
    };

    let meta = CaptureMeta {
        incident_kind: req.incident_kind,
        description: req.description,
        threat_level: req.threat_level,
    };

    let record = match req.data {
        Some(data) if !data.is_empty() => {
            let mime = req.mime.as_deref().unwrap_or("application/octet-stream");
            state
                .vault
                .upload(&session_data.account_id, &data, mime, &meta)
                .await
        }
        _ => {
            state
                .vault
                .record_without_file(&session_data.account_id, &meta)
                .await
        }
    };

    Ok(Json(match record {
        Some(record) => types::CaptureResponse {
            success: true,
            record_id: Some(record.id),
            storage_key: Some(record.storage_key),
        },
        None => types::CaptureResponse {
            success: false,
            record_id: None,
            storage_key: None,
        },
    }))
}

async fn list_evidence(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<types::ListEvidenceResponse>> {
    let account_id = auth_helpers::account_from_session(&jar, &state)?;
    let records = state.vault.list(&account_id).await?;

    Ok(Json(types::ListEvidenceResponse {
        records: records.into_iter().map(Into::into).collect(),
    }))
}

async fn update_evidence(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
    jar: CookieJar,
    Json(req): Json<types::EvidenceUpdateRequest>,
) -> Result<Json<types::EvidenceSummary>> {
    let account_id = auth_helpers::account_from_session(&jar, &state)?;

    let updated = state
        .vault
        .update(
            &account_id,
            record_id,
            req.description,
            req.threat_level,
            req.incident_kind,
            req.archived,
        )
        .await?;

    updated
        .map(|record| Json(record.into()))
        .ok_or_else(|| AppError::NotFound(format!("evidence record {}", record_id)))
}

async fn destroy_evidence(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
    jar: CookieJar,
) -> Result<Json<types::SimpleResponse>> {
    let account_id = auth_helpers::account_from_session(&jar, &state)?;
    let success = state.vault.delete_evidence(&account_id, record_id).await;

    Ok(Json(types::SimpleResponse { success }))
}

async fn media_url(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<types::MediaUrlRequest>,
) -> Result<Json<types::MediaUrlResponse>> {
    let account_id = auth_helpers::account_from_session(&jar, &state)?;
    let url = state
        .vault
        .signed_url(&account_id, &req.storage_key, req.thumbnail)
        .await;

    Ok(Json(types::MediaUrlResponse { url }))
}

async fn media_purge(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<types::PurgeRequest>,
) -> Result<Json<types::SimpleResponse>> {
    let account_id = auth_helpers::account_from_session(&jar, &state)?;
    let success = state.vault.purge_file(&account_id, &req.storage_key).await;

    Ok(Json(types::SimpleResponse { success }))
}

async fn serve_object(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response> {
    let Some((bytes, content_type)) = state.vault.open_ticket(&token).await else {
        return Err(AppError::NotFound("object ticket".to_string()));
    };

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
