use crate::state::AppState;
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use survey_core::{
    JournalContext, ObservationFlags, ObserverNote, SamplingMethod, SliceStatus, SurveyType,
    ZTarget,
};
use survey_export::{export_diagnostics_zip, DiagnosticsInput};
use survey_journal::MonitorEvent;
use survey_store::StoreError;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

type ApiResponse = (StatusCode, Json<Value>);

#[cfg(test)]
pub fn make_router(state: AppState) -> Router {
    make_router_with_cors(state, "http://localhost:5173").unwrap()
}

pub fn make_router_with_cors(state: AppState, cors_origin: &str) -> Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("invalid CORS origin {cors_origin:?}"))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Ok(Router::new()
        .route("/api/v1/meta", get(meta_handler))
        .route("/api/v1/context", get(context_handler))
        .route("/api/v1/z-target", get(z_target_handler))
        .route("/api/v1/samples", get(samples_handler))
        .route("/api/v1/notes", post(create_note_handler))
        .route("/api/v1/comms", get(comms_handler))
        .route("/api/v1/diagnostics", post(diagnostics_handler))
        .route("/api/v1/stream", get(stream_handler))
        .route("/api/v1/pause", post(pause_handler))
        .route("/api/v1/resume", post(resume_handler))
        .route("/api/v1/rescan", post(rescan_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiResponse {
    (status, Json(json!({"error": message.into()})))
}

fn store_error(err: StoreError) -> ApiResponse {
    match err {
        StoreError::Validation(err) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": err.to_string(), "messages": err.messages()})),
        ),
        StoreError::NotFound(_) => error_response(StatusCode::NOT_FOUND, err.to_string()),
        StoreError::NotActive { .. } => error_response(StatusCode::CONFLICT, err.to_string()),
        StoreError::InvalidInput(_) => error_response(StatusCode::BAD_REQUEST, err.to_string()),
        StoreError::Io(_) | StoreError::Sql(_) | StoreError::Json(_) => {
            tracing::error!("store failure: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

pub async fn meta_handler(State(app_state): State<AppState>) -> Json<Value> {
    let status = app_state.status.lock().clone();
    Json(json!({
        "app_name": app_state.config.application.name,
        "app_version": app_state.config.application.version,
        "z_bin_size": app_state.journal.z_bin_size(),
        "paused": app_state.control.is_paused(),
        "status": status,
    }))
}

pub async fn context_handler(State(app_state): State<AppState>) -> Json<JournalContext> {
    Json(app_state.journal.context())
}

pub async fn z_target_handler(State(app_state): State<AppState>) -> Json<ZTarget> {
    Json(app_state.journal.z_target())
}

#[derive(Debug, Default, Deserialize)]
pub struct SamplesQuery {
    survey_type: Option<String>,
    /// Defaults to the current bin.
    z_bin: Option<i64>,
}

pub async fn samples_handler(
    State(app_state): State<AppState>,
    Query(query): Query<SamplesQuery>,
) -> ApiResponse {
    let survey_type = match query
        .survey_type
        .as_deref()
        .map(str::parse::<SurveyType>)
        .transpose()
    {
        Ok(survey_type) => survey_type.unwrap_or_default(),
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
    };
    let z_bin = query.z_bin.unwrap_or_else(|| app_state.journal.z_bin());
    match app_state.store.sample_counts(z_bin, survey_type) {
        Ok(counts) => (
            StatusCode::OK,
            Json(json!({"z_bin": z_bin, "survey_type": survey_type, "counts": counts})),
        ),
        Err(err) => store_error(err),
    }
}

pub async fn comms_handler(State(app_state): State<AppState>) -> Json<Value> {
    Json(json!({"lines": app_state.comms.snapshot()}))
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// What the CMDR filled in. Position and session come from the journal.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NoteRequest {
    pub survey_type: SurveyType,
    pub slice_status: SliceStatus,
    pub completeness_confidence: Option<i64>,
    pub sampling_method: SamplingMethod,
    pub system_count: Option<i64>,
    pub max_distance: Option<f64>,
    pub flags: ObservationFlags,
    pub notes: String,
    pub boxel_highest_system: Option<String>,
}

pub async fn create_note_handler(
    State(app_state): State<AppState>,
    Json(request): Json<NoteRequest>,
) -> ApiResponse {
    let context = app_state.journal.context();
    if context.system_name.is_none() {
        return error_response(
            StatusCode::CONFLICT,
            "No current system yet; waiting for a Location or FSDJump event",
        );
    }

    let mut note = ObserverNote::from_context(&context, &app_state.config.application.version);
    note.survey_type = request.survey_type;
    note.slice_status = request.slice_status;
    if let Some(confidence) = request.completeness_confidence {
        note.completeness_confidence = confidence;
    }
    note.sampling_method = request.sampling_method;
    note.system_count = request.system_count;
    note.max_distance = request.max_distance;
    note.flags = request.flags;
    note.notes = request.notes;
    note.boxel_highest_system = request.boxel_highest_system;

    if let Err(err) = app_state.store.save_note(&mut note) {
        return store_error(err);
    }
    app_state.journal.set_last_sample_z_bin(note.z_bin);
    app_state.comms.push(format!(
        "Saved {} at Z {} (sample {}, system {})",
        note.system_name,
        note.z_bin,
        note.sample_index.unwrap_or_default(),
        note.system_index.unwrap_or_default(),
    ));

    let counts = app_state
        .store
        .sample_counts(note.z_bin, note.survey_type)
        .ok();
    (
        StatusCode::CREATED,
        Json(json!({
            "id": note.id,
            "z_bin": note.z_bin,
            "sample_index": note.sample_index,
            "system_index": note.system_index,
            "corrected_n": note.corrected_n,
            "counts": counts,
            "z_target": app_state.journal.z_target(),
        })),
    )
}

// ---------------------------------------------------------------------------
// Monitor control
// ---------------------------------------------------------------------------

pub async fn pause_handler(State(app_state): State<AppState>) -> Json<Value> {
    app_state.control.pause();
    Json(json!({"paused": true}))
}

pub async fn resume_handler(State(app_state): State<AppState>) -> Json<Value> {
    app_state.control.resume();
    Json(json!({"paused": false}))
}

pub async fn rescan_handler(State(app_state): State<AppState>) -> Json<Value> {
    app_state.control.request_rescan();
    app_state.comms.push("Rescan requested");
    Json(json!({"rescan": "requested"}))
}

#[derive(Debug, Default, Deserialize)]
pub struct DiagnosticsQuery {
    include_db: Option<bool>,
}

pub async fn diagnostics_handler(
    State(app_state): State<AppState>,
    Query(query): Query<DiagnosticsQuery>,
) -> ApiResponse {
    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let output = app_state
        .config
        .export_dir()
        .join(format!("diagnostics_{stamp}.zip"));
    let status = serde_json::to_value(app_state.status.lock().clone()).ok();
    let comms = app_state.comms.snapshot();
    let input = DiagnosticsInput {
        config: &app_state.config,
        config_path: app_state.config_path.as_deref(),
        store: Some(app_state.store.as_ref()),
        comms: &comms,
        status,
        include_db: query.include_db.unwrap_or(true),
    };
    match export_diagnostics_zip(&output, &input) {
        Ok(path) => (
            StatusCode::CREATED,
            Json(json!({"path": path.display().to_string()})),
        ),
        Err(err) => {
            tracing::error!("diagnostics export failed: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Event stream
// ---------------------------------------------------------------------------

pub async fn stream_handler(
    State(app_state): State<AppState>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = app_state.event_tx.subscribe();
    let status = app_state.status.clone();
    let control = app_state.control.clone();

    let stream = async_stream::stream! {
        let mut heartbeat = tokio::time::interval(Duration::from_secs(5));
        heartbeat.tick().await; // discard the immediate first tick
        let mut flush = tokio::time::interval(Duration::from_millis(250));
        flush.tick().await; // discard the immediate first tick
        let mut pending: Vec<MonitorEvent> = Vec::new();
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(events) => pending.extend(events),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "event stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = flush.tick() => {
                    if !pending.is_empty() {
                        let data = serde_json::to_string(&pending).unwrap_or_default();
                        pending.clear();
                        yield Ok(Event::default().data(data));
                    }
                }
                _ = heartbeat.tick() => {
                    if control.is_stopped() {
                        break;
                    }
                    let scan_status = status.lock().scan_status;
                    let hb = json!({"heartbeat": true, "scan_status": scan_status});
                    yield Ok(Event::default().data(hb.to_string()));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::CommsLog;
    use axum::{body::Body, http::header, http::Request};
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use std::path::Path;
    use std::sync::Arc;
    use survey_config::{AppConfig, PathsConfig};
    use survey_core::{parse_line, JournalStateManager};
    use survey_journal::{MonitorControl, MonitorStatus};
    use survey_store::SurveyStore;
    use tower::ServiceExt;

    fn make_test_state(data_dir: &Path) -> AppState {
        let config = AppConfig {
            paths: PathsConfig {
                data_dir: data_dir.to_path_buf(),
                ..PathsConfig::default()
            },
            ..AppConfig::default()
        };
        let (event_tx, _) = broadcast::channel(16);
        AppState {
            config: Arc::new(config),
            config_path: None,
            store: Arc::new(SurveyStore::open_in_memory().unwrap()),
            journal: Arc::new(JournalStateManager::new(50)),
            control: Arc::new(MonitorControl::default()),
            status: Arc::new(Mutex::new(MonitorStatus::default())),
            comms: Arc::new(CommsLog::new(200)),
            event_tx,
        }
    }

    fn jump_to(state: &AppState, system: &str, y: f64) {
        let line = json!({
            "timestamp": "2026-01-01T00:00:00Z",
            "event": "FSDJump",
            "StarSystem": system,
            "SystemAddress": 42,
            "StarPos": [10.0, y, -5.0],
        })
        .to_string();
        state.journal.on_fsd_jump(&parse_line(&line).unwrap());
    }

    async fn send(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = make_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_meta_reports_app_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let state = make_test_state(dir.path());
        let (status, json) = send(&state, "GET", "/api/v1/meta", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["app_name"], "DW3 Survey Logger");
        assert_eq!(json["paused"], false);
        assert_eq!(json["z_bin_size"], 50);
        assert_eq!(json["status"]["scan_status"], "NO_SIGNAL");
    }

    #[tokio::test]
    async fn test_context_follows_journal() {
        let dir = tempfile::tempdir().unwrap();
        let state = make_test_state(dir.path());
        jump_to(&state, "Alpha", 120.0);
        let (status, json) = send(&state, "GET", "/api/v1/context", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["system_name"], "Alpha");
        assert_eq!(json["z_bin"], 100);
    }

    #[tokio::test]
    async fn test_note_needs_a_position() {
        let dir = tempfile::tempdir().unwrap();
        let state = make_test_state(dir.path());
        let (status, _) = send(&state, "POST", "/api/v1/notes", Some(json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_note_saved_from_context_updates_target() {
        let dir = tempfile::tempdir().unwrap();
        let state = make_test_state(dir.path());
        jump_to(&state, "Alpha", 120.0);

        let (status, json) = send(
            &state,
            "POST",
            "/api/v1/notes",
            Some(json!({"system_count": 9, "max_distance": 20.0})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["z_bin"], 100);
        assert_eq!(json["sample_index"], 1);
        assert_eq!(json["system_index"], 1);
        assert_eq!(json["corrected_n"], 10);
        assert_eq!(json["counts"]["current_systems"], 1);

        let (_, target) = send(&state, "GET", "/api/v1/z-target", None).await;
        assert_eq!(target["last_sample_z_bin"], 100);
        assert_eq!(target["target_z"], 150);

        let (_, comms) = send(&state, "GET", "/api/v1/comms", None).await;
        assert!(comms["lines"][0]
            .as_str()
            .unwrap()
            .ends_with("Saved Alpha at Z 100 (sample 1, system 1)"));
    }

    #[tokio::test]
    async fn test_invalid_note_is_unprocessable() {
        let dir = tempfile::tempdir().unwrap();
        let state = make_test_state(dir.path());
        jump_to(&state, "Alpha", 120.0);
        let (status, json) = send(
            &state,
            "POST",
            "/api/v1/notes",
            Some(json!({"slice_status": "discard"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["messages"][0], "Discard status requires a reason in notes");
    }

    #[tokio::test]
    async fn test_samples_validates_survey_type() {
        let dir = tempfile::tempdir().unwrap();
        let state = make_test_state(dir.path());
        let (status, _) = send(&state, "GET", "/api/v1/samples?survey_type=bogus", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = send(
            &state,
            "GET",
            "/api/v1/samples?survey_type=boxel_size&z_bin=-50",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["z_bin"], -50);
        assert_eq!(json["survey_type"], "boxel_size");
        assert_eq!(json["counts"]["current_sample"], 1);
    }

    #[tokio::test]
    async fn test_pause_resume_and_rescan_reach_the_monitor() {
        let dir = tempfile::tempdir().unwrap();
        let state = make_test_state(dir.path());

        let (_, json) = send(&state, "POST", "/api/v1/pause", None).await;
        assert_eq!(json["paused"], true);
        assert!(state.control.is_paused());

        send(&state, "POST", "/api/v1/resume", None).await;
        assert!(!state.control.is_paused());

        send(&state, "POST", "/api/v1/rescan", None).await;
        assert!(state.control.take_rescan_request());
    }

    #[tokio::test]
    async fn test_diagnostics_bundle_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let state = make_test_state(dir.path());
        state.comms.push("hello");
        let (status, json) = send(
            &state,
            "POST",
            "/api/v1/diagnostics?include_db=false",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let path = json["path"].as_str().unwrap();
        assert!(path.ends_with(".zip"));
        assert!(Path::new(path).is_file());
    }
}
