use std::convert::Infallible;
use std::path::{Component, Path as FsPath, PathBuf};

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use futures::{Stream, StreamExt as _};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;

use crate::app::model::{AnalyzeRequest, AnalyzeResponse, ErrorBody, StreamEvent};
use crate::app::queue::InProcessQueue;
use crate::pipeline::BriefingService;
use crate::progress::Progress;

const PROGRESS_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct AppState {
    pub service: BriefingService,
    pub queue: InProcessQueue,
    pub report_dir: PathBuf,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/api/analyze", post(analyze))
        .route("/api/stream", get(stream))
        .route("/api/reports/:file_name", get(download_report))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorBody { error: message })).into_response()
}

fn validate_url(raw: &str) -> Result<(), Response> {
    crate::crawl::canonical_root(raw)
        .map(|_| ())
        .map_err(|err| error_response(StatusCode::BAD_REQUEST, format!("{err:#}")))
}

async fn analyze(State(state): State<AppState>, Json(request): Json<AnalyzeRequest>) -> Response {
    if let Err(resp) = validate_url(&request.url) {
        return resp;
    }

    let service = state.service.clone();
    let url = request.url;
    let outcome = state
        .queue
        .spawn(async move { service.run(&url, Progress::none()).await })
        .await;

    match outcome {
        Ok(Ok(result)) => Json(AnalyzeResponse::from_result(result)).into_response(),
        Ok(Err(err)) => {
            tracing::error!(?err, "analyze run failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
        }
        Err(err) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("run aborted: {err}"),
        ),
    }
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    url: String,
}

async fn stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Response> {
    validate_url(&query.url)?;

    let (progress, rx) = Progress::channel(PROGRESS_CAPACITY);
    let service = state.service.clone();
    let url = query.url;
    let task = state.queue.spawn(async move {
        service
            .run(&url, progress)
            .await
            .map(AnalyzeResponse::from_result)
    });

    let events = crate::app::stream::progress_events(rx, task).map(|event| Ok(to_sse(&event)));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn to_sse(event: &StreamEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(data) => Event::default().data(data),
        Err(err) => Event::default().data(format!(
            r#"{{"type":"error","message":"encode event: {err}"}}"#
        )),
    }
}

/// A bare file name with no directory parts.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = FsPath::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

fn content_type_for(name: &str) -> &'static str {
    match FsPath::new(name).extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("md") => "text/markdown; charset=utf-8",
        _ => "application/octet-stream",
    }
}

async fn download_report(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Response, StatusCode> {
    if !is_plain_file_name(&file_name) {
        return Err(StatusCode::NOT_FOUND);
    }

    let path = state.report_dir.join(&file_name);
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;
    let body = axum::body::Body::from_stream(ReaderStream::new(file));

    let mut resp = Response::new(body);
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(&file_name)),
    );
    if let Ok(disposition) = HeaderValue::from_str(&format!("inline; filename=\"{file_name}\"")) {
        resp.headers_mut()
            .insert(header::CONTENT_DISPOSITION, disposition);
    }
    Ok(resp)
}
