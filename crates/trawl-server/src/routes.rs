use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use chrono::Utc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use trawl_client::HtmlParser;
use trawl_core::error::AppError;
use trawl_core::{CrawlConfig, CrawlHandle, Crawler, PageRecord};
use trawl_store::MemoryStore;

use crate::auth::require_api_key;
use crate::dto::{
    CrawlRequest, CrawlResponse, CreateRunResponse, ErrorResponse, HealthResponse, LinksRequest,
    LinksResponse, PageResponse, RunPagesResponse, RunResponse, RunStatus, ScrapeRequest,
    validate_url,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::{AppState, RunEntry};

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/crawl", post(crawl))
        .route("/v1/scrape", post(scrape))
        .route("/v1/links", post(links))
        .route("/v1/runs", post(create_run))
        .route("/v1/runs/{id}", get(get_run).delete(cancel_run))
        .route("/v1/runs/{id}/pages", get(get_run_pages))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

/// Cancels the run if the request future is dropped (client went away).
struct CancelOnDrop(CrawlHandle);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if !self.0.is_finished() {
            self.0.cancel();
        }
    }
}

fn not_found(message: String) -> axum::response::Response {
    let body = ErrorResponse {
        error: "not_found".to_string(),
        message,
    };
    (StatusCode::NOT_FOUND, axum::Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Synchronous crawling
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/crawl",
    request_body = CrawlRequest,
    responses(
        (status = 200, description = "Crawl finished", body = CrawlResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 504, description = "Crawl exceeded its deadline", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "crawl"
)]
pub async fn crawl(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<CrawlRequest>,
) -> Result<impl IntoResponse, ApiError> {
    body.validate()?;
    let config = body.crawl_config();
    let started = Instant::now();

    let store = MemoryStore::new();
    let handle = Crawler::new(
        config.clone(),
        state.fetcher(&config)?,
        HtmlParser::new()?,
        store.clone(),
    )
    .start([body.url.as_str()])?;
    let guard = CancelOnDrop(handle.clone());

    let deadline = body.deadline();
    let stats = match tokio::time::timeout(deadline, handle.wait()).await {
        Ok(stats) => stats,
        Err(_) => {
            tracing::warn!(url = %body.url, "Crawl exceeded {:?}, cancelling", deadline);
            handle.cancel();
            handle.wait().await;
            return Err(AppError::Timeout(deadline.as_secs()).into());
        }
    };
    drop(guard);

    let pages: Vec<PageResponse> = store.records().into_iter().map(PageResponse::from).collect();
    let response = CrawlResponse {
        pages_crawled: stats.pages_crawled,
        pages,
        execution_time_seconds: started.elapsed().as_secs_f64(),
        stats: stats.into(),
    };

    Ok(axum::Json(response))
}

/// Fetch exactly one page through the engine, so robots.txt and response
/// checks apply the same way they do for crawls.
async fn scrape_one(
    state: &AppState,
    url: &str,
    news: bool,
    extract_links: bool,
) -> Result<Option<PageRecord>, ApiError> {
    validate_url(url)?;
    let config = CrawlConfig::default()
        .with_seed_only(true)
        .with_max_pages(1)
        .with_workers(1)
        .with_delay(Duration::ZERO)
        .with_news_mode(news)
        .with_extract_links(extract_links);

    let store = MemoryStore::new();
    let handle = Crawler::new(
        config.clone(),
        state.fetcher(&config)?,
        HtmlParser::new()?,
        store.clone(),
    )
    .start([url])?;
    let _guard = CancelOnDrop(handle.clone());
    handle.wait().await;

    Ok(store.records().into_iter().next())
}

#[utoipa::path(
    post,
    path = "/v1/scrape",
    request_body = ScrapeRequest,
    responses(
        (status = 200, description = "Scraped page", body = PageResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 404, description = "No data returned from the page", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "crawl"
)]
pub async fn scrape(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<ScrapeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    match scrape_one(&state, &body.url, body.news, body.extract_links).await? {
        Some(record) => Ok(axum::Json(PageResponse::from(record)).into_response()),
        None => Ok(not_found(format!(
            "No data returned from the page: {}",
            body.url
        ))),
    }
}

#[utoipa::path(
    post,
    path = "/v1/links",
    request_body = LinksRequest,
    responses(
        (status = 200, description = "Links found on the page", body = LinksResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 404, description = "No data returned from the page", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "crawl"
)]
pub async fn links(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<LinksRequest>,
) -> Result<impl IntoResponse, ApiError> {
    match scrape_one(&state, &body.url, false, true).await? {
        Some(record) => {
            let response = LinksResponse {
                url: record.url,
                links_found: record.links.len(),
                links: record.links,
            };
            Ok(axum::Json(response).into_response())
        }
        None => Ok(not_found(format!(
            "No data returned from the page: {}",
            body.url
        ))),
    }
}

// ---------------------------------------------------------------------------
// Background runs
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/runs",
    request_body = CrawlRequest,
    responses(
        (status = 202, description = "Run started", body = CreateRunResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "runs"
)]
pub async fn create_run(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<CrawlRequest>,
) -> Result<impl IntoResponse, ApiError> {
    body.validate()?;
    let config = body.crawl_config();

    let pages = MemoryStore::new();
    let handle = Crawler::new(
        config.clone(),
        state.fetcher(&config)?,
        HtmlParser::new()?,
        pages.clone(),
    )
    .start([body.url.as_str()])?;

    let id = Uuid::new_v4();
    tracing::info!(run_id = %id, url = %body.url, "Run started");
    state
        .runs
        .insert(RunEntry {
            id,
            url: body.url,
            created_at: Utc::now(),
            handle,
            pages,
        })
        .await;

    let response = CreateRunResponse {
        run_id: id,
        status: RunStatus::Running,
    };

    Ok((StatusCode::ACCEPTED, axum::Json(response)))
}

#[utoipa::path(
    get,
    path = "/v1/runs/{id}",
    params(
        ("id" = Uuid, Path, description = "Run ID")
    ),
    responses(
        (status = 200, description = "Run progress", body = RunResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "runs"
)]
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(run) = state.runs.get(id).await else {
        return Ok(not_found(format!("Run not found: {id}")));
    };

    let response = RunResponse {
        id: run.id,
        status: run.status(),
        queued: run.handle.frontier_len(),
        visited: run.handle.visited_count(),
        stats: run.handle.stats().into(),
        created_at: run.created_at,
        url: run.url,
    };

    Ok(axum::Json(response).into_response())
}

#[utoipa::path(
    get,
    path = "/v1/runs/{id}/pages",
    params(
        ("id" = Uuid, Path, description = "Run ID")
    ),
    responses(
        (status = 200, description = "Pages saved so far", body = RunPagesResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "runs"
)]
pub async fn get_run_pages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(run) = state.runs.get(id).await else {
        return Ok(not_found(format!("Run not found: {id}")));
    };

    let pages: Vec<PageResponse> = run
        .pages
        .records()
        .into_iter()
        .map(PageResponse::from)
        .collect();
    let response = RunPagesResponse {
        run_id: id,
        total: pages.len(),
        pages,
    };

    Ok(axum::Json(response).into_response())
}

#[utoipa::path(
    delete,
    path = "/v1/runs/{id}",
    params(
        ("id" = Uuid, Path, description = "Run ID")
    ),
    responses(
        (status = 204, description = "Cancellation requested"),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 409, description = "Run already finished", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "runs"
)]
pub async fn cancel_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    match state.runs.get(id).await {
        Some(run) if run.handle.is_finished() => {
            let body = ErrorResponse {
                error: "conflict".to_string(),
                message: format!("Run {id} has already finished"),
            };
            Ok((StatusCode::CONFLICT, axum::Json(body)).into_response())
        }
        Some(run) => {
            tracing::info!(run_id = %id, "Run cancellation requested");
            run.handle.cancel();
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        None => Ok(not_found(format!("Run not found: {id}"))),
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        active_runs: state.runs.active_count().await,
    })
}
