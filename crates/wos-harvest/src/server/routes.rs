//! HTTP routes over the table cache.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::QueryRejection,
    },
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
    routing::get,
};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::cache::{OrgState, TableCache};
use crate::error::NOT_READY_RETRY_AFTER;
use crate::models::{AuthorRow, Organization};
use crate::stats::{self, DEFAULT_TOP_AUTHORS, RankBy, RowFilter, Summary};

/// Requests handled at once.
const MAX_IN_FLIGHT: usize = 256;

/// Memoized summaries kept across requests.
const SUMMARY_CACHE_CAPACITY: u64 = 1_024;

/// Error returned by every route as `{ "error": message, "status": code }`.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// Organization not in the supported list
    #[error("Unknown organization: {0}")]
    UnknownOrganization(String),

    /// Bulk load has not been published yet
    #[error("Tables are not ready yet")]
    NotReady,

    /// Organization table failed to load
    #[error("Table for {organization} failed to load: {message}")]
    LoadFailed {
        /// Organization display name
        organization: String,
        /// Load failure message
        message: String,
    },

    /// Query string rejected
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownOrganization(_) => StatusCode::NOT_FOUND,
            Self::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            Self::LoadFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        let mut response = (status, body).into_response();
        if matches!(self, Self::NotReady) {
            if let Ok(value) = HeaderValue::from_str(&NOT_READY_RETRY_AFTER.as_secs().to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<TableCache>,
    summaries: Cache<(u64, String, usize), Arc<Summary>>,
}

impl AppState {
    #[must_use]
    pub fn new(cache: Arc<TableCache>) -> Self {
        Self { cache, summaries: Cache::builder().max_capacity(SUMMARY_CACHE_CAPACITY).build() }
    }

    /// Ready table for a path segment, or the error to return.
    fn table(&self, name: &str) -> Result<(Organization, Arc<Vec<AuthorRow>>, u64), ApiError> {
        let organization = self
            .cache
            .find(name)
            .cloned()
            .ok_or_else(|| ApiError::UnknownOrganization(name.to_string()))?;

        let snapshot = self.cache.snapshot();
        if !snapshot.is_ready() {
            return Err(ApiError::NotReady);
        }

        match snapshot.state(&organization) {
            OrgState::Ready(rows) => Ok((organization, rows, snapshot.generation)),
            OrgState::NotLoaded => Err(ApiError::NotReady),
            OrgState::Failed(message) => {
                Err(ApiError::LoadFailed { organization: organization.display_name, message })
            }
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("organizations", &self.cache.organizations().len())
            .field("summaries", &self.summaries.entry_count())
            .finish()
    }
}

/// Create the HTTP router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/organizations", get(list_organizations))
        .route("/organizations/{name}/publications", get(publications))
        .route("/organizations/{name}/summary", get(summary))
        .route("/rankings", get(rankings))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(ConcurrencyLimitLayer::new(MAX_IN_FLIGHT)),
        )
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "wos-harvest",
        "version": env!("CARGO_PKG_VERSION"),
        "ready": state.cache.is_ready(),
    }))
}

/// Entry of the organization listing.
#[derive(Debug, Serialize)]
struct OrganizationEntry {
    query_name: String,
    display_name: String,
    state: &'static str,
    rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn list_organizations(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.cache.snapshot();
    let entries: Vec<OrganizationEntry> = state
        .cache
        .organizations()
        .iter()
        .map(|org| {
            let org_state = snapshot.state(org);
            OrganizationEntry {
                query_name: org.query_name.clone(),
                display_name: org.display_name.clone(),
                state: org_state.label(),
                rows: org_state.row_count(),
                error: match org_state {
                    OrgState::Failed(message) => Some(message),
                    _ => None,
                },
            }
        })
        .collect();

    Json(serde_json::json!({
        "ready": snapshot.is_ready(),
        "organizations": entries,
    }))
}

#[derive(Debug, Deserialize)]
struct PublicationsQuery {
    year: Option<i32>,
    author: Option<String>,
    limit: Option<usize>,
}

async fn publications(
    State(state): State<AppState>,
    Path(name): Path<String>,
    query: Result<Query<PublicationsQuery>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (organization, rows, _) = state.table(&name)?;
    let Query(query) = query?;

    let filter = RowFilter {
        year: query.year,
        author: query.author.filter(|a| !a.trim().is_empty()),
        limit: query.limit,
    };
    let matched = stats::filter_rows(&rows, &filter);

    tracing::debug!(organization = %organization.display_name, matched = matched.len(), "Publications query");

    Ok(Json(serde_json::json!({
        "organization": organization.display_name,
        "count": matched.len(),
        "rows": matched,
    })))
}

#[derive(Debug, Deserialize)]
struct SummaryQuery {
    top: Option<usize>,
}

async fn summary(
    State(state): State<AppState>,
    Path(name): Path<String>,
    query: Result<Query<SummaryQuery>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (organization, rows, generation) = state.table(&name)?;
    let Query(query) = query?;
    let top = query.top.unwrap_or(DEFAULT_TOP_AUTHORS);

    let key = (generation, organization.display_name.clone(), top);
    let summary = state
        .summaries
        .get_with(key, async move { Arc::new(stats::summarize(&rows, top)) })
        .await;

    Ok(Json(serde_json::json!({
        "organization": organization.display_name,
        "summary": summary.as_ref(),
    })))
}

#[derive(Debug, Deserialize)]
struct RankingsQuery {
    keyword: Option<String>,
    journal: Option<String>,
}

async fn rankings(
    State(state): State<AppState>,
    query: Result<Query<RankingsQuery>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(query) = query?;
    let by = match (query.keyword, query.journal) {
        (Some(keyword), None) if !keyword.trim().is_empty() => RankBy::Keyword(keyword),
        (None, Some(journal)) if !journal.trim().is_empty() => RankBy::Journal(journal),
        _ => {
            return Err(ApiError::BadRequest(
                "exactly one non-empty `keyword` or `journal` parameter is required".to_string(),
            ));
        }
    };

    let snapshot = state.cache.snapshot();
    if !snapshot.is_ready() {
        return Err(ApiError::NotReady);
    }

    let ranking = stats::rank_organizations(snapshot.ready_tables(), &by);
    let (field, term) = match &by {
        RankBy::Keyword(term) => ("keyword", term),
        RankBy::Journal(term) => ("journal", term),
    };

    Ok(Json(serde_json::json!({
        "by": field,
        "term": term,
        "rankings": ranking,
    })))
}
