use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use crossbeam_channel::Sender;
use routecache::key::{is_culture_segment, local_path, route_key};
use routecache::provider::root_for_host;
use routecache::{spawn_listener, CacheStats, Collaborators, ContentId, LifecycleEvent, RouteCache, RouteCacheConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use url::Url;

pub mod site;

use site::{read_definition, StaticSite};

#[derive(Deserialize)]
pub struct ResolveParams {
    pub url: String,
    pub root: Option<ContentId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub key: String,
    pub content_id: ContentId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoutesResponse {
    pub content_id: ContentId,
    pub routes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub findings: Vec<String>,
}

pub struct AppOptions {
    pub config: RouteCacheConfig,
    pub site_file: PathBuf,
    pub admin_token: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<RouteCache>,
    pub site: Arc<StaticSite>,
    pub site_file: PathBuf,
    pub events: Sender<LifecycleEvent>,
    pub admin_token: Option<String>,
}

/// Load the site, open the route cache over it and start the event listener.
pub fn build_state(opts: AppOptions) -> Result<AppState> {
    let site = Arc::new(StaticSite::load(&opts.site_file, &opts.config)?);
    let cache = Arc::new(RouteCache::open(opts.config, Collaborators::from_shared(site.clone())));
    let (events, rx) = crossbeam_channel::unbounded();
    spawn_listener(cache.clone(), rx)?;
    Ok(AppState { cache, site, site_file: opts.site_file, events, admin_token: opts.admin_token })
}

pub fn build_app(opts: AppOptions) -> Result<Router> { Ok(router(build_state(opts)?)) }

pub fn router(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/resolve", get(resolve_handler))
        .route("/content/:content_id/routes", get(routes_handler))
        .route("/events", post(events_handler))
        .route("/admin/validate", post(validate_handler))
        .route("/admin/flush", post(flush_handler))
        .route("/admin/stats", get(stats_handler))
        .route("/admin/reload-site", post(reload_site_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

type ApiError = (StatusCode, String);

fn internal(e: impl std::fmt::Display) -> ApiError { (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()) }

pub async fn resolve_handler(State(state): State<AppState>, Query(params): Query<ResolveParams>) -> Result<Json<ResolveResponse>, ApiError> {
    let config = state.cache.config();
    if config.culture_in_path && config.culture_404 && !culture_is_known(&state.site.cultures(), &params.url) {
        return Err((StatusCode::NOT_FOUND, "unknown culture".into()));
    }
    let host = Url::parse(&params.url).ok().and_then(|u| u.host_str().map(str::to_string));
    let root = params.root.or_else(|| root_for_host(state.site.as_ref(), state.site.as_ref(), host.as_deref()));
    let Some(root) = root else {
        tracing::warn!(url = %params.url, "no root content found for request");
        return Err((StatusCode::NOT_FOUND, "no root content".into()));
    };
    let Some(key) = route_key(root, &params.url, &config.key_options()) else {
        return Err((StatusCode::NOT_FOUND, "not resolvable".into()));
    };

    let cache = state.cache.clone();
    let lookup = key.clone();
    let found = tokio::task::spawn_blocking(move || cache.resolve_key(&lookup)).await.map_err(internal)?;
    match found {
        Some(content_id) => Ok(Json(ResolveResponse { key, content_id })),
        None => Err((StatusCode::NOT_FOUND, format!("no content for '{key}'"))),
    }
}

/// A leading culture-shaped segment must name one of the site's cultures.
fn culture_is_known(cultures: &[String], url: &str) -> bool {
    let path = local_path(url).to_lowercase();
    match path.split('/').find(|s| !s.is_empty()) {
        Some(first) if is_culture_segment(first) => cultures.iter().any(|c| c.eq_ignore_ascii_case(first)),
        _ => true,
    }
}

pub async fn routes_handler(State(state): State<AppState>, Path(content_id): Path<ContentId>) -> Result<Json<RoutesResponse>, ApiError> {
    let cache = state.cache.clone();
    let routes = tokio::task::spawn_blocking(move || cache.routes_for(content_id)).await.map_err(internal)?;
    Ok(Json(RoutesResponse { content_id, routes }))
}

pub async fn events_handler(State(state): State<AppState>, Json(event): Json<LifecycleEvent>) -> Result<StatusCode, ApiError> {
    tracing::debug!(?event, "queueing lifecycle event");
    state.events.send(event).map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    Ok(StatusCode::ACCEPTED)
}

// --- Admin endpoints ---
async fn validate_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<ValidateResponse>, ApiError> {
    authorize(&state, &headers)?;
    let cache = state.cache.clone();
    let findings = tokio::task::spawn_blocking(move || cache.validate_and_clean()).await.map_err(internal)?;
    Ok(Json(ValidateResponse { findings }))
}

async fn flush_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode, ApiError> {
    authorize(&state, &headers)?;
    let cache = state.cache.clone();
    tokio::task::spawn_blocking(move || cache.flush()).await.map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stats_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<CacheStats>, ApiError> {
    authorize(&state, &headers)?;
    Ok(Json(state.cache.stats()))
}

async fn reload_site_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode, ApiError> {
    authorize(&state, &headers)?;
    let definition = read_definition(&state.site_file).map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, format!("{e:#}")))?;
    state.site.replace(definition);
    state.events.send(LifecycleEvent::FullRefresh).map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    tracing::info!(path = %state.site_file.display(), "site reloaded");
    Ok(StatusCode::ACCEPTED)
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn culture_segment_must_be_configured() {
        let cultures = vec!["en-US".to_string(), "fr-fr".to_string()];
        assert!(culture_is_known(&cultures, "/en-us/products/"));
        assert!(culture_is_known(&cultures, "https://example.com/FR-FR/"));
        assert!(!culture_is_known(&cultures, "/de-de/products/"));
        assert!(culture_is_known(&cultures, "/products/"));
        assert!(culture_is_known(&cultures, "/"));
    }
}
