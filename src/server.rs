//! HTTP server setup, routing and handlers.

use crate::auth::{ApiKeySessions, Session, SessionProvider};
use crate::config::Config;
use crate::content::{self, ContentStore, FsContentStore, NullContentStore, Post};
use crate::error::ApiError;
use crate::i18n::preferences::{preference_cookie, MemoryStore, PreferenceStore};
use crate::i18n::{
    DetectionMetrics, DisabledGeoLocator, GeoLocator, IpApiLocator, Locale, LocaleRegistry,
    LocaleResolver,
};
use crate::middleware;
use crate::plugins::{LoadedPlugins, PluginRegistry, PostContext};
use crate::rate_limit::RateLimiter;
use crate::render::{self, Page};
use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared application state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub locales: Arc<LocaleRegistry>,
    pub resolver: Arc<LocaleResolver>,
    pub plugins: Arc<LoadedPlugins>,
    pub content: Arc<dyn ContentStore>,
    pub sessions: Arc<dyn SessionProvider>,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics: Arc<DetectionMetrics>,
    /// Recent locale detections, reported by `/health`
    pub detections: Arc<PreferenceStore<MemoryStore>>,
}

impl AppState {
    /// Wire up the production collaborators described by `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let geo: Arc<dyn GeoLocator> = if config.geo_lookup_enabled {
            Arc::new(
                IpApiLocator::new(config.geo_lookup_url.clone(), config.geo_lookup_timeout)
                    .context("Failed to build geo lookup client")?,
            )
        } else {
            info!("Geo lookup disabled");
            Arc::new(DisabledGeoLocator)
        };

        let content: Arc<dyn ContentStore> = match &config.content_dir {
            Some(dir) => {
                info!("Serving content from {}", dir.display());
                Arc::new(FsContentStore::new(dir.clone(), config.pages_dir.clone()))
            }
            None => {
                warn!("No content directory configured, serving an empty blog");
                Arc::new(NullContentStore)
            }
        };

        let sessions: Arc<dyn SessionProvider> =
            Arc::new(ApiKeySessions::new(config.admin_api_key.clone()));
        let plugins = LoadedPlugins::load(PluginRegistry::builtin());

        Ok(Self::new(config, geo, content, sessions, plugins))
    }

    pub fn new(
        config: Config,
        geo: Arc<dyn GeoLocator>,
        content: Arc<dyn ContentStore>,
        sessions: Arc<dyn SessionProvider>,
        plugins: LoadedPlugins,
    ) -> Self {
        let locales = Arc::new(LocaleRegistry::builtin().clone());
        let resolver = LocaleResolver::new(locales.clone(), geo, config.geo_lookup_timeout);
        let rate_limiter = RateLimiter::new(config.auth_rate_limit_max, config.auth_rate_limit_window);

        Self {
            config: Arc::new(config),
            locales,
            resolver: Arc::new(resolver),
            plugins: Arc::new(plugins),
            content,
            sessions,
            rate_limiter: Arc::new(rate_limiter),
            metrics: Arc::new(DetectionMetrics::new()),
            detections: Arc::new(PreferenceStore::new(MemoryStore::default())),
        }
    }

    fn session(&self, headers: &HeaderMap) -> Result<Session, ApiError> {
        self.sessions.get_session(headers).ok_or(ApiError::Unauthorized)
    }

    /// Supported locale named by a `:lang` path segment. Exact codes only.
    fn page_locale(&self, lang: &str) -> Option<Locale> {
        self.locales.locales().find(|locale| locale.code() == lang)
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(health))
        // Public pages
        .route("/:lang", get(home_page))
        .route("/:lang/", get(home_page))
        .route("/:lang/posts/:slug", get(post_page))
        .route("/:lang/about", get(about_page))
        .route("/:lang/search", get(search_page))
        .route("/:lang/preferences/locale", post(set_locale_preference))
        .route("/search-index.json", get(search_index))
        // Posts API
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/search", get(search_posts))
        .route(
            "/api/posts/:slug",
            get(get_post).put(update_post).delete(delete_post),
        )
        // Auth
        .route("/api/auth/login", post(login))
        .route("/api/auth/session", get(current_session))
        // Plugins
        .route("/api/plugins", get(list_plugins))
        .route("/api/plugins/active", get(active_plugins))
        .fallback(not_found)
        // Layers run bottom-up: trace, locale, rate limit, guard
        .layer(axum::middleware::from_fn(middleware::request_guard))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_rate_limit,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::locale_filter,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ==================== Health ====================

async fn health(State(state): State<AppState>) -> Json<Value> {
    let plugins: Vec<&str> = state
        .plugins
        .list_loaded()
        .iter()
        .map(|plugin| plugin.id())
        .collect();

    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "plugins": plugins,
        "plugin_failures": state.plugins.failures(),
        "plugin_error": state.plugins.error(),
        "locale_detection": state.metrics.report(),
        "recent_detections": state.detections.detection_history(),
    }))
}

// ==================== Pages ====================

fn html_page(state: &AppState, page: Page<'_>) -> Html<String> {
    Html(render::render_page(&state.plugins, &state.locales, page).into_string())
}

fn not_found_page(state: &AppState, locale: Locale, path: &str) -> Response {
    let strings = crate::i18n::LocaleStrings::for_locale(locale);
    let page = Page {
        locale,
        title: strings.not_found_title,
        path,
        body: render::not_found_body(locale),
        post: None,
    };
    (StatusCode::NOT_FOUND, html_page(state, page)).into_response()
}

async fn home_page(State(state): State<AppState>, Path(lang): Path<String>) -> Response {
    let Some(locale) = state.page_locale(&lang) else {
        return not_found_page(&state, state.locales.default_locale(), "/");
    };

    let posts = state.content.list_posts().unwrap_or_else(|e| {
        error!("Failed to list posts: {}", e);
        Vec::new()
    });
    let strings = crate::i18n::LocaleStrings::for_locale(locale);
    html_page(
        &state,
        Page {
            locale,
            title: strings.nav_home,
            path: "/",
            body: render::post_list_body(locale, &posts),
            post: None,
        },
    )
    .into_response()
}

async fn post_page(
    State(state): State<AppState>,
    Path((lang, slug)): Path<(String, String)>,
) -> Response {
    let path = format!("/posts/{}", slug);
    let Some(locale) = state.page_locale(&lang) else {
        return not_found_page(&state, state.locales.default_locale(), &path);
    };

    let post = match state.content.get_post_by_slug(&slug) {
        Ok(Some(post)) if post.published => post,
        Ok(_) => return not_found_page(&state, locale, &path),
        Err(e) => {
            error!("Failed to load post '{}': {}", slug, e);
            return not_found_page(&state, locale, &path);
        }
    };

    let (body, context): (_, PostContext) = render::post_body(locale, &post);
    html_page(
        &state,
        Page {
            locale,
            title: &post.title,
            path: &path,
            body,
            post: Some(&context),
        },
    )
    .into_response()
}

async fn about_page(State(state): State<AppState>, Path(lang): Path<String>) -> Response {
    let Some(locale) = state.page_locale(&lang) else {
        return not_found_page(&state, state.locales.default_locale(), "/about");
    };

    let page = match state.content.get_page_by_slug("about") {
        Ok(Some(page)) => page,
        Ok(None) => return not_found_page(&state, locale, "/about"),
        Err(e) => {
            error!("Failed to load about page: {}", e);
            return not_found_page(&state, locale, "/about");
        }
    };

    html_page(
        &state,
        Page {
            locale,
            title: &page.title,
            path: "/about",
            body: render::page_body(&page),
            post: None,
        },
    )
    .into_response()
}

async fn search_page(
    State(state): State<AppState>,
    Path(lang): Path<String>,
    Query(params): Query<SearchParams>,
) -> Response {
    let Some(locale) = state.page_locale(&lang) else {
        return not_found_page(&state, state.locales.default_locale(), "/search");
    };

    let results = content::search_posts(state.content.as_ref(), &params.q).unwrap_or_else(|e| {
        error!("Search for '{}' failed: {}", params.q, e);
        Vec::new()
    });
    let strings = crate::i18n::LocaleStrings::for_locale(locale);
    html_page(
        &state,
        Page {
            locale,
            title: strings.search,
            path: "/search",
            body: render::search_results_body(locale, &params.q, &results),
            post: None,
        },
    )
    .into_response()
}

#[derive(Debug, Deserialize)]
struct LocaleForm {
    locale: String,
    /// Path without a locale prefix to land on after switching
    #[serde(default)]
    redirect: Option<String>,
}

/// Store an explicit locale choice and move to the same page in that locale.
async fn set_locale_preference(
    State(state): State<AppState>,
    Path(lang): Path<String>,
    Form(form): Form<LocaleForm>,
) -> Result<Response, ApiError> {
    if state.page_locale(&lang).is_none() {
        return Err(ApiError::NotFound("Not found".to_string()));
    }
    let locale = state
        .locales
        .parse(&form.locale)
        .ok_or_else(|| ApiError::BadRequest(format!("Unsupported locale: {}", form.locale)))?;

    let rest = form.redirect.as_deref().and_then(same_site_path).unwrap_or("");
    let location = HeaderValue::from_str(&format!("{}{}", locale.path_prefix(), rest))
        .unwrap_or_else(|_| HeaderValue::from_static("/"));

    info!("Locale preference set to {}", locale);
    Ok((
        StatusCode::SEE_OTHER,
        [(header::SET_COOKIE, preference_cookie(locale))],
        [(header::LOCATION, location)],
    )
        .into_response())
}

/// A local path to land on after switching locale. Anything that could
/// leave the site or break the header yields `None`.
fn same_site_path(raw: &str) -> Option<&str> {
    let local = raw.starts_with('/') && !raw.starts_with("//") && raw != "/";
    let printable = raw.bytes().all(|b| b.is_ascii_graphic());
    (local && printable && !raw.contains('\\')).then_some(raw)
}

async fn search_index(State(state): State<AppState>) -> Response {
    let path = state.config.static_dir.join("search-index.json");
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(e) => {
            warn!("Search index unavailable at {}: {}", path.display(), e);
            ApiError::NotFound("Search index not found".to_string()).into_response()
        }
    }
}

async fn not_found(State(state): State<AppState>, uri: Uri) -> Response {
    let path = uri.path();
    if path == "/api" || path.starts_with("/api/") {
        return ApiError::NotFound("Not found".to_string()).into_response();
    }
    let locale = crate::i18n::redirect::path_locale(path, &state.locales)
        .unwrap_or_else(|| state.locales.default_locale());
    not_found_page(&state, locale, "/")
}

// ==================== Posts API ====================

async fn list_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let signed_in = state.sessions.get_session(&headers).is_some();
    let posts: Vec<Post> = state
        .content
        .list_posts()?
        .into_iter()
        .filter(|post| signed_in || post.published)
        .collect();
    Ok(Json(json!({ "posts": posts })))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn search_posts(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<content::SearchResult>>, ApiError> {
    Ok(Json(content::search_posts(state.content.as_ref(), &params.q)?))
}

async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let signed_in = state.sessions.get_session(&headers).is_some();
    match state.content.get_post_by_slug(&slug)? {
        Some(post) if signed_in || post.published => Ok(Json(json!({ "post": post }))),
        _ => Err(ApiError::NotFound("Post not found".to_string())),
    }
}

/// Authoring payload. Every field is optional so updates can be partial.
#[derive(Debug, Default, Deserialize)]
struct PostInput {
    title: Option<String>,
    content: Option<String>,
    published: Option<bool>,
    slug: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

/// Keys managed by the server are never taken from the payload.
const RESERVED_KEYS: [&str; 2] = ["date", "author"];

fn extra_fields(mut extra: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    extra.retain(|key, _| !RESERVED_KEYS.contains(&key.as_str()));
    extra
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<PostInput>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&headers)?;

    let (Some(title), Some(slug)) = (non_empty(input.title), non_empty(input.slug)) else {
        return Err(ApiError::BadRequest("Title and slug are required".to_string()));
    };
    if !content::is_valid_slug(&slug) {
        return Err(ApiError::BadRequest(format!("Invalid slug: '{}'", slug)));
    }
    if state.content.get_post_by_slug(&slug)?.is_some() {
        return Err(ApiError::Conflict("Slug already exists".to_string()));
    }

    let post = Post {
        slug,
        title,
        date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        content: input.content.unwrap_or_default(),
        published: input.published.unwrap_or(false),
        author: Some(session.user.name),
        extra: extra_fields(input.extra),
    };
    state.content.save_post(&post)?;

    info!("Created post '{}'", post.slug);
    Ok(Json(json!({ "post": post })))
}

async fn update_post(
    State(state): State<AppState>,
    Path(old_slug): Path<String>,
    headers: HeaderMap,
    Json(input): Json<PostInput>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&headers)?;

    let existing = state
        .content
        .get_post_by_slug(&old_slug)?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    let new_slug = non_empty(input.slug).unwrap_or_else(|| old_slug.clone());
    let renamed = new_slug != old_slug;
    if renamed {
        if !content::is_valid_slug(&new_slug) {
            return Err(ApiError::BadRequest(format!("Invalid slug: '{}'", new_slug)));
        }
        if state.content.get_post_by_slug(&new_slug)?.is_some() {
            return Err(ApiError::Conflict("Slug already exists".to_string()));
        }
    }

    let mut extra = existing.extra;
    extra.extend(extra_fields(input.extra));
    let post = Post {
        slug: new_slug,
        title: non_empty(input.title).unwrap_or(existing.title),
        content: input.content.unwrap_or(existing.content),
        published: input.published.unwrap_or(existing.published),
        date: if existing.date.is_empty() {
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        } else {
            existing.date
        },
        author: existing.author.or(Some(session.user.name)),
        extra,
    };

    state.content.save_post(&post)?;
    if renamed {
        state.content.delete_post(&old_slug)?;
        info!("Renamed post '{}' to '{}'", old_slug, post.slug);
    }

    Ok(Json(json!({ "post": post })))
}

async fn delete_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    state.session(&headers)?;

    if state.content.get_post_by_slug(&slug)?.is_none() {
        return Err(ApiError::NotFound("Post not found".to_string()));
    }
    state.content.delete_post(&slug)?;

    info!("Deleted post '{}'", slug);
    Ok(Json(json!({ "success": true })))
}

// ==================== Auth ====================

#[derive(Debug, Deserialize)]
struct LoginRequest {
    api_key: String,
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let session = state
        .sessions
        .login(&request.api_key)
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(json!({ "session": session })))
}

async fn current_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&headers)?;
    Ok(Json(json!({ "session": session })))
}

// ==================== Plugins ====================

async fn list_plugins(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "plugins": state.plugins.summaries() }))
}

/// Kept for clients of the old database-backed plugin list.
async fn active_plugins() -> Json<Value> {
    Json(json!([]))
}
