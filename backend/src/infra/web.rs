use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use crate::core::api_types::{ApiError, ApiItem, ApiTopRated};
use crate::core::catalog::{CatalogClient, CatalogError, top_picks};
use crate::core::models::{Item, MediaKind};
use crate::core::storage::StorageProvider;
use crate::core::watchlist::Watchlist;

// ── App state ────────────────────────────────────────────────

pub type SharedWatchlist = Arc<Mutex<Watchlist<Box<dyn StorageProvider>>>>;
type SharedCatalog = Arc<dyn CatalogClient>;

/// Combined state passed to handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    watchlist: SharedWatchlist,
    catalog: SharedCatalog,
}

impl AppState {
    pub fn new(watchlist: SharedWatchlist, catalog: SharedCatalog) -> Self {
        Self { watchlist, catalog }
    }
}

// ── Server bootstrap ─────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/discover", get(discover))
        .route("/api/top-rated", get(top_rated))
        .route("/api/movie/{id}", get(movie_details))
        .route("/api/tv/{id}", get(show_details))
        .route("/api/watchlist", get(list_watchlist).post(add_to_watchlist))
        .route("/api/watchlist/{id}", delete(remove_from_watchlist))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn start_server(state: AppState, port: u16) -> std::io::Result<()> {
    let app = router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "Movie Finder API listening");
    axum::serve(listener, app).await
}

// ── Helpers ──────────────────────────────────────────────────

fn catalog_error(e: &CatalogError) -> Response {
    let status = match e {
        CatalogError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        CatalogError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        CatalogError::Network { .. } | CatalogError::Parse(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(ApiError::from(e))).into_response()
}

fn internal_error(message: impl Into<String>) -> Response {
    let message = message.into();
    error!(%message, "Request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError::new("internal", message)),
    )
        .into_response()
}

fn lock(
    watchlist: &SharedWatchlist,
) -> Result<MutexGuard<'_, Watchlist<Box<dyn StorageProvider>>>, Response> {
    watchlist
        .lock()
        .map_err(|_| internal_error("watchlist lock poisoned"))
}

fn invalid_id(id: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError::new("invalid_id", format!("Invalid id: {id}"))),
    )
        .into_response()
}

/// Runs `call` against the locked watchlist on the blocking pool. A
/// mutation holds the lock through its storage write, so no lock is ever
/// taken on an async worker.
async fn with_watchlist<T, F>(watchlist: &SharedWatchlist, call: F) -> Result<T, Response>
where
    T: Send + 'static,
    F: FnOnce(&mut Watchlist<Box<dyn StorageProvider>>) -> T + Send + 'static,
{
    let watchlist = Arc::clone(watchlist);
    tokio::task::spawn_blocking(move || {
        let mut wl = lock(&watchlist)?;
        Ok::<_, Response>(call(&mut wl))
    })
    .await
    .map_err(|e| internal_error(e.to_string()))?
}

async fn cards(watchlist: &SharedWatchlist, items: Vec<Item>) -> Response {
    match with_watchlist(watchlist, move |wl| ApiItem::list(&items, |id| wl.contains(id))).await {
        Ok(cards) => Json(cards).into_response(),
        Err(resp) => resp,
    }
}

/// Runs a blocking catalog call on the blocking pool; the client is
/// `reqwest::blocking` and must never run on an async worker.
async fn with_catalog<T, F>(catalog: &SharedCatalog, call: F) -> Result<Result<T, CatalogError>, Response>
where
    T: Send + 'static,
    F: FnOnce(&dyn CatalogClient) -> Result<T, CatalogError> + Send + 'static,
{
    let catalog = Arc::clone(catalog);
    tokio::task::spawn_blocking(move || call(catalog.as_ref()))
        .await
        .map_err(|e| internal_error(e.to_string()))
}

// ── GET /api/discover?q=... ──────────────────────────────────

#[derive(Deserialize)]
struct DiscoverQuery {
    q: Option<String>,
}

async fn discover(State(state): State<AppState>, Query(params): Query<DiscoverQuery>) -> Response {
    let query = params.q.unwrap_or_default().trim().to_string();
    if query.is_empty() {
        return Json(Vec::<ApiItem>::new()).into_response();
    }

    match with_catalog(&state.catalog, move |c| c.search(&query)).await {
        Ok(Ok(items)) => cards(&state.watchlist, items).await,
        Ok(Err(e)) => {
            warn!(catalog = state.catalog.name(), error = %e, "Search failed");
            catalog_error(&e)
        }
        Err(resp) => resp,
    }
}

// ── GET /api/top-rated ───────────────────────────────────────

async fn top_rated(State(state): State<AppState>) -> Response {
    let (movies, shows) = tokio::join!(
        with_catalog(&state.catalog, |c| top_picks(c, MediaKind::Movie)),
        with_catalog(&state.catalog, |c| top_picks(c, MediaKind::Show)),
    );

    let (movies, shows) = match (movies, shows) {
        (Ok(Ok(movies)), Ok(Ok(shows))) => (movies, shows),
        (Err(resp), _) | (_, Err(resp)) => return resp,
        (Ok(Err(e)), _) | (_, Ok(Err(e))) => {
            warn!(catalog = state.catalog.name(), error = %e, "Top rated failed");
            return catalog_error(&e);
        }
    };

    let decorated = with_watchlist(&state.watchlist, move |wl| ApiTopRated {
        movies: ApiItem::list(&movies, |id| wl.contains(id)),
        shows: ApiItem::list(&shows, |id| wl.contains(id)),
    })
    .await;

    match decorated {
        Ok(top) => Json(top).into_response(),
        Err(resp) => resp,
    }
}

// ── GET /api/movie/:id, /api/tv/:id ──────────────────────────

async fn movie_details(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    details(state, id, MediaKind::Movie).await
}

async fn show_details(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    details(state, id, MediaKind::Show).await
}

async fn details(state: AppState, id: String, kind: MediaKind) -> Response {
    let Ok(id) = id.parse::<u64>() else {
        return invalid_id(&id);
    };

    match with_catalog(&state.catalog, move |c| c.details(id, kind)).await {
        Ok(Ok(item)) => {
            match with_watchlist(&state.watchlist, move |wl| {
                ApiItem::from_item(&item, wl.contains(item.id))
            })
            .await
            {
                Ok(card) => Json(card).into_response(),
                Err(resp) => resp,
            }
        }
        Ok(Err(e)) => {
            warn!(catalog = state.catalog.name(), id, %kind, error = %e, "Details failed");
            catalog_error(&e)
        }
        Err(resp) => resp,
    }
}

// ── GET /api/watchlist ───────────────────────────────────────

async fn list_watchlist(State(state): State<AppState>) -> Response {
    match with_watchlist(&state.watchlist, |wl| ApiItem::list(wl.query(), |_| true)).await {
        Ok(items) => Json(items).into_response(),
        Err(resp) => resp,
    }
}

// ── POST /api/watchlist ──────────────────────────────────────

async fn add_to_watchlist(
    State(state): State<AppState>,
    payload: Result<Json<Item>, JsonRejection>,
) -> Response {
    let item = match payload {
        Ok(Json(item)) => item,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "Rejected watchlist item");
            return (
                rejection.status(),
                Json(ApiError::new("invalid_item", rejection.body_text())),
            )
                .into_response();
        }
    };

    let result = with_watchlist(&state.watchlist, move |wl| {
        let existed = wl.contains(item.id);
        (existed, ApiItem::list(wl.add(item), |_| true))
    })
    .await;

    match result {
        Ok((false, items)) => (StatusCode::CREATED, Json(items)).into_response(),
        Ok((true, items)) => Json(items).into_response(),
        Err(resp) => resp,
    }
}

// ── DELETE /api/watchlist/:id ────────────────────────────────

async fn remove_from_watchlist(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(id) = id.parse::<u64>() else {
        return invalid_id(&id);
    };

    match with_watchlist(&state.watchlist, move |wl| ApiItem::list(wl.remove(id), |_| true)).await
    {
        Ok(items) => Json(items).into_response(),
        Err(resp) => resp,
    }
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::new("not_found", "Not found")),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::TOP_PICKS;
    use crate::core::storage::MemoryStorage;
    use crate::core::watchlist::WATCHLIST_KEY;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use tower::ServiceExt;

    /// Catalog stub: serves `items` or fails every call with `failure`.
    #[derive(Default)]
    struct FakeCatalog {
        items: Vec<Item>,
        failure: Option<CatalogError>,
        calls: AtomicUsize,
    }

    impl FakeCatalog {
        fn respond<T>(&self, ok: impl FnOnce() -> T) -> Result<T, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.failure {
                Some(e) => Err(e.clone()),
                None => Ok(ok()),
            }
        }
    }

    impl CatalogClient for FakeCatalog {
        fn name(&self) -> &str {
            "fake"
        }

        fn search(&self, query: &str) -> Result<Vec<Item>, CatalogError> {
            self.respond(|| {
                self.items
                    .iter()
                    .filter(|i| i.title.to_lowercase().contains(&query.to_lowercase()))
                    .cloned()
                    .collect()
            })
        }

        fn top_rated(&self, kind: MediaKind) -> Result<Vec<Item>, CatalogError> {
            self.respond(|| {
                (1..=20)
                    .map(|n| Item::new(kind_offset(kind) + n, format!("{kind} #{n}"), kind))
                    .collect()
            })
        }

        fn details(&self, id: u64, kind: MediaKind) -> Result<Item, CatalogError> {
            self.respond(|| {
                let mut item = Item::new(id, "Dune", kind);
                item.extra.insert("tagline".into(), json!("Beyond fear, destiny awaits."));
                item
            })
        }
    }

    fn kind_offset(kind: MediaKind) -> u64 {
        match kind {
            MediaKind::Movie => 0,
            MediaKind::Show => 1000,
        }
    }

    struct Fixture {
        state: AppState,
        storage: Arc<MemoryStorage>,
        catalog: Arc<FakeCatalog>,
    }

    impl Fixture {
        fn new(catalog: FakeCatalog) -> Self {
            let storage = Arc::new(MemoryStorage::new());
            let boxed: Box<dyn StorageProvider> = Box::new(Arc::clone(&storage));
            let watchlist = Arc::new(Mutex::new(Watchlist::initialize(boxed)));
            let catalog = Arc::new(catalog);
            let shared: SharedCatalog = catalog.clone();
            Self {
                state: AppState::new(watchlist, shared),
                storage,
                catalog,
            }
        }

        async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let builder = Request::builder().method(method).uri(uri);
            let request = match body {
                Some(v) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(v.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = router(self.state.clone()).oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }

        fn favorite_ids(&self) -> Vec<u64> {
            let wl = self.state.watchlist.lock().unwrap();
            wl.query().iter().map(|i| i.id).collect()
        }
    }

    fn dune_catalog() -> FakeCatalog {
        FakeCatalog {
            items: vec![
                Item::new(438631, "Dune", MediaKind::Movie),
                Item::new(841, "Dune", MediaKind::Movie),
                Item::new(329865, "Arrival", MediaKind::Movie),
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_discover_flags_favorites() {
        let fx = Fixture::new(dune_catalog());
        fx.state
            .watchlist
            .lock()
            .unwrap()
            .add(Item::new(841, "Dune", MediaKind::Movie));

        let (status, body) = fx.send("GET", "/api/discover?q=dune", None).await;

        assert_eq!(status, StatusCode::OK);
        let cards: Vec<ApiItem> = serde_json::from_value(body).unwrap();
        assert_eq!(cards.len(), 2);
        assert!(!cards[0].favorite);
        assert!(cards[1].favorite);
        assert_eq!(cards[0].link, "/movie/438631");
    }

    #[tokio::test]
    async fn test_blank_discover_skips_catalog() {
        let fx = Fixture::new(dune_catalog());

        let (status, body) = fx.send("GET", "/api/discover?q=%20%20", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
        assert_eq!(fx.catalog.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_catalog_failure_is_returned_as_data() {
        let fx = Fixture::new(FakeCatalog {
            failure: Some(CatalogError::Network {
                message: "API request failed with status 500".into(),
                status: Some(500),
            }),
            ..Default::default()
        });
        fx.state
            .watchlist
            .lock()
            .unwrap()
            .add(Item::new(1, "Dune", MediaKind::Movie));

        let (status, body) = fx.send("GET", "/api/discover?q=dune", None).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            body,
            json!({
                "error": "API request failed with status 500",
                "kind": "network",
                "status": 500,
            })
        );
        assert_eq!(fx.favorite_ids(), vec![1]);
    }

    #[tokio::test]
    async fn test_unconfigured_catalog_keeps_watchlist_usable() {
        let fx = Fixture::new(FakeCatalog {
            failure: Some(CatalogError::NotConfigured),
            ..Default::default()
        });

        let (status, body) = fx.send("GET", "/api/top-rated", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["kind"], "not_configured");

        let item = json!({ "id": 1, "title": "Dune", "media_type": "movie" });
        let (status, _) = fx.send("POST", "/api/watchlist", Some(item)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_top_rated_returns_five_of_each() {
        let fx = Fixture::new(FakeCatalog::default());

        let (status, body) = fx.send("GET", "/api/top-rated", None).await;

        assert_eq!(status, StatusCode::OK);
        let top: ApiTopRated = serde_json::from_value(body).unwrap();
        assert_eq!(top.movies.len(), TOP_PICKS);
        assert_eq!(top.shows.len(), TOP_PICKS);
        assert!(top.shows.iter().all(|s| s.media_type == MediaKind::Show));
        assert_eq!(fx.catalog.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_details_by_kind() {
        let fx = Fixture::new(FakeCatalog::default());

        let (status, body) = fx.send("GET", "/api/tv/1396", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["media_type"], "tv");
        assert_eq!(body["link"], "/tv/1396");
        assert_eq!(body["tagline"], "Beyond fear, destiny awaits.");

        let (status, body) = fx.send("GET", "/api/movie/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_id");

        let (status, _) = fx.send("GET", "/api/anime/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_watchlist_add_list_remove() {
        let fx = Fixture::new(FakeCatalog::default());
        let dune = json!({
            "id": 438631,
            "title": "Dune",
            "media_type": "movie",
            "poster_path": "/dune.jpg",
            "vote_average": 7.8,
        });

        let (status, body) = fx.send("POST", "/api/watchlist", Some(dune.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body[0]["favorite"], true);

        let (status, body) = fx.send("POST", "/api/watchlist", Some(dune)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let show = json!({ "id": 1396, "title": "Breaking Bad", "media_type": "tv" });
        fx.send("POST", "/api/watchlist", Some(show)).await;

        let (_, body) = fx.send("GET", "/api/watchlist", None).await;
        let ids: Vec<u64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![438631, 1396]);

        let (status, body) = fx.send("DELETE", "/api/watchlist/438631", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = fx.send("DELETE", "/api/watchlist/999", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let stored: Value =
            serde_json::from_str(&fx.storage.read(WATCHLIST_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored, json!([{ "id": 1396, "title": "Breaking Bad", "media_type": "tv" }]));
    }

    #[tokio::test]
    async fn test_added_item_keeps_raw_fields_in_storage() {
        let fx = Fixture::new(FakeCatalog::default());
        let dune = json!({
            "id": 438631,
            "title": "Dune",
            "media_type": "movie",
            "vote_average": 7.8,
        });

        fx.send("POST", "/api/watchlist", Some(dune)).await;

        let stored: Value =
            serde_json::from_str(&fx.storage.read(WATCHLIST_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored[0]["vote_average"], 7.8);
    }

    #[tokio::test]
    async fn test_rejects_item_without_kind() {
        let fx = Fixture::new(FakeCatalog::default());
        let (status, body) = fx
            .send("POST", "/api/watchlist", Some(json!({ "id": 1, "title": "Dune" })))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "invalid_item");
        assert!(body["error"].as_str().unwrap().contains("media_type"));
        assert!(fx.favorite_ids().is_empty());
        assert!(fx.storage.read(WATCHLIST_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_body_that_is_not_json() {
        let fx = Fixture::new(FakeCatalog::default());
        let request = Request::builder()
            .method("POST")
            .uri("/api/watchlist")
            .body(Body::from("id=1"))
            .unwrap();

        let response = router(fx.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["kind"], "invalid_item");
        assert!(fx.favorite_ids().is_empty());
    }

    #[tokio::test]
    async fn test_reads_wait_for_the_lock_off_the_async_worker() {
        let fx = Fixture::new(FakeCatalog::default());
        let watchlist = Arc::clone(&fx.state.watchlist);
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _guard = watchlist.lock().unwrap();
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(500));
        });
        locked_rx.recv().unwrap();

        let state = fx.state.clone();
        let request = tokio::spawn(async move {
            let req = Request::get("/api/watchlist").body(Body::empty()).unwrap();
            router(state).oneshot(req).await.unwrap()
        });

        // The test runtime has a single worker; a lock taken on it would
        // hold this timer until the other thread lets go.
        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_millis(400));

        assert_eq!(request.await.unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_remove_with_bad_id_is_json_error() {
        let fx = Fixture::new(FakeCatalog::default());
        fx.state
            .watchlist
            .lock()
            .unwrap()
            .add(Item::new(1, "Dune", MediaKind::Movie));

        let (status, body) = fx.send("DELETE", "/api/watchlist/abc", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_id");
        assert_eq!(body["error"], "Invalid id: abc");
        assert_eq!(fx.favorite_ids(), vec![1]);
    }
}
