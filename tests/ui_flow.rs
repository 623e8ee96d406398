use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use reelview::app::{build_router, AppState};
use reelview::detail::TrailerState;
use reelview::models::{CatalogItem, ExtendedDetail, Genre, MediaKind};
use reelview::my_list::{DocumentStore, MemoryStore};
use reelview::session::{sign_session, UserId};
use reelview::tmdb::{Row, TmdbApi};
use reelview::ui::{self, ControllerHandle, Msg, Services, ViewModel};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

const SESSION_SECRET: &str = "test-secret";

enum DetailReply {
    Trailer(&'static str),
    NoVideos,
    Fail,
}

struct FakeTmdb {
    reply: DetailReply,
    detail_calls: AtomicUsize,
}

impl FakeTmdb {
    fn new(reply: DetailReply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            detail_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl TmdbApi for FakeTmdb {
    async fn fetch_extended_detail(
        &self,
        _kind: MediaKind,
        _id: i64,
    ) -> anyhow::Result<ExtendedDetail> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let genres = vec![
            Genre {
                id: 18,
                name: "Drama".to_string(),
            },
            Genre {
                id: 53,
                name: "Thriller".to_string(),
            },
        ];
        match self.reply {
            DetailReply::Trailer(key) => Ok(ExtendedDetail {
                genres,
                trailer: Some(key.to_string()),
            }),
            DetailReply::NoVideos => Ok(ExtendedDetail {
                genres,
                trailer: None,
            }),
            DetailReply::Fail => Err(anyhow::anyhow!("upstream returned 500")),
        }
    }

    async fn fetch_row(&self, row: Row) -> anyhow::Result<Vec<CatalogItem>> {
        let mut movie = CatalogItem::new(42, "X", MediaKind::Movie);
        movie.original_language = "en".to_string();
        movie.vote_average = 7.25;
        movie.vote_count = 1200;
        movie.release_date = Some("2020-01-01".to_string());
        match row {
            Row::Originals => Ok(vec![movie]),
            Row::Trending => Ok(vec![movie, CatalogItem::new(7, "Seven", MediaKind::Tv)]),
            Row::Horror => Err(anyhow::anyhow!("row unavailable")),
            _ => Ok(Vec::new()),
        }
    }
}

/// Accepts reads, refuses every write.
struct FlakyStore;

#[async_trait::async_trait]
impl DocumentStore for FlakyStore {
    async fn put_item(&self, _user: &UserId, _item: &CatalogItem) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("store offline"))
    }

    async fn delete_item(&self, _user: &UserId, _item_id: i64) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("store offline"))
    }

    async fn list_items(&self, _user: &UserId) -> anyhow::Result<Vec<CatalogItem>> {
        Ok(Vec::new())
    }
}

async fn app_with(
    tmdb: Arc<FakeTmdb>,
    store: Arc<dyn DocumentStore>,
) -> (Router, ControllerHandle) {
    let handle = ui::spawn(Services {
        tmdb,
        store,
        list_refresh: Duration::from_secs(3600),
    });
    let state = AppState {
        controller: handle.clone(),
        session_secret: Arc::from(SESSION_SECRET),
    };
    wait_until(&handle, |v| !v.rows.is_empty()).await;
    (build_router(state), handle)
}

async fn wait_until<F>(handle: &ControllerHandle, pred: F) -> Arc<ViewModel>
where
    F: Fn(&ViewModel) -> bool,
{
    let mut rx = handle.watch();
    let seen = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|v| pred(v)))
        .await
        .expect("timed out waiting for view")
        .expect("controller stopped");
    let view = Arc::clone(&*seen);
    drop(seen);
    view
}

fn session_cookie(user: &str) -> String {
    let user = UserId::parse(user).expect("valid user id");
    let value = sign_session(&user, SESSION_SECRET).expect("static key is valid");
    format!("session={}", value)
}

fn post(path: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut req = Request::post(path).header(
        header::CONTENT_TYPE,
        "application/x-www-form-urlencoded",
    );
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::from(body.to_string()))
        .expect("failed to build request")
}

async fn send(app: &Router, req: Request<Body>) -> StatusCode {
    let res = app.clone().oneshot(req).await.unwrap();
    if res.status() == StatusCode::SEE_OTHER {
        assert_eq!(
            res.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()),
            Some("/")
        );
    }
    res.status()
}

async fn select(app: &Router, cookie: Option<&str>, kind: &str, id: i64) -> StatusCode {
    let body = format!("media_type={}&id={}", kind, id);
    send(app, post("/select", cookie, &body)).await
}

async fn get_json(app: &Router, path: &str, cookie: Option<&str>) -> Value {
    let mut req = Request::get(path);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    let res = app
        .clone()
        .oneshot(req.body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check() {
    let (app, _handle) = app_with(
        FakeTmdb::new(DetailReply::NoVideos),
        Arc::new(MemoryStore::new()),
    )
    .await;
    let res = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn catalog_fills_rows_and_banner() {
    let (app, _handle) = app_with(
        FakeTmdb::new(DetailReply::NoVideos),
        Arc::new(MemoryStore::new()),
    )
    .await;
    let view = get_json(&app, "/api/view", None).await;
    assert_eq!(view["banner"]["id"], 42);
    let rows = view["rows"].as_array().unwrap();
    assert_eq!(rows.len(), Row::ALL.len());
    assert_eq!(rows[0]["title"], "Trending Now");
    let horror = rows
        .iter()
        .find(|r| r["title"] == "Scary Movies")
        .expect("failed row still listed");
    assert!(horror["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn selecting_fetches_trailer_once() {
    let tmdb = FakeTmdb::new(DetailReply::Trailer("abc123"));
    let (app, handle) = app_with(tmdb.clone(), Arc::new(MemoryStore::new())).await;

    assert_eq!(select(&app, None, "movie", 42).await, StatusCode::SEE_OTHER);
    let view = wait_until(&handle, |v| {
        v.overlay
            .as_ref()
            .map(|o| matches!(o.trailer, TrailerState::Ready { .. }))
            .unwrap_or(false)
    })
    .await;
    let overlay = view.overlay.as_ref().unwrap();
    assert_eq!(
        overlay.trailer,
        TrailerState::Ready {
            key: "abc123".to_string()
        }
    );
    assert_eq!(overlay.genres, "Drama, Thriller");
    assert_eq!(overlay.language, "English");
    assert_eq!(overlay.match_percent, "72.50");

    assert_eq!(select(&app, None, "movie", 42).await, StatusCode::SEE_OTHER);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(tmdb.detail_calls.load(Ordering::SeqCst), 1);

    let res = app
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("https://www.youtube.com/embed/abc123?autoplay=1&amp;mute=0"));
}

#[tokio::test]
async fn missing_and_failed_trailers_are_distinct() {
    let (app, handle) = app_with(
        FakeTmdb::new(DetailReply::NoVideos),
        Arc::new(MemoryStore::new()),
    )
    .await;
    select(&app, None, "tv", 7).await;
    wait_until(&handle, |v| {
        v.overlay.as_ref().map(|o| o.trailer == TrailerState::Unavailable) == Some(true)
    })
    .await;

    let (app, handle) = app_with(
        FakeTmdb::new(DetailReply::Fail),
        Arc::new(MemoryStore::new()),
    )
    .await;
    select(&app, None, "tv", 7).await;
    let view = wait_until(&handle, |v| {
        v.overlay
            .as_ref()
            .map(|o| matches!(o.trailer, TrailerState::Failed { .. }))
            .unwrap_or(false)
    })
    .await;
    assert_eq!(view.overlay.as_ref().unwrap().genres, "");
}

#[tokio::test]
async fn unknown_item_is_not_found() {
    let (app, _handle) = app_with(
        FakeTmdb::new(DetailReply::NoVideos),
        Arc::new(MemoryStore::new()),
    )
    .await;
    assert_eq!(select(&app, None, "movie", 999).await, StatusCode::NOT_FOUND);
    assert_eq!(select(&app, None, "tv", 42).await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn close_and_mute() {
    let (app, handle) = app_with(
        FakeTmdb::new(DetailReply::Trailer("abc123")),
        Arc::new(MemoryStore::new()),
    )
    .await;
    select(&app, None, "movie", 42).await;
    assert_eq!(send(&app, post("/mute", None, "")).await, StatusCode::SEE_OTHER);
    assert!(handle.view().overlay.as_ref().unwrap().muted);

    assert_eq!(send(&app, post("/close", None, "")).await, StatusCode::SEE_OTHER);
    assert!(handle.view().overlay.is_none());
}

#[tokio::test]
async fn session_cookie_must_be_signed() {
    let (app, _handle) = app_with(
        FakeTmdb::new(DetailReply::NoVideos),
        Arc::new(MemoryStore::new()),
    )
    .await;
    let view = get_json(&app, "/api/view", Some("session=user-1.deadbeef")).await;
    assert!(view["signed_in"].is_null());

    let cookie = session_cookie("user-1");
    let view = get_json(&app, "/api/view", Some(&cookie)).await;
    assert_eq!(view["signed_in"], "user-1");
}

#[tokio::test]
async fn toggle_without_session_reports_error() {
    let (app, handle) = app_with(
        FakeTmdb::new(DetailReply::NoVideos),
        Arc::new(MemoryStore::new()),
    )
    .await;
    select(&app, None, "movie", 42).await;
    assert_eq!(
        send(&app, post("/my-list/toggle", None, "")).await,
        StatusCode::SEE_OTHER
    );
    let view = handle.view();
    assert!(view.overlay.as_ref().unwrap().list_error.is_some());
    assert_eq!(view.toasts.len(), 1);
    assert!(view.my_list.is_empty());
}

#[tokio::test]
async fn toggling_twice_restores_membership() {
    let store = Arc::new(MemoryStore::new());
    let (app, handle) = app_with(FakeTmdb::new(DetailReply::NoVideos), store.clone()).await;
    let cookie = session_cookie("user-1");

    select(&app, Some(&cookie), "movie", 42).await;
    send(&app, post("/my-list/toggle", Some(&cookie), "")).await;
    let view = wait_until(&handle, |v| {
        v.overlay
            .as_ref()
            .map(|o| o.in_list && !o.list_pending)
            .unwrap_or(false)
    })
    .await;
    assert_eq!(view.my_list.len(), 1);
    assert_eq!(view.my_list[0].id, 42);
    assert!(view
        .toasts
        .iter()
        .any(|t| t.message == "X has been added to My List."));
    let user = UserId::parse("user-1").unwrap();
    assert_eq!(store.list_items(&user).await.unwrap().len(), 1);

    send(&app, post("/my-list/toggle", Some(&cookie), "")).await;
    let view = wait_until(&handle, |v| {
        v.my_list.is_empty() && v.overlay.as_ref().map(|o| !o.in_list) == Some(true)
    })
    .await;
    assert!(view
        .toasts
        .iter()
        .any(|t| t.message == "X has been removed from My List"));
    assert!(store.list_items(&user).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_write_leaves_list_unchanged() {
    let (app, handle) = app_with(FakeTmdb::new(DetailReply::NoVideos), Arc::new(FlakyStore)).await;
    let cookie = session_cookie("user-1");

    select(&app, Some(&cookie), "movie", 42).await;
    send(&app, post("/my-list/toggle", Some(&cookie), "")).await;
    let view = wait_until(&handle, |v| {
        v.overlay
            .as_ref()
            .map(|o| o.list_error.is_some())
            .unwrap_or(false)
    })
    .await;
    let overlay = view.overlay.as_ref().unwrap();
    assert_eq!(overlay.id, 42);
    assert!(!overlay.in_list);
    assert!(!overlay.list_pending);
    assert!(view.my_list.is_empty());
    assert!(view.toasts.iter().any(|t| t.message.contains("Try again")));
}

#[tokio::test]
async fn concurrent_requests_keep_their_own_session() {
    let (app, handle) = app_with(
        FakeTmdb::new(DetailReply::NoVideos),
        Arc::new(MemoryStore::new()),
    )
    .await;
    let cookie = session_cookie("user-1");
    select(&app, Some(&cookie), "movie", 42).await;

    let mut tasks = Vec::new();
    for i in 0..20 {
        let app = app.clone();
        let cookie = cookie.clone();
        tasks.push(tokio::spawn(async move {
            if i % 2 == 0 {
                send(&app, post("/my-list/toggle", Some(&cookie), "")).await
            } else {
                send(&app, post("/mute", None, "")).await
            }
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::SEE_OTHER);
    }

    // Signed-in toggles never ran while an anonymous request held the session.
    let view = handle.view();
    assert!(view
        .toasts
        .iter()
        .all(|t| !t.message.contains("Sign in")));
    assert!(view
        .overlay
        .as_ref()
        .and_then(|o| o.list_error.as_deref())
        .is_none());
}

#[tokio::test]
async fn batch_stops_at_rejected_message() {
    let (_app, handle) = app_with(
        FakeTmdb::new(DetailReply::NoVideos),
        Arc::new(MemoryStore::new()),
    )
    .await;
    let user = UserId::parse("user-1").unwrap();
    let err = handle
        .dispatch_batch(vec![
            Msg::Session(Some(user)),
            Msg::Select {
                kind: MediaKind::Movie,
                id: 999,
            },
            Msg::Select {
                kind: MediaKind::Movie,
                id: 42,
            },
        ])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("999"));
    let view = handle.view();
    assert_eq!(view.signed_in.as_deref(), Some("user-1"));
    assert!(view.overlay.is_none());

    handle
        .dispatch(Msg::Select {
            kind: MediaKind::Movie,
            id: 42,
        })
        .await
        .unwrap();
    assert_eq!(handle.view().overlay.as_ref().map(|o| o.id), Some(42));
}
