//! Shared helpers for the halnav conformance test suite.
//!
//! Provides [`spawn_hal_server`]: binds a `TcpListener` on an ephemeral
//! port and serves a small HAL+JSON shop API from a background thread with
//! its own `tokio` runtime, so the blocking client can be driven from plain
//! `#[test]` functions.
//!
//! # Resources
//!
//! | Path | Behaviour |
//! |------|-----------|
//! | `/` | Entry point: curies, catalog (3 named links), find template, pages, orders, and the odd cases below |
//! | `/items/{id}` | Items 1–3; 404 otherwise |
//! | `/pages/{n}` | Pages 1–5 linked by `next` |
//! | `/featured` | Two embedded items: one with a `self` link, one without |
//! | `/orders` | `POST` creates (201 + `Location`); 400 without `item` |
//! | `/orders/{id}` | `GET`, `PUT` (200, no `Location`), `DELETE` (204) |
//! | `/secure` | 401 unless `Authorization: Bearer letmein` |
//! | `/slow` | Answers after three seconds |
//! | `/old` | Permanent redirect to `/items/2` |
//! | `/text` | `text/plain` |
//! | `/broken` | Claims JSON, is not |

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

/// The bearer token `/secure` accepts.
pub const SECRET_TOKEN: &str = "letmein";

/// Request counts keyed by `"METHOD /path"` (query strings excluded).
#[derive(Clone, Default)]
pub struct Hits(Arc<Mutex<HashMap<String, usize>>>);

impl Hits {
    fn record(&self, method: &str, path: &str) {
        let mut hits = self.0.lock().unwrap_or_else(|p| p.into_inner());
        *hits.entry(format!("{method} {path}")).or_default() += 1;
    }

    pub fn get(&self, method: &str, path: &str) -> usize {
        let hits = self.0.lock().unwrap_or_else(|p| p.into_inner());
        hits.get(&format!("{method} {path}")).copied().unwrap_or(0)
    }
}

/// A running server.
pub struct HalServer {
    /// E.g. `http://127.0.0.1:51234`, no trailing slash.
    pub base_url: String,
    pub hits: Hits,
}

impl HalServer {
    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Start the shop API on an ephemeral port.
///
/// # Panics
///
/// Panics if the runtime cannot be built or the listener cannot be bound.
pub fn spawn_hal_server() -> HalServer {
    let (tx, rx) = mpsc::channel();
    let hits = Hits::default();
    let server_hits = hits.clone();

    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("build tokio runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind ephemeral port");
            let addr = listener.local_addr().expect("get local addr");
            let base = format!("http://{addr}");
            let shop = Shop {
                base: Arc::from(base.as_str()),
                hits: server_hits,
                next_order: Arc::new(AtomicU64::new(42)),
            };
            tx.send(base).expect("report server address");
            axum::serve(listener, router(shop))
                .await
                .expect("hal server error");
        });
    });

    let base_url = rx.recv().expect("hal server failed to start");
    HalServer { base_url, hits }
}

#[derive(Clone)]
struct Shop {
    base: Arc<str>,
    hits: Hits,
    next_order: Arc<AtomicU64>,
}

fn router(shop: Shop) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/items/{id}", get(item))
        .route("/pages/{n}", get(page))
        .route("/featured", get(featured))
        .route("/orders", axum::routing::post(create_order))
        .route("/orders/{id}", get(order).put(update_order).delete(delete_order))
        .route("/secure", get(secure))
        .route("/slow", get(slow))
        .route("/old", get(|| async { Redirect::permanent("/items/2") }))
        .route("/text", get(|| async { ([(header::CONTENT_TYPE, "text/plain")], "plain words") }))
        .route("/broken", get(|| async { ([(header::CONTENT_TYPE, "application/json")], "{not json") }))
        .layer(middleware::from_fn_with_state(shop.clone(), count_hits))
        .with_state(shop)
}

async fn count_hits(State(shop): State<Shop>, request: Request, next: Next) -> Response {
    shop.hits.record(request.method().as_str(), request.uri().path());
    next.run(request).await
}

fn hal(status: StatusCode, body: Value) -> Response {
    (status, [(header::CONTENT_TYPE, "application/hal+json")], body.to_string()).into_response()
}

const ITEMS: [(&str, &str, &str); 3] = [
    ("widget1", "widget", "red"),
    ("widget2", "widget", "blue"),
    ("gadget1", "gadget", "green"),
];

fn item_doc(id: usize) -> Option<Value> {
    let (name, profile, colour) = ITEMS.get(id.checked_sub(1)?)?;
    Some(json!({
        "_links": {
            "self": {"href": format!("/items/{id}"), "title": name},
            "ws:owner": {"href": "/owners/1"}
        },
        "id": id,
        "name": name,
        "kind": profile,
        "colour": colour
    }))
}

async fn root(State(shop): State<Shop>) -> Response {
    let catalog: Vec<Value> = ITEMS
        .iter()
        .enumerate()
        .map(|(i, (name, profile, _))| json!({"href": format!("/items/{}", i + 1), "name": name, "profile": profile}))
        .collect();
    hal(
        StatusCode::OK,
        json!({
            "_links": {
                "self": {"href": "/", "title": "Shop"},
                "curies": [{"name": "ws", "href": format!("{}/rels/{{rel}}", shop.base), "templated": true}],
                "ws:catalog": catalog,
                "ws:find": {"href": "/items{/id}{?colour}", "templated": true},
                "ws:pages": {"href": "/pages/1"},
                "ws:featured": {"href": "/featured"},
                "ws:orders": {"href": "/orders"},
                "ws:secure": {"href": "/secure"},
                "ws:slow": {"href": "/slow"},
                "ws:old": {"href": "/old"}
            },
            "welcome": "shop"
        }),
    )
}

async fn item(Path(id): Path<usize>) -> Response {
    match item_doc(id) {
        Some(doc) => hal(StatusCode::OK, doc),
        None => hal(StatusCode::NOT_FOUND, json!({"message": "no such item"})),
    }
}

async fn page(Path(n): Path<u32>) -> Response {
    if !(1..=5).contains(&n) {
        return hal(StatusCode::NOT_FOUND, json!({"message": "no such page"}));
    }
    let mut links = json!({"self": {"href": format!("/pages/{n}")}});
    if n < 5 {
        links["next"] = json!({"href": format!("/pages/{}", n + 1)});
    }
    if n > 1 {
        links["prev"] = json!({"href": format!("/pages/{}", n - 1)});
    }
    hal(StatusCode::OK, json!({"_links": links, "page": n}))
}

async fn featured() -> Response {
    let first = item_doc(1).unwrap_or_default();
    hal(
        StatusCode::OK,
        json!({
            "_links": {"self": {"href": "/featured"}},
            "_embedded": {"ws:item": [first, {"note": "anonymous"}]},
            "count": 2
        }),
    )
}

async fn create_order(State(shop): State<Shop>, Json(body): Json<Value>) -> Response {
    if body.get("item").is_none() {
        return hal(StatusCode::BAD_REQUEST, json!({"error": "item is required"}));
    }
    let id = shop.next_order.fetch_add(1, Ordering::SeqCst);
    (StatusCode::CREATED, [(header::LOCATION, format!("/orders/{id}"))]).into_response()
}

async fn order(Path(id): Path<u64>) -> Response {
    hal(
        StatusCode::OK,
        json!({"_links": {"self": {"href": format!("/orders/{id}")}}, "id": id, "status": "pending"}),
    )
}

async fn update_order(Path(id): Path<u64>, Json(body): Json<Value>) -> Response {
    hal(StatusCode::OK, json!({"id": id, "updated": true, "received": body}))
}

async fn delete_order(Path(_id): Path<u64>) -> Response {
    StatusCode::NO_CONTENT.into_response()
}

async fn secure(headers: HeaderMap) -> Response {
    let expected = format!("Bearer {SECRET_TOKEN}");
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => hal(StatusCode::OK, json!({"secret": "ok"})),
        _ => hal(StatusCode::UNAUTHORIZED, json!({"message": "unauthorized"})),
    }
}

async fn slow() -> Response {
    tokio::time::sleep(Duration::from_secs(3)).await;
    hal(StatusCode::OK, json!({"slow": true}))
}
