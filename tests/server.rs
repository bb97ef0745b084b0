use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use slicer_server::{
    model::model_from_json, ModelError, RouteTable, ServerConfig, Slicer, StartupError,
};
use sqlx::postgres::PgPoolOptions;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::ServiceExt;

fn sample_model() -> Value {
    json!({
        "name": "sales",
        "label": "Sales",
        "dimensions": [
            {"name": "time", "levels": ["year", "month", "day"],
             "hierarchies": [{"name": "ymd", "levels": ["year", "month", "day"]}]},
            {"name": "product", "label": "Product"}
        ],
        "cubes": [
            {"name": "orders", "dimensions": ["time", "product"], "measures": [{"name": "amount"}]}
        ],
        "translations": {
            "sk": {"dimensions": {"time": "Čas", "product": "Produkt"}}
        }
    })
}

fn slicer() -> Slicer {
    let model = model_from_json(sample_model(), "test").unwrap();
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_lazy("postgres://localhost/slicer_test")
        .unwrap();
    Slicer::from_parts(model, pool, RouteTable::standard().unwrap(), 1024)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn unknown_path_is_json_not_found() {
    let response = slicer().router().oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "not found");
    assert!(body["error"]["reason"].as_str().unwrap().contains("/nope"));
}

#[tokio::test]
async fn wrong_method_is_not_allowed_with_allow_header() {
    let response = slicer().router().oneshot(get("/report")).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ALLOW], "POST");
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "method not allowed");
}

#[tokio::test]
async fn dimension_is_returned_as_loaded() {
    let app = slicer();
    let expected = serde_json::to_value(app.state().model.dimension("time").unwrap()).unwrap();
    let response = app.router().oneshot(get("/model/dimension/time")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, expected);
}

#[tokio::test]
async fn unknown_dimension_levels_is_not_found() {
    let response = slicer()
        .router()
        .oneshot(get("/model/dimension/nope/levels"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "resource not found");
    assert!(body["error"]["reason"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn level_names_follow_default_hierarchy() {
    let response = slicer()
        .router()
        .oneshot(get("/model/dimension/time/level_names/"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!(["year", "month", "day"]));
}

#[tokio::test]
async fn head_is_served_by_get_routes() {
    let request = Request::builder()
        .method(Method::HEAD)
        .uri("/version")
        .body(Body::empty())
        .unwrap();
    let response = slicer().router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn every_response_carries_a_request_id() {
    let app = slicer().router();
    let ok = app.clone().oneshot(get("/version")).await.unwrap();
    let missing = app.oneshot(get("/missing")).await.unwrap();
    let a = ok.headers()["x-request-id"].to_str().unwrap().to_string();
    let b = missing.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&a).is_ok());
    assert_ne!(a, b);
}

#[tokio::test]
async fn search_without_text_fails_before_touching_the_database() {
    let response = slicer().router().oneshot(get("/search?q=%20")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "bad request");
}

#[tokio::test]
async fn oversized_report_body_is_rejected() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/report")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(vec![b' '; 4096]))
        .unwrap();
    let response = slicer().router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "request body too large");
}

/// Request body whose client disconnects before sending anything.
struct ResetBody;

impl http_body::Body for ResetBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Bytes>, Self::Error>>> {
        Poll::Ready(Some(Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "client went away",
        ))))
    }
}

#[tokio::test]
async fn broken_body_is_a_bad_request_not_too_large() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/report")
        .body(Body::new(ResetBody))
        .unwrap();
    let response = slicer().router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "bad request");
    assert!(body["error"]["reason"].as_str().unwrap().contains("client went away"));
}

fn post_report(body: &'static str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/report")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn malformed_reports_are_rejected_before_the_database() {
    let cases = [
        ("", "empty"),
        ("{\"queries\": ", "invalid report request"),
        (r#"{"queries": {"total": {"cube": "orders"}}}"#, "no 'query' kind"),
        (r#"{"queries": {"total": {"query": "pivot"}}}"#, "unknown report query"),
    ];
    let app = slicer().router();
    for (body, reason) in cases {
        let response = app.clone().oneshot(post_report(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body:?}");
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "bad request");
        let got = json["error"]["reason"].as_str().unwrap();
        assert!(got.contains(reason), "reason {got:?} for body {body:?}");
    }
}

#[tokio::test]
async fn concurrent_requests_do_not_share_context() {
    let app = slicer().router();
    let mut tasks = Vec::new();
    for i in 0..16 {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            let (uri, name, label) = if i % 2 == 0 {
                ("/model/dimension/time?lang=sk", "time", json!("Čas"))
            } else {
                ("/model/dimension/product", "product", json!("Product"))
            };
            let response = app.oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = body_json(response).await;
            assert_eq!(body["name"], name);
            assert_eq!(body["label"], label);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
}

#[tokio::test]
async fn unreadable_model_aborts_startup() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::default();
    config.db.url = Some("postgres://localhost/slicer_test".into());
    config.model.path = Some(dir.path().join("missing.json"));
    let err = Slicer::initialize(&config).await.err().unwrap();
    match err {
        StartupError::ModelLoad { source_path, cause } => {
            assert!(source_path.ends_with("missing.json"));
            assert!(matches!(cause, ModelError::Io { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unset_model_source_is_reported_as_unknown_path() {
    let mut config = ServerConfig::default();
    config.db.url = Some("postgres://localhost/slicer_test".into());
    let err = Slicer::initialize(&config).await.err().unwrap();
    match err {
        StartupError::ModelLoad { source_path, cause } => {
            assert_eq!(source_path, "unknown path");
            assert!(matches!(cause, ModelError::SourceUnset));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_database_url_aborts_startup() {
    let err = Slicer::initialize(&ServerConfig::default()).await.err().unwrap();
    assert!(matches!(err, StartupError::Config(_)));
}
