use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use comics_crawler::{FetchError, Fetcher, HttpFetcher};
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;

async fn comic_info(Path(id): Path<u32>) -> Response {
    match id {
        1 | 2 => Json(json!({
            "num": id,
            "img": format!("https://imgs.example/{id}.png"),
            "safe_title": "Barrel",
            "transcript": "A boy sits in a barrel floating in the ocean",
            "alt": "Don't we all."
        }))
        .into_response(),
        3 => "this is not json".into_response(),
        _ => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

async fn serve_source() -> String {
    let app = Router::new()
        .route("/info.0.json", get(|| async { Json(json!({"num": 2, "img": "https://imgs.example/2.png"})) }))
        .route("/:id/info.0.json", get(comic_info));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn fetches_and_normalizes_a_comic() {
    let base = serve_source().await;
    let fetcher = HttpFetcher::new(&base, Duration::from_secs(5), "test-agent").unwrap();

    let (id, entry) = fetcher.fetch(1).await.unwrap();
    assert_eq!(id, 1);
    assert_eq!(entry.url, "https://imgs.example/1.png");
    assert!(entry.keywords.contains(&"barrel".to_string()));
    assert!(entry.keywords.contains(&"ocean".to_string()));
    assert_eq!(fetcher.latest_id().await.unwrap(), 2);
}

#[tokio::test]
async fn missing_and_malformed_comics_are_fetch_errors() {
    let base = serve_source().await;
    let fetcher = HttpFetcher::new(&base, Duration::from_secs(5), "test-agent").unwrap();

    assert!(matches!(fetcher.fetch(7).await, Err(FetchError::Status { status: 404, .. })));
    assert!(matches!(fetcher.fetch(3).await, Err(FetchError::Payload(_))));
}
