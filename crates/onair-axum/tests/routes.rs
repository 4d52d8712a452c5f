//! Plain HTTP routes, driven through the router without a socket.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use onair_axum::create_router;
use onair_core::InterruptSource;
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{RecordingPublisher, fixture};

async fn parse_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap_or_else(|e| panic!("Expected valid JSON body: {e}"))
}

fn post_interrupt(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/interrupts")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_calls_and_sinks() {
    let fx = fixture(RecordingPublisher::default());
    let app = create_router(fx.state.clone());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["activeCalls"], 0);
    assert_eq!(body["sinks"], json!(["telephony"]));
}

#[tokio::test]
async fn breaking_news_is_accepted_and_published() {
    let fx = fixture(RecordingPublisher::default());
    let app = create_router(fx.state.clone());

    let response = app
        .oneshot(post_interrupt(&json!({
            "kind": "breaking_news",
            "text": "  The river has crested.  "
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = parse_json(response).await;
    assert_eq!(body, json!({ "source": "breaking_news", "priority": 3 }));

    let signals = fx.publisher.signals.lock().unwrap();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].source, InterruptSource::BreakingNews);
    assert_eq!(signals[0].payload, "The river has crested.");
}

#[tokio::test]
async fn listener_comments_map_to_listener_input() {
    let fx = fixture(RecordingPublisher::default());
    let app = create_router(fx.state.clone());

    let response = app
        .oneshot(post_interrupt(&json!({ "kind": "listener", "text": "Play more jazz" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(parse_json(response).await["source"], "listener_input");
}

#[tokio::test]
async fn blank_text_is_a_bad_request() {
    let fx = fixture(RecordingPublisher::default());
    let app = create_router(fx.state.clone());

    let response = app
        .oneshot(post_interrupt(&json!({ "kind": "trend", "text": "   " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = parse_json(response).await;
    assert_eq!(body["status"], 400);
    assert!(fx.publisher.signals.lock().unwrap().is_empty());
}

#[tokio::test]
async fn a_finished_show_refuses_interrupts() {
    let fx = fixture(RecordingPublisher {
        closed: true,
        ..RecordingPublisher::default()
    });
    let app = create_router(fx.state.clone());

    let response = app
        .oneshot(post_interrupt(&json!({ "kind": "trend", "text": "#eclipse" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn unknown_kinds_are_rejected() {
    let fx = fixture(RecordingPublisher::default());
    let app = create_router(fx.state.clone());

    let response = app
        .oneshot(post_interrupt(&json!({ "kind": "weather", "text": "rain" })))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}
