// Tests for the Gemini advisory client and the endpoints that call it
// Uses mockito for HTTP mocking

use std::sync::Arc;
use std::time::Duration;

use aqualert_service::advisory::{AdvisoryClient, AdvisoryError};
use aqualert_service::api::{create_router, AppState};
use aqualert_service::classifier::{Classifier, ModelSpec};
use aqualert_service::store::WaterPointStore;
use aqualert_service::summary::SummaryGenerator;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use mockito::{Matcher, Server};
use serde_json::{json, Map, Value};
use tower::ServiceExt;

const GENERATE_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

fn create_test_client(base_url: String) -> AdvisoryClient {
    AdvisoryClient::with_base_url("test-key".to_string(), Duration::from_secs(5), base_url)
        .unwrap()
}

fn gemini_reply(text: &str) -> String {
    json!({
        "candidates": [
            { "content": { "parts": [ { "text": text } ] } }
        ]
    })
    .to_string()
}

#[tokio::test]
async fn test_advise_success() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("POST", GENERATE_PATH)
        .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
        .match_body(Matcher::Regex(
            "Act as a public health expert".to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_reply("### Simple Summary:\nDo not drink."))
        .create_async()
        .await;

    let client = create_test_client(server.url());
    let mut sample = Map::new();
    sample.insert("ph".to_string(), json!(6.1));

    let advice = client.advise("Not Potable", 91.5, &sample).await.unwrap();
    assert!(advice.contains("Do not drink."));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_advise_sends_prompt_with_sample_values() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("POST", GENERATE_PATH)
        .match_query(Matcher::Any)
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("Not Potable".to_string()),
            Matcher::Regex("91.50%".to_string()),
            Matcher::Regex("pH: 6.1".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_reply("advice"))
        .create_async()
        .await;

    let client = create_test_client(server.url());
    let mut sample = Map::new();
    sample.insert("ph".to_string(), json!(6.1));

    client.advise("Not Potable", 91.5, &sample).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_advise_provider_error() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("POST", GENERATE_PATH)
        .match_query(Matcher::Any)
        .with_status(429)
        .with_body("quota exceeded")
        .create_async()
        .await;

    let client = create_test_client(server.url());
    let err = client.advise("Potable", 60.0, &Map::new()).await.unwrap_err();

    match err {
        AdvisoryError::Provider { status, message } => {
            assert_eq!(status, 429);
            assert!(message.contains("quota exceeded"));
        }
        other => panic!("Expected Provider error, got {:?}", other),
    }

    mock.assert_async().await;
}

#[tokio::test]
async fn test_advise_empty_candidates() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", GENERATE_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "candidates": [] }).to_string())
        .create_async()
        .await;

    let client = create_test_client(server.url());
    let err = client.advise("Potable", 60.0, &Map::new()).await.unwrap_err();
    assert!(matches!(err, AdvisoryError::EmptyResponse));
}

#[tokio::test]
async fn test_assess_image_sends_inline_data() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("POST", GENERATE_PATH)
        .match_query(Matcher::Any)
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("inline_data".to_string()),
            Matcher::Regex("image/png".to_string()),
            // base64 of b"pixels"
            Matcher::Regex("cGl4ZWxz".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_reply("### Visual Assessment\nCloudy."))
        .create_async()
        .await;

    let client = create_test_client(server.url());
    let analysis = client.assess_image(b"pixels", "image/png").await.unwrap();
    assert!(analysis.contains("Cloudy."));

    mock.assert_async().await;
}

// Endpoint-level behavior when the provider is reachable or failing.

fn app_state_with_client(client: AdvisoryClient) -> AppState {
    let features = [
        "ph",
        "Hardness",
        "Solids",
        "Chloramines",
        "Sulfate",
        "Conductivity",
        "Organic_carbon",
        "Trihalomethanes",
        "Turbidity",
    ];
    let n = features.len();
    let classifier = Classifier::from_spec(ModelSpec {
        features: features.iter().map(|f| f.to_string()).collect(),
        means: vec![0.0; n],
        scales: vec![1.0; n],
        weights: vec![0.0; n],
        bias: -2.0,
    })
    .unwrap();

    AppState {
        classifier: Some(Arc::new(classifier)),
        advisory: Some(Arc::new(client)),
        store: WaterPointStore::with_sample_points(),
        summary: SummaryGenerator::new(Some(1)),
    }
}

fn valid_sample() -> Value {
    json!({
        "ph": 7.2,
        "Hardness": 190.0,
        "Solids": 21000.0,
        "Chloramines": 7.0,
        "Sulfate": 330.0,
        "Conductivity": 420.0,
        "Organic_carbon": 14.0,
        "Trihalomethanes": 65.0,
        "Turbidity": 3.9
    })
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_predict_includes_generated_advice() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", GENERATE_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_reply("### Simple Summary:\nBoil before drinking."))
        .create_async()
        .await;

    let app = create_router(app_state_with_client(create_test_client(server.url())));
    let response = app.oneshot(post_json("/predict", &valid_sample())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["gemini_advice"]
        .as_str()
        .unwrap()
        .contains("Boil before drinking."));
}

#[tokio::test]
async fn test_predict_provider_failure_is_request_fatal_400() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", GENERATE_PATH)
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("backend exploded")
        .create_async()
        .await;

    let app = create_router(app_state_with_client(create_test_client(server.url())));
    let response = app.oneshot(post_json("/predict", &valid_sample())).await.unwrap();

    // The predict path leaves the advisory call unguarded: the whole
    // request fails with the generic error shape.
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().starts_with("An error occurred:"));
}

#[tokio::test]
async fn test_analyze_image_success() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", GENERATE_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_reply("### Visual Assessment\nVisible sediment."))
        .create_async()
        .await;

    let app = create_router(app_state_with_client(create_test_client(server.url())));
    let body = json!({ "image": "data:image/jpeg;base64,cGl4ZWxz" });
    let response = app.oneshot(post_json("/analyze_image", &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(json["analysis"].as_str().unwrap().contains("Visible sediment."));
}

#[tokio::test]
async fn test_analyze_image_provider_failure_is_500() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", GENERATE_PATH)
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("overloaded")
        .create_async()
        .await;

    let app = create_router(app_state_with_client(create_test_client(server.url())));
    let body = json!({ "image": "data:image/jpeg;base64,cGl4ZWxz" });
    let response = app.oneshot(post_json("/analyze_image", &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Error during visual analysis:"));
}
