use crate::api::models::*;
use crate::config::ApiKey;
use crate::reading::Reading;
use crate::vision::VisionService;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use tracing::{debug, info};

pub async fn analyze_handler(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let Json(request) = payload.map_err(|e| match e.status() {
        StatusCode::PAYLOAD_TOO_LARGE => AppError::PayloadTooLarge,
        _ => AppError::Validation(format!("Invalid request body: {}", e.body_text())),
    })?;

    let reading = analyze(
        state.vision.as_ref(),
        state.api_key.as_deref(),
        request.image_data.as_deref(),
    )
    .await?;

    info!(
        value = ?reading.numeric_value(),
        status = %reading.status(),
        unit = reading.unit(),
        "Reading extracted"
    );
    debug!(raw = %reading.raw_response(), "Model reply");

    Ok(Json(AnalyzeResponse::from(reading)))
}

/// Read a meter photo: validate input and credential, ask the vision model,
/// normalize its reply. An illegible display is a successful `unknown` reading.
pub async fn analyze(
    vision: &dyn VisionService,
    api_key: Option<&str>,
    image: Option<&str>,
) -> Result<Reading, AppError> {
    let image = validate_image(image)?;
    let key = ApiKey::parse(api_key)?;

    info!(image_len = image.len(), "Submitting image to vision model");
    let reply = vision.submit_image_for_reading(&key, &image).await?;

    Ok(Reading::from_model_reply(&reply))
}

/// Standard alphabet, padding optional.
const IMAGE_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Accept a data URL as-is; otherwise require decodable base64 and
/// return it with whitespace removed.
fn validate_image(image: Option<&str>) -> Result<String, AppError> {
    let image = image.map(str::trim).unwrap_or_default();
    if image.is_empty() {
        return Err(AppError::Validation("No image provided".to_string()));
    }

    if image.starts_with("data:") {
        return Ok(image.to_string());
    }

    let compact: String = image.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    IMAGE_BASE64
        .decode(&compact)
        .map_err(|_| AppError::Validation("Image data is not valid base64".to_string()))?;

    Ok(compact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::build_router;
    use crate::api::testing::{test_state, test_state_with_config, FakeVision};
    use crate::config::AppConfig;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use base64::engine::general_purpose::STANDARD;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn jpeg_base64() -> String {
        STANDARD.encode(b"\xFF\xD8\xFF\xE0fake-jpeg-bytes")
    }

    fn post_json(body: String) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/analyze-glycemia")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn assert_cors(response: &Response) {
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type, Authorization");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn legible_reading_is_returned() {
        let vision = Arc::new(FakeVision::replying("112"));
        let app = build_router(test_state(vision.clone(), Some("sk-test-key")));

        let body = serde_json::json!({ "imageData": jpeg_base64() }).to_string();
        let response = app.oneshot(post_json(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(&response);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["numericValue"], 112);
        assert_eq!(json["status"], "normal");
        assert_eq!(json["unit"], "mg/dL");
        assert_eq!(json["rawResponse"], "112");
        assert_eq!(vision.calls(), 1);
        assert_eq!(vision.last_image().as_deref(), Some(jpeg_base64().as_str()));
    }

    #[tokio::test]
    async fn illegible_display_is_still_success() {
        let vision = Arc::new(FakeVision::replying("Non lisible"));
        let app = build_router(test_state(vision, Some("sk-test-key")));

        let body = serde_json::json!({ "imageData": jpeg_base64() }).to_string();
        let response = app.oneshot(post_json(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["numericValue"], serde_json::Value::Null);
        assert_eq!(json["status"], "unknown");
    }

    #[tokio::test]
    async fn out_of_range_reply_is_unknown() {
        let vision = Arc::new(FakeVision::replying("750"));
        let app = build_router(test_state(vision, Some("sk-test-key")));

        let body = serde_json::json!({ "imageData": jpeg_base64() }).to_string();
        let json = body_json(app.oneshot(post_json(body)).await.unwrap()).await;
        assert_eq!(json["numericValue"], serde_json::Value::Null);
        assert_eq!(json["status"], "unknown");
    }

    #[tokio::test]
    async fn missing_image_is_400() {
        let vision = Arc::new(FakeVision::replying("112"));
        let app = build_router(test_state(vision.clone(), Some("sk-test-key")));

        for body in ["{}", r#"{"imageData":null}"#, r#"{"imageData":"   "}"#] {
            let response = app.clone().oneshot(post_json(body.to_string())).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
            assert_cors(&response);
            let json = body_json(response).await;
            assert_eq!(json["success"], false);
            assert_eq!(json["error"], "No image provided");
        }
        assert_eq!(vision.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_input_is_400() {
        let vision = Arc::new(FakeVision::replying("112"));
        let app = build_router(test_state(vision.clone(), Some("sk-test-key")));

        let response = app.clone().oneshot(post_json("not json".to_string())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);

        let body = serde_json::json!({ "imageData": "@@not base64@@" }).to_string();
        let response = app.oneshot(post_json(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(vision.calls(), 0);
    }

    #[tokio::test]
    async fn missing_credential_is_500_without_outbound_call() {
        let vision = Arc::new(FakeVision::replying("112"));
        let app = build_router(test_state(vision.clone(), None));

        let body = serde_json::json!({ "imageData": jpeg_base64() }).to_string();
        let response = app.oneshot(post_json(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_cors(&response);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("API key"));
        assert_eq!(vision.calls(), 0);
    }

    #[tokio::test]
    async fn upstream_failure_propagates_status() {
        let vision = Arc::new(FakeVision::failing(401, "Incorrect API key provided"));
        let app = build_router(test_state(vision, Some("sk-test-key")));

        let body = serde_json::json!({ "imageData": jpeg_base64() }).to_string();
        let response = app.oneshot(post_json(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_cors(&response);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Vision service error (401): Incorrect API key provided");
    }

    #[tokio::test]
    async fn transport_failure_is_generic_500() {
        let vision = Arc::new(FakeVision::unreachable());
        let app = build_router(test_state(vision, Some("sk-test-key")));

        let body = serde_json::json!({ "imageData": jpeg_base64() }).to_string();
        let response = app.oneshot(post_json(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Unexpected server error");
    }

    #[tokio::test]
    async fn options_is_empty_preflight() {
        let vision = Arc::new(FakeVision::replying("112"));
        let app = build_router(test_state(vision, Some("sk-test-key")));

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/analyze-glycemia")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(&response);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn other_methods_are_405() {
        let vision = Arc::new(FakeVision::replying("112"));
        let app = build_router(test_state(vision, Some("sk-test-key")));

        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let request = Request::builder()
                .method(method.clone())
                .uri("/analyze-glycemia")
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
            assert_cors(&response);
            assert_eq!(body_json(response).await["success"], false);
        }
    }

    #[tokio::test]
    async fn data_url_is_forwarded_unchanged() {
        let vision = FakeVision::replying("65 mg/dL");
        let data_url = format!("data:image/jpeg;base64,{}", jpeg_base64());

        let reading = analyze(&vision, Some("sk-test-key"), Some(data_url.as_str())).await.unwrap();

        assert_eq!(reading.numeric_value(), Some(65));
        assert_eq!(vision.last_image(), Some(data_url));
    }

    #[tokio::test]
    async fn whitespace_in_base64_is_removed() {
        let vision = FakeVision::replying("250");
        let encoded = jpeg_base64();
        let wrapped = format!("{}\n{}", &encoded[..8], &encoded[8..]);

        let reading = analyze(&vision, Some("sk-test-key"), Some(wrapped.as_str())).await.unwrap();

        assert_eq!(reading.status(), crate::reading::GlucoseStatus::Severe);
        assert_eq!(vision.last_image(), Some(encoded));
    }

    #[tokio::test]
    async fn unpadded_base64_is_accepted() {
        let vision = Arc::new(FakeVision::replying("98"));
        let app = build_router(test_state(vision.clone(), Some("sk-test-key")));

        let body = serde_json::json!({ "imageData": "QUJDRA" }).to_string();
        let response = app.oneshot(post_json(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["numericValue"], 98);
        assert_eq!(vision.last_image().as_deref(), Some("QUJDRA"));
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let vision = Arc::new(FakeVision::replying("112"));
        let mut config = AppConfig::default();
        config.server.static_dir = None;
        config.server.max_body_bytes = 64;
        let state = test_state_with_config(vision.clone(), Some("sk-test-key"), config);
        let app = build_router(state);

        let body = serde_json::json!({ "imageData": "QUJD".repeat(64) }).to_string();
        let response = app.oneshot(post_json(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_cors(&response);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Request body too large");
        assert_eq!(vision.calls(), 0);
    }

    #[tokio::test]
    async fn handler_panic_is_500_with_cors() {
        let vision = Arc::new(FakeVision::panicking());
        let app = build_router(test_state(vision, Some("sk-test-key")));

        let body = serde_json::json!({ "imageData": jpeg_base64() }).to_string();
        let response = app.oneshot(post_json(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_cors(&response);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Unexpected server error");
    }
}
