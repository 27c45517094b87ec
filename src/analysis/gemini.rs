use std::time::Duration;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, instrument};

use super::{parse_estimate, AnalysisError, FoodAnalyzer, NutritionEstimate};
use crate::config::GeminiConfig;
use crate::images::services::CapturedImage;

const INSTRUCTION: &str = "Analyze this image and identify the main food item. \
Estimate the calories and macronutrients (protein, carbs, fat) for the portion shown. \
If there are multiple items, provide an aggregate or the most prominent one. \
Return the data in JSON format.";

/// Analyzer backed by the Gemini `generateContent` REST endpoint.
pub struct GeminiAnalyzer {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GeminiAnalyzer {
    pub fn new(cfg: &GeminiConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            cfg.base_url.trim_end_matches('/'),
            cfg.model
        );
        Ok(Self {
            client,
            endpoint,
            api_key: cfg.api_key.clone(),
        })
    }
}

#[async_trait]
impl FoodAnalyzer for GeminiAnalyzer {
    #[instrument(skip(self, image), fields(mime = %image.mime, bytes = image.bytes.len()))]
    async fn analyze(&self, image: &CapturedImage) -> Result<NutritionEstimate, AnalysisError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(image))
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;
        if !status.is_success() {
            error!(%status, "gemini request failed");
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = first_candidate_text(&body)?;
        debug!(len = text.len(), "gemini replied");
        parse_estimate(&text)
    }
}

fn request_body(image: &CapturedImage) -> Value {
    json!({
        "contents": [{
            "parts": [
                { "inlineData": { "mimeType": image.mime, "data": Base64::encode_string(&image.bytes) } },
                { "text": INSTRUCTION }
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema()
        }
    })
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": { "type": "STRING", "description": "Name of the food item" },
            "calories": { "type": "NUMBER", "description": "Estimated total calories" },
            "macros": {
                "type": "OBJECT",
                "properties": {
                    "protein": { "type": "NUMBER", "description": "Protein in grams" },
                    "carbs": { "type": "NUMBER", "description": "Carbohydrates in grams" },
                    "fat": { "type": "NUMBER", "description": "Fat in grams" }
                },
                "required": ["protein", "carbs", "fat"]
            },
            "confidence": { "type": "STRING", "description": "Low, Medium, or High confidence in the estimate" }
        },
        "required": ["name", "calories", "macros"]
    })
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

fn first_candidate_text(body: &str) -> Result<String, AnalysisError> {
    let resp: GenerateResponse =
        serde_json::from_str(body).map_err(|e| AnalysisError::Decode(e.to_string()))?;
    resp.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
        .filter(|t| !t.trim().is_empty())
        .ok_or(AnalysisError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use bytes::Bytes;

    fn jpeg() -> CapturedImage {
        CapturedImage {
            mime: "image/jpeg".into(),
            bytes: Bytes::from_static(&[0xff, 0xd8, 0xff, 0xe0]),
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    fn analyzer(base_url: String) -> GeminiAnalyzer {
        GeminiAnalyzer::new(&GeminiConfig {
            api_key: "test-key".into(),
            model: "gemini-2.5-flash".into(),
            base_url,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn request_carries_image_instruction_and_schema() {
        let body = request_body(&jpeg());
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "/9j/4A==");
        assert!(parts[1]["text"].as_str().unwrap().contains("macronutrients"));
        let schema = &body["generationConfig"]["responseSchema"];
        assert_eq!(schema["required"], json!(["name", "calories", "macros"]));
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn empty_candidates_is_empty_response() {
        assert!(matches!(
            first_candidate_text(r#"{"candidates":[]}"#),
            Err(AnalysisError::EmptyResponse)
        ));
        assert!(matches!(
            first_candidate_text(r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#),
            Err(AnalysisError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn analyze_decodes_first_candidate() {
        let router = Router::new().route(
            "/v1beta/models/*rest",
            post(|Json(req): Json<Value>| async move {
                assert_eq!(req["contents"][0]["parts"][0]["inlineData"]["data"], "/9j/4A==");
                Json(json!({
                    "candidates": [{
                        "content": { "parts": [{
                            "text": "{\"name\":\"Banana\",\"calories\":105,\"macros\":{\"protein\":1.3,\"carbs\":27,\"fat\":0.4},\"confidence\":\"High\"}"
                        }]}
                    }]
                }))
            }),
        );
        let base = serve(router).await;

        let est = analyzer(base).analyze(&jpeg()).await.unwrap();
        assert_eq!(est.name, "Banana");
        assert_eq!(est.calories, 105.0);
        assert_eq!(est.macros.carbs, 27.0);
    }

    #[tokio::test]
    async fn analyze_maps_http_errors() {
        let router = Router::new().route(
            "/v1beta/models/*rest",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "quota exceeded") }),
        );
        let base = serve(router).await;

        let err = analyzer(base).analyze(&jpeg()).await.unwrap_err();
        match err {
            AnalysisError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "quota exceeded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
