use async_trait::async_trait;
use crate::config::BedrockConfig;
use crate::providers::traits::{CompletionProvider, EmbeddingProvider, GenerationParams, ProviderError};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Bedrock runtime client for Titan embeddings and Nova chat models.
///
/// Authenticates with a Bedrock API key sent as a bearer token.
#[derive(Clone)]
pub struct BedrockProvider {
    client: Client,
    base_url: String,
    bearer_token: String,
    embedding_model: String,
    chat_model: String,
}

impl BedrockProvider {
    pub fn new(config: &BedrockConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let bearer_token = config
            .bearer_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProviderError::Config("missing AWS_BEARER_TOKEN_BEDROCK".to_string()))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: config
                .endpoint_url
                .clone()
                .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", config.region)),
            bearer_token,
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
        })
    }

    fn invoke_url(&self, model_id: &str) -> String {
        format!(
            "{}/model/{}/invoke",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(model_id)
        )
    }

    async fn invoke(&self, model_id: &str, body: &Value) -> Result<Value, ProviderError> {
        let response = self.client
            .post(self.invoke_url(model_id))
            .header("Authorization", format!("Bearer {}", self.bearer_token.trim()))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ProviderError::Status { status: status.as_u16(), body });
        }

        response.json::<Value>().await
            .map_err(|e| ProviderError::MalformedResponse(format!("response is not JSON: {}", e)))
    }
}

#[async_trait]
impl EmbeddingProvider for BedrockProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let body = json!({ "inputText": text });
        let response = self.invoke(&self.embedding_model, &body).await?;
        parse_embedding(&response)
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }
}

#[async_trait]
impl CompletionProvider for BedrockProvider {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ProviderError> {
        let body = nova_request(prompt, params);
        let response = self.invoke(&self.chat_model, &body).await?;
        parse_nova_answer(&response)
    }

    fn chat_model(&self) -> &str {
        &self.chat_model
    }
}

fn nova_request(prompt: &str, params: &GenerationParams) -> Value {
    json!({
        "messages": [
            {
                "role": "user",
                "content": [{ "text": prompt }]
            }
        ],
        "inferenceConfig": {
            "maxTokens": params.max_output_tokens,
            "temperature": params.temperature
        }
    })
}

/// Pulls `embedding` out of a Titan response. Every element must be a number.
fn parse_embedding(response: &Value) -> Result<Vec<f32>, ProviderError> {
    let values = response
        .get("embedding")
        .and_then(|e| e.as_array())
        .ok_or_else(|| ProviderError::MalformedResponse("missing `embedding` array".to_string()))?;

    if values.is_empty() {
        return Err(ProviderError::MalformedResponse("empty `embedding` array".to_string()));
    }

    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| ProviderError::MalformedResponse(format!("non-numeric embedding value: {}", v)))
        })
        .collect()
}

fn parse_nova_answer(response: &Value) -> Result<String, ProviderError> {
    response
        .get("output")
        .and_then(|output| output.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.get(0))
        .and_then(|block| block.get("text"))
        .and_then(|text| text.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            let debug_json = serde_json::to_string(response).unwrap_or_default();
            ProviderError::MalformedResponse(format!("missing output.message.content[0].text in {}", debug_json))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::State,
        http::{HeaderMap, StatusCode, Uri},
        response::{IntoResponse, Response},
        routing::post,
        Json, Router,
    };
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn config() -> BedrockConfig {
        BedrockConfig {
            region: "ap-southeast-2".to_string(),
            endpoint_url: None,
            bearer_token: Some("token".to_string()),
            embedding_model: "amazon.titan-embed-text-v2:0".to_string(),
            chat_model: "amazon.nova-pro-v1:0".to_string(),
        }
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let mut config = config();
        config.bearer_token = None;
        assert!(matches!(
            BedrockProvider::new(&config, Duration::from_secs(5)),
            Err(ProviderError::Config(_))
        ));
    }

    #[test]
    fn invoke_url_encodes_model_id() {
        let provider = BedrockProvider::new(&config(), Duration::from_secs(5)).unwrap();
        assert_eq!(
            provider.invoke_url("amazon.titan-embed-text-v2:0"),
            "https://bedrock-runtime.ap-southeast-2.amazonaws.com/model/amazon.titan-embed-text-v2%3A0/invoke"
        );
    }

    #[test]
    fn parses_titan_embedding() {
        let response = json!({ "embedding": [0.5, -1.0, 2], "inputTextTokenCount": 3 });
        assert_eq!(parse_embedding(&response).unwrap(), vec![0.5, -1.0, 2.0]);
    }

    #[test]
    fn rejects_malformed_embeddings() {
        for response in [
            json!({}),
            json!({ "embedding": "nope" }),
            json!({ "embedding": [] }),
            json!({ "embedding": [1.0, "x"] }),
        ] {
            assert!(matches!(
                parse_embedding(&response),
                Err(ProviderError::MalformedResponse(_))
            ));
        }
    }

    #[test]
    fn nova_request_carries_inference_config() {
        let body = nova_request("hello", &GenerationParams { max_output_tokens: 500, temperature: 0.3 });
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"][0]["text"], "hello");
        assert_eq!(body["inferenceConfig"]["maxTokens"], 500);
        assert!((body["inferenceConfig"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn parses_nova_answer() {
        let response = json!({
            "output": { "message": { "role": "assistant", "content": [{ "text": "Answer [1]." }] } },
            "stopReason": "end_turn"
        });
        assert_eq!(parse_nova_answer(&response).unwrap(), "Answer [1].");
        assert!(matches!(
            parse_nova_answer(&json!({ "output": { "message": { "content": [] } } })),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    /// (path, authorization header, request body) per call.
    type Seen = Arc<Mutex<Vec<(String, Option<String>, Value)>>>;

    async fn fake_invoke(State(seen): State<Seen>, uri: Uri, headers: HeaderMap, Json(body): Json<Value>) -> Response {
        let path = uri.path().to_string();
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        seen.lock().push((path.clone(), auth, body));

        if path.contains("titan") {
            Json(json!({ "embedding": [0.25, -0.5], "inputTextTokenCount": 2 })).into_response()
        } else if path.contains("nova") {
            Json(json!({ "output": { "message": { "content": [{ "text": "From the papers [1]." }] } } }))
                .into_response()
        } else if path.contains("throttled") {
            (StatusCode::INTERNAL_SERVER_ERROR, "ThrottlingException").into_response()
        } else {
            "plain text, not json".into_response()
        }
    }

    async fn serve_fake() -> (String, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/model/:model/invoke", post(fake_invoke))
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{}", addr), seen)
    }

    fn provider_at(base_url: &str, embedding_model: &str, chat_model: &str) -> BedrockProvider {
        let mut config = config();
        config.bearer_token = Some(" test-token ".to_string());
        config.embedding_model = embedding_model.to_string();
        config.chat_model = chat_model.to_string();
        config.endpoint_url = Some(format!("{}/", base_url));
        BedrockProvider::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn embeds_through_invoke_with_bearer_auth() {
        let (base_url, seen) = serve_fake().await;
        let provider = provider_at(&base_url, "amazon.titan-embed-text-v2:0", "amazon.nova-pro-v1:0");

        let vector = provider.embed("switch access").await.unwrap();
        assert_eq!(vector, vec![0.25, -0.5]);

        let calls = seen.lock();
        assert_eq!(calls.len(), 1);
        let (path, auth, body) = &calls[0];
        assert_eq!(path, "/model/amazon.titan-embed-text-v2%3A0/invoke");
        assert_eq!(auth.as_deref(), Some("Bearer test-token"));
        assert_eq!(body, &json!({ "inputText": "switch access" }));
    }

    #[tokio::test]
    async fn generates_through_invoke() {
        let (base_url, seen) = serve_fake().await;
        let provider = provider_at(&base_url, "amazon.titan-embed-text-v2:0", "amazon.nova-pro-v1:0");

        let answer = provider
            .generate("prompt text", &GenerationParams { max_output_tokens: 64, temperature: 0.1 })
            .await
            .unwrap();
        assert_eq!(answer, "From the papers [1].");

        let calls = seen.lock();
        let (path, _, body) = &calls[0];
        assert_eq!(path, "/model/amazon.nova-pro-v1%3A0/invoke");
        assert_eq!(body["messages"][0]["content"][0]["text"], "prompt text");
        assert_eq!(body["inferenceConfig"]["maxTokens"], 64);
    }

    #[tokio::test]
    async fn error_status_carries_the_body() {
        let (base_url, _) = serve_fake().await;
        let provider = provider_at(&base_url, "throttled-embed", "throttled-chat");

        match provider.embed("x").await {
            Err(ProviderError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "ThrottlingException");
            }
            other => panic!("expected status error, got {:?}", other),
        }
        assert!(matches!(
            provider.generate("x", &GenerationParams::default()).await,
            Err(ProviderError::Status { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn non_json_success_is_malformed() {
        let (base_url, _) = serve_fake().await;
        let provider = provider_at(&base_url, "plain-embed", "plain-chat");

        assert!(matches!(provider.embed("x").await, Err(ProviderError::MalformedResponse(_))));
        assert!(matches!(
            provider.generate("x", &GenerationParams::default()).await,
            Err(ProviderError::MalformedResponse(_))
        ));
    }
}
