use serde_json::{json, Value};
use std::time::Duration;

use crate::retry::execute_with_retry;
use crate::{EmbedConfig, EmbedError};

#[derive(Clone, Copy)]
enum ApiProviderKind {
    HuggingFace,
    OpenAi,
    Custom,
}

/// Remote inference against a feature-extraction endpoint. Returns the raw
/// vector; normalization and metadata wrapping happen in the caller.
pub(crate) async fn embed_via_api(text: &str, cfg: &EmbedConfig) -> Result<Vec<f32>, EmbedError> {
    let url = cfg
        .api_url
        .as_deref()
        .ok_or_else(|| EmbedError::InvalidConfig("api_url is required for api mode".into()))?;

    let payload = build_api_payload(api_provider_kind(cfg), text, cfg);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.api_timeout_secs.unwrap_or(30)))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| EmbedError::Download(e.to_string()))?;

    let retry_cfg = cfg.retry.unwrap_or_default();
    let auth = cfg.api_auth_header.clone();
    let response = execute_with_retry(&retry_cfg, |_attempt| {
        let client = client.clone();
        let url = url.to_string();
        let payload = payload.clone();
        let auth = auth.clone();
        async move {
            send_api_request(&client, &url, auth.as_deref(), &payload)
                .await
                .map_err(|e| e.to_string())
        }
    })
    .await
    .map_err(EmbedError::Download)?;

    let mut vectors = parse_embeddings_from_value(response)?;
    vectors
        .pop()
        .ok_or_else(|| EmbedError::Inference("API response did not contain embeddings".into()))
}

fn api_provider_kind(cfg: &EmbedConfig) -> ApiProviderKind {
    let provider = cfg
        .api_provider
        .as_deref()
        .unwrap_or("hf")
        .to_ascii_lowercase();
    match provider.as_str() {
        "hf" | "huggingface" => ApiProviderKind::HuggingFace,
        "openai" => ApiProviderKind::OpenAi,
        _ => ApiProviderKind::Custom,
    }
}

fn build_api_payload(provider: ApiProviderKind, text: &str, cfg: &EmbedConfig) -> Value {
    match provider {
        ApiProviderKind::HuggingFace => json!({ "inputs": text }),
        ApiProviderKind::OpenAi => json!({ "input": text, "model": cfg.model_name }),
        ApiProviderKind::Custom => json!({ "text": text }),
    }
}

async fn send_api_request(
    client: &reqwest::Client,
    url: &str,
    auth_header: Option<&str>,
    payload: &Value,
) -> Result<Value, EmbedError> {
    let mut request = client.post(url).header("Content-Type", "application/json");
    if let Some(header) = auth_header {
        request = request.header("Authorization", header);
    }

    let response = request
        .json(payload)
        .send()
        .await
        .map_err(|e| EmbedError::Download(format!("HTTP request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(EmbedError::Download(format!("HTTP error {status}: {body}")));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| EmbedError::Inference(format!("invalid JSON response: {e}")))
}

/// Accepts the response shapes feature-extraction endpoints actually produce:
/// a bare vector, a batch of vectors, `{"embeddings": ...}`, or the
/// `{"data": [{"embedding": ...}]}` envelope.
fn parse_embeddings_from_value(value: Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    match value {
        Value::Object(mut map) => {
            if let Some(embeddings) = map.remove("embeddings") {
                return parse_embedding_collection(embeddings);
            }

            if let Some(Value::Array(items)) = map.remove("data") {
                let mut vectors = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Object(mut obj) => {
                            if let Some(embedding) = obj.remove("embedding") {
                                vectors.push(parse_embedding_vector(embedding)?);
                            } else {
                                return Err(EmbedError::Inference(
                                    "missing `embedding` field in data item".into(),
                                ));
                            }
                        }
                        _ => {
                            return Err(EmbedError::Inference(
                                "unexpected entry inside `data` array".into(),
                            ))
                        }
                    }
                }
                return Ok(vectors);
            }

            Err(EmbedError::Inference("unsupported API response shape".into()))
        }
        other => parse_embedding_collection(other),
    }
}

fn parse_embedding_collection(value: Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                Ok(Vec::new())
            } else if items.iter().all(|item| matches!(item, Value::Array(_))) {
                items.into_iter().map(parse_embedding_vector).collect()
            } else {
                parse_embedding_vector(Value::Array(items)).map(|vec| vec![vec])
            }
        }
        other => parse_embedding_vector(other).map(|vec| vec![vec]),
    }
}

fn parse_embedding_vector(value: Value) -> Result<Vec<f32>, EmbedError> {
    match value {
        Value::Array(values) => values
            .into_iter()
            .map(|entry| match entry {
                Value::Number(num) => num
                    .as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| EmbedError::Inference("non-finite embedding value".into())),
                other => Err(EmbedError::Inference(format!(
                    "embedding entries must be numbers, got {other:?}"
                ))),
            })
            .collect(),
        other => Err(EmbedError::Inference(format!(
            "embedding vector must be an array, got {other:?}"
        ))),
    }
}
