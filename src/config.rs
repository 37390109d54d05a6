use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::retry::RetryConfig;
use crate::EmbedError;

/// Model the filter loads when nothing else is configured. Matches the
/// pretrained checkpoint the upstream ingestion scripts were built around.
pub const DEFAULT_MODEL_NAME: &str = "bge-large-en-v1.5";

const DEFAULT_MODEL_URL: &str =
    "https://huggingface.co/BAAI/bge-large-en-v1.5/resolve/main/onnx/model.onnx";
const DEFAULT_TOKENIZER_URL: &str =
    "https://huggingface.co/BAAI/bge-large-en-v1.5/resolve/main/tokenizer.json";

/// Runtime configuration describing which model/tokenizer to use and how to
/// post-process vectors.
///
/// Every field has an `EMBED_TEXT_*` environment override (see
/// [`EmbedConfig::from_env`]), which is how the CLI is configured — a filter
/// process has no room for flags on the data path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedConfig {
    /// Inference mode selector: `"onnx"` (local), `"api"` (remote HTTP), or
    /// `"stub"` (deterministic hash vector, test/offline use).
    pub mode: String,
    /// Friendly label surfaced on every [`TextEmbedding`](crate::TextEmbedding).
    pub model_name: String,
    /// Local path where the ONNX file should live (also used as the download
    /// target when [`model_url`](Self::model_url) is provided).
    pub model_path: PathBuf,
    /// Optional HTTPS URL downloaded when [`model_path`](Self::model_path) is missing.
    pub model_url: Option<String>,
    /// Path to `tokenizer.json`. When absent and
    /// [`tokenizer_url`](Self::tokenizer_url) is provided we infer the filename
    /// from the URL and place it next to the model file.
    pub tokenizer_path: Option<PathBuf>,
    /// Optional HTTPS URL for fetching the tokenizer on demand.
    pub tokenizer_url: Option<String>,
    /// API inference endpoint when [`mode`](Self::mode) is `"api"`.
    pub api_url: Option<String>,
    /// Authorization header value (e.g. `"Bearer hf_xxx"`).
    pub api_auth_header: Option<String>,
    /// Remote provider hint: `"hf"` (default payload shape) or `"custom"`.
    pub api_provider: Option<String>,
    /// Overall API timeout in seconds.
    pub api_timeout_secs: Option<u64>,
    /// Token budget per input; longer texts are truncated, never rejected.
    pub max_sequence_length: usize,
    /// Pooling applied to token-level model outputs: `"cls"` or `"mean"`.
    /// The bge family is trained for CLS pooling.
    pub pooling: String,
    /// Normalize the resulting vector to unit length. On by default because
    /// the default model ships a normalization layer in its original form.
    pub normalize: bool,
    /// Retry settings for HTTP fetches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            mode: "onnx".into(),
            model_name: DEFAULT_MODEL_NAME.into(),
            model_path: PathBuf::from("./models/bge-large-en-v1.5/onnx/model.onnx"),
            model_url: Some(DEFAULT_MODEL_URL.into()),
            tokenizer_path: Some(PathBuf::from("./models/bge-large-en-v1.5/tokenizer.json")),
            tokenizer_url: Some(DEFAULT_TOKENIZER_URL.into()),
            api_url: None,
            api_auth_header: None,
            api_provider: None,
            api_timeout_secs: Some(30),
            max_sequence_length: 512,
            pooling: "cls".into(),
            normalize: true,
            retry: None,
        }
    }
}

impl EmbedConfig {
    /// Build a config from defaults plus `EMBED_TEXT_*` environment overrides.
    pub fn from_env() -> Result<Self, EmbedError> {
        let mut cfg = Self::default();
        cfg.apply_overrides(|key| env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply overrides from a key lookup. Factored out of [`from_env`](Self::from_env)
    /// so tests can drive it without touching process-global state.
    pub fn apply_overrides<F>(&mut self, get: F) -> Result<(), EmbedError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).filter(|value| !value.is_empty());

        if let Some(mode) = get("EMBED_TEXT_MODE") {
            self.mode = mode;
        }
        if let Some(name) = get("EMBED_TEXT_MODEL_NAME") {
            self.model_name = name;
        }
        if let Some(path) = get("EMBED_TEXT_MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }
        if let Some(url) = get("EMBED_TEXT_MODEL_URL") {
            self.model_url = Some(url);
        }
        if let Some(path) = get("EMBED_TEXT_TOKENIZER_PATH") {
            self.tokenizer_path = Some(PathBuf::from(path));
        }
        if let Some(url) = get("EMBED_TEXT_TOKENIZER_URL") {
            self.tokenizer_url = Some(url);
        }
        if let Some(url) = get("EMBED_TEXT_API_URL") {
            self.api_url = Some(url);
        }
        if let Some(token) = get("EMBED_TEXT_API_TOKEN") {
            self.api_auth_header = Some(format!("Bearer {token}"));
        }
        if let Some(provider) = get("EMBED_TEXT_API_PROVIDER") {
            self.api_provider = Some(provider);
        }
        if let Some(pooling) = get("EMBED_TEXT_POOLING") {
            self.pooling = pooling;
        }
        if let Some(raw) = get("EMBED_TEXT_NORMALIZE") {
            self.normalize = parse_bool("EMBED_TEXT_NORMALIZE", &raw)?;
        }
        if let Some(raw) = get("EMBED_TEXT_MAX_SEQ") {
            self.max_sequence_length = raw.parse().map_err(|_| {
                EmbedError::InvalidConfig(format!("EMBED_TEXT_MAX_SEQ must be a positive integer, got '{raw}'"))
            })?;
        }

        Ok(())
    }

    /// Reject configurations the pipeline cannot act on.
    pub fn validate(&self) -> Result<(), EmbedError> {
        const VALID_MODES: [&str; 3] = ["onnx", "api", "stub"];
        if !VALID_MODES.contains(&self.mode.as_str()) {
            return Err(EmbedError::InvalidConfig(format!(
                "mode must be one of {VALID_MODES:?}, got '{}'",
                self.mode
            )));
        }

        const VALID_POOLING: [&str; 2] = ["cls", "mean"];
        if !VALID_POOLING.contains(&self.pooling.as_str()) {
            return Err(EmbedError::InvalidConfig(format!(
                "pooling must be one of {VALID_POOLING:?}, got '{}'",
                self.pooling
            )));
        }

        if self.max_sequence_length == 0 {
            return Err(EmbedError::InvalidConfig(
                "max_sequence_length must be >= 1".into(),
            ));
        }

        if self.mode == "api" && self.api_url.is_none() {
            return Err(EmbedError::InvalidConfig(
                "api_url is required for api mode".into(),
            ));
        }

        Ok(())
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, EmbedError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(EmbedError::InvalidConfig(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |key| map.get(key).map(|value| value.to_string())
    }

    #[test]
    fn config_default_values() {
        let cfg = EmbedConfig::default();
        assert_eq!(cfg.mode, "onnx");
        assert_eq!(cfg.model_name, "bge-large-en-v1.5");
        assert_eq!(
            cfg.model_path,
            PathBuf::from("./models/bge-large-en-v1.5/onnx/model.onnx")
        );
        assert!(cfg.model_url.is_some());
        assert!(cfg.tokenizer_url.is_some());
        assert_eq!(cfg.pooling, "cls");
        assert_eq!(cfg.max_sequence_length, 512);
        assert!(cfg.normalize);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut cfg = EmbedConfig::default();
        cfg.apply_overrides(lookup(&[
            ("EMBED_TEXT_MODE", "stub"),
            ("EMBED_TEXT_MODEL_NAME", "bge-small-en-v1.5"),
            ("EMBED_TEXT_MODEL_PATH", "/opt/models/model.onnx"),
            ("EMBED_TEXT_POOLING", "mean"),
            ("EMBED_TEXT_NORMALIZE", "false"),
            ("EMBED_TEXT_MAX_SEQ", "128"),
        ]))
        .unwrap();

        assert_eq!(cfg.mode, "stub");
        assert_eq!(cfg.model_name, "bge-small-en-v1.5");
        assert_eq!(cfg.model_path, PathBuf::from("/opt/models/model.onnx"));
        assert_eq!(cfg.pooling, "mean");
        assert!(!cfg.normalize);
        assert_eq!(cfg.max_sequence_length, 128);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn api_token_becomes_bearer_header() {
        let mut cfg = EmbedConfig::default();
        cfg.apply_overrides(lookup(&[
            ("EMBED_TEXT_MODE", "api"),
            ("EMBED_TEXT_API_URL", "https://example.com/embed"),
            ("EMBED_TEXT_API_TOKEN", "hf_abc123"),
        ]))
        .unwrap();

        assert_eq!(cfg.api_auth_header.as_deref(), Some("Bearer hf_abc123"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_override_values_are_ignored() {
        let mut cfg = EmbedConfig::default();
        cfg.apply_overrides(lookup(&[("EMBED_TEXT_MODE", "")])).unwrap();
        assert_eq!(cfg.mode, "onnx");
    }

    #[test]
    fn unknown_mode_rejected() {
        let cfg = EmbedConfig {
            mode: "turbo".into(),
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("mode"));
    }

    #[test]
    fn unknown_pooling_rejected() {
        let cfg = EmbedConfig {
            pooling: "max".into(),
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("pooling"));
    }

    #[test]
    fn zero_sequence_length_rejected() {
        let cfg = EmbedConfig {
            max_sequence_length: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn api_mode_requires_url() {
        let cfg = EmbedConfig {
            mode: "api".into(),
            api_url: None,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("api_url"));
    }

    #[test]
    fn bad_boolean_override_rejected() {
        let mut cfg = EmbedConfig::default();
        let err = cfg
            .apply_overrides(lookup(&[("EMBED_TEXT_NORMALIZE", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("EMBED_TEXT_NORMALIZE"));
    }

    #[test]
    fn bad_max_seq_override_rejected() {
        let mut cfg = EmbedConfig::default();
        let err = cfg
            .apply_overrides(lookup(&[("EMBED_TEXT_MAX_SEQ", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("EMBED_TEXT_MAX_SEQ"));
    }

    #[test]
    fn config_serde_roundtrip() {
        let cfg = EmbedConfig {
            mode: "api".into(),
            api_url: Some("https://api.example.com/embed".into()),
            api_auth_header: Some("Bearer token123".into()),
            normalize: false,
            ..Default::default()
        };

        let serialized = serde_json::to_string(&cfg).unwrap();
        let deserialized: EmbedConfig = serde_json::from_str(&serialized).unwrap();

        assert_eq!(cfg, deserialized);
    }
}
