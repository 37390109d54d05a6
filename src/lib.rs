//! embed-text: a stdin-to-JSON sentence embedding filter.
//!
//! Feed it text on stdin and it prints one line of JSON on stdout: the
//! embedding vector on success, `{"error": "..."}` on any failure. That's the
//! whole contract — the process never crashes with a stack trace and never
//! prints a second line.
//!
//! We support a few modes:
//!
//! - **ONNX mode** (default) - Run the model locally. Missing model files are
//!   downloaded from their configured URLs on first use.
//! - **API mode** - Call out to a Hugging Face-style inference endpoint.
//! - **Stub mode** - For testing and offline work. Generates fake but
//!   consistent vectors with no model on disk.
//!
//! Unlike a long-lived service there is no silent fallback between modes: if
//! the model can't be loaded, the caller gets an error payload, because a
//! consumer parsing our stdout must be able to tell a real embedding from a
//! placeholder.
//!
//! ## Quick example
//!
//! ```no_run
//! use embed_text::{embed, EmbedConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cfg = EmbedConfig::default();
//!     let embedding = embed("This is a test.", &cfg).await.unwrap();
//!     assert_eq!(embedding.vector.len(), embedding.dim);
//! }
//! ```
//!
//! ## Env vars to know
//!
//! Everything is configured through `EMBED_TEXT_*` variables; see
//! [`EmbedConfig::from_env`]. `EMBED_TEXT_LOG` tunes stderr logging — stdout
//! stays reserved for the payload.

pub mod config;
pub mod error;
pub mod input;
pub mod output;
pub mod retry;
pub mod types;

mod api;
mod assets;
mod cache;
mod normalize;
mod onnx;
mod stub;

pub use crate::config::EmbedConfig;
pub use crate::error::EmbedError;
pub use crate::types::TextEmbedding;

use std::io::{Read, Write};

use crate::api::embed_via_api;
use crate::assets::resolve_model_assets;
use crate::cache::get_or_load_model;
use crate::input::read_input;
use crate::normalize::l2_normalize_in_place;
use crate::onnx::run_onnx_embeddings;
use crate::stub::make_stub_embedding;

/// Converts `text` into a [`TextEmbedding`] using the supplied [`EmbedConfig`].
///
/// For `"onnx"` mode this resolves the model/tokenizer assets (downloading
/// remote URLs if necessary), runs inference, and post-processes the vector.
/// The model is loaded once per process; repeated calls reuse the session.
pub async fn embed(text: &str, cfg: &EmbedConfig) -> Result<TextEmbedding, EmbedError> {
    cfg.validate()?;

    let mut vector = match cfg.mode.as_str() {
        "stub" => return Ok(make_stub_embedding(text, cfg)),
        "api" => embed_via_api(text, cfg).await?,
        _ => {
            let assets = resolve_model_assets(cfg).await?;
            let handle = get_or_load_model(&assets)?;
            let mut vectors = run_onnx_embeddings(
                handle.as_ref(),
                &[text],
                cfg.max_sequence_length,
                &cfg.pooling,
            )?;
            vectors
                .pop()
                .ok_or_else(|| EmbedError::Inference("model returned no outputs".into()))?
        }
    };

    if cfg.normalize {
        l2_normalize_in_place(&mut vector);
    }

    Ok(TextEmbedding {
        dim: vector.len(),
        vector,
        model_name: cfg.model_name.clone(),
        normalized: cfg.normalize,
    })
}

/// Batch variant of [`embed`] that shares one padded ONNX run (or one stub
/// pass) across all texts. API mode embeds sequentially; the endpoints this
/// tool targets meter per request anyway.
pub async fn embed_batch<T>(texts: &[T], cfg: &EmbedConfig) -> Result<Vec<TextEmbedding>, EmbedError>
where
    T: AsRef<str>,
{
    cfg.validate()?;

    if texts.is_empty() {
        return Ok(Vec::new());
    }

    match cfg.mode.as_str() {
        "stub" => {
            return Ok(texts
                .iter()
                .map(|text| make_stub_embedding(text.as_ref(), cfg))
                .collect())
        }
        "api" => {
            let mut results = Vec::with_capacity(texts.len());
            for text in texts {
                results.push(embed(text.as_ref(), cfg).await?);
            }
            return Ok(results);
        }
        _ => {}
    }

    let assets = resolve_model_assets(cfg).await?;
    let handle = get_or_load_model(&assets)?;
    let text_refs: Vec<&str> = texts.iter().map(|text| text.as_ref()).collect();
    let vectors = run_onnx_embeddings(
        handle.as_ref(),
        &text_refs,
        cfg.max_sequence_length,
        &cfg.pooling,
    )?;
    if vectors.len() != texts.len() {
        return Err(EmbedError::Inference(format!(
            "model returned {} embeddings for {} inputs",
            vectors.len(),
            texts.len()
        )));
    }

    let mut results = Vec::with_capacity(texts.len());
    for mut vector in vectors {
        if cfg.normalize {
            l2_normalize_in_place(&mut vector);
        }
        results.push(TextEmbedding {
            dim: vector.len(),
            vector,
            model_name: cfg.model_name.clone(),
            normalized: cfg.normalize,
        });
    }

    Ok(results)
}

/// The full process contract: read everything from `input`, embed it, and
/// write exactly one newline-terminated JSON line to `output`.
///
/// Every failure — empty input, missing model, network trouble, even a vector
/// that refuses to serialize — degrades to the `{"error": "..."}` payload.
/// Nothing propagates out of this function; a write failure on `output`
/// itself can only be logged.
pub async fn run<R, W>(reader: &mut R, writer: &mut W, cfg: &EmbedConfig)
where
    R: Read,
    W: Write,
{
    let result = match read_input(reader) {
        Ok(text) => {
            tracing::debug!(bytes = text.len(), "read input");
            embed(&text, cfg).await
        }
        Err(err) => Err(err),
    };

    let line = match result {
        Ok(embedding) => {
            tracing::info!(
                model = %embedding.model_name,
                dim = embedding.dim,
                "embedding produced"
            );
            match output::render_embedding(&embedding.vector) {
                Ok(line) => line,
                Err(err) => output::render_error(&err.to_string()),
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "embedding failed");
            output::render_error(&err.to_string())
        }
    };

    if let Err(err) = output::write_line(writer, &line) {
        tracing::error!(error = %err, "failed to write output");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> EmbedConfig {
        EmbedConfig {
            mode: "stub".into(),
            ..EmbedConfig::default()
        }
    }

    #[tokio::test]
    async fn stub_mode_is_deterministic() {
        let cfg = stub_config();
        let e1 = embed("big cat", &cfg).await.unwrap();
        let e2 = embed("big cat", &cfg).await.unwrap();
        assert_eq!(e1.vector, e2.vector);
    }

    #[tokio::test]
    async fn different_texts_produce_different_embeddings() {
        let cfg = stub_config();
        let e1 = embed("hello world", &cfg).await.unwrap();
        let e2 = embed("goodbye world", &cfg).await.unwrap();
        assert_ne!(e1.vector, e2.vector);
    }

    #[tokio::test]
    async fn vector_length_matches_dim() {
        let cfg = stub_config();
        let embedding = embed("hello", &cfg).await.unwrap();
        assert_eq!(embedding.vector.len(), embedding.dim);
        assert_eq!(embedding.dim, 1024);
    }

    #[tokio::test]
    async fn unknown_mode_is_rejected() {
        let cfg = EmbedConfig {
            mode: "turbo".into(),
            ..EmbedConfig::default()
        };
        let err = embed("hello", &cfg).await.unwrap_err();
        assert!(matches!(err, EmbedError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn missing_model_is_an_error_not_a_fallback() {
        let cfg = EmbedConfig {
            model_path: "./missing/model.onnx".into(),
            model_url: None,
            tokenizer_path: Some("./missing/tokenizer.json".into()),
            tokenizer_url: None,
            ..EmbedConfig::default()
        };

        let err = embed("some text", &cfg).await.unwrap_err();
        assert!(matches!(err, EmbedError::ModelNotFound(_)));
    }

    #[tokio::test]
    async fn batch_empty_input() {
        let cfg = stub_config();
        let texts: Vec<&str> = vec![];
        let embeddings = embed_batch(&texts, &cfg).await.unwrap();
        assert!(embeddings.is_empty());
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let cfg = stub_config();
        let texts = vec!["first text", "second text", "third text"];
        let embeddings = embed_batch(&texts, &cfg).await.unwrap();

        assert_eq!(embeddings.len(), 3);
        for (embedding, text) in embeddings.iter().zip(&texts) {
            let single = embed(text, &cfg).await.unwrap();
            assert_eq!(embedding.vector, single.vector);
        }
    }

    #[tokio::test]
    async fn normalization_yields_unit_length() {
        let cfg = EmbedConfig {
            normalize: true,
            ..stub_config()
        };
        let embedding = embed("test", &cfg).await.unwrap();
        assert!(embedding.normalized);
        let norm: f32 = embedding.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn without_normalization_flag_is_reported() {
        let cfg = EmbedConfig {
            normalize: false,
            ..stub_config()
        };
        let embedding = embed("test", &cfg).await.unwrap();
        assert!(!embedding.normalized);
    }
}
