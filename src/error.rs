use std::io;
use thiserror::Error;

/// Errors surfaced by the embedding pipeline.
///
/// At the process boundary every variant collapses into the single-line
/// `{"error": "..."}` payload via its `Display` form; library callers keep the
/// typed enum.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Stdin was empty or whitespace-only. The display form doubles as the
    /// wire tag, so it must stay exactly `no_input`.
    #[error("no_input")]
    NoInput,
    /// The ONNX model could not be located locally and no fallback URL was provided.
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    /// The tokenizer JSON is missing and there was no remote URL to fetch it from.
    #[error("tokenizer missing: {0}")]
    TokenizerMissing(String),
    /// Configuration is inconsistent (e.g. unknown mode or pooling strategy).
    #[error("invalid embed config: {0}")]
    InvalidConfig(String),
    /// Unable to download remote assets or reach the inference API.
    #[error("download failed: {0}")]
    Download(String),
    /// Low-level IO failures while touching stdin or the filesystem.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// ONNX Runtime, tokenizer, or pooling errors.
    #[error("inference failure: {0}")]
    Inference(String),
}
