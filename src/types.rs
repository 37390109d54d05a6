use serde::{Deserialize, Serialize};

/// Embedding output.
///
/// The CLI only serializes [`vector`](Self::vector); the rest is inference
/// metadata for library callers, logs, and tests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextEmbedding {
    /// Final embedding values (either model output or deterministic stub).
    pub vector: Vec<f32>,
    /// Name of the model used to produce the vector.
    pub model_name: String,
    /// Dimension of `vector`.
    pub dim: usize,
    /// Whether [`vector`](Self::vector) was L2-normalized.
    pub normalized: bool,
}
