use fxhash::hash64;

use crate::normalize::l2_normalize_in_place;
use crate::{EmbedConfig, TextEmbedding};

/// Deterministic stand-in used when `mode` is `"stub"`. Generates sinusoid
/// values derived from a hash of the input text so the same text always maps
/// to the same vector without any model on disk.
pub(crate) fn make_stub_embedding(text: &str, cfg: &EmbedConfig) -> TextEmbedding {
    let dim = stub_dim(&cfg.model_name);
    let mut v = vec![0f32; dim];
    let h = hash64(text.as_bytes());
    for (idx, value) in v.iter_mut().enumerate() {
        *value = ((h >> (idx % 32)) as f32 * 0.0001).sin();
    }
    if cfg.normalize {
        l2_normalize_in_place(&mut v);
    }
    TextEmbedding {
        vector: v,
        model_name: cfg.model_name.clone(),
        dim,
        normalized: cfg.normalize,
    }
}

/// Dimensionality the stub mimics, keyed off the configured model family so
/// downstream length checks behave the same as with real inference.
fn stub_dim(model_name: &str) -> usize {
    if model_name.contains("small") {
        384
    } else if model_name.contains("base") {
        768
    } else {
        // bge-large-en-v1.5 and unknown models
        1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_matches_default_model_dim() {
        let cfg = EmbedConfig::default();
        let embedding = make_stub_embedding("hello world", &cfg);

        assert_eq!(embedding.dim, 1024);
        assert_eq!(embedding.vector.len(), 1024);
        assert_eq!(embedding.model_name, "bge-large-en-v1.5");
    }

    #[test]
    fn stub_dim_follows_model_family() {
        assert_eq!(stub_dim("bge-small-en-v1.5"), 384);
        assert_eq!(stub_dim("bge-base-en-v1.5"), 768);
        assert_eq!(stub_dim("bge-large-en-v1.5"), 1024);
        assert_eq!(stub_dim("something-else"), 1024);
    }

    #[test]
    fn same_text_same_vector() {
        let cfg = EmbedConfig::default();
        let e1 = make_stub_embedding("same text", &cfg);
        let e2 = make_stub_embedding("same text", &cfg);
        assert_eq!(e1.vector, e2.vector);
    }

    #[test]
    fn different_text_different_vector() {
        let cfg = EmbedConfig::default();
        let e1 = make_stub_embedding("hello", &cfg);
        let e2 = make_stub_embedding("world", &cfg);
        assert_ne!(e1.vector, e2.vector);
    }

    #[test]
    fn normalize_flag_is_honored() {
        let cfg = EmbedConfig {
            normalize: true,
            ..Default::default()
        };
        let embedding = make_stub_embedding("test", &cfg);
        assert!(embedding.normalized);
        let norm: f32 = embedding.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);

        let cfg = EmbedConfig {
            normalize: false,
            ..Default::default()
        };
        let embedding = make_stub_embedding("test", &cfg);
        assert!(!embedding.normalized);
    }

    #[test]
    fn unicode_and_long_text_are_fine() {
        let cfg = EmbedConfig::default();
        let unicode = make_stub_embedding("Hello \u{4E16}\u{754C} \u{1F30D}", &cfg);
        assert_eq!(unicode.vector.len(), 1024);

        let long = "word ".repeat(5000);
        let embedding = make_stub_embedding(&long, &cfg);
        assert_eq!(embedding.vector.len(), 1024);
        assert!(!embedding.vector.iter().all(|&x| x == 0.0));
    }
}
