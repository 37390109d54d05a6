use once_cell::sync::OnceCell;
use onnxruntime::{environment::Environment, session::Session};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use tokenizers::Tokenizer;

use crate::assets::ModelAssets;
use crate::EmbedError;

static ORT_ENV: OnceCell<Environment> = OnceCell::new();

thread_local! {
    static MODEL_CACHE: RefCell<HashMap<ModelCacheKey, Rc<ModelHandle>>> =
        RefCell::new(HashMap::new());
}

#[derive(Hash, PartialEq, Eq, Clone)]
struct ModelCacheKey {
    model_path: PathBuf,
    tokenizer_path: PathBuf,
}

/// Tokenizer plus ONNX session, loaded once per process. The session is not
/// `Sync`, so the cache is per-thread; a single-shot filter only ever touches
/// one thread anyway.
pub(crate) struct ModelHandle {
    pub(crate) tokenizer: Tokenizer,
    pub(crate) session: RefCell<Session<'static>>,
}

impl ModelHandle {
    fn load(assets: &ModelAssets) -> Result<Self, EmbedError> {
        tracing::info!(model = %assets.model_path.display(), "loading model");

        let tokenizer = Tokenizer::from_file(&assets.tokenizer_path)
            .map_err(|e| EmbedError::Inference(e.to_string()))?;

        let env = ort_environment()?;
        let session = env
            .new_session_builder()
            .map_err(|e| EmbedError::Inference(e.to_string()))?
            .with_model_from_file(assets.model_path.clone())
            .map_err(|e| EmbedError::Inference(e.to_string()))?;

        Ok(Self {
            tokenizer,
            session: RefCell::new(session),
        })
    }
}

pub(crate) fn get_or_load_model(assets: &ModelAssets) -> Result<Rc<ModelHandle>, EmbedError> {
    let key = ModelCacheKey {
        model_path: assets.model_path.clone(),
        tokenizer_path: assets.tokenizer_path.clone(),
    };

    MODEL_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some(handle) = cache.get(&key) {
            return Ok(handle.clone());
        }

        let handle = Rc::new(ModelHandle::load(assets)?);
        cache.insert(key, handle.clone());
        Ok(handle)
    })
}

fn ort_environment() -> Result<&'static Environment, EmbedError> {
    ORT_ENV.get_or_try_init(|| {
        Environment::builder()
            .with_name("embed-text")
            .build()
            .map_err(|e| EmbedError::Inference(e.to_string()))
    })
}
