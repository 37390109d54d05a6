use onnxruntime::ndarray::{Array, Array2};
use onnxruntime::session::Session;
use std::cell::RefCell;
use tokenizers::Tokenizer;

use crate::cache::ModelHandle;
use crate::EmbedError;

/// Runs the ONNX forward pass for a batch of texts and pools the result down
/// to one vector per text.
///
/// Sentence-embedding exports come in two shapes: some models emit the pooled
/// sentence vector directly `(batch, hidden)`, others emit token-level states
/// `(batch, seq, hidden)` and leave pooling to the caller. Both are handled;
/// `pooling` (`"cls"` or `"mean"`) only matters for the token-level case.
pub(crate) fn run_onnx_embeddings<T>(
    handle: &ModelHandle,
    texts: &[T],
    max_sequence_length: usize,
    pooling: &str,
) -> Result<Vec<Vec<f32>>, EmbedError>
where
    T: AsRef<str>,
{
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let (input_ids, attn_mask) = encode_padded(&handle.tokenizer, texts, max_sequence_length)?;
    // The mask is consumed by the session run but needed again for pooling.
    let mask = attn_mask.clone();
    let (flat, shape) = execute_session(&handle.session, input_ids, attn_mask)?;
    pool_outputs(&flat, &shape, &mask, pooling, texts.len())
}

/// Tokenizes every text (truncating to `max_sequence_length`) and packs the
/// batch into padded `input_ids` / `attention_mask` matrices.
fn encode_padded<T>(
    tokenizer: &Tokenizer,
    texts: &[T],
    max_sequence_length: usize,
) -> Result<(Array2<i64>, Array2<i64>), EmbedError>
where
    T: AsRef<str>,
{
    let mut ids_per_text = Vec::with_capacity(texts.len());
    let mut masks_per_text = Vec::with_capacity(texts.len());
    let mut seq_len = 0usize;

    for text in texts {
        let encoding = tokenizer
            .encode(text.as_ref(), true)
            .map_err(|e| EmbedError::Inference(e.to_string()))?;

        let mut ids: Vec<i64> = encoding.get_ids().iter().map(|&x| x as i64).collect();
        let mut mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&x| x as i64)
            .collect();
        if ids.len() != mask.len() {
            return Err(EmbedError::Inference(
                "tokenizer produced mismatched id/mask lengths".into(),
            ));
        }
        if ids.len() > max_sequence_length {
            ids.truncate(max_sequence_length);
            mask.truncate(max_sequence_length);
        }

        seq_len = seq_len.max(ids.len());
        ids_per_text.push(ids);
        masks_per_text.push(mask);
    }

    let seq_len = seq_len.max(1);
    let batch = ids_per_text.len();
    let mut id_storage = Vec::with_capacity(batch * seq_len);
    let mut mask_storage = Vec::with_capacity(batch * seq_len);

    for (ids, mask) in ids_per_text.into_iter().zip(masks_per_text) {
        let pad = seq_len - ids.len();
        id_storage.extend(ids);
        mask_storage.extend(mask);
        id_storage.extend(std::iter::repeat_n(0, pad));
        mask_storage.extend(std::iter::repeat_n(0, pad));
    }

    let input_ids = Array::from_shape_vec((batch, seq_len), id_storage)
        .map_err(|e| EmbedError::Inference(e.to_string()))?;
    let attn_mask = Array::from_shape_vec((batch, seq_len), mask_storage)
        .map_err(|e| EmbedError::Inference(e.to_string()))?;
    Ok((input_ids, attn_mask))
}

fn execute_session(
    session: &RefCell<Session<'static>>,
    input_ids: Array2<i64>,
    attn_mask: Array2<i64>,
) -> Result<(Vec<f32>, Vec<usize>), EmbedError> {
    let (batch, seq_len) = input_ids.dim();
    let mut guard = session.borrow_mut();
    let session_ref = &mut *guard;
    let mut runtime_inputs = Vec::with_capacity(session_ref.inputs.len());
    let mut input_ids_tensor = Some(input_ids);
    let mut attn_mask_tensor = Some(attn_mask);

    // Feed inputs in the order the model declares them; BERT-family exports
    // differ in whether token_type_ids is present.
    for input in &session_ref.inputs {
        match input.name.as_str() {
            "input_ids" => {
                let tensor = input_ids_tensor.take().ok_or_else(|| {
                    EmbedError::InvalidConfig("model requested `input_ids` multiple times".into())
                })?;
                runtime_inputs.push(tensor.into_dyn());
            }
            "attention_mask" => {
                let tensor = attn_mask_tensor.take().ok_or_else(|| {
                    EmbedError::InvalidConfig(
                        "model requested `attention_mask` multiple times".into(),
                    )
                })?;
                runtime_inputs.push(tensor.into_dyn());
            }
            "token_type_ids" => {
                let tensor = Array::from_elem((batch, seq_len), 0_i64);
                runtime_inputs.push(tensor.into_dyn());
            }
            other => {
                return Err(EmbedError::Inference(format!(
                    "unsupported model input '{other}'"
                )))
            }
        }
    }

    if runtime_inputs.is_empty() {
        return Err(EmbedError::Inference(
            "model did not declare any inputs".into(),
        ));
    }

    let outputs = session_ref
        .run::<i64, f32, _>(runtime_inputs)
        .map_err(|e| EmbedError::Inference(e.to_string()))?;
    let output_tensor = outputs
        .into_iter()
        .next()
        .ok_or_else(|| EmbedError::Inference("model returned no outputs".into()))?;

    let shape: Vec<usize> = output_tensor.shape().to_vec();
    let flat: Vec<f32> = output_tensor.iter().copied().collect();
    Ok((flat, shape))
}

/// Reduces the raw output tensor to one vector per input text.
fn pool_outputs(
    flat: &[f32],
    shape: &[usize],
    mask: &Array2<i64>,
    pooling: &str,
    batch: usize,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    match *shape {
        [out_batch, seq, hidden] => {
            if out_batch != batch {
                return Err(EmbedError::Inference(format!(
                    "model returned {out_batch} embeddings for {batch} inputs"
                )));
            }
            let mut vectors = Vec::with_capacity(batch);
            for b in 0..batch {
                let tokens = &flat[b * seq * hidden..(b + 1) * seq * hidden];
                let vector = match pooling {
                    "mean" => masked_mean(tokens, mask, b, seq, hidden),
                    // "cls": the sentence vector is the first token's state.
                    _ => tokens[..hidden].to_vec(),
                };
                vectors.push(vector);
            }
            Ok(vectors)
        }
        [out_batch, hidden] => {
            if out_batch != batch {
                return Err(EmbedError::Inference(format!(
                    "model returned {out_batch} embeddings for {batch} inputs"
                )));
            }
            Ok(flat.chunks(hidden).map(|row| row.to_vec()).collect())
        }
        [_] if batch == 1 => Ok(vec![flat.to_vec()]),
        _ => Err(EmbedError::Inference(format!(
            "unsupported model output shape {shape:?}"
        ))),
    }
}

fn masked_mean(tokens: &[f32], mask: &Array2<i64>, b: usize, seq: usize, hidden: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden];
    let mut count = 0usize;
    for t in 0..seq {
        // The mask matrix covers the tokenized sequence; the model may pad
        // beyond it, and those positions never count.
        let attended = t < mask.dim().1 && mask[[b, t]] != 0;
        if !attended {
            continue;
        }
        count += 1;
        let row = &tokens[t * hidden..(t + 1) * hidden];
        for (acc, &value) in pooled.iter_mut().zip(row) {
            *acc += value;
        }
    }
    let n = count.max(1) as f32;
    for value in &mut pooled {
        *value /= n;
    }
    pooled
}
