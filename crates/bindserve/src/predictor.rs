//! Request handling for both predictor variants.
use std::sync::Arc;

use bindserve_core::{
    Embedding, EmbeddingModel, Modality, ModalityEmbeddings, ModelHandle, ModelInput, validate,
    validate_legacy,
};
use bindserve_error::{
    ErrorPolicy, InferenceError, InternalError, NoopPolicy, Result, ResultExt, TracingPolicy,
};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::Variant;

/// Validate a `{modality: [items]}` payload and embed it.
///
/// The result has exactly the keys of the request. Modalities sent with an
/// empty list come back empty without reaching the model.
pub fn predict_serializable<M: EmbeddingModel>(
    handle: &ModelHandle<M>,
    raw: &Value,
) -> Result<ModalityEmbeddings> {
    let input = validate(raw)?;
    for batch in input.batches() {
        debug!(modality = %batch.modality(), items = batch.len(), "Received batch");
    }

    let (input, empty) = input.split_empty();
    let mut output = if input.is_empty() {
        ModalityEmbeddings::new()
    } else {
        let produced = handle.model().embed(&input)?;
        checked(&input, produced)?
    };
    drop(input);

    for modality in empty {
        output.insert(modality, Vec::new());
    }
    Ok(output)
}

/// Embed a bare list of strings as text, preserving order.
pub fn predict_legacy<M: EmbeddingModel>(
    handle: &ModelHandle<M>,
    raw: &Value,
) -> Result<Vec<Embedding>> {
    let texts = validate_legacy(raw)?;
    debug!(items = texts.len(), "Received legacy text batch");
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let input = ModelInput::from_texts(texts);
    let mut output = checked(&input, handle.model().embed(&input)?)?;
    output
        .remove(Modality::Text)
        .ok_or_else(|| InferenceError::MissingOutput(Modality::Text.to_string()).into())
}

/// Keep only the requested modalities and require one vector per item.
fn checked(input: &ModelInput, produced: ModalityEmbeddings) -> Result<ModalityEmbeddings> {
    let mut produced = produced.into_inner();
    let mut output = ModalityEmbeddings::new();
    for batch in input.batches() {
        let modality = batch.modality();
        let vectors = produced
            .remove(&modality)
            .ok_or_else(|| InferenceError::MissingOutput(modality.to_string()))?;
        if vectors.len() != batch.len() {
            return Err(InferenceError::CountMismatch {
                modality: modality.to_string(),
                expected: batch.len(),
                actual: vectors.len(),
            }
            .into());
        }
        output.insert(modality, vectors);
    }
    for extra in produced.keys() {
        debug!(modality = %extra, "Dropping output for a modality that was not requested");
    }
    Ok(output)
}

/// A loaded model plus the contract it serves.
///
/// Cheap to clone; clones share the model.
pub struct Predictor<M> {
    handle: Arc<ModelHandle<M>>,
    variant: Variant,
    policy: Arc<dyn ErrorPolicy>,
}

impl<M> Clone for Predictor<M> {
    fn clone(&self) -> Self {
        Self {
            handle: Arc::clone(&self.handle),
            variant: self.variant,
            policy: Arc::clone(&self.policy),
        }
    }
}

impl<M: EmbeddingModel> Predictor<M> {
    /// Failed requests are reported through [`TracingPolicy`].
    pub fn new(handle: Arc<ModelHandle<M>>, variant: Variant) -> Self {
        Self {
            handle,
            variant,
            policy: Arc::new(TracingPolicy),
        }
    }

    /// A predictor that reports nothing on failure.
    pub fn quiet(handle: Arc<ModelHandle<M>>, variant: Variant) -> Self {
        Self::new(handle, variant).with_policy(NoopPolicy)
    }

    pub fn with_policy(mut self, policy: impl ErrorPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn handle(&self) -> &ModelHandle<M> {
        &self.handle
    }

    /// Run one request and return its JSON response body.
    #[instrument(skip_all, fields(variant = ?self.variant))]
    pub fn predict(&self, raw: Value) -> Result<Value> {
        let result = match self.variant {
            Variant::Serializable => predict_serializable(&self.handle, &raw).and_then(to_json),
            Variant::Legacy => predict_legacy(&self.handle, &raw).and_then(to_json),
        };
        result.emit_event(&PolicyRef(self.policy.as_ref()))
    }
}

fn to_json<T: serde::Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| InternalError::Serialization(e.to_string()).into())
}

/// Lets a shared trait object stand in where `impl ErrorPolicy` is expected.
struct PolicyRef<'a>(&'a dyn ErrorPolicy);

impl ErrorPolicy for PolicyRef<'_> {
    fn classify(&self, error: &bindserve_error::Error) -> bindserve_error::Severity {
        self.0.classify(error)
    }

    fn emit(&self, error: &bindserve_error::Error) {
        self.0.emit(error)
    }
}
